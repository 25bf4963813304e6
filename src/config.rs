use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sensorfw: SensorfwConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorfwConfig {
    /// Path of the sensord telemetry socket.
    pub socket_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensorfw: SensorfwConfig {
                socket_path: "/var/run/sensord.sock".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SENSORFW_SOCKET") {
            config.sensorfw.socket_path = path;
        }

        config
    }
}
