//! Sensorfw plugin identities.

use std::fmt;

use super::manager::MANAGER_PATH;

/// One sensorfw plugin per sensor class handled by this daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plugin {
    Orientation,
    Light,
    Proximity,
    Compass,
}

impl Plugin {
    /// Plugin name as passed to loadPlugin/requestSensor/releaseSensor.
    pub fn name(self) -> &'static str {
        match self {
            Plugin::Orientation => "orientationsensor",
            Plugin::Light => "alssensor",
            Plugin::Proximity => "proximitysensor",
            Plugin::Compass => "compasssensor",
        }
    }

    /// D-Bus interface of the per-plugin control object.
    pub fn interface(self) -> &'static str {
        match self {
            Plugin::Orientation => "local.OrientationSensor",
            Plugin::Light => "local.ALSSensor",
            Plugin::Proximity => "local.ProximitySensor",
            Plugin::Compass => "local.CompassSensor",
        }
    }

    /// Control object path: the manager path with the plugin name appended.
    pub fn object_path(self) -> String {
        format!("{}/{}", MANAGER_PATH, self.name())
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
