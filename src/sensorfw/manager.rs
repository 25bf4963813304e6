//! D-Bus client surface of the sensorfw sensor manager.

use zbus::dbus_proxy;

use super::plugin::Plugin;

/// Well-known bus name of the sensorfw daemon.
pub const MANAGER_SERVICE: &str = "com.nokia.SensorService";
/// Object path of the sensor manager.
pub const MANAGER_PATH: &str = "/SensorManager";

#[dbus_proxy(
    interface = "local.SensorManager",
    default_service = "com.nokia.SensorService",
    default_path = "/SensorManager"
)]
trait SensorManager {
    /// loadPlugin method
    #[dbus_proxy(name = "loadPlugin")]
    fn load_plugin(&self, name: &str) -> zbus::Result<bool>;

    /// requestSensor method
    #[dbus_proxy(name = "requestSensor")]
    fn request_sensor(&self, name: &str, pid: i64) -> zbus::Result<i32>;

    /// releaseSensor method
    #[dbus_proxy(name = "releaseSensor")]
    fn release_sensor(&self, name: &str, session_id: i32, pid: i64) -> zbus::Result<bool>;
}

/// Build a dynamic proxy for one plugin's control object.
///
/// start/stop live on a per-plugin path, so these cannot be a static
/// `dbus_proxy` trait with a fixed default path.
pub async fn plugin_proxy(
    conn: &zbus::Connection,
    plugin: Plugin,
) -> zbus::Result<zbus::Proxy<'static>> {
    zbus::Proxy::new(
        conn,
        MANAGER_SERVICE,
        plugin.object_path(),
        plugin.interface(),
    )
    .await
}
