//! D-Bus surface: the two iio-sensor-proxy interfaces.
//!
//! Both objects share one `SensorProxyCore`. Claim/Release take no
//! arguments and never fail for well-formed callers; the claiming
//! identity is the message sender. Unknown method names are rejected by
//! the object server with the standard UnknownMethod error naming the
//! method and path.

use std::sync::Arc;

use zbus::{MessageHeader, SignalContext, dbus_interface, fdo};

use super::SensorProxyCore;
use super::claims::PeerWatch;
use super::notify::{COMPASS_PATH, SENSOR_PROXY_IFACE, SENSOR_PROXY_PATH};
use super::state::SensorClass;

/// Well-known bus name owned by the daemon.
pub const BUS_NAME: &str = SENSOR_PROXY_IFACE;

fn sender_name(header: &MessageHeader<'_>) -> fdo::Result<String> {
    match header.sender() {
        Ok(Some(name)) => Ok(name.to_string()),
        _ => Err(fdo::Error::Failed("message carries no sender".to_string())),
    }
}

async fn claim(
    core: &Arc<SensorProxyCore>,
    class: SensorClass,
    header: MessageHeader<'_>,
    conn: &zbus::Connection,
) -> fdo::Result<()> {
    let sender = sender_name(&header)?;
    let watch_core = Arc::downgrade(core);
    let watch_conn = conn.clone();
    let watch_name = sender.clone();
    core.claim(class, &sender, move || {
        PeerWatch::spawn(watch_conn, watch_name, move |name| async move {
            if let Some(core) = watch_core.upgrade() {
                core.peer_vanished(&name).await;
            }
        })
    })
    .await;
    Ok(())
}

async fn release(
    core: &SensorProxyCore,
    class: SensorClass,
    header: MessageHeader<'_>,
) -> fdo::Result<()> {
    let sender = sender_name(&header)?;
    core.release(class, &sender).await;
    Ok(())
}

/// Main interface at /net/hadess/SensorProxy.
pub struct SensorProxyInterface {
    core: Arc<SensorProxyCore>,
}

impl SensorProxyInterface {
    pub fn new(core: Arc<SensorProxyCore>) -> Self {
        Self { core }
    }

    pub fn path() -> &'static str {
        SENSOR_PROXY_PATH
    }
}

#[dbus_interface(name = "net.hadess.SensorProxy")]
impl SensorProxyInterface {
    async fn claim_accelerometer(
        &self,
        #[zbus(header)] header: MessageHeader<'_>,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> fdo::Result<()> {
        claim(
            &self.core,
            SensorClass::Accelerometer,
            header,
            ctx.connection(),
        )
        .await
    }

    async fn release_accelerometer(
        &self,
        #[zbus(header)] header: MessageHeader<'_>,
    ) -> fdo::Result<()> {
        release(&self.core, SensorClass::Accelerometer, header).await
    }

    async fn claim_light(
        &self,
        #[zbus(header)] header: MessageHeader<'_>,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> fdo::Result<()> {
        claim(
            &self.core,
            SensorClass::AmbientLight,
            header,
            ctx.connection(),
        )
        .await
    }

    async fn release_light(
        &self,
        #[zbus(header)] header: MessageHeader<'_>,
    ) -> fdo::Result<()> {
        release(&self.core, SensorClass::AmbientLight, header).await
    }

    async fn claim_proximity(
        &self,
        #[zbus(header)] header: MessageHeader<'_>,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> fdo::Result<()> {
        claim(&self.core, SensorClass::Proximity, header, ctx.connection()).await
    }

    async fn release_proximity(
        &self,
        #[zbus(header)] header: MessageHeader<'_>,
    ) -> fdo::Result<()> {
        release(&self.core, SensorClass::Proximity, header).await
    }

    #[dbus_interface(property)]
    fn has_accelerometer(&self) -> bool {
        self.core.available(SensorClass::Accelerometer)
    }

    #[dbus_interface(property)]
    fn accelerometer_orientation(&self) -> String {
        self.core.readings().orientation.to_string()
    }

    #[dbus_interface(property)]
    fn has_ambient_light(&self) -> bool {
        self.core.available(SensorClass::AmbientLight)
    }

    #[dbus_interface(property)]
    fn light_level_unit(&self) -> String {
        self.core.readings().light_unit.to_string()
    }

    #[dbus_interface(property)]
    fn light_level(&self) -> f64 {
        self.core.readings().light_level
    }

    #[dbus_interface(property)]
    fn light_level_accumulator(&self) -> f64 {
        self.core.readings().light_accumulator
    }

    #[dbus_interface(property)]
    fn has_proximity(&self) -> bool {
        self.core.available(SensorClass::Proximity)
    }

    #[dbus_interface(property)]
    fn proximity_near(&self) -> bool {
        self.core.readings().proximity_near
    }
}

/// Compass interface at /net/hadess/SensorProxy/Compass.
pub struct CompassInterface {
    core: Arc<SensorProxyCore>,
}

impl CompassInterface {
    pub fn new(core: Arc<SensorProxyCore>) -> Self {
        Self { core }
    }

    pub fn path() -> &'static str {
        COMPASS_PATH
    }
}

#[dbus_interface(name = "net.hadess.SensorProxy.Compass")]
impl CompassInterface {
    async fn claim_compass(
        &self,
        #[zbus(header)] header: MessageHeader<'_>,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> fdo::Result<()> {
        claim(&self.core, SensorClass::Compass, header, ctx.connection()).await
    }

    async fn release_compass(
        &self,
        #[zbus(header)] header: MessageHeader<'_>,
    ) -> fdo::Result<()> {
        release(&self.core, SensorClass::Compass, header).await
    }

    #[dbus_interface(property)]
    fn has_compass(&self) -> bool {
        self.core.available(SensorClass::Compass)
    }

    #[dbus_interface(property)]
    fn compass_heading(&self) -> f64 {
        self.core.readings().heading
    }
}
