//! Sensorfw backend adapter.
//!
//! Each sensor class this daemon exposes is backed by one sensorfw
//! plugin session: load the plugin, request a session, start/stop
//! streaming, release on teardown. Samples arrive over a raw Unix
//! socket and are decoded into typed values before they reach the
//! daemon core.

pub mod decode;
pub mod event_loop;
pub mod manager;
pub mod plugin;
pub mod sensor;
pub mod session;
pub mod socket;

pub use self::decode::{RawOrientation, Sample};
pub use self::plugin::Plugin;
pub use self::sensor::{HandlerRegistration, SensorBackend, SensorfwSensor};
