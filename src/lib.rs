#![feature(unix_socket_peek)]
//! Sensorfw proxy library.
//!
//! Bridges the sensorfw sensor daemon (`com.nokia.SensorService`) onto
//! the `net.hadess.SensorProxy` D-Bus interface, so iio-sensor-proxy
//! clients keep working on devices where sensors are managed by sensorfw.

pub mod config;
pub mod error;
pub mod proxy;
pub mod sensorfw;
