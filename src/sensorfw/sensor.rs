//! Per-class sensorfw backend facade.
//!
//! Owns the worker that serializes every session call, the session slot
//! and the sample handler registration. This is the only type the
//! daemon core touches; the session protocol stays behind it.

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;

use crate::config::SensorfwConfig;
use crate::error::{ProxyError, Result};

use super::decode::Sample;
use super::event_loop::EventLoop;
use super::plugin::Plugin;
use super::session::{Session, SharedHandler};

/// Backend operations the daemon core relies on.
///
/// Tests substitute counting fakes for the real sensorfw sessions.
#[async_trait]
pub trait SensorBackend: Send + Sync {
    async fn enable(&self) -> Result<()>;
    async fn disable(&self) -> Result<()>;
}

/// Keeps a sample handler registered for as long as it lives.
///
/// Dropping the registration deregisters the handler; a sample already
/// being delivered may still complete.
pub struct HandlerRegistration {
    handler: SharedHandler,
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        *self.handler.write() = None;
    }
}

/// One sensorfw-backed sensor.
pub struct SensorfwSensor {
    plugin: Plugin,
    queue: EventLoop,
    session: Arc<Mutex<Option<Session>>>,
    handler: SharedHandler,
}

impl SensorfwSensor {
    /// Connect to sensorfw for `plugin`.
    ///
    /// The full load/request/handshake sequence runs on the dedicated
    /// worker thread; load-retry exhaustion surfaces here as a
    /// permanent `BackendUnavailable` error.
    pub async fn connect(
        conn: zbus::Connection,
        plugin: Plugin,
        config: &SensorfwConfig,
    ) -> Result<Self> {
        let queue = EventLoop::spawn(plugin.name());
        let handler: SharedHandler = Arc::new(RwLock::new(None));
        let session = Arc::new(Mutex::new(None));

        let rt = Handle::current();
        let slot = Arc::clone(&session);
        let handler_slot = Arc::clone(&handler);
        let config = config.clone();
        queue
            .enqueue(move || -> Result<()> {
                let opened = Session::open(rt, conn, plugin, &config, handler_slot)?;
                *slot.lock() = Some(opened);
                Ok(())
            })
            .wait()
            .await??;

        Ok(Self {
            plugin,
            queue,
            session,
            handler,
        })
    }

    pub fn plugin(&self) -> Plugin {
        self.plugin
    }

    /// Register the handler the read thread delivers samples to.
    pub fn register_handler(
        &self,
        f: impl Fn(Sample) + Send + Sync + 'static,
    ) -> HandlerRegistration {
        *self.handler.write() = Some(Box::new(f));
        HandlerRegistration {
            handler: Arc::clone(&self.handler),
        }
    }

    /// Drop the session (stop, release) and terminate the worker.
    pub async fn shutdown(&self) {
        let slot = Arc::clone(&self.session);
        let done = self.queue.enqueue(move || {
            slot.lock().take();
        });
        if done.wait().await.is_err() {
            warn!("{} worker already gone during shutdown", self.plugin);
        }
        self.queue.stop();
    }
}

#[async_trait]
impl SensorBackend for SensorfwSensor {
    async fn enable(&self) -> Result<()> {
        let slot = Arc::clone(&self.session);
        self.queue
            .enqueue(move || match slot.lock().as_mut() {
                Some(session) => session.start(),
                None => Err(ProxyError::NoSession),
            })
            .wait()
            .await?
    }

    async fn disable(&self) -> Result<()> {
        let slot = Arc::clone(&self.session);
        self.queue
            .enqueue(move || match slot.lock().as_mut() {
                Some(session) => {
                    session.stop();
                    Ok(())
                }
                None => Err(ProxyError::NoSession),
            })
            .wait()
            .await?
    }
}
