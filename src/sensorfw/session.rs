//! Lifecycle of one sensorfw session.
//!
//! load -> request -> start/stop -> release. The session owns the
//! telemetry socket and, while running, the background thread that
//! polls it and feeds decoded samples to the registered handler.
//!
//! A `Session` lives on its backend's worker thread; every method here
//! is synchronous and performs bus calls by blocking on the shared
//! runtime with a bounded timeout.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::RwLock;
use tokio::runtime::Handle;

use crate::config::SensorfwConfig;
use crate::error::{ProxyError, Result};

use super::decode::Sample;
use super::manager::{self, SensorManagerProxy};
use super::plugin::Plugin;
use super::socket::SocketReader;

/// Fixed number of attempts for the initial plugin load.
const LOAD_ATTEMPTS: u32 = 5;
/// Fixed delay between load attempts.
const LOAD_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Timeout applied to every sensorfw bus call.
const CALL_TIMEOUT: Duration = Duration::from_millis(100);
/// Bounded wait for telemetry on each read-loop turn.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Session id used until requestSensor succeeds.
const NO_SESSION_ID: i32 = -1;

/// Shared slot holding the currently registered sample handler.
pub type SharedHandler = Arc<RwLock<Option<Box<dyn Fn(Sample) + Send + Sync>>>>;

async fn bounded<T>(call: impl Future<Output = zbus::Result<T>>) -> Result<T> {
    match tokio::time::timeout(CALL_TIMEOUT, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ProxyError::CallTimeout),
    }
}

/// One live conversation with sensorfw for one plugin.
pub struct Session {
    rt: Handle,
    conn: zbus::Connection,
    plugin: Plugin,
    pid: i64,
    session_id: i32,
    socket: SocketReader,
    running: Arc<AtomicBool>,
    reader: Option<std::thread::JoinHandle<()>>,
    handler: SharedHandler,
}

impl Session {
    /// Establish a session: load the plugin (with retry), request a
    /// session id and connect the telemetry socket.
    ///
    /// Load-retry exhaustion is permanent for the process lifetime and
    /// reported as `BackendUnavailable`. A failed requestSensor is
    /// tolerated; the session id falls back to a sentinel.
    pub fn open(
        rt: Handle,
        conn: zbus::Connection,
        plugin: Plugin,
        config: &SensorfwConfig,
        handler: SharedHandler,
    ) -> Result<Self> {
        let pid = i64::from(std::process::id());
        let manager = rt.block_on(SensorManagerProxy::new(&conn))?;

        let mut loaded = false;
        for attempt in 1..=LOAD_ATTEMPTS {
            match rt.block_on(bounded(manager.load_plugin(plugin.name()))) {
                Ok(true) => {
                    info!("attempt {}: loaded plugin {}", attempt, plugin);
                    loaded = true;
                    break;
                }
                Ok(false) => {
                    warn!("attempt {}: sensorfw refused to load plugin {}", attempt, plugin);
                }
                Err(e) => {
                    warn!("attempt {}: sensorfw not reachable for {}: {}", attempt, plugin, e);
                }
            }
            if attempt < LOAD_ATTEMPTS {
                std::thread::sleep(LOAD_RETRY_DELAY);
            }
        }
        if !loaded {
            warn!("all attempts to load plugin {} failed", plugin);
            return Err(ProxyError::BackendUnavailable(plugin.name()));
        }

        let session_id = match rt.block_on(bounded(manager.request_sensor(plugin.name(), pid))) {
            Ok(id) => {
                info!("got session {} for {} (pid {})", id, plugin, pid);
                id
            }
            Err(e) => {
                warn!("requestSensor failed for {}: {}", plugin, e);
                NO_SESSION_ID
            }
        };

        let socket = SocketReader::connect(Path::new(&config.socket_path), session_id)?;

        Ok(Self {
            rt,
            conn,
            plugin,
            pid,
            session_id,
            socket,
            running: Arc::new(AtomicBool::new(false)),
            reader: None,
            handler,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start delivering samples: spawn the read thread, then ask the
    /// plugin to start streaming. No-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let socket = self.socket.try_clone()?;
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let handler = Arc::clone(&self.handler);
        let plugin = self.plugin;
        match std::thread::Builder::new()
            .name(format!("{}-read", plugin.name()))
            .spawn(move || read_loop(socket, plugin, running, handler))
        {
            Ok(reader) => self.reader = Some(reader),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        }

        // Streaming side effects only matter once the read thread exists.
        if let Err(e) = self.control_call("start") {
            warn!("failed to start {}: {}", self.plugin, e);
        }
        Ok(())
    }

    /// Stop streaming and join the read thread unconditionally.
    ///
    /// After this returns no further handler invocation occurs. No-op
    /// when not running.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        if let Err(e) = self.control_call("stop") {
            warn!("failed to stop {}: {}", self.plugin, e);
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            // Unbounded join: the short poll interval keeps the loop
            // turning, so the cleared flag is seen within one turn.
            if reader.join().is_err() {
                warn!("{} read thread panicked", self.plugin);
            }
        }
    }

    fn control_call(&self, method: &str) -> Result<()> {
        let conn = self.conn.clone();
        let plugin = self.plugin;
        let session_id = self.session_id;
        self.rt.block_on(async move {
            let proxy = manager::plugin_proxy(&conn, plugin).await?;
            bounded(proxy.call_method(method, &(session_id,))).await?;
            Ok(())
        })
    }

    fn release(&self) {
        if self.session_id == NO_SESSION_ID {
            return;
        }
        let conn = self.conn.clone();
        let plugin = self.plugin;
        let session_id = self.session_id;
        let pid = self.pid;
        let released: Result<bool> = self.rt.block_on(async move {
            let manager = SensorManagerProxy::new(&conn).await?;
            bounded(manager.release_sensor(plugin.name(), session_id, pid)).await
        });
        match released {
            Ok(true) => debug!("released session {} for {}", session_id, plugin),
            Ok(false) => warn!("sensorfw refused to release session {} for {}", session_id, plugin),
            Err(e) => warn!("failed to release session {} for {}: {}", session_id, plugin, e),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
        self.release();
        // Dropping the socket closes the telemetry channel.
    }
}

fn read_loop(
    mut socket: SocketReader,
    plugin: Plugin,
    running: Arc<AtomicBool>,
    handler: SharedHandler,
) {
    debug!("{} read loop started", plugin);
    let record_len = plugin.record_len();

    while running.load(Ordering::SeqCst) {
        match socket.wait_ready(POLL_INTERVAL) {
            Ok(true) => match socket.read_frame(record_len) {
                Ok(Some(payload)) => {
                    for record in payload.chunks_exact(record_len) {
                        let sample = plugin.decode(record);
                        if let Some(handler) = handler.read().as_ref() {
                            handler(sample);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("{} telemetry read failed: {}", plugin, e);
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!("{} telemetry socket lost: {}", plugin, e);
                break;
            }
        }
    }
    debug!("{} read loop stopped", plugin);
}
