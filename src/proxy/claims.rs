//! Per-class client claims with liveness tracking.
//!
//! A claim lives exactly as long as the client wants it or stays on the
//! bus, whichever ends first. Each genuinely new claim installs a watch
//! on the claiming peer; the watch reports once when the peer vanishes.

use std::collections::HashMap;
use std::future::Future;

use futures_util::StreamExt;
use log::{debug, warn};
use tokio::task::JoinHandle;
use zbus::fdo::DBusProxy;

/// Follows one claiming peer on the bus and reports when it vanishes.
///
/// Dropping the watch cancels the subscription.
pub struct PeerWatch {
    task: Option<JoinHandle<()>>,
}

impl PeerWatch {
    /// Watch `name` on `conn`; `on_vanish` runs once when the peer
    /// drops off the bus.
    pub fn spawn<F, Fut>(conn: zbus::Connection, name: String, on_vanish: F) -> Self
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            match wait_for_vanish(&conn, &name).await {
                Ok(()) => on_vanish(name).await,
                Err(e) => warn!("failed to watch {}: {}", name, e),
            }
        });
        Self { task: Some(task) }
    }

    /// A watch that never fires; used by tests.
    pub fn disconnected() -> Self {
        Self { task: None }
    }
}

impl Drop for PeerWatch {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn wait_for_vanish(conn: &zbus::Connection, name: &str) -> zbus::Result<()> {
    let dbus = DBusProxy::new(conn).await?;
    let mut stream = dbus
        .receive_name_owner_changed_with_args(&[(0, name)])
        .await?;
    while let Some(signal) = stream.next().await {
        let args = signal.args()?;
        if args.new_owner().is_none() {
            debug!("client {} vanished from the bus", name);
            return Ok(());
        }
    }
    Ok(())
}

/// Clients currently holding a claim on one sensor class.
#[derive(Default)]
pub struct ClaimRegistry {
    clients: HashMap<String, PeerWatch>,
}

impl ClaimRegistry {
    /// Record a claim. Returns true when `client` already held one; the
    /// watch is only built for a genuinely new claim.
    pub fn claim(&mut self, client: &str, make_watch: impl FnOnce() -> PeerWatch) -> bool {
        if self.clients.contains_key(client) {
            return true;
        }
        self.clients.insert(client.to_owned(), make_watch());
        false
    }

    /// Drop a claim. Returns true when `client` actually held one.
    pub fn release(&mut self, client: &str) -> bool {
        self.clients.remove(client).is_some()
    }

    pub fn contains(&self, client: &str) -> bool {
        self.clients.contains_key(client)
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Bus names of every current claimer.
    pub fn clients(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }
}
