//! Daemon core: claims, published state and notification fan-out.
//!
//! The core is an explicit, constructed object. Everything it talks to
//! (the backends, the signal emitter) is injected, so tests run many
//! independent instances with fakes.

pub mod claims;
pub mod notify;
pub mod service;
pub mod state;
pub mod transform;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::sensorfw::{Sample, SensorBackend};

use self::claims::{ClaimRegistry, PeerWatch};
use self::notify::{
    InterfaceGroup, PropertyMask, SignalEmitter, build_properties, per_client_masks,
};
use self::state::{Availability, Readings, SensorClass};

/// One sensor class as the core tracks it.
///
/// `backend` is None when construction failed at startup; the class is
/// then permanently unavailable, but claims are still accepted.
struct ClassSlot {
    class: SensorClass,
    backend: Option<Arc<dyn SensorBackend>>,
    claims: Mutex<ClaimRegistry>,
}

/// The daemon core.
///
/// Claim/release for one class is serialized by that class's mutex;
/// different classes are fully independent. Readings are only written
/// by the sample path and read by property getters and the notifier.
pub struct SensorProxyCore {
    emitter: Arc<dyn SignalEmitter>,
    slots: [ClassSlot; 4],
    readings: RwLock<Readings>,
}

impl SensorProxyCore {
    pub fn new(
        emitter: Arc<dyn SignalEmitter>,
        mut backends: HashMap<SensorClass, Arc<dyn SensorBackend>>,
    ) -> Self {
        let slots = SensorClass::ALL.map(|class| ClassSlot {
            class,
            backend: backends.remove(&class),
            claims: Mutex::new(ClaimRegistry::default()),
        });
        Self {
            emitter,
            slots,
            readings: RwLock::new(Readings::default()),
        }
    }

    fn slot(&self, class: SensorClass) -> &ClassSlot {
        &self.slots[class.index()]
    }

    /// Availability is fixed at construction: a class is available iff
    /// its backend came up.
    pub fn available(&self, class: SensorClass) -> bool {
        self.slot(class).backend.is_some()
    }

    fn availability(&self) -> Availability {
        Availability {
            accelerometer: self.available(SensorClass::Accelerometer),
            light: self.available(SensorClass::AmbientLight),
            compass: self.available(SensorClass::Compass),
            proximity: self.available(SensorClass::Proximity),
        }
    }

    /// Snapshot of the published values.
    pub fn readings(&self) -> Readings {
        self.readings.read().clone()
    }

    /// Record a claim for `client`. Returns true when it already held one.
    ///
    /// The first claim on a class turns the backend on before the call
    /// returns. Enable failures are logged and the claim stands: claims
    /// are accepted independent of backend availability.
    pub async fn claim(
        &self,
        class: SensorClass,
        client: &str,
        make_watch: impl FnOnce() -> PeerWatch,
    ) -> bool {
        let slot = self.slot(class);
        let mut claims = slot.claims.lock().await;
        if claims.contains(client) {
            debug!("{} already claimed by {}", class.describe(), client);
            return true;
        }

        if claims.is_empty() {
            self.enable_backend(slot).await;
        }
        claims.claim(client, make_watch);
        info!(
            "{} claimed by {} ({} client(s))",
            class.describe(),
            client,
            claims.count()
        );
        false
    }

    /// Drop `client`'s claim; the last release turns the backend off.
    pub async fn release(&self, class: SensorClass, client: &str) {
        let slot = self.slot(class);
        let mut claims = slot.claims.lock().await;
        if !claims.release(client) {
            return;
        }
        info!(
            "{} released by {} ({} client(s) left)",
            class.describe(),
            client,
            claims.count()
        );
        if claims.is_empty() {
            self.disable_backend(slot).await;
        }
    }

    /// Implicit release across every class; safe for peers that never
    /// claimed anything.
    pub async fn peer_vanished(&self, client: &str) {
        for class in SensorClass::ALL {
            self.release(class, client).await;
        }
    }

    async fn enable_backend(&self, slot: &ClassSlot) {
        let Some(backend) = &slot.backend else {
            debug!(
                "no backend for {}, claim recorded without enabling",
                slot.class.describe()
            );
            return;
        };
        debug!("enabling {}", slot.class.describe());
        if let Err(e) = backend.enable().await {
            warn!("failed to enable {}: {}", slot.class.describe(), e);
        }
    }

    async fn disable_backend(&self, slot: &ClassSlot) {
        let Some(backend) = &slot.backend else {
            return;
        };
        debug!("disabling {}", slot.class.describe());
        if let Err(e) = backend.disable().await {
            warn!("failed to disable {}: {}", slot.class.describe(), e);
        }
    }

    /// Fold one decoded sample into the readings and notify claimers.
    pub async fn handle_sample(&self, class: SensorClass, sample: Sample) {
        let mask = {
            let mut readings = self.readings.write();
            transform::apply_sample(&mut readings, class, sample)
        };
        if let Some(mask) = mask {
            self.publish(mask).await;
        }
    }

    /// Startup availability announcement for every class that came up.
    pub async fn announce_available(&self) {
        for class in SensorClass::ALL {
            if self.available(class) {
                self.publish(PropertyMask::has_bit(class)).await;
            }
        }
    }

    /// Fan `mask` out: one signal per interested client, empty slices
    /// suppressed. A mask spanning both interface groups is a
    /// programming error.
    pub async fn publish(&self, mask: PropertyMask) {
        assert!(!mask.is_empty(), "publishing an empty change mask");
        assert!(
            (mask & PropertyMask::SENSOR_GROUP).is_empty()
                || (mask & PropertyMask::COMPASS_GROUP).is_empty(),
            "change mask spans both interface groups"
        );

        let mut interests = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let claims = slot.claims.lock().await;
            interests.push((
                slot.class,
                claims.clients().map(str::to_owned).collect::<Vec<_>>(),
            ));
        }

        let targets = per_client_masks(mask, &interests);
        if targets.is_empty() {
            return;
        }

        let availability = self.availability();
        let readings = self.readings();
        let group = if (mask & PropertyMask::COMPASS_GROUP).is_empty() {
            InterfaceGroup::Sensors
        } else {
            InterfaceGroup::Compass
        };

        for (client, client_mask) in targets {
            let properties = build_properties(client_mask, availability, &readings);
            if let Err(e) = self.emitter.properties_changed(&client, group, properties).await {
                warn!("failed to notify {}: {}", client, e);
            }
        }
    }

    /// Turn every backend off (daemon shutdown). Disabling an already
    /// stopped backend is a no-op at the session level.
    pub async fn shutdown(&self) {
        for slot in &self.slots {
            self.disable_backend(slot).await;
        }
    }
}
