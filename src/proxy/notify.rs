//! Minimal per-client change notification.
//!
//! Changes are described as a bitmask over the published attributes.
//! Each interested client gets exactly one PropertiesChanged signal per
//! publish, carrying only the slice of the mask it has claimed; empty
//! slices are suppressed entirely.

use std::collections::HashMap;

use async_trait::async_trait;
use bitflags::bitflags;
use zbus::zvariant::Value;

use crate::error::Result;

use super::state::{Availability, Readings, SensorClass};

/// Object path of the main sensor interface.
pub const SENSOR_PROXY_PATH: &str = "/net/hadess/SensorProxy";
/// Object path of the compass interface.
pub const COMPASS_PATH: &str = "/net/hadess/SensorProxy/Compass";
/// Main sensor interface name (also the well-known bus name).
pub const SENSOR_PROXY_IFACE: &str = "net.hadess.SensorProxy";
/// Compass interface name.
pub const COMPASS_IFACE: &str = "net.hadess.SensorProxy.Compass";

bitflags! {
    /// Published attributes, one Has/value pair per sensor class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyMask: u32 {
        const HAS_ACCELEROMETER = 1 << 0;
        const ACCELEROMETER_ORIENTATION = 1 << 1;
        const HAS_AMBIENT_LIGHT = 1 << 2;
        const LIGHT_LEVEL = 1 << 3;
        const HAS_COMPASS = 1 << 4;
        const COMPASS_HEADING = 1 << 5;
        const HAS_PROXIMITY = 1 << 6;
        const PROXIMITY_NEAR = 1 << 7;

        /// Attributes living on the main sensor interface.
        const SENSOR_GROUP = Self::HAS_ACCELEROMETER.bits()
            | Self::ACCELEROMETER_ORIENTATION.bits()
            | Self::HAS_AMBIENT_LIGHT.bits()
            | Self::LIGHT_LEVEL.bits()
            | Self::HAS_PROXIMITY.bits()
            | Self::PROXIMITY_NEAR.bits();
        /// Attributes living on the compass interface.
        const COMPASS_GROUP = Self::HAS_COMPASS.bits() | Self::COMPASS_HEADING.bits();
    }
}

impl PropertyMask {
    /// Both attributes owned by one sensor class.
    pub fn for_class(class: SensorClass) -> PropertyMask {
        Self::has_bit(class) | Self::value_bit(class)
    }

    /// The availability attribute of one class.
    pub fn has_bit(class: SensorClass) -> PropertyMask {
        match class {
            SensorClass::Accelerometer => PropertyMask::HAS_ACCELEROMETER,
            SensorClass::AmbientLight => PropertyMask::HAS_AMBIENT_LIGHT,
            SensorClass::Compass => PropertyMask::HAS_COMPASS,
            SensorClass::Proximity => PropertyMask::HAS_PROXIMITY,
        }
    }

    /// The value attribute of one class.
    pub fn value_bit(class: SensorClass) -> PropertyMask {
        match class {
            SensorClass::Accelerometer => PropertyMask::ACCELEROMETER_ORIENTATION,
            SensorClass::AmbientLight => PropertyMask::LIGHT_LEVEL,
            SensorClass::Compass => PropertyMask::COMPASS_HEADING,
            SensorClass::Proximity => PropertyMask::PROXIMITY_NEAR,
        }
    }
}

/// The two disjoint interface groups sharing this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceGroup {
    Sensors,
    Compass,
}

/// Where per-client PropertiesChanged signals go.
///
/// The daemon core only knows this seam; production wires the serving
/// bus connection behind it, tests record the calls.
#[async_trait]
pub trait SignalEmitter: Send + Sync {
    async fn properties_changed(
        &self,
        destination: &str,
        group: InterfaceGroup,
        properties: HashMap<&'static str, Value<'static>>,
    ) -> Result<()>;
}

/// Compute each interested client's visible slice of `mask`.
///
/// `interests` maps each class to the clients currently claiming it;
/// clients whose slice comes out empty are dropped.
pub fn per_client_masks(
    mask: PropertyMask,
    interests: &[(SensorClass, Vec<String>)],
) -> HashMap<String, PropertyMask> {
    let mut out: HashMap<String, PropertyMask> = HashMap::new();
    for (class, clients) in interests {
        let class_mask = mask & PropertyMask::for_class(*class);
        if class_mask.is_empty() {
            continue;
        }
        for client in clients {
            *out.entry(client.clone()).or_insert(PropertyMask::empty()) |= class_mask;
        }
    }
    out
}

/// Render the property map for one client's mask.
///
/// Announcing an available class forces its value attribute in, so
/// discovery always carries an initial reading.
pub fn build_properties(
    mask: PropertyMask,
    availability: Availability,
    readings: &Readings,
) -> HashMap<&'static str, Value<'static>> {
    let mut mask = mask;
    let mut props: HashMap<&'static str, Value<'static>> = HashMap::new();

    if mask.contains(PropertyMask::HAS_ACCELEROMETER) {
        let has = availability.accelerometer;
        props.insert("HasAccelerometer", Value::from(has));
        if has {
            mask |= PropertyMask::ACCELEROMETER_ORIENTATION;
        }
    }
    if mask.contains(PropertyMask::ACCELEROMETER_ORIENTATION) {
        props.insert(
            "AccelerometerOrientation",
            Value::from(readings.orientation.to_string()),
        );
    }

    if mask.contains(PropertyMask::HAS_AMBIENT_LIGHT) {
        let has = availability.light;
        props.insert("HasAmbientLight", Value::from(has));
        if has {
            mask |= PropertyMask::LIGHT_LEVEL;
        }
    }
    if mask.contains(PropertyMask::LIGHT_LEVEL) {
        props.insert("LightLevelUnit", Value::from(readings.light_unit.to_string()));
        props.insert("LightLevel", Value::from(readings.light_level));
        props.insert(
            "LightLevelAccumulator",
            Value::from(readings.light_accumulator),
        );
    }

    if mask.contains(PropertyMask::HAS_COMPASS) {
        let has = availability.compass;
        props.insert("HasCompass", Value::from(has));
        if has {
            mask |= PropertyMask::COMPASS_HEADING;
        }
    }
    if mask.contains(PropertyMask::COMPASS_HEADING) {
        props.insert("CompassHeading", Value::from(readings.heading));
    }

    if mask.contains(PropertyMask::HAS_PROXIMITY) {
        let has = availability.proximity;
        props.insert("HasProximity", Value::from(has));
        if has {
            mask |= PropertyMask::PROXIMITY_NEAR;
        }
    }
    if mask.contains(PropertyMask::PROXIMITY_NEAR) {
        props.insert("ProximityNear", Value::from(readings.proximity_near));
    }

    props
}

/// Sends unicast PropertiesChanged signals over the serving connection.
pub struct BusEmitter {
    conn: zbus::Connection,
}

impl BusEmitter {
    pub fn new(conn: zbus::Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SignalEmitter for BusEmitter {
    async fn properties_changed(
        &self,
        destination: &str,
        group: InterfaceGroup,
        properties: HashMap<&'static str, Value<'static>>,
    ) -> Result<()> {
        let (path, interface) = match group {
            InterfaceGroup::Sensors => (SENSOR_PROXY_PATH, SENSOR_PROXY_IFACE),
            InterfaceGroup::Compass => (COMPASS_PATH, COMPASS_IFACE),
        };
        let msg = zbus::MessageBuilder::signal(
            path,
            "org.freedesktop.DBus.Properties",
            "PropertiesChanged",
        )?
        .destination(destination)?
        .build(&(interface, properties, Vec::<&str>::new()))?;
        self.conn.send_message(msg).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::state::Orientation;

    #[test]
    fn test_groups_are_disjoint_and_cover_everything() {
        assert!((PropertyMask::SENSOR_GROUP & PropertyMask::COMPASS_GROUP).is_empty());
        assert_eq!(
            PropertyMask::SENSOR_GROUP | PropertyMask::COMPASS_GROUP,
            PropertyMask::all()
        );
    }

    #[test]
    fn test_per_client_masks_slices_by_claimed_class() {
        let interests = vec![
            (SensorClass::Proximity, vec![":1.1".to_string()]),
            (SensorClass::AmbientLight, vec![":1.2".to_string()]),
        ];

        let out = per_client_masks(PropertyMask::LIGHT_LEVEL, &interests);
        assert_eq!(out.len(), 1);
        assert_eq!(out[":1.2"], PropertyMask::LIGHT_LEVEL);
    }

    #[test]
    fn test_per_client_masks_unions_across_classes() {
        let interests = vec![
            (SensorClass::Proximity, vec![":1.1".to_string()]),
            (SensorClass::AmbientLight, vec![":1.1".to_string()]),
        ];

        let mask = PropertyMask::HAS_PROXIMITY | PropertyMask::HAS_AMBIENT_LIGHT;
        let out = per_client_masks(mask, &interests);
        assert_eq!(out[":1.1"], mask);
    }

    #[test]
    fn test_per_client_masks_suppresses_uninterested_clients() {
        let interests = vec![(SensorClass::Proximity, vec![":1.1".to_string()])];
        let out = per_client_masks(PropertyMask::COMPASS_HEADING, &interests);
        assert!(out.is_empty());
    }

    #[test]
    fn test_announcing_available_class_forces_value_in() {
        let availability = Availability {
            proximity: true,
            ..Default::default()
        };
        let mut readings = Readings::default();
        readings.proximity_near = true;

        let props = build_properties(PropertyMask::HAS_PROXIMITY, availability, &readings);
        assert_eq!(props["HasProximity"], Value::from(true));
        assert_eq!(props["ProximityNear"], Value::from(true));
    }

    #[test]
    fn test_announcing_unavailable_class_omits_value() {
        let props = build_properties(
            PropertyMask::HAS_ACCELEROMETER,
            Availability::default(),
            &Readings::default(),
        );
        assert_eq!(props["HasAccelerometer"], Value::from(false));
        assert!(!props.contains_key("AccelerometerOrientation"));
    }

    #[test]
    fn test_light_level_travels_with_unit_and_accumulator() {
        let mut readings = Readings::default();
        readings.light_level = 120.0;
        readings.light_accumulator = 60.0;

        let props = build_properties(
            PropertyMask::LIGHT_LEVEL,
            Availability::default(),
            &readings,
        );
        assert_eq!(props["LightLevel"], Value::from(120.0));
        assert_eq!(props["LightLevelAccumulator"], Value::from(60.0));
        assert_eq!(props["LightLevelUnit"], Value::from("lux".to_string()));
    }

    #[test]
    fn test_orientation_renders_as_string() {
        let mut readings = Readings::default();
        readings.orientation = Orientation::BottomUp;

        let props = build_properties(
            PropertyMask::ACCELEROMETER_ORIENTATION,
            Availability::default(),
            &readings,
        );
        assert_eq!(
            props["AccelerometerOrientation"],
            Value::from("bottom-up".to_string())
        );
    }
}
