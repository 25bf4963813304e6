//! Published sensor state.

use strum::Display;

/// The four sensor classes multiplexed by this daemon.
///
/// A fixed, closed set; used as an array index throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorClass {
    Accelerometer,
    AmbientLight,
    Compass,
    Proximity,
}

impl SensorClass {
    pub const ALL: [SensorClass; 4] = [
        SensorClass::Accelerometer,
        SensorClass::AmbientLight,
        SensorClass::Compass,
        SensorClass::Proximity,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable name used in logs.
    pub fn describe(self) -> &'static str {
        match self {
            SensorClass::Accelerometer => "accelerometer",
            SensorClass::AmbientLight => "ambient light sensor",
            SensorClass::Compass => "compass",
            SensorClass::Proximity => "proximity",
        }
    }
}

/// Logical orientation as published on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Undefined,
    Normal,
    BottomUp,
    LeftUp,
    RightUp,
}

/// Unit tag accompanying published light levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LightUnit {
    #[default]
    Lux,
    Vendor,
}

/// Which backends constructed successfully at startup.
///
/// Fixed for the process lifetime; a failed construction is permanent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Availability {
    pub accelerometer: bool,
    pub light: bool,
    pub compass: bool,
    pub proximity: bool,
}

impl Availability {
    pub fn get(self, class: SensorClass) -> bool {
        match class {
            SensorClass::Accelerometer => self.accelerometer,
            SensorClass::AmbientLight => self.light,
            SensorClass::Compass => self.compass,
            SensorClass::Proximity => self.proximity,
        }
    }
}

/// Last published value per class, plus the light smoothing accumulator.
#[derive(Debug, Clone)]
pub struct Readings {
    pub orientation: Orientation,
    pub light_level: f64,
    pub light_accumulator: f64,
    pub light_unit: LightUnit,
    pub heading: f64,
    pub proximity_near: bool,
}

impl Default for Readings {
    fn default() -> Self {
        Self {
            orientation: Orientation::Undefined,
            light_level: 0.0,
            light_accumulator: 0.0,
            light_unit: LightUnit::Lux,
            heading: 0.0,
            proximity_near: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_strings() {
        assert_eq!(Orientation::Undefined.to_string(), "undefined");
        assert_eq!(Orientation::Normal.to_string(), "normal");
        assert_eq!(Orientation::BottomUp.to_string(), "bottom-up");
        assert_eq!(Orientation::LeftUp.to_string(), "left-up");
        assert_eq!(Orientation::RightUp.to_string(), "right-up");
    }

    #[test]
    fn test_light_unit_strings() {
        assert_eq!(LightUnit::Lux.to_string(), "lux");
        assert_eq!(LightUnit::Vendor.to_string(), "vendor");
    }
}
