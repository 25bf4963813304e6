//! Derived-value transforms applied to raw samples.
//!
//! Raw decoded samples are folded into the readings here; only a real
//! change in a published value produces a property mask for the
//! notifier. Orientation is quantized and debounced, ambient light is
//! exponentially smoothed, compass and proximity are plain edge
//! detection.

use log::warn;

use crate::sensorfw::{RawOrientation, Sample};

use super::notify::PropertyMask;
use super::state::{Orientation, Readings, SensorClass};

/// Smoothing factor for the ambient light accumulator.
const LIGHT_ALPHA: f64 = 0.5;

/// One exponential smoothing step.
pub fn smooth(accumulator: f64, sample: f64) -> f64 {
    (1.0 - LIGHT_ALPHA) * accumulator + LIGHT_ALPHA * sample
}

/// Fold one raw sample into the readings.
///
/// Returns the properties whose published value changed, or None when
/// the sample is absorbed without a visible change.
pub fn apply_sample(
    readings: &mut Readings,
    class: SensorClass,
    sample: Sample,
) -> Option<PropertyMask> {
    match (class, sample) {
        (SensorClass::Accelerometer, Sample::Orientation(raw)) => {
            apply_orientation(readings, raw)
        }
        (SensorClass::AmbientLight, Sample::Light(level)) => apply_light(readings, level),
        (SensorClass::Compass, Sample::Heading(heading)) => apply_heading(readings, heading),
        (SensorClass::Proximity, Sample::Proximity(near)) => apply_proximity(readings, near),
        (class, sample) => {
            warn!("dropping {:?} sample delivered for {}", sample, class.describe());
            None
        }
    }
}

fn apply_orientation(readings: &mut Readings, raw: RawOrientation) -> Option<PropertyMask> {
    let mapped = match raw {
        RawOrientation::LeftUp => Orientation::LeftUp,
        RawOrientation::RightUp => Orientation::RightUp,
        RawOrientation::BottomUp => Orientation::BottomUp,
        RawOrientation::BottomDown => Orientation::Normal,
        // Face-up/face-down carries no screen orientation.
        RawOrientation::FaceUp | RawOrientation::FaceDown => readings.orientation,
        RawOrientation::Undefined => Orientation::Undefined,
    };
    if mapped == readings.orientation {
        return None;
    }
    readings.orientation = mapped;
    Some(PropertyMask::ACCELEROMETER_ORIENTATION)
}

fn apply_light(readings: &mut Readings, level: f64) -> Option<PropertyMask> {
    if level == readings.light_level {
        return None;
    }
    readings.light_accumulator = smooth(readings.light_accumulator, level);
    readings.light_level = level;
    Some(PropertyMask::LIGHT_LEVEL)
}

fn apply_heading(readings: &mut Readings, heading: f64) -> Option<PropertyMask> {
    if heading == readings.heading {
        return None;
    }
    readings.heading = heading;
    Some(PropertyMask::COMPASS_HEADING)
}

fn apply_proximity(readings: &mut Readings, near: bool) -> Option<PropertyMask> {
    if near == readings.proximity_near {
        return None;
    }
    readings.proximity_near = near;
    Some(PropertyMask::PROXIMITY_NEAR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orientation(readings: &mut Readings, raw: RawOrientation) -> Option<PropertyMask> {
        apply_sample(readings, SensorClass::Accelerometer, Sample::Orientation(raw))
    }

    #[test]
    fn test_orientation_mapping() {
        let cases = [
            (RawOrientation::LeftUp, Orientation::LeftUp),
            (RawOrientation::RightUp, Orientation::RightUp),
            (RawOrientation::BottomUp, Orientation::BottomUp),
            (RawOrientation::BottomDown, Orientation::Normal),
        ];
        for (raw, expected) in cases {
            let mut readings = Readings::default();
            let mask = orientation(&mut readings, raw);
            assert_eq!(mask, Some(PropertyMask::ACCELEROMETER_ORIENTATION));
            assert_eq!(readings.orientation, expected);
        }
    }

    #[test]
    fn test_face_up_and_face_down_are_discarded() {
        let mut readings = Readings::default();
        orientation(&mut readings, RawOrientation::LeftUp);

        assert_eq!(orientation(&mut readings, RawOrientation::FaceUp), None);
        assert_eq!(orientation(&mut readings, RawOrientation::FaceDown), None);
        assert_eq!(readings.orientation, Orientation::LeftUp);
    }

    #[test]
    fn test_orientation_never_publishes_twice_for_same_state() {
        let mut readings = Readings::default();
        assert!(orientation(&mut readings, RawOrientation::BottomUp).is_some());
        assert_eq!(orientation(&mut readings, RawOrientation::BottomUp), None);
        // A face event in between must not re-arm the edge.
        assert_eq!(orientation(&mut readings, RawOrientation::FaceUp), None);
        assert_eq!(orientation(&mut readings, RawOrientation::BottomUp), None);
    }

    #[test]
    fn test_undefined_code_resets_orientation() {
        let mut readings = Readings::default();
        orientation(&mut readings, RawOrientation::RightUp);
        assert!(orientation(&mut readings, RawOrientation::Undefined).is_some());
        assert_eq!(readings.orientation, Orientation::Undefined);
    }

    #[test]
    fn test_light_publishes_level_and_accumulator_on_change() {
        let mut readings = Readings::default();
        let mask = apply_sample(&mut readings, SensorClass::AmbientLight, Sample::Light(100.0));
        assert_eq!(mask, Some(PropertyMask::LIGHT_LEVEL));
        assert_eq!(readings.light_level, 100.0);
        assert_eq!(readings.light_accumulator, 50.0);

        // Identical raw level: absorbed, accumulator untouched.
        let mask = apply_sample(&mut readings, SensorClass::AmbientLight, Sample::Light(100.0));
        assert_eq!(mask, None);
        assert_eq!(readings.light_accumulator, 50.0);
    }

    #[test]
    fn test_smoothing_converges_with_closed_form() {
        let a0 = 12.5;
        let target = 800.0;
        for n in 1..=10u32 {
            let acc = (0..n).fold(a0, |acc, _| smooth(acc, target));
            let expected = target - (target - a0) / f64::from(2u32.pow(n));
            assert!((acc - expected).abs() < 1e-9, "n = {}", n);
        }
    }

    #[test]
    fn test_heading_publishes_on_change_only() {
        let mut readings = Readings::default();
        let mask = apply_sample(&mut readings, SensorClass::Compass, Sample::Heading(90.0));
        assert_eq!(mask, Some(PropertyMask::COMPASS_HEADING));
        assert_eq!(
            apply_sample(&mut readings, SensorClass::Compass, Sample::Heading(90.0)),
            None
        );
    }

    #[test]
    fn test_proximity_publishes_on_edge_only() {
        let mut readings = Readings::default();
        let mask = apply_sample(&mut readings, SensorClass::Proximity, Sample::Proximity(true));
        assert_eq!(mask, Some(PropertyMask::PROXIMITY_NEAR));
        assert_eq!(
            apply_sample(&mut readings, SensorClass::Proximity, Sample::Proximity(true)),
            None
        );
        assert!(
            apply_sample(&mut readings, SensorClass::Proximity, Sample::Proximity(false))
                .is_some()
        );
    }

    #[test]
    fn test_mismatched_sample_is_dropped() {
        let mut readings = Readings::default();
        let mask = apply_sample(&mut readings, SensorClass::Compass, Sample::Light(1.0));
        assert_eq!(mask, None);
        assert_eq!(readings.light_level, 0.0);
    }
}
