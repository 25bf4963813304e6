//! Telemetry record decoding.
//!
//! Every plugin streams one fixed little-endian record layout, always
//! starting with a `u64` timestamp the daemon does not use:
//!
//! - orientation: timestamp + `i32` raw orientation code
//! - ambient light: timestamp + `u32` lux value
//! - proximity: timestamp + `u32` reflectance + `u8` within-proximity flag
//! - compass: timestamp + `i32` degrees + `i32` calibration level
//!
//! The compass calibration level is decoded only to keep the frame
//! aligned; it is not published.

use super::plugin::Plugin;

const TIMESTAMP_LEN: usize = 8;

fn le_i32(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Raw physical orientation codes as sensord reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOrientation {
    Undefined,
    LeftUp,
    RightUp,
    BottomDown,
    BottomUp,
    FaceDown,
    FaceUp,
}

impl RawOrientation {
    /// Out-of-range codes decode as Undefined rather than failing.
    fn from_code(code: i32) -> Self {
        match code {
            1 => RawOrientation::LeftUp,
            2 => RawOrientation::RightUp,
            3 => RawOrientation::BottomDown,
            4 => RawOrientation::BottomUp,
            5 => RawOrientation::FaceDown,
            6 => RawOrientation::FaceUp,
            _ => RawOrientation::Undefined,
        }
    }
}

/// One decoded telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Orientation(RawOrientation),
    Light(f64),
    Heading(f64),
    Proximity(bool),
}

impl Plugin {
    /// Byte length of one telemetry record for this plugin.
    pub fn record_len(self) -> usize {
        match self {
            Plugin::Orientation | Plugin::Light => TIMESTAMP_LEN + 4,
            Plugin::Proximity => TIMESTAMP_LEN + 4 + 1,
            Plugin::Compass => TIMESTAMP_LEN + 4 + 4,
        }
    }

    /// Decode one record; `record` must be exactly `record_len` bytes.
    pub fn decode(self, record: &[u8]) -> Sample {
        debug_assert_eq!(record.len(), self.record_len());
        let body = &record[TIMESTAMP_LEN..];
        match self {
            Plugin::Orientation => {
                Sample::Orientation(RawOrientation::from_code(le_i32(body)))
            }
            Plugin::Light => Sample::Light(f64::from(le_u32(body))),
            Plugin::Proximity => Sample::Proximity(body[4] != 0),
            Plugin::Compass => Sample::Heading(f64::from(le_i32(body))),
        }
    }
}
