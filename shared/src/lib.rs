//! Wire types exchanged with the lab stand server.
//!
//! Everything here mirrors the JSON the server speaks: telemetry frames pushed
//! over `/ws/telemetry`, the student-mode endpoints, the command bodies and the
//! compile/flash report returned by firmware uploads.

mod flash;
mod mode;
mod telemetry;

pub use flash::{FlashReport, StreamOutput};
pub use mode::{ControlMode, ModeReply, ModeRequest, ParseModeError};
pub use telemetry::{DrainValve, Reading, TelemetrySample};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A numeric command field.
///
/// The server validates these as integers, so whole values go out as JSON
/// integers (`40`, not `40.0`). Fractional values are passed through and left
/// for the server to reject.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Level(pub f64);

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 2^53: beyond this an f64 no longer maps onto a unique integer
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = self.0;
        if v.fract() == 0.0 && v.abs() <= MAX_EXACT_INT {
            serializer.serialize_i64(v as i64)
        } else {
            serializer.serialize_f64(v)
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Level)
    }
}

/// `POST /api/teacher/heater/manual`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaterManualBody {
    pub power: Level,
}

/// `POST /api/teacher/heater/random`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaterRandomBody {
    pub min: Level,
    pub max: Level,
    pub on_min_s: Level,
    pub on_max_s: Level,
    pub off_min_s: Level,
    pub off_max_s: Level,
}

/// `POST /api/teacher/drain_valve`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainValveBody {
    pub open: bool,
}

/// `POST /api/{teacher,student}/actuators`. Same shape on both routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorBody {
    pub pump: Level,
    pub fan: [Level; 3],
}
