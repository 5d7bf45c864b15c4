use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// One telemetry frame as pushed by the server.
///
/// Firmware payloads are relayed unchanged, so no field is trusted to carry a
/// particular JSON type. Channels the frame left out (or sent as `null`) are
/// `None`; anything else is kept as sent and rendered as written. Any JSON
/// object decodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<Reading>,
    /// Milliseconds since the epoch, stamped by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Reading>,

    pub t1: Option<Reading>,
    pub t2: Option<Reading>,
    pub t3: Option<Reading>,
    pub p1: Option<Reading>,
    pub p2: Option<Reading>,
    pub flow: Option<Reading>,
    pub heater: Option<Reading>,
    pub pump: Option<Reading>,
    /// Fan speeds, in fan order.
    pub fan: Option<Reading>,
    #[serde(default)]
    pub drain_valve: DrainValve,
    /// Safety controller fault. Numbers from the firmware, short strings from
    /// the simulator and some older sketches.
    pub fault: Option<Reading>,
}

/// A single field of a telemetry frame, exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(pub Value);

impl Reading {
    /// Elements of a list reading joined with `sep`; `null` elements render
    /// empty. `None` when the reading is not a list.
    pub fn join(&self, sep: &str) -> Option<String> {
        let items = self.0.as_array()?;
        let parts: Vec<String> = items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => written(other),
            })
            .collect();
        Some(parts.join(sep))
    }
}

// Strings without quotes, whole numbers without a fraction, the rest as JSON.
fn written(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&written(&self.0))
    }
}

/// Drain valve position. Only the exact numbers 0 and 1 are meaningful;
/// everything else, including a missing field, reads as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrainValve {
    Closed,
    Open,
    #[default]
    Unknown,
}

impl DrainValve {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrainValve::Closed => "closed",
            DrainValve::Open => "open",
            DrainValve::Unknown => "unknown",
        }
    }

    fn from_json(value: &Value) -> Self {
        match value.as_f64() {
            Some(v) if v == 0.0 => DrainValve::Closed,
            Some(v) if v == 1.0 => DrainValve::Open,
            _ => DrainValve::Unknown,
        }
    }
}

impl fmt::Display for DrainValve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DrainValve {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DrainValve::Closed => serializer.serialize_u8(0),
            DrainValve::Open => serializer.serialize_u8(1),
            DrainValve::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for DrainValve {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(DrainValve::from_json(&value))
    }
}
