use labstand_shared::{Reading, TelemetrySample};
use serde_json::Value;

/// Placeholder for a channel the frame did not carry.
pub const MISSING: &str = "n/a";

/// Display strings for one telemetry frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryView {
    pub t1: String,
    pub t2: String,
    pub t3: String,
    pub p1: String,
    pub p2: String,
    pub flow: String,
    pub heater: String,
    pub pump: String,
    pub fan: String,
    pub drain_valve: String,
    pub fault: String,
}

fn shown(v: &Option<Reading>) -> String {
    v.as_ref()
        .map(Reading::to_string)
        .unwrap_or_else(|| MISSING.to_string())
}

impl TelemetryView {
    pub fn from_sample(s: &TelemetrySample) -> Self {
        Self {
            t1: shown(&s.t1),
            t2: shown(&s.t2),
            t3: shown(&s.t3),
            p1: shown(&s.p1),
            p2: shown(&s.p2),
            flow: shown(&s.flow),
            heater: shown(&s.heater),
            pump: shown(&s.pump),
            // anything but a list has no fan rendering
            fan: s
                .fan
                .as_ref()
                .and_then(|f| f.join(", "))
                .unwrap_or_else(|| MISSING.to_string()),
            drain_valve: s.drain_valve.as_str().to_string(),
            fault: shown(&s.fault),
        }
    }

    /// Label/value pairs in display order.
    pub fn fields(&self) -> [(&'static str, &str); 11] {
        [
            ("t1", self.t1.as_str()),
            ("t2", self.t2.as_str()),
            ("t3", self.t3.as_str()),
            ("p1", self.p1.as_str()),
            ("p2", self.p2.as_str()),
            ("flow", self.flow.as_str()),
            ("heater", self.heater.as_str()),
            ("pump", self.pump.as_str()),
            ("fan", self.fan.as_str()),
            ("drain_valve", self.drain_valve.as_str()),
            ("fault", self.fault.as_str()),
        ]
    }
}

/// The full frame, indented, keys in the order received.
pub fn pretty_document(document: &Value) -> String {
    serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string())
}
