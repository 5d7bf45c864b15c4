// frontend/src/live_session/command_dispatcher.rs

use crate::error::Result;
use crate::transport::{Reply, RigTransport, routes};
use labstand_shared::{
    ActuatorBody, DrainValveBody, HeaterManualBody, HeaterRandomBody, Level,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// Form defaults, used when a field is empty or not a number.
pub const DEFAULT_POWER: f64 = 0.0;
pub const DEFAULT_RANDOM_MIN: f64 = 0.0;
pub const DEFAULT_RANDOM_MAX: f64 = 100.0;
pub const DEFAULT_ON_MIN_S: f64 = 2.0;
pub const DEFAULT_ON_MAX_S: f64 = 10.0;
pub const DEFAULT_OFF_MIN_S: f64 = 2.0;
pub const DEFAULT_OFF_MAX_S: f64 = 10.0;
pub const DEFAULT_PUMP: f64 = 0.0;
pub const DEFAULT_FAN: f64 = 0.0;

/// Turns a form field into a number: trimmed, parsed, and replaced by
/// `default` when empty, unparsable or non-finite.
pub fn coerce(input: &str, default: f64) -> Level {
    let t = input.trim();
    if t.is_empty() {
        return Level(default);
    }
    match t.parse::<f64>() {
        Ok(v) if v.is_finite() => Level(v),
        _ => Level(default),
    }
}

/// Which route family an actuator command goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Teacher,
    Student,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandRequest {
    HeaterManual(HeaterManualBody),
    HeaterRandom(HeaterRandomBody),
    HeaterStop,
    DrainValve(DrainValveBody),
    Actuators {
        authority: Authority,
        body: ActuatorBody,
    },
}

impl CommandRequest {
    pub fn route(&self) -> &'static str {
        match self {
            CommandRequest::HeaterManual(_) => routes::HEATER_MANUAL,
            CommandRequest::HeaterRandom(_) => routes::HEATER_RANDOM,
            CommandRequest::HeaterStop => routes::HEATER_STOP,
            CommandRequest::DrainValve(_) => routes::DRAIN_VALVE,
            CommandRequest::Actuators {
                authority: Authority::Teacher,
                ..
            } => routes::TEACHER_ACTUATORS,
            CommandRequest::Actuators {
                authority: Authority::Student,
                ..
            } => routes::STUDENT_ACTUATORS,
        }
    }

    pub fn body(&self) -> Result<Value> {
        let v = match self {
            CommandRequest::HeaterManual(b) => serde_json::to_value(b)?,
            CommandRequest::HeaterRandom(b) => serde_json::to_value(b)?,
            CommandRequest::HeaterStop => Value::Object(Default::default()),
            CommandRequest::DrainValve(b) => serde_json::to_value(b)?,
            CommandRequest::Actuators { body, .. } => serde_json::to_value(body)?,
        };
        Ok(v)
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandRequest::HeaterManual(b) => write!(f, "heater manual power={}", b.power),
            CommandRequest::HeaterRandom(b) => write!(
                f,
                "heater random {}..{} on {}..{}s off {}..{}s",
                b.min, b.max, b.on_min_s, b.on_max_s, b.off_min_s, b.off_max_s
            ),
            CommandRequest::HeaterStop => f.write_str("heater stop"),
            CommandRequest::DrainValve(b) => {
                write!(f, "drain valve {}", if b.open { "open" } else { "close" })
            }
            CommandRequest::Actuators { authority, body } => {
                let who = match authority {
                    Authority::Teacher => "teacher",
                    Authority::Student => "student",
                };
                write!(
                    f,
                    "{who} actuators pump={} fan={},{},{}",
                    body.pump, body.fan[0], body.fan[1], body.fan[2]
                )
            }
        }
    }
}

// ---------- Forms ----------
// Raw field text as the operator entered it.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaterManualForm {
    pub power: String,
}

impl HeaterManualForm {
    pub fn to_request(&self) -> CommandRequest {
        CommandRequest::HeaterManual(HeaterManualBody {
            power: coerce(&self.power, DEFAULT_POWER),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaterRandomForm {
    pub min: String,
    pub max: String,
    pub on_min_s: String,
    pub on_max_s: String,
    pub off_min_s: String,
    pub off_max_s: String,
}

impl HeaterRandomForm {
    pub fn to_request(&self) -> CommandRequest {
        CommandRequest::HeaterRandom(HeaterRandomBody {
            min: coerce(&self.min, DEFAULT_RANDOM_MIN),
            max: coerce(&self.max, DEFAULT_RANDOM_MAX),
            on_min_s: coerce(&self.on_min_s, DEFAULT_ON_MIN_S),
            on_max_s: coerce(&self.on_max_s, DEFAULT_ON_MAX_S),
            off_min_s: coerce(&self.off_min_s, DEFAULT_OFF_MIN_S),
            off_max_s: coerce(&self.off_max_s, DEFAULT_OFF_MAX_S),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActuatorForm {
    pub pump: String,
    pub fan: [String; 3],
}

impl ActuatorForm {
    pub fn to_request(&self, authority: Authority) -> CommandRequest {
        CommandRequest::Actuators {
            authority,
            body: ActuatorBody {
                pump: coerce(&self.pump, DEFAULT_PUMP),
                fan: [
                    coerce(&self.fan[0], DEFAULT_FAN),
                    coerce(&self.fan[1], DEFAULT_FAN),
                    coerce(&self.fan[2], DEFAULT_FAN),
                ],
            },
        }
    }
}

// ---------- Dispatch ----------

/// Sends one command and hands back whatever the server said.
///
/// No retries and no deduplication: every call is one POST. A non-2xx reply
/// is still `Ok`; only transport failures are errors.
pub struct CommandDispatcher<T> {
    transport: Arc<T>,
}

impl<T> Clone for CommandDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: RigTransport> CommandDispatcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, request: &CommandRequest) -> Result<Reply> {
        let body = request.body()?;
        tracing::info!("command: {request}");
        let reply = self.transport.post_json(request.route(), body).await?;
        if !reply.is_success() {
            tracing::warn!(
                status = reply.status,
                "command {} rejected: {}",
                request.route(),
                reply.display()
            );
        }
        Ok(reply)
    }
}
