//! Operator client for the lab stand: live telemetry, control-mode gating,
//! actuator commands and student firmware uploads against one rig server.

pub mod config;
pub mod console;
pub mod error;
pub mod live_session;
pub mod persist;
pub mod terminal;
pub mod transport;

pub use config::{BaseUrl, ClientConfig, ReconnectPolicy};
pub use error::{ClientError, Result};
pub use live_session::{Presenter, SessionController, SessionEvent, SessionHandle, UserIntent};
pub use transport::{HttpTransport, Reply, ReplyBody, RigTransport};
