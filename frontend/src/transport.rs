//! HTTP side of the rig server: the [`RigTransport`] seam and its reqwest
//! implementation.

use crate::config::BaseUrl;
use crate::error::Result;
use serde_json::Value;
use std::future::Future;

/// Server routes used by the client.
pub mod routes {
    pub const TELEMETRY_WS: &str = "/ws/telemetry";
    pub const MODE: &str = "/api/teacher/student_mode";
    pub const HEATER_MANUAL: &str = "/api/teacher/heater/manual";
    pub const HEATER_RANDOM: &str = "/api/teacher/heater/random";
    pub const HEATER_STOP: &str = "/api/teacher/heater/stop";
    pub const DRAIN_VALVE: &str = "/api/teacher/drain_valve";
    pub const TEACHER_ACTUATORS: &str = "/api/teacher/actuators";
    pub const STUDENT_ACTUATORS: &str = "/api/student/actuators";
    pub const FIRMWARE_UPLOAD: &str = "/api/student/firmware/upload";
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Json(Value),
    /// Anything that did not decode as JSON, kept as received.
    Text(String),
}

/// A server response, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: ReplyBody,
}

impl Reply {
    pub fn from_text(status: u16, text: String) -> Self {
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(v) => ReplyBody::Json(v),
            Err(_) => ReplyBody::Text(text),
        };
        Self { status, body }
    }

    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            body: ReplyBody::Json(value),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as it should be shown: pretty JSON, or the raw text.
    pub fn display(&self) -> String {
        match &self.body {
            ReplyBody::Json(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
            ReplyBody::Text(t) => t.clone(),
        }
    }
}

/// Multipart form for the firmware upload route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    pub file_field: &'static str,
    pub file_name: String,
    pub file_bytes: Vec<u8>,
    /// Text fields, in the order they are appended.
    pub fields: Vec<(&'static str, String)>,
}

impl MultipartBody {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Request/response access to the rig server.
///
/// Non-2xx statuses are not errors here; they come back as a [`Reply`] and the
/// caller decides. Errors are transport failures only.
pub trait RigTransport: Send + Sync + 'static {
    fn get(&self, path: &'static str) -> impl Future<Output = Result<Reply>> + Send;

    fn post_json(&self, path: &'static str, body: Value) -> impl Future<Output = Result<Reply>> + Send;

    fn post_multipart(
        &self,
        path: &'static str,
        body: MultipartBody,
    ) -> impl Future<Output = Result<Reply>> + Send;
}

// ---------- reqwest ----------

pub struct HttpTransport {
    client: reqwest::Client,
    base: BaseUrl,
}

impl HttpTransport {
    pub fn new(base: BaseUrl) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, base })
    }
}

async fn read_reply(resp: reqwest::Response) -> Result<Reply> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    Ok(Reply::from_text(status, text))
}

impl RigTransport for HttpTransport {
    async fn get(&self, path: &'static str) -> Result<Reply> {
        let url = self.base.http(path);
        tracing::debug!(%url, "GET");
        let resp = self.client.get(url).send().await?;
        read_reply(resp).await
    }

    async fn post_json(&self, path: &'static str, body: Value) -> Result<Reply> {
        let url = self.base.http(path);
        tracing::debug!(%url, %body, "POST");
        let resp = self.client.post(url).json(&body).send().await?;
        read_reply(resp).await
    }

    async fn post_multipart(&self, path: &'static str, body: MultipartBody) -> Result<Reply> {
        let url = self.base.http(path);
        tracing::debug!(
            %url,
            file = %body.file_name,
            bytes = body.file_bytes.len(),
            "POST multipart"
        );

        let part = reqwest::multipart::Part::bytes(body.file_bytes)
            .file_name(body.file_name)
            .mime_str("application/octet-stream")?;
        let mut form = reqwest::multipart::Form::new().part(body.file_field, part);
        for (name, value) in body.fields {
            form = form.text(name, value);
        }

        let resp = self.client.post(url).multipart(form).send().await?;
        read_reply(resp).await
    }
}
