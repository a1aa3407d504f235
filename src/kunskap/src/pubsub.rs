//! Pub/Sub push envelopes.
//!
//! A push subscription POSTs one JSON envelope per message:
//!
//! ```json
//! {
//!   "message": {
//!     "data": "eyJ0cmlnZ2VyIjoiY3JvbiJ9",
//!     "attributes": { "origin": "scheduler" },
//!     "messageId": "2070443601311540",
//!     "publishTime": "2021-02-26T19:13:55.749Z"
//!   },
//!   "subscription": "projects/acme/subscriptions/kunskap-push"
//! }
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::handler::{EventContext, TriggerEvent};

/// Event type reported for push deliveries.
pub const PUBSUB_EVENT_TYPE: &str = "google.pubsub.topic.publish";

/// Body of a push request.
#[derive(Clone, Debug, Deserialize)]
pub struct PushEnvelope {
    /// The delivered message.
    pub message: PubSubMessage,
    /// Full subscription name.
    #[serde(default)]
    pub subscription: Option<String>,
}

/// One Pub/Sub message.
///
/// Only `message` itself is required of an envelope. Metadata is taken as
/// loosely as JSON allows: attributes may be null or hold non-string values,
/// and a publish time that is not RFC 3339 is dropped with a warning.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    /// Base64-encoded payload.
    #[serde(default)]
    pub data: Option<String>,
    /// Message attributes.
    #[serde(default)]
    pub attributes: Option<IndexMap<String, Value>>,
    /// Server-assigned id.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Server-assigned publish time, as sent.
    #[serde(default)]
    pub publish_time: Option<String>,
}

impl PubSubMessage {
    /// Decoded payload. Data that is not valid base64 is passed through as
    /// raw bytes; the payload is opaque to the pipeline either way.
    pub fn decoded_data(&self) -> Vec<u8> {
        let Some(data) = self.data.as_deref() else {
            return Vec::new();
        };
        match STANDARD.decode(data) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    message_id = self.message_id.as_deref(),
                    %err,
                    "message data is not base64; keeping it raw"
                );
                data.as_bytes().to_vec()
            }
        }
    }

    /// Attributes as strings. Non-string JSON values keep their JSON text.
    pub fn string_attributes(&self) -> IndexMap<String, String> {
        self.attributes
            .iter()
            .flatten()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()
    }

    /// Publish time, when it parses. Accepts RFC 3339 and the
    /// `YYYY-MM-DD HH:MM:SS[.fff]` form (taken as UTC).
    pub fn parsed_publish_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.publish_time.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(ts.and_utc());
        }
        warn!(
            message_id = self.message_id.as_deref(),
            publish_time = raw,
            "unrecognised publish time; ignoring it"
        );
        None
    }
}

impl PushEnvelope {
    /// Splits the envelope into the handler's event and context.
    pub fn into_trigger(self) -> (TriggerEvent, EventContext) {
        let data = self.message.decoded_data();
        let attributes = self.message.string_attributes();
        let timestamp = self.message.parsed_publish_time();

        (
            TriggerEvent { data, attributes },
            EventContext {
                event_id: self.message.message_id,
                timestamp,
                event_type: Some(PUBSUB_EVENT_TYPE.to_string()),
                resource: self.subscription,
            },
        )
    }
}
