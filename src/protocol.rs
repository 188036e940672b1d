//! Wire events exchanged with the acquisition service
//!
//! The service speaks a small event vocabulary. Each event has a name and an
//! optional JSON payload; on text transports the two are framed together as
//! `{"event": "<name>", "data": {...}}`.
//!
//! | Direction | Event | Payload |
//! |---|---|---|
//! | client → service | `connect_to_PLC` | `{Ip, Slot}` |
//! | service → client | `connect_response` | `{Custom_Status, Message, BaseTagList}` |
//! | client → service | `first_read` | `{RefreshRate, TagList}` |
//! | service → client | `first_read_response` | `{Custom_Status, Message, Values, DataTypes}` |
//! | client → service | `start_loop` / `stop_loop` / `disconnect` | none |
//! | service → client | `tagData` | `{Custom_Status, Message, TimeStamp, Values}` |
//!
//! `Custom_Status` is the string `"Success"` on success. Anything else is a
//! failure that carries a human-readable `Message`.

use crate::error::{PlcWatchError, Result};
use crate::types::{ConnectionTarget, TagValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Status string the service uses to report success
pub const STATUS_SUCCESS: &str = "Success";

/// Events sent from the client to the acquisition service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Ask the service to open a connection to a PLC
    #[serde(rename = "connect_to_PLC")]
    ConnectToPlc(ConnectRequest),
    /// Validate the tag list and read every tag once
    #[serde(rename = "first_read")]
    FirstRead(FirstReadRequest),
    /// Begin the periodic read loop
    #[serde(rename = "start_loop")]
    StartLoop,
    /// Halt the periodic read loop
    #[serde(rename = "stop_loop")]
    StopLoop,
    /// Client is going away
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::ConnectToPlc(_) => "connect_to_PLC",
            ClientEvent::FirstRead(_) => "first_read",
            ClientEvent::StartLoop => "start_loop",
            ClientEvent::StopLoop => "stop_loop",
            ClientEvent::Disconnect => "disconnect",
        }
    }
}

/// Payload of `connect_to_PLC`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    #[serde(rename = "Ip")]
    pub ip: String,
    #[serde(rename = "Slot")]
    pub slot: String,
}

impl From<&ConnectionTarget> for ConnectRequest {
    fn from(target: &ConnectionTarget) -> Self {
        Self {
            ip: target.host.clone(),
            slot: target.slot.clone(),
        }
    }
}

/// Payload of `first_read`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstReadRequest {
    /// Requested loop period in milliseconds
    #[serde(rename = "RefreshRate")]
    pub refresh_rate_ms: u64,
    /// Ordered tag names; every response array is aligned to this order
    #[serde(rename = "TagList")]
    pub tag_list: Vec<String>,
}

/// Events pushed from the acquisition service to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Answer to `connect_to_PLC`
    #[serde(rename = "connect_response")]
    ConnectResponse(ConnectResponse),
    /// Answer to `first_read`
    #[serde(rename = "first_read_response")]
    FirstReadResponse(FirstReadResponse),
    /// Periodic sample while the loop runs
    #[serde(rename = "tagData")]
    TagData(TagData),
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectResponse(_) => "connect_response",
            ServerEvent::FirstReadResponse(_) => "first_read_response",
            ServerEvent::TagData(_) => "tagData",
        }
    }
}

/// Common accessors for every payload that carries `Custom_Status`
pub trait StatusReport {
    /// Raw status string
    fn custom_status(&self) -> &str;

    /// Human-readable message accompanying the status
    fn message(&self) -> &str;

    /// Whether the service reported success
    fn is_success(&self) -> bool {
        self.custom_status() == STATUS_SUCCESS
    }
}

macro_rules! impl_status_report {
    ($($ty:ty),+) => {
        $(impl StatusReport for $ty {
            fn custom_status(&self) -> &str {
                &self.custom_status
            }

            fn message(&self) -> &str {
                &self.message
            }
        })+
    };
}

/// Payload of `connect_response`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectResponse {
    #[serde(rename = "Custom_Status")]
    pub custom_status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    /// Tag names the controller exposes, used for lookup/autocomplete only
    #[serde(rename = "BaseTagList", default)]
    pub base_tag_list: Vec<String>,
}

impl ConnectResponse {
    /// Successful connect response
    pub fn success(base_tag_list: Vec<String>) -> Self {
        Self {
            custom_status: STATUS_SUCCESS.to_string(),
            message: String::new(),
            base_tag_list,
        }
    }

    /// Failed connect response
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            custom_status: "Failure".to_string(),
            message: message.into(),
            base_tag_list: Vec::new(),
        }
    }
}

/// Payload of `first_read_response`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstReadResponse {
    #[serde(rename = "Custom_Status")]
    pub custom_status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Values", default)]
    pub values: Vec<TagValue>,
    #[serde(rename = "DataTypes", default)]
    pub data_types: Vec<Option<String>>,
}

impl FirstReadResponse {
    /// Successful first read
    pub fn success(values: Vec<TagValue>, data_types: Vec<Option<String>>) -> Self {
        Self {
            custom_status: STATUS_SUCCESS.to_string(),
            message: String::new(),
            values,
            data_types,
        }
    }

    /// Failed first read
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            custom_status: "Failure".to_string(),
            message: message.into(),
            values: Vec::new(),
            data_types: Vec::new(),
        }
    }
}

/// Payload of `tagData`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagData {
    #[serde(rename = "Custom_Status")]
    pub custom_status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    /// Service-side sample time in epoch milliseconds
    #[serde(
        rename = "TimeStamp",
        default,
        deserialize_with = "deserialize_timestamp"
    )]
    pub timestamp_ms: i64,
    #[serde(rename = "Values", default)]
    pub values: Vec<TagValue>,
}

impl TagData {
    /// Successful sample
    pub fn success(timestamp_ms: i64, values: Vec<TagValue>) -> Self {
        Self {
            custom_status: STATUS_SUCCESS.to_string(),
            message: String::new(),
            timestamp_ms,
            values,
        }
    }

    /// Failed sample
    pub fn failure(timestamp_ms: i64, message: impl Into<String>) -> Self {
        Self {
            custom_status: "Failure".to_string(),
            message: message.into(),
            timestamp_ms,
            values: Vec::new(),
        }
    }
}

impl_status_report!(ConnectResponse, FirstReadResponse, TagData);

/// Services written in dynamic languages often emit fractional epoch milliseconds
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw as i64)
}

/// Encode an event as a JSON text frame
pub fn encode<T: Serialize>(event: &T) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

/// Decode an event from a JSON text frame
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| PlcWatchError::Protocol(format!("{}: {}", e, text)))
}
