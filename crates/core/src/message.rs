//! Message protocol between pages and the worker.
//!
//! Requests travel as `{type, id, payload}` envelopes. Responses echo the
//! request id with a `<TYPE>_RESPONSE` type. Progress is broadcast out of band
//! as `SW_PROGRESS_UPDATE` and never answers a request.

use crate::cid::Cid;
use crate::entry::DirectoryEntry;
use crate::progress::ProgressEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Correlation id carried by every request and its response.
pub type MessageId = Uuid;

/// Suffix appended to a request type to form its response type.
pub const RESPONSE_SUFFIX: &str = "_RESPONSE";

/// Type tag of out-of-band progress broadcasts.
pub const PROGRESS_UPDATE_TYPE: &str = "SW_PROGRESS_UPDATE";

/// A request from a page to the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// List the immediate children of `cid`, then walk its subdirectories in
    /// the background.
    ShallowRetrieval { cid: Cid },
    /// Group files into content/metadata pairs.
    ExtractPairs { files: Vec<DirectoryEntry> },
    /// Take control of every connected page. No response is sent.
    ClaimClients,
}

#[derive(Serialize, Deserialize)]
struct ShallowRetrievalPayload {
    cid: Cid,
}

#[derive(Serialize, Deserialize)]
struct ExtractPairsPayload {
    files: Vec<DirectoryEntry>,
}

impl Request {
    pub const SHALLOW_RETRIEVAL: &'static str = "SHALLOW_RETRIEVAL";
    pub const EXTRACT_PAIRS: &'static str = "EXTRACT_PAIRS";
    pub const CLAIM_CLIENTS: &'static str = "CLAIM_CLIENTS";

    /// Wire type tag of this request.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShallowRetrieval { .. } => Self::SHALLOW_RETRIEVAL,
            Self::ExtractPairs { .. } => Self::EXTRACT_PAIRS,
            Self::ClaimClients => Self::CLAIM_CLIENTS,
        }
    }

    /// Whether the worker answers this request.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Self::ClaimClients)
    }

    /// Rebuild a request from its wire type tag and payload.
    pub fn from_parts(kind: &str, payload: Value) -> crate::Result<Self> {
        match kind {
            Self::SHALLOW_RETRIEVAL => {
                let payload: ShallowRetrievalPayload = serde_json::from_value(payload)
                    .map_err(|e| crate::Error::MalformedRequest(format!("{kind}: {e}")))?;
                Ok(Self::ShallowRetrieval { cid: payload.cid })
            }
            Self::EXTRACT_PAIRS => {
                let payload: ExtractPairsPayload = serde_json::from_value(payload)
                    .map_err(|e| crate::Error::MalformedRequest(format!("{kind}: {e}")))?;
                Ok(Self::ExtractPairs {
                    files: payload.files,
                })
            }
            Self::CLAIM_CLIENTS => Ok(Self::ClaimClients),
            other => Err(crate::Error::UnknownMessageType(other.to_string())),
        }
    }

    fn payload(&self) -> crate::Result<Value> {
        let value = match self {
            Self::ShallowRetrieval { cid } => {
                serde_json::to_value(ShallowRetrievalPayload { cid: cid.clone() })?
            }
            Self::ExtractPairs { files } => serde_json::to_value(ExtractPairsPayload {
                files: files.clone(),
            })?,
            Self::ClaimClients => Value::Null,
        };
        Ok(value)
    }
}

/// Untyped envelope as it appears on the wire.
///
/// The worker decodes this first so that an unknown `type` can still be
/// answered with a failure response carrying the caller's id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: MessageId,
    #[serde(default)]
    pub payload: Value,
}

/// A validated request envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub id: MessageId,
    pub request: Request,
}

impl Envelope {
    /// Wrap a request with a fresh correlation id.
    pub fn new(request: Request) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
        }
    }

    /// Convert to the wire representation.
    pub fn to_raw(&self) -> crate::Result<RawEnvelope> {
        Ok(RawEnvelope {
            kind: self.request.kind().to_string(),
            id: self.id,
            payload: self.request.payload()?,
        })
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(&self.to_raw()?)?)
    }
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = crate::Error;

    fn try_from(raw: RawEnvelope) -> crate::Result<Self> {
        Ok(Self {
            id: raw.id,
            request: Request::from_parts(&raw.kind, raw.payload)?,
        })
    }
}

/// Reply to a request, successful or not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// `<TYPE>_RESPONSE`.
    #[serde(rename = "type")]
    pub kind: String,
    pub id: MessageId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(request_type: &str, id: MessageId, data: Value) -> Self {
        Self {
            kind: format!("{request_type}{RESPONSE_SUFFIX}"),
            id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(request_type: &str, id: MessageId, error: impl Into<String>) -> Self {
        Self {
            kind: format!("{request_type}{RESPONSE_SUFFIX}"),
            id,
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// The request type this response answers.
    pub fn request_type(&self) -> &str {
        self.kind
            .strip_suffix(RESPONSE_SUFFIX)
            .unwrap_or(&self.kind)
    }

    /// Collapse into the data payload or the error message.
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "unknown worker error".to_string()))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum BroadcastKind {
    #[serde(rename = "SW_PROGRESS_UPDATE")]
    ProgressUpdate,
}

/// Out-of-band progress broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(rename = "type")]
    kind: BroadcastKind,
    pub data: ProgressEvent,
}

impl ProgressUpdate {
    pub fn new(data: ProgressEvent) -> Self {
        Self {
            kind: BroadcastKind::ProgressUpdate,
            data,
        }
    }
}

/// Any message the worker sends to a page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerMessage {
    Progress(ProgressUpdate),
    Response(Response),
}

impl WorkerMessage {
    pub fn progress(event: ProgressEvent) -> Self {
        Self::Progress(ProgressUpdate::new(event))
    }
}
