//! Forwarding a message or attachment to several users or groups at once.
//!
//! The URL depends on two things: whether the payload is a text message or an
//! attachment, and whether the targets are users or groups. Both are explicit
//! enums here, so route selection is an exhaustive match.
//!
//! When only some targets fail, the server answers with status 216 and still
//! lists the successful deliveries. That code is accepted as partial success.

use serde::{Deserialize, Serialize};

use crate::context::{now_millis, SessionContext};
use crate::endpoint::{Endpoint, Route};
use crate::error::{Error, Result};
use crate::resolver::{self, Reply};

/// Status code for a forward that reached only some of its targets.
pub const PARTIAL_FORWARD_FAILURE: i64 = 216;

/// Kind of conversation the targets are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadKind {
    Direct,
    Group,
}

/// Attachment already uploaded to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub url: String,
    pub file_name: String,
    pub extension: String,
    pub checksum: String,
    pub size: String,
    #[serde(rename = "fType")]
    pub f_type: i64,
    pub fdata: String,
}

/// What is being forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForwardPayload {
    Message { message: String },
    Attachment(AttachmentInfo),
}

impl ForwardPayload {
    pub fn message(text: impl Into<String>) -> Self {
        ForwardPayload::Message { message: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRequest {
    pub targets: Vec<String>,
    pub kind: ThreadKind,
    pub payload: ForwardPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectTarget {
    pub client_id: i64,
    pub to_uid: String,
    pub ttl: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTarget {
    pub client_id: String,
    pub grid: String,
    pub ttl: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardParams {
    pub ttl: i64,
    pub msg_type: &'static str,
    pub total_ids: usize,
    /// The payload, JSON encoded a second time.
    pub msg_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_ids: Option<Vec<DirectTarget>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imei: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grids: Option<Vec<GroupTarget>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardResult {
    pub client_id: String,
    pub msg_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ForwardResponse {
    #[serde(default)]
    pub success: Option<Vec<ForwardResult>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardMessage;

impl Endpoint for ForwardMessage {
    type Input = ForwardRequest;
    type Params = ForwardParams;
    type Output = ForwardResponse;

    const ACCEPTED_CODES: &'static [i64] = &[PARTIAL_FORWARD_FAILURE];

    fn route(&self, request: &ForwardRequest) -> Route {
        let scope = match request.kind {
            ThreadKind::Direct => "message",
            ThreadKind::Group => "group",
        };
        let action = match request.payload {
            ForwardPayload::Message { .. } => "mforward",
            ForwardPayload::Attachment(_) => "forward",
        };
        Route::new("file", format!("/api/{scope}/{action}")).with_query(vec![("nretry", 0.into())])
    }

    fn params(&self, request: &ForwardRequest, session: &SessionContext) -> Result<ForwardParams> {
        if request.targets.is_empty() {
            return Err(Error::Configuration("forward needs at least one target".to_string()));
        }

        let msg_info = serde_json::to_string(&request.payload).map_err(|e| Error::Serialization(e.to_string()))?;
        let client_id = now_millis();
        let mut params = ForwardParams {
            ttl: 0,
            msg_type: "1",
            total_ids: request.targets.len(),
            msg_info,
            to_ids: None,
            imei: None,
            grids: None,
        };

        match request.kind {
            ThreadKind::Direct => {
                params.to_ids = Some(
                    request
                        .targets
                        .iter()
                        .map(|uid| DirectTarget {
                            client_id,
                            to_uid: uid.clone(),
                            ttl: 0,
                        })
                        .collect(),
                );
                params.imei = Some(session.imei().to_string());
            }
            ThreadKind::Group => {
                params.grids = Some(
                    request
                        .targets
                        .iter()
                        .map(|grid| GroupTarget {
                            client_id: client_id.to_string(),
                            grid: grid.clone(),
                            ttl: 0,
                        })
                        .collect(),
                );
            }
        }

        Ok(params)
    }

    fn output(&self, reply: Reply) -> Result<ForwardResponse> {
        if reply.data.is_null() {
            return Ok(ForwardResponse::default());
        }
        resolver::payload(reply)
    }
}
