//! Wire format of the protocol endpoint.
//!
//! Clients speak newline-delimited JSON over TCP. Every request line is a
//! [`RequestFrame`] carrying a client-chosen `request_id` and an `op`
//! tag; every reply is a [`ResponseFrame`] echoing that id with a `type`
//! tag. Subscription notifications are pushed as `data_change` frames
//! without a `request_id`.
//!
//! Nodes are addressed as `ns=1;s=<name>`. Bare variable names are
//! accepted as well.

use std::fmt;

use chrono::{DateTime, Utc};
use opcsim_core::AddressSpaceError;
use opcsim_types::{SessionId, TagValue, VariableKind};
use serde::{Deserialize, Serialize};

/// Namespace index all simulated nodes live in.
pub const NAMESPACE_INDEX: u16 = 1;

/// Security policy advertised to clients.
pub const SECURITY_POLICY: &str = "None";

/// Shortest publishing interval a subscription may use.
pub const MIN_PUBLISHING_INTERVAL_MS: u64 = 100;

/// Longest publishing interval a subscription may use.
pub const MAX_PUBLISHING_INTERVAL_MS: u64 = 60_000;

/// Publishing interval used when a subscribe request names none.
pub const DEFAULT_PUBLISHING_INTERVAL_MS: u64 = 1_000;

/// Clamp a requested publishing interval to the supported range.
pub fn revise_publishing_interval(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_PUBLISHING_INTERVAL_MS)
        .clamp(MIN_PUBLISHING_INTERVAL_MS, MAX_PUBLISHING_INTERVAL_MS)
}

// ---------------------------------------------------------------------------
// Node ids
// ---------------------------------------------------------------------------

/// String node identifier in the simulator namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodeId {
    name: String,
}

impl NodeId {
    /// Node id for a variable name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Parse `ns=1;s=<name>` or a bare name.
    ///
    /// Ids in any other namespace keep their full text as the name and
    /// therefore never resolve.
    pub fn parse(raw: &str) -> Self {
        let prefix = format!("ns={NAMESPACE_INDEX};s=");
        Self::new(raw.strip_prefix(prefix.as_str()).unwrap_or(raw))
    }

    /// The variable name this id refers to.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={NAMESPACE_INDEX};s={}", self.name)
    }
}

impl From<String> for NodeId {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Outcome of an operation, named after the OPC UA status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// The operation succeeded.
    Good,
    /// No node exists under the requested id.
    BadNodeIdUnknown,
    /// The value cannot be converted to the node's type.
    BadTypeMismatch,
    /// The request line could not be decoded.
    BadDecodingError,
    /// No subscription exists under the requested id.
    BadSubscriptionIdInvalid,
    /// The server already serves its maximum number of sessions.
    BadTooManySessions,
    /// The session already holds its maximum number of subscriptions.
    BadTooManySubscriptions,
    /// The node is temporarily unavailable.
    BadInternalError,
}

impl StatusCode {
    /// Whether this is [`StatusCode::Good`].
    pub const fn is_good(self) -> bool {
        matches!(self, Self::Good)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<&AddressSpaceError> for StatusCode {
    fn from(err: &AddressSpaceError) -> Self {
        match err {
            AddressSpaceError::NotFound { .. } => Self::BadNodeIdUnknown,
            AddressSpaceError::TypeMismatch { .. } => Self::BadTypeMismatch,
            AddressSpaceError::Poisoned { .. } => Self::BadInternalError,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Client-chosen id echoed in the reply.
    pub request_id: u32,
    /// The operation.
    #[serde(flatten)]
    pub request: Request,
}

/// Operations a client can request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Open the session and learn the server identity.
    Hello {
        /// Free-form client name, logged only.
        #[serde(default)]
        client_name: Option<String>,
    },
    /// List every node.
    Browse,
    /// Read the current value of some nodes.
    Read {
        /// Nodes to read.
        nodes: Vec<NodeId>,
    },
    /// Write one node.
    Write {
        /// Target node.
        node: NodeId,
        /// Value to write; coerced to the node type.
        value: TagValue,
    },
    /// Start receiving change notifications for some nodes.
    Subscribe {
        /// Nodes to monitor.
        nodes: Vec<NodeId>,
        /// Requested publishing interval.
        #[serde(default)]
        publishing_interval_ms: Option<u64>,
    },
    /// Cancel a subscription.
    Unsubscribe {
        /// Id from the `subscribe_result`.
        subscription_id: u32,
    },
    /// End the session.
    Close,
}

impl Request {
    /// The `op` tag, for logging.
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Browse => "browse",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Close => "close",
        }
    }
}

/// Best-effort `request_id` of a line that failed to decode.
pub fn salvage_request_id(line: &str) -> Option<u32> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value
        .get("request_id")?
        .as_u64()
        .and_then(|id| u32::try_from(id).ok())
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Browse entry for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Full node id.
    pub node_id: NodeId,
    /// The variable name.
    pub browse_name: String,
    /// Declared type of the node.
    #[serde(rename = "type")]
    pub kind: VariableKind,
    /// Whether clients may write the node.
    pub writable: bool,
}

/// Value of one node as returned by reads and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    /// The node the value belongs to.
    pub node_id: NodeId,
    /// Whether the read succeeded.
    pub status: StatusCode,
    /// Current value, present when `status` is good.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<TagValue>,
    /// When the value was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// A failed read of `node_id`.
    pub const fn bad(node_id: NodeId, status: StatusCode) -> Self {
        Self {
            node_id,
            status,
            value: None,
            source_timestamp: None,
        }
    }
}

/// One reply or notification line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Id of the request this answers; absent on notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u32>,
    /// The payload.
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseFrame {
    /// Reply to request `request_id`.
    pub const fn reply(request_id: u32, response: Response) -> Self {
        Self {
            request_id: Some(request_id),
            response,
        }
    }

    /// Unsolicited frame.
    pub const fn push(response: Response) -> Self {
        Self {
            request_id: None,
            response,
        }
    }

    /// Error frame.
    pub fn error(request_id: Option<u32>, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            request_id,
            response: Response::Error {
                status,
                message: message.into(),
            },
        }
    }

    /// Serialize as one newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Payloads the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Answer to `hello`.
    HelloAck {
        /// Configured server name.
        server_name: String,
        /// Endpoint URL, `opc.tcp://host:port`.
        endpoint: String,
        /// Always `"None"`.
        security_policy: String,
        /// Id assigned to this session.
        session_id: SessionId,
    },
    /// Answer to `browse`.
    BrowseResult {
        /// Every node, in name order.
        nodes: Vec<NodeDescription>,
    },
    /// Answer to `read`, one entry per requested node.
    ReadResult {
        /// Values in request order.
        results: Vec<DataValue>,
    },
    /// Answer to `write`.
    WriteResult {
        /// Outcome of the write.
        status: StatusCode,
        /// The value stored after coercion.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<TagValue>,
    },
    /// Answer to `subscribe`.
    SubscribeResult {
        /// Id used by `unsubscribe` and `data_change`.
        subscription_id: u32,
        /// The clamped publishing interval.
        revised_publishing_interval_ms: u64,
        /// Per-node outcome in request order.
        statuses: Vec<StatusCode>,
    },
    /// Answer to `unsubscribe`.
    UnsubscribeResult {
        /// Outcome of the cancellation.
        status: StatusCode,
    },
    /// Change notification for a subscription.
    DataChange {
        /// The subscription that fired.
        subscription_id: u32,
        /// Changed items.
        items: Vec<DataValue>,
    },
    /// Request-level failure.
    Error {
        /// What went wrong.
        status: StatusCode,
        /// Human-readable detail.
        message: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn node_id_accepts_qualified_and_bare_names() {
        assert_eq!(NodeId::parse("ns=1;s=Temperature").name(), "Temperature");
        assert_eq!(NodeId::parse("Temperature").name(), "Temperature");
        assert_eq!(NodeId::parse("ns=2;s=Temperature").name(), "ns=2;s=Temperature");
        assert_eq!(NodeId::new("Status").to_string(), "ns=1;s=Status");
    }

    #[test]
    fn decodes_every_op() {
        let frame: RequestFrame =
            serde_json::from_str(r#"{"request_id":1,"op":"hello","client_name":"line-hmi"}"#).unwrap();
        assert_eq!(
            frame.request,
            Request::Hello {
                client_name: Some(String::from("line-hmi"))
            }
        );

        let frame: RequestFrame = serde_json::from_str(r#"{"request_id":2,"op":"browse"}"#).unwrap();
        assert_eq!(frame.request, Request::Browse);

        let frame: RequestFrame = serde_json::from_str(
            r#"{"request_id":3,"op":"write","node":"ns=1;s=Status","value":"Idle"}"#,
        )
        .unwrap();
        assert_eq!(
            frame.request,
            Request::Write {
                node: NodeId::new("Status"),
                value: TagValue::from("Idle")
            }
        );

        let frame: RequestFrame =
            serde_json::from_str(r#"{"request_id":4,"op":"subscribe","nodes":["Temperature"]}"#)
                .unwrap();
        assert_eq!(
            frame.request,
            Request::Subscribe {
                nodes: vec![NodeId::new("Temperature")],
                publishing_interval_ms: None
            }
        );

        let frame: RequestFrame = serde_json::from_str(r#"{"request_id":5,"op":"close"}"#).unwrap();
        assert_eq!(frame.request.op(), "close");
    }

    #[test]
    fn unknown_op_fails_to_decode() {
        let line = r#"{"request_id":9,"op":"delete_everything"}"#;
        assert!(serde_json::from_str::<RequestFrame>(line).is_err());
        assert_eq!(salvage_request_id(line), Some(9));
        assert_eq!(salvage_request_id("not json"), None);
    }

    #[test]
    fn responses_carry_type_tag_and_status_names() {
        let frame = ResponseFrame::reply(
            7,
            Response::WriteResult {
                status: StatusCode::BadTypeMismatch,
                value: None,
            },
        );
        let json: serde_json::Value = serde_json::from_str(&frame.to_line().unwrap()).unwrap();
        assert_eq!(json["request_id"], 7);
        assert_eq!(json["type"], "write_result");
        assert_eq!(json["status"], "BadTypeMismatch");
        assert!(json.get("value").is_none());

        let push = ResponseFrame::push(Response::DataChange {
            subscription_id: 1,
            items: vec![DataValue::bad(NodeId::new("X"), StatusCode::BadNodeIdUnknown)],
        });
        let json = serde_json::to_value(&push).unwrap();
        assert!(json.get("request_id").is_none());
        assert_eq!(json["items"][0]["node_id"], "ns=1;s=X");
    }

    #[test]
    fn publishing_interval_is_clamped() {
        assert_eq!(revise_publishing_interval(None), DEFAULT_PUBLISHING_INTERVAL_MS);
        assert_eq!(revise_publishing_interval(Some(5)), MIN_PUBLISHING_INTERVAL_MS);
        assert_eq!(revise_publishing_interval(Some(500)), 500);
        assert_eq!(revise_publishing_interval(Some(u64::MAX)), MAX_PUBLISHING_INTERVAL_MS);
    }
}
