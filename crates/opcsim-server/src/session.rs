//! One client connection on the protocol endpoint.
//!
//! A session reads request lines, answers each in order and forwards
//! frames pushed by its subscriptions. Lines that are not UTF-8 or
//! exceed [`MAX_LINE_BYTES`] get a `BadDecodingError` frame like any
//! other undecodable request. It ends when the client closes
//! the connection or sends `close`, or when the server leaves `Running`.
//! Subscription tasks are aborted when the session is dropped.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use opcsim_core::AddressSpace;
use opcsim_types::{ServerState, SessionId};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::framing::{Line, LineReader, MAX_LINE_BYTES};
use crate::protocol::{
    DataValue, NodeDescription, NodeId, Request, RequestFrame, Response, ResponseFrame,
    SECURITY_POLICY, StatusCode, revise_publishing_interval, salvage_request_id,
};
use crate::subscription::Subscription;

/// Maximum subscriptions one session may hold.
pub const MAX_SUBSCRIPTIONS_PER_SESSION: usize = 16;

/// Capacity of the channel carrying subscription frames to the session.
const PUSH_CHANNEL_CAPACITY: usize = 64;

/// Everything a session needs from the running server.
#[derive(Debug)]
pub(crate) struct SessionContext {
    pub(crate) space: Arc<AddressSpace>,
    pub(crate) state: watch::Receiver<ServerState>,
    pub(crate) server_name: String,
    pub(crate) endpoint_url: String,
}

/// Per-connection state.
#[derive(Debug)]
struct Session {
    id: SessionId,
    ctx: Arc<SessionContext>,
    subscriptions: BTreeMap<u32, JoinHandle<()>>,
    next_subscription_id: u32,
    push_tx: mpsc::Sender<ResponseFrame>,
}

/// What the read loop does after a request.
enum Step {
    Reply(ResponseFrame),
    Close,
}

/// Serve one accepted connection to completion.
pub(crate) async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<SessionContext>,
) -> std::io::Result<()> {
    let (push_tx, mut push_rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
    let mut state = ctx.state.clone();
    let mut session = Session {
        id: SessionId::new(),
        ctx,
        subscriptions: BTreeMap::new(),
        next_subscription_id: 1,
        push_tx,
    };
    info!(session_id = %session.id, %peer, "Session opened");

    let (read_half, mut write_half) = stream.into_split();
    let mut lines = LineReader::new(BufReader::new(read_half));

    loop {
        if !state.borrow().is_running() {
            break;
        }
        tokio::select! {
            line = lines.next_line() => {
                let step = match line? {
                    None => break,
                    Some(Line::Text(text)) if text.trim().is_empty() => continue,
                    Some(Line::Text(text)) => session.handle_line(&text),
                    Some(Line::InvalidUtf8(lossy)) => Step::Reply(ResponseFrame::error(
                        salvage_request_id(&lossy),
                        StatusCode::BadDecodingError,
                        "request line is not valid UTF-8",
                    )),
                    Some(Line::TooLong) => Step::Reply(ResponseFrame::error(
                        None,
                        StatusCode::BadDecodingError,
                        format!("request line exceeds {MAX_LINE_BYTES} bytes"),
                    )),
                };
                match step {
                    Step::Reply(frame) => write_frame(&mut write_half, &frame).await?,
                    Step::Close => break,
                }
            }
            Some(frame) = push_rx.recv() => {
                write_frame(&mut write_half, &frame).await?;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(
        session_id = %session.id,
        subscriptions = session.subscriptions.len(),
        "Session closed"
    );
    Ok(())
}

/// Send a single error frame to a connection that will not be served.
pub(crate) async fn reject(
    mut stream: TcpStream,
    peer: SocketAddr,
    status: StatusCode,
    message: &str,
) -> std::io::Result<()> {
    warn!(%peer, %status, "Rejecting connection");
    write_frame(&mut stream, &ResponseFrame::error(None, status, message)).await?;
    stream.shutdown().await
}

async fn write_frame<W>(writer: &mut W, frame: &ResponseFrame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = frame.to_line().map_err(std::io::Error::other)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

impl Session {
    fn handle_line(&mut self, line: &str) -> Step {
        let frame: RequestFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(session_id = %self.id, error = %e, "Undecodable request");
                return Step::Reply(ResponseFrame::error(
                    salvage_request_id(line),
                    StatusCode::BadDecodingError,
                    e.to_string(),
                ));
            }
        };

        debug!(session_id = %self.id, request_id = frame.request_id, op = frame.request.op(), "Request");
        self.dispatch(frame.request_id, frame.request)
    }

    fn dispatch(&mut self, request_id: u32, request: Request) -> Step {
        let reply = match request {
            Request::Close => return Step::Close,
            Request::Hello { client_name } => {
                info!(
                    session_id = %self.id,
                    client = client_name.as_deref().unwrap_or("unknown"),
                    "Client hello"
                );
                ResponseFrame::reply(
                    request_id,
                    Response::HelloAck {
                        server_name: self.ctx.server_name.clone(),
                        endpoint: self.ctx.endpoint_url.clone(),
                        security_policy: String::from(SECURITY_POLICY),
                        session_id: self.id,
                    },
                )
            }
            Request::Browse => ResponseFrame::reply(request_id, Response::BrowseResult {
                nodes: self.browse(),
            }),
            Request::Read { nodes } => ResponseFrame::reply(request_id, Response::ReadResult {
                results: nodes.into_iter().map(|id| self.read(id)).collect(),
            }),
            Request::Write { node, value } => {
                let response = match self.ctx.space.write(node.name(), value) {
                    Ok(stored) => {
                        debug!(session_id = %self.id, variable = node.name(), value = %stored, "Node written");
                        Response::WriteResult {
                            status: StatusCode::Good,
                            value: Some(stored),
                        }
                    }
                    Err(e) => {
                        debug!(session_id = %self.id, variable = node.name(), error = %e, "Write rejected");
                        Response::WriteResult {
                            status: StatusCode::from(&e),
                            value: None,
                        }
                    }
                };
                ResponseFrame::reply(request_id, response)
            }
            Request::Subscribe {
                nodes,
                publishing_interval_ms,
            } => self.subscribe(request_id, nodes, publishing_interval_ms),
            Request::Unsubscribe { subscription_id } => {
                let status = match self.subscriptions.remove(&subscription_id) {
                    Some(handle) => {
                        handle.abort();
                        StatusCode::Good
                    }
                    None => StatusCode::BadSubscriptionIdInvalid,
                };
                ResponseFrame::reply(request_id, Response::UnsubscribeResult { status })
            }
        };
        Step::Reply(reply)
    }

    fn browse(&self) -> Vec<NodeDescription> {
        self.ctx
            .space
            .nodes()
            .map(|node| NodeDescription {
                node_id: NodeId::new(node.name()),
                browse_name: node.name().to_owned(),
                kind: node.kind(),
                writable: true,
            })
            .collect()
    }

    fn read(&self, id: NodeId) -> DataValue {
        match self.ctx.space.node(id.name()).and_then(|node| node.sample()) {
            Ok(sample) => DataValue {
                node_id: id,
                status: StatusCode::Good,
                value: Some(sample.value),
                source_timestamp: Some(sample.source_timestamp),
            },
            Err(e) => DataValue::bad(id, StatusCode::from(&e)),
        }
    }

    fn subscribe(
        &mut self,
        request_id: u32,
        nodes: Vec<NodeId>,
        publishing_interval_ms: Option<u64>,
    ) -> ResponseFrame {
        self.subscriptions.retain(|_, handle| !handle.is_finished());
        if self.subscriptions.len() >= MAX_SUBSCRIPTIONS_PER_SESSION {
            return ResponseFrame::error(
                Some(request_id),
                StatusCode::BadTooManySubscriptions,
                format!("at most {MAX_SUBSCRIPTIONS_PER_SESSION} subscriptions per session"),
            );
        }

        let statuses: Vec<StatusCode> = nodes
            .iter()
            .map(|id| {
                if self.ctx.space.contains(id.name()) {
                    StatusCode::Good
                } else {
                    StatusCode::BadNodeIdUnknown
                }
            })
            .collect();
        let monitored: Vec<NodeId> = nodes
            .into_iter()
            .zip(&statuses)
            .filter(|(_, status)| status.is_good())
            .map(|(id, _)| id)
            .collect();

        let interval_ms = revise_publishing_interval(publishing_interval_ms);
        let subscription_id = self.next_subscription_id;
        self.next_subscription_id = self.next_subscription_id.wrapping_add(1).max(1);

        let handle = Subscription::new(
            subscription_id,
            Arc::clone(&self.ctx.space),
            monitored,
            Duration::from_millis(interval_ms),
            self.push_tx.clone(),
        )
        .spawn(self.ctx.state.clone());
        self.subscriptions.insert(subscription_id, handle);

        info!(
            session_id = %self.id,
            subscription_id,
            interval_ms,
            "Subscription created"
        );
        ResponseFrame::reply(
            request_id,
            Response::SubscribeResult {
                subscription_id,
                revised_publishing_interval_ms: interval_ms,
                statuses,
            },
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for handle in self.subscriptions.values() {
            handle.abort();
        }
    }
}
