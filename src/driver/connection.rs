//! Multiplexed WebSocket connection.
//!
//! One `Connection` owns one WebSocket and carries many logical requests
//! over it at once. Two cooperating tasks are bound to the socket: a
//! writer that is the sole producer of bytes (request frames and periodic
//! pings), and a reader that parses response frames and dispatches them to
//! the in-flight table by request id. When either task fails, the other is
//! signalled, and every outstanding request is completed with
//! [`DriverError::ConnectionClosed`] exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::sync::CancellationToken;

use crate::gremlin::auth::Credentials;
use crate::gremlin::codec::GraphsonCodec;
use crate::gremlin::message::{code, Request, Response};

use async_trait::async_trait;

use super::config::{
    DriverConfig, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PONG_TIMEOUT, DEFAULT_READ_DEADLINE,
    DEFAULT_WRITE_TIMEOUT,
};
use super::error::{DriverError, DriverResult};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type InFlightTable = Arc<Mutex<HashMap<String, InFlight>>>;

/// Trivial query used to probe connection health.
const PROBE_QUERY: &str = "g.V().limit(0)";

/// What the pool and the retry engine need from a connection. The live
/// implementation is [`Connection`]; tests substitute stubs.
#[async_trait]
pub trait GremlinConnection: Send {
    /// Execute one Gremlin script and await its aggregated result bytes.
    async fn exec_query(&self, query: &str) -> DriverResult<Vec<u8>>;
    /// Tear down the current socket and dial `url` in place.
    async fn reconnect(&mut self, url: &str) -> DriverResult<()>;
    /// Probe with a trivial query; re-dial once on a network error.
    async fn maintain_connection(&mut self, url: &str) -> DriverResult<()>;
    /// Close the connection; outstanding requests get `ConnectionClosed`.
    async fn close(&mut self) -> DriverResult<()>;
    /// Last I/O succeeded and close has not been signalled.
    fn healthy(&self) -> bool;
}

// ============================================================================
// ConnectionSettings
// ============================================================================

/// Per-connection tunables, derived from [`DriverConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// WebSocket handshake timeout.
    pub handshake_timeout: Duration,
    /// Per-write deadline.
    pub write_timeout: Duration,
    /// Read deadline before the first pong arrives.
    pub read_deadline: Duration,
    /// Pong timeout; the writer pings at 80% of this.
    pub pong_timeout: Duration,
    /// Processor name for the authentication sub-exchange.
    pub auth_processor: String,
    /// Credentials answering a 407 challenge; env fallback when unset.
    pub credentials: Option<Credentials>,
    /// Log every frame at debug level.
    pub verbose: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_deadline: DEFAULT_READ_DEADLINE,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            auth_processor: super::config::DEFAULT_AUTH_PROCESSOR.to_string(),
            credentials: None,
            verbose: false,
        }
    }
}

impl From<&DriverConfig> for ConnectionSettings {
    fn from(config: &DriverConfig) -> Self {
        Self {
            handshake_timeout: config.handshake_timeout,
            write_timeout: config.write_timeout,
            read_deadline: config.read_deadline,
            pong_timeout: config.pong_timeout,
            auth_processor: config.auth_processor.clone(),
            credentials: config.credentials.clone(),
            verbose: config.verbose,
        }
    }
}

// ============================================================================
// Result aggregation
// ============================================================================

/// What the dispatcher should do after absorbing one response frame.
#[derive(Debug)]
pub(crate) enum Dispatch {
    /// Terminal frame; complete the request with these bytes.
    Done(Vec<u8>),
    /// Non-terminal chunk absorbed; keep waiting.
    Pending,
    /// 407 challenge; answer with a SASL token and keep the entry.
    Authenticate,
    /// Terminal failure for this request only.
    Failed(DriverError),
}

/// Per-request aggregation state machine.
///
/// A request starts pending; the first 206 chunk flips it to batch mode,
/// after which the closing 200 yields the JSON array concatenation of
/// every chunk in arrival order. A 200 with no preceding chunks returns
/// its payload verbatim.
#[derive(Debug, Default)]
pub(crate) struct ResultAccumulator {
    items: Vec<serde_json::Value>,
    batching: bool,
}

impl ResultAccumulator {
    pub(crate) fn absorb(&mut self, response: &Response) -> Dispatch {
        match response.status.code {
            code::NO_CONTENT => Dispatch::Done(Vec::new()),
            code::PARTIAL_CONTENT => {
                self.batching = true;
                match self.extend_from(response) {
                    Ok(()) => Dispatch::Pending,
                    Err(err) => Dispatch::Failed(err),
                }
            }
            code::SUCCESS => {
                if self.batching {
                    if let Err(err) = self.extend_from(response) {
                        return Dispatch::Failed(err);
                    }
                    match serde_json::to_vec(&self.items) {
                        Ok(bytes) => Dispatch::Done(bytes),
                        Err(err) => Dispatch::Failed(err.into()),
                    }
                } else {
                    let bytes = response
                        .result
                        .data
                        .as_ref()
                        .map(|data| data.get().as_bytes().to_vec())
                        .unwrap_or_default();
                    Dispatch::Done(bytes)
                }
            }
            code::AUTHENTICATE => Dispatch::Authenticate,
            other => Dispatch::Failed(DriverError::from_status(other)),
        }
    }

    fn extend_from(&mut self, response: &Response) -> DriverResult<()> {
        let data = response.result.data.as_ref().ok_or_else(|| {
            DriverError::Wire(crate::gremlin::error::GremlinError::protocol(
                "batch chunk carries no data",
            ))
        })?;
        let items: Vec<serde_json::Value> = serde_json::from_str(data.get())?;
        self.items.extend(items);
        Ok(())
    }
}

// ============================================================================
// In-flight bookkeeping
// ============================================================================

/// Bookkeeping for one request awaiting its terminal event.
struct InFlight {
    tx: oneshot::Sender<DriverResult<Vec<u8>>>,
    acc: ResultAccumulator,
}

/// A frame queued for the writer, tagged with the request it belongs to so
/// a failed write can complete that request with the write error.
struct Outbound {
    request_id: String,
    frame: Vec<u8>,
}

// ============================================================================
// Link - one dialed socket generation
// ============================================================================

/// Everything tied to one dial of the socket. Replaced wholesale by
/// [`Connection::reconnect`].
struct Link {
    outbound: mpsc::UnboundedSender<Outbound>,
    inflight: InFlightTable,
    closing: CancellationToken,
    healthy: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    async fn dial(url: &str, settings: &ConnectionSettings) -> DriverResult<Self> {
        let (socket, _response) =
            tokio::time::timeout(settings.handshake_timeout, connect_async(url))
                .await
                .map_err(|_| DriverError::timeout("WebSocket handshake timed out"))??;
        tracing::debug!(url, "connection established");

        let (sink, source) = socket.split();
        let inflight: InFlightTable = Arc::new(Mutex::new(HashMap::new()));
        let closing = CancellationToken::new();
        let healthy = Arc::new(AtomicBool::new(true));
        let last_error = Arc::new(Mutex::new(None));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_loop(
            sink,
            outbound_rx,
            inflight.clone(),
            closing.clone(),
            healthy.clone(),
            last_error.clone(),
            settings.write_timeout,
            settings.pong_timeout.mul_f64(0.8),
        ));
        let reader = tokio::spawn(read_loop(
            source,
            inflight.clone(),
            closing.clone(),
            healthy.clone(),
            last_error.clone(),
            outbound_tx.clone(),
            settings.clone(),
        ));

        Ok(Self {
            outbound: outbound_tx,
            inflight,
            closing,
            healthy,
            last_error,
            tasks: vec![writer, reader],
        })
    }

    async fn shutdown(&mut self) {
        self.closing.cancel();
        self.healthy.store(false, Ordering::SeqCst);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        // tasks notice the cancellation and drain any leftover requests
        self.closing.cancel();
    }
}

// ============================================================================
// Connection
// ============================================================================

/// One multiplexed WebSocket connection to a Gremlin server.
pub struct Connection {
    url: String,
    settings: ConnectionSettings,
    link: Link,
}

impl Connection {
    /// Dial `url` and start the reader/writer tasks.
    pub async fn connect(url: &str, settings: ConnectionSettings) -> DriverResult<Self> {
        let link = Link::dial(url, &settings).await?;
        Ok(Self {
            url: url.to_string(),
            settings,
            link,
        })
    }

    /// Enqueue a request; the returned receiver fires exactly once with
    /// the terminal outcome (aggregated bytes or a terminal error).
    ///
    /// Fails synchronously with [`DriverError::ConnectionClosed`] when the
    /// connection is already closing.
    pub fn send(
        &self,
        request: Request,
    ) -> DriverResult<oneshot::Receiver<DriverResult<Vec<u8>>>> {
        let request_id = request.request_id.clone();
        let mut codec = GraphsonCodec::new();
        let mut buf = BytesMut::new();
        if self.settings.verbose {
            tracing::debug!(request_id = %request_id, op = %request.op, "sending request");
        }
        codec
            .encode(request, &mut buf)
            .map_err(DriverError::from)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.link.inflight.lock();
            if self.link.closing.is_cancelled() {
                return Err(DriverError::ConnectionClosed);
            }
            table.insert(
                request_id.clone(),
                InFlight {
                    tx,
                    acc: ResultAccumulator::default(),
                },
            );
        }

        if self
            .link
            .outbound
            .send(Outbound {
                request_id: request_id.clone(),
                frame: buf.to_vec(),
            })
            .is_err()
        {
            self.link.inflight.lock().remove(&request_id);
            return Err(DriverError::ConnectionClosed);
        }
        Ok(rx)
    }

    /// Execute one Gremlin script and await its aggregated result bytes.
    pub async fn exec_query(&self, query: &str) -> DriverResult<Vec<u8>> {
        let rx = self.send(Request::eval(query))?;
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(DriverError::ConnectionClosed),
        }
    }

    /// Last I/O succeeded and close has not been signalled.
    pub fn healthy(&self) -> bool {
        !self.link.closing.is_cancelled() && self.link.healthy.load(Ordering::SeqCst)
    }

    /// Message of the I/O failure that tore the connection down, if any.
    pub fn last_error(&self) -> Option<String> {
        self.link.last_error.lock().clone()
    }

    /// Server URL this connection is dialed to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Tear down the current socket and dial `url` in place. Outstanding
    /// requests on the old socket complete with `ConnectionClosed`.
    pub async fn reconnect(&mut self, url: &str) -> DriverResult<()> {
        self.link.shutdown().await;
        self.link = Link::dial(url, &self.settings).await?;
        self.url = url.to_string();
        Ok(())
    }

    /// Probe the connection with a trivial query; on a network error,
    /// attempt one re-dial in place.
    pub async fn maintain_connection(&mut self, url: &str) -> DriverResult<()> {
        match self.exec_query(PROBE_QUERY).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_network_error() => self.reconnect(url).await,
            Err(err) => Err(err),
        }
    }

    /// Close the connection and complete every outstanding request with
    /// `ConnectionClosed`. Idempotent.
    pub async fn close(&mut self) -> DriverResult<()> {
        self.link.shutdown().await;
        Ok(())
    }
}

#[async_trait]
impl GremlinConnection for Connection {
    async fn exec_query(&self, query: &str) -> DriverResult<Vec<u8>> {
        Connection::exec_query(self, query).await
    }

    async fn reconnect(&mut self, url: &str) -> DriverResult<()> {
        Connection::reconnect(self, url).await
    }

    async fn maintain_connection(&mut self, url: &str) -> DriverResult<()> {
        Connection::maintain_connection(self, url).await
    }

    async fn close(&mut self) -> DriverResult<()> {
        Connection::close(self).await
    }

    fn healthy(&self) -> bool {
        Connection::healthy(self)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("healthy", &self.healthy())
            .field("in_flight", &self.link.inflight.lock().len())
            .finish()
    }
}

// ============================================================================
// Writer task
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn write_loop(
    mut sink: WsSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    inflight: InFlightTable,
    closing: CancellationToken,
    healthy: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
    write_timeout: Duration,
    ping_interval: Duration,
) {
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + ping_interval,
        ping_interval,
    );
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = closing.cancelled() => break,
            _ = ping.tick() => {
                if let Err(err) = timed_write(&mut sink, Message::Ping(Vec::new()), write_timeout).await {
                    tracing::warn!(error = %err, "ping write failed");
                    *last_error.lock() = Some(err.to_string());
                    healthy.store(false, Ordering::SeqCst);
                    closing.cancel();
                    break;
                }
            }
            item = outbound.recv() => {
                let Some(Outbound { request_id, frame }) = item else { break };
                if let Err(err) = timed_write(&mut sink, Message::Binary(frame), write_timeout).await {
                    tracing::warn!(request_id = %request_id, error = %err, "frame write failed");
                    *last_error.lock() = Some(err.to_string());
                    if let Some(entry) = inflight.lock().remove(&request_id) {
                        let _ = entry.tx.send(Err(err));
                    }
                    healthy.store(false, Ordering::SeqCst);
                    closing.cancel();
                    break;
                }
            }
        }
    }
    let _ = sink.close().await;
}

async fn timed_write(sink: &mut WsSink, message: Message, deadline: Duration) -> DriverResult<()> {
    match tokio::time::timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(DriverError::timeout("write deadline exceeded")),
    }
}

// ============================================================================
// Reader task
// ============================================================================

async fn read_loop(
    mut source: WsSource,
    inflight: InFlightTable,
    closing: CancellationToken,
    healthy: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    settings: ConnectionSettings,
) {
    let mut codec = GraphsonCodec::new();
    let mut deadline = settings.read_deadline;

    loop {
        let next = tokio::select! {
            _ = closing.cancelled() => break,
            next = tokio::time::timeout(deadline, source.next()) => next,
        };
        match next {
            Err(_) => {
                *last_error.lock() = Some("read deadline expired".to_string());
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                tracing::warn!(error = %err, "socket read failed");
                *last_error.lock() = Some(err.to_string());
                break;
            }
            Ok(Some(Ok(message))) => match message {
                Message::Pong(_) => {
                    deadline = settings.pong_timeout;
                }
                Message::Text(_) | Message::Binary(_) => {
                    let data = message.into_data();
                    if settings.verbose {
                        tracing::debug!(frame = %String::from_utf8_lossy(&data), "received frame");
                    }
                    let mut buf = BytesMut::from(&data[..]);
                    match codec.decode(&mut buf) {
                        Ok(Some(response)) => {
                            dispatch_response(&inflight, &outbound, &settings, response)
                        }
                        Ok(None) => {}
                        Err(err) => {
                            // cannot attribute the frame to a request, so the
                            // whole connection fails
                            tracing::warn!(error = %err, "undecodable response frame");
                            *last_error.lock() = Some(err.to_string());
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            },
        }
    }

    healthy.store(false, Ordering::SeqCst);
    closing.cancel();
    drain(&inflight);
}

/// Route one response frame to its in-flight entry.
fn dispatch_response(
    inflight: &InFlightTable,
    outbound: &mpsc::UnboundedSender<Outbound>,
    settings: &ConnectionSettings,
    response: Response,
) {
    let request_id = response.request_id.clone();
    let action = {
        let mut table = inflight.lock();
        let Some(entry) = table.get_mut(&request_id) else {
            // cancelled or already-completed request; never mis-route
            tracing::debug!(request_id = %request_id, "dropping response for unknown request id");
            return;
        };
        match entry.acc.absorb(&response) {
            Dispatch::Pending => return,
            Dispatch::Done(bytes) => {
                if let Some(entry) = table.remove(&request_id) {
                    let _ = entry.tx.send(Ok(bytes));
                }
                return;
            }
            Dispatch::Failed(err) => {
                if let Some(entry) = table.remove(&request_id) {
                    let _ = entry.tx.send(Err(err));
                }
                return;
            }
            Dispatch::Authenticate => Dispatch::Authenticate,
        }
    };
    let Dispatch::Authenticate = action else {
        return;
    };

    let credentials = settings
        .credentials
        .clone()
        .unwrap_or_else(Credentials::from_env);
    let auth = Request::authentication(
        &request_id,
        &settings.auth_processor,
        credentials.sasl_token(),
    );
    let mut codec = GraphsonCodec::new();
    let mut buf = BytesMut::new();
    let failure = match codec.encode(auth, &mut buf) {
        Ok(()) => {
            let sent = outbound.send(Outbound {
                request_id: request_id.clone(),
                frame: buf.to_vec(),
            });
            match sent {
                Ok(()) => None,
                Err(_) => Some(DriverError::ConnectionClosed),
            }
        }
        Err(err) => Some(DriverError::from(err)),
    };
    if let Some(err) = failure {
        if let Some(entry) = inflight.lock().remove(&request_id) {
            let _ = entry.tx.send(Err(err));
        }
    }
}

/// Complete every outstanding request with `ConnectionClosed`.
fn drain(inflight: &InFlightTable) {
    let entries: Vec<InFlight> = {
        let mut table = inflight.lock();
        table.drain().map(|(_, entry)| entry).collect()
    };
    for entry in entries {
        let _ = entry.tx.send(Err(DriverError::ConnectionClosed));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gremlin::message::{ResponseResult, ResponseStatus};
    use serde_json::value::RawValue;

    fn response(id: &str, status_code: u16, data: Option<&str>) -> Response {
        Response {
            request_id: id.to_string(),
            status: ResponseStatus {
                code: status_code,
                message: String::new(),
                attributes: HashMap::new(),
            },
            result: ResponseResult {
                data: data.map(|d| RawValue::from_string(d.to_string()).unwrap()),
                meta: HashMap::new(),
            },
        }
    }

    #[test]
    fn test_single_success_returns_data_verbatim() {
        let mut acc = ResultAccumulator::default();
        match acc.absorb(&response("r1", 200, Some("[1, 2, 3]"))) {
            Dispatch::Done(bytes) => assert_eq!(bytes, b"[1, 2, 3]"),
            other => panic!("unexpected dispatch {other:?}"),
        }
    }

    #[test]
    fn test_no_content_returns_empty() {
        let mut acc = ResultAccumulator::default();
        // any data on a 204 is ignored
        match acc.absorb(&response("r1", 204, Some("[1,2,3]"))) {
            Dispatch::Done(bytes) => assert!(bytes.is_empty()),
            other => panic!("unexpected dispatch {other:?}"),
        }
    }

    #[test]
    fn test_batched_chunks_concatenate_in_arrival_order() {
        let mut acc = ResultAccumulator::default();
        assert!(matches!(
            acc.absorb(&response("r1", 206, Some("[1, 2]"))),
            Dispatch::Pending
        ));
        assert!(matches!(
            acc.absorb(&response("r1", 206, Some("[3, 4]"))),
            Dispatch::Pending
        ));
        match acc.absorb(&response("r1", 200, Some("[5, 6]"))) {
            Dispatch::Done(bytes) => assert_eq!(bytes, b"[1,2,3,4,5,6]"),
            other => panic!("unexpected dispatch {other:?}"),
        }
    }

    #[test]
    fn test_error_status_maps_through_table() {
        let mut acc = ResultAccumulator::default();
        match acc.absorb(&response("r1", 500, None)) {
            Dispatch::Failed(err) => assert_eq!(err.to_string(), "Server error"),
            other => panic!("unexpected dispatch {other:?}"),
        }
    }

    #[test]
    fn test_unknown_error_status() {
        let mut acc = ResultAccumulator::default();
        match acc.absorb(&response("r1", 418, None)) {
            Dispatch::Failed(err) => {
                assert!(matches!(err, DriverError::Unknown { code: 418 }))
            }
            other => panic!("unexpected dispatch {other:?}"),
        }
    }

    #[test]
    fn test_authenticate_keeps_entry_pending() {
        let mut acc = ResultAccumulator::default();
        assert!(matches!(
            acc.absorb(&response("r1", 407, None)),
            Dispatch::Authenticate
        ));
        // the eventual 200 on the reused id still completes normally
        match acc.absorb(&response("r1", 200, Some("[\"ok\"]"))) {
            Dispatch::Done(bytes) => assert_eq!(bytes, b"[\"ok\"]"),
            other => panic!("unexpected dispatch {other:?}"),
        }
    }

    #[test]
    fn test_malformed_chunk_fails_the_request() {
        let mut acc = ResultAccumulator::default();
        match acc.absorb(&response("r1", 206, Some("{\"not\":\"an array\"}"))) {
            Dispatch::Failed(DriverError::Wire(_)) => {}
            other => panic!("unexpected dispatch {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_unknown_id_is_dropped() {
        let inflight: InFlightTable = Arc::new(Mutex::new(HashMap::new()));
        let (outbound, _rx) = mpsc::unbounded_channel();
        let settings = ConnectionSettings::default();
        // must not panic nor create entries
        dispatch_response(&inflight, &outbound, &settings, response("ghost", 200, None));
        assert!(inflight.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_completes_sink_exactly_once() {
        let inflight: InFlightTable = Arc::new(Mutex::new(HashMap::new()));
        let (outbound, _outbound_rx) = mpsc::unbounded_channel();
        let settings = ConnectionSettings::default();
        let (tx, rx) = oneshot::channel();
        inflight.lock().insert(
            "r1".to_string(),
            InFlight {
                tx,
                acc: ResultAccumulator::default(),
            },
        );

        dispatch_response(&inflight, &outbound, &settings, response("r1", 200, Some("[1]")));
        assert_eq!(rx.await.unwrap().unwrap(), b"[1]");
        assert!(inflight.lock().is_empty());

        // a late duplicate for the same id is dropped silently
        dispatch_response(&inflight, &outbound, &settings, response("r1", 200, Some("[2]")));
    }

    #[tokio::test]
    async fn test_drain_completes_every_sink_with_connection_closed() {
        let inflight: InFlightTable = Arc::new(Mutex::new(HashMap::new()));
        let mut receivers = Vec::new();
        for i in 0..3 {
            let (tx, rx) = oneshot::channel();
            inflight.lock().insert(
                format!("r{i}"),
                InFlight {
                    tx,
                    acc: ResultAccumulator::default(),
                },
            );
            receivers.push(rx);
        }

        drain(&inflight);
        assert!(inflight.lock().is_empty());
        for rx in receivers {
            match rx.await.unwrap() {
                Err(DriverError::ConnectionClosed) => {}
                other => panic!("expected ConnectionClosed, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_auth_challenge_enqueues_sasl_reply() {
        let inflight: InFlightTable = Arc::new(Mutex::new(HashMap::new()));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
        let settings = ConnectionSettings {
            credentials: Some(Credentials::new("user", "pass")),
            ..ConnectionSettings::default()
        };
        let (tx, _rx) = oneshot::channel();
        inflight.lock().insert(
            "r1".to_string(),
            InFlight {
                tx,
                acc: ResultAccumulator::default(),
            },
        );

        dispatch_response(&inflight, &outbound, &settings, response("r1", 407, None));

        // the entry survives the challenge
        assert!(inflight.lock().contains_key("r1"));

        let queued = outbound_rx.recv().await.unwrap();
        assert_eq!(queued.request_id, "r1");
        // frame body is the authentication request reusing the id
        let body = &queued.frame[1 + crate::gremlin::codec::MIME_TYPE.len()..];
        let req: Request = serde_json::from_slice(body).unwrap();
        assert_eq!(req.request_id, "r1");
        assert_eq!(req.op, "authentication");
        assert_eq!(req.processor, "traversal");
        assert_eq!(
            req.args.sasl.as_deref(),
            Some(Credentials::new("user", "pass").sasl_token().as_str())
        );
    }
}
