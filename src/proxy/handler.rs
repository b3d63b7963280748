//! Per-connection request/response state machine.
//!
//! ```text
//! AwaitingRequest ──▶ RequestReady ──hit──▶ ServeFromCache ─────────────────────────┐
//!        │                 │                                                         ▼
//!        │                 └─miss─▶ ForwardUpstream ─▶ AwaitingUpstreamResponse      Done
//!        │                                                   │                       ▲
//!        │                                                   ▼                       │
//!        │                                             ResponseReady ─▶ ReplyToClient┘
//!        └──────────── any error ────────────────────────────────────────────────────▶ Done
//! ```
//!
//! Each state owns exactly the data the next step needs, so sockets and
//! buffers are dropped (closed, freed) as soon as a transition leaves them
//! behind. Every `.await` in [`Connection::step`] is a suspension point on
//! this connection's own sockets only.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::cache::{policy, unix_now, CacheEntry, CacheStore, Fingerprint};
use crate::config::ProxyConfig;
use crate::http::{rewrite_request, RequestFramer, RequestHead, ResponseFramer, ResponseHead};
use crate::net::socket::connect_to_target;
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::proxy::error::{HandlerError, Peer};
use crate::proxy::transport::{read_message, write_message, ReceiveBuffer};
use crate::resilience::Deadlines;

/// Process-wide state handed to every connection.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<ProxyConfig>,
    pub cache: Arc<CacheStore>,
    pub deadlines: Deadlines,
}

impl SharedState {
    pub fn new(config: Arc<ProxyConfig>, cache: Arc<CacheStore>) -> Self {
        let deadlines = Deadlines::from_config(&config.timeouts);
        Self {
            config,
            cache,
            deadlines,
        }
    }
}

/// A fully framed client request.
#[derive(Debug)]
pub struct InboundRequest {
    pub raw: Vec<u8>,
    pub head: RequestHead,
}

/// A request that missed the cache and is about to be forwarded.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: InboundRequest,
    pub fingerprint: Fingerprint,
    pub ttl_hint: Option<u64>,
}

/// A fully framed upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub raw: Vec<u8>,
    pub head: ResponseHead,
}

/// How a connection ended.
#[derive(Debug)]
pub enum Outcome {
    /// Served from the cache without contacting upstream.
    CacheHit,
    /// Forwarded upstream; `cached` tells whether the response was stored.
    Forwarded { cached: bool },
    /// Aborted without a complete reply.
    Aborted(HandlerError),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::CacheHit => "cache_hit",
            Outcome::Forwarded { cached: true } => "forwarded_cached",
            Outcome::Forwarded { cached: false } => "forwarded",
            Outcome::Aborted(err) if err.is_idle_disconnect() => "idle",
            Outcome::Aborted(_) => "aborted",
        }
    }
}

/// Connection lifecycle states.
#[derive(Debug)]
pub enum State {
    AwaitingRequest,
    RequestReady(InboundRequest),
    ServeFromCache(Arc<CacheEntry>),
    ForwardUpstream(PendingRequest),
    AwaitingUpstreamResponse {
        pending: PendingRequest,
        upstream: TcpStream,
        started: Instant,
    },
    ResponseReady {
        pending: PendingRequest,
        response: UpstreamResponse,
        upstream: TcpStream,
    },
    ReplyToClient {
        payload: Arc<[u8]>,
        cached: bool,
    },
    Done(Outcome),
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::AwaitingRequest => "awaiting_request",
            State::RequestReady(_) => "request_ready",
            State::ServeFromCache(_) => "serve_from_cache",
            State::ForwardUpstream(_) => "forward_upstream",
            State::AwaitingUpstreamResponse { .. } => "awaiting_upstream_response",
            State::ResponseReady { .. } => "response_ready",
            State::ReplyToClient { .. } => "reply_to_client",
            State::Done(_) => "done",
        }
    }
}

/// One client connection and the shared state it consults.
pub struct Connection<S> {
    id: ConnectionId,
    client: S,
    shared: SharedState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(id: ConnectionId, client: S, shared: SharedState) -> Self {
        Self { id, client, shared }
    }

    /// Drive the state machine from `AwaitingRequest` to `Done`.
    pub async fn run(mut self) -> Outcome {
        let mut state = State::AwaitingRequest;
        let outcome = loop {
            let from = state.name();
            state = match self.step(state).await {
                Ok(State::Done(outcome)) => break outcome,
                Ok(next) => next,
                Err(err) => break Outcome::Aborted(err),
            };
            tracing::trace!(connection_id = %self.id, from, to = state.name(), "State transition");
        };

        self.finish(&outcome).await;
        outcome
    }

    async fn finish(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Aborted(err) if err.is_idle_disconnect() => {
                tracing::debug!(connection_id = %self.id, "Client left without a request");
            }
            Outcome::Aborted(err) => {
                tracing::warn!(connection_id = %self.id, kind = err.kind(), error = %err, "Connection aborted");
            }
            _ => {
                tracing::debug!(connection_id = %self.id, outcome = outcome.label(), "Connection done");
            }
        }
        metrics::record_connection(outcome.label());

        // Best effort; the socket closes on drop either way
        let _ = self.client.shutdown().await;
    }

    /// Perform the work of `state` and return the state that follows it.
    pub async fn step(&mut self, state: State) -> Result<State, HandlerError> {
        let config = Arc::clone(&self.shared.config);
        let deadlines = self.shared.deadlines;

        match state {
            State::AwaitingRequest => {
                let mut buffer = ReceiveBuffer::new(&config.limits)?;
                let mut framer = RequestFramer::new();
                read_message(&mut self.client, &mut framer, &mut buffer, Peer::Client, deadlines.read)
                    .await?;

                let head = framer.into_head().ok_or(HandlerError::Closed(Peer::Client))?;
                tracing::info!(
                    connection_id = %self.id,
                    method = %head.method,
                    path = %head.path,
                    bytes = buffer.len(),
                    "Request received"
                );
                Ok(State::RequestReady(InboundRequest {
                    raw: buffer.into_vec(),
                    head,
                }))
            }

            State::RequestReady(request) => {
                let ttl_hint = policy::ttl_hint(&request.head.headers);
                let fingerprint = Fingerprint::of(&request.raw);

                match self.shared.cache.lookup(fingerprint, unix_now()) {
                    Some(entry) => {
                        metrics::record_cache_lookup(true);
                        tracing::debug!(connection_id = %self.id, %fingerprint, "Cache hit");
                        Ok(State::ServeFromCache(entry))
                    }
                    None => {
                        metrics::record_cache_lookup(false);
                        tracing::debug!(connection_id = %self.id, %fingerprint, ?ttl_hint, "Cache miss");
                        Ok(State::ForwardUpstream(PendingRequest {
                            request,
                            fingerprint,
                            ttl_hint,
                        }))
                    }
                }
            }

            State::ServeFromCache(entry) => {
                write_message(&mut self.client, entry.payload(), Peer::Client, deadlines.write).await?;
                Ok(State::Done(Outcome::CacheHit))
            }

            State::ForwardUpstream(pending) => {
                let started = Instant::now();
                let mut upstream = connect_to_target(&config, deadlines.connect)
                    .await
                    .map_err(|source| HandlerError::UpstreamUnreachable {
                        address: config.target_address(),
                        source,
                    })?;

                let outbound = rewrite_request(
                    &pending.request.raw,
                    &pending.request.head,
                    &config.target_authority(),
                );
                write_message(&mut upstream, &outbound, Peer::Upstream, deadlines.write).await?;

                Ok(State::AwaitingUpstreamResponse {
                    pending,
                    upstream,
                    started,
                })
            }

            State::AwaitingUpstreamResponse {
                pending,
                mut upstream,
                started,
            } => {
                let mut framer = ResponseFramer::new();
                if pending.request.head.is_head() {
                    framer = framer.without_body();
                }
                let mut buffer = ReceiveBuffer::new(&config.limits)?;
                read_message(&mut upstream, &mut framer, &mut buffer, Peer::Upstream, deadlines.read)
                    .await?;
                metrics::record_upstream_duration(started);

                let head = framer.into_head().ok_or(HandlerError::Closed(Peer::Upstream))?;
                tracing::info!(
                    connection_id = %self.id,
                    status = head.status,
                    bytes = buffer.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Upstream response received"
                );
                Ok(State::ResponseReady {
                    pending,
                    response: UpstreamResponse {
                        raw: buffer.into_vec(),
                        head,
                    },
                    upstream,
                })
            }

            State::ResponseReady {
                pending,
                response,
                upstream,
            } => {
                drop(upstream);

                let response_hint = policy::ttl_hint(&response.head.headers);
                let ttl = policy::effective_ttl(response_hint, pending.ttl_hint, config.cache.ttl);
                let payload: Arc<[u8]> = response.raw.into();

                let cached = self.shared.cache.insert(
                    pending.fingerprint,
                    Arc::clone(&payload),
                    ttl,
                    unix_now(),
                );
                tracing::debug!(
                    connection_id = %self.id,
                    fingerprint = %pending.fingerprint,
                    ?response_hint,
                    request_hint = ?pending.ttl_hint,
                    ttl,
                    cached,
                    "Freshness resolved"
                );

                Ok(State::ReplyToClient { payload, cached })
            }

            State::ReplyToClient { payload, cached } => {
                write_message(&mut self.client, &payload, Peer::Client, deadlines.write).await?;
                Ok(State::Done(Outcome::Forwarded { cached }))
            }

            State::Done(outcome) => Ok(State::Done(outcome)),
        }
    }
}

/// Serve one accepted connection to completion.
pub async fn handle_connection<S>(id: ConnectionId, client: S, shared: SharedState) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Connection::new(id, client, shared).run().await
}
