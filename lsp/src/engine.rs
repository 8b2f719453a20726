//! Dispatch engine: owns a transport, frames outgoing messages and routes
//! inbound ones to a single [`ResponseHandler`].
//!
//! The transport is split on construction. The read half stays inside
//! [`Engine`] and is driven only by [`Engine::receive_one`] /
//! [`Engine::listen`]. The write half sits behind an async mutex in
//! [`MessageSender`], which can be cloned into other tasks: every message's
//! header and body are written under one lock acquisition, so concurrent
//! sends never interleave on the wire.
//!
//! Connection lifecycle:
//!
//! ```text
//! Unstarted ──initialize()──▶ Handshaking ──response──▶ Active ──EOF / cancel / fatal──▶ Closed
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use lspc_types::InitializeParams;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::codec::{self, CodecError, HeaderParser, MAX_FRAME_BYTES, RawHeader};
use crate::config::ClientConfig;
use crate::protocol::{Incoming, Notification, Request};
use crate::registry::RequestRegistry;
use crate::transport::{Transport, TransportError, TransportReader, TransportWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unstarted,
    Handshaking,
    Active,
    Closed,
}

/// Why [`Engine::listen`] returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The server closed its output stream.
    EndOfStream,
    /// The cancellation token fired.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("connection is closed")]
    Closed,
    #[error("cannot {operation} while connection is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },
    #[error("LSP initialize failed: {0}")]
    Handshake(String),
}

impl EngineError {
    /// Errors confined to one inbound message; the stream is still aligned.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Codec(e) if e.is_recoverable())
    }

    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Closed))
    }
}

/// Receives every decoded inbound message: responses and server notifications alike.
pub trait ResponseHandler: Send {
    fn handle(&mut self, message: Value);
}

impl<F> ResponseHandler for F
where
    F: FnMut(Value) + Send,
{
    fn handle(&mut self, message: Value) {
        self(message);
    }
}

type BoxedHandler = Box<dyn FnMut(Value) + Send>;

/// Routes messages to per-method handlers.
///
/// Messages without a `method` (responses) or with an unregistered one go to
/// the fallback, or are logged and dropped when there is none.
#[derive(Default)]
pub struct MethodTable {
    handlers: HashMap<String, BoxedHandler>,
    fallback: Option<BoxedHandler>,
}

impl MethodTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, method: impl Into<String>, handler: impl FnMut(Value) + Send + 'static) -> Self {
        self.handlers.insert(method.into(), Box::new(handler));
        self
    }

    pub fn fallback(mut self, handler: impl FnMut(Value) + Send + 'static) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }
}

impl ResponseHandler for MethodTable {
    fn handle(&mut self, message: Value) {
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_owned);

        if let Some(handler) = method.as_deref().and_then(|m| self.handlers.get_mut(m)) {
            handler(message);
            return;
        }
        if let Some(fallback) = self.fallback.as_mut() {
            fallback(message);
            return;
        }
        match method {
            Some(method) => tracing::info!("Unhandled response for method {method}"),
            None => tracing::info!("Unhandled response: {message}"),
        }
    }
}

/// Cloneable write handle. Sends are serialized and fire-and-forget: they
/// return once the bytes are flushed, not once the server has processed them.
#[derive(Clone)]
pub struct MessageSender {
    writer: Arc<Mutex<Box<dyn TransportWriter>>>,
    registry: Arc<RequestRegistry>,
}

impl MessageSender {
    /// Encode and write any serializable message.
    pub async fn send<M: Serialize + ?Sized>(&self, message: &M) -> Result<(), EngineError> {
        let encoded = codec::encode(message)?;

        let mut writer = self.writer.lock().await;
        writer.write_bytes(encoded.header()).await?;
        writer.write_bytes(encoded.body()).await?;
        writer.flush().await?;
        drop(writer);

        tracing::debug!(bytes = encoded.content_length(), "Sent LSP message");
        tracing::trace!(body = %String::from_utf8_lossy(encoded.body()), "Sent LSP body");
        Ok(())
    }

    /// Send a request with a freshly allocated id and return that id.
    ///
    /// Matching the eventual response is the caller's job.
    pub async fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<u64, EngineError> {
        let request = self.registry.request(method, params);
        self.send(&request).await?;
        Ok(request.id)
    }

    pub async fn send_notification(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<(), EngineError> {
        self.send(&Notification::new(method, params)).await
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }
}

pub struct Engine<H> {
    reader: Box<dyn TransportReader>,
    sender: MessageSender,
    handler: H,
    state: ConnectionState,
    max_frame_bytes: usize,
}

impl<H: ResponseHandler> Engine<H> {
    /// Take ownership of `transport` with a fresh registry and default limits.
    pub fn new<T: Transport>(transport: T, handler: H) -> Self {
        let (reader, writer) = transport.into_split();
        Self {
            reader: Box::new(reader),
            sender: MessageSender {
                writer: Arc::new(Mutex::new(Box::new(writer))),
                registry: Arc::new(RequestRegistry::new()),
            },
            handler,
            state: ConnectionState::Unstarted,
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Share an existing registry (several engines, or ids allocated elsewhere).
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<RequestRegistry>) -> Self {
        self.sender.registry = registry;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: &ClientConfig) -> Self {
        self.max_frame_bytes = config.max_frame_bytes;
        self
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// A write handle usable from other tasks while this engine listens.
    #[must_use]
    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    pub async fn send<M: Serialize + ?Sized>(&self, message: &M) -> Result<(), EngineError> {
        self.sender.send(message).await
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Perform the `initialize` handshake.
    ///
    /// Messages that arrive before the matching response are dispatched to
    /// the handler as usual; the response itself is dispatched too and also
    /// returned. On success `initialized` is sent and the connection becomes
    /// [`ConnectionState::Active`].
    pub async fn initialize(&mut self, params: &InitializeParams) -> Result<Value, EngineError> {
        if self.state != ConnectionState::Unstarted {
            return Err(EngineError::InvalidState {
                operation: "initialize",
                state: self.state,
            });
        }

        let id = self.sender.registry.allocate();
        let request = Request::initialize(id, params).map_err(CodecError::Encode)?;
        self.sender.send(&request).await?;
        self.state = ConnectionState::Handshaking;

        loop {
            let message = match self.read_message().await {
                Ok(message) => message,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping inbound LSP message during handshake: {e}");
                    continue;
                }
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            };

            if Incoming::classify(&message).response_id() != Some(id) {
                self.dispatch(message);
                continue;
            }

            if let Some(error) = message.get("error") {
                let reason = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                self.dispatch(message);
                self.close();
                return Err(EngineError::Handshake(reason));
            }

            self.dispatch(message.clone());
            self.sender.send(&Notification::initialized()).await?;
            self.state = ConnectionState::Active;
            tracing::info!("LSP handshake complete");
            return Ok(message);
        }
    }

    /// Read, decode and dispatch exactly one inbound message.
    ///
    /// Recoverable errors leave the connection open; anything else closes it.
    pub async fn receive_one(&mut self) -> Result<(), EngineError> {
        if self.state == ConnectionState::Closed {
            return Err(EngineError::Closed);
        }
        match self.read_message().await {
            Ok(message) => {
                self.dispatch(message);
                Ok(())
            }
            Err(e) => {
                if !e.is_recoverable() {
                    self.close();
                }
                Err(e)
            }
        }
    }

    /// Dispatch inbound messages until end-of-stream, cancellation, or a fatal error.
    ///
    /// A message that fails content-type negotiation or decoding is logged
    /// and skipped. Cancellation interrupts a pending read; whatever part of
    /// a message was already read is discarded and the connection closes.
    pub async fn listen(&mut self, cancel: CancellationToken) -> Result<StopReason, EngineError> {
        if self.state == ConnectionState::Closed {
            return Err(EngineError::Closed);
        }
        if self.state != ConnectionState::Active {
            tracing::debug!("listen() entered from {:?}", self.state);
            self.state = ConnectionState::Active;
        }

        loop {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = self.receive_one() => Some(result),
            };

            match outcome {
                None => {
                    tracing::info!("LSP listen loop cancelled");
                    self.close();
                    return Ok(StopReason::Cancelled);
                }
                Some(Ok(())) => {}
                Some(Err(e)) if e.is_recoverable() => {
                    tracing::warn!("Skipping inbound LSP message: {e}");
                }
                Some(Err(e)) if e.is_end_of_stream() => {
                    tracing::info!("LSP server closed its output stream");
                    return Ok(StopReason::EndOfStream);
                }
                Some(Err(e)) => {
                    tracing::warn!("LSP reader error: {e}");
                    return Err(e);
                }
            }
        }
    }

    fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    fn dispatch(&mut self, message: Value) {
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        tracing::debug!(id = ?message.get("id"), method, "Received LSP message");
        self.handler.handle(message);
    }

    /// One header/body/decode cycle.
    ///
    /// The body is always consumed before content-type negotiation so that a
    /// rejected message leaves the stream positioned at the next header.
    async fn read_message(&mut self) -> Result<Value, EngineError> {
        let raw = self.read_header().await?;
        let body = self.reader.read_exactly(raw.content_length).await?;
        tracing::trace!(body = %String::from_utf8_lossy(&body), "Received LSP body");

        let header = raw.negotiate()?;
        let message = codec::decode_body(&body, header.content_length, header.encoding)?;
        Ok(message)
    }

    async fn read_header(&mut self) -> Result<RawHeader, EngineError> {
        let mut parser = HeaderParser::new(self.max_frame_bytes);
        loop {
            let line = match self.reader.read_line().await {
                Ok(line) => line,
                Err(TransportError::Closed) if parser.has_started() => {
                    tracing::warn!("LSP stream ended mid-header, discarding partial message");
                    return Err(TransportError::Closed.into());
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(raw) = parser.push_line(&line)? {
                return Ok(raw);
            }
        }
    }
}
