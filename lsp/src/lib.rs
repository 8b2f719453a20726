//! Client-side Language Server Protocol plumbing.
//!
//! Frames JSON-RPC messages with `Content-Length` headers, carries them over
//! a byte transport (usually a spawned server's stdio), and dispatches every
//! decoded inbound message to one caller-supplied handler.
//!
//! Response correlation is left to the caller: [`MessageSender::send_request`]
//! returns the allocated id and the handler sees the raw response value.

pub mod codec;
pub mod config;
pub mod engine;
pub mod process;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use codec::{CodecError, EncodedMessage, HeaderBlock, HeaderParser, RawHeader};
pub use config::{ClientConfig, ConfigError, LspConfig, ServerConfig};
pub use engine::{
    ConnectionState, Engine, EngineError, MessageSender, MethodTable, ResponseHandler, StopReason,
};
pub use process::spawn_server;
pub use protocol::{Incoming, Notification, Request};
pub use registry::RequestRegistry;
pub use transport::{
    MAX_HEADER_LINE_BYTES, StdioTransport, StreamTransport, Transport, TransportError,
    TransportReader, TransportWriter,
};
