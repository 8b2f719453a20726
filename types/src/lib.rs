//! Protocol data model for the LSP client.
//!
//! This crate contains the parameter shapes sent to and received from a
//! language server. Everything here is plain serde data with no IO and no
//! async, so it can be used from any layer.
//!
//! Optional fields are omitted from the encoded JSON when unset. Peers treat
//! an absent capability differently from a `null` one during negotiation.
//! The exceptions are `processId` and `rootUri` in [`InitializeParams`],
//! which the protocol requires and which encode as `null` when unknown.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod capabilities;
mod document;
mod initialize;
mod progress;

pub use capabilities::{
    ClientCapabilities, FileOperationsClientCapabilities, NotebookDocumentClientCapabilities,
    TextDocumentClientCapabilities, WorkspaceClientCapabilities,
};
pub use document::{
    ContentChange, DidChangeTextDocumentParams, DidOpenTextDocumentParams, Position, Range,
    TextDocumentItem, VersionedTextDocumentIdentifier,
};
pub use initialize::{ClientInfo, InitializeParams, TraceValue, WorkspaceFolder};
pub use progress::{CancelParams, NumberOrString, PROGRESS_METHOD, ProgressParams, ProtocolError};
