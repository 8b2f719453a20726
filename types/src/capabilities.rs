//! Client capability declarations sent with `initialize`.
//!
//! Individual capability payloads are free-form JSON: only the handful of
//! top-level keys is modelled, and anything left unset is omitted from the
//! wire so the server falls back to its defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level client capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceClientCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_document: Option<TextDocumentClientCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_document: Option<NotebookDocumentClientCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_help: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_definition: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_highlight: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_symbol: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_action: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_lens: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_link: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_provider: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatting: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_formatting: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_type_formatting: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_diagnostics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folding_range: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_range: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_editing_range: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_hierarchy: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_tokens: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moniker: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hierarchy: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlay_hint: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_edit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_edit: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_change_configuration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_change_watched_files: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_command: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_folders: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_tokens: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_lens: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_operations: Option<FileOperationsClientCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlay_hint: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Value>,
}

/// `workspace.fileOperations` capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOperationsClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_registration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_create: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub will_create: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_rename: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub will_rename: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub will_delete: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookDocumentClientCapabilities {
    pub synchronization: Value,
}
