//! UI action vocabulary
//!
//! The closed set of directives the bridge may send to a UI session. The
//! vocabulary is a tagged enum, so an unknown kind is unrepresentable once
//! typed; raw JSON from direct callers goes through [`UiAction::from_value`],
//! which is the whitelist boundary. Sequence numbers and timestamps are
//! stamped at emission time by the channel manager, never at construction.

use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of a toast notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Success,
    Error,
    Warning,
    Info,
}

/// A single directive sent to a UI session
///
/// Serialized as `{ "type": <kind>, "payload": { ... } }` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UiAction {
    /// Set a single form field
    SetField {
        field: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },

    /// Set several form fields at once
    SetFields { fields: Map<String, Value> },

    /// Open a named side panel, optionally with content to display
    OpenPanel {
        panel: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },

    /// Mark a form field with an inline message
    HighlightField { field: String, message: String },

    /// Show a transient notification
    ShowToast {
        message: String,
        #[serde(rename = "type")]
        level: ToastLevel,
    },

    /// Begin a document-render progress indicator
    StartPdfRender { message: String },

    /// Advance a progress indicator
    UpdateProgress { percent: u8, message: String },

    /// Complete a document render with the artifact location
    EndPdfRender {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },

    /// Insert a citation block at the cursor
    InsertLawCitation {
        source: String,
        excerpt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },

    /// Add an issue entry to the report's issue list
    AddIssue {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// Move focus to a form field
    Focus { field: String },
}

impl UiAction {
    /// Create a toast with an explicit level
    pub fn toast(message: impl Into<String>, level: ToastLevel) -> Self {
        Self::ShowToast {
            message: message.into(),
            level,
        }
    }

    /// Create a success toast
    pub fn success_toast(message: impl Into<String>) -> Self {
        Self::toast(message, ToastLevel::Success)
    }

    /// Create an error toast
    pub fn error_toast(message: impl Into<String>) -> Self {
        Self::toast(message, ToastLevel::Error)
    }

    /// Create an info toast
    pub fn info_toast(message: impl Into<String>) -> Self {
        Self::toast(message, ToastLevel::Info)
    }

    /// Create a single-field update
    pub fn set_field(field: impl Into<String>, value: Value) -> Self {
        Self::SetField {
            field: field.into(),
            value,
            metadata: None,
        }
    }

    /// Create a multi-field update
    pub fn set_fields(fields: Map<String, Value>) -> Self {
        Self::SetFields { fields }
    }

    /// Create a field highlight
    pub fn highlight(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HighlightField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an open-panel directive without content
    pub fn open_panel(panel: impl Into<String>) -> Self {
        Self::OpenPanel {
            panel: panel.into(),
            content: None,
        }
    }

    /// The wire name of this action's kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetField { .. } => "set_field",
            Self::SetFields { .. } => "set_fields",
            Self::OpenPanel { .. } => "open_panel",
            Self::HighlightField { .. } => "highlight_field",
            Self::ShowToast { .. } => "show_toast",
            Self::StartPdfRender { .. } => "start_pdf_render",
            Self::UpdateProgress { .. } => "update_progress",
            Self::EndPdfRender { .. } => "end_pdf_render",
            Self::InsertLawCitation { .. } => "insert_law_citation",
            Self::AddIssue { .. } => "add_issue",
            Self::Focus { .. } => "focus",
        }
    }

    /// Decode a raw JSON action from a direct caller
    ///
    /// This is a whitelist: the object must carry a known `type`, a `payload`
    /// object matching that kind's shape, and (if present) a numeric
    /// `timestamp`. Anything else is rejected.
    pub fn from_value(value: &Value) -> BridgeResult<UiAction> {
        let obj = value
            .as_object()
            .ok_or_else(|| BridgeError::invalid_action("action must be an object"))?;

        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BridgeError::invalid_action("action has no type"))?;

        let payload = obj
            .get("payload")
            .ok_or_else(|| BridgeError::invalid_action(format!("action '{kind}' has no payload")))?;
        if !payload.is_object() {
            return Err(BridgeError::invalid_action(format!(
                "action '{kind}' payload is not an object"
            )));
        }

        if let Some(ts) = obj.get("timestamp") {
            if !ts.is_number() {
                return Err(BridgeError::invalid_action(format!(
                    "action '{kind}' timestamp is not numeric"
                )));
            }
        }

        let tagged = serde_json::json!({ "type": kind, "payload": payload });
        serde_json::from_value(tagged)
            .map_err(|e| BridgeError::invalid_action(format!("action '{kind}': {e}")))
    }

    /// Semantic checks that survive typing
    ///
    /// Field and message strings that the UI dereferences must be non-empty;
    /// a progress percentage cannot exceed 100.
    pub fn validate(&self) -> BridgeResult<()> {
        match self {
            Self::SetField { field, .. } if field.is_empty() => {
                Err(BridgeError::invalid_action("set_field: empty field name"))
            }
            Self::HighlightField { field, message } if field.is_empty() || message.is_empty() => {
                Err(BridgeError::invalid_action(
                    "highlight_field: field and message must be non-empty",
                ))
            }
            Self::ShowToast { message, .. } if message.is_empty() => {
                Err(BridgeError::invalid_action("show_toast: empty message"))
            }
            Self::OpenPanel { panel, .. } if panel.is_empty() => {
                Err(BridgeError::invalid_action("open_panel: empty panel name"))
            }
            Self::Focus { field } if field.is_empty() => {
                Err(BridgeError::invalid_action("focus: empty field name"))
            }
            Self::AddIssue { title, .. } if title.is_empty() => {
                Err(BridgeError::invalid_action("add_issue: empty title"))
            }
            Self::EndPdfRender { url, .. } if url.is_empty() => {
                Err(BridgeError::invalid_action("end_pdf_render: empty url"))
            }
            Self::InsertLawCitation { excerpt, .. } if excerpt.is_empty() => {
                Err(BridgeError::invalid_action(
                    "insert_law_citation: empty excerpt",
                ))
            }
            Self::UpdateProgress { percent, .. } if *percent > 100 => Err(
                BridgeError::invalid_action("update_progress: percent above 100"),
            ),
            _ => Ok(()),
        }
    }
}

/// An action stamped for delivery to one session
///
/// Produced only by the channel manager; actions dropped before this point
/// never consume a sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedAction {
    #[serde(flatten)]
    pub action: UiAction,
    /// Emission wall-clock time, epoch milliseconds
    pub timestamp: i64,
    /// Per-session sequence number, strictly increasing from 1
    pub sequence: u64,
}
