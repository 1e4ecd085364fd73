//! Per-session translation memory

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied update applied to a session's context before translation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextPatch {
    /// Replace the context's user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Merge these fields into the form snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<Map<String, Value>>,
}

impl ContextPatch {
    /// A patch that only updates the form snapshot
    pub fn form(form_data: Map<String, Value>) -> Self {
        Self {
            user_id: None,
            form_data: Some(form_data),
        }
    }
}

/// Memory the translator keeps for one session
///
/// Exactly one context exists per active session. It survives across tool
/// results within the same session and is discarded with the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationContext {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Last-known form state, merged from patches and fill results
    #[serde(default)]
    pub form_snapshot: Map<String, Value>,

    /// Kinds of the most recent action batch produced for this session
    #[serde(default)]
    pub last_actions: Vec<String>,
}

impl TranslationContext {
    /// Create an empty context for a session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Apply a caller-supplied patch
    pub fn apply(&mut self, patch: ContextPatch) {
        if let Some(user_id) = patch.user_id {
            self.user_id = Some(user_id);
        }
        if let Some(form_data) = patch.form_data {
            self.merge_form_data(form_data);
        }
    }

    /// Merge fields into the form snapshot, newest value winning
    pub fn merge_form_data(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.form_snapshot.insert(key, value);
        }
    }

    /// Record the kinds of the batch just produced for this session
    pub fn note_emitted(&mut self, kinds: Vec<String>) {
        self.last_actions = kinds;
    }
}
