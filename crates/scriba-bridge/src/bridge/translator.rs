//! Tool result to UI action translation
//!
//! Each known tool maps to one variant of [`ToolReply`]; classification
//! happens in one place and the mapping is a single exhaustive match, so a
//! new tool is a new variant plus one arm, never a change to the dispatch
//! skeleton. Translation is a pure function of `(outcome, context)` and
//! never panics: a result shape the mapping cannot use degrades to an empty
//! action list.

use crate::actions::{ToastLevel, UiAction};
use crate::bridge::context::TranslationContext;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Form field the image-upload mapping writes its URL to
const UPLOAD_FIELD: &str = "image_url";

/// Panel opened to preview a freshly filled report form
const PREVIEW_PANEL: &str = "report_preview";

/// Terminal outcome of one tool invocation, as seen by the bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: String,
    /// Tool-specific result payload
    pub result: Value,
    /// Whether the invocation itself succeeded
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    /// A successful invocation carrying its result payload
    pub fn success(tool: impl Into<String>, result: Value) -> Self {
        Self {
            tool: tool.into(),
            result,
            success: true,
            error: None,
        }
    }

    /// A failed invocation carrying its error message
    pub fn failure(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            result: Value::Null,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Build an outcome from a raw `{ tool, result }` record
    ///
    /// Used for tool calls an agent performed outside the invoker's direct
    /// path: success defaults to true unless the record says otherwise.
    pub fn from_record(tool: impl Into<String>, result: Value) -> Self {
        let success = result
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let error = result
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            tool: tool.into(),
            result,
            success,
            error,
        }
    }
}

/// One reported validation problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// What a tool result means, independent of its raw shape
#[derive(Debug, Clone, PartialEq)]
enum ToolReply {
    /// Form-filling tool returning a `data` object of field values
    FillForm { data: Map<String, Value> },

    /// Validation tool returning `valid` plus per-field errors
    Validation {
        valid: bool,
        errors: Vec<FieldError>,
    },

    /// Document renderer; `url` is present only once the artifact exists
    RenderDocument {
        url: Option<String>,
        filename: Option<String>,
    },

    /// External content fetch (law lookup, web snapshot)
    ExternalContent {
        source: String,
        content: Option<String>,
        title: Option<String>,
    },

    /// Upload returning the stored artifact's URL and metadata
    Upload {
        url: Option<String>,
        metadata: Map<String, Value>,
    },

    /// Tool without a dedicated mapping
    Other { tool: String },
}

/// Maps tool outcomes to ordered UI action lists
#[derive(Debug, Default)]
pub struct ResultTranslator;

impl ResultTranslator {
    /// Create a translator
    pub fn new() -> Self {
        Self
    }

    /// Produce the ordered action list for one tool outcome
    ///
    /// The failure path short-circuits every tool-specific rule: exactly one
    /// error toast embedding the tool name and error string.
    pub fn translate(&self, outcome: &ToolOutcome, context: &TranslationContext) -> Vec<UiAction> {
        if !outcome.success {
            let reason = outcome.error.as_deref().unwrap_or("unknown error");
            return vec![UiAction::error_toast(format!(
                "Tool '{}' failed: {reason}",
                outcome.tool
            ))];
        }

        match Self::classify(outcome) {
            ToolReply::FillForm { data } => {
                let have_fields = !data.is_empty() || !context.form_snapshot.is_empty();
                let mut actions = vec![
                    UiAction::set_fields(data),
                    UiAction::success_toast("Report form updated"),
                ];
                if have_fields {
                    actions.push(UiAction::open_panel(PREVIEW_PANEL));
                }
                actions
            }

            ToolReply::Validation { valid, errors } => {
                if valid {
                    return vec![UiAction::success_toast("Report data is valid")];
                }
                let mut actions: Vec<UiAction> = errors
                    .iter()
                    .map(|e| UiAction::highlight(&e.field, &e.message))
                    .collect();
                let count = errors.len();
                let noun = if count == 1 { "error" } else { "errors" };
                actions.push(UiAction::error_toast(format!(
                    "Validation found {count} {noun}"
                )));
                actions
            }

            ToolReply::RenderDocument { url, filename } => {
                let mut actions = vec![
                    UiAction::StartPdfRender {
                        message: "Rendering report PDF".into(),
                    },
                    UiAction::UpdateProgress {
                        percent: 50,
                        message: "Rendering in progress".into(),
                    },
                ];
                if let Some(url) = url {
                    actions.push(UiAction::EndPdfRender { url, filename });
                }
                actions
            }

            ToolReply::ExternalContent {
                source,
                content,
                title,
            } => match content {
                Some(excerpt) => vec![
                    UiAction::InsertLawCitation {
                        source: source.clone(),
                        excerpt,
                        title,
                    },
                    UiAction::success_toast(format!("Citation from {source} inserted")),
                ],
                None => Vec::new(),
            },

            ToolReply::Upload { url, metadata } => match url {
                Some(url) => vec![
                    UiAction::SetField {
                        field: UPLOAD_FIELD.into(),
                        value: json!(url),
                        metadata: if metadata.is_empty() {
                            None
                        } else {
                            Some(Value::Object(metadata))
                        },
                    },
                    UiAction::success_toast("Image uploaded"),
                ],
                None => Vec::new(),
            },

            ToolReply::Other { tool } => vec![UiAction::toast(
                format!("Tool '{tool}' completed"),
                ToastLevel::Success,
            )],
        }
    }

    /// Classify a successful outcome by tool name and payload shape
    fn classify(outcome: &ToolOutcome) -> ToolReply {
        let result = &outcome.result;
        match outcome.tool.as_str() {
            "fill_report_form" => ToolReply::FillForm {
                data: result
                    .get("data")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            },

            "validate_report_data" => ToolReply::Validation {
                valid: result.get("valid").and_then(Value::as_bool).unwrap_or(false),
                errors: result
                    .get("errors")
                    .and_then(Value::as_array)
                    .map(|errors| {
                        errors
                            .iter()
                            .filter_map(|e| {
                                Some(FieldError {
                                    field: e.get("field")?.as_str()?.to_string(),
                                    message: e
                                        .get("message")
                                        .and_then(Value::as_str)
                                        .unwrap_or("invalid")
                                        .to_string(),
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            },

            "render_report_pdf" => ToolReply::RenderDocument {
                url: result.get("url").and_then(Value::as_str).map(String::from),
                filename: result
                    .get("filename")
                    .and_then(Value::as_str)
                    .map(String::from),
            },

            "lookup_law" | "capture_web_snapshot" => ToolReply::ExternalContent {
                source: result
                    .get("source")
                    .or_else(|| result.get("url"))
                    .and_then(Value::as_str)
                    .unwrap_or(&outcome.tool)
                    .to_string(),
                content: result
                    .get("content")
                    .and_then(Value::as_str)
                    .filter(|c| !c.is_empty())
                    .map(String::from),
                title: result
                    .get("title")
                    .and_then(Value::as_str)
                    .map(String::from),
            },

            "upload_image" => {
                let mut metadata = Map::new();
                for key in ["width", "height", "format", "size"] {
                    if let Some(value) = result.get(key) {
                        metadata.insert(key.to_string(), value.clone());
                    }
                }
                ToolReply::Upload {
                    url: result.get("url").and_then(Value::as_str).map(String::from),
                    metadata,
                }
            }

            _ => ToolReply::Other {
                tool: outcome.tool.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(outcome: &ToolOutcome) -> Vec<UiAction> {
        ResultTranslator::new().translate(outcome, &TranslationContext::new("s1"))
    }

    #[test]
    fn test_failure_short_circuits_to_one_error_toast() {
        let outcome = ToolOutcome::failure("render_report_pdf", "printer on fire");
        let actions = translate(&outcome);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            UiAction::ShowToast { message, level } => {
                assert_eq!(*level, ToastLevel::Error);
                assert!(message.contains("render_report_pdf"));
                assert!(message.contains("printer on fire"));
            }
            other => panic!("expected toast, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_without_message_uses_generic_text() {
        let mut outcome = ToolOutcome::failure("lookup_law", "x");
        outcome.error = None;
        let actions = translate(&outcome);
        match &actions[0] {
            UiAction::ShowToast { message, .. } => assert!(message.contains("unknown error")),
            other => panic!("expected toast, got {other:?}"),
        }
    }

    #[test]
    fn test_fill_form_maps_to_fields_toast_preview() {
        let outcome = ToolOutcome::success(
            "fill_report_form",
            json!({ "data": { "title": "Inspection", "severity": "low" } }),
        );
        let actions = translate(&outcome);
        let kinds: Vec<&str> = actions.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec!["set_fields", "show_toast", "open_panel"]);
        match &actions[0] {
            UiAction::SetFields { fields } => assert_eq!(fields["title"], "Inspection"),
            other => panic!("expected set_fields, got {other:?}"),
        }
    }

    #[test]
    fn test_fill_form_opens_preview_when_only_context_has_fields() {
        let mut context = TranslationContext::new("s1");
        context.merge_form_data(
            [("title".to_string(), json!("Old title"))]
                .into_iter()
                .collect(),
        );
        let outcome = ToolOutcome::success("fill_report_form", json!({ "data": {} }));
        let actions = ResultTranslator::new().translate(&outcome, &context);
        assert!(actions.iter().any(|a| a.kind() == "open_panel"));
    }

    #[test]
    fn test_validation_success_is_single_toast() {
        let outcome = ToolOutcome::success("validate_report_data", json!({ "valid": true }));
        let actions = translate(&outcome);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind(), "show_toast");
    }

    #[test]
    fn test_validation_failure_highlights_each_field() {
        let outcome = ToolOutcome::success(
            "validate_report_data",
            json!({
                "valid": false,
                "errors": [
                    { "field": "title", "message": "required" },
                    { "field": "date", "message": "not a date" }
                ]
            }),
        );
        let actions = translate(&outcome);
        assert_eq!(actions.len(), 3);
        assert_eq!(
            actions[0],
            UiAction::highlight("title", "required"),
        );
        assert_eq!(actions[1], UiAction::highlight("date", "not a date"));
        match &actions[2] {
            UiAction::ShowToast { message, level } => {
                assert_eq!(*level, ToastLevel::Error);
                assert!(message.contains('2'));
            }
            other => panic!("expected toast, got {other:?}"),
        }
    }

    #[test]
    fn test_render_without_url_omits_completion() {
        let outcome = ToolOutcome::success("render_report_pdf", json!({}));
        let kinds: Vec<&str> = translate(&outcome).iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec!["start_pdf_render", "update_progress"]);
    }

    #[test]
    fn test_render_with_url_is_ordered_triple() {
        let outcome = ToolOutcome::success(
            "render_report_pdf",
            json!({ "url": "https://files/report.pdf", "filename": "report.pdf" }),
        );
        let actions = translate(&outcome);
        let kinds: Vec<&str> = actions.iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec!["start_pdf_render", "update_progress", "end_pdf_render"]
        );
        match &actions[2] {
            UiAction::EndPdfRender { url, filename } => {
                assert_eq!(url, "https://files/report.pdf");
                assert_eq!(filename.as_deref(), Some("report.pdf"));
            }
            other => panic!("expected end_pdf_render, got {other:?}"),
        }
    }

    #[test]
    fn test_law_lookup_without_content_emits_nothing() {
        let outcome = ToolOutcome::success("lookup_law", json!({ "source": "BGB" }));
        assert!(translate(&outcome).is_empty());
    }

    #[test]
    fn test_law_lookup_with_content_inserts_citation() {
        let outcome = ToolOutcome::success(
            "lookup_law",
            json!({ "source": "BGB § 823", "content": "Wer vorsätzlich..." }),
        );
        let actions = translate(&outcome);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind(), "insert_law_citation");
        assert_eq!(actions[1].kind(), "show_toast");
    }

    #[test]
    fn test_upload_binds_url_and_metadata() {
        let outcome = ToolOutcome::success(
            "upload_image",
            json!({ "url": "https://cdn/img.webp", "width": 800, "height": 600, "format": "webp", "size": 12345 }),
        );
        let actions = translate(&outcome);
        match &actions[0] {
            UiAction::SetField {
                field,
                value,
                metadata,
            } => {
                assert_eq!(field, "image_url");
                assert_eq!(value, &json!("https://cdn/img.webp"));
                let meta = metadata.as_ref().unwrap();
                assert_eq!(meta["width"], 800);
                assert_eq!(meta["format"], "webp");
            }
            other => panic!("expected set_field, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tool_gets_generic_toast() {
        let outcome = ToolOutcome::success("reticulate_splines", json!({ "splines": 7 }));
        let actions = translate(&outcome);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            UiAction::ShowToast { message, level } => {
                assert_eq!(*level, ToastLevel::Success);
                assert!(message.contains("reticulate_splines"));
            }
            other => panic!("expected toast, got {other:?}"),
        }
    }

    #[test]
    fn test_translate_is_deterministic() {
        let outcome = ToolOutcome::success(
            "validate_report_data",
            json!({ "valid": false, "errors": [{ "field": "title", "message": "required" }] }),
        );
        let context = TranslationContext::new("s1");
        let translator = ResultTranslator::new();
        let first = translator.translate(&outcome, &context);
        let second = translator.translate(&outcome, &context);
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_record_derives_failure() {
        let outcome = ToolOutcome::from_record(
            "lookup_law",
            json!({ "success": false, "error": "rate limited" }),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("rate limited"));
    }
}
