//! Bridge core: validation, payload budget, translation, emission

pub mod context;
pub mod core;
pub mod translator;

pub use context::{ContextPatch, TranslationContext};
pub use core::UiBridge;
pub use translator::{FieldError, ResultTranslator, ToolOutcome};
