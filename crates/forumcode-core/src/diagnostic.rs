use serde::Serialize;

use crate::line_index::Range;
use crate::span::Span;

pub const W_TAG_UNCLOSED: &str = "W_TAG_UNCLOSED";
pub const W_TAG_STRAY_CLOSE: &str = "W_TAG_STRAY_CLOSE";
pub const W_TAG_DEPTH: &str = "W_TAG_DEPTH";
pub const W_URL_REJECTED: &str = "W_URL_REJECTED";
pub const W_IMAGE_REJECTED: &str = "W_IMAGE_REJECTED";
pub const W_VIDEO_UNSUPPORTED: &str = "W_VIDEO_UNSUPPORTED";
pub const W_MENTION_INVALID: &str = "W_MENTION_INVALID";
pub const W_EMBED_ID_INVALID: &str = "W_EMBED_ID_INVALID";
pub const W_EMBED_ID_SHORT: &str = "W_EMBED_ID_SHORT";
pub const W_QUOTE_NESTED: &str = "W_QUOTE_NESTED";
pub const W_QUOTE_REF_INVALID: &str = "W_QUOTE_REF_INVALID";
pub const W_POST_REF_AMBIGUOUS: &str = "W_POST_REF_AMBIGUOUS";

pub const E_QUOTE_UNBALANCED: &str = "E_QUOTE_UNBALANCED";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    #[serde(skip)]
    pub span: Span,
    pub range: Range,
    pub severity: DiagnosticSeverity,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        span: Span,
        range: Range,
        severity: DiagnosticSeverity,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            span,
            range,
            severity,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl DiagnosticSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        }
    }
}
