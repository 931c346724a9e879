mod ast;
mod compose;
mod context;
mod diagnostic;
mod embed;
mod emit;
mod escape;
mod hydrate;
mod line_index;
mod navigate;
mod parser;
mod permalink;
mod render;
mod resolver;
mod span;

pub use ast::{
    Document, EmphasisStyle, List, Mention, Node, NodeKind, NodeSeq, Quote, VideoEmbed, VideoHost,
};
pub use compose::{embed_markup, mention_markup, quote_markup};
pub use context::{RenderContext, RenderOptions};
pub use diagnostic::{
    Diagnostic, DiagnosticSeverity, E_QUOTE_UNBALANCED, W_EMBED_ID_INVALID, W_EMBED_ID_SHORT,
    W_IMAGE_REJECTED, W_MENTION_INVALID, W_POST_REF_AMBIGUOUS, W_QUOTE_NESTED,
    W_QUOTE_REF_INVALID, W_TAG_DEPTH, W_TAG_STRAY_CLOSE, W_TAG_UNCLOSED, W_URL_REJECTED,
    W_VIDEO_UNSUPPORTED,
};
pub use embed::{
    CatchSummary, DataService, EmbedFetcher, EmbedKind, EmbedReference, EntityId, FetchError,
    GearSummary, RecordSummary, ServiceError, Summary,
};
pub use emit::{EMBED_CLASS, MENTION_CLASS, QUOTE_LINK_CLASS, emit_html, emit_html_sanitized};
pub use escape::{escape, escape_url_attr, push_escaped};
pub use hydrate::{
    Clock, DEFAULT_SETTLE_DELAY, EmbedState, HydrationReport, Hydrator, MountHost,
    MountRegistry, Placeholder,
};
pub use line_index::{LineIndex, Position, Range};
pub use navigate::{LinkClick, Navigation, Page, intercept};
pub use parser::{ParseResult, parse};
pub use permalink::{
    PermalinkTarget, PostNumberMap, PostRef, TopicLocation, post_anchor, resolve_permalink,
};
pub use render::{Transformed, excerpt, render_post, transform, transform_sanitized, validate};
pub use resolver::{QuoteReference, ResolveResult, resolve, resolve_mention};
pub use span::{Span, SpanError};
