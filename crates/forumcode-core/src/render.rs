use serde::Serialize;

use crate::ast::{Document, Node, NodeKind};
use crate::context::{RenderContext, RenderOptions};
use crate::diagnostic::{Diagnostic, DiagnosticSeverity, E_QUOTE_UNBALANCED, W_EMBED_ID_SHORT};
use crate::embed::EmbedReference;
use crate::emit::{emit_html, emit_html_sanitized};
use crate::parser::parse;
use crate::resolver::{QuoteReference, resolve};
use crate::span::Span;

/// Embed ids shorter than this are accepted but probably mistyped.
const MIN_EMBED_ID_LEN: usize = 3;

/// Result of running a post through the whole pipeline.
#[derive(Clone, Debug, Serialize)]
pub struct Transformed {
    pub html: String,
    #[serde(skip)]
    pub document: Document,
    /// Embed references in document order, for prefetching.
    pub embeds: Vec<EmbedReference>,
    pub quotes: Vec<QuoteReference>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses, resolves and emits a post.
pub fn transform(source: &str, context: &RenderContext) -> Transformed {
    transform_with(source, context, emit_html)
}

/// Like [`transform`], with the HTML passed through the sanitizer allow-list.
pub fn transform_sanitized(source: &str, context: &RenderContext) -> Transformed {
    transform_with(source, context, emit_html_sanitized)
}

pub fn render_post(source: &str, context: &RenderContext) -> String {
    transform(source, context).html
}

fn transform_with(
    source: &str,
    context: &RenderContext,
    emit: fn(&Document, &RenderOptions) -> String,
) -> Transformed {
    let parsed = parse(source);
    let resolved = resolve(parsed.document, context, &parsed.line_index);
    let html = emit(&resolved.document, &context.options);

    let mut diagnostics = parsed.diagnostics;
    diagnostics.extend(resolved.diagnostics);
    sort_diagnostics(&mut diagnostics);

    Transformed {
        html,
        document: resolved.document,
        embeds: resolved.embeds,
        quotes: resolved.quotes,
        diagnostics,
    }
}

/// Plain-text preview of a post: markup dropped, rich content replaced by
/// bracketed markers, whitespace collapsed. With `max_chars` the text is cut
/// at a character boundary and ends with an ellipsis.
pub fn excerpt(source: &str, max_chars: Option<usize>) -> String {
    let parsed = parse(source);
    let text = parsed.document.plain_text();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match max_chars {
        Some(max) if collapsed.chars().count() > max => {
            let cut: String = collapsed.chars().take(max).collect();
            format!("{}…", cut.trim_end())
        }
        _ => collapsed,
    }
}

/// Everything worth telling an author before they submit: recovered markup
/// problems plus checks that only matter while editing.
pub fn validate(source: &str) -> Vec<Diagnostic> {
    let parsed = parse(source);
    let line_index = parsed.line_index;
    let mut diagnostics = parsed.diagnostics;

    let mut short = Vec::new();
    collect_short_embeds(&parsed.document.nodes, &mut short);
    for (span, reference) in short {
        diagnostics.push(Diagnostic::new(
            span,
            line_index.range(span),
            DiagnosticSeverity::Warning,
            W_EMBED_ID_SHORT,
            format!(
                "{} id `{}` looks too short",
                reference.kind, reference.external_id
            ),
        ));
    }

    let resolved = resolve(parsed.document, &RenderContext::default(), &line_index);
    diagnostics.extend(resolved.diagnostics);

    let (opened, closed) = count_quote_tags(source);
    if opened != closed {
        let span = Span::at(0, source.len());
        diagnostics.push(Diagnostic::new(
            span,
            line_index.range(span),
            DiagnosticSeverity::Error,
            E_QUOTE_UNBALANCED,
            format!(
                "{} quote tag(s) opened but {} closed",
                opened, closed
            ),
        ));
    }

    sort_diagnostics(&mut diagnostics);
    diagnostics
}

fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|diag| (diag.span.start, diag.span.end));
}

fn collect_short_embeds<'a>(nodes: &'a [Node], out: &mut Vec<(Span, &'a EmbedReference)>) {
    for node in nodes {
        match &node.kind {
            NodeKind::Embed(reference) if reference.external_id.len() < MIN_EMBED_ID_LEN => {
                out.push((node.span, reference));
            }
            NodeKind::List(list) => {
                for item in &list.items {
                    collect_short_embeds(item, out);
                }
            }
            NodeKind::Quote(quote) => collect_short_embeds(&quote.body, out),
            NodeKind::Emphasis { children, .. }
            | NodeKind::Heading { children, .. }
            | NodeKind::Link { children, .. }
            | NodeKind::Spoiler { children } => collect_short_embeds(children, out),
            _ => {}
        }
    }
}

/// Counts `[quote...]` openers and `[/quote]` closers, ignoring case.
fn count_quote_tags(source: &str) -> (usize, usize) {
    let lower = source.to_ascii_lowercase();
    let closed = lower.matches("[/quote]").count();
    let opened = lower
        .match_indices("[quote")
        .filter(|(idx, needle)| {
            matches!(
                lower.as_bytes().get(idx + needle.len()),
                Some(b']' | b'=' | b' ' | b'\t')
            )
        })
        .count();
    (opened, closed)
}
