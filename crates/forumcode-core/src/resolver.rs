use percent_encoding::utf8_percent_encode;
use serde::Serialize;
use tracing::trace;

use crate::ast::{Document, Node, NodeKind, NodeSeq, Quote, plain_text};
use crate::context::{RenderContext, RenderOptions};
use crate::diagnostic::{
    Diagnostic, DiagnosticSeverity, W_POST_REF_AMBIGUOUS, W_QUOTE_NESTED,
};
use crate::embed::EmbedReference;
use crate::line_index::LineIndex;
use crate::permalink::{PATH_SEGMENT, PostRef, resolve_permalink};
use crate::span::Span;

/// A quote as seen by the editor layer: who, which post, and what was said.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteReference {
    pub quoted_author: Option<String>,
    pub quoted_post_ref: Option<PostRef>,
    /// Plain text of the body after nested quotes were removed.
    pub body: String,
}

pub struct ResolveResult {
    pub document: Document,
    pub embeds: Vec<EmbedReference>,
    pub quotes: Vec<QuoteReference>,
    pub diagnostics: Vec<Diagnostic>,
}

pub(crate) fn is_valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= 64
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Profile link of a mentioned user, or `None` when the name cannot be one.
pub fn resolve_mention(name: &str, options: &RenderOptions) -> Option<String> {
    let name = name.trim();
    if !is_valid_username(name) {
        trace!(name, "mention rejected");
        return None;
    }
    Some(format!(
        "{}/{}",
        options.profile_route.trim_end_matches('/'),
        utf8_percent_encode(name, PATH_SEGMENT)
    ))
}

/// Attaches links to mentions and quotes, removes quotes nested inside quotes
/// and collects the embed and quote side channels in document order.
pub fn resolve(
    mut document: Document,
    context: &RenderContext,
    line_index: &LineIndex,
) -> ResolveResult {
    let mut resolver = Resolver {
        context,
        line_index,
        embeds: Vec::new(),
        quotes: Vec::new(),
        diagnostics: Vec::new(),
    };
    resolver.resolve_nodes(&mut document.nodes);
    ResolveResult {
        document,
        embeds: resolver.embeds,
        quotes: resolver.quotes,
        diagnostics: resolver.diagnostics,
    }
}

struct Resolver<'a> {
    context: &'a RenderContext,
    line_index: &'a LineIndex,
    embeds: Vec<EmbedReference>,
    quotes: Vec<QuoteReference>,
    diagnostics: Vec<Diagnostic>,
}

impl Resolver<'_> {
    fn resolve_nodes(&mut self, nodes: &mut NodeSeq) {
        for node in nodes.iter_mut() {
            self.resolve_node(node);
        }
    }

    fn resolve_node(&mut self, node: &mut Node) {
        match &mut node.kind {
            NodeKind::Mention(mention) => {
                mention.href = resolve_mention(&mention.name, &self.context.options);
            }
            NodeKind::Embed(reference) => self.embeds.push(reference.clone()),
            NodeKind::Quote(quote) => {
                self.strip_nested_quotes(&mut quote.body);
                trim_breaks(&mut quote.body);
                self.resolve_quote(node.span, quote);
            }
            NodeKind::List(list) => {
                for item in &mut list.items {
                    self.resolve_nodes(item);
                }
            }
            NodeKind::Emphasis { children, .. }
            | NodeKind::Heading { children, .. }
            | NodeKind::Link { children, .. }
            | NodeKind::Spoiler { children } => self.resolve_nodes(children),
            NodeKind::Text(_)
            | NodeKind::LineBreak
            | NodeKind::CodeBlock { .. }
            | NodeKind::Image { .. }
            | NodeKind::Video(_) => {}
        }
    }

    fn resolve_quote(&mut self, span: Span, quote: &mut Quote) {
        self.resolve_nodes(&mut quote.body);
        if let Some(post_ref) = &quote.post_ref {
            if let PostRef::Number(number) = post_ref
                && self.context.post_numbers.contains(&number.to_string())
            {
                self.diagnostics.push(Diagnostic::new(
                    span,
                    self.line_index.range(span),
                    DiagnosticSeverity::Warning,
                    W_POST_REF_AMBIGUOUS,
                    format!(
                        "post id `{}` is read as a post number but also names a post",
                        number
                    ),
                ));
            }
            quote.permalink = Some(resolve_permalink(post_ref, self.context));
        }
        self.quotes.push(QuoteReference {
            quoted_author: quote.author.clone(),
            quoted_post_ref: quote.post_ref.clone(),
            body: plain_text(&quote.body).trim().to_string(),
        });
    }

    /// Removes every quote below a quote body, at any depth.
    fn strip_nested_quotes(&mut self, nodes: &mut NodeSeq) {
        let mut kept = Vec::with_capacity(nodes.len());
        for mut node in nodes.drain(..) {
            match &mut node.kind {
                NodeKind::Quote(_) => {
                    self.diagnostics.push(Diagnostic::new(
                        node.span,
                        self.line_index.range(node.span),
                        DiagnosticSeverity::Warning,
                        W_QUOTE_NESTED,
                        "quote inside a quote was removed",
                    ));
                    continue;
                }
                NodeKind::List(list) => {
                    for item in &mut list.items {
                        self.strip_nested_quotes(item);
                    }
                }
                NodeKind::Emphasis { children, .. }
                | NodeKind::Heading { children, .. }
                | NodeKind::Link { children, .. }
                | NodeKind::Spoiler { children } => self.strip_nested_quotes(children),
                _ => {}
            }
            kept.push(node);
        }
        *nodes = kept;
    }
}

/// Drops line breaks left at either end of a body once quotes were removed.
fn trim_breaks(nodes: &mut NodeSeq) {
    let is_break = |node: &Node| matches!(node.kind, NodeKind::LineBreak);
    let start = nodes.iter().position(|node| !is_break(node)).unwrap_or(nodes.len());
    nodes.drain(..start);
    while nodes.last().is_some_and(is_break) {
        nodes.pop();
    }
}
