use std::collections::HashMap;

use url::Url;

use crate::ast::{
    Document, EmphasisStyle, List, Mention, Node, NodeKind, NodeSeq, Quote, VideoEmbed, VideoHost,
};
use crate::diagnostic::{
    Diagnostic, DiagnosticSeverity, W_EMBED_ID_INVALID, W_IMAGE_REJECTED, W_MENTION_INVALID,
    W_QUOTE_REF_INVALID, W_TAG_DEPTH, W_TAG_STRAY_CLOSE, W_TAG_UNCLOSED, W_URL_REJECTED,
    W_VIDEO_UNSUPPORTED,
};
use crate::embed::{EmbedKind, EmbedReference, is_valid_external_id};
use crate::line_index::LineIndex;
use crate::permalink::PostRef;
use crate::resolver::is_valid_username;
use crate::span::Span;

/// Open wrappers beyond this depth are kept as literal text.
const MAX_DEPTH: usize = 64;
/// Longest `[...]` sequence considered as a tag.
const MAX_TAG_LEN: usize = 512;

pub struct ParseResult {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
    pub line_index: LineIndex,
}

/// Builds the node tree of a post. Never fails: anything that is not a
/// well-formed tag stays in the tree as text.
pub fn parse(source: &str) -> ParseResult {
    let mut parser = Parser::new(source);
    let nodes = parser.parse_nodes();
    ParseResult {
        document: Document {
            span: Span::at(0, source.len()),
            nodes,
        },
        diagnostics: parser.diagnostics,
        line_index: parser.line_index,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
enum TagName {
    Bold,
    Italic,
    Underline,
    Strike,
    Heading(u8),
    List,
    Item,
    Code,
    Url,
    Img,
    Video,
    Spoiler,
    Mention,
    Quote,
    Embed(EmbedKind),
}

impl TagName {
    fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let tag = match lower.as_str() {
            "b" => TagName::Bold,
            "i" => TagName::Italic,
            "u" => TagName::Underline,
            "s" => TagName::Strike,
            "h1" => TagName::Heading(1),
            "h2" => TagName::Heading(2),
            "h3" => TagName::Heading(3),
            "list" => TagName::List,
            "*" => TagName::Item,
            "code" => TagName::Code,
            "url" => TagName::Url,
            "img" => TagName::Img,
            "video" => TagName::Video,
            "spoiler" => TagName::Spoiler,
            "mention" => TagName::Mention,
            "quote" => TagName::Quote,
            other => return EmbedKind::from_name(other).map(TagName::Embed),
        };
        Some(tag)
    }

    fn as_str(self) -> &'static str {
        match self {
            TagName::Bold => "b",
            TagName::Italic => "i",
            TagName::Underline => "u",
            TagName::Strike => "s",
            TagName::Heading(1) => "h1",
            TagName::Heading(2) => "h2",
            TagName::Heading(_) => "h3",
            TagName::List => "list",
            TagName::Item => "*",
            TagName::Code => "code",
            TagName::Url => "url",
            TagName::Img => "img",
            TagName::Video => "video",
            TagName::Spoiler => "spoiler",
            TagName::Mention => "mention",
            TagName::Quote => "quote",
            TagName::Embed(kind) => kind.as_str(),
        }
    }

    /// Tags whose content is captured up to the closing tag and never parsed.
    fn is_verbatim(self, has_arg: bool) -> bool {
        match self {
            TagName::Code
            | TagName::Img
            | TagName::Video
            | TagName::Mention
            | TagName::Embed(_) => true,
            TagName::Url => !has_arg,
            _ => false,
        }
    }

    fn accepts(self, arg: Option<&str>, has_attrs: bool) -> bool {
        match self {
            TagName::Quote => true,
            TagName::Url => !has_attrs,
            TagName::List => !has_attrs && matches!(arg, None | Some("1")),
            _ => arg.is_none() && !has_attrs,
        }
    }
}

#[derive(Clone, Debug)]
struct TagToken {
    name: TagName,
    closing: bool,
    arg: Option<String>,
    attrs: Vec<(String, String)>,
    span: Span,
}

impl TagToken {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

struct Frame {
    tag: TagName,
    open: TagToken,
    children: NodeSeq,
    // Finished list items, each with the `[*]` marker that ended it.
    items: Vec<(NodeSeq, Span)>,
}

struct Parser<'a> {
    source: &'a str,
    line_index: LineIndex,
    diagnostics: Vec<Diagnostic>,
    root: NodeSeq,
    stack: Vec<Frame>,
    // Earliest offset from which a closing tag was searched for and not found.
    missing_close: HashMap<TagName, usize>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            line_index: LineIndex::new(source),
            diagnostics: Vec::new(),
            root: Vec::new(),
            stack: Vec::new(),
            missing_close: HashMap::new(),
        }
    }

    fn parse_nodes(&mut self) -> NodeSeq {
        let source = self.source;
        let bytes = source.as_bytes();
        let mut pos = 0;
        let mut text_start = 0;

        while pos < bytes.len() {
            match bytes[pos] {
                b'\n' | b'\r' => {
                    let len = if bytes[pos] == b'\r' && bytes.get(pos + 1) == Some(&b'\n') {
                        2
                    } else {
                        1
                    };
                    self.flush_text(text_start, pos);
                    self.push_line_break(Span::at(pos, pos + len));
                    pos += len;
                    text_start = pos;
                }
                b'[' => match scan_tag(source, pos) {
                    Some(token) => {
                        self.flush_text(text_start, pos);
                        pos = self.handle_tag(token);
                        text_start = pos;
                    }
                    None => pos += 1,
                },
                _ => pos += 1,
            }
        }
        self.flush_text(text_start, bytes.len());

        while let Some(frame) = self.stack.pop() {
            self.unwind(frame);
        }
        std::mem::take(&mut self.root)
    }

    fn handle_tag(&mut self, token: TagToken) -> usize {
        let end = token.span.end;
        if token.closing {
            self.close_tag(token);
            return end;
        }
        match token.name {
            TagName::Item => {
                if let Some(frame) = self.stack.last_mut().filter(|f| f.tag == TagName::List) {
                    let item = std::mem::take(&mut frame.children);
                    frame.items.push((item, token.span));
                } else {
                    self.push_literal(token.span);
                }
                end
            }
            name if name.is_verbatim(token.arg.is_some()) => self.verbatim(token),
            _ => {
                if self.stack.len() >= MAX_DEPTH {
                    self.push_diag(
                        token.span,
                        DiagnosticSeverity::Warning,
                        W_TAG_DEPTH,
                        format!("[{}] is nested too deeply and is shown as text", token.name.as_str()),
                    );
                    self.push_literal(token.span);
                } else {
                    self.stack.push(Frame {
                        tag: token.name,
                        open: token,
                        children: Vec::new(),
                        items: Vec::new(),
                    });
                }
                end
            }
        }
    }

    fn verbatim(&mut self, token: TagToken) -> usize {
        let content_start = token.span.end;
        let Some(close) = self.find_close(token.name, content_start) else {
            self.push_diag(
                token.span,
                DiagnosticSeverity::Warning,
                W_TAG_UNCLOSED,
                format!("[{}] is never closed", token.name.as_str()),
            );
            self.push_literal(token.span);
            return token.span.end;
        };

        let content = &self.source[content_start..close.start];
        let content_span = Span::at(content_start, close.start);
        let span = token.span.join(close);
        match self.build_verbatim(&token, content, content_span) {
            Some(kind) => self.push_node(Node::new(span, kind)),
            None => self.push_literal(span),
        }
        close.end
    }

    fn build_verbatim(
        &mut self,
        token: &TagToken,
        content: &str,
        content_span: Span,
    ) -> Option<NodeKind> {
        let trimmed = content.trim();
        let rejected = match token.name {
            TagName::Code => {
                return Some(NodeKind::CodeBlock {
                    text: trim_code(content).to_string(),
                });
            }
            TagName::Url => match validate_link_url(trimmed) {
                Some(url) => {
                    return Some(NodeKind::Link {
                        url,
                        children: vec![Node::new(
                            content_span,
                            NodeKind::Text(trimmed.to_string()),
                        )],
                    });
                }
                None => (W_URL_REJECTED, "link target is not an http(s) or mailto URL"),
            },
            TagName::Img => match validate_image_url(trimmed) {
                Some(url) => return Some(NodeKind::Image { url }),
                None => (W_IMAGE_REJECTED, "image source is not an http(s) URL"),
            },
            TagName::Video => match parse_video(trimmed) {
                Some(video) => return Some(NodeKind::Video(video)),
                None => (W_VIDEO_UNSUPPORTED, "video URL is not a YouTube or Vimeo link"),
            },
            TagName::Mention => {
                if is_valid_username(trimmed) {
                    return Some(NodeKind::Mention(Mention {
                        name: trimmed.to_string(),
                        href: None,
                    }));
                }
                (W_MENTION_INVALID, "mentioned user name contains invalid characters")
            }
            TagName::Embed(kind) => {
                if is_valid_external_id(trimmed) {
                    return Some(NodeKind::Embed(EmbedReference::new(kind, trimmed)));
                }
                (W_EMBED_ID_INVALID, "embed id contains invalid characters")
            }
            _ => return None,
        };
        let (code, message) = rejected;
        self.push_diag(
            token.span.join(content_span),
            DiagnosticSeverity::Warning,
            code,
            message,
        );
        None
    }

    fn close_tag(&mut self, token: TagToken) {
        if token.name == TagName::Item {
            // `[/*]` is optional inside lists.
            if !self.in_list() {
                self.push_literal(token.span);
            }
            return;
        }
        let Some(depth) = self.stack.iter().rposition(|frame| frame.tag == token.name) else {
            self.push_diag(
                token.span,
                DiagnosticSeverity::Warning,
                W_TAG_STRAY_CLOSE,
                format!("[/{}] has no matching opening tag", token.name.as_str()),
            );
            self.push_literal(token.span);
            return;
        };
        while self.stack.len() > depth + 1 {
            if let Some(frame) = self.stack.pop() {
                self.unwind(frame);
            }
        }
        if let Some(frame) = self.stack.pop() {
            self.close_frame(frame, token.span);
        }
    }

    fn close_frame(&mut self, frame: Frame, close: Span) {
        let span = frame.open.span.join(close);
        let kind = match frame.tag {
            TagName::Bold => emphasis(EmphasisStyle::Bold, frame.children),
            TagName::Italic => emphasis(EmphasisStyle::Italic, frame.children),
            TagName::Underline => emphasis(EmphasisStyle::Underline, frame.children),
            TagName::Strike => emphasis(EmphasisStyle::Strike, frame.children),
            TagName::Heading(level) => NodeKind::Heading {
                level,
                children: trim_nodes(frame.children),
            },
            TagName::Spoiler => NodeKind::Spoiler {
                children: trim_nodes(frame.children),
            },
            TagName::List => {
                let ordered = frame.open.arg.is_some();
                let items = frame
                    .items
                    .into_iter()
                    .map(|(item, _)| item)
                    .chain(std::iter::once(frame.children))
                    .map(trim_nodes)
                    .filter(|item| !item.is_empty())
                    .collect();
                NodeKind::List(List { ordered, items })
            }
            TagName::Quote => {
                let quote = self.build_quote(&frame.open, frame.children);
                NodeKind::Quote(quote)
            }
            TagName::Url => {
                let target = frame.open.arg.as_deref().and_then(validate_link_url);
                match target {
                    Some(url) => NodeKind::Link {
                        url,
                        children: frame.children,
                    },
                    None => {
                        self.push_diag(
                            frame.open.span,
                            DiagnosticSeverity::Warning,
                            W_URL_REJECTED,
                            "link target is not an http(s) or mailto URL",
                        );
                        self.push_literal(frame.open.span);
                        self.append_nodes(frame.children);
                        self.push_literal(close);
                        return;
                    }
                }
            }
            _ => {
                self.unwind(frame);
                return;
            }
        };
        self.push_node(Node::new(span, kind));
    }

    fn build_quote(&mut self, open: &TagToken, body: NodeSeq) -> Quote {
        let author = open
            .attr("user")
            .or(open.arg.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let post_ref = match open.attr("post_id").map(str::trim) {
            Some(raw) if is_valid_external_id(raw) => Some(PostRef::classify(raw)),
            Some(_) => {
                self.push_diag(
                    open.span,
                    DiagnosticSeverity::Warning,
                    W_QUOTE_REF_INVALID,
                    "quoted post id contains invalid characters",
                );
                None
            }
            None => None,
        };
        Quote {
            author,
            post_ref,
            body: trim_nodes(body),
            permalink: None,
        }
    }

    /// Puts an unclosed wrapper back as text: its tag becomes literal, its
    /// content stays in place.
    fn unwind(&mut self, frame: Frame) {
        self.push_diag(
            frame.open.span,
            DiagnosticSeverity::Warning,
            W_TAG_UNCLOSED,
            format!("[{}] is never closed", frame.tag.as_str()),
        );
        self.push_literal(frame.open.span);
        for (item, marker) in frame.items {
            self.append_nodes(item);
            self.push_literal(marker);
        }
        self.append_nodes(frame.children);
    }

    fn find_close(&mut self, name: TagName, from: usize) -> Option<Span> {
        if let Some(&failed_from) = self.missing_close.get(&name)
            && from >= failed_from
        {
            return None;
        }
        let needle = format!("[/{}]", name.as_str());
        let found = find_ignore_ascii_case(&self.source.as_bytes()[from..], needle.as_bytes())
            .map(|offset| Span::at(from + offset, from + offset + needle.len()));
        if found.is_none() {
            self.missing_close.entry(name).or_insert(from);
        }
        found
    }

    fn in_list(&self) -> bool {
        self.stack
            .last()
            .is_some_and(|frame| frame.tag == TagName::List)
    }

    fn in_link(&self) -> bool {
        self.stack.iter().any(|frame| frame.tag == TagName::Url)
    }

    fn children_mut(&mut self) -> &mut NodeSeq {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut self.root,
        }
    }

    /// Pushes a run of plain text. Outside links, bare video URLs in it
    /// become players.
    fn flush_text(&mut self, start: usize, end: usize) {
        let mut text_start = start;
        if start < end && !self.in_link() {
            for (found, video) in bare_videos(&self.source[start..end]) {
                let span = Span::at(start + found.start, start + found.end);
                self.push_text(text_start, span.start);
                self.push_node(Node::new(span, NodeKind::Video(video)));
                text_start = span.end;
            }
        }
        self.push_text(text_start, end);
    }

    fn push_text(&mut self, start: usize, end: usize) {
        if start < end {
            let text = self.source[start..end].to_string();
            self.push_node(Node::new(Span::at(start, end), NodeKind::Text(text)));
        }
    }

    fn push_literal(&mut self, span: Span) {
        let text = span.slice(self.source).to_string();
        self.push_node(Node::new(span, NodeKind::Text(text)));
    }

    fn push_line_break(&mut self, span: Span) {
        let children = self.children_mut();
        if let Some(last) = children.last()
            && last.kind.is_block()
            && last.span.end == span.start
        {
            return;
        }
        children.push(Node::new(span, NodeKind::LineBreak));
    }

    fn push_node(&mut self, node: Node) {
        let children = self.children_mut();
        if let NodeKind::Text(text) = &node.kind
            && let Some(last) = children.last_mut()
            && let NodeKind::Text(prev) = &mut last.kind
            && last.span.end == node.span.start
        {
            prev.push_str(text);
            last.span.end = node.span.end;
            return;
        }
        children.push(node);
    }

    fn append_nodes(&mut self, nodes: NodeSeq) {
        for node in nodes {
            self.push_node(node);
        }
    }

    fn push_diag(
        &mut self,
        span: Span,
        severity: DiagnosticSeverity,
        code: &'static str,
        message: impl Into<String>,
    ) {
        let range = self.line_index.range(span);
        self.diagnostics
            .push(Diagnostic::new(span, range, severity, code, message));
    }
}

fn emphasis(style: EmphasisStyle, children: NodeSeq) -> NodeKind {
    NodeKind::Emphasis { style, children }
}

/// Recognises `[name]`, `[/name]`, `[name=value]` and `[name key="value" ...]`
/// starting at `start`. Returns `None` for anything else, including known tags
/// written in a form they do not accept.
fn scan_tag(source: &str, start: usize) -> Option<TagToken> {
    let bytes = source.as_bytes();
    let limit = (start + MAX_TAG_LEN).min(bytes.len());
    let mut pos = start + 1;
    let closing = bytes.get(pos) == Some(&b'/');
    if closing {
        pos += 1;
    }
    let name_start = pos;
    while pos < limit && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'*') {
        pos += 1;
    }
    if pos == name_start {
        return None;
    }
    let name = TagName::from_name(&source[name_start..pos])?;

    let (arg, attrs, end) = match *bytes.get(pos)? {
        b']' => (None, Vec::new(), pos + 1),
        b'=' if !closing => {
            let value_start = pos + 1;
            let value_end = (value_start..limit).find(|&idx| bytes[idx] == b']')?;
            let raw = &source[value_start..value_end];
            if raw.contains(['\n', '[']) {
                return None;
            }
            (Some(unquote(raw.trim()).to_string()), Vec::new(), value_end + 1)
        }
        b' ' | b'\t' if !closing => {
            let (attrs, end) = scan_attrs(source, pos, limit)?;
            (None, attrs, end)
        }
        _ => return None,
    };
    if !closing && !name.accepts(arg.as_deref(), !attrs.is_empty()) {
        return None;
    }
    Some(TagToken {
        name,
        closing,
        arg,
        attrs,
        span: Span::at(start, end),
    })
}

fn scan_attrs(source: &str, mut pos: usize, limit: usize) -> Option<(Vec<(String, String)>, usize)> {
    let bytes = source.as_bytes();
    let mut attrs = Vec::new();
    loop {
        while pos < limit && matches!(bytes[pos], b' ' | b'\t') {
            pos += 1;
        }
        if pos >= limit {
            return None;
        }
        if bytes[pos] == b']' {
            return Some((attrs, pos + 1));
        }

        let key_start = pos;
        while pos < limit && (bytes[pos].is_ascii_alphanumeric() || matches!(bytes[pos], b'_' | b'-'))
        {
            pos += 1;
        }
        if pos == key_start || bytes.get(pos) != Some(&b'=') {
            return None;
        }
        let key = source[key_start..pos].to_ascii_lowercase();
        pos += 1;

        let value = if bytes.get(pos) == Some(&b'"') {
            let value_start = pos + 1;
            let value_end = (value_start..limit).find(|&idx| bytes[idx] == b'"')?;
            pos = value_end + 1;
            &source[value_start..value_end]
        } else {
            let value_start = pos;
            while pos < limit && !matches!(bytes[pos], b' ' | b'\t' | b']' | b'[' | b'"') {
                pos += 1;
            }
            if pos >= limit {
                return None;
            }
            &source[value_start..pos]
        };
        if value.contains('\n') {
            return None;
        }
        attrs.push((key, value.to_string()));
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
}

fn find_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Byte ranges of YouTube and Vimeo URLs written as plain words in `text`.
fn bare_videos(text: &str) -> Vec<(std::ops::Range<usize>, VideoEmbed)> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(offset) = find_ignore_ascii_case(&bytes[pos..], b"http") {
        let start = pos + offset;
        let mut end = start;
        while end < bytes.len() && !ends_bare_url(bytes[end]) {
            end += 1;
        }
        // Sentence punctuation after a URL is not part of it.
        while end > start && matches!(bytes[end - 1], b'.' | b',' | b';' | b':' | b'!' | b'?' | b')') {
            end -= 1;
        }
        let at_word_start = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        if at_word_start
            && let Some(mut video) = parse_video(&text[start..end])
        {
            video.auto_detected = true;
            found.push((start..end, video));
        }
        pos = end.max(start + 4);
    }
    found
}

fn ends_bare_url(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'<' | b'>' | b'"' | b'\'' | b'[' | b']')
}

/// Drops the newline right after `[code]` and right before `[/code]`.
fn trim_code(content: &str) -> &str {
    let content = content
        .strip_prefix("\r\n")
        .or_else(|| content.strip_prefix('\n'))
        .unwrap_or(content);
    content
        .strip_suffix("\r\n")
        .or_else(|| content.strip_suffix('\n'))
        .unwrap_or(content)
}

/// Removes leading and trailing whitespace and line breaks from a node run.
fn trim_nodes(mut nodes: NodeSeq) -> NodeSeq {
    while let Some(first) = nodes.first_mut() {
        match &mut first.kind {
            NodeKind::LineBreak => {
                nodes.remove(0);
            }
            NodeKind::Text(text) => {
                let trimmed = text.trim_start();
                if trimmed.is_empty() {
                    nodes.remove(0);
                } else {
                    if trimmed.len() != text.len() {
                        *text = trimmed.to_string();
                    }
                    break;
                }
            }
            _ => break,
        }
    }
    while let Some(last) = nodes.last_mut() {
        match &mut last.kind {
            NodeKind::LineBreak => {
                nodes.pop();
            }
            NodeKind::Text(text) => {
                let trimmed = text.trim_end();
                if trimmed.is_empty() {
                    nodes.pop();
                } else {
                    if trimmed.len() != text.len() {
                        *text = trimmed.to_string();
                    }
                    break;
                }
            }
            _ => break,
        }
    }
    nodes
}

pub(crate) fn validate_link_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url.into()),
        "mailto" => Some(url.into()),
        _ => None,
    }
}

fn validate_image_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url.into()),
        _ => None,
    }
}

/// Extracts the video id from a YouTube or Vimeo URL.
pub(crate) fn parse_video(raw: &str) -> Option<VideoEmbed> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let bare = host.strip_prefix("www.").unwrap_or(&host);
    let mut segments = url.path_segments()?;
    let (host, id) = match bare {
        "youtube.com" | "m.youtube.com" => {
            let id = match segments.next()? {
                "watch" => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())?,
                "shorts" | "embed" | "live" => segments.next()?.to_string(),
                _ => return None,
            };
            (VideoHost::YouTube, id)
        }
        "youtu.be" => (VideoHost::YouTube, segments.next()?.to_string()),
        "vimeo.com" => {
            let id = segments.next()?;
            if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (VideoHost::Vimeo, id.to_string())
        }
        _ => return None,
    };
    is_valid_external_id(&id).then_some(VideoEmbed {
        host,
        id,
        auto_detected: false,
    })
}
