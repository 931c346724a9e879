use crate::embed::EmbedReference;
use crate::permalink::{PermalinkTarget, PostRef};
use crate::span::Span;

pub type NodeSeq = Vec<Node>;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub span: Span,
    pub nodes: NodeSeq,
}

impl Document {
    /// Embed references in document order, including those nested in quotes or lists.
    pub fn embeds(&self) -> Vec<&EmbedReference> {
        let mut out = Vec::new();
        collect_embeds(&self.nodes, &mut out);
        out
    }

    /// Plain text of the whole post with markup removed.
    pub fn plain_text(&self) -> String {
        plain_text(&self.nodes)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub span: Span,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(span: Span, kind: NodeKind) -> Self {
        Self { span, kind }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Text(String),
    LineBreak,
    Emphasis {
        style: EmphasisStyle,
        children: NodeSeq,
    },
    Heading {
        level: u8,
        children: NodeSeq,
    },
    List(List),
    CodeBlock {
        text: String,
    },
    Link {
        url: String,
        children: NodeSeq,
    },
    Image {
        url: String,
    },
    Video(VideoEmbed),
    Spoiler {
        children: NodeSeq,
    },
    Mention(Mention),
    Quote(Quote),
    Embed(EmbedReference),
}

impl NodeKind {
    /// Block nodes absorb the newline that directly follows their closing tag.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeKind::Heading { .. }
                | NodeKind::List(_)
                | NodeKind::CodeBlock { .. }
                | NodeKind::Video(_)
                | NodeKind::Quote(_)
                | NodeKind::Embed(_)
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EmphasisStyle {
    Bold,
    Italic,
    Underline,
    Strike,
}

impl EmphasisStyle {
    pub fn html_tag(self) -> &'static str {
        match self {
            EmphasisStyle::Bold => "strong",
            EmphasisStyle::Italic => "em",
            EmphasisStyle::Underline => "u",
            EmphasisStyle::Strike => "s",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<NodeSeq>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VideoHost {
    YouTube,
    Vimeo,
}

impl VideoHost {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoHost::YouTube => "youtube",
            VideoHost::Vimeo => "vimeo",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VideoEmbed {
    pub host: VideoHost,
    pub id: String,
    /// Found as a bare URL in text rather than inside `[video]`.
    pub auto_detected: bool,
}

impl VideoEmbed {
    pub fn player_url(&self) -> String {
        match self.host {
            VideoHost::YouTube => format!("https://www.youtube.com/embed/{}", self.id),
            VideoHost::Vimeo => format!("https://player.vimeo.com/video/{}", self.id),
        }
    }

    pub(crate) fn allow(&self) -> &'static str {
        match self.host {
            VideoHost::YouTube => {
                "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture"
            }
            VideoHost::Vimeo => "autoplay; fullscreen; picture-in-picture",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mention {
    pub name: String,
    /// Profile link, filled in by the resolver.
    pub href: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    pub author: Option<String>,
    pub post_ref: Option<PostRef>,
    pub body: NodeSeq,
    /// Link to the quoted post, filled in by the resolver.
    pub permalink: Option<PermalinkTarget>,
}

fn collect_embeds<'a>(nodes: &'a [Node], out: &mut Vec<&'a EmbedReference>) {
    for node in nodes {
        match &node.kind {
            NodeKind::Embed(reference) => out.push(reference),
            NodeKind::List(list) => {
                for item in &list.items {
                    collect_embeds(item, out);
                }
            }
            NodeKind::Quote(quote) => collect_embeds(&quote.body, out),
            NodeKind::Emphasis { children, .. }
            | NodeKind::Heading { children, .. }
            | NodeKind::Link { children, .. }
            | NodeKind::Spoiler { children } => collect_embeds(children, out),
            _ => {}
        }
    }
}

/// Flattens nodes to text. Rich content is replaced by a bracketed marker and
/// block nodes end their line.
pub(crate) fn plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    push_plain_text(nodes, &mut out);
    out
}

fn push_plain_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::LineBreak => out.push('\n'),
            NodeKind::Emphasis { children, .. }
            | NodeKind::Link { children, .. }
            | NodeKind::Spoiler { children } => push_plain_text(children, out),
            NodeKind::Heading { children, .. } => {
                push_plain_text(children, out);
                out.push('\n');
            }
            NodeKind::List(list) => {
                for item in &list.items {
                    push_plain_text(item, out);
                    out.push('\n');
                }
            }
            NodeKind::CodeBlock { text } => {
                out.push_str(text);
                out.push('\n');
            }
            NodeKind::Image { .. } => out.push_str("[Image]"),
            NodeKind::Video(_) => out.push_str("[Video]\n"),
            NodeKind::Mention(mention) => {
                out.push('@');
                out.push_str(&mention.name);
            }
            NodeKind::Quote(_) => out.push_str("[Quote]\n"),
            NodeKind::Embed(reference) => {
                out.push('[');
                out.push_str(reference.kind.label());
                out.push_str("]\n");
            }
        }
    }
}
