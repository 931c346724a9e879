use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use once_cell::sync::Lazy;

use crate::ast::{Document, EmphasisStyle, Node, NodeKind, Quote, VideoEmbed, VideoHost};
use crate::context::RenderOptions;
use crate::embed::EmbedReference;
use crate::escape::{escape_url_attr, push_escaped};

pub const EMBED_CLASS: &str = "fc-embed";
pub const MENTION_CLASS: &str = "fc-mention";
pub const QUOTE_LINK_CLASS: &str = "fc-quote-link";

const LINK_REL: &str = "nofollow noopener noreferrer";

/// Emits the HTML fragment of a resolved document. Author text is escaped
/// here and nowhere else.
pub fn emit_html(document: &Document, options: &RenderOptions) -> String {
    let mut writer = HtmlWriter::new(options);
    writer.nodes(&document.nodes);
    writer.out
}

/// Emits HTML and passes it through the allow-list, for hosts that insert the
/// fragment without further checks.
pub fn emit_html_sanitized(document: &Document, options: &RenderOptions) -> String {
    let raw_html = emit_html(document, options);
    SANITIZER.clean(&raw_html).to_string()
}

static SANITIZER: Lazy<Builder<'static>> = Lazy::new(|| {
    let tags: HashSet<&'static str> = [
        "a",
        "blockquote",
        "br",
        "code",
        "details",
        "div",
        "em",
        "h1",
        "h2",
        "h3",
        "iframe",
        "img",
        "li",
        "ol",
        "pre",
        "s",
        "span",
        "strong",
        "summary",
        "u",
        "ul",
    ]
    .iter()
    .copied()
    .collect();

    let mut generic_attributes: HashSet<&'static str> = HashSet::new();
    generic_attributes.insert("class");
    generic_attributes.insert("title");

    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("a", ["href", "target"].iter().copied().collect());
    tag_attributes.insert(
        "img",
        ["src", "alt", "loading"].iter().copied().collect(),
    );
    tag_attributes.insert(
        "iframe",
        ["src", "allow", "allowfullscreen", "frameborder"]
            .iter()
            .copied()
            .collect(),
    );

    let mut generic_attribute_prefixes = HashSet::new();
    generic_attribute_prefixes.insert("data-");

    let mut builder = Builder::new();
    builder
        .tags(tags)
        .generic_attributes(generic_attributes)
        .tag_attributes(tag_attributes)
        .generic_attribute_prefixes(generic_attribute_prefixes)
        .link_rel(Some(LINK_REL));
    builder
});

struct HtmlWriter<'a> {
    out: String,
    options: &'a RenderOptions,
    // Depth of enclosing links; anchors must not nest.
    in_link: usize,
}

impl<'a> HtmlWriter<'a> {
    fn new(options: &'a RenderOptions) -> Self {
        Self {
            out: String::new(),
            options,
            in_link: 0,
        }
    }

    fn push(&mut self, markup: &str) {
        self.out.push_str(markup);
    }

    fn text(&mut self, raw: &str) {
        push_escaped(&mut self.out, raw);
    }

    fn url_attr(&mut self, name: &str, url: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape_url_attr(url));
        self.out.push('"');
    }

    fn attr(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        push_escaped(&mut self.out, value);
        self.out.push('"');
    }

    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Text(text) => self.text(text),
            NodeKind::LineBreak => self.push("<br />"),
            NodeKind::Emphasis { style, children } => self.emphasis(*style, children),
            NodeKind::Heading { level, children } => {
                let level = (*level).clamp(1, 3);
                self.push(&format!("<h{}>", level));
                self.nodes(children);
                self.push(&format!("</h{}>", level));
            }
            NodeKind::List(list) => {
                let tag = if list.ordered { "ol" } else { "ul" };
                self.push(&format!("<{} class=\"fc-list\">", tag));
                for item in &list.items {
                    self.push("<li>");
                    self.nodes(item);
                    self.push("</li>");
                }
                self.push(&format!("</{}>", tag));
            }
            NodeKind::CodeBlock { text } => {
                self.push("<pre class=\"fc-code\"><code>");
                self.text(text);
                self.push("</code></pre>");
            }
            NodeKind::Link { url, children } => self.link(url, children),
            NodeKind::Image { url } => {
                self.push("<img class=\"fc-image\"");
                self.url_attr("src", url);
                self.push(" alt=\"\" loading=\"lazy\" data-fallback=\"\" />");
            }
            NodeKind::Video(video) => self.video(video),
            NodeKind::Spoiler { children } => {
                self.push("<details class=\"fc-spoiler\"><summary>");
                let label = self.options.spoiler_label.as_str();
                push_escaped(&mut self.out, label);
                self.push("</summary><div class=\"fc-spoiler-body\">");
                self.nodes(children);
                self.push("</div></details>");
            }
            NodeKind::Mention(mention) => match mention.href.as_deref() {
                Some(href) if self.in_link == 0 => {
                    self.push(&format!("<a class=\"{}\"", MENTION_CLASS));
                    self.url_attr("href", href);
                    self.attr("data-user", &mention.name);
                    self.push(">@");
                    self.text(&mention.name);
                    self.push("</a>");
                }
                _ => {
                    self.push(&format!("<span class=\"{}\"", MENTION_CLASS));
                    self.attr("data-user", &mention.name);
                    self.push(">@");
                    self.text(&mention.name);
                    self.push("</span>");
                }
            },
            NodeKind::Quote(quote) => self.quote(quote),
            NodeKind::Embed(reference) => self.embed(reference),
        }
    }

    fn emphasis(&mut self, style: EmphasisStyle, children: &[Node]) {
        let tag = style.html_tag();
        self.push(&format!("<{}>", tag));
        self.nodes(children);
        self.push(&format!("</{}>", tag));
    }

    fn link(&mut self, url: &str, children: &[Node]) {
        if self.in_link > 0 {
            self.nodes(children);
            return;
        }
        self.push("<a class=\"fc-link\"");
        self.url_attr("href", url);
        self.attr("rel", LINK_REL);
        if self.options.open_links_in_new_tab {
            self.push(" target=\"_blank\"");
        }
        self.push(">");
        self.in_link += 1;
        self.nodes(children);
        self.in_link -= 1;
        self.push("</a>");
    }

    fn video(&mut self, video: &VideoEmbed) {
        let title = match video.host {
            VideoHost::YouTube => "YouTube video",
            VideoHost::Vimeo => "Vimeo video",
        };
        let auto = if video.auto_detected { " fc-video-auto" } else { "" };
        self.push(&format!(
            "<div class=\"fc-video fc-video-{}{}\"><iframe",
            video.host.as_str(),
            auto
        ));
        self.url_attr("src", &video.player_url());
        self.attr("title", title);
        self.push(" frameborder=\"0\"");
        self.attr("allow", video.allow());
        self.push(" allowfullscreen=\"\"></iframe></div>");
    }

    fn quote(&mut self, quote: &Quote) {
        self.push("<blockquote class=\"fc-quote\"");
        if let Some(post_ref) = &quote.post_ref {
            self.attr("data-post-ref", &post_ref.to_string());
        }
        self.push(">");
        if quote.author.is_some() || quote.permalink.is_some() {
            self.push("<div class=\"fc-quote-header\">");
            if let Some(author) = &quote.author {
                self.push("<span class=\"fc-quote-author\">");
                self.text(author);
                self.push("</span>");
            }
            if let Some(permalink) = &quote.permalink
                && self.in_link == 0
            {
                self.push(&format!("<a class=\"{}\"", QUOTE_LINK_CLASS));
                self.url_attr("href", &permalink.href());
                self.push(">");
                let label = self.options.quote_link_label.as_str();
                push_escaped(&mut self.out, label);
                self.push("</a>");
            }
            self.push("</div>");
        }
        self.push("<div class=\"fc-quote-body\">");
        self.nodes(&quote.body);
        self.push("</div></blockquote>");
    }

    fn embed(&mut self, reference: &EmbedReference) {
        self.push(&format!("<div class=\"{}\"", EMBED_CLASS));
        self.attr("data-kind", reference.kind.as_str());
        self.attr("data-external-id", &reference.external_id);
        self.push("><span class=\"fc-embed-loading\">");
        let label = self.options.loading_label.as_str();
        push_escaped(&mut self.out, label);
        self.push("</span></div>");
    }
}
