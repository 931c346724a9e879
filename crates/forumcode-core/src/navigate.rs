use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::emit::{MENTION_CLASS, QUOTE_LINK_CLASS};

/// A click on a link inside a rendered post, as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkClick {
    /// Value of the link's `class` attribute.
    pub class: String,
    pub href: String,
    #[serde(default = "primary")]
    pub primary_button: bool,
    /// Any of ctrl, meta, shift or alt held.
    #[serde(default)]
    pub modified: bool,
}

fn primary() -> bool {
    true
}

impl LinkClick {
    pub fn new(class: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            href: href.into(),
            primary_button: true,
            modified: false,
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.class.split_ascii_whitespace().any(|c| c == class)
    }
}

/// Navigation surface of the host page.
pub trait Page {
    fn current_path(&self) -> String;
    fn has_anchor(&self, anchor: &str) -> bool;
    fn scroll_into_view(&mut self, anchor: &str);
    fn highlight(&mut self, anchor: &str, duration: Duration);
    /// Rewrites the address bar without adding a history entry.
    fn replace_url(&mut self, href: &str);
    /// Client-side route change.
    fn push_route(&mut self, href: &str);
    /// Full page load.
    fn load(&mut self, href: &str);
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Navigation {
    /// Left to the browser's default handling.
    Ignored,
    ClientRoute,
    InPage { anchor: String },
    FullLoad,
}

/// Routes a click on a mention or quote link. Returns [`Navigation::Ignored`]
/// when the default browser behaviour should apply.
pub fn intercept<P: Page>(click: &LinkClick, page: &mut P, highlight: Duration) -> Navigation {
    if click.modified || !click.primary_button || click.href.is_empty() {
        return Navigation::Ignored;
    }
    if click.has_class(MENTION_CLASS) {
        debug!(href = %click.href, "mention click routed");
        page.push_route(&click.href);
        return Navigation::ClientRoute;
    }
    if !click.has_class(QUOTE_LINK_CLASS) {
        return Navigation::Ignored;
    }

    let (path, anchor) = match click.href.split_once('#') {
        Some((path, anchor)) => (path, Some(anchor)),
        None => (click.href.as_str(), None),
    };
    if let Some(anchor) = anchor.filter(|anchor| !anchor.is_empty())
        && (path.is_empty() || same_path(path, &page.current_path()))
        && page.has_anchor(anchor)
    {
        page.scroll_into_view(anchor);
        page.highlight(anchor, highlight);
        page.replace_url(&click.href);
        return Navigation::InPage {
            anchor: anchor.to_string(),
        };
    }
    debug!(href = %click.href, "quoted post is not on this page");
    page.load(&click.href);
    Navigation::FullLoad
}

fn same_path(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
