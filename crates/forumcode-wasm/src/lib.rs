use std::collections::{HashMap, HashSet};
use std::time::Duration;

use forumcode_core::{
    Diagnostic, EmbedReference, LinkClick, Navigation, Page, PostNumberMap, QuoteReference,
    RenderContext, RenderOptions, TopicLocation,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct JsRenderContext {
    location: Option<JsLocation>,
    post_numbers: HashMap<String, u64>,
    forum_base: Option<String>,
    profile_route: Option<String>,
    open_links_in_new_tab: Option<bool>,
    quote_link_label: Option<String>,
    spoiler_label: Option<String>,
    loading_label: Option<String>,
    sanitized: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsLocation {
    category: Option<String>,
    subcategory: String,
    topic: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderResult {
    html: String,
    embeds: Vec<EmbedReference>,
    quotes: Vec<QuoteReference>,
    diagnostics: Vec<JsDiagnostic>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsDiagnostic {
    code: String,
    message: String,
    severity: String,
    range: JsRange,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsRange {
    start_line: usize,
    start_col: usize,
    end_line: usize,
    end_col: usize,
}

impl From<Diagnostic> for JsDiagnostic {
    fn from(diag: Diagnostic) -> Self {
        Self {
            code: diag.code.to_string(),
            severity: diag.severity.as_str().to_string(),
            message: diag.message,
            range: JsRange {
                start_line: diag.range.start.line,
                start_col: diag.range.start.character,
                end_line: diag.range.end.line,
                end_col: diag.range.end.character,
            },
        }
    }
}

/// Snapshot of the page a click happened on.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsPage {
    current_path: String,
    #[serde(default)]
    anchors: Vec<String>,
    #[serde(default)]
    highlight_ms: Option<u64>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum PageAction {
    ScrollIntoView { anchor: String },
    Highlight { anchor: String, duration_ms: u64 },
    ReplaceUrl { href: String },
    PushRoute { href: String },
    Load { href: String },
}

#[derive(Serialize)]
struct RouteResult {
    navigation: Navigation,
    actions: Vec<PageAction>,
}

/// Answers anchor lookups from the snapshot and records what the host
/// must do afterwards.
struct RecordingPage {
    current_path: String,
    anchors: HashSet<String>,
    actions: Vec<PageAction>,
}

impl Page for RecordingPage {
    fn current_path(&self) -> String {
        self.current_path.clone()
    }

    fn has_anchor(&self, anchor: &str) -> bool {
        self.anchors.contains(anchor)
    }

    fn scroll_into_view(&mut self, anchor: &str) {
        self.actions.push(PageAction::ScrollIntoView {
            anchor: anchor.to_string(),
        });
    }

    fn highlight(&mut self, anchor: &str, duration: Duration) {
        self.actions.push(PageAction::Highlight {
            anchor: anchor.to_string(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        });
    }

    fn replace_url(&mut self, href: &str) {
        self.actions.push(PageAction::ReplaceUrl {
            href: href.to_string(),
        });
    }

    fn push_route(&mut self, href: &str) {
        self.actions.push(PageAction::PushRoute {
            href: href.to_string(),
        });
    }

    fn load(&mut self, href: &str) {
        self.actions.push(PageAction::Load {
            href: href.to_string(),
        });
    }
}

#[wasm_bindgen]
pub fn render_post(source: &str) -> Result<JsValue, JsValue> {
    render_post_with_context(source, JsValue::UNDEFINED)
}

#[wasm_bindgen]
pub fn render_post_with_context(source: &str, context: JsValue) -> Result<JsValue, JsValue> {
    let js_context = from_js::<JsRenderContext>(context)?.unwrap_or_default();
    let sanitized = js_context.sanitized;
    let context = render_context(js_context);

    let out = if sanitized {
        forumcode_core::transform_sanitized(source, &context)
    } else {
        forumcode_core::transform(source, &context)
    };

    let result = RenderResult {
        html: out.html,
        embeds: out.embeds,
        quotes: out.quotes,
        diagnostics: out.diagnostics.into_iter().map(JsDiagnostic::from).collect(),
    };
    to_js(&result)
}

#[wasm_bindgen]
pub fn excerpt(source: &str, max_chars: Option<usize>) -> String {
    forumcode_core::excerpt(source, max_chars)
}

#[wasm_bindgen]
pub fn validate(source: &str) -> Result<JsValue, JsValue> {
    let diagnostics: Vec<JsDiagnostic> = forumcode_core::validate(source)
        .into_iter()
        .map(JsDiagnostic::from)
        .collect();
    to_js(&diagnostics)
}

/// Decides how a click on a rendered post link is handled. The host calls
/// `preventDefault` unless the navigation is `ignored`, then replays the
/// returned actions in order.
#[wasm_bindgen]
pub fn route_click(click: JsValue, page: JsValue) -> Result<JsValue, JsValue> {
    let click: LinkClick = serde_wasm_bindgen::from_value(click).map_err(to_js_error)?;
    let page: JsPage = serde_wasm_bindgen::from_value(page).map_err(to_js_error)?;

    let highlight = page
        .highlight_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| RenderOptions::default().highlight_duration());
    let mut recording = RecordingPage {
        current_path: page.current_path,
        anchors: page.anchors.into_iter().collect(),
        actions: Vec::new(),
    };
    let navigation = forumcode_core::intercept(&click, &mut recording, highlight);

    to_js(&RouteResult {
        navigation,
        actions: recording.actions,
    })
}

#[wasm_bindgen]
pub fn quote_markup(user: &str, post_id: &str, text: &str) -> String {
    forumcode_core::quote_markup(user, post_id, text)
}

#[wasm_bindgen]
pub fn mention_markup(name: &str) -> String {
    forumcode_core::mention_markup(name)
}

fn render_context(js: JsRenderContext) -> RenderContext {
    let mut options = RenderOptions::default();
    if let Some(forum_base) = js.forum_base {
        options.forum_base = forum_base;
    }
    if let Some(profile_route) = js.profile_route {
        options.profile_route = profile_route;
    }
    if let Some(open) = js.open_links_in_new_tab {
        options.open_links_in_new_tab = open;
    }
    if let Some(label) = js.quote_link_label {
        options.quote_link_label = label;
    }
    if let Some(label) = js.spoiler_label {
        options.spoiler_label = label;
    }
    if let Some(label) = js.loading_label {
        options.loading_label = label;
    }

    let mut context = RenderContext::new()
        .with_options(options)
        .with_post_numbers(js.post_numbers.into_iter().collect::<PostNumberMap>());
    if let Some(location) = js.location {
        let mut topic = TopicLocation::new(location.subcategory, location.topic);
        if let Some(category) = location.category {
            topic = topic.with_category(category);
        }
        context = context.with_location(topic);
    }
    context
}

fn from_js<T: for<'de> Deserialize<'de>>(value: JsValue) -> Result<Option<T>, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(value)
        .map(Some)
        .map_err(to_js_error)
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(to_js_error)
}

fn to_js_error(err: serde_wasm_bindgen::Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}
