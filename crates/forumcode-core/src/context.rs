use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::permalink::{PostNumberMap, TopicLocation};

/// Rendering settings shared by every post of a forum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Route prefix of the forum, without a trailing slash.
    pub forum_base: String,
    /// Route prefix of user profiles; the user name is appended as one segment.
    pub profile_route: String,
    pub open_links_in_new_tab: bool,
    pub quote_link_label: String,
    pub spoiler_label: String,
    pub loading_label: String,
    /// How long a quoted post stays highlighted after in-page navigation.
    pub highlight_ms: u64,
}

impl RenderOptions {
    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            forum_base: "/forum".to_string(),
            profile_route: "/forum/user".to_string(),
            open_links_in_new_tab: true,
            quote_link_label: "View post".to_string(),
            spoiler_label: "Spoiler".to_string(),
            loading_label: "Loading...".to_string(),
            highlight_ms: 2000,
        }
    }
}

/// Per-render inputs threaded explicitly through resolution.
///
/// The post number map is computed once per topic render and only read here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderContext {
    pub location: Option<TopicLocation>,
    pub post_numbers: PostNumberMap,
    pub options: RenderOptions,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, location: TopicLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_post_numbers(mut self, post_numbers: PostNumberMap) -> Self {
        self.post_numbers = post_numbers;
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }
}
