//! Stable links to posts.
//!
//! A post is addressed by its sequential number inside a topic (`#post12`)
//! whenever that number is known, because it is the anchor readers see and
//! share. Posts quoted from elsewhere only carry their opaque id; those fall
//! back to an id anchor on the current topic, or to the generic post route
//! when no topic is loaded.

use std::collections::HashMap;
use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize, Serializer};

use crate::context::RenderContext;

pub(crate) const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A `post_id` as written in a quote tag.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum PostRef {
    /// Sequential number of the post inside its topic.
    Number(u64),
    /// Identifier that is not a plain decimal number.
    Opaque(String),
}

impl PostRef {
    /// Classifies by shape: ASCII decimal digits that fit a `u64` are a post number.
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.is_empty()
            && raw.bytes().all(|b| b.is_ascii_digit())
            && let Ok(number) = raw.parse::<u64>()
        {
            return PostRef::Number(number);
        }
        PostRef::Opaque(raw.to_string())
    }
}

impl Serialize for PostRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for PostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostRef::Number(number) => write!(f, "{}", number),
            PostRef::Opaque(id) => f.write_str(id),
        }
    }
}

/// Opaque post id → sequential post number for the topic being rendered.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostNumberMap(HashMap<String, u64>);

impl PostNumberMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, number: u64) -> Option<u64> {
        self.0.insert(id.into(), number)
    }

    pub fn get(&self, id: &str) -> Option<u64> {
        self.0.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for PostNumberMap {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(id, n)| (id.into(), n)).collect())
    }
}

/// Route descriptors of the topic currently on screen.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TopicLocation {
    #[serde(default)]
    pub category: Option<String>,
    pub subcategory: String,
    pub topic: String,
}

impl TopicLocation {
    pub fn new(subcategory: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            category: None,
            subcategory: subcategory.into(),
            topic: topic.into(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn path(&self, forum_base: &str) -> String {
        let mut path = forum_base.trim_end_matches('/').to_string();
        let segments = self
            .category
            .iter()
            .chain([&self.subcategory, &self.topic]);
        for segment in segments {
            path.push('/');
            path.push_str(&encode_segment(segment));
        }
        path
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PermalinkTarget {
    pub path: String,
    pub anchor: Option<String>,
}

impl PermalinkTarget {
    pub fn href(&self) -> String {
        match &self.anchor {
            Some(anchor) => format!("{}#{}", self.path, anchor),
            None => self.path.clone(),
        }
    }
}

/// Element id of a rendered post: `post{N}` when numbered, else `post-{id}`.
pub fn post_anchor(number: Option<u64>, id: &str) -> String {
    match number {
        Some(number) => format!("post{}", number),
        None => format!("post-{}", encode_segment(id)),
    }
}

/// Computes the link for a quoted post. Never fails; see the module docs for
/// the order in which the forms are tried.
pub fn resolve_permalink(post_ref: &PostRef, context: &RenderContext) -> PermalinkTarget {
    let forum_base = context.options.forum_base.trim_end_matches('/');
    let Some(location) = context.location.as_ref() else {
        return PermalinkTarget {
            path: format!("{}/post/{}", forum_base, encode_segment(&post_ref.to_string())),
            anchor: None,
        };
    };
    let path = location.path(forum_base);
    let anchor = match post_ref {
        PostRef::Number(number) => post_anchor(Some(*number), ""),
        PostRef::Opaque(id) => post_anchor(context.post_numbers.get(id), id),
    };
    PermalinkTarget {
        path,
        anchor: Some(anchor),
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
