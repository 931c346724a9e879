//! Rich embeds: `[record]`, `[catch]` and `[gear]` references and the data
//! that fills their widgets.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    Record,
    Catch,
    Gear,
}

impl EmbedKind {
    pub const ALL: [EmbedKind; 3] = [EmbedKind::Record, EmbedKind::Catch, EmbedKind::Gear];

    /// Tag name and `data-kind` value.
    pub fn as_str(self) -> &'static str {
        match self {
            EmbedKind::Record => "record",
            EmbedKind::Catch => "catch",
            EmbedKind::Gear => "gear",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EmbedKind::Record => "Record",
            EmbedKind::Catch => "Catch",
            EmbedKind::Gear => "Gear",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        EmbedKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EmbedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedReference {
    pub kind: EmbedKind,
    pub external_id: String,
}

impl EmbedReference {
    pub fn new(kind: EmbedKind, external_id: impl Into<String>) -> Self {
        Self {
            kind,
            external_id: external_id.into(),
        }
    }
}

/// Characters accepted inside an embed tag.
pub(crate) fn is_valid_external_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// The two ways an entity can be addressed.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum EntityId {
    /// Public sequential number (`global_id`).
    Sequential(u64),
    Opaque(Uuid),
}

impl EntityId {
    /// Detects the id form. Decimal ids are sequential; anything else must be a UUID.
    pub fn classify(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw.parse().ok().map(EntityId::Sequential);
        }
        Uuid::parse_str(raw).ok().map(EntityId::Opaque)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Sequential(number) => write!(f, "{}", number),
            EntityId::Opaque(uuid) => write!(f, "{}", uuid),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: String,
    pub global_id: Option<u64>,
    pub species_name: String,
    pub scientific_name: Option<String>,
    pub weight_kg: f64,
    pub length_cm: Option<f64>,
    pub location_name: Option<String>,
    pub caught_on: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub user_display_name: Option<String>,
    pub user_username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatchSummary {
    pub id: String,
    pub global_id: Option<u64>,
    pub species_name: Option<String>,
    pub scientific_name: Option<String>,
    pub weight_kg: Option<f64>,
    pub length_cm: Option<f64>,
    pub location_name: Option<String>,
    pub captured_at: Option<String>,
    pub photo_url: Option<String>,
    pub video_url: Option<String>,
    pub user_display_name: Option<String>,
    pub user_username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GearSummary {
    pub id: String,
    pub global_id: Option<u64>,
    pub name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub owner_username: Option<String>,
}

/// Display-ready data for one embed widget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Summary {
    Record(RecordSummary),
    Catch(CatchSummary),
    Gear(GearSummary),
}

impl Summary {
    pub fn kind(&self) -> EmbedKind {
        match self {
            Summary::Record(_) => EmbedKind::Record,
            Summary::Catch(_) => EmbedKind::Catch,
            Summary::Gear(_) => EmbedKind::Gear,
        }
    }

    /// Where the widget links to on the main site: the owner's profile when
    /// known, else the public listing.
    pub fn link(&self) -> String {
        let (owner, listing, id) = match self {
            Summary::Record(s) => (s.user_username.as_deref(), "/records", &s.id),
            Summary::Catch(s) => (s.user_username.as_deref(), "/catches", &s.id),
            Summary::Gear(s) => (s.owner_username.as_deref(), "/gear", &s.id),
        };
        let kind = self.kind();
        match owner {
            Some(owner) => format!("/profile/{}#{}-{}", owner, kind, id),
            None => format!("{}#{}-{}", listing, kind, id),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("data service request failed: {0}")]
    Request(String),
    #[error("data service did not answer in time")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{kind} `{id}` was not found")]
    NotFound { kind: EmbedKind, id: String },
    #[error("`{id}` is not a valid {kind} id")]
    InvalidId { kind: EmbedKind, id: String },
    #[error("failed to load {kind} `{id}`")]
    Transient {
        kind: EmbedKind,
        id: String,
        #[source]
        source: ServiceError,
    },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Read-only lookup into the hosted data service.
///
/// `Ok(None)` means the entity does not exist or is not public.
pub trait DataService {
    fn get_entity(
        &self,
        kind: EmbedKind,
        id: &EntityId,
    ) -> impl Future<Output = Result<Option<Summary>, ServiceError>>;
}

type CacheKey = (EmbedKind, EntityId);

/// Loads the summary behind an embed reference. One call per request; failures
/// are reported, never retried here.
pub struct EmbedFetcher<S> {
    service: S,
    // Definitive answers only: transient failures must stay retryable.
    cache: Option<RefCell<LruCache<CacheKey, Option<Summary>>>>,
}

impl<S: DataService> EmbedFetcher<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            cache: None,
        }
    }

    /// Remembers up to `capacity` answers so an entity embedded several times
    /// in one topic is looked up once.
    pub fn with_cache(service: S, capacity: NonZeroUsize) -> Self {
        Self {
            service,
            cache: Some(RefCell::new(LruCache::new(capacity))),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn fetch(&self, reference: &EmbedReference) -> Result<Summary, FetchError> {
        let kind = reference.kind;
        let raw_id = reference.external_id.as_str();
        let Some(id) = EntityId::classify(raw_id) else {
            debug!(%kind, id = raw_id, "embed id is neither sequential nor opaque");
            return Err(FetchError::InvalidId {
                kind,
                id: raw_id.to_string(),
            });
        };

        let key = (kind, id);
        let cached = self
            .cache
            .as_ref()
            .and_then(|cache| cache.borrow_mut().get(&key).cloned());
        let found = match cached {
            Some(found) => {
                debug!(%kind, id = raw_id, "embed served from cache");
                found
            }
            None => {
                debug!(%kind, id = raw_id, "fetching embed");
                let found = self
                    .service
                    .get_entity(kind, &key.1)
                    .await
                    .map_err(|source| {
                        warn!(%kind, id = raw_id, error = %source, "embed fetch failed");
                        FetchError::Transient {
                            kind,
                            id: raw_id.to_string(),
                            source,
                        }
                    })?;
                if let Some(cache) = &self.cache {
                    cache.borrow_mut().put(key, found.clone());
                }
                found
            }
        };

        found.ok_or_else(|| FetchError::NotFound {
            kind,
            id: raw_id.to_string(),
        })
    }
}
