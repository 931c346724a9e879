//! Mounting live embed widgets over the placeholders of an inserted fragment.
//!
//! The host owns the page and hands out opaque node handles. Each placeholder
//! gets exactly one mount root for as long as its node stays connected; the
//! registry remembers which reference a root shows so repeated passes over
//! unchanged content neither mount nor fetch again.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tracing::debug;

use crate::embed::{DataService, EmbedFetcher, EmbedReference, FetchError, Summary};

/// Delay between the first frame after insertion and the hydration pass.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(150);

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "camelCase")]
pub enum EmbedState {
    Loading,
    Ready(Summary),
    NotFound,
    /// The data service failed; the message is shown in the widget.
    Error(String),
}

impl EmbedState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EmbedState::Loading)
    }
}

impl From<Result<Summary, FetchError>> for EmbedState {
    fn from(result: Result<Summary, FetchError>) -> Self {
        match result {
            Ok(summary) => EmbedState::Ready(summary),
            Err(err @ FetchError::Transient { .. }) => EmbedState::Error(err.to_string()),
            Err(FetchError::NotFound { .. } | FetchError::InvalidId { .. }) => EmbedState::NotFound,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placeholder<N> {
    pub node: N,
    pub reference: EmbedReference,
}

/// The page as seen by the hydrator.
pub trait MountHost {
    /// Identity of a placeholder element. Two handles are equal when they
    /// denote the same element.
    type Node: Clone + Eq + Hash;
    type Root;

    /// Placeholders currently in the page, in document order.
    fn placeholders(&self) -> Vec<Placeholder<Self::Node>>;
    fn is_connected(&self, node: &Self::Node) -> bool;
    fn create_root(&mut self, node: &Self::Node) -> Self::Root;
    fn render(&mut self, root: &mut Self::Root, reference: &EmbedReference, state: &EmbedState);
    fn unmount(&mut self, root: Self::Root);
}

pub trait Clock {
    /// Resolves after the host has painted the next frame.
    fn next_frame(&self) -> impl Future<Output = ()>;
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

struct MountEntry<R> {
    root: R,
    reference: EmbedReference,
    state: EmbedState,
    // Bumped whenever the entry starts a new fetch; older results are stale.
    generation: u64,
}

/// Mount roots keyed by placeholder identity.
pub struct MountRegistry<N, R> {
    entries: HashMap<N, MountEntry<R>>,
    next_generation: u64,
}

impl<N: Clone + Eq + Hash, R> MountRegistry<N, R> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, node: &N) -> bool {
        self.entries.contains_key(node)
    }

    pub fn state(&self, node: &N) -> Option<&EmbedState> {
        self.entries.get(node).map(|entry| &entry.state)
    }

    pub fn reference(&self, node: &N) -> Option<&EmbedReference> {
        self.entries.get(node).map(|entry| &entry.reference)
    }

    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct HydrationReport {
    /// New mount roots created.
    pub mounted: usize,
    /// Existing roots whose placeholder now names another entity.
    pub reused: usize,
    pub fetched: usize,
    /// Roots unmounted because their node left the page.
    pub pruned: usize,
    /// Fetch results dropped because their placeholder went away meanwhile.
    pub discarded: usize,
}

pub struct Hydrator<S, H: MountHost> {
    fetcher: EmbedFetcher<S>,
    registry: MountRegistry<H::Node, H::Root>,
    settle_delay: Duration,
}

impl<S: DataService, H: MountHost> Hydrator<S, H> {
    pub fn new(fetcher: EmbedFetcher<S>) -> Self {
        Self {
            fetcher,
            registry: MountRegistry::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn registry(&self) -> &MountRegistry<H::Node, H::Root> {
        &self.registry
    }

    pub fn fetcher(&self) -> &EmbedFetcher<S> {
        &self.fetcher
    }

    /// Waits for the fragment to be laid out, then hydrates it.
    pub async fn run<C: Clock>(&mut self, host: &mut H, clock: &C) -> HydrationReport {
        clock.next_frame().await;
        clock.sleep(self.settle_delay).await;
        self.hydrate(host).await
    }

    /// One pass: prunes roots of detached nodes, mounts new placeholders and
    /// applies each fetch result as soon as it arrives.
    pub async fn hydrate(&mut self, host: &mut H) -> HydrationReport {
        let mut report = HydrationReport::default();

        let detached: Vec<H::Node> = self
            .registry
            .entries
            .keys()
            .filter(|node| !host.is_connected(node))
            .cloned()
            .collect();
        for node in detached {
            if let Some(entry) = self.registry.entries.remove(&node) {
                host.unmount(entry.root);
                report.pruned += 1;
            }
        }

        let mut pending = Vec::new();
        for Placeholder { node, reference } in host.placeholders() {
            let generation = self.registry.bump();
            match self.registry.entries.get_mut(&node) {
                Some(entry) if entry.reference == reference && entry.state.is_terminal() => {
                    continue;
                }
                // Still loading at the start of a pass: the last result was
                // discarded while the node was detached.
                Some(entry) if entry.reference == reference => {
                    entry.generation = generation;
                }
                Some(entry) => {
                    entry.reference = reference.clone();
                    entry.state = EmbedState::Loading;
                    entry.generation = generation;
                    host.render(&mut entry.root, &reference, &entry.state);
                    report.reused += 1;
                }
                None => {
                    let mut root = host.create_root(&node);
                    host.render(&mut root, &reference, &EmbedState::Loading);
                    self.registry.entries.insert(
                        node.clone(),
                        MountEntry {
                            root,
                            reference: reference.clone(),
                            state: EmbedState::Loading,
                            generation,
                        },
                    );
                    report.mounted += 1;
                }
            }
            pending.push((node, reference, generation));
        }

        self.fetch_all(host, pending, &mut report).await;
        debug!(
            mounted = report.mounted,
            reused = report.reused,
            fetched = report.fetched,
            pruned = report.pruned,
            discarded = report.discarded,
            "hydration pass finished"
        );
        report
    }

    /// Fetches again for a placeholder whose last fetch failed. Returns
    /// `false` when the node is unknown or not in the error state.
    pub async fn retry(&mut self, host: &mut H, node: &H::Node) -> bool {
        if !host.is_connected(node) {
            return false;
        }
        let generation = self.registry.bump();
        let Some(entry) = self.registry.entries.get_mut(node) else {
            return false;
        };
        if !matches!(entry.state, EmbedState::Error(_)) {
            return false;
        }
        entry.state = EmbedState::Loading;
        entry.generation = generation;
        host.render(&mut entry.root, &entry.reference, &entry.state);
        let pending = vec![(node.clone(), entry.reference.clone(), generation)];
        let mut report = HydrationReport::default();
        self.fetch_all(host, pending, &mut report).await;
        true
    }

    /// Unmounts every root, e.g. when the posts are torn down.
    pub fn clear(&mut self, host: &mut H) {
        for (_, entry) in self.registry.entries.drain() {
            host.unmount(entry.root);
        }
    }

    async fn fetch_all(
        &mut self,
        host: &mut H,
        pending: Vec<(H::Node, EmbedReference, u64)>,
        report: &mut HydrationReport,
    ) {
        let fetcher = &self.fetcher;
        let registry = &mut self.registry;
        let mut in_flight: FuturesUnordered<_> = pending
            .into_iter()
            .map(|(node, reference, generation)| async move {
                let result = fetcher.fetch(&reference).await;
                (node, reference, generation, result)
            })
            .collect();
        report.fetched += in_flight.len();

        while let Some((node, reference, generation, result)) = in_flight.next().await {
            let entry = registry
                .entries
                .get_mut(&node)
                .filter(|entry| entry.generation == generation);
            let Some(entry) = entry.filter(|_| host.is_connected(&node)) else {
                debug!(kind = %reference.kind, id = %reference.external_id, "embed result discarded");
                report.discarded += 1;
                continue;
            };
            entry.state = EmbedState::from(result);
            host.render(&mut entry.root, &reference, &entry.state);
        }
    }
}
