use std::any::{Any, TypeId};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::error::{WuffsError, WuffsResult};
use crate::image::DecodedImage;
use crate::io::ImageSource;
use crate::metadata::BasicImageMetadata;

/// Host-facing reader contract. Readers are single-owner and reusable across inputs.
pub trait ImageReader: Send {
    fn format_name(&self) -> &'static str;
    fn set_input(&mut self, source: Box<dyn ImageSource>);
    fn num_images(&mut self) -> WuffsResult<usize>;
    fn width(&mut self, index: usize) -> WuffsResult<i32>;
    fn height(&mut self, index: usize) -> WuffsResult<i32>;
    fn image_metadata(&mut self, index: usize) -> WuffsResult<Option<BasicImageMetadata>>;
    fn read(&mut self, index: usize) -> WuffsResult<DecodedImage>;
    fn dispose(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: String,
    pub vendor: String,
    pub version: String,
    pub description: String,
    pub format_names: Vec<String>,
    pub suffixes: Vec<String>,
    pub mime_types: Vec<String>,
    /// Higher sorts first among otherwise unordered providers.
    pub priority: i32,
}

impl ProviderInfo {
    pub fn new(id: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor: vendor.into(),
            version: String::new(),
            description: String::new(),
            format_names: Vec::new(),
            suffixes: Vec::new(),
            mime_types: Vec::new(),
            priority: 0,
        }
    }

    #[inline]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[inline]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[inline]
    pub fn with_format_names(mut self, names: &[&str]) -> Self {
        self.format_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    #[inline]
    pub fn with_suffixes(mut self, suffixes: &[&str]) -> Self {
        self.suffixes = suffixes.iter().map(|s| s.to_string()).collect();
        self
    }

    #[inline]
    pub fn with_mime_types(mut self, mime_types: &[&str]) -> Self {
        self.mime_types = mime_types.iter().map(|s| s.to_string()).collect();
        self
    }

    #[inline]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Case-insensitive match against the declared format names.
    pub fn declares_format(&self, name: &str) -> bool {
        self.format_names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

pub trait ReaderProvider: Send + Sync {
    fn info(&self) -> &ProviderInfo;

    /// Must leave the source position unchanged.
    fn can_decode(&self, source: &mut dyn ImageSource) -> WuffsResult<bool>;

    fn create_reader(&self) -> Box<dyn ImageReader>;
}

pub trait SourceProvider: Send + Sync {
    fn info(&self) -> &ProviderInfo;

    fn input_type(&self) -> TypeId;

    fn input_type_name(&self) -> &'static str;

    fn create_source(&self, input: &dyn Any) -> WuffsResult<Box<dyn ImageSource>>;
}

/// Uniform access to the descriptor of either provider category.
trait Described {
    fn descriptor(&self) -> &ProviderInfo;
}

impl Described for dyn ReaderProvider {
    #[inline]
    fn descriptor(&self) -> &ProviderInfo {
        self.info()
    }
}

impl Described for dyn SourceProvider {
    #[inline]
    fn descriptor(&self) -> &ProviderInfo {
        self.info()
    }
}

struct Slot<T: ?Sized> {
    provider: Arc<T>,
    seq: u64,
}

/// Providers of one category plus pairwise `(before, after)` ordering constraints.
struct Category<T: ?Sized> {
    slots: Vec<Slot<T>>,
    edges: Vec<(String, String)>,
}

impl<T: ?Sized> Default for Category<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<T: ?Sized + Described> Category<T> {
    fn position(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.provider.descriptor().id == id)
    }

    /// True if `to` is reachable from `from` along existing edges.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        while let Some(cur) = stack.pop() {
            if cur == to {
                return true;
            }
            if !seen.insert(cur) {
                continue;
            }
            stack.extend(
                self.edges
                    .iter()
                    .filter(|(a, _)| a == cur)
                    .map(|(_, b)| b.as_str()),
            );
        }
        false
    }

    fn set_ordering(&mut self, first: &str, second: &str) -> bool {
        if first == second || self.position(first).is_none() || self.position(second).is_none() {
            return false;
        }
        if self.edges.iter().any(|(a, b)| a == first && b == second) {
            return true;
        }
        if self.reaches(second, first) {
            log::debug!(
                target: "providers",
                "ordering rejected, would create a cycle: {first} -> {second}"
            );
            return false;
        }
        self.edges.push((first.to_owned(), second.to_owned()));
        true
    }

    fn remove(&mut self, id: &str) -> bool {
        let Some(i) = self.position(id) else {
            return false;
        };
        self.slots.remove(i);
        self.edges.retain(|(a, b)| a != id && b != id);
        true
    }

    /// Kahn topological order; ready providers are taken by priority (desc), then registration.
    fn ordered(&self) -> Vec<Arc<T>> {
        let n = self.slots.len();
        let index: HashMap<&str, usize> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.provider.descriptor().id.as_str(), i))
            .collect();

        let mut indegree = vec![0usize; n];
        let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (a, b) in &self.edges {
            if let (Some(&ai), Some(&bi)) = (index.get(a.as_str()), index.get(b.as_str())) {
                indegree[bi] += 1;
                out_edges[ai].push(bi);
            }
        }

        let key = |i: usize| {
            let slot = &self.slots[i];
            (Reverse(slot.provider.descriptor().priority), slot.seq, i)
        };

        let mut ready: BTreeSet<(Reverse<i32>, u64, usize)> =
            (0..n).filter(|&i| indegree[i] == 0).map(key).collect();

        let mut order: Vec<usize> = Vec::with_capacity(n);
        while let Some(k) = ready.pop_first() {
            let i = k.2;
            order.push(i);
            for &to in &out_edges[i] {
                indegree[to] = indegree[to].saturating_sub(1);
                if indegree[to] == 0 {
                    ready.insert(key(to));
                }
            }
        }

        if order.len() != n {
            // Unreachable while set_ordering rejects cycles; keep the leftovers in
            // registration order.
            let mut rest: Vec<usize> = (0..n).filter(|i| !order.contains(i)).collect();
            rest.sort_by_key(|&i| self.slots[i].seq);
            order.extend(rest);
        }

        order
            .into_iter()
            .map(|i| Arc::clone(&self.slots[i].provider))
            .collect()
    }
}

#[derive(Default)]
struct Inner {
    readers: Category<dyn ReaderProvider>,
    sources: Category<dyn SourceProvider>,
    next_seq: u64,
}

/// Registry of reader and source providers with deterministic iteration order.
#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<Inner>,
}

impl ProviderRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide default registry.
    pub fn global() -> &'static ProviderRegistry {
        static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ProviderRegistry::new)
    }

    /// Returns false when a provider with the same id is already registered.
    pub fn register_reader(&self, provider: Arc<dyn ReaderProvider>) -> bool {
        let mut inner = self.inner.write();
        let id = provider.info().id.clone();
        if inner.readers.position(&id).is_some() {
            return false;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.readers.slots.push(Slot { provider, seq });
        log::debug!(target: "providers", "registered reader provider '{id}'");
        true
    }

    pub fn register_source(&self, provider: Arc<dyn SourceProvider>) -> bool {
        let mut inner = self.inner.write();
        let id = provider.info().id.clone();
        if inner.sources.position(&id).is_some() {
            return false;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.sources.slots.push(Slot { provider, seq });
        log::debug!(target: "providers", "registered source provider '{id}'");
        true
    }

    /// Removes a provider of either category and every ordering that mentions it.
    pub fn deregister(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        let r = inner.readers.remove(id);
        let s = inner.sources.remove(id);
        if r || s {
            log::debug!(target: "providers", "deregistered '{id}'");
        }
        r || s
    }

    pub fn contains(&self, id: &str) -> bool {
        let inner = self.inner.read();
        inner.readers.position(id).is_some()
            || inner.sources.position(id).is_some()
    }

    /// Orders reader `first` before reader `second`. Rejected (false) if it would create a
    /// cycle or either id is unknown.
    pub fn set_reader_ordering(&self, first: &str, second: &str) -> bool {
        self.inner.write().readers.set_ordering(first, second)
    }

    pub fn set_source_ordering(&self, first: &str, second: &str) -> bool {
        self.inner.write().sources.set_ordering(first, second)
    }

    pub fn reader_providers(&self) -> Vec<Arc<dyn ReaderProvider>> {
        self.inner.read().readers.ordered()
    }

    pub fn source_providers(&self) -> Vec<Arc<dyn SourceProvider>> {
        self.inner.read().sources.ordered()
    }

    /// Ordered reader providers whose `can_decode` accepts `source`.
    pub fn readers_for(
        &self,
        source: &mut dyn ImageSource,
    ) -> WuffsResult<Vec<Arc<dyn ReaderProvider>>> {
        let mut out = Vec::new();
        for p in self.reader_providers() {
            if p.can_decode(source)? {
                out.push(p);
            }
        }
        Ok(out)
    }

    /// Builds a source with the first provider whose input type matches `input`.
    pub fn create_source(&self, input: &dyn Any) -> WuffsResult<Box<dyn ImageSource>> {
        let wanted = input.type_id();
        let providers = self.source_providers();
        match providers.iter().find(|p| p.input_type() == wanted) {
            Some(p) => p.create_source(input),
            None => Err(WuffsError::UnexpectedSourceType {
                expected: "an input type with a registered source provider",
                found: format!("{wanted:?}"),
            }),
        }
    }
}
