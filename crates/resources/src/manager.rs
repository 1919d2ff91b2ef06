//! Resource manager: loader registry, request coalescing, batch preload and
//! refcounted unload on top of [`ResourceCache`].

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use scenekit_common::ResourceId;
use scenekit_events::{Bus, Event};
use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::Instrument;

use crate::cache::{CacheConfig, CacheMetadata, ResourceCache};
use crate::error::ResourceError;
use crate::loader::{ErasedLoader, ResourceLoader};
use crate::options::LoadOptions;
use crate::progress::{LoadingProgress, ProgressLedger};

type SharedLoad = Shared<LocalBoxFuture<'static, Result<Rc<dyn Any>, ResourceError>>>;

/// Manager tuning.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How often batch preload reports aggregate progress.
    pub progress_poll_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            progress_poll_interval: Duration::from_millis(100),
        }
    }
}

/// One entry of a [`ResourceManager::preload_resources`] batch.
#[derive(Debug, Clone)]
pub struct PreloadRequest {
    pub kind: String,
    pub url: String,
    pub options: LoadOptions,
}

impl PreloadRequest {
    pub fn new(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            url: url.into(),
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(&self.kind, &self.url)
    }
}

/// How a call to `load` is going to be satisfied.
enum Request {
    Cached(Rc<dyn Any>),
    /// This caller started the physical load.
    Started(SharedLoad),
    /// Another caller's load was already in flight.
    Joined(SharedLoad, Rc<ResourceCache>),
    Rejected(ResourceError),
}

struct ManagerInner {
    cache: Rc<ResourceCache>,
    loaders: RefCell<HashMap<String, Rc<dyn ErasedLoader>>>,
    pending: RefCell<HashMap<ResourceId, SharedLoad>>,
    progress: ProgressLedger,
    bus: Rc<Bus>,
    config: ManagerConfig,
}

/// Loads resources through registered loaders and caches the results.
///
/// Cheap to clone; clones share the same registry, cache and ledger.
///
/// # Invariants
/// - At most one physical load is in flight per identifier.
/// - The in-flight marker is removed before any waiting caller observes the result.
/// - Every caller that receives a payload holds one cache reference.
#[derive(Clone)]
pub struct ResourceManager {
    inner: Rc<ManagerInner>,
}

impl ResourceManager {
    pub fn new(bus: Rc<Bus>, cache_config: CacheConfig, config: ManagerConfig) -> Self {
        let cache = Rc::new(ResourceCache::with_bus(cache_config, Rc::clone(&bus)));
        Self::with_cache(cache, bus, config)
    }

    /// Build a manager around an existing cache.
    pub fn with_cache(cache: Rc<ResourceCache>, bus: Rc<Bus>, config: ManagerConfig) -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                cache,
                loaders: RefCell::new(HashMap::new()),
                pending: RefCell::new(HashMap::new()),
                progress: ProgressLedger::default(),
                bus,
                config,
            }),
        }
    }

    pub fn cache(&self) -> &Rc<ResourceCache> {
        &self.inner.cache
    }

    pub fn bus(&self) -> &Rc<Bus> {
        &self.inner.bus
    }

    /// Register `loader` under its kind. A later registration for the same
    /// kind replaces the earlier one.
    pub fn register<L: ResourceLoader>(&self, loader: L) {
        let kind = ResourceLoader::kind(&loader).to_string();
        let replaced = self
            .inner
            .loaders
            .borrow_mut()
            .insert(kind.clone(), Rc::new(loader))
            .is_some();
        tracing::debug!(%kind, replaced, "loader registered");
        self.inner.bus.publish(&Event::LoaderRegistered { kind });
    }

    pub fn has_loader(&self, kind: &str) -> bool {
        self.inner.loaders.borrow().contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.inner.loaders.borrow().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Load `url` with the loader for `kind`, returning the cached payload
    /// when present and joining an in-flight load for the same identifier.
    ///
    /// The cache lookup and in-flight registration happen at call time; the
    /// returned future only waits for the outcome.
    pub fn load<T: Any>(
        &self,
        kind: &str,
        url: &str,
        options: LoadOptions,
    ) -> impl Future<Output = Result<Rc<T>, ResourceError>> + use<T> {
        let id = ResourceId::new(kind, url);
        let payload = self.load_any(&id, options);
        let cache = Rc::clone(&self.inner.cache);
        async move { downcast::<T>(&cache, id, payload.await?) }
    }

    /// [`load`](Self::load) addressed by a raw `"<kind>://<url>"` identifier.
    pub fn load_id<T: Any>(
        &self,
        raw: &str,
        options: LoadOptions,
    ) -> impl Future<Output = Result<Rc<T>, ResourceError>> + use<T> {
        let request = ResourceId::parse(raw).map(|id| {
            let payload = self.load_any(&id, options);
            (id, payload)
        });
        let cache = Rc::clone(&self.inner.cache);
        async move {
            let (id, payload) = request?;
            downcast::<T>(&cache, id, payload.await?)
        }
    }

    /// Type-erased [`load`](Self::load).
    pub fn load_any(
        &self,
        id: &ResourceId,
        options: LoadOptions,
    ) -> impl Future<Output = Result<Rc<dyn Any>, ResourceError>> + use<> {
        let request = self.request(id, options);
        let id = id.clone();
        async move {
            match request {
                Request::Cached(payload) => Ok(payload),
                Request::Started(load) => load.await,
                Request::Joined(load, cache) => {
                    let payload = load.await?;
                    // Take this caller's reference; fall back to the shared
                    // payload if the entry was evicted in between.
                    Ok(cache.get(&id).unwrap_or(payload))
                }
                Request::Rejected(err) => Err(err),
            }
        }
    }

    fn request(&self, id: &ResourceId, options: LoadOptions) -> Request {
        let inner = &self.inner;
        if let Some(payload) = inner.cache.get(id) {
            tracing::trace!(%id, "cache hit");
            return Request::Cached(payload);
        }
        if let Some(load) = inner.pending.borrow().get(id) {
            tracing::trace!(%id, "joining in-flight load");
            return Request::Joined(load.clone(), Rc::clone(&inner.cache));
        }

        let kind = id.kind().to_string();
        let Some(loader) = inner.loaders.borrow().get(&kind).cloned() else {
            tracing::warn!(%id, %kind, "no loader registered");
            return Request::Rejected(ResourceError::LoaderNotFound { kind });
        };

        let weak = Rc::downgrade(&self.inner);
        let load_id = id.clone();
        let load_kind = kind.clone();
        let load = async move {
            let result = loader.load_erased(load_id.url(), &options).await;
            settle(&weak, &load_id, &load_kind, loader.as_ref(), &options, result)
        }
        .instrument(tracing::debug_span!("load", %id))
        .boxed_local()
        .shared();

        // Registered before anyone is notified, so a listener that re-requests
        // the id joins this load.
        inner.pending.borrow_mut().insert(id.clone(), load.clone());
        inner.progress.record(LoadingProgress::loading(id.clone()));
        inner.bus.publish(&Event::ResourceLoading {
            id: id.clone(),
            kind,
        });
        Request::Started(load)
    }

    /// Load every request concurrently.
    ///
    /// With `on_progress`, the mean progress of the batch is reported every
    /// `progress_poll_interval` until all loads settle, then once more. Waits
    /// for every request to settle and returns the first failure, if any.
    pub async fn preload_resources(
        &self,
        requests: Vec<PreloadRequest>,
        on_progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<(), ResourceError> {
        let ids: Vec<ResourceId> = requests.iter().map(PreloadRequest::id).collect();
        let span = tracing::info_span!("preload", count = ids.len());

        let loads: Vec<_> = requests
            .into_iter()
            .map(|r| {
                let id = r.id();
                self.load_any(&id, r.options)
            })
            .collect();

        let results = async {
            let mut all = std::pin::pin!(futures::future::join_all(loads));
            match on_progress {
                None => all.await,
                Some(report) => {
                    let period = self.inner.config.progress_poll_interval;
                    let mut ticker = tokio::time::interval(period);
                    let results = loop {
                        tokio::select! {
                            results = &mut all => break results,
                            _ = ticker.tick() => report(self.aggregate_progress(&ids)),
                        }
                    };
                    report(self.aggregate_progress(&ids));
                    results
                }
            }
        }
        .instrument(span)
        .await;

        match results.into_iter().find_map(Result::err) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drop one reference to `id`; when the count reaches zero, dispose the
    /// payload through its loader. The cache entry itself is kept until it is
    /// swept or removed. Returns false if `id` is not cached.
    pub fn unload(&self, id: &ResourceId) -> bool {
        let inner = &self.inner;
        let Some(remaining) = inner.cache.release(id) else {
            return false;
        };
        if remaining > 0 {
            tracing::trace!(%id, remaining, "reference released");
            return true;
        }

        let loader = inner.loaders.borrow().get(id.kind()).cloned();
        match (loader, inner.cache.peek(id)) {
            (Some(loader), Some(payload)) => {
                loader.unload_erased(payload.as_ref());
                tracing::debug!(%id, "resource disposed");
            }
            (None, _) => tracing::warn!(%id, "no loader to dispose resource"),
            (_, None) => {}
        }
        true
    }

    /// [`unload`](Self::unload) every cached id carrying `tag`.
    pub fn unload_by_tag(&self, tag: &str) -> usize {
        let ids = self.inner.cache.get_by_tag(tag);
        for id in &ids {
            self.unload(id);
        }
        tracing::debug!(tag, count = ids.len(), "unloaded by tag");
        ids.len()
    }

    /// Clear the whole cache. Loader disposal hooks are not invoked.
    pub fn unload_all(&self) {
        self.inner.cache.clear();
    }

    pub fn is_loading(&self, id: &ResourceId) -> bool {
        self.inner.pending.borrow().contains_key(id)
    }

    pub fn progress(&self, id: &ResourceId) -> Option<LoadingProgress> {
        self.inner.progress.get(id)
    }

    pub fn all_progress(&self) -> Vec<LoadingProgress> {
        self.inner.progress.all()
    }

    /// Mean progress of `ids`; ids with no record count as 0.
    pub fn aggregate_progress(&self, ids: &[ResourceId]) -> f32 {
        self.inner.progress.aggregate(ids)
    }
}

/// Hand the payload out as `T`. On a mismatch the reference this caller took
/// goes back to the cache.
fn downcast<T: Any>(
    cache: &ResourceCache,
    id: ResourceId,
    payload: Rc<dyn Any>,
) -> Result<Rc<T>, ResourceError> {
    payload.downcast::<T>().map_err(|_| {
        cache.release(&id);
        tracing::warn!(%id, expected = type_name::<T>(), "payload type mismatch");
        ResourceError::TypeMismatch {
            id,
            expected: type_name::<T>(),
        }
    })
}

/// Record the outcome of a physical load. Runs exactly once per load,
/// before any caller sees the result.
fn settle(
    manager: &Weak<ManagerInner>,
    id: &ResourceId,
    kind: &str,
    loader: &dyn ErasedLoader,
    options: &LoadOptions,
    result: Result<Rc<dyn Any>, ResourceError>,
) -> Result<Rc<dyn Any>, ResourceError> {
    let Some(inner) = manager.upgrade() else {
        return result;
    };
    match &result {
        Ok(payload) => {
            let metadata = CacheMetadata {
                kind: kind.to_string(),
                approx_size: loader.approx_size_erased(payload.as_ref()),
                persistent: options.persistent,
                tags: options.tags.iter().cloned().collect(),
            };
            inner.cache.set(id.clone(), Rc::clone(payload), metadata);
            inner.progress.record(LoadingProgress::complete(id.clone()));
            inner.pending.borrow_mut().remove(id);
            tracing::debug!(%id, "resource loaded");
            inner.bus.publish(&Event::ResourceLoaded {
                id: id.clone(),
                kind: kind.to_string(),
            });
        }
        Err(err) => {
            inner
                .progress
                .record(LoadingProgress::failed(id.clone(), err.clone()));
            inner.pending.borrow_mut().remove(id);
            tracing::warn!(%id, error = %err, "resource load failed");
            inner.bus.publish(&Event::ResourceError {
                id: id.clone(),
                kind: kind.to_string(),
                error: err.to_string(),
            });
        }
    }
    result
}
