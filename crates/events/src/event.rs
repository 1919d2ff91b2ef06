use scenekit_common::{ObjectId, ResourceId};

/// Event names used on the bus.
pub mod channels {
    pub const COLLISION: &str = "collision";
    pub const RESOURCE_REGISTERED: &str = "resource:registered";
    pub const RESOURCE_LOADING: &str = "resource:loading";
    pub const RESOURCE_LOADED: &str = "resource:loaded";
    pub const RESOURCE_ERROR: &str = "resource:error";
    pub const RESOURCE_CACHED: &str = "resource:cached";
    pub const RESOURCE_REMOVED: &str = "resource:removed";
    pub const RESOURCE_CLEAR: &str = "resource:clear";
}

/// Payload carried by the scenekit bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Two objects started overlapping.
    Collision { a: ObjectId, b: ObjectId },
    /// A loader was registered for `kind`.
    LoaderRegistered { kind: String },
    ResourceLoading { id: ResourceId, kind: String },
    ResourceLoaded { id: ResourceId, kind: String },
    /// A load failed; `error` is the rendered error message.
    ResourceError {
        id: ResourceId,
        kind: String,
        error: String,
    },
    /// An entry was inserted (or overwritten) in the cache.
    ResourceCached { id: ResourceId, kind: String },
    /// An entry was deleted from the cache, explicitly or by the sweep.
    ResourceRemoved { id: ResourceId, kind: String },
    /// The cache was cleared.
    ResourceClear,
}

impl Event {
    /// The channel this event is published on.
    pub fn channel(&self) -> &'static str {
        match self {
            Event::Collision { .. } => channels::COLLISION,
            Event::LoaderRegistered { .. } => channels::RESOURCE_REGISTERED,
            Event::ResourceLoading { .. } => channels::RESOURCE_LOADING,
            Event::ResourceLoaded { .. } => channels::RESOURCE_LOADED,
            Event::ResourceError { .. } => channels::RESOURCE_ERROR,
            Event::ResourceCached { .. } => channels::RESOURCE_CACHED,
            Event::ResourceRemoved { .. } => channels::RESOURCE_REMOVED,
            Event::ResourceClear => channels::RESOURCE_CLEAR,
        }
    }

    /// The resource this event concerns, if any.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        match self {
            Event::ResourceLoading { id, .. }
            | Event::ResourceLoaded { id, .. }
            | Event::ResourceError { id, .. }
            | Event::ResourceCached { id, .. }
            | Event::ResourceRemoved { id, .. } => Some(id),
            _ => None,
        }
    }
}
