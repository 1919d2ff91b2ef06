//! Resources: asynchronous asset loading over a reference-counted cache.
//!
//! Assets are addressed by [`ResourceId`] (`"<kind>://<url>"`) and loaded by
//! the [`ResourceLoader`] registered for their kind. Concurrent requests for
//! the same id share one physical load.
//!
//! # Invariants
//! - At most one in-flight load per identifier.
//! - Reference counts never go below zero.
//! - Persistent entries are never swept.
//! - All state is single-threaded (`Rc`/`RefCell`); futures are `!Send` and
//!   run on a current-thread runtime, inside a `LocalSet` where tasks are spawned.

mod cache;
mod error;
mod loader;
pub mod loaders;
mod manager;
mod options;
mod progress;
mod source;

pub use cache::{CacheConfig, CacheMetadata, CacheStats, ResourceCache};
pub use error::ResourceError;
pub use loader::ResourceLoader;
pub use manager::{ManagerConfig, PreloadRequest, ResourceManager};
pub use options::{ColorSpace, JsonTransform, LoadOptions, ModelOptions, TextureOptions, WrapMode};
pub use progress::{LoadStatus, LoadingProgress};
pub use scenekit_common::ResourceId;
pub use source::{AssetSource, FsSource, MemorySource};

pub fn crate_info() -> &'static str {
    "scenekit-resources v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::{Model, Texture, register_default_loaders};
    use scenekit_events::Bus;
    use std::rc::Rc;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("resources"));
    }

    #[tokio::test]
    async fn default_loaders_cover_builtin_kinds() {
        let manager = ResourceManager::new(
            Rc::new(Bus::new()),
            CacheConfig::default(),
            ManagerConfig::default(),
        );
        register_default_loaders(&manager, Rc::new(MemorySource::new()));
        assert_eq!(manager.kinds(), vec!["audio", "json", "model", "texture"]);
    }

    #[tokio::test]
    async fn texture_scenario_end_to_end() {
        let source = Rc::new(MemorySource::new());
        source.insert("a.png", crate::loaders::png_fixture(2, 2, [255, 255, 255, 255]));
        let manager = ResourceManager::new(
            Rc::new(Bus::new()),
            CacheConfig::default(),
            ManagerConfig::default(),
        );
        register_default_loaders(&manager, Rc::clone(&source) as Rc<dyn AssetSource>);

        let first = manager.load::<Texture>("texture", "a.png", LoadOptions::new().tagged("hud"));
        let second = manager.load::<Texture>("texture", "a.png", LoadOptions::new().tagged("hud"));
        let (a, b) = futures::join!(first, second);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(source.fetch_count("a.png"), 1);

        let id = ResourceId::new("texture", "a.png");
        assert_eq!(manager.cache().ref_count(&id), Some(2));
        manager.unload(&id);
        assert!(!a.is_disposed());
        assert_eq!(manager.unload_by_tag("hud"), 1);
        assert!(a.is_disposed());

        let err = manager
            .load::<Model>("model", "a.obj", LoadOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::UnsupportedFormat { .. }));
    }
}
