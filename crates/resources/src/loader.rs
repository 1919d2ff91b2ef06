use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::any::{Any, type_name};
use std::rc::Rc;

use crate::error::ResourceError;
use crate::options::LoadOptions;

/// Loads and releases one kind of asset.
///
/// Implementations are stateless across calls apart from whatever source or
/// decoder handles they hold.
pub trait ResourceLoader: 'static {
    type Asset: Any;

    /// Kind string this loader is registered under (`"texture"`, `"model"`, ...).
    fn kind(&self) -> &str;

    /// Fetch and decode the asset behind `url`.
    fn load<'a>(
        &'a self,
        url: &'a str,
        options: &'a LoadOptions,
    ) -> LocalBoxFuture<'a, Result<Self::Asset, ResourceError>>;

    /// Release any external handles held by `asset`.
    fn unload(&self, _asset: &Self::Asset) {}

    /// Rough memory footprint, recorded in the cache metadata.
    fn approx_size(&self, _asset: &Self::Asset) -> usize {
        0
    }
}

/// Object-safe view of a [`ResourceLoader`] working on type-erased payloads.
pub(crate) trait ErasedLoader {
    fn kind(&self) -> &str;

    fn load_erased<'a>(
        &'a self,
        url: &'a str,
        options: &'a LoadOptions,
    ) -> LocalBoxFuture<'a, Result<Rc<dyn Any>, ResourceError>>;

    /// Returns false if `payload` is not this loader's asset type.
    fn unload_erased(&self, payload: &dyn Any) -> bool;

    fn approx_size_erased(&self, payload: &dyn Any) -> usize;
}

impl<L: ResourceLoader> ErasedLoader for L {
    fn kind(&self) -> &str {
        ResourceLoader::kind(self)
    }

    fn load_erased<'a>(
        &'a self,
        url: &'a str,
        options: &'a LoadOptions,
    ) -> LocalBoxFuture<'a, Result<Rc<dyn Any>, ResourceError>> {
        self.load(url, options)
            .map(|result| result.map(|asset| Rc::new(asset) as Rc<dyn Any>))
            .boxed_local()
    }

    fn unload_erased(&self, payload: &dyn Any) -> bool {
        match payload.downcast_ref::<L::Asset>() {
            Some(asset) => {
                self.unload(asset);
                true
            }
            None => {
                tracing::warn!(
                    kind = ResourceLoader::kind(self),
                    expected = type_name::<L::Asset>(),
                    "unload skipped: payload type does not match loader"
                );
                false
            }
        }
    }

    fn approx_size_erased(&self, payload: &dyn Any) -> usize {
        payload
            .downcast_ref::<L::Asset>()
            .map_or(0, |asset| self.approx_size(asset))
    }
}
