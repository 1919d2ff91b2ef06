//! Built-in loaders, one per asset kind.

mod audio;
mod json;
mod model;
mod texture;

pub use audio::{AudioBuffer, AudioLoader};
pub use json::JsonLoader;
pub use model::{Geometry, Material, MaterialSlot, Mesh, Model, ModelLoader, ModelNode};
pub use texture::{Texture, TextureLoader};

#[cfg(test)]
pub(crate) use texture::png_fixture;

use std::rc::Rc;

use crate::manager::ResourceManager;
use crate::source::AssetSource;

/// Register the texture, model, audio and JSON loaders, all reading from `source`.
pub fn register_default_loaders(manager: &ResourceManager, source: Rc<dyn AssetSource>) {
    manager.register(TextureLoader::new(Rc::clone(&source)));
    manager.register(ModelLoader::new(Rc::clone(&source)));
    manager.register(AudioLoader::new(Rc::clone(&source)));
    manager.register(JsonLoader::new(source));
}
