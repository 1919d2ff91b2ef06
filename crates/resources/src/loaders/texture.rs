use futures::FutureExt;
use futures::future::LocalBoxFuture;
use glam::Vec2;
use scenekit_common::ResourceKind;
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use crate::error::ResourceError;
use crate::loader::ResourceLoader;
use crate::options::{ColorSpace, LoadOptions, TextureOptions, WrapMode};
use crate::source::AssetSource;

/// A decoded RGBA8 image plus its sampler settings.
///
/// Pixel storage stands in for the GPU-side upload; [`dispose`](Self::dispose)
/// releases it.
#[derive(Debug)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub repeat: Vec2,
    pub offset: Vec2,
    pub anisotropy: u8,
    pub color_space: ColorSpace,
    /// 1 when mipmaps are disabled.
    pub mip_levels: u32,
    pixels: RefCell<Vec<u8>>,
    disposed: Cell<bool>,
}

impl Texture {
    /// Decode PNG/JPEG bytes and apply `options`.
    pub fn decode(name: &str, bytes: &[u8], options: &TextureOptions) -> Result<Self, ResourceError> {
        let mut image =
            image::load_from_memory(bytes).map_err(|e| ResourceError::load_failure(name, e))?;
        if options.flip_y {
            image = image.flipv();
        }
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mip_levels = if options.generate_mipmaps {
            32 - width.max(height).max(1).leading_zeros()
        } else {
            1
        };
        Ok(Self {
            name: name.to_string(),
            width,
            height,
            wrap_s: options.wrap_s,
            wrap_t: options.wrap_t,
            repeat: options.repeat,
            offset: options.offset,
            anisotropy: options.anisotropy.max(1),
            color_space: options.color_space,
            mip_levels,
            pixels: RefCell::new(rgba.into_raw()),
            disposed: Cell::new(false),
        })
    }

    pub fn pixels(&self) -> Ref<'_, Vec<u8>> {
        self.pixels.borrow()
    }

    /// Bytes occupied by the base level plus the mip chain.
    pub fn byte_size(&self) -> usize {
        let base = self.width as usize * self.height as usize * 4;
        if self.mip_levels > 1 { base * 4 / 3 } else { base }
    }

    /// Release the pixel storage. Idempotent.
    pub fn dispose(&self) {
        if !self.disposed.replace(true) {
            self.pixels.borrow_mut().clear();
            self.pixels.borrow_mut().shrink_to_fit();
            tracing::trace!(name = %self.name, "texture disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// Loads images as [`Texture`]s.
pub struct TextureLoader {
    source: Rc<dyn AssetSource>,
}

impl TextureLoader {
    pub fn new(source: Rc<dyn AssetSource>) -> Self {
        Self { source }
    }
}

impl ResourceLoader for TextureLoader {
    type Asset = Texture;

    fn kind(&self) -> &str {
        ResourceKind::TEXTURE
    }

    fn load<'a>(
        &'a self,
        url: &'a str,
        options: &'a LoadOptions,
    ) -> LocalBoxFuture<'a, Result<Texture, ResourceError>> {
        async move {
            let bytes = self.source.fetch(url).await?;
            Texture::decode(url, &bytes, &options.texture)
        }
        .boxed_local()
    }

    fn unload(&self, texture: &Texture) {
        texture.dispose();
    }

    fn approx_size(&self, texture: &Texture) -> usize {
        texture.byte_size()
    }
}

/// Encode a solid-colour PNG, used as a test fixture across the crate.
#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn loader_with(url: &str, bytes: Vec<u8>) -> TextureLoader {
        let source = MemorySource::new();
        source.insert(url, bytes);
        TextureLoader::new(Rc::new(source))
    }

    #[tokio::test]
    async fn decodes_png_and_applies_options() {
        let loader = loader_with("checker.png", png_fixture(8, 4, [255, 0, 0, 255]));
        let options = LoadOptions::new().with_texture(TextureOptions {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::MirroredRepeat,
            repeat: Vec2::new(4.0, 2.0),
            anisotropy: 8,
            ..TextureOptions::default()
        });
        let tex = loader.load("checker.png", &options).await.unwrap();
        assert_eq!((tex.width, tex.height), (8, 4));
        assert_eq!(tex.wrap_s, WrapMode::Repeat);
        assert_eq!(tex.wrap_t, WrapMode::MirroredRepeat);
        assert_eq!(tex.repeat, Vec2::new(4.0, 2.0));
        assert_eq!(tex.anisotropy, 8);
        assert_eq!(tex.mip_levels, 4);
        assert_eq!(&tex.pixels()[..4], &[255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn mipmaps_can_be_disabled() {
        let loader = loader_with("a.png", png_fixture(16, 16, [0, 0, 0, 255]));
        let options = LoadOptions::new().with_texture(TextureOptions {
            generate_mipmaps: false,
            ..TextureOptions::default()
        });
        let tex = loader.load("a.png", &options).await.unwrap();
        assert_eq!(tex.mip_levels, 1);
        assert_eq!(loader.approx_size(&tex), 16 * 16 * 4);
    }

    #[tokio::test]
    async fn unload_disposes_pixels() {
        let loader = loader_with("a.png", png_fixture(2, 2, [1, 2, 3, 4]));
        let tex = loader.load("a.png", &LoadOptions::new()).await.unwrap();
        loader.unload(&tex);
        assert!(tex.is_disposed());
        assert!(tex.pixels().is_empty());
        loader.unload(&tex);
    }

    #[tokio::test]
    async fn corrupt_image_reports_url() {
        let loader = loader_with("bad.png", b"not a png".to_vec());
        let err = loader.load("bad.png", &LoadOptions::new()).await.unwrap_err();
        assert!(matches!(err, ResourceError::LoadFailure { ref url, .. } if url == "bad.png"));
    }
}
