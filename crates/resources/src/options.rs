use glam::{Vec2, Vec3};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Caller-supplied post-processing for JSON resources.
pub type JsonTransform = Rc<dyn Fn(Value) -> Result<Value, String>>;

/// Per-request load options: cache policy plus loader-specific settings.
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Exempt the entry from idle sweeping.
    pub persistent: bool,
    pub tags: Vec<String>,
    pub texture: TextureOptions,
    pub model: ModelOptions,
    pub json_transform: Option<JsonTransform>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_texture(mut self, texture: TextureOptions) -> Self {
        self.texture = texture;
        self
    }

    pub fn with_model(mut self, model: ModelOptions) -> Self {
        self.model = model;
        self
    }

    pub fn with_json_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + 'static,
    {
        self.json_transform = Some(Rc::new(transform));
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("persistent", &self.persistent)
            .field("tags", &self.tags)
            .field("texture", &self.texture)
            .field("model", &self.model)
            .field("json_transform", &self.json_transform.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

/// Sampler and upload settings applied to a decoded texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureOptions {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub repeat: Vec2,
    pub offset: Vec2,
    pub anisotropy: u8,
    pub generate_mipmaps: bool,
    pub color_space: ColorSpace,
    pub flip_y: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            repeat: Vec2::ONE,
            offset: Vec2::ZERO,
            anisotropy: 1,
            generate_mipmaps: true,
            color_space: ColorSpace::Srgb,
            flip_y: false,
        }
    }
}

/// Placement and shadow flags applied to a loaded model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    pub scale: Vec3,
    pub position: Vec3,
    /// Euler angles in radians, XYZ order.
    pub rotation: Vec3,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            cast_shadow: true,
            receive_shadow: true,
        }
    }
}
