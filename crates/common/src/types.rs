use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Separator between the kind and url halves of a [`ResourceId`].
const KIND_SEPARATOR: &str = "://";

/// Asset kind names used by the built-in loaders.
pub struct ResourceKind;

impl ResourceKind {
    pub const TEXTURE: &'static str = "texture";
    pub const MODEL: &'static str = "model";
    pub const AUDIO: &'static str = "audio";
    pub const JSON: &'static str = "json";
}

/// Errors from parsing a resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    #[error("resource id {0:?} is missing the `kind://` prefix")]
    MissingKind(String),
    #[error("resource id {0:?} has an empty kind")]
    EmptyKind(String),
}

/// Cache key for a loaded resource: `"<kind>://<url>"`.
///
/// The kind is everything before the first `://`. Urls may themselves contain
/// `://`, so two different (kind, url) pairs can in principle render to the
/// same string; the convention is applied uniformly anyway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(kind: &str, url: &str) -> Self {
        Self(format!("{kind}{KIND_SEPARATOR}{url}"))
    }

    /// Parse a composite identifier back into an id.
    pub fn parse(raw: &str) -> Result<Self, ParseIdError> {
        match raw.find(KIND_SEPARATOR) {
            None => Err(ParseIdError::MissingKind(raw.to_string())),
            Some(0) => Err(ParseIdError::EmptyKind(raw.to_string())),
            Some(_) => Ok(Self(raw.to_string())),
        }
    }

    pub fn kind(&self) -> &str {
        self.0
            .split_once(KIND_SEPARATOR)
            .map_or("", |(kind, _)| kind)
    }

    pub fn url(&self) -> &str {
        self.0
            .split_once(KIND_SEPARATOR)
            .map_or(self.0.as_str(), |(_, url)| url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a game object, unique within its scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Generate a fresh random id for objects that don't need a readable name.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Compose `self` (parent) with a child-local transform.
    pub fn mul_transform(&self, local: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale * local.position),
            rotation: self.rotation * local.rotation,
            scale: self.scale * local.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_round_trips_kind_and_url() {
        let id = ResourceId::new("texture", "textures/a.png");
        assert_eq!(id.as_str(), "texture://textures/a.png");
        assert_eq!(id.kind(), "texture");
        assert_eq!(id.url(), "textures/a.png");
    }

    #[test]
    fn resource_id_url_may_contain_separator() {
        let id = ResourceId::new("json", "https://cdn.example/level.json");
        assert_eq!(id.kind(), "json");
        assert_eq!(id.url(), "https://cdn.example/level.json");
    }

    #[test]
    fn parse_rejects_missing_or_empty_kind() {
        assert!(matches!(
            ResourceId::parse("a.png"),
            Err(ParseIdError::MissingKind(_))
        ));
        assert!(matches!(
            ResourceId::parse("://a.png"),
            Err(ParseIdError::EmptyKind(_))
        ));
        assert_eq!(ResourceId::parse("audio://x.wav").unwrap().kind(), "audio");
    }

    #[test]
    fn object_id_generation_is_unique() {
        assert_ne!(ObjectId::generate(), ObjectId::generate());
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn child_transform_composes_with_parent() {
        let parent = Transform {
            position: Vec3::new(10.0, 0.0, 0.0),
            scale: Vec3::splat(2.0),
            ..Transform::default()
        };
        let child = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        let world = parent.mul_transform(&child);
        assert_eq!(world.position, Vec3::new(12.0, 0.0, 0.0));
        assert_eq!(world.scale, Vec3::splat(2.0));
    }
}
