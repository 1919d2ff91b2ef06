//! Shared identifiers and spatial types used across scenekit crates.

mod types;

pub use types::{ObjectId, ParseIdError, ResourceId, ResourceKind, Transform};

pub fn crate_info() -> &'static str {
    "scenekit-common v0.1.0"
}
