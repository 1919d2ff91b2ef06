use scenekit_common::{ParseIdError, ResourceId};
use std::fmt::Display;

/// Errors from resource loading.
///
/// `Clone` so a single coalesced load can hand the same failure to every
/// waiting caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error("no loader registered for resource kind `{kind}`")]
    LoaderNotFound { kind: String },
    #[error("failed to load {url}: {reason}")]
    LoadFailure { url: String, reason: String },
    #[error("unsupported format `{extension}` for {url}")]
    UnsupportedFormat { url: String, extension: String },
    #[error("resource {id} is not a {expected}")]
    TypeMismatch {
        id: ResourceId,
        expected: &'static str,
    },
    #[error(transparent)]
    InvalidId(#[from] ParseIdError),
}

impl ResourceError {
    pub fn load_failure(url: &str, reason: impl Display) -> Self {
        Self::LoadFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
