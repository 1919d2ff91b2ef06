use anyhow::Context;
use scenekit_resources::{LoadOptions, PreloadRequest};
use serde::Deserialize;
use std::path::Path;

/// Preload manifest read by `scenekit-cli preload`.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub resources: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestEntry {
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Manifest {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing manifest {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_requests(self) -> Vec<PreloadRequest> {
        self.resources
            .into_iter()
            .map(|entry| {
                let options = LoadOptions {
                    persistent: entry.persistent,
                    tags: entry.tags,
                    ..LoadOptions::default()
                };
                PreloadRequest::new(entry.kind, entry.url).with_options(options)
            })
            .collect()
    }
}
