use futures::FutureExt;
use futures::future::LocalBoxFuture;
use scenekit_common::ResourceKind;
use serde_json::Value;
use std::rc::Rc;

use crate::error::ResourceError;
use crate::loader::ResourceLoader;
use crate::options::LoadOptions;
use crate::source::AssetSource;

/// Parses JSON documents, optionally post-processed by
/// [`LoadOptions::json_transform`].
pub struct JsonLoader {
    source: Rc<dyn AssetSource>,
}

impl JsonLoader {
    pub fn new(source: Rc<dyn AssetSource>) -> Self {
        Self { source }
    }
}

impl ResourceLoader for JsonLoader {
    type Asset = Value;

    fn kind(&self) -> &str {
        ResourceKind::JSON
    }

    fn load<'a>(
        &'a self,
        url: &'a str,
        options: &'a LoadOptions,
    ) -> LocalBoxFuture<'a, Result<Value, ResourceError>> {
        async move {
            let bytes = self.source.fetch(url).await?;
            let value: Value =
                serde_json::from_slice(&bytes).map_err(|e| ResourceError::load_failure(url, e))?;
            match &options.json_transform {
                Some(transform) => {
                    transform(value).map_err(|e| ResourceError::load_failure(url, e))
                }
                None => Ok(value),
            }
        }
        .boxed_local()
    }

    fn approx_size(&self, value: &Value) -> usize {
        value.to_string().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use serde_json::json;

    fn loader() -> JsonLoader {
        let source = MemorySource::new();
        source.insert("level.json", br#"{"enemies":[1,2,3]}"#.to_vec());
        source.insert("broken.json", b"{".to_vec());
        JsonLoader::new(Rc::new(source))
    }

    #[tokio::test]
    async fn parses_document() {
        let v = loader().load("level.json", &LoadOptions::new()).await.unwrap();
        assert_eq!(v, json!({"enemies": [1, 2, 3]}));
    }

    #[tokio::test]
    async fn applies_transform_before_returning() {
        let options = LoadOptions::new().with_json_transform(|v| {
            v.get("enemies")
                .cloned()
                .ok_or_else(|| "missing enemies".to_string())
        });
        let v = loader().load("level.json", &options).await.unwrap();
        assert_eq!(v, json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn transform_failure_is_a_load_failure() {
        let options = LoadOptions::new().with_json_transform(|_| Err("rejected".into()));
        let err = loader().load("level.json", &options).await.unwrap_err();
        assert_eq!(err, ResourceError::load_failure("level.json", "rejected"));
    }

    #[tokio::test]
    async fn invalid_json_reports_url() {
        let err = loader().load("broken.json", &LoadOptions::new()).await.unwrap_err();
        assert!(matches!(err, ResourceError::LoadFailure { ref url, .. } if url == "broken.json"));
    }
}
