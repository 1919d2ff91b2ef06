use scenekit_common::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("object {0} already exists in the scene")]
    DuplicateObject(ObjectId),
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),
    #[error("scene graph node not found")]
    NodeNotFound,
    #[error("parenting would create a cycle")]
    WouldCycle,
}
