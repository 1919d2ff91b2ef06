//! Scene layer: game objects in a render graph, driven by lifecycle hooks on
//! their components.
//!
//! # Invariants
//! - A component's `on_start` fires at most once, before its first `on_update`.
//! - `on_enable`/`on_disable` fire only when the enabled flag actually changes.
//! - Objects update in insertion order; the collision pass runs after all of
//!   them and reports a pair once per contact.
//! - Destroying an object runs `on_destroy` in attachment order, then removes
//!   the object from the scene and its node from the graph.

mod component;
mod components;
mod error;
mod frame;
mod game_object;
mod graph;
mod scene;

pub use component::{AsAny, Component, ComponentContext};
pub use components::{CollisionDetector, CollisionHandler, LinearMover, Rotator};
pub use error::SceneError;
pub use frame::{FrameConfig, FrameLoop, FrameStats, FrameTimer};
pub use game_object::{GameObject, ObjectMut};
pub use graph::{NodeId, SceneGraph};
pub use scene::Scene;

pub fn crate_info() -> &'static str {
    "scenekit-scene v0.1.0"
}
