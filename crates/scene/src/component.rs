use scenekit_common::{ObjectId, Transform};
use scenekit_events::Bus;
use std::any::Any;
use std::rc::Rc;

use crate::graph::{NodeId, SceneGraph};

/// Upcast helper so trait objects can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// What a component sees of its owner while a lifecycle hook runs.
pub struct ComponentContext<'a> {
    pub(crate) object: &'a ObjectId,
    pub(crate) node: NodeId,
    pub(crate) graph: &'a mut SceneGraph,
    pub(crate) bus: &'a Rc<Bus>,
}

impl ComponentContext<'_> {
    pub fn object_id(&self) -> &ObjectId {
        self.object
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn bus(&self) -> &Rc<Bus> {
        self.bus
    }

    /// Local transform of the owner's node.
    pub fn transform(&self) -> Option<&Transform> {
        self.graph.local(self.node)
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        self.graph.local_mut(self.node)
    }

    pub fn world_transform(&self) -> Option<Transform> {
        self.graph.world_transform(self.node)
    }
}

/// Behaviour attached to a [`GameObject`](crate::GameObject).
///
/// Hooks default to no-ops. `on_start` runs once, before the first
/// `on_update`, the first time the component is enabled on an active object.
pub trait Component: AsAny {
    fn on_start(&mut self, _ctx: &mut ComponentContext<'_>) {}
    fn on_update(&mut self, _dt: f32, _ctx: &mut ComponentContext<'_>) {}
    fn on_enable(&mut self, _ctx: &mut ComponentContext<'_>) {}
    fn on_disable(&mut self, _ctx: &mut ComponentContext<'_>) {}
    fn on_destroy(&mut self, _ctx: &mut ComponentContext<'_>) {}
}

pub(crate) struct ComponentSlot {
    pub(crate) component: Box<dyn Component>,
    pub(crate) enabled: bool,
    pub(crate) started: bool,
}

impl ComponentSlot {
    pub(crate) fn new(component: Box<dyn Component>) -> Self {
        Self {
            component,
            enabled: true,
            started: false,
        }
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        let component: &dyn Component = &*self.component;
        component.as_any()
    }

    pub(crate) fn as_any_mut(&mut self) -> &mut dyn Any {
        let component: &mut dyn Component = &mut *self.component;
        component.as_any_mut()
    }

    pub(crate) fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Fire `on_start` if it has not fired yet.
    pub(crate) fn start(&mut self, ctx: &mut ComponentContext<'_>) {
        if !self.started {
            self.started = true;
            self.component.on_start(ctx);
        }
    }
}
