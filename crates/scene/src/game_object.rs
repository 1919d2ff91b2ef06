use scenekit_common::{ObjectId, Transform};
use scenekit_events::Bus;
use std::rc::Rc;

use crate::component::{Component, ComponentContext, ComponentSlot};
use crate::graph::{NodeId, SceneGraph};

/// A scene entity: an identifier, a node in the render graph and an ordered
/// list of components.
pub struct GameObject {
    id: ObjectId,
    node: NodeId,
    active: bool,
    started: bool,
    destroyed: bool,
    components: Vec<ComponentSlot>,
}

impl GameObject {
    pub(crate) fn new(id: ObjectId, node: NodeId) -> Self {
        Self {
            id,
            node,
            active: true,
            started: false,
            destroyed: false,
            components: Vec::new(),
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// First attached component of type `T`.
    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.components
            .iter()
            .find_map(|slot| slot.as_any().downcast_ref::<T>())
    }

    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find_map(|slot| slot.as_any_mut().downcast_mut::<T>())
    }

    pub fn is_component_enabled<T: Component>(&self) -> Option<bool> {
        self.components
            .iter()
            .find(|slot| slot.is::<T>())
            .map(|slot| slot.enabled)
    }

    fn ready(&self) -> bool {
        self.started && self.active && !self.destroyed
    }

    pub(crate) fn add_component(
        &mut self,
        component: Box<dyn Component>,
        graph: &mut SceneGraph,
        bus: &Rc<Bus>,
    ) {
        let mut slot = ComponentSlot::new(component);
        if self.ready() {
            let mut ctx = ComponentContext {
                object: &self.id,
                node: self.node,
                graph,
                bus,
            };
            slot.start(&mut ctx);
        }
        self.components.push(slot);
    }

    /// Start every enabled component that has not started yet.
    pub(crate) fn start(&mut self, graph: &mut SceneGraph, bus: &Rc<Bus>) {
        self.started = true;
        if !self.ready() {
            return;
        }
        let mut ctx = ComponentContext {
            object: &self.id,
            node: self.node,
            graph,
            bus,
        };
        for slot in self.components.iter_mut().filter(|s| s.enabled) {
            slot.start(&mut ctx);
        }
    }

    pub(crate) fn update(&mut self, dt: f32, graph: &mut SceneGraph, bus: &Rc<Bus>) {
        self.started = true;
        if !self.ready() {
            return;
        }
        let mut ctx = ComponentContext {
            object: &self.id,
            node: self.node,
            graph,
            bus,
        };
        for slot in self.components.iter_mut().filter(|s| s.enabled) {
            slot.start(&mut ctx);
            slot.component.on_update(dt, &mut ctx);
        }
    }

    /// Toggle the first component of type `T`. Returns false if there is none.
    pub(crate) fn set_component_enabled<T: Component>(
        &mut self,
        enabled: bool,
        graph: &mut SceneGraph,
        bus: &Rc<Bus>,
    ) -> bool {
        let ready = self.ready();
        let Some(slot) = self.components.iter_mut().find(|s| s.is::<T>()) else {
            return false;
        };
        if slot.enabled == enabled {
            return true;
        }
        slot.enabled = enabled;
        let mut ctx = ComponentContext {
            object: &self.id,
            node: self.node,
            graph,
            bus,
        };
        if enabled {
            slot.component.on_enable(&mut ctx);
            if ready {
                slot.start(&mut ctx);
            }
        } else {
            slot.component.on_disable(&mut ctx);
        }
        true
    }

    pub(crate) fn set_active(&mut self, active: bool, graph: &mut SceneGraph, bus: &Rc<Bus>) {
        if self.active == active {
            return;
        }
        self.active = active;
        graph.set_visible(self.node, active);
        if active && self.started {
            self.start(graph, bus);
        }
    }

    /// Run `on_destroy` in attachment order, drop the components and remove
    /// the node from the graph. Idempotent.
    pub(crate) fn destroy(&mut self, graph: &mut SceneGraph, bus: &Rc<Bus>) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        let mut ctx = ComponentContext {
            object: &self.id,
            node: self.node,
            graph,
            bus,
        };
        for slot in &mut self.components {
            slot.component.on_destroy(&mut ctx);
        }
        self.components.clear();
        graph.remove(self.node);
    }
}

/// Mutable access to one object together with the scene state its component
/// hooks need.
pub struct ObjectMut<'a> {
    pub(crate) object: &'a mut GameObject,
    pub(crate) graph: &'a mut SceneGraph,
    pub(crate) bus: &'a Rc<Bus>,
}

impl ObjectMut<'_> {
    pub fn id(&self) -> &ObjectId {
        &self.object.id
    }

    pub fn object(&self) -> &GameObject {
        self.object
    }

    /// Attach `component`. It starts right away if the object has started and
    /// is active.
    pub fn add_component<C: Component>(&mut self, component: C) -> &mut Self {
        self.object
            .add_component(Box::new(component), self.graph, self.bus);
        self
    }

    pub fn start(&mut self) {
        self.object.start(self.graph, self.bus);
    }

    pub fn set_active(&mut self, active: bool) {
        self.object.set_active(active, self.graph, self.bus);
    }

    pub fn set_component_enabled<T: Component>(&mut self, enabled: bool) -> bool {
        self.object
            .set_component_enabled::<T>(enabled, self.graph, self.bus)
    }

    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.object.get_component::<T>()
    }

    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.object.get_component_mut::<T>()
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        self.graph.local_mut(self.object.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    struct HookLog {
        tag: &'static str,
        log: Log,
    }

    impl HookLog {
        fn push(&self, hook: &str) {
            self.log.borrow_mut().push(format!("{}:{hook}", self.tag));
        }
    }

    impl Component for HookLog {
        fn on_start(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.push("start");
        }
        fn on_update(&mut self, _dt: f32, _ctx: &mut ComponentContext<'_>) {
            self.push("update");
        }
        fn on_enable(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.push("enable");
        }
        fn on_disable(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.push("disable");
        }
        fn on_destroy(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.push("destroy");
        }
    }

    struct Fixture {
        graph: SceneGraph,
        bus: Rc<Bus>,
        object: GameObject,
        log: Log,
    }

    impl Fixture {
        fn new() -> Self {
            let mut graph = SceneGraph::new();
            let node = graph.create("obj", Transform::default());
            Self {
                graph,
                bus: Rc::new(Bus::new()),
                object: GameObject::new(ObjectId::from("obj"), node),
                log: Log::default(),
            }
        }

        fn handle(&mut self) -> ObjectMut<'_> {
            ObjectMut {
                object: &mut self.object,
                graph: &mut self.graph,
                bus: &self.bus,
            }
        }

        fn hook_log(&self, tag: &'static str) -> HookLog {
            HookLog {
                tag,
                log: self.log.clone(),
            }
        }

        fn entries(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    #[test]
    fn start_fires_once_per_component() {
        let mut fx = Fixture::new();
        let hook_log = fx.hook_log("a");
        let mut obj = fx.handle();
        obj.add_component(hook_log);
        obj.start();
        obj.start();
        fx.object.update(0.1, &mut fx.graph, &fx.bus);
        assert_eq!(fx.entries(), vec!["a:start", "a:update"]);
    }

    #[test]
    fn component_added_after_start_starts_immediately() {
        let mut fx = Fixture::new();
        fx.handle().start();
        let hook_log = fx.hook_log("late");
        fx.handle().add_component(hook_log);
        assert_eq!(fx.entries(), vec!["late:start"]);
        fx.handle().start();
        assert_eq!(fx.entries().len(), 1);
    }

    #[test]
    fn enable_and_disable_fire_only_on_change() {
        let mut fx = Fixture::new();
        let hook_log = fx.hook_log("a");
        let mut obj = fx.handle();
        obj.add_component(hook_log);
        obj.start();
        assert!(obj.set_component_enabled::<HookLog>(false));
        assert!(obj.set_component_enabled::<HookLog>(false));
        assert!(obj.set_component_enabled::<HookLog>(true));
        assert_eq!(fx.entries(), vec!["a:start", "a:disable", "a:enable"]);
    }

    #[test]
    fn disabled_component_defers_start_until_enabled() {
        let mut fx = Fixture::new();
        let hook_log = fx.hook_log("a");
        let mut obj = fx.handle();
        obj.add_component(hook_log);
        obj.set_component_enabled::<HookLog>(false);
        obj.start();
        fx.object.update(0.1, &mut fx.graph, &fx.bus);
        assert!(fx.entries().contains(&"a:disable".to_string()));
        assert!(!fx.entries().contains(&"a:start".to_string()));

        fx.handle().set_component_enabled::<HookLog>(true);
        let entries = fx.entries();
        assert_eq!(&entries[entries.len() - 2..], &["a:enable", "a:start"]);
    }

    #[test]
    fn inactive_object_skips_updates_and_hides_node() {
        let mut fx = Fixture::new();
        let hook_log = fx.hook_log("a");
        let mut obj = fx.handle();
        obj.add_component(hook_log);
        obj.set_active(false);
        obj.start();
        fx.object.update(0.1, &mut fx.graph, &fx.bus);
        assert!(fx.entries().is_empty());
        assert!(!fx.graph.is_visible(fx.object.node()));

        fx.handle().set_active(true);
        assert_eq!(fx.entries(), vec!["a:start"]);
        assert!(fx.graph.is_visible(fx.object.node()));
    }

    #[test]
    fn destroy_runs_hooks_in_order_and_clears() {
        let mut fx = Fixture::new();
        let (a, b) = (fx.hook_log("a"), fx.hook_log("b"));
        fx.handle().add_component(a).add_component(b);
        fx.object.destroy(&mut fx.graph, &fx.bus);
        fx.object.destroy(&mut fx.graph, &fx.bus);
        assert_eq!(fx.entries(), vec!["a:destroy", "b:destroy"]);
        assert_eq!(fx.object.component_count(), 0);
        assert!(!fx.graph.contains(fx.object.node()));
    }

    #[test]
    fn typed_lookup_finds_first_match() {
        struct Marker(u32);
        impl Component for Marker {}

        let mut fx = Fixture::new();
        let hook_log = fx.hook_log("a");
        fx.handle()
            .add_component(hook_log)
            .add_component(Marker(1))
            .add_component(Marker(2));
        assert_eq!(fx.object.get_component::<Marker>().map(|m| m.0), Some(1));
        fx.object.get_component_mut::<Marker>().unwrap().0 = 7;
        assert_eq!(fx.handle().get_component::<Marker>().map(|m| m.0), Some(7));
        assert_eq!(fx.object.is_component_enabled::<Marker>(), Some(true));
    }
}
