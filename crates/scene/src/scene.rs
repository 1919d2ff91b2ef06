use glam::Vec3;
use scenekit_common::{ObjectId, Transform};
use scenekit_events::{Bus, Event};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::components::CollisionDetector;
use crate::error::SceneError;
use crate::game_object::{GameObject, ObjectMut};
use crate::graph::SceneGraph;

/// Owns the game objects, their render graph and the bus their components
/// talk over.
pub struct Scene {
    graph: SceneGraph,
    objects: HashMap<ObjectId, GameObject>,
    order: Vec<ObjectId>,
    bus: Rc<Bus>,
    started: bool,
    contacts: BTreeSet<(ObjectId, ObjectId)>,
    frame: u64,
}

impl Scene {
    pub fn new(bus: Rc<Bus>) -> Self {
        Self {
            graph: SceneGraph::new(),
            objects: HashMap::new(),
            order: Vec::new(),
            bus,
            started: false,
            contacts: BTreeSet::new(),
            frame: 0,
        }
    }

    pub fn bus(&self) -> &Rc<Bus> {
        &self.bus
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Object ids in insertion (update) order.
    pub fn ids(&self) -> &[ObjectId] {
        &self.order
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Frames run through [`update`](Self::update) so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn spawn(&mut self, id: impl Into<ObjectId>) -> Result<ObjectMut<'_>, SceneError> {
        self.spawn_at(id, Transform::default())
    }

    /// Add an object under the graph root. In a started scene the object
    /// starts immediately, so components added afterwards start as they
    /// are attached.
    pub fn spawn_at(
        &mut self,
        id: impl Into<ObjectId>,
        transform: Transform,
    ) -> Result<ObjectMut<'_>, SceneError> {
        let id = id.into();
        if self.objects.contains_key(&id) {
            return Err(SceneError::DuplicateObject(id));
        }
        let node = self.graph.create(id.as_str(), transform);
        let mut object = GameObject::new(id.clone(), node);
        if self.started {
            object.start(&mut self.graph, &self.bus);
        }
        tracing::debug!(object = %id, "spawned");
        self.order.push(id.clone());
        let object = self.objects.entry(id).or_insert(object);
        Ok(ObjectMut {
            object,
            graph: &mut self.graph,
            bus: &self.bus,
        })
    }

    /// Spawn under a generated id, for objects nothing looks up by name.
    pub fn spawn_anonymous(&mut self, transform: Transform) -> Result<ObjectMut<'_>, SceneError> {
        self.spawn_at(ObjectId::generate(), transform)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<ObjectMut<'_>> {
        let object = self.objects.get_mut(id)?;
        Some(ObjectMut {
            object,
            graph: &mut self.graph,
            bus: &self.bus,
        })
    }

    /// Parent `child`'s node under `parent`'s node.
    pub fn set_parent(&mut self, child: &ObjectId, parent: &ObjectId) -> Result<(), SceneError> {
        let child_node = self
            .objects
            .get(child)
            .ok_or_else(|| SceneError::ObjectNotFound(child.clone()))?
            .node();
        let parent_node = self
            .objects
            .get(parent)
            .ok_or_else(|| SceneError::ObjectNotFound(parent.clone()))?
            .node();
        self.graph.attach(child_node, parent_node)
    }

    /// Move `child` back under the graph root.
    pub fn clear_parent(&mut self, child: &ObjectId) -> Result<(), SceneError> {
        let node = self
            .objects
            .get(child)
            .ok_or_else(|| SceneError::ObjectNotFound(child.clone()))?
            .node();
        let root = self.graph.root();
        self.graph.attach(node, root)
    }

    /// Destroy an object: its components' destroy hooks run, it leaves the
    /// lookup and its node leaves the graph. Child objects become detached.
    pub fn destroy(&mut self, id: &ObjectId) -> Result<(), SceneError> {
        let mut object = self
            .objects
            .remove(id)
            .ok_or_else(|| SceneError::ObjectNotFound(id.clone()))?;
        self.order.retain(|o| o != id);
        self.contacts.retain(|(a, b)| a != id && b != id);
        object.destroy(&mut self.graph, &self.bus);
        tracing::debug!(object = %id, "destroyed");
        Ok(())
    }

    /// Start every object. Idempotent.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for id in &self.order {
            if let Some(object) = self.objects.get_mut(id) {
                object.start(&mut self.graph, &self.bus);
            }
        }
    }

    /// Advance one frame: update objects in insertion order, then run the
    /// collision pass.
    pub fn update(&mut self, dt: f32) {
        self.start();
        self.frame += 1;
        let _span = tracing::trace_span!("scene_update", frame = self.frame).entered();
        for id in &self.order {
            if let Some(object) = self.objects.get_mut(id) {
                object.update(dt, &mut self.graph, &self.bus);
            }
        }
        self.detect_collisions();
    }

    pub fn world_transform(&self, id: &ObjectId) -> Option<Transform> {
        let object = self.objects.get(id)?;
        self.graph.world_transform(object.node())
    }

    pub fn world_position(&self, id: &ObjectId) -> Option<Vec3> {
        self.world_transform(id).map(|t| t.position)
    }

    /// Publish `collision` for every pair of enabled detectors that started
    /// overlapping this frame.
    fn detect_collisions(&mut self) {
        let spheres: Vec<(&ObjectId, Vec3, f32)> = self
            .order
            .iter()
            .filter_map(|id| {
                let object = self.objects.get(id)?;
                let enabled = object.is_component_enabled::<CollisionDetector>() == Some(true);
                if !object.is_active() || !enabled {
                    return None;
                }
                let radius = object.get_component::<CollisionDetector>()?.radius;
                let position = self.graph.world_transform(object.node())?.position;
                Some((id, position, radius))
            })
            .collect();

        let mut current = BTreeSet::new();
        for (i, (a, pa, ra)) in spheres.iter().enumerate() {
            for (b, pb, rb) in &spheres[i + 1..] {
                if pa.distance(*pb) <= ra + rb {
                    current.insert(((*a).clone(), (*b).clone()));
                }
            }
        }

        let began: Vec<(ObjectId, ObjectId)> =
            current.difference(&self.contacts).cloned().collect();
        self.contacts = current;
        for (a, b) in began {
            tracing::debug!(%a, %b, "collision");
            self.bus.publish(&Event::Collision { a, b });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentContext};
    use scenekit_events::{channels, listener};
    use std::cell::{Cell, RefCell};

    fn scene() -> Scene {
        Scene::new(Rc::new(Bus::new()))
    }

    struct Starts(Rc<Cell<u32>>);

    impl Component for Starts {
        fn on_start(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn spawn_rejects_duplicates() {
        let mut s = scene();
        s.spawn("a").unwrap();
        assert!(matches!(s.spawn("a"), Err(SceneError::DuplicateObject(_))));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn anonymous_spawns_get_distinct_ids() {
        let mut s = scene();
        let a = s
            .spawn_anonymous(Transform::from_position(Vec3::X))
            .unwrap()
            .object()
            .id()
            .clone();
        let b = s.spawn_anonymous(Transform::default()).unwrap().object().id().clone();
        assert_ne!(a, b);
        assert_eq!(s.ids(), &[a.clone(), b]);
        assert_eq!(s.world_position(&a), Some(Vec3::X));
    }

    #[test]
    fn component_starts_once_across_scene_and_manual_starts() {
        let mut s = scene();
        let count = Rc::new(Cell::new(0));
        let mut obj = s.spawn("a").unwrap();
        obj.add_component(Starts(count.clone()));
        obj.start();
        obj.start();
        s.start();
        s.update(0.016);
        s.update(0.016);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn spawning_into_started_scene_starts_components_on_add() {
        let mut s = scene();
        s.start();
        let count = Rc::new(Cell::new(0));
        s.spawn("late").unwrap().add_component(Starts(count.clone()));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn updates_run_in_insertion_order() {
        struct Recorder(&'static str, Rc<RefCell<Vec<&'static str>>>);
        impl Component for Recorder {
            fn on_update(&mut self, _dt: f32, _ctx: &mut ComponentContext<'_>) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let mut s = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["c", "a", "b"] {
            s.spawn(name).unwrap().add_component(Recorder(name, log.clone()));
        }
        s.update(0.1);
        assert_eq!(*log.borrow(), vec!["c", "a", "b"]);
        assert_eq!(s.frame(), 1);
    }

    #[test]
    fn set_parent_composes_world_positions() {
        let mut s = scene();
        s.spawn_at("parent", Transform::from_position(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        s.spawn_at("child", Transform::from_position(Vec3::new(0.0, 3.0, 0.0)))
            .unwrap();
        let (parent, child) = (ObjectId::from("parent"), ObjectId::from("child"));
        s.set_parent(&child, &parent).unwrap();
        assert_eq!(s.world_position(&child), Some(Vec3::new(1.0, 3.0, 0.0)));

        assert_eq!(s.set_parent(&parent, &child), Err(SceneError::WouldCycle));
        assert!(matches!(
            s.set_parent(&child, &ObjectId::from("ghost")),
            Err(SceneError::ObjectNotFound(_))
        ));

        s.clear_parent(&child).unwrap();
        assert_eq!(s.world_position(&child), Some(Vec3::new(0.0, 3.0, 0.0)));
    }

    #[test]
    fn destroy_removes_object_and_node() {
        let mut s = scene();
        let node = s.spawn("a").unwrap().object().node();
        let id = ObjectId::from("a");
        s.destroy(&id).unwrap();
        assert!(s.get(&id).is_none());
        assert!(s.ids().is_empty());
        assert!(!s.graph().contains(node));
        assert_eq!(s.destroy(&id), Err(SceneError::ObjectNotFound(id)));
    }

    #[test]
    fn collision_fires_once_when_overlap_begins() {
        let mut s = scene();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        s.bus().on(
            channels::COLLISION,
            listener(move |e: &Event| {
                if let Event::Collision { a, b } = e {
                    sink.borrow_mut().push((a.clone(), b.clone()));
                }
            }),
        );

        s.spawn_at("a", Transform::default())
            .unwrap()
            .add_component(CollisionDetector::new(1.0));
        s.spawn_at("b", Transform::from_position(Vec3::new(1.5, 0.0, 0.0)))
            .unwrap()
            .add_component(CollisionDetector::new(1.0));
        s.spawn_at("far", Transform::from_position(Vec3::new(50.0, 0.0, 0.0)))
            .unwrap()
            .add_component(CollisionDetector::new(1.0));

        s.update(0.1);
        s.update(0.1);
        assert_eq!(
            *seen.borrow(),
            vec![(ObjectId::from("a"), ObjectId::from("b"))]
        );

        // separate, then overlap again
        let b = ObjectId::from("b");
        s.get_mut(&b).unwrap().transform_mut().unwrap().position.x = 10.0;
        s.update(0.1);
        s.get_mut(&b).unwrap().transform_mut().unwrap().position.x = 0.5;
        s.update(0.1);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn disabled_detectors_do_not_collide() {
        let mut s = scene();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        s.bus().on(
            channels::COLLISION,
            listener(move |_: &Event| counter.set(counter.get() + 1)),
        );
        s.spawn("a").unwrap().add_component(CollisionDetector::new(1.0));
        let mut b = s.spawn("b").unwrap();
        b.add_component(CollisionDetector::new(1.0));
        b.set_component_enabled::<CollisionDetector>(false);
        s.update(0.1);
        assert_eq!(hits.get(), 0);
    }
}
