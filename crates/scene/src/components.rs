use glam::{Quat, Vec3};
use scenekit_common::ObjectId;
use scenekit_events::{Event, Listener, channels, listener};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::component::{Component, ComponentContext};

/// Spins its object around `axis` at `speed` radians per second.
#[derive(Debug, Clone, Copy)]
pub struct Rotator {
    pub axis: Vec3,
    pub speed: f32,
}

impl Rotator {
    pub fn new(axis: Vec3, speed: f32) -> Self {
        Self {
            axis: axis.try_normalize().unwrap_or(Vec3::Y),
            speed,
        }
    }
}

impl Component for Rotator {
    fn on_update(&mut self, dt: f32, ctx: &mut ComponentContext<'_>) {
        if let Some(t) = ctx.transform_mut() {
            let step = Quat::from_axis_angle(self.axis, self.speed * dt);
            t.rotation = (step * t.rotation).normalize();
        }
    }
}

/// Moves its object at a constant velocity (units per second).
#[derive(Debug, Clone, Copy)]
pub struct LinearMover {
    pub velocity: Vec3,
}

impl Component for LinearMover {
    fn on_update(&mut self, dt: f32, ctx: &mut ComponentContext<'_>) {
        if let Some(t) = ctx.transform_mut() {
            t.position += self.velocity * dt;
        }
    }
}

/// Bounding sphere tested by the scene's collision pass.
#[derive(Debug, Clone, Copy)]
pub struct CollisionDetector {
    pub radius: f32,
}

impl CollisionDetector {
    pub fn new(radius: f32) -> Self {
        Self {
            radius: radius.max(0.0),
        }
    }
}

impl Component for CollisionDetector {}

type HitCallback = Box<dyn FnMut(&ObjectId, &mut ComponentContext<'_>)>;

/// Reacts to `collision` events that involve its object.
///
/// Hits are queued by the bus listener and handled on the next update, so the
/// callback gets a full [`ComponentContext`].
pub struct CollisionHandler {
    inbox: Rc<RefCell<VecDeque<ObjectId>>>,
    subscription: Option<Listener<Event>>,
    on_hit: Option<HitCallback>,
    hits: u32,
    last_hit: Option<ObjectId>,
}

impl Default for CollisionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionHandler {
    pub fn new() -> Self {
        Self {
            inbox: Rc::default(),
            subscription: None,
            on_hit: None,
            hits: 0,
            last_hit: None,
        }
    }

    pub fn with_callback<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ObjectId, &mut ComponentContext<'_>) + 'static,
    {
        self.on_hit = Some(Box::new(f));
        self
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn last_hit(&self) -> Option<&ObjectId> {
        self.last_hit.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

impl Component for CollisionHandler {
    fn on_start(&mut self, ctx: &mut ComponentContext<'_>) {
        let me = ctx.object_id().clone();
        let inbox = self.inbox.clone();
        let sub = listener(move |event: &Event| {
            if let Event::Collision { a, b } = event {
                let other = if *a == me {
                    b
                } else if *b == me {
                    a
                } else {
                    return;
                };
                inbox.borrow_mut().push_back(other.clone());
            }
        });
        ctx.bus().on(channels::COLLISION, sub.clone());
        self.subscription = Some(sub);
    }

    fn on_update(&mut self, _dt: f32, ctx: &mut ComponentContext<'_>) {
        let pending: Vec<ObjectId> = self.inbox.borrow_mut().drain(..).collect();
        for other in pending {
            self.hits += 1;
            tracing::info!(object = %ctx.object_id(), %other, "collision handled");
            if let Some(cb) = self.on_hit.as_mut() {
                cb(&other, ctx);
            }
            self.last_hit = Some(other);
        }
    }

    fn on_destroy(&mut self, ctx: &mut ComponentContext<'_>) {
        if let Some(sub) = self.subscription.take() {
            ctx.bus().off(channels::COLLISION, &sub);
        }
        self.inbox.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scene;
    use scenekit_common::Transform;
    use scenekit_events::Bus;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn rotator_spins_about_its_axis() {
        let mut scene = Scene::new(Rc::new(Bus::new()));
        scene
            .spawn("spinner")
            .unwrap()
            .add_component(Rotator::new(Vec3::new(0.0, 2.0, 0.0), FRAC_PI_2));
        scene.update(1.0);
        let rotation = scene.world_transform(&"spinner".into()).unwrap().rotation;
        let forward = rotation * Vec3::X;
        assert!((forward - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn linear_mover_integrates_velocity() {
        let mut scene = Scene::new(Rc::new(Bus::new()));
        scene.spawn("m").unwrap().add_component(LinearMover {
            velocity: Vec3::new(2.0, 0.0, 0.0),
        });
        scene.update(0.5);
        scene.update(0.5);
        assert_eq!(scene.world_position(&"m".into()), Some(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn handler_processes_hits_on_next_update_and_unsubscribes_on_destroy() {
        let bus = Rc::new(Bus::new());
        let mut scene = Scene::new(bus.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        scene
            .spawn("player")
            .unwrap()
            .add_component(CollisionDetector::new(1.0))
            .add_component(CollisionHandler::new().with_callback(move |other, _ctx| {
                sink.borrow_mut().push(other.clone());
            }));
        scene
            .spawn_at("rock", Transform::from_position(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap()
            .add_component(CollisionDetector::new(0.5));

        // frame 1: starts the handler, then the collision pass queues the hit
        scene.update(0.1);
        assert!(seen.borrow().is_empty());
        assert_eq!(bus.listener_count(channels::COLLISION), 1);

        scene.update(0.1);
        assert_eq!(*seen.borrow(), vec![ObjectId::from("rock")]);
        let player = ObjectId::from("player");
        let handler = scene
            .get(&player)
            .unwrap()
            .get_component::<CollisionHandler>()
            .unwrap();
        assert_eq!(handler.hits(), 1);
        assert_eq!(handler.last_hit(), Some(&ObjectId::from("rock")));

        scene.destroy(&player).unwrap();
        assert_eq!(bus.listener_count(channels::COLLISION), 0);
    }

    #[test]
    fn handler_ignores_collisions_between_other_objects() {
        let bus = Rc::new(Bus::new());
        let mut scene = Scene::new(bus.clone());
        scene.spawn("watcher").unwrap().add_component(CollisionHandler::new());
        scene.start();
        bus.publish(&Event::Collision {
            a: "x".into(),
            b: "y".into(),
        });
        scene.update(0.1);
        let watcher = scene.get(&"watcher".into()).unwrap();
        assert_eq!(watcher.get_component::<CollisionHandler>().unwrap().hits(), 0);
    }
}
