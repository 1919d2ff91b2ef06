use scenekit_common::Transform;

use crate::error::SceneError;

/// Handle to a node in a [`SceneGraph`]. Stale handles (to removed nodes)
/// never alias a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Node {
    name: String,
    local: Transform,
    visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of transform nodes forming the render hierarchy.
///
/// Nodes not reachable from [`root`](Self::root) are detached and would not
/// be drawn.
#[derive(Debug)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        graph.root = graph.alloc(Node {
            name: "root".into(),
            local: Transform::default(),
            visible: true,
            parent: None,
            children: Vec::new(),
        });
        graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation += 1;
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    /// Create a node as a child of the root.
    pub fn create(&mut self, name: impl Into<String>, local: Transform) -> NodeId {
        let id = self.alloc(Node {
            name: name.into(),
            local,
            visible: true,
            parent: None,
            children: Vec::new(),
        });
        let root = self.root;
        self.link(id, root);
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    pub fn local(&self, id: NodeId) -> Option<&Transform> {
        self.node(id).map(|n| &n.local)
    }

    pub fn local_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.node_mut(id).map(|n| &mut n.local)
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.visible)
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(n) = self.node_mut(id) {
            n.visible = visible;
        }
    }

    /// Transform composed from the root (or the top of a detached subtree).
    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        let node = self.node(id)?;
        Some(match node.parent {
            Some(parent) => self
                .world_transform(parent)
                .unwrap_or_default()
                .mul_transform(&node.local),
            None => node.local,
        })
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_ancestor(self.root, id)
    }

    /// Move `child` under `parent`, detaching it from its previous parent.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> Result<(), SceneError> {
        if !self.contains(child) || !self.contains(parent) || child == self.root {
            return Err(SceneError::NodeNotFound);
        }
        if self.is_ancestor(child, parent) {
            return Err(SceneError::WouldCycle);
        }
        self.detach(child);
        self.link(child, parent);
        Ok(())
    }

    fn link(&mut self, child: NodeId, parent: NodeId) {
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Unlink `id` from its parent. Returns false if it had none.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = None;
        }
        true
    }

    /// Detach and free `id`. Its children stay alive as detached subtrees.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        self.detach(id);
        let slot = &mut self.slots[id.index as usize];
        let children = slot.node.take().map(|n| n.children).unwrap_or_default();
        self.free.push(id.index);
        for child in children {
            if let Some(c) = self.node_mut(child) {
                c.parent = None;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn new_nodes_hang_off_root() {
        let mut g = SceneGraph::new();
        let a = g.create("a", Transform::default());
        assert_eq!(g.parent(a), Some(g.root()));
        assert_eq!(g.children(g.root()), &[a]);
        assert!(g.is_attached(a));
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn world_transform_follows_hierarchy() {
        let mut g = SceneGraph::new();
        let parent = g.create("p", Transform::from_position(Vec3::new(5.0, 0.0, 0.0)));
        let child = g.create("c", Transform::from_position(Vec3::new(0.0, 2.0, 0.0)));
        g.attach(child, parent).unwrap();
        assert_eq!(
            g.world_transform(child).unwrap().position,
            Vec3::new(5.0, 2.0, 0.0)
        );
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut g = SceneGraph::new();
        let a = g.create("a", Transform::default());
        let b = g.create("b", Transform::default());
        g.attach(b, a).unwrap();
        assert_eq!(g.attach(a, b), Err(SceneError::WouldCycle));
        assert_eq!(g.attach(a, a), Err(SceneError::WouldCycle));
    }

    #[test]
    fn remove_detaches_and_orphans_children() {
        let mut g = SceneGraph::new();
        let a = g.create("a", Transform::default());
        let b = g.create("b", Transform::default());
        g.attach(b, a).unwrap();

        assert!(g.remove(a));
        assert!(!g.contains(a));
        assert!(g.children(g.root()).is_empty());
        assert!(g.contains(b));
        assert_eq!(g.parent(b), None);
        assert!(!g.is_attached(b));
        assert!(!g.remove(g.root()));
    }

    #[test]
    fn stale_handles_do_not_alias_reused_slots() {
        let mut g = SceneGraph::new();
        let a = g.create("a", Transform::default());
        g.remove(a);
        let b = g.create("b", Transform::default());
        assert!(!g.contains(a));
        assert_eq!(g.name(b), Some("b"));
        assert!(g.local(a).is_none());
    }
}
