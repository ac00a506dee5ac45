//! SceneBuilder - Declarative scene construction
//!
//! Provides a fluent API for building scenes whose nodes get physics bodies
//! once the session starts.

use nalgebra::{Isometry3, Vector3};
use physync_physics::Geometry;
use physync_scene::{InstanceBuffer, Node, NodeKey, SceneGraph, Transform3D};

/// A node waiting for a physics body
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingBody {
    /// Node the body drives
    pub node: NodeKey,
    /// Body mass (zero for static)
    pub mass: f32,
    /// Give every node in the subtree with geometry its own body instead
    pub recursive: bool,
}

impl PendingBody {
    /// A body for a single node
    pub fn new(node: NodeKey, mass: f32) -> Self {
        Self {
            node,
            mass,
            recursive: false,
        }
    }

    /// A body for every node with geometry under `node`, `node` included
    pub fn recursive(node: NodeKey, mass: f32) -> Self {
        Self {
            node,
            mass,
            recursive: true,
        }
    }
}

/// Output of a [`SceneBuilder`]
pub struct SceneSetup {
    /// The scene graph
    pub scene: SceneGraph,
    /// Bodies to attach once physics is running, in insertion order
    pub bodies: Vec<PendingBody>,
    /// Node placed at the character's feet every frame
    pub player: Option<NodeKey>,
    /// Where the character starts (capsule center)
    pub spawn: Option<Vector3<f32>>,
}

/// Builder for constructing scenes with physics
///
/// # Example
/// ```ignore
/// let setup = SceneBuilder::new()
///     .add_ground(0.0, 20.0)
///     .add_box("crate", Vector3::new(0.0, 4.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 1.0)
///     .add_player(Vector3::new(0.0, 2.0, 5.0))
///     .build();
/// ```
pub struct SceneBuilder {
    scene: SceneGraph,
    bodies: Vec<PendingBody>,
    player: Option<NodeKey>,
    spawn: Option<Vector3<f32>>,
}

impl SceneBuilder {
    /// Create a new scene builder
    pub fn new() -> Self {
        Self {
            scene: SceneGraph::new(),
            bodies: Vec::new(),
            player: None,
            spawn: None,
        }
    }

    /// Add a static ground slab whose top face sits at `y`
    pub fn add_ground(self, y: f32, size: f32) -> Self {
        let thickness = 1.0;
        let node = Node::new(Geometry::cuboid(size, thickness, size))
            .with_name("ground")
            .with_tag("static")
            .with_transform(Transform3D::from_position(Vector3::new(0.0, y - thickness / 2.0, 0.0)));
        self.add_node(node, Some(0.0))
    }

    /// Add a box; a positive mass makes it dynamic
    pub fn add_box(self, name: &str, position: Vector3<f32>, size: Vector3<f32>, mass: f32) -> Self {
        let node = Node::new(Geometry::cuboid(size.x, size.y, size.z))
            .with_name(name)
            .with_tag(body_tag(mass))
            .with_transform(Transform3D::from_position(position));
        self.add_node(node, Some(mass))
    }

    /// Add a sphere; a positive mass makes it dynamic
    pub fn add_sphere(self, name: &str, position: Vector3<f32>, radius: f32, mass: f32) -> Self {
        let node = Node::new(Geometry::sphere(radius))
            .with_name(name)
            .with_tag(body_tag(mass))
            .with_transform(Transform3D::from_position(position));
        self.add_node(node, Some(mass))
    }

    /// Add one instanced node drawing a box at every position
    ///
    /// Each instance gets its own body.
    pub fn add_crates(self, name: &str, positions: &[Vector3<f32>], size: f32, mass: f32) -> Self {
        let poses: Vec<Isometry3<f32>> = positions.iter().map(|p| Isometry3::translation(p.x, p.y, p.z)).collect();
        let node = Node::new(Geometry::cuboid(size, size, size))
            .with_name(name)
            .with_tag(body_tag(mass))
            .with_instances(InstanceBuffer::from_isometries(&poses));
        self.add_node(node, Some(mass))
    }

    /// Add a static wedge rising `height` over `length` along +Z
    pub fn add_ramp(self, name: &str, position: Vector3<f32>, width: f32, length: f32, height: f32) -> Self {
        let (w, l, h) = (width / 2.0, length / 2.0, height);
        #[rustfmt::skip]
        let positions = vec![
            -w, 0.0, -l,
             w, 0.0, -l,
             w, 0.0,  l,
            -w, 0.0,  l,
             w, h,    l,
            -w, h,    l,
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1,  0, 3, 2, // bottom
            0, 4, 5,  0, 1, 4, // slope
            3, 5, 4,  3, 4, 2, // back
            0, 5, 3,           // left
            1, 2, 4,           // right
        ];
        let node = Node::new(Geometry::indexed_mesh(positions, indices))
            .with_name(name)
            .with_tag("static")
            .with_transform(Transform3D::from_position(position));
        self.add_node(node, Some(0.0))
    }

    /// Add a grouping node with no body
    pub fn add_group(self, name: &str, transform: Transform3D) -> Self {
        self.add_node(Node::group().with_name(name).with_transform(transform), None)
    }

    /// Add a node under a named parent
    ///
    /// The node is dropped with a warning if the parent doesn't exist.
    pub fn add_child(mut self, parent: &str, node: Node, mass: Option<f32>) -> Self {
        let Some(parent_key) = self.scene.get_by_name(parent) else {
            log::warn!("Cannot add child: no node named '{}'", parent);
            return self;
        };
        if let Some(key) = self.scene.add_child(parent_key, node) {
            self.queue_body(key, mass);
        }
        self
    }

    /// Add a custom root node, with a body if `mass` is given
    pub fn add_node(mut self, node: Node, mass: Option<f32>) -> Self {
        let key = self.scene.add_node(node);
        self.queue_body(key, mass);
        self
    }

    /// Give every node with geometry under a named node a body of `mass`
    ///
    /// Grouping nodes are skipped. Nothing is queued if the name is unknown.
    pub fn add_body_tree(mut self, name: &str, mass: f32) -> Self {
        match self.scene.get_by_name(name) {
            Some(key) => self.bodies.push(PendingBody::recursive(key, mass)),
            None => log::warn!("Cannot add body tree: no node named '{}'", name),
        }
        self
    }

    /// Add the player node and the character's starting point
    pub fn add_player(mut self, spawn: Vector3<f32>) -> Self {
        let key = self.scene.add_node(Node::group().with_name("player").with_tag("player"));
        self.player = Some(key);
        self.spawn = Some(spawn);
        self
    }

    fn queue_body(&mut self, node: NodeKey, mass: Option<f32>) {
        if let Some(mass) = mass {
            self.bodies.push(PendingBody::new(node, mass));
        }
    }

    /// Get the player's starting position (if a player was added)
    pub fn player_start(&self) -> Option<Vector3<f32>> {
        self.spawn
    }

    /// Finish building
    pub fn build(self) -> SceneSetup {
        SceneSetup {
            scene: self.scene,
            bodies: self.bodies,
            player: self.player,
            spawn: self.spawn,
        }
    }
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn body_tag(mass: f32) -> &'static str {
    if mass > 0.0 {
        "dynamic"
    } else {
        "static"
    }
}
