//! Collision shapes derived from renderable geometry
//!
//! Renderable geometry is described by the closed [`Geometry`] enum. The shape
//! builder maps it onto a rapier shape, always using the object's *world* scale
//! since bodies live in world space.

use nalgebra::{Point3, Vector3};
use rapier3d::prelude::{ColliderBuilder, SharedShape};
use std::fmt;

/// Collision envelope padding for primitive shapes (world units)
pub const DEFAULT_MARGIN: f32 = 0.05;

/// Geometry of a renderable object, as seen by the physics layer
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// Box with full side lengths (unspecified sides default to 1)
    Box {
        width: Option<f32>,
        height: Option<f32>,
        depth: Option<f32>,
    },
    /// Sphere or icosahedron (unspecified radius defaults to 1)
    Sphere { radius: Option<f32> },
    /// Indexed triangle list
    IndexedMesh {
        /// Flat xyz vertex positions
        positions: Vec<f32>,
        /// Three indices per triangle
        indices: Vec<u32>,
    },
    /// Anything the physics layer cannot turn into a shape
    Unsupported,
}

impl Geometry {
    /// Box geometry with the given full side lengths
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Geometry::Box {
            width: Some(width),
            height: Some(height),
            depth: Some(depth),
        }
    }

    /// Sphere geometry with the given radius
    pub fn sphere(radius: f32) -> Self {
        Geometry::Sphere { radius: Some(radius) }
    }

    /// Indexed triangle mesh geometry
    pub fn indexed_mesh(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        Geometry::IndexedMesh { positions, indices }
    }
}

/// Which primitive a [`CollisionShape`] is, with its world-space dimensions
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeKind {
    /// Box with world-space half extents
    Box { half_extents: Vector3<f32> },
    /// Sphere with world-space radius
    Sphere { radius: f32 },
    /// Y-aligned capsule
    Capsule { radius: f32, half_height: f32 },
    /// Static triangle soup behind a BVH
    TriangleMesh { triangles: usize },
}

/// An immutable collision shape ready to be attached to bodies
///
/// The underlying rapier shape is reference counted, so one shape can back
/// every body of an instanced object.
#[derive(Clone)]
pub struct CollisionShape {
    kind: ShapeKind,
    shape: SharedShape,
    margin: Option<f32>,
}

impl CollisionShape {
    /// Box from world-space half extents
    pub fn cuboid(half_extents: Vector3<f32>, margin: f32) -> Self {
        Self {
            kind: ShapeKind::Box { half_extents },
            shape: SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
            margin: Some(margin),
        }
    }

    /// Sphere from a world-space radius
    pub fn ball(radius: f32, margin: f32) -> Self {
        Self {
            kind: ShapeKind::Sphere { radius },
            shape: SharedShape::ball(radius),
            margin: Some(margin),
        }
    }

    /// Y-aligned capsule
    pub fn capsule(radius: f32, half_height: f32, margin: f32) -> Self {
        Self {
            kind: ShapeKind::Capsule { radius, half_height },
            shape: SharedShape::capsule_y(half_height, radius),
            margin: Some(margin),
        }
    }

    /// Static triangle soup (one entry per triangle, vertices already in world scale)
    ///
    /// Returns `None` for an empty soup or if the mesh cannot be built.
    pub fn triangle_soup(vertices: Vec<Point3<f32>>) -> Option<Self> {
        let triangles = vertices.len() / 3;
        if triangles == 0 {
            return None;
        }
        let indices: Vec<[u32; 3]> = (0..triangles as u32)
            .map(|t| [t * 3, t * 3 + 1, t * 3 + 2])
            .collect();

        match SharedShape::trimesh(vertices, indices) {
            Ok(shape) => Some(Self {
                kind: ShapeKind::TriangleMesh { triangles },
                shape,
                margin: None,
            }),
            Err(err) => {
                log::warn!("Failed to build triangle mesh shape: {:?}", err);
                None
            }
        }
    }

    /// The primitive and its dimensions
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// The shared rapier shape
    pub fn shared(&self) -> &SharedShape {
        &self.shape
    }

    /// Collision envelope padding (unset for triangle meshes)
    pub fn margin(&self) -> Option<f32> {
        self.margin
    }

    /// Triangle meshes may only back static bodies
    pub fn is_static_only(&self) -> bool {
        matches!(self.kind, ShapeKind::TriangleMesh { .. })
    }

    /// Principal inertia for a body of the given mass (zero when `mass <= 0`)
    pub fn local_inertia(&self, mass: f32) -> Vector3<f32> {
        if mass <= 0.0 {
            return Vector3::zeros();
        }
        let unit = self.shape.mass_properties(1.0);
        let unit_mass = unit.mass();
        if unit_mass > 0.0 && unit_mass.is_finite() {
            unit.principal_inertia() * (mass / unit_mass)
        } else {
            Vector3::zeros()
        }
    }

    /// Collider builder carrying this shape and its margin
    ///
    /// The collider itself is massless; body mass and inertia are supplied on
    /// the rigid body.
    pub fn collider(&self) -> ColliderBuilder {
        let builder = ColliderBuilder::new(self.shape.clone()).density(0.0);
        match self.margin {
            Some(margin) => builder.contact_skin(margin),
            None => builder,
        }
    }
}

impl fmt::Debug for CollisionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionShape")
            .field("kind", &self.kind)
            .field("margin", &self.margin)
            .finish()
    }
}

/// Build a collision shape for geometry under the given world scale
///
/// Boxes use half of each side times the matching scale axis. Spheres use the
/// radius times the *largest* scale axis. Indexed meshes become a static
/// triangle soup with every vertex scaled per axis. Returns `None` for
/// unsupported geometry.
pub fn build_shape(geometry: &Geometry, world_scale: &Vector3<f32>, margin: f32) -> Option<CollisionShape> {
    match geometry {
        Geometry::Box { width, height, depth } => {
            let half = |side: &Option<f32>| side.map(|s| s / 2.0).unwrap_or(0.5);
            let half_extents = Vector3::new(
                half(width) * world_scale.x,
                half(height) * world_scale.y,
                half(depth) * world_scale.z,
            );
            Some(CollisionShape::cuboid(half_extents, margin))
        }
        Geometry::Sphere { radius } => {
            let radius = radius.unwrap_or(1.0) * world_scale.max();
            Some(CollisionShape::ball(radius, margin))
        }
        Geometry::IndexedMesh { positions, indices } => {
            let vertex = |index: u32| -> Option<Point3<f32>> {
                let base = index as usize * 3;
                let p = positions.get(base..base + 3)?;
                Some(Point3::new(
                    p[0] * world_scale.x,
                    p[1] * world_scale.y,
                    p[2] * world_scale.z,
                ))
            };

            let mut soup = Vec::with_capacity(indices.len());
            for triangle in indices.chunks_exact(3) {
                for &index in triangle {
                    match vertex(index) {
                        Some(p) => soup.push(p),
                        None => {
                            log::warn!("Mesh index {} out of range ({} vertices)", index, positions.len() / 3);
                            return None;
                        }
                    }
                }
            }
            CollisionShape::triangle_soup(soup)
        }
        Geometry::Unsupported => None,
    }
}
