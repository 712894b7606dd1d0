//! 2D collision detection: a dynamic bounding volume hierarchy for the broadphase,
//! and a separating axis test for the narrowphase.
//!
//! Bodies are circles, convex polygons and points. Polygons are expected to be convex
//! and wound counter-clockwise (in a y-up frame); anything else produces undefined
//! overlap and containment data.
//!
//! ```
//! use sat_bvh::{CollisionSystem, CollisionResult};
//!
//! let mut system = CollisionSystem::new();
//! let a = system.create_circle(0.0, 0.0, 5.0, 1.0, 0.0);
//! let b = system.create_circle(7.0, 0.0, 5.0, 1.0, 0.0);
//!
//! system.update();
//! let mut result = CollisionResult::new();
//! for other in system.potentials(a).unwrap() {
//!     assert!(system.collides(a, other, Some(&mut result), true).unwrap());
//!     assert_eq!(other, b);
//! }
//! ```

pub mod aabb;
pub mod body;
pub mod broad;
pub mod error;
pub mod narrow;
pub mod system;

#[cfg(not(feature = "f64"))]
pub type Fp = f32;
#[cfg(not(feature = "f64"))]
pub use glam::Vec2;

#[cfg(feature = "f64")]
pub type Fp = f64;
#[cfg(feature = "f64")]
pub use glam::DVec2 as Vec2;

pub use aabb::Aabb;
pub use body::{Body, Circle, Polygon, Shape};
pub use broad::{BodyHandle, BodyKey, Branch, BranchId, Bvh, IndexId, Node};
pub use error::CollisionError;
pub use narrow::{collides, CollisionResult};
pub use system::CollisionSystem;
