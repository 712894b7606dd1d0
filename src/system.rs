//! The collision system: one broadphase index plus narrowphase tests between the bodies it holds.

use crate::{
    aabb::Aabb,
    body::Body,
    broad::{BodyHandle, Bvh},
    error::CollisionError,
    narrow::{self, CollisionResult},
    Fp, Vec2,
};

/// Owns a set of bodies, indexes them, and tests them against each other.
///
/// Mutate bodies through [`CollisionSystem::body_mut`], then call [`CollisionSystem::update`]
/// once per step before querying potentials.
#[derive(Debug, Default)]
pub struct CollisionSystem {
    bvh: Bvh,
}

impl CollisionSystem {
    pub fn new() -> CollisionSystem {
        CollisionSystem { bvh: Bvh::new() }
    }
    pub fn with_capacity(bodies: usize) -> CollisionSystem {
        CollisionSystem { bvh: Bvh::with_capacity(bodies) }
    }

    // ---------- Bodies ---------- //

    pub fn create_circle(&mut self, x: Fp, y: Fp, radius: Fp, scale: Fp, padding: Fp) -> BodyHandle {
        self.bvh.adopt(Body::circle(x, y, radius, scale, padding))
    }
    pub fn create_polygon(&mut self, x: Fp, y: Fp, points: Vec<Vec2>, angle: Fp, scale_x: Fp, scale_y: Fp, padding: Fp) -> BodyHandle {
        //! # Panics
        //! When `points` is empty.
        self.bvh.adopt(Body::polygon(x, y, points, angle, scale_x, scale_y, padding))
    }
    pub fn create_point(&mut self, x: Fp, y: Fp, padding: Fp) -> BodyHandle {
        self.bvh.adopt(Body::point(x, y, padding))
    }

    #[inline]
    pub fn insert(&mut self, body: Body) -> Result<BodyHandle, CollisionError> {
        self.bvh.insert(body)
    }
    pub fn insert_all<I>(&mut self, bodies: I) -> Result<Vec<BodyHandle>, CollisionError>
    where
        I: IntoIterator<Item = Body>,
    {
        //! Stops at the first body owned by another system; those before it stay inserted.
        bodies.into_iter().map(|body| self.bvh.insert(body)).collect()
    }

    #[inline]
    pub fn remove(&mut self, handle: BodyHandle) -> Result<Body, CollisionError> {
        self.bvh.remove(handle)
    }
    pub fn remove_all<I>(&mut self, handles: I) -> Result<Vec<Body>, CollisionError>
    where
        I: IntoIterator<Item = BodyHandle>,
    {
        //! Stops at the first handle this system cannot resolve; those before it stay removed.
        handles.into_iter().map(|handle| self.bvh.remove(handle)).collect()
    }

    #[inline]
    pub fn body(&self, handle: BodyHandle) -> Result<&Body, CollisionError> {
        self.bvh.get(handle)
    }
    #[inline]
    pub fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, CollisionError> {
        self.bvh.get_mut(handle)
    }
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        self.bvh.bodies()
    }
    /// The padded bounds the index holds for the body, as of the last update.
    #[inline]
    pub fn padded_aabb(&self, handle: BodyHandle) -> Result<Aabb, CollisionError> {
        self.bvh.padded_aabb(handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bvh.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bvh.is_empty()
    }
    #[inline]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bvh.contains(handle)
    }
    /// The broadphase index, for inspection and drawing.
    #[inline]
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    // ---------- Queries ---------- //

    #[inline]
    pub fn update(&mut self) {
        self.bvh.update()
    }

    #[inline]
    pub fn potentials(&self, handle: BodyHandle) -> Result<Vec<BodyHandle>, CollisionError> {
        self.bvh.potentials(handle)
    }
    #[inline]
    pub fn potentials_into(&self, handle: BodyHandle, results: &mut Vec<BodyHandle>) -> Result<(), CollisionError> {
        self.bvh.potentials_into(handle, results)
    }
    #[inline]
    pub fn potentials_filtered<F>(&self, handle: BodyHandle, filter: F) -> Result<Vec<BodyHandle>, CollisionError>
    where
        F: FnMut(&Body) -> bool,
    {
        self.bvh.potentials_filtered(handle, filter)
    }

    pub fn collides(&mut self, a: BodyHandle, b: BodyHandle, result: Option<&mut CollisionResult>, aabb: bool) -> Result<bool, CollisionError> {
        //! Tests `a` against `b`, filling `result` with `a` and `b` as its bodies.
        let (body_a, body_b) = self.bvh.refreshed_pair(a, b)?;
        Ok(match result {
            Some(result) => {
                let collision = narrow::test(body_a, body_b, Some(&mut *result), aabb);
                result.a = Some(a);
                result.b = Some(b);
                collision
            }
            None => narrow::test(body_a, body_b, None, aabb),
        })
    }
}
