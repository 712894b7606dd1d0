use super::Contact;
use crate::{broad::BodyHandle, Fp, Vec2};

/// Details of a collision test.
///
/// Meant to be recycled: every test overwrites every field. The overlap data is only
/// meaningful when `collision` is set; the direction points from `a` toward `b`, so
/// `a` is separated by moving it by `-overlap * (overlap_x, overlap_y)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionResult {
    pub collision: bool,
    /// The source body, when tested through a collision system.
    pub a: Option<BodyHandle>,
    /// The target body, when tested through a collision system.
    pub b: Option<BodyHandle>,
    /// Whether `a` is entirely contained by `b`.
    pub a_in_b: bool,
    /// Whether `b` is entirely contained by `a`.
    pub b_in_a: bool,
    /// Magnitude of the shortest axis of overlap.
    pub overlap: Fp,
    pub overlap_x: Fp,
    pub overlap_y: Fp,
}
impl CollisionResult {
    pub fn new() -> CollisionResult {
        CollisionResult::default()
    }

    /// Unit direction of the shortest axis of overlap.
    #[inline]
    pub fn direction(&self) -> Vec2 {
        Vec2::new(self.overlap_x, self.overlap_y)
    }
    /// The minimum translation vector, `overlap * direction`.
    #[inline]
    pub fn overlap_vector(&self) -> Vec2 {
        self.direction() * self.overlap
    }

    pub(crate) fn record(&mut self, collision: bool, contact: &Contact) {
        self.collision = collision;
        self.a = None;
        self.b = None;
        if collision {
            self.a_in_b = contact.a_in_b;
            self.b_in_a = contact.b_in_a;
            self.overlap = contact.overlap.unwrap_or(0.0);
            self.overlap_x = contact.dir.x;
            self.overlap_y = contact.dir.y;
        } else {
            self.a_in_b = false;
            self.b_in_a = false;
            self.overlap = 0.0;
            self.overlap_x = 0.0;
            self.overlap_y = 0.0;
        }
    }
}
