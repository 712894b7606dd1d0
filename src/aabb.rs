use crate::{Fp, Vec2};

/// An axis-aligned bounding box. All comparisons are inclusive: touching boxes overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}
impl Aabb {
    #[inline]
    pub fn new(minx: Fp, miny: Fp, maxx: Fp, maxy: Fp) -> Aabb {
        debug_assert!(minx <= maxx);
        debug_assert!(miny <= maxy);

        Aabb {
            min: Vec2::new(minx, miny),
            max: Vec2::new(maxx, maxy),
        }
    }
    #[inline]
    pub fn around(center: Vec2, radius: Fp) -> Aabb {
        //! The bounding box of a circle.
        let splat = Vec2::splat(radius);
        Aabb {
            min: center - splat,
            max: center + splat,
        }
    }

    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
    #[inline]
    pub fn area(&self) -> Fp {
        let size = self.max - self.min;
        size.x * size.y
    }
    #[inline]
    pub fn expand(&self, padding: Fp) -> Aabb {
        //! Grows the box by `padding` on every side.
        let splat = Vec2::splat(padding);
        Aabb {
            min: self.min - splat,
            max: self.max + splat,
        }
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        //! Returns whether `other` lies entirely within `self`.
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }
}

impl approx::AbsDiffEq for Aabb {
    type Epsilon = Fp;

    fn default_epsilon() -> Fp {
        Fp::EPSILON
    }
    fn abs_diff_eq(&self, other: &Aabb, epsilon: Fp) -> bool {
        self.min.abs_diff_eq(other.min, epsilon) && self.max.abs_diff_eq(other.max, epsilon)
    }
}
