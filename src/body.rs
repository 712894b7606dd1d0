//! Collision bodies and their memoized world-space geometry.

use crate::{aabb::Aabb, broad::IndexId, error::CollisionError, Fp, Vec2};

/// Position, rotation and scale a polygon's cache was last computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    pos: Vec2,
    angle: Fp,
    scale_x: Fp,
    scale_y: Fp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub radius: Fp,
    pub scale: Fp,
}
impl Circle {
    #[inline]
    pub fn new(radius: Fp, scale: Fp) -> Circle {
        Circle { radius, scale }
    }

    #[inline]
    pub fn scaled_radius(&self) -> Fp {
        self.radius * self.scale
    }
}

/// A convex polygon, wound counter-clockwise, in local space.
///
/// World-space vertices, edges, normals and bounds are cached and only recomputed once the
/// owning body's position or the polygon's `angle`/`scale_x`/`scale_y` differ from the
/// values the cache was built from. A single vertex makes a point; two make a segment.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub angle: Fp,
    pub scale_x: Fp,
    pub scale_y: Fp,

    points: Vec<Vec2>,
    coords: Vec<Vec2>,
    edges: Vec<Vec2>,
    normals: Vec<Vec2>,
    aabb: Aabb,

    /// `None` until the coordinates are computed for the current vertex list.
    shadow: Option<Transform>,
    dirty_normals: bool,
    point: bool,
}
impl Polygon {
    pub fn new(points: Vec<Vec2>, angle: Fp, scale_x: Fp, scale_y: Fp) -> Polygon {
        assert!(!points.is_empty(), "a polygon requires at least one vertex");

        let len = points.len();
        Polygon {
            angle,
            scale_x,
            scale_y,
            points,
            coords: vec![Vec2::ZERO; len],
            edges: Vec::with_capacity(len),
            normals: Vec::with_capacity(len),
            aabb: Aabb::default(),
            shadow: None,
            dirty_normals: true,
            point: false,
        }
    }
    fn point() -> Polygon {
        Polygon {
            point: true,
            ..Polygon::new(vec![Vec2::ZERO], 0.0, 1.0, 1.0)
        }
    }

    pub fn set_points(&mut self, points: Vec<Vec2>) -> Result<(), CollisionError> {
        //! Replaces the local vertex list. Points keep their single vertex.
        if self.point {
            return Err(CollisionError::PointVertices);
        }
        assert!(!points.is_empty(), "a polygon requires at least one vertex");

        self.coords.clear();
        self.coords.resize(points.len(), Vec2::ZERO);
        self.points = points;
        self.shadow = None;
        self.dirty_normals = true;
        Ok(())
    }

    #[inline]
    pub fn is_point(&self) -> bool {
        self.point
    }
    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }
    /// World-space vertices as of the last refresh.
    #[inline]
    pub fn coords(&self) -> &[Vec2] {
        &self.coords
    }
    /// Edge vectors as of the last refresh, `edges[i] = coords[i + 1] - coords[i]` wrapping.
    /// Empty for points.
    #[inline]
    pub fn edges(&self) -> &[Vec2] {
        &self.edges
    }
    /// Outward unit normals as of the last refresh, one per edge.
    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }
    /// World-space bounds as of the last refresh.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    #[inline]
    fn transform(&self, pos: Vec2) -> Transform {
        Transform {
            pos,
            angle: self.angle,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }
    #[inline]
    pub fn is_stale(&self, pos: Vec2) -> bool {
        self.shadow != Some(self.transform(pos))
    }

    pub(crate) fn refresh_coords(&mut self, pos: Vec2) {
        if self.is_stale(pos) {
            self.recompute_coords(pos);
        }
    }
    pub(crate) fn refresh(&mut self, pos: Vec2) {
        self.refresh_coords(pos);
        if self.dirty_normals {
            self.recompute_normals();
        }
    }

    fn recompute_coords(&mut self, pos: Vec2) {
        // scale, then rotate, then translate
        let scale = Vec2::new(self.scale_x, self.scale_y);
        let rotation = if self.angle != 0.0 {
            Some(Vec2::new(self.angle.cos(), self.angle.sin()))
        } else {
            None
        };

        let mut min = Vec2::splat(Fp::MAX);
        let mut max = Vec2::splat(Fp::MIN);
        for (coord, point) in self.coords.iter_mut().zip(self.points.iter()) {
            let mut c = *point * scale;
            if let Some(rot) = rotation {
                c = rot.rotate(c);
            }
            c += pos;

            min = min.min(c);
            max = max.max(c);
            *coord = c;
        }

        self.aabb = Aabb { min, max };
        self.shadow = Some(self.transform(pos));
        self.dirty_normals = true;
    }

    fn recompute_normals(&mut self) {
        self.edges.clear();
        self.normals.clear();

        let len = self.coords.len();
        // a point has no edges, a segment yields its edge in both directions
        if len > 1 {
            for i in 0..len {
                let edge = self.coords[(i + 1) % len] - self.coords[i];
                let length = edge.length();
                self.edges.push(edge);
                self.normals.push(if length > 0.0 {
                    Vec2::new(edge.y / length, -edge.x / length)
                } else {
                    Vec2::ZERO
                });
            }
        }
        self.dirty_normals = false;
    }
}

#[derive(Debug, Clone)]
pub enum Shape {
    Circle(Circle),
    Polygon(Polygon),
}

/// A collision body: a shape placed in the world, padded for the broadphase.
///
/// Points are polygons with a single vertex at the origin.
#[derive(Debug, Clone)]
pub struct Body {
    pub pos: Vec2,
    /// Slack added to every side of the bounds stored in the index, absorbing small movements.
    pub padding: Fp,
    pub shape: Shape,

    /// The index holding the body, if any.
    pub(crate) owner: Option<IndexId>,
}
impl Body {
    pub fn new(pos: Vec2, shape: Shape, padding: Fp) -> Body {
        let mut body = Body { pos, padding, shape, owner: None };
        body.refresh();
        body
    }
    #[inline]
    pub fn circle(x: Fp, y: Fp, radius: Fp, scale: Fp, padding: Fp) -> Body {
        Body::new(Vec2::new(x, y), Shape::Circle(Circle::new(radius, scale)), padding)
    }
    pub fn polygon(x: Fp, y: Fp, points: Vec<Vec2>, angle: Fp, scale_x: Fp, scale_y: Fp, padding: Fp) -> Body {
        Body::new(Vec2::new(x, y), Shape::Polygon(Polygon::new(points, angle, scale_x, scale_y)), padding)
    }
    #[inline]
    pub fn point(x: Fp, y: Fp, padding: Fp) -> Body {
        Body::new(Vec2::new(x, y), Shape::Polygon(Polygon::point()), padding)
    }

    #[inline]
    pub fn is_circle(&self) -> bool {
        matches!(self.shape, Shape::Circle(_))
    }
    #[inline]
    pub fn is_polygon(&self) -> bool {
        matches!(self.shape, Shape::Polygon(_))
    }
    #[inline]
    pub fn is_point(&self) -> bool {
        matches!(&self.shape, Shape::Polygon(p) if p.is_point())
    }
    pub fn as_circle(&self) -> Option<&Circle> {
        match &self.shape {
            Shape::Circle(c) => Some(c),
            Shape::Polygon(_) => None,
        }
    }
    pub fn as_circle_mut(&mut self) -> Option<&mut Circle> {
        match &mut self.shape {
            Shape::Circle(c) => Some(c),
            Shape::Polygon(_) => None,
        }
    }
    pub fn as_polygon(&self) -> Option<&Polygon> {
        match &self.shape {
            Shape::Polygon(p) => Some(p),
            Shape::Circle(_) => None,
        }
    }
    pub fn as_polygon_mut(&mut self) -> Option<&mut Polygon> {
        match &mut self.shape {
            Shape::Polygon(p) => Some(p),
            Shape::Circle(_) => None,
        }
    }

    /// World-space vertices as of the last refresh. Empty for circles.
    pub fn coords(&self) -> &[Vec2] {
        match &self.shape {
            Shape::Polygon(p) => p.coords(),
            Shape::Circle(_) => &[],
        }
    }
    pub fn edges(&self) -> &[Vec2] {
        match &self.shape {
            Shape::Polygon(p) => p.edges(),
            Shape::Circle(_) => &[],
        }
    }
    pub fn normals(&self) -> &[Vec2] {
        match &self.shape {
            Shape::Polygon(p) => p.normals(),
            Shape::Circle(_) => &[],
        }
    }

    /// The true bounds of the shape. For polygons this is as of the last refresh.
    pub fn aabb(&self) -> Aabb {
        match &self.shape {
            Shape::Circle(c) => Aabb::around(self.pos, c.scaled_radius()),
            Shape::Polygon(p) => p.aabb(),
        }
    }
    #[inline]
    pub fn owner(&self) -> Option<IndexId> {
        self.owner
    }

    /// Recomputes cached geometry if the transform changed since the last computation.
    pub fn refresh(&mut self) {
        if let Shape::Polygon(p) = &mut self.shape {
            p.refresh(self.pos);
        }
    }
    pub(crate) fn refresh_coords(&mut self) {
        if let Shape::Polygon(p) = &mut self.shape {
            p.refresh_coords(self.pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square() -> Vec<Vec2> {
        vec![Vec2::new(-1.0, -1.0), Vec2::new(1.0, -1.0), Vec2::new(1.0, 1.0), Vec2::new(-1.0, 1.0)]
    }

    #[test]
    fn coords_follow_transform() {
        let mut body = Body::polygon(10.0, 0.0, square(), 0.0, 2.0, 1.0, 0.0);
        let p = body.as_polygon().unwrap();

        assert_abs_diff_eq!(p.coords()[2], Vec2::new(12.0, 1.0));
        assert_abs_diff_eq!(p.aabb(), Aabb::new(8.0, -1.0, 12.0, 1.0));

        body.pos = Vec2::new(0.0, 0.0);
        body.as_polygon_mut().unwrap().angle = std::f64::consts::FRAC_PI_2 as Fp;
        assert!(body.as_polygon().unwrap().is_stale(body.pos));

        body.refresh();
        let p = body.as_polygon().unwrap();
        assert!(!p.is_stale(body.pos));
        // (2, 1) rotated a quarter turn
        assert_abs_diff_eq!(p.coords()[2], Vec2::new(-1.0, 2.0), epsilon = 1e-5);
        assert_abs_diff_eq!(p.aabb(), Aabb::new(-1.0, -2.0, 1.0, 2.0), epsilon = 1e-5);
    }

    #[test]
    fn normals_point_outward() {
        let body = Body::polygon(0.0, 0.0, square(), 0.0, 1.0, 1.0, 0.0);
        let p = body.as_polygon().unwrap();

        assert_eq!(p.normals().len(), 4);
        assert_abs_diff_eq!(p.normals()[0], Vec2::new(0.0, -1.0));
        assert_abs_diff_eq!(p.normals()[1], Vec2::new(1.0, 0.0));
        assert_abs_diff_eq!(p.normals()[2], Vec2::new(0.0, 1.0));
        assert_abs_diff_eq!(p.normals()[3], Vec2::new(-1.0, 0.0));
        assert_abs_diff_eq!(p.edges()[1], Vec2::new(0.0, 2.0));
    }

    #[test]
    fn cache_is_memoized() {
        let mut body = Body::polygon(0.0, 0.0, square(), 0.0, 1.0, 1.0, 0.0);
        let before = body.as_polygon().unwrap().coords().to_vec();

        body.refresh();
        assert_eq!(body.as_polygon().unwrap().coords(), &before[..]);

        body.pos.x += 1.0;
        // not refreshed yet: stale cache is still visible
        assert_eq!(body.as_polygon().unwrap().coords(), &before[..]);
        body.refresh();
        assert_abs_diff_eq!(body.as_polygon().unwrap().coords()[0], Vec2::new(0.0, -1.0));
    }

    #[test]
    fn degenerate_shapes() {
        let point = Body::point(3.0, 4.0, 0.0);
        let p = point.as_polygon().unwrap();
        assert!(point.is_point());
        assert!(p.normals().is_empty());
        assert_eq!(point.aabb(), Aabb::new(3.0, 4.0, 3.0, 4.0));

        let segment = Body::polygon(0.0, 0.0, vec![Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0)], 0.0, 1.0, 1.0, 0.0);
        let s = segment.as_polygon().unwrap();
        assert_eq!(s.normals().len(), 2);
        assert_abs_diff_eq!(s.normals()[0], -s.normals()[1]);
    }

    #[test]
    fn set_points() {
        let mut body = Body::polygon(1.0, 1.0, square(), 0.0, 1.0, 1.0, 0.0);
        body.as_polygon_mut().unwrap().set_points(vec![Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0), Vec2::new(0.0, 4.0)]).unwrap();
        assert!(body.as_polygon().unwrap().is_stale(body.pos));

        body.refresh();
        assert_eq!(body.aabb(), Aabb::new(1.0, 1.0, 5.0, 5.0));

        let mut point = Body::point(0.0, 0.0, 0.0);
        assert_eq!(point.as_polygon_mut().unwrap().set_points(square()), Err(CollisionError::PointVertices));
    }

    #[test]
    fn circle_bounds() {
        let body = Body::circle(1.0, 2.0, 2.0, 1.5, 4.0);
        assert_eq!(body.aabb(), Aabb::new(-2.0, -1.0, 4.0, 5.0));
        assert!(body.is_circle());
        assert!(body.coords().is_empty() && body.normals().is_empty());
        assert!(body.owner().is_none());
    }

    #[test]
    #[should_panic]
    fn empty_polygon() {
        let _ = Body::polygon(0.0, 0.0, vec![], 0.0, 1.0, 1.0, 0.0);
    }
}
