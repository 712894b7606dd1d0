//! Narrowphase data and logic module: separating axis tests between bodies.

mod result;

pub use result::CollisionResult;

use crate::{body::{Body, Polygon, Shape}, Fp, Vec2};

/// Running minimum overlap and containment of a single test.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Contact {
    a_in_b: bool,
    b_in_a: bool,
    overlap: Option<Fp>,
    dir: Vec2,
}
impl Contact {
    #[inline]
    fn new() -> Contact {
        Contact { a_in_b: true, b_in_a: true, overlap: None, dir: Vec2::ZERO }
    }
    #[inline]
    fn offer(&mut self, overlap: Fp, dir: Vec2) {
        //! Keeps the first smallest overlap seen.
        if self.overlap.map_or(true, |current| current > overlap) {
            self.overlap = Some(overlap);
            self.dir = dir;
        }
    }
    #[inline]
    fn mirror(self) -> Contact {
        Contact {
            a_in_b: self.b_in_a,
            b_in_a: self.a_in_b,
            overlap: self.overlap,
            dir: -self.dir,
        }
    }
}

/// Where a point lies relative to an edge, by projection onto the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Before,
    Face,
    After,
}
impl Region {
    #[inline]
    fn of(offset: Vec2, edge: Vec2) -> Region {
        //! `offset` is taken from the edge's start vertex.
        let dot = offset.dot(edge);
        if dot < 0.0 {
            Region::Before
        } else if dot > edge.length_squared() {
            Region::After
        } else {
            Region::Face
        }
    }
    #[inline]
    fn opposite(self) -> Region {
        match self {
            Region::Before => Region::After,
            Region::Face => Region::Face,
            Region::After => Region::Before,
        }
    }
}

#[inline]
fn direction(v: Vec2, length: Fp) -> Vec2 {
    //! `v` normalized, or the x axis when `v` has no length.
    if length > 0.0 {
        v / length
    } else {
        Vec2::X
    }
}

// ---------- Entry Points ---------- //

pub fn collides(a: &mut Body, b: &mut Body, result: Option<&mut CollisionResult>, aabb: bool) -> bool {
    //! Returns whether `a` and `b` collide, recomputing stale cached geometry first.
    //! Pass `aabb = false` to skip the bounding box rejection, for example after a broadphase query.
    a.refresh();
    b.refresh();
    test(a, b, result, aabb)
}

pub(crate) fn test(a: &Body, b: &Body, result: Option<&mut CollisionResult>, aabb: bool) -> bool {
    debug_assert!(!matches!(&a.shape, Shape::Polygon(p) if p.is_stale(a.pos)));
    debug_assert!(!matches!(&b.shape, Shape::Polygon(p) if p.is_stale(b.pos)));

    let mut contact = Contact::new();
    let collision = (!aabb || a.aabb().overlaps(&b.aabb()))
        && match (&a.shape, &b.shape) {
            (Shape::Polygon(pa), Shape::Polygon(pb)) => poly_poly(pa, pb, &mut contact),
            (Shape::Polygon(pa), Shape::Circle(cb)) => poly_circle(pa, b.pos, cb.scaled_radius(), &mut contact),
            (Shape::Circle(ca), Shape::Polygon(pb)) => {
                let hit = poly_circle(pb, a.pos, ca.scaled_radius(), &mut contact);
                contact = contact.mirror();
                hit
            }
            (Shape::Circle(ca), Shape::Circle(cb)) => {
                circle_circle(a.pos, ca.scaled_radius(), b.pos, cb.scaled_radius(), &mut contact)
            }
        };

    if let Some(result) = result {
        result.record(collision, &contact);
    }
    collision
}

// ---------- Shape-Shape Tests ---------- //

fn circle_circle(a: Vec2, a_radius: Fp, b: Vec2, b_radius: Fp, contact: &mut Contact) -> bool {
    let difference = b - a;
    let radius_sum = a_radius + b_radius;
    let length_squared = difference.length_squared();
    if length_squared > radius_sum * radius_sum {
        return false;
    }

    let length = length_squared.sqrt();
    contact.a_in_b = a_radius <= b_radius && length <= b_radius - a_radius;
    contact.b_in_a = b_radius <= a_radius && length <= a_radius - b_radius;
    contact.offer(radius_sum - length, direction(difference, length));
    true
}

fn axes(poly: &Polygon) -> impl Iterator<Item = Vec2> + '_ {
    //! Candidate separating axes: the edge normals, and for a segment, which has no area,
    //! one normal and its direction.
    let (normals, along) = match (poly.normals(), poly.edges()) {
        ([normal, _], [edge, _]) => (std::slice::from_ref(normal), Some(edge.normalize_or_zero())),
        (normals, _) => (normals, None),
    };
    normals.iter().copied().chain(along)
}

fn poly_poly(a: &Polygon, b: &Polygon, contact: &mut Contact) -> bool {
    let (a_coords, b_coords) = (a.coords(), b.coords());

    // points only ever touch by coinciding
    if a_coords.len() == 1 && b_coords.len() == 1 {
        contact.overlap = Some(0.0);
        return a_coords[0] == b_coords[0];
    }

    for axis in axes(a).chain(axes(b)) {
        if separating_axis(a_coords, b_coords, axis, contact) {
            return false;
        }
    }
    true
}

#[inline]
fn project(coords: &[Vec2], axis: Vec2) -> (Fp, Fp) {
    coords.iter().fold((Fp::MAX, Fp::MIN), |(start, end), c| {
        let dot = c.dot(axis);
        (start.min(dot), end.max(dot))
    })
}

fn separating_axis(a: &[Vec2], b: &[Vec2], axis: Vec2, contact: &mut Contact) -> bool {
    //! Returns whether `axis` separates the projections, otherwise records the overlap along it.
    let (a_start, a_end) = project(a, axis);
    let (b_start, b_end) = project(b, axis);
    if a_start > b_end || a_end < b_start {
        return true;
    }

    let overlap = if a_start < b_start {
        contact.a_in_b = false;
        if a_end < b_end {
            contact.b_in_a = false;
            a_end - b_start
        } else {
            nested_overlap(a_start, a_end, b_start, b_end)
        }
    } else {
        contact.b_in_a = false;
        if a_end > b_end {
            contact.a_in_b = false;
            a_start - b_end
        } else {
            nested_overlap(a_start, a_end, b_start, b_end)
        }
    };

    let sign = if overlap < 0.0 { -1.0 } else { 1.0 };
    contact.offer(overlap.abs(), axis * sign);
    false
}

#[inline]
fn nested_overlap(a_start: Fp, a_end: Fp, b_start: Fp, b_end: Fp) -> Fp {
    //! One interval holds the other: the shorter way out, signed by its direction.
    let forward = a_end - b_start;
    let backward = b_end - a_start;
    if forward < backward {
        forward
    } else {
        -backward
    }
}

fn poly_circle(poly: &Polygon, center: Vec2, radius: Fp, contact: &mut Contact) -> bool {
    //! Tests each edge against the circle, by the edge face or the vertex nearest the center.
    let coords = poly.coords();
    let radius_squared = radius * radius;

    if coords.len() == 1 {
        let offset = center - coords[0];
        let length_squared = offset.length_squared();
        if length_squared > radius_squared {
            return false;
        }

        let length = length_squared.sqrt();
        contact.b_in_a = false;
        contact.offer(radius - length, direction(offset, length));
        return true;
    }

    let (edges, normals) = (poly.edges(), poly.normals());
    let len = coords.len();
    for i in 0..len {
        let offset = center - coords[i];
        let region = Region::of(offset, edges[i]);

        if contact.a_in_b && offset.length_squared() > radius_squared {
            contact.a_in_b = false;
        }

        match region {
            Region::Face => {
                let distance = offset.dot(normals[i]);
                if distance > 0.0 && distance > radius {
                    return false;
                }

                let overlap = radius - distance;
                if distance >= 0.0 || overlap < radius * 2.0 {
                    contact.b_in_a = false;
                }
                contact.offer(overlap, normals[i]);
            }
            Region::Before | Region::After => {
                // only the vertex both adjacent edges agree on is the nearest feature
                let other = if region == Region::Before { (i + len - 1) % len } else { (i + 1) % len };
                let other_offset = center - coords[other];
                if Region::of(other_offset, edges[other]) != region.opposite() {
                    continue;
                }

                let target = if region == Region::Before { offset } else { other_offset };
                let length_squared = target.length_squared();
                if length_squared > radius_squared {
                    return false;
                }

                let length = length_squared.sqrt();
                contact.b_in_a = false;
                contact.offer(radius - length, direction(target, length));
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square(x: Fp, y: Fp, half: Fp) -> Body {
        Body::polygon(x, y, vec![Vec2::new(-half, -half), Vec2::new(half, -half), Vec2::new(half, half), Vec2::new(-half, half)], 0.0, 1.0, 1.0, 0.0)
    }
    fn segment(x1: Fp, y1: Fp, x2: Fp, y2: Fp) -> Body {
        Body::polygon(0.0, 0.0, vec![Vec2::new(x1, y1), Vec2::new(x2, y2)], 0.0, 1.0, 1.0, 0.0)
    }

    fn assert_mirrored(a: &mut Body, b: &mut Body) {
        let (mut r1, mut r2) = (CollisionResult::new(), CollisionResult::new());
        let hit = collides(a, b, Some(&mut r1), true);
        assert_eq!(hit, collides(b, a, Some(&mut r2), true));
        assert_abs_diff_eq!(r1.overlap, r2.overlap, epsilon = 1e-5);
        assert_abs_diff_eq!(r1.direction(), -r2.direction(), epsilon = 1e-5);
        assert_eq!(r1.a_in_b, r2.b_in_a);
        assert_eq!(r1.b_in_a, r2.a_in_b);
    }

    #[test]
    fn circle_circle_test() {
        let mut a = Body::circle(0.0, 0.0, 5.0, 1.0, 0.0);
        let mut b = Body::circle(7.0, 0.0, 5.0, 1.0, 0.0);
        let mut result = CollisionResult::new();

        assert!(collides(&mut a, &mut b, Some(&mut result), true));
        assert!(result.collision);
        assert_abs_diff_eq!(result.overlap, 3.0, epsilon = 1e-5);
        assert_abs_diff_eq!(result.direction(), Vec2::new(1.0, 0.0), epsilon = 1e-5);
        assert!(!result.a_in_b && !result.b_in_a);

        b.pos.x = 20.0;
        assert!(!collides(&mut a, &mut b, Some(&mut result), true));
        assert!(!result.collision);
        assert_eq!(result.overlap, 0.0);

        // scale applies to the radius
        b.as_circle_mut().unwrap().scale = 3.0;
        assert!(collides(&mut a, &mut b, None, true));
    }

    #[test]
    fn circle_containment() {
        let mut big = Body::circle(0.0, 0.0, 10.0, 1.0, 0.0);
        let mut small = Body::circle(2.0, 1.0, 1.0, 1.0, 0.0);
        let mut result = CollisionResult::new();

        assert!(collides(&mut small, &mut big, Some(&mut result), true));
        assert!(result.a_in_b);
        assert!(!result.b_in_a);
        assert_mirrored(&mut small, &mut big);
    }

    #[test]
    fn poly_circle_face() {
        let mut a = square(0.0, 0.0, 5.0);
        let mut b = Body::circle(8.0, 0.0, 4.0, 1.0, 0.0);
        let mut result = CollisionResult::new();

        assert!(collides(&mut a, &mut b, Some(&mut result), true));
        assert_abs_diff_eq!(result.overlap, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(result.direction(), Vec2::new(1.0, 0.0), epsilon = 1e-5);
        assert!(!result.a_in_b && !result.b_in_a);

        b.pos.x = 9.5;
        assert!(!collides(&mut a, &mut b, None, true));
        assert_mirrored(&mut square(0.0, 0.0, 5.0), &mut Body::circle(8.0, 1.0, 4.0, 1.0, 0.0));
    }

    #[test]
    fn poly_circle_vertex() {
        // bounding boxes overlap, but the circle misses the corner
        let mut a = square(0.0, 0.0, 5.0);
        let mut b = Body::circle(8.0, 8.0, 4.0, 1.0, 0.0);
        assert!(a.aabb().overlaps(&b.aabb()));
        assert!(!collides(&mut a, &mut b, None, true));

        let mut b = Body::circle(7.0, 7.0, 3.0, 1.0, 0.0);
        let mut result = CollisionResult::new();
        assert!(collides(&mut a, &mut b, Some(&mut result), true));
        assert_abs_diff_eq!(result.overlap, 3.0 - (8.0 as Fp).sqrt(), epsilon = 1e-5);
        let diagonal = Vec2::new(1.0, 1.0).normalize();
        assert_abs_diff_eq!(result.direction(), diagonal, epsilon = 1e-5);
        assert_mirrored(&mut a, &mut b);
    }

    #[test]
    fn poly_circle_containment() {
        let mut a = square(0.0, 0.0, 5.0);
        let mut inner = Body::circle(1.0, 0.0, 2.0, 1.0, 0.0);
        let mut result = CollisionResult::new();
        assert!(collides(&mut a, &mut inner, Some(&mut result), true));
        assert!(result.b_in_a);
        assert!(!result.a_in_b);
        assert_abs_diff_eq!(result.overlap, 6.0, epsilon = 1e-5);

        let mut outer = Body::circle(0.0, 0.0, 20.0, 1.0, 0.0);
        assert!(collides(&mut outer, &mut a, Some(&mut result), true));
        assert!(result.b_in_a);
        assert!(!result.a_in_b);
    }

    #[test]
    fn poly_poly_test() {
        let mut a = square(0.0, 0.0, 1.0);
        let mut b = square(1.5, 0.5, 1.0);
        let mut result = CollisionResult::new();

        assert!(collides(&mut a, &mut b, Some(&mut result), true));
        assert_abs_diff_eq!(result.overlap, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(result.direction(), Vec2::new(1.0, 0.0), epsilon = 1e-5);
        assert!(!result.a_in_b && !result.b_in_a);
        assert_mirrored(&mut a, &mut b);

        // moving a by the reported vector separates the two, up to touching
        a.pos -= result.overlap_vector();
        assert!(collides(&mut a, &mut b, Some(&mut result), true));
        assert_abs_diff_eq!(result.overlap, 0.0, epsilon = 1e-5);
        a.pos.x -= 0.01;
        assert!(!collides(&mut a, &mut b, None, true));
    }

    #[test]
    fn poly_poly_rotated() {
        // a diamond whose bounds overlap the square's, but whose edge does not
        let mut a = square(0.0, 0.0, 1.0);
        let mut b = square(2.3, 2.3, 1.0);
        b.as_polygon_mut().unwrap().angle = std::f64::consts::FRAC_PI_4 as Fp;
        assert!(!collides(&mut a, &mut b, None, true));

        b.pos = Vec2::new(1.6, 1.6);
        assert!(collides(&mut a, &mut b, None, true));
        assert_mirrored(&mut a, &mut b);
    }

    #[test]
    fn poly_poly_containment() {
        let mut small = square(2.0, 0.0, 1.0);
        let mut big = square(0.0, 0.0, 5.0);
        let mut result = CollisionResult::new();

        assert!(collides(&mut small, &mut big, Some(&mut result), true));
        assert!(result.a_in_b);
        assert!(!result.b_in_a);
        assert_abs_diff_eq!(result.overlap, 4.0, epsilon = 1e-5);
        assert_abs_diff_eq!(result.direction(), Vec2::new(-1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn point_tests() {
        let mut point = Body::point(1.0, 1.0, 0.0);
        let mut poly = Body::polygon(0.0, 0.0, vec![Vec2::new(1.0, 1.0), Vec2::new(3.0, 1.0), Vec2::new(3.0, 3.0), Vec2::new(1.0, 3.0)], 0.0, 1.0, 1.0, 0.0);
        let mut result = CollisionResult::new();

        assert!(collides(&mut point, &mut poly, Some(&mut result), true));
        assert_eq!(result.overlap, 0.0);
        assert!(result.a_in_b);

        let mut other = Body::point(1.0, 1.0, 0.0);
        assert!(collides(&mut point, &mut other, Some(&mut result), true));
        assert_eq!(result.overlap, 0.0);
        other.pos.x += 0.001;
        assert!(!collides(&mut point, &mut other, None, false));

        let mut circle = Body::circle(0.0, 1.0, 2.0, 1.0, 0.0);
        assert!(collides(&mut point, &mut circle, Some(&mut result), true));
        assert_abs_diff_eq!(result.overlap, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(result.direction(), Vec2::new(-1.0, 0.0), epsilon = 1e-5);
        assert!(result.a_in_b && !result.b_in_a);
        assert_mirrored(&mut point, &mut circle);
    }

    #[test]
    fn segment_tests() {
        let mut line = segment(0.0, 0.0, 10.0, 0.0);
        let mut result = CollisionResult::new();

        let mut beyond = Body::circle(12.0, 0.0, 1.5, 1.0, 0.0);
        assert!(!collides(&mut line, &mut beyond, None, true));
        beyond.as_circle_mut().unwrap().radius = 2.5;
        assert!(collides(&mut line, &mut beyond, Some(&mut result), true));
        assert_abs_diff_eq!(result.overlap, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(result.direction(), Vec2::new(1.0, 0.0), epsilon = 1e-5);

        let mut across = Body::circle(5.0, 1.0, 2.0, 1.0, 0.0);
        assert!(collides(&mut line, &mut across, Some(&mut result), true));
        assert_abs_diff_eq!(result.overlap, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(result.direction(), Vec2::new(0.0, 1.0), epsilon = 1e-5);

        // collinear shapes are only told apart along the segment itself
        let mut point = Body::point(20.0, 0.0, 0.0);
        assert!(!collides(&mut line, &mut point, None, false));
        let mut other = segment(11.0, 0.0, 15.0, 0.0);
        assert!(!collides(&mut line, &mut other, None, false));
        let mut crossing = segment(5.0, -1.0, 5.0, 1.0);
        assert!(collides(&mut line, &mut crossing, None, true));
    }

    #[test]
    fn aabb_prefilter_is_optional() {
        let mut a = square(0.0, 0.0, 1.0);
        let mut b = Body::circle(1.5, 0.0, 1.0, 1.0, 0.0);
        assert_eq!(collides(&mut a, &mut b, None, true), collides(&mut a, &mut b, None, false));

        b.pos.x = 30.0;
        assert!(!collides(&mut a, &mut b, None, false));
    }

    #[test]
    fn result_is_overwritten() {
        let mut a = Body::circle(0.0, 0.0, 5.0, 1.0, 0.0);
        let mut b = Body::circle(1.0, 0.0, 1.0, 1.0, 0.0);
        let mut result = CollisionResult::new();

        assert!(collides(&mut a, &mut b, Some(&mut result), true));
        assert!(result.b_in_a);

        b.pos.x = 100.0;
        assert!(!collides(&mut a, &mut b, Some(&mut result), true));
        assert_eq!(result, CollisionResult::new());
    }
}
