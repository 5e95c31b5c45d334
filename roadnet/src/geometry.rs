// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Planar geometry over polylines.
//!
//! Everything the structural predicates need: segment and polyline
//! intersection tests, point/segment distances, the discrete Fréchet
//! distance, and axis-aligned footprints for spatial buffering.

use rol::semantics::Vertex;

/// An axis-aligned bounding box, the footprint primitive for buffered
/// spatial queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Smallest x coordinate
    pub min_x: f64,
    /// Smallest y coordinate
    pub min_y: f64,
    /// Largest x coordinate
    pub max_x: f64,
    /// Largest y coordinate
    pub max_y: f64,
}

impl BoundingBox {
    /// The box around a set of vertices. Empty input gives an inverted box
    /// that intersects nothing.
    pub fn around<'a>(vertices: impl IntoIterator<Item = &'a Vertex>) -> Self {
        let mut bb = Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for v in vertices {
            bb.min_x = bb.min_x.min(v.x);
            bb.min_y = bb.min_y.min(v.y);
            bb.max_x = bb.max_x.max(v.x);
            bb.max_y = bb.max_y.max(v.y);
        }
        bb
    }

    /// The box grown by `d` on every side.
    pub fn inflate(&self, d: f64) -> Self {
        Self {
            min_x: self.min_x - d,
            min_y: self.min_y - d,
            max_x: self.max_x + d,
            max_y: self.max_y + d,
        }
    }

    /// Whether two boxes overlap.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Whether a point lies inside the box.
    pub fn contains(&self, v: &Vertex) -> bool {
        (self.min_x..=self.max_x).contains(&v.x) && (self.min_y..=self.max_y).contains(&v.y)
    }
}

/// The arithmetic mean of a set of vertices; the origin for an empty set.
pub fn centroid<'a>(vertices: impl IntoIterator<Item = &'a Vertex>) -> Vertex {
    let mut sum = Vertex::new(0.0, 0.0);
    let mut n = 0usize;
    for v in vertices {
        sum.x += v.x;
        sum.y += v.y;
        n += 1;
    }
    if n == 0 {
        sum
    } else {
        Vertex::new(sum.x / n as f64, sum.y / n as f64)
    }
}

fn orient(a: &Vertex, b: &Vertex, c: &Vertex) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Whether two segments properly cross. Orientation values within `eps` of
/// zero count as collinear, and touching or collinear configurations do not
/// count as a crossing, so polylines sharing an endpoint are not flagged.
pub fn segments_cross(p1: &Vertex, p2: &Vertex, q1: &Vertex, q2: &Vertex, eps: f64) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);
    ((d1 > eps && d2 < -eps) || (d1 < -eps && d2 > eps))
        && ((d3 > eps && d4 < -eps) || (d3 < -eps && d4 > eps))
}

/// Whether any segment of `p` properly crosses any segment of `q`.
pub fn polylines_intersect(p: &[Vertex], q: &[Vertex], eps: f64) -> bool {
    p.windows(2).any(|a| {
        q.windows(2)
            .any(|b| segments_cross(&a[0], &a[1], &b[0], &b[1], eps))
    })
}

/// Whether a polyline properly crosses itself. Consecutive segments share a
/// vertex and are skipped.
pub fn polyline_self_intersects(p: &[Vertex], eps: f64) -> bool {
    let segments: Vec<_> = p.windows(2).collect();
    for i in 0..segments.len() {
        for j in (i + 2)..segments.len() {
            if segments_cross(
                &segments[i][0],
                &segments[i][1],
                &segments[j][0],
                &segments[j][1],
                eps,
            ) {
                return true;
            }
        }
    }
    false
}

/// The distance from a point to a segment.
pub fn point_segment_distance(v: &Vertex, a: &Vertex, b: &Vertex) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return v.distance(a);
    }
    let t = (((v.x - a.x) * dx + (v.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    v.distance(&Vertex::new(a.x + t * dx, a.y + t * dy))
}

/// The point on a polyline closest to `v`. Returns `v` itself for an empty
/// polyline.
pub fn nearest_point_on_polyline(v: &Vertex, p: &[Vertex]) -> Vertex {
    if p.is_empty() {
        return *v;
    }
    if p.len() == 1 {
        return p[0];
    }
    let mut best = p[0];
    let mut best_d = f64::INFINITY;
    for w in p.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len2 = dx * dx + dy * dy;
        let candidate = if len2 == 0.0 {
            *a
        } else {
            let t = (((v.x - a.x) * dx + (v.y - a.y) * dy) / len2).clamp(0.0, 1.0);
            Vertex::new(a.x + t * dx, a.y + t * dy)
        };
        let d = v.distance(&candidate);
        if d < best_d {
            best_d = d;
            best = candidate;
        }
    }
    best
}

/// The minimum distance between two polylines, taken over all vertices of
/// one against all segments of the other, both ways.
pub fn polyline_distance(p: &[Vertex], q: &[Vertex]) -> f64 {
    if p.is_empty() || q.is_empty() {
        return f64::INFINITY;
    }
    let one_way = |p: &[Vertex], q: &[Vertex]| {
        p.iter()
            .map(|v| v.distance(&nearest_point_on_polyline(v, q)))
            .fold(f64::INFINITY, f64::min)
    };
    one_way(p, q).min(one_way(q, p))
}

/// The discrete Fréchet distance between two polylines, the coupling measure
/// used for adjacency/parallelism checks. Infinite if either is empty.
pub fn discrete_frechet(p: &[Vertex], q: &[Vertex]) -> f64 {
    if p.is_empty() || q.is_empty() {
        return f64::INFINITY;
    }
    let (n, m) = (p.len(), q.len());
    let mut ca = vec![f64::NEG_INFINITY; n * m];
    for i in 0..n {
        for j in 0..m {
            let d = p[i].distance(&q[j]);
            ca[i * m + j] = if i == 0 && j == 0 {
                d
            } else if i == 0 {
                d.max(ca[j - 1])
            } else if j == 0 {
                d.max(ca[(i - 1) * m])
            } else {
                d.max(
                    ca[(i - 1) * m + j]
                        .min(ca[(i - 1) * m + (j - 1)])
                        .min(ca[i * m + (j - 1)]),
                )
            };
        }
    }
    ca[n * m - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64) -> Vertex {
        Vertex::new(x, y)
    }

    const EPS: f64 = 1e-9;

    #[test]
    fn test_segments_cross() {
        assert!(segments_cross(
            &v(0.0, 0.0),
            &v(2.0, 2.0),
            &v(0.0, 2.0),
            &v(2.0, 0.0),
            EPS
        ));
        // parallel
        assert!(!segments_cross(
            &v(0.0, 0.0),
            &v(2.0, 0.0),
            &v(0.0, 1.0),
            &v(2.0, 1.0),
            EPS
        ));
        // sharing an endpoint is not a proper crossing
        assert!(!segments_cross(
            &v(0.0, 0.0),
            &v(1.0, 1.0),
            &v(1.0, 1.0),
            &v(2.0, 0.0),
            EPS
        ));
    }

    #[test]
    fn test_polyline_self_intersects() {
        let straight = [v(0.0, 0.0), v(1.0, 0.0), v(2.0, 0.0)];
        assert!(!polyline_self_intersects(&straight, EPS));

        let bowtie = [v(0.0, 0.0), v(2.0, 2.0), v(2.0, 0.0), v(0.0, 2.0)];
        assert!(polyline_self_intersects(&bowtie, EPS));
    }

    #[test]
    fn test_frechet() {
        let p = [v(0.0, 0.0), v(1.0, 0.0), v(2.0, 0.0)];
        let q = [v(0.0, 1.0), v(1.0, 1.0), v(2.0, 1.0)];
        let d = discrete_frechet(&p, &q);
        assert!((d - 1.0).abs() < 1e-12, "expected 1.0, got {d}");

        // the Fréchet distance is at least the endpoint distances
        let far = [v(0.0, 0.0), v(10.0, 0.0)];
        assert!(discrete_frechet(&p, &far) >= 8.0);
    }

    #[test]
    fn test_point_segment_distance() {
        let d = point_segment_distance(&v(1.0, 1.0), &v(0.0, 0.0), &v(2.0, 0.0));
        assert!((d - 1.0).abs() < 1e-12);
        // beyond the end the distance is to the endpoint
        let d = point_segment_distance(&v(3.0, 0.0), &v(0.0, 0.0), &v(2.0, 0.0));
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box() {
        let bb = BoundingBox::around(&[v(0.0, 0.0), v(2.0, 1.0)]);
        assert!(bb.contains(&v(1.0, 0.5)));
        assert!(!bb.contains(&v(3.0, 0.5)));
        let other = BoundingBox::around(&[v(2.5, 0.0), v(3.0, 1.0)]);
        assert!(!bb.intersects(&other));
        assert!(bb.inflate(0.6).intersects(&other));
    }
}
