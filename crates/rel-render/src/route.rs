//! Edge geometry shared by drawing and hit testing.
//!
//! Edges connecting the same two nodes (in either direction) form a pair
//! group. Members are ordered by id and fanned out along one perpendicular
//! per group, computed from the smaller-id node toward the larger-id node,
//! so a group curves the same way no matter which member is drawn first.

use kurbo::{BezPath, CubicBez, Line, ParamCurve, ParamCurveNearest, QuadBez, Vec2};
use rel_core::{Diagram, Edge, EdgeId, Node, NodeId, Point};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::FRAC_PI_2;

/// Half-angle of an arrowhead, in radians.
const ARROW_SPREAD: f64 = 0.4;

pub fn to_kurbo(p: Point) -> kurbo::Point {
    kurbo::Point::new(p.x, p.y)
}

pub fn from_kurbo(p: kurbo::Point) -> Point {
    Point::new(p.x, p.y)
}

// ─── Pair groups ─────────────────────────────────────────────────────────

/// Direction-agnostic key of a node pair: `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub low: NodeId,
    pub high: NodeId,
}

impl PairKey {
    pub fn of(edge: &Edge) -> Self {
        Self {
            low: edge.source_id.min(edge.target_id),
            high: edge.source_id.max(edge.target_id),
        }
    }
}

/// Signed offset of the `index`-th edge in a group of `count`.
///
/// Offsets are symmetric around zero: a group of two gets
/// `-spacing/2` and `+spacing/2`, a group of three `-spacing, 0, +spacing`.
pub fn edge_offset_for_index(count: usize, index: usize, spacing: f64) -> f64 {
    if count <= 1 {
        return 0.0;
    }
    (index as f64 - (count as f64 - 1.0) / 2.0) * spacing
}

/// Every edge's position inside its pair group.
#[derive(Debug, Clone, Default)]
pub struct EdgeGroups {
    groups: BTreeMap<PairKey, Vec<EdgeId>>,
    slots: HashMap<EdgeId, (usize, usize)>,
}

impl EdgeGroups {
    pub fn build(diagram: &Diagram) -> Self {
        let mut groups: BTreeMap<PairKey, Vec<EdgeId>> = BTreeMap::new();
        for edge in &diagram.edges {
            groups.entry(PairKey::of(edge)).or_default().push(edge.id);
        }
        let mut slots = HashMap::with_capacity(diagram.edges.len());
        for members in groups.values_mut() {
            members.sort();
            let count = members.len();
            for (index, id) in members.iter().enumerate() {
                slots.insert(*id, (index, count));
            }
        }
        Self { groups, slots }
    }

    /// `(index, count)` of an edge in its group.
    pub fn slot(&self, edge: EdgeId) -> Option<(usize, usize)> {
        self.slots.get(&edge).copied()
    }

    pub fn offset(&self, edge: EdgeId, spacing: f64) -> f64 {
        self.slot(edge)
            .map(|(index, count)| edge_offset_for_index(count, index, spacing))
            .unwrap_or(0.0)
    }

    /// Groups in key order, members sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &[EdgeId])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

/// Unit perpendicular of the axis `low → high`.
pub fn unified_perpendicular(low: Point, high: Point) -> Vec2 {
    let d = Vec2::new(high.x - low.x, high.y - low.y);
    let len = d.hypot();
    if len < 1e-9 {
        return Vec2::new(0.0, -1.0);
    }
    Vec2::new(-d.y / len, d.x / len)
}

/// Rim points of `source` and `target` along the straight center line.
pub fn boundary_points(source: &Node, target: &Node) -> (kurbo::Point, kurbo::Point) {
    let angle = (target.y - source.y).atan2(target.x - source.x);
    let dir = Vec2::from_angle(angle);
    (
        to_kurbo(source.center()) + dir * source.radius,
        to_kurbo(target.center()) - dir * target.radius,
    )
}

// ─── Routes ──────────────────────────────────────────────────────────────

/// The drawn path of one edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeRoute {
    Straight(Line),
    /// Offset member of a pair group.
    Arc(QuadBez),
    /// Rim point → bend points → rim point.
    Poly(Vec<kurbo::Point>),
    SelfLoop(CubicBez),
}

impl EdgeRoute {
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        match self {
            EdgeRoute::Straight(line) => {
                path.move_to(line.p0);
                path.line_to(line.p1);
            }
            EdgeRoute::Arc(q) => {
                path.move_to(q.p0);
                path.quad_to(q.p1, q.p2);
            }
            EdgeRoute::Poly(points) => {
                let mut it = points.iter();
                if let Some(first) = it.next() {
                    path.move_to(*first);
                }
                for p in it {
                    path.line_to(*p);
                }
            }
            EdgeRoute::SelfLoop(c) => {
                path.move_to(c.p0);
                path.curve_to(c.p1, c.p2, c.p3);
            }
        }
        path
    }

    /// Arrow tip and the direction of travel into it.
    pub fn end_tangent(&self) -> (kurbo::Point, Vec2) {
        match self {
            EdgeRoute::Straight(line) => (line.p1, line.p1 - line.p0),
            EdgeRoute::Arc(q) => (q.p2, q.p2 - q.p1),
            EdgeRoute::Poly(points) => match points.as_slice() {
                [.., a, b] => (*b, *b - *a),
                [only] => (*only, Vec2::ZERO),
                [] => (kurbo::Point::ZERO, Vec2::ZERO),
            },
            EdgeRoute::SelfLoop(c) => (c.p3, c.p3 - c.p2),
        }
    }

    /// Where the edge label sits.
    pub fn label_anchor(&self) -> kurbo::Point {
        match self {
            EdgeRoute::Straight(line) => line.eval(0.5),
            EdgeRoute::Arc(q) => q.eval(0.5),
            EdgeRoute::Poly(points) => {
                let mid = points.len() / 2;
                if points.len() % 2 == 1 {
                    points[mid]
                } else if mid > 0 {
                    points[mid - 1].midpoint(points[mid])
                } else {
                    kurbo::Point::ZERO
                }
            }
            EdgeRoute::SelfLoop(c) => c.eval(0.5),
        }
    }

    /// Minimum distance from `p` to the route. Curves are sampled at
    /// `samples + 1` evenly spaced parameters.
    pub fn distance(&self, p: kurbo::Point, samples: usize) -> f64 {
        match self {
            EdgeRoute::Straight(line) => segment_distance(*line, p),
            EdgeRoute::Poly(points) => points
                .windows(2)
                .map(|w| segment_distance(Line::new(w[0], w[1]), p))
                .fold(f64::INFINITY, f64::min),
            EdgeRoute::Arc(q) => sampled_distance(|t| q.eval(t), p, samples),
            EdgeRoute::SelfLoop(c) => sampled_distance(|t| c.eval(t), p, samples),
        }
    }

    /// Index at which a new bend point near `p` should be inserted into the
    /// edge's bend point list.
    pub fn insertion_index(&self, p: kurbo::Point) -> usize {
        match self {
            EdgeRoute::Poly(points) => points
                .windows(2)
                .enumerate()
                .map(|(i, w)| (i, segment_distance(Line::new(w[0], w[1]), p)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
                .unwrap_or(0),
            _ => 0,
        }
    }
}

pub fn segment_distance(line: Line, p: kurbo::Point) -> f64 {
    line.nearest(p, 1e-6).distance_sq.sqrt()
}

fn sampled_distance(eval: impl Fn(f64) -> kurbo::Point, p: kurbo::Point, samples: usize) -> f64 {
    let n = samples.max(1);
    (0..=n)
        .map(|i| eval(i as f64 / n as f64).distance(p))
        .fold(f64::INFINITY, f64::min)
}

/// Loop drawn above `node`; later members of a self-loop group are larger.
pub fn self_loop(node: &Node, index: usize, spacing: f64) -> CubicBez {
    let c = to_kurbo(node.center());
    let r = node.radius;
    let size = r * 0.9 + index as f64 * spacing * 0.5;
    let rim = |angle: f64, dist: f64| c + Vec2::from_angle(angle) * dist;
    CubicBez::new(
        rim(-FRAC_PI_2 - 0.45, r),
        rim(-FRAC_PI_2 - 0.9, r + size * 1.6),
        rim(-FRAC_PI_2 + 0.9, r + size * 1.6),
        rim(-FRAC_PI_2 + 0.45, r),
    )
}

/// Route one edge. `None` when either endpoint does not resolve.
pub fn route_edge(diagram: &Diagram, edge: &Edge, groups: &EdgeGroups, spacing: f64) -> Option<EdgeRoute> {
    let (source, target) = diagram.endpoints(edge)?;

    if edge.is_self_loop() {
        let index = groups.slot(edge.id).map(|(i, _)| i).unwrap_or(0);
        return Some(EdgeRoute::SelfLoop(self_loop(source, index, spacing)));
    }

    let (start, end) = boundary_points(source, target);
    if !edge.bend_points.is_empty() {
        let mut points = Vec::with_capacity(edge.bend_points.len() + 2);
        points.push(start);
        points.extend(edge.bend_points.iter().copied().map(to_kurbo));
        points.push(end);
        return Some(EdgeRoute::Poly(points));
    }

    let offset = groups.offset(edge.id, spacing);
    if offset == 0.0 {
        return Some(EdgeRoute::Straight(Line::new(start, end)));
    }
    let (low, high) = if source.id <= target.id {
        (source, target)
    } else {
        (target, source)
    };
    let perp = unified_perpendicular(low.center(), high.center());
    let control = to_kurbo(source.center().midpoint(target.center())) + perp * offset;
    Some(EdgeRoute::Arc(QuadBez::new(start, control, end)))
}

/// Routes of every resolvable edge, group by group.
pub fn route_all(diagram: &Diagram, spacing: f64) -> Vec<(EdgeId, EdgeRoute)> {
    let groups = EdgeGroups::build(diagram);
    let mut out = Vec::with_capacity(diagram.edges.len());
    for (_, members) in groups.iter() {
        for id in members {
            if let Some(route) = diagram
                .edge(*id)
                .and_then(|edge| route_edge(diagram, edge, &groups, spacing))
            {
                out.push((*id, route));
            }
        }
    }
    out
}

/// Rubber-band line from the rim of `source` to a free cursor point.
pub fn rubber_band(source: &Node, cursor: Point) -> Line {
    let angle = (cursor.y - source.y).atan2(cursor.x - source.x);
    let start = to_kurbo(source.center()) + Vec2::from_angle(angle) * source.radius;
    Line::new(start, to_kurbo(cursor))
}

/// Triangle `[tip, left, right]` for an arrowhead pointing along `dir`.
pub fn arrowhead(tip: kurbo::Point, dir: Vec2, size: f64) -> [kurbo::Point; 3] {
    let angle = dir.atan2();
    [
        tip,
        tip - Vec2::from_angle(angle - ARROW_SPREAD) * size,
        tip - Vec2::from_angle(angle + ARROW_SPREAD) * size,
    ]
}
