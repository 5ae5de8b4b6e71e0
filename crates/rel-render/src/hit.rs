//! Hit testing: logical point → node, edge or bend point.
//!
//! Edge tests run against the same [`EdgeRoute`]s the renderer draws, so a
//! curved group member is clickable exactly where it appears.

use crate::route::{EdgeGroups, EdgeRoute, route_edge, to_kurbo};
use rel_core::{BendRef, Diagram, Edge, EdgeId, HitConfig, Node, NodeId, Point, Rect};

pub fn point_in_node(p: Point, node: &Node) -> bool {
    p.distance(node.center()) <= node.radius
}

/// Topmost node under `p` (last drawn wins).
pub fn node_at(diagram: &Diagram, p: Point) -> Option<NodeId> {
    diagram
        .nodes
        .iter()
        .rev()
        .find(|n| point_in_node(p, n))
        .map(|n| n.id)
}

/// Topmost node under `p`, skipping `exclude`.
pub fn node_at_except(diagram: &Diagram, p: Point, exclude: &[NodeId]) -> Option<NodeId> {
    diagram
        .nodes
        .iter()
        .rev()
        .filter(|n| !exclude.contains(&n.id))
        .find(|n| point_in_node(p, n))
        .map(|n| n.id)
}

/// Whether `p` lies on the drawn route of `edge`.
///
/// Points inside either endpoint node never count: the node keeps
/// priority under the edge's span.
pub fn point_on_edge(diagram: &Diagram, edge: &Edge, groups: &EdgeGroups, p: Point, cfg: &HitConfig) -> bool {
    let Some((source, target)) = diagram.endpoints(edge) else {
        return false;
    };
    if point_in_node(p, source) || point_in_node(p, target) {
        return false;
    }
    let Some(route) = route_edge(diagram, edge, groups, cfg.edge_spacing) else {
        return false;
    };
    route_hit(&route, p, cfg)
}

fn route_hit(route: &EdgeRoute, p: Point, cfg: &HitConfig) -> bool {
    let kp = to_kurbo(p);
    match route {
        EdgeRoute::Straight(line) => {
            let span = line.p0.distance(kp) + line.p1.distance(kp);
            route.distance(kp, cfg.curve_samples) < cfg.straight_tolerance
                && span <= line.p0.distance(line.p1) + cfg.span_slack
        }
        EdgeRoute::Poly(_) | EdgeRoute::Arc(_) | EdgeRoute::SelfLoop(_) => {
            route.distance(kp, cfg.curve_samples) < cfg.curve_tolerance
        }
    }
}

/// Topmost edge under `p`.
pub fn edge_at(diagram: &Diagram, p: Point, cfg: &HitConfig) -> Option<EdgeId> {
    let groups = EdgeGroups::build(diagram);
    diagram
        .edges
        .iter()
        .rev()
        .find(|e| point_on_edge(diagram, e, &groups, p, cfg))
        .map(|e| e.id)
}

/// Index of the first bend point of `edge` within `tolerance` of `p`.
pub fn point_on_bend_point(edge: &Edge, p: Point, tolerance: f64) -> Option<usize> {
    edge.bend_points.iter().position(|b| b.distance(p) <= tolerance)
}

/// Nodes whose centers lie inside `rect`, boundary inclusive.
pub fn nodes_in_rect(diagram: &Diagram, rect: Rect) -> Vec<NodeId> {
    diagram
        .nodes
        .iter()
        .filter(|n| rect.contains(n.center()))
        .map(|n| n.id)
        .collect()
}

/// Bend points inside `rect`, boundary inclusive.
pub fn bend_points_in_rect(diagram: &Diagram, rect: Rect) -> Vec<BendRef> {
    diagram
        .bend_points()
        .filter(|(_, p)| rect.contains(*p))
        .map(|(r, _)| r)
        .collect()
}

/// Where a bend point inserted at `p` belongs in the edge's list.
pub fn bend_insertion_index(diagram: &Diagram, edge: &Edge, p: Point, spacing: f64) -> usize {
    let groups = EdgeGroups::build(diagram);
    route_edge(diagram, edge, &groups, spacing)
        .map(|route| route.insertion_index(to_kurbo(p)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rel_core::{GraphId, NodeType};

    fn node(id: i64, x: f64, y: f64) -> Node {
        let mut n = Node::new(GraphId(1), "n", NodeType::Concept, Point::new(x, y));
        n.id = NodeId(id);
        n
    }

    fn edge(id: i64, s: i64, t: i64) -> Edge {
        let mut e = rel_core::Edge::new(GraphId(1), NodeId(s), NodeId(t));
        e.id = EdgeId(id);
        e
    }

    fn pair() -> Diagram {
        Diagram::from_parts(vec![node(1, 0.0, 0.0), node(2, 300.0, 0.0)], vec![edge(1, 1, 2)])
    }

    #[test]
    fn node_boundary_counts() {
        let n = node(1, 0.0, 0.0);
        assert!(point_in_node(Point::new(40.0, 0.0), &n));
        assert!(!point_in_node(Point::new(40.1, 0.0), &n));
    }

    #[test]
    fn topmost_node_wins() {
        let d = Diagram::from_parts(vec![node(1, 0.0, 0.0), node(2, 10.0, 0.0)], vec![]);
        assert_eq!(node_at(&d, Point::new(5.0, 0.0)), Some(NodeId(2)));
        assert_eq!(node_at_except(&d, Point::new(5.0, 0.0), &[NodeId(2)]), Some(NodeId(1)));
        assert_eq!(node_at(&d, Point::new(500.0, 0.0)), None);
    }

    #[test]
    fn straight_edge_midpoint_and_offset() {
        let d = pair();
        let groups = EdgeGroups::build(&d);
        let cfg = HitConfig::default();
        assert!(point_on_edge(&d, &d.edges[0], &groups, Point::new(150.0, 0.0), &cfg));
        assert!(!point_on_edge(&d, &d.edges[0], &groups, Point::new(150.0, 20.0), &cfg));
    }

    #[test]
    fn straight_edge_span_is_bounded() {
        let d = pair();
        let groups = EdgeGroups::build(&d);
        let cfg = HitConfig::default();
        // Beyond the target rim, outside both nodes.
        assert!(!point_on_edge(&d, &d.edges[0], &groups, Point::new(345.0, 0.0), &cfg));
    }

    #[test]
    fn node_interior_is_not_an_edge_hit() {
        let d = pair();
        let groups = EdgeGroups::build(&d);
        assert!(!point_on_edge(&d, &d.edges[0], &groups, Point::new(20.0, 0.0), &HitConfig::default()));
    }

    #[test]
    fn bend_points_hit_first_within_tolerance() {
        let mut e = edge(1, 1, 2);
        e.bend_points.push(Point::new(100.0, 100.0));
        e.bend_points.push(Point::new(105.0, 100.0));
        assert_eq!(point_on_bend_point(&e, Point::new(103.0, 100.0), 10.0), Some(0));
        assert_eq!(point_on_bend_point(&e, Point::new(200.0, 100.0), 10.0), None);
    }

    #[test]
    fn poly_line_segments_are_hit() {
        let mut e = edge(1, 1, 2);
        e.bend_points.push(Point::new(150.0, 150.0));
        let d = Diagram::from_parts(vec![node(1, 0.0, 0.0), node(2, 300.0, 0.0)], vec![e]);
        let cfg = HitConfig::default();
        assert_eq!(edge_at(&d, Point::new(205.0, 75.0), &cfg), Some(EdgeId(1)));
        assert_eq!(edge_at(&d, Point::new(150.0, 0.0), &cfg), None);
        assert_eq!(edge_at(&d, Point::new(150.0, 145.0), &cfg), Some(EdgeId(1)));
    }

    #[test]
    fn marquee_is_boundary_inclusive() {
        let mut e = edge(1, 1, 2);
        e.bend_points.push(Point::new(100.0, 100.0));
        let d = Diagram::from_parts(
            vec![node(1, 0.0, 0.0), node(2, 100.0, 50.0), node(3, 100.1, 0.0)],
            vec![e],
        );
        let rect = Rect::from_corners(Point::new(100.0, 100.0), Point::new(0.0, 0.0));
        assert_eq!(nodes_in_rect(&d, rect), vec![NodeId(1), NodeId(2)]);
        assert_eq!(
            bend_points_in_rect(&d, rect),
            vec![BendRef {
                edge: EdgeId(1),
                index: 0
            }]
        );
    }
}
