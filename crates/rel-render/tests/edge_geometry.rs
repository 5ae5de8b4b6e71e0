//! Integration tests: edge routing and hit testing agree.
//!
//! Every route the display list draws must be clickable along its drawn
//! path, with one spacing value shared by both sides.

use kurbo::ParamCurve;
use pretty_assertions::assert_eq;
use rel_core::{Diagram, Edge, EdgeId, GraphId, HitConfig, Node, NodeId, NodeType, Point};
use rel_render::hit::{edge_at, point_on_edge};
use rel_render::route::from_kurbo;
use rel_render::{EdgeGroups, EdgeRoute, edge_offset_for_index, route_all};

fn node(id: i64, x: f64, y: f64) -> Node {
    let mut n = Node::new(GraphId(1), format!("n{id}"), NodeType::Concept, Point::new(x, y));
    n.id = NodeId(id);
    n
}

fn edge(id: i64, s: i64, t: i64) -> Edge {
    let mut e = Edge::new(GraphId(1), NodeId(s), NodeId(t));
    e.id = EdgeId(id);
    e
}

// ─── Single edge ────────────────────────────────────────────────────────

#[test]
fn click_on_and_off_a_single_edge() {
    // A(0,0) → B(300,0), both r = 40.
    let d = Diagram::from_parts(vec![node(1, 0.0, 0.0), node(2, 300.0, 0.0)], vec![edge(1, 1, 2)]);
    let cfg = HitConfig::default();
    assert_eq!(edge_at(&d, Point::new(150.0, 0.0), &cfg), Some(EdgeId(1)));
    assert_eq!(edge_at(&d, Point::new(150.0, 50.0), &cfg), None);
}

// ─── Pair groups ────────────────────────────────────────────────────────

#[test]
fn two_edges_fan_out_in_opposite_directions() {
    let d = Diagram::from_parts(
        vec![node(1, 0.0, 0.0), node(2, 300.0, 0.0)],
        vec![edge(2, 1, 2), edge(1, 1, 2)],
    );
    let cfg = HitConfig::default();
    let groups = EdgeGroups::build(&d);
    assert_eq!(groups.offset(EdgeId(1), cfg.edge_spacing), -cfg.edge_spacing / 2.0);
    assert_eq!(groups.offset(EdgeId(2), cfg.edge_spacing), cfg.edge_spacing / 2.0);
    assert_eq!(edge_offset_for_index(2, 0, cfg.edge_spacing), -25.0);

    let apex = |id: EdgeId| -> Point {
        let (_, route) = route_all(&d, cfg.edge_spacing)
            .into_iter()
            .find(|(e, _)| *e == id)
            .unwrap();
        match route {
            EdgeRoute::Arc(q) => from_kurbo(q.eval(0.5)),
            other => panic!("expected arc, got {other:?}"),
        }
    };
    let (a1, a2) = (apex(EdgeId(1)), apex(EdgeId(2)));
    assert!(a1.y < 0.0 && a2.y > 0.0, "{a1:?} {a2:?}");
    assert_eq!(a1.y, -a2.y);
}

#[test]
fn each_group_member_is_hit_on_its_own_curve() {
    let d = Diagram::from_parts(
        vec![node(1, 0.0, 0.0), node(2, 300.0, 0.0)],
        vec![edge(1, 1, 2), edge(2, 2, 1)],
    );
    let cfg = HitConfig::default();
    let groups = EdgeGroups::build(&d);
    for (id, route) in route_all(&d, cfg.edge_spacing) {
        let EdgeRoute::Arc(q) = route else {
            panic!("expected arc");
        };
        let on_curve = from_kurbo(q.eval(0.5));
        let e = d.edge(id).unwrap();
        assert!(point_on_edge(&d, e, &groups, on_curve, &cfg), "{id} not hit at {on_curve:?}");
        assert_eq!(edge_at(&d, on_curve, &cfg), Some(id));
    }
}

#[test]
fn reversed_insertion_order_does_not_change_geometry() {
    let forward = Diagram::from_parts(
        vec![node(1, 0.0, 0.0), node(2, 300.0, 100.0)],
        vec![edge(1, 1, 2), edge(2, 2, 1), edge(3, 1, 2)],
    );
    let mut reversed = forward.clone();
    reversed.edges.reverse();
    assert_eq!(route_all(&forward, 50.0), route_all(&reversed, 50.0));
}
