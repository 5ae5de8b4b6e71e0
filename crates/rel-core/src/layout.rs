//! Force-directed auto-layout ("beautify").
//!
//! The diagram is loaded into an undirected `petgraph` graph whose node
//! weights carry position and velocity. Each step applies pairwise
//! repulsion, a weak pull toward the canvas center and spring attraction
//! along edges, then moves every body by its cooled velocity and clamps it
//! to the padded canvas. Overlaps are pushed apart periodically and once at
//! the end.

use crate::config::LayoutConfig;
use crate::id::NodeId;
use crate::model::{Diagram, Point};
use crate::viewport::CanvasSize;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Body {
    id: NodeId,
    pos: Point,
    vel: Point,
    radius: f64,
}

/// Padded clamp range for one axis. Collapses to `lo` when the canvas is
/// smaller than twice the padding.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    lo_x: f64,
    hi_x: f64,
    lo_y: f64,
    hi_y: f64,
}

impl Bounds {
    fn new(canvas: CanvasSize, padding: f64) -> Self {
        Self {
            lo_x: padding,
            hi_x: (canvas.width - padding).max(padding),
            lo_y: padding,
            hi_y: (canvas.height - padding).max(padding),
        }
    }

    fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(self.lo_x, self.hi_x), p.y.clamp(self.lo_y, self.hi_y))
    }
}

/// Unit vector from `b` to `a`. Coincident bodies get a fixed direction
/// derived from their indices so the result is reproducible.
fn separation(a: Point, b: Point, ia: usize, ib: usize) -> (Point, f64) {
    let d = a - b;
    let dist = d.length();
    if dist > 1e-6 {
        return (d * (1.0 / dist), dist);
    }
    let angle = (ia * 31 + ib * 17) as f64 * 0.618_033_988_75 * std::f64::consts::TAU;
    (Point::new(angle.cos(), angle.sin()), 0.0)
}

fn build_graph(diagram: &Diagram) -> UnGraph<Body, ()> {
    let mut graph = UnGraph::with_capacity(diagram.nodes.len(), diagram.edges.len());
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(diagram.nodes.len());
    for node in &diagram.nodes {
        let idx = graph.add_node(Body {
            id: node.id,
            pos: node.center(),
            vel: Point::ORIGIN,
            radius: node.radius,
        });
        index.insert(node.id, idx);
    }
    for edge in &diagram.edges {
        if edge.is_self_loop() {
            continue;
        }
        match (index.get(&edge.source_id), index.get(&edge.target_id)) {
            (Some(&a), Some(&b)) => {
                graph.add_edge(a, b, ());
            }
            _ => log::warn!("layout: skipping {} with unresolved endpoint", edge.id),
        }
    }
    graph
}

/// Compute new positions for every node in `diagram`.
///
/// An empty diagram yields an empty map; a single node is placed exactly at
/// the canvas center.
pub fn beautify(diagram: &Diagram, canvas: CanvasSize, cfg: &LayoutConfig) -> HashMap<NodeId, Point> {
    let mut graph = build_graph(diagram);
    let count = graph.node_count();

    if count == 0 {
        return HashMap::new();
    }
    if count == 1 {
        return graph
            .node_weights()
            .map(|b| (b.id, canvas.center()))
            .collect();
    }

    let bounds = Bounds::new(canvas, cfg.padding);
    let center = canvas.center();
    let indices: Vec<NodeIndex> = graph.node_indices().collect();
    let springs: Vec<(NodeIndex, NodeIndex)> = graph
        .edge_indices()
        .filter_map(|e| graph.edge_endpoints(e))
        .collect();

    let mut forces = vec![Point::ORIGIN; count];
    for iter in 0..cfg.iterations {
        forces.iter_mut().for_each(|f| *f = Point::ORIGIN);

        // Pairwise repulsion.
        for i in 0..count {
            for j in (i + 1)..count {
                let (dir, dist) = separation(graph[indices[i]].pos, graph[indices[j]].pos, i, j);
                let magnitude = if dist < cfg.min_distance {
                    (cfg.min_distance - dist) / cfg.min_distance * cfg.repulsion_strength
                } else {
                    cfg.repulsion_strength / (dist * dist)
                };
                let f = dir * magnitude;
                forces[i] = forces[i] + f;
                forces[j] = forces[j] - f;
            }
        }

        for (i, &idx) in indices.iter().enumerate() {
            let body = &mut graph[idx];
            let pull = (center - body.pos) * cfg.center_force;
            body.vel = (body.vel + forces[i] + pull) * cfg.damping;
        }

        // Springs feed velocities directly, after damping.
        for &(a, b) in &springs {
            let pull = (graph[b].pos - graph[a].pos) * cfg.attraction_strength;
            graph[a].vel = graph[a].vel + pull;
            graph[b].vel = graph[b].vel - pull;
        }

        let cooling = (1.0 - iter as f64 / cfg.iterations as f64).sqrt();
        for body in graph.node_weights_mut() {
            body.pos = bounds.clamp(body.pos + body.vel * cooling);
        }

        if cfg.overlap_every > 0 && (iter + 1) % cfg.overlap_every == 0 {
            resolve_overlaps(&mut graph, &indices, bounds, cfg);
        }
    }
    resolve_overlaps(&mut graph, &indices, bounds, cfg);

    log::debug!("beautify: {count} nodes, {} springs", springs.len());
    graph.node_weights().map(|b| (b.id, b.pos)).collect()
}

/// Push apart bodies closer than `r1 + r2 + gap`. Returns the number of
/// passes run.
fn resolve_overlaps(
    graph: &mut UnGraph<Body, ()>,
    indices: &[NodeIndex],
    bounds: Bounds,
    cfg: &LayoutConfig,
) -> usize {
    let count = indices.len();
    for pass in 0..cfg.overlap_passes {
        let mut worst = 0.0_f64;
        for i in 0..count {
            for j in (i + 1)..count {
                let (a, b) = (indices[i], indices[j]);
                let required = graph[a].radius + graph[b].radius + cfg.overlap_gap;
                let (dir, dist) = separation(graph[a].pos, graph[b].pos, i, j);
                if dist >= required {
                    continue;
                }
                let overlap = required - dist;
                worst = worst.max(overlap);
                let push = dir * (overlap * cfg.overlap_push / 2.0);
                graph[a].pos = bounds.clamp(graph[a].pos + push);
                graph[b].pos = bounds.clamp(graph[b].pos - push);
            }
        }
        if worst == 0.0 || (pass >= cfg.overlap_settle_after && worst < cfg.overlap_settle) {
            return pass + 1;
        }
    }
    cfg.overlap_passes
}

/// Write computed positions back into the diagram. Returns the ids of the
/// nodes that actually moved, in diagram order.
pub fn apply_positions(diagram: &mut Diagram, positions: &HashMap<NodeId, Point>) -> Vec<NodeId> {
    let mut moved = Vec::new();
    for node in &mut diagram.nodes {
        if let Some(&p) = positions.get(&node.id) {
            if p != node.center() {
                node.set_center(p);
                moved.push(node.id);
            }
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{EdgeId, GraphId};
    use crate::model::{Edge, Node, NodeType};

    fn diagram(points: &[(f64, f64)], edges: &[(usize, usize)]) -> Diagram {
        let nodes: Vec<Node> = points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let mut n = Node::new(GraphId(1), format!("n{i}"), NodeType::Concept, Point::new(x, y));
                n.id = NodeId(i as i64 + 1);
                n
            })
            .collect();
        let edges = edges
            .iter()
            .enumerate()
            .map(|(i, &(s, t))| {
                let mut e = Edge::new(GraphId(1), NodeId(s as i64 + 1), NodeId(t as i64 + 1));
                e.id = EdgeId(i as i64 + 100);
                e
            })
            .collect();
        Diagram::from_parts(nodes, edges)
    }

    #[test]
    fn single_node_goes_to_center() {
        let d = diagram(&[(12.0, 900.0)], &[]);
        let out = beautify(&d, CanvasSize::default(), &LayoutConfig::default());
        assert_eq!(out[&NodeId(1)], Point::new(1000.0, 750.0));
    }

    #[test]
    fn empty_diagram_is_untouched() {
        let out = beautify(&Diagram::new(), CanvasSize::default(), &LayoutConfig::default());
        assert!(out.is_empty());
    }

    #[test]
    fn positions_stay_inside_padding() {
        let d = diagram(
            &[(0.0, 0.0), (5000.0, 0.0), (0.0, 5000.0), (10.0, 10.0), (11.0, 10.0)],
            &[(0, 1), (1, 2), (2, 3), (3, 4)],
        );
        let canvas = CanvasSize::default();
        let cfg = LayoutConfig::default();
        for p in beautify(&d, canvas, &cfg).values() {
            assert!(p.x >= cfg.padding && p.x <= canvas.width - cfg.padding, "{p:?}");
            assert!(p.y >= cfg.padding && p.y <= canvas.height - cfg.padding, "{p:?}");
        }
    }

    #[test]
    fn coincident_nodes_are_separated() {
        let d = diagram(&[(500.0, 500.0), (500.0, 500.0)], &[(0, 1)]);
        let out = beautify(&d, CanvasSize::default(), &LayoutConfig::default());
        let gap = out[&NodeId(1)].distance(out[&NodeId(2)]);
        // r1 + r2 + 200 minus the settle tolerance.
        assert!(gap > 270.0, "gap {gap}");
    }

    #[test]
    fn layout_is_deterministic() {
        let d = diagram(&[(100.0, 100.0), (100.0, 100.0), (900.0, 300.0)], &[(0, 2)]);
        let a = beautify(&d, CanvasSize::default(), &LayoutConfig::default());
        let b = beautify(&d, CanvasSize::default(), &LayoutConfig::default());
        assert_eq!(a, b);
    }

    #[test]
    fn tiny_canvas_collapses_to_padding() {
        let d = diagram(&[(0.0, 0.0), (50.0, 50.0)], &[]);
        let canvas = CanvasSize {
            width: 100.0,
            height: 100.0,
        };
        for p in beautify(&d, canvas, &LayoutConfig::default()).values() {
            assert_eq!(*p, Point::new(150.0, 150.0));
        }
    }

    #[test]
    fn dangling_and_self_loop_edges_are_ignored() {
        let mut d = diagram(&[(100.0, 100.0), (600.0, 600.0)], &[(0, 0)]);
        d.edges.push(Edge::new(GraphId(1), NodeId(1), NodeId(99)));
        let out = beautify(&d, CanvasSize::default(), &LayoutConfig::default());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn apply_reports_moved_nodes() {
        let mut d = diagram(&[(100.0, 100.0), (600.0, 600.0)], &[]);
        let mut positions = HashMap::new();
        positions.insert(NodeId(1), Point::new(100.0, 100.0));
        positions.insert(NodeId(2), Point::new(700.0, 600.0));
        assert_eq!(apply_positions(&mut d, &positions), vec![NodeId(2)]);
        assert_eq!(d.nodes[1].x, 700.0);
    }
}
