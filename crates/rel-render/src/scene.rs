//! Editor state → backend-neutral display list.
//!
//! Backends (Canvas2D in the WASM bridge, Vello in [`crate::paint`]) walk
//! the list in order. All geometry is resolved here so both backends draw
//! identical shapes.

use crate::info_box::InfoBoxLayout;
use crate::route::{EdgeRoute, arrowhead, boundary_points, route_all, rubber_band};
use kurbo::Line;
use rel_core::{BendRef, CanvasSize, Color, Diagram, EdgeId, HitConfig, NodeId, Point, Rect};

// ─── Theme ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneTheme {
    pub background: Color,
    pub accent: Color,
    pub edge_width: f64,
    pub selected_edge_width: f64,
    pub arrow_size: f64,
    pub bend_radius: f64,
}

impl SceneTheme {
    pub fn light() -> Self {
        Self {
            background: Color::rgb(0xF5, 0xF5, 0xF7),
            accent: Color::rgb(0x4F, 0xC3, 0xF7),
            edge_width: 2.0,
            selected_edge_width: 3.5,
            arrow_size: 11.0,
            bend_radius: 5.0,
        }
    }

    pub fn dark() -> Self {
        Self {
            background: Color::rgb(0x1C, 0x1C, 0x1E),
            ..Self::light()
        }
    }
}

impl Default for SceneTheme {
    fn default() -> Self {
        Self::light()
    }
}

// ─── Input ───────────────────────────────────────────────────────────────

/// In-progress edge preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TempEdge {
    /// Edge creation: source rim → cursor.
    RubberBand { source: NodeId, cursor: Point },
    /// Dragging an existing edge to a new target.
    Reconnect {
        edge: EdgeId,
        cursor: Point,
        candidate: Option<NodeId>,
    },
}

/// What is selected, as far as drawing is concerned.
#[derive(Debug, Clone, Default)]
pub struct Highlights {
    pub node: Option<NodeId>,
    pub edge: Option<EdgeId>,
    pub bend: Option<BendRef>,
    pub group_nodes: Vec<NodeId>,
    pub group_bends: Vec<BendRef>,
}

pub struct RenderState<'a> {
    pub diagram: &'a Diagram,
    pub canvas: CanvasSize,
    pub background: Option<&'a str>,
    pub hit: &'a HitConfig,
    pub theme: &'a SceneTheme,
    pub highlights: &'a Highlights,
    pub temp_edge: Option<TempEdge>,
    pub marquee: Option<Rect>,
    /// Empty when node info is hidden.
    pub info_boxes: &'a [InfoBoxLayout],
}

// ─── Output ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Clear {
        width: f64,
        height: f64,
        color: Color,
    },
    Background {
        source: String,
        width: f64,
        height: f64,
    },
    Edge {
        id: EdgeId,
        route: EdgeRoute,
        color: Color,
        width: f64,
        arrow: [kurbo::Point; 3],
        label: Option<(String, kurbo::Point)>,
    },
    TempEdge {
        line: Line,
        color: Color,
        arrow: [kurbo::Point; 3],
    },
    Node {
        id: NodeId,
        center: Point,
        radius: f64,
        fill: Color,
        stroke: Color,
        stroke_width: f64,
        label: String,
        label_color: Color,
        image: Option<String>,
    },
    InfoBox(InfoBoxLayout),
    Marquee(Rect),
    /// Dashed ring around a group-selected node.
    GroupRing { center: Point, radius: f64, color: Color },
    BendHandle {
        at: Point,
        radius: f64,
        color: Color,
        filled: bool,
    },
}

pub fn build_display_list(state: &RenderState<'_>) -> Vec<DrawCmd> {
    let d = state.diagram;
    let theme = state.theme;
    let hl = state.highlights;
    let mut out = Vec::with_capacity(d.nodes.len() + d.edges.len() + 4);

    out.push(DrawCmd::Clear {
        width: state.canvas.width,
        height: state.canvas.height,
        color: theme.background,
    });
    if let Some(src) = state.background {
        out.push(DrawCmd::Background {
            source: src.to_string(),
            width: state.canvas.width,
            height: state.canvas.height,
        });
    }

    // Edges, one pair group at a time.
    for (id, route) in route_all(d, state.hit.edge_spacing) {
        let Some(edge) = d.edge(id) else { continue };
        let selected = hl.edge == Some(id);
        let width = if selected {
            theme.selected_edge_width
        } else {
            theme.edge_width
        };
        let (tip, dir) = route.end_tangent();
        out.push(DrawCmd::Edge {
            id,
            color: if selected { theme.accent } else { edge.color },
            width,
            arrow: arrowhead(tip, dir, theme.arrow_size + width),
            label: (!edge.label.is_empty()).then(|| (edge.label.clone(), route.label_anchor())),
            route,
        });
    }

    if let Some(temp) = state.temp_edge.and_then(|t| temp_line(d, t)) {
        out.push(DrawCmd::TempEdge {
            arrow: arrowhead(temp.p1, temp.p1 - temp.p0, theme.arrow_size),
            line: temp,
            color: theme.accent,
        });
    }

    for node in &d.nodes {
        let selected = hl.node == Some(node.id);
        out.push(DrawCmd::Node {
            id: node.id,
            center: node.center(),
            radius: node.radius,
            fill: node.color,
            stroke: if selected { theme.accent } else { node.color.darken(0.25) },
            stroke_width: if selected { 3.0 } else { 1.5 },
            label: node.name.clone(),
            label_color: node.color.contrasting_text(),
            image: node.image.clone(),
        });
    }

    out.extend(state.info_boxes.iter().cloned().map(DrawCmd::InfoBox));

    // Overlays.
    if let Some(rect) = state.marquee {
        out.push(DrawCmd::Marquee(rect));
    }
    for id in &hl.group_nodes {
        if let Some(node) = d.node(*id) {
            out.push(DrawCmd::GroupRing {
                center: node.center(),
                radius: node.radius + 6.0,
                color: theme.accent,
            });
        }
    }
    if let Some(edge) = hl.edge.and_then(|id| d.edge(id)) {
        for (index, p) in edge.bend_points.iter().enumerate() {
            let this = BendRef {
                edge: edge.id,
                index,
            };
            out.push(DrawCmd::BendHandle {
                at: *p,
                radius: theme.bend_radius,
                color: theme.accent,
                filled: hl.bend == Some(this),
            });
        }
    }
    for r in &hl.group_bends {
        if let Some(p) = d.bend_point(*r) {
            out.push(DrawCmd::BendHandle {
                at: p,
                radius: theme.bend_radius,
                color: theme.accent,
                filled: true,
            });
        }
    }

    log::trace!("display list: {} commands", out.len());
    out
}

fn temp_line(d: &Diagram, temp: TempEdge) -> Option<Line> {
    match temp {
        TempEdge::RubberBand { source, cursor } => Some(rubber_band(d.node(source)?, cursor)),
        TempEdge::Reconnect {
            edge,
            cursor,
            candidate,
        } => {
            let source = d.node(d.edge(edge)?.source_id)?;
            match candidate.and_then(|id| d.node(id)) {
                Some(target) => {
                    let (a, b) = boundary_points(source, target);
                    Some(Line::new(a, b))
                }
                None => Some(rubber_band(source, cursor)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rel_core::{Edge, GraphId, Node, NodeType};

    fn diagram() -> Diagram {
        let mut a = Node::new(GraphId(1), "A", NodeType::Person, Point::new(0.0, 0.0));
        a.id = NodeId(1);
        let mut b = Node::new(GraphId(1), "B", NodeType::Event, Point::new(300.0, 0.0));
        b.id = NodeId(2);
        let mut e = Edge::new(GraphId(1), NodeId(1), NodeId(2));
        e.id = EdgeId(5);
        e.label = "knows".into();
        e.bend_points.push(Point::new(150.0, 80.0));
        let mut dangling = Edge::new(GraphId(1), NodeId(1), NodeId(99));
        dangling.id = EdgeId(6);
        Diagram::from_parts(vec![a, b], vec![e, dangling])
    }

    fn build(hl: &Highlights, temp: Option<TempEdge>, marquee: Option<Rect>) -> Vec<DrawCmd> {
        let d = diagram();
        let hit = HitConfig::default();
        let theme = SceneTheme::light();
        build_display_list(&RenderState {
            diagram: &d,
            canvas: CanvasSize::default(),
            background: Some("data:image/png;base64,AAAA"),
            hit: &hit,
            theme: &theme,
            highlights: hl,
            temp_edge: temp,
            marquee,
            info_boxes: &[],
        })
    }

    #[test]
    fn layers_are_ordered() {
        let hl = Highlights {
            edge: Some(EdgeId(5)),
            ..Default::default()
        };
        let cmds = build(
            &hl,
            Some(TempEdge::RubberBand {
                source: NodeId(1),
                cursor: Point::new(50.0, 200.0),
            }),
            Some(Rect::new(0.0, 0.0, 10.0, 10.0)),
        );
        let kinds: Vec<&str> = cmds
            .iter()
            .map(|c| match c {
                DrawCmd::Clear { .. } => "clear",
                DrawCmd::Background { .. } => "background",
                DrawCmd::Edge { .. } => "edge",
                DrawCmd::TempEdge { .. } => "temp",
                DrawCmd::Node { .. } => "node",
                DrawCmd::InfoBox(_) => "info",
                DrawCmd::Marquee(_) => "marquee",
                DrawCmd::GroupRing { .. } => "ring",
                DrawCmd::BendHandle { .. } => "bend",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["clear", "background", "edge", "temp", "node", "node", "marquee", "bend"]
        );
    }

    #[test]
    fn dangling_edge_is_not_drawn() {
        let cmds = build(&Highlights::default(), None, None);
        let edges: Vec<EdgeId> = cmds
            .iter()
            .filter_map(|c| match c {
                DrawCmd::Edge { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(edges, vec![EdgeId(5)]);
    }

    #[test]
    fn edge_label_and_selection_color() {
        let hl = Highlights {
            edge: Some(EdgeId(5)),
            ..Default::default()
        };
        let cmds = build(&hl, None, None);
        let Some(DrawCmd::Edge { color, label, .. }) =
            cmds.iter().find(|c| matches!(c, DrawCmd::Edge { .. }))
        else {
            panic!("no edge");
        };
        assert_eq!(*color, SceneTheme::light().accent);
        assert_eq!(label.as_ref().map(|(s, _)| s.as_str()), Some("knows"));
    }

    #[test]
    fn group_selection_draws_rings() {
        let hl = Highlights {
            group_nodes: vec![NodeId(1), NodeId(2)],
            ..Default::default()
        };
        let rings = build(&hl, None, None)
            .into_iter()
            .filter(|c| matches!(c, DrawCmd::GroupRing { .. }))
            .count();
        assert_eq!(rings, 2);
    }
}
