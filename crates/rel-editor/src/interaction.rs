//! Pointer interaction state machine.
//!
//! Exactly one [`Interaction`] mode is active at a time. Pointer-down picks
//! the mode by priority, moves update it live, and pointer-up commits. The
//! machine mutates the diagram and selection it is handed in a [`Canvas`]
//! and reports what the editor still has to do (persist, snapshot, pan) as
//! [`Effects`].

use crate::input::Modifiers;
use rel_core::{BendRef, Diagram, Edge, EditorConfig, EdgeId, GraphId, NodeId, Point, Rect};
use rel_render::hit::{
    bend_insertion_index, bend_points_in_rect, edge_at, node_at, node_at_except, nodes_in_rect,
    point_on_bend_point,
};
use rel_render::info_box::toggle_at;
use rel_render::{InfoBoxLayout, TempEdge};

use crate::selection::Selection;

/// The active pointer gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    /// Rubber band from `source` to `cursor`.
    EdgeCreating { source: NodeId, cursor: Point },
    /// `grab` is the pointer offset from the node center.
    DraggingNode { node: NodeId, grab: Point, moved: bool },
    /// Rigid translation of a group; positions are the drag-start snapshots.
    DraggingSelectedNodes {
        start: Point,
        nodes: Vec<(NodeId, Point)>,
        bend_points: Vec<(BendRef, Point)>,
        moved: bool,
    },
    /// Edge grabbed; `candidate` is a live reconnection target.
    DraggingEdge {
        edge: EdgeId,
        cursor: Point,
        candidate: Option<NodeId>,
    },
    DraggingBendPoint { bend: BendRef, grab: Point, moved: bool },
    MarqueeSelecting { start: Point, end: Point },
    /// `last` is in client space.
    Panning { last: Point },
}

/// Everything the machine needs from the editor for one event.
pub struct Canvas<'a> {
    pub diagram: &'a mut Diagram,
    pub selection: &'a mut Selection,
    pub cfg: &'a EditorConfig,
    pub graph_id: GraphId,
    /// Current info boxes; empty when node info is hidden.
    pub info_boxes: &'a [InfoBoxLayout],
}

/// Follow-up work for the editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    pub redraw: bool,
    /// Push one history snapshot.
    pub snapshot: bool,
    /// Nodes whose position changed.
    pub moved_nodes: Vec<NodeId>,
    /// Edges whose stored fields (bend points, target) changed.
    pub changed_edges: Vec<EdgeId>,
    pub created_edge: Option<EdgeId>,
    /// Client-space pan delta.
    pub pan: Option<(f64, f64)>,
    pub persist_viewport: bool,
    pub toggle_info: Option<NodeId>,
}

impl Effects {
    fn redraw() -> Self {
        Self {
            redraw: true,
            ..Self::default()
        }
    }
}

/// The mode plus the little memory the modes need between events.
#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    mode: Interaction,
    /// Last bend point hit and when, for double-hit deletion.
    last_bend_hit: Option<(BendRef, f64)>,
    /// Edge whose bend point the latest press deleted. The browser follows
    /// that press with a `dblclick`, which must not insert a new one.
    bend_deleted: Option<EdgeId>,
}

impl InteractionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &Interaction {
        &self.mode
    }

    pub fn is_idle(&self) -> bool {
        self.mode == Interaction::Idle
    }

    /// Drop any gesture in progress.
    pub fn reset(&mut self) {
        self.mode = Interaction::Idle;
        self.last_bend_hit = None;
        self.bend_deleted = None;
    }

    /// Escape: leaves edge creation. Returns `false` in any other mode.
    pub fn cancel_edge_creation(&mut self) -> bool {
        if matches!(self.mode, Interaction::EdgeCreating { .. }) {
            log::debug!("edge creation cancelled");
            self.mode = Interaction::Idle;
            return true;
        }
        false
    }

    /// Enter edge creation from `source`.
    pub fn start_edge(&mut self, source: NodeId, cursor: Point) {
        log::debug!("edge creation from {source}");
        self.mode = Interaction::EdgeCreating { source, cursor };
    }

    pub fn temp_edge(&self) -> Option<TempEdge> {
        match self.mode {
            Interaction::EdgeCreating { source, cursor } => Some(TempEdge::RubberBand { source, cursor }),
            Interaction::DraggingEdge {
                edge,
                cursor,
                candidate,
            } => Some(TempEdge::Reconnect {
                edge,
                cursor,
                candidate,
            }),
            _ => None,
        }
    }

    pub fn marquee(&self) -> Option<Rect> {
        match self.mode {
            Interaction::MarqueeSelecting { start, end } => Some(Rect::from_corners(start, end)),
            _ => None,
        }
    }

    pub fn rename_node(&mut self, from: NodeId, to: NodeId) {
        let swap = |id: &mut NodeId| {
            if *id == from {
                *id = to;
            }
        };
        match &mut self.mode {
            Interaction::EdgeCreating { source, .. } => swap(source),
            Interaction::DraggingNode { node, .. } => swap(node),
            Interaction::DraggingSelectedNodes { nodes, .. } => nodes.iter_mut().for_each(|(id, _)| swap(id)),
            Interaction::DraggingEdge { candidate, .. } => candidate.iter_mut().for_each(swap),
            _ => {}
        }
    }

    pub fn rename_edge(&mut self, from: EdgeId, to: EdgeId) {
        let swap = |r: &mut BendRef| {
            if r.edge == from {
                r.edge = to;
            }
        };
        match &mut self.mode {
            Interaction::DraggingEdge { edge, .. } if *edge == from => *edge = to,
            Interaction::DraggingBendPoint { bend, .. } => swap(bend),
            Interaction::DraggingSelectedNodes { bend_points, .. } => {
                bend_points.iter_mut().for_each(|(r, _)| swap(r))
            }
            _ => {}
        }
        if let Some((r, _)) = &mut self.last_bend_hit {
            swap(r);
        }
        if self.bend_deleted == Some(from) {
            self.bend_deleted = Some(to);
        }
    }

    // ─── Pointer down ────────────────────────────────────────────────────

    /// Route a press at logical `p`. First match wins.
    pub fn pointer_down(
        &mut self,
        cx: &mut Canvas<'_>,
        p: Point,
        client: Point,
        modifiers: Modifiers,
        time_ms: f64,
    ) -> Effects {
        self.bend_deleted = None;

        // Info box toggle sits above everything else.
        if let Some(node) = toggle_at(cx.info_boxes, p) {
            return Effects {
                toggle_info: Some(node),
                ..Effects::redraw()
            };
        }

        // Edge creation stays active. Pressing another node aims the rubber
        // band at it; the release decides between commit and cancel.
        if let Interaction::EdgeCreating { source, .. } = self.mode {
            let cursor = node_at_except(cx.diagram, p, &[source])
                .and_then(|id| cx.diagram.node(id))
                .map_or(p, |n| n.center());
            self.mode = Interaction::EdgeCreating { source, cursor };
            return Effects::redraw();
        }

        // Bend point of the selected edge.
        if let Selection::Edge { edge, .. } = *cx.selection
            && let Some(index) = cx
                .diagram
                .edge(edge)
                .and_then(|e| point_on_bend_point(e, p, cx.cfg.hit.bend_tolerance))
        {
            let bend = BendRef { edge, index };
            let double = self
                .last_bend_hit
                .is_some_and(|(r, t)| r == bend && time_ms - t <= cx.cfg.double_click_ms);
            if double {
                self.last_bend_hit = None;
                self.bend_deleted = Some(edge);
                return remove_bend_point(cx, bend);
            }
            self.last_bend_hit = Some((bend, time_ms));
            *cx.selection = Selection::Edge {
                edge,
                bend: Some(index),
            };
            let at = cx.diagram.bend_point(bend).unwrap_or(p);
            self.mode = Interaction::DraggingBendPoint {
                bend,
                grab: p - at,
                moved: false,
            };
            log::debug!("dragging bend point {} of {edge}", index);
            return Effects::redraw();
        }
        self.last_bend_hit = None;

        if let Some(edge) = edge_at(cx.diagram, p, &cx.cfg.hit) {
            *cx.selection = Selection::Edge { edge, bend: None };
            self.mode = Interaction::DraggingEdge {
                edge,
                cursor: p,
                candidate: None,
            };
            log::debug!("dragging {edge}");
            return Effects::redraw();
        }

        if let Some(node) = node_at(cx.diagram, p) {
            if cx.selection.in_group(node) {
                let Selection::Group {
                    nodes, bend_points, ..
                } = &*cx.selection
                else {
                    return Effects::default();
                };
                let d = &*cx.diagram;
                self.mode = Interaction::DraggingSelectedNodes {
                    start: p,
                    nodes: nodes
                        .iter()
                        .filter_map(|id| d.node(*id).map(|n| (*id, n.center())))
                        .collect(),
                    bend_points: bend_points
                        .iter()
                        .filter_map(|r| d.bend_point(*r).map(|at| (*r, at)))
                        .collect(),
                    moved: false,
                };
                log::debug!("dragging group");
                return Effects::redraw();
            }

            let center = cx.diagram.node(node).map(|n| n.center()).unwrap_or(p);
            *cx.selection = Selection::Node(node);
            self.mode = Interaction::DraggingNode {
                node,
                grab: p - center,
                moved: false,
            };
            log::debug!("dragging {node}");
            return Effects::redraw();
        }

        if modifiers.command() {
            self.mode = Interaction::Panning { last: client };
            log::debug!("panning");
            Effects::default()
        } else {
            self.mode = Interaction::MarqueeSelecting { start: p, end: p };
            Effects::redraw()
        }
    }

    // ─── Pointer move ────────────────────────────────────────────────────

    pub fn pointer_move(&mut self, cx: &mut Canvas<'_>, p: Point, client: Point) -> Effects {
        match &mut self.mode {
            Interaction::Idle => Effects::default(),

            Interaction::EdgeCreating { cursor, .. } => {
                *cursor = p;
                Effects::redraw()
            }

            Interaction::DraggingNode { node, grab, moved } => {
                if let Some(n) = cx.diagram.node_mut(*node) {
                    let to = p - *grab;
                    if to != n.center() {
                        n.set_center(to);
                        *moved = true;
                    }
                }
                Effects::redraw()
            }

            Interaction::DraggingSelectedNodes {
                start,
                nodes,
                bend_points,
                moved,
            } => {
                let delta = p - *start;
                for (id, origin) in nodes.iter() {
                    if let Some(n) = cx.diagram.node_mut(*id) {
                        n.set_center(*origin + delta);
                    }
                }
                for (r, origin) in bend_points.iter() {
                    if let Some(b) = cx.diagram.bend_point_mut(*r) {
                        *b = *origin + delta;
                    }
                }
                *moved = delta != Point::ORIGIN;
                Effects::redraw()
            }

            Interaction::DraggingEdge {
                edge,
                cursor,
                candidate,
            } => {
                *cursor = p;
                *candidate = cx
                    .diagram
                    .edge(*edge)
                    .and_then(|e| node_at_except(cx.diagram, p, &[e.source_id, e.target_id]));
                Effects::redraw()
            }

            Interaction::DraggingBendPoint { bend, grab, moved } => {
                if let Some(b) = cx.diagram.bend_point_mut(*bend) {
                    *b = p - *grab;
                    *moved = true;
                }
                Effects::redraw()
            }

            Interaction::MarqueeSelecting { end, .. } => {
                *end = p;
                Effects::redraw()
            }

            Interaction::Panning { last } => {
                let (dx, dy) = (client.x - last.x, client.y - last.y);
                *last = client;
                Effects {
                    pan: Some((dx, dy)),
                    ..Effects::redraw()
                }
            }
        }
    }

    // ─── Pointer up ──────────────────────────────────────────────────────

    pub fn pointer_up(&mut self, cx: &mut Canvas<'_>, p: Point) -> Effects {
        let mode = std::mem::take(&mut self.mode);
        match mode {
            Interaction::Idle => Effects::default(),

            Interaction::EdgeCreating { source, cursor } => match node_at(cx.diagram, p) {
                Some(target) if target != source => commit_edge(cx, source, target),
                Some(_) => {
                    // Released on the source itself: keep waiting.
                    self.mode = Interaction::EdgeCreating { source, cursor };
                    Effects::default()
                }
                None => {
                    log::debug!("edge creation cancelled on empty release");
                    Effects::redraw()
                }
            },

            Interaction::DraggingNode { node, moved, .. } => {
                if !moved {
                    return Effects::redraw();
                }
                log::info!("moved {node}");
                Effects {
                    snapshot: true,
                    moved_nodes: vec![node],
                    ..Effects::redraw()
                }
            }

            Interaction::DraggingSelectedNodes {
                nodes,
                bend_points,
                moved,
                ..
            } => {
                if !moved {
                    return Effects::redraw();
                }
                let mut changed_edges: Vec<EdgeId> = bend_points.iter().map(|(r, _)| r.edge).collect();
                changed_edges.sort();
                changed_edges.dedup();
                log::info!("moved {} node(s), {} bend point(s)", nodes.len(), bend_points.len());
                Effects {
                    snapshot: true,
                    moved_nodes: nodes.into_iter().map(|(id, _)| id).collect(),
                    changed_edges,
                    ..Effects::redraw()
                }
            }

            Interaction::DraggingEdge { edge, candidate, .. } => {
                let Some(target) = candidate else {
                    return Effects::redraw();
                };
                let Some(e) = cx.diagram.edge_mut(edge) else {
                    return Effects::redraw();
                };
                e.target_id = target;
                log::info!("reconnected {edge} to {target}");
                Effects {
                    snapshot: true,
                    changed_edges: vec![edge],
                    ..Effects::redraw()
                }
            }

            Interaction::DraggingBendPoint { bend, moved, .. } => {
                if !moved {
                    return Effects::redraw();
                }
                Effects {
                    snapshot: true,
                    changed_edges: vec![bend.edge],
                    ..Effects::redraw()
                }
            }

            Interaction::MarqueeSelecting { start, end } => {
                let rect = Rect::from_corners(start, end);
                *cx.selection = Selection::group(
                    nodes_in_rect(cx.diagram, rect),
                    bend_points_in_rect(cx.diagram, rect),
                );
                Effects::redraw()
            }

            Interaction::Panning { .. } => Effects {
                persist_viewport: true,
                ..Effects::default()
            },
        }
    }

    // ─── Double click ────────────────────────────────────────────────────

    /// On a node: start an edge from it. On an edge: insert a bend point
    /// on the nearest segment, unless the press just before it deleted a
    /// bend point of that edge.
    pub fn double_click(&mut self, cx: &mut Canvas<'_>, p: Point) -> Effects {
        let bend_deleted = self.bend_deleted.take();
        if let Some(node) = node_at(cx.diagram, p) {
            *cx.selection = Selection::Node(node);
            self.start_edge(node, p);
            return Effects::redraw();
        }

        let Some(edge) = edge_at(cx.diagram, p, &cx.cfg.hit) else {
            return Effects::default();
        };
        if bend_deleted == Some(edge) {
            log::debug!("dblclick after bend point deletion on {edge} ignored");
            return Effects::default();
        }
        let index = match cx.diagram.edge(edge) {
            Some(e) => bend_insertion_index(cx.diagram, e, p, cx.cfg.hit.edge_spacing),
            None => return Effects::default(),
        };
        let Some(e) = cx.diagram.edge_mut(edge) else {
            return Effects::default();
        };
        e.bend_points.insert(index, p);
        *cx.selection = Selection::Edge {
            edge,
            bend: Some(index),
        };
        self.mode = Interaction::Idle;
        log::info!("bend point {index} added to {edge}");
        Effects {
            snapshot: true,
            changed_edges: vec![edge],
            ..Effects::redraw()
        }
    }
}

fn commit_edge(cx: &mut Canvas<'_>, source: NodeId, target: NodeId) -> Effects {
    if let Some(existing) = cx.diagram.find_edge(source, target) {
        log::info!("{source} → {target} already exists as {}", existing.id);
        *cx.selection = Selection::Edge {
            edge: existing.id,
            bend: None,
        };
        return Effects::redraw();
    }
    let edge = Edge::new(cx.graph_id, source, target);
    match cx.diagram.add_edge(edge) {
        Ok(id) => {
            log::info!("created {id}: {source} → {target}");
            *cx.selection = Selection::Edge { edge: id, bend: None };
            Effects {
                snapshot: true,
                created_edge: Some(id),
                ..Effects::redraw()
            }
        }
        Err(err) => {
            log::warn!("edge not created: {err}");
            Effects::redraw()
        }
    }
}

fn remove_bend_point(cx: &mut Canvas<'_>, bend: BendRef) -> Effects {
    let Some(e) = cx.diagram.edge_mut(bend.edge) else {
        return Effects::default();
    };
    if bend.index >= e.bend_points.len() {
        return Effects::default();
    }
    e.bend_points.remove(bend.index);
    *cx.selection = Selection::Edge {
        edge: bend.edge,
        bend: None,
    };
    log::info!("bend point {} removed from {}", bend.index, bend.edge);
    Effects {
        snapshot: true,
        changed_edges: vec![bend.edge],
        ..Effects::redraw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rel_core::{GraphId, Node, NodeType};

    fn diagram() -> Diagram {
        let mut a = Node::new(GraphId(1), "a", NodeType::Concept, Point::new(0.0, 0.0));
        a.id = NodeId(1);
        let mut b = Node::new(GraphId(1), "b", NodeType::Concept, Point::new(300.0, 0.0));
        b.id = NodeId(2);
        Diagram::from_parts(vec![a, b], vec![])
    }

    #[test]
    fn pressing_another_node_aims_the_rubber_band() {
        let mut d = diagram();
        let mut sel = Selection::None;
        let cfg = EditorConfig::default();
        let mut cx = Canvas {
            diagram: &mut d,
            selection: &mut sel,
            cfg: &cfg,
            graph_id: GraphId(1),
            info_boxes: &[],
        };
        let mut state = InteractionState::new();
        state.start_edge(NodeId(1), Point::ORIGIN);
        state.pointer_down(&mut cx, Point::new(310.0, 5.0), Point::ORIGIN, Modifiers::NONE, 0.0);
        assert_eq!(
            state.temp_edge(),
            Some(TempEdge::RubberBand {
                source: NodeId(1),
                cursor: Point::new(300.0, 0.0),
            })
        );
    }

    #[test]
    fn marquee_rect_is_normalized() {
        let mut d = diagram();
        let mut sel = Selection::None;
        let cfg = EditorConfig::default();
        let mut cx = Canvas {
            diagram: &mut d,
            selection: &mut sel,
            cfg: &cfg,
            graph_id: GraphId(1),
            info_boxes: &[],
        };
        let mut state = InteractionState::new();
        state.pointer_down(&mut cx, Point::new(200.0, 200.0), Point::ORIGIN, Modifiers::NONE, 0.0);
        state.pointer_move(&mut cx, Point::new(150.0, 120.0), Point::ORIGIN);
        assert_eq!(state.marquee(), Some(Rect::new(150.0, 120.0, 50.0, 80.0)));
    }

    #[test]
    fn rename_reaches_the_active_gesture() {
        let mut state = InteractionState::new();
        state.start_edge(NodeId(-4), Point::ORIGIN);
        state.rename_node(NodeId(-4), NodeId(12));
        assert!(matches!(
            state.mode(),
            Interaction::EdgeCreating { source: NodeId(12), .. }
        ));
    }
}
