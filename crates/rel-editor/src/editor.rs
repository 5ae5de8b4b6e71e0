//! The editor state owner.
//!
//! [`Editor`] holds every piece of canvas state (diagram, graph record,
//! viewport, selection, interaction mode, history, persistence queue) and
//! changes it only through [`Editor::update`]. Each message returns an
//! [`Outcome`] telling the host whether to schedule a frame and what to
//! show the user; persistence requests are pulled with
//! [`Editor::drain_requests`].

use crate::error::{ApiError, EditorError};
use crate::history::History;
use crate::input::{InputEvent, Modifiers};
use crate::interaction::{Canvas, Effects, InteractionState};
use crate::selection::Selection;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::sync::{ApiRequest, Change, Completion, NodePatch, PersistOp, PersistQueue, diff};
use rel_core::{
    BendRef, CanvasSize, Color, Diagram, Edge, EdgeId, EditorConfig, GraphId, GraphRecord, Node, NodeId, NodeType,
    Point, Rect, Task, TaskId, Viewport, apply_positions, beautify,
};
use rel_render::{
    ApproxMeasure, DrawCmd, InfoBoxLayout, RenderState, SceneTheme, TextMeasure, build_display_list, info_boxes,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

// ─── Messages ────────────────────────────────────────────────────────────

/// Node property panel contents. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeForm {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<NodeType>,
    pub color: Option<Color>,
    pub owner: Option<String>,
    pub task_list_name: Option<String>,
    pub notepad: Option<String>,
}

/// Edge property panel contents. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeForm {
    pub label: Option<String>,
    pub color: Option<Color>,
    pub tasks: Option<Vec<Task>>,
}

/// Everything that can happen to the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Input(InputEvent),
    /// Replace the whole document with freshly fetched data.
    Load {
        graph: GraphRecord,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    },
    CreateNode {
        name: String,
        node_type: NodeType,
        /// Logical position; the canvas center when absent.
        at: Option<Point>,
        color: Option<Color>,
    },
    UpdateNode {
        id: NodeId,
        form: NodeForm,
    },
    SetNodeImage {
        id: NodeId,
        image: Option<String>,
    },
    AddTask {
        node: NodeId,
        title: String,
    },
    ToggleTask {
        node: NodeId,
        task: TaskId,
    },
    RemoveTask {
        node: NodeId,
        task: TaskId,
    },
    UpdateEdge {
        id: EdgeId,
        form: EdgeForm,
    },
    Beautify,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    SetZoom(f64),
    Undo,
    Redo,
    /// Ask to delete the selection. Bend points go immediately; anything
    /// else returns a confirmation prompt.
    RequestDelete,
    ConfirmDelete,
    CancelDelete,
    SelectAll,
    ClearSelection,
    ToggleInfoBox(NodeId),
    SetBackground(Option<String>),
    ShowNodeInfo(bool),
    /// A modal dialog opened or closed; undo/redo are ignored while open.
    SetModal(bool),
    /// Client-space rectangles of panels over the canvas; the wheel does
    /// not zoom over them.
    SetReservedRegions(Vec<Rect>),
    PersistResult {
        request_id: u64,
        result: Result<Value, ApiError>,
    },
}

/// What the host should do after a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Schedule a frame.
    pub redraw: bool,
    /// Show this prompt and answer with `ConfirmDelete` or `CancelDelete`.
    pub confirm: Option<String>,
    /// One-line status for the status bar.
    pub status: Option<String>,
}

impl Outcome {
    fn redraw() -> Self {
        Self {
            redraw: true,
            ..Self::default()
        }
    }

    fn status(message: impl Into<String>) -> Self {
        Self {
            status: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum DeleteTarget {
    Node(NodeId),
    Edge(EdgeId),
    Group {
        nodes: Vec<NodeId>,
        bend_points: Vec<BendRef>,
    },
}

// ─── Editor ──────────────────────────────────────────────────────────────

pub struct Editor {
    cfg: EditorConfig,
    diagram: Diagram,
    record: GraphRecord,
    viewport: Viewport,
    selection: Selection,
    interaction: InteractionState,
    history: History,
    queue: PersistQueue,
    expanded: HashSet<NodeId>,
    reserved: Vec<Rect>,
    modal_open: bool,
    pending_delete: Option<DeleteTarget>,
    measure: Box<dyn TextMeasure>,
    /// Latest event time seen, stamped on history entries.
    clock_ms: f64,
}

impl Editor {
    /// A config that fails [`EditorConfig::validate`] is replaced by the
    /// defaults, since its ranges feed `clamp` calls downstream.
    pub fn new(cfg: EditorConfig, measure: Box<dyn TextMeasure>) -> Self {
        let cfg = match cfg.validate() {
            Ok(()) => cfg,
            Err(e) => {
                log::warn!("{e}; using default config");
                EditorConfig::default()
            }
        };
        let record = GraphRecord::new(GraphId(0));
        let mut history = History::new(cfg.history_cap);
        history.reset(&Diagram::new(), 0.0);
        Self {
            viewport: Viewport::new(cfg.zoom),
            cfg,
            diagram: Diagram::new(),
            record,
            selection: Selection::None,
            interaction: InteractionState::new(),
            history,
            queue: PersistQueue::new(),
            expanded: HashSet::new(),
            reserved: Vec::new(),
            modal_open: false,
            pending_delete: None,
            measure,
            clock_ms: 0.0,
        }
    }

    /// An editor with approximate text metrics, for tests and tools.
    pub fn headless(cfg: EditorConfig) -> Self {
        Self::new(cfg, Box::new(ApproxMeasure))
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn record(&self) -> &GraphRecord {
        &self.record
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn queue(&self) -> &PersistQueue {
        &self.queue
    }

    pub fn config(&self) -> &EditorConfig {
        &self.cfg
    }

    pub fn canvas_size(&self) -> CanvasSize {
        CanvasSize {
            width: f64::from(self.record.canvas_width),
            height: f64::from(self.record.canvas_height),
        }
    }

    /// Info box layouts as currently drawn; empty when node info is hidden.
    pub fn info_boxes(&self) -> Vec<InfoBoxLayout> {
        if !self.record.show_node_info {
            return Vec::new();
        }
        info_boxes(&self.diagram, &self.expanded, &self.cfg.info_box, self.measure.as_ref())
    }

    /// Ready persistence requests, for the host to send.
    pub fn drain_requests(&mut self) -> Vec<ApiRequest> {
        self.queue.drain(&self.diagram, &self.record)
    }

    /// The display list for the current state.
    pub fn display_list(&self, theme: &SceneTheme) -> Vec<DrawCmd> {
        let boxes = self.info_boxes();
        let highlights = self.selection.highlights();
        build_display_list(&RenderState {
            diagram: &self.diagram,
            canvas: self.canvas_size(),
            background: self.record.background_image.as_deref(),
            hit: &self.cfg.hit,
            theme,
            highlights: &highlights,
            temp_edge: self.interaction.temp_edge(),
            marquee: self.interaction.marquee(),
            info_boxes: &boxes,
        })
    }

    // ─── Update ──────────────────────────────────────────────────────────

    pub fn update(&mut self, msg: Message) -> Result<Outcome, EditorError> {
        match msg {
            Message::Input(event) => Ok(self.handle_input(event)),
            Message::Load { graph, nodes, edges } => Ok(self.load(graph, nodes, edges)),
            Message::CreateNode {
                name,
                node_type,
                at,
                color,
            } => self.create_node(name, node_type, at, color),
            Message::UpdateNode { id, form } => self.update_node(id, form),
            Message::SetNodeImage { id, image } => {
                let node = self.diagram.node_mut(id).ok_or(EditorError::UnknownNode(id))?;
                node.image = image;
                self.queue.enqueue(PersistOp::SaveNodeImage(id));
                self.commit();
                Ok(Outcome::redraw())
            }
            Message::AddTask { node, title } => self.add_task(node, title),
            Message::ToggleTask { node, task } => {
                let t = self.task_mut(node, task)?;
                t.done = !t.done;
                self.queue.enqueue(PersistOp::UpdateTask { node, task });
                self.commit();
                Ok(Outcome::redraw())
            }
            Message::RemoveTask { node, task } => {
                let n = self.diagram.node_mut(node).ok_or(EditorError::UnknownNode(node))?;
                let before = n.tasks.len();
                n.tasks.retain(|t| t.id != Some(task));
                if n.tasks.len() == before {
                    return Err(EditorError::UnknownTask(task));
                }
                self.queue.enqueue(PersistOp::DeleteTask(task));
                self.commit();
                Ok(Outcome::redraw())
            }
            Message::UpdateEdge { id, form } => self.update_edge(id, form),
            Message::Beautify => Ok(self.beautify()),
            Message::ZoomIn => Ok(self.zoom_with(Viewport::zoom_in)),
            Message::ZoomOut => Ok(self.zoom_with(Viewport::zoom_out)),
            Message::ZoomReset => Ok(self.zoom_with(Viewport::reset)),
            Message::SetZoom(level) => Ok(self.zoom_with(|vp| vp.set_zoom(level))),
            Message::Undo => Ok(self.restore(false)),
            Message::Redo => Ok(self.restore(true)),
            Message::RequestDelete => Ok(self.request_delete()),
            Message::ConfirmDelete => Ok(self.confirm_delete()),
            Message::CancelDelete => {
                self.pending_delete = None;
                Ok(Outcome::default())
            }
            Message::SelectAll => {
                let nodes = self.diagram.nodes.iter().map(|n| n.id).collect();
                self.selection = Selection::group(nodes, Vec::new());
                Ok(Outcome::redraw())
            }
            Message::ClearSelection => {
                self.selection = Selection::None;
                Ok(Outcome::redraw())
            }
            Message::ToggleInfoBox(id) => {
                self.toggle_info_box(id);
                Ok(Outcome::redraw())
            }
            Message::SetBackground(image) => {
                self.record.background_image = image;
                self.queue.enqueue(PersistOp::SaveViewport);
                Ok(Outcome::redraw())
            }
            Message::ShowNodeInfo(show) => {
                self.record.show_node_info = show;
                self.queue.enqueue(PersistOp::SaveViewport);
                Ok(Outcome::redraw())
            }
            Message::SetModal(open) => {
                self.modal_open = open;
                Ok(Outcome::default())
            }
            Message::SetReservedRegions(regions) => {
                self.reserved = regions;
                Ok(Outcome::default())
            }
            Message::PersistResult { request_id, result } => Ok(self.persist_result(request_id, result)),
        }
    }

    fn load(&mut self, graph: GraphRecord, nodes: Vec<Node>, edges: Vec<Edge>) -> Outcome {
        let mut diagram = Diagram::from_parts(nodes, edges);
        diagram.prune_dangling_edges();
        log::info!(
            "loaded {}: {} node(s), {} edge(s)",
            graph.id,
            diagram.nodes.len(),
            diagram.edges.len()
        );
        self.viewport = Viewport::from_record(&graph, self.cfg.zoom);
        self.record = graph;
        self.diagram = diagram;
        self.history.reset(&self.diagram, self.clock_ms);
        self.selection = Selection::None;
        self.interaction.reset();
        self.queue.clear();
        self.expanded.clear();
        self.pending_delete = None;
        Outcome::redraw()
    }

    /// Record the current diagram as one history step.
    fn commit(&mut self) {
        self.history.push(&self.diagram, self.clock_ms);
    }

    // ─── Input ───────────────────────────────────────────────────────────

    fn handle_input(&mut self, event: InputEvent) -> Outcome {
        match event {
            InputEvent::PointerDown {
                client,
                origin,
                modifiers,
                time_ms,
            } => {
                self.clock_ms = time_ms;
                let p = self.viewport.to_logical(client, origin);
                let boxes = self.info_boxes();
                let mut cx = Canvas {
                    diagram: &mut self.diagram,
                    selection: &mut self.selection,
                    cfg: &self.cfg,
                    graph_id: self.record.id,
                    info_boxes: &boxes,
                };
                let fx = self.interaction.pointer_down(&mut cx, p, client, modifiers, time_ms);
                self.apply(fx)
            }
            InputEvent::PointerMove { client, origin } => {
                if self.interaction.is_idle() {
                    return Outcome::default();
                }
                let p = self.viewport.to_logical(client, origin);
                let mut cx = Canvas {
                    diagram: &mut self.diagram,
                    selection: &mut self.selection,
                    cfg: &self.cfg,
                    graph_id: self.record.id,
                    info_boxes: &[],
                };
                let fx = self.interaction.pointer_move(&mut cx, p, client);
                self.apply(fx)
            }
            InputEvent::PointerUp { client, origin } => {
                let p = self.viewport.to_logical(client, origin);
                let mut cx = Canvas {
                    diagram: &mut self.diagram,
                    selection: &mut self.selection,
                    cfg: &self.cfg,
                    graph_id: self.record.id,
                    info_boxes: &[],
                };
                let fx = self.interaction.pointer_up(&mut cx, p);
                self.apply(fx)
            }
            InputEvent::DoubleClick { client, origin } => {
                let p = self.viewport.to_logical(client, origin);
                let mut cx = Canvas {
                    diagram: &mut self.diagram,
                    selection: &mut self.selection,
                    cfg: &self.cfg,
                    graph_id: self.record.id,
                    info_boxes: &[],
                };
                let fx = self.interaction.double_click(&mut cx, p);
                self.apply(fx)
            }
            InputEvent::Wheel { client, delta_y } => {
                if self.viewport.wheel(delta_y, client, &self.reserved) {
                    self.save_viewport();
                    return Outcome::redraw();
                }
                Outcome::default()
            }
            InputEvent::Key { key, modifiers } => self.handle_key(&key, modifiers),
        }
    }

    fn handle_key(&mut self, key: &str, m: Modifiers) -> Outcome {
        let Some(action) = ShortcutMap::resolve(key, m.ctrl, m.shift, m.alt, m.meta) else {
            return Outcome::default();
        };
        log::debug!("shortcut {action:?}");
        match action {
            ShortcutAction::Undo => self.restore(false),
            ShortcutAction::Redo => self.restore(true),
            ShortcutAction::Delete if self.modal_open => Outcome::default(),
            ShortcutAction::Delete => self.request_delete(),
            ShortcutAction::SelectAll => {
                let nodes = self.diagram.nodes.iter().map(|n| n.id).collect();
                self.selection = Selection::group(nodes, Vec::new());
                Outcome::redraw()
            }
            ShortcutAction::ZoomIn => self.zoom_with(Viewport::zoom_in),
            ShortcutAction::ZoomOut => self.zoom_with(Viewport::zoom_out),
            ShortcutAction::ZoomReset => self.zoom_with(Viewport::reset),
            ShortcutAction::Cancel => {
                if self.interaction.cancel_edge_creation() {
                    Outcome::redraw()
                } else if self.pending_delete.take().is_some() {
                    Outcome::default()
                } else if !self.selection.is_empty() {
                    self.selection = Selection::None;
                    Outcome::redraw()
                } else {
                    Outcome::default()
                }
            }
        }
    }

    /// Carry out what the interaction machine asked for.
    fn apply(&mut self, fx: Effects) -> Outcome {
        if let Some(node) = fx.toggle_info {
            self.toggle_info_box(node);
        }
        if let Some((dx, dy)) = fx.pan {
            self.viewport.pan(dx, dy);
        }
        if fx.persist_viewport {
            self.save_viewport();
        }
        for id in &fx.moved_nodes {
            self.queue.enqueue(PersistOp::UpdateNode {
                id: *id,
                patch: NodePatch::Position,
            });
        }
        for id in &fx.changed_edges {
            self.queue.enqueue(PersistOp::UpdateEdge(*id));
        }
        if let Some(id) = fx.created_edge {
            self.queue.enqueue(PersistOp::CreateEdge(id));
        }
        if fx.snapshot {
            self.commit();
        }
        Outcome {
            redraw: fx.redraw || fx.pan.is_some(),
            ..Outcome::default()
        }
    }

    fn toggle_info_box(&mut self, id: NodeId) {
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
    }

    fn save_viewport(&mut self) {
        self.viewport.write_to(&mut self.record);
        self.queue.enqueue(PersistOp::SaveViewport);
    }

    fn zoom_with(&mut self, f: impl FnOnce(&mut Viewport) -> bool) -> Outcome {
        if !f(&mut self.viewport) {
            return Outcome::default();
        }
        log::debug!("zoom {:.2}", self.viewport.zoom());
        self.save_viewport();
        Outcome::redraw()
    }

    // ─── Forms ───────────────────────────────────────────────────────────

    fn create_node(
        &mut self,
        name: String,
        node_type: NodeType,
        at: Option<Point>,
        color: Option<Color>,
    ) -> Result<Outcome, EditorError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EditorError::EmptyName);
        }
        let at = at.unwrap_or_else(|| self.canvas_size().center());
        let mut node = Node::new(self.record.id, name, node_type, at);
        if let Some(color) = color {
            node.color = color;
        }
        let id = self.diagram.add_node(node);
        log::info!("created {id} {name:?}");
        self.queue.enqueue(PersistOp::CreateNode(id));
        self.selection = Selection::Node(id);
        self.commit();
        Ok(Outcome::redraw())
    }

    fn update_node(&mut self, id: NodeId, form: NodeForm) -> Result<Outcome, EditorError> {
        if form.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(EditorError::EmptyName);
        }
        let node = self.diagram.node_mut(id).ok_or(EditorError::UnknownNode(id))?;
        if let Some(name) = form.name {
            node.name = name.trim().to_string();
        }
        if let Some(t) = form.node_type {
            node.node_type = t;
        }
        if let Some(c) = form.color {
            node.color = c;
        }
        if let Some(owner) = form.owner {
            node.owner = (!owner.is_empty()).then_some(owner);
        }
        if let Some(list) = form.task_list_name {
            node.task_list_name = (!list.is_empty()).then_some(list);
        }
        if let Some(notes) = form.notepad {
            node.notepad = (!notes.is_empty()).then_some(notes);
        }
        self.queue.enqueue(PersistOp::UpdateNode {
            id,
            patch: NodePatch::Full,
        });
        self.commit();
        Ok(Outcome::redraw())
    }

    fn add_task(&mut self, node: NodeId, title: String) -> Result<Outcome, EditorError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(EditorError::EmptyTaskTitle);
        }
        let n = self.diagram.node_mut(node).ok_or(EditorError::UnknownNode(node))?;
        let task = TaskId::pending();
        n.tasks.push(Task {
            id: Some(task),
            title: title.to_string(),
            done: false,
        });
        self.queue.enqueue(PersistOp::CreateTask { node, task });
        self.commit();
        Ok(Outcome::redraw())
    }

    fn task_mut(&mut self, node: NodeId, task: TaskId) -> Result<&mut Task, EditorError> {
        self.diagram
            .node_mut(node)
            .ok_or(EditorError::UnknownNode(node))?
            .tasks
            .iter_mut()
            .find(|t| t.id == Some(task))
            .ok_or(EditorError::UnknownTask(task))
    }

    fn update_edge(&mut self, id: EdgeId, form: EdgeForm) -> Result<Outcome, EditorError> {
        let edge = self.diagram.edge_mut(id).ok_or(EditorError::UnknownEdge(id))?;
        if let Some(label) = form.label {
            edge.label = label;
        }
        if let Some(color) = form.color {
            edge.color = color;
        }
        if let Some(tasks) = form.tasks {
            edge.tasks = tasks.into_iter().filter(|t| !t.title.trim().is_empty()).collect();
        }
        self.queue.enqueue(PersistOp::UpdateEdge(id));
        self.commit();
        Ok(Outcome::redraw())
    }

    fn beautify(&mut self) -> Outcome {
        let positions = beautify(&self.diagram, self.canvas_size(), &self.cfg.layout);
        let moved = apply_positions(&mut self.diagram, &positions);
        if moved.is_empty() {
            return Outcome::default();
        }
        log::info!("layout moved {} node(s)", moved.len());
        self.queue.extend(moved.iter().map(|id| PersistOp::UpdateNode {
            id: *id,
            patch: NodePatch::Position,
        }));
        self.commit();
        Outcome {
            redraw: true,
            status: Some(format!("Arranged {} nodes", moved.len())),
            ..Outcome::default()
        }
    }

    // ─── Delete ──────────────────────────────────────────────────────────

    fn request_delete(&mut self) -> Outcome {
        let target = match &self.selection {
            Selection::None => return Outcome::default(),
            Selection::Edge {
                edge,
                bend: Some(index),
            } => {
                let bend = BendRef {
                    edge: *edge,
                    index: *index,
                };
                return self.delete_bend_point(bend);
            }
            Selection::Edge { edge, bend: None } => DeleteTarget::Edge(*edge),
            Selection::Node(id) => DeleteTarget::Node(*id),
            Selection::Group {
                nodes, bend_points, ..
            } => DeleteTarget::Group {
                nodes: nodes.clone(),
                bend_points: bend_points.clone(),
            },
        };
        let prompt = self.delete_prompt(&target);
        self.pending_delete = Some(target);
        Outcome {
            confirm: Some(prompt),
            ..Outcome::default()
        }
    }

    fn delete_prompt(&self, target: &DeleteTarget) -> String {
        match target {
            DeleteTarget::Node(id) => {
                let name = self.diagram.node(*id).map(|n| n.name.as_str()).unwrap_or("this node");
                let links = self.diagram.incident_edges(*id).count();
                match links {
                    0 => format!("Delete \"{name}\"?"),
                    1 => format!("Delete \"{name}\" and its 1 connection?"),
                    n => format!("Delete \"{name}\" and its {n} connections?"),
                }
            }
            DeleteTarget::Edge(_) => "Delete this connection?".to_string(),
            DeleteTarget::Group { nodes, bend_points } => match (nodes.len(), bend_points.len()) {
                (n, 0) => format!("Delete {n} selected nodes?"),
                (0, b) => format!("Delete {b} selected bend points?"),
                (n, b) => format!("Delete {n} selected nodes and {b} bend points?"),
            },
        }
    }

    fn delete_bend_point(&mut self, bend: BendRef) -> Outcome {
        let Some(edge) = self.diagram.edge_mut(bend.edge) else {
            return Outcome::default();
        };
        if bend.index >= edge.bend_points.len() {
            return Outcome::default();
        }
        edge.bend_points.remove(bend.index);
        self.selection = Selection::Edge {
            edge: bend.edge,
            bend: None,
        };
        self.queue.enqueue(PersistOp::UpdateEdge(bend.edge));
        self.commit();
        Outcome::redraw()
    }

    fn confirm_delete(&mut self) -> Outcome {
        let Some(target) = self.pending_delete.take() else {
            return Outcome::default();
        };
        match target {
            DeleteTarget::Node(id) => self.delete_node(id),
            DeleteTarget::Edge(id) => {
                if self.diagram.remove_edge(id).is_some() {
                    log::info!("deleted {id}");
                    self.queue.enqueue(PersistOp::DeleteEdge(id));
                }
            }
            DeleteTarget::Group {
                nodes,
                mut bend_points,
            } => {
                // Highest index first so earlier indices stay valid.
                bend_points.sort_by(|a, b| b.index.cmp(&a.index));
                let mut touched: Vec<EdgeId> = Vec::new();
                for r in bend_points {
                    if let Some(edge) = self.diagram.edge_mut(r.edge)
                        && r.index < edge.bend_points.len()
                    {
                        edge.bend_points.remove(r.index);
                        if !touched.contains(&r.edge) {
                            touched.push(r.edge);
                        }
                    }
                }
                for id in nodes {
                    self.delete_node(id);
                }
                for id in touched {
                    if self.diagram.edge(id).is_some() {
                        self.queue.enqueue(PersistOp::UpdateEdge(id));
                    }
                }
            }
        }
        self.selection = Selection::None;
        self.interaction.reset();
        self.commit();
        Outcome::redraw()
    }

    fn delete_node(&mut self, id: NodeId) {
        let Some((node, edges)) = self.diagram.remove_node(id) else {
            return;
        };
        log::info!("deleted {id} {:?} with {} edge(s)", node.name, edges.len());
        for edge in &edges {
            self.queue.enqueue(PersistOp::DeleteEdge(edge.id));
        }
        self.queue.enqueue(PersistOp::DeleteNode(id));
        self.expanded.remove(&id);
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    fn restore(&mut self, forward: bool) -> Outcome {
        if self.modal_open || self.pending_delete.is_some() {
            log::debug!("undo/redo ignored while a dialog is open");
            return Outcome::default();
        }
        let next = if forward { self.history.redo() } else { self.history.undo() };
        let Some(next) = next else {
            return Outcome::default();
        };
        let before = std::mem::replace(&mut self.diagram, next);
        self.selection = Selection::None;
        self.interaction.reset();
        self.reconcile(&before);
        self.history.finish_restore();
        log::info!("{}", if forward { "redo" } else { "undo" });
        Outcome::redraw()
    }

    /// Queue the writes that bring the server from `before` to the current
    /// diagram. Entities that come back after the server deleted them get
    /// fresh pending ids and are created again.
    fn reconcile(&mut self, before: &Diagram) {
        for change in diff(before, &self.diagram) {
            match change {
                Change::NodeAdded(id) => self.revive_node(id),
                Change::NodeRemoved(id) => self.queue.enqueue(PersistOp::DeleteNode(id)),
                Change::NodeMoved(id) => self.queue.enqueue(PersistOp::UpdateNode {
                    id,
                    patch: NodePatch::Position,
                }),
                Change::NodeChanged(id) => self.queue.enqueue(PersistOp::UpdateNode {
                    id,
                    patch: NodePatch::Full,
                }),
                Change::NodeImageChanged(id) => self.queue.enqueue(PersistOp::SaveNodeImage(id)),
                Change::EdgeAdded(id) => self.revive_edge(id),
                Change::EdgeRemoved(id) => self.queue.enqueue(PersistOp::DeleteEdge(id)),
                Change::EdgeChanged(id) => self.queue.enqueue(PersistOp::UpdateEdge(id)),
                Change::TaskAdded { task, .. } => self.revive_task(task),
                Change::TaskRemoved(task) => self.queue.enqueue(PersistOp::DeleteTask(task)),
                Change::TaskChanged { node, task } => {
                    // The owner may have been renamed by a revive above.
                    let node = self.diagram.task_owner(task).unwrap_or(node);
                    self.queue.enqueue(PersistOp::UpdateTask { node, task });
                }
            }
        }
    }

    fn revive_node(&mut self, id: NodeId) {
        let delete_queued = self.queue.queued().contains(&PersistOp::DeleteNode(id));
        let id = if id.is_pending() || delete_queued {
            id
        } else {
            let fresh = NodeId::pending();
            self.rename_node_everywhere(id, fresh);
            fresh
        };
        self.queue.enqueue(PersistOp::CreateNode(id));
        if delete_queued {
            return;
        }
        let tasks: Vec<TaskId> = self
            .diagram
            .node(id)
            .map(|n| n.tasks.iter().filter_map(|t| t.id).collect())
            .unwrap_or_default();
        for task in tasks {
            let task = if task.is_pending() {
                task
            } else {
                let fresh = TaskId::pending();
                self.rename_task_everywhere(task, fresh);
                fresh
            };
            self.queue.enqueue(PersistOp::CreateTask { node: id, task });
        }
    }

    fn revive_edge(&mut self, id: EdgeId) {
        let delete_queued = self.queue.queued().contains(&PersistOp::DeleteEdge(id));
        let id = if id.is_pending() || delete_queued {
            id
        } else {
            let fresh = EdgeId::pending();
            self.rename_edge_everywhere(id, fresh);
            fresh
        };
        self.queue.enqueue(PersistOp::CreateEdge(id));
    }

    fn revive_task(&mut self, task: TaskId) {
        let Some(node) = self.diagram.task_owner(task) else {
            return;
        };
        let delete_queued = self.queue.queued().contains(&PersistOp::DeleteTask(task));
        let task = if task.is_pending() || delete_queued {
            task
        } else {
            let fresh = TaskId::pending();
            self.rename_task_everywhere(task, fresh);
            fresh
        };
        self.queue.enqueue(PersistOp::CreateTask { node, task });
    }

    // ─── Persistence results ─────────────────────────────────────────────

    fn persist_result(&mut self, request_id: u64, result: Result<Value, ApiError>) -> Outcome {
        match self.queue.complete(request_id, result) {
            Completion::Done | Completion::Unknown => Outcome::default(),
            Completion::NodeCreated { pending, id } => {
                self.rename_node_everywhere(pending, id);
                Outcome::default()
            }
            Completion::EdgeCreated { pending, id } => {
                self.rename_edge_everywhere(pending, id);
                Outcome::default()
            }
            Completion::TaskCreated { pending, id } => {
                self.rename_task_everywhere(pending, id);
                Outcome::default()
            }
            Completion::Failed { message } => Outcome::status(message),
        }
    }

    fn rename_node_everywhere(&mut self, from: NodeId, to: NodeId) {
        log::debug!("{from} is now {to}");
        self.diagram.rename_node(from, to);
        self.history.rewrite_node_id(from, to);
        self.selection.rename_node(from, to);
        self.interaction.rename_node(from, to);
        self.queue.rename_node(from, to);
        if self.expanded.remove(&from) {
            self.expanded.insert(to);
        }
        if let Some(DeleteTarget::Node(id)) = &mut self.pending_delete
            && *id == from
        {
            *id = to;
        }
        if let Some(DeleteTarget::Group { nodes, .. }) = &mut self.pending_delete {
            nodes.iter_mut().filter(|id| **id == from).for_each(|id| *id = to);
        }
    }

    fn rename_edge_everywhere(&mut self, from: EdgeId, to: EdgeId) {
        log::debug!("{from} is now {to}");
        self.diagram.rename_edge(from, to);
        self.history.rewrite_edge_id(from, to);
        self.selection.rename_edge(from, to);
        self.interaction.rename_edge(from, to);
        self.queue.rename_edge(from, to);
        match &mut self.pending_delete {
            Some(DeleteTarget::Edge(id)) if *id == from => *id = to,
            Some(DeleteTarget::Group { bend_points, .. }) => bend_points
                .iter_mut()
                .filter(|r| r.edge == from)
                .for_each(|r| r.edge = to),
            _ => {}
        }
    }

    fn rename_task_everywhere(&mut self, from: TaskId, to: TaskId) {
        self.diagram.rename_task(from, to);
        self.history.rewrite_task_id(from, to);
        self.queue.rename_task(from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn editor() -> Editor {
        let mut ed = Editor::headless(EditorConfig::default());
        let mut a = Node::new(GraphId(1), "A", NodeType::Person, Point::new(100.0, 100.0));
        a.id = NodeId(1);
        let mut b = Node::new(GraphId(1), "B", NodeType::Event, Point::new(400.0, 100.0));
        b.id = NodeId(2);
        ed.update(Message::Load {
            graph: GraphRecord::new(GraphId(1)),
            nodes: vec![a, b],
            edges: vec![],
        })
        .unwrap();
        ed
    }

    #[test]
    fn inverted_zoom_limits_fall_back_to_defaults() {
        let mut cfg = EditorConfig::default();
        cfg.zoom.max = 0.2;
        let mut ed = Editor::headless(cfg);
        ed.update(Message::ZoomIn).unwrap();
        assert_eq!(ed.config().zoom, EditorConfig::default().zoom);
        assert!(ed.viewport().zoom() > 1.0);
    }

    #[test]
    fn empty_name_is_rejected_before_anything_changes() {
        let mut ed = editor();
        let err = ed
            .update(Message::CreateNode {
                name: "   ".into(),
                node_type: NodeType::Concept,
                at: None,
                color: None,
            })
            .unwrap_err();
        assert_eq!(err, EditorError::EmptyName);
        assert_eq!(ed.diagram().nodes.len(), 2);
        assert!(ed.queue().is_idle());
    }

    #[test]
    fn created_node_lands_at_canvas_center_with_pending_id() {
        let mut ed = editor();
        ed.update(Message::CreateNode {
            name: "C".into(),
            node_type: NodeType::Concept,
            at: None,
            color: None,
        })
        .unwrap();
        let c = ed.diagram().nodes.last().unwrap();
        assert!(c.id.is_pending());
        assert_eq!(c.center(), Point::new(1000.0, 750.0));
        assert_eq!(ed.selection(), &Selection::Node(c.id));
    }

    #[test]
    fn node_delete_asks_first() {
        let mut ed = editor();
        ed.selection = Selection::Node(NodeId(1));
        let out = ed.update(Message::RequestDelete).unwrap();
        assert_eq!(out.confirm.as_deref(), Some("Delete \"A\"?"));
        assert_eq!(ed.diagram().nodes.len(), 2);
        ed.update(Message::ConfirmDelete).unwrap();
        assert_eq!(ed.diagram().nodes.len(), 1);
        assert!(ed.selection().is_empty());
        assert_eq!(ed.queue().queued(), &[PersistOp::DeleteNode(NodeId(1))]);
    }

    #[test]
    fn undo_is_ignored_while_modal_is_open() {
        let mut ed = editor();
        ed.update(Message::Beautify).unwrap();
        ed.update(Message::SetModal(true)).unwrap();
        let moved = ed.diagram().clone();
        ed.update(Message::Undo).unwrap();
        assert_eq!(ed.diagram(), &moved);
        ed.update(Message::SetModal(false)).unwrap();
        ed.update(Message::Undo).unwrap();
        assert_ne!(ed.diagram(), &moved);
    }

    #[test]
    fn zoom_is_written_back_to_the_record() {
        let mut ed = editor();
        ed.update(Message::SetZoom(9.0)).unwrap();
        assert_eq!(ed.record().zoom_level, 3.0);
        assert!(ed.queue().queued().contains(&PersistOp::SaveViewport));
    }
}
