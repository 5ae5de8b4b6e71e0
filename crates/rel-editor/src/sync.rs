//! Persistence queue: local mutations → REST requests.
//!
//! The editor mutates its model optimistically and records *what* changed
//! as a [`PersistOp`]. Ops are coalesced while they wait, and
//! [`PersistQueue::drain`] turns the ready ones into [`ApiRequest`]s built
//! from the model as it is at drain time. The host performs the calls and
//! feeds each result back through [`PersistQueue::complete`].
//!
//! Ops that reference a pending (negative) id are held back until the create
//! that owns the id resolves and the editor renames it everywhere.

use crate::error::ApiError;
use rel_core::{Color, Diagram, Edge, EdgeId, GraphId, GraphRecord, Node, NodeId, NodeType, Point, Task, TaskId};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ─── Routes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// REST endpoints of the persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Graph(GraphId),
    NodesOf(GraphId),
    Nodes,
    Node(NodeId),
    EdgesOf(GraphId),
    Edges,
    Edge(EdgeId),
    Tasks,
    Task(TaskId),
    NodeImages,
    NodeImage(NodeId),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Graph(id) => format!("/api/graphs/{}", id.get()),
            Route::NodesOf(graph) => format!("/api/nodes?graphId={}", graph.get()),
            Route::Nodes => "/api/nodes".to_string(),
            Route::Node(id) => format!("/api/nodes/{}", id.get()),
            Route::EdgesOf(graph) => format!("/api/edges?graphId={}", graph.get()),
            Route::Edges => "/api/edges".to_string(),
            Route::Edge(id) => format!("/api/edges/{}", id.get()),
            Route::Tasks => "/api/tasks".to_string(),
            Route::Task(id) => format!("/api/tasks/{}", id.get()),
            Route::NodeImages => "/api/node-images".to_string(),
            Route::NodeImage(node) => format!("/api/node-images/{}", node.get()),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// One call for the host to perform. Serialized as-is for the JS side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub request_id: u64,
    pub method: Method,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ApiRequest {
    /// A read request outside the queue (initial load).
    pub fn get(route: Route) -> Self {
        Self {
            request_id: 0,
            method: Method::Get,
            path: route.path(),
            body: None,
        }
    }
}

/// The three reads whose payloads feed `Message::Load`, in that order:
/// graph record, nodes (tasks inline), edges.
pub fn load_requests(graph: GraphId) -> [ApiRequest; 3] {
    [
        ApiRequest::get(Route::Graph(graph)),
        ApiRequest::get(Route::NodesOf(graph)),
        ApiRequest::get(Route::EdgesOf(graph)),
    ]
}

// ─── Bodies ──────────────────────────────────────────────────────────────

/// Node fields the node routes store. Tasks and the avatar have their own
/// routes.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeBody<'a> {
    graph_id: GraphId,
    x: f64,
    y: f64,
    radius: f64,
    name: &'a str,
    #[serde(rename = "type")]
    node_type: NodeType,
    color: Color,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_list_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notepad: Option<&'a str>,
}

impl<'a> From<&'a Node> for NodeBody<'a> {
    fn from(n: &'a Node) -> Self {
        Self {
            graph_id: n.graph_id,
            x: n.x,
            y: n.y,
            radius: n.radius,
            name: &n.name,
            node_type: n.node_type,
            color: n.color,
            owner: n.owner.as_deref(),
            task_list_name: n.task_list_name.as_deref(),
            notepad: n.notepad.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct PositionBody {
    x: f64,
    y: f64,
}

/// Edge tasks travel inline with the edge.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EdgeBody<'a> {
    graph_id: GraphId,
    source_id: NodeId,
    target_id: NodeId,
    label: &'a str,
    color: Color,
    bend_points: &'a [Point],
    tasks: &'a [Task],
}

impl<'a> From<&'a Edge> for EdgeBody<'a> {
    fn from(e: &'a Edge) -> Self {
        Self {
            graph_id: e.graph_id,
            source_id: e.source_id,
            target_id: e.target_id,
            label: &e.label,
            color: e.color,
            bend_points: &e.bend_points,
            tasks: &e.tasks,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskBody<'a> {
    node_id: NodeId,
    title: &'a str,
    done: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeImageBody<'a> {
    node_id: NodeId,
    image: Option<&'a str>,
}

// ─── Ops ─────────────────────────────────────────────────────────────────

/// How much of a node an update has to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodePatch {
    Position,
    Full,
}

/// A pending write, named by entity id only. Bodies are built at drain time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOp {
    CreateNode(NodeId),
    UpdateNode { id: NodeId, patch: NodePatch },
    DeleteNode(NodeId),
    CreateEdge(EdgeId),
    UpdateEdge(EdgeId),
    DeleteEdge(EdgeId),
    CreateTask { node: NodeId, task: TaskId },
    UpdateTask { node: NodeId, task: TaskId },
    DeleteTask(TaskId),
    SaveNodeImage(NodeId),
    SaveViewport,
}

impl PersistOp {
    fn node(&self) -> Option<NodeId> {
        match *self {
            PersistOp::CreateNode(id)
            | PersistOp::UpdateNode { id, .. }
            | PersistOp::DeleteNode(id)
            | PersistOp::SaveNodeImage(id) => Some(id),
            PersistOp::CreateTask { node, .. } | PersistOp::UpdateTask { node, .. } => Some(node),
            _ => None,
        }
    }

    fn edge(&self) -> Option<EdgeId> {
        match *self {
            PersistOp::CreateEdge(id) | PersistOp::UpdateEdge(id) | PersistOp::DeleteEdge(id) => Some(id),
            _ => None,
        }
    }

    fn task(&self) -> Option<TaskId> {
        match *self {
            PersistOp::CreateTask { task, .. } | PersistOp::UpdateTask { task, .. } | PersistOp::DeleteTask(task) => {
                Some(task)
            }
            _ => None,
        }
    }

    fn is_delete(&self) -> bool {
        matches!(
            self,
            PersistOp::DeleteNode(_) | PersistOp::DeleteEdge(_) | PersistOp::DeleteTask(_)
        )
    }

    fn rename_node(&mut self, from: NodeId, to: NodeId) {
        match self {
            PersistOp::CreateNode(id)
            | PersistOp::UpdateNode { id, .. }
            | PersistOp::DeleteNode(id)
            | PersistOp::SaveNodeImage(id)
            | PersistOp::CreateTask { node: id, .. }
            | PersistOp::UpdateTask { node: id, .. } => {
                if *id == from {
                    *id = to;
                }
            }
            _ => {}
        }
    }

    fn rename_edge(&mut self, from: EdgeId, to: EdgeId) {
        if let PersistOp::CreateEdge(id) | PersistOp::UpdateEdge(id) | PersistOp::DeleteEdge(id) = self
            && *id == from
        {
            *id = to;
        }
    }

    fn rename_task(&mut self, from: TaskId, to: TaskId) {
        if let PersistOp::CreateTask { task, .. } | PersistOp::UpdateTask { task, .. } | PersistOp::DeleteTask(task) =
            self
            && *task == from
        {
            *task = to;
        }
    }
}

/// Outcome of one finished request, for the editor to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Done,
    NodeCreated { pending: NodeId, id: NodeId },
    EdgeCreated { pending: EdgeId, id: EdgeId },
    TaskCreated { pending: TaskId, id: TaskId },
    /// Kept locally and retried with the next save.
    Failed { message: String },
    /// Not a request this queue issued (or already completed).
    Unknown,
}

// ─── Queue ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct PersistQueue {
    queued: Vec<PersistOp>,
    in_flight: BTreeMap<u64, PersistOp>,
    /// Failed ops, re-queued by the next enqueue.
    parked: Vec<PersistOp>,
    next_request: u64,
}

impl PersistQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, e.g. when a different graph is loaded.
    pub fn clear(&mut self) {
        self.queued.clear();
        self.in_flight.clear();
        self.parked.clear();
    }

    pub fn queued(&self) -> &[PersistOp] {
        &self.queued
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn parked(&self) -> &[PersistOp] {
        &self.parked
    }

    pub fn is_idle(&self) -> bool {
        self.queued.is_empty() && self.in_flight.is_empty()
    }

    /// Record a write. Parked failures come back first so they retry.
    pub fn enqueue(&mut self, op: PersistOp) {
        for retry in std::mem::take(&mut self.parked) {
            log::debug!("retrying {retry:?}");
            self.coalesce(retry);
        }
        self.coalesce(op);
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = PersistOp>) {
        for op in ops {
            self.enqueue(op);
        }
    }

    fn coalesce(&mut self, op: PersistOp) {
        // A create already on the wire must not be sent twice.
        let sent = self.in_flight.values().any(|o| *o == op);
        let q = &mut self.queued;
        match op {
            PersistOp::CreateNode(id) => {
                // Undo of a delete that never left the queue.
                if let Some(i) = q.iter().position(|o| *o == PersistOp::DeleteNode(id)) {
                    q.remove(i);
                    return;
                }
                if !sent && !q.contains(&op) {
                    q.push(op);
                }
            }
            PersistOp::UpdateNode { id, patch } => {
                if q.contains(&PersistOp::CreateNode(id)) {
                    return;
                }
                for o in q.iter_mut() {
                    if let PersistOp::UpdateNode { id: other, patch: p } = o
                        && *other == id
                    {
                        *p = (*p).max(patch);
                        return;
                    }
                }
                q.push(op);
            }
            PersistOp::DeleteNode(id) => {
                let had_create = q.contains(&PersistOp::CreateNode(id));
                q.retain(|o| o.node() != Some(id));
                if !had_create {
                    q.push(op);
                }
            }
            PersistOp::CreateEdge(id) => {
                if let Some(i) = q.iter().position(|o| *o == PersistOp::DeleteEdge(id)) {
                    q.remove(i);
                    return;
                }
                if !sent && !q.contains(&op) {
                    q.push(op);
                }
            }
            PersistOp::UpdateEdge(id) => {
                if !q.contains(&PersistOp::CreateEdge(id)) && !q.contains(&op) {
                    q.push(op);
                }
            }
            PersistOp::DeleteEdge(id) => {
                let had_create = q.contains(&PersistOp::CreateEdge(id));
                q.retain(|o| o.edge() != Some(id));
                if !had_create {
                    q.push(op);
                }
            }
            PersistOp::CreateTask { task, .. } => {
                if let Some(i) = q.iter().position(|o| *o == PersistOp::DeleteTask(task)) {
                    q.remove(i);
                    return;
                }
                if !sent && !q.contains(&op) {
                    q.push(op);
                }
            }
            PersistOp::UpdateTask { task, .. } => {
                if !q.iter().any(|o| o.task() == Some(task)) {
                    q.push(op);
                }
            }
            PersistOp::DeleteTask(task) => {
                let had_create = q
                    .iter()
                    .any(|o| matches!(o, PersistOp::CreateTask { task: t, .. } if *t == task));
                q.retain(|o| o.task() != Some(task));
                if !had_create {
                    q.push(op);
                }
            }
            PersistOp::SaveNodeImage(_) | PersistOp::SaveViewport => {
                if !q.contains(&op) {
                    q.push(op);
                }
            }
        }
    }

    /// Build requests for every ready op, in queue order.
    pub fn drain(&mut self, diagram: &Diagram, record: &GraphRecord) -> Vec<ApiRequest> {
        let mut out = Vec::new();
        let mut held = Vec::new();
        for op in std::mem::take(&mut self.queued) {
            if blocked(&op, diagram) {
                held.push(op);
                continue;
            }
            let Some((method, route, body)) = build(&op, diagram, record) else {
                log::debug!("dropping {op:?}: entity is gone");
                continue;
            };
            self.next_request += 1;
            let request_id = self.next_request;
            self.in_flight.insert(request_id, op);
            out.push(ApiRequest {
                request_id,
                method,
                path: route.path(),
                body,
            });
        }
        self.queued = held;
        if !out.is_empty() {
            log::debug!("sync: {} request(s) out, {} held", out.len(), self.queued.len());
        }
        out
    }

    /// Resolve a finished request.
    pub fn complete(&mut self, request_id: u64, result: Result<Value, ApiError>) -> Completion {
        let Some(op) = self.in_flight.remove(&request_id) else {
            log::warn!("sync: response for unknown request {request_id}");
            return Completion::Unknown;
        };
        let value = match result {
            Ok(value) => value,
            Err(ApiError::Status { status: 404, .. }) if op.is_delete() => {
                log::debug!("{op:?}: already gone server-side");
                return Completion::Done;
            }
            Err(err) => {
                log::warn!("sync: {op:?} failed: {err}");
                self.parked.push(op);
                return Completion::Failed {
                    message: format!("Save failed: {err}"),
                };
            }
        };

        let assigned = || value.get("id").and_then(Value::as_i64).filter(|id| *id > 0);
        let missing = |what: &'static str| {
            let err = ApiError::MissingId { what };
            log::warn!("sync: {err}");
            Completion::Failed {
                message: format!("Save failed: {err}"),
            }
        };
        match op {
            PersistOp::CreateNode(pending) => match assigned() {
                Some(id) => Completion::NodeCreated {
                    pending,
                    id: NodeId(id),
                },
                None => missing("node"),
            },
            PersistOp::CreateEdge(pending) => match assigned() {
                Some(id) => Completion::EdgeCreated {
                    pending,
                    id: EdgeId(id),
                },
                None => missing("edge"),
            },
            PersistOp::CreateTask { task: pending, .. } => match assigned() {
                Some(id) => Completion::TaskCreated {
                    pending,
                    id: TaskId(id),
                },
                None => missing("task"),
            },
            _ => Completion::Done,
        }
    }

    pub fn rename_node(&mut self, from: NodeId, to: NodeId) {
        self.ops_mut().for_each(|op| op.rename_node(from, to));
    }

    pub fn rename_edge(&mut self, from: EdgeId, to: EdgeId) {
        self.ops_mut().for_each(|op| op.rename_edge(from, to));
    }

    pub fn rename_task(&mut self, from: TaskId, to: TaskId) {
        self.ops_mut().for_each(|op| op.rename_task(from, to));
    }

    fn ops_mut(&mut self) -> impl Iterator<Item = &mut PersistOp> {
        self.queued
            .iter_mut()
            .chain(self.parked.iter_mut())
            .chain(self.in_flight.values_mut())
    }
}

/// An op waits while any id it must send is still pending.
fn blocked(op: &PersistOp, d: &Diagram) -> bool {
    let endpoints_pending = |e: &Edge| e.source_id.is_pending() || e.target_id.is_pending();
    match *op {
        PersistOp::CreateNode(_) | PersistOp::SaveViewport => false,
        PersistOp::CreateEdge(id) => d.edge(id).is_some_and(endpoints_pending),
        PersistOp::UpdateEdge(id) => id.is_pending() || d.edge(id).is_some_and(endpoints_pending),
        PersistOp::CreateTask { node, .. } => node.is_pending(),
        PersistOp::UpdateTask { node, task } => node.is_pending() || task.is_pending(),
        PersistOp::UpdateNode { id, .. } | PersistOp::DeleteNode(id) | PersistOp::SaveNodeImage(id) => {
            id.is_pending()
        }
        PersistOp::DeleteEdge(id) => id.is_pending(),
        PersistOp::DeleteTask(id) => id.is_pending(),
    }
}

fn to_value(body: impl Serialize) -> Option<Value> {
    match serde_json::to_value(body) {
        Ok(v) => Some(v),
        Err(err) => {
            log::warn!("sync: body not serializable: {err}");
            None
        }
    }
}

fn find_task(d: &Diagram, node: NodeId, task: TaskId) -> Option<&Task> {
    d.node(node)?.tasks.iter().find(|t| t.id == Some(task))
}

/// Method, route and body for `op` from the current model. `None` when the
/// entity the op writes no longer exists.
fn build(op: &PersistOp, d: &Diagram, record: &GraphRecord) -> Option<(Method, Route, Option<Value>)> {
    Some(match *op {
        PersistOp::CreateNode(id) => (Method::Post, Route::Nodes, to_value(NodeBody::from(d.node(id)?))),
        PersistOp::UpdateNode { id, patch } => {
            let node = d.node(id)?;
            let body = match patch {
                NodePatch::Position => to_value(PositionBody { x: node.x, y: node.y }),
                NodePatch::Full => to_value(NodeBody::from(node)),
            };
            (Method::Put, Route::Node(id), body)
        }
        PersistOp::DeleteNode(id) => (Method::Delete, Route::Node(id), None),
        PersistOp::CreateEdge(id) => (Method::Post, Route::Edges, to_value(EdgeBody::from(d.edge(id)?))),
        PersistOp::UpdateEdge(id) => (Method::Put, Route::Edge(id), to_value(EdgeBody::from(d.edge(id)?))),
        PersistOp::DeleteEdge(id) => (Method::Delete, Route::Edge(id), None),
        PersistOp::CreateTask { node, task } => {
            let t = find_task(d, node, task)?;
            let body = TaskBody {
                node_id: node,
                title: &t.title,
                done: t.done,
            };
            (Method::Post, Route::Tasks, to_value(body))
        }
        PersistOp::UpdateTask { node, task } => {
            let t = find_task(d, node, task)?;
            let body = TaskBody {
                node_id: node,
                title: &t.title,
                done: t.done,
            };
            (Method::Put, Route::Task(task), to_value(body))
        }
        PersistOp::DeleteTask(task) => (Method::Delete, Route::Task(task), None),
        PersistOp::SaveNodeImage(id) => {
            let node = d.node(id)?;
            match node.image.as_deref() {
                Some(image) => {
                    let body = NodeImageBody {
                        node_id: id,
                        image: Some(image),
                    };
                    (Method::Post, Route::NodeImages, to_value(body))
                }
                None => (Method::Delete, Route::NodeImage(id), None),
            }
        }
        PersistOp::SaveViewport => (Method::Put, Route::Graph(record.id), to_value(record)),
    })
}

// ─── Diff ────────────────────────────────────────────────────────────────

/// One difference between two diagrams, as the server has to see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    NodeMoved(NodeId),
    NodeChanged(NodeId),
    NodeImageChanged(NodeId),
    EdgeAdded(EdgeId),
    EdgeRemoved(EdgeId),
    EdgeChanged(EdgeId),
    TaskAdded { node: NodeId, task: TaskId },
    TaskRemoved(TaskId),
    TaskChanged { node: NodeId, task: TaskId },
}

/// Everything that differs between `before` and `after`, matched by id.
/// Tasks of added or removed nodes are not listed separately.
pub fn diff(before: &Diagram, after: &Diagram) -> Vec<Change> {
    let mut out = Vec::new();
    let old_nodes: HashMap<NodeId, &Node> = before.nodes.iter().map(|n| (n.id, n)).collect();
    let new_nodes: HashMap<NodeId, &Node> = after.nodes.iter().map(|n| (n.id, n)).collect();

    for node in &after.nodes {
        let Some(old) = old_nodes.get(&node.id) else {
            out.push(Change::NodeAdded(node.id));
            continue;
        };
        if !same_fields(old, node) {
            out.push(Change::NodeChanged(node.id));
        } else if old.center() != node.center() {
            out.push(Change::NodeMoved(node.id));
        }
        if old.image != node.image {
            out.push(Change::NodeImageChanged(node.id));
        }
        diff_tasks(node.id, &old.tasks, &node.tasks, &mut out);
    }
    for node in &before.nodes {
        if !new_nodes.contains_key(&node.id) {
            out.push(Change::NodeRemoved(node.id));
        }
    }

    let old_edges: HashMap<EdgeId, &Edge> = before.edges.iter().map(|e| (e.id, e)).collect();
    let new_edges: HashMap<EdgeId, &Edge> = after.edges.iter().map(|e| (e.id, e)).collect();
    for edge in &after.edges {
        match old_edges.get(&edge.id) {
            None => out.push(Change::EdgeAdded(edge.id)),
            Some(old) if *old != edge => out.push(Change::EdgeChanged(edge.id)),
            Some(_) => {}
        }
    }
    for edge in &before.edges {
        if !new_edges.contains_key(&edge.id) {
            out.push(Change::EdgeRemoved(edge.id));
        }
    }
    out
}

/// Node equality ignoring position, tasks and image.
fn same_fields(a: &Node, b: &Node) -> bool {
    a.radius == b.radius
        && a.name == b.name
        && a.node_type == b.node_type
        && a.color == b.color
        && a.owner == b.owner
        && a.task_list_name == b.task_list_name
        && a.notepad == b.notepad
}

fn diff_tasks(node: NodeId, before: &[Task], after: &[Task], out: &mut Vec<Change>) {
    for task in after {
        let Some(id) = task.id else { continue };
        match before.iter().find(|t| t.id == Some(id)) {
            None => out.push(Change::TaskAdded { node, task: id }),
            Some(old) if old != task => out.push(Change::TaskChanged { node, task: id }),
            Some(_) => {}
        }
    }
    for task in before {
        if let Some(id) = task.id
            && !after.iter().any(|t| t.id == Some(id))
        {
            out.push(Change::TaskRemoved(id));
        }
    }
}
