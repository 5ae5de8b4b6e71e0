//! Core data model for relationship diagrams.
//!
//! A diagram is a flat list of nodes (circles on the canvas) and edges that
//! reference nodes by id. Edges never hold node objects: every use re-resolves
//! the endpoints through [`Diagram::node`], so an edge whose endpoint vanished
//! simply stops resolving instead of dangling.

use crate::error::ModelError;
use crate::id::{EdgeId, GraphId, NodeId, TaskId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::ops::{Add, Mul, Sub};

// ─── Geometry primitive ──────────────────────────────────────────────────

/// A point (or displacement) in logical canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(&self, other: Point) -> f64 {
        (*self - other).length()
    }

    pub fn midpoint(&self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle; `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized rectangle spanning two corners, in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Boundary-inclusive containment.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.max_x() && p.y >= self.y && p.y <= self.max_y()
    }
}

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color, 8 bits per channel. Serialized as a hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Helper to parse a single hex digit.
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a hex color string: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`.
    /// The string may optionally start with `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let pair = |i: usize| -> Option<u8> { Some(hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?) };

        match bytes.len() {
            3 | 4 => {
                let short = |i: usize| hex_val(bytes[i]).map(|v| v * 17);
                Some(Self {
                    r: short(0)?,
                    g: short(1)?,
                    b: short(2)?,
                    a: if bytes.len() == 4 { short(3)? } else { 255 },
                })
            }
            6 | 8 => Some(Self {
                r: pair(0)?,
                g: pair(2)?,
                b: pair(4)?,
                a: if bytes.len() == 8 { pair(6)? } else { 255 },
            }),
            _ => None,
        }
    }

    /// Emit as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Scale the RGB channels toward black. `factor` in `0.0..=1.0`.
    pub fn darken(&self, factor: f64) -> Self {
        let k = (1.0 - factor.clamp(0.0, 1.0)) as f32;
        let scale = |c: u8| (c as f32 * k).round() as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: self.a,
        }
    }

    /// Perceived luminance (sRGB weights), `0.0..=1.0`.
    pub fn luminance(&self) -> f64 {
        (0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64) / 255.0
    }

    /// Readable label color on top of this fill.
    pub fn contrasting_text(&self) -> Color {
        if self.luminance() > 0.5 {
            Color::rgb(0x1C, 0x1C, 0x1E)
        } else {
            Color::rgb(0xFF, 0xFF, 0xFF)
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color `{s}`")))
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// Semantic category of a node; drives the default fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Organization,
    Person,
    Location,
    Time,
    Event,
    #[default]
    Concept,
}

impl NodeType {
    pub const ALL: [NodeType; 6] = [
        NodeType::Organization,
        NodeType::Person,
        NodeType::Location,
        NodeType::Time,
        NodeType::Event,
        NodeType::Concept,
    ];

    pub fn default_color(&self) -> Color {
        match self {
            NodeType::Organization => Color::rgb(0x4A, 0x90, 0xD9),
            NodeType::Person => Color::rgb(0xE6, 0x7E, 0x22),
            NodeType::Location => Color::rgb(0x27, 0xAE, 0x60),
            NodeType::Time => Color::rgb(0x8E, 0x44, 0xAD),
            NodeType::Event => Color::rgb(0xE7, 0x4C, 0x3C),
            NodeType::Concept => Color::rgb(0x16, 0xA0, 0x85),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Organization => "organization",
            NodeType::Person => "person",
            NodeType::Location => "location",
            NodeType::Time => "time",
            NodeType::Event => "event",
            NodeType::Concept => "concept",
        }
    }
}

/// A checklist entry attached to a node or an edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    #[serde(alias = "text")]
    pub title: String,
    #[serde(default, alias = "completed")]
    pub done: bool,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            done: false,
        }
    }
}

pub const DEFAULT_NODE_RADIUS: f64 = 40.0;

fn default_radius() -> f64 {
    DEFAULT_NODE_RADIUS
}

/// A circular node on the canvas. `(x, y)` is the center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub graph_id: GraphId,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_list_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notepad: Option<String>,
    /// Data URI of the node avatar. Stored separately server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Node {
    /// Create a node with a pending id, the type's default color and
    /// default radius.
    pub fn new(graph_id: GraphId, name: impl Into<String>, node_type: NodeType, at: Point) -> Self {
        Self {
            id: NodeId::pending(),
            graph_id,
            x: at.x,
            y: at.y,
            radius: DEFAULT_NODE_RADIUS,
            name: name.into(),
            node_type,
            color: node_type.default_color(),
            owner: None,
            tasks: Vec::new(),
            task_list_name: None,
            notepad: None,
            image: None,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn set_center(&mut self, p: Point) {
        self.x = p.x;
        self.y = p.y;
    }
}

// ─── Edges ───────────────────────────────────────────────────────────────

pub type BendPoints = SmallVec<[Point; 4]>;

fn default_edge_color() -> Color {
    Color::rgb(0x6B, 0x70, 0x80)
}

/// A directed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub graph_id: GraphId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_edge_color")]
    pub color: Color,
    #[serde(default)]
    pub bend_points: BendPoints,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Edge {
    pub fn new(graph_id: GraphId, source_id: NodeId, target_id: NodeId) -> Self {
        Self {
            id: EdgeId::pending(),
            graph_id,
            source_id,
            target_id,
            label: String::new(),
            color: default_edge_color(),
            bend_points: SmallVec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.source_id == node || self.target_id == node
    }

    pub fn is_self_loop(&self) -> bool {
        self.source_id == self.target_id
    }
}

/// Address of a single bend point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BendRef {
    pub edge: EdgeId,
    pub index: usize,
}

// ─── Graph record ────────────────────────────────────────────────────────

/// The kind of document a graph record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    #[default]
    Relationship,
    Flowchart,
    Mindmap,
}

fn default_zoom() -> f64 {
    1.0
}

fn default_canvas_width() -> u32 {
    2000
}

fn default_canvas_height() -> u32 {
    1500
}

/// The persisted graph row: viewport, canvas size and display options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRecord {
    pub id: GraphId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_zoom")]
    pub zoom_level: f64,
    #[serde(default)]
    pub pan_offset_x: f64,
    #[serde(default)]
    pub pan_offset_y: f64,
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,
    #[serde(default)]
    pub show_node_info: bool,
    #[serde(default)]
    pub background_image: Option<String>,
    #[serde(default)]
    pub diagram_type: DiagramType,
}

impl GraphRecord {
    pub fn new(id: GraphId) -> Self {
        Self {
            id,
            name: String::new(),
            zoom_level: default_zoom(),
            pan_offset_x: 0.0,
            pan_offset_y: 0.0,
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            show_node_info: false,
            background_image: None,
            diagram_type: DiagramType::default(),
        }
    }
}

// ─── Diagram ─────────────────────────────────────────────────────────────

/// The in-memory node and edge lists of one graph.
///
/// Cloning a diagram is a full structural deep copy; history snapshots rely
/// on that.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagram {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    /// Resolve both endpoints of an edge. `None` if either is missing.
    pub fn endpoints(&self, edge: &Edge) -> Option<(&Node, &Node)> {
        Some((self.node(edge.source_id)?, self.node(edge.target_id)?))
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.push(node);
        id
    }

    /// Add an edge; both endpoints must exist.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, ModelError> {
        for end in [edge.source_id, edge.target_id] {
            if self.node(end).is_none() {
                return Err(ModelError::UnknownNode(end));
            }
        }
        let id = edge.id;
        self.edges.push(edge);
        Ok(id)
    }

    /// Remove a node and every edge touching it. Returns the removed node
    /// and the cascaded edges.
    pub fn remove_node(&mut self, id: NodeId) -> Option<(Node, Vec<Edge>)> {
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        let node = self.nodes.remove(pos);
        let (cascaded, kept): (Vec<Edge>, Vec<Edge>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| e.touches(id));
        self.edges = kept;
        Some((node, cascaded))
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let pos = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(pos))
    }

    /// The first edge going exactly `source → target`.
    pub fn find_edge(&self, source: NodeId, target: NodeId) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.source_id == source && e.target_id == target)
    }

    pub fn incident_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.touches(node))
    }

    pub fn bend_point(&self, r: BendRef) -> Option<Point> {
        self.edge(r.edge)?.bend_points.get(r.index).copied()
    }

    pub fn bend_point_mut(&mut self, r: BendRef) -> Option<&mut Point> {
        self.edge_mut(r.edge)?.bend_points.get_mut(r.index)
    }

    /// Every bend point in the diagram, addressed.
    pub fn bend_points(&self) -> impl Iterator<Item = (BendRef, Point)> + '_ {
        self.edges.iter().flat_map(|e| {
            e.bend_points.iter().enumerate().map(move |(index, p)| {
                (
                    BendRef {
                        edge: e.id,
                        index,
                    },
                    *p,
                )
            })
        })
    }

    /// Replace a (pending) node id everywhere it is referenced.
    pub fn rename_node(&mut self, from: NodeId, to: NodeId) -> bool {
        let Some(node) = self.node_mut(from) else {
            return false;
        };
        node.id = to;
        for edge in &mut self.edges {
            if edge.source_id == from {
                edge.source_id = to;
            }
            if edge.target_id == from {
                edge.target_id = to;
            }
        }
        true
    }

    pub fn rename_edge(&mut self, from: EdgeId, to: EdgeId) -> bool {
        match self.edge_mut(from) {
            Some(edge) => {
                edge.id = to;
                true
            }
            None => false,
        }
    }

    /// Replace a task id on whichever node or edge holds it.
    pub fn rename_task(&mut self, from: TaskId, to: TaskId) -> bool {
        let tasks = self
            .nodes
            .iter_mut()
            .flat_map(|n| n.tasks.iter_mut())
            .chain(self.edges.iter_mut().flat_map(|e| e.tasks.iter_mut()));
        let mut found = false;
        for task in tasks.filter(|t| t.id == Some(from)) {
            task.id = Some(to);
            found = true;
        }
        found
    }

    /// The node a task belongs to. Edge tasks have no owner node.
    pub fn task_owner(&self, task: TaskId) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.tasks.iter().any(|t| t.id == Some(task)))
            .map(|n| n.id)
    }

    /// Drop edges whose endpoints do not resolve. Returns how many were
    /// dropped.
    pub fn prune_dangling_edges(&mut self) -> usize {
        let before = self.edges.len();
        let ids: Vec<NodeId> = self.nodes.iter().map(|n| n.id).collect();
        self.edges
            .retain(|e| ids.contains(&e.source_id) && ids.contains(&e.target_id));
        let dropped = before - self.edges.len();
        if dropped > 0 {
            log::warn!("dropped {dropped} edge(s) with unresolved endpoints");
        }
        dropped
    }
}
