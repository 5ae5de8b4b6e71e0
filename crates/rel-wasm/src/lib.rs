//! WASM bridge for Relgraph. Exposes the canvas engine to JavaScript.
//!
//! Compiled via `wasm-pack build --target web`. The host page forwards DOM
//! events, performs the REST calls the editor hands out, feeds the
//! responses back, and calls [`RelCanvas::render`] from the animation-frame
//! callback registered with [`RelCanvas::set_frame_callback`].
//!
//! Mutating methods return a JSON string:
//! `{"ok":true,"redraw":bool,"confirm":string|null,"status":string|null,"hasRequests":bool}`
//! or `{"ok":false,"error":"..."}`.

mod images;
mod render2d;

use images::ImageCache;
use rel_core::{
    Color, EdgeId, EditorConfig, GraphId, ModelError, NodeId, NodeType, Point, Rect, TaskId, edges_from_json, graph_from_json,
    nodes_from_json,
};
use rel_editor::{
    ApiError, EdgeForm, Editor, InputEvent, Interaction, Message, Modifiers, NodeForm, Outcome,
    ShortcutAction, ShortcutMap, sync,
};
use rel_render::{ApproxMeasure, FrameScheduler, TextMeasure};
use render2d::{CanvasTheme, render_display_list};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;

// ─── Frame loop ──────────────────────────────────────────────────────────

/// Single-flight `requestAnimationFrame` scheduling shared between the
/// canvas and image load handlers.
#[derive(Clone, Default)]
pub struct FrameLoop {
    scheduler: Rc<RefCell<FrameScheduler>>,
    callback: Rc<RefCell<Option<js_sys::Function>>>,
}

impl FrameLoop {
    /// Schedule a frame unless one is already pending.
    pub fn request(&self) {
        if !self.scheduler.borrow_mut().request() {
            return;
        }
        let callback = self.callback.borrow();
        let Some(cb) = callback.as_ref() else {
            log::trace!("frame requested before a callback was set");
            return;
        };
        if let Some(window) = web_sys::window()
            && let Err(e) = window.request_animation_frame(cb)
        {
            log::warn!("requestAnimationFrame failed: {e:?}");
        }
    }

    fn begin(&self) -> bool {
        self.scheduler.borrow_mut().begin_frame()
    }

    fn set_callback(&self, cb: js_sys::Function) {
        *self.callback.borrow_mut() = Some(cb);
    }
}

// ─── Canvas controller ───────────────────────────────────────────────────

/// The main WASM-facing canvas controller.
///
/// Owns the [`Editor`] plus the browser-side pieces it cannot hold itself:
/// the frame loop, the image cache and the theme.
#[wasm_bindgen]
pub struct RelCanvas {
    editor: Editor,
    frames: FrameLoop,
    images: ImageCache,
    /// `false` = light (default), `true` = dark.
    dark_mode: bool,
}

#[wasm_bindgen]
impl RelCanvas {
    /// Create a controller. `config_json` is an `EditorConfig` object; an
    /// empty string selects the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> RelCanvas {
        init_logging();
        let frames = FrameLoop::default();
        Self {
            editor: Editor::new(parse_config(config_json), text_measure()),
            images: ImageCache::new(frames.clone()),
            frames,
            dark_mode: false,
        }
    }

    /// Register the function the host wants called on each animation frame.
    /// It should call [`RelCanvas::render`].
    pub fn set_frame_callback(&mut self, callback: js_sys::Function) {
        self.frames.set_callback(callback);
    }

    /// Ask for a frame, e.g. after the element was resized.
    pub fn request_frame(&self) {
        self.frames.request();
    }

    /// Draw the current state. Re-arms frame scheduling.
    pub fn render(&mut self, ctx: &CanvasRenderingContext2d) {
        self.frames.begin();
        let theme = if self.dark_mode {
            CanvasTheme::dark()
        } else {
            CanvasTheme::light()
        };
        let commands = self.editor.display_list(&theme.scene);
        render_display_list(
            ctx,
            &commands,
            &theme,
            &self.editor.config().info_box,
            &mut self.images,
        );
        self.images.sweep();
    }

    /// Set the canvas theme.
    pub fn set_theme(&mut self, is_dark: bool) {
        self.dark_mode = is_dark;
        self.frames.request();
    }

    /// Replace the document with the three fetched payloads.
    pub fn load(&mut self, graph_json: &str, nodes_json: &str, edges_json: &str) -> String {
        match parse_load(graph_json, nodes_json, edges_json) {
            Ok(msg) => self.dispatch(msg),
            Err(e) => error_json(&e.to_string()),
        }
    }

    // ─── Pointer & keyboard ──────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn handle_pointer_down(
        &mut self,
        client_x: f64,
        client_y: f64,
        origin_x: f64,
        origin_y: f64,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
        time_ms: f64,
    ) -> String {
        self.dispatch(Message::Input(InputEvent::PointerDown {
            client: Point::new(client_x, client_y),
            origin: Point::new(origin_x, origin_y),
            modifiers: Modifiers {
                shift,
                ctrl,
                alt,
                meta,
            },
            time_ms,
        }))
    }

    /// Forward from a window-level listener while a gesture is active.
    pub fn handle_pointer_move(&mut self, client_x: f64, client_y: f64, origin_x: f64, origin_y: f64) -> String {
        self.dispatch(Message::Input(InputEvent::PointerMove {
            client: Point::new(client_x, client_y),
            origin: Point::new(origin_x, origin_y),
        }))
    }

    pub fn handle_pointer_up(&mut self, client_x: f64, client_y: f64, origin_x: f64, origin_y: f64) -> String {
        self.dispatch(Message::Input(InputEvent::PointerUp {
            client: Point::new(client_x, client_y),
            origin: Point::new(origin_x, origin_y),
        }))
    }

    pub fn handle_double_click(&mut self, client_x: f64, client_y: f64, origin_x: f64, origin_y: f64) -> String {
        self.dispatch(Message::Input(InputEvent::DoubleClick {
            client: Point::new(client_x, client_y),
            origin: Point::new(origin_x, origin_y),
        }))
    }

    /// One wheel notch. The host should `preventDefault` when the result
    /// has `redraw` set.
    pub fn handle_wheel(&mut self, client_x: f64, client_y: f64, delta_y: f64) -> String {
        self.dispatch(Message::Input(InputEvent::Wheel {
            client: Point::new(client_x, client_y),
            delta_y,
        }))
    }

    /// Handle a keyboard event. The result carries the resolved shortcut
    /// as `"action"` (`"none"` when unbound).
    pub fn handle_key(&mut self, key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> String {
        let action = ShortcutMap::resolve(key, ctrl, shift, alt, meta);
        let result = self.editor.update(Message::Input(InputEvent::Key {
            key: key.to_string(),
            modifiers: Modifiers {
                shift,
                ctrl,
                alt,
                meta,
            },
        }));
        match result {
            Ok(out) => {
                let mut body = self.outcome_value(&out);
                body["action"] = json!(action.map_or("none", action_to_name));
                body.to_string()
            }
            Err(e) => error_json(&e.to_string()),
        }
    }

    // ─── Document edits ──────────────────────────────────────────────────

    /// Create a node. Without `x`/`y` it lands at the canvas center.
    pub fn create_node(
        &mut self,
        name: &str,
        node_type: &str,
        x: Option<f64>,
        y: Option<f64>,
        color: Option<String>,
    ) -> String {
        let node_type = match parse_node_type(node_type) {
            Ok(t) => t,
            Err(e) => return error_json(&e),
        };
        let color = match color.as_deref().map(parse_color).transpose() {
            Ok(c) => c,
            Err(e) => return error_json(&e),
        };
        let at = x.zip(y).map(|(x, y)| Point::new(x, y));
        self.dispatch(Message::CreateNode {
            name: name.to_string(),
            node_type,
            at,
            color,
        })
    }

    /// Apply the node property form (`{"name":..,"type":..,"color":..}`).
    pub fn update_node(&mut self, id: f64, form_json: &str) -> String {
        match serde_json::from_str::<NodeForm>(form_json) {
            Ok(form) => self.dispatch(Message::UpdateNode {
                id: NodeId(id as i64),
                form,
            }),
            Err(e) => error_json(&format!("invalid node form: {e}")),
        }
    }

    pub fn set_node_image(&mut self, id: f64, image: Option<String>) -> String {
        self.dispatch(Message::SetNodeImage {
            id: NodeId(id as i64),
            image,
        })
    }

    pub fn add_task(&mut self, node: f64, title: &str) -> String {
        self.dispatch(Message::AddTask {
            node: NodeId(node as i64),
            title: title.to_string(),
        })
    }

    pub fn toggle_task(&mut self, node: f64, task: f64) -> String {
        self.dispatch(Message::ToggleTask {
            node: NodeId(node as i64),
            task: TaskId(task as i64),
        })
    }

    pub fn remove_task(&mut self, node: f64, task: f64) -> String {
        self.dispatch(Message::RemoveTask {
            node: NodeId(node as i64),
            task: TaskId(task as i64),
        })
    }

    /// Apply the edge property form (`{"label":..,"color":..,"tasks":[..]}`).
    pub fn update_edge(&mut self, id: f64, form_json: &str) -> String {
        match serde_json::from_str::<EdgeForm>(form_json) {
            Ok(form) => self.dispatch(Message::UpdateEdge {
                id: EdgeId(id as i64),
                form,
            }),
            Err(e) => error_json(&format!("invalid edge form: {e}")),
        }
    }

    pub fn beautify(&mut self) -> String {
        self.dispatch(Message::Beautify)
    }

    pub fn undo(&mut self) -> String {
        self.dispatch(Message::Undo)
    }

    pub fn redo(&mut self) -> String {
        self.dispatch(Message::Redo)
    }

    /// Ask to delete the selection; answer a returned `confirm` prompt with
    /// [`RelCanvas::confirm_delete`] or [`RelCanvas::cancel_delete`].
    pub fn request_delete(&mut self) -> String {
        self.dispatch(Message::RequestDelete)
    }

    pub fn confirm_delete(&mut self) -> String {
        self.dispatch(Message::ConfirmDelete)
    }

    pub fn cancel_delete(&mut self) -> String {
        self.dispatch(Message::CancelDelete)
    }

    pub fn select_all(&mut self) -> String {
        self.dispatch(Message::SelectAll)
    }

    pub fn clear_selection(&mut self) -> String {
        self.dispatch(Message::ClearSelection)
    }

    // ─── View ────────────────────────────────────────────────────────────

    pub fn zoom_in(&mut self) -> String {
        self.dispatch(Message::ZoomIn)
    }

    pub fn zoom_out(&mut self) -> String {
        self.dispatch(Message::ZoomOut)
    }

    pub fn zoom_reset(&mut self) -> String {
        self.dispatch(Message::ZoomReset)
    }

    pub fn set_zoom(&mut self, level: f64) -> String {
        self.dispatch(Message::SetZoom(level))
    }

    pub fn zoom(&self) -> f64 {
        self.editor.viewport().zoom()
    }

    /// CSS `transform` for the canvas element (origin top-left).
    pub fn canvas_transform(&self) -> String {
        let vp = self.editor.viewport();
        transform_css(vp.pan_offset(), vp.zoom())
    }

    pub fn canvas_width(&self) -> f64 {
        self.editor.canvas_size().width
    }

    pub fn canvas_height(&self) -> f64 {
        self.editor.canvas_size().height
    }

    pub fn toggle_info_box(&mut self, node: f64) -> String {
        self.dispatch(Message::ToggleInfoBox(NodeId(node as i64)))
    }

    pub fn show_node_info(&mut self, show: bool) -> String {
        self.dispatch(Message::ShowNodeInfo(show))
    }

    pub fn set_background(&mut self, source: Option<String>) -> String {
        self.dispatch(Message::SetBackground(source))
    }

    /// A modal dialog opened or closed.
    pub fn set_modal(&mut self, open: bool) -> String {
        self.dispatch(Message::SetModal(open))
    }

    /// Client-space `[{x,y,width,height}]` of panels floating over the canvas.
    pub fn set_reserved_regions(&mut self, regions_json: &str) -> String {
        match serde_json::from_str::<Vec<Rect>>(regions_json) {
            Ok(regions) => self.dispatch(Message::SetReservedRegions(regions)),
            Err(e) => error_json(&format!("invalid regions: {e}")),
        }
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// The GETs whose responses go to [`RelCanvas::load`], as a JSON array
    /// in argument order.
    pub fn load_requests(graph_id: f64) -> String {
        let requests = sync::load_requests(GraphId(graph_id as i64));
        serde_json::to_string(&requests).unwrap_or_else(|e| {
            log::error!("could not encode requests: {e}");
            "[]".to_string()
        })
    }

    /// Requests ready to send, as a JSON array of
    /// `{"requestId","method","path","body"}`.
    pub fn drain_requests(&mut self) -> String {
        let requests = self.editor.drain_requests();
        serde_json::to_string(&requests).unwrap_or_else(|e| {
            log::error!("could not encode requests: {e}");
            "[]".to_string()
        })
    }

    /// Report a finished request. `status` is the HTTP status, or 0 when
    /// the request never reached the server (then `body` is the reason).
    pub fn persist_result(&mut self, request_id: f64, status: u16, body: &str) -> String {
        self.dispatch(Message::PersistResult {
            request_id: request_id as u64,
            result: api_result(status, body),
        })
    }

    // ─── Inspection ──────────────────────────────────────────────────────

    /// Current nodes and edges for the side panels.
    pub fn diagram_json(&self) -> String {
        let d = self.editor.diagram();
        json!({ "nodes": d.nodes, "edges": d.edges }).to_string()
    }

    /// `{"node":id|null,"edge":id|null,"empty":bool}`
    pub fn selection_json(&self) -> String {
        let sel = self.editor.selection();
        json!({
            "node": sel.focused_node().map(|id| id.0),
            "edge": sel.edge().map(|id| id.0),
            "empty": sel.is_empty(),
        })
        .to_string()
    }

    /// Name of the active interaction mode, for cursor styling.
    pub fn mode(&self) -> String {
        mode_name(self.editor.interaction().mode()).to_string()
    }
}

impl RelCanvas {
    fn dispatch(&mut self, msg: Message) -> String {
        match self.editor.update(msg) {
            Ok(out) => self.outcome_value(&out).to_string(),
            Err(e) => {
                log::debug!("rejected: {e}");
                error_json(&e.to_string())
            }
        }
    }

    fn outcome_value(&self, out: &Outcome) -> Value {
        if out.redraw {
            self.frames.request();
        }
        json!({
            "ok": true,
            "redraw": out.redraw,
            "confirm": out.confirm,
            "status": out.status,
            "hasRequests": !self.editor.queue().queued().is_empty(),
        })
    }
}

// ─── Setup ───────────────────────────────────────────────────────────────

fn init_logging() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            console_error_panic_hook::set_once();
            if console_log::init_with_level(log::Level::Info).is_err() {
                web_sys::console::warn_1(&"logger already installed".into());
            }
        });
    }
}

fn parse_config(json: &str) -> EditorConfig {
    if json.trim().is_empty() {
        return EditorConfig::default();
    }
    EditorConfig::from_json(json).unwrap_or_else(|e| {
        log::warn!("{e}; using default config");
        EditorConfig::default()
    })
}

fn text_measure() -> Box<dyn TextMeasure> {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen::JsCast;
        let ctx = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|doc| doc.create_element("canvas").ok())
            .and_then(|el| el.dyn_into::<web_sys::HtmlCanvasElement>().ok())
            .and_then(|canvas| canvas.get_context("2d").ok().flatten())
            .and_then(|obj| obj.dyn_into::<CanvasRenderingContext2d>().ok());
        if let Some(ctx) = ctx {
            return Box::new(render2d::CanvasTextMeasure::new(ctx));
        }
        log::warn!("no 2D context for text measurement; using estimates");
    }
    Box::new(ApproxMeasure)
}

// ─── Conversions ─────────────────────────────────────────────────────────

fn error_json(message: &str) -> String {
    json!({ "ok": false, "error": message }).to_string()
}

fn parse_load(graph_json: &str, nodes_json: &str, edges_json: &str) -> Result<Message, ModelError> {
    Ok(Message::Load {
        graph: graph_from_json(graph_json)?,
        nodes: nodes_from_json(nodes_json)?,
        edges: edges_from_json(edges_json)?,
    })
}

fn parse_node_type(name: &str) -> Result<NodeType, String> {
    serde_json::from_value(Value::String(name.to_string())).map_err(|_| format!("unknown node type \"{name}\""))
}

fn parse_color(hex: &str) -> Result<Color, String> {
    Color::from_hex(hex).ok_or_else(|| format!("invalid color \"{hex}\""))
}

/// Map a host fetch outcome onto the editor's result type.
fn api_result(status: u16, body: &str) -> Result<Value, ApiError> {
    match status {
        0 => Err(ApiError::Network(body.to_string())),
        200..=299 if body.trim().is_empty() => Ok(Value::Null),
        200..=299 => serde_json::from_str(body).map_err(|e| ApiError::Network(format!("unreadable response: {e}"))),
        _ => Err(ApiError::Status {
            status,
            message: error_message(body),
        }),
    }
}

/// Pull `"error"` out of a JSON error body, or use the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn transform_css(pan: Point, zoom: f64) -> String {
    format!("translate({}px, {}px) scale({zoom})", pan.x, pan.y)
}

fn mode_name(mode: &Interaction) -> &'static str {
    match mode {
        Interaction::Idle => "idle",
        Interaction::EdgeCreating { .. } => "edgeCreating",
        Interaction::DraggingNode { .. } => "draggingNode",
        Interaction::DraggingSelectedNodes { .. } => "draggingSelection",
        Interaction::DraggingEdge { .. } => "draggingEdge",
        Interaction::DraggingBendPoint { .. } => "draggingBendPoint",
        Interaction::MarqueeSelecting { .. } => "marquee",
        Interaction::Panning { .. } => "panning",
    }
}

fn action_to_name(action: ShortcutAction) -> &'static str {
    match action {
        ShortcutAction::Undo => "undo",
        ShortcutAction::Redo => "redo",
        ShortcutAction::Delete => "delete",
        ShortcutAction::SelectAll => "selectAll",
        ShortcutAction::ZoomIn => "zoomIn",
        ShortcutAction::ZoomOut => "zoomOut",
        ShortcutAction::ZoomReset => "zoomReset",
        ShortcutAction::Cancel => "cancel",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn canvas() -> RelCanvas {
        let mut c = RelCanvas::new("");
        let out = c.load(
            r#"{"id":1,"name":"G"}"#,
            r##"[{"id":1,"graphId":1,"x":100,"y":100,"radius":30,"name":"A","type":"person","color":"#FF8800","tasks":[]},
                {"id":2,"graphId":1,"x":400,"y":100,"radius":30,"name":"B","type":"event","color":"#0088FF","tasks":[]}]"##,
            "[]",
        );
        assert_eq!(parse(&out)["ok"], json!(true), "{out}");
        c
    }

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn click_then_release_selects_the_node() {
        let mut c = canvas();
        let down = parse(&c.handle_pointer_down(100.0, 100.0, 0.0, 0.0, false, false, false, false, 0.0));
        assert_eq!(down["redraw"], json!(true));
        assert_eq!(c.mode(), "draggingNode");
        c.handle_pointer_up(100.0, 100.0, 0.0, 0.0);
        assert_eq!(parse(&c.selection_json())["node"], json!(1));
        assert_eq!(c.mode(), "idle");
    }

    #[test]
    fn errors_come_back_as_json() {
        let mut c = canvas();
        let out = parse(&c.create_node("  ", "person", None, None, None));
        assert_eq!(out["ok"], json!(false));
        assert_eq!(out["error"], json!("node name must not be empty"));

        let out = parse(&c.create_node("X", "planet", None, None, None));
        assert_eq!(out["error"], json!("unknown node type \"planet\""));

        let out = parse(&c.update_node(1.0, "{not json"));
        assert_eq!(out["ok"], json!(false));
    }

    #[test]
    fn created_node_is_drained_as_a_post() {
        let mut c = canvas();
        let out = parse(&c.create_node("Harbor", "location", Some(250.0), Some(300.0), Some("#336699".into())));
        assert_eq!(out["hasRequests"], json!(true));
        let reqs = parse(&c.drain_requests());
        assert_eq!(reqs[0]["method"], json!("POST"));
        assert_eq!(reqs[0]["path"], json!("/api/nodes"));
        assert_eq!(reqs[0]["body"]["color"], json!("#336699"));

        let id = reqs[0]["requestId"].as_f64().unwrap();
        c.persist_result(id, 201, r#"{"id":12}"#);
        let names: Vec<Value> = parse(&c.diagram_json())["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["id"].clone())
            .collect();
        assert_eq!(names, vec![json!(1), json!(2), json!(12)]);
    }

    #[test]
    fn key_results_name_the_shortcut() {
        let mut c = canvas();
        let out = parse(&c.handle_key("a", true, false, false, false));
        assert_eq!(out["action"], json!("selectAll"));
        let out = parse(&c.handle_key("q", false, false, false, false));
        assert_eq!(out["action"], json!("none"));
    }

    #[test]
    fn fetch_outcomes_map_to_api_results() {
        assert_eq!(api_result(204, ""), Ok(Value::Null));
        assert_eq!(api_result(200, r#"{"id":3}"#), Ok(json!({ "id": 3 })));
        assert_eq!(
            api_result(0, "offline"),
            Err(ApiError::Network("offline".into()))
        );
        assert_eq!(
            api_result(422, r#"{"error":"name taken"}"#),
            Err(ApiError::Status {
                status: 422,
                message: "name taken".into()
            })
        );
        assert_eq!(
            api_result(502, "Bad Gateway\n"),
            Err(ApiError::Status {
                status: 502,
                message: "Bad Gateway".into()
            })
        );
    }

    #[test]
    fn transform_applies_pan_before_scale() {
        assert_eq!(transform_css(Point::new(-40.0, 12.5), 1.5), "translate(-40px, 12.5px) scale(1.5)");
    }

    #[test]
    fn load_requests_list_the_three_reads() {
        let requests: Value = serde_json::from_str(&RelCanvas::load_requests(7.0)).unwrap();
        assert_eq!(
            requests,
            json!([
                {"requestId": 0, "method": "GET", "path": "/api/graphs/7"},
                {"requestId": 0, "method": "GET", "path": "/api/nodes?graphId=7"},
                {"requestId": 0, "method": "GET", "path": "/api/edges?graphId=7"},
            ])
        );
    }

    #[test]
    fn bad_config_falls_back_to_defaults() {
        assert_eq!(parse_config("{oops"), EditorConfig::default());
        assert_eq!(parse_config(r#"{"historyCap":10}"#).history_cap, 10);
        assert_eq!(parse_config(r#"{"zoom":{"max":0.2}}"#), EditorConfig::default());
        assert_eq!(parse_config(r#"{"infoBox":{"maxWidth":100}}"#), EditorConfig::default());
    }
}
