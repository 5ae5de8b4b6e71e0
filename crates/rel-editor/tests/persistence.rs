//! Integration tests: optimistic edits, request draining and id assignment.

use pretty_assertions::assert_eq;
use rel_core::{Edge, EdgeId, EditorConfig, GraphId, GraphRecord, Node, NodeId, NodeType, Point, TaskId};
use rel_editor::{ApiError, Editor, Message, Method, PersistOp};
use serde_json::json;

fn node(id: i64, x: f64, y: f64) -> Node {
    let mut n = Node::new(GraphId(1), format!("n{id}"), NodeType::Organization, Point::new(x, y));
    n.id = NodeId(id);
    n
}

fn editor() -> Editor {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ed = Editor::headless(EditorConfig::default());
    let mut e = Edge::new(GraphId(1), NodeId(1), NodeId(2));
    e.id = EdgeId(9);
    ed.update(Message::Load {
        graph: GraphRecord::new(GraphId(1)),
        nodes: vec![node(1, 100.0, 100.0), node(2, 400.0, 100.0)],
        edges: vec![e],
    })
    .unwrap();
    ed
}

fn create(ed: &mut Editor, name: &str) -> NodeId {
    ed.update(Message::CreateNode {
        name: name.into(),
        node_type: NodeType::Location,
        at: Some(Point::new(250.0, 400.0)),
        color: None,
    })
    .unwrap();
    ed.diagram().nodes.last().unwrap().id
}

#[test]
fn created_node_gets_server_id_everywhere() {
    let mut ed = editor();
    let pending = create(&mut ed, "Harbor");

    let reqs = ed.drain_requests();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].method, Method::Post);
    assert_eq!(reqs[0].path, "/api/nodes");
    let body = reqs[0].body.clone().unwrap();
    assert_eq!(body["name"], json!("Harbor"));
    assert_eq!(body["type"], json!("location"));
    assert_eq!(body["graphId"], json!(1));

    ed.update(Message::PersistResult {
        request_id: reqs[0].request_id,
        result: Ok(json!({ "id": 31, "name": "Harbor" })),
    })
    .unwrap();

    assert!(ed.diagram().node(pending).is_none());
    assert!(ed.diagram().node(NodeId(31)).is_some());
    assert_eq!(ed.selection().focused_node(), Some(NodeId(31)));
    assert_eq!(
        ed.history().current().unwrap().diagram.nodes.last().unwrap().id,
        NodeId(31)
    );
}

#[test]
fn task_on_new_node_waits_for_the_node() {
    let mut ed = editor();
    let pending = create(&mut ed, "Depot");
    ed.update(Message::AddTask {
        node: pending,
        title: "inspect".into(),
    })
    .unwrap();

    let first = ed.drain_requests();
    assert_eq!(first.len(), 1, "only the node create goes out");
    ed.update(Message::PersistResult {
        request_id: first[0].request_id,
        result: Ok(json!({ "id": 40 })),
    })
    .unwrap();

    let second = ed.drain_requests();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].path, "/api/tasks");
    assert_eq!(
        second[0].body,
        Some(json!({ "nodeId": 40, "title": "inspect", "done": false }))
    );
    ed.update(Message::PersistResult {
        request_id: second[0].request_id,
        result: Ok(json!({ "id": 77 })),
    })
    .unwrap();
    assert_eq!(ed.diagram().node(NodeId(40)).unwrap().tasks[0].id, Some(TaskId(77)));

    ed.update(Message::ToggleTask {
        node: NodeId(40),
        task: TaskId(77),
    })
    .unwrap();
    let third = ed.drain_requests();
    assert_eq!(third[0].method, Method::Put);
    assert_eq!(third[0].path, "/api/tasks/77");
}

#[test]
fn empty_task_title_is_rejected() {
    let mut ed = editor();
    let err = ed
        .update(Message::AddTask {
            node: NodeId(1),
            title: " ".into(),
        })
        .unwrap_err();
    assert_eq!(err, rel_editor::EditorError::EmptyTaskTitle);
    assert!(ed.queue().is_idle());
}

#[test]
fn deleting_a_node_deletes_its_edges_too() {
    let mut ed = editor();
    ed.update(Message::Input(rel_editor::InputEvent::PointerDown {
        client: Point::new(100.0, 100.0),
        origin: Point::ORIGIN,
        modifiers: rel_editor::Modifiers::NONE,
        time_ms: 0.0,
    }))
    .unwrap();
    let prompt = ed.update(Message::RequestDelete).unwrap().confirm.unwrap();
    assert_eq!(prompt, "Delete \"n1\" and its 1 connection?");
    ed.update(Message::ConfirmDelete).unwrap();

    assert!(ed.diagram().edges.is_empty());
    let paths: Vec<(Method, String)> = ed
        .drain_requests()
        .into_iter()
        .map(|r| (r.method, r.path))
        .collect();
    assert_eq!(
        paths,
        vec![
            (Method::Delete, "/api/edges/9".to_string()),
            (Method::Delete, "/api/nodes/1".to_string()),
        ]
    );
}

#[test]
fn failed_save_keeps_local_state_and_retries() {
    let mut ed = editor();
    ed.update(Message::UpdateNode {
        id: NodeId(2),
        form: rel_editor::NodeForm {
            name: Some("Renamed".into()),
            ..Default::default()
        },
    })
    .unwrap();
    let reqs = ed.drain_requests();
    let out = ed
        .update(Message::PersistResult {
            request_id: reqs[0].request_id,
            result: Err(ApiError::Status {
                status: 500,
                message: "boom".into(),
            }),
        })
        .unwrap();
    assert!(out.status.unwrap().contains("500"));
    assert_eq!(ed.diagram().node(NodeId(2)).unwrap().name, "Renamed");

    ed.update(Message::ZoomIn).unwrap();
    let retry: Vec<String> = ed.drain_requests().into_iter().map(|r| r.path).collect();
    assert_eq!(retry, vec!["/api/nodes/2".to_string(), "/api/graphs/1".to_string()]);
}

#[test]
fn undo_before_sync_cancels_the_queued_delete() {
    let mut ed = editor();
    ed.update(Message::Input(rel_editor::InputEvent::PointerDown {
        client: Point::new(400.0, 100.0),
        origin: Point::ORIGIN,
        modifiers: rel_editor::Modifiers::NONE,
        time_ms: 0.0,
    }))
    .unwrap();
    ed.update(Message::RequestDelete).unwrap();
    ed.update(Message::ConfirmDelete).unwrap();
    assert!(ed.queue().queued().contains(&PersistOp::DeleteNode(NodeId(2))));

    ed.update(Message::Undo).unwrap();
    assert!(ed.diagram().node(NodeId(2)).is_some());
    assert!(ed.queue().queued().is_empty());
}

#[test]
fn undo_after_server_delete_recreates_with_fresh_ids() {
    let mut ed = editor();
    ed.update(Message::Input(rel_editor::InputEvent::PointerDown {
        client: Point::new(400.0, 100.0),
        origin: Point::ORIGIN,
        modifiers: rel_editor::Modifiers::NONE,
        time_ms: 0.0,
    }))
    .unwrap();
    ed.update(Message::RequestDelete).unwrap();
    ed.update(Message::ConfirmDelete).unwrap();
    for req in ed.drain_requests() {
        ed.update(Message::PersistResult {
            request_id: req.request_id,
            result: Ok(json!({})),
        })
        .unwrap();
    }

    ed.update(Message::Undo).unwrap();
    let revived = ed.diagram().nodes.last().unwrap().id;
    assert!(revived.is_pending());
    assert_eq!(ed.diagram().edges[0].target_id, revived);
    assert!(ed.diagram().edges[0].id.is_pending());

    let reqs = ed.drain_requests();
    assert_eq!(reqs.len(), 1, "edge create waits for its endpoint");
    assert_eq!(reqs[0].path, "/api/nodes");
    ed.update(Message::PersistResult {
        request_id: reqs[0].request_id,
        result: Ok(json!({ "id": 55 })),
    })
    .unwrap();
    let reqs = ed.drain_requests();
    assert_eq!(reqs[0].path, "/api/edges");
    assert_eq!(reqs[0].body.as_ref().unwrap()["targetId"], json!(55));

    // Redo deletes the recreated node under its server id.
    ed.update(Message::Redo).unwrap();
    assert!(ed.diagram().node(NodeId(55)).is_none());
    assert!(ed.queue().queued().contains(&PersistOp::DeleteNode(NodeId(55))));
}

fn ack_all(ed: &mut Editor) {
    for req in ed.drain_requests() {
        ed.update(Message::PersistResult {
            request_id: req.request_id,
            result: Ok(json!({})),
        })
        .unwrap();
    }
}

#[test]
fn redo_after_server_delete_restores_content_under_a_new_id() {
    let mut ed = editor();
    create(&mut ed, "Harbor");
    let reqs = ed.drain_requests();
    ed.update(Message::PersistResult {
        request_id: reqs[0].request_id,
        result: Ok(json!({ "id": 31 })),
    })
    .unwrap();
    let created = ed.diagram().node(NodeId(31)).unwrap().clone();

    ed.update(Message::Undo).unwrap();
    let reqs = ed.drain_requests();
    assert_eq!(reqs[0].method, Method::Delete);
    assert_eq!(reqs[0].path, "/api/nodes/31");
    ed.update(Message::PersistResult {
        request_id: reqs[0].request_id,
        result: Ok(json!({})),
    })
    .unwrap();
    ack_all(&mut ed);

    // Id 31 is gone on the server, so undo then redo restores the node's
    // content exactly but not its identity.
    ed.update(Message::Redo).unwrap();
    let revived = ed.diagram().nodes.last().unwrap().clone();
    assert!(revived.id.is_pending());
    assert_ne!(revived.id, created.id);
    assert_eq!(
        Node {
            id: created.id,
            ..revived.clone()
        },
        created
    );
    assert!(ed.queue().queued().contains(&PersistOp::CreateNode(revived.id)));
}

#[test]
fn viewport_save_sends_the_graph_record() {
    let mut ed = editor();
    ed.update(Message::ShowNodeInfo(true)).unwrap();
    let reqs = ed.drain_requests();
    assert_eq!(reqs[0].method, Method::Put);
    assert_eq!(reqs[0].path, "/api/graphs/1");
    assert_eq!(reqs[0].body.as_ref().unwrap()["showNodeInfo"], json!(true));
    let wire = serde_json::to_value(&reqs[0]).unwrap();
    assert_eq!(wire["method"], json!("PUT"));
    assert_eq!(wire["requestId"], json!(reqs[0].request_id));
}
