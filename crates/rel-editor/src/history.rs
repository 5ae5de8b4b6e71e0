//! Linear undo/redo over full diagram snapshots.
//!
//! Every committed action pushes a deep copy of the node and edge lists.
//! Undo and redo move an index through the list and hand the snapshot back
//! to the editor, which swaps it in while the history is in the
//! [`Phase::Restoring`] phase. Pushes during that phase are ignored, so a
//! restore can never record itself.

use rel_core::{Diagram, EdgeId, NodeId, TaskId};

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub diagram: Diagram,
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Recording,
    Restoring,
}

/// Manages the snapshot list and the current position in it.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Snapshot>,
    /// Position of the live state in `entries`.
    index: usize,
    cap: usize,
    phase: Phase,
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Vec::with_capacity(cap),
            index: 0,
            cap: cap.max(1),
            phase: Phase::Recording,
        }
    }

    /// Drop every entry and start over from `initial`.
    pub fn reset(&mut self, initial: &Diagram, timestamp_ms: f64) {
        self.entries.clear();
        self.index = 0;
        self.phase = Phase::Recording;
        self.entries.push(Snapshot {
            diagram: initial.clone(),
            timestamp_ms,
        });
    }

    /// Record the current state. Returns `false` when nothing was pushed:
    /// during a restore, or when the state equals the current entry.
    pub fn push(&mut self, diagram: &Diagram, timestamp_ms: f64) -> bool {
        if self.phase == Phase::Restoring {
            log::trace!("history: push ignored while restoring");
            return false;
        }
        if self.current().is_some_and(|s| &s.diagram == diagram) {
            return false;
        }

        // Discard the redo branch.
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(Snapshot {
            diagram: diagram.clone(),
            timestamp_ms,
        });
        if self.entries.len() > self.cap {
            self.entries.remove(0);
        }
        self.index = self.entries.len() - 1;
        true
    }

    /// Step back. Enters the restoring phase and returns the state to
    /// apply; the caller must call [`History::finish_restore`] afterwards.
    pub fn undo(&mut self) -> Option<Diagram> {
        if self.phase == Phase::Restoring || self.index == 0 || self.entries.is_empty() {
            return None;
        }
        self.index -= 1;
        self.phase = Phase::Restoring;
        log::debug!("history: undo to {}/{}", self.index + 1, self.entries.len());
        Some(self.entries[self.index].diagram.clone())
    }

    /// Step forward. Same contract as [`History::undo`].
    pub fn redo(&mut self) -> Option<Diagram> {
        if self.phase == Phase::Restoring || self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.phase = Phase::Restoring;
        log::debug!("history: redo to {}/{}", self.index + 1, self.entries.len());
        Some(self.entries[self.index].diagram.clone())
    }

    /// Leave the restoring phase.
    pub fn finish_restore(&mut self) {
        self.phase = Phase::Recording;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace a pending node id in every stored snapshot.
    pub fn rewrite_node_id(&mut self, from: NodeId, to: NodeId) {
        for entry in &mut self.entries {
            entry.diagram.rename_node(from, to);
        }
    }

    pub fn rewrite_edge_id(&mut self, from: EdgeId, to: EdgeId) {
        for entry in &mut self.entries {
            entry.diagram.rename_edge(from, to);
        }
    }

    pub fn rewrite_task_id(&mut self, from: TaskId, to: TaskId) {
        for entry in &mut self.entries {
            entry.diagram.rename_task(from, to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rel_core::{GraphId, Node, NodeType, Point};

    fn diagram_with(n: usize) -> Diagram {
        let nodes = (0..n)
            .map(|i| {
                let mut node = Node::new(GraphId(1), format!("n{i}"), NodeType::Concept, Point::new(i as f64, 0.0));
                node.id = NodeId(i as i64 + 1);
                node
            })
            .collect();
        Diagram::from_parts(nodes, vec![])
    }

    #[test]
    fn undo_then_redo_restores_exactly() {
        let mut h = History::new(50);
        h.reset(&diagram_with(0), 0.0);
        for i in 1..=5 {
            h.push(&diagram_with(i), i as f64);
        }
        let undone = h.undo().unwrap();
        h.finish_restore();
        assert_eq!(undone, diagram_with(4));
        let redone = h.redo().unwrap();
        h.finish_restore();
        assert_eq!(redone, diagram_with(5));
    }

    #[test]
    fn boundaries_are_noops() {
        let mut h = History::new(50);
        h.reset(&diagram_with(0), 0.0);
        assert!(h.undo().is_none());
        assert!(h.redo().is_none());
        assert_eq!(h.phase(), Phase::Recording);
    }

    #[test]
    fn cap_evicts_oldest() {
        let mut h = History::new(50);
        for i in 0..51 {
            assert!(h.push(&diagram_with(i), i as f64));
        }
        assert_eq!(h.len(), 50);
        assert_eq!(h.current().unwrap().diagram, diagram_with(50));
        // Oldest (empty) snapshot is gone: 49 undos reach diagram_with(1).
        let mut last = None;
        while let Some(d) = h.undo() {
            h.finish_restore();
            last = Some(d);
        }
        assert_eq!(last.unwrap(), diagram_with(1));
    }

    #[test]
    fn push_while_restoring_is_ignored() {
        let mut h = History::new(50);
        h.reset(&diagram_with(0), 0.0);
        h.push(&diagram_with(1), 1.0);
        h.undo().unwrap();
        assert!(!h.push(&diagram_with(7), 2.0));
        h.finish_restore();
        assert_eq!(h.len(), 2);
        assert!(h.can_redo());
    }

    #[test]
    fn push_discards_redo_branch() {
        let mut h = History::new(50);
        h.reset(&diagram_with(0), 0.0);
        h.push(&diagram_with(1), 1.0);
        h.push(&diagram_with(2), 2.0);
        h.undo().unwrap();
        h.finish_restore();
        h.push(&diagram_with(3), 3.0);
        assert!(!h.can_redo());
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn identical_snapshot_is_skipped() {
        let mut h = History::new(50);
        h.reset(&diagram_with(2), 0.0);
        assert!(!h.push(&diagram_with(2), 1.0));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn pending_ids_are_rewritten_in_snapshots() {
        let mut d = diagram_with(1);
        d.nodes[0].id = NodeId(-9);
        let mut h = History::new(50);
        h.reset(&Diagram::new(), 0.0);
        h.push(&d, 1.0);
        h.rewrite_node_id(NodeId(-9), NodeId(40));
        assert_eq!(h.current().unwrap().diagram.nodes[0].id, NodeId(40));
    }
}
