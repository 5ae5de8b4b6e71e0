//! What the user has selected. Exactly one kind is active at a time.

use rel_core::{BendRef, Diagram, EdgeId, NodeId};
use rel_render::Highlights;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    #[default]
    None,
    Node(NodeId),
    /// An edge, optionally with one of its bend points.
    Edge { edge: EdgeId, bend: Option<usize> },
    /// Marquee or select-all result. `primary` is set when exactly one node
    /// is in the group, for the property panel.
    Group {
        nodes: Vec<NodeId>,
        bend_points: Vec<BendRef>,
        primary: Option<NodeId>,
    },
}

impl Selection {
    pub fn group(nodes: Vec<NodeId>, bend_points: Vec<BendRef>) -> Self {
        if nodes.is_empty() && bend_points.is_empty() {
            return Selection::None;
        }
        let primary = match nodes.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        Selection::Group {
            nodes,
            bend_points,
            primary,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::None)
    }

    pub fn in_group(&self, id: NodeId) -> bool {
        matches!(self, Selection::Group { nodes, .. } if nodes.contains(&id))
    }

    /// The node shown in the property panel, if any.
    pub fn focused_node(&self) -> Option<NodeId> {
        match self {
            Selection::Node(id) => Some(*id),
            Selection::Group { primary, .. } => *primary,
            _ => None,
        }
    }

    pub fn edge(&self) -> Option<EdgeId> {
        match self {
            Selection::Edge { edge, .. } => Some(*edge),
            _ => None,
        }
    }

    pub fn highlights(&self) -> Highlights {
        match self {
            Selection::None => Highlights::default(),
            Selection::Node(id) => Highlights {
                node: Some(*id),
                ..Default::default()
            },
            Selection::Edge { edge, bend } => Highlights {
                edge: Some(*edge),
                bend: bend.map(|index| BendRef { edge: *edge, index }),
                ..Default::default()
            },
            Selection::Group {
                nodes,
                bend_points,
                primary,
            } => Highlights {
                node: *primary,
                group_nodes: nodes.clone(),
                group_bends: bend_points.clone(),
                ..Default::default()
            },
        }
    }

    pub fn rename_node(&mut self, from: NodeId, to: NodeId) {
        let swap = |id: &mut NodeId| {
            if *id == from {
                *id = to;
            }
        };
        match self {
            Selection::Node(id) => swap(id),
            Selection::Group { nodes, primary, .. } => {
                nodes.iter_mut().for_each(swap);
                primary.iter_mut().for_each(swap);
            }
            _ => {}
        }
    }

    pub fn rename_edge(&mut self, from: EdgeId, to: EdgeId) {
        match self {
            Selection::Edge { edge, .. } if *edge == from => *edge = to,
            Selection::Group { bend_points, .. } => {
                for r in bend_points.iter_mut().filter(|r| r.edge == from) {
                    r.edge = to;
                }
            }
            _ => {}
        }
    }

    /// Drop references that no longer resolve in `diagram`.
    pub fn prune(&mut self, diagram: &Diagram) {
        match self {
            Selection::None => {}
            Selection::Node(id) => {
                if diagram.node(*id).is_none() {
                    *self = Selection::None;
                }
            }
            Selection::Edge { edge, bend } => match diagram.edge(*edge) {
                None => *self = Selection::None,
                Some(e) => {
                    if bend.is_some_and(|i| i >= e.bend_points.len()) {
                        *bend = None;
                    }
                }
            },
            Selection::Group {
                nodes, bend_points, ..
            } => {
                nodes.retain(|id| diagram.node(*id).is_some());
                bend_points.retain(|r| diagram.bend_point(*r).is_some());
                *self = Selection::group(std::mem::take(nodes), std::mem::take(bend_points));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rel_core::{GraphId, Node, NodeType, Point};

    #[test]
    fn single_node_group_has_primary() {
        let s = Selection::group(vec![NodeId(3)], vec![]);
        assert_eq!(s.focused_node(), Some(NodeId(3)));
        let s = Selection::group(vec![NodeId(3), NodeId(4)], vec![]);
        assert_eq!(s.focused_node(), None);
        assert!(Selection::group(vec![], vec![]).is_empty());
    }

    #[test]
    fn prune_drops_missing_members() {
        let mut n = Node::new(GraphId(1), "a", NodeType::Person, Point::ORIGIN);
        n.id = NodeId(1);
        let d = Diagram::from_parts(vec![n], vec![]);
        let mut s = Selection::group(vec![NodeId(1), NodeId(2)], vec![]);
        s.prune(&d);
        assert_eq!(s.focused_node(), Some(NodeId(1)));

        let mut s = Selection::Edge {
            edge: EdgeId(5),
            bend: None,
        };
        s.prune(&d);
        assert!(s.is_empty());
    }

    #[test]
    fn rename_reaches_group_and_primary() {
        let mut s = Selection::group(vec![NodeId(-1)], vec![]);
        s.rename_node(NodeId(-1), NodeId(8));
        assert_eq!(
            s,
            Selection::Group {
                nodes: vec![NodeId(8)],
                bend_points: vec![],
                primary: Some(NodeId(8)),
            }
        );
    }
}
