//! Floating per-node task boxes.
//!
//! [`info_box_layout`] is the only place box geometry is computed. The
//! display list draws from it and the pointer handler hit-tests the
//! expand/collapse toggle against it.

use rel_core::{Diagram, InfoBoxConfig, Node, NodeId, Point, Rect};
use std::collections::HashSet;

const ELLIPSIS: char = '…';

/// Text width measurement. Backends with real font metrics implement this;
/// headless code uses [`ApproxMeasure`].
pub trait TextMeasure {
    fn width(&self, text: &str, px: f64) -> f64;
}

/// Fixed advance of `0.6 × px` per character.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxMeasure;

impl TextMeasure for ApproxMeasure {
    fn width(&self, text: &str, px: f64) -> f64 {
        text.chars().count() as f64 * px * 0.6
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoLine {
    pub text: String,
    pub done: bool,
    /// Left end of the text baseline box (top-left).
    pub origin: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoBoxLayout {
    pub node: NodeId,
    pub rect: Rect,
    pub title: String,
    pub title_origin: Point,
    pub lines: Vec<InfoLine>,
    /// Present when the node has more tasks than fit collapsed.
    pub toggle: Option<Rect>,
    pub expanded: bool,
    /// Tasks not shown.
    pub hidden: usize,
}

impl InfoBoxLayout {
    pub fn toggle_label(&self) -> String {
        if self.expanded {
            "less".to_string()
        } else {
            format!("+{}", self.hidden)
        }
    }
}

/// Cut `text` to fit `max_width`, ending in an ellipsis when shortened.
pub fn truncate(text: &str, max_width: f64, px: f64, measure: &dyn TextMeasure) -> String {
    if measure.width(text, px) <= max_width {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let mut candidate: String = chars.iter().collect();
        candidate.push(ELLIPSIS);
        if measure.width(&candidate, px) <= max_width {
            return candidate;
        }
    }
    ELLIPSIS.to_string()
}

/// Lay out the info box of `node`. `None` when the node has no tasks.
pub fn info_box_layout(
    node: &Node,
    expanded: bool,
    cfg: &InfoBoxConfig,
    measure: &dyn TextMeasure,
) -> Option<InfoBoxLayout> {
    if node.tasks.is_empty() {
        return None;
    }

    let title = node
        .task_list_name
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&node.name);
    let raw_lines: Vec<(String, bool)> = node
        .tasks
        .iter()
        .map(|t| (format!("{} {}", if t.done { '☑' } else { '☐' }, t.title), t.done))
        .collect();

    let has_toggle = node.tasks.len() > cfg.collapsed_lines;
    let wanted = if expanded {
        raw_lines.len()
    } else {
        raw_lines.len().min(cfg.collapsed_lines)
    };

    // Width follows the widest text, within bounds.
    let widest = raw_lines[..wanted]
        .iter()
        .map(|(s, _)| measure.width(s, cfg.line_px))
        .fold(measure.width(title, cfg.title_px), f64::max);
    let width = (widest + cfg.padding * 2.0).clamp(cfg.min_width, cfg.max_width);

    let toggle_band = if has_toggle { cfg.toggle_height + 4.0 } else { 0.0 };
    let chrome = cfg.padding * 2.0 + cfg.line_height + toggle_band;
    let fit = ((cfg.max_height - chrome) / cfg.line_height).floor().max(0.0) as usize;
    let shown = wanted.min(fit);
    let height = (chrome + shown as f64 * cfg.line_height).clamp(cfg.min_height, cfg.max_height);

    let rect = Rect::new(node.x + node.radius + cfg.offset, node.y - node.radius, width, height);
    let text_width = width - cfg.padding * 2.0;
    let left = rect.x + cfg.padding;

    let lines = raw_lines
        .into_iter()
        .take(shown)
        .enumerate()
        .map(|(i, (text, done))| InfoLine {
            text: truncate(&text, text_width, cfg.line_px, measure),
            done,
            origin: Point::new(left, rect.y + cfg.padding + cfg.line_height * (i as f64 + 1.0)),
        })
        .collect();

    let toggle = has_toggle.then(|| {
        Rect::new(
            rect.max_x() - cfg.padding - cfg.toggle_width,
            rect.max_y() - cfg.padding - cfg.toggle_height,
            cfg.toggle_width,
            cfg.toggle_height,
        )
    });

    Some(InfoBoxLayout {
        node: node.id,
        rect,
        title: truncate(title, text_width, cfg.title_px, measure),
        title_origin: Point::new(left, rect.y + cfg.padding),
        lines,
        toggle,
        expanded,
        hidden: node.tasks.len() - shown,
    })
}

/// Layouts of every node that has tasks, in draw order.
pub fn info_boxes(
    diagram: &Diagram,
    expanded: &HashSet<NodeId>,
    cfg: &InfoBoxConfig,
    measure: &dyn TextMeasure,
) -> Vec<InfoBoxLayout> {
    diagram
        .nodes
        .iter()
        .filter_map(|n| info_box_layout(n, expanded.contains(&n.id), cfg, measure))
        .collect()
}

/// Node whose toggle button contains `p`, topmost first.
pub fn toggle_at(boxes: &[InfoBoxLayout], p: Point) -> Option<NodeId> {
    boxes
        .iter()
        .rev()
        .find(|b| b.toggle.is_some_and(|t| t.contains(p)))
        .map(|b| b.node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rel_core::{GraphId, NodeType, Task};

    fn node_with_tasks(n: usize) -> Node {
        let mut node = Node::new(GraphId(1), "Ada", NodeType::Person, Point::new(100.0, 100.0));
        node.id = NodeId(1);
        node.tasks = (0..n).map(|i| Task::new(format!("task {i}"))).collect();
        node
    }

    #[test]
    fn no_tasks_no_box() {
        let cfg = InfoBoxConfig::default();
        assert!(info_box_layout(&node_with_tasks(0), false, &cfg, &ApproxMeasure).is_none());
    }

    #[test]
    fn box_sits_right_of_the_node() {
        let cfg = InfoBoxConfig::default();
        let b = info_box_layout(&node_with_tasks(1), false, &cfg, &ApproxMeasure).unwrap();
        assert_eq!((b.rect.x, b.rect.y), (152.0, 60.0));
        assert_eq!(b.rect.width, cfg.min_width);
        assert!(b.toggle.is_none());
    }

    #[test]
    fn collapsed_shows_three_lines_and_a_toggle() {
        let cfg = InfoBoxConfig::default();
        let b = info_box_layout(&node_with_tasks(5), false, &cfg, &ApproxMeasure).unwrap();
        assert_eq!(b.lines.len(), 3);
        assert_eq!(b.hidden, 2);
        assert_eq!(b.toggle_label(), "+2");
        let expanded = info_box_layout(&node_with_tasks(5), true, &cfg, &ApproxMeasure).unwrap();
        assert_eq!(expanded.lines.len(), 5);
        assert!(expanded.rect.height > b.rect.height);
    }

    #[test]
    fn expanded_height_is_capped() {
        let cfg = InfoBoxConfig::default();
        let b = info_box_layout(&node_with_tasks(100), true, &cfg, &ApproxMeasure).unwrap();
        assert!(b.rect.height <= cfg.max_height);
        assert!(b.hidden > 0);
        let last = b.lines.last().unwrap();
        assert!(last.origin.y + cfg.line_height <= b.rect.max_y());
    }

    #[test]
    fn long_lines_are_truncated_with_ellipsis() {
        let cfg = InfoBoxConfig::default();
        let mut node = node_with_tasks(1);
        node.tasks[0].title = "x".repeat(200);
        let b = info_box_layout(&node, false, &cfg, &ApproxMeasure).unwrap();
        assert_eq!(b.rect.width, cfg.max_width);
        assert!(b.lines[0].text.ends_with('…'));
        assert!(ApproxMeasure.width(&b.lines[0].text, cfg.line_px) <= cfg.max_width - cfg.padding * 2.0);
    }

    #[test]
    fn toggle_hit_uses_the_drawn_rect() {
        let cfg = InfoBoxConfig::default();
        let boxes = vec![info_box_layout(&node_with_tasks(4), false, &cfg, &ApproxMeasure).unwrap()];
        let t = boxes[0].toggle.unwrap();
        assert_eq!(toggle_at(&boxes, Point::new(t.x + 1.0, t.y + 1.0)), Some(NodeId(1)));
        assert_eq!(toggle_at(&boxes, Point::new(t.x - 1.0, t.y)), None);
    }
}
