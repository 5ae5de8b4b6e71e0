//! Display list → Vello drawing commands.
//!
//! Emits fills and strokes for every [`DrawCmd`]. Text and bitmap images
//! need a font context and decoded image data which this painter does not
//! own; they are traced and skipped.

use crate::scene::DrawCmd;
use kurbo::{Affine, BezPath, Circle, Rect as KurboRect, RoundedRect, Stroke as KurboStroke};
use peniko::{Color as PenikoColor, Fill};
use rel_core::{Color, Rect};
use vello::Scene;

/// Paint the display list to a Vello scene.
///
/// Call once per frame with a freshly-cleared `Scene`.
pub fn paint_scene(scene: &mut Scene, commands: &[DrawCmd]) {
    for cmd in commands {
        paint_cmd(scene, cmd);
    }
}

fn paint_cmd(scene: &mut Scene, cmd: &DrawCmd) {
    match cmd {
        DrawCmd::Clear {
            width,
            height,
            color,
        } => {
            let r = KurboRect::new(0.0, 0.0, *width, *height);
            scene.fill(Fill::NonZero, Affine::IDENTITY, peniko(*color), None, &r);
        }

        DrawCmd::Background { source, .. } => {
            log::trace!("background image skipped ({} bytes)", source.len());
        }

        DrawCmd::Edge {
            route,
            color,
            width,
            arrow,
            label,
            ..
        } => {
            let stroke = KurboStroke::new(*width);
            scene.stroke(&stroke, Affine::IDENTITY, peniko(*color), None, &route.to_path());
            fill_triangle(scene, arrow, *color);
            if let Some((text, at)) = label {
                log::trace!("edge label {text:?} at ({}, {})", at.x, at.y);
            }
        }

        DrawCmd::TempEdge { line, color, arrow } => {
            let stroke = KurboStroke::new(2.0).with_dashes(0.0, [6.0, 4.0]);
            scene.stroke(&stroke, Affine::IDENTITY, peniko(*color), None, line);
            fill_triangle(scene, arrow, *color);
        }

        DrawCmd::Node {
            center,
            radius,
            fill,
            stroke,
            stroke_width,
            label,
            ..
        } => {
            let disc = Circle::new((center.x, center.y), *radius);
            scene.fill(Fill::NonZero, Affine::IDENTITY, peniko(*fill), None, &disc);
            scene.stroke(
                &KurboStroke::new(*stroke_width),
                Affine::IDENTITY,
                peniko(*stroke),
                None,
                &disc,
            );
            // Full text shaping requires a font context.
            log::trace!("node label {label:?}");
        }

        DrawCmd::InfoBox(layout) => {
            let shape = rounded(layout.rect, 6.0);
            scene.fill(
                Fill::NonZero,
                Affine::IDENTITY,
                PenikoColor::from_rgba8(255, 255, 255, 242),
                None,
                &shape,
            );
            scene.stroke(
                &KurboStroke::new(1.0),
                Affine::IDENTITY,
                PenikoColor::from_rgba8(0, 0, 0, 40),
                None,
                &shape,
            );
            if let Some(toggle) = layout.toggle {
                scene.fill(
                    Fill::NonZero,
                    Affine::IDENTITY,
                    PenikoColor::from_rgba8(0, 0, 0, 20),
                    None,
                    &rounded(toggle, 3.0),
                );
            }
        }

        DrawCmd::Marquee(rect) => {
            let r = rounded(*rect, 0.0);
            scene.fill(
                Fill::NonZero,
                Affine::IDENTITY,
                PenikoColor::from_rgba8(79, 195, 247, 20),
                None,
                &r,
            );
            let stroke = KurboStroke::new(1.0).with_dashes(0.0, [4.0, 4.0]);
            scene.stroke(&stroke, Affine::IDENTITY, PenikoColor::from_rgb8(79, 195, 247), None, &r);
        }

        DrawCmd::GroupRing {
            center,
            radius,
            color,
        } => {
            let ring = Circle::new((center.x, center.y), *radius);
            let stroke = KurboStroke::new(2.0).with_dashes(0.0, [5.0, 3.0]);
            scene.stroke(&stroke, Affine::IDENTITY, peniko(*color), None, &ring);
        }

        DrawCmd::BendHandle {
            at,
            radius,
            color,
            filled,
        } => {
            let dot = Circle::new((at.x, at.y), *radius);
            if *filled {
                scene.fill(Fill::NonZero, Affine::IDENTITY, peniko(*color), None, &dot);
            } else {
                scene.fill(
                    Fill::NonZero,
                    Affine::IDENTITY,
                    PenikoColor::from_rgb8(255, 255, 255),
                    None,
                    &dot,
                );
                scene.stroke(&KurboStroke::new(1.5), Affine::IDENTITY, peniko(*color), None, &dot);
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn peniko(c: Color) -> PenikoColor {
    PenikoColor::from_rgba8(c.r, c.g, c.b, c.a)
}

fn rounded(r: Rect, radius: f64) -> RoundedRect {
    KurboRect::new(r.x, r.y, r.max_x(), r.max_y()).to_rounded_rect(radius)
}

fn fill_triangle(scene: &mut Scene, points: &[kurbo::Point; 3], color: Color) {
    let mut path = BezPath::new();
    path.move_to(points[0]);
    path.line_to(points[1]);
    path.line_to(points[2]);
    path.close_path();
    scene.fill(Fill::NonZero, Affine::IDENTITY, peniko(color), None, &path);
}
