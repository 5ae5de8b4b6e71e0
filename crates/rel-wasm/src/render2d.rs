//! Canvas2D software renderer.
//!
//! Walks the display list produced by `rel_render::build_display_list` and
//! draws it to an HTML `<canvas>` via `CanvasRenderingContext2d`. All
//! geometry is already resolved; this module only maps commands to
//! context calls. Coordinates are logical: the host applies pan and zoom
//! as a CSS transform on the element.

use crate::images::ImageCache;
use kurbo::{BezPath, PathEl};
use rel_core::{InfoBoxConfig, Point, Rect};
use rel_render::{DrawCmd, InfoBoxLayout, SceneTheme, TextMeasure};
use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

const FONT_FAMILY: &str = "Inter, -apple-system, sans-serif";

/// Theme-dependent colors for the canvas renderer.
pub struct CanvasTheme {
    pub scene: SceneTheme,
    pub info_bg: &'static str,
    pub info_border: &'static str,
    pub info_title: &'static str,
    pub info_text: &'static str,
    pub info_done: &'static str,
    pub toggle_bg: &'static str,
    pub label_halo: &'static str,
    pub edge_label: &'static str,
    pub marquee_fill: &'static str,
    pub handle_fill: &'static str,
}

impl CanvasTheme {
    /// Light theme: warm white canvas.
    pub fn light() -> Self {
        Self {
            scene: SceneTheme::light(),
            info_bg: "rgba(255, 255, 255, 0.95)",
            info_border: "rgba(0, 0, 0, 0.16)",
            info_title: "#1C1C1E",
            info_text: "#3A3A3C",
            info_done: "#8E8E93",
            toggle_bg: "rgba(0, 0, 0, 0.08)",
            label_halo: "rgba(245, 245, 247, 0.9)",
            edge_label: "#3A3A3C",
            marquee_fill: "rgba(79, 195, 247, 0.08)",
            handle_fill: "#FFFFFF",
        }
    }

    /// Dark theme.
    pub fn dark() -> Self {
        Self {
            scene: SceneTheme::dark(),
            info_bg: "rgba(44, 44, 46, 0.95)",
            info_border: "rgba(255, 255, 255, 0.14)",
            info_title: "#F2F2F7",
            info_text: "#D1D1D6",
            info_done: "#8E8E93",
            toggle_bg: "rgba(255, 255, 255, 0.10)",
            label_halo: "rgba(28, 28, 30, 0.9)",
            edge_label: "#D1D1D6",
            marquee_fill: "rgba(79, 195, 247, 0.12)",
            handle_fill: "#2C2C2E",
        }
    }
}

/// Draw the display list in order.
pub fn render_display_list(
    ctx: &CanvasRenderingContext2d,
    commands: &[DrawCmd],
    theme: &CanvasTheme,
    fonts: &InfoBoxConfig,
    images: &mut ImageCache,
) {
    for cmd in commands {
        draw_cmd(ctx, cmd, theme, fonts, images);
    }
}

fn draw_cmd(
    ctx: &CanvasRenderingContext2d,
    cmd: &DrawCmd,
    theme: &CanvasTheme,
    fonts: &InfoBoxConfig,
    images: &mut ImageCache,
) {
    match cmd {
        DrawCmd::Clear {
            width,
            height,
            color,
        } => {
            ctx.clear_rect(0.0, 0.0, *width, *height);
            ctx.set_fill_style_str(&color.to_hex());
            ctx.fill_rect(0.0, 0.0, *width, *height);
        }

        DrawCmd::Background {
            source,
            width,
            height,
        } => {
            if let Some(img) = images.get(source) {
                let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(&img, 0.0, 0.0, *width, *height);
            }
        }

        DrawCmd::Edge {
            route,
            color,
            width,
            arrow,
            label,
            ..
        } => {
            let stroke = color.to_hex();
            ctx.save();
            ctx.set_stroke_style_str(&stroke);
            ctx.set_line_width(*width);
            ctx.set_line_cap("round");
            ctx.set_line_join("round");
            ctx.begin_path();
            trace_path(ctx, &route.to_path());
            ctx.stroke();
            fill_triangle(ctx, arrow, &stroke);
            if let Some((text, at)) = label {
                draw_edge_label(ctx, text, *at, theme);
            }
            ctx.restore();
        }

        DrawCmd::TempEdge { line, color, arrow } => {
            let stroke = color.to_hex();
            ctx.save();
            ctx.set_stroke_style_str(&stroke);
            ctx.set_line_width(2.0);
            let _ = ctx.set_line_dash(&dashes(6.0, 4.0));
            ctx.begin_path();
            ctx.move_to(line.p0.x, line.p0.y);
            ctx.line_to(line.p1.x, line.p1.y);
            ctx.stroke();
            let _ = ctx.set_line_dash(&js_sys::Array::new());
            fill_triangle(ctx, arrow, &stroke);
            ctx.restore();
        }

        DrawCmd::Node {
            center,
            radius,
            fill,
            stroke,
            stroke_width,
            label,
            label_color,
            image,
            ..
        } => {
            ctx.save();
            disc_path(ctx, *center, *radius);
            ctx.set_fill_style_str(&fill.to_hex());
            ctx.fill();

            let picture = image.as_deref().and_then(|src| images.get(src));
            if let Some(img) = picture {
                ctx.save();
                disc_path(ctx, *center, *radius);
                ctx.clip();
                let d = radius * 2.0;
                let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
                    &img,
                    center.x - radius,
                    center.y - radius,
                    d,
                    d,
                );
                ctx.restore();
            } else {
                ctx.set_font(&format!("500 12px {FONT_FAMILY}"));
                ctx.set_fill_style_str(&label_color.to_hex());
                ctx.set_text_align("center");
                ctx.set_text_baseline("middle");
                let _ = ctx.fill_text(label, center.x, center.y);
            }

            disc_path(ctx, *center, *radius);
            ctx.set_stroke_style_str(&stroke.to_hex());
            ctx.set_line_width(*stroke_width);
            ctx.stroke();
            ctx.restore();
        }

        DrawCmd::InfoBox(layout) => draw_info_box(ctx, layout, theme, fonts),

        DrawCmd::Marquee(rect) => {
            if rect.width < 1.0 && rect.height < 1.0 {
                return;
            }
            let accent = theme.scene.accent.to_hex();
            ctx.save();
            ctx.set_fill_style_str(theme.marquee_fill);
            ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
            ctx.set_stroke_style_str(&accent);
            ctx.set_line_width(1.0);
            let _ = ctx.set_line_dash(&dashes(4.0, 4.0));
            ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);
            ctx.restore();
        }

        DrawCmd::GroupRing {
            center,
            radius,
            color,
        } => {
            ctx.save();
            ctx.set_stroke_style_str(&color.to_hex());
            ctx.set_line_width(2.0);
            let _ = ctx.set_line_dash(&dashes(5.0, 3.0));
            disc_path(ctx, *center, *radius);
            ctx.stroke();
            ctx.restore();
        }

        DrawCmd::BendHandle {
            at,
            radius,
            color,
            filled,
        } => {
            let color = color.to_hex();
            ctx.save();
            disc_path(ctx, *at, *radius);
            ctx.set_fill_style_str(if *filled { color.as_str() } else { theme.handle_fill });
            ctx.fill();
            if !filled {
                ctx.set_stroke_style_str(&color);
                ctx.set_line_width(1.5);
                ctx.stroke();
            }
            ctx.restore();
        }
    }
}

// ─── Info box ────────────────────────────────────────────────────────────

fn draw_info_box(ctx: &CanvasRenderingContext2d, layout: &InfoBoxLayout, theme: &CanvasTheme, fonts: &InfoBoxConfig) {
    let r = layout.rect;
    ctx.save();
    rounded_rect_path(ctx, r, 6.0);
    ctx.set_fill_style_str(theme.info_bg);
    ctx.fill();
    ctx.set_stroke_style_str(theme.info_border);
    ctx.set_line_width(1.0);
    ctx.stroke();

    ctx.set_text_align("left");
    ctx.set_text_baseline("top");

    ctx.set_font(&format!("600 {}px {FONT_FAMILY}", fonts.title_px));
    ctx.set_fill_style_str(theme.info_title);
    let _ = ctx.fill_text(&layout.title, layout.title_origin.x, layout.title_origin.y);

    ctx.set_font(&format!("400 {}px {FONT_FAMILY}", fonts.line_px));
    for line in &layout.lines {
        let color = if line.done { theme.info_done } else { theme.info_text };
        ctx.set_fill_style_str(color);
        let _ = ctx.fill_text(&line.text, line.origin.x, line.origin.y);
        if line.done
            && let Ok(metrics) = ctx.measure_text(&line.text)
        {
            let y = line.origin.y + fonts.line_px * 0.55;
            ctx.set_stroke_style_str(color);
            ctx.set_line_width(1.0);
            ctx.begin_path();
            ctx.move_to(line.origin.x, y);
            ctx.line_to(line.origin.x + metrics.width(), y);
            ctx.stroke();
        }
    }

    if let Some(toggle) = layout.toggle {
        rounded_rect_path(ctx, toggle, 3.0);
        ctx.set_fill_style_str(theme.toggle_bg);
        ctx.fill();
        ctx.set_fill_style_str(theme.info_text);
        ctx.set_text_align("center");
        ctx.set_text_baseline("middle");
        let _ = ctx.fill_text(
            &layout.toggle_label(),
            toggle.x + toggle.width / 2.0,
            toggle.y + toggle.height / 2.0,
        );
    }
    ctx.restore();
}

fn draw_edge_label(ctx: &CanvasRenderingContext2d, text: &str, at: kurbo::Point, theme: &CanvasTheme) {
    ctx.set_font(&format!("400 11px {FONT_FAMILY}"));
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    ctx.set_line_width(4.0);
    ctx.set_stroke_style_str(theme.label_halo);
    let _ = ctx.stroke_text(text, at.x, at.y);
    ctx.set_fill_style_str(theme.edge_label);
    let _ = ctx.fill_text(text, at.x, at.y);
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn dashes(on: f64, off: f64) -> js_sys::Array {
    js_sys::Array::of2(&JsValue::from_f64(on), &JsValue::from_f64(off))
}

fn trace_path(ctx: &CanvasRenderingContext2d, path: &BezPath) {
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => ctx.move_to(p.x, p.y),
            PathEl::LineTo(p) => ctx.line_to(p.x, p.y),
            PathEl::QuadTo(c, p) => ctx.quadratic_curve_to(c.x, c.y, p.x, p.y),
            PathEl::CurveTo(c1, c2, p) => ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
            PathEl::ClosePath => ctx.close_path(),
        }
    }
}

fn disc_path(ctx: &CanvasRenderingContext2d, center: Point, radius: f64) {
    ctx.begin_path();
    let _ = ctx.arc(center.x, center.y, radius, 0.0, std::f64::consts::TAU);
    ctx.close_path();
}

fn fill_triangle(ctx: &CanvasRenderingContext2d, points: &[kurbo::Point; 3], color: &str) {
    ctx.set_fill_style_str(color);
    ctx.begin_path();
    ctx.move_to(points[0].x, points[0].y);
    ctx.line_to(points[1].x, points[1].y);
    ctx.line_to(points[2].x, points[2].y);
    ctx.close_path();
    ctx.fill();
}

fn rounded_rect_path(ctx: &CanvasRenderingContext2d, rect: Rect, r: f64) {
    let Rect { x, y, width: w, height: h } = rect;
    let r = r.min(w / 2.0).min(h / 2.0);
    ctx.begin_path();
    ctx.move_to(x + r, y);
    ctx.line_to(x + w - r, y);
    ctx.arc_to(x + w, y, x + w, y + r, r).unwrap_or(());
    ctx.line_to(x + w, y + h - r);
    ctx.arc_to(x + w, y + h, x + w - r, y + h, r).unwrap_or(());
    ctx.line_to(x + r, y + h);
    ctx.arc_to(x, y + h, x, y + h - r, r).unwrap_or(());
    ctx.line_to(x, y + r);
    ctx.arc_to(x, y, x + r, y, r).unwrap_or(());
    ctx.close_path();
}

// ─── Text measurement ────────────────────────────────────────────────────

/// Measures text with a detached 2D context so info-box layout matches
/// what the canvas draws.
pub struct CanvasTextMeasure {
    ctx: CanvasRenderingContext2d,
}

impl CanvasTextMeasure {
    pub fn new(ctx: CanvasRenderingContext2d) -> Self {
        Self { ctx }
    }
}

impl TextMeasure for CanvasTextMeasure {
    fn width(&self, text: &str, px: f64) -> f64 {
        self.ctx.set_font(&format!("400 {px}px {FONT_FAMILY}"));
        match self.ctx.measure_text(text) {
            Ok(metrics) => metrics.width(),
            Err(_) => rel_render::ApproxMeasure.width(text, px),
        }
    }
}
