//! Tunable constants for the editor, grouped by concern.
//!
//! Every struct deserializes from camelCase JSON with all fields optional,
//! so a host can override a single value and inherit the rest.

use crate::ModelError;
use serde::{Deserialize, Serialize};

// ─── Zoom ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ZoomConfig {
    pub min: f64,
    pub max: f64,
    /// Change per wheel notch or button press.
    pub step: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 0.25,
            max: 3.0,
            step: 0.1,
        }
    }
}

// ─── Hit testing ──────────────────────────────────────────────────────────

/// Hit-test tolerances and the parallel-edge spacing.
///
/// `edge_spacing` is shared by the renderer and the hit tester so a curved
/// edge is clickable exactly where it is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HitConfig {
    pub edge_spacing: f64,
    /// Max distance to a straight edge.
    pub straight_tolerance: f64,
    /// Slack on `d(p,a) + d(p,b) <= len + slack` for straight edges.
    pub span_slack: f64,
    /// Max distance to a sampled curve or poly-line segment.
    pub curve_tolerance: f64,
    pub bend_tolerance: f64,
    pub curve_samples: usize,
}

impl Default for HitConfig {
    fn default() -> Self {
        Self {
            edge_spacing: 50.0,
            straight_tolerance: 8.0,
            span_slack: 5.0,
            curve_tolerance: 10.0,
            bend_tolerance: 10.0,
            curve_samples: 50,
        }
    }
}

// ─── Layout ───────────────────────────────────────────────────────────────

/// Parameters of the force-directed "beautify" pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub padding: f64,
    pub iterations: usize,
    pub min_distance: f64,
    pub repulsion_strength: f64,
    pub attraction_strength: f64,
    pub center_force: f64,
    pub damping: f64,
    /// Run overlap resolution every N iterations.
    pub overlap_every: usize,
    pub overlap_passes: usize,
    /// Extra gap required between two node rims.
    pub overlap_gap: f64,
    /// Share of the overlap removed per pass.
    pub overlap_push: f64,
    /// After this many passes, stop once the worst overlap is below
    /// `overlap_settle`.
    pub overlap_settle_after: usize,
    pub overlap_settle: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            padding: 150.0,
            iterations: 500,
            min_distance: 120.0,
            repulsion_strength: 8000.0,
            attraction_strength: 0.02,
            center_force: 0.001,
            damping: 0.7,
            overlap_every: 10,
            overlap_passes: 50,
            overlap_gap: 200.0,
            overlap_push: 0.8,
            overlap_settle_after: 20,
            overlap_settle: 5.0,
        }
    }
}

// ─── Info boxes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfoBoxConfig {
    pub title_px: f64,
    pub line_px: f64,
    pub line_height: f64,
    pub padding: f64,
    /// Gap between the node rim and the box.
    pub offset: f64,
    pub min_width: f64,
    pub max_width: f64,
    pub min_height: f64,
    pub max_height: f64,
    /// Task lines shown while collapsed.
    pub collapsed_lines: usize,
    pub toggle_width: f64,
    pub toggle_height: f64,
}

impl Default for InfoBoxConfig {
    fn default() -> Self {
        Self {
            title_px: 13.0,
            line_px: 12.0,
            line_height: 16.0,
            padding: 8.0,
            offset: 12.0,
            min_width: 120.0,
            max_width: 240.0,
            min_height: 40.0,
            max_height: 320.0,
            collapsed_lines: 3,
            toggle_width: 44.0,
            toggle_height: 14.0,
        }
    }
}

// ─── Editor ───────────────────────────────────────────────────────────────

/// Top-level editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub zoom: ZoomConfig,
    pub hit: HitConfig,
    pub layout: LayoutConfig,
    pub info_box: InfoBoxConfig,
    /// Maximum number of history snapshots.
    pub history_cap: usize,
    /// Two hits on the same bend point within this window delete it.
    pub double_click_ms: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomConfig::default(),
            hit: HitConfig::default(),
            layout: LayoutConfig::default(),
            info_box: InfoBoxConfig::default(),
            history_cap: 50,
            double_click_ms: 300.0,
        }
    }
}

impl EditorConfig {
    /// Parse a partial JSON override on top of the defaults.
    ///
    /// The merged result is [validated](Self::validate), so a partial
    /// override that inverts a range is rejected rather than silently kept.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| ModelError::decode("editor config", e))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the ranges the viewport and the info-box sizing clamp against.
    pub fn validate(&self) -> Result<(), ModelError> {
        let z = &self.zoom;
        positive("zoom.min", z.min)?;
        positive("zoom.max", z.max)?;
        positive("zoom.step", z.step)?;
        ordered("zoom", z.min, z.max)?;

        let b = &self.info_box;
        positive("infoBox.minWidth", b.min_width)?;
        positive("infoBox.maxWidth", b.max_width)?;
        positive("infoBox.minHeight", b.min_height)?;
        positive("infoBox.maxHeight", b.max_height)?;
        ordered("infoBox width", b.min_width, b.max_width)?;
        ordered("infoBox height", b.min_height, b.max_height)?;

        positive("doubleClickMs", self.double_click_ms)?;
        positive("hit.edgeSpacing", self.hit.edge_spacing)?;
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidConfig(format!("{name} must be a positive number, got {value}")))
    }
}

fn ordered(name: &str, min: f64, max: f64) -> Result<(), ModelError> {
    if min <= max {
        Ok(())
    } else {
        Err(ModelError::InvalidConfig(format!("{name} range is inverted: min {min} > max {max}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let cfg = EditorConfig::from_json(r#"{"historyCap": 10, "zoom": {"max": 4.0}}"#).unwrap();
        assert_eq!(cfg.history_cap, 10);
        assert_eq!(cfg.zoom.max, 4.0);
        assert_eq!(cfg.zoom.min, 0.25);
        assert_eq!(cfg.hit.edge_spacing, 50.0);
        assert_eq!(cfg.layout.iterations, 500);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(EditorConfig::from_json("{").is_err());
    }

    fn rejected(json: &str) -> bool {
        matches!(EditorConfig::from_json(json), Err(ModelError::InvalidConfig(_)))
    }

    #[test]
    fn inverted_zoom_range_is_rejected() {
        // Max below the default min of 0.25.
        assert!(rejected(r#"{"zoom": {"max": 0.2}}"#));
        assert!(rejected(r#"{"zoom": {"min": 5.0}}"#));
        assert!(EditorConfig::from_json(r#"{"zoom": {"min": 0.5, "max": 0.5}}"#).is_ok());
    }

    #[test]
    fn inverted_info_box_limits_are_rejected() {
        assert!(rejected(r#"{"infoBox": {"maxWidth": 100}}"#));
        assert!(rejected(r#"{"infoBox": {"minHeight": 400}}"#));
    }

    #[test]
    fn non_positive_limits_are_rejected() {
        assert!(rejected(r#"{"zoom": {"min": 0}}"#));
        assert!(rejected(r#"{"zoom": {"step": -0.1}}"#));
        assert!(rejected(r#"{"infoBox": {"minWidth": -10}}"#));
        assert!(rejected(r#"{"doubleClickMs": 0}"#));
    }

    #[test]
    fn non_finite_limits_are_rejected() {
        let mut cfg = EditorConfig::default();
        cfg.zoom.max = f64::INFINITY;
        assert!(matches!(cfg.validate(), Err(ModelError::InvalidConfig(_))));
        cfg.zoom.max = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EditorConfig::default().validate(), Ok(()));
    }
}
