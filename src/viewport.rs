//! Pan/zoom bindings for mounted vector diagrams.

use crate::{
    slot::MountId,
    svg_doc::SvgDocument,
};
use serde::{Deserialize, Serialize};
use ssview_protocol::ViewportView;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewportError {
    #[error("Diagram has no <svg> root element")]
    MissingRoot,
    #[error("Diagram declares no usable size ({0})")]
    Dimensions(String),
    #[error("No pan/zoom instance is bound")]
    Unbound,
    #[error("Pan/zoom instance is bound to mount {bound:?}, not {requested:?}")]
    Detached { bound: MountId, requested: MountId },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    pub min_width: f64,
    pub min_height: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            min_width: 500.0,
            min_height: 500.0,
            min_zoom: 0.5,
            max_zoom: 10.0,
            zoom_step: 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// Converts an SVG length to CSS pixels. Percentages and font-relative units
/// have no intrinsic size and yield `None`.
fn parse_length(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.parse().ok()?;
    let px = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "px" => value,
        "pt" => value * 4.0 / 3.0,
        "pc" => value * 16.0,
        "in" => value * 96.0,
        "cm" => value * 96.0 / 2.54,
        "mm" => value * 96.0 / 25.4,
        _ => return None,
    };
    (px.is_finite() && px > 0.0).then_some(px)
}

fn parse_view_box(raw: &str) -> Option<[f64; 4]> {
    let parts = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Some([*x, *y, *w, *h]),
        _ => None,
    }
}

fn format_px(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}")
}

/// Expands a diagram reported smaller than the floor so the interaction
/// surface stays usable. A `viewBox` is added from the original size when
/// missing so the drawing scales with the new box.
pub fn enforce_minimum_size(
    doc: &mut SvgDocument,
    min_width: f64,
    min_height: f64,
) -> Result<Dimensions, ViewportError> {
    let root = doc.root();
    if doc.local_name(root) != Some("svg") {
        return Err(ViewportError::MissingRoot);
    }
    let view_box = doc.attr(root, "viewBox").and_then(parse_view_box);
    let width = doc
        .attr(root, "width")
        .and_then(parse_length)
        .or(view_box.map(|v| v[2]));
    let height = doc
        .attr(root, "height")
        .and_then(parse_length)
        .or(view_box.map(|v| v[3]));
    let (Some(width), Some(height)) = (width, height) else {
        return Err(ViewportError::Dimensions(format!(
            "width={:?} height={:?} viewBox={:?}",
            doc.attr(root, "width"),
            doc.attr(root, "height"),
            doc.attr(root, "viewBox")
        )));
    };

    let target = Dimensions {
        width: width.max(min_width),
        height: height.max(min_height),
    };
    if target.width != width || target.height != height {
        if view_box.is_none() {
            doc.set_attr(
                root,
                "viewBox",
                &format!("0 0 {} {}", format_px(width), format_px(height)),
            );
        }
        doc.set_attr(root, "width", &format_px(target.width));
        doc.set_attr(root, "height", &format_px(target.height));
        debug!(
            from_width = width,
            from_height = height,
            to_width = target.width,
            to_height = target.height,
            "expanded diagram to minimum size"
        );
    }
    Ok(target)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanZoomInstance {
    id: u64,
    mount: MountId,
    dimensions: Dimensions,
    zoom: f64,
    pan_x: f64,
    pan_y: f64,
}

impl PanZoomInstance {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mount(&self) -> MountId {
        self.mount
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn view(&self) -> ViewportView {
        ViewportView {
            zoom: self.zoom,
            pan_x: self.pan_x,
            pan_y: self.pan_y,
            width: self.dimensions.width,
            height: self.dimensions.height,
        }
    }

    fn zoom_around(&mut self, factor: f64, x: f64, y: f64, settings: &ViewportSettings) {
        let next = (self.zoom * factor).clamp(settings.min_zoom, settings.max_zoom);
        let ratio = next / self.zoom;
        self.pan_x = x - (x - self.pan_x) * ratio;
        self.pan_y = y - (y - self.pan_y) * ratio;
        self.zoom = next;
    }
}

/// Owner of the single pan/zoom instance of one diagram slot.
#[derive(Debug, Clone, Default)]
pub struct ViewportController {
    settings: ViewportSettings,
    instance: Option<PanZoomInstance>,
    next_id: u64,
    live: usize,
}

impl ViewportController {
    pub fn new(settings: ViewportSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &ViewportSettings {
        &self.settings
    }

    pub fn instance(&self) -> Option<&PanZoomInstance> {
        self.instance.as_ref()
    }

    pub fn live_instances(&self) -> usize {
        self.live
    }

    /// Destroys any prior instance, then binds a new one to `mount`.
    pub fn bind(
        &mut self,
        doc: &mut SvgDocument,
        mount: MountId,
    ) -> Result<&PanZoomInstance, ViewportError> {
        self.release();
        let dimensions =
            enforce_minimum_size(doc, self.settings.min_width, self.settings.min_height)?;
        self.next_id += 1;
        self.live += 1;
        debug!(instance = self.next_id, ?mount, "bound pan/zoom instance");
        Ok(self.instance.insert(PanZoomInstance {
            id: self.next_id,
            mount,
            dimensions,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }))
    }

    pub fn release(&mut self) -> Option<PanZoomInstance> {
        let released = self.instance.take()?;
        self.live -= 1;
        debug!(instance = released.id, mount = ?released.mount, "released pan/zoom instance");
        Some(released)
    }

    fn bound_to(&mut self, mount: MountId) -> Result<&mut PanZoomInstance, ViewportError> {
        let instance = self.instance.as_mut().ok_or(ViewportError::Unbound)?;
        if instance.mount != mount {
            return Err(ViewportError::Detached {
                bound: instance.mount,
                requested: mount,
            });
        }
        Ok(instance)
    }

    /// Zooms by one step around `(x, y)`, or the centre when no point is given.
    pub fn zoom_in(
        &mut self,
        mount: MountId,
        at: Option<(f64, f64)>,
    ) -> Result<ViewportView, ViewportError> {
        let step = self.settings.zoom_step;
        self.zoom_by(mount, step, at)
    }

    pub fn zoom_out(
        &mut self,
        mount: MountId,
        at: Option<(f64, f64)>,
    ) -> Result<ViewportView, ViewportError> {
        let step = self.settings.zoom_step;
        self.zoom_by(mount, 1.0 / step, at)
    }

    pub fn zoom_by(
        &mut self,
        mount: MountId,
        factor: f64,
        at: Option<(f64, f64)>,
    ) -> Result<ViewportView, ViewportError> {
        let settings = self.settings;
        let instance = self.bound_to(mount)?;
        let (x, y) = at.unwrap_or((
            instance.dimensions.width / 2.0,
            instance.dimensions.height / 2.0,
        ));
        instance.zoom_around(factor, x, y, &settings);
        Ok(instance.view())
    }

    pub fn pan_by(
        &mut self,
        mount: MountId,
        dx: f64,
        dy: f64,
    ) -> Result<ViewportView, ViewportError> {
        let instance = self.bound_to(mount)?;
        instance.pan_x += dx;
        instance.pan_y += dy;
        Ok(instance.view())
    }

    pub fn reset(&mut self, mount: MountId) -> Result<ViewportView, ViewportError> {
        let instance = self.bound_to(mount)?;
        instance.zoom = 1.0;
        instance.pan_x = 0.0;
        instance.pan_y = 0.0;
        Ok(instance.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{LAYERED_SVG, RSCAPE_SVG, SMALL_SVG};

    #[test]
    fn parses_lengths_in_common_units() {
        assert_eq!(parse_length("120"), Some(120.0));
        assert_eq!(parse_length("120px"), Some(120.0));
        assert_eq!(parse_length("450pt"), Some(600.0));
        assert_eq!(parse_length("1in"), Some(96.0));
        assert_eq!(parse_length("100%"), None);
        assert_eq!(parse_length("0"), None);
        assert_eq!(parse_length("auto"), None);
    }

    #[test]
    fn expands_small_diagram_and_adds_view_box() {
        let mut doc = SvgDocument::parse(SMALL_SVG).expect("parse");
        let dims = enforce_minimum_size(&mut doc, 500.0, 500.0).expect("dims");
        assert_eq!(dims, Dimensions { width: 500.0, height: 500.0 });
        let root = doc.root();
        assert_eq!(doc.attr(root, "width"), Some("500"));
        assert_eq!(doc.attr(root, "height"), Some("500"));
        assert_eq!(doc.attr(root, "viewBox"), Some("0 0 120 80"));
    }

    #[test]
    fn leaves_large_diagrams_untouched() {
        let mut doc = SvgDocument::parse(RSCAPE_SVG).expect("parse");
        let dims = enforce_minimum_size(&mut doc, 500.0, 500.0).expect("dims");
        assert_eq!(dims, Dimensions { width: 812.0, height: 640.0 });
        assert_eq!(doc.attr(doc.root(), "width"), Some("812"));
    }

    #[test]
    fn falls_back_to_view_box_and_fails_without_any_size() {
        let mut doc =
            SvgDocument::parse(r#"<svg width="100%" viewBox="0 0 900 300"/>"#).expect("parse");
        let dims = enforce_minimum_size(&mut doc, 500.0, 500.0).expect("dims");
        assert_eq!(dims, Dimensions { width: 900.0, height: 500.0 });
        assert_eq!(doc.attr(doc.root(), "viewBox"), Some("0 0 900 300"));

        let mut bare = SvgDocument::parse("<svg/>").expect("parse");
        assert!(matches!(
            enforce_minimum_size(&mut bare, 500.0, 500.0),
            Err(ViewportError::Dimensions(_))
        ));
    }

    #[test]
    fn binding_replaces_the_previous_instance() {
        let mut controller = ViewportController::new(ViewportSettings::default());
        let mut first = SvgDocument::parse(RSCAPE_SVG).expect("parse");
        let mut second = SvgDocument::parse(LAYERED_SVG).expect("parse");
        let first_id = controller.bind(&mut first, MountId(1)).expect("bind").id();
        let second_id = controller.bind(&mut second, MountId(2)).expect("bind").id();
        assert_ne!(first_id, second_id);
        assert_eq!(controller.live_instances(), 1);
        assert_eq!(controller.instance().map(|i| i.mount()), Some(MountId(2)));
        controller.release();
        assert_eq!(controller.live_instances(), 0);
        assert!(controller.release().is_none());
    }

    #[test]
    fn failed_binding_still_releases_the_old_instance() {
        let mut controller = ViewportController::new(ViewportSettings::default());
        let mut good = SvgDocument::parse(RSCAPE_SVG).expect("parse");
        let mut bare = SvgDocument::parse("<svg/>").expect("parse");
        controller.bind(&mut good, MountId(1)).expect("bind");
        assert!(controller.bind(&mut bare, MountId(2)).is_err());
        assert_eq!(controller.live_instances(), 0);
    }

    #[test]
    fn zoom_is_clamped_and_anchored() {
        let mut controller = ViewportController::new(ViewportSettings::default());
        let mut doc = SvgDocument::parse(RSCAPE_SVG).expect("parse");
        controller.bind(&mut doc, MountId(7)).expect("bind");
        let view = controller.zoom_by(MountId(7), 2.0, Some((100.0, 50.0))).expect("zoom");
        assert_eq!(view.zoom, 2.0);
        assert_eq!((view.pan_x, view.pan_y), (-100.0, -50.0));
        let view = controller.zoom_by(MountId(7), 100.0, None).expect("zoom");
        assert_eq!(view.zoom, 10.0);
        let view = controller.reset(MountId(7)).expect("reset");
        assert_eq!((view.zoom, view.pan_x, view.pan_y), (1.0, 0.0, 0.0));
        let view = controller.pan_by(MountId(7), 5.0, -3.0).expect("pan");
        assert_eq!((view.pan_x, view.pan_y), (5.0, -3.0));
    }

    #[test]
    fn rejects_operations_for_other_mounts() {
        let mut controller = ViewportController::new(ViewportSettings::default());
        assert_eq!(controller.pan_by(MountId(1), 1.0, 1.0), Err(ViewportError::Unbound));
        let mut doc = SvgDocument::parse(RSCAPE_SVG).expect("parse");
        controller.bind(&mut doc, MountId(1)).expect("bind");
        assert_eq!(
            controller.zoom_in(MountId(2), None),
            Err(ViewportError::Detached {
                bound: MountId(1),
                requested: MountId(2)
            })
        );
    }
}
