//! Circular zoom lens over raster arc diagrams.

use serde::{Deserialize, Serialize};
use ssview_protocol::{LensView, RenderingType};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnifierSettings {
    pub lens_radius: f64,
    pub zoom: f64,
}

impl Default for MagnifierSettings {
    fn default() -> Self {
        Self {
            lens_radius: 75.0,
            zoom: 2.0,
        }
    }
}

/// Where the host drew the image, in the same coordinates as pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ImageBox {
    fn local(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (lx, ly) = (x - self.left, y - self.top);
        let inside = (0.0..=self.width).contains(&lx) && (0.0..=self.height).contains(&ly);
        inside.then_some((lx, ly))
    }
}

pub fn applies_to(rendering: RenderingType) -> bool {
    rendering == RenderingType::ArcDiagram
}

#[derive(Debug, Clone, Default)]
pub struct Magnifier {
    settings: MagnifierSettings,
    lens: Option<LensView>,
}

impl Magnifier {
    pub fn new(settings: MagnifierSettings) -> Self {
        Self {
            settings,
            lens: None,
        }
    }

    pub fn lens(&self) -> Option<LensView> {
        self.lens
    }

    /// Places the lens under the pointer. The lens is centred on the pointer
    /// and the zoomed copy is offset by `zoom * local - radius`, so hosts
    /// draw the background at the negated offset. Leaving the image hides it.
    pub fn pointer_moved(&mut self, image: ImageBox, x: f64, y: f64) -> Option<LensView> {
        let Some((lx, ly)) = image.local(x, y) else {
            self.lens = None;
            return None;
        };
        let MagnifierSettings { lens_radius, zoom } = self.settings;
        self.lens = Some(LensView {
            left: lx - lens_radius,
            top: ly - lens_radius,
            diameter: 2.0 * lens_radius,
            background_x: zoom * lx - lens_radius,
            background_y: zoom * ly - lens_radius,
            background_width: image.width * zoom,
            background_height: image.height * zoom,
        });
        self.lens
    }

    pub fn pointer_left(&mut self) {
        self.lens = None;
    }
}
