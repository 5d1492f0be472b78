//! Click-to-cycle visibility of the sequence, outline and pair layers.

use crate::svg_doc::{NodeId, SvgDocument};
use ssview_protocol::{RenderingType, TogglePhase};
use tracing::debug;

pub const SEQUENCE_LAYER: &str = "sequence";
pub const OUTLINE_LAYER: &str = "outline";
pub const PAIRS_LAYER: &str = "pairs";

/// Arc diagrams and the primary analysis carry no switchable layers.
pub fn applies_to(rendering: RenderingType) -> bool {
    !matches!(
        rendering,
        RenderingType::PrimaryAnalysis | RenderingType::ArcDiagram
    )
}

/// Visibility of (sequence, outline, pairs) in each phase.
fn layer_visibility(phase: TogglePhase) -> [bool; 3] {
    match phase {
        TogglePhase::AllVisible => [true, true, true],
        TogglePhase::StructureOnly => [false, true, true],
        TogglePhase::SequenceOnly => [true, false, false],
    }
}

fn find_layer(doc: &SvgDocument, id: &str) -> Option<NodeId> {
    doc.find_by_id(id).filter(|&n| doc.local_name(n) == Some("g"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerToggleCycle {
    phase: TogglePhase,
}

impl LayerToggleCycle {
    pub fn phase(&self) -> TogglePhase {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = TogglePhase::default();
    }

    /// Moves to the next phase and applies it to `doc`. Returns `None`
    /// without touching anything when the type has no layers or any of the
    /// three layer groups is missing.
    pub fn advance(
        &mut self,
        rendering: RenderingType,
        doc: &mut SvgDocument,
    ) -> Option<TogglePhase> {
        if !applies_to(rendering) {
            return None;
        }
        let layers = [
            find_layer(doc, SEQUENCE_LAYER)?,
            find_layer(doc, OUTLINE_LAYER)?,
            find_layer(doc, PAIRS_LAYER)?,
        ];
        let next = self.phase.next();
        for (node, visible) in layers.into_iter().zip(layer_visibility(next)) {
            doc.remove_style_property(node, "visibility");
            doc.set_attr(node, "visibility", if visible { "visible" } else { "hidden" });
        }
        debug!(%rendering, phase = ?next, "toggled diagram layers");
        self.phase = next;
        Some(next)
    }
}
