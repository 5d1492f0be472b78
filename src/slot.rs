//! A diagram slot holds at most one mounted rendering and its viewport.

use crate::{
    annotator::{AnnotationResult, annotate},
    fallback::{RenderingContent, RenderingResult},
    svg_doc::SvgDocument,
    viewport::{ViewportController, ViewportSettings},
};
use ssview_protocol::{DiagramContent, SlotView};
use tracing::warn;

/// Identity of one mount. A refetch of the same content is a new mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountId(pub(crate) u64);

#[derive(Debug, Clone)]
pub struct MountedDiagram {
    id: MountId,
    result: RenderingResult,
    document: Option<SvgDocument>,
    annotation: Option<AnnotationResult>,
}

impl MountedDiagram {
    pub fn id(&self) -> MountId {
        self.id
    }

    pub fn result(&self) -> &RenderingResult {
        &self.result
    }

    pub fn document(&self) -> Option<&SvgDocument> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut SvgDocument> {
        self.document.as_mut()
    }

    pub fn annotation(&self) -> Option<&AnnotationResult> {
        self.annotation.as_ref()
    }

    /// Markup as currently displayed: the annotated tree when there is one,
    /// the fetched text otherwise.
    pub fn markup(&self) -> Option<String> {
        let RenderingContent::Vector(raw) = &self.result.content else {
            return None;
        };
        let serialized = self.document.as_ref().and_then(|doc| match doc.to_svg_string() {
            Ok(markup) => Some(markup),
            Err(e) => {
                warn!(error = %e, "could not serialize mounted diagram");
                None
            }
        });
        Some(serialized.unwrap_or_else(|| raw.clone()))
    }

    pub fn content_view(&self) -> DiagramContent {
        match &self.result.content {
            RenderingContent::Vector(_) => DiagramContent::Vector {
                markup: self.markup().unwrap_or_default(),
            },
            RenderingContent::Raster { .. } => DiagramContent::Raster {
                url: self.result.url.to_string(),
                mime: self.result.content.mime_type().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagramSlot {
    name: &'static str,
    viewport: ViewportController,
    mounted: Option<MountedDiagram>,
    mounts: u64,
}

impl DiagramSlot {
    pub fn new(name: &'static str, settings: ViewportSettings) -> Self {
        Self {
            name,
            viewport: ViewportController::new(settings),
            mounted: None,
            mounts: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn mounted(&self) -> Option<&MountedDiagram> {
        self.mounted.as_ref()
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    /// Splits the slot so a caller can drive the viewport against the mount id.
    pub fn parts_mut(&mut self) -> (Option<&mut MountedDiagram>, &mut ViewportController) {
        (self.mounted.as_mut(), &mut self.viewport)
    }

    /// Releases the viewport first, then drops the diagram.
    pub fn unmount(&mut self) {
        self.viewport.release();
        self.mounted = None;
    }

    /// Replaces the slot content. Genuine vector content is parsed, annotated
    /// once and given a viewport; failures past this point are logged and the
    /// diagram stays displayed without interactivity.
    pub fn mount(&mut self, result: RenderingResult) -> MountId {
        self.unmount();
        self.mounts += 1;
        let id = MountId(self.mounts);

        let mut document = None;
        let mut annotation = None;
        if result.is_interactive_vector() {
            if let RenderingContent::Vector(markup) = &result.content {
                match SvgDocument::parse(markup) {
                    Ok(mut doc) => {
                        annotation = Some(annotate(&mut doc));
                        if let Err(e) = self.viewport.bind(&mut doc, id) {
                            warn!(
                                slot = self.name,
                                rendering = %result.rendering,
                                error = %e,
                                "pan/zoom unavailable for diagram"
                            );
                        }
                        document = Some(doc);
                    }
                    Err(e) => {
                        warn!(
                            slot = self.name,
                            rendering = %result.rendering,
                            error = %e,
                            "diagram could not be parsed, showing it as-is"
                        );
                    }
                }
            }
        }

        self.mounted = Some(MountedDiagram {
            id,
            result,
            document,
            annotation,
        });
        id
    }

    pub fn view(&self) -> SlotView {
        let Some(mounted) = &self.mounted else {
            return SlotView::default();
        };
        SlotView {
            content: Some(mounted.content_view()),
            placeholder: mounted.result.is_placeholder,
            annotation: mounted.annotation.as_ref().map(|a| a.summary),
            viewport: self.viewport.instance().map(|i| i.view()),
        }
    }
}
