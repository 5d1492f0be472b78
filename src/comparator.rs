//! Side-by-side companion for the primary analysis diagram.

use crate::{
    fallback::{Exhausted, FallbackLoader, RenderingResult},
    resolver::EntityRef,
    selection::{Completion, LoadTicket},
    service::ImageService,
    slot::DiagramSlot,
    viewport::ViewportSettings,
};
use ssview_protocol::{ComparisonView, LoadStatus, RenderingType};
use tracing::{debug, info};

pub const COMPANION: RenderingType = RenderingType::OptimizedAnalysis;

/// The companion is shown only next to a genuinely loaded primary analysis.
pub fn should_activate(selected: RenderingType, status: LoadStatus) -> bool {
    selected == RenderingType::PrimaryAnalysis && status == LoadStatus::Loaded
}

#[derive(Debug, Clone)]
pub struct Comparator {
    slot: DiagramSlot,
    status: Option<LoadStatus>,
    message: Option<String>,
    primary_seq: Option<u64>,
}

impl Comparator {
    pub fn new(viewport: ViewportSettings) -> Self {
        Self {
            slot: DiagramSlot::new("comparison", viewport),
            status: None,
            message: None,
            primary_seq: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_some()
    }

    pub fn status(&self) -> Option<LoadStatus> {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn slot(&self) -> &DiagramSlot {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut DiagramSlot {
        &mut self.slot
    }

    /// Starts a companion load tied to the primary load `primary`.
    pub fn begin(&mut self, primary: LoadTicket) {
        self.slot.unmount();
        self.status = Some(LoadStatus::Loading);
        self.message = None;
        self.primary_seq = Some(primary.seq());
    }

    /// Applies the companion outcome unless the primary has moved on since
    /// `begin`. Failures stay local to this slot.
    pub fn finish(
        &mut self,
        primary: LoadTicket,
        outcome: Result<RenderingResult, Exhausted>,
    ) -> Completion {
        if self.primary_seq != Some(primary.seq()) {
            debug!(seq = primary.seq(), "discarding companion outcome for stale primary");
            return Completion::Discarded;
        }
        let status = match outcome {
            Ok(result) if result.is_placeholder => {
                self.message = Some(format!("{} is not available", COMPANION.label()));
                self.slot.mount(result);
                LoadStatus::Unavailable
            }
            Ok(result) => {
                self.slot.mount(result);
                LoadStatus::Loaded
            }
            Err(exhausted) => {
                info!(error = %exhausted, "companion diagram could not be loaded");
                self.message = Some(format!("Could not load the {} image", COMPANION.label()));
                LoadStatus::Error
            }
        };
        self.status = Some(status);
        Completion::Applied(status)
    }

    /// Fetches the companion for a primary already passed to `begin`.
    pub async fn load<S: ImageService>(
        &mut self,
        primary: LoadTicket,
        entity: &EntityRef,
        loader: &FallbackLoader<'_, S>,
    ) -> Completion {
        let outcome = loader.load(entity, &[COMPANION]).await;
        self.finish(primary, outcome)
    }

    /// Releases the companion viewport and forgets the companion load.
    pub fn deactivate(&mut self) {
        self.slot.unmount();
        self.status = None;
        self.message = None;
        self.primary_seq = None;
    }

    pub fn view(&self) -> Option<ComparisonView> {
        let status = self.status?;
        Some(ComparisonView {
            status,
            message: self.message.clone(),
            slot: self.slot.view(),
        })
    }
}
