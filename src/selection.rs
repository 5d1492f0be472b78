//! Which rendering type is shown, and the load lifecycle around it.
//!
//! Every load attempt takes a `LoadTicket`. Only the outcome of the most
//! recently issued ticket is applied; anything older resolves to
//! `Completion::Discarded` and leaves the machine untouched. Tickets keep
//! counting across entity changes, so a load started for a previous entity
//! can never land on the new one.

use crate::{
    fallback::{Exhausted, FallbackLoader, RenderingResult},
    prober::available_candidates,
    resolver::EntityRef,
    service::ImageService,
    slot::DiagramSlot,
    svg_doc::SvgDocument,
    toggle::LayerToggleCycle,
    viewport::ViewportSettings,
};
use ssview_protocol::{LoadStatus, RenderingType, TogglePhase};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const NO_IMAGES_MESSAGE: &str = "No secondary structure images available";

pub fn switch_failure_message(rendering: RenderingType) -> String {
    format!("Could not load the {} image", rendering.label())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("At least one candidate rendering type is required")]
    NoCandidates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPurpose {
    Initialize,
    Switch(RenderingType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    purpose: LoadPurpose,
}

impl LoadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn purpose(&self) -> LoadPurpose {
        self.purpose
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied(LoadStatus),
    Discarded,
}

#[derive(Debug, Clone)]
pub struct SelectionMachine {
    entity: EntityRef,
    candidates: Vec<RenderingType>,
    available: Vec<RenderingType>,
    selected: RenderingType,
    status: LoadStatus,
    message: Option<String>,
    latest: u64,
    toggle: LayerToggleCycle,
    main: DiagramSlot,
}

impl SelectionMachine {
    pub fn new(
        entity: EntityRef,
        candidates: Vec<RenderingType>,
        viewport: ViewportSettings,
    ) -> Result<Self, SelectionError> {
        let selected = *candidates.first().ok_or(SelectionError::NoCandidates)?;
        Ok(Self {
            entity,
            candidates,
            available: Vec::new(),
            selected,
            status: LoadStatus::Loading,
            message: None,
            latest: 0,
            toggle: LayerToggleCycle::default(),
            main: DiagramSlot::new("main", viewport),
        })
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn candidates(&self) -> &[RenderingType] {
        &self.candidates
    }

    /// Types that probed as present during the last initialization.
    pub fn available(&self) -> &[RenderingType] {
        &self.available
    }

    pub fn selected(&self) -> RenderingType {
        self.selected
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn toggle_phase(&self) -> TogglePhase {
        self.toggle.phase()
    }

    pub fn main(&self) -> &DiagramSlot {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut DiagramSlot {
        &mut self.main
    }

    pub fn current(&self) -> Option<&RenderingResult> {
        self.main.mounted().map(|m| m.result())
    }

    pub fn is_latest(&self, ticket: LoadTicket) -> bool {
        ticket.seq == self.latest
    }

    fn issue(&mut self, purpose: LoadPurpose, selected: RenderingType) -> LoadTicket {
        self.latest += 1;
        self.main.unmount();
        self.toggle.reset();
        self.selected = selected;
        self.status = LoadStatus::Loading;
        self.message = None;
        LoadTicket {
            seq: self.latest,
            purpose,
        }
    }

    pub fn begin_initialize(&mut self) -> LoadTicket {
        self.available.clear();
        let first = self.candidates[0];
        debug!(entity = %self.entity, "initializing selection");
        self.issue(LoadPurpose::Initialize, first)
    }

    /// Enters `loading` for `rendering`. The outgoing diagram and its viewport
    /// are dropped straight away rather than kept on screen.
    pub fn begin_switch(&mut self, rendering: RenderingType) -> LoadTicket {
        debug!(entity = %self.entity, %rendering, "switching rendering type");
        self.issue(LoadPurpose::Switch(rendering), rendering)
    }

    /// Changes the entity and tears down everything shown for the old one.
    /// The caller follows up with `begin_initialize`.
    pub fn reset_entity(&mut self, entity: EntityRef) {
        self.latest += 1;
        self.main.unmount();
        self.toggle.reset();
        self.available.clear();
        self.selected = self.candidates[0];
        self.status = LoadStatus::Loading;
        self.message = None;
        info!(from = %self.entity, to = %entity, "entity changed");
        self.entity = entity;
    }

    /// Probes and fetches for `ticket` without touching displayed state,
    /// apart from recording which types are available.
    pub async fn acquire<S: ImageService>(
        &mut self,
        ticket: LoadTicket,
        loader: &FallbackLoader<'_, S>,
    ) -> Result<RenderingResult, Exhausted> {
        match ticket.purpose {
            LoadPurpose::Initialize => {
                let available = available_candidates(
                    loader.service(),
                    loader.resolver(),
                    &self.entity,
                    &self.candidates,
                )
                .await;
                if self.is_latest(ticket) {
                    self.available = available.clone();
                }
                if available.is_empty() {
                    return Err(Exhausted::default());
                }
                loader.load(&self.entity, &available).await
            }
            LoadPurpose::Switch(rendering) => loader.load(&self.entity, &[rendering]).await,
        }
    }

    /// Applies a finished load if `ticket` is still the latest one.
    pub fn finish(
        &mut self,
        ticket: LoadTicket,
        outcome: Result<RenderingResult, Exhausted>,
    ) -> Completion {
        if !self.is_latest(ticket) {
            debug!(
                seq = ticket.seq,
                latest = self.latest,
                "discarding stale load outcome"
            );
            return Completion::Discarded;
        }
        match outcome {
            Ok(result) => {
                self.selected = result.rendering;
                self.status = if result.is_placeholder {
                    LoadStatus::Unavailable
                } else {
                    LoadStatus::Loaded
                };
                self.main.mount(result);
            }
            Err(exhausted) => {
                self.status = LoadStatus::Error;
                let message = match ticket.purpose {
                    LoadPurpose::Initialize => NO_IMAGES_MESSAGE.to_string(),
                    LoadPurpose::Switch(rendering) => switch_failure_message(rendering),
                };
                warn!(entity = %self.entity, error = %exhausted, "{message}");
                self.message = Some(message);
            }
        }
        Completion::Applied(self.status)
    }

    pub async fn run<S: ImageService>(
        &mut self,
        ticket: LoadTicket,
        loader: &FallbackLoader<'_, S>,
    ) -> Completion {
        let outcome = self.acquire(ticket, loader).await;
        self.finish(ticket, outcome)
    }

    pub async fn initialize<S: ImageService>(
        &mut self,
        loader: &FallbackLoader<'_, S>,
    ) -> Completion {
        let ticket = self.begin_initialize();
        self.run(ticket, loader).await
    }

    pub async fn switch_to<S: ImageService>(
        &mut self,
        rendering: RenderingType,
        loader: &FallbackLoader<'_, S>,
    ) -> Completion {
        let ticket = self.begin_switch(rendering);
        self.run(ticket, loader).await
    }

    /// Advances the layer toggle of the displayed diagram.
    pub fn cycle_layers(&mut self) -> Option<TogglePhase> {
        if self.status != LoadStatus::Loaded {
            return None;
        }
        let selected = self.selected;
        let (mounted, _) = self.main.parts_mut();
        let doc: &mut SvgDocument = mounted?.document_mut()?;
        self.toggle.advance(selected, doc)
    }

    pub fn teardown(&mut self) {
        self.latest += 1;
        self.main.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::sniff_content;
    use crate::test_support::{
        COMPANION_SVG, Call, LAYERED_SVG, MockImageService, RSCAPE_SVG, entity, resolver,
    };
    use futures::executor::block_on;
    use ssview_protocol::DiagramContent;
    use url::Url;

    use ssview_protocol::RenderingType::{Conservation as A, Covariation as B, Entropy as C};

    fn machine(candidates: &[RenderingType]) -> SelectionMachine {
        SelectionMachine::new(entity(), candidates.to_vec(), ViewportSettings::default())
            .expect("machine")
    }

    fn vector_result(rendering: RenderingType, svg: &str) -> RenderingResult {
        let url = Url::parse(&MockImageService::fetch_url(rendering)).expect("url");
        RenderingResult::new(rendering, url, sniff_content(svg.as_bytes().to_vec()).expect("svg"))
    }

    #[test]
    fn requires_a_candidate() {
        assert_eq!(
            SelectionMachine::new(entity(), vec![], ViewportSettings::default()).err(),
            Some(SelectionError::NoCandidates)
        );
    }

    #[test]
    fn starts_loading_with_first_candidate() {
        let mut machine = machine(&[B, A]);
        let ticket = machine.begin_initialize();
        assert_eq!(machine.status(), LoadStatus::Loading);
        assert_eq!(machine.selected(), B);
        assert_eq!(ticket.purpose(), LoadPurpose::Initialize);
    }

    #[test]
    fn falls_back_past_unavailable_and_broken_candidates() {
        let service = MockImageService::new()
            .with_broken_fetch(B)
            .with_vector(C, RSCAPE_SVG);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let mut machine = machine(&[A, B, C]);

        let completion = block_on(machine.initialize(&loader));

        assert_eq!(completion, Completion::Applied(LoadStatus::Loaded));
        assert_eq!(machine.selected(), C);
        assert_eq!(machine.available(), &[B, C]);
        assert_eq!(machine.current().map(|r| r.is_placeholder), Some(false));
        assert_eq!(
            service.fetched(),
            vec![
                MockImageService::fetch_url(B),
                MockImageService::fetch_url(C)
            ]
        );
        assert_eq!(machine.main().view().annotation.map(|a| a.basepairs), Some(10));
    }

    #[test]
    fn html_soft_404_counts_as_a_failed_candidate() {
        let page = "<!DOCTYPE html><html><body><svg class=\"icon\"/>Image not found</body></html>";
        let service = MockImageService::new()
            .with_body(A, page.as_bytes())
            .with_vector(B, RSCAPE_SVG);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let mut machine = machine(&[A, B]);

        let completion = block_on(machine.initialize(&loader));

        assert_eq!(completion, Completion::Applied(LoadStatus::Loaded));
        assert_eq!(machine.selected(), B);
        assert_eq!(machine.main().view().annotation.map(|a| a.basepairs), Some(10));
    }

    #[test]
    fn first_genuine_candidate_wins_without_peeking_ahead() {
        let service = MockImageService::new()
            .with_vector(A, RSCAPE_SVG)
            .with_vector(B, LAYERED_SVG);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let mut machine = machine(&[A, B]);

        block_on(machine.initialize(&loader));

        assert_eq!(machine.selected(), A);
        assert_eq!(service.fetched(), vec![MockImageService::fetch_url(A)]);
    }

    #[test]
    fn nothing_available_is_an_error_without_fetching() {
        let service = MockImageService::new().with_broken_probe(C);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let mut machine = machine(&[A, B, C]);

        let completion = block_on(machine.initialize(&loader));

        assert_eq!(completion, Completion::Applied(LoadStatus::Error));
        assert_eq!(machine.message(), Some(NO_IMAGES_MESSAGE));
        assert!(service.fetched().is_empty());
        assert!(service.calls().iter().all(|c| matches!(c, Call::Probe(_))));
        assert!(machine.current().is_none());
    }

    #[test]
    fn placeholder_is_unavailable_not_error() {
        let service = MockImageService::new().with_raster(RenderingType::PrimaryAnalysis);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let mut machine = machine(&[RenderingType::PrimaryAnalysis]);

        let completion = block_on(machine.initialize(&loader));

        assert_eq!(completion, Completion::Applied(LoadStatus::Unavailable));
        assert!(machine.message().is_none());
        let view = machine.main().view();
        assert!(view.placeholder);
        assert!(view.annotation.is_none());
        assert!(matches!(view.content, Some(DiagramContent::Raster { .. })));
    }

    #[test]
    fn arc_diagram_raster_is_loaded() {
        let service = MockImageService::new().with_raster(RenderingType::ArcDiagram);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let mut machine = machine(&[RenderingType::ArcDiagram]);
        assert_eq!(
            block_on(machine.initialize(&loader)),
            Completion::Applied(LoadStatus::Loaded)
        );
    }

    #[test]
    fn failed_switch_reports_the_type() {
        let service = MockImageService::new().with_vector(A, LAYERED_SVG);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let mut machine = machine(&[A, B]);
        block_on(machine.initialize(&loader));

        let completion = block_on(machine.switch_to(B, &loader));

        assert_eq!(completion, Completion::Applied(LoadStatus::Error));
        assert_eq!(machine.selected(), B);
        assert_eq!(machine.message(), Some("Could not load the Covariation image"));
        assert!(machine.current().is_none());
        assert_eq!(machine.main().viewport().live_instances(), 0);
    }

    #[test]
    fn switching_twice_keeps_one_viewport() {
        let service = MockImageService::new()
            .with_vector(A, LAYERED_SVG)
            .with_vector(B, RSCAPE_SVG);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let mut machine = machine(&[A, B]);
        block_on(machine.initialize(&loader));
        assert_eq!(machine.main().viewport().live_instances(), 1);

        block_on(machine.switch_to(B, &loader));
        assert!(machine.main().viewport().live_instances() <= 1);
        block_on(machine.switch_to(A, &loader));

        assert_eq!(machine.main().viewport().live_instances(), 1);
        assert_eq!(machine.selected(), A);
    }

    #[test]
    fn switch_discards_content_immediately() {
        let mut machine = machine(&[A, B]);
        let ticket = machine.begin_initialize();
        machine.finish(ticket, Ok(vector_result(A, LAYERED_SVG)));
        assert_eq!(machine.main().viewport().live_instances(), 1);

        machine.begin_switch(B);

        assert_eq!(machine.status(), LoadStatus::Loading);
        assert!(machine.current().is_none());
        assert_eq!(machine.main().viewport().live_instances(), 0);
    }

    #[test]
    fn stale_outcomes_are_discarded() {
        let mut machine = machine(&[A, B, C]);
        let init = machine.begin_initialize();
        let first = machine.begin_switch(B);
        let second = machine.begin_switch(C);

        assert_eq!(
            machine.finish(second, Ok(vector_result(C, RSCAPE_SVG))),
            Completion::Applied(LoadStatus::Loaded)
        );
        assert_eq!(
            machine.finish(first, Ok(vector_result(B, LAYERED_SVG))),
            Completion::Discarded
        );
        assert_eq!(machine.finish(init, Err(Exhausted::default())), Completion::Discarded);
        assert_eq!(machine.selected(), C);
        assert_eq!(machine.status(), LoadStatus::Loaded);
    }

    #[test]
    fn entity_reset_invalidates_in_flight_loads() {
        let mut machine = machine(&[A, B]);
        let ticket = machine.begin_initialize();
        machine.reset_entity(EntityRef::new("RF00001").expect("entity"));
        assert_eq!(
            machine.finish(ticket, Ok(vector_result(A, LAYERED_SVG))),
            Completion::Discarded
        );
        assert_eq!(machine.entity().as_str(), "RF00001");
        assert_eq!(machine.status(), LoadStatus::Loading);
        assert!(machine.begin_initialize().seq() > ticket.seq());
    }

    #[test]
    fn layers_cycle_and_reset_on_type_change() {
        let mut machine = machine(&[A, B]);
        let ticket = machine.begin_initialize();
        machine.finish(ticket, Ok(vector_result(A, LAYERED_SVG)));

        assert_eq!(machine.cycle_layers(), Some(TogglePhase::StructureOnly));
        assert_eq!(machine.toggle_phase(), TogglePhase::StructureOnly);

        let ticket = machine.begin_switch(B);
        assert_eq!(machine.toggle_phase(), TogglePhase::AllVisible);
        assert_eq!(machine.cycle_layers(), None);
        machine.finish(ticket, Ok(vector_result(B, RSCAPE_SVG)));
        assert_eq!(machine.cycle_layers(), Some(TogglePhase::StructureOnly));

        let ticket = machine.begin_switch(C);
        machine.finish(ticket, Ok(vector_result(C, COMPANION_SVG)));
        assert_eq!(machine.cycle_layers(), None);
        assert_eq!(machine.toggle_phase(), TogglePhase::AllVisible);
    }
}
