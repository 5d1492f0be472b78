//! The embeddable viewer: a host container, a configuration and an image
//! service, wired into one object with an explicit lifetime.
//!
//! `mount` replaces any page-level registry. The host keeps the returned
//! `Widget`, forwards user input to it, and gets its container back from
//! `dispose` once every viewport has been released.

use crate::{
    comparator::{self, Comparator},
    config::{ConfigError, WidgetConfig},
    fallback::{FallbackLoader, RenderingContent},
    magnifier::{self, ImageBox, Magnifier},
    palette::legend_entries,
    resolver::{EntityError, EntityRef, ImageResolver},
    selection::{LoadTicket, SelectionError, SelectionMachine},
    service::ImageService,
    slot::{DiagramSlot, MountId},
    toggle,
    viewport::{ViewportController, ViewportError},
};
use ssview_protocol::{
    LensView, LoadStatus, RenderingType, TogglePhase, TypeOption, ViewportView, WidgetView,
};
use tracing::{debug, info};
use url::Url;

/// What the widget needs from whatever displays it.
pub trait Container {
    fn render(&mut self, view: &WidgetView);

    /// Opens `url` in a separate viewing surface (new tab, window, viewer).
    fn open_surface(&mut self, url: &Url);

    fn save_download(&mut self, download: &Download);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Main,
    Comparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Toggled(TogglePhase),
    OpenedFullImage,
    Ignored,
}

pub fn mount<C: Container, S: ImageService>(
    container: C,
    config: WidgetConfig,
    service: S,
) -> Result<Widget<C, S>, ConfigError> {
    config.validate()?;
    let entity = config.entity_ref()?;
    let selection = SelectionMachine::new(entity, config.candidates.clone(), config.viewport)
        .map_err(|SelectionError::NoCandidates| ConfigError::NoCandidates)?;
    info!(entity = %config.entity, base = %config.base_url, "mounted viewer");
    Ok(Widget {
        container,
        service,
        resolver: ImageResolver::new(config.base_url.clone()),
        comparator: Comparator::new(config.viewport),
        magnifier: Magnifier::new(config.magnifier),
        selection,
        config,
    })
}

pub struct Widget<C, S> {
    container: C,
    service: S,
    resolver: ImageResolver,
    config: WidgetConfig,
    selection: SelectionMachine,
    comparator: Comparator,
    magnifier: Magnifier,
}

impl<C: Container, S: ImageService> Widget<C, S> {
    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn selection(&self) -> &SelectionMachine {
        &self.selection
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    fn render(&mut self) {
        let view = self.view();
        self.container.render(&view);
    }

    /// Probes the candidates, loads the first one that works and, for the
    /// primary analysis, its companion.
    pub async fn initialize(&mut self) -> LoadStatus {
        self.comparator.deactivate();
        self.magnifier.pointer_left();
        let ticket = self.selection.begin_initialize();
        self.render();
        self.run_primary(ticket).await
    }

    /// Re-enters loading for `rendering`. Re-selecting the type already on
    /// screen does nothing.
    pub async fn switch_type(&mut self, rendering: RenderingType) -> LoadStatus {
        if rendering == self.selection.selected()
            && matches!(
                self.selection.status(),
                LoadStatus::Loaded | LoadStatus::Unavailable
            )
        {
            return self.selection.status();
        }
        self.comparator.deactivate();
        self.magnifier.pointer_left();
        let ticket = self.selection.begin_switch(rendering);
        self.render();
        self.run_primary(ticket).await
    }

    /// Points the widget at a different family and starts over.
    pub async fn set_entity(&mut self, raw: &str) -> Result<LoadStatus, EntityError> {
        let entity = EntityRef::new(raw)?;
        self.comparator.deactivate();
        self.config.entity = entity.to_string();
        self.selection.reset_entity(entity);
        Ok(self.initialize().await)
    }

    async fn run_primary(&mut self, ticket: LoadTicket) -> LoadStatus {
        let outcome = {
            let loader = FallbackLoader::new(&self.service, &self.resolver);
            self.selection.acquire(ticket, &loader).await
        };
        self.selection.finish(ticket, outcome);
        self.render();
        self.run_companion(ticket).await;
        self.selection.status()
    }

    async fn run_companion(&mut self, primary: LoadTicket) {
        if !self.config.show_comparison
            || !self.selection.is_latest(primary)
            || !comparator::should_activate(self.selection.selected(), self.selection.status())
        {
            return;
        }
        self.comparator.begin(primary);
        self.render();
        let loader = FallbackLoader::new(&self.service, &self.resolver);
        self.comparator.load(primary, self.selection.entity(), &loader).await;
        self.render();
    }

    /// A click on the main diagram cycles the layers, or for arc diagrams
    /// opens the full-size image.
    pub fn click_diagram(&mut self) -> ClickOutcome {
        let selected = self.selection.selected();
        if magnifier::applies_to(selected) {
            let Some(result) = self.selection.current().filter(|r| !r.is_placeholder) else {
                return ClickOutcome::Ignored;
            };
            let url = result.url.clone();
            debug!(%url, "opening full-size arc diagram");
            self.container.open_surface(&url);
            return ClickOutcome::OpenedFullImage;
        }
        match self.selection.cycle_layers() {
            Some(phase) => {
                self.render();
                ClickOutcome::Toggled(phase)
            }
            None => ClickOutcome::Ignored,
        }
    }

    fn magnifier_active(&self) -> bool {
        magnifier::applies_to(self.selection.selected())
            && self.selection.status() == LoadStatus::Loaded
    }

    pub fn pointer_moved(&mut self, image: ImageBox, x: f64, y: f64) -> Option<LensView> {
        if !self.magnifier_active() {
            return None;
        }
        let lens = self.magnifier.pointer_moved(image, x, y);
        self.render();
        lens
    }

    pub fn pointer_left(&mut self) {
        if self.magnifier.lens().is_some() {
            self.magnifier.pointer_left();
            self.render();
        }
    }

    fn slot_mut(&mut self, kind: SlotKind) -> &mut DiagramSlot {
        match kind {
            SlotKind::Main => self.selection.main_mut(),
            SlotKind::Comparison => self.comparator.slot_mut(),
        }
    }

    fn drive_viewport(
        &mut self,
        kind: SlotKind,
        op: impl FnOnce(&mut ViewportController, MountId) -> Result<ViewportView, ViewportError>,
    ) -> Result<ViewportView, ViewportError> {
        let (mounted, viewport) = self.slot_mut(kind).parts_mut();
        let mount = mounted.map(|m| m.id()).ok_or(ViewportError::Unbound)?;
        let view = op(viewport, mount)?;
        self.render();
        Ok(view)
    }

    pub fn zoom_in(
        &mut self,
        kind: SlotKind,
        at: Option<(f64, f64)>,
    ) -> Result<ViewportView, ViewportError> {
        self.drive_viewport(kind, |v, m| v.zoom_in(m, at))
    }

    pub fn zoom_out(
        &mut self,
        kind: SlotKind,
        at: Option<(f64, f64)>,
    ) -> Result<ViewportView, ViewportError> {
        self.drive_viewport(kind, |v, m| v.zoom_out(m, at))
    }

    pub fn pan_by(
        &mut self,
        kind: SlotKind,
        dx: f64,
        dy: f64,
    ) -> Result<ViewportView, ViewportError> {
        self.drive_viewport(kind, |v, m| v.pan_by(m, dx, dy))
    }

    pub fn reset_view(&mut self, kind: SlotKind) -> Result<ViewportView, ViewportError> {
        self.drive_viewport(kind, |v, m| v.reset(m))
    }

    pub fn editor_url(&self) -> Option<Url> {
        self.config
            .show_editor_launch
            .then(|| self.resolver.editor_url(self.selection.entity()))
    }

    pub fn launch_editor(&mut self) -> Option<Url> {
        let url = self.editor_url()?;
        self.container.open_surface(&url);
        Some(url)
    }

    /// The diagram as displayed, named `<entity>_<type>.<ext>`.
    pub fn current_download(&self) -> Option<Download> {
        let mounted = self.selection.main().mounted()?;
        let result = mounted.result();
        let bytes = match &result.content {
            RenderingContent::Vector(_) => mounted.markup()?.into_bytes(),
            RenderingContent::Raster { bytes, .. } => bytes.clone(),
        };
        Some(Download {
            filename: format!(
                "{}_{}.{}",
                self.selection.entity(),
                result.rendering.slug(),
                result.content.extension()
            ),
            mime: result.content.mime_type().to_string(),
            bytes,
        })
    }

    pub fn download(&mut self) -> Option<Download> {
        let download = self.current_download()?;
        info!(filename = %download.filename, bytes = download.bytes.len(), "saving diagram");
        self.container.save_download(&download);
        Some(download)
    }

    fn type_options(&self) -> Vec<TypeOption> {
        let listed = match self.selection.available() {
            [] => self.selection.candidates(),
            available => available,
        };
        listed
            .iter()
            .map(|&rendering| TypeOption {
                rendering,
                label: rendering.label().to_string(),
            })
            .collect()
    }

    pub fn view(&self) -> WidgetView {
        let selected = self.selection.selected();
        let status = self.selection.status();
        let main = self.selection.main().view();
        let legend = if self.config.show_legend && main.annotation.is_some() {
            legend_entries()
        } else {
            Vec::new()
        };
        WidgetView {
            entity: self.selection.entity().to_string(),
            selected,
            options: self.type_options(),
            status,
            message: self.selection.message().map(str::to_string),
            description: self
                .config
                .show_description
                .then(|| selected.description().to_string()),
            legend,
            toggle_phase: (status == LoadStatus::Loaded && toggle::applies_to(selected))
                .then(|| self.selection.toggle_phase()),
            main,
            comparison: self.comparator.view(),
            lens: self.magnifier.lens(),
            editor_url: self.editor_url().map(|u| u.to_string()),
        }
    }

    /// Releases both viewports, invalidates in-flight loads and hands the
    /// container back.
    pub fn dispose(mut self) -> C {
        self.comparator.deactivate();
        self.selection.teardown();
        info!(entity = %self.selection.entity(), "disposed viewer");
        self.container
    }
}
