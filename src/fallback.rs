//! Sequential fallback over candidate rendering types.

use crate::{
    resolver::{EntityRef, ImageResolver},
    service::{ImageService, TransportError},
};
use image::ImageFormat;
use quick_xml::{Reader, events::Event};
use ssview_protocol::RenderingType;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Response body is empty")]
    Empty,
    #[error("Response body is neither SVG markup nor a recognised raster image")]
    Unrecognised,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderingContent {
    Vector(String),
    Raster { bytes: Vec<u8>, format: ImageFormat },
}

impl RenderingContent {
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Vector(_) => "image/svg+xml",
            Self::Raster { format, .. } => format.to_mime_type(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Vector(_) => "svg",
            Self::Raster { format, .. } => {
                format.extensions_str().first().copied().unwrap_or("img")
            }
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Vector(markup) => markup.as_bytes(),
            Self::Raster { bytes, .. } => bytes,
        }
    }
}

/// One successfully fetched rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderingResult {
    pub rendering: RenderingType,
    pub url: Url,
    pub content: RenderingContent,
    /// The service's "not computed" raster standing in for expected vector content.
    pub is_placeholder: bool,
}

impl RenderingResult {
    pub fn new(rendering: RenderingType, url: Url, content: RenderingContent) -> Self {
        let is_placeholder = !content.is_vector() && !rendering.expects_raster();
        Self {
            rendering,
            url,
            content,
            is_placeholder,
        }
    }

    /// Only genuine vector content is annotated and gets a viewport.
    pub fn is_interactive_vector(&self) -> bool {
        self.content.is_vector() && !self.is_placeholder
    }
}

/// Decides what a response body is by looking at it.
pub fn sniff_content(body: Vec<u8>) -> Result<RenderingContent, FormatError> {
    if body.is_empty() {
        return Err(FormatError::Empty);
    }
    if starts_with_markup(&body) {
        let text = match String::from_utf8(body) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
        if has_svg_root(&text) {
            return Ok(RenderingContent::Vector(text));
        }
        return Err(FormatError::Unrecognised);
    }
    match image::guess_format(&body) {
        Ok(format) => Ok(RenderingContent::Raster {
            bytes: body,
            format,
        }),
        Err(_) => Err(FormatError::Unrecognised),
    }
}

fn starts_with_markup(body: &[u8]) -> bool {
    let body = body.strip_prefix(b"\xef\xbb\xbf").unwrap_or(body);
    body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'<')
}

/// True when the first element of `markup` is `<svg>`. Prolog, comments,
/// doctype and processing instructions before it are skipped; an HTML page
/// with an inline icon has `<html>` as its first element and is rejected.
fn has_svg_root(markup: &str) -> bool {
    let mut reader = Reader::from_str(markup);
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                return start.local_name().as_ref() == b"svg";
            }
            Ok(Event::Eof) | Err(_) => return false,
            Ok(_) => {}
        }
    }
}

#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Every candidate of one attempt failed.
#[derive(Debug, Default, Error)]
#[error("{}", describe_attempts(.attempts))]
pub struct Exhausted {
    pub attempts: Vec<(RenderingType, AttemptFailure)>,
}

fn describe_attempts(attempts: &[(RenderingType, AttemptFailure)]) -> String {
    if attempts.is_empty() {
        return "no candidates to load".to_string();
    }
    let parts = attempts
        .iter()
        .map(|(rendering, failure)| format!("{rendering}: {failure}"))
        .collect::<Vec<_>>();
    format!("all candidates failed ({})", parts.join("; "))
}

pub struct FallbackLoader<'a, S> {
    service: &'a S,
    resolver: &'a ImageResolver,
}

impl<'a, S: ImageService> FallbackLoader<'a, S> {
    pub fn new(service: &'a S, resolver: &'a ImageResolver) -> Self {
        Self { service, resolver }
    }

    pub fn resolver(&self) -> &ImageResolver {
        self.resolver
    }

    pub fn service(&self) -> &S {
        self.service
    }

    /// Tries each candidate in order and returns the first structurally valid
    /// response. Later candidates are never requested once one succeeds.
    pub async fn load(
        &self,
        entity: &EntityRef,
        candidates: &[RenderingType],
    ) -> Result<RenderingResult, Exhausted> {
        let mut exhausted = Exhausted::default();
        for &rendering in candidates {
            let url = self.resolver.image_url(entity, rendering);
            let body = match self.service.fetch(&url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!(%rendering, error = %e, "fetch failed, trying next candidate");
                    exhausted
                        .attempts
                        .push((rendering, AttemptFailure::Transport(e)));
                    continue;
                }
            };
            match sniff_content(body) {
                Ok(content) => {
                    let result = RenderingResult::new(rendering, url, content);
                    info!(
                        %rendering,
                        placeholder = result.is_placeholder,
                        "loaded rendering"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    debug!(%rendering, error = %e, "unrecognised body, trying next candidate");
                    exhausted
                        .attempts
                        .push((rendering, AttemptFailure::Format(e)));
                }
            }
        }
        Err(exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockImageService, PNG_BYTES, RSCAPE_SVG, entity, resolver};
    use futures::executor::block_on;
    use ssview_protocol::RenderingType::*;

    const NOT_FOUND_PAGE: &str = "<!DOCTYPE html>\n<html><head><title>Rfam</title></head>\n\
        <body><svg class=\"icon\" width=\"16\" height=\"16\"/>Image not found</body></html>";

    #[test]
    fn sniffs_svg_behind_prolog_and_comment() {
        let content = sniff_content(RSCAPE_SVG.as_bytes().to_vec()).expect("svg");
        assert!(content.is_vector());
        assert_eq!(content.mime_type(), "image/svg+xml");
    }

    #[test]
    fn sniffs_png_magic_bytes() {
        let content = sniff_content(PNG_BYTES.to_vec()).expect("png");
        assert_eq!(content.mime_type(), "image/png");
        assert_eq!(content.extension(), "png");
    }

    #[test]
    fn rejects_html_error_pages_and_empty_bodies() {
        assert_eq!(
            sniff_content(b"<html><body>Not found</body></html>".to_vec()),
            Err(FormatError::Unrecognised)
        );
        assert_eq!(sniff_content(Vec::new()), Err(FormatError::Empty));
    }

    #[test]
    fn html_page_with_inline_icon_is_not_a_diagram() {
        assert_eq!(
            sniff_content(NOT_FOUND_PAGE.as_bytes().to_vec()),
            Err(FormatError::Unrecognised)
        );
    }

    #[test]
    fn html_page_falls_through_to_next_candidate() {
        let service = MockImageService::new()
            .with_body(Conservation, NOT_FOUND_PAGE.as_bytes())
            .with_vector(Covariation, RSCAPE_SVG);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let result =
            block_on(loader.load(&entity(), &[Conservation, Covariation])).expect("loaded");
        assert_eq!(result.rendering, Covariation);
        assert!(result.is_interactive_vector());
        assert_eq!(service.fetched().len(), 2);
    }

    #[test]
    fn raster_is_placeholder_except_for_arc_diagrams() {
        let url = Url::parse("https://example.org/x").expect("url");
        let raster = || RenderingContent::Raster {
            bytes: PNG_BYTES.to_vec(),
            format: ImageFormat::Png,
        };
        assert!(RenderingResult::new(Covariation, url.clone(), raster()).is_placeholder);
        assert!(!RenderingResult::new(ArcDiagram, url.clone(), raster()).is_placeholder);
        let vector =
            RenderingResult::new(Covariation, url, RenderingContent::Vector("<svg/>".into()));
        assert!(!vector.is_placeholder);
        assert!(vector.is_interactive_vector());
    }

    #[test]
    fn first_success_wins_without_peeking_ahead() {
        let service = MockImageService::new()
            .with_vector(Conservation, RSCAPE_SVG)
            .with_vector(Covariation, RSCAPE_SVG);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let result =
            block_on(loader.load(&entity(), &[Conservation, Covariation])).expect("loaded");
        assert_eq!(result.rendering, Conservation);
        assert_eq!(
            service.fetched(),
            vec![MockImageService::fetch_url(Conservation)]
        );
    }

    #[test]
    fn falls_through_transport_and_format_failures() {
        let service = MockImageService::new()
            .with_broken_fetch(PrimaryAnalysis)
            .with_body(Conservation, b"plain text, not an image")
            .with_vector(Normal, RSCAPE_SVG);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let result = block_on(loader.load(&entity(), &[PrimaryAnalysis, Conservation, Normal]))
            .expect("loaded");
        assert_eq!(result.rendering, Normal);
        assert!(!result.is_placeholder);
        assert_eq!(service.fetched().len(), 3);
    }

    #[test]
    fn reports_every_attempt_when_exhausted() {
        let service = MockImageService::new().with_broken_fetch(Entropy);
        let resolver = resolver();
        let loader = FallbackLoader::new(&service, &resolver);
        let exhausted =
            block_on(loader.load(&entity(), &[Entropy, OptimalParse])).expect_err("exhausted");
        let failed: Vec<_> = exhausted.attempts.iter().map(|(t, _)| *t).collect();
        assert_eq!(failed, vec![Entropy, OptimalParse]);
        assert!(exhausted.to_string().contains("HTTP 404"));
    }
}
