//! In-memory image service and fixtures shared by the unit tests.

use crate::{
    resolver::{DEFAULT_BASE_URL, EntityRef, ImageResolver},
    service::{ImageService, TransportError},
};
use ssview_protocol::RenderingType;
use std::{cell::RefCell, collections::HashMap};
use url::Url;

pub const RSCAPE_SVG: &str = include_str!("../test_files/diagrams/rscape.svg");
pub const LAYERED_SVG: &str = include_str!("../test_files/diagrams/layered.svg");
pub const SMALL_SVG: &str = include_str!("../test_files/diagrams/small.svg");
pub const COMPANION_SVG: &str = include_str!("../test_files/diagrams/rscape_cyk.svg");

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

pub const ENTITY: &str = "RF00005";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe(String),
    Fetch(String),
}

#[derive(Debug, Clone)]
enum Probe {
    Status(bool),
    Broken,
}

#[derive(Debug, Clone)]
enum Body {
    Bytes(Vec<u8>),
    Broken,
}

#[derive(Debug, Default)]
pub struct MockImageService {
    probes: HashMap<String, Probe>,
    bodies: HashMap<String, Body>,
    calls: RefCell<Vec<Call>>,
}

pub fn entity() -> EntityRef {
    EntityRef::new(ENTITY).expect("fixture entity")
}

pub fn resolver() -> ImageResolver {
    ImageResolver::new(Url::parse(DEFAULT_BASE_URL).expect("fixture base"))
}

fn url_of(rendering: RenderingType) -> String {
    resolver().image_url(&entity(), rendering).to_string()
}

impl MockImageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, rendering: RenderingType, body: &[u8]) -> Self {
        let url = url_of(rendering);
        self.probes.insert(url.clone(), Probe::Status(true));
        self.bodies.insert(url, Body::Bytes(body.to_vec()));
        self
    }

    pub fn with_vector(self, rendering: RenderingType, svg: &str) -> Self {
        self.with_body(rendering, svg.as_bytes())
    }

    pub fn with_raster(self, rendering: RenderingType) -> Self {
        self.with_body(rendering, PNG_BYTES)
    }

    /// Probes as present but the `GET` fails in transit.
    pub fn with_broken_fetch(mut self, rendering: RenderingType) -> Self {
        let url = url_of(rendering);
        self.probes.insert(url.clone(), Probe::Status(true));
        self.bodies.insert(url, Body::Broken);
        self
    }

    pub fn with_broken_probe(mut self, rendering: RenderingType) -> Self {
        self.probes.insert(url_of(rendering), Probe::Broken);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Fetch(url) => Some(url.clone()),
                Call::Probe(_) => None,
            })
            .collect()
    }

    pub fn fetch_url(rendering: RenderingType) -> String {
        url_of(rendering)
    }
}

impl ImageService for MockImageService {
    async fn probe(&self, url: &Url) -> Result<bool, TransportError> {
        self.calls.borrow_mut().push(Call::Probe(url.to_string()));
        match self.probes.get(url.as_str()) {
            Some(Probe::Status(found)) => Ok(*found),
            Some(Probe::Broken) => Err(TransportError::Network {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
            None => Ok(false),
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        self.calls.borrow_mut().push(Call::Fetch(url.to_string()));
        match self.bodies.get(url.as_str()) {
            Some(Body::Bytes(bytes)) => Ok(bytes.clone()),
            Some(Body::Broken) => Err(TransportError::Network {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
