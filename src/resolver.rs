use ssview_protocol::RenderingType;
use std::fmt;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://rfam.org/family";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    #[error("Entity reference is empty")]
    Empty,
}

/// Identifier of the family being visualized, e.g. `RF00005`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef(String);

impl EntityRef {
    pub fn new(raw: &str) -> Result<Self, EntityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EntityError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps (entity, rendering type) to image service locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResolver {
    base: Url,
}

impl ImageResolver {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `<base>/<entity>/image/<type>`
    pub fn image_url(&self, entity: &EntityRef, rendering: RenderingType) -> Url {
        self.join(&[entity.as_str(), "image", rendering.slug()])
    }

    /// `<base>/<entity>/varna`, the interactive structure editor.
    pub fn editor_url(&self, entity: &EntityRef) -> Url {
        self.join(&[entity.as_str(), "varna"])
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Bases that cannot carry a path (mailto:, data:) are rejected by config
        // validation, so the segments are always appended here.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
