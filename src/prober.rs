use crate::{
    resolver::{EntityRef, ImageResolver},
    service::ImageService,
};
use futures::future::join_all;
use serde::Serialize;
use ssview_protocol::RenderingType;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub rendering: RenderingType,
    pub available: bool,
}

/// Issues one `HEAD` per candidate, all at once, and waits for every answer.
///
/// Transport failures count as absence. Reports keep the candidate order.
pub async fn probe_availability<S: ImageService>(
    service: &S,
    resolver: &ImageResolver,
    entity: &EntityRef,
    candidates: &[RenderingType],
) -> Vec<ProbeReport> {
    let probes = candidates.iter().map(|&rendering| async move {
        let url = resolver.image_url(entity, rendering);
        let available = match service.probe(&url).await {
            Ok(found) => found,
            Err(e) => {
                debug!(%rendering, error = %e, "probe failed, treating as unavailable");
                false
            }
        };
        ProbeReport {
            rendering,
            available,
        }
    });
    join_all(probes).await
}

/// The candidates that probed as present, in their original order.
pub async fn available_candidates<S: ImageService>(
    service: &S,
    resolver: &ImageResolver,
    entity: &EntityRef,
    candidates: &[RenderingType],
) -> Vec<RenderingType> {
    probe_availability(service, resolver, entity, candidates)
        .await
        .into_iter()
        .filter(|r| r.available)
        .map(|r| r.rendering)
        .collect()
}
