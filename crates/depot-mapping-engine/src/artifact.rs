//! Downloads and validates a pre-built depot mapping snapshot, the
//! alternative to crawling the catalog directly.

use crate::model::ArtifactDocument;
use gamecache_config::{atomic_write, CoreError, CoreResult};
use std::path::Path;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Downloads `url`, validates it is a non-empty mapping set, and caches it
/// at `artifact_path`. A structurally valid but empty document is an
/// error — it is never written to disk and never used to clear existing
/// mappings.
pub async fn fetch_artifact(
    http: &reqwest::Client,
    url: &str,
    artifact_path: &Path,
) -> CoreResult<ArtifactDocument> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, http.get(url).send())
        .await
        .map_err(|_| CoreError::Transient(format!("artifact fetch from {url} timed out")))?
        .map_err(|err| CoreError::Transient(format!("artifact fetch failed: {err}")))?
        .error_for_status()
        .map_err(|err| CoreError::Transient(format!("artifact fetch rejected: {err}")))?;

    let body = response
        .text()
        .await
        .map_err(|err| CoreError::Transient(format!("reading artifact body failed: {err}")))?;

    let document: ArtifactDocument = serde_json::from_str(&body)
        .map_err(|err| CoreError::Invalid(format!("malformed artifact JSON: {err}")))?;

    if document.depot_mappings.is_empty() || document.metadata.total_mappings == 0 {
        return Err(CoreError::Invalid(
            "artifact rejected: empty depot_mappings or zero total_mappings".to_string(),
        ));
    }

    let serialized = serde_json::to_string_pretty(&document).map_err(CoreError::from)?;
    let tmp = artifact_path.with_extension("json.tmp");
    atomic_write(artifact_path, &tmp, &serialized)?;

    Ok(document)
}
