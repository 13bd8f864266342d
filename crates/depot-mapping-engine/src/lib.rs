mod apply;
mod artifact;
mod caches;
mod cancel;
mod engine;
mod model;
mod side_effects;
mod storefront;
mod viability;

pub use apply::apply_to_downloads;
pub use artifact::fetch_artifact;
pub use caches::EngineCaches;
pub use cancel::TokenCancel;
pub use engine::DepotMappingEngine;
pub use model::{ArtifactDocument, ArtifactMetadata, RequestOrigin, ScanMode};
pub use side_effects::GameCacheSideEffects;
pub use storefront::{testing, GameInfo, StorefrontClient};
pub use viability::{check_viability, INCREMENTAL_CHANGE_BUDGET};
