//! Seam for the third-party storefront API used only by
//! `apply_to_downloads` to back-fill a human-readable name and header
//! image. Out of scope as a real network client; production code wires a
//! concrete implementation in here.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub name: String,
    pub header_image: String,
}

#[async_trait]
pub trait StorefrontClient: Send + Sync {
    /// Returns `None` if the storefront has no listing for `app_id`
    /// (delisted, invalid, or the request failed) rather than an error —
    /// `apply_to_downloads` always has a literal fallback and never needs
    /// to distinguish "not found" from "unreachable".
    async fn get_game_info(&self, app_id: u32) -> Option<GameInfo>;
}

pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns `None` for every app id. The default in tests that don't
    /// care about storefront enrichment.
    pub struct NullStorefront;

    #[async_trait]
    impl StorefrontClient for NullStorefront {
        async fn get_game_info(&self, _app_id: u32) -> Option<GameInfo> {
            None
        }
    }

    /// Returns a canned answer for a fixed set of app ids, `None`
    /// otherwise.
    #[derive(Default)]
    pub struct StubStorefront(Mutex<HashMap<u32, GameInfo>>);

    impl StubStorefront {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(self, app_id: u32, info: GameInfo) -> Self {
            self.0.lock().unwrap().insert(app_id, info);
            self
        }
    }

    #[async_trait]
    impl StorefrontClient for StubStorefront {
        async fn get_game_info(&self, app_id: u32) -> Option<GameInfo> {
            self.0.lock().unwrap().get(&app_id).cloned()
        }
    }
}
