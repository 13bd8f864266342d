//! Sealed, encrypted Steam credential storage.
//!
//! Unlike general-purpose OS keychains, this store holds exactly one
//! document (`SteamAuth`) in a single encrypted file under
//! `<data>/steam_auth/`. The key is derived once per data directory from a
//! locally generated seed, never entered by the user and never sent
//! anywhere.

mod crypto;
mod store;

pub use crypto::StorageError;
pub use store::{migrate_legacy_from_json, AuthMode, SecretStore, SteamAuth};
