use crate::crypto::{self, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Anonymous,
    Authenticated,
}

/// Steam credentials, the sole document this store holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteamAuth {
    pub mode: AuthMode,
    pub username: Option<String>,
    pub refresh_token: Option<String>,
    pub last_authenticated: Option<DateTime<Utc>>,
}

impl Default for SteamAuth {
    fn default() -> Self {
        Self {
            mode: AuthMode::Anonymous,
            username: None,
            refresh_token: None,
            last_authenticated: None,
        }
    }
}

/// On-disk envelope: base64 nonce + base64 ciphertext (tag included).
#[derive(Serialize, Deserialize)]
struct Envelope {
    nonce: String,
    ciphertext: String,
}

pub struct SecretStore {
    file_path: PathBuf,
    seed_path: PathBuf,
    key: [u8; 32],
}

impl SecretStore {
    /// Open (creating if necessary) the sealed store rooted at `dir`,
    /// with the credentials file at `file_path` and the key seed at
    /// `seed_path`.
    pub fn open(dir: &Path, file_path: PathBuf, seed_path: PathBuf) -> StorageResult<Self> {
        std::fs::create_dir_all(dir)?;

        let seed = if seed_path.exists() {
            let raw = std::fs::read(&seed_path)?;
            if raw.len() != 32 {
                return Err(StorageError::BadSeed(raw.len()));
            }
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&raw);
            seed
        } else {
            let seed = crypto::generate_seed();
            std::fs::write(&seed_path, seed)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = std::fs::metadata(&seed_path)?.permissions();
                perms.set_mode(0o600);
                std::fs::set_permissions(&seed_path, perms)?;
            }
            seed
        };

        let key = crypto::derive_key(&seed)?;
        Ok(Self {
            file_path,
            seed_path,
            key,
        })
    }

    pub fn get(&self) -> StorageResult<Option<SteamAuth>> {
        if !self.file_path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.file_path)?;
        let envelope: Envelope = serde_json::from_str(&raw)?;
        let nonce = base64_decode(&envelope.nonce)?;
        let ciphertext = base64_decode(&envelope.ciphertext)?;
        let plaintext = crypto::open(&self.key, &nonce, &ciphertext)?;
        let auth: SteamAuth = serde_json::from_slice(&plaintext)?;
        Ok(Some(auth))
    }

    pub fn set(&self, auth: &SteamAuth) -> StorageResult<()> {
        let plaintext = serde_json::to_vec(auth)?;
        let (nonce, ciphertext) = crypto::seal(&self.key, &plaintext)?;
        let envelope = Envelope {
            nonce: base64_encode(&nonce),
            ciphertext: base64_encode(&ciphertext),
        };
        let serialized = serde_json::to_string_pretty(&envelope)?;

        let tmp_path = self.file_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, &self.file_path)?;
        Ok(())
    }

    pub fn clear(&self) -> StorageResult<()> {
        if self.file_path.exists() {
            std::fs::remove_file(&self.file_path)?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn seed_path(&self) -> &Path {
        &self.seed_path
    }
}

/// Lift a legacy inline `SteamAuth`-shaped JSON block (as kept in the old
/// single-document state store) into a typed value, for one-time migration
/// into the sealed store. Returns `None` if the block is absent or does
/// not look like a `SteamAuth` document.
pub fn migrate_legacy_from_json(value: &serde_json::Value) -> Option<SteamAuth> {
    serde_json::from_value(value.clone()).ok()
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(s: &str) -> StorageResult<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(StorageError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> SecretStore {
        SecretStore::open(
            dir,
            dir.join("credentials.json"),
            dir.join(".keyseed"),
        )
        .unwrap()
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let auth = SteamAuth {
            mode: AuthMode::Authenticated,
            username: Some("player1".to_string()),
            refresh_token: Some("rt-123".to_string()),
            last_authenticated: Some(Utc::now()),
        };
        store.set(&auth).unwrap();

        let loaded = store.get().unwrap().unwrap();
        assert_eq!(loaded, auth);
    }

    #[test]
    fn clear_removes_credentials_but_keeps_seed() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.set(&SteamAuth::default()).unwrap();
        assert!(store.get().unwrap().is_some());

        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
        assert!(store.seed_path().exists());
    }

    #[test]
    fn tampered_file_fails_to_decrypt() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.set(&SteamAuth::default()).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("credentials.json")).unwrap();
        let mut envelope: Envelope = serde_json::from_str(&raw).unwrap();
        envelope.ciphertext = base64_encode(b"not the real ciphertext at all");
        std::fs::write(
            dir.path().join("credentials.json"),
            serde_json::to_string(&envelope).unwrap(),
        )
        .unwrap();

        assert!(store.get().is_err());
    }

    #[test]
    fn reopening_reuses_the_same_seed() {
        let dir = tempdir().unwrap();
        let store1 = open_store(dir.path());
        store1
            .set(&SteamAuth {
                mode: AuthMode::Authenticated,
                username: Some("player2".to_string()),
                refresh_token: Some("rt-456".to_string()),
                last_authenticated: None,
            })
            .unwrap();
        drop(store1);

        let store2 = open_store(dir.path());
        let loaded = store2.get().unwrap().unwrap();
        assert_eq!(loaded.username.as_deref(), Some("player2"));
    }

    #[test]
    fn legacy_migration_parses_known_shape() {
        let legacy = serde_json::json!({
            "mode": "authenticated",
            "username": "legacy_user",
            "refresh_token": "legacy_token",
            "last_authenticated": null,
        });
        let migrated = migrate_legacy_from_json(&legacy).unwrap();
        assert_eq!(migrated.username.as_deref(), Some("legacy_user"));
    }

    #[test]
    fn legacy_migration_rejects_unrelated_json() {
        let unrelated = serde_json::json!({ "foo": "bar" });
        assert!(migrate_legacy_from_json(&unrelated).is_none());
    }
}
