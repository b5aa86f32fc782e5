use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::ProfileError;

/// A named set of credentials and sender defaults for one account.
/// Immutable once loaded for a run; edits go through `add` again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub server: String,
    pub api_key: String,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredProfile {
    server: String,
    api_key: String,
    from_address: Option<String>,
    from_name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    default_profile: Option<String>,
    profiles: BTreeMap<String, StoredProfile>,
}

/// Profiles live in a single JSON file (`~/.mailgoat/profiles.json`).
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn open_default() -> Self {
        Self::new(&crate::core::data_dir().join("profiles.json"))
    }

    fn read_file(&self) -> Result<ProfileFile, ProfileError> {
        if !self.path.exists() {
            return Ok(ProfileFile::default());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| ProfileError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| ProfileError::Malformed {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_file(&self, file: &ProfileFile) -> Result<(), ProfileError> {
        let io_err = |e| ProfileError::Io {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(file).map_err(|e| ProfileError::Malformed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, text).map_err(io_err)
    }

    /// Adds or replaces a profile. The first profile ever added becomes the
    /// stored default; `make_default` forces it for later additions.
    pub fn add(&self, profile: &Profile, make_default: bool) -> Result<(), ProfileError> {
        let mut file = self.read_file()?;
        file.profiles.insert(
            profile.name.clone(),
            StoredProfile {
                server: profile.server.clone(),
                api_key: profile.api_key.clone(),
                from_address: profile.from_address.clone(),
                from_name: profile.from_name.clone(),
            },
        );
        if make_default || file.default_profile.is_none() {
            file.default_profile = Some(profile.name.clone());
        }
        self.write_file(&file)
    }

    pub fn set_default(&self, name: &str) -> Result<(), ProfileError> {
        let mut file = self.read_file()?;
        if !file.profiles.contains_key(name) {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        file.default_profile = Some(name.to_string());
        self.write_file(&file)
    }

    pub fn get(&self, name: &str) -> Result<Profile, ProfileError> {
        let file = self.read_file()?;
        let stored = file
            .profiles
            .get(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;
        Ok(Profile {
            name: name.to_string(),
            server: stored.server.clone(),
            api_key: stored.api_key.clone(),
            from_address: stored.from_address.clone(),
            from_name: stored.from_name.clone(),
        })
    }

    /// All profiles, sorted by name.
    pub fn list(&self) -> Result<Vec<Profile>, ProfileError> {
        let file = self.read_file()?;
        Ok(file
            .profiles
            .iter()
            .map(|(name, stored)| Profile {
                name: name.clone(),
                server: stored.server.clone(),
                api_key: stored.api_key.clone(),
                from_address: stored.from_address.clone(),
                from_name: stored.from_name.clone(),
            })
            .collect())
    }

    pub fn default_profile(&self) -> Result<Option<String>, ProfileError> {
        Ok(self.read_file()?.default_profile)
    }
}

/// Explicit resolution chain: `--profile` flag, then the `MAILGOAT_PROFILE`
/// environment value, then the stored default. The env value is passed in
/// rather than read here so the chain stays independently testable.
pub fn resolve_profile(
    explicit: Option<&str>,
    env_override: Option<&str>,
    store: &ProfileStore,
) -> Result<Profile, ProfileError> {
    if let Some(name) = explicit {
        return store.get(name);
    }
    if let Some(name) = env_override.filter(|name| !name.is_empty()) {
        return store.get(name);
    }
    match store.default_profile()? {
        Some(name) => store.get(&name),
        None => Err(ProfileError::NoneConfigured),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, ProfileStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ProfileStore::new(&dir.path().join("profiles.json"));
        (dir, store)
    }

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            server: format!("https://{name}.example.com"),
            api_key: format!("key-{name}"),
            from_address: None,
            from_name: None,
        }
    }

    #[test]
    fn add_then_get_roundtrips() {
        let (_dir, store) = test_store();
        let mut p = profile("work");
        p.from_address = Some("team@example.com".to_string());
        p.from_name = Some("The Team".to_string());
        store.add(&p, false).unwrap();
        assert_eq!(store.get("work").unwrap(), p);
    }

    #[test]
    fn first_profile_becomes_default() {
        let (_dir, store) = test_store();
        store.add(&profile("first"), false).unwrap();
        store.add(&profile("second"), false).unwrap();
        assert_eq!(store.default_profile().unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn make_default_overrides_existing_default() {
        let (_dir, store) = test_store();
        store.add(&profile("first"), false).unwrap();
        store.add(&profile("second"), true).unwrap();
        assert_eq!(store.default_profile().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn set_default_requires_existing_profile() {
        let (_dir, store) = test_store();
        store.add(&profile("work"), false).unwrap();
        store.set_default("work").unwrap();
        assert!(matches!(
            store.set_default("ghost").unwrap_err(),
            ProfileError::NotFound(_)
        ));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let (_dir, store) = test_store();
        store.add(&profile("zeta"), false).unwrap();
        store.add(&profile("alpha"), false).unwrap();
        let names: Vec<String> = store.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn get_unknown_profile_errors() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.get("ghost").unwrap_err(),
            ProfileError::NotFound(_)
        ));
    }

    #[test]
    fn resolve_prefers_explicit_over_env_and_default() {
        let (_dir, store) = test_store();
        store.add(&profile("default-one"), true).unwrap();
        store.add(&profile("env-one"), false).unwrap();
        store.add(&profile("flag-one"), false).unwrap();

        let p = resolve_profile(Some("flag-one"), Some("env-one"), &store).unwrap();
        assert_eq!(p.name, "flag-one");

        let p = resolve_profile(None, Some("env-one"), &store).unwrap();
        assert_eq!(p.name, "env-one");

        let p = resolve_profile(None, None, &store).unwrap();
        assert_eq!(p.name, "default-one");
    }

    #[test]
    fn resolve_ignores_empty_env_value() {
        let (_dir, store) = test_store();
        store.add(&profile("only"), true).unwrap();
        let p = resolve_profile(None, Some(""), &store).unwrap();
        assert_eq!(p.name, "only");
    }

    #[test]
    fn resolve_without_any_profile_is_an_error() {
        let (_dir, store) = test_store();
        assert!(matches!(
            resolve_profile(None, None, &store).unwrap_err(),
            ProfileError::NoneConfigured
        ));
    }

    #[test]
    fn malformed_profile_file_is_reported() {
        let (dir, store) = test_store();
        std::fs::write(dir.path().join("profiles.json"), "[]").unwrap();
        assert!(matches!(
            store.get("any").unwrap_err(),
            ProfileError::Malformed { .. }
        ));
    }
}
