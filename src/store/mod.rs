//! The single persisted entity: one JSON profile blob under one path.
//!
//! Every part of the client reads and rewrites this record wholesale, so the
//! file store writes through a temp file and rename to keep the blob intact
//! if the process dies mid-write. Fields the current build does not model are
//! carried through untouched.

use crate::domain::{Availability, SelectedCentre};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Locally cached user record, merged from onboarding input and the server's
/// copy after login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_centres: Vec<SelectedCentre>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub availability: Availability,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Value>,
    /// Whatever else past or future builds put in the blob.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl UserProfile {
    /// True once both login identifiers are present; the home screen boots
    /// back to onboarding otherwise.
    pub fn has_credentials(&self) -> bool {
        self.license_number.is_some() && self.application_ref.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("profile blob at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage seam so the polling and session logic can run against an
/// in-memory blob in tests.
pub trait ProfileStore: Send + Sync {
    fn load(&self) -> Result<Option<UserProfile>, StoreError>;
    fn save(&self, profile: &UserProfile) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;

    /// Read-modify-write of the whole blob, starting from an empty profile
    /// when none is stored yet.
    fn update(&self, apply: &dyn Fn(&mut UserProfile)) -> Result<UserProfile, StoreError> {
        let mut profile = self.load()?.unwrap_or_default();
        apply(&mut profile);
        self.save(&profile)?;
        Ok(profile)
    }
}

/// File-backed store writing the blob as pretty-printed JSON.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ProfileStore for FileStore {
    fn load(&self) -> Result<Option<UserProfile>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };

        let profile = serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(profile))
    }

    fn save(&self, profile: &UserProfile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }

        let body = serde_json::to_string_pretty(profile).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(|err| self.io_error(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_error(err))
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<UserProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: UserProfile) -> Self {
        Self {
            slot: Mutex::new(Some(profile)),
        }
    }
}

impl ProfileStore for MemoryStore {
    fn load(&self) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.slot.lock().expect("store mutex poisoned").clone())
    }

    fn save(&self, profile: &UserProfile) -> Result<(), StoreError> {
        *self.slot.lock().expect("store mutex poisoned") = Some(profile.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().expect("store mutex poisoned") = None;
        Ok(())
    }
}
