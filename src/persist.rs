use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::ALL;
use crate::session::Session;
use crate::state::{AppState, PLATOONS, SQUADS};

const CACHE_DIR: &str = "cadet_rating";
const CACHE_FILE: &str = "state.json";
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub version: u32,
    #[serde(default = "wildcard")]
    pub platoon: String,
    #[serde(default = "wildcard")]
    pub squad: String,
    #[serde(default)]
    pub session: Option<Session>,
}

impl Default for SavedState {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            platoon: wildcard(),
            squad: wildcard(),
            session: None,
        }
    }
}

fn wildcard() -> String {
    ALL.to_string()
}

impl SavedState {
    pub fn from_app(state: &AppState) -> Self {
        let criteria = state.rating.criteria();
        Self {
            version: CACHE_VERSION,
            platoon: criteria.platoon.clone(),
            squad: criteria.squad.clone(),
            session: state.session.clone(),
        }
    }

    /// Drops group values that are no longer part of the corps.
    fn sanitized(mut self) -> Self {
        if self.platoon != ALL && !PLATOONS.contains(&self.platoon.as_str()) {
            self.platoon = wildcard();
        }
        if self.squad != ALL && !SQUADS.iter().any(|s| s.to_string() == self.squad) {
            self.squad = wildcard();
        }
        self
    }
}

/// Filters are applied immediately; a saved session is returned for re-validation.
pub fn load_into_state(state: &mut AppState) -> Option<Session> {
    let saved = cache_path().and_then(|path| load_from(&path))?;
    state
        .rating
        .preset_groups(saved.platoon.clone(), saved.squad.clone());
    saved.session
}

pub fn save_from_state(state: &AppState) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    save_to(&path, &SavedState::from_app(state))
}

pub fn load_from(path: &Path) -> Option<SavedState> {
    let raw = fs::read_to_string(path).ok()?;
    let saved = serde_json::from_str::<SavedState>(&raw).ok()?;
    if saved.version != CACHE_VERSION {
        return None;
    }
    Some(saved.sanitized())
}

pub fn save_to(path: &Path, saved: &SavedState) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(saved).context("failed to encode state")?;
    let tmp = path.with_extension("json.tmp");
    write_private(&tmp, json.as_bytes())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// The file holds the access token, so it is readable by the owner only.
#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    // The mode only applies on create; a leftover temp file may be wider.
    match fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => return Err(err),
        _ => {}
    }
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}

pub fn cache_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR).join(CACHE_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join(CACHE_DIR)
            .join(CACHE_FILE),
    )
}
