use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use cadet_rating::persist::{SavedState, load_from, save_to};
use cadet_rating::pipeline::ALL;
use cadet_rating::session::{Role, Session, SessionUser};
use cadet_rating::settings::Settings;
use cadet_rating::state::AppState;

fn scratch_file(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir()
        .join(format!("cadet_rating_{tag}_{}_{nanos}", std::process::id()))
        .join("state.json")
}

fn cadet_session() -> Session {
    Session {
        user: SessionUser {
            id: "auth-1".to_string(),
            name: "Петров Алексей Владимирович".to_string(),
            email: "cadet@nkkk.ru".to_string(),
            role: Role::Cadet,
            platoon: Some("10-1".to_string()),
            squad: Some(1),
            cadet_id: Some("cadet-1".to_string()),
        },
        access_token: "token".to_string(),
        refresh_token: Some("refresh".to_string()),
    }
}

#[test]
fn saved_state_round_trips_through_disk() {
    let path = scratch_file("roundtrip");
    let saved = SavedState {
        platoon: "9-2".to_string(),
        squad: "3".to_string(),
        session: Some(cadet_session()),
        ..SavedState::default()
    };
    save_to(&path, &saved).expect("state saved");
    assert!(!path.with_extension("json.tmp").exists());
    assert_eq!(load_from(&path), Some(saved));
    if let Some(dir) = path.parent() {
        let _ = fs::remove_dir_all(dir);
    }
}

#[cfg(unix)]
#[test]
fn saved_file_is_private_to_the_owner() {
    use std::os::unix::fs::PermissionsExt;

    let path = scratch_file("private");
    let dir = path.parent().expect("scratch dir").to_path_buf();
    fs::create_dir_all(&dir).expect("scratch dir created");
    // Files left by an older build, readable by everyone.
    for stale in [path.clone(), path.with_extension("json.tmp")] {
        fs::write(&stale, "{}").expect("stale file written");
        fs::set_permissions(&stale, fs::Permissions::from_mode(0o644)).expect("chmod");
    }

    let saved = SavedState {
        session: Some(cadet_session()),
        ..SavedState::default()
    };
    save_to(&path, &saved).expect("state saved");
    let mode = fs::metadata(&path).expect("state file").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert_eq!(load_from(&path), Some(saved));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_or_corrupt_file_loads_nothing() {
    let path = scratch_file("corrupt");
    assert_eq!(load_from(&path), None);

    save_to(&path, &SavedState::default()).expect("state saved");
    fs::write(&path, "{ not json").expect("overwrite");
    assert_eq!(load_from(&path), None);
    if let Some(dir) = path.parent() {
        let _ = fs::remove_dir_all(dir);
    }
}

#[test]
fn other_versions_are_ignored() {
    let path = scratch_file("version");
    save_to(&path, &SavedState::default()).expect("state saved");
    fs::write(&path, r#"{"version": 99, "platoon": "9-2", "squad": "1"}"#).expect("overwrite");
    assert_eq!(load_from(&path), None);
    if let Some(dir) = path.parent() {
        let _ = fs::remove_dir_all(dir);
    }
}

#[test]
fn unknown_groups_fall_back_to_all() {
    let path = scratch_file("sanitize");
    save_to(&path, &SavedState::default()).expect("state saved");
    fs::write(&path, r#"{"version": 1, "platoon": "12-9", "squad": "7"}"#).expect("overwrite");
    let loaded = load_from(&path).expect("valid file");
    assert_eq!(loaded.platoon, ALL);
    assert_eq!(loaded.squad, ALL);
    assert!(loaded.session.is_none());
    if let Some(dir) = path.parent() {
        let _ = fs::remove_dir_all(dir);
    }
}

#[test]
fn snapshot_captures_filters_and_session() {
    let mut state = AppState::new(&Settings::default());
    state.rating.preset_groups("11-1".to_string(), "2".to_string());
    state.session = Some(cadet_session());
    let saved = SavedState::from_app(&state);
    assert_eq!(saved.platoon, "11-1");
    assert_eq!(saved.squad, "2");
    assert_eq!(saved.session, Some(cadet_session()));
    assert_eq!(SavedState::from_app(&AppState::new(&Settings::default())), SavedState::default());
}
