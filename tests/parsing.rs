use std::fs;
use std::path::PathBuf;

use cadet_rating::http_client::error_message;
use cadet_rating::remote::{
    parse_auth_grant_json, parse_cadets_json, parse_rows_json, parse_scores_json,
};
use cadet_rating::state::{CadetScores, Difficulty, NewsItem, ScoreCategory, Task, TaskStatus};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_cadets_fixture() {
    let cadets = parse_cadets_json(&read_fixture("cadets.json")).expect("fixture should parse");
    assert_eq!(cadets.len(), 3);

    let petrov = &cadets[0];
    assert_eq!(petrov.name, "Петров Алексей Владимирович");
    assert_eq!(petrov.platoon, "10-1");
    assert_eq!(petrov.squad, 1);
    assert_eq!(petrov.total_score, 245);
    assert_eq!(petrov.rank, 1);
    assert_eq!(petrov.auth_user_id.as_deref(), Some("5b7e-auth-0001"));
    assert_eq!(petrov.avatar_url, None);
    assert_eq!(petrov.scores, CadetScores::default());
}

#[test]
fn sparse_cadet_rows_fall_back_to_defaults() {
    let cadets = parse_cadets_json(&read_fixture("cadets.json")).expect("fixture should parse");
    let sparse = &cadets[2];
    assert_eq!(sparse.email, "");
    assert_eq!(sparse.total_score, 0);
    assert_eq!(sparse.rank, 0);
    assert!(sparse.auth_user_id.is_none());
}

#[test]
fn parses_scores_fixture() {
    let scores = parse_scores_json(&read_fixture("scores.json")).expect("fixture should parse");
    assert_eq!(
        scores,
        CadetScores {
            study: 90,
            discipline: 85,
            events: 70,
            total: 245,
        }
    );
}

#[test]
fn missing_score_row_is_all_zero() {
    assert_eq!(parse_scores_json("[]").expect("empty array"), CadetScores::default());
    assert_eq!(parse_scores_json("").expect("empty body"), CadetScores::default());
    assert!(parse_scores_json("{\"study_score\": 1}").is_err());
}

#[test]
fn parses_auth_grant_fixture() {
    let grant = parse_auth_grant_json(&read_fixture("auth_grant.json")).expect("fixture should parse");
    assert!(grant.access_token.starts_with("eyJ"));
    assert_eq!(grant.refresh_token.as_deref(), Some("r-1f2e3d"));
    assert_eq!(grant.user.id, "5b7e-auth-0001");
    assert_eq!(grant.user.email, "cadet@nkkk.ru");
}

#[test]
fn auth_grant_without_token_is_rejected() {
    let raw = r#"{"access_token": "", "user": {"id": "x"}}"#;
    assert!(parse_auth_grant_json(raw).is_err());
}

#[test]
fn parses_tasks_fixture() {
    let tasks: Vec<Task> = parse_rows_json(&read_fixture("tasks.json")).expect("fixture should parse");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].category, ScoreCategory::Study);
    assert_eq!(tasks[0].difficulty, Difficulty::Medium);
    assert_eq!(
        tasks[0].deadline.map(|d| d.to_string()),
        Some("2025-11-20".to_string())
    );
    assert_eq!(tasks[1].status, TaskStatus::Inactive);
    assert!(tasks[1].deadline.is_none());
}

#[test]
fn parses_news_fixture() {
    let news: Vec<NewsItem> = parse_rows_json(&read_fixture("news.json")).expect("fixture should parse");
    assert_eq!(news.len(), 1);
    assert!(news[0].is_main);
    assert_eq!(news[0].author, "Администратор");
}

#[test]
fn null_body_means_no_rows() {
    let rows: Vec<Task> = parse_rows_json("null").expect("null body");
    assert!(rows.is_empty());
}

#[test]
fn error_message_reads_store_error_shapes() {
    assert_eq!(
        error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
        "Invalid login credentials"
    );
    assert_eq!(error_message(r#"{"message":"JWT expired"}"#), "JWT expired");
}
