use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::http_client::{http_client, read_body, with_store_headers};
use crate::session::{AuthGrant, AuthIdentity};
use crate::state::{Achievement, Cadet, CadetScores, NewsItem, ScoreHistoryEntry, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Cadets,
    Tasks,
    News,
    Achievements,
    ScoreHistory,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Cadets => "cadets",
            Table::Tasks => "tasks",
            Table::News => "news",
            Table::Achievements => "achievements",
            Table::ScoreHistory => "score_history",
        }
    }
}

/// Everything the dashboard reads from or writes to the hosted data store.
pub trait RemoteStore: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant>;
    fn sign_out(&self, access_token: &str) -> Result<()>;
    /// Identity behind an access token; fails when the token is no longer valid.
    fn identity(&self, access_token: &str) -> Result<AuthIdentity>;
    fn cadet_by_auth_id(&self, auth_user_id: &str) -> Result<Option<Cadet>>;
    /// Cadets ordered by rank.
    fn list_cadets(&self) -> Result<Vec<Cadet>>;
    fn cadet_scores(&self, cadet_id: &str) -> Result<CadetScores>;
    fn list_tasks(&self) -> Result<Vec<Task>>;
    fn list_news(&self) -> Result<Vec<NewsItem>>;
    fn list_achievements(&self) -> Result<Vec<Achievement>>;
    fn list_score_history(&self) -> Result<Vec<ScoreHistoryEntry>>;
    fn insert(&self, table: Table, row: &Value) -> Result<()>;
    fn update(&self, table: Table, id: &str, patch: &Value) -> Result<()>;
    fn delete(&self, table: Table, id: &str) -> Result<()>;
}

/// PostgREST-style store with password auth.
pub struct RestStore {
    base_url: String,
    api_key: String,
    access_token: Mutex<Option<String>>,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: Mutex::new(None),
        }
    }

    fn bearer(&self) -> String {
        self.access_token
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn remember_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.access_token.lock() {
            *guard = token;
        }
    }

    fn send(&self, method: Method, path: &str, body: Option<&Value>, bearer: &str) -> Result<String> {
        let client = http_client()?;
        let url = format!("{}{}", self.base_url, path);
        let mut req = with_store_headers(client.request(method, &url), &self.api_key, bearer);
        if let Some(body) = body {
            req = req
                .header("Prefer", "return=representation")
                .body(serde_json::to_vec(body).context("failed to encode request body")?);
        }
        let resp = req.send().with_context(|| format!("request to {path} failed"))?;
        read_body(resp)
    }

    fn select<T: DeserializeOwned>(&self, table: Table, query: &str) -> Result<Vec<T>> {
        let path = format!("/rest/v1/{}?select=*{}", table.name(), query);
        let body = self.send(Method::GET, &path, None, &self.bearer())?;
        parse_rows_json(&body).with_context(|| format!("invalid {} rows", table.name()))
    }
}

impl RemoteStore for RestStore {
    fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant> {
        let body = json!({ "email": email, "password": password });
        let raw = self.send(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            Some(&body),
            &self.api_key,
        )?;
        let grant = parse_auth_grant_json(&raw)?;
        self.remember_token(Some(grant.access_token.clone()));
        Ok(grant)
    }

    fn sign_out(&self, access_token: &str) -> Result<()> {
        let result = self.send(Method::POST, "/auth/v1/logout", Some(&json!({})), access_token);
        self.remember_token(None);
        result.map(|_| ())
    }

    fn identity(&self, access_token: &str) -> Result<AuthIdentity> {
        let raw = self.send(Method::GET, "/auth/v1/user", None, access_token)?;
        let identity = serde_json::from_str::<AuthIdentity>(&raw).context("invalid user payload")?;
        self.remember_token(Some(access_token.to_string()));
        Ok(identity)
    }

    fn cadet_by_auth_id(&self, auth_user_id: &str) -> Result<Option<Cadet>> {
        let rows: Vec<Cadet> =
            self.select(Table::Cadets, &format!("&auth_user_id=eq.{auth_user_id}&limit=1"))?;
        Ok(rows.into_iter().next())
    }

    fn list_cadets(&self) -> Result<Vec<Cadet>> {
        self.select(Table::Cadets, "&order=rank.asc")
    }

    fn cadet_scores(&self, cadet_id: &str) -> Result<CadetScores> {
        let path = format!("/rest/v1/cadet_scores?select=*&cadet_id=eq.{cadet_id}&limit=1");
        let body = self.send(Method::GET, &path, None, &self.bearer())?;
        parse_scores_json(&body)
    }

    fn list_tasks(&self) -> Result<Vec<Task>> {
        self.select(Table::Tasks, "&order=created_at.desc")
    }

    fn list_news(&self) -> Result<Vec<NewsItem>> {
        self.select(Table::News, "&order=created_at.desc")
    }

    fn list_achievements(&self) -> Result<Vec<Achievement>> {
        self.select(Table::Achievements, "&order=created_at.desc")
    }

    fn list_score_history(&self) -> Result<Vec<ScoreHistoryEntry>> {
        self.select(Table::ScoreHistory, "&order=created_at.desc&limit=500")
    }

    fn insert(&self, table: Table, row: &Value) -> Result<()> {
        let path = format!("/rest/v1/{}", table.name());
        self.send(Method::POST, &path, Some(row), &self.bearer())
            .with_context(|| format!("insert into {} failed", table.name()))?;
        Ok(())
    }

    fn update(&self, table: Table, id: &str, patch: &Value) -> Result<()> {
        let path = format!("/rest/v1/{}?id=eq.{id}", table.name());
        let raw = self
            .send(Method::PATCH, &path, Some(patch), &self.bearer())
            .with_context(|| format!("update of {} failed", table.name()))?;
        ensure_touched(&raw, table, id)
    }

    fn delete(&self, table: Table, id: &str) -> Result<()> {
        let path = format!("/rest/v1/{}?id=eq.{id}", table.name());
        self.send(Method::DELETE, &path, None, &self.bearer())
            .with_context(|| format!("delete from {} failed", table.name()))?;
        Ok(())
    }
}

fn ensure_touched(raw: &str, table: Table, id: &str) -> Result<()> {
    let rows: Vec<Value> = parse_rows_json(raw)?;
    if rows.is_empty() {
        return Err(anyhow!("no {} row with id {id}", table.name()));
    }
    Ok(())
}

/// Row arrays as returned by the REST endpoint; empty or `null` bodies mean no rows.
pub fn parse_rows_json<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<T>>(trimmed).context("invalid rows json")
}

pub fn parse_cadets_json(raw: &str) -> Result<Vec<Cadet>> {
    parse_rows_json(raw)
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    #[serde(default)]
    study_score: i64,
    #[serde(default)]
    discipline_score: i64,
    #[serde(default)]
    events_score: i64,
}

/// First score row for a cadet; a cadet without a row has zero in every category.
pub fn parse_scores_json(raw: &str) -> Result<CadetScores> {
    let rows: Vec<ScoreRow> = parse_rows_json(raw).context("invalid score rows")?;
    Ok(rows
        .into_iter()
        .next()
        .map(|row| CadetScores {
            study: row.study_score,
            discipline: row.discipline_score,
            events: row.events_score,
            total: row.study_score + row.discipline_score + row.events_score,
        })
        .unwrap_or_default())
}

pub fn parse_auth_grant_json(raw: &str) -> Result<AuthGrant> {
    let grant = serde_json::from_str::<AuthGrant>(raw).context("invalid auth response")?;
    if grant.access_token.is_empty() {
        return Err(anyhow!("auth response carried no access token"));
    }
    Ok(grant)
}
