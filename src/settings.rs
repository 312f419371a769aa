use std::env;
use std::time::Duration;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@nkkk.ru";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub search_debounce: Duration,
    pub list_overscan: u32,
    pub fetch_parallelism: usize,
    pub admin_email: String,
    pub demo_score_failure_rate: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            search_debounce: Duration::from_millis(300),
            list_overscan: 3,
            fetch_parallelism: 6,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            demo_score_failure_rate: 0.0,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let search_debounce_ms = env::var("SEARCH_DEBOUNCE_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(300)
            .max(50);
        let list_overscan = env::var("LIST_OVERSCAN")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(3)
            .min(50);
        let fetch_parallelism = env::var("FETCH_PARALLELISM")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(6)
            .clamp(2, 32);
        let demo_score_failure_rate = env::var("DEMO_SCORE_FAILURE_RATE")
            .ok()
            .and_then(|val| val.parse::<f64>().ok())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        Self {
            api_url: non_empty_env("CADET_API_URL").map(|url| url.trim_end_matches('/').to_string()),
            api_key: non_empty_env("CADET_API_KEY"),
            search_debounce: Duration::from_millis(search_debounce_ms),
            list_overscan,
            fetch_parallelism,
            admin_email: non_empty_env("ADMIN_EMAIL")
                .unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            demo_score_failure_rate,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
