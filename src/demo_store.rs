use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::remote::{RemoteStore, Table};
use crate::session::{AuthGrant, AuthIdentity};
use crate::state::{
    Achievement, Cadet, CadetScores, Difficulty, NewsItem, PLATOONS, SQUADS, ScoreCategory,
    ScoreHistoryEntry, Task, TaskStatus,
};

pub const DEMO_ADMIN_EMAIL: &str = "admin@nkkk.ru";
pub const DEMO_ADMIN_PASSWORD: &str = "admin123";
pub const DEMO_CADET_EMAIL: &str = "cadet@nkkk.ru";
pub const DEMO_CADET_PASSWORD: &str = "cadet123";
pub const DEMO_CADET_NAME: &str = "Петров Алексей Владимирович";

const DEFAULT_CADET_COUNT: usize = 240;
const TOKEN_PREFIX: &str = "demo-token:";

const SURNAMES: &[&str] = &[
    "Иванов", "Смирнов", "Кузнецов", "Попов", "Васильев", "Соколов", "Михайлов", "Новиков",
    "Фёдоров", "Морозов", "Волков", "Алексеев", "Лебедев", "Семёнов", "Егоров", "Павлов",
    "Козлов", "Степанов", "Николаев", "Орлов", "Андреев", "Макаров", "Никитин", "Захаров",
];
const FIRST_NAMES: &[&str] = &[
    "Александр", "Дмитрий", "Максим", "Сергей", "Андрей", "Артём", "Илья", "Кирилл",
    "Михаил", "Никита", "Матвей", "Роман", "Егор", "Иван", "Тимофей", "Даниил",
];
const PATRONYMICS: &[&str] = &[
    "Александрович", "Дмитриевич", "Сергеевич", "Андреевич", "Игоревич", "Олегович",
    "Викторович", "Николаевич", "Павлович", "Юрьевич",
];

#[derive(Debug, Clone)]
struct DemoAccount {
    auth_id: &'static str,
    email: &'static str,
    password: &'static str,
}

const ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        auth_id: "demo-admin",
        email: DEMO_ADMIN_EMAIL,
        password: DEMO_ADMIN_PASSWORD,
    },
    DemoAccount {
        auth_id: "demo-cadet",
        email: DEMO_CADET_EMAIL,
        password: DEMO_CADET_PASSWORD,
    },
];

#[derive(Debug, Default)]
struct DemoData {
    cadets: Vec<Cadet>,
    scores: HashMap<String, CadetScores>,
    tasks: Vec<Task>,
    news: Vec<NewsItem>,
    achievements: Vec<Achievement>,
    history: Vec<ScoreHistoryEntry>,
    next_id: u64,
}

impl DemoData {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// In-memory store used when no remote endpoint is configured.
#[derive(Debug)]
pub struct DemoStore {
    data: Mutex<DemoData>,
    rng: Mutex<StdRng>,
    score_failure_rate: f64,
}

impl DemoStore {
    pub fn new(score_failure_rate: f64) -> Self {
        let seed = rand::thread_rng().r#gen::<u64>();
        Self::seeded(seed, DEFAULT_CADET_COUNT).with_score_failure_rate(score_failure_rate)
    }

    pub fn seeded(seed: u64, cadet_count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = seed_data(&mut rng, cadet_count.max(1));
        Self {
            data: Mutex::new(data),
            rng: Mutex::new(rng),
            score_failure_rate: 0.0,
        }
    }

    pub fn with_score_failure_rate(mut self, rate: f64) -> Self {
        self.score_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    fn data(&self) -> Result<MutexGuard<'_, DemoData>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("demo store lock poisoned"))
    }

    fn score_fetch_fails(&self) -> bool {
        if self.score_failure_rate <= 0.0 {
            return false;
        }
        self.rng
            .lock()
            .map(|mut rng| rng.gen_bool(self.score_failure_rate))
            .unwrap_or(false)
    }
}

impl RemoteStore for DemoStore {
    fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant> {
        let account = ACCOUNTS
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email.trim()) && a.password == password)
            .ok_or_else(|| anyhow!("Invalid login credentials"))?;
        Ok(AuthGrant {
            access_token: format!("{TOKEN_PREFIX}{}", account.auth_id),
            refresh_token: None,
            user: AuthIdentity {
                id: account.auth_id.to_string(),
                email: account.email.to_string(),
            },
        })
    }

    fn sign_out(&self, _access_token: &str) -> Result<()> {
        Ok(())
    }

    fn identity(&self, access_token: &str) -> Result<AuthIdentity> {
        let auth_id = access_token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| anyhow!("token is not a demo token"))?;
        ACCOUNTS
            .iter()
            .find(|a| a.auth_id == auth_id)
            .map(|a| AuthIdentity {
                id: a.auth_id.to_string(),
                email: a.email.to_string(),
            })
            .ok_or_else(|| anyhow!("unknown demo account"))
    }

    fn cadet_by_auth_id(&self, auth_user_id: &str) -> Result<Option<Cadet>> {
        let data = self.data()?;
        Ok(data
            .cadets
            .iter()
            .find(|c| c.auth_user_id.as_deref() == Some(auth_user_id))
            .cloned())
    }

    fn list_cadets(&self) -> Result<Vec<Cadet>> {
        let data = self.data()?;
        let mut cadets = data.cadets.clone();
        cadets.sort_by_key(|c| c.rank);
        Ok(cadets)
    }

    fn cadet_scores(&self, cadet_id: &str) -> Result<CadetScores> {
        if self.score_fetch_fails() {
            return Err(anyhow!("score lookup timed out for {cadet_id}"));
        }
        let data = self.data()?;
        Ok(data.scores.get(cadet_id).copied().unwrap_or_default())
    }

    fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.data()?.tasks.clone())
    }

    fn list_news(&self) -> Result<Vec<NewsItem>> {
        Ok(self.data()?.news.clone())
    }

    fn list_achievements(&self) -> Result<Vec<Achievement>> {
        Ok(self.data()?.achievements.clone())
    }

    fn list_score_history(&self) -> Result<Vec<ScoreHistoryEntry>> {
        Ok(self.data()?.history.clone())
    }

    fn insert(&self, table: Table, row: &Value) -> Result<()> {
        let mut data = self.data()?;
        let id = data.next_id(table.name());
        let mut row = row.clone();
        let Value::Object(map) = &mut row else {
            return Err(anyhow!("{} row must be an object", table.name()));
        };
        map.insert("id".to_string(), json!(id));
        map.entry("created_at")
            .or_insert_with(|| json!(Utc::now().to_rfc3339()));

        match table {
            Table::Cadets => {
                let cadet: Cadet = decode(row, table)?;
                data.scores.insert(cadet.id.clone(), CadetScores::default());
                data.cadets.push(cadet);
            }
            Table::Tasks => {
                let task = decode(row, table)?;
                data.tasks.insert(0, task);
            }
            Table::News => {
                let item = decode(row, table)?;
                data.news.insert(0, item);
            }
            Table::Achievements => {
                let item = decode(row, table)?;
                data.achievements.insert(0, item);
            }
            Table::ScoreHistory => {
                let entry: ScoreHistoryEntry = decode(row, table)?;
                let scores = data.scores.entry(entry.cadet_id.clone()).or_default();
                match entry.category {
                    ScoreCategory::Study => scores.study += entry.points,
                    ScoreCategory::Discipline => scores.discipline += entry.points,
                    ScoreCategory::Events => scores.events += entry.points,
                }
                scores.total = scores.study + scores.discipline + scores.events;
                data.history.insert(0, entry);
            }
        }
        Ok(())
    }

    fn update(&self, table: Table, id: &str, patch: &Value) -> Result<()> {
        let mut data = self.data()?;
        match table {
            Table::Cadets => patch_row(&mut data.cadets, |c| &c.id, id, patch, table),
            Table::Tasks => patch_row(&mut data.tasks, |t| &t.id, id, patch, table),
            Table::News => patch_row(&mut data.news, |n| &n.id, id, patch, table),
            Table::Achievements => patch_row(&mut data.achievements, |a| &a.id, id, patch, table),
            Table::ScoreHistory => patch_row(&mut data.history, |h| &h.id, id, patch, table),
        }
    }

    fn delete(&self, table: Table, id: &str) -> Result<()> {
        let mut data = self.data()?;
        let removed = match table {
            Table::Cadets => {
                data.scores.remove(id);
                data.history.retain(|h| h.cadet_id != id);
                remove_row(&mut data.cadets, |c| &c.id, id)
            }
            Table::Tasks => remove_row(&mut data.tasks, |t| &t.id, id),
            Table::News => remove_row(&mut data.news, |n| &n.id, id),
            Table::Achievements => remove_row(&mut data.achievements, |a| &a.id, id),
            Table::ScoreHistory => remove_row(&mut data.history, |h| &h.id, id),
        };
        if !removed {
            return Err(anyhow!("no {} row with id {id}", table.name()));
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(row: Value, table: Table) -> Result<T> {
    serde_json::from_value(row).with_context(|| format!("invalid {} row", table.name()))
}

fn patch_row<T: Serialize + DeserializeOwned>(
    rows: &mut [T],
    id_of: impl Fn(&T) -> &String,
    id: &str,
    patch: &Value,
    table: Table,
) -> Result<()> {
    let row = rows
        .iter_mut()
        .find(|row| id_of(&**row) == id)
        .ok_or_else(|| anyhow!("no {} row with id {id}", table.name()))?;
    let mut current = serde_json::to_value(&*row).context("failed to encode row")?;
    if let (Value::Object(target), Value::Object(changes)) = (&mut current, patch) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
    *row = decode(current, table)?;
    Ok(())
}

fn remove_row<T>(rows: &mut Vec<T>, id_of: impl Fn(&T) -> &String, id: &str) -> bool {
    let before = rows.len();
    rows.retain(|row| id_of(row) != id);
    rows.len() != before
}

fn seed_data(rng: &mut StdRng, cadet_count: usize) -> DemoData {
    let mut data = DemoData::default();

    let mut cadets = Vec::with_capacity(cadet_count);
    for idx in 0..cadet_count {
        let (name, email, auth_user_id) = if idx == 0 {
            (
                DEMO_CADET_NAME.to_string(),
                DEMO_CADET_EMAIL.to_string(),
                Some("demo-cadet".to_string()),
            )
        } else {
            let surname = SURNAMES.choose(rng).copied().unwrap_or("Иванов");
            let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Иван");
            let patronymic = PATRONYMICS.choose(rng).copied().unwrap_or("Иванович");
            (
                format!("{surname} {first} {patronymic}"),
                format!("cadet{idx}@nkkk.ru"),
                None,
            )
        };
        let id = data.next_id("cadet");
        let scores = CadetScores {
            study: rng.gen_range(0..=120),
            discipline: rng.gen_range(0..=100),
            events: rng.gen_range(0..=80),
            total: 0,
        };
        let scores = CadetScores {
            total: scores.study + scores.discipline + scores.events,
            ..scores
        };
        data.scores.insert(id.clone(), scores);
        cadets.push(Cadet {
            id,
            name,
            email,
            platoon: if idx == 0 {
                "10-1".to_string()
            } else {
                PLATOONS[rng.gen_range(0..PLATOONS.len())].to_string()
            },
            squad: if idx == 0 {
                1
            } else {
                SQUADS[rng.gen_range(0..SQUADS.len())]
            },
            total_score: scores.total,
            rank: 0,
            avatar_url: None,
            auth_user_id,
            scores: CadetScores::default(),
        });
    }
    cadets.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    for (idx, cadet) in cadets.iter_mut().enumerate() {
        cadet.rank = idx as u32 + 1;
    }
    data.cadets = cadets;

    let today = Utc::now().date_naive();
    let tasks = [
        ("Олимпиада по математике", ScoreCategory::Study, 30, Difficulty::Hard, Some(14)),
        ("Смотр строя и песни", ScoreCategory::Discipline, 20, Difficulty::Medium, Some(7)),
        ("Военно-спортивная игра", ScoreCategory::Events, 25, Difficulty::Medium, Some(21)),
        ("Доклад по истории корпуса", ScoreCategory::Study, 10, Difficulty::Easy, None),
        ("Дежурство по роте", ScoreCategory::Discipline, 5, Difficulty::Easy, None),
    ];
    for (idx, (title, category, points, difficulty, due_in)) in tasks.into_iter().enumerate() {
        let id = data.next_id("task");
        data.tasks.push(Task {
            id,
            title: title.to_string(),
            description: format!("{title}: подробности у командира взвода"),
            category,
            points,
            difficulty,
            deadline: due_in.map(|days| today + ChronoDuration::days(days)),
            status: if idx == 4 {
                TaskStatus::Inactive
            } else {
                TaskStatus::Active
            },
        });
    }

    let news = [
        ("Итоги четверти", "Подведены итоги рейтинга за четверть.", true),
        ("Парад Победы", "Кадеты корпуса примут участие в параде.", false),
        ("Новые задания", "Опубликованы задания на следующий месяц.", false),
    ];
    for (days_ago, (title, content, is_main)) in news.into_iter().enumerate() {
        let id = data.next_id("news");
        let created = Utc::now() - ChronoDuration::days(days_ago as i64);
        data.news.push(NewsItem {
            id,
            title: title.to_string(),
            content: content.to_string(),
            author: "Администрация".to_string(),
            is_main,
            created_at: Some(created.to_rfc3339()),
        });
    }

    let achievements = [
        ("Отличник учёбы", "Лучший результат в учёбе за четверть", "book", "blue"),
        ("Образцовая дисциплина", "Ни одного замечания за месяц", "shield", "green"),
        ("Активист", "Участие в пяти мероприятиях", "star", "yellow"),
    ];
    for (title, description, icon, color) in achievements {
        let id = data.next_id("achievement");
        data.achievements.push(Achievement {
            id,
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        });
    }

    data
}
