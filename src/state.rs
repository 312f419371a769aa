use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::rating::RatingView;
use crate::session::Session;
use crate::settings::Settings;
use crate::virtual_list::{ViewportOptions, VirtualList};

pub const PLATOONS: &[&str] = &[
    "7-1", "7-2", "8-1", "8-2", "9-1", "9-2", "10-1", "10-2", "11-1", "11-2",
];
pub const SQUADS: &[u32] = &[1, 2, 3];

pub const NEWS_ROW_HEIGHT: u32 = 3;
pub const TASK_ROW_HEIGHT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Rating,
    News,
    Tasks,
    Admin,
    Login,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

impl LoadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadStatus::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CadetScores {
    pub study: i64,
    pub discipline: i64,
    pub events: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cadet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub platoon: String,
    #[serde(default)]
    pub squad: u32,
    #[serde(default)]
    pub total_score: i64,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub auth_user_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub scores: CadetScores,
}

impl Cadet {
    pub fn with_scores(mut self, scores: CadetScores) -> Self {
        self.scores = CadetScores {
            total: self.total_score,
            ..scores
        };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreCategory {
    Study,
    Discipline,
    Events,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: ScoreCategory,
    #[serde(default)]
    pub points: i64,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub id: String,
    pub cadet_id: String,
    pub category: ScoreCategory,
    pub points: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CadetDraft {
    pub name: String,
    pub email: String,
    pub platoon: String,
    pub squad: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub category: ScoreCategory,
    pub points: i64,
    pub difficulty: Difficulty,
    pub deadline: Option<NaiveDate>,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsDraft {
    pub title: String,
    pub content: String,
    pub author: String,
    pub is_main: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementDraft {
    pub title: String,
    pub description: String,
    pub icon: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDraft {
    pub cadet_id: String,
    pub category: ScoreCategory,
    pub points: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateCadet(CadetDraft),
    UpdateCadet { id: String, draft: CadetDraft },
    DeleteCadet { id: String },
    CreateTask(TaskDraft),
    UpdateTask { id: String, draft: TaskDraft },
    DeleteTask { id: String },
    CreateNews(NewsDraft),
    UpdateNews { id: String, draft: NewsDraft },
    DeleteNews { id: String },
    CreateAchievement(AchievementDraft),
    UpdateAchievement { id: String, draft: AchievementDraft },
    DeleteAchievement { id: String },
    AwardPoints(ScoreDraft),
}

impl Mutation {
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::CreateCadet(_) => "Cadet added",
            Mutation::UpdateCadet { .. } => "Cadet updated",
            Mutation::DeleteCadet { .. } => "Cadet deleted",
            Mutation::CreateTask(_) => "Task added",
            Mutation::UpdateTask { .. } => "Task updated",
            Mutation::DeleteTask { .. } => "Task deleted",
            Mutation::CreateNews(_) => "News added",
            Mutation::UpdateNews { .. } => "News updated",
            Mutation::DeleteNews { .. } => "News deleted",
            Mutation::CreateAchievement(_) => "Achievement added",
            Mutation::UpdateAchievement { .. } => "Achievement updated",
            Mutation::DeleteAchievement { .. } => "Achievement deleted",
            Mutation::AwardPoints(_) => "Points awarded",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminSnapshot {
    pub cadets: Vec<Cadet>,
    pub tasks: Vec<Task>,
    pub news: Vec<NewsItem>,
    pub achievements: Vec<Achievement>,
    pub history: Vec<ScoreHistoryEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Email,
    Password,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub focus: LoginField,
    pub error: Option<String>,
    pub pending: bool,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            focus: LoginField::Email,
            error: None,
            pending: false,
        }
    }
}

impl LoginForm {
    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Email => LoginField::Password,
            LoginField::Password => LoginField::Email,
        };
    }
}

#[derive(Debug)]
pub struct BoardState {
    pub news: VirtualList<NewsItem>,
    pub tasks: VirtualList<Task>,
    pub load: LoadStatus,
}

impl BoardState {
    fn new() -> Self {
        Self {
            news: VirtualList::new(Vec::new(), ViewportOptions::new(NEWS_ROW_HEIGHT, 1)),
            tasks: VirtualList::new(Vec::new(), ViewportOptions::new(TASK_ROW_HEIGHT, 1)),
            load: LoadStatus::Idle,
        }
    }
}

#[derive(Debug)]
pub struct AppState {
    pub screen: Screen,
    pub help_overlay: bool,
    pub session: Option<Session>,
    pub login: LoginForm,
    pub rating: RatingView,
    pub rating_load: LoadStatus,
    pub board: BoardState,
    pub admin: AdminState,
    pub logs: VecDeque<String>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            screen: Screen::Rating,
            help_overlay: false,
            session: None,
            login: LoginForm::default(),
            rating: RatingView::new(settings),
            rating_load: LoadStatus::Idle,
            board: BoardState::new(),
            admin: AdminState::new(),
            logs: VecDeque::with_capacity(200),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn is_admin(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_admin)
    }

    pub fn sign_in(&mut self, session: Session) {
        self.push_log(format!("[INFO] Signed in as {}", session.user.name));
        self.session = Some(session);
        self.login = LoginForm::default();
        if self.screen == Screen::Login {
            self.screen = Screen::Rating;
        }
    }

    pub fn sign_out(&mut self) {
        if self.session.take().is_some() {
            self.push_log("[INFO] Signed out");
        }
        self.admin = AdminState::new();
        if self.screen == Screen::Admin {
            self.screen = Screen::Rating;
        }
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    RatingLoaded {
        cadets: Vec<Cadet>,
        score_failures: usize,
    },
    RatingLoadFailed(String),
    BoardLoaded {
        news: Vec<NewsItem>,
        tasks: Vec<Task>,
    },
    BoardLoadFailed(String),
    AdminLoaded(AdminSnapshot),
    AdminLoadFailed(String),
    SignedIn(Session),
    SignInFailed(String),
    SessionRestoreFailed(String),
    SignedOut,
    MutationApplied(String),
    MutationFailed(String),
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    LoadRating,
    LoadBoard,
    LoadAdmin,
    SignIn { email: String, password: String },
    SignOut { access_token: String },
    RestoreSession(Session),
    Mutate(Mutation),
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::RatingLoaded {
            cadets,
            score_failures,
        } => {
            if score_failures > 0 {
                state.push_log(format!(
                    "[WARN] Scores unavailable for {score_failures} cadet(s); showing zero"
                ));
            }
            state.push_log(format!("[INFO] Loaded {} cadets", cadets.len()));
            state.rating_load = LoadStatus::Loaded;
            state.rating.set_source(cadets);
        }
        Delta::RatingLoadFailed(err) => {
            state.push_log(format!("[ERROR] Rating load failed: {err}"));
            state.rating_load = LoadStatus::Failed(err);
            state.rating.set_source(Vec::new());
        }
        Delta::BoardLoaded { news, mut tasks } => {
            tasks.retain(|t| t.status == TaskStatus::Active);
            state.board.news.set_items(news);
            state.board.tasks.set_items(tasks);
            state.board.load = LoadStatus::Loaded;
        }
        Delta::BoardLoadFailed(err) => {
            state.push_log(format!("[ERROR] News/tasks load failed: {err}"));
            state.board.load = LoadStatus::Failed(err);
        }
        Delta::AdminLoaded(snapshot) => {
            state.admin.apply_snapshot(snapshot);
        }
        Delta::AdminLoadFailed(err) => {
            state.push_log(format!("[ERROR] Admin load failed: {err}"));
            state.admin.load = LoadStatus::Failed(err);
        }
        Delta::SignedIn(session) => state.sign_in(session),
        Delta::SignInFailed(err) => {
            state.push_log(format!("[WARN] Sign-in failed: {err}"));
            state.login.pending = false;
            state.login.error = Some(err);
        }
        Delta::SessionRestoreFailed(err) => {
            state.push_log(format!("[WARN] Saved session rejected: {err}"));
            state.sign_out();
        }
        Delta::SignedOut => state.sign_out(),
        Delta::MutationApplied(label) => {
            state.push_log(format!("[INFO] {label}"));
            state.admin.form = None;
            state.admin.pending = false;
        }
        Delta::MutationFailed(err) => {
            state.push_log(format!("[ERROR] {err}"));
            state.admin.pending = false;
            if let Some(form) = state.admin.form.as_mut() {
                form.error = Some(err);
            }
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

pub fn platoon_label(platoon: &str) -> String {
    if platoon == crate::pipeline::ALL {
        "All platoons".to_string()
    } else {
        format!("Platoon {platoon}")
    }
}

pub fn squad_label(squad: &str) -> String {
    if squad == crate::pipeline::ALL {
        "All squads".to_string()
    } else {
        format!("Squad {squad}")
    }
}

pub fn category_label(category: ScoreCategory) -> &'static str {
    match category {
        ScoreCategory::Study => "Study",
        ScoreCategory::Discipline => "Discipline",
        ScoreCategory::Events => "Events",
    }
}

pub fn difficulty_label(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "easy",
        Difficulty::Medium => "medium",
        Difficulty::Hard => "hard",
    }
}

pub fn rank_badge(rank: u32) -> String {
    match rank {
        1 => "[1st]".to_string(),
        2 => "[2nd]".to_string(),
        3 => "[3rd]".to_string(),
        n => format!("#{n}"),
    }
}
