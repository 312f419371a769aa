use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;

use crate::state::{
    Achievement, AchievementDraft, AdminSnapshot, Cadet, CadetDraft, Difficulty, LoadStatus,
    Mutation, NewsDraft, NewsItem, PLATOONS, SQUADS, ScoreCategory, ScoreDraft, ScoreHistoryEntry,
    Task, TaskDraft, TaskStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTab {
    Cadets,
    Tasks,
    News,
    Achievements,
    History,
}

impl AdminTab {
    pub fn next(self) -> Self {
        match self {
            AdminTab::Cadets => AdminTab::Tasks,
            AdminTab::Tasks => AdminTab::News,
            AdminTab::News => AdminTab::Achievements,
            AdminTab::Achievements => AdminTab::History,
            AdminTab::History => AdminTab::Cadets,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AdminTab::Cadets => "Cadets",
            AdminTab::Tasks => "Tasks",
            AdminTab::News => "News",
            AdminTab::Achievements => "Achievements",
            AdminTab::History => "Score history",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Cadet,
    Task,
    News,
    Achievement,
    Award,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    pub hint: &'static str,
}

impl FormField {
    fn new(label: &'static str, value: impl Into<String>, hint: &'static str) -> Self {
        Self {
            label,
            value: value.into(),
            hint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityForm {
    pub kind: FormKind,
    /// Record being edited; `None` for a new record. For awards, the cadet id.
    pub target_id: Option<String>,
    pub title: String,
    pub fields: Vec<FormField>,
    pub focus: usize,
    pub error: Option<String>,
}

impl EntityForm {
    fn new(kind: FormKind, target_id: Option<String>, title: String, fields: Vec<FormField>) -> Self {
        Self {
            kind,
            target_id,
            title,
            fields,
            focus: 0,
            error: None,
        }
    }

    pub fn new_cadet() -> Self {
        Self::cadet(None, "New cadet".to_string(), "", "", "10-1", 1)
    }

    pub fn edit_cadet(cadet: &Cadet) -> Self {
        Self::cadet(
            Some(cadet.id.clone()),
            format!("Edit {}", cadet.name),
            &cadet.name,
            &cadet.email,
            &cadet.platoon,
            cadet.squad,
        )
    }

    fn cadet(
        id: Option<String>,
        title: String,
        name: &str,
        email: &str,
        platoon: &str,
        squad: u32,
    ) -> Self {
        Self::new(
            FormKind::Cadet,
            id,
            title,
            vec![
                FormField::new("Name", name, "full name"),
                FormField::new("Email", email, "login address"),
                FormField::new("Platoon", platoon, "7-1 .. 11-2"),
                FormField::new("Squad", squad.to_string(), "1, 2 or 3"),
            ],
        )
    }

    pub fn new_task() -> Self {
        Self::task(None, "New task".to_string(), "", "", "study", 10, "easy", "", "active")
    }

    pub fn edit_task(task: &Task) -> Self {
        Self::task(
            Some(task.id.clone()),
            format!("Edit {}", task.title),
            &task.title,
            &task.description,
            category_key(task.category),
            task.points,
            difficulty_key(task.difficulty),
            &task
                .deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            status_key(task.status),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn task(
        id: Option<String>,
        title: String,
        task_title: &str,
        description: &str,
        category: &str,
        points: i64,
        difficulty: &str,
        deadline: &str,
        status: &str,
    ) -> Self {
        Self::new(
            FormKind::Task,
            id,
            title,
            vec![
                FormField::new("Title", task_title, ""),
                FormField::new("Description", description, ""),
                FormField::new("Category", category, "study | discipline | events"),
                FormField::new("Points", points.to_string(), "positive number"),
                FormField::new("Difficulty", difficulty, "easy | medium | hard"),
                FormField::new("Deadline", deadline, "YYYY-MM-DD, optional"),
                FormField::new("Status", status, "active | inactive"),
            ],
        )
    }

    pub fn new_news(author: &str) -> Self {
        Self::news(None, "New article".to_string(), "", "", author, false)
    }

    pub fn edit_news(item: &NewsItem) -> Self {
        Self::news(
            Some(item.id.clone()),
            format!("Edit {}", item.title),
            &item.title,
            &item.content,
            &item.author,
            item.is_main,
        )
    }

    fn news(
        id: Option<String>,
        title: String,
        news_title: &str,
        content: &str,
        author: &str,
        is_main: bool,
    ) -> Self {
        Self::new(
            FormKind::News,
            id,
            title,
            vec![
                FormField::new("Title", news_title, ""),
                FormField::new("Content", content, ""),
                FormField::new("Author", author, ""),
                FormField::new("Main", if is_main { "yes" } else { "no" }, "yes | no"),
            ],
        )
    }

    pub fn new_achievement() -> Self {
        Self::achievement(None, "New achievement".to_string(), "", "", "award", "yellow")
    }

    pub fn edit_achievement(item: &Achievement) -> Self {
        Self::achievement(
            Some(item.id.clone()),
            format!("Edit {}", item.title),
            &item.title,
            &item.description,
            &item.icon,
            &item.color,
        )
    }

    fn achievement(
        id: Option<String>,
        title: String,
        achievement_title: &str,
        description: &str,
        icon: &str,
        color: &str,
    ) -> Self {
        Self::new(
            FormKind::Achievement,
            id,
            title,
            vec![
                FormField::new("Title", achievement_title, ""),
                FormField::new("Description", description, ""),
                FormField::new("Icon", icon, "icon name"),
                FormField::new("Color", color, "accent color"),
            ],
        )
    }

    pub fn award(cadet: &Cadet) -> Self {
        Self::new(
            FormKind::Award,
            Some(cadet.id.clone()),
            format!("Award points to {}", cadet.name),
            vec![
                FormField::new("Category", "study", "study | discipline | events"),
                FormField::new("Points", "5", "negative to deduct"),
                FormField::new("Reason", "", ""),
            ],
        )
    }

    pub fn value(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.trim())
            .unwrap_or("")
    }

    pub fn set_value(&mut self, label: &str, value: &str) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.label == label) {
            field.value = value.to_string();
        }
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if self.fields.is_empty() {
            return;
        }
        self.focus = if self.focus == 0 {
            self.fields.len() - 1
        } else {
            self.focus - 1
        };
    }

    pub fn input(&mut self, ch: char) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.push(ch);
        }
        self.error = None;
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.pop();
        }
        self.error = None;
    }

    /// Validates the fields and builds the mutation to send to the store.
    pub fn build(&self) -> Result<Mutation> {
        match self.kind {
            FormKind::Cadet => {
                let draft = CadetDraft {
                    name: required(self.value("Name"), "Name")?,
                    email: self.value("Email").to_string(),
                    platoon: parse_platoon(self.value("Platoon"))?,
                    squad: parse_squad(self.value("Squad"))?,
                };
                Ok(match &self.target_id {
                    Some(id) => Mutation::UpdateCadet {
                        id: id.clone(),
                        draft,
                    },
                    None => Mutation::CreateCadet(draft),
                })
            }
            FormKind::Task => {
                let points = parse_points(self.value("Points"))?;
                if points <= 0 {
                    bail!("Points must be positive");
                }
                let draft = TaskDraft {
                    title: required(self.value("Title"), "Title")?,
                    description: self.value("Description").to_string(),
                    category: parse_category(self.value("Category"))?,
                    points,
                    difficulty: parse_difficulty(self.value("Difficulty"))?,
                    deadline: parse_deadline(self.value("Deadline"))?,
                    status: parse_status(self.value("Status"))?,
                };
                Ok(match &self.target_id {
                    Some(id) => Mutation::UpdateTask {
                        id: id.clone(),
                        draft,
                    },
                    None => Mutation::CreateTask(draft),
                })
            }
            FormKind::News => {
                let draft = NewsDraft {
                    title: required(self.value("Title"), "Title")?,
                    content: required(self.value("Content"), "Content")?,
                    author: self.value("Author").to_string(),
                    is_main: parse_yes_no(self.value("Main"))?,
                };
                Ok(match &self.target_id {
                    Some(id) => Mutation::UpdateNews {
                        id: id.clone(),
                        draft,
                    },
                    None => Mutation::CreateNews(draft),
                })
            }
            FormKind::Achievement => {
                let draft = AchievementDraft {
                    title: required(self.value("Title"), "Title")?,
                    description: self.value("Description").to_string(),
                    icon: self.value("Icon").to_string(),
                    color: self.value("Color").to_string(),
                };
                Ok(match &self.target_id {
                    Some(id) => Mutation::UpdateAchievement {
                        id: id.clone(),
                        draft,
                    },
                    None => Mutation::CreateAchievement(draft),
                })
            }
            FormKind::Award => {
                let cadet_id = self
                    .target_id
                    .clone()
                    .ok_or_else(|| anyhow!("No cadet selected"))?;
                let points = parse_points(self.value("Points"))?;
                if points == 0 {
                    bail!("Points must not be zero");
                }
                Ok(Mutation::AwardPoints(ScoreDraft {
                    cadet_id,
                    category: parse_category(self.value("Category"))?,
                    points,
                    description: self.value("Reason").to_string(),
                }))
            }
        }
    }
}

/// Pending delete awaiting a second keypress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirm {
    pub tab: AdminTab,
    pub id: String,
    pub label: String,
}

impl DeleteConfirm {
    pub fn mutation(&self) -> Option<Mutation> {
        let id = self.id.clone();
        match self.tab {
            AdminTab::Cadets => Some(Mutation::DeleteCadet { id }),
            AdminTab::Tasks => Some(Mutation::DeleteTask { id }),
            AdminTab::News => Some(Mutation::DeleteNews { id }),
            AdminTab::Achievements => Some(Mutation::DeleteAchievement { id }),
            AdminTab::History => None,
        }
    }
}

#[derive(Debug)]
pub struct AdminState {
    pub tab: AdminTab,
    pub data: AdminSnapshot,
    pub selected: usize,
    pub form: Option<EntityForm>,
    pub confirm: Option<DeleteConfirm>,
    pub load: LoadStatus,
    pub pending: bool,
}

impl Default for AdminState {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminState {
    pub fn new() -> Self {
        Self {
            tab: AdminTab::Cadets,
            data: AdminSnapshot::default(),
            selected: 0,
            form: None,
            confirm: None,
            load: LoadStatus::Idle,
            pending: false,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: AdminSnapshot) {
        self.data = snapshot;
        self.load = LoadStatus::Loaded;
        self.clamp_selection();
    }

    pub fn cycle_tab(&mut self) {
        self.tab = self.tab.next();
        self.selected = 0;
        self.confirm = None;
    }

    pub fn row_count(&self) -> usize {
        match self.tab {
            AdminTab::Cadets => self.data.cadets.len(),
            AdminTab::Tasks => self.data.tasks.len(),
            AdminTab::News => self.data.news.len(),
            AdminTab::Achievements => self.data.achievements.len(),
            AdminTab::History => self.data.history.len(),
        }
    }

    pub fn select_next(&mut self) {
        let total = self.row_count();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self) {
        let total = self.row_count();
        if total == 0 {
            self.selected = 0;
            return;
        }
        if self.selected == 0 {
            self.selected = total - 1;
        } else {
            self.selected -= 1;
        }
    }

    pub fn clamp_selection(&mut self) {
        let total = self.row_count();
        if total == 0 {
            self.selected = 0;
        } else if self.selected >= total {
            self.selected = total - 1;
        }
    }

    pub fn selected_cadet(&self) -> Option<&Cadet> {
        match self.tab {
            AdminTab::Cadets => self.data.cadets.get(self.selected),
            _ => None,
        }
    }

    pub fn open_create(&mut self, author: &str) {
        self.confirm = None;
        self.form = match self.tab {
            AdminTab::Cadets => Some(EntityForm::new_cadet()),
            AdminTab::Tasks => Some(EntityForm::new_task()),
            AdminTab::News => Some(EntityForm::new_news(author)),
            AdminTab::Achievements => Some(EntityForm::new_achievement()),
            AdminTab::History => None,
        };
    }

    pub fn open_edit(&mut self) {
        self.confirm = None;
        let idx = self.selected;
        self.form = match self.tab {
            AdminTab::Cadets => self.data.cadets.get(idx).map(EntityForm::edit_cadet),
            AdminTab::Tasks => self.data.tasks.get(idx).map(EntityForm::edit_task),
            AdminTab::News => self.data.news.get(idx).map(EntityForm::edit_news),
            AdminTab::Achievements => self
                .data
                .achievements
                .get(idx)
                .map(EntityForm::edit_achievement),
            AdminTab::History => None,
        };
    }

    pub fn open_award(&mut self) {
        self.confirm = None;
        self.form = self.selected_cadet().map(EntityForm::award);
    }

    pub fn request_delete(&mut self) {
        let idx = self.selected;
        let target = match self.tab {
            AdminTab::Cadets => self.data.cadets.get(idx).map(|c| (c.id.clone(), c.name.clone())),
            AdminTab::Tasks => self.data.tasks.get(idx).map(|t| (t.id.clone(), t.title.clone())),
            AdminTab::News => self.data.news.get(idx).map(|n| (n.id.clone(), n.title.clone())),
            AdminTab::Achievements => self
                .data
                .achievements
                .get(idx)
                .map(|a| (a.id.clone(), a.title.clone())),
            AdminTab::History => None,
        };
        self.confirm = target.map(|(id, label)| DeleteConfirm {
            tab: self.tab,
            id,
            label,
        });
    }

    pub fn cadet_name(&self, cadet_id: &str) -> &str {
        self.data
            .cadets
            .iter()
            .find(|c| c.id == cadet_id)
            .map(|c| c.name.as_str())
            .unwrap_or("unknown cadet")
    }

    pub fn history_for_selected(&self) -> Vec<&ScoreHistoryEntry> {
        let Some(cadet) = self.data.cadets.get(self.selected) else {
            return Vec::new();
        };
        self.data
            .history
            .iter()
            .filter(|h| h.cadet_id == cadet.id)
            .collect()
    }
}

fn required(value: &str, label: &str) -> Result<String> {
    if value.is_empty() {
        bail!("{label} is required");
    }
    Ok(value.to_string())
}

fn parse_platoon(raw: &str) -> Result<String> {
    if PLATOONS.contains(&raw) {
        Ok(raw.to_string())
    } else {
        Err(anyhow!("Unknown platoon '{raw}'"))
    }
}

fn parse_squad(raw: &str) -> Result<u32> {
    let squad = raw
        .parse::<u32>()
        .with_context(|| format!("Squad must be a number, got '{raw}'"))?;
    if !SQUADS.contains(&squad) {
        bail!("Squad must be one of 1, 2, 3");
    }
    Ok(squad)
}

fn parse_points(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .with_context(|| format!("Points must be a number, got '{raw}'"))
}

pub fn parse_category(raw: &str) -> Result<ScoreCategory> {
    match raw.to_lowercase().as_str() {
        "study" => Ok(ScoreCategory::Study),
        "discipline" => Ok(ScoreCategory::Discipline),
        "events" => Ok(ScoreCategory::Events),
        other => Err(anyhow!("Unknown category '{other}'")),
    }
}

fn parse_difficulty(raw: &str) -> Result<Difficulty> {
    match raw.to_lowercase().as_str() {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        other => Err(anyhow!("Unknown difficulty '{other}'")),
    }
}

fn parse_status(raw: &str) -> Result<TaskStatus> {
    match raw.to_lowercase().as_str() {
        "active" | "" => Ok(TaskStatus::Active),
        "inactive" => Ok(TaskStatus::Inactive),
        other => Err(anyhow!("Unknown status '{other}'")),
    }
}

fn parse_deadline(raw: &str) -> Result<Option<NaiveDate>> {
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .with_context(|| format!("Deadline must be YYYY-MM-DD, got '{raw}'"))
}

fn parse_yes_no(raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" | "" => Ok(false),
        other => Err(anyhow!("Expected yes or no, got '{other}'")),
    }
}

fn category_key(category: ScoreCategory) -> &'static str {
    match category {
        ScoreCategory::Study => "study",
        ScoreCategory::Discipline => "discipline",
        ScoreCategory::Events => "events",
    }
}

fn difficulty_key(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "easy",
        Difficulty::Medium => "medium",
        Difficulty::Hard => "hard",
    }
}

fn status_key(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Active => "active",
        TaskStatus::Inactive => "inactive",
    }
}
