use cadet_rating::admin::EntityForm;
use cadet_rating::session::{Role, Session, SessionUser};
use cadet_rating::settings::Settings;
use cadet_rating::state::{
    AdminSnapshot, AppState, Cadet, CadetScores, Delta, Difficulty, LoadStatus, NewsItem,
    ScoreCategory, Screen, Task, TaskStatus, apply_delta,
};

fn cadet(id: &str, total: i64) -> Cadet {
    Cadet {
        id: id.to_string(),
        name: format!("Кадет {id}"),
        email: String::new(),
        platoon: "8-1".to_string(),
        squad: 1,
        total_score: total,
        rank: 1,
        avatar_url: None,
        auth_user_id: None,
        scores: CadetScores::default(),
    }
}

fn task(id: &str, status: TaskStatus) -> Task {
    Task {
        id: id.to_string(),
        title: format!("Задание {id}"),
        description: String::new(),
        category: ScoreCategory::Events,
        points: 10,
        difficulty: Difficulty::Medium,
        deadline: None,
        status,
    }
}

fn news(id: &str) -> NewsItem {
    NewsItem {
        id: id.to_string(),
        title: format!("Новость {id}"),
        content: "Текст".to_string(),
        author: "Администратор".to_string(),
        is_main: false,
        created_at: None,
    }
}

fn admin_session() -> Session {
    Session {
        user: SessionUser {
            id: "u1".to_string(),
            name: "Administrator".to_string(),
            email: "admin@nkkk.ru".to_string(),
            role: Role::Admin,
            platoon: None,
            squad: None,
            cadet_id: None,
        },
        access_token: "token".to_string(),
        refresh_token: None,
    }
}

fn fresh_state() -> AppState {
    AppState::new(&Settings::default())
}

#[test]
fn rating_load_sets_source_and_warns_on_missing_scores() {
    let mut state = fresh_state();
    apply_delta(
        &mut state,
        Delta::RatingLoaded {
            cadets: vec![cadet("1", 10), cadet("2", 20)],
            score_failures: 1,
        },
    );
    assert_eq!(state.rating_load, LoadStatus::Loaded);
    assert_eq!(state.rating.source_len(), 2);
    assert!(state.logs.iter().any(|l| l.starts_with("[WARN] Scores unavailable for 1")));
    assert!(state.logs.iter().any(|l| l == "[INFO] Loaded 2 cadets"));
}

#[test]
fn rating_failure_clears_source() {
    let mut state = fresh_state();
    apply_delta(
        &mut state,
        Delta::RatingLoaded {
            cadets: vec![cadet("1", 10)],
            score_failures: 0,
        },
    );
    apply_delta(&mut state, Delta::RatingLoadFailed("http 503: down".to_string()));
    assert_eq!(
        state.rating_load,
        LoadStatus::Failed("http 503: down".to_string())
    );
    assert_eq!(state.rating.source_len(), 0);
    assert!(state.logs.back().is_some_and(|l| l.starts_with("[ERROR]")));
}

#[test]
fn board_keeps_only_active_tasks() {
    let mut state = fresh_state();
    apply_delta(
        &mut state,
        Delta::BoardLoaded {
            news: vec![news("n1"), news("n2")],
            tasks: vec![
                task("t1", TaskStatus::Active),
                task("t2", TaskStatus::Inactive),
                task("t3", TaskStatus::Active),
            ],
        },
    );
    assert_eq!(state.board.load, LoadStatus::Loaded);
    assert_eq!(state.board.news.len(), 2);
    let ids = state
        .board
        .tasks
        .items()
        .iter()
        .map(|t| t.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["t1", "t3"]);
}

#[test]
fn sign_in_failure_keeps_the_login_screen() {
    let mut state = fresh_state();
    state.screen = Screen::Login;
    state.login.pending = true;
    apply_delta(&mut state, Delta::SignInFailed("Invalid login credentials".to_string()));
    assert_eq!(state.screen, Screen::Login);
    assert!(!state.login.pending);
    assert_eq!(state.login.error.as_deref(), Some("Invalid login credentials"));
    assert!(state.session.is_none());
}

#[test]
fn sign_in_then_out_round_trip() {
    let mut state = fresh_state();
    state.screen = Screen::Login;
    state.login.email = "admin@nkkk.ru".to_string();
    apply_delta(&mut state, Delta::SignedIn(admin_session()));
    assert!(state.is_admin());
    assert_eq!(state.screen, Screen::Rating);
    assert!(state.login.email.is_empty());

    state.screen = Screen::Admin;
    state.admin.apply_snapshot(AdminSnapshot {
        cadets: vec![cadet("1", 1)],
        ..AdminSnapshot::default()
    });
    apply_delta(&mut state, Delta::SignedOut);
    assert!(state.session.is_none());
    assert_eq!(state.screen, Screen::Rating);
    assert!(state.admin.data.cadets.is_empty());
}

#[test]
fn rejected_saved_session_signs_out() {
    let mut state = fresh_state();
    state.session = Some(admin_session());
    apply_delta(
        &mut state,
        Delta::SessionRestoreFailed("JWT expired".to_string()),
    );
    assert!(state.session.is_none());
    assert!(state.logs.iter().any(|l| l.contains("JWT expired")));
}

#[test]
fn mutation_failure_is_shown_on_the_form() {
    let mut state = fresh_state();
    state.admin.form = Some(EntityForm::new_task());
    state.admin.pending = true;
    apply_delta(&mut state, Delta::MutationFailed("http 409: duplicate".to_string()));
    assert!(!state.admin.pending);
    let form = state.admin.form.as_ref().expect("form stays open");
    assert_eq!(form.error.as_deref(), Some("http 409: duplicate"));
}

#[test]
fn mutation_success_closes_the_form() {
    let mut state = fresh_state();
    state.admin.form = Some(EntityForm::new_task());
    state.admin.pending = true;
    apply_delta(&mut state, Delta::MutationApplied("Task added".to_string()));
    assert!(state.admin.form.is_none());
    assert!(!state.admin.pending);
    assert_eq!(state.logs.back().map(String::as_str), Some("[INFO] Task added"));
}

#[test]
fn admin_failure_is_recorded() {
    let mut state = fresh_state();
    apply_delta(&mut state, Delta::AdminLoadFailed("offline".to_string()));
    assert_eq!(state.admin.load, LoadStatus::Failed("offline".to_string()));
}

#[test]
fn log_is_bounded() {
    let mut state = fresh_state();
    for i in 0..250 {
        apply_delta(&mut state, Delta::Log(format!("[INFO] line {i}")));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.logs.front().map(String::as_str), Some("[INFO] line 50"));
    assert_eq!(state.logs.back().map(String::as_str), Some("[INFO] line 249"));
}
