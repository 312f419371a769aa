use cadet_rating::admin::{AdminState, AdminTab, EntityForm, FormKind};
use cadet_rating::state::{
    AdminSnapshot, Cadet, CadetDraft, CadetScores, Difficulty, Mutation, ScoreCategory,
    ScoreHistoryEntry, TaskStatus,
};

fn cadet(id: &str, name: &str) -> Cadet {
    Cadet {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@nkkk.ru"),
        platoon: "9-1".to_string(),
        squad: 2,
        total_score: 100,
        rank: 1,
        avatar_url: None,
        auth_user_id: None,
        scores: CadetScores::default(),
    }
}

fn type_into(form: &mut EntityForm, label: &str, text: &str) {
    form.focus = form
        .fields
        .iter()
        .position(|f| f.label == label)
        .expect("field exists");
    for ch in text.chars() {
        form.input(ch);
    }
}

fn error_of(form: &EntityForm) -> String {
    form.build().expect_err("form should be rejected").to_string()
}

#[test]
fn new_cadet_requires_a_name() {
    let form = EntityForm::new_cadet();
    assert_eq!(error_of(&form), "Name is required");
}

#[test]
fn new_cadet_builds_create_mutation() {
    let mut form = EntityForm::new_cadet();
    type_into(&mut form, "Name", "Орлов Денис");
    form.set_value("Platoon", "8-2");
    form.set_value("Squad", "3");
    let mutation = form.build().expect("valid cadet");
    assert_eq!(
        mutation,
        Mutation::CreateCadet(CadetDraft {
            name: "Орлов Денис".to_string(),
            email: String::new(),
            platoon: "8-2".to_string(),
            squad: 3,
        })
    );
}

#[test]
fn cadet_groups_are_validated() {
    let mut form = EntityForm::edit_cadet(&cadet("c1", "Петров"));
    form.set_value("Platoon", "12-1");
    assert_eq!(error_of(&form), "Unknown platoon '12-1'");

    form.set_value("Platoon", "7-2");
    form.set_value("Squad", "4");
    assert_eq!(error_of(&form), "Squad must be one of 1, 2, 3");

    form.set_value("Squad", "x");
    assert_eq!(error_of(&form), "Squad must be a number, got 'x'");
}

#[test]
fn editing_cadet_targets_its_id() {
    let form = EntityForm::edit_cadet(&cadet("c7", "Петров"));
    assert_eq!(form.kind, FormKind::Cadet);
    match form.build().expect("unchanged form is valid") {
        Mutation::UpdateCadet { id, draft } => {
            assert_eq!(id, "c7");
            assert_eq!(draft.squad, 2);
            assert_eq!(draft.platoon, "9-1");
        }
        other => panic!("unexpected mutation {other:?}"),
    }
}

#[test]
fn task_defaults_build_once_titled() {
    let mut form = EntityForm::new_task();
    assert_eq!(error_of(&form), "Title is required");

    form.set_value("Title", "Строевая подготовка");
    match form.build().expect("valid task") {
        Mutation::CreateTask(draft) => {
            assert_eq!(draft.category, ScoreCategory::Study);
            assert_eq!(draft.points, 10);
            assert_eq!(draft.difficulty, Difficulty::Easy);
            assert_eq!(draft.status, TaskStatus::Active);
            assert_eq!(draft.deadline, None);
        }
        other => panic!("unexpected mutation {other:?}"),
    }
}

#[test]
fn task_fields_are_checked() {
    let mut form = EntityForm::new_task();
    form.set_value("Title", "Кросс");

    form.set_value("Points", "0");
    assert_eq!(error_of(&form), "Points must be positive");
    form.set_value("Points", "15");

    form.set_value("Category", "sport");
    assert_eq!(error_of(&form), "Unknown category 'sport'");
    form.set_value("Category", "Events");

    form.set_value("Deadline", "31.12.2026");
    assert!(form.build().is_err());
    form.set_value("Deadline", "2026-12-31");

    match form.build().expect("valid task") {
        Mutation::CreateTask(draft) => {
            assert_eq!(draft.category, ScoreCategory::Events);
            assert_eq!(draft.deadline.map(|d| d.to_string()), Some("2026-12-31".to_string()));
        }
        other => panic!("unexpected mutation {other:?}"),
    }
}

#[test]
fn news_needs_content_and_yes_no_flag() {
    let mut form = EntityForm::new_news("Administrator");
    form.set_value("Title", "Парад");
    assert_eq!(error_of(&form), "Content is required");

    form.set_value("Content", "Построение в 9:00");
    form.set_value("Main", "maybe");
    assert!(form.build().is_err());

    form.set_value("Main", "yes");
    match form.build().expect("valid news") {
        Mutation::CreateNews(draft) => {
            assert!(draft.is_main);
            assert_eq!(draft.author, "Administrator");
        }
        other => panic!("unexpected mutation {other:?}"),
    }
}

#[test]
fn award_rejects_zero_and_accepts_deductions() {
    let mut form = EntityForm::award(&cadet("c3", "Смирнов"));
    form.set_value("Points", "0");
    assert_eq!(error_of(&form), "Points must not be zero");

    form.set_value("Points", "-5");
    form.set_value("Category", "discipline");
    form.set_value("Reason", "Опоздание");
    match form.build().expect("valid award") {
        Mutation::AwardPoints(draft) => {
            assert_eq!(draft.cadet_id, "c3");
            assert_eq!(draft.points, -5);
            assert_eq!(draft.category, ScoreCategory::Discipline);
        }
        other => panic!("unexpected mutation {other:?}"),
    }
}

#[test]
fn typing_clears_the_previous_error() {
    let mut form = EntityForm::new_cadet();
    form.error = Some("Name is required".to_string());
    form.input('A');
    assert!(form.error.is_none());
    form.backspace();
    assert_eq!(form.value("Name"), "");
}

#[test]
fn focus_wraps_in_both_directions() {
    let mut form = EntityForm::award(&cadet("c1", "Петров"));
    form.focus_prev();
    assert_eq!(form.focus, 2);
    form.focus_next();
    assert_eq!(form.focus, 0);
}

fn admin_with_data() -> AdminState {
    let mut admin = AdminState::new();
    admin.apply_snapshot(AdminSnapshot {
        cadets: vec![cadet("c1", "Петров"), cadet("c2", "Иванов")],
        history: vec![
            ScoreHistoryEntry {
                id: "h1".to_string(),
                cadet_id: "c2".to_string(),
                category: ScoreCategory::Events,
                points: 5,
                description: "Парад".to_string(),
                created_at: None,
            },
            ScoreHistoryEntry {
                id: "h2".to_string(),
                cadet_id: "c1".to_string(),
                category: ScoreCategory::Study,
                points: 3,
                description: String::new(),
                created_at: None,
            },
        ],
        ..AdminSnapshot::default()
    });
    admin
}

#[test]
fn delete_needs_a_confirmation_target() {
    let mut admin = admin_with_data();
    admin.select_next();
    admin.request_delete();
    let confirm = admin.confirm.clone().expect("delete pending");
    assert_eq!(confirm.label, "Иванов");
    assert_eq!(
        confirm.mutation(),
        Some(Mutation::DeleteCadet {
            id: "c2".to_string()
        })
    );

    admin.cycle_tab();
    assert_eq!(admin.tab, AdminTab::Tasks);
    assert!(admin.confirm.is_none());
    admin.request_delete();
    assert!(admin.confirm.is_none());
}

#[test]
fn history_is_filtered_to_the_selected_cadet() {
    let mut admin = admin_with_data();
    admin.select_next();
    let history = admin.history_for_selected();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, "h1");
    assert_eq!(admin.cadet_name("c1"), "Петров");
    assert_eq!(admin.cadet_name("missing"), "unknown cadet");
}

#[test]
fn selection_wraps_and_survives_shrinking_snapshots() {
    let mut admin = admin_with_data();
    admin.select_prev();
    assert_eq!(admin.selected, 1);
    admin.apply_snapshot(AdminSnapshot {
        cadets: vec![cadet("c1", "Петров")],
        ..AdminSnapshot::default()
    });
    assert_eq!(admin.selected, 0);
    admin.open_award();
    assert_eq!(admin.form.as_ref().map(|f| f.kind), Some(FormKind::Award));
}

#[test]
fn history_tab_has_no_forms() {
    let mut admin = admin_with_data();
    while admin.tab != AdminTab::History {
        admin.cycle_tab();
    }
    admin.open_create("Administrator");
    assert!(admin.form.is_none());
    admin.open_edit();
    assert!(admin.form.is_none());
}
