use std::time::{Duration, Instant};

use cadet_rating::pipeline::{ALL, Pipeline, SortKey};
use cadet_rating::rating::{RatingCategory, RatingView};
use cadet_rating::settings::Settings;
use cadet_rating::state::{Cadet, CadetScores};

const DEBOUNCE: Duration = Duration::from_millis(300);

fn cadet(id: &str, name: &str, platoon: &str, squad: u32, scores: [i64; 3], rank: u32) -> Cadet {
    let total = scores.iter().sum();
    Cadet {
        id: id.to_string(),
        name: name.to_string(),
        email: String::new(),
        platoon: platoon.to_string(),
        squad,
        total_score: total,
        rank,
        avatar_url: None,
        auth_user_id: None,
        scores: CadetScores {
            study: scores[0],
            discipline: scores[1],
            events: scores[2],
            total,
        },
    }
}

fn corps() -> Vec<Cadet> {
    vec![
        cadet("1", "Петров Алексей Владимирович", "10-1", 1, [80, 70, 90], 1),
        cadet("2", "Иванов Сергей Андреевич", "10-1", 2, [90, 60, 50], 2),
        cadet("3", "Смирнов Илья Олегович", "9-2", 1, [40, 95, 40], 3),
        cadet("4", "Кузнецов Максим Игоревич", "7-1", 3, [30, 20, 10], 4),
    ]
}

fn loaded_view(start: Instant) -> RatingView {
    let settings = Settings {
        search_debounce: DEBOUNCE,
        ..Settings::default()
    };
    let mut view = RatingView::with_pipeline(Pipeline::synchronous(), &settings);
    view.set_source(corps());
    view.tick(start);
    view
}

fn visible_ids(view: &RatingView) -> Vec<&str> {
    view.list().items().iter().map(|c| c.id.as_str()).collect()
}

#[test]
fn source_is_shown_sorted_by_total() {
    let view = loaded_view(Instant::now());
    assert_eq!(visible_ids(&view), vec!["1", "2", "3", "4"]);
    assert!(!view.is_processing());
    assert_eq!(view.stats().map(|s| s.total_cadets), Some(4));
}

#[test]
fn search_waits_for_the_quiet_period() {
    let start = Instant::now();
    let mut view = loaded_view(start);

    for ch in "Петров".chars() {
        view.push_search_char(ch, start);
    }
    assert_eq!(view.search_input(), "Петров");
    assert!(view.is_processing());

    view.tick(start + Duration::from_millis(100));
    assert_eq!(view.list().len(), 4);
    assert_eq!(view.criteria().search, "");

    view.tick(start + DEBOUNCE);
    assert_eq!(visible_ids(&view), vec!["1"]);
    assert_eq!(view.criteria().search, "Петров");
    assert!(!view.is_processing());
}

#[test]
fn each_keystroke_restarts_the_quiet_period() {
    let start = Instant::now();
    let mut view = loaded_view(start);

    view.push_search_char('С', start);
    view.push_search_char('м', start + Duration::from_millis(250));
    view.tick(start + Duration::from_millis(400));
    assert_eq!(view.list().len(), 4);

    view.tick(start + Duration::from_millis(550));
    assert_eq!(visible_ids(&view), vec!["3"]);
}

#[test]
fn group_change_applies_pending_search_immediately() {
    let start = Instant::now();
    let mut view = loaded_view(start);

    view.set_search("ов", start);
    view.cycle_platoon();
    assert_eq!(view.criteria().platoon, "7-1");
    assert_eq!(view.criteria().search, "ов");

    view.tick(start);
    assert_eq!(visible_ids(&view), vec!["4"]);
}

#[test]
fn only_the_latest_request_is_applied() {
    let start = Instant::now();
    let mut view = loaded_view(start);
    let before = view.latest_request();

    view.cycle_platoon();
    view.cycle_squad();
    assert_eq!(view.latest_request(), before + 2);

    view.tick(start);
    assert_eq!(view.applied_request(), view.latest_request());
    assert_eq!(view.criteria().platoon, "7-1");
    assert_eq!(view.criteria().squad, "1");
    assert!(view.list().is_empty());
}

fn settle(view: &mut RatingView) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while view.is_processing() && Instant::now() < deadline {
        view.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(!view.is_processing(), "background pipeline did not settle");
}

#[test]
fn background_replies_for_superseded_requests_are_not_applied() {
    let mut view = RatingView::with_pipeline(Pipeline::start(), &Settings::default());
    assert!(view.is_background());
    view.set_source(corps());
    settle(&mut view);

    view.set_category(RatingCategory::Discipline);
    let superseded = view.latest_request();
    view.set_category(RatingCategory::Study);
    let latest = view.latest_request();
    assert!(latest > superseded);

    settle(&mut view);
    assert_eq!(view.applied_request(), latest);
    assert_eq!(visible_ids(&view), vec!["2", "1", "3", "4"]);

    // Late replies to the dropped ticket must not show up on later ticks.
    for _ in 0..10 {
        view.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(view.applied_request(), latest);
    assert_eq!(visible_ids(&view), vec!["2", "1", "3", "4"]);
}

#[test]
fn background_search_then_group_change_keeps_the_later_criteria() {
    let start = Instant::now();
    let mut view = RatingView::with_pipeline(Pipeline::start(), &Settings::default());
    view.set_source(corps());
    settle(&mut view);

    view.set_search("ов", start);
    view.tick(start + Duration::from_secs(1));
    view.cycle_platoon();
    settle(&mut view);

    assert_eq!(view.applied_request(), view.latest_request());
    assert_eq!(view.criteria().platoon, "7-1");
    assert_eq!(visible_ids(&view), vec!["4"]);
}

#[test]
fn platoon_cycle_returns_to_all() {
    let mut view = loaded_view(Instant::now());
    for _ in 0..10 {
        view.cycle_platoon();
    }
    assert_eq!(view.criteria().platoon, "11-2");
    view.cycle_platoon();
    assert_eq!(view.criteria().platoon, ALL);
}

#[test]
fn category_tab_sorts_by_that_category() {
    let start = Instant::now();
    let mut view = loaded_view(start);

    view.set_category(RatingCategory::Discipline);
    assert_eq!(view.sort_by(), SortKey::Discipline);
    view.tick(start);
    assert_eq!(visible_ids(&view), vec!["3", "1", "2", "4"]);

    view.set_category(RatingCategory::Study);
    view.tick(start);
    assert_eq!(visible_ids(&view), vec!["2", "1", "3", "4"]);
    assert_eq!(
        RatingCategory::Study.score_of(&view.list().items()[0]),
        90
    );
}

#[test]
fn sort_cycle_goes_through_name_and_rank() {
    let start = Instant::now();
    let mut view = loaded_view(start);

    view.cycle_sort();
    assert_eq!(view.sort_by(), SortKey::Name);
    view.tick(start);
    assert_eq!(visible_ids(&view), vec!["2", "4", "1", "3"]);

    view.cycle_sort();
    assert_eq!(view.sort_by(), SortKey::Rank);
    view.cycle_sort();
    assert_eq!(view.sort_by(), SortKey::Score);
}

#[test]
fn selection_follows_the_cadet_across_resorts() {
    let start = Instant::now();
    let mut view = loaded_view(start);

    view.select_next();
    view.select_next();
    assert_eq!(view.selected_cadet().map(|c| c.id.as_str()), Some("3"));

    view.set_category(RatingCategory::Discipline);
    view.tick(start);
    assert_eq!(view.selected(), 0);
    assert_eq!(view.selected_cadet().map(|c| c.id.as_str()), Some("3"));
}

#[test]
fn paging_is_clamped_to_the_list() {
    let mut view = loaded_view(Instant::now());
    view.set_viewport_height(6);
    view.page_down();
    assert_eq!(view.selected(), 2);
    view.page_down();
    assert_eq!(view.selected(), 3);
    view.page_up();
    view.page_up();
    assert_eq!(view.selected(), 0);
}

#[test]
fn fallback_path_is_reported() {
    let settings = Settings::default();
    let mut view = RatingView::with_pipeline(Pipeline::synchronous(), &settings);
    assert!(!view.is_background());
    view.set_source(corps());
    let logs = view.tick(Instant::now());
    assert!(logs.iter().any(|line| line.starts_with("[WARN] Background worker unavailable")));
}

#[test]
fn empty_source_yields_empty_list() {
    let mut view = RatingView::with_pipeline(Pipeline::synchronous(), &Settings::default());
    view.set_source(Vec::new());
    view.tick(Instant::now());
    assert!(view.list().is_empty());
    assert!(view.selected_cadet().is_none());
    assert!(view.stats().is_none());
    view.select_next();
    assert_eq!(view.selected(), 0);
}

#[test]
fn background_view_eventually_shows_results() {
    let mut view = RatingView::with_pipeline(Pipeline::start(), &Settings::default());
    view.set_source(corps());
    let deadline = Instant::now() + Duration::from_secs(5);
    while view.is_processing() && Instant::now() < deadline {
        view.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(visible_ids(&view), vec!["1", "2", "3", "4"]);
    view.cleanup();
    assert!(!view.is_background());
}
