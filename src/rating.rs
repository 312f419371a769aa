use std::time::Instant;

use crate::debounce::Debouncer;
use crate::pipeline::{
    ALL, CadetStatistics, Completed, ExecutionPath, FilterCriteria, Pipeline, PipelineCommand,
    PipelineResponse, SortKey, Ticket,
};
use crate::settings::Settings;
use crate::state::{Cadet, PLATOONS, SQUADS};
use crate::virtual_list::{ViewportOptions, VirtualList};

pub const CADET_ROW_HEIGHT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingCategory {
    Total,
    Study,
    Discipline,
    Events,
}

impl RatingCategory {
    pub fn sort_key(self) -> SortKey {
        match self {
            RatingCategory::Total => SortKey::Score,
            RatingCategory::Study => SortKey::Study,
            RatingCategory::Discipline => SortKey::Discipline,
            RatingCategory::Events => SortKey::Events,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RatingCategory::Total => "Overall",
            RatingCategory::Study => "Study",
            RatingCategory::Discipline => "Discipline",
            RatingCategory::Events => "Events",
        }
    }

    /// Score shown for a cadet under this tab.
    pub fn score_of(self, cadet: &Cadet) -> i64 {
        match self {
            RatingCategory::Total => cadet.total_score,
            RatingCategory::Study => cadet.scores.study,
            RatingCategory::Discipline => cadet.scores.discipline,
            RatingCategory::Events => cadet.scores.events,
        }
    }

    pub fn all() -> [RatingCategory; 4] {
        [
            RatingCategory::Total,
            RatingCategory::Study,
            RatingCategory::Discipline,
            RatingCategory::Events,
        ]
    }
}

enum InFlight {
    Filtering {
        request: u64,
        sort_by: SortKey,
        ticket: Ticket,
    },
    Sorting {
        request: u64,
        ticket: Ticket,
    },
}

/// Rating list: source cadets, debounced criteria, background filter/sort and the windowed list.
pub struct RatingView {
    source: Vec<Cadet>,
    criteria: FilterCriteria,
    search_input: String,
    category: RatingCategory,
    sort_by: SortKey,
    list: VirtualList<Cadet>,
    selected: usize,
    pipeline: Pipeline,
    debounce: Debouncer,
    inflight: Option<InFlight>,
    stats_ticket: Option<Ticket>,
    stats: Option<CadetStatistics>,
    latest_request: u64,
    applied_request: u64,
}

impl std::fmt::Debug for RatingView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingView")
            .field("source", &self.source.len())
            .field("visible", &self.list.len())
            .field("criteria", &self.criteria)
            .field("sort_by", &self.sort_by)
            .field("pipeline", &self.pipeline)
            .field("latest_request", &self.latest_request)
            .field("applied_request", &self.applied_request)
            .finish()
    }
}

impl RatingView {
    pub fn new(settings: &Settings) -> Self {
        Self::with_pipeline(Pipeline::start(), settings)
    }

    pub fn with_pipeline(pipeline: Pipeline, settings: &Settings) -> Self {
        let options =
            ViewportOptions::new(CADET_ROW_HEIGHT, CADET_ROW_HEIGHT * 10).with_overscan(settings.list_overscan);
        Self {
            source: Vec::new(),
            criteria: FilterCriteria::default(),
            search_input: String::new(),
            category: RatingCategory::Total,
            sort_by: RatingCategory::Total.sort_key(),
            list: VirtualList::new(Vec::new(), options),
            selected: 0,
            pipeline,
            debounce: Debouncer::new(settings.search_debounce),
            inflight: None,
            stats_ticket: None,
            stats: None,
            latest_request: 0,
            applied_request: 0,
        }
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn list(&self) -> &VirtualList<Cadet> {
        &self.list
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn category(&self) -> RatingCategory {
        self.category
    }

    pub fn sort_by(&self) -> SortKey {
        self.sort_by
    }

    pub fn stats(&self) -> Option<&CadetStatistics> {
        self.stats.as_ref()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_cadet(&self) -> Option<&Cadet> {
        self.list.items().get(self.selected)
    }

    pub fn is_background(&self) -> bool {
        self.pipeline.is_background()
    }

    pub fn latest_request(&self) -> u64 {
        self.latest_request
    }

    /// Request id whose result is currently shown.
    pub fn applied_request(&self) -> u64 {
        self.applied_request
    }

    /// True while a debounced search is waiting or a request has not been applied yet.
    pub fn is_processing(&self) -> bool {
        self.debounce.is_pending() || self.inflight.is_some()
    }

    pub fn set_source(&mut self, cadets: Vec<Cadet>) {
        self.source = cadets;
        self.stats = None;
        self.stats_ticket = if self.source.is_empty() {
            None
        } else {
            Some(self.pipeline.dispatch(PipelineCommand::Statistics {
                cadets: self.source.clone(),
            }))
        };
        self.refresh();
    }

    /// Restores remembered group filters without triggering a run.
    pub fn preset_groups(&mut self, platoon: String, squad: String) {
        self.criteria.platoon = platoon;
        self.criteria.squad = squad;
    }

    pub fn push_search_char(&mut self, ch: char, now: Instant) {
        self.search_input.push(ch);
        self.debounce.schedule(now);
    }

    pub fn pop_search_char(&mut self, now: Instant) {
        if self.search_input.pop().is_some() {
            self.debounce.schedule(now);
        }
    }

    pub fn set_search(&mut self, text: &str, now: Instant) {
        self.search_input = text.to_string();
        self.debounce.schedule(now);
    }

    pub fn cycle_platoon(&mut self) {
        self.criteria.platoon = cycle_value(&self.criteria.platoon, PLATOONS.iter().copied());
        self.refresh();
    }

    pub fn cycle_squad(&mut self) {
        let squads = SQUADS.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        self.criteria.squad = cycle_value(&self.criteria.squad, squads.iter().map(String::as_str));
        self.refresh();
    }

    pub fn set_category(&mut self, category: RatingCategory) {
        self.category = category;
        self.sort_by = category.sort_key();
        self.refresh();
    }

    pub fn cycle_sort(&mut self) {
        self.sort_by = match self.sort_by {
            SortKey::Score | SortKey::Study | SortKey::Discipline | SortKey::Events => {
                SortKey::Name
            }
            SortKey::Name => SortKey::Rank,
            SortKey::Rank => self.category.sort_key(),
        };
        self.refresh();
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.list.set_container_height(height.max(1));
        self.list.scroll_into_view(self.selected);
    }

    pub fn set_scroll_top(&mut self, scroll_top: u64) {
        self.list.set_scroll_top(scroll_top);
    }

    pub fn select_next(&mut self) {
        if self.list.is_empty() {
            return;
        }
        self.selected = (self.selected + 1).min(self.list.len() - 1);
        self.list.scroll_into_view(self.selected);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.list.scroll_into_view(self.selected);
    }

    pub fn page_down(&mut self) {
        if self.list.is_empty() {
            return;
        }
        let page = self.page_rows();
        self.selected = (self.selected + page).min(self.list.len() - 1);
        self.list.scroll_into_view(self.selected);
    }

    pub fn page_up(&mut self) {
        let page = self.page_rows();
        self.selected = self.selected.saturating_sub(page);
        self.list.scroll_into_view(self.selected);
    }

    /// Applies debounced input and collects finished pipeline work. Returns log lines.
    pub fn tick(&mut self, now: Instant) -> Vec<String> {
        let mut logs = Vec::new();
        if self.debounce.fire(now) && self.search_input != self.criteria.search {
            self.criteria.search = self.search_input.clone();
            self.start_request();
        }
        self.poll_inflight(&mut logs);
        self.poll_stats(&mut logs);
        logs
    }

    /// Releases the background worker.
    pub fn cleanup(&mut self) {
        self.inflight = None;
        self.stats_ticket = None;
        self.pipeline.cleanup();
    }

    fn refresh(&mut self) {
        // Explicit changes supersede any pending keystrokes.
        if self.debounce.is_pending() {
            self.debounce.cancel();
            self.criteria.search = self.search_input.clone();
        }
        self.start_request();
    }

    fn start_request(&mut self) {
        self.latest_request += 1;
        if self.source.is_empty() {
            self.inflight = None;
            self.applied_request = self.latest_request;
            self.apply_result(Vec::new());
            return;
        }
        let ticket = self.pipeline.dispatch(PipelineCommand::Filter {
            cadets: self.source.clone(),
            criteria: self.criteria.clone(),
        });
        // Only the latest request holds a ticket. Replacing the slot drops the
        // superseded ticket, so its late reply is never applied.
        self.inflight = Some(InFlight::Filtering {
            request: self.latest_request,
            sort_by: self.sort_by,
            ticket,
        });
    }

    fn poll_inflight(&mut self, logs: &mut Vec<String>) {
        let Some(mut inflight) = self.inflight.take() else {
            return;
        };
        let finished = match &mut inflight {
            InFlight::Filtering { ticket, .. } | InFlight::Sorting { ticket, .. } => ticket.poll(),
        };
        let Some(done) = finished else {
            self.inflight = Some(inflight);
            return;
        };
        note_fallback(&done, logs);

        match (inflight, done.response) {
            (
                InFlight::Filtering {
                    request, sort_by, ..
                },
                PipelineResponse::Filtered(cadets),
            ) => {
                let ticket = self
                    .pipeline
                    .dispatch(PipelineCommand::Sort { cadets, sort_by });
                self.inflight = Some(InFlight::Sorting { request, ticket });
                // A synchronous ticket is already complete.
                self.poll_inflight(logs);
            }
            (InFlight::Sorting { request, .. }, PipelineResponse::Sorted(cadets)) => {
                self.applied_request = request;
                self.apply_result(cadets);
            }
            (_, other) => {
                logs.push(format!(
                    "[WARN] Unexpected pipeline response: {}",
                    response_name(&other)
                ));
            }
        }
    }

    fn poll_stats(&mut self, logs: &mut Vec<String>) {
        let Some(ticket) = self.stats_ticket.as_mut() else {
            return;
        };
        let Some(done) = ticket.poll() else {
            return;
        };
        self.stats_ticket = None;
        note_fallback(&done, logs);
        match done.response {
            PipelineResponse::Statistics(stats) => self.stats = Some(stats),
            other => logs.push(format!(
                "[WARN] Unexpected pipeline response: {}",
                response_name(&other)
            )),
        }
    }

    fn apply_result(&mut self, cadets: Vec<Cadet>) {
        let selected_id = self.selected_cadet().map(|c| c.id.clone());
        self.list.set_items(cadets);
        self.selected = selected_id
            .and_then(|id| self.list.items().iter().position(|c| c.id == id))
            .unwrap_or(0);
        self.list.scroll_into_view(self.selected);
    }

    fn page_rows(&self) -> usize {
        let opts = self.list.options();
        (opts.container_height / opts.item_height.max(1)).max(1) as usize
    }
}

fn note_fallback(done: &Completed, logs: &mut Vec<String>) {
    if done.path == ExecutionPath::Fallback {
        logs.push(format!(
            "[WARN] Background worker unavailable; {} computed in place",
            response_name(&done.response)
        ));
    }
}

fn response_name(response: &PipelineResponse) -> &'static str {
    match response {
        PipelineResponse::Filtered(_) => "filter",
        PipelineResponse::Sorted(_) => "sort",
        PipelineResponse::Statistics(_) => "statistics",
    }
}

fn cycle_value<'a>(current: &str, values: impl Iterator<Item = &'a str>) -> String {
    let values = values.collect::<Vec<_>>();
    if current == ALL {
        return values.first().map(|v| v.to_string()).unwrap_or_else(|| ALL.to_string());
    }
    match values.iter().position(|v| *v == current) {
        Some(idx) if idx + 1 < values.len() => values[idx + 1].to_string(),
        _ => ALL.to_string(),
    }
}
