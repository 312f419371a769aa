use std::io;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use cadet_rating::admin::{AdminTab, EntityForm};
use cadet_rating::demo_store::{
    DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD, DEMO_CADET_EMAIL, DEMO_CADET_PASSWORD, DemoStore,
};
use cadet_rating::feed;
use cadet_rating::persist::{self, SavedState};
use cadet_rating::rating::{CADET_ROW_HEIGHT, RatingCategory};
use cadet_rating::remote::{RemoteStore, RestStore};
use cadet_rating::settings::Settings;
use cadet_rating::state::{
    self, AppState, Delta, LoadStatus, LoginField, ProviderCommand, Screen, apply_delta,
    category_label, difficulty_label, platoon_label, rank_badge, squad_label,
};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
    search_mode: bool,
    demo: bool,
    saved: SavedState,
}

impl App {
    fn new(state: AppState, cmd_tx: Option<mpsc::Sender<ProviderCommand>>, demo: bool) -> Self {
        let saved = SavedState::from_app(&state);
        Self {
            state,
            should_quit: false,
            cmd_tx,
            search_mode: false,
            demo,
            saved,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.state.help_overlay = false;
            }
            return;
        }
        match self.state.screen {
            Screen::Login => self.on_login_key(key),
            Screen::Admin if self.state.admin.form.is_some() => self.on_form_key(key),
            Screen::Rating if self.search_mode => self.on_search_key(key),
            _ => self.on_global_key(key),
        }
    }

    fn on_global_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Char('b') | KeyCode::Esc => {
                if self.state.admin.confirm.take().is_none() {
                    self.state.screen = Screen::Rating;
                }
            }
            KeyCode::Char('n') => self.open_board(Screen::News),
            KeyCode::Char('t') => self.open_board(Screen::Tasks),
            KeyCode::Char('a') => self.open_admin(),
            KeyCode::Char('l') => self.toggle_login(),
            _ => match self.state.screen {
                Screen::Rating => self.on_rating_key(key),
                Screen::News | Screen::Tasks => self.on_board_key(key),
                Screen::Admin => self.on_admin_key(key),
                Screen::Login => {}
            },
        }
    }

    fn on_rating_key(&mut self, key: KeyEvent) {
        let rating = &mut self.state.rating;
        match key.code {
            KeyCode::Char('/') => self.search_mode = true,
            KeyCode::Char('j') | KeyCode::Down => rating.select_next(),
            KeyCode::Char('k') | KeyCode::Up => rating.select_prev(),
            KeyCode::PageDown => rating.page_down(),
            KeyCode::PageUp => rating.page_up(),
            KeyCode::Char('p') => rating.cycle_platoon(),
            KeyCode::Char('g') => rating.cycle_squad(),
            KeyCode::Char('s') => rating.cycle_sort(),
            KeyCode::Char('1') => rating.set_category(RatingCategory::Total),
            KeyCode::Char('2') => rating.set_category(RatingCategory::Study),
            KeyCode::Char('3') => rating.set_category(RatingCategory::Discipline),
            KeyCode::Char('4') => rating.set_category(RatingCategory::Events),
            KeyCode::Char('r') => self.request_rating(true),
            _ => {}
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) {
        let now = Instant::now();
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.search_mode = false,
            KeyCode::Backspace => self.state.rating.pop_search_char(now),
            KeyCode::Char(ch) => self.state.rating.push_search_char(ch, now),
            KeyCode::Down => self.state.rating.select_next(),
            KeyCode::Up => self.state.rating.select_prev(),
            _ => {}
        }
    }

    fn on_board_key(&mut self, key: KeyEvent) {
        let list_step = i64::from(match self.state.screen {
            Screen::News => state::NEWS_ROW_HEIGHT,
            _ => state::TASK_ROW_HEIGHT,
        });
        let delta = match key.code {
            KeyCode::Char('j') | KeyCode::Down => list_step,
            KeyCode::Char('k') | KeyCode::Up => -list_step,
            KeyCode::PageDown => list_step * 5,
            KeyCode::PageUp => -list_step * 5,
            KeyCode::Char('r') => {
                self.request(ProviderCommand::LoadBoard, "News and tasks");
                return;
            }
            _ => return,
        };
        match self.state.screen {
            Screen::News => self.state.board.news.scroll_by(delta),
            _ => self.state.board.tasks.scroll_by(delta),
        }
    }

    fn on_admin_key(&mut self, key: KeyEvent) {
        if let Some(confirm) = self.state.admin.confirm.take() {
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                if let Some(mutation) = confirm.mutation() {
                    self.state
                        .push_log(format!("[INFO] Deleting {}", confirm.label));
                    self.send_mutation(mutation);
                }
            } else {
                self.state.push_log("[INFO] Delete cancelled");
            }
            return;
        }
        let author = self
            .state
            .session
            .as_ref()
            .map(|s| s.user.name.clone())
            .unwrap_or_default();
        let admin = &mut self.state.admin;
        match key.code {
            KeyCode::Tab => admin.cycle_tab(),
            KeyCode::Char('j') | KeyCode::Down => admin.select_next(),
            KeyCode::Char('k') | KeyCode::Up => admin.select_prev(),
            KeyCode::Char('c') => admin.open_create(&author),
            KeyCode::Char('e') | KeyCode::Enter => admin.open_edit(),
            KeyCode::Char('d') => admin.request_delete(),
            KeyCode::Char('+') => admin.open_award(),
            KeyCode::Char('r') => {
                self.request(ProviderCommand::LoadAdmin, "Admin data");
            }
            _ => {}
        }
    }

    fn on_form_key(&mut self, key: KeyEvent) {
        let Some(form) = self.state.admin.form.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.state.admin.form = None,
            KeyCode::Tab | KeyCode::Down => form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(ch) => form.input(ch),
            KeyCode::Enter => {
                if self.state.admin.pending {
                    return;
                }
                match form.build() {
                    Ok(mutation) => self.send_mutation(mutation),
                    Err(err) => form.error = Some(format!("{err:#}")),
                }
            }
            _ => {}
        }
    }

    fn on_login_key(&mut self, key: KeyEvent) {
        let login = &mut self.state.login;
        match key.code {
            KeyCode::Esc => self.state.screen = Screen::Rating,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => login.toggle_focus(),
            KeyCode::Backspace => {
                login.focused_mut().pop();
            }
            KeyCode::Char(ch) => login.focused_mut().push(ch),
            KeyCode::Enter => {
                if login.pending {
                    return;
                }
                if login.email.trim().is_empty() || login.password.is_empty() {
                    login.error = Some("Enter email and password".to_string());
                    return;
                }
                login.pending = true;
                login.error = None;
                let cmd = ProviderCommand::SignIn {
                    email: login.email.trim().to_string(),
                    password: login.password.clone(),
                };
                if !self.request(cmd, "Sign-in") {
                    self.state.login.pending = false;
                }
            }
            _ => {}
        }
    }

    fn open_board(&mut self, screen: Screen) {
        self.state.screen = screen;
        if matches!(self.state.board.load, LoadStatus::Idle | LoadStatus::Failed(_)) {
            self.state.board.load = LoadStatus::Loading;
            self.request(ProviderCommand::LoadBoard, "News and tasks");
        }
    }

    fn open_admin(&mut self) {
        if !self.state.is_admin() {
            self.state
                .push_log("[WARN] Admin panel requires an administrator session");
            return;
        }
        self.state.screen = Screen::Admin;
        if matches!(self.state.admin.load, LoadStatus::Idle | LoadStatus::Failed(_)) {
            self.state.admin.load = LoadStatus::Loading;
            self.request(ProviderCommand::LoadAdmin, "Admin data");
        }
    }

    fn toggle_login(&mut self) {
        match self.state.session.as_ref() {
            Some(session) => {
                let cmd = ProviderCommand::SignOut {
                    access_token: session.access_token.clone(),
                };
                if !self.request(cmd, "Sign-out") {
                    self.state.sign_out();
                }
            }
            None => self.state.screen = Screen::Login,
        }
    }

    fn request_rating(&mut self, announce: bool) {
        self.state.rating_load = LoadStatus::Loading;
        if !self.request(ProviderCommand::LoadRating, "Rating") && announce {
            self.state.rating_load = LoadStatus::Failed("provider unavailable".to_string());
        }
    }

    fn send_mutation(&mut self, mutation: state::Mutation) {
        self.state.admin.pending = true;
        let what = mutation.label();
        if !self.request(ProviderCommand::Mutate(mutation), what) {
            self.state.admin.pending = false;
        }
    }

    fn request(&mut self, cmd: ProviderCommand, what: &str) -> bool {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log(format!("[INFO] {what} fetch unavailable"));
            return false;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log(format!("[WARN] {what} request failed"));
            false
        } else {
            self.state.push_log(format!("[INFO] {what} request sent"));
            true
        }
    }

    fn tick(&mut self) {
        for line in self.state.rating.tick(Instant::now()) {
            self.state.push_log(line);
        }
    }

    fn persist_if_changed(&mut self) {
        let current = SavedState::from_app(&self.state);
        if current == self.saved {
            return;
        }
        if let Err(err) = persist::save_from_state(&self.state) {
            self.state
                .push_log(format!("[WARN] Could not save preferences: {err:#}"));
        }
        self.saved = current;
    }

    fn fit_viewports(&mut self, area: Rect) {
        let [_, body, _, _] = screen_chunks(area);
        let list = rating_list_inner(body);
        self.state.rating.set_viewport_height(list.height as u32);
        let board = Block::default().borders(Borders::ALL).inner(body);
        self.state
            .board
            .news
            .set_container_height(board.height.max(1) as u32);
        self.state
            .board
            .tasks
            .set_container_height(board.height.max(1) as u32);
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let settings = Settings::from_env();

    let store: Arc<dyn RemoteStore> =
        match (settings.api_url.as_deref(), settings.api_key.as_deref()) {
            (Some(url), Some(key)) => Arc::new(RestStore::new(url, key)),
            _ => Arc::new(DemoStore::new(settings.demo_score_failure_rate)),
        };
    let demo = settings.api_url.is_none() || settings.api_key.is_none();

    let mut state = AppState::new(&settings);
    if demo {
        state.push_log("[INFO] CADET_API_URL not set; using the built-in demo corps");
    }
    let saved_session = persist::load_into_state(&mut state);

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let provider = feed::spawn_provider(store, settings.clone(), tx, cmd_rx);

    let mut app = App::new(state, Some(cmd_tx), demo);
    app.request_rating(false);
    if let Some(session) = saved_session {
        app.state.session = Some(session.clone());
        app.request(ProviderCommand::RestoreSession(session), "Session check");
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app.state.rating.cleanup();
    app.persist_if_changed();
    app.cmd_tx = None;
    let _ = provider.join();

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }
        app.tick();
        app.persist_if_changed();

        app.fit_viewports(terminal.size()?);
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn screen_chunks(area: Rect) -> [Rect; 4] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(2),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2], chunks[3]]
}

fn rating_chunks(body: Rect) -> [Rect; 4] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(body);
    [chunks[0], chunks[1], chunks[2], chunks[3]]
}

fn rating_list_inner(body: Rect) -> Rect {
    let [_, _, _, list] = rating_chunks(body);
    Block::default().borders(Borders::ALL).inner(list)
}

fn ui(frame: &mut Frame, app: &App) {
    let full = frame.size();
    let [header_area, body, console_area, footer_area] = screen_chunks(full);

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, header_area);

    match app.state.screen {
        Screen::Rating => render_rating(frame, body, app),
        Screen::News => render_news(frame, body, &app.state),
        Screen::Tasks => render_tasks(frame, body, &app.state),
        Screen::Admin => render_admin(frame, body, &app.state),
        Screen::Login => render_login(frame, body, app),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, console_area);

    let footer = Paragraph::new(footer_text(app))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, footer_area);

    if app.state.help_overlay {
        render_help_overlay(frame, full);
    }
}

fn header_text(state: &AppState) -> String {
    let title = match state.screen {
        Screen::Rating => "RATING",
        Screen::News => "NEWS",
        Screen::Tasks => "TASKS",
        Screen::Admin => "ADMIN",
        Screen::Login => "SIGN IN",
    };
    let user = match state.session.as_ref() {
        Some(session) if session.is_admin() => format!("{} (admin)", session.user.name),
        Some(session) => session.user.name.clone(),
        None => "guest".to_string(),
    };
    format!("  NKKK CADET CORPS | {title} | {user}\n  Rating of cadets by study, discipline and events")
}

fn footer_text(app: &App) -> String {
    match app.state.screen {
        Screen::Rating if app.search_mode => {
            "Type to search | Backspace Delete | ↑/↓ Move | Enter/Esc Done".to_string()
        }
        Screen::Rating => {
            "/ Search | j/k Move | 1-4 Category | p Platoon | g Squad | s Sort | r Reload | n News | t Tasks | a Admin | l Login | ? Help | q Quit".to_string()
        }
        Screen::News | Screen::Tasks => {
            "j/k Scroll | n News | t Tasks | r Reload | b/Esc Back | ? Help | q Quit".to_string()
        }
        Screen::Admin if app.state.admin.form.is_some() => {
            "Tab/↑/↓ Field | Enter Save | Esc Cancel".to_string()
        }
        Screen::Admin => {
            "Tab Section | j/k Move | c Create | e Edit | d Delete | + Award | r Reload | b/Esc Back".to_string()
        }
        Screen::Login => "Tab Switch field | Enter Sign in | Esc Back".to_string(),
    }
}

fn render_rating(frame: &mut Frame, body: Rect, app: &App) {
    let state = &app.state;
    let rating = &state.rating;
    let [tabs_area, filter_area, stats_area, list_area] = rating_chunks(body);

    let tabs = RatingCategory::all()
        .into_iter()
        .enumerate()
        .flat_map(|(idx, category)| {
            let style = if category == rating.category() {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            [
                Span::styled(format!(" {} {} ", idx + 1, category.label()), style),
                Span::raw(" "),
            ]
        })
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(Line::from(tabs)), tabs_area);

    let criteria = rating.criteria();
    let cursor = if app.search_mode { "_" } else { "" };
    let mut filter = format!(
        "Search: {}{cursor} | {} | {} | Sort: {} | Found: {} of {}",
        rating.search_input(),
        platoon_label(&criteria.platoon),
        squad_label(&criteria.squad),
        rating.sort_by().label(),
        rating.list().len(),
        rating.source_len(),
    );
    if rating.is_processing() {
        filter.push_str(" | processing...");
    }
    let filter_style = if app.search_mode {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    frame.render_widget(Paragraph::new(filter).style(filter_style), filter_area);

    let mode = if rating.is_background() {
        "background"
    } else {
        "in place"
    };
    let stats = match rating.stats() {
        Some(stats) => format!(
            "Cadets: {} | Average score: {:.1} | Top-{} performers: {} | Platoons: {} | Pipeline: {mode}",
            stats.total_cadets,
            stats.average_score,
            cadet_rating::pipeline::TOP_PERFORMER_RANK,
            stats.top_performers.len(),
            stats.platoon_stats.len(),
        ),
        None => format!("Statistics pending | Pipeline: {mode}"),
    };
    frame.render_widget(
        Paragraph::new(stats).style(Style::default().fg(Color::DarkGray)),
        stats_area,
    );

    let block = Block::default()
        .title(format!("Rating - {}", rating.category().label()))
        .borders(Borders::ALL);
    let inner = block.inner(list_area);
    frame.render_widget(block, list_area);

    if rating.source_len() == 0 {
        let text = match &state.rating_load {
            LoadStatus::Failed(err) => format!("Failed to load rating: {err}\nPress r to retry"),
            LoadStatus::Loading | LoadStatus::Idle => "Loading cadets...".to_string(),
            LoadStatus::Loaded => "No cadets yet".to_string(),
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }
    if rating.list().is_empty() {
        let text = if rating.is_processing() {
            "Filtering..."
        } else {
            "No cadets match the current filters"
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let list = rating.list();
    let scroll_top = list.scroll_top();
    let row_height = CADET_ROW_HEIGHT as u64;
    let start = list.window().start_index;
    for (offset, cadet) in list.visible_items().iter().enumerate() {
        let idx = start + offset;
        let Some(slot) = row_slot(inner, idx, row_height, scroll_top) else {
            continue;
        };
        let selected = idx == rating.selected();
        render_cadet_row(frame, slot, cadet, rating.category(), selected);
    }
}

fn render_cadet_row(
    frame: &mut Frame,
    slot: RowSlot,
    cadet: &state::Cadet,
    category: RatingCategory,
    selected: bool,
) {
    let row_style = if selected {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else {
        Style::default()
    };
    let area = slot.area;
    if selected {
        frame.render_widget(Block::default().style(row_style), area);
    }

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(7),
            Constraint::Min(20),
            Constraint::Length(12),
        ])
        .split(area);

    let badge_style = match cadet.rank {
        1 => row_style.fg(Color::Yellow).add_modifier(Modifier::BOLD),
        2 => row_style.fg(Color::Gray).add_modifier(Modifier::BOLD),
        3 => row_style.fg(Color::LightRed).add_modifier(Modifier::BOLD),
        _ => row_style,
    };
    render_cell_text(frame, cols[0], &rank_badge(cadet.rank), badge_style);

    let details = vec![
        Line::from(Span::styled(
            cadet.name.clone(),
            row_style.add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(
                "Platoon {} · Squad {} | Study {} · Discipline {} · Events {}",
                cadet.platoon,
                cadet.squad,
                cadet.scores.study,
                cadet.scores.discipline,
                cadet.scores.events
            ),
            row_style.fg(Color::Gray),
        )),
    ];
    frame.render_widget(
        Paragraph::new(details)
            .style(row_style)
            .scroll((slot.skip, 0)),
        cols[1],
    );

    let score = format!("{} pts", category.score_of(cadet));
    render_cell_text(
        frame,
        cols[2],
        &score,
        row_style.fg(Color::Yellow).add_modifier(Modifier::BOLD),
    );
}

fn render_news(frame: &mut Frame, body: Rect, state: &AppState) {
    let block = Block::default().title("News").borders(Borders::ALL);
    let inner = block.inner(body);
    frame.render_widget(block, body);

    let list = &state.board.news;
    if list.is_empty() {
        frame.render_widget(board_placeholder(&state.board.load, "No news yet"), inner);
        return;
    }
    let row_height = state::NEWS_ROW_HEIGHT as u64;
    let start = list.window().start_index;
    for (offset, item) in list.visible_items().iter().enumerate() {
        let idx = start + offset;
        let Some(slot) = row_slot(inner, idx, row_height, list.scroll_top()) else {
            continue;
        };
        let marker = if item.is_main { "★ " } else { "" };
        let date = item
            .created_at
            .as_deref()
            .map(|d| d.chars().take(10).collect::<String>())
            .unwrap_or_default();
        let lines = vec![
            Line::from(Span::styled(
                format!("{marker}{}", item.title),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(item.content.clone()),
            Line::from(Span::styled(
                format!("{} {date}", item.author),
                Style::default().fg(Color::DarkGray),
            )),
        ];
        frame.render_widget(Paragraph::new(lines).scroll((slot.skip, 0)), slot.area);
    }
}

fn render_tasks(frame: &mut Frame, body: Rect, state: &AppState) {
    let block = Block::default().title("Active tasks").borders(Borders::ALL);
    let inner = block.inner(body);
    frame.render_widget(block, body);

    let list = &state.board.tasks;
    if list.is_empty() {
        frame.render_widget(board_placeholder(&state.board.load, "No active tasks"), inner);
        return;
    }
    let row_height = state::TASK_ROW_HEIGHT as u64;
    let start = list.window().start_index;
    for (offset, task) in list.visible_items().iter().enumerate() {
        let idx = start + offset;
        let Some(slot) = row_slot(inner, idx, row_height, list.scroll_top()) else {
            continue;
        };
        let deadline = task
            .deadline
            .map(|d| format!("due {}", d.format("%d.%m.%Y")))
            .unwrap_or_else(|| "no deadline".to_string());
        let lines = vec![
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", category_label(task.category)),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(task.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(
                    format!("  +{} pts, {}, {deadline}", task.points, difficulty_label(task.difficulty)),
                    Style::default().fg(Color::Yellow),
                ),
            ]),
            Line::from(Span::styled(
                task.description.clone(),
                Style::default().fg(Color::Gray),
            )),
        ];
        frame.render_widget(Paragraph::new(lines).scroll((slot.skip, 0)), slot.area);
    }
}

fn board_placeholder(load: &LoadStatus, empty: &str) -> Paragraph<'static> {
    let text = match load {
        LoadStatus::Failed(err) => format!("Failed to load: {err}\nPress r to retry"),
        LoadStatus::Loading | LoadStatus::Idle => "Loading...".to_string(),
        LoadStatus::Loaded => empty.to_string(),
    };
    Paragraph::new(text).style(Style::default().fg(Color::DarkGray))
}

/// Part of a list row that lands inside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowSlot {
    area: Rect,
    /// Lines of the row hidden above the viewport.
    skip: u16,
}

/// Clips row `idx` of a list scrolled to `scroll_top` against `inner`. A row
/// cut by the top edge keeps its visible lines, so a scroll offset between
/// row boundaries never leaves the first lines blank.
fn row_slot(inner: Rect, idx: usize, row_height: u64, scroll_top: u64) -> Option<RowSlot> {
    let top = (idx as u64).saturating_mul(row_height);
    if top.saturating_add(row_height) <= scroll_top {
        return None;
    }
    let y = top.saturating_sub(scroll_top);
    let viewport = u64::from(inner.height);
    if y >= viewport {
        return None;
    }
    let skip = scroll_top.saturating_sub(top);
    let height = (row_height - skip).min(viewport - y);
    Some(RowSlot {
        area: Rect {
            x: inner.x,
            y: inner.y + y as u16,
            width: inner.width,
            height: height as u16,
        },
        skip: skip as u16,
    })
}

fn render_admin(frame: &mut Frame, body: Rect, state: &AppState) {
    let admin = &state.admin;
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1), Constraint::Length(1)])
        .split(body);

    let tabs = [
        AdminTab::Cadets,
        AdminTab::Tasks,
        AdminTab::News,
        AdminTab::Achievements,
        AdminTab::History,
    ]
    .into_iter()
    .flat_map(|tab| {
        let style = if tab == admin.tab {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        [Span::styled(format!(" {} ", tab.label()), style), Span::raw(" ")]
    })
    .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(Line::from(tabs)), sections[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(sections[1]);

    let list_block = Block::default()
        .title(format!("{} ({})", admin.tab.label(), admin.row_count()))
        .borders(Borders::ALL);
    let list_inner = list_block.inner(columns[0]);
    frame.render_widget(list_block, columns[0]);

    let rows = admin_rows(state);
    if rows.is_empty() {
        let text = match &admin.load {
            LoadStatus::Failed(err) => format!("Failed to load: {err}\nPress r to retry"),
            LoadStatus::Loading | LoadStatus::Idle => "Loading...".to_string(),
            LoadStatus::Loaded => "Nothing here yet. Press c to create.".to_string(),
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            list_inner,
        );
    } else {
        let (start, end) = visible_range(admin.selected, rows.len(), list_inner.height as usize);
        let lines = (start..end)
            .map(|idx| {
                let style = if idx == admin.selected {
                    Style::default().fg(Color::White).bg(Color::DarkGray)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(rows[idx].clone(), style))
            })
            .collect::<Vec<_>>();
        frame.render_widget(Paragraph::new(lines), list_inner);
    }

    match admin.form.as_ref() {
        Some(form) => render_form(frame, columns[1], form, admin.pending),
        None => {
            let detail = Paragraph::new(admin_detail_text(state))
                .block(Block::default().title("Details").borders(Borders::ALL));
            frame.render_widget(detail, columns[1]);
        }
    }

    let status = match (&admin.confirm, admin.pending) {
        (Some(confirm), _) => Paragraph::new(format!("Delete {}? y to confirm, any other key cancels", confirm.label))
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        (None, true) => Paragraph::new("Saving...").style(Style::default().fg(Color::Yellow)),
        (None, false) => Paragraph::new(""),
    };
    frame.render_widget(status, sections[2]);
}

fn admin_rows(state: &AppState) -> Vec<String> {
    let data = &state.admin.data;
    match state.admin.tab {
        AdminTab::Cadets => data
            .cadets
            .iter()
            .map(|c| {
                format!(
                    "{:>4} {:<32} {:>5} sq{} {:>5} pts",
                    rank_badge(c.rank),
                    c.name,
                    c.platoon,
                    c.squad,
                    c.total_score
                )
            })
            .collect(),
        AdminTab::Tasks => data
            .tasks
            .iter()
            .map(|t| {
                format!(
                    "{:<10} {:<30} +{} {}",
                    category_label(t.category),
                    t.title,
                    t.points,
                    if t.status == state::TaskStatus::Active {
                        ""
                    } else {
                        "(inactive)"
                    }
                )
            })
            .collect(),
        AdminTab::News => data
            .news
            .iter()
            .map(|n| format!("{}{}", if n.is_main { "★ " } else { "  " }, n.title))
            .collect(),
        AdminTab::Achievements => data
            .achievements
            .iter()
            .map(|a| format!("{} [{}]", a.title, a.icon))
            .collect(),
        AdminTab::History => data
            .history
            .iter()
            .map(|h| {
                format!(
                    "{:+4} {:<10} {} - {}",
                    h.points,
                    category_label(h.category),
                    state.admin.cadet_name(&h.cadet_id),
                    h.description
                )
            })
            .collect(),
    }
}

fn admin_detail_text(state: &AppState) -> String {
    let admin = &state.admin;
    let idx = admin.selected;
    match admin.tab {
        AdminTab::Cadets => {
            let Some(cadet) = admin.data.cadets.get(idx) else {
                return "No cadet selected".to_string();
            };
            let mut lines = vec![
                cadet.name.clone(),
                format!("Email: {}", cadet.email),
                format!("Platoon {} · Squad {}", cadet.platoon, cadet.squad),
                format!("Rank {} · {} pts", cadet.rank, cadet.total_score),
                String::new(),
                "Recent awards:".to_string(),
            ];
            let history = admin.history_for_selected();
            if history.is_empty() {
                lines.push("  none".to_string());
            }
            for entry in history.into_iter().take(8) {
                lines.push(format!(
                    "  {:+} {} {}",
                    entry.points,
                    category_label(entry.category),
                    entry.description
                ));
            }
            lines.join("\n")
        }
        AdminTab::Tasks => admin
            .data
            .tasks
            .get(idx)
            .map(|t| {
                format!(
                    "{}\n{}\nCategory: {}\nPoints: {}\nDifficulty: {}\nDeadline: {}",
                    t.title,
                    t.description,
                    category_label(t.category),
                    t.points,
                    difficulty_label(t.difficulty),
                    t.deadline
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                )
            })
            .unwrap_or_else(|| "No task selected".to_string()),
        AdminTab::News => admin
            .data
            .news
            .get(idx)
            .map(|n| format!("{}\nby {}\n\n{}", n.title, n.author, n.content))
            .unwrap_or_else(|| "No article selected".to_string()),
        AdminTab::Achievements => admin
            .data
            .achievements
            .get(idx)
            .map(|a| format!("{}\n{}\nIcon: {} · Color: {}", a.title, a.description, a.icon, a.color))
            .unwrap_or_else(|| "No achievement selected".to_string()),
        AdminTab::History => admin
            .data
            .history
            .get(idx)
            .map(|h| {
                format!(
                    "{}\n{:+} {}\n{}\n{}",
                    admin.cadet_name(&h.cadet_id),
                    h.points,
                    category_label(h.category),
                    h.description,
                    h.created_at.as_deref().unwrap_or("-")
                )
            })
            .unwrap_or_else(|| "No entry selected".to_string()),
    }
}

fn render_form(frame: &mut Frame, area: Rect, form: &EntityForm, pending: bool) {
    let mut lines = Vec::new();
    for (idx, field) in form.fields.iter().enumerate() {
        let focused = idx == form.focus;
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let cursor = if focused { "_" } else { "" };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<12}", field.label), label_style),
            Span::raw(format!("{}{cursor}", field.value)),
        ]));
        if focused && !field.hint.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("{:<12}{}", "", field.hint),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
    lines.push(Line::from(""));
    if let Some(err) = form.error.as_ref() {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    } else if pending {
        lines.push(Line::from(Span::styled(
            "Saving...",
            Style::default().fg(Color::Yellow),
        )));
    }
    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(form.title.clone()).borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_login(frame: &mut Frame, body: Rect, app: &App) {
    let login = &app.state.login;
    let area = centered_rect(50, 70, body);
    frame.render_widget(Clear, area);

    let field = |label: &str, value: String, focused: bool| {
        let style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let cursor = if focused { "_" } else { "" };
        Line::from(vec![
            Span::styled(format!("{label:<10}"), style),
            Span::raw(format!("{value}{cursor}")),
        ])
    };

    let mut lines = vec![
        field("Email", login.email.clone(), login.focus == LoginField::Email),
        field(
            "Password",
            "*".repeat(login.password.chars().count()),
            login.focus == LoginField::Password,
        ),
        Line::from(""),
    ];
    if login.pending {
        lines.push(Line::from(Span::styled(
            "Signing in...",
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(err) = login.error.as_ref() {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    if app.demo {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Demo accounts:",
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(Span::styled(
            format!("  {DEMO_ADMIN_EMAIL} / {DEMO_ADMIN_PASSWORD}"),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(Span::styled(
            format!("  {DEMO_CADET_EMAIL} / {DEMO_CADET_PASSWORD}"),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title("Sign in").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_cell_text(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    if area.height == 0 {
        return;
    }
    let text_area = Rect {
        x: area.x,
        y: area.y + (area.height / 2),
        width: area.width,
        height: 1,
    };
    let paragraph = Paragraph::new(text).style(style);
    frame.render_widget(paragraph, text_area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 || visible == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "NKKK Cadet Rating - Help",
        "",
        "Global:",
        "  n / t        News / Tasks",
        "  a            Admin panel (administrators)",
        "  l            Sign in / sign out",
        "  b / Esc      Back to rating",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Rating:",
        "  /            Search by name",
        "  j/k or ↑/↓   Move",
        "  PgUp/PgDn    Page",
        "  1-4          Overall / Study / Discipline / Events",
        "  p / g        Cycle platoon / squad",
        "  s            Cycle sort (score, name, rank)",
        "  r            Reload",
        "",
        "Admin:",
        "  Tab          Next section",
        "  c / e / d    Create / edit / delete",
        "  +            Award points to the selected cadet",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Rect {
        Rect::new(1, 3, 40, 10)
    }

    #[test]
    fn row_cut_by_the_top_edge_is_clipped_not_skipped() {
        // Rows of 3 lines scrolled to 7: row 2 spans 6..9, one line hidden.
        let slot = row_slot(viewport(), 2, 3, 7).expect("row 2 is partly visible");
        assert_eq!(slot.skip, 1);
        assert_eq!(slot.area, Rect::new(1, 3, 40, 2));

        let next = row_slot(viewport(), 3, 3, 7).expect("row 3 is visible");
        assert_eq!(next.skip, 0);
        assert_eq!(next.area.y, slot.area.bottom());
    }

    #[test]
    fn rows_fully_outside_the_viewport_are_skipped() {
        assert_eq!(row_slot(viewport(), 1, 3, 7), None);
        assert_eq!(row_slot(viewport(), 1, 3, 6), None);
        // Row 6 starts at 18, the viewport ends at 7 + 10.
        assert_eq!(row_slot(viewport(), 6, 3, 7), None);
    }

    #[test]
    fn row_at_the_bottom_edge_is_cut_to_fit() {
        let slot = row_slot(viewport(), 5, 3, 7).expect("row 5 starts at 15");
        assert_eq!(slot.skip, 0);
        assert_eq!(slot.area, Rect::new(1, 11, 40, 2));
    }

    #[test]
    fn rows_tile_the_viewport_at_any_offset() {
        for scroll_top in 0..30u64 {
            let covered: u16 = (0..20)
                .filter_map(|idx| row_slot(viewport(), idx, 3, scroll_top))
                .map(|slot| slot.area.height)
                .sum();
            assert_eq!(covered, 10, "gap at scroll offset {scroll_top}");
        }
    }
}
