use crate::{
    actions::GameDraft,
    app::{App, Toast, ToastLevel},
    state::{Game, RatingKind, Section, Theme as ColorTheme},
    update::UpdateStatus,
    view::DisplayState,
};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::{io, time::Duration, time::Instant};

const SIDE_PANEL_WIDTH: u16 = 42;
const POLL_INTERVAL_MS: u64 = 100;

#[derive(Clone)]
struct Theme {
    accent: Color,
    border: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
}

impl Theme {
    fn for_settings(accent_name: &str, mode: ColorTheme) -> Self {
        let accent = match accent_name {
            "ember" => Color::Rgb(240, 140, 90),
            "lime" => Color::Rgb(150, 220, 110),
            "violet" => Color::Rgb(180, 140, 250),
            "rose" => Color::Rgb(240, 120, 170),
            "gold" => Color::Rgb(235, 200, 100),
            _ => Color::Rgb(120, 190, 255),
        };
        match mode {
            ColorTheme::Dark => Self {
                accent,
                border: Color::Rgb(65, 75, 90),
                text: Color::Rgb(220, 230, 240),
                muted: Color::Rgb(135, 145, 155),
                success: Color::Rgb(120, 220, 140),
                warning: Color::Rgb(230, 200, 120),
                error: Color::Rgb(235, 100, 95),
                header_bg: Color::Rgb(22, 28, 36),
            },
            ColorTheme::Light => Self {
                accent,
                border: Color::Rgb(160, 170, 185),
                text: Color::Rgb(30, 38, 48),
                muted: Color::Rgb(110, 120, 130),
                success: Color::Rgb(40, 140, 70),
                warning: Color::Rgb(170, 130, 30),
                error: Color::Rgb(190, 50, 45),
                header_bg: Color::Rgb(235, 240, 245),
            },
        }
    }

    fn block(&self, title: &str) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .title(Span::styled(
                title.to_string(),
                Style::default()
                    .fg(self.accent)
                    .add_modifier(Modifier::BOLD),
            ))
    }

    fn panel(&self, title: &str) -> Block<'static> {
        self.block(title).padding(Padding {
            left: 1,
            right: 1,
            top: 0,
            bottom: 0,
        })
    }
}

#[derive(Clone)]
enum Row {
    Header(String),
    Game(Game),
}

#[derive(Clone)]
struct GameForm {
    editing_id: Option<String>,
    fields: Vec<(&'static str, String)>,
    index: usize,
}

impl GameForm {
    fn new() -> Self {
        Self {
            editing_id: None,
            fields: vec![
                ("Title", String::new()),
                ("URL", String::new()),
                ("Image URL", String::new()),
                ("Tags (comma separated)", String::new()),
                ("Section (featured/recommended/sports/other)", String::new()),
                ("Description", String::new()),
                ("Controls", String::new()),
            ],
            index: 0,
        }
    }

    fn for_game(game: &Game) -> Self {
        let mut form = Self::new();
        form.editing_id = Some(game.id.clone());
        form.fields[0].1 = game.title.clone();
        form.fields[1].1 = game.url.clone();
        form.fields[2].1 = game.image_url.clone().unwrap_or_default();
        form.fields[3].1 = game.tags.join(", ");
        form.fields[4].1 = game.section.label().to_lowercase();
        form.fields[5].1 = game.description.clone();
        form.fields[6].1 = game.controls.clone().unwrap_or_default();
        form
    }

    fn draft(&self) -> GameDraft {
        GameDraft {
            id: self.editing_id.clone(),
            title: self.fields[0].1.clone(),
            url: self.fields[1].1.clone(),
            image_url: self.fields[2].1.clone(),
            tags: self.fields[3].1.clone(),
            section: Section::parse(&self.fields[4].1).unwrap_or_default(),
            description: self.fields[5].1.clone(),
            controls: self.fields[6].1.clone(),
        }
    }
}

enum Mode {
    Normal,
    Search { buffer: String },
    Note { id: String, buffer: String },
    Report { id: String, buffer: String },
    Nickname { buffer: String },
    ImportPath { buffer: String },
    ConfirmImport { path: String },
    ConfirmDelete { id: String, title: String },
    Form(GameForm),
    TagPicker { index: usize },
    Cloaked,
}

struct Ui {
    mode: Mode,
    selected: usize,
    list_state: ListState,
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut ui = Ui {
        mode: Mode::Normal,
        selected: 0,
        list_state: ListState::default(),
    };

    let result = event_loop(&mut terminal, app, &mut ui);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    ui: &mut Ui,
) -> Result<()> {
    loop {
        app.tick(Instant::now());
        let rows = build_rows(app);
        clamp_selection(ui, &rows);
        terminal.draw(|frame| draw(frame, app, ui, &rows))?;

        if !event::poll(Duration::from_millis(POLL_INTERVAL_MS))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if handle_key(app, ui, &rows, key)? {
            return Ok(());
        }
    }
}

fn build_rows(app: &App) -> Vec<Row> {
    let view = app.view();
    let mut rows = Vec::new();
    if !view.recent.is_empty() {
        rows.push(Row::Header("Recent".to_string()));
        for game in &view.recent {
            rows.push(Row::Game(game.clone()));
        }
    }
    for (section, games) in &view.sections {
        rows.push(Row::Header(section.label().to_string()));
        for game in games {
            rows.push(Row::Game(game.clone()));
        }
    }
    rows
}

fn clamp_selection(ui: &mut Ui, rows: &[Row]) {
    if rows.is_empty() {
        ui.selected = 0;
        ui.list_state.select(None);
        return;
    }
    if ui.selected >= rows.len() {
        ui.selected = rows.len() - 1;
    }
    // Never rest on a header.
    if matches!(rows[ui.selected], Row::Header(_)) {
        let next = rows[ui.selected..]
            .iter()
            .position(|row| matches!(row, Row::Game(_)))
            .map(|offset| ui.selected + offset);
        ui.selected = next.unwrap_or(ui.selected);
        if matches!(rows[ui.selected], Row::Header(_)) {
            if let Some(prev) = rows[..ui.selected]
                .iter()
                .rposition(|row| matches!(row, Row::Game(_)))
            {
                ui.selected = prev;
            }
        }
    }
    ui.list_state.select(Some(ui.selected));
}

fn selected_game(ui: &Ui, rows: &[Row]) -> Option<Game> {
    match rows.get(ui.selected) {
        Some(Row::Game(game)) => Some(game.clone()),
        _ => None,
    }
}

fn move_selection(ui: &mut Ui, rows: &[Row], delta: i64) {
    if rows.is_empty() {
        return;
    }
    let mut index = ui.selected as i64;
    loop {
        index += delta;
        if index < 0 || index >= rows.len() as i64 {
            return;
        }
        if matches!(rows[index as usize], Row::Game(_)) {
            ui.selected = index as usize;
            return;
        }
    }
}

/// Returns true when the app should exit.
fn handle_key(app: &mut App, ui: &mut Ui, rows: &[Row], key: KeyEvent) -> Result<bool> {
    // Panic key wins over everything except an active text input.
    if matches!(ui.mode, Mode::Normal) {
        if let KeyCode::Char(ch) = key.code {
            if app.state.settings.panic_key.starts_with(ch) {
                ui.mode = Mode::Cloaked;
                return Ok(false);
            }
        }
    }

    match &mut ui.mode {
        Mode::Cloaked => {
            ui.mode = Mode::Normal;
            Ok(false)
        }
        Mode::Normal => handle_normal_key(app, ui, rows, key),
        Mode::Search { buffer } => {
            match key.code {
                KeyCode::Esc => {
                    app.apply_search_now("");
                    ui.mode = Mode::Normal;
                }
                KeyCode::Enter => {
                    let text = buffer.clone();
                    app.apply_search_now(&text);
                    ui.mode = Mode::Normal;
                }
                KeyCode::Backspace => {
                    buffer.pop();
                    let text = buffer.clone();
                    app.set_search_input(&text);
                }
                KeyCode::Char(ch) => {
                    buffer.push(ch);
                    let text = buffer.clone();
                    app.set_search_input(&text);
                }
                _ => {}
            }
            Ok(false)
        }
        Mode::Note { id, buffer } => {
            match key.code {
                KeyCode::Esc => ui.mode = Mode::Normal,
                KeyCode::Enter => {
                    let (id, text) = (id.clone(), buffer.clone());
                    app.save_note(&id, &text);
                    ui.mode = Mode::Normal;
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(ch) => buffer.push(ch),
                _ => {}
            }
            Ok(false)
        }
        Mode::Report { id, buffer } => {
            match key.code {
                KeyCode::Esc => ui.mode = Mode::Normal,
                KeyCode::Enter => {
                    let (id, reason) = (id.clone(), buffer.clone());
                    app.report_game(&id, &reason);
                    ui.mode = Mode::Normal;
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(ch) => buffer.push(ch),
                _ => {}
            }
            Ok(false)
        }
        Mode::Nickname { buffer } => {
            match key.code {
                KeyCode::Esc => ui.mode = Mode::Normal,
                KeyCode::Enter => {
                    let nickname = buffer.clone();
                    app.set_nickname(&nickname);
                    ui.mode = Mode::Normal;
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(ch) => buffer.push(ch),
                _ => {}
            }
            Ok(false)
        }
        Mode::ImportPath { buffer } => {
            match key.code {
                KeyCode::Esc => ui.mode = Mode::Normal,
                KeyCode::Enter => {
                    let path = buffer.trim().to_string();
                    if path.is_empty() {
                        ui.mode = Mode::Normal;
                    } else if app.config.confirm_import {
                        ui.mode = Mode::ConfirmImport { path };
                    } else {
                        run_import(app, &path);
                        ui.mode = Mode::Normal;
                    }
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(ch) => buffer.push(ch),
                _ => {}
            }
            Ok(false)
        }
        Mode::ConfirmImport { path } => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    let path = path.clone();
                    run_import(app, &path);
                    ui.mode = Mode::Normal;
                }
                KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                    ui.mode = Mode::Normal;
                }
                _ => {}
            }
            Ok(false)
        }
        Mode::ConfirmDelete { id, .. } => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    let id = id.clone();
                    app.delete_game(&id);
                    ui.mode = Mode::Normal;
                }
                KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                    ui.mode = Mode::Normal;
                }
                _ => {}
            }
            Ok(false)
        }
        Mode::Form(form) => {
            match key.code {
                KeyCode::Esc => ui.mode = Mode::Normal,
                KeyCode::Up | KeyCode::BackTab => {
                    form.index = form.index.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Tab => {
                    if form.index + 1 < form.fields.len() {
                        form.index += 1;
                    }
                }
                KeyCode::Backspace => {
                    form.fields[form.index].1.pop();
                }
                KeyCode::Enter => {
                    let draft = form.draft();
                    if app.upsert_game(draft).is_some() {
                        ui.mode = Mode::Normal;
                    }
                }
                KeyCode::Char(ch) => form.fields[form.index].1.push(ch),
                _ => {}
            }
            Ok(false)
        }
        Mode::TagPicker { index } => {
            let tags = app.known_tags();
            match key.code {
                KeyCode::Esc => ui.mode = Mode::Normal,
                KeyCode::Up => *index = index.saturating_sub(1),
                KeyCode::Down => {
                    if *index + 1 < tags.len() {
                        *index += 1;
                    }
                }
                KeyCode::Enter | KeyCode::Char(' ') => {
                    if let Some(tag) = tags.get(*index) {
                        let tag = tag.clone();
                        app.toggle_tag(&tag);
                    }
                }
                _ => {}
            }
            Ok(false)
        }
    }
}

fn handle_normal_key(app: &mut App, ui: &mut Ui, rows: &[Row], key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
        KeyCode::Up | KeyCode::Char('k') => move_selection(ui, rows, -1),
        KeyCode::Down | KeyCode::Char('j') => move_selection(ui, rows, 1),
        KeyCode::Char('/') => {
            ui.mode = Mode::Search {
                buffer: app.query.search.clone(),
            };
        }
        KeyCode::Enter => {
            if let Some(game) = selected_game(ui, rows) {
                app.play(&game.id);
            }
        }
        KeyCode::Esc => app.close_game(),
        KeyCode::Char('f') => {
            if let Some(game) = selected_game(ui, rows) {
                app.toggle_favorite(&game.id);
            }
        }
        KeyCode::Char('l') => {
            if let Some(game) = selected_game(ui, rows) {
                app.toggle_rating(&game.id, RatingKind::Like);
            }
        }
        KeyCode::Char('d') => {
            if let Some(game) = selected_game(ui, rows) {
                app.toggle_rating(&game.id, RatingKind::Dislike);
            }
        }
        KeyCode::Char('n') => {
            if let Some(game) = selected_game(ui, rows) {
                let buffer = app
                    .state
                    .notes
                    .get(&game.id)
                    .cloned()
                    .unwrap_or_default();
                ui.mode = Mode::Note {
                    id: game.id,
                    buffer,
                };
            }
        }
        KeyCode::Char('r') => {
            if let Some(game) = selected_game(ui, rows) {
                ui.mode = Mode::Report {
                    id: game.id,
                    buffer: String::new(),
                };
            }
        }
        KeyCode::Char('a') => ui.mode = Mode::Form(GameForm::new()),
        KeyCode::Char('e') => {
            if let Some(game) = selected_game(ui, rows) {
                ui.mode = Mode::Form(GameForm::for_game(&game));
            }
        }
        KeyCode::Char('x') => {
            if let Some(game) = selected_game(ui, rows) {
                ui.mode = Mode::ConfirmDelete {
                    id: game.id,
                    title: game.title,
                };
            }
        }
        KeyCode::Char('g') => ui.mode = Mode::TagPicker { index: 0 },
        KeyCode::Char('s') => app.cycle_sort(),
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('o') => app.cycle_accent(),
        KeyCode::Char('u') => {
            ui.mode = Mode::Nickname {
                buffer: app.state.profile.nickname.clone(),
            };
        }
        KeyCode::Char('E') => {
            let path = app.data_dir().join("arcadesmith-export.json");
            match app.export_to(&path) {
                Ok(()) => {
                    app.set_toast(
                        &format!("Exported to {}", path.display()),
                        ToastLevel::Success,
                    );
                }
                Err(err) => app.set_toast(&format!("Export failed: {err}"), ToastLevel::Error),
            }
        }
        KeyCode::Char('I') => {
            ui.mode = Mode::ImportPath {
                buffer: String::new(),
            };
        }
        _ => {}
    }
    Ok(false)
}

fn run_import(app: &mut App, path: &str) {
    match app.import_from(std::path::Path::new(path)) {
        Ok(()) => app.set_toast("Import complete", ToastLevel::Success),
        Err(err) => app.set_toast(&format!("{err}"), ToastLevel::Error),
    }
}

fn draw(frame: &mut Frame, app: &App, ui: &mut Ui, rows: &[Row]) {
    let theme = Theme::for_settings(&app.state.settings.accent_name, app.state.settings.theme);

    if matches!(ui.mode, Mode::Cloaked) {
        let block = Paragraph::new(app.state.settings.cloak_title.clone())
            .style(Style::default().fg(theme.muted))
            .alignment(Alignment::Center);
        frame.render_widget(block, frame.size());
        return;
    }

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.size());

    draw_header(frame, app, &theme, outer[0]);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(outer[1]);

    draw_grid(frame, app, ui, rows, &theme, main[0]);
    draw_details(frame, app, ui, rows, &theme, main[1]);
    draw_footer(frame, app, ui, &theme, outer[2]);

    match &ui.mode {
        Mode::ConfirmImport { path } => draw_confirm(
            frame,
            &theme,
            "Replace all local state?",
            &format!("Import {path} and overwrite catalog, favorites, notes and stats? (y/n)"),
        ),
        Mode::ConfirmDelete { title, .. } => draw_confirm(
            frame,
            &theme,
            "Delete game?",
            &format!("Remove \"{title}\" and all of its stats, notes and ratings? (y/n)"),
        ),
        Mode::Form(form) => draw_form(frame, &theme, form),
        Mode::TagPicker { index } => draw_tag_picker(frame, app, &theme, *index),
        _ => {}
    }

    if let Some(toast) = &app.toast {
        draw_toast(frame, &theme, toast);
    }
}

fn draw_header(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let update = match &app.update_status {
        UpdateStatus::Available(version) => format!("  update {version} available"),
        _ => String::new(),
    };
    let line = Line::from(vec![
        Span::styled(
            " arcadesmith ",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(
                "{} {} sort {}{update}",
                app.state.profile.avatar, app.state.profile.nickname,
                app.query.sort.label()
            ),
            Style::default().fg(theme.muted),
        ),
    ]);
    let paragraph = Paragraph::new(line)
        .style(Style::default().bg(theme.header_bg))
        .block(theme.block("Catalog"));
    frame.render_widget(paragraph, area);
}

fn game_line(game: &Game, display: DisplayState, theme: &Theme) -> Line<'static> {
    let mut spans = vec![Span::styled(
        if display.favorited { "* " } else { "  " }.to_string(),
        Style::default().fg(theme.warning),
    )];
    spans.push(Span::styled(
        game.title.clone(),
        Style::default().fg(theme.text),
    ));
    let mut flags = String::new();
    match display.rating {
        Some(RatingKind::Like) => flags.push_str("  +1"),
        Some(RatingKind::Dislike) => flags.push_str("  -1"),
        None => {}
    }
    if display.has_note {
        flags.push_str("  note");
    }
    if display.play_count > 0 {
        flags.push_str(&format!("  plays {}", display.play_count));
    }
    if !flags.is_empty() {
        spans.push(Span::styled(flags, Style::default().fg(theme.muted)));
    }
    Line::from(spans)
}

fn draw_grid(frame: &mut Frame, app: &App, ui: &mut Ui, rows: &[Row], theme: &Theme, area: Rect) {
    if rows.is_empty() {
        let message = if app.view().no_results {
            "No games match your search."
        } else {
            "Catalog is empty. Press 'a' to add a game."
        };
        let paragraph = Paragraph::new(message)
            .style(Style::default().fg(theme.muted))
            .block(theme.panel("Games"));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| match row {
            Row::Header(label) => ListItem::new(Line::from(Span::styled(
                format!("── {label} ──"),
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ))),
            Row::Game(game) => {
                ListItem::new(game_line(game, app.display_state(&game.id), theme))
            }
        })
        .collect();

    let list = List::new(items)
        .block(theme.panel("Games"))
        .highlight_style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut ui.list_state);
}

fn draw_details(
    frame: &mut Frame,
    app: &App,
    ui: &Ui,
    rows: &[Row],
    theme: &Theme,
    area: Rect,
) {
    let mut lines: Vec<Line> = Vec::new();
    if let Some(game) = selected_game(ui, rows) {
        let display = app.display_state(&game.id);
        lines.push(Line::from(Span::styled(
            game.title.clone(),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            game.url.clone(),
            Style::default().fg(theme.muted),
        )));
        lines.push(Line::default());
        if !game.description.is_empty() {
            lines.push(Line::from(game.description.clone()));
            lines.push(Line::default());
        }
        if let Some(controls) = &game.controls {
            lines.push(Line::from(Span::styled(
                format!("Controls: {controls}"),
                Style::default().fg(theme.text),
            )));
        }
        if !game.tags.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("Tags: {}", game.tags.join(", ")),
                Style::default().fg(theme.muted),
            )));
        }
        lines.push(Line::from(Span::styled(
            format!(
                "Plays {}   likes {}   dislikes {}",
                display.play_count,
                if display.liked { 1 } else { 0 },
                if display.disliked { 1 } else { 0 }
            ),
            Style::default().fg(theme.muted),
        )));
        if let Some(note) = app.state.notes.get(&game.id) {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                format!("Note: {note}"),
                Style::default().fg(theme.warning),
            )));
        }
        if let Some(report) = app.state.stats.reports.get(&game.id) {
            lines.push(Line::from(Span::styled(
                format!("Reported: {}", report.reason),
                Style::default().fg(theme.error),
            )));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "Nothing selected",
            Style::default().fg(theme.muted),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(theme.panel("Details"));
    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut Frame, app: &App, ui: &Ui, theme: &Theme, area: Rect) {
    let content = match &ui.mode {
        Mode::Search { buffer } => format!("Search: {buffer}_"),
        Mode::Note { buffer, .. } => format!("Note (Enter saves, empty deletes): {buffer}_"),
        Mode::Report { buffer, .. } => format!("Report reason: {buffer}_"),
        Mode::Nickname { buffer } => format!("Nickname: {buffer}_"),
        Mode::ImportPath { buffer } => format!("Import path: {buffer}_"),
        _ => {
            if app.status.is_empty() {
                "enter play  f fav  l/d rate  n note  g tags  / search  s sort  a add  q quit"
                    .to_string()
            } else {
                format!(
                    "{}  |  enter play  f fav  l/d rate  / search  q quit",
                    app.status
                )
            }
        }
    };
    let paragraph = Paragraph::new(content)
        .style(Style::default().fg(theme.text))
        .block(theme.block("Keys"));
    frame.render_widget(paragraph, area);
}

fn draw_confirm(frame: &mut Frame, theme: &Theme, title: &str, message: &str) {
    let area = centered_rect(frame.size(), 60, 7);
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(message.to_string())
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(theme.text))
        .block(theme.panel(title));
    frame.render_widget(paragraph, area);
}

fn draw_form(frame: &mut Frame, theme: &Theme, form: &GameForm) {
    let area = centered_rect(frame.size(), 70, (form.fields.len() as u16) + 4);
    frame.render_widget(Clear, area);
    let mut lines = Vec::new();
    for (index, (label, value)) in form.fields.iter().enumerate() {
        let style = if index == form.index {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        };
        let cursor = if index == form.index { "_" } else { "" };
        lines.push(Line::from(Span::styled(
            format!("{label}: {value}{cursor}"),
            style,
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Tab/arrows move, Enter saves, Esc cancels",
        Style::default().fg(theme.muted),
    )));
    let title = if form.editing_id.is_some() {
        "Edit game"
    } else {
        "Add game"
    };
    let paragraph = Paragraph::new(lines).block(theme.panel(title));
    frame.render_widget(paragraph, area);
}

fn draw_tag_picker(frame: &mut Frame, app: &App, theme: &Theme, index: usize) {
    let tags = app.known_tags();
    let area = centered_rect(frame.size(), 40, (tags.len().max(1) as u16) + 4);
    frame.render_widget(Clear, area);
    let mut lines = Vec::new();
    if tags.is_empty() {
        lines.push(Line::from(Span::styled(
            "No tags in the catalog yet",
            Style::default().fg(theme.muted),
        )));
    }
    for (position, tag) in tags.iter().enumerate() {
        let active = app.query.tags.contains(tag);
        let marker = if active { "[x]" } else { "[ ]" };
        let style = if position == index {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        };
        lines.push(Line::from(Span::styled(
            format!("{marker} {tag}"),
            style,
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Enter toggles (AND filter), Esc closes",
        Style::default().fg(theme.muted),
    )));
    let paragraph = Paragraph::new(lines).block(theme.panel("Tags"));
    frame.render_widget(paragraph, area);
}

fn draw_toast(frame: &mut Frame, theme: &Theme, toast: &Toast) {
    let color = match toast.level {
        ToastLevel::Info => theme.muted,
        ToastLevel::Success => theme.success,
        ToastLevel::Warning => theme.warning,
        ToastLevel::Error => theme.error,
    };
    let width = (toast.message.len() as u16 + 4).min(frame.size().width.saturating_sub(2));
    let area = Rect {
        x: frame.size().width.saturating_sub(width + 1),
        y: frame.size().height.saturating_sub(4),
        width,
        height: 3,
    };
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(toast.message.clone())
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(paragraph, area);
}

fn centered_rect(outer: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(outer.width);
    let height = height.min(outer.height);
    Rect {
        x: outer.x + (outer.width.saturating_sub(width)) / 2,
        y: outer.y + (outer.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}
