use crate::{
    actions::{self, ActionError, GameDraft},
    config::{self, AppConfig},
    limiter::RateLimiter,
    state::{RatingKind, StateContainer, Theme},
    store::Store,
    update::{self, UpdateStatus},
    view::{self, DerivedView, DisplayState, ViewQuery},
};
use anyhow::{Context, Result};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

pub const SEARCH_DEBOUNCE_MS: u64 = 250;
pub const TOAST_DURATION_MS: u64 = 2500;

pub const ACCENT_NAMES: [&str; 6] = ["sky", "ember", "lime", "violet", "rose", "gold"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub created_at: Instant,
    pub duration: Duration,
}

/// Composition root. Owns every stateful collaborator and is the single
/// writer; the render layer only reads the derived view through accessors.
pub struct App {
    pub config: AppConfig,
    data_dir: PathBuf,
    store: Store,
    pub state: StateContainer,
    limiter: RateLimiter,
    pub query: ViewQuery,
    view: DerivedView,
    pub toast: Option<Toast>,
    pub status: String,
    pub open_game: Option<String>,
    pub update_status: UpdateStatus,
    pending_search: Option<(String, Instant)>,
}

impl App {
    pub fn initialize() -> Result<Self> {
        let data_dir = config::base_data_dir()?;
        let mut app = Self::open(&data_dir)?;
        if app.config.check_updates {
            app.update_status = update::maybe_check(&app.store, env!("CARGO_PKG_VERSION"));
        }
        Ok(app)
    }

    /// Build against an explicit data dir; used by headless commands and
    /// tests (fresh instance per test, no ambient globals).
    pub fn open(data_dir: &Path) -> Result<Self> {
        let config = AppConfig::load_or_create(data_dir)
            .context("load app config (run with a writable data dir)")?;
        let store = Store::open(&config::store_dir(data_dir)).context("open store")?;
        let state = StateContainer::load(&store);
        let mut app = Self {
            config,
            data_dir: data_dir.to_path_buf(),
            store,
            state,
            limiter: RateLimiter::new(),
            query: ViewQuery::default(),
            view: DerivedView::default(),
            toast: None,
            status: String::new(),
            open_game: None,
            update_status: UpdateStatus::Idle,
            pending_search: None,
        };
        app.rederive();
        app.status = format!(
            "{} game(s) loaded",
            app.state.catalog.len()
        );
        Ok(app)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Recompute the derived view. Called after load and after every
    /// mutating action; the render layer redraws from the result.
    pub fn rederive(&mut self) {
        self.view = view::derive_view(&self.state, &self.query, self.config.show_recent_section);
    }

    pub fn view(&self) -> &DerivedView {
        &self.view
    }

    pub fn display_state(&self, id: &str) -> DisplayState {
        self.view.display_for(id)
    }

    pub fn known_tags(&self) -> Vec<String> {
        let mut tags: BTreeSet<String> = BTreeSet::new();
        for game in &self.state.catalog {
            for tag in &game.tags {
                tags.insert(tag.clone());
            }
        }
        tags.into_iter().collect()
    }

    pub fn set_toast(&mut self, message: &str, level: ToastLevel) {
        self.toast = Some(Toast {
            message: message.to_string(),
            level,
            created_at: Instant::now(),
            duration: Duration::from_millis(TOAST_DURATION_MS),
        });
    }

    fn notify_err(&mut self, err: ActionError) {
        let level = match err {
            ActionError::RateLimited(_) => ToastLevel::Warning,
            ActionError::NotFound | ActionError::Validation(_) => ToastLevel::Warning,
            ActionError::Persistence(_) | ActionError::Import(_) => ToastLevel::Error,
        };
        self.set_toast(&err.to_string(), level);
    }

    /// Periodic housekeeping: debounced search, toast expiry, limiter decay.
    pub fn tick(&mut self, now: Instant) {
        let search_due = matches!(
            &self.pending_search,
            Some((_, at)) if now.duration_since(*at) >= Duration::from_millis(SEARCH_DEBOUNCE_MS)
        );
        if search_due {
            if let Some((text, _)) = self.pending_search.take() {
                self.query.search = text;
                self.rederive();
            }
        }
        if let Some(toast) = &self.toast {
            if now.duration_since(toast.created_at) >= toast.duration {
                self.toast = None;
            }
        }
        self.limiter.poll(&self.store, now);
    }

    /// A fresh keystroke reschedules the pending evaluation, so the pipeline
    /// runs at most once per debounce window.
    pub fn set_search_input(&mut self, text: &str) {
        self.pending_search = Some((text.to_string(), Instant::now()));
    }

    pub fn apply_search_now(&mut self, text: &str) {
        self.pending_search = None;
        self.query.search = text.to_string();
        self.rederive();
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        self.query.toggle_tag(tag);
        self.rederive();
        self.status = if self.query.tags.is_empty() {
            "Tag filter cleared".to_string()
        } else {
            format!("Tags: {}", join_tags(&self.query.tags))
        };
    }

    pub fn cycle_sort(&mut self) {
        self.query.sort = self.query.sort.next();
        self.rederive();
        self.status = format!("Sort: {}", self.query.sort.label());
    }

    pub fn toggle_favorite(&mut self, id: &str) {
        match actions::toggle_favorite(&mut self.state, &self.store, id) {
            Ok(true) => self.set_toast("Added to favorites", ToastLevel::Success),
            Ok(false) => self.set_toast("Removed from favorites", ToastLevel::Info),
            Err(err) => self.notify_err(err),
        }
        self.rederive();
    }

    pub fn toggle_rating(&mut self, id: &str, kind: RatingKind) {
        let result = actions::toggle_rating(
            &mut self.state,
            &mut self.limiter,
            &self.store,
            id,
            kind,
            Instant::now(),
        );
        match result {
            Ok(Some(RatingKind::Like)) => self.set_toast("Liked", ToastLevel::Success),
            Ok(Some(RatingKind::Dislike)) => self.set_toast("Disliked", ToastLevel::Info),
            Ok(None) => self.set_toast("Rating cleared", ToastLevel::Info),
            Err(err) => self.notify_err(err),
        }
        self.rederive();
    }

    /// Opening a game records the play and tracks the open pointer.
    pub fn play(&mut self, id: &str) {
        match actions::record_play(&mut self.state, &self.store, id) {
            Ok(count) => {
                self.open_game = Some(id.to_string());
                self.status = format!("Playing ({count} total plays)");
            }
            Err(err) => self.notify_err(err),
        }
        self.rederive();
    }

    pub fn close_game(&mut self) {
        self.open_game = None;
    }

    pub fn save_note(&mut self, id: &str, text: &str) {
        match actions::save_note(&mut self.state, &self.store, id, text) {
            Ok(true) => self.set_toast("Note saved", ToastLevel::Success),
            Ok(false) => self.set_toast("Note removed", ToastLevel::Info),
            Err(err) => self.notify_err(err),
        }
        self.rederive();
    }

    pub fn report_game(&mut self, id: &str, reason: &str) {
        let result = actions::report_game(
            &mut self.state,
            &mut self.limiter,
            &self.store,
            id,
            reason,
            Instant::now(),
        );
        match result {
            Ok(()) => self.set_toast("Report recorded", ToastLevel::Success),
            Err(err) => self.notify_err(err),
        }
        self.rederive();
    }

    pub fn upsert_game(&mut self, draft: GameDraft) -> Option<String> {
        let result = actions::upsert_game(
            &mut self.state,
            &mut self.limiter,
            &self.store,
            draft,
            Instant::now(),
        );
        match result {
            Ok(id) => {
                self.set_toast("Game saved", ToastLevel::Success);
                self.rederive();
                Some(id)
            }
            Err(err) => {
                self.notify_err(err);
                self.rederive();
                None
            }
        }
    }

    pub fn delete_game(&mut self, id: &str) {
        match actions::delete_game(&mut self.state, &self.store, id) {
            Ok(()) => self.set_toast("Game deleted", ToastLevel::Info),
            Err(err) => self.notify_err(err),
        }
        if self.open_game.as_deref() == Some(id) {
            self.open_game = None;
        }
        self.rederive();
    }

    pub fn export_to(&self, path: &Path) -> Result<()> {
        let payload = actions::export_json(&self.state)
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
        fs::write(path, payload).with_context(|| format!("write export {:?}", path))?;
        Ok(())
    }

    /// Destructive: caller must have confirmed with the user first.
    pub fn import_from(&mut self, path: &Path) -> Result<()> {
        let payload =
            fs::read_to_string(path).with_context(|| format!("read import {:?}", path))?;
        actions::import_all(&mut self.state, &self.store, &payload)
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
        self.rederive();
        Ok(())
    }

    pub fn toggle_theme(&mut self) {
        self.state.settings.theme = match self.state.settings.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.persist_settings("Theme");
    }

    pub fn cycle_accent(&mut self) {
        let current = ACCENT_NAMES
            .iter()
            .position(|name| *name == self.state.settings.accent_name)
            .unwrap_or(0);
        let next = ACCENT_NAMES[(current + 1) % ACCENT_NAMES.len()];
        self.state.settings.accent_name = next.to_string();
        self.persist_settings("Accent");
    }

    pub fn set_nickname(&mut self, nickname: &str) {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            self.set_toast("Nickname cannot be empty", ToastLevel::Warning);
            return;
        }
        self.state.profile.nickname = nickname.to_string();
        self.persist_settings("Nickname");
    }

    fn persist_settings(&mut self, what: &str) {
        match self.state.save(&self.store) {
            Ok(()) => self.status = format!("{what} updated"),
            Err(err) => {
                tracing::error!(%err, "settings save failed");
                self.set_toast("Could not persist settings", ToastLevel::Error);
            }
        }
        self.rederive();
    }
}

fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().cloned().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Section;
    use tempfile::TempDir;

    fn app_with_game() -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        let mut app = App::open(dir.path()).unwrap();
        app.upsert_game(GameDraft {
            title: "Pong".to_string(),
            url: "https://games.example/pong".to_string(),
            tags: "retro".to_string(),
            section: Section::Featured,
            ..GameDraft::default()
        })
        .unwrap();
        (dir, app)
    }

    #[test]
    fn open_starts_from_persisted_state() {
        let (dir, app) = app_with_game();
        let id = app.state.catalog[0].id.clone();
        drop(app);

        let reopened = App::open(dir.path()).unwrap();
        assert_eq!(reopened.state.catalog.len(), 1);
        assert_eq!(reopened.state.catalog[0].id, id);
        assert_eq!(reopened.view().visible_count(), 1);
    }

    #[test]
    fn search_is_debounced_until_tick() {
        let (_dir, mut app) = app_with_game();
        app.set_search_input("zzz");
        assert_eq!(app.view().visible_count(), 1);

        app.tick(Instant::now() + Duration::from_millis(SEARCH_DEBOUNCE_MS + 10));
        assert_eq!(app.view().visible_count(), 0);
        assert!(app.view().no_results);
    }

    #[test]
    fn newer_keystroke_reschedules_pending_search() {
        let (_dir, mut app) = app_with_game();
        app.set_search_input("zzz");
        app.set_search_input("pong");
        app.tick(Instant::now() + Duration::from_millis(SEARCH_DEBOUNCE_MS + 10));
        assert_eq!(app.view().visible_count(), 1);
    }

    #[test]
    fn play_sets_open_pointer_and_close_clears_it() {
        let (_dir, mut app) = app_with_game();
        let id = app.state.catalog[0].id.clone();
        app.play(&id);
        assert_eq!(app.open_game.as_deref(), Some(id.as_str()));
        assert_eq!(app.view().recent.len(), 1);
        app.close_game();
        assert!(app.open_game.is_none());
    }

    #[test]
    fn failed_action_surfaces_a_toast() {
        let (_dir, mut app) = app_with_game();
        app.toggle_favorite("missing");
        let toast = app.toast.as_ref().expect("toast");
        assert_eq!(toast.level, ToastLevel::Warning);
    }

    #[test]
    fn toast_expires_on_tick() {
        let (_dir, mut app) = app_with_game();
        app.set_toast("hello", ToastLevel::Info);
        app.tick(Instant::now() + Duration::from_millis(TOAST_DURATION_MS + 10));
        assert!(app.toast.is_none());
    }

    #[test]
    fn export_import_round_trip_via_files() {
        let (_dir, mut app) = app_with_game();
        let id = app.state.catalog[0].id.clone();
        app.toggle_favorite(&id);
        app.play(&id);

        let out = TempDir::new().unwrap();
        let path = out.path().join("backup.json");
        app.export_to(&path).unwrap();

        let fresh_dir = TempDir::new().unwrap();
        let mut fresh = App::open(fresh_dir.path()).unwrap();
        fresh.import_from(&path).unwrap();
        assert_eq!(fresh.state, app.state);
        assert_eq!(fresh.view().visible_count(), 1);
    }

    #[test]
    fn accent_cycles_through_palette() {
        let (_dir, mut app) = app_with_game();
        let first = app.state.settings.accent_name.clone();
        for _ in 0..ACCENT_NAMES.len() {
            app.cycle_accent();
        }
        assert_eq!(app.state.settings.accent_name, first);
    }
}
