use crate::{
    limiter::{self, RateLimiter},
    state::{
        push_front_dedup, Game, RatingKind, Report, Section, Settings, StateContainer, Stats,
        UserProfile, GLOBAL_RECENT_LIMIT, LOCAL_RECENT_LIMIT,
    },
    store::Store,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use url::Url;

pub const EXPORT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("game not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("rate limit reached for {0}, try again later")]
    RateLimited(&'static str),
    #[error("could not persist changes: {0}")]
    Persistence(String),
    #[error("import failed: {0}")]
    Import(String),
}

pub type ActionResult<T> = Result<T, ActionError>;

/// Write-through after a mutation. On failure the in-memory change is kept
/// and the divergence from disk is logged, per the single-writer model.
fn persist(state: &StateContainer, store: &Store) -> ActionResult<()> {
    state.save(store).map_err(|err| {
        tracing::error!(%err, "save failed, memory and store have diverged");
        ActionError::Persistence(err.to_string())
    })
}

/// Flip favorite membership. Returns whether the game is now a favorite.
pub fn toggle_favorite(
    state: &mut StateContainer,
    store: &Store,
    id: &str,
) -> ActionResult<bool> {
    if !state.has_game(id) {
        return Err(ActionError::NotFound);
    }
    let now_favorite = if state.favorites.remove(id) {
        false
    } else {
        state.favorites.insert(id.to_string());
        true
    };
    persist(state, store)?;
    Ok(now_favorite)
}

/// Set, switch, or clear the user's rating. Toggle-off: rating the same kind
/// twice removes it. The aggregate sets in stats track the per-user map, so
/// after the call at most one of like/dislike membership holds.
pub fn toggle_rating(
    state: &mut StateContainer,
    limiter: &mut RateLimiter,
    store: &Store,
    id: &str,
    kind: RatingKind,
    now: Instant,
) -> ActionResult<Option<RatingKind>> {
    if !state.has_game(id) {
        return Err(ActionError::NotFound);
    }
    if !limiter.allow(store, &state.profile.nickname, "rating", limiter::RATING_LIMIT, now) {
        return Err(ActionError::RateLimited("rating"));
    }

    let current = state.ratings.get(id).copied();
    let next = if current == Some(kind) {
        state.ratings.remove(id);
        state.stats.ratings.set_mut(kind).remove(id);
        None
    } else {
        state.ratings.insert(id.to_string(), kind);
        state.stats.ratings.set_mut(kind.opposite()).remove(id);
        state.stats.ratings.set_mut(kind).insert(id.to_string());
        Some(kind)
    };
    persist(state, store)?;
    Ok(next)
}

/// Count a play and move the game to the front of both recent lists.
/// Returns the new play count.
pub fn record_play(state: &mut StateContainer, store: &Store, id: &str) -> ActionResult<u64> {
    if !state.has_game(id) {
        return Err(ActionError::NotFound);
    }
    let count = state.stats.counts.entry(id.to_string()).or_insert(0);
    *count += 1;
    let count = *count;
    push_front_dedup(&mut state.recent, id, LOCAL_RECENT_LIMIT);
    push_front_dedup(&mut state.stats.recent, id, GLOBAL_RECENT_LIMIT);
    persist(state, store)?;
    Ok(count)
}

/// Upsert the note for a game; empty trimmed text deletes it.
/// Returns whether a note remains.
pub fn save_note(
    state: &mut StateContainer,
    store: &Store,
    id: &str,
    text: &str,
) -> ActionResult<bool> {
    if !state.has_game(id) {
        return Err(ActionError::NotFound);
    }
    let trimmed = text.trim();
    let present = if trimmed.is_empty() {
        state.notes.remove(id);
        false
    } else {
        state.notes.insert(id.to_string(), trimmed.to_string());
        true
    };
    persist(state, store)?;
    Ok(present)
}

/// Record the most recent report for a game, overwriting any prior one.
pub fn report_game(
    state: &mut StateContainer,
    limiter: &mut RateLimiter,
    store: &Store,
    id: &str,
    reason: &str,
    now: Instant,
) -> ActionResult<()> {
    let Some(game) = state.game(id) else {
        return Err(ActionError::NotFound);
    };
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ActionError::Validation("report reason is required".to_string()));
    }
    if !limiter.allow(store, &state.profile.nickname, "report", limiter::REPORT_LIMIT, now) {
        return Err(ActionError::RateLimited("report"));
    }
    let report = Report {
        reason: reason.to_string(),
        reporter: state.profile.nickname.clone(),
        at: epoch_seconds(),
        url: game.url.clone(),
    };
    state.stats.reports.insert(id.to_string(), report);
    persist(state, store)
}

/// Structured field values from the admin form; the core never sees raw
/// form encoding.
#[derive(Debug, Clone, Default)]
pub struct GameDraft {
    pub id: Option<String>,
    pub title: String,
    pub url: String,
    pub image_url: String,
    pub description: String,
    pub tags: String,
    pub section: Section,
    pub controls: String,
}

/// Create or edit a catalog entry. Edits keep the original id and creation
/// time; new entries get a collision-resistant generated id.
pub fn upsert_game(
    state: &mut StateContainer,
    limiter: &mut RateLimiter,
    store: &Store,
    draft: GameDraft,
    now: Instant,
) -> ActionResult<String> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ActionError::Validation("title is required".to_string()));
    }
    let url = validate_http_url(&draft.url, "game url")?;
    let image_url = match draft.image_url.trim() {
        "" => None,
        raw => Some(validate_http_url(raw, "image url")?),
    };
    if !limiter.allow(store, &state.profile.nickname, "save", limiter::SAVE_LIMIT, now) {
        return Err(ActionError::RateLimited("save"));
    }

    let tags = normalize_tags(&draft.tags);
    let controls = match draft.controls.trim() {
        "" => None,
        raw => Some(raw.to_string()),
    };

    if let Some(id) = draft.id.as_deref() {
        let Some(game) = state.game_mut(id) else {
            return Err(ActionError::NotFound);
        };
        game.title = title.to_string();
        game.url = url;
        game.image_url = image_url;
        game.description = draft.description.trim().to_string();
        game.tags = tags;
        game.section = draft.section;
        game.controls = controls;
        let id = id.to_string();
        persist(state, store)?;
        return Ok(id);
    }

    let id = generate_id(state);
    state.catalog.push(Game {
        id: id.clone(),
        title: title.to_string(),
        url,
        image_url,
        description: draft.description.trim().to_string(),
        tags,
        section: draft.section,
        controls,
        created_at: epoch_seconds(),
    });
    persist(state, store)?;
    Ok(id)
}

/// Remove a game and cascade through every collection that references it.
pub fn delete_game(state: &mut StateContainer, store: &Store, id: &str) -> ActionResult<()> {
    if !state.has_game(id) {
        return Err(ActionError::NotFound);
    }
    state.catalog.retain(|game| game.id != id);
    state.stats.counts.remove(id);
    state.stats.recent.retain(|entry| entry != id);
    state.stats.ratings.like.remove(id);
    state.stats.ratings.dislike.remove(id);
    state.stats.reports.remove(id);
    state.favorites.remove(id);
    state.notes.remove(id);
    state.ratings.remove(id);
    state.recent.retain(|entry| entry != id);
    persist(state, store)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportFile {
    pub version: u32,
    pub exported_at: String,
    pub catalog: Vec<Game>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub favorites: BTreeSet<String>,
    #[serde(default)]
    pub notes: HashMap<String, String>,
    #[serde(default)]
    pub ratings: HashMap<String, RatingKind>,
    #[serde(default)]
    pub recent: Vec<String>,
}

pub fn export_all(state: &StateContainer) -> ExportFile {
    ExportFile {
        version: EXPORT_VERSION,
        exported_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        catalog: state.catalog.clone(),
        settings: state.settings.clone(),
        stats: state.stats.clone(),
        profile: state.profile.clone(),
        favorites: state.favorites.clone(),
        notes: state.notes.clone(),
        ratings: state.ratings.clone(),
        recent: state.recent.clone(),
    }
}

pub fn export_json(state: &StateContainer) -> ActionResult<String> {
    serde_json::to_string_pretty(&export_all(state))
        .map_err(|err| ActionError::Persistence(err.to_string()))
}

/// Replace the whole container from an exported payload. Validation happens
/// before any field is touched, so a bad payload leaves state intact.
pub fn import_all(
    state: &mut StateContainer,
    store: &Store,
    payload: &str,
) -> ActionResult<()> {
    let parsed: ExportFile = serde_json::from_str(payload)
        .map_err(|err| ActionError::Import(format!("malformed payload: {err}")))?;
    if parsed.version > EXPORT_VERSION {
        return Err(ActionError::Import(format!(
            "unsupported export version {}",
            parsed.version
        )));
    }
    for game in &parsed.catalog {
        if game.id.trim().is_empty() {
            return Err(ActionError::Import("catalog entry missing id".to_string()));
        }
    }

    state.catalog = parsed.catalog;
    state.settings = parsed.settings;
    state.stats = parsed.stats;
    state.profile = parsed.profile;
    state.favorites = parsed.favorites;
    state.notes = parsed.notes;
    state.ratings = parsed.ratings;
    state.recent = parsed.recent;
    persist(state, store)
}

fn validate_http_url(raw: &str, field: &str) -> ActionResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ActionError::Validation(format!("{field} is required")));
    }
    let parsed = Url::parse(raw)
        .map_err(|_| ActionError::Validation(format!("{field} is not a valid url")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(ActionError::Validation(format!(
            "{field} must be http(s), got {other}"
        ))),
    }
}

pub fn normalize_tags(raw: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.split(',')
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

fn generate_id(state: &StateContainer) -> String {
    loop {
        let id = format!("g{}-{:04x}", epoch_millis(), rand::random::<u16>());
        if !state.has_game(&id) {
            return id;
        }
    }
}

fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store, StateContainer, RateLimiter) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let mut state = StateContainer::default();
        state.catalog.push(Game {
            id: "pong".to_string(),
            title: "Pong".to_string(),
            url: "https://games.example/pong".to_string(),
            image_url: None,
            description: String::new(),
            tags: vec!["retro".to_string()],
            section: Section::Featured,
            controls: None,
            created_at: 100,
        });
        (dir, store, state, RateLimiter::new())
    }

    #[test]
    fn toggle_favorite_flips_membership() {
        let (_dir, store, mut state, _) = setup();
        assert!(toggle_favorite(&mut state, &store, "pong").unwrap());
        assert!(state.favorites.contains("pong"));
        assert!(!toggle_favorite(&mut state, &store, "pong").unwrap());
        assert!(state.favorites.is_empty());
    }

    #[test]
    fn unknown_game_is_not_found() {
        let (_dir, store, mut state, mut limiter) = setup();
        assert!(matches!(
            toggle_favorite(&mut state, &store, "nope"),
            Err(ActionError::NotFound)
        ));
        assert!(matches!(
            toggle_rating(
                &mut state,
                &mut limiter,
                &store,
                "nope",
                RatingKind::Like,
                Instant::now()
            ),
            Err(ActionError::NotFound)
        ));
    }

    #[test]
    fn rating_same_kind_twice_clears_it() {
        let (_dir, store, mut state, mut limiter) = setup();
        let now = Instant::now();
        let first = toggle_rating(&mut state, &mut limiter, &store, "pong", RatingKind::Like, now)
            .unwrap();
        assert_eq!(first, Some(RatingKind::Like));
        assert!(state.stats.ratings.like.contains("pong"));

        let second =
            toggle_rating(&mut state, &mut limiter, &store, "pong", RatingKind::Like, now)
                .unwrap();
        assert_eq!(second, None);
        assert!(state.ratings.is_empty());
        assert!(!state.stats.ratings.like.contains("pong"));
    }

    #[test]
    fn switching_rating_moves_aggregate_membership() {
        let (_dir, store, mut state, mut limiter) = setup();
        let now = Instant::now();
        toggle_rating(&mut state, &mut limiter, &store, "pong", RatingKind::Like, now).unwrap();
        toggle_rating(&mut state, &mut limiter, &store, "pong", RatingKind::Dislike, now)
            .unwrap();
        assert_eq!(state.ratings.get("pong"), Some(&RatingKind::Dislike));
        assert!(!state.stats.ratings.like.contains("pong"));
        assert!(state.stats.ratings.dislike.contains("pong"));
    }

    #[test]
    fn rating_is_rate_limited_without_consuming_state() {
        let (_dir, store, mut state, mut limiter) = setup();
        let now = Instant::now();
        for _ in 0..limiter::RATING_LIMIT {
            toggle_rating(&mut state, &mut limiter, &store, "pong", RatingKind::Like, now)
                .unwrap();
        }
        let before = state.clone();
        let denied =
            toggle_rating(&mut state, &mut limiter, &store, "pong", RatingKind::Like, now);
        assert!(matches!(denied, Err(ActionError::RateLimited("rating"))));
        assert_eq!(state, before);
    }

    #[test]
    fn record_play_counts_and_moves_to_front() {
        let (_dir, store, mut state, _) = setup();
        state.catalog.push(Game {
            id: "snake".to_string(),
            title: "Snake".to_string(),
            url: "https://games.example/snake".to_string(),
            image_url: None,
            description: String::new(),
            tags: Vec::new(),
            section: Section::Other,
            controls: None,
            created_at: 0,
        });
        assert_eq!(record_play(&mut state, &store, "pong").unwrap(), 1);
        assert_eq!(record_play(&mut state, &store, "snake").unwrap(), 1);
        assert_eq!(record_play(&mut state, &store, "pong").unwrap(), 2);
        assert_eq!(state.recent, vec!["pong", "snake"]);
        assert_eq!(state.stats.recent, vec!["pong", "snake"]);
        assert_eq!(state.stats.counts.get("pong"), Some(&2));
    }

    #[test]
    fn save_note_trims_and_empty_deletes() {
        let (_dir, store, mut state, _) = setup();
        assert!(save_note(&mut state, &store, "pong", "  tricky  ").unwrap());
        assert_eq!(state.notes.get("pong").map(String::as_str), Some("tricky"));
        assert!(!save_note(&mut state, &store, "pong", "   ").unwrap());
        assert!(state.notes.is_empty());
    }

    #[test]
    fn report_overwrites_prior_report() {
        let (_dir, store, mut state, mut limiter) = setup();
        let now = Instant::now();
        report_game(&mut state, &mut limiter, &store, "pong", "broken", now).unwrap();
        report_game(&mut state, &mut limiter, &store, "pong", "worse", now).unwrap();
        assert_eq!(state.stats.reports.len(), 1);
        assert_eq!(state.stats.reports.get("pong").unwrap().reason, "worse");
    }

    #[test]
    fn upsert_rejects_empty_title_and_bad_schemes() {
        let (_dir, store, mut state, mut limiter) = setup();
        let now = Instant::now();
        let blank_title = upsert_game(
            &mut state,
            &mut limiter,
            &store,
            GameDraft {
                url: "https://x.com".to_string(),
                ..GameDraft::default()
            },
            now,
        );
        assert!(matches!(blank_title, Err(ActionError::Validation(_))));

        let bad_scheme = upsert_game(
            &mut state,
            &mut limiter,
            &store,
            GameDraft {
                title: "A".to_string(),
                url: "javascript:alert(1)".to_string(),
                ..GameDraft::default()
            },
            now,
        );
        assert!(matches!(bad_scheme, Err(ActionError::Validation(_))));
        assert_eq!(state.catalog.len(), 1);
    }

    #[test]
    fn upsert_creates_with_generated_id_and_normalized_tags() {
        let (_dir, store, mut state, mut limiter) = setup();
        let id = upsert_game(
            &mut state,
            &mut limiter,
            &store,
            GameDraft {
                title: "Moto X3M".to_string(),
                url: "https://g.example/moto".to_string(),
                tags: " Racing,, bike , RACING ".to_string(),
                section: Section::Sports,
                ..GameDraft::default()
            },
            Instant::now(),
        )
        .unwrap();
        let game = state.game(&id).unwrap();
        assert_eq!(game.tags, vec!["racing", "bike"]);
        assert_eq!(game.section, Section::Sports);
        assert!(game.created_at > 0);
    }

    #[test]
    fn upsert_edit_preserves_id_and_created_at() {
        let (_dir, store, mut state, mut limiter) = setup();
        let id = upsert_game(
            &mut state,
            &mut limiter,
            &store,
            GameDraft {
                id: Some("pong".to_string()),
                title: "Pong Deluxe".to_string(),
                url: "https://games.example/pong2".to_string(),
                ..GameDraft::default()
            },
            Instant::now(),
        )
        .unwrap();
        assert_eq!(id, "pong");
        let game = state.game("pong").unwrap();
        assert_eq!(game.title, "Pong Deluxe");
        assert_eq!(game.created_at, 100);
        assert_eq!(state.catalog.len(), 1);
    }

    #[test]
    fn upsert_save_limit_is_stricter() {
        let (_dir, store, mut state, mut limiter) = setup();
        let now = Instant::now();
        for index in 0..limiter::SAVE_LIMIT {
            upsert_game(
                &mut state,
                &mut limiter,
                &store,
                GameDraft {
                    title: format!("Game {index}"),
                    url: "https://g.example/game".to_string(),
                    ..GameDraft::default()
                },
                now,
            )
            .unwrap();
        }
        let denied = upsert_game(
            &mut state,
            &mut limiter,
            &store,
            GameDraft {
                title: "One more".to_string(),
                url: "https://g.example/more".to_string(),
                ..GameDraft::default()
            },
            now,
        );
        assert!(matches!(denied, Err(ActionError::RateLimited("save"))));
    }

    #[test]
    fn delete_cascades_through_every_collection() {
        let (_dir, store, mut state, mut limiter) = setup();
        let now = Instant::now();
        record_play(&mut state, &store, "pong").unwrap();
        toggle_favorite(&mut state, &store, "pong").unwrap();
        save_note(&mut state, &store, "pong", "note").unwrap();
        toggle_rating(&mut state, &mut limiter, &store, "pong", RatingKind::Like, now).unwrap();
        report_game(&mut state, &mut limiter, &store, "pong", "bad", now).unwrap();

        delete_game(&mut state, &store, "pong").unwrap();
        assert!(state.catalog.is_empty());
        assert!(state.stats.counts.is_empty());
        assert!(state.stats.recent.is_empty());
        assert!(state.stats.ratings.like.is_empty());
        assert!(state.stats.reports.is_empty());
        assert!(state.favorites.is_empty());
        assert!(state.notes.is_empty());
        assert!(state.ratings.is_empty());
        assert!(state.recent.is_empty());

        let view = crate::view::derive_view(&state, &crate::view::ViewQuery::default(), true);
        assert_eq!(view.visible_count(), 0);
        assert!(view.recent.is_empty());
    }

    #[test]
    fn export_import_round_trips_the_container() {
        let (_dir, store, mut state, mut limiter) = setup();
        let now = Instant::now();
        record_play(&mut state, &store, "pong").unwrap();
        toggle_favorite(&mut state, &store, "pong").unwrap();
        toggle_rating(&mut state, &mut limiter, &store, "pong", RatingKind::Dislike, now)
            .unwrap();
        save_note(&mut state, &store, "pong", "note").unwrap();

        let payload = export_json(&state).unwrap();
        let mut fresh = StateContainer::default();
        import_all(&mut fresh, &store, &payload).unwrap();
        assert_eq!(fresh, state);
    }

    #[test]
    fn malformed_import_leaves_state_untouched() {
        let (_dir, store, mut state, _) = setup();
        let before = state.clone();
        let err = import_all(&mut state, &store, "{\"version\": \"not a number\"");
        assert!(matches!(err, Err(ActionError::Import(_))));
        assert_eq!(state, before);

        let future = format!(
            "{{\"version\": {}, \"exported_at\": \"\", \"catalog\": []}}",
            EXPORT_VERSION + 1
        );
        let err = import_all(&mut state, &store, &future);
        assert!(matches!(err, Err(ActionError::Import(_))));
        assert_eq!(state, before);
    }
}
