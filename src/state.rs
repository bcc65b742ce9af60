use crate::store::Store;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub const LOCAL_RECENT_LIMIT: usize = 10;
pub const GLOBAL_RECENT_LIMIT: usize = 25;

pub mod keys {
    pub const CATALOG: &str = "catalog";
    pub const SETTINGS: &str = "settings";
    pub const STATS: &str = "stats";
    pub const PROFILE: &str = "user-profile";
    pub const FAVORITES: &str = "favorites";
    pub const NOTES: &str = "notes";
    pub const RATINGS: &str = "ratings";
    pub const RECENT: &str = "recent-list";
    pub const LEGACY_GAMES: &str = "games";
    pub const LAST_UPDATE_CHECK: &str = "last-update-check";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Featured,
    Recommended,
    Sports,
    Other,
}

impl Default for Section {
    fn default() -> Self {
        Self::Other
    }
}

impl Section {
    /// Fixed display order for the grid.
    pub const DISPLAY_ORDER: [Section; 4] = [
        Section::Featured,
        Section::Recommended,
        Section::Sports,
        Section::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Section::Featured => "Featured",
            Section::Recommended => "Recommended",
            Section::Sports => "Sports",
            Section::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "featured" => Some(Section::Featured),
            "recommended" => Some(Section::Recommended),
            "sports" => Some(Section::Sports),
            "other" => Some(Section::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub section: Section,
    #[serde(default)]
    pub controls: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Self::Dark
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_accent")]
    pub accent_name: String,
    #[serde(default = "default_cloak_title")]
    pub cloak_title: String,
    #[serde(default)]
    pub cloak_favicon: String,
    #[serde(default = "default_panic_key")]
    pub panic_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            accent_name: default_accent(),
            cloak_title: default_cloak_title(),
            cloak_favicon: String::new(),
            panic_key: default_panic_key(),
        }
    }
}

fn default_accent() -> String {
    "sky".to_string()
}

fn default_cloak_title() -> String {
    "Home".to_string()
}

fn default_panic_key() -> String {
    "`".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RatingKind {
    Like,
    Dislike,
}

impl RatingKind {
    pub fn opposite(self) -> Self {
        match self {
            RatingKind::Like => RatingKind::Dislike,
            RatingKind::Dislike => RatingKind::Like,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingSets {
    #[serde(default)]
    pub like: BTreeSet<String>,
    #[serde(default)]
    pub dislike: BTreeSet<String>,
}

impl RatingSets {
    pub fn set_mut(&mut self, kind: RatingKind) -> &mut BTreeSet<String> {
        match kind {
            RatingKind::Like => &mut self.like,
            RatingKind::Dislike => &mut self.dislike,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub reason: String,
    pub reporter: String,
    pub at: i64,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    #[serde(default)]
    pub counts: HashMap<String, u64>,
    #[serde(default)]
    pub recent: Vec<String>,
    #[serde(default)]
    pub ratings: RatingSets,
    #[serde(default)]
    pub reports: HashMap<String, Report>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_avatar")]
    pub avatar: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            nickname: default_nickname(),
            avatar: default_avatar(),
        }
    }
}

fn default_nickname() -> String {
    "player".to_string()
}

fn default_avatar() -> String {
    "*".to_string()
}

/// In-memory mirror of every persisted collection. Loaded once at startup,
/// written back in full after each mutating action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateContainer {
    pub catalog: Vec<Game>,
    pub settings: Settings,
    pub stats: Stats,
    pub profile: UserProfile,
    pub favorites: BTreeSet<String>,
    pub notes: HashMap<String, String>,
    pub ratings: HashMap<String, RatingKind>,
    pub recent: Vec<String>,
}

impl StateContainer {
    pub fn load(store: &Store) -> Self {
        migrate_legacy_catalog(store);
        Self {
            catalog: store.get(keys::CATALOG, Vec::new()),
            settings: store.get(keys::SETTINGS, Settings::default()),
            stats: store.get(keys::STATS, Stats::default()),
            profile: store.get(keys::PROFILE, UserProfile::default()),
            favorites: store.get(keys::FAVORITES, BTreeSet::new()),
            notes: store.get(keys::NOTES, HashMap::new()),
            ratings: store.get(keys::RATINGS, HashMap::new()),
            recent: store.get(keys::RECENT, Vec::new()),
        }
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        store.set(keys::CATALOG, &self.catalog)?;
        store.set(keys::SETTINGS, &self.settings)?;
        store.set(keys::STATS, &self.stats)?;
        store.set(keys::PROFILE, &self.profile)?;
        store.set(keys::FAVORITES, &self.favorites)?;
        store.set(keys::NOTES, &self.notes)?;
        store.set(keys::RATINGS, &self.ratings)?;
        store.set(keys::RECENT, &self.recent)?;
        Ok(())
    }

    pub fn game(&self, id: &str) -> Option<&Game> {
        self.catalog.iter().find(|game| game.id == id)
    }

    pub fn game_mut(&mut self, id: &str) -> Option<&mut Game> {
        self.catalog.iter_mut().find(|game| game.id == id)
    }

    pub fn has_game(&self, id: &str) -> bool {
        self.game(id).is_some()
    }

    pub fn index_by_id(&self) -> HashMap<String, Game> {
        self.catalog
            .iter()
            .cloned()
            .map(|game| (game.id.clone(), game))
            .collect()
    }
}

/// Move `id` to the front of `list`, dropping any prior occurrence, then cap.
pub fn push_front_dedup(list: &mut Vec<String>, id: &str, cap: usize) {
    list.retain(|entry| entry != id);
    list.insert(0, id.to_string());
    list.truncate(cap);
}

/// Older installs stored a bare array of flat entries under "games": no ids,
/// comma-joined tags, no sections. Converted once, then the key is dropped.
#[derive(Debug, Deserialize)]
struct LegacyGame {
    name: String,
    url: String,
    #[serde(default)]
    img: Option<String>,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    tags: String,
}

fn migrate_legacy_catalog(store: &Store) {
    if store.contains(keys::CATALOG) || !store.contains(keys::LEGACY_GAMES) {
        return;
    }
    let Some(legacy) = store.get_opt::<Vec<LegacyGame>>(keys::LEGACY_GAMES) else {
        tracing::warn!("legacy games key present but unreadable, leaving in place");
        return;
    };
    let catalog: Vec<Game> = legacy
        .into_iter()
        .enumerate()
        .map(|(index, old)| Game {
            id: format!("legacy-{index}-{}", slug(&old.name)),
            title: old.name,
            url: old.url,
            image_url: old.img,
            description: old.desc,
            tags: old
                .tags
                .split(',')
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect(),
            section: Section::Other,
            controls: None,
            created_at: 0,
        })
        .collect();
    match store.set(keys::CATALOG, &catalog) {
        Ok(()) => {
            store.remove(keys::LEGACY_GAMES);
            tracing::info!(count = catalog.len(), "migrated legacy catalog");
        }
        Err(err) => tracing::warn!(%err, "legacy catalog migration failed"),
    }
}

fn slug(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub fn sample_game(id: &str, title: &str) -> Game {
        Game {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://games.example/{id}"),
            image_url: None,
            description: String::new(),
            tags: Vec::new(),
            section: Section::Other,
            controls: None,
            created_at: 0,
        }
    }

    #[test]
    fn load_substitutes_defaults_for_missing_keys() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let state = StateContainer::load(&store);
        assert!(state.catalog.is_empty());
        assert_eq!(state.profile.nickname, "player");
        assert_eq!(state.settings.theme, Theme::Dark);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let mut state = StateContainer::load(&store);
        state.catalog.push(sample_game("pong", "Pong"));
        state.favorites.insert("pong".to_string());
        state.notes.insert("pong".to_string(), "classic".to_string());
        state.save(&store).unwrap();

        let reloaded = StateContainer::load(&store);
        assert_eq!(reloaded, state);
    }

    #[test]
    fn push_front_dedup_moves_existing_to_front() {
        let mut list = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        push_front_dedup(&mut list, "c", 10);
        assert_eq!(list, vec!["c", "a", "b"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn push_front_dedup_respects_cap() {
        let mut list: Vec<String> = (0..LOCAL_RECENT_LIMIT).map(|i| i.to_string()).collect();
        push_front_dedup(&mut list, "fresh", LOCAL_RECENT_LIMIT);
        assert_eq!(list.len(), LOCAL_RECENT_LIMIT);
        assert_eq!(list[0], "fresh");
    }

    #[test]
    fn legacy_catalog_migrates_once() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        std::fs::write(
            dir.path().join("games.json"),
            r#"[{"name":"Moto X3M","url":"https://g.example/moto","tags":"Racing, Bike"}]"#,
        )
        .unwrap();

        let state = StateContainer::load(&store);
        assert_eq!(state.catalog.len(), 1);
        let game = &state.catalog[0];
        assert_eq!(game.title, "Moto X3M");
        assert_eq!(game.tags, vec!["racing", "bike"]);
        assert_eq!(game.section, Section::Other);
        assert!(!store.contains(keys::LEGACY_GAMES));
    }
}
