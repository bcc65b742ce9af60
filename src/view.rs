use crate::state::{Game, RatingKind, Section, StateContainer, LOCAL_RECENT_LIMIT};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Newest,
    MostPlayed,
}

impl Default for SortKey {
    fn default() -> Self {
        Self::Name
    }
}

impl SortKey {
    pub const CYCLE: [SortKey; 3] = [SortKey::Name, SortKey::Newest, SortKey::MostPlayed];

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Name => "Name",
            SortKey::Newest => "Newest",
            SortKey::MostPlayed => "Most played",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Some(SortKey::Name),
            "newest" => Some(SortKey::Newest),
            "most-played" | "most_played" | "plays" => Some(SortKey::MostPlayed),
            _ => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortKey::Name => SortKey::Newest,
            SortKey::Newest => SortKey::MostPlayed,
            SortKey::MostPlayed => SortKey::Name,
        }
    }
}

/// Everything the pipeline needs to know about the current selection state.
/// An explicit value object so the derivation stays a pure function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewQuery {
    pub tags: BTreeSet<String>,
    pub search: String,
    pub sort: SortKey,
}

impl ViewQuery {
    pub fn search_active(&self) -> bool {
        !self.search.trim().is_empty()
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return;
        }
        if !self.tags.remove(&tag) {
            self.tags.insert(tag);
        }
    }
}

/// Per-game display facts computed once by the pipeline and consumed
/// uniformly by the render layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DisplayState {
    pub favorited: bool,
    pub rating: Option<RatingKind>,
    pub has_note: bool,
    pub play_count: u64,
    pub liked: bool,
    pub disliked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DerivedView {
    pub recent: Vec<Game>,
    pub sections: Vec<(Section, Vec<Game>)>,
    /// True when a search is active and filtered everything out; lets the
    /// render layer distinguish "no results" from an empty catalog.
    pub no_results: bool,
    pub display: HashMap<String, DisplayState>,
}

impl DerivedView {
    pub fn visible_count(&self) -> usize {
        self.sections.iter().map(|(_, games)| games.len()).sum()
    }

    pub fn display_for(&self, id: &str) -> DisplayState {
        self.display.get(id).copied().unwrap_or_default()
    }
}

/// Pure projection of the container into the sectioned grid: recent mapping,
/// AND tag filter, substring search, stable sort, fixed section order.
pub fn derive_view(state: &StateContainer, query: &ViewQuery, show_recent: bool) -> DerivedView {
    let recent = if show_recent {
        state
            .recent
            .iter()
            .take(LOCAL_RECENT_LIMIT)
            .filter_map(|id| state.game(id).cloned())
            .collect()
    } else {
        Vec::new()
    };

    let mut kept: Vec<&Game> = state
        .catalog
        .iter()
        .filter(|game| matches_tags(game, &query.tags))
        .filter(|game| matches_search(game, &query.search))
        .collect();

    sort_games(&mut kept, query.sort, state);

    let mut sections = Vec::new();
    for section in Section::DISPLAY_ORDER {
        let games: Vec<Game> = kept
            .iter()
            .filter(|game| game.section == section)
            .map(|game| (*game).clone())
            .collect();
        if !games.is_empty() {
            sections.push((section, games));
        }
    }

    let no_results = sections.is_empty() && query.search_active();

    let display = state
        .catalog
        .iter()
        .map(|game| (game.id.clone(), display_state(state, &game.id)))
        .collect();

    DerivedView {
        recent,
        sections,
        no_results,
        display,
    }
}

pub fn display_state(state: &StateContainer, id: &str) -> DisplayState {
    DisplayState {
        favorited: state.favorites.contains(id),
        rating: state.ratings.get(id).copied(),
        has_note: state.notes.contains_key(id),
        play_count: state.stats.counts.get(id).copied().unwrap_or(0),
        liked: state.stats.ratings.like.contains(id),
        disliked: state.stats.ratings.dislike.contains(id),
    }
}

/// AND semantics: every active tag must be present on the game.
fn matches_tags(game: &Game, active: &BTreeSet<String>) -> bool {
    active
        .iter()
        .all(|tag| game.tags.iter().any(|own| own == tag))
}

fn matches_search(game: &Game, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    game.title.to_lowercase().contains(&needle)
        || game.description.to_lowercase().contains(&needle)
        || game
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle))
}

fn sort_games(games: &mut [&Game], sort: SortKey, state: &StateContainer) {
    // sort_by is stable, so catalog order stands in as the final tiebreak.
    match sort {
        SortKey::Name => {
            games.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        }
        SortKey::Newest => {
            games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        SortKey::MostPlayed => {
            games.sort_by(|a, b| {
                let plays_a = state.stats.counts.get(&a.id).copied().unwrap_or(0);
                let plays_b = state.stats.counts.get(&b.id).copied().unwrap_or(0);
                plays_b.cmp(&plays_a)
            });
        }
    }
}
