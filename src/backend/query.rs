use serde::{Deserialize, Serialize};

use crate::models::Script;

/// Sentinel game filter value meaning "every game".
pub const ALL_GAMES: &str = "all";

/// Games offered in the listing's game filter.
pub const POPULAR_GAMES: [&str; 8] = [
    "Blox Fruits",
    "Adopt Me",
    "Arsenal",
    "Murder Mystery 2",
    "Jailbreak",
    "Tower of Hell",
    "Brookhaven",
    "Pet Simulator X",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Newest,
    Popular,
    #[serde(rename = "views", alias = "most-viewed")]
    MostViewed,
}

impl SortKey {
    /// Wire name, also used in route query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Popular => "popular",
            SortKey::MostViewed => "views",
        }
    }

    /// Unknown keys fall back to newest.
    pub fn parse(s: &str) -> SortKey {
        match s.trim() {
            "popular" => SortKey::Popular,
            "views" | "most-viewed" => SortKey::MostViewed,
            _ => SortKey::Newest,
        }
    }

    pub fn column(&self) -> Column {
        match self {
            SortKey::Newest => Column::CreatedAt,
            SortKey::Popular => Column::Upvotes,
            SortKey::MostViewed => Column::Views,
        }
    }
}

/// Orderable columns of the `scripts` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    CreatedAt,
    Upvotes,
    Views,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::CreatedAt => "created_at",
            Column::Upvotes => "upvotes",
            Column::Views => "views",
        }
    }
}

/// What the listing page asks for: search text, game tag and sort order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    pub search: String,
    pub game: String,
    pub sort: SortKey,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            game: ALL_GAMES.to_string(),
            sort: SortKey::Newest,
        }
    }
}

impl ListingFilter {
    pub fn search_text(&self) -> Option<&str> {
        let s = self.search.trim();
        (!s.is_empty()).then_some(s)
    }

    pub fn game_tag(&self) -> Option<&str> {
        let g = self.game.trim();
        (!g.is_empty() && g != ALL_GAMES).then_some(g)
    }
}

/// A declarative select over the `scripts` table.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptQuery {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub order_by: Column,
    pub ascending: bool,
    pub limit: Option<usize>,
}

impl Default for ScriptQuery {
    fn default() -> Self {
        Self {
            search: None,
            tag: None,
            order_by: Column::CreatedAt,
            ascending: false,
            limit: None,
        }
    }
}

impl From<&ListingFilter> for ScriptQuery {
    fn from(filter: &ListingFilter) -> Self {
        ScriptQuery {
            search: filter.search_text().map(str::to_string),
            tag: filter.game_tag().map(str::to_string),
            order_by: filter.sort.column(),
            ascending: false,
            limit: None,
        }
    }
}

impl ScriptQuery {
    /// Newest rows first, capped at `limit`.
    pub fn recent(limit: usize) -> Self {
        ScriptQuery {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Query string pairs in PostgREST syntax.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];

        if let Some(ref text) = self.search {
            let pattern = quote_value(&format!("*{text}*"));
            params.push((
                "or".into(),
                format!(
                    "(title.ilike.{pattern},description.ilike.{pattern},tags.cs.{})",
                    array_literal(text)
                ),
            ));
        }
        if let Some(ref tag) = self.tag {
            params.push(("tags".into(), format!("cs.{}", array_literal(tag))));
        }

        let direction = if self.ascending { "asc" } else { "desc" };
        params.push((
            "order".into(),
            format!("{}.{direction}", self.order_by.as_str()),
        ));
        if let Some(limit) = self.limit {
            params.push(("limit".into(), limit.to_string()));
        }
        params
    }

    /// Row predicate with the same meaning as the rendered filters.
    ///
    /// Search is a case-insensitive substring match on title or description,
    /// or a case-insensitive whole-tag match. The game tag must be present exactly.
    pub fn matches(&self, script: &Script) -> bool {
        if let Some(ref text) = self.search {
            let needle = text.to_lowercase();
            let hit = script.title.to_lowercase().contains(&needle)
                || script.description.to_lowercase().contains(&needle)
                || script.tags.iter().any(|t| t.to_lowercase() == needle);
            if !hit {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !script.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }

    /// Sort in place. The sort is stable, so ties keep natural row order.
    pub fn sort(&self, scripts: &mut [Script]) {
        let ascending = self.ascending;
        match self.order_by {
            Column::CreatedAt => {
                scripts.sort_by(|a, b| directed(a.created_at.cmp(&b.created_at), ascending))
            }
            Column::Upvotes => {
                scripts.sort_by(|a, b| directed(a.upvotes.cmp(&b.upvotes), ascending))
            }
            Column::Views => scripts.sort_by(|a, b| directed(a.views.cmp(&b.views), ascending)),
        }
    }
}

fn directed(ord: std::cmp::Ordering, ascending: bool) -> std::cmp::Ordering {
    if ascending {
        ord
    } else {
        ord.reverse()
    }
}

// PostgREST reserves these inside filter values and logic trees.
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\', '{', '}'];

/// Double-quote a filter value if it contains reserved characters.
pub fn quote_value(value: &str) -> String {
    if value.contains(RESERVED) {
        format!("\"{}\"", escape(value))
    } else {
        value.to_string()
    }
}

/// One-element Postgres array literal with the element always quoted.
pub fn array_literal(value: &str) -> String {
    format!("{{\"{}\"}}", escape(value))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::script;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_default_listing_is_newest_without_filters() {
        let query = ScriptQuery::from(&ListingFilter::default());
        let params = query.to_params();
        assert_eq!(param(&params, "order"), Some("created_at.desc"));
        assert_eq!(param(&params, "or"), None);
        assert_eq!(param(&params, "tags"), None);
        assert_eq!(param(&params, "limit"), None);
    }

    #[test]
    fn test_search_renders_or_across_three_fields() {
        let filter = ListingFilter {
            search: "  Arsenal ".into(),
            ..Default::default()
        };
        let params = ScriptQuery::from(&filter).to_params();
        assert_eq!(
            param(&params, "or"),
            Some("(title.ilike.*Arsenal*,description.ilike.*Arsenal*,tags.cs.{\"Arsenal\"})")
        );
    }

    #[test]
    fn test_reserved_characters_are_quoted() {
        let query = ScriptQuery {
            search: Some("v2.0, (beta)".into()),
            ..Default::default()
        };
        let params = query.to_params();
        assert_eq!(
            param(&params, "or"),
            Some(concat!(
                r#"(title.ilike."*v2.0, (beta)*",description.ilike."*v2.0, (beta)*","#,
                r#"tags.cs.{"v2.0, (beta)"})"#
            ))
        );
    }

    #[test]
    fn test_search_tag_case_is_kept_for_hosted_and_folded_in_memory() {
        let query = ScriptQuery {
            search: Some("arsenal".into()),
            ..Default::default()
        };
        // PostgREST `cs` compares array elements exactly.
        assert!(param(&query.to_params(), "or")
            .unwrap()
            .ends_with(r#"tags.cs.{"arsenal"})"#));
        assert!(query.matches(&script("1", "Silent aim", &["Arsenal"], 0, 0, 1)));
        assert!(!query.matches(&script("2", "Silent aim", &["Arsenal Remake"], 0, 0, 1)));
    }

    #[test]
    fn test_game_filter_and_sort_keys() {
        let filter = ListingFilter {
            game: "Blox Fruits".into(),
            sort: SortKey::MostViewed,
            ..Default::default()
        };
        let params = ScriptQuery::from(&filter).to_params();
        assert_eq!(param(&params, "tags"), Some("cs.{\"Blox Fruits\"}"));
        assert_eq!(param(&params, "order"), Some("views.desc"));

        let all = ListingFilter {
            game: ALL_GAMES.into(),
            sort: SortKey::Popular,
            ..Default::default()
        };
        let params = ScriptQuery::from(&all).to_params();
        assert_eq!(param(&params, "tags"), None);
        assert_eq!(param(&params, "order"), Some("upvotes.desc"));
    }

    #[test]
    fn test_recent_has_limit() {
        let params = ScriptQuery::recent(6).to_params();
        assert_eq!(param(&params, "limit"), Some("6"));
        assert_eq!(param(&params, "order"), Some("created_at.desc"));
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("popular"), SortKey::Popular);
        assert_eq!(SortKey::parse("most-viewed"), SortKey::MostViewed);
        assert_eq!(SortKey::parse("views"), SortKey::MostViewed);
        assert_eq!(SortKey::parse("oldest"), SortKey::Newest);
        let parsed: SortKey = serde_json::from_str("\"most-viewed\"").unwrap();
        assert_eq!(parsed, SortKey::MostViewed);
    }
}
