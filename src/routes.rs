use percent_encoding::percent_decode_str;
use reqwest::Url;
use serde::Serialize;

use crate::backend::query::{ListingFilter, SortKey, ALL_GAMES};
use crate::error::{AppError, Result};

/// Base used to parse app-relative paths such as `/scripts?search=x`.
const APP_BASE: &str = "app://roboscript.local/";

/// Pages of the app. The listing filter lives in the query string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "page")]
pub enum Route {
    Home,
    Scripts { filter: ListingFilter },
    Script { id: String },
    Upload,
}

impl Route {
    pub fn parse(path: &str) -> Result<Route> {
        let base = Url::parse(APP_BASE).map_err(|e| AppError::Custom(e.to_string()))?;
        let url = base
            .join(path.trim())
            .map_err(|e| AppError::Validation(format!("Invalid route {path}: {e}")))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [] => Ok(Route::Home),
            ["scripts"] | ["popular"] => {
                let mut filter = ListingFilter::default();
                if segments[0] == "popular" {
                    filter.sort = SortKey::Popular;
                }
                for (key, value) in url.query_pairs() {
                    match key.as_ref() {
                        "search" => filter.search = value.to_string(),
                        "game" => filter.game = value.to_string(),
                        "sort" => filter.sort = SortKey::parse(&value),
                        _ => {}
                    }
                }
                Ok(Route::Scripts { filter })
            }
            ["scripts", id] | ["script", id] => {
                let id = percent_decode_str(id).decode_utf8().map_err(|e| {
                    AppError::Validation(format!("Invalid script id in {path}: {e}"))
                })?;
                Ok(Route::Script { id: id.into_owned() })
            }
            ["upload"] => Ok(Route::Upload),
            _ => Err(AppError::NotFound(format!("No page at {path}"))),
        }
    }

    /// Listing route with the filter mirrored into the query string.
    /// Defaults are left out, so the bare listing is `/scripts`.
    pub fn scripts(filter: &ListingFilter) -> Route {
        Route::Scripts {
            filter: filter.clone(),
        }
    }

    pub fn to_path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Upload => "/upload".to_string(),
            Route::Script { id } => {
                let mut url = match Url::parse(APP_BASE) {
                    Ok(url) => url,
                    Err(_) => return format!("/script/{id}"),
                };
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.clear().push("script").push(id);
                }
                url.path().to_string()
            }
            Route::Scripts { filter } => {
                let mut url = match Url::parse(APP_BASE).and_then(|b| b.join("scripts")) {
                    Ok(url) => url,
                    Err(_) => return "/scripts".to_string(),
                };
                {
                    let mut pairs = url.query_pairs_mut();
                    if let Some(search) = filter.search_text() {
                        pairs.append_pair("search", search);
                    }
                    if filter.game.trim() != ALL_GAMES && !filter.game.trim().is_empty() {
                        pairs.append_pair("game", filter.game.trim());
                    }
                    if filter.sort != SortKey::Newest {
                        pairs.append_pair("sort", filter.sort.as_str());
                    }
                }
                match url.query() {
                    Some(q) if !q.is_empty() => format!("/scripts?{q}"),
                    _ => "/scripts".to_string(),
                }
            }
        }
    }
}
