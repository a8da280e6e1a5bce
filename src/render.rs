//! Plain-text rendering of scripts for the terminal front end.

use chrono::{DateTime, Utc};

use crate::backend::query::ListingFilter;
use crate::commands::notice::{Toast, Variant};
use crate::models::Script;
use crate::util::{format_count, format_long_date, time_ago};
use crate::vote::VoteState;

/// Flags shown as badges, in display order.
pub fn badges(script: &Script) -> Vec<&'static str> {
    let mut out = Vec::new();
    if script.works_on_mobile {
        out.push("Mobile");
    }
    if script.has_keysystem {
        out.push("Key System");
    }
    if script.costs_money {
        out.push("Paid");
    }
    out
}

/// Compact card used by the home page and the listing grid.
pub fn card(script: &Script, now: DateTime<Utc>) -> String {
    let thumb = match script.thumbnail() {
        Some(url) => url.to_string(),
        None => format!("[{}]", script.initial()),
    };
    let mut lines = vec![format!("{thumb}  {}", script.title)];

    let mut meta = Vec::new();
    if let Some(tag) = script.primary_tag() {
        meta.push(tag.to_string());
    }
    meta.extend(badges(script).into_iter().map(String::from));
    if !meta.is_empty() {
        lines.push(format!("    {}", meta.join(" · ")));
    }

    lines.push(format!("    {}", script.description));
    lines.push(format!(
        "    ▲ {}  ▼ {}  👁 {}  {}  id:{}",
        format_count(script.upvotes),
        format_count(script.downvotes),
        format_count(script.views),
        time_ago(script.created_at, now),
        script.id
    ));
    lines.join("\n")
}

pub fn grid(scripts: &[Script], now: DateTime<Utc>) -> String {
    scripts
        .iter()
        .map(|s| card(s, now))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// "Found N scripts for "q" in Game".
pub fn listing_summary(count: usize, filter: &ListingFilter, loading: bool) -> String {
    let mut out = if loading {
        "Loading...".to_string()
    } else {
        format!("Found {count} scripts")
    };
    if let Some(search) = filter.search_text() {
        out.push_str(&format!(" for \"{search}\""));
    }
    if let Some(game) = filter.game_tag() {
        out.push_str(&format!(" in {game}"));
    }
    out
}

/// Empty-state text for a listing with no results.
pub fn empty_listing(filter: &ListingFilter) -> String {
    match filter.search_text() {
        Some(search) => format!("No scripts found\nNo scripts match your search for \"{search}\""),
        None => "No scripts found\nNo scripts available for the selected filters".to_string(),
    }
}

/// Full detail page.
pub fn detail(script: &Script, vote: VoteState) -> String {
    let mut out = Vec::new();
    out.push(format!("{}  {}", script.thumbnail().unwrap_or("[no thumbnail]"), script.title));
    out.push(script.description.clone());
    out.push(format!(
        "{} views · {}",
        script.views,
        format_long_date(script.created_at)
    ));
    let badges = badges(script);
    if !badges.is_empty() {
        out.push(badges.join(" · "));
    }

    let mark = |on: bool| if on { "*" } else { " " };
    out.push(format!(
        "[{}▲ {}] [{}▼ {}]",
        mark(vote == VoteState::Upvoted),
        script.upvotes,
        mark(vote == VoteState::Downvoted),
        script.downvotes
    ));

    out.push(String::new());
    out.push("--- Script Code ---".to_string());
    out.push(script.script_content.clone());
    out.push("-------------------".to_string());

    if !script.features.is_empty() {
        out.push(String::new());
        out.push("Features:".to_string());
        out.extend(script.features.iter().map(|f| format!("  • {f}")));
    }
    if !script.tags.is_empty() {
        out.push(String::new());
        out.push(format!("Tags: {}", script.tags.join(", ")));
    }
    if script.script_link.is_some() || script.game_link.is_some() {
        out.push(String::new());
        out.push("External Links:".to_string());
        if let Some(ref link) = script.script_link {
            out.push(format!("  Script Source: {link}"));
        }
        if let Some(ref link) = script.game_link {
            out.push(format!("  Play Game: {link}"));
        }
    }
    out.join("\n")
}

pub fn toast(toast: &Toast) -> String {
    let marker = match toast.variant {
        Variant::Destructive => "✗",
        Variant::Default => "✓",
    };
    format!("{marker} {}: {}", toast.title, toast.description)
}
