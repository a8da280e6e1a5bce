//! Showcase catalog and the offline demo backend.

use chrono::{Duration, Utc};

use crate::backend::MemoryBackend;
use crate::models::Script;

pub const DEMO_EMAIL: &str = "demo@roboscript.dev";
pub const DEMO_PASSWORD: &str = "roboscript";

#[allow(clippy::too_many_arguments)]
fn sample(
    id: &str,
    title: &str,
    description: &str,
    upvotes: u64,
    downvotes: u64,
    views: u64,
    features: &[&str],
    tags: &[&str],
    flags: (bool, bool, bool),
    hours_ago: i64,
) -> Script {
    let (works_on_mobile, has_keysystem, costs_money) = flags;
    Script {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        script_content: format!("-- {title}\nprint(\"{title} loaded\")"),
        script_link: None,
        game_link: None,
        thumbnail_url: None,
        custom_thumbnail_url: None,
        features: features.iter().map(|s| s.to_string()).collect(),
        tags: tags.iter().map(|s| s.to_string()).collect(),
        works_on_mobile,
        has_keysystem,
        costs_money,
        upvotes,
        downvotes,
        views,
        created_by: None,
        created_at: Utc::now() - Duration::hours(hours_ago),
    }
}

/// What the home page shows before the backend answers.
pub fn showcase() -> Vec<Script> {
    vec![
        sample(
            "1",
            "Blox Fruits Auto Farm",
            "Advanced auto farming script with multiple features including fruit collection, level grinding, and boss farming capabilities.",
            1234,
            45,
            15678,
            &["Auto Farm", "Boss Farm", "Fruit Farm"],
            &["Blox Fruits", "Farming"],
            (true, false, false),
            1,
        ),
        sample(
            "2",
            "Arsenal Aimbot",
            "Precise aimbot script for Arsenal with customizable settings and ESP features.",
            892,
            23,
            12456,
            &["Aimbot", "ESP", "Silent Aim"],
            &["Arsenal", "Combat"],
            (false, true, false),
            2,
        ),
        sample(
            "3",
            "Adopt Me Auto Trade",
            "Automated trading system for Adopt Me with profit calculations and scam protection.",
            567,
            12,
            8934,
            &["Auto Trade", "Profit Calc", "Scam Protection"],
            &["Adopt Me", "Trading"],
            (true, false, true),
            3,
        ),
    ]
}

/// In-process backend seeded with the showcase and a demo account.
pub fn demo_backend() -> MemoryBackend {
    let backend = MemoryBackend::with_scripts(showcase());
    backend.add_account(DEMO_EMAIL, DEMO_PASSWORD, Some("demo"));
    backend
}
