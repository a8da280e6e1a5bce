pub mod backend;
pub mod cli;
pub mod commands;
pub mod demo;
pub mod error;
pub mod models;
pub mod render;
pub mod repository;
pub mod routes;
pub mod session;
pub mod util;
pub mod vote;

use clap::Parser;

/// Parse the command line and run it to completion on a fresh runtime.
pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::dispatch(cli))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, Utc};

    use crate::models::{Script, Session, User};

    pub fn session(user_id: &str) -> Session {
        Session {
            access_token: format!("token-{user_id}"),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: user_id.to_string(),
                email: Some(format!("{user_id}@example.com")),
            },
        }
    }

    pub fn script(
        id: &str,
        title: &str,
        tags: &[&str],
        upvotes: u64,
        views: u64,
        hours_ago: i64,
    ) -> Script {
        Script {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{title} script"),
            script_content: format!("-- {title}"),
            script_link: None,
            game_link: None,
            thumbnail_url: None,
            custom_thumbnail_url: None,
            features: Vec::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            works_on_mobile: false,
            has_keysystem: false,
            costs_money: false,
            upvotes,
            downvotes: 0,
            views,
            created_by: None,
            created_at: Utc::now() - Duration::hours(hours_ago),
        }
    }
}
