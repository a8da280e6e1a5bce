//! Terminal front end: one subcommand per page or action.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::backend::query::{ListingFilter, SortKey, POPULAR_GAMES};
use crate::backend::{AuthService, DataService, RestClient};
use crate::commands::config::{self, AppConfig};
use crate::commands::detail::{self, DetailView};
use crate::commands::home::HomeView;
use crate::commands::listing::{self, ListingView};
use crate::commands::logs::ActivityLog;
use crate::commands::navbar::NavbarView;
use crate::commands::notice::{Notifier, Toast};
use crate::commands::upload::UploadForm;
use crate::demo;
use crate::models::VoteType;
use crate::render;
use crate::repository::ScriptRepository;
use crate::routes::Route;
use crate::session::{self, SessionStore};

#[derive(Parser)]
#[command(
    name = "roboscript",
    version,
    about = "Browse, search, upload and vote on Roblox scripts"
)]
pub struct Cli {
    /// Output results as JSON
    #[arg(short = 'j', long = "json", global = true)]
    pub json: bool,

    /// Use the built-in offline catalog, signed in as the demo account
    #[arg(long, global = true)]
    pub demo: bool,

    /// Echo activity log lines to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Newest scripts
    Home,

    /// Search and filter the catalog
    List {
        /// Text matched against title, description and tags
        #[arg(short, long, default_value = "")]
        search: String,

        /// Game tag, or "all"
        #[arg(short, long, default_value = "all")]
        game: String,

        /// newest, popular or views
        #[arg(long, default_value = "newest")]
        sort: String,
    },

    /// Games offered by the game filter
    Games,

    /// Show a script and count a view
    Show {
        /// Script ID
        id: String,
    },

    /// Upvote or downvote a script; repeating a vote removes it
    Vote {
        /// Script ID
        id: String,

        /// up or down
        direction: String,
    },

    /// Upload a new script
    Upload {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Script source
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read the script source from a file
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        script_link: Option<String>,

        #[arg(long)]
        game_link: Option<String>,

        #[arg(long)]
        thumbnail: Option<String>,

        #[arg(long)]
        custom_thumbnail: Option<String>,

        /// Repeat for each feature
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Repeat for each tag
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        mobile: bool,

        #[arg(long)]
        keysystem: bool,

        #[arg(long)]
        paid: bool,
    },

    /// Sign in with e-mail and password
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Open an app path such as "/scripts?game=Arsenal" or "/script/42"
    Open {
        path: String,
    },
}

#[derive(Serialize)]
struct StatusResponse {
    success: bool,
    message: String,
}

/// Run one command against the configured backend, then shut down cleanly.
pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let settings = config::load_config();

    let (log, writer) = match settings.logs_dir() {
        Some(dir) => match ActivityLog::open(&dir).await {
            Some((log, writer)) => (log, Some(writer)),
            None => (ActivityLog::disabled(), None),
        },
        None => (ActivityLog::disabled(), None),
    };
    let log = log.with_echo(cli.verbose);

    let outcome = if cli.demo {
        run_demo(&cli, log).await
    } else {
        run_hosted(&cli, &settings, log).await
    };

    // Every logger clone is gone by now, so the writer drains and exits.
    if let Some(writer) = writer {
        let _ = writer.await;
    }
    outcome
}

async fn run_demo(cli: &Cli, log: ActivityLog) -> anyhow::Result<()> {
    let backend = demo::demo_backend();
    let session = backend
        .sign_in_with_password(demo::DEMO_EMAIL, demo::DEMO_PASSWORD)
        .await?;
    let store = SessionStore::init(Some(session));
    log.log("demo", "Using the offline catalog");

    let outcome = execute(cli, backend, &store, log).await;
    store.shutdown();
    outcome
}

async fn run_hosted(cli: &Cli, settings: &AppConfig, log: ActivityLog) -> anyhow::Result<()> {
    let store = SessionStore::init(settings.session.clone());
    let (url, key) = settings.require_backend()?;
    let backend = RestClient::new(url, key, store.reader());
    let persist = config::config_path()
        .map(|path| session::persist_on_change(store.subscribe(), path, log.clone()));
    session::refresh_if_expired(&backend, &store, &log).await;

    let outcome = execute(cli, backend, &store, log).await;

    store.shutdown();
    if let Some(persist) = persist {
        let _ = persist.await;
    }
    outcome
}

async fn execute<B>(
    cli: &Cli,
    backend: B,
    store: &SessionStore,
    log: ActivityLog,
) -> anyhow::Result<()>
where
    B: DataService + AuthService,
{
    let repo = ScriptRepository::new(backend.clone(), store.reader(), log);
    let (notifier, mut toasts) = Notifier::channel();

    let outcome = match cli.command {
        None | Some(Commands::Home) => home(cli, &repo).await,
        Some(Commands::List {
            ref search,
            ref game,
            ref sort,
        }) => {
            let filter = ListingFilter {
                search: search.clone(),
                game: game.clone(),
                sort: SortKey::parse(sort),
            };
            list(cli, &repo, filter, &notifier).await
        }
        Some(Commands::Games) => {
            let games: Vec<&str> = POPULAR_GAMES.to_vec();
            emit(cli.json, &games, || games.join("\n"))
        }
        Some(Commands::Show { ref id }) => show(cli, &repo, id, &notifier).await,
        Some(Commands::Vote {
            ref id,
            ref direction,
        }) => vote(cli, &repo, id, direction, &notifier).await,
        Some(Commands::Upload { .. }) => upload(cli, &repo, &notifier).await,
        Some(Commands::Login {
            ref email,
            ref password,
        }) => {
            let mut nav = NavbarView::default();
            match nav.sign_in(&backend, store, email, password).await {
                Ok(user) => {
                    repo.log().log("auth", &format!("Signed in as {}", user.id));
                    nav.sync(&repo).await;
                    let name = nav.display_name().unwrap_or(user.id);
                    status(cli.json, format!("Signed in as {name}"))
                }
                Err(e) => {
                    repo.log().warn("auth", &format!("Sign-in failed ({}): {e}", e.kind()));
                    notifier.send(Toast::from_error("Error signing in", &e));
                    Err(e.into())
                }
            }
        }
        Some(Commands::Logout) => {
            let mut nav = NavbarView::default();
            nav.sign_out(&backend, store, &notifier).await;
            repo.log().log("auth", "Signed out");
            status(cli.json, "Signed out".to_string())
        }
        Some(Commands::Whoami) => {
            let mut nav = NavbarView::default();
            nav.sync(&repo).await;
            emit(cli.json, &nav, || match nav.display_name() {
                Some(name) if nav.is_admin() => format!("{name} (admin)"),
                Some(name) => name,
                None => "Not signed in".to_string(),
            })
        }
        Some(Commands::Open { ref path }) => match Route::parse(path)? {
            Route::Home => home(cli, &repo).await,
            Route::Scripts { filter } => list(cli, &repo, filter, &notifier).await,
            Route::Script { id } => show(cli, &repo, &id, &notifier).await,
            Route::Upload => status(
                cli.json,
                "Use `roboscript upload --title ... --description ... --content ...`".to_string(),
            ),
        },
    };

    drop(notifier);
    drain_toasts(&mut toasts);
    outcome
}

async fn home<B: DataService>(cli: &Cli, repo: &ScriptRepository<B>) -> anyhow::Result<()> {
    let mut view = HomeView::default();
    view.load(repo).await;
    let now = chrono::Utc::now();
    emit(cli.json, &view, || {
        let mut out = String::from("Recent Scripts\n\n");
        out.push_str(&render::grid(&view.recent, now));
        out
    })
}

async fn list<B: DataService>(
    cli: &Cli,
    repo: &ScriptRepository<B>,
    filter: ListingFilter,
    notifier: &Notifier,
) -> anyhow::Result<()> {
    let view = Arc::new(Mutex::new(ListingView::new(filter)));
    let ticket = view.lock().await.begin();
    listing::fetch_into(Arc::downgrade(&view), repo, ticket, notifier).await;

    let view = view.lock().await;
    if let Some(ref toast) = view.last_error {
        anyhow::bail!("{}: {}", toast.title, toast.description);
    }
    let now = chrono::Utc::now();
    emit(cli.json, &*view, || {
        if view.scripts.is_empty() {
            return format!("{}\n\n{}", view.summary(), render::empty_listing(&view.filter));
        }
        format!("{}\n\n{}", view.summary(), render::grid(&view.scripts, now))
    })
}

async fn show<B: DataService>(
    cli: &Cli,
    repo: &ScriptRepository<B>,
    id: &str,
    notifier: &Notifier,
) -> anyhow::Result<()> {
    let mut view = DetailView::new(id);
    let views = view.load(repo, notifier).await;
    let _ = views.await;

    if let Some(ref toast) = view.last_error {
        anyhow::bail!("{}: {}", toast.title, toast.description);
    }
    if view.is_not_found() {
        anyhow::bail!("Script not found\nThe script you're looking for doesn't exist.");
    }
    emit(cli.json, &view, || match view.script {
        Some(ref script) => render::detail(script, view.user_vote),
        None => String::new(),
    })
}

async fn vote<B: DataService>(
    cli: &Cli,
    repo: &ScriptRepository<B>,
    id: &str,
    direction: &str,
    notifier: &Notifier,
) -> anyhow::Result<()> {
    let cast = VoteType::parse(direction)
        .with_context(|| format!("Unknown vote direction '{direction}', expected up or down"))?;

    let view = Arc::new(Mutex::new(DetailView::new(id)));
    {
        let mut guard = view.lock().await;
        let views = guard.load(repo, notifier).await;
        let _ = views.await;
        if guard.is_not_found() {
            anyhow::bail!("Script {id} not found");
        }
    }

    detail::vote_shared(&view, repo, cast, notifier).await?;
    let view = view.lock().await;
    emit(cli.json, &*view, || match view.script {
        Some(ref script) => render::detail(script, view.user_vote),
        None => String::new(),
    })
}

async fn upload<B: DataService>(
    cli: &Cli,
    repo: &ScriptRepository<B>,
    notifier: &Notifier,
) -> anyhow::Result<()> {
    let Some(Commands::Upload {
        ref title,
        ref description,
        ref content,
        ref file,
        ref script_link,
        ref game_link,
        ref thumbnail,
        ref custom_thumbnail,
        ref features,
        ref tags,
        mobile,
        keysystem,
        paid,
    }) = cli.command
    else {
        return Ok(());
    };

    let script_content = match (content, file) {
        (Some(content), _) => content.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => String::new(),
    };

    let mut form = UploadForm::new();
    form.fields.title = title.clone();
    form.fields.description = description.clone();
    form.fields.script_content = script_content;
    form.fields.script_link = script_link.clone().unwrap_or_default();
    form.fields.game_link = game_link.clone().unwrap_or_default();
    form.fields.thumbnail_url = thumbnail.clone().unwrap_or_default();
    form.fields.custom_thumbnail_url = custom_thumbnail.clone().unwrap_or_default();
    form.fields.works_on_mobile = mobile;
    form.fields.has_keysystem = keysystem;
    form.fields.costs_money = paid;
    for feature in features {
        form.add_feature(feature);
    }
    for tag in tags {
        form.add_tag(tag);
    }

    let (script, route) = form.submit(repo, notifier).await?;
    emit(cli.json, &script, || {
        format!("Uploaded {} (id {})\nNext: {}", script.title, script.id, route.to_path())
    })
}

fn status(json: bool, message: String) -> anyhow::Result<()> {
    let response = StatusResponse {
        success: true,
        message,
    };
    emit(json, &response, || response.message.clone())
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn drain_toasts(toasts: &mut mpsc::UnboundedReceiver<Toast>) {
    while let Ok(toast) = toasts.try_recv() {
        eprintln!("{}", render::toast(&toast));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_list_flags() {
        let cli = Cli::parse_from([
            "roboscript", "list", "--search", "auto farm", "--sort", "views", "--json",
        ]);
        assert!(cli.json);
        match cli.command {
            Some(Commands::List { search, game, sort }) => {
                assert_eq!(search, "auto farm");
                assert_eq!(game, "all");
                assert_eq!(SortKey::parse(&sort), SortKey::MostViewed);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_parses_repeatable_upload_flags() {
        let cli = Cli::parse_from([
            "roboscript", "upload", "--title", "Fly", "--description", "Flies",
            "--content", "fly()", "--tag", "Arsenal", "--tag", "Combat",
            "--feature", "ESP", "--mobile",
        ]);
        match cli.command {
            Some(Commands::Upload { tags, features, mobile, paid, .. }) => {
                assert_eq!(tags, vec!["Arsenal", "Combat"]);
                assert_eq!(features, vec!["ESP"]);
                assert!(mobile);
                assert!(!paid);
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_content_and_file_conflict() {
        let result = Cli::try_parse_from([
            "roboscript", "upload", "--title", "Fly", "--description", "Flies",
            "--content", "x", "--file", "a.lua",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_demo_vote_toggles() {
        let backend = demo::demo_backend();
        let session = backend
            .sign_in_with_password(demo::DEMO_EMAIL, demo::DEMO_PASSWORD)
            .await
            .unwrap();
        let store = SessionStore::init(Some(session));
        let cli = Cli::parse_from(["roboscript", "--demo", "vote", "1", "up"]);

        execute(&cli, backend.clone(), &store, ActivityLog::disabled()).await.unwrap();
        assert_eq!(backend.votes().len(), 1);
        execute(&cli, backend.clone(), &store, ActivityLog::disabled()).await.unwrap();
        assert!(backend.votes().is_empty());
    }
}
