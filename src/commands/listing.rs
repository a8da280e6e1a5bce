use std::sync::Weak;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::backend::query::{ListingFilter, SortKey, ALL_GAMES};
use crate::backend::DataService;
use crate::commands::notice::{Notifier, Toast};
use crate::error::Result;
use crate::models::Script;
use crate::render;
use crate::repository::ScriptRepository;
use crate::routes::Route;

/// A request issued by the listing page. Carries its own copy of the filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub seq: u64,
    pub filter: ListingFilter,
}

/// What happened to a response handed to `ListingView::apply`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Updated,
    Failed,
    /// A newer response was already applied.
    Stale,
}

/// Local state of the Scripts page.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    pub filter: ListingFilter,
    pub scripts: Vec<Script>,
    pub loading: bool,
    pub last_error: Option<Toast>,
    #[serde(skip)]
    issued: u64,
    #[serde(skip)]
    applied: u64,
}

impl ListingView {
    pub fn new(filter: ListingFilter) -> Self {
        Self {
            filter,
            scripts: Vec::new(),
            loading: true,
            last_error: None,
            issued: 0,
            applied: 0,
        }
    }

    pub fn route(&self) -> Route {
        Route::scripts(&self.filter)
    }

    /// Issue a request for the current filter.
    pub fn begin(&mut self) -> Ticket {
        self.issued += 1;
        self.loading = true;
        Ticket {
            seq: self.issued,
            filter: self.filter.clone(),
        }
    }

    pub fn set_search(&mut self, text: &str) -> Ticket {
        self.filter.search = text.to_string();
        self.begin()
    }

    pub fn clear_search(&mut self) -> Ticket {
        self.set_search("")
    }

    pub fn set_game(&mut self, game: &str) -> Ticket {
        self.filter.game = if game.trim().is_empty() {
            ALL_GAMES.to_string()
        } else {
            game.to_string()
        };
        self.begin()
    }

    pub fn set_sort(&mut self, sort: SortKey) -> Ticket {
        self.filter.sort = sort;
        self.begin()
    }

    /// Apply a response unless something newer already landed.
    /// Failures keep the scripts already on screen.
    pub fn apply(&mut self, ticket: &Ticket, result: Result<Vec<Script>>) -> Applied {
        if ticket.seq <= self.applied {
            return Applied::Stale;
        }
        self.applied = ticket.seq;
        if self.applied >= self.issued {
            self.loading = false;
        }
        match result {
            Ok(scripts) => {
                self.scripts = scripts;
                self.last_error = None;
                Applied::Updated
            }
            Err(e) => {
                self.last_error = Some(Toast::from_error("Error loading scripts", &e));
                Applied::Failed
            }
        }
    }

    pub fn summary(&self) -> String {
        render::listing_summary(self.scripts.len(), &self.filter, self.loading)
    }
}

/// Run `ticket` and apply the result to the shared view.
///
/// Only a weak reference is held while the request is in flight; if the
/// view is gone by the time the response arrives, it is dropped.
pub async fn fetch_into<B: DataService>(
    view: Weak<Mutex<ListingView>>,
    repo: &ScriptRepository<B>,
    ticket: Ticket,
    notifier: &Notifier,
) -> Option<Applied> {
    let result = repo.list_scripts(&ticket.filter).await;

    let view = view.upgrade()?;
    let mut guard = view.lock().await;
    let applied = guard.apply(&ticket, result);
    if applied == Applied::Failed {
        if let Some(ref toast) = guard.last_error {
            notifier.send(toast.clone());
        }
    }
    Some(applied)
}
