use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::backend::DataService;
use crate::commands::notice::{Notifier, Toast};
use crate::error::{AppError, Result};
use crate::models::{Script, VoteType};
use crate::repository::{ScriptRepository, VoteOutcome};
use crate::vote::VoteState;

/// Local state of the script detail page.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailView {
    pub id: String,
    pub script: Option<Script>,
    pub user_vote: VoteState,
    pub loading: bool,
    pub voting: bool,
    pub last_error: Option<Toast>,
}

impl DetailView {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            script: None,
            user_vote: VoteState::NoVote,
            loading: true,
            voting: false,
            last_error: None,
        }
    }

    /// Loaded, and there is no such script.
    pub fn is_not_found(&self) -> bool {
        !self.loading && self.script.is_none() && self.last_error.is_none()
    }

    /// Fetch the script and the caller's vote together and start the view
    /// counter bump. The returned handle is for the counter task only.
    pub async fn load<B: DataService>(
        &mut self,
        repo: &ScriptRepository<B>,
        notifier: &Notifier,
    ) -> JoinHandle<()> {
        let views = repo.record_view(&self.id);
        let (script, vote) =
            futures_util::future::join(repo.get_script(&self.id), repo.user_vote(&self.id)).await;

        self.loading = false;
        self.user_vote = VoteState::of(vote);
        match script {
            Ok(script) => {
                self.script = script;
                self.last_error = None;
            }
            Err(e) => {
                let toast = Toast::from_error("Error loading script", &e);
                notifier.send(toast.clone());
                self.last_error = Some(toast);
            }
        }
        views
    }

    /// Claim the vote slot. Fails while another vote is in flight.
    pub fn begin_vote(&mut self) -> Result<String> {
        if self.voting {
            return Err(AppError::Custom("A vote is already in progress".into()));
        }
        self.voting = true;
        Ok(self.id.clone())
    }

    /// Release the vote slot and apply the outcome.
    ///
    /// On success the vote state is replaced along with the re-fetched
    /// script. On failure the view keeps what it showed and records a toast.
    pub fn finish_vote(
        &mut self,
        result: Result<VoteOutcome>,
        notifier: &Notifier,
    ) -> Result<VoteState> {
        self.voting = false;
        match result {
            Ok(outcome) => {
                self.user_vote = outcome.state;
                if let Some(script) = outcome.script {
                    self.script = Some(script);
                }
                Ok(outcome.state)
            }
            Err(e) => {
                let toast = Toast::from_error("Failed to register vote", &e);
                notifier.send(toast.clone());
                self.last_error = Some(toast);
                Err(e)
            }
        }
    }

    /// Cast a vote on a view owned by one caller.
    pub async fn vote<B: DataService>(
        &mut self,
        repo: &ScriptRepository<B>,
        cast: VoteType,
        notifier: &Notifier,
    ) -> Result<VoteState> {
        let id = self.begin_vote()?;
        let result = repo.cast_vote(&id, cast).await;
        self.finish_vote(result, notifier)
    }

    /// Text put on the clipboard by "Copy Script".
    pub fn copy_text(&self) -> Option<&str> {
        self.script
            .as_ref()
            .map(|s| s.script_content.as_str())
            .filter(|c| !c.is_empty())
    }
}

/// Cast a vote on a view shared with other tasks.
///
/// The lock is released while the request is in flight, so a second vote on
/// the same view is rejected by the `voting` flag instead of queueing.
pub async fn vote_shared<B: DataService>(
    view: &Arc<Mutex<DetailView>>,
    repo: &ScriptRepository<B>,
    cast: VoteType,
    notifier: &Notifier,
) -> Result<VoteState> {
    let id = view.lock().await.begin_vote()?;
    let result = repo.cast_vote(&id, cast).await;
    view.lock().await.finish_vote(result, notifier)
}
