use tokio::task::JoinHandle;

use crate::backend::{DataService, ListingFilter, ScriptQuery};
use crate::commands::logs::ActivityLog;
use crate::error::{AppError, Result};
use crate::models::{Profile, Script, ScriptFields, User, VoteType};
use crate::session::SessionReader;
use crate::vote::{self, VoteState};

/// Scripts shown on the home page.
pub const RECENT_LIMIT: usize = 6;

/// Result of a vote: the caller's new state and the re-fetched script.
#[derive(Clone, Debug)]
pub struct VoteOutcome {
    pub state: VoteState,
    pub script: Option<Script>,
}

/// Builds queries for the `scripts` and `script_votes` tables and issues them.
#[derive(Clone)]
pub struct ScriptRepository<B> {
    backend: B,
    sessions: SessionReader,
    log: ActivityLog,
}

impl<B: DataService> ScriptRepository<B> {
    pub fn new(backend: B, sessions: SessionReader, log: ActivityLog) -> Self {
        Self {
            backend,
            sessions,
            log,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn sessions(&self) -> &SessionReader {
        &self.sessions
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    fn require_user(&self, action: &str) -> Result<User> {
        self.sessions
            .user()
            .ok_or_else(|| AppError::Unauthorized(format!("Please sign in to {action}")))
    }

    pub async fn list_scripts(&self, filter: &ListingFilter) -> Result<Vec<Script>> {
        self.backend.select_scripts(&ScriptQuery::from(filter)).await
    }

    pub async fn recent_scripts(&self) -> Result<Vec<Script>> {
        self.backend
            .select_scripts(&ScriptQuery::recent(RECENT_LIMIT))
            .await
    }

    /// `Ok(None)` means the script does not exist.
    pub async fn get_script(&self, id: &str) -> Result<Option<Script>> {
        self.backend.select_script(id).await
    }

    /// Bump the view counter in the background. Failures are only logged.
    pub fn record_view(&self, id: &str) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let log = self.log.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = backend.increment_views(&id).await {
                log.warn("views", &format!("Error incrementing views for {id}: {e}"));
            }
        })
    }

    /// Validates required fields, then the session, then inserts.
    pub async fn create_script(&self, fields: ScriptFields) -> Result<Script> {
        let missing = fields.missing_required();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Required field(s) empty: {}",
                missing.join(", ")
            )));
        }
        let user = self.require_user("upload scripts")?;
        let script = self
            .backend
            .insert_script(&fields.into_new_script(&user.id))
            .await?;
        self.log
            .log("upload", &format!("{} created script {}", user.id, script.id));
        Ok(script)
    }

    /// The signed-in user's vote on a script. Errors are logged and read as "no vote".
    pub async fn user_vote(&self, script_id: &str) -> Option<VoteType> {
        let user = self.sessions.user()?;
        match self.backend.select_vote(script_id, &user.id).await {
            Ok(vote) => vote.map(|v| v.vote_type),
            Err(e) => {
                self.log
                    .warn("vote", &format!("Error checking user vote on {script_id}: {e}"));
                None
            }
        }
    }

    /// Toggle or switch the caller's vote, then re-fetch the script's counters.
    pub async fn cast_vote(&self, script_id: &str, cast: VoteType) -> Result<VoteOutcome> {
        let user = self.require_user("vote on scripts")?;
        let state = vote::reconcile(&self.backend, &user.id, script_id, cast).await?;
        self.log.log(
            "vote",
            &format!("{} cast {} on {script_id} -> {state:?}", user.id, cast.as_str()),
        );
        let script = self.get_script(script_id).await?;
        Ok(VoteOutcome { state, script })
    }

    /// Profile projection for the navbar; a missing row is `None`.
    pub async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.backend.select_profile(user_id).await
    }
}
