use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::query::ScriptQuery;
use super::{AuthService, DataService};
use crate::error::{AppError, Result};
use crate::models::{NewScript, NewVote, Profile, Script, Session, User, Vote, VoteType};

/// In-process data service with the hosted service's contract.
///
/// Rows keep insertion order, which is the natural order for ties. Vote
/// mutations adjust the script's counters under the same lock, the way the
/// hosted service's trigger does.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    scripts: Vec<Script>,
    votes: Vec<Vote>,
    profiles: Vec<Profile>,
    accounts: Vec<Account>,
    next_id: u64,
    mutations: usize,
    outage: Option<(String, String)>,
}

struct Account {
    email: String,
    password: String,
    user: User,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:04}", self.next_id)
    }

    fn check_outage(&self) -> Result<()> {
        match self.outage {
            Some((ref code, ref message)) => Err(AppError::backend(code.clone(), message.clone())),
            None => Ok(()),
        }
    }

    fn script_mut(&mut self, id: &str) -> Result<&mut Script> {
        self.scripts
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound(format!("script {id}")))
    }

    /// Counter side effect of a vote row change.
    fn apply_counter(
        &mut self,
        script_id: &str,
        removed: Option<VoteType>,
        added: Option<VoteType>,
    ) -> Result<()> {
        let script = self.script_mut(script_id)?;
        if let Some(old) = removed {
            let counter = counter_mut(script, old);
            *counter = counter.saturating_sub(1);
        }
        if let Some(new) = added {
            *counter_mut(script, new) += 1;
        }
        Ok(())
    }
}

fn counter_mut(script: &mut Script, vote_type: VoteType) -> &mut u64 {
    match vote_type {
        VoteType::Upvote => &mut script.upvotes,
        VoteType::Downvote => &mut script.downvotes,
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts(scripts: Vec<Script>) -> Self {
        let backend = Self::new();
        backend.lock().scripts = scripts;
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_script(&self, script: Script) {
        self.lock().scripts.push(script);
    }

    /// Register a password account, optionally with a profile row.
    pub fn add_account(&self, email: &str, password: &str, username: Option<&str>) -> User {
        let mut state = self.lock();
        let user = User {
            id: state.next_id("user"),
            email: Some(email.to_string()),
        };
        if let Some(name) = username {
            let profile_id = state.next_id("profile");
            state.profiles.push(Profile {
                id: Some(profile_id),
                user_id: user.id.clone(),
                username: Some(name.to_string()),
                avatar_url: None,
                is_admin: Some(false),
            });
        }
        state.accounts.push(Account {
            email: email.to_string(),
            password: password.to_string(),
            user: user.clone(),
        });
        user
    }

    /// Make every call fail with this code until `restore()`.
    pub fn fail_with(&self, code: &str, message: &str) {
        self.lock().outage = Some((code.to_string(), message.to_string()));
    }

    pub fn restore(&self) {
        self.lock().outage = None;
    }

    /// Number of successful row mutations and RPC calls so far.
    pub fn mutation_count(&self) -> usize {
        self.lock().mutations
    }

    pub fn votes(&self) -> Vec<Vote> {
        self.lock().votes.clone()
    }
}

impl DataService for MemoryBackend {
    async fn select_scripts(&self, query: &ScriptQuery) -> Result<Vec<Script>> {
        let state = self.lock();
        state.check_outage()?;
        let mut rows: Vec<Script> = state
            .scripts
            .iter()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        query.sort(&mut rows);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn select_script(&self, id: &str) -> Result<Option<Script>> {
        let state = self.lock();
        state.check_outage()?;
        Ok(state.scripts.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_script(&self, new: &NewScript) -> Result<Script> {
        let mut state = self.lock();
        state.check_outage()?;
        let script = Script {
            id: state.next_id("script"),
            title: new.title.clone(),
            description: new.description.clone(),
            script_content: new.script_content.clone(),
            script_link: new.script_link.clone(),
            game_link: new.game_link.clone(),
            thumbnail_url: new.thumbnail_url.clone(),
            custom_thumbnail_url: new.custom_thumbnail_url.clone(),
            features: new.features.clone(),
            tags: new.tags.clone(),
            works_on_mobile: new.works_on_mobile,
            has_keysystem: new.has_keysystem,
            costs_money: new.costs_money,
            upvotes: 0,
            downvotes: 0,
            views: 0,
            created_by: Some(new.created_by.clone()),
            created_at: Utc::now(),
        };
        state.scripts.push(script.clone());
        state.mutations += 1;
        Ok(script)
    }

    async fn increment_views(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.check_outage()?;
        state.script_mut(id)?.views += 1;
        state.mutations += 1;
        Ok(())
    }

    async fn select_vote(&self, script_id: &str, user_id: &str) -> Result<Option<Vote>> {
        let state = self.lock();
        state.check_outage()?;
        Ok(state
            .votes
            .iter()
            .find(|v| v.script_id == script_id && v.user_id == user_id)
            .cloned())
    }

    async fn insert_vote(&self, new: &NewVote) -> Result<Vote> {
        let mut state = self.lock();
        state.check_outage()?;
        if state
            .votes
            .iter()
            .any(|v| v.script_id == new.script_id && v.user_id == new.user_id)
        {
            return Err(AppError::backend(
                "23505",
                concat!(
                    "duplicate key value violates unique constraint ",
                    "\"script_votes_script_id_user_id_key\""
                ),
            ));
        }
        state.apply_counter(&new.script_id, None, Some(new.vote_type))?;
        let vote = Vote {
            id: state.next_id("vote"),
            script_id: new.script_id.clone(),
            user_id: new.user_id.clone(),
            vote_type: new.vote_type,
        };
        state.votes.push(vote.clone());
        state.mutations += 1;
        Ok(vote)
    }

    async fn update_vote_type(&self, vote_id: &str, vote_type: VoteType) -> Result<Vote> {
        let mut state = self.lock();
        state.check_outage()?;
        let idx = state
            .votes
            .iter()
            .position(|v| v.id == vote_id)
            .ok_or_else(|| AppError::NotFound(format!("vote {vote_id}")))?;
        let old = state.votes[idx].vote_type;
        let script_id = state.votes[idx].script_id.clone();
        if old != vote_type {
            state.apply_counter(&script_id, Some(old), Some(vote_type))?;
        }
        state.votes[idx].vote_type = vote_type;
        state.mutations += 1;
        Ok(state.votes[idx].clone())
    }

    async fn delete_vote(&self, vote_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.check_outage()?;
        let idx = state
            .votes
            .iter()
            .position(|v| v.id == vote_id)
            .ok_or_else(|| AppError::NotFound(format!("vote {vote_id}")))?;
        let removed = state.votes.remove(idx);
        state.apply_counter(&removed.script_id, Some(removed.vote_type), None)?;
        state.mutations += 1;
        Ok(())
    }

    async fn select_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let state = self.lock();
        state.check_outage()?;
        Ok(state.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }
}

/// Local sessions last an hour, like the hosted provider's default.
fn issue_session(user: &User) -> Session {
    Session {
        access_token: format!("local-{}", user.id),
        refresh_token: Some(format!("refresh-{}", user.id)),
        expires_at: Some(Utc::now().timestamp() + 3600),
        user: user.clone(),
    }
}

impl AuthService for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let state = self.lock();
        state.check_outage()?;
        let account = state
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email.trim()) && a.password == password)
            .ok_or_else(|| AppError::backend("invalid_grant", "Invalid login credentials"))?;
        Ok(issue_session(&account.user))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let state = self.lock();
        state.check_outage()?;
        let account = refresh_token
            .strip_prefix("refresh-")
            .and_then(|id| state.accounts.iter().find(|a| a.user.id == id))
            .ok_or_else(|| AppError::backend("invalid_grant", "Invalid Refresh Token"))?;
        Ok(issue_session(&account.user))
    }

    async fn sign_out(&self, _session: &Session) -> Result<()> {
        self.lock().check_outage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::query::{ListingFilter, SortKey};
    use crate::test_support::script;

    fn catalog() -> MemoryBackend {
        MemoryBackend::with_scripts(vec![
            script("a", "Arsenal Aimbot", &["Arsenal", "Combat"], 892, 12456, 2),
            script("b", "Blox Fruits Auto Farm", &["Blox Fruits"], 1234, 15678, 1),
            script("c", "Adopt Me Auto Trade", &["Adopt Me"], 567, 8934, 3),
            script("d", "Silent aim for ARSENAL", &["Combat"], 892, 100, 4),
        ])
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_across_fields() {
        let backend = catalog();
        let filter = ListingFilter {
            search: "arsenal".into(),
            ..Default::default()
        };
        let rows = backend.select_scripts(&ScriptQuery::from(&filter)).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[tokio::test]
    async fn test_popular_ties_keep_natural_order() {
        let backend = catalog();
        let filter = ListingFilter {
            sort: SortKey::Popular,
            ..Default::default()
        };
        let rows = backend.select_scripts(&ScriptQuery::from(&filter)).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "d", "c"]);
    }

    #[tokio::test]
    async fn test_recent_limit() {
        let backend = catalog();
        let rows = backend.select_scripts(&ScriptQuery::recent(2)).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|s| s.id.as_str()).collect();
        // created_at is now minus N hours, so fewer hours = newer
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_vote_rows_drive_counters() {
        let backend = catalog();
        let vote = backend
            .insert_vote(&NewVote {
                script_id: "c".into(),
                user_id: "u-1".into(),
                vote_type: VoteType::Upvote,
            })
            .await
            .unwrap();
        let c = backend.select_script("c").await.unwrap().unwrap();
        assert_eq!((c.upvotes, c.downvotes), (568, 0));

        backend.update_vote_type(&vote.id, VoteType::Downvote).await.unwrap();
        let c = backend.select_script("c").await.unwrap().unwrap();
        assert_eq!((c.upvotes, c.downvotes), (567, 1));

        backend.delete_vote(&vote.id).await.unwrap();
        let c = backend.select_script("c").await.unwrap().unwrap();
        assert_eq!((c.upvotes, c.downvotes), (567, 0));
    }

    #[tokio::test]
    async fn test_duplicate_vote_is_rejected() {
        let backend = catalog();
        let new = NewVote {
            script_id: "a".into(),
            user_id: "u-1".into(),
            vote_type: VoteType::Upvote,
        };
        backend.insert_vote(&new).await.unwrap();
        match backend.insert_vote(&new).await {
            Err(AppError::Backend { code, .. }) => assert_eq!(code, "23505"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(backend.votes().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_rows() {
        let backend = catalog();
        assert!(backend.select_script("zzz").await.unwrap().is_none());
        assert!(matches!(
            backend.delete_vote("vote-404").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            backend.increment_views("zzz").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_outage_fails_every_call() {
        let backend = catalog();
        backend.fail_with("503", "Service Unavailable");
        assert!(matches!(
            backend.select_scripts(&ScriptQuery::default()).await,
            Err(AppError::Backend { .. })
        ));
        backend.restore();
        assert_eq!(backend.select_scripts(&ScriptQuery::default()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_password_sign_in() {
        let backend = MemoryBackend::new();
        let user = backend.add_account("demo@roboscript.dev", "hunter2", Some("demo"));
        let session = backend
            .sign_in_with_password("Demo@RoboScript.dev", "hunter2")
            .await
            .unwrap();
        assert_eq!(session.user, user);
        assert!(backend.sign_in_with_password("demo@roboscript.dev", "nope").await.is_err());
        let profile = backend.select_profile(&user.id).await.unwrap().unwrap();
        assert_eq!(profile.username.as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn test_refresh_token_issues_new_session() {
        let backend = MemoryBackend::new();
        let user = backend.add_account("kid@example.com", "pw", None);
        let session = backend.sign_in_with_password("kid@example.com", "pw").await.unwrap();
        assert!(!session.is_expired());

        let refresh = session.refresh_token.unwrap();
        let fresh = backend.refresh_session(&refresh).await.unwrap();
        assert_eq!(fresh.user, user);
        assert!(backend.refresh_session("refresh-nobody").await.is_err());
    }
}
