//! The remote data service seam.
//!
//! `RestClient` talks to the hosted service. `MemoryBackend` keeps the same
//! contract in process and backs the demo mode and the tests.

pub mod memory;
pub mod query;
pub mod rest;

use std::future::Future;

use crate::error::Result;
use crate::models::{NewScript, NewVote, Profile, Script, Session, Vote, VoteType};

pub use memory::MemoryBackend;
pub use query::{ListingFilter, ScriptQuery, SortKey};
pub use rest::RestClient;

/// Wire code the hosted service returns when a single-row select matches nothing.
pub const NO_ROWS_CODE: &str = "PGRST116";

/// Table, mutation and RPC access.
///
/// Single-row reads return `Ok(None)` for a missing row. Mutations by id
/// return `AppError::NotFound` when the row does not exist.
///
/// Vote counters on `scripts` are maintained by the service itself: every
/// vote insert, update or delete adjusts `upvotes`/`downvotes` in the same
/// transaction. Callers never write counters.
pub trait DataService: Clone + Send + Sync + 'static {
    fn select_scripts(
        &self,
        query: &ScriptQuery,
    ) -> impl Future<Output = Result<Vec<Script>>> + Send;

    fn select_script(&self, id: &str) -> impl Future<Output = Result<Option<Script>>> + Send;

    fn insert_script(&self, script: &NewScript) -> impl Future<Output = Result<Script>> + Send;

    /// RPC `increment_script_views(script_id)`.
    fn increment_views(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    fn select_vote(
        &self,
        script_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Vote>>> + Send;

    fn insert_vote(&self, vote: &NewVote) -> impl Future<Output = Result<Vote>> + Send;

    fn update_vote_type(
        &self,
        vote_id: &str,
        vote_type: VoteType,
    ) -> impl Future<Output = Result<Vote>> + Send;

    fn delete_vote(&self, vote_id: &str) -> impl Future<Output = Result<()>> + Send;

    fn select_profile(&self, user_id: &str) -> impl Future<Output = Result<Option<Profile>>> + Send;
}

/// Session-based authentication against the provider.
pub trait AuthService: Clone + Send + Sync + 'static {
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session>> + Send;

    /// Exchange a refresh token for a new session.
    fn refresh_session(&self, refresh_token: &str) -> impl Future<Output = Result<Session>> + Send;

    fn sign_out(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;
}
