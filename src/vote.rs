//! Toggle-or-switch voting for one (user, script) pair.

use serde::Serialize;

use crate::backend::DataService;
use crate::error::Result;
use crate::models::{NewVote, Vote, VoteType};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteState {
    #[default]
    NoVote,
    Upvoted,
    Downvoted,
}

impl VoteState {
    pub fn of(vote: Option<VoteType>) -> Self {
        match vote {
            None => VoteState::NoVote,
            Some(VoteType::Upvote) => VoteState::Upvoted,
            Some(VoteType::Downvote) => VoteState::Downvoted,
        }
    }

    pub fn vote_type(&self) -> Option<VoteType> {
        match self {
            VoteState::NoVote => None,
            VoteState::Upvoted => Some(VoteType::Upvote),
            VoteState::Downvoted => Some(VoteType::Downvote),
        }
    }

    /// Same type again clears the vote; any other cast becomes the new state.
    pub fn after(self, cast: VoteType) -> VoteState {
        if self.vote_type() == Some(cast) {
            VoteState::NoVote
        } else {
            VoteState::of(Some(cast))
        }
    }
}

/// The row change needed to move from the existing vote to the cast one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteAction {
    Create(VoteType),
    Switch { vote_id: String, to: VoteType },
    Remove { vote_id: String },
}

pub fn plan(existing: Option<&Vote>, cast: VoteType) -> VoteAction {
    match existing {
        None => VoteAction::Create(cast),
        Some(vote) if vote.vote_type == cast => VoteAction::Remove {
            vote_id: vote.id.clone(),
        },
        Some(vote) => VoteAction::Switch {
            vote_id: vote.id.clone(),
            to: cast,
        },
    }
}

/// Read the current vote, then insert, update or delete it.
///
/// Not atomic against the same user voting from another session; the last
/// write wins. Counters are left to the backend.
pub async fn reconcile<B: DataService>(
    backend: &B,
    user_id: &str,
    script_id: &str,
    cast: VoteType,
) -> Result<VoteState> {
    let existing = backend.select_vote(script_id, user_id).await?;
    let before = VoteState::of(existing.as_ref().map(|v| v.vote_type));

    match plan(existing.as_ref(), cast) {
        VoteAction::Create(vote_type) => {
            backend
                .insert_vote(&NewVote {
                    script_id: script_id.to_string(),
                    user_id: user_id.to_string(),
                    vote_type,
                })
                .await?;
        }
        VoteAction::Switch { vote_id, to } => {
            backend.update_vote_type(&vote_id, to).await?;
        }
        VoteAction::Remove { vote_id } => {
            backend.delete_vote(&vote_id).await?;
        }
    }

    Ok(before.after(cast))
}
