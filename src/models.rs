use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::util::non_empty;

/// A listed script row, as stored in the `scripts` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub script_content: String,
    #[serde(default)]
    pub script_link: Option<String>,
    #[serde(default)]
    pub game_link: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub custom_thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub features: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub works_on_mobile: bool,
    #[serde(default)]
    pub has_keysystem: bool,
    #[serde(default)]
    pub costs_money: bool,
    #[serde(default)]
    pub upvotes: u64,
    #[serde(default)]
    pub downvotes: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Script {
    /// The custom thumbnail wins over the default one when it is set.
    pub fn thumbnail(&self) -> Option<&str> {
        [&self.custom_thumbnail_url, &self.thumbnail_url]
            .into_iter()
            .flatten()
            .map(|s| s.as_str())
            .find(|s| !s.trim().is_empty())
    }

    /// First tag, shown on compact cards.
    pub fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(|t| t.as_str())
    }

    /// Upper-cased first letter of the title, the placeholder for missing thumbnails.
    pub fn initial(&self) -> String {
        self.title
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

fn nullable_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Insert payload for the `scripts` table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewScript {
    pub title: String,
    pub description: String,
    pub script_content: String,
    pub script_link: Option<String>,
    pub game_link: Option<String>,
    pub thumbnail_url: Option<String>,
    pub custom_thumbnail_url: Option<String>,
    pub works_on_mobile: bool,
    pub has_keysystem: bool,
    pub costs_money: bool,
    pub features: Vec<String>,
    pub tags: Vec<String>,
    pub created_by: String,
}

/// Raw upload form values, before trimming.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptFields {
    pub title: String,
    pub description: String,
    pub script_content: String,
    #[serde(default)]
    pub script_link: String,
    #[serde(default)]
    pub game_link: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub custom_thumbnail_url: String,
    #[serde(default)]
    pub works_on_mobile: bool,
    #[serde(default)]
    pub has_keysystem: bool,
    #[serde(default)]
    pub costs_money: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ScriptFields {
    /// Names of required fields that are blank after trimming.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.script_content.trim().is_empty() {
            missing.push("script content");
        }
        missing
    }

    pub fn into_new_script(self, created_by: &str) -> NewScript {
        NewScript {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            script_content: self.script_content.trim().to_string(),
            script_link: non_empty(&self.script_link),
            game_link: non_empty(&self.game_link),
            thumbnail_url: non_empty(&self.thumbnail_url),
            custom_thumbnail_url: non_empty(&self.custom_thumbnail_url),
            works_on_mobile: self.works_on_mobile,
            has_keysystem: self.has_keysystem,
            costs_money: self.costs_money,
            features: self.features,
            tags: self.tags,
            created_by: created_by.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }

    pub fn parse(s: &str) -> Option<VoteType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "upvote" => Some(VoteType::Upvote),
            "down" | "downvote" => Some(VoteType::Downvote),
            _ => None,
        }
    }
}

/// A row of the `script_votes` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub script_id: String,
    pub user_id: String,
    pub vote_type: VoteType,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewVote {
    pub script_id: String,
    pub user_id: String,
    pub vote_type: VoteType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session issued by the auth provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    /// `expires_at` is unix seconds; sessions without one never expire.
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

/// Display projection from the `profiles` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> serde_json::Value {
        serde_json::json!({
            "id": "7d3c",
            "title": "arsenal aimbot",
            "description": "Precise aimbot",
            "script_content": "print('hi')",
            "script_link": null,
            "game_link": null,
            "thumbnail_url": "https://img/default.png",
            "custom_thumbnail_url": "",
            "features": null,
            "tags": ["Arsenal", "Combat"],
            "works_on_mobile": false,
            "has_keysystem": true,
            "costs_money": false,
            "upvotes": 892,
            "downvotes": 23,
            "views": 12456,
            "created_by": "u-1",
            "created_at": "2025-06-15T10:30:00.123456+00:00"
        })
    }

    #[test]
    fn test_deserializes_backend_row() {
        let script: Script = serde_json::from_value(row()).unwrap();
        assert!(script.features.is_empty());
        assert_eq!(script.primary_tag(), Some("Arsenal"));
        assert_eq!(script.initial(), "A");
        assert_eq!(script.created_at.to_rfc3339(), "2025-06-15T10:30:00.123456+00:00");
    }

    #[test]
    fn test_custom_thumbnail_overrides_default_only_when_set() {
        let mut script: Script = serde_json::from_value(row()).unwrap();
        assert_eq!(script.thumbnail(), Some("https://img/default.png"));
        script.custom_thumbnail_url = Some("https://img/custom.png".into());
        assert_eq!(script.thumbnail(), Some("https://img/custom.png"));
        script.custom_thumbnail_url = None;
        script.thumbnail_url = None;
        assert_eq!(script.thumbnail(), None);
    }

    #[test]
    fn test_fields_trim_and_default() {
        let fields = ScriptFields {
            title: "  Fly Hack ".into(),
            description: " flies ".into(),
            script_content: " loadstring() ".into(),
            game_link: "   ".into(),
            script_link: " https://pastebin.com/x ".into(),
            ..Default::default()
        };
        assert!(fields.missing_required().is_empty());
        let new = fields.into_new_script("u-9");
        assert_eq!(new.title, "Fly Hack");
        assert_eq!(new.game_link, None);
        assert_eq!(new.script_link.as_deref(), Some("https://pastebin.com/x"));
        assert!(!new.works_on_mobile);
        assert_eq!(new.created_by, "u-9");
    }

    #[test]
    fn test_missing_required_lists_blank_fields() {
        let fields = ScriptFields {
            title: "   ".into(),
            description: "ok".into(),
            ..Default::default()
        };
        assert_eq!(fields.missing_required(), vec!["title", "script content"]);
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session {
            access_token: "t".into(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: "u".into(),
                email: None,
            },
        };
        assert!(!session.is_expired_at(i64::MAX));
        session.expires_at = Some(1_000);
        assert!(!session.is_expired_at(999));
        assert!(session.is_expired_at(1_000));
        session.expires_at = Some(0);
        assert!(session.is_expired());
    }

    #[test]
    fn test_vote_type_wire_names() {
        assert_eq!(serde_json::to_string(&VoteType::Upvote).unwrap(), "\"upvote\"");
        assert_eq!(VoteType::parse("down"), Some(VoteType::Downvote));
        assert_eq!(VoteType::parse("sideways"), None);
    }
}
