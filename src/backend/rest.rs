use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::query::ScriptQuery;
use super::{AuthService, DataService, NO_ROWS_CODE};
use crate::error::{AppError, Result};
use crate::models::{NewScript, NewVote, Profile, Script, Session, User, Vote, VoteType};
use crate::session::SessionReader;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Client for the hosted service (PostgREST tables + RPC, GoTrue-style auth).
///
/// Requests carry the signed-in user's access token when there is one and
/// the anonymous key otherwise.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    sessions: SessionReader,
}

/// Error payloads from both the table API and the auth API.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: User,
}

impl RestClient {
    pub fn new(base_url: &str, anon_key: &str, sessions: SessionReader) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            sessions,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self
            .sessions
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    /// Fetch at most one row; the service's "no rows" code maps to `None`.
    async fn single<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>> {
        let response = req.header("Accept", SINGLE_OBJECT).send().await?;
        match check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Mutation returning its representation; an empty result means no row matched.
    async fn mutate_one<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let response = req.header("Prefer", RETURN_REPRESENTATION).send().await?;
        let rows: Vec<T> = check(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(what.to_string()))
    }
}

/// Turn a non-success response into a typed error.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(classify(status, &text))
}

fn classify(status: StatusCode, body: &str) -> AppError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = match parsed.code {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => parsed
            .error
            .clone()
            .unwrap_or_else(|| status.as_u16().to_string()),
    };
    let message = parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.to_string()
            }
        });

    if code == NO_ROWS_CODE {
        return AppError::NotFound(message);
    }
    if status == StatusCode::UNAUTHORIZED {
        return AppError::Unauthorized(message);
    }
    AppError::Backend { code, message }
}

impl DataService for RestClient {
    async fn select_scripts(&self, query: &ScriptQuery) -> Result<Vec<Script>> {
        let response = self
            .request(Method::GET, &self.table_url("scripts"))
            .query(&query.to_params())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn select_script(&self, id: &str) -> Result<Option<Script>> {
        let req = self
            .request(Method::GET, &self.table_url("scripts"))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        self.single(req).await
    }

    async fn insert_script(&self, script: &NewScript) -> Result<Script> {
        let req = self
            .request(Method::POST, &self.table_url("scripts"))
            .json(script);
        self.mutate_one(req, "inserted script").await
    }

    async fn increment_views(&self, id: &str) -> Result<()> {
        let url = format!("{}/rest/v1/rpc/increment_script_views", self.base_url);
        let response = self
            .request(Method::POST, &url)
            .json(&serde_json::json!({ "script_id": id }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn select_vote(&self, script_id: &str, user_id: &str) -> Result<Option<Vote>> {
        let req = self
            .request(Method::GET, &self.table_url("script_votes"))
            .query(&[
                ("select", "*".to_string()),
                ("script_id", format!("eq.{script_id}")),
                ("user_id", format!("eq.{user_id}")),
            ]);
        self.single(req).await
    }

    async fn insert_vote(&self, vote: &NewVote) -> Result<Vote> {
        let req = self
            .request(Method::POST, &self.table_url("script_votes"))
            .json(vote);
        self.mutate_one(req, "inserted vote").await
    }

    async fn update_vote_type(&self, vote_id: &str, vote_type: VoteType) -> Result<Vote> {
        let req = self
            .request(Method::PATCH, &self.table_url("script_votes"))
            .query(&[("id", format!("eq.{vote_id}"))])
            .json(&serde_json::json!({ "vote_type": vote_type }));
        self.mutate_one(req, &format!("vote {vote_id}")).await
    }

    async fn delete_vote(&self, vote_id: &str) -> Result<()> {
        let req = self
            .request(Method::DELETE, &self.table_url("script_votes"))
            .query(&[("id", format!("eq.{vote_id}"))]);
        self.mutate_one::<Vote>(req, &format!("vote {vote_id}"))
            .await
            .map(|_| ())
    }

    async fn select_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let req = self
            .request(Method::GET, &self.table_url("profiles"))
            .query(&[("select", "*".to_string()), ("user_id", format!("eq.{user_id}"))]);
        self.single(req).await
    }
}

impl RestClient {
    /// `POST /auth/v1/token` with the given grant.
    async fn token(&self, grant_type: &str, body: serde_json::Value) -> Result<Session> {
        let url = format!("{}/auth/v1/token?grant_type={grant_type}", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        let expires_at = token.expires_at.or_else(|| {
            token
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs)
        });
        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        })
    }
}

impl AuthService for RestClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.token("password", body).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        self.token("refresh_token", body).await
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
