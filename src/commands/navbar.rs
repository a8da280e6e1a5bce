use serde::Serialize;

use crate::backend::query::ListingFilter;
use crate::backend::{AuthService, DataService};
use crate::commands::notice::{Notifier, Toast};
use crate::error::Result;
use crate::models::{Profile, User};
use crate::repository::ScriptRepository;
use crate::routes::Route;
use crate::session::SessionStore;

/// Signed-in user, profile and search box of the navigation bar.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavbarView {
    pub user: Option<User>,
    pub profile: Option<Profile>,
    pub search_query: String,
}

impl NavbarView {
    /// Refresh from the current session. Profile errors are logged only.
    pub async fn sync<B: DataService>(&mut self, repo: &ScriptRepository<B>) {
        self.user = repo.sessions().user();
        self.profile = match self.user {
            Some(ref user) => match repo.fetch_profile(&user.id).await {
                Ok(profile) => profile,
                Err(e) => {
                    repo.log()
                        .warn("profile", &format!("Error fetching profile for {}: {e}", user.id));
                    None
                }
            },
            None => None,
        };
    }

    /// Username, falling back to the e-mail address.
    pub fn display_name(&self) -> Option<String> {
        let from_profile = self.profile.as_ref().and_then(|p| p.username.clone());
        from_profile.or_else(|| self.user.as_ref().and_then(|u| u.email.clone()))
    }

    pub fn is_admin(&self) -> bool {
        self.profile
            .as_ref()
            .and_then(|p| p.is_admin)
            .unwrap_or(false)
    }

    /// Where the search box navigates; nothing for blank input.
    pub fn search_route(&self) -> Option<Route> {
        let query = self.search_query.trim();
        if query.is_empty() {
            return None;
        }
        Some(Route::scripts(&ListingFilter {
            search: query.to_string(),
            ..Default::default()
        }))
    }

    pub async fn sign_in<A: AuthService>(
        &mut self,
        auth: &A,
        store: &SessionStore,
        email: &str,
        password: &str,
    ) -> Result<User> {
        let session = auth.sign_in_with_password(email, password).await?;
        let user = session.user.clone();
        store.sign_in(session);
        self.user = Some(user.clone());
        Ok(user)
    }

    /// Tell the provider, then clear the local session. A provider error is
    /// reported but the local session is cleared anyway.
    pub async fn sign_out<A: AuthService>(
        &mut self,
        auth: &A,
        store: &SessionStore,
        notifier: &Notifier,
    ) {
        if let Some(session) = store.reader().current() {
            if let Err(e) = auth.sign_out(&session).await {
                notifier.send(Toast::from_error("Error signing out", &e));
            }
        }
        store.sign_out();
        self.user = None;
        self.profile = None;
    }
}
