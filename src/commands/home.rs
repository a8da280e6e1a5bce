use serde::Serialize;

use crate::backend::DataService;
use crate::demo;
use crate::models::Script;
use crate::repository::ScriptRepository;

/// Home page: the newest scripts, or the showcase until real ones arrive.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeView {
    pub recent: Vec<Script>,
    pub showcase: bool,
}

impl Default for HomeView {
    fn default() -> Self {
        Self {
            recent: demo::showcase(),
            showcase: true,
        }
    }
}

impl HomeView {
    /// Errors and empty results keep whatever is on screen.
    pub async fn load<B: DataService>(&mut self, repo: &ScriptRepository<B>) {
        match repo.recent_scripts().await {
            Ok(scripts) if !scripts.is_empty() => {
                self.recent = scripts;
                self.showcase = false;
            }
            Ok(_) => {}
            Err(e) => repo.log().error("home", &format!("Error loading scripts: {e}")),
        }
    }
}
