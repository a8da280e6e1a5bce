use serde::Serialize;

use crate::backend::DataService;
use crate::commands::notice::{Notifier, Toast};
use crate::error::Result;
use crate::models::{Script, ScriptFields};
use crate::repository::ScriptRepository;
use crate::routes::Route;

/// Local state of the upload form.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
    pub fields: ScriptFields,
    pub loading: bool,
    pub last_error: Option<Toast>,
}

/// Trimmed, non-empty and not already present.
fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&mut self, feature: &str) -> bool {
        push_unique(&mut self.fields.features, feature)
    }

    pub fn remove_feature(&mut self, feature: &str) {
        self.fields.features.retain(|f| f != feature);
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        push_unique(&mut self.fields.tags, tag)
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.fields.tags.retain(|t| t != tag);
    }

    /// The submit button is enabled only with every required field filled.
    pub fn can_submit(&self) -> bool {
        !self.loading && self.fields.missing_required().is_empty()
    }

    /// Insert the script. On success the caller navigates to the listing.
    pub async fn submit<B: DataService>(
        &mut self,
        repo: &ScriptRepository<B>,
        notifier: &Notifier,
    ) -> Result<(Script, Route)> {
        self.loading = true;
        let result = repo.create_script(self.fields.clone()).await;
        self.loading = false;

        match result {
            Ok(script) => {
                self.last_error = None;
                notifier.send(Toast::success(
                    "Script uploaded successfully!",
                    "Your script has been added to the platform",
                ));
                Ok((script, Route::Scripts { filter: Default::default() }))
            }
            Err(e) => {
                let toast = Toast::from_error("Error uploading script", &e);
                notifier.send(toast.clone());
                self.last_error = Some(toast);
                Err(e)
            }
        }
    }
}
