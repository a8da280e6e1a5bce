use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    Default,
    Destructive,
}

/// A transient, user-visible notification.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Toast {
    pub fn success(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            variant: Variant::Default,
        }
    }

    /// Error toast. Missing sessions get the sign-in prompt instead of `title`.
    pub fn from_error(title: &str, err: &AppError) -> Self {
        let (title, description) = match err {
            AppError::Unauthorized(msg) => ("Sign in required".to_string(), msg.clone()),
            AppError::Validation(msg) => ("Missing information".to_string(), msg.clone()),
            AppError::Backend { message, .. } => (title.to_string(), message.clone()),
            other => (title.to_string(), other.to_string()),
        };
        Self {
            title,
            description,
            variant: Variant::Destructive,
        }
    }
}

/// Where views post their toasts. Closed or absent receivers are ignored.
#[derive(Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Toast>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn send(&self, toast: Toast) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(toast);
        }
    }
}
