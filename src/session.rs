//! Process-wide session state.
//!
//! One `SessionStore` is created at startup and shut down on exit. Reading
//! the current session and listening for changes are separate capabilities:
//! `SessionReader` and `SessionChanges`.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::AuthService;
use crate::commands::config;
use crate::commands::logs::ActivityLog;
use crate::models::{Session, User};

/// Sign-in state transitions, as seen by subscribers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "data")]
pub enum AuthEvent {
    SignedIn { user: User },
    SignedOut,
}

pub struct SessionStore {
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    /// Start the store with whatever session was restored from disk.
    pub fn init(initial: Option<Session>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscribe(&self) -> SessionChanges {
        SessionChanges {
            rx: self.tx.subscribe(),
        }
    }

    pub fn sign_in(&self, session: Session) {
        self.tx.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    /// End every subscription and hand back the final session.
    pub fn shutdown(self) -> Option<Session> {
        let last = self.tx.borrow().clone();
        drop(self.tx);
        last
    }
}

/// Read-only view of the current session.
#[derive(Clone)]
pub struct SessionReader {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionReader {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.rx.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Bearer for outgoing requests. Expired sessions yield `None` so reads
    /// fall back to the anonymous key.
    pub fn access_token(&self) -> Option<String> {
        self.rx
            .borrow()
            .as_ref()
            .filter(|s| !s.is_expired())
            .map(|s| s.access_token.clone())
    }
}

/// Change notifications. `next()` returns `None` once the store shuts down.
pub struct SessionChanges {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionChanges {
    pub async fn next(&mut self) -> Option<AuthEvent> {
        self.rx.changed().await.ok()?;
        let event = match self.rx.borrow_and_update().as_ref() {
            Some(session) => AuthEvent::SignedIn {
                user: session.user.clone(),
            },
            None => AuthEvent::SignedOut,
        };
        Some(event)
    }

    /// The session at the time of the last notification.
    pub fn latest(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }
}

/// Persist the session into the config file on every change until shutdown.
/// Write failures go to the activity log.
pub fn persist_on_change(
    mut changes: SessionChanges,
    path: PathBuf,
    log: ActivityLog,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while changes.next().await.is_some() {
            let session = changes.latest();
            if let Err(e) = config::update_at(&path, |cfg| cfg.session = session) {
                log.error(
                    "session",
                    &format!("Failed to save session to {}: {e}", path.display()),
                );
            }
        }
    })
}

/// Replace an expired session with a refreshed one, or drop it when the
/// provider won't refresh it.
pub async fn refresh_if_expired<A: AuthService>(
    auth: &A,
    store: &SessionStore,
    log: &ActivityLog,
) {
    let Some(session) = store.reader().current() else {
        return;
    };
    if !session.is_expired() {
        return;
    }
    match session.refresh_token {
        Some(ref token) => match auth.refresh_session(token).await {
            Ok(fresh) => {
                log.log("session", &format!("Refreshed session for {}", fresh.user.id));
                store.sign_in(fresh);
            }
            Err(e) => {
                log.warn("session", &format!("Session refresh failed, signing out: {e}"));
                store.sign_out();
            }
        },
        None => {
            log.warn("session", "Session expired without a refresh token, signing out");
            store.sign_out();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::test_support::session;

    #[tokio::test]
    async fn test_reader_sees_current_session() {
        let store = SessionStore::init(None);
        let reader = store.reader();
        assert!(reader.current().is_none());

        store.sign_in(session("u-1"));
        assert_eq!(reader.user().map(|u| u.id), Some("u-1".to_string()));
        assert_eq!(reader.access_token().as_deref(), Some("token-u-1"));

        store.sign_out();
        assert!(reader.current().is_none());
    }

    #[tokio::test]
    async fn test_changes_fire_on_sign_in_and_out_then_end_at_shutdown() {
        let store = SessionStore::init(None);
        let mut changes = store.subscribe();

        store.sign_in(session("u-2"));
        match changes.next().await {
            Some(AuthEvent::SignedIn { user }) => assert_eq!(user.id, "u-2"),
            other => panic!("unexpected event: {other:?}"),
        }

        store.sign_out();
        assert_eq!(changes.next().await, Some(AuthEvent::SignedOut));

        assert!(store.shutdown().is_none());
        assert_eq!(changes.next().await, None);
    }

    #[tokio::test]
    async fn test_persist_on_change_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = SessionStore::init(None);
        let task =
            persist_on_change(store.subscribe(), path.clone(), ActivityLog::disabled());

        store.sign_in(session("u-3"));
        tokio::task::yield_now().await;
        let last = store.shutdown();
        task.await.unwrap();

        assert_eq!(last.map(|s| s.user.id), Some("u-3".to_string()));
        let saved = config::load_from(&path).unwrap();
        assert_eq!(saved.session.map(|s| s.user.id), Some("u-3".to_string()));
    }

    #[tokio::test]
    async fn test_failed_save_is_logged() {
        let logs = tempfile::tempdir().unwrap();
        let (log, writer) = ActivityLog::open(logs.path()).await.unwrap();
        // A directory where the config file should be makes the write fail.
        let blocked = tempfile::tempdir().unwrap();
        let store = SessionStore::init(None);
        let task = persist_on_change(store.subscribe(), blocked.path().to_path_buf(), log);

        store.sign_in(session("u-4"));
        store.shutdown();
        task.await.unwrap();
        writer.await.unwrap();

        let content = std::fs::read_to_string(logs.path().join("latest.log")).unwrap();
        assert!(content.contains("[session-err] Failed to save session to"));
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let backend = MemoryBackend::new();
        let user = backend.add_account("kid@example.com", "pw", None);
        let mut stale = backend.sign_in_with_password("kid@example.com", "pw").await.unwrap();
        stale.expires_at = Some(0);
        let store = SessionStore::init(Some(stale));
        assert!(store.reader().access_token().is_none());

        refresh_if_expired(&backend, &store, &ActivityLog::disabled()).await;
        let current = store.reader().current().unwrap();
        assert_eq!(current.user, user);
        assert!(!current.is_expired());
        assert_eq!(store.reader().access_token(), Some(current.access_token));
    }

    #[tokio::test]
    async fn test_unrefreshable_session_is_dropped() {
        let backend = MemoryBackend::new();
        let mut stale = session("ghost");
        stale.expires_at = Some(0);
        stale.refresh_token = Some("refresh-ghost".into());
        let store = SessionStore::init(Some(stale));

        refresh_if_expired(&backend, &store, &ActivityLog::disabled()).await;
        assert!(store.reader().current().is_none());
    }

    #[tokio::test]
    async fn test_live_session_is_left_alone() {
        let backend = MemoryBackend::new();
        let store = SessionStore::init(Some(session("u-5")));
        refresh_if_expired(&backend, &store, &ActivityLog::disabled()).await;
        assert_eq!(store.reader().access_token().as_deref(), Some("token-u-5"));
    }
}
