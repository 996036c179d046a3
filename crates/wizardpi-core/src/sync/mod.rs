pub mod client;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::{NetworkError, SyncError};
use crate::session::SessionCache;
use crate::types::{AuthStage, ServerResponse, UserAction, UserActionPayload, UserId};

pub use client::RemoteSyncClient;

/// Trait for the request/response channel to the remote backend.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Send one user action together with the current session blob.
    async fn send(&self, payload: &UserActionPayload) -> Result<ServerResponse, NetworkError>;

    /// Look up the user's avatar. Failures of any kind yield `None`.
    async fn fetch_avatar(&self, user_id: UserId) -> Option<String>;
}

/// Write-through flow between the local session cache and the backend.
///
/// Each `perform` reads the stored blob, ships it with the action, and
/// persists whatever session the backend hands back.
pub struct SessionSync {
    cache: Arc<SessionCache>,
    transport: Arc<dyn SyncTransport>,
}

impl SessionSync {
    pub fn new(cache: Arc<SessionCache>, transport: Arc<dyn SyncTransport>) -> Self {
        Self { cache, transport }
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub async fn perform(
        &self,
        user_id: UserId,
        username: &str,
        action: UserAction,
    ) -> Result<ServerResponse, SyncError> {
        let session = self.cache.extract_session(user_id).await?.into_option();

        let payload = UserActionPayload::new(user_id, username).with_session(session);
        let payload = match action {
            UserAction::Message(text) => payload.with_action(text),
            UserAction::Step(step) => payload.with_step(step),
        };

        let response = self.transport.send(&payload).await?;

        if let Some(data) = response.new_session() {
            self.cache.save_user_session(user_id, data).await?;
        }
        if response.stage == Some(AuthStage::SignedOut) {
            info!("User {} signed out, dropping local session", user_id);
            self.cache.delete_user_session(user_id).await?;
        }

        Ok(response)
    }

    pub async fn avatar(&self, user_id: UserId) -> Option<String> {
        self.transport.fetch_avatar(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::store::MemoryKvStore;
    use crate::types::ActionStep;
    use std::sync::Mutex;

    /// Transport that records payloads and replays canned responses.
    struct ScriptedTransport {
        sent: Mutex<Vec<UserActionPayload>>,
        replies: Mutex<Vec<Result<ServerResponse, NetworkError>>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<ServerResponse, NetworkError>>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                replies: Mutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl SyncTransport for ScriptedTransport {
        async fn send(&self, payload: &UserActionPayload) -> Result<ServerResponse, NetworkError> {
            self.sent.lock().unwrap().push(payload.clone());
            self.replies.lock().unwrap().remove(0)
        }

        async fn fetch_avatar(&self, _user_id: UserId) -> Option<String> {
            None
        }
    }

    fn reply(session: Option<Vec<u8>>, stage: Option<AuthStage>) -> ServerResponse {
        ServerResponse {
            message: "ok".to_string(),
            buttons: Vec::new(),
            action_buttons: Vec::new(),
            can_input: false,
            avatar_url: None,
            session_data: session,
            stage,
        }
    }

    async fn ready_cache() -> Arc<SessionCache> {
        let cache = Arc::new(SessionCache::new(Arc::new(MemoryKvStore::new())));
        cache.init_db().await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_new_session_is_persisted() {
        let cache = ready_cache().await;
        let transport = ScriptedTransport::new(vec![
            Ok(reply(Some(vec![5, 6]), Some(AuthStage::AuthSuccess))),
            Ok(reply(None, None)),
        ]);
        let sync = SessionSync::new(cache.clone(), transport.clone());

        sync.perform(UserId(42), "alice", UserAction::Step(ActionStep::LoginStart))
            .await
            .unwrap();
        assert_eq!(cache.get_user_session(UserId(42)).await.unwrap(), Some(vec![5, 6]));

        // The next request carries the stored blob.
        sync.perform(UserId(42), "alice", UserAction::Message("hello".into()))
            .await
            .unwrap();
        let sent = transport.sent.lock().unwrap();
        assert!(sent[0].session_data.is_empty());
        assert_eq!(sent[1].session_data, vec![5, 6]);
        assert_eq!(sent[1].action.as_deref(), Some("hello"));
        // A response without a session leaves the stored one alone.
        drop(sent);
        assert_eq!(cache.get_user_session(UserId(42)).await.unwrap(), Some(vec![5, 6]));
    }

    #[tokio::test]
    async fn test_sign_out_deletes_session() {
        let cache = ready_cache().await;
        cache.save_user_session(UserId(7), &[1]).await.unwrap();
        let transport = ScriptedTransport::new(vec![Ok(reply(None, Some(AuthStage::SignedOut)))]);
        let sync = SessionSync::new(cache.clone(), transport);

        sync.perform(UserId(7), "bob", UserAction::Step(ActionStep::SignOut))
            .await
            .unwrap();
        assert!(!cache.check_session_exists(UserId(7)).await.unwrap());
    }

    #[tokio::test]
    async fn test_network_error_leaves_store_untouched() {
        let cache = ready_cache().await;
        cache.save_user_session(UserId(7), &[1]).await.unwrap();
        let transport = ScriptedTransport::new(vec![Err(NetworkError::Status {
            status: 500,
            body: String::new(),
        })]);
        let sync = SessionSync::new(cache.clone(), transport);

        let err = sync
            .perform(UserId(7), "bob", UserAction::Message("hi".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Network(NetworkError::Status { status: 500, .. })));
        assert_eq!(cache.get_user_session(UserId(7)).await.unwrap(), Some(vec![1]));
    }

    #[tokio::test]
    async fn test_uninitialized_cache_fails_before_sending() {
        let cache = Arc::new(SessionCache::new(Arc::new(MemoryKvStore::new())));
        let transport = ScriptedTransport::new(vec![Ok(reply(None, None))]);
        let sync = SessionSync::new(cache, transport.clone());

        let err = sync
            .perform(UserId(1), "x", UserAction::Message("hi".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Storage(StorageError::NotInitialized)));
        assert!(transport.sent.lock().unwrap().is_empty());
    }
}
