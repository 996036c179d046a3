//! Boundary adapter that lets a foreign host drive the session cache.
//!
//! The adapter only translates argument and result types; every decision
//! is made by [`SessionCache`].

pub mod surface;

use std::sync::Arc;

use crate::error::{BridgeError, StorageError};
use crate::session::SessionCache;
use crate::types::UserId;

pub use surface::{
    op, BridgeArgs, BridgeRequest, BridgeResponse, BridgeValue, ForeignUserId, HostSurface,
    OpHandler, HOST_ENV,
};

pub const OP_INIT_DB: &str = "initDB";
pub const OP_SAVE_USER_SESSION: &str = "saveUserSession";
pub const OP_GET_USER_SESSION: &str = "getUserSession";
pub const OP_DELETE_USER_SESSION: &str = "deleteUserSession";
pub const OP_CHECK_SESSION_EXISTS: &str = "checkSessionExists";

/// Stateless pass-through from foreign-side types to the session cache.
pub struct SessionBridge {
    cache: Arc<SessionCache>,
}

impl SessionBridge {
    pub fn new(cache: Arc<SessionCache>) -> Arc<Self> {
        Arc::new(Self { cache })
    }

    pub async fn init_db(&self) -> Result<(), StorageError> {
        self.cache.init_db().await
    }

    pub async fn save_user_session(&self, user_id: i128, data: &[u8]) -> Result<(), StorageError> {
        self.cache.save_user_session(UserId(user_id), data).await
    }

    pub async fn get_user_session(&self, user_id: i128) -> Result<Option<Vec<u8>>, StorageError> {
        self.cache.get_user_session(UserId(user_id)).await
    }

    pub async fn delete_user_session(&self, user_id: i128) -> Result<(), StorageError> {
        self.cache.delete_user_session(UserId(user_id)).await
    }

    pub async fn check_session_exists(&self, user_id: i128) -> Result<bool, StorageError> {
        self.cache.check_session_exists(UserId(user_id)).await
    }

    /// Register the five session operations on `surface`.
    ///
    /// Fails with [`BridgeError::AlreadyInstalled`] if the surface already
    /// carries an installed bridge.
    pub fn install(self: &Arc<Self>, surface: &mut HostSurface) -> Result<(), BridgeError> {
        surface.mark_installed()?;

        let bridge = Arc::clone(self);
        surface.register(
            OP_INIT_DB,
            op(move |_args| {
                let bridge = Arc::clone(&bridge);
                async move {
                    bridge.init_db().await?;
                    Ok::<_, BridgeError>(BridgeValue::Done)
                }
            }),
        );

        let bridge = Arc::clone(self);
        surface.register(
            OP_SAVE_USER_SESSION,
            op(move |mut args| {
                let bridge = Arc::clone(&bridge);
                async move {
                    let user_id = args.require_user()?;
                    let data = args.take_data()?;
                    bridge.save_user_session(user_id.get(), &data).await?;
                    Ok::<_, BridgeError>(BridgeValue::Done)
                }
            }),
        );

        let bridge = Arc::clone(self);
        surface.register(
            OP_GET_USER_SESSION,
            op(move |args| {
                let bridge = Arc::clone(&bridge);
                async move {
                    let user_id = args.require_user()?;
                    let value = match bridge.get_user_session(user_id.get()).await? {
                        Some(data) => BridgeValue::Bytes(data),
                        None => BridgeValue::Absent,
                    };
                    Ok::<_, BridgeError>(value)
                }
            }),
        );

        let bridge = Arc::clone(self);
        surface.register(
            OP_DELETE_USER_SESSION,
            op(move |args| {
                let bridge = Arc::clone(&bridge);
                async move {
                    let user_id = args.require_user()?;
                    bridge.delete_user_session(user_id.get()).await?;
                    Ok::<_, BridgeError>(BridgeValue::Done)
                }
            }),
        );

        let bridge = Arc::clone(self);
        surface.register(
            OP_CHECK_SESSION_EXISTS,
            op(move |args| {
                let bridge = Arc::clone(&bridge);
                async move {
                    let user_id = args.require_user()?;
                    let exists = bridge.check_session_exists(user_id.get()).await?;
                    Ok::<_, BridgeError>(BridgeValue::Flag(exists))
                }
            }),
        );

        Ok(())
    }
}
