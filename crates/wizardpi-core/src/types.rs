use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable numeric identity of an end user, issued by the host platform.
///
/// Wide enough for any signed or unsigned 64-bit id the platform hands
/// out. Serializes as a plain JSON number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i128);

impl UserId {
    /// Canonical key used by every storage engine.
    ///
    /// Decimal form of the id; distinct ids never share a key, and keys are
    /// never parsed back into numbers.
    pub fn storage_key(&self) -> String {
        self.0.to_string()
    }

    pub fn get(&self) -> i128 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id.into())
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        UserId(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i128>().map(UserId)
    }
}

/// Lifecycle step reported to the backend instead of free-form text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStep {
    MiniAppInitialized,
    LoginStart,
    SignOut,
}

impl fmt::Display for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStep::MiniAppInitialized => write!(f, "MINI_APP_INITIALIZED"),
            ActionStep::LoginStart => write!(f, "LOGIN_START"),
            ActionStep::SignOut => write!(f, "SIGN_OUT"),
        }
    }
}

impl FromStr for ActionStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "MINI_APP_INITIALIZED" => Ok(ActionStep::MiniAppInitialized),
            "LOGIN_START" => Ok(ActionStep::LoginStart),
            "SIGN_OUT" => Ok(ActionStep::SignOut),
            other => Err(format!("unknown action step: {}", other)),
        }
    }
}

/// Authentication stage labels the backend may attach to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStage {
    TwoFAPassRequest,
    AuthSuccess,
    AuthError,
    SignedOut,
    MiniAppInitConfirmed,
}

/// Request body for the backend's user-action endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActionPayload {
    pub user_id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_step: Option<ActionStep>,
    /// Current session blob as an array of byte values; `[]` when the user
    /// has no session yet.
    #[serde(default)]
    pub session_data: Vec<u8>,
}

impl UserActionPayload {
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            action: None,
            action_step: None,
            session_data: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_step(mut self, step: ActionStep) -> Self {
        self.action_step = Some(step);
        self
    }

    pub fn with_session(mut self, session: Option<Vec<u8>>) -> Self {
        self.session_data = session.unwrap_or_default();
        self
    }
}

/// What the caller wants the backend to do for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Free-form text typed by the user (or a pressed button label).
    Message(String),
    Step(ActionStep),
}

/// Response from the backend's user-action endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub message: String,
    #[serde(default)]
    pub buttons: Vec<String>,
    #[serde(default)]
    pub action_buttons: Vec<String>,
    #[serde(default)]
    pub can_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<AuthStage>,
}

impl ServerResponse {
    /// Updated session blob to persist, if the backend sent a non-empty one.
    pub fn new_session(&self) -> Option<&[u8]> {
        self.session_data
            .as_deref()
            .filter(|data| !data.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_is_decimal() {
        assert_eq!(UserId(42).storage_key(), "42");
        assert_eq!(UserId(-7).storage_key(), "-7");
        assert_eq!(UserId::from(i64::MAX).storage_key(), "9223372036854775807");
        assert_eq!(UserId::from(u64::MAX).storage_key(), "18446744073709551615");
        assert_ne!(UserId(12).storage_key(), UserId(-12).storage_key());
        assert_ne!(
            UserId::from(u64::MAX).storage_key(),
            UserId::from(-1i64).storage_key()
        );
    }

    #[test]
    fn test_user_id_parse() {
        assert_eq!(" 42 ".parse::<UserId>().unwrap(), UserId(42));
        assert!("abc".parse::<UserId>().is_err());
        assert_eq!(
            "9223372036854775808".parse::<UserId>().unwrap(),
            UserId(9_223_372_036_854_775_808)
        );
        assert!("1e3".parse::<UserId>().is_err());
        assert!("999999999999999999999999999999999999999999".parse::<UserId>().is_err());
    }

    #[test]
    fn test_action_step_parse() {
        assert_eq!("login_start".parse::<ActionStep>().unwrap(), ActionStep::LoginStart);
        assert_eq!("sign-out".parse::<ActionStep>().unwrap(), ActionStep::SignOut);
        assert!("reboot".parse::<ActionStep>().is_err());
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = UserActionPayload::new(UserId(42), "alice")
            .with_step(ActionStep::MiniAppInitialized)
            .with_session(Some(vec![0, 1, 255]));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "user_id": 42,
                "username": "alice",
                "action_step": "MINI_APP_INITIALIZED",
                "session_data": [0, 1, 255],
            })
        );
    }

    #[test]
    fn test_payload_without_session_sends_empty_array() {
        let payload = UserActionPayload::new(UserId(1), "bob").with_action("hello");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["action"], "hello");
        assert_eq!(json["session_data"], serde_json::json!([]));
        assert!(json.get("action_step").is_none());
    }

    #[test]
    fn test_response_decoding() {
        let resp: ServerResponse = serde_json::from_str(
            r#"{
                "message": "Welcome",
                "buttons": ["Login"],
                "action_buttons": [],
                "can_input": false,
                "session_data": [9, 8, 7],
                "stage": "AuthSuccess"
            }"#,
        )
        .unwrap();
        assert_eq!(resp.message, "Welcome");
        assert_eq!(resp.stage, Some(AuthStage::AuthSuccess));
        assert_eq!(resp.new_session(), Some(&[9u8, 8, 7][..]));
        assert!(resp.avatar_url.is_none());
    }

    #[test]
    fn test_response_minimal_and_empty_session() {
        let resp: ServerResponse =
            serde_json::from_str(r#"{"message": "hi", "session_data": []}"#).unwrap();
        assert!(resp.buttons.is_empty());
        assert!(!resp.can_input);
        assert!(resp.new_session().is_none());
    }

    #[test]
    fn test_response_rejects_bad_bytes_and_unknown_stage() {
        assert!(serde_json::from_str::<ServerResponse>(r#"{"message": "x", "session_data": [256]}"#).is_err());
        assert!(serde_json::from_str::<ServerResponse>(r#"{"message": "x", "stage": "Nope"}"#).is_err());
    }
}
