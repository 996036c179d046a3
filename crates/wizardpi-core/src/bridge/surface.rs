use std::collections::BTreeMap;
use std::future::Future;
use std::io::IsTerminal;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::BridgeError;
use crate::types::UserId;

/// Env var that marks the process as driven by a foreign host.
pub const HOST_ENV: &str = "WIZARDPI_HOST";

/// User id as the foreign side sends it: a JSON number, or a decimal
/// string for values a JSON number cannot carry exactly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ForeignUserId {
    Signed(i64),
    Unsigned(u64),
    Text(String),
}

impl TryFrom<ForeignUserId> for UserId {
    type Error = BridgeError;

    fn try_from(id: ForeignUserId) -> Result<Self, Self::Error> {
        match id {
            ForeignUserId::Signed(n) => Ok(UserId::from(n)),
            ForeignUserId::Unsigned(n) => Ok(UserId::from(n)),
            ForeignUserId::Text(s) => s
                .parse::<UserId>()
                .map_err(|e| BridgeError::BadRequest(format!("invalid user_id {:?}: {}", s, e))),
        }
    }
}

/// One call from the foreign host.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeRequest {
    #[serde(default)]
    pub id: Value,
    pub op: String,
    #[serde(default)]
    pub user_id: Option<ForeignUserId>,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
}

/// Reply sent back to the foreign host, one JSON object per line.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeResponse {
    pub id: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl BridgeResponse {
    fn success(id: Value, value: BridgeValue) -> Self {
        Self {
            id,
            ok: true,
            value: Some(value.into_json()),
            error: None,
            kind: None,
        }
    }

    fn failure(id: Value, err: &BridgeError) -> Self {
        Self {
            id,
            ok: false,
            value: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

/// Decoded arguments handed to an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeArgs {
    pub user_id: Option<UserId>,
    pub data: Option<Vec<u8>>,
}

impl BridgeArgs {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn require_user(&self) -> Result<UserId, BridgeError> {
        self.user_id
            .ok_or_else(|| BridgeError::BadRequest("missing user_id".to_string()))
    }

    pub fn take_data(&mut self) -> Result<Vec<u8>, BridgeError> {
        self.data
            .take()
            .ok_or_else(|| BridgeError::BadRequest("missing data".to_string()))
    }
}

/// Result of an operation, before JSON encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeValue {
    /// Operation completed with nothing to return.
    Done,
    Flag(bool),
    Bytes(Vec<u8>),
    /// No session stored; the host sees `null`.
    Absent,
}

impl BridgeValue {
    pub fn into_json(self) -> Value {
        match self {
            BridgeValue::Done | BridgeValue::Absent => Value::Null,
            BridgeValue::Flag(b) => Value::Bool(b),
            BridgeValue::Bytes(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
        }
    }
}

pub type OpHandler =
    Box<dyn Fn(BridgeArgs) -> BoxFuture<'static, Result<BridgeValue, BridgeError>> + Send + Sync>;

/// Wrap an async closure as an [`OpHandler`].
pub fn op<F, Fut>(f: F) -> OpHandler
where
    F: Fn(BridgeArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BridgeValue, BridgeError>> + Send + 'static,
{
    Box::new(move |args| Box::pin(f(args)))
}

/// Operation table reachable by a foreign host.
///
/// Operations are registered explicitly at startup; nothing is installed
/// implicitly. An adapter may be installed onto a surface only once.
#[derive(Default)]
pub struct HostSurface {
    ops: BTreeMap<&'static str, OpHandler>,
    installed: bool,
}

impl HostSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface for the current process, if a foreign host is driving it
    /// (stdin is piped, or `WIZARDPI_HOST` is set).
    pub fn detect() -> Option<Self> {
        let forced = std::env::var_os(HOST_ENV).is_some();
        if forced || !std::io::stdin().is_terminal() {
            Some(Self::new())
        } else {
            None
        }
    }

    pub fn register(&mut self, name: &'static str, handler: OpHandler) {
        self.ops.insert(name, handler);
    }

    pub(crate) fn mark_installed(&mut self) -> Result<(), BridgeError> {
        if self.installed {
            return Err(BridgeError::AlreadyInstalled);
        }
        self.installed = true;
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Registered operation names, sorted.
    pub fn op_names(&self) -> Vec<&'static str> {
        self.ops.keys().copied().collect()
    }

    pub async fn call(&self, op: &str, args: BridgeArgs) -> Result<BridgeValue, BridgeError> {
        let handler = self
            .ops
            .get(op)
            .ok_or_else(|| BridgeError::UnknownOp(op.to_string()))?;
        handler(args).await
    }

    pub async fn handle(&self, request: BridgeRequest) -> BridgeResponse {
        debug!("Bridge call {} (id {})", request.op, request.id);
        let BridgeRequest { id, op, user_id, data } = request;

        let user_id = match user_id.map(UserId::try_from).transpose() {
            Ok(user_id) => user_id,
            Err(e) => return BridgeResponse::failure(id, &e),
        };

        match self.call(&op, BridgeArgs { user_id, data }).await {
            Ok(value) => BridgeResponse::success(id, value),
            Err(e) => BridgeResponse::failure(id, &e),
        }
    }

    /// Serve JSON-line requests until the reader is exhausted.
    ///
    /// Requests are answered one at a time, in arrival order. Returns the
    /// number of requests answered.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut answered = 0;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match decode_request(line) {
                Ok(request) => self.handle(request).await,
                Err((id, e)) => BridgeResponse::failure(id, &e),
            };

            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
            answered += 1;
        }

        Ok(answered)
    }
}

/// Decode one request line. Once the line is valid JSON, a failure keeps
/// the caller's `id` so the host can match the reply.
fn decode_request(line: &str) -> Result<BridgeRequest, (Value, BridgeError)> {
    let raw: Value = serde_json::from_str(line)
        .map_err(|e| (Value::Null, BridgeError::BadRequest(e.to_string())))?;
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(raw).map_err(|e| (id, BridgeError::BadRequest(e.to_string())))
}
