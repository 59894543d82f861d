//! Named request/response channel.
//!
//! A [`MethodChannel`] carries [`MethodCall`]s from the UI layer to a single
//! attached [`MethodCallHandler`] and returns exactly one [`MethodResponse`]
//! per call. Calls are handled one at a time, each to completion, in the
//! order they arrive.
//!
//! On the wire (see [`MethodCall::from_frame`] and
//! [`MethodResponse::to_frame`]) both sides are single-line JSON:
//!
//! ```text
//! → {"method":"saveTask","arguments":{"label":"bank"}}
//! ← {"status":"success","result":null}
//! → {"method":"nope"}
//! ← {"status":"not_implemented"}
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{ErrorCode, Result};

/// Channel name the sms-forwarder UI binds to.
pub const DEFAULT_CHANNEL_NAME: &str = "sms_forwarder";

/// One request: a method name and an optional argument payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Option<Value>) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Decode a single JSON wire frame.
    pub fn from_frame(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }

    /// The arguments as a field mapping, if they are one.
    pub fn arguments_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.arguments.as_ref().and_then(Value::as_object)
    }

    /// A single named argument, looked up in an object payload.
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments_object().and_then(|args| args.get(key))
    }
}

/// The answer to one [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    /// The method ran; `result` is its payload (`null` for void methods).
    Success { result: Value },
    /// The method is known but failed.
    Error {
        code: ErrorCode,
        message: String,
        details: Option<Value>,
    },
    /// The method name is unknown to the handler. Not an error: it tells
    /// the caller the capability does not exist.
    NotImplemented,
}

impl MethodResponse {
    pub fn success(result: impl Into<Value>) -> Self {
        Self::Success {
            result: result.into(),
        }
    }

    /// Success with a `null` payload.
    pub fn ok() -> Self {
        Self::Success {
            result: Value::Null,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error code, if this is an error response.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Encode as a single JSON wire frame.
    pub fn to_frame(&self) -> String {
        // Every variant holds only strings and JSON values, so this cannot fail.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","code":"UNAVAILABLE","message":"unencodable response: {e}","details":null}}"#
            )
        })
    }
}

/// Receives every call made on a [`MethodChannel`].
#[async_trait]
pub trait MethodCallHandler: Send + Sync {
    async fn handle(&self, call: &MethodCall) -> MethodResponse;
}

/// A named channel with at most one attached handler.
pub struct MethodChannel {
    name: String,
    handler: Mutex<Option<Arc<dyn MethodCallHandler>>>,
}

impl MethodChannel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach `handler`, replacing any previous one.
    pub async fn set_method_call_handler(&self, handler: Arc<dyn MethodCallHandler>) {
        tracing::info!(channel = %self.name, "method call handler attached");
        *self.handler.lock().await = Some(handler);
    }

    /// Detach the current handler. Later calls answer `UNAVAILABLE`.
    pub async fn clear_method_call_handler(&self) {
        if self.handler.lock().await.take().is_some() {
            tracing::info!(channel = %self.name, "method call handler detached");
        }
    }

    /// Deliver `call` and wait for its response.
    ///
    /// The handler lock is held for the whole call, so concurrent callers
    /// are served strictly one after another.
    pub async fn invoke(&self, call: MethodCall) -> MethodResponse {
        let guard = self.handler.lock().await;
        let Some(handler) = &*guard else {
            tracing::warn!(channel = %self.name, method = %call.method, "no handler attached");
            return MethodResponse::error(ErrorCode::Unavailable, "Handler not available");
        };

        let response = handler.handle(&call).await;
        tracing::debug!(
            channel = %self.name,
            method = %call.method,
            success = response.is_success(),
            "method call handled"
        );
        response
    }

    /// Decode a wire frame, deliver it, and encode the answer.
    ///
    /// A frame that is not a method call is answered with
    /// `INVALID_ARGUMENTS` instead of being dropped.
    pub async fn invoke_frame(&self, frame: &str) -> String {
        let response = match MethodCall::from_frame(frame) {
            Ok(call) => self.invoke(call).await,
            Err(err) => {
                tracing::warn!(channel = %self.name, %err, "rejecting malformed frame");
                MethodResponse::error(ErrorCode::InvalidArguments, err.to_string())
            }
        };
        response.to_frame()
    }
}

impl Default for MethodChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_NAME)
    }
}
