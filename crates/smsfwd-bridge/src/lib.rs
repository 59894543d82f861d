//! # smsfwd-bridge
//!
//! The request/response surface of the sms-forwarder store.
//!
//! - **[`channel`]** -- [`MethodCall`] / [`MethodResponse`] types, their
//!   single-line JSON wire form, and the [`MethodChannel`] that serializes
//!   calls onto one attached [`MethodCallHandler`].
//! - **[`handler`]** -- [`StoreMethodHandler`], which answers `getTasks`,
//!   `saveTask`, `deleteTask`, `getLogs` and `clearLogs` from a
//!   [`smsfwd_store::TaskLogStore`].
//! - **[`error`]** -- caller-facing [`ErrorCode`]s and the bridge's own
//!   [`BridgeError`].

pub mod channel;
pub mod error;
pub mod handler;

pub use channel::{
    DEFAULT_CHANNEL_NAME, MethodCall, MethodCallHandler, MethodChannel, MethodResponse,
};
pub use error::{BridgeError, ErrorCode, Result};
pub use handler::{DEFAULT_LOG_LIMIT, StoreMethodHandler};
