//! Maps method calls onto the task and log store.
//!
//! | Method | Arguments | Result | Errors |
//! |---|---|---|---|
//! | `getTasks` | — | JSON array string | — |
//! | `saveTask` | task object | `null` | `INVALID_ARGUMENTS`, `SAVE_ERROR` |
//! | `deleteTask` | `{taskId}` | `null` | `INVALID_ARGUMENTS`, `DELETE_ERROR` |
//! | `getLogs` | `{limit?}` | JSON array string | `LOGS_ERROR` |
//! | `clearLogs` | — | `null` | — |
//!
//! Any other method answers `NotImplemented`.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use smsfwd_store::{TaskLogStore, coerce_id};

use crate::channel::{MethodCall, MethodCallHandler, MethodResponse};
use crate::error::{ErrorCode, Result};

pub const GET_TASKS: &str = "getTasks";
pub const SAVE_TASK: &str = "saveTask";
pub const DELETE_TASK: &str = "deleteTask";
pub const GET_LOGS: &str = "getLogs";
pub const CLEAR_LOGS: &str = "clearLogs";

/// Number of log records `getLogs` returns when no usable limit is given.
pub const DEFAULT_LOG_LIMIT: i64 = 200;

/// [`MethodCallHandler`] backed by a [`TaskLogStore`].
///
/// The store lives until [`StoreMethodHandler::shutdown`]; after that every
/// call answers `UNAVAILABLE`.
pub struct StoreMethodHandler {
    store: Mutex<Option<TaskLogStore>>,
    default_log_limit: i64,
}

impl StoreMethodHandler {
    pub fn new(store: TaskLogStore) -> Self {
        Self {
            store: Mutex::new(Some(store)),
            default_log_limit: DEFAULT_LOG_LIMIT,
        }
    }

    /// Override the `getLogs` fallback limit.
    #[must_use]
    pub fn with_default_log_limit(mut self, limit: i64) -> Self {
        self.default_log_limit = limit;
        self
    }

    /// Flush and release the store. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(store) = self.store.lock().await.take() else {
            return Ok(());
        };
        store.shutdown().await?;
        info!("store method handler shut down");
        Ok(())
    }

    fn log_limit(&self, call: &MethodCall) -> i64 {
        // Only a 32-bit integer is honored; anything else means "default".
        call.argument("limit")
            .and_then(Value::as_i64)
            .filter(|limit| i32::try_from(*limit).is_ok())
            .unwrap_or(self.default_log_limit)
    }
}

#[async_trait]
impl MethodCallHandler for StoreMethodHandler {
    async fn handle(&self, call: &MethodCall) -> MethodResponse {
        let mut guard = self.store.lock().await;
        let Some(store) = &mut *guard else {
            return MethodResponse::error(ErrorCode::Unavailable, "Store not available");
        };

        match call.method.as_str() {
            GET_TASKS => {
                let json = store.tasks_json().unwrap_or_else(|err| {
                    warn!(%err, "failed to encode tasks, answering empty list");
                    "[]".to_string()
                });
                MethodResponse::success(json)
            }
            SAVE_TASK => {
                let Some(task) = call.arguments_object() else {
                    return MethodResponse::error(
                        ErrorCode::InvalidArguments,
                        "Invalid arguments for saveTask",
                    );
                };
                match store.save_task(task.clone()).await {
                    Ok(_) => MethodResponse::ok(),
                    Err(err) => MethodResponse::error(
                        ErrorCode::SaveError,
                        format!("Failed to save task: {err}"),
                    ),
                }
            }
            DELETE_TASK => {
                let Some(task_id) = call.argument("taskId").and_then(coerce_id) else {
                    return MethodResponse::error(
                        ErrorCode::InvalidArguments,
                        "Invalid arguments for deleteTask",
                    );
                };
                match store.delete_task(task_id).await {
                    Ok(_) => MethodResponse::ok(),
                    Err(err) => MethodResponse::error(
                        ErrorCode::DeleteError,
                        format!("Failed to delete task: {err}"),
                    ),
                }
            }
            GET_LOGS => match store.logs_json(self.log_limit(call)) {
                Ok(json) => MethodResponse::success(json),
                Err(err) => {
                    MethodResponse::error(ErrorCode::LogsError, format!("Failed to get logs: {err}"))
                }
            },
            CLEAR_LOGS => {
                store.clear_logs().await;
                MethodResponse::ok()
            }
            _ => MethodResponse::NotImplemented,
        }
    }
}
