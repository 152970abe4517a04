use paytrail_core::RunStateError;
use paytrail_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("register source unavailable: {0}")]
    Unavailable(String),
    #[error("dump file: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("another sync run holds the lock")]
    AlreadyRunning,
    #[error("sync run exceeded its {0}s deadline")]
    TimedOut(u64),
    #[error("run state: {0}")]
    RunState(#[from] RunStateError),
}
