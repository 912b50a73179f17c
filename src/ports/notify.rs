use async_trait::async_trait;
use thiserror::Error;

/// Notification delivery error type
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("notifier misconfigured: {0}")]
    Config(String),
}

/// Best-effort alert delivery to a user's external channel.
///
/// Callers make at most one attempt per alert per cycle and swallow
/// failures; a dropped alert degrades UX, not correctness.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes alerts to the log instead of delivering them.
/// Used when no delivery channel is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        tracing::info!("alert for {}: {}", chat_id, text.replace('\n', " | "));
        Ok(())
    }
}
