//! Alert presenter for terminal-hosted desktop builds.

use async_trait::async_trait;
use bridge_traits::{alert::AlertPresenter, error::Result};
use tracing::warn;

/// Writes alerts to stderr. There is no dialog to acknowledge, so `alert`
/// returns as soon as the message is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleAlertPresenter;

#[async_trait]
impl AlertPresenter for ConsoleAlertPresenter {
    async fn alert(&self, title: &str, message: &str) -> Result<()> {
        warn!(title = title, "Presenting alert");
        eprintln!("{}: {}", title, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_alert_succeeds() {
        let presenter = ConsoleAlertPresenter;
        assert!(presenter.alert("Sign-in failed", "cancel").await.is_ok());
    }
}
