//! User-facing alert abstraction.

use async_trait::async_trait;

use crate::error::Result;

/// Presents a blocking alert to the user.
///
/// - **iOS**: `UIAlertController`
/// - **Android**: `AlertDialog`
/// - **Desktop**: stderr or a native dialog
///
/// Implementations resolve once the alert has been shown (or acknowledged,
/// where the platform supports it).
#[async_trait]
pub trait AlertPresenter: Send + Sync {
    async fn alert(&self, title: &str, message: &str) -> Result<()>;
}
