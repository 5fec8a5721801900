//! Content fingerprints.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// [`digest`] on the blocking pool, giving up after `limit`.
///
/// On timeout the caller stops waiting and gets
/// [`HashTimeout`](ErrorKind::HashTimeout); the hashing thread itself runs to
/// completion in the background.
pub async fn digest_bounded(content: Arc<[u8]>, limit: Duration) -> Result<String> {
    let task = tokio::task::spawn_blocking(move || digest(&content));
    match tokio::time::timeout(limit, task).await {
        Ok(joined) => joined.or_raise(|| ErrorKind::Hash),
        Err(_) => exn::bail!(ErrorKind::HashTimeout(limit)),
    }
}
