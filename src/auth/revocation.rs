//! Revocation feed — immediate eviction of blacklisted tokens
//!
//! A logout/blacklist side channel pushes revoked-token fingerprints into an
//! mpsc feed; the listener evicts each from the credential cache so the next
//! use re-verifies instead of trusting a stale entry. Fleet-wide revocation
//! arrives over a shared-store pub/sub channel feeding the same path.

use crate::auth::cache::CredentialCache;
use crate::error::Result;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Pause before re-subscribing after a dropped subscription
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Buffered sender half handed to the revocation side channel
pub type RevocationSender = mpsc::Sender<String>;

/// Create a revocation feed and spawn its listener.
///
/// The task ends when every sender is dropped.
pub fn spawn_revocation_listener(
    cache: Arc<CredentialCache>,
    buffer: usize,
) -> (RevocationSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<String>(buffer);
    let handle = tokio::spawn(async move {
        while let Some(fingerprint) = rx.recv().await {
            let evicted = cache.revoke(&fingerprint);
            tracing::debug!(fingerprint = %fingerprint, evicted, "Revocation processed");
        }
    });
    (tx, handle)
}

/// Subscribe to a shared-store channel publishing revoked fingerprints and
/// forward each message into the feed.
///
/// Pub/sub needs its own connection, not the multiplexed one. A dropped
/// subscription re-subscribes after a short pause until the feed closes.
pub fn spawn_revocation_subscriber(
    redis_url: &str,
    channel: impl Into<String>,
    feed: RevocationSender,
) -> Result<JoinHandle<()>> {
    let client = redis::Client::open(redis_url)?;
    let channel = channel.into();
    let handle = tokio::spawn(async move {
        loop {
            if let Err(e) = pump_revocations(&client, &channel, &feed).await {
                tracing::warn!(
                    channel = %channel,
                    error = %e,
                    "Revocation subscription lost, re-subscribing"
                );
            }
            if feed.is_closed() {
                return;
            }
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
        }
    });
    Ok(handle)
}

async fn pump_revocations(
    client: &redis::Client,
    channel: &str,
    feed: &RevocationSender,
) -> Result<()> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    tracing::info!(channel = %channel, "Revocation channel subscribed");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let fingerprint: String = msg.get_payload()?;
        if feed.send(fingerprint).await.is_err() {
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::JwtClaims;
    use std::collections::HashMap;
    use std::time::Duration;

    fn claims() -> JwtClaims {
        JwtClaims {
            sub: "user-1".to_string(),
            username: String::new(),
            iss: "test".to_string(),
            roles: vec![],
            tenant: None,
            iat: 0,
            exp: i64::MAX,
            extra: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_revocation_evicts_cached_entry() {
        let cache = Arc::new(CredentialCache::new(100));
        cache.insert("fp1".to_string(), claims(), Duration::from_secs(60));
        assert!(cache.get("fp1").is_some());

        let (tx, handle) = spawn_revocation_listener(cache.clone(), 8);
        tx.send("fp1".to_string()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(cache.get("fp1").is_none());
    }

    #[tokio::test]
    async fn test_unknown_fingerprint_is_harmless() {
        let cache = Arc::new(CredentialCache::new(100));
        let (tx, handle) = spawn_revocation_listener(cache, 8);
        tx.send("never-seen".to_string()).await.unwrap();
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_rejects_invalid_url() {
        let cache = Arc::new(CredentialCache::new(100));
        let (tx, _handle) = spawn_revocation_listener(cache, 8);
        assert!(spawn_revocation_subscriber("not-a-redis-url", "revocations", tx).is_err());
    }

    #[tokio::test]
    async fn test_direct_feed_works_while_subscription_retries() {
        let cache = Arc::new(CredentialCache::new(100));
        cache.insert("fp1".to_string(), claims(), Duration::from_secs(60));

        let (tx, _listener) = spawn_revocation_listener(cache.clone(), 8);
        // Nothing listens on this port; the subscriber keeps retrying
        let subscriber =
            spawn_revocation_subscriber("redis://127.0.0.1:1", "revocations", tx.clone()).unwrap();

        tx.send("fp1".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get("fp1").is_none());

        subscriber.abort();
    }
}
