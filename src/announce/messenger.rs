use std::{fmt, future::Future, time::Duration};

use async_trait::async_trait;
use log::warn;

use super::ReactionTally;

/// Location of a message posted by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.message_id)
    }
}

/// Everything the scheduler needs from the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn post(&self, channel_id: &str, content: &str) -> anyhow::Result<MessageRef>;

    async fn react(&self, message: &MessageRef, emoji: &str) -> anyhow::Result<()>;

    /// Current reactions of a message, `None` when the message no longer exists.
    async fn reactions(&self, message: &MessageRef) -> anyhow::Result<Option<ReactionTally>>;

    /// Text mentioning the role called `role_name` in the guild owning `channel_id`.
    async fn role_mention(&self, channel_id: &str, role_name: &str) -> anyhow::Result<String>;
}

/// Bounded retries with a doubling delay for outbound platform calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::ZERO,
        }
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {:#}, retrying in {:?}",
                        label, attempt, attempts, e, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};

    use anyhow::anyhow;

    use super::RetryPolicy;

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate()
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow!("timeout"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_last_attempt() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = RetryPolicy::immediate()
            .run("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("unreachable"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
