use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::router::ChatRouter;
use crate::transport::BotTransport;
use crate::updates::Update;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failures after which the outage is logged at error level.
    pub alert_after_failures: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { alert_after_failures: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1_u64 << attempt.min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms))
    }
}

/// Long-poll loop. Transport failures are retried forever with capped
/// backoff; any successful poll resets the count. Pipeline work is never
/// retried.
pub struct PollingRunner {
    transport: Arc<dyn BotTransport>,
    router: Arc<ChatRouter>,
    reconnect_policy: ReconnectPolicy,
    poll_timeout_secs: u64,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn BotTransport>,
        router: Arc<ChatRouter>,
        reconnect_policy: ReconnectPolicy,
        poll_timeout_secs: u64,
    ) -> Self {
        Self { transport, router, reconnect_policy, poll_timeout_secs }
    }

    /// Runs until the transport reports the stream closed, then drains the
    /// chat workers. Returns the last acknowledged offset.
    pub async fn start(&self) -> i64 {
        let mut offset = 0_i64;
        let mut failures = 0_u32;
        let mut workers = ChatWorkers::new(self.router.clone());
        info!(
            event_name = "telegram.polling.started",
            poll_timeout_secs = self.poll_timeout_secs,
            "telegram polling started"
        );

        loop {
            workers.reap();
            match self.transport.get_updates(offset, self.poll_timeout_secs).await {
                Ok(Some(updates)) => {
                    if failures > 0 {
                        info!(event_name = "telegram.polling.recovered", failures, "telegram poll recovered");
                    }
                    failures = 0;
                    offset = dispatch_batch(&mut workers, updates, offset);
                }
                Ok(None) => {
                    info!(event_name = "telegram.polling.closed", offset, "update stream closed");
                    workers.drain().await;
                    return offset;
                }
                Err(transport_error) => {
                    failures = failures.saturating_add(1);
                    if failures == self.reconnect_policy.alert_after_failures {
                        error!(
                            event_name = "telegram.polling.outage",
                            failures,
                            error = %transport_error,
                            "telegram unreachable; still retrying"
                        );
                    } else {
                        warn!(
                            event_name = "telegram.polling.failed",
                            failures,
                            error = %transport_error,
                            "telegram poll failed"
                        );
                    }

                    let delay = self.reconnect_policy.backoff(failures - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// Hands a polled batch to the chat workers and returns the next offset.
fn dispatch_batch(workers: &mut ChatWorkers, updates: Vec<Update>, offset: i64) -> i64 {
    let next_offset =
        updates.iter().map(|update| update.update_id + 1).max().unwrap_or(offset).max(offset);

    for update in updates {
        info!(
            event_name = "telegram.update_received",
            update_id = update.update_id,
            chat_id = update.chat_id().unwrap_or_default(),
            kind = update.classify().kind(),
            "received telegram update"
        );
        workers.dispatch(update);
    }

    debug!(event_name = "telegram.offset_acknowledged", offset = next_offset, "offset advanced");
    next_offset
}

/// One sequential worker per chat, living in a shared `JoinSet`. Chats never
/// wait on each other; updates within a chat keep their order.
struct ChatWorkers {
    router: Arc<ChatRouter>,
    queues: HashMap<Option<i64>, UnboundedSender<Update>>,
    tasks: JoinSet<()>,
}

impl ChatWorkers {
    fn new(router: Arc<ChatRouter>) -> Self {
        Self { router, queues: HashMap::new(), tasks: JoinSet::new() }
    }

    fn dispatch(&mut self, update: Update) {
        let chat = update.chat_id();
        let update = match self.queues.get(&chat) {
            Some(queue) => match queue.send(update) {
                Ok(()) => return,
                Err(mpsc::error::SendError(update)) => update,
            },
            None => update,
        };

        let (queue, mut pending) = mpsc::unbounded_channel::<Update>();
        let router = self.router.clone();
        self.tasks.spawn(async move {
            router.handle(&update).await;
            while let Some(next) = pending.recv().await {
                router.handle(&next).await;
            }
        });
        self.queues.insert(chat, queue);
    }

    /// Logs workers that ended abnormally; their chats get a fresh worker on
    /// the next update.
    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(join_error) = joined {
                error!(event_name = "telegram.chat_worker.failed", error = %join_error, "chat worker aborted");
            }
        }
    }

    async fn drain(&mut self) {
        self.queues.clear();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(join_error) = joined {
                error!(event_name = "telegram.chat_worker.failed", error = %join_error, "chat worker aborted");
            }
        }
    }
}
