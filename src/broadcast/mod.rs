use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::domain::order::{OrderEvent, OrderStatus};
use crate::metrics::Metrics;

// ============================================================================
// Event Broadcaster - single topic fan-out of committed order changes
// ============================================================================
//
// Every subscriber gets its own bounded ring of `capacity` events. When a
// subscriber falls behind, the oldest events it has not read are dropped for
// it alone; `publish` never waits on a reader.
//
// ============================================================================

#[derive(Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<OrderEvent>,
    metrics: Arc<Metrics>,
}

impl Broadcaster {
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, metrics }
    }

    /// Hands `event` to every current subscriber and returns how many there
    /// were. Having nobody listening is not an error.
    pub fn publish(&self, event: OrderEvent) -> usize {
        let event_type = event.event_type();
        let order_id = event.order_id();
        self.metrics.record_published(event_type);

        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(%order_id, event_type, receivers, "Published order event");
                receivers
            }
            Err(_) => {
                tracing::debug!(%order_id, event_type, "No subscribers for order event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.metrics.subscribers.inc();
        Subscription {
            inner: BroadcastStream::new(self.sender.subscribe()),
            metrics: self.metrics.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A subscriber's view of the topic. Lag is logged and skipped, so the
/// stream only ends when the broadcaster is gone.
pub struct Subscription {
    inner: BroadcastStream<OrderEvent>,
    metrics: Arc<Metrics>,
}

impl Subscription {
    /// Subscriber-side predicate for views that only show some statuses.
    pub fn filter_status(
        self,
        statuses: Vec<OrderStatus>,
    ) -> impl Stream<Item = OrderEvent> + Send + Unpin + 'static {
        self.filter(move |event| {
            let keep = statuses.is_empty() || statuses.contains(&event.snapshot().status);
            futures_util::future::ready(keep)
        })
    }
}

impl Stream for Subscription {
    type Item = OrderEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::warn!(skipped, "Subscriber lagged behind, oldest events dropped");
                    self.metrics.record_lagged(skipped);
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.metrics.subscribers.dec();
    }
}

/// Encodes `event` as one Server-Sent Events frame.
pub fn sse_frame(event: &OrderEvent) -> serde_json::Result<String> {
    let data = serde_json::to_string(event)?;
    Ok(format!("event: {}\ndata: {}\n\n", event.event_type(), data))
}

/// Comment frame that keeps idle SSE connections open through proxies.
pub const SSE_KEEP_ALIVE: &str = ": keep-alive\n\n";
