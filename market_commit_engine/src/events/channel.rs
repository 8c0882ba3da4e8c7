//! A small mpsc-backed pub-sub channel. Handlers are async and stateless with
//! respect to the engine; they receive only the event itself.

use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer { sender: self.sender.clone() }
    }

    /// Drain events until every producer is dropped. Each event runs on its
    /// own task so a slow handler cannot back up the channel.
    pub async fn start_handler(mut self) {
        debug!("📨️ Event handler running");
        // The handler holds one sender itself; release it so the loop ends
        // once the last outside producer goes away.
        drop(self.sender);
        while let Some(event) = self.listener.recv().await {
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                (handler)(event).await;
            });
        }
        debug!("📨️ Event handler stopped: all producers dropped");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send> {
    sender: mpsc::Sender<E>,
}

impl<E: Send> EventProducer<E> {
    /// Fire-and-forget delivery. A full or closed channel is logged and
    /// swallowed; event publication is best-effort by design of the
    /// post-commit phase.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📨️ Dropped event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn every_published_event_reaches_the_handler() {
        let _ = env_logger::try_init();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler: Handler<usize> = Arc::new(move |n| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(n, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(16, handler);
        let producer = event_handler.subscribe();
        let publisher = tokio::spawn(async move {
            for n in 1..=10usize {
                producer.publish_event(n).await;
            }
        });
        publisher.await.unwrap();
        event_handler.start_handler().await;
        // Spawned handler tasks may still be in flight right after the drain loop ends.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 55);
    }
}
