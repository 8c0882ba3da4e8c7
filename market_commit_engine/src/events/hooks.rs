use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{EventHandler, EventProducer, Handler, MarketEvent};

/// The producer side handed to the commit engine: a fan-out list of channels
/// that each receive every post-commit event.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub market_producers: Vec<EventProducer<MarketEvent>>,
}

impl EventProducers {
    pub async fn publish(&self, event: MarketEvent) {
        if self.market_producers.is_empty() {
            trace!("📨️ No subscribers for {} event", event.name());
            return;
        }
        debug!("📨️ Publishing {} to {:?}", event.name(), event.targets());
        for producer in &self.market_producers {
            producer.publish_event(event.clone()).await;
        }
    }
}

/// Subscriber registration. Attach a hook, build the handlers, then hand
/// [`EventProducers`] to the engine and spawn the handlers.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_market_event: Option<Handler<MarketEvent>>,
}

impl EventHooks {
    pub fn on_market_event<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MarketEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_market_event = Some(Arc::new(f));
        self
    }
}

pub struct EventHandlers {
    pub on_market_event: Option<EventHandler<MarketEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_market_event = hooks.on_market_event.map(|f| EventHandler::new(buffer_size, f));
        Self { on_market_event }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_market_event {
            result.market_producers.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_market_event {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}
