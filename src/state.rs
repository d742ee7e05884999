use std::sync::Arc;

use crate::config::Config;
use crate::geo::proximity::{ProximityIndex, StoreProximityIndex};
use crate::mail::{LogMailer, MailDispatcher};
use crate::observability::metrics::Metrics;
use crate::realtime::EventHub;
use crate::store::Store;

pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub proximity: Arc<dyn ProximityIndex>,
    pub mailer: Arc<dyn MailDispatcher>,
    pub events: EventHub,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<Store>,
        proximity: Arc<dyn ProximityIndex>,
        mailer: Arc<dyn MailDispatcher>,
    ) -> Self {
        let events = EventHub::new(config.event_buffer_size);

        Self {
            config,
            store,
            proximity,
            mailer,
            events,
            metrics: Metrics::new(),
        }
    }

    /// Store-backed proximity index plus the supplied mailer.
    pub fn in_memory(config: Config, mailer: Arc<dyn MailDispatcher>) -> Self {
        let store = Arc::new(Store::new());
        let proximity = Arc::new(StoreProximityIndex::new(store.clone()));
        Self::new(config, store, proximity, mailer)
    }

    pub fn with_log_mailer(config: Config) -> Self {
        Self::in_memory(config, Arc::new(LogMailer))
    }
}
