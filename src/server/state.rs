use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::directory::UserDirectory;
use crate::gateway::DeliveryGateway;
use crate::resolver::RecipientResolver;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<Dispatcher>,
    pub started_at: Arc<Instant>,
}

impl AppState {
    /// Wire the dispatch core from its injected collaborators.
    pub fn new(
        settings: Settings,
        directory: Arc<dyn UserDirectory>,
        gateway: Arc<dyn DeliveryGateway>,
    ) -> Self {
        let resolver = RecipientResolver::new(directory);
        let dispatcher = Arc::new(Dispatcher::new(resolver, gateway));

        Self {
            settings: Arc::new(settings),
            dispatcher,
            started_at: Arc::new(Instant::now()),
        }
    }
}
