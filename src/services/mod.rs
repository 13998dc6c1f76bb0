use std::sync::Arc;
use std::time::Duration;

use slog::Logger;

use crate::{db::DbPool, events::ChangeFeed, events::EventSender, notifications::Notifier};

pub mod material_requests;
pub mod reports;
pub mod request_query;

pub use material_requests::{MaterialRequestService, NewRequestInput};
pub use request_query::RequestQueryService;

/// Services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub requests: Arc<MaterialRequestService>,
    pub query: Arc<RequestQueryService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        feed: ChangeFeed,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
        logger: Logger,
    ) -> Self {
        let requests = Arc::new(MaterialRequestService::new(
            db_pool.clone(),
            event_sender,
            notifier,
            logger,
        ));
        let query = Arc::new(RequestQueryService::new(db_pool, feed, poll_interval));

        Self { requests, query }
    }
}
