use std::sync::Arc;
use std::time::Duration;

use sea_orm::{EntityTrait, QueryOrder};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    cache::{CacheBackend, InMemoryCache},
    db::DbPool,
    entities::material_request,
    errors::ServiceError,
    events::ChangeFeed,
    models::material_request::MaterialRequest,
};

/// Cache key scoping the one cached artifact: the full request list.
pub const REQUEST_LIST_CACHE_KEY: &str = "material-requests:all";

/// Read side of the request store. The authoritative list (ordered by
/// creation time descending, no pagination) is cached wholesale under a
/// single key; any change-feed notice invalidates it and triggers a
/// refetch, and a fixed-interval poll guards against missed notices. The
/// cache has exactly one writer: this service.
pub struct RequestQueryService {
    db_pool: Arc<DbPool>,
    cache: Arc<InMemoryCache>,
    feed: ChangeFeed,
    poll_interval: Duration,
}

impl RequestQueryService {
    pub fn new(db_pool: Arc<DbPool>, feed: ChangeFeed, poll_interval: Duration) -> Self {
        Self {
            db_pool,
            cache: Arc::new(InMemoryCache::new()),
            feed,
            poll_interval,
        }
    }

    /// Returns the cached request list, refetching on a miss.
    #[instrument(skip(self))]
    pub async fn list_requests(&self) -> Result<Vec<MaterialRequest>, ServiceError> {
        if let Ok(Some(cached)) = self.cache.get(REQUEST_LIST_CACHE_KEY).await {
            match serde_json::from_str::<Vec<MaterialRequest>>(&cached) {
                Ok(requests) => return Ok(requests),
                Err(err) => {
                    warn!("discarding undecodable cached request list: {}", err);
                }
            }
        }

        self.refresh().await
    }

    /// Single-record reads always go to persistence for the full record.
    #[instrument(skip(self))]
    pub async fn get_request(&self, id: Uuid) -> Result<Option<MaterialRequest>, ServiceError> {
        material_request::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .map(MaterialRequest::try_from)
            .transpose()
    }

    /// Drops the cached list; the next read refetches.
    pub async fn invalidate(&self) {
        let _ = self.cache.delete(REQUEST_LIST_CACHE_KEY).await;
    }

    /// Refetches the authoritative list and replaces the cached copy.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Vec<MaterialRequest>, ServiceError> {
        let models = material_request::Entity::find()
            .order_by_desc(material_request::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let requests = models
            .into_iter()
            .map(MaterialRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        match serde_json::to_string(&requests) {
            Ok(json) => {
                let _ = self.cache.set(REQUEST_LIST_CACHE_KEY, &json, None).await;
            }
            Err(err) => warn!("failed to serialize request list for caching: {}", err),
        }

        Ok(requests)
    }

    /// Reconciliation loop: invalidate-and-refetch on every change notice,
    /// with the interval tick as the fallback for dropped notices. Lag on
    /// the feed is treated as an invalidation, not an error.
    pub async fn run_sync(self: Arc<Self>) {
        let mut changes = self.feed.subscribe();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately; consume it
        ticker.tick().await;

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => {
                        debug!(?change, "change notice received, refreshing request cache");
                        self.invalidate_and_refresh().await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change feed lagged, refreshing request cache");
                        self.invalidate_and_refresh().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("change feed closed, stopping request sync loop");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    debug!("polling fallback refresh");
                    self.invalidate_and_refresh().await;
                }
            }
        }
    }

    async fn invalidate_and_refresh(&self) {
        self.invalidate().await;
        if let Err(err) = self.refresh().await {
            warn!("request cache refresh failed: {}", err);
        }
    }
}
