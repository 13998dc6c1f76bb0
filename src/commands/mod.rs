use std::sync::Arc;

use async_trait::async_trait;

use crate::{db::DbPool, errors::ServiceError, events::EventSender};

/// Command trait for implementing the Command Pattern
///
/// Encapsulates the logic needed to execute one business operation into a
/// single object that can be validated, executed, and produce events.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

pub mod requests;
