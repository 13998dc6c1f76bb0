use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::material_request::{MaterialRequest, RequestStatus};

/// Status-count summary over the request list, as shown on the manager
/// dashboards.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub in_process: u64,
    pub in_transit: u64,
    pub delivered: u64,
    pub rejected: u64,
    /// Requests per zone; requests without a zone are not counted here.
    pub by_zone: BTreeMap<String, u64>,
}

pub fn summarize(requests: &[MaterialRequest]) -> RequestStats {
    let mut stats = RequestStats {
        total: requests.len() as u64,
        ..Default::default()
    };

    for request in requests {
        match request.status {
            RequestStatus::Pending => stats.pending += 1,
            RequestStatus::Approved => stats.approved += 1,
            RequestStatus::InProcess => stats.in_process += 1,
            RequestStatus::InTransit => stats.in_transit += 1,
            RequestStatus::Delivered => stats.delivered += 1,
            RequestStatus::Rejected => stats.rejected += 1,
        }

        if let Some(zone) = &request.zone {
            *stats.by_zone.entry(zone.clone()).or_insert(0) += 1;
        }
    }

    stats
}
