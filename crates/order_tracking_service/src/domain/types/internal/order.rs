use crate::common::{route::RoutePlan, types::*};
use serde::Serialize;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailsResponse {
    pub order_id: OrderId,
    pub driver: Option<DriverState>,
    /// Nearest first when a driver is known, otherwise by id.
    pub customers: Vec<CustomerState>,
    pub route: Option<RoutePlan>,
    pub subscribers: usize,
    pub created_at: TimeStamp,
    pub last_activity_at: TimeStamp,
}
