use crate::common::types::*;
use crate::tools::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDriverLocationRequest {
    pub order_id: OrderId,
    pub latitude: f64,
    pub longitude: f64,
}

/// Either both coordinates, or an address alone to be geocoded.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCustomerLocationRequest {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    #[serde(rename = "type")]
    pub role: Role,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CustomerEventsQuery {
    pub customer_id: CustomerId,
}

/// `start` and `end` are `[latitude, longitude]`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RouteRequest {
    pub start: [f64; 2],
    pub end: [f64; 2],
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeocodeRequest {
    pub address: String,
}

/// Reports that carry an order id.
pub trait LocationReport {
    fn order_id(&self) -> &OrderId;

    fn customer_id(&self) -> Option<&CustomerId> {
        None
    }
}

impl LocationReport for SubmitDriverLocationRequest {
    fn order_id(&self) -> &OrderId {
        &self.order_id
    }
}

impl LocationReport for SubmitCustomerLocationRequest {
    fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    fn customer_id(&self) -> Option<&CustomerId> {
        Some(&self.customer_id)
    }
}

impl LocationReport for DisconnectRequest {
    fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    fn customer_id(&self) -> Option<&CustomerId> {
        Some(&self.customer_id)
    }
}

/// Reads a raw JSON report. Missing or wrongly typed fields and blank ids are
/// `MalformedReport`, so nothing is applied for them.
pub fn parse_report<T>(body: Value) -> Result<T, AppError>
where
    T: DeserializeOwned + LocationReport,
{
    let report: T =
        serde_json::from_value(body).map_err(|err| AppError::MalformedReport(err.to_string()))?;

    if report.order_id().0.trim().is_empty() {
        return Err(AppError::MalformedReport("orderId is empty".to_string()));
    }
    if report
        .customer_id()
        .is_some_and(|CustomerId(customer_id)| customer_id.trim().is_empty())
    {
        return Err(AppError::MalformedReport("customerId is empty".to_string()));
    }

    Ok(report)
}
