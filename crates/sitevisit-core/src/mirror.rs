//! Best-effort replication of new records to a spreadsheet webhook.
//!
//! The spreadsheet side expects one flat row per record with human-readable
//! cells: `Yes`/`No` instead of booleans, blank cells instead of nulls, and
//! zero for missing money. [`MirrorRow`] is that shape. A mirror write is
//! attempted once per create and its failure never fails the create.

use crate::{
    error::{Error, Result},
    record::{SiteVisitRecord, format_timestamp},
};
use core::{future::Future, time::Duration};
use serde::Serialize;
use serde_json::Value;

/// A destination for mirrored rows.
pub trait Mirror: Send + Sync {
    /// Sends one row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mirror`] if the endpoint is unreachable or answers
    /// with a non-success status.
    fn push(&self, row: &MirrorRow) -> impl Future<Output = Result<()>> + Send;
}

/// The flat, spreadsheet-friendly rendering of a record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorRow {
    pub customer_id: String,
    pub lead_received_date: String,
    pub customer_name: String,
    pub phone_number: String,
    #[serde(rename = "phoneHasWhatsApp")]
    pub phone_has_whatsapp: &'static str,
    #[serde(rename = "hasWhatsAppNumber")]
    pub has_whatsapp_number: &'static str,
    pub whatsapp_number: String,
    pub district: String,
    pub city: String,
    pub address: String,
    pub google_maps_link: String,
    /// A number, or `""` when unknown.
    pub latitude: Value,
    pub longitude: Value,
    pub drawings: String,
    pub images: String,
    pub videos: String,
    pub has_removals: &'static str,
    pub removal_charge: f64,
    pub has_additional_labour: &'static str,
    pub additional_labour_charge: f64,
    pub service_type: &'static str,
    pub ceiling_details: String,
    pub gutters_details: String,
    pub roof_details: String,
    pub quotation_number: String,
    pub quotation_pdf: String,
    pub total_amount: f64,
    pub status: &'static str,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn coordinate(value: Option<f64>) -> Value {
    value.map_or_else(|| Value::String(String::new()), Value::from)
}

fn blob(value: &Option<Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

impl From<&SiteVisitRecord> for MirrorRow {
    fn from(record: &SiteVisitRecord) -> Self {
        let visit = &record.visit;
        Self {
            customer_id: record.customer_id.to_string(),
            lead_received_date: visit.lead_received_date.format("%Y-%m-%d").to_string(),
            customer_name: visit.customer_name.clone(),
            phone_number: visit.phone_number.clone(),
            phone_has_whatsapp: yes_no(visit.phone_has_whatsapp),
            has_whatsapp_number: visit.has_whatsapp_number.map_or("", yes_no),
            whatsapp_number: cell(&visit.whatsapp_number),
            district: visit.district.clone(),
            city: visit.city.clone(),
            address: cell(&visit.address),
            google_maps_link: cell(&visit.google_maps_link),
            latitude: coordinate(visit.latitude),
            longitude: coordinate(visit.longitude),
            drawings: cell(&visit.drawings),
            images: cell(&visit.images),
            videos: cell(&visit.videos),
            has_removals: yes_no(visit.has_removals),
            removal_charge: visit.removal_charge.unwrap_or(0.0),
            has_additional_labour: yes_no(visit.has_additional_labour),
            additional_labour_charge: visit.additional_labour_charge.unwrap_or(0.0),
            service_type: visit.service_type.as_str(),
            ceiling_details: blob(&visit.ceiling_details),
            gutters_details: blob(&visit.gutters_details),
            roof_details: blob(&visit.roof_details),
            quotation_number: cell(&visit.quotation_number),
            quotation_pdf: cell(&visit.quotation_pdf),
            total_amount: visit.total_amount.unwrap_or(0.0),
            status: visit.status.as_str(),
            notes: cell(&visit.notes),
            created_at: format_timestamp(&record.created_at),
            updated_at: format_timestamp(&record.updated_at),
        }
    }
}

/// Posts rows as JSON to a webhook URL, such as a spreadsheet script
/// endpoint. The response body is ignored.
#[derive(Clone, Debug)]
pub struct WebhookMirror {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl WebhookMirror {
    /// # Errors
    ///
    /// Returns [`Error::Mirror`] if `url` is not a valid URL or the HTTP
    /// client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(url).map_err(|e| Error::Mirror {
            context: format!("invalid mirror URL {url:?}: {e}"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Mirror {
                context: e.to_string(),
            })?;
        Ok(Self { client, url })
    }
}

impl Mirror for WebhookMirror {
    fn push(&self, row: &MirrorRow) -> impl Future<Output = Result<()>> + Send {
        let request = self.client.post(self.url.clone()).json(row);
        async move {
            let response = request.send().await.map_err(|e| Error::Mirror {
                context: e.to_string(),
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Mirror {
                    context: format!("webhook answered HTTP {status}"),
                });
            }
            tracing::debug!(%status, "mirror row accepted");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::{net::TcpListener, sync::Mutex};

    #[test]
    fn row_renders_spreadsheet_cells() {
        let mut record = record("A-000a07", "Nimal Perera");
        record.visit.has_removals = false;
        record.visit.removal_charge = None;
        record.visit.longitude = None;
        let row = MirrorRow::from(&record);
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["customerId"], "A-000a07");
        assert_eq!(json["phoneHasWhatsApp"], "Yes");
        assert_eq!(json["hasWhatsAppNumber"], "");
        assert_eq!(json["hasRemovals"], "No");
        assert_eq!(json["removalCharge"], 0.0);
        assert_eq!(json["additionalLabourCharge"], 2500.0);
        assert_eq!(json["whatsappNumber"], "");
        assert_eq!(json["latitude"], 6.848);
        assert_eq!(json["longitude"], "");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["guttersDetails"], "");
        let ceiling: Value = serde_json::from_str(json["ceilingDetails"].as_str().unwrap()).unwrap();
        assert_eq!(ceiling, json!({ "ceilingType": "gypsum", "totalArea": 420 }));
    }

    #[test]
    fn tri_state_whatsapp_flag() {
        let mut record = record("A-000a07", "Nimal Perera");
        record.visit.has_whatsapp_number = Some(true);
        assert_eq!(MirrorRow::from(&record).has_whatsapp_number, "Yes");
        record.visit.has_whatsapp_number = Some(false);
        assert_eq!(MirrorRow::from(&record).has_whatsapp_number, "No");
    }

    async fn serve(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().await.push(body);
                    status
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/hook"), received)
    }

    #[tokio::test]
    async fn webhook_receives_row() {
        let (url, received) = serve(StatusCode::OK).await;
        let mirror = WebhookMirror::new(&url, Duration::from_secs(5)).unwrap();
        let row = MirrorRow::from(&record("A-000a07", "Nimal Perera"));
        mirror.push(&row).await.unwrap();

        let received = received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["customerName"], "Nimal Perera");
    }

    #[tokio::test]
    async fn webhook_error_status_is_a_failure() {
        let (url, _) = serve(StatusCode::INTERNAL_SERVER_ERROR).await;
        let mirror = WebhookMirror::new(&url, Duration::from_secs(5)).unwrap();
        let row = MirrorRow::from(&record("A-000a07", "Nimal Perera"));
        let err = mirror.push(&row).await.unwrap_err();
        assert!(matches!(err, Error::Mirror { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn unreachable_webhook_is_a_failure() {
        let mirror = WebhookMirror::new("http://127.0.0.1:1/hook", Duration::from_secs(1)).unwrap();
        let row = MirrorRow::from(&record("A-000a07", "Nimal Perera"));
        assert!(matches!(mirror.push(&row).await, Err(Error::Mirror { .. })));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(WebhookMirror::new("not a url", Duration::from_secs(1)).is_err());
    }
}
