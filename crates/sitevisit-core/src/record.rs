//! The site-visit record and its strictly-typed building blocks.
//!
//! [`SiteVisitDraft`] is everything a caller controls. [`SiteVisitRecord`]
//! adds the identity and timestamps the service assigns. Loose request bodies
//! are turned into drafts by [`crate::intake`]; nothing downstream of that
//! sees untyped JSON except the opaque service detail blobs.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitevisit_id::CustomerSequenceId;
use core::{fmt, str::FromStr};

/// Which service the visit quotes for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Ceiling,
    Gutters,
    Roof,
    /// Legacy: visits recorded before services were quoted separately.
    All,
}

impl ServiceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ceiling => "ceiling",
            Self::Gutters => "gutters",
            Self::Roof => "roof",
            Self::All => "all",
        }
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ceiling" => Ok(Self::Ceiling),
            "gutters" => Ok(Self::Gutters),
            "roof" => Ok(Self::Roof),
            "all" => Ok(Self::All),
            other => Err(Error::validation(
                "serviceType",
                format!("expected ceiling, gutters or roof, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow status of a visit.
///
/// `completed` and `cancelled` are accepted on input as synonyms of
/// [`VisitStatus::Complete`] and [`VisitStatus::Cancel`]; output is always the
/// short form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    #[default]
    Pending,
    Running,
    #[serde(alias = "completed")]
    Complete,
    #[serde(alias = "cancelled")]
    Cancel,
}

impl VisitStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

impl FromStr for VisitStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "complete" | "completed" => Ok(Self::Complete),
            "cancel" | "cancelled" => Ok(Self::Cancel),
            other => Err(Error::validation(
                "status",
                format!("expected pending, running, complete or cancel, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-controlled fields of a site visit, already normalized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteVisitDraft {
    pub lead_received_date: NaiveDate,
    pub customer_name: String,
    pub phone_number: String,
    #[serde(rename = "phoneHasWhatsApp")]
    pub phone_has_whatsapp: bool,
    #[serde(rename = "hasWhatsAppNumber")]
    pub has_whatsapp_number: Option<bool>,
    pub whatsapp_number: Option<String>,
    pub district: String,
    pub city: String,
    pub address: Option<String>,
    pub google_maps_link: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub drawings: Option<String>,
    pub images: Option<String>,
    pub videos: Option<String>,
    pub has_removals: bool,
    pub removal_charge: Option<f64>,
    pub has_additional_labour: bool,
    pub additional_labour_charge: Option<f64>,
    pub service_type: ServiceType,
    pub ceiling_details: Option<Value>,
    pub gutters_details: Option<Value>,
    pub roof_details: Option<Value>,
    pub quotation_number: Option<String>,
    pub quotation_pdf: Option<String>,
    pub total_amount: Option<f64>,
    pub status: VisitStatus,
    pub notes: Option<String>,
}

/// A stored site visit.
///
/// `customer_id` is assigned once at creation and never changes, even across
/// updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteVisitRecord {
    pub id: String,
    pub customer_id: CustomerSequenceId,
    #[serde(flatten)]
    pub visit: SiteVisitDraft,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteVisitRecord {
    /// Builds a fresh record with a random primary key.
    pub fn new(customer_id: CustomerSequenceId, visit: SiteVisitDraft, now: DateTime<Utc>) -> Self {
        let now = truncate_millis(now);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id,
            visit,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a copy with every caller-controlled field replaced.
    #[must_use]
    pub fn with_changes(&self, visit: SiteVisitDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            customer_id: self.customer_id.clone(),
            visit,
            created_at: self.created_at,
            updated_at: truncate_millis(now),
        }
    }
}

/// Renders a timestamp in the fixed-width form used for storage, so that
/// lexical order on the stored text matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Storage keeps milliseconds; dropping the rest up front keeps the in-memory
// value identical to what a round-trip through the store returns.
fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Listing filter. `None` fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisitFilter {
    pub status: Option<VisitStatus>,
    pub district: Option<String>,
    /// Case-insensitive substring over name, customer ID and address; plain
    /// substring over the phone number.
    pub search: Option<String>,
}

impl VisitFilter {
    /// Builds a filter from query-string values. Empty values and the literal
    /// `all` mean "no filter" for status and district.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown status.
    pub fn from_query(
        status: Option<&str>,
        district: Option<&str>,
        search: Option<&str>,
    ) -> Result<Self> {
        let wanted = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
                .map(str::to_owned)
        };
        Ok(Self {
            status: wanted(status).map(|s| s.parse()).transpose()?,
            district: wanted(district),
            search: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
        })
    }

    pub fn matches(&self, record: &SiteVisitRecord) -> bool {
        if self.status.is_some_and(|s| s != record.visit.status) {
            return false;
        }
        if self
            .district
            .as_deref()
            .is_some_and(|d| d != record.visit.district)
        {
            return false;
        }
        let Some(search) = self.search.as_deref() else {
            return true;
        };
        let needle = search.to_lowercase();
        let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);
        contains(&record.visit.customer_name)
            || record.visit.phone_number.contains(search)
            || contains(&record.customer_id.to_string())
            || record.visit.address.as_deref().is_some_and(contains)
    }
}
