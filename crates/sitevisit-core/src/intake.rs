//! Normalization of loosely-typed intake bodies.
//!
//! Form submissions arrive as JSON objects whose fields may be strings,
//! numbers, booleans or `null`, often interchangeably: a boolean may show up
//! as `true`, `"yes"`, `"true"` or `1`; an amount as `2500` or `"2500"`.
//! [`IntakeForm`] normalizes each field to its strict type once, up front, and
//! rejects shapes it does not recognise with [`Error::Validation`]. Nothing
//! past this module handles untyped values.

use crate::{
    error::{Error, Result},
    record::{ServiceType, SiteVisitDraft, VisitStatus},
};
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use sitevisit_id::CustomerSequenceId;

/// A raw intake body.
#[derive(Clone, Debug, Default)]
pub struct IntakeForm(Map<String, Value>);

impl IntakeForm {
    /// Wraps a request body, which must be a JSON object.
    ///
    /// # Errors
    ///
    /// Returns a validation error for anything other than an object.
    pub fn new(body: Value) -> Result<Self> {
        match body {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::validation(
                "body",
                format!("expected a JSON object, got {}", kind(&other)),
            )),
        }
    }

    /// The record primary key carried by update requests.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `id` is missing or blank.
    pub fn id(&self) -> Result<String> {
        self.required_text("id")
    }

    /// A caller-supplied customer ID, if one was sent.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value is present but not canonical,
    /// or carries the never-issued `00` suffix.
    pub fn customer_id(&self) -> Result<Option<CustomerSequenceId>> {
        self.optional_text("customerId")?
            .map(|token| {
                let id = CustomerSequenceId::parse(&token)
                    .map_err(|e| Error::validation("customerId", e.to_string()))?;
                if id.suffix() == 0 {
                    return Err(Error::validation("customerId", "suffix 00 is never issued"));
                }
                Ok(id)
            })
            .transpose()
    }

    /// Normalizes every caller-controlled field.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure encountered.
    pub fn to_draft(&self) -> Result<SiteVisitDraft> {
        Ok(SiteVisitDraft {
            lead_received_date: self.date("leadReceivedDate")?,
            customer_name: self.required_text("customerName")?,
            phone_number: self.required_text("phoneNumber")?,
            phone_has_whatsapp: self.flag("phoneHasWhatsApp")?.unwrap_or(false),
            has_whatsapp_number: self.flag("hasWhatsAppNumber")?,
            whatsapp_number: self.optional_text("whatsappNumber")?,
            district: self.required_text("district")?,
            city: self.required_text("city")?,
            address: self.optional_text("address")?,
            google_maps_link: self.optional_text("googleMapsLink")?,
            latitude: self.number("latitude")?,
            longitude: self.number("longitude")?,
            drawings: self.optional_text("drawings")?,
            images: self.optional_text("images")?,
            videos: self.optional_text("videos")?,
            has_removals: self.flag("hasRemovals")?.unwrap_or(false),
            removal_charge: self.number("removalCharge")?,
            has_additional_labour: self.flag("hasAdditionalLabour")?.unwrap_or(false),
            additional_labour_charge: self.number("additionalLabourCharge")?,
            service_type: self.required_text("serviceType")?.parse()?,
            ceiling_details: self.details("ceilingDetails"),
            gutters_details: self.details("guttersDetails"),
            roof_details: self.details("roofDetails"),
            quotation_number: self.optional_text("quotationNumber")?,
            quotation_pdf: self.optional_text("quotationPdf")?,
            total_amount: self.number("totalAmount")?,
            status: self
                .optional_text("status")?
                .map(|s| s.parse::<VisitStatus>())
                .transpose()?
                .unwrap_or_default(),
            notes: self.optional_text("notes")?,
        })
    }

    // `null`, missing and the empty string all mean "not provided".
    fn present(&self, field: &str) -> Option<&Value> {
        match self.0.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        }
    }

    fn optional_text(&self, field: &'static str) -> Result<Option<String>> {
        match self.present(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            // Phone numbers and quotation numbers are sometimes sent as JSON
            // numbers.
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(Error::validation(
                field,
                format!("expected text, got {}", kind(other)),
            )),
        }
    }

    fn required_text(&self, field: &'static str) -> Result<String> {
        self.optional_text(field)?
            .ok_or_else(|| Error::validation(field, "required"))
    }

    fn flag(&self, field: &'static str) -> Result<Option<bool>> {
        let Some(value) = self.present(field) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| {
            Error::validation(field, format!("expected yes/no, got {value}"))
        })
    }

    fn number(&self, field: &'static str) -> Result<Option<f64>> {
        let Some(value) = self.present(field) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(Error::validation(
                field,
                format!("expected a number, got {value}"),
            )),
        }
    }

    fn date(&self, field: &'static str) -> Result<NaiveDate> {
        let raw = self.required_text(field)?;
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
            .map_err(|_| Error::validation(field, format!("expected YYYY-MM-DD, got {raw:?}")))
    }

    // Detail blobs are opaque. Objects pass through; strings holding JSON are
    // decoded so they are stored structurally; any other string is kept as is.
    fn details(&self, field: &str) -> Option<Value> {
        match self.present(field)? {
            Value::String(s) => {
                Some(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())))
            }
            v => Some(v.clone()),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
