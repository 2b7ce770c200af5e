#![doc = include_str!("../README.md")]

mod error;
pub mod intake;
pub mod mirror;
pub mod record;
pub mod router;
pub mod sequence;
pub mod store;

pub use crate::error::*;
pub use crate::intake::IntakeForm;
pub use crate::mirror::{Mirror, MirrorRow, WebhookMirror};
pub use crate::record::{ServiceType, SiteVisitDraft, SiteVisitRecord, VisitFilter, VisitStatus};
pub use crate::router::{Created, Listing, MirrorStatus, Mode, RouterConfig, StorageOutcome, StorageRouter};
pub use crate::sequence::{IdSource, Issued, Latest, SequenceSource};
pub use crate::store::{DurableStore, EphemeralStore, RecordStore};
// Public re-export so downstream crates can name customer IDs via
// `sitevisit_core::sitevisit_id`
pub use sitevisit_id;
