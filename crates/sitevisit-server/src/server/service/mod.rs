//! HTTP surface of the site-visit service.
//!
//! ## Structure
//!
//! - [`handler`] - axum routes and handlers (`VisitService`).

pub mod handler;
