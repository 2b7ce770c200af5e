//! HTTP handlers for the site-visit API.
//!
//! [`VisitService`] owns the [`StorageRouter`] and exposes it as an axum
//! [`Router`]. Every JSON response carries a `success` flag; failures also
//! carry an `error` message and map onto status codes as follows:
//!
//! | error               | status |
//! |---------------------|--------|
//! | `Validation`        | 400    |
//! | `NotFound`          | 404    |
//! | `StoreUnavailable`  | 503    |
//! | anything else       | 500    |

use crate::server::{
    config::ServerConfig,
    telemetry::{
        increment_customer_ids_issued, increment_degraded_operations, increment_mirror_failures,
        increment_requests, increment_site_visits_created,
    },
};
use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use sitevisit_core::{
    DurableStore, Error, IntakeForm, MirrorStatus, Mode, StorageRouter, VisitFilter,
    WebhookMirror,
};
use std::sync::Arc;

/// The concrete router the server runs.
pub type VisitRouter = StorageRouter<DurableStore, WebhookMirror>;

/// Shared handler state.
#[derive(Clone)]
pub struct VisitService {
    router: Arc<VisitRouter>,
}

impl VisitService {
    /// Builds the storage stack described by `config`. No connection is made
    /// yet; an unreachable database only shows up as degraded requests.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let durable = config
            .database_url
            .as_deref()
            .map(|url| {
                DurableStore::connect_lazy(url, config.db_max_connections, config.router.probe_timeout)
                    .context("invalid DATABASE_URL")
            })
            .transpose()?;
        let mirror = config
            .mirror_url
            .as_deref()
            .map(|url| {
                WebhookMirror::new(url, config.router.mirror_timeout).context("invalid MIRROR_URL")
            })
            .transpose()?;
        Ok(Self::from_router(StorageRouter::new(durable, mirror, config.router)))
    }

    pub fn from_router(router: VisitRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    pub fn routes(self) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/api/customer-id", get(customer_id))
            .route("/api/init-db", get(init_db))
            .route(
                "/api/site-visits",
                get(list_visits)
                    .post(create_visit)
                    .put(update_visit)
                    .delete(delete_visit),
            )
            .route("/api/site-visits/{id}", get(get_visit))
            .with_state(self)
    }
}

/// An error rendered as `{ "success": false, "error": ... }`.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation {
            field: "body",
            reason: rejection.body_text(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        #[cfg(feature = "tracing")]
        {
            if status.is_server_error() {
                tracing::error!(error = %self.0, "request failed");
            }
        }

        let mut body = json!({ "success": false, "error": self.0.to_string() });
        if let Error::Validation { field, .. } = &self.0 {
            body["field"] = json!(field);
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

async fn healthz() -> &'static str {
    "ok"
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn customer_id(State(service): State<VisitService>) -> Json<Value> {
    increment_requests();
    let issued = service.router.next_customer_id().await;
    increment_customer_ids_issued(issued.source.as_str());
    Json(json!({
        "success": true,
        "customerId": issued.id,
        "source": issued.source,
    }))
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn init_db(State(service): State<VisitService>) -> Json<Value> {
    increment_requests();
    let mode = service.router.probe().await;
    let message = match mode {
        Mode::Durable => "Database initialized successfully",
        Mode::Ephemeral if service.router.has_durable_store() => {
            "Database unavailable, using in-memory storage"
        }
        Mode::Ephemeral => "No database configured, using in-memory storage",
    };
    Json(json!({
        "success": !mode.is_degraded(),
        "mode": mode,
        "message": message,
    }))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    status: Option<String>,
    district: Option<String>,
    search: Option<String>,
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip(service)))]
async fn list_visits(
    State(service): State<VisitService>,
    Query(params): Query<ListParams>,
) -> ApiResult {
    increment_requests();
    let filter = VisitFilter::from_query(
        params.status.as_deref(),
        params.district.as_deref(),
        params.search.as_deref(),
    )?;
    let listing = service.router.list(&filter).await?;

    let mut body = json!({
        "success": true,
        "data": listing.records,
        "source": listing.mode,
    });
    if listing.mode.is_degraded() {
        increment_degraded_operations();
        body["message"] = json!("Using in-memory storage (database unavailable)");
    }
    Ok(Json(body))
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip(service)))]
async fn get_visit(State(service): State<VisitService>, Path(id): Path<String>) -> ApiResult {
    increment_requests();
    let record = service.router.get(&id).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn create_visit(
    State(service): State<VisitService>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    increment_requests();
    let Json(body) = payload?;
    let form = IntakeForm::new(body)?;
    let draft = form.to_draft()?;
    let requested = form.customer_id()?;

    let created = service.router.create(draft, requested).await?;
    let storage = created.storage;
    increment_site_visits_created(if storage.persisted {
        Mode::Durable.as_str()
    } else {
        Mode::Ephemeral.as_str()
    });
    if storage.buffered {
        increment_degraded_operations();
    }
    if storage.mirror == MirrorStatus::Failed {
        increment_mirror_failures();
    }

    Ok(Json(json!({
        "success": true,
        "data": created.record,
        "storage": storage,
    })))
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn update_visit(
    State(service): State<VisitService>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    increment_requests();
    let Json(body) = payload?;
    let form = IntakeForm::new(body)?;
    let id = form.id()?;
    let record = service.router.update(&id, form.to_draft()?).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    id: Option<String>,
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip(service)))]
async fn delete_visit(
    State(service): State<VisitService>,
    Query(params): Query<DeleteParams>,
) -> ApiResult {
    increment_requests();
    let id = params
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::Validation {
            field: "id",
            reason: "required".to_owned(),
        })?;
    service.router.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}
