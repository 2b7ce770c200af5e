use crate::{
    error::{Error, Result},
    record::{SiteVisitDraft, SiteVisitRecord, VisitFilter, format_timestamp},
    store::RecordStore,
};
use chrono::{DateTime, NaiveDate, Utc};
use core::{fmt, future::Future, time::Duration};
use serde_json::Value;
use sitevisit_id::CustomerSequenceId;
use sqlx::{
    AnyPool, Row,
    any::{AnyArguments, AnyPoolOptions, AnyRow},
    query::Query,
};
use tokio::sync::OnceCell;

type AnyQuery<'q> = Query<'q, sqlx::Any, AnyArguments<'q>>;

// Portable across SQLite and PostgreSQL: booleans are BIGINT 0/1, dates and
// timestamps are fixed-width TEXT so lexical order is chronological.
const SCHEMA: [&str; 4] = [
    r"CREATE TABLE IF NOT EXISTS site_visits (
        id TEXT PRIMARY KEY,
        customer_id TEXT NOT NULL UNIQUE,
        lead_received_date TEXT NOT NULL,
        customer_name TEXT NOT NULL,
        phone_number TEXT NOT NULL,
        phone_has_whatsapp BIGINT NOT NULL DEFAULT 0,
        has_whatsapp_number BIGINT,
        whatsapp_number TEXT,
        district TEXT NOT NULL,
        city TEXT NOT NULL,
        address TEXT,
        google_maps_link TEXT,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        drawings TEXT,
        images TEXT,
        videos TEXT,
        has_removals BIGINT NOT NULL DEFAULT 0,
        removal_charge DOUBLE PRECISION,
        has_additional_labour BIGINT NOT NULL DEFAULT 0,
        additional_labour_charge DOUBLE PRECISION,
        service_type TEXT NOT NULL,
        ceiling_details TEXT,
        gutters_details TEXT,
        roof_details TEXT,
        quotation_number TEXT,
        quotation_pdf TEXT,
        total_amount DOUBLE PRECISION,
        status TEXT NOT NULL DEFAULT 'pending',
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_site_visits_created_at ON site_visits (created_at)",
    // Highest customer ID ever inserted. Survives deletes, so IDs are never
    // handed out twice. `last_rank` is the ID's position in issuance order.
    r"CREATE TABLE IF NOT EXISTS customer_id_sequence (
        name TEXT PRIMARY KEY,
        last_issued TEXT,
        last_rank BIGINT NOT NULL
    )",
    "INSERT INTO customer_id_sequence (name, last_issued, last_rank) \
     VALUES ('customer', NULL, -1) ON CONFLICT (name) DO NOTHING",
];

const LATEST_ISSUED: &str = "SELECT last_issued FROM customer_id_sequence WHERE name = 'customer'";

// Monotonic: a lower ID never moves the mark back.
const ADVANCE_ISSUED: &str = "UPDATE customer_id_sequence SET last_issued = $1, last_rank = $2 \
    WHERE name = 'customer' AND last_rank < $3";

// The caller-controlled columns, in the order `bind_visit` binds them.
const VISIT_COLUMNS: [&str; 28] = [
    "lead_received_date",
    "customer_name",
    "phone_number",
    "phone_has_whatsapp",
    "has_whatsapp_number",
    "whatsapp_number",
    "district",
    "city",
    "address",
    "google_maps_link",
    "latitude",
    "longitude",
    "drawings",
    "images",
    "videos",
    "has_removals",
    "removal_charge",
    "has_additional_labour",
    "additional_labour_charge",
    "service_type",
    "ceiling_details",
    "gutters_details",
    "roof_details",
    "quotation_number",
    "quotation_pdf",
    "total_amount",
    "status",
    "notes",
];

const SELECT: &str = "SELECT id, customer_id, lead_received_date, customer_name, phone_number, \
    phone_has_whatsapp, has_whatsapp_number, whatsapp_number, district, city, address, \
    google_maps_link, latitude, longitude, drawings, images, videos, has_removals, \
    removal_charge, has_additional_labour, additional_labour_charge, service_type, \
    ceiling_details, gutters_details, roof_details, quotation_number, quotation_pdf, \
    total_amount, status, notes, created_at, updated_at FROM site_visits";

/// The relational store, over SQLite or PostgreSQL via the `sqlx` Any driver.
///
/// The schema is created on first successful [`probe`](RecordStore::probe), so
/// a store constructed while the database is down starts working as soon as
/// it comes back.
#[derive(Debug)]
pub struct DurableStore {
    pool: AnyPool,
    schema: OnceCell<()>,
}

impl DurableStore {
    /// Builds a store without opening a connection.
    ///
    /// # Errors
    ///
    /// Fails only if `url` cannot be parsed or names an unknown driver.
    pub fn connect_lazy(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    /// Creates the tables and index if they are missing.
    ///
    /// A `site_visits` table that predates the issuance mark has the mark
    /// seeded from its highest stored customer ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be reached.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.schema
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(statement)
                        .execute(&self.pool)
                        .await
                        .map_err(classify)?;
                }
                if self.last_issued().await?.is_none() {
                    self.seed_last_issued().await?;
                }
                tracing::info!("site_visits schema ready");
                Ok::<_, Error>(())
            })
            .await?;
        Ok(())
    }

    async fn last_issued(&self) -> Result<Option<String>> {
        let row = sqlx::query(LATEST_ISSUED)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        Ok(row
            .map(|row| row.try_get::<Option<String>, _>("last_issued"))
            .transpose()?
            .flatten())
    }

    async fn seed_last_issued(&self) -> Result<()> {
        let rows = sqlx::query("SELECT customer_id FROM site_visits")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        let highest = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("customer_id").ok())
            .filter_map(|token| CustomerSequenceId::parse(&token).ok())
            .max();
        if let Some(id) = highest {
            advance_issued(&id)?
                .execute(&self.pool)
                .await
                .map_err(classify)?;
            tracing::info!(customer_id = %id, "customer ID mark seeded from existing records");
        }
        Ok(())
    }

    async fn try_insert(&self, record: &SiteVisitRecord) -> Result<()> {
        let placeholders = (1..=VISIT_COLUMNS.len() + 4)
            .map(|n| format!("${n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO site_visits (id, customer_id, {}, created_at, updated_at) VALUES ({placeholders})",
            VISIT_COLUMNS.join(", ")
        );
        let query = sqlx::query(&sql)
            .bind(record.id.clone())
            .bind(record.customer_id.to_string());
        let insert = bind_visit(query, &record.visit)?
            .bind(format_timestamp(&record.created_at))
            .bind(format_timestamp(&record.updated_at));
        let advance = advance_issued(&record.customer_id)?;

        let mut tx = self.pool.begin().await.map_err(classify)?;
        insert
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict {
                    customer_id: record.customer_id.to_string(),
                },
                other => classify(other),
            })?;
        advance.execute(&mut *tx).await.map_err(classify)?;
        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    async fn try_list(&self, filter: &VisitFilter) -> Result<Vec<SiteVisitRecord>> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        if let Some(status) = filter.status {
            let p = placeholder(&mut binds, status.as_str().to_owned());
            clauses.push(format!("status = {p}"));
        }
        if let Some(district) = &filter.district {
            let p = placeholder(&mut binds, district.clone());
            clauses.push(format!("district = {p}"));
        }
        if let Some(search) = &filter.search {
            let folded = format!("%{}%", escape_like(&search.to_lowercase()));
            let name = placeholder(&mut binds, folded.clone());
            let customer = placeholder(&mut binds, folded.clone());
            let address = placeholder(&mut binds, folded);
            let phone = placeholder(&mut binds, format!("%{}%", escape_like(search)));
            clauses.push(format!(
                "(LOWER(customer_name) LIKE {name} ESCAPE '\\' \
                 OR LOWER(customer_id) LIKE {customer} ESCAPE '\\' \
                 OR LOWER(COALESCE(address, '')) LIKE {address} ESCAPE '\\' \
                 OR phone_number LIKE {phone} ESCAPE '\\')"
            ));
        }

        let mut sql = SELECT.to_owned();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        // Same-millisecond rows fall back to issuance order.
        sql.push_str(" ORDER BY created_at DESC, LENGTH(customer_id) DESC, customer_id DESC");

        let query = binds
            .into_iter()
            .fold(sqlx::query(&sql), |query, value| query.bind(value));
        let rows = query.fetch_all(&self.pool).await.map_err(classify)?;
        rows.iter().map(decode_row).collect()
    }

    async fn try_get(&self, id: &str) -> Result<Option<SiteVisitRecord>> {
        let sql = format!("{SELECT} WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.to_owned())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn try_update(&self, record: &SiteVisitRecord) -> Result<bool> {
        let assignments = VISIT_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ${}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let n = VISIT_COLUMNS.len();
        let sql = format!(
            "UPDATE site_visits SET {assignments}, updated_at = ${} WHERE id = ${}",
            n + 1,
            n + 2
        );
        let result = bind_visit(sqlx::query(&sql), &record.visit)?
            .bind(format_timestamp(&record.updated_at))
            .bind(record.id.clone())
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM site_visits WHERE id = $1")
            .bind(id.to_owned())
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }
}

impl RecordStore for DurableStore {
    fn probe(&self) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.ensure_schema().await?;
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(classify)?;
            Ok(())
        }
    }

    fn latest_customer_id(&self) -> impl Future<Output = Result<Option<String>>> + Send {
        async move {
            self.ensure_schema().await?;
            self.last_issued().await
        }
    }

    fn insert(&self, record: &SiteVisitRecord) -> impl Future<Output = Result<()>> + Send {
        self.try_insert(record)
    }

    fn list(
        &self,
        filter: &VisitFilter,
    ) -> impl Future<Output = Result<Vec<SiteVisitRecord>>> + Send {
        self.try_list(filter)
    }

    fn get(&self, id: &str) -> impl Future<Output = Result<Option<SiteVisitRecord>>> + Send {
        self.try_get(id)
    }

    fn update(&self, record: &SiteVisitRecord) -> impl Future<Output = Result<bool>> + Send {
        self.try_update(record)
    }

    fn delete(&self, id: &str) -> impl Future<Output = Result<bool>> + Send {
        self.try_delete(id)
    }
}

/// Separates "the database is not there" from everything else. The former is
/// what the router falls back on.
fn classify(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => Error::unavailable(err.to_string()),
        other => Error::Database(other),
    }
}

// Pushes a bind value and returns its positional placeholder.
fn placeholder(binds: &mut Vec<String>, value: String) -> String {
    binds.push(value);
    format!("${}", binds.len())
}

// Position of `id` in issuance order. A `00` suffix is never issued and sorts
// just below the ID that follows it.
fn rank(id: &CustomerSequenceId) -> Result<i64> {
    let ordinal = |id: &CustomerSequenceId| id.ordinal().and_then(|n| i64::try_from(n).ok());
    ordinal(id)
        .or_else(|| ordinal(&id.next()).map(|n| n - 1))
        .ok_or_else(|| Error::validation("customerId", format!("{id} is out of range")))
}

fn advance_issued<'q>(id: &CustomerSequenceId) -> Result<AnyQuery<'q>> {
    let rank = rank(id)?;
    Ok(sqlx::query(ADVANCE_ISSUED)
        .bind(id.to_string())
        .bind(rank)
        .bind(rank))
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn bind_visit<'q>(query: AnyQuery<'q>, visit: &SiteVisitDraft) -> Result<AnyQuery<'q>> {
    let details = |blob: &Option<Value>| blob.as_ref().map(serde_json::to_string).transpose();
    Ok(query
        .bind(visit.lead_received_date.format("%Y-%m-%d").to_string())
        .bind(visit.customer_name.clone())
        .bind(visit.phone_number.clone())
        .bind(i64::from(visit.phone_has_whatsapp))
        .bind(visit.has_whatsapp_number.map(i64::from))
        .bind(visit.whatsapp_number.clone())
        .bind(visit.district.clone())
        .bind(visit.city.clone())
        .bind(visit.address.clone())
        .bind(visit.google_maps_link.clone())
        .bind(visit.latitude)
        .bind(visit.longitude)
        .bind(visit.drawings.clone())
        .bind(visit.images.clone())
        .bind(visit.videos.clone())
        .bind(i64::from(visit.has_removals))
        .bind(visit.removal_charge)
        .bind(i64::from(visit.has_additional_labour))
        .bind(visit.additional_labour_charge)
        .bind(visit.service_type.as_str().to_owned())
        .bind(details(&visit.ceiling_details)?)
        .bind(details(&visit.gutters_details)?)
        .bind(details(&visit.roof_details)?)
        .bind(visit.quotation_number.clone())
        .bind(visit.quotation_pdf.clone())
        .bind(visit.total_amount)
        .bind(visit.status.as_str().to_owned())
        .bind(visit.notes.clone()))
}

fn corrupt(column: &str, err: impl fmt::Display) -> Error {
    Error::Database(sqlx::Error::ColumnDecode {
        index: column.to_owned(),
        source: err.to_string().into(),
    })
}

fn decode_row(row: &AnyRow) -> Result<SiteVisitRecord> {
    let text = |column: &str| row.try_get::<String, _>(column);
    let opt_text = |column: &str| row.try_get::<Option<String>, _>(column);
    let flag = |column: &str| row.try_get::<i64, _>(column).map(|v| v != 0);
    let amount = |column: &str| row.try_get::<Option<f64>, _>(column);
    let details = |column: &str| -> Result<Option<Value>> {
        opt_text(column)?
            .map(|raw| serde_json::from_str(&raw).map_err(|e| corrupt(column, e)))
            .transpose()
    };
    let timestamp = |column: &str| -> Result<DateTime<Utc>> {
        let raw = text(column)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| corrupt(column, e))
    };

    let customer_id = text("customer_id")?;
    let lead_received_date = text("lead_received_date")?;
    Ok(SiteVisitRecord {
        id: text("id")?,
        customer_id: customer_id
            .parse()
            .map_err(|e| corrupt("customer_id", e))?,
        visit: SiteVisitDraft {
            lead_received_date: NaiveDate::parse_from_str(&lead_received_date, "%Y-%m-%d")
                .map_err(|e| corrupt("lead_received_date", e))?,
            customer_name: text("customer_name")?,
            phone_number: text("phone_number")?,
            phone_has_whatsapp: flag("phone_has_whatsapp")?,
            has_whatsapp_number: row
                .try_get::<Option<i64>, _>("has_whatsapp_number")?
                .map(|v| v != 0),
            whatsapp_number: opt_text("whatsapp_number")?,
            district: text("district")?,
            city: text("city")?,
            address: opt_text("address")?,
            google_maps_link: opt_text("google_maps_link")?,
            latitude: amount("latitude")?,
            longitude: amount("longitude")?,
            drawings: opt_text("drawings")?,
            images: opt_text("images")?,
            videos: opt_text("videos")?,
            has_removals: flag("has_removals")?,
            removal_charge: amount("removal_charge")?,
            has_additional_labour: flag("has_additional_labour")?,
            additional_labour_charge: amount("additional_labour_charge")?,
            service_type: text("service_type")?
                .parse()
                .map_err(|e| corrupt("service_type", e))?,
            ceiling_details: details("ceiling_details")?,
            gutters_details: details("gutters_details")?,
            roof_details: details("roof_details")?,
            quotation_number: opt_text("quotation_number")?,
            quotation_pdf: opt_text("quotation_pdf")?,
            total_amount: amount("total_amount")?,
            status: text("status")?
                .parse()
                .map_err(|e| corrupt("status", e))?,
            notes: opt_text("notes")?,
        },
        created_at: timestamp("created_at")?,
        updated_at: timestamp("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        VisitStatus,
        fixtures::{draft, record},
    };
    use chrono::TimeDelta;

    async fn memory_store() -> DurableStore {
        sqlx::any::install_default_drivers();
        // A single, never-recycled connection: every new connection to
        // `sqlite::memory:` is a fresh empty database.
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = DurableStore::from_pool(pool);
        store.probe().await.unwrap();
        store
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = memory_store().await;
        let mut original = record("A-000a01", "Nimal Perera");
        original.visit.has_whatsapp_number = Some(false);
        original.visit.notes = Some("gate code 1234".to_owned());
        store.insert(&original).await.unwrap();

        let fetched = store.get(&original.id).await.unwrap().unwrap();
        assert_eq!(fetched, original);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_customer_id_is_a_conflict() {
        let store = memory_store().await;
        store.insert(&record("A-000a01", "First")).await.unwrap();
        let err = store
            .insert(&record("A-000a01", "Second"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }), "{err:?}");
    }

    async fn latest(store: &DurableStore) -> Option<String> {
        store.latest_customer_id().await.unwrap()
    }

    #[tokio::test]
    async fn listing_follows_creation_time() {
        let store = memory_store().await;
        let now = Utc::now();
        let older = SiteVisitRecord::new("A-000a05".parse().unwrap(), draft("Old"), now);
        let newer = SiteVisitRecord::new(
            "A-000a06".parse().unwrap(),
            draft("New"),
            now + TimeDelta::seconds(1),
        );
        store.insert(&newer).await.unwrap();
        store.insert(&older).await.unwrap();

        let names: Vec<_> = store
            .list(&VisitFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.visit.customer_name)
            .collect();
        assert_eq!(names, ["New", "Old"]);
    }

    #[tokio::test]
    async fn same_millisecond_listing_is_newest_id_first() {
        let store = memory_store().await;
        let now = Utc::now();
        for (customer_id, name) in [
            ("A-000a02", "Second"),
            ("Z-999z99", "Last"),
            ("A-000a01", "First"),
            ("AA-000a01", "Wide"),
        ] {
            let visit = SiteVisitRecord::new(customer_id.parse().unwrap(), draft(name), now);
            store.insert(&visit).await.unwrap();
        }

        let names: Vec<_> = store
            .list(&VisitFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.visit.customer_name)
            .collect();
        assert_eq!(names, ["Wide", "Last", "Second", "First"]);
    }

    #[tokio::test]
    async fn latest_is_highest_id_not_newest_row() {
        let store = memory_store().await;
        assert_eq!(latest(&store).await, None);

        // Same millisecond, lower ID inserted last.
        let now = Utc::now();
        let high = SiteVisitRecord::new("A-000a02".parse().unwrap(), draft("High"), now);
        let low = SiteVisitRecord::new("A-000a01".parse().unwrap(), draft("Low"), now);
        store.insert(&high).await.unwrap();
        store.insert(&low).await.unwrap();
        assert_eq!(latest(&store).await.as_deref(), Some("A-000a02"));

        store
            .insert(&record("Z-999z99", "Rollover"))
            .await
            .unwrap();
        store.insert(&record("AA-000a01", "Wide")).await.unwrap();
        assert_eq!(latest(&store).await.as_deref(), Some("AA-000a01"));
    }

    #[tokio::test]
    async fn deleted_ids_stay_issued() {
        let store = memory_store().await;
        let newest = record("A-000a02", "Second");
        store.insert(&record("A-000a01", "First")).await.unwrap();
        store.insert(&newest).await.unwrap();
        assert!(store.delete(&newest.id).await.unwrap());

        assert_eq!(latest(&store).await.as_deref(), Some("A-000a02"));
    }

    #[tokio::test]
    async fn conflicting_insert_leaves_mark_alone() {
        let store = memory_store().await;
        store.insert(&record("A-000a03", "First")).await.unwrap();
        assert!(store.insert(&record("A-000a03", "Again")).await.is_err());
        assert_eq!(latest(&store).await.as_deref(), Some("A-000a03"));
        assert_eq!(store.list(&VisitFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_is_seeded_from_existing_rows() {
        let store = memory_store().await;
        store.insert(&record("A-000c07", "Legacy")).await.unwrap();
        // Simulate a table created before the mark existed.
        sqlx::query("DROP TABLE customer_id_sequence")
            .execute(&store.pool)
            .await
            .unwrap();

        let reopened = DurableStore::from_pool(store.pool.clone());
        reopened.probe().await.unwrap();
        assert_eq!(latest(&reopened).await.as_deref(), Some("A-000c07"));
    }

    #[test]
    fn rank_follows_issuance_order() {
        let id = |s: &str| s.parse::<CustomerSequenceId>().unwrap();
        assert_eq!(rank(&id("A-000a01")).unwrap(), 0);
        assert_eq!(rank(&id("A-000a00")).unwrap(), -1);
        assert!(rank(&id("A-000a99")).unwrap() < rank(&id("A-000b01")).unwrap());
        assert!(rank(&id("Z-999z99")).unwrap() < rank(&id("AA-000a01")).unwrap());
        assert!(rank(&id("ZZZZZZZZZZZZZZ-999z99")).is_err());
    }

    async fn count(
        store: &DurableStore,
        status: Option<&str>,
        district: Option<&str>,
        search: Option<&str>,
    ) -> usize {
        let filter = VisitFilter::from_query(status, district, search).unwrap();
        store.list(&filter).await.unwrap().len()
    }

    #[tokio::test]
    async fn list_applies_filters() {
        let store = memory_store().await;
        let mut galle = record("A-000a01", "Kamal Silva");
        galle.visit.district = "Galle".to_owned();
        galle.visit.phone_number = "0719876543".to_owned();
        galle.visit.status = VisitStatus::Running;
        store.insert(&galle).await.unwrap();
        store.insert(&record("A-000a02", "Nimal Perera")).await.unwrap();

        assert_eq!(count(&store, None, None, None).await, 2);
        assert_eq!(count(&store, Some("running"), None, None).await, 1);
        assert_eq!(count(&store, None, Some("Colombo"), None).await, 1);
        assert_eq!(count(&store, None, None, Some("KAMAL")).await, 1);
        assert_eq!(count(&store, None, None, Some("a-000a0")).await, 2);
        assert_eq!(count(&store, None, None, Some("temple")).await, 2);
        assert_eq!(count(&store, None, None, Some("0719")).await, 1);
        assert_eq!(count(&store, None, None, Some("%")).await, 0);
        assert_eq!(count(&store, Some("pending"), Some("Galle"), None).await, 0);
    }

    #[tokio::test]
    async fn update_replaces_fields_and_delete_removes() {
        let store = memory_store().await;
        let original = record("A-000a01", "Nimal Perera");
        store.insert(&original).await.unwrap();

        let mut changes = draft("Nimal Perera");
        changes.status = VisitStatus::Complete;
        changes.total_amount = Some(200_000.0);
        changes.ceiling_details = None;
        let updated = original.with_changes(changes, original.created_at + TimeDelta::seconds(30));
        assert!(store.update(&updated).await.unwrap());
        assert_eq!(store.get(&original.id).await.unwrap().unwrap(), updated);

        assert!(!store.update(&record("A-000a09", "Ghost")).await.unwrap());
        assert!(store.delete(&original.id).await.unwrap());
        assert!(!store.delete(&original.id).await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_database_is_unavailable() {
        let store = DurableStore::connect_lazy(
            "postgres://nobody@127.0.0.1:1/site_visits",
            1,
            Duration::from_millis(500),
        )
        .unwrap();
        let err = store.probe().await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }), "{err:?}");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
