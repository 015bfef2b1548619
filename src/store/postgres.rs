use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use super::{OrderStore, StoreError};
use crate::domain::catalog::CatalogItem;
use crate::domain::order::{
    AdvanceStatus, AuditTrail, LineItem, OrderCode, OrderError, OrderSnapshot, OrderStatus, Operator,
    PlaceOrder, TransitionPolicy, TransitionRecord,
};
use crate::utils::{retry_with_backoff, RetryConfig};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Transitions lock the order row with SELECT ... FOR UPDATE, so concurrent
// writers on one order queue behind each other while different orders
// proceed in parallel. Order creation reads the catalog FOR SHARE, which
// keeps availability and price stable until the insert commits.
//
// ============================================================================

const SCHEMA: &str = include_str!("../../migrations/0001_orders.sql");

/// Attempts at drawing an unused order code inside one transaction.
const MAX_CODE_ATTEMPTS: u32 = 5;

const ORDER_COLUMNS: &str =
    "id, code, customer_name, table_label, contact, status, total, version, created_at, updated_at";

/// Opens a pool, waiting for the database with exponential backoff.
pub async fn connect_postgres(url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = retry_with_backoff(RetryConfig::startup(), "postgres_connect", |_attempt| {
        PgPoolOptions::new().max_connections(max_connections).connect(url)
    })
    .await?;

    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates missing tables and indexes. Safe to run on every start.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }
}

fn db(error: sqlx::Error) -> OrderError {
    OrderError::Storage(StoreError::Database(error))
}

fn corrupt(message: String) -> OrderError {
    OrderError::Storage(StoreError::Corrupt(message))
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some("23503"),
        _ => false,
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, OrderError> {
    raw.parse().map_err(corrupt)
}

/// Order columns only; items and history are attached by `load_children`.
fn order_from_row(row: &PgRow) -> Result<OrderSnapshot, OrderError> {
    let status: String = row.try_get("status").map_err(db)?;
    Ok(OrderSnapshot {
        id: row.try_get("id").map_err(db)?,
        code: OrderCode::from_stored(row.try_get("code").map_err(db)?),
        customer_name: row.try_get("customer_name").map_err(db)?,
        table_label: row.try_get("table_label").map_err(db)?,
        contact: row.try_get("contact").map_err(db)?,
        status: parse_status(&status)?,
        total: row.try_get("total").map_err(db)?,
        items: Vec::new(),
        history: AuditTrail::new(),
        version: row.try_get("version").map_err(db)?,
        created_at: row.try_get("created_at").map_err(db)?,
        updated_at: row.try_get("updated_at").map_err(db)?,
    })
}

fn transition_from_row(row: &PgRow) -> Result<TransitionRecord, OrderError> {
    let previous: String = row.try_get("previous_status").map_err(db)?;
    let new: String = row.try_get("new_status").map_err(db)?;
    let operator_id: Option<Uuid> = row.try_get("operator_id").map_err(db)?;
    let operator_name: Option<String> = row.try_get("operator_name").map_err(db)?;

    Ok(TransitionRecord {
        id: row.try_get("id").map_err(db)?,
        previous_status: parse_status(&previous)?,
        new_status: parse_status(&new)?,
        note: row.try_get("note").map_err(db)?,
        created_at: row.try_get("created_at").map_err(db)?,
        actor: operator_id.map(|id| Operator { id, name: operator_name }),
    })
}

/// Attaches line items and audit trails to `orders` with two queries.
async fn load_children(conn: &mut PgConnection, orders: &mut [OrderSnapshot]) -> Result<(), OrderError> {
    if orders.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();

    let item_rows = sqlx::query(
        "SELECT order_id, menu_item_id, name, quantity, unit_price, notes
         FROM order_items
         WHERE order_id = ANY($1)
         ORDER BY order_id, position",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(db)?;

    let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
    for row in &item_rows {
        let order_id: Uuid = row.try_get("order_id").map_err(db)?;
        items.entry(order_id).or_default().push(LineItem {
            item_id: row.try_get("menu_item_id").map_err(db)?,
            name: row.try_get("name").map_err(db)?,
            quantity: row.try_get("quantity").map_err(db)?,
            unit_price: row.try_get("unit_price").map_err(db)?,
            notes: row.try_get("notes").map_err(db)?,
        });
    }

    let history_rows = sqlx::query(
        "SELECT id, order_id, previous_status, new_status, note, operator_id, operator_name, created_at
         FROM order_status_history
         WHERE order_id = ANY($1)
         ORDER BY order_id, created_at",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(db)?;

    let mut history: HashMap<Uuid, Vec<TransitionRecord>> = HashMap::new();
    for row in &history_rows {
        let order_id: Uuid = row.try_get("order_id").map_err(db)?;
        history.entry(order_id).or_default().push(transition_from_row(row)?);
    }

    for order in orders.iter_mut() {
        order.items = items.remove(&order.id).unwrap_or_default();
        order.history = AuditTrail::from_entries(history.remove(&order.id).unwrap_or_default());
    }
    Ok(())
}

async fn insert_transition(
    conn: &mut PgConnection,
    order_id: Uuid,
    record: &TransitionRecord,
) -> Result<(), OrderError> {
    let (operator_id, operator_name) = match &record.actor {
        Some(actor) => (Some(actor.id), actor.name.clone()),
        None => (None, None),
    };

    sqlx::query(
        "INSERT INTO order_status_history
            (id, order_id, previous_status, new_status, note, operator_id, operator_name, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(record.id)
    .bind(order_id)
    .bind(record.previous_status.as_str())
    .bind(record.new_status.as_str())
    .bind(record.note.as_deref())
    .bind(operator_id)
    .bind(operator_name)
    .bind(record.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db)?;

    Ok(())
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create_order(&self, id: Uuid, order: &PlaceOrder) -> Result<OrderSnapshot, OrderError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let ids = order.item_ids();
        let rows = sqlx::query(
            "SELECT id, name, price, is_available FROM catalog_items WHERE id = ANY($1) FOR SHARE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;

        let mut catalog = HashMap::with_capacity(rows.len());
        for row in &rows {
            let item = CatalogItem {
                id: row.try_get("id").map_err(db)?,
                name: row.try_get("name").map_err(db)?,
                price: row.try_get::<Decimal, _>("price").map_err(db)?,
                is_available: row.try_get("is_available").map_err(db)?,
            };
            catalog.insert(item.id, item);
        }

        // Dropping `tx` on an early return rolls the transaction back.
        let priced = order.price(&catalog)?;
        let mut snapshot = OrderSnapshot::open(id, OrderCode::generate(), priced, Utc::now());

        let mut attempt = 1;
        loop {
            let inserted = sqlx::query(
                "INSERT INTO orders
                    (id, code, customer_name, table_label, contact, status, total, version, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (code) DO NOTHING",
            )
            .bind(snapshot.id)
            .bind(snapshot.code.as_str())
            .bind(&snapshot.customer_name)
            .bind(snapshot.table_label.as_deref())
            .bind(snapshot.contact.as_deref())
            .bind(snapshot.status.as_str())
            .bind(snapshot.total)
            .bind(snapshot.version)
            .bind(snapshot.created_at)
            .bind(snapshot.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db)?;

            if inserted.rows_affected() == 1 {
                break;
            }
            if attempt >= MAX_CODE_ATTEMPTS {
                return Err(OrderError::Storage(StoreError::Unavailable(
                    "could not allocate a unique order code".to_string(),
                )));
            }
            tracing::warn!(code = %snapshot.code, attempt, "Order code collision, drawing a new one");
            snapshot.code = OrderCode::generate();
            attempt += 1;
        }

        for (position, line) in snapshot.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items
                    (order_id, position, menu_item_id, name, quantity, unit_price, notes)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(snapshot.id)
            .bind(position as i32)
            .bind(line.item_id)
            .bind(&line.name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.notes.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        for record in snapshot.history.entries() {
            insert_transition(&mut tx, snapshot.id, record).await?;
        }

        tx.commit().await.map_err(db)?;
        Ok(snapshot)
    }

    async fn advance_status(
        &self,
        command: &AdvanceStatus,
        policy: TransitionPolicy,
    ) -> Result<OrderSnapshot, OrderError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(command.order_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?
            .ok_or(OrderError::NotFound(command.order_id))?;

        let mut orders = [order_from_row(&row)?];
        load_children(&mut tx, &mut orders).await?;
        let [mut order] = orders;

        let record = order.plan_transition(command, policy, Utc::now())?;
        insert_transition(&mut tx, order.id, &record).await?;
        order.apply_transition(record);

        sqlx::query("UPDATE orders SET status = $2, version = $3, updated_at = $4 WHERE id = $1")
            .bind(order.id)
            .bind(order.status.as_str())
            .bind(order.version)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<OrderSnapshot>, OrderError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;

        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = [order_from_row(&row)?];
        load_children(&mut conn, &mut orders).await?;
        let [order] = orders;
        Ok(Some(order))
    }

    async fn list_orders(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderSnapshot>, OrderError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        let filter: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE cardinality($1::text[]) = 0 OR status = ANY($1::text[])
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(&filter)
        .fetch_all(&mut *conn)
        .await
        .map_err(db)?;

        let mut orders = rows.iter().map(order_from_row).collect::<Result<Vec<_>, _>>()?;
        load_children(&mut conn, &mut orders).await?;
        Ok(orders)
    }

    async fn upsert_catalog_item(&self, item: CatalogItem) -> Result<(), OrderError> {
        sqlx::query(
            "INSERT INTO catalog_items (id, name, price, is_available, updated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (id) DO UPDATE
             SET name = EXCLUDED.name,
                 price = EXCLUDED.price,
                 is_available = EXCLUDED.is_available,
                 updated_at = now()",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.is_available)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn delete_catalog_item(&self, id: Uuid) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let referenced: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_items WHERE menu_item_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db)?;
        if referenced {
            return Err(OrderError::Conflict(format!(
                "catalog item {id} is referenced by existing orders"
            )));
        }

        let deleted = match sqlx::query("DELETE FROM catalog_items WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
        {
            Ok(result) => result,
            // An order referencing the item committed after the EXISTS check.
            Err(error) if is_foreign_key_violation(&error) => {
                return Err(OrderError::Conflict(format!(
                    "catalog item {id} is referenced by existing orders"
                )));
            }
            Err(error) => return Err(db(error)),
        };

        if deleted.rows_affected() == 0 {
            return Err(OrderError::ItemNotFound(id));
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
