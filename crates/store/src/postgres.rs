use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    BuyerId, CartKey, CartLine, Item, ItemId, Result, SaleId, SaleRecord, SalesSummary,
    StoreError, VendorId,
    store::{MarketStore, StoreTransaction},
};

/// PostgreSQL-backed market store implementation.
#[derive(Clone)]
pub struct PostgresMarketStore {
    pool: PgPool,
}

impl PostgresMarketStore {
    /// Creates a new PostgreSQL market store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    fn row_to_item(row: PgRow) -> Result<Item> {
        Ok(Item {
            id: ItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            vendor_id: VendorId::from_uuid(row.try_get::<Uuid, _>("vendor_id")?),
            name: row.try_get("name")?,
            price: row.try_get::<Decimal, _>("price")?,
            quantity: to_quantity(row.try_get("quantity")?)?,
        })
    }

    fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
        Ok(CartLine {
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            vendor_id: VendorId::from_uuid(row.try_get::<Uuid, _>("vendor_id")?),
            item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
            quantity: to_quantity(row.try_get("quantity")?)?,
        })
    }

    fn row_to_sale(row: PgRow) -> Result<SaleRecord> {
        Ok(SaleRecord {
            id: SaleId::from_uuid(row.try_get::<Uuid, _>("id")?),
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            vendor_id: VendorId::from_uuid(row.try_get::<Uuid, _>("vendor_id")?),
            item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
            price_paid: row.try_get::<Decimal, _>("price_paid")?,
            quantity_bought: to_quantity(row.try_get("quantity_bought")?)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            idempotency_key: row.try_get("idempotency_key")?,
        })
    }
}

fn to_quantity(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRow(format!("quantity out of range: {value}")))
}

fn to_count(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::InvalidRow(format!("count out of range: {value}")))
}

#[async_trait]
impl MarketStore for PostgresMarketStore {
    type Transaction = PostgresTransaction;

    async fn insert_item(&self, item: Item) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, vendor_id, name, price, quantity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.vendor_id.as_uuid())
        .bind(&item.name)
        .bind(item.price)
        .bind(i64::from(item.quantity))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_item(&self, item_id: ItemId) -> Result<Option<Item>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, vendor_id, name, price, quantity
            FROM items
            WHERE id = $1
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn get_cart_line(&self, key: CartKey) -> Result<Option<CartLine>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT buyer_id, vendor_id, item_id, quantity
            FROM cart_lines
            WHERE buyer_id = $1 AND vendor_id = $2 AND item_id = $3
            "#,
        )
        .bind(key.buyer_id.as_uuid())
        .bind(key.vendor_id.as_uuid())
        .bind(key.item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart_line).transpose()
    }

    async fn insert_cart_line(&self, line: CartLine) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO cart_lines (buyer_id, vendor_id, item_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (buyer_id, vendor_id, item_id) DO NOTHING
            "#,
        )
        .bind(line.buyer_id.as_uuid())
        .bind(line.vendor_id.as_uuid())
        .bind(line.item_id.as_uuid())
        .bind(i64::from(line.quantity))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_cart_line_quantity(&self, key: CartKey, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cart_lines
            SET quantity = $4
            WHERE buyer_id = $1 AND vendor_id = $2 AND item_id = $3
            "#,
        )
        .bind(key.buyer_id.as_uuid())
        .bind(key.vendor_id.as_uuid())
        .bind(key.item_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_cart_line(&self, key: CartKey) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM cart_lines WHERE buyer_id = $1 AND vendor_id = $2 AND item_id = $3",
        )
        .bind(key.buyer_id.as_uuid())
        .bind(key.vendor_id.as_uuid())
        .bind(key.item_id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_cart_lines(&self, buyer_id: BuyerId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT buyer_id, vendor_id, item_id, quantity
            FROM cart_lines
            WHERE buyer_id = $1
            "#,
        )
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart_line).collect()
    }

    async fn clear_cart_lines(&self, buyer_id: BuyerId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE buyer_id = $1")
            .bind(buyer_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn get_sale(&self, sale_id: SaleId) -> Result<Option<SaleRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, buyer_id, vendor_id, item_id, price_paid, quantity_bought, created_at, idempotency_key
            FROM sales
            WHERE id = $1
            "#,
        )
        .bind(sale_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_sale).transpose()
    }

    async fn find_sale_by_idempotency_key(
        &self,
        buyer_id: BuyerId,
        key: &str,
    ) -> Result<Option<SaleId>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM sales WHERE buyer_id = $1 AND idempotency_key = $2",
        )
        .bind(buyer_id.as_uuid())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(SaleId::from_uuid))
    }

    async fn sales_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<SaleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, buyer_id, vendor_id, item_id, price_paid, quantity_bought, created_at, idempotency_key
            FROM sales
            WHERE vendor_id = $1
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(vendor_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_sale).collect()
    }

    async fn sales_summary(
        &self,
        vendor_id: VendorId,
        item_id: Option<ItemId>,
    ) -> Result<SalesSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS sale_count,
                COALESCE(SUM(quantity_bought), 0)::BIGINT AS units_sold,
                COALESCE(SUM(price_paid * quantity_bought), 0) AS revenue
            FROM sales
            WHERE vendor_id = $1 AND ($2::UUID IS NULL OR item_id = $2)
            "#,
        )
        .bind(vendor_id.as_uuid())
        .bind(item_id.map(|id| id.as_uuid()))
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesSummary {
            sale_count: to_count(row.try_get("sale_count")?)?,
            units_sold: to_count(row.try_get("units_sold")?)?,
            revenue: row.try_get::<Decimal, _>("revenue")?,
        })
    }

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }
}

/// Transaction over a [`PostgresMarketStore`].
///
/// Dropping it without committing rolls the transaction back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn find_sale_by_idempotency_key(
        &mut self,
        buyer_id: BuyerId,
        key: &str,
    ) -> Result<Option<SaleId>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM sales WHERE buyer_id = $1 AND idempotency_key = $2",
        )
        .bind(buyer_id.as_uuid())
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(id.map(SaleId::from_uuid))
    }

    async fn decrement_stock_if_available(
        &mut self,
        item_id: ItemId,
        vendor_id: VendorId,
        quantity: u32,
    ) -> Result<bool> {
        // The predicate is re-evaluated against the latest committed row
        // version once any concurrent writer releases its row lock.
        let result = sqlx::query(
            r#"
            UPDATE items
            SET quantity = quantity - $3
            WHERE id = $1 AND vendor_id = $2 AND quantity >= $3
            "#,
        )
        .bind(item_id.as_uuid())
        .bind(vendor_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_sale(&mut self, sale: &SaleRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (id, buyer_id, vendor_id, item_id, price_paid, quantity_bought, created_at, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(sale.buyer_id.as_uuid())
        .bind(sale.vendor_id.as_uuid())
        .bind(sale.item_id.as_uuid())
        .bind(sale.price_paid)
        .bind(i64::from(sale.quantity_bought))
        .bind(sale.created_at)
        .bind(sale.idempotency_key.as_deref())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_sale_idempotency_key")
            {
                return StoreError::DuplicateIdempotencyKey(
                    sale.idempotency_key.clone().unwrap_or_default(),
                );
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
