use crate::model::{
    PriceSample, Product, Recommendation, RecommendationRecord, RecommendationStatus, StorageError,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database at the given path and runs migrations.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                sku TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                cost_price REAL NOT NULL,
                current_price REAL NOT NULL,
                competitor_price REAL,
                sales_velocity REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS price_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id TEXT NOT NULL,
                price REAL NOT NULL,
                source TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                observed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS recommendations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id TEXT NOT NULL,
                suggested_price REAL NOT NULL,
                predicted_margin REAL NOT NULL,
                confidence_score INTEGER NOT NULL,
                rationale TEXT NOT NULL,
                status TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                competitor_min_price REAL NOT NULL,
                competitor_max_price REAL NOT NULL,
                market_position TEXT NOT NULL,
                strategy TEXT NOT NULL,
                implementation_timing TEXT NOT NULL,
                revenue_impact REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_samples_product_time
                ON price_samples (product_id, observed_at);
            ",
        )?;

        // Auto-migrations for columns added after the initial schema.
        Self::migrate_add_column_if_missing(&conn, "products", "sku", "TEXT NOT NULL DEFAULT ''")?;
        Self::migrate_add_column_if_missing(
            &conn,
            "products",
            "sales_velocity",
            "REAL NOT NULL DEFAULT 0",
        )?;

        Ok(Self { conn })
    }

    /// Checks whether a column exists and adds it to the table when missing.
    fn migrate_add_column_if_missing(
        conn: &Connection,
        table: &str,
        column: &str,
        column_def: &str,
    ) -> Result<(), StorageError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let existing_columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        if !existing_columns.iter().any(|c| c == column) {
            let alter_sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def);
            conn.execute(&alter_sql, [])?;
        }

        Ok(())
    }

    /// Inserts or replaces a product row.
    pub fn upsert_product(&self, product: &Product) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO products (
                id, name, sku, category, cost_price, current_price,
                competitor_price, sales_velocity
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &product.id,
                &product.name,
                &product.sku,
                &product.category,
                &product.cost_price,
                &product.current_price,
                &product.competitor_price,
                &product.sales_velocity,
            ],
        )?;
        Ok(())
    }

    pub fn get_product(&self, product_id: &str) -> Result<Product, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, sku, category, cost_price, current_price,
                    competitor_price, sales_velocity
             FROM products WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![product_id])?;
        match rows.next()? {
            Some(row) => Ok(Self::map_product(row)?),
            None => Err(StorageError::NotFound(format!("product {}", product_id))),
        }
    }

    pub fn list_products(&self) -> Result<Vec<Product>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, sku, category, cost_price, current_price,
                    competitor_price, sales_velocity
             FROM products ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| Self::map_product(row))?;
        let mut products = Vec::new();
        for product in rows {
            products.push(product?);
        }
        Ok(products)
    }

    /// Deletes a product together with its samples and recommendations.
    pub fn delete_product(&mut self, product_id: &str) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM price_samples WHERE product_id = ?1", params![product_id])?;
        tx.execute(
            "DELETE FROM recommendations WHERE product_id = ?1",
            params![product_id],
        )?;
        tx.execute("DELETE FROM products WHERE id = ?1", params![product_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Appends one observed price. Samples are never updated in place.
    pub fn append_sample(&self, product_id: &str, sample: &PriceSample) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO price_samples (product_id, price, source, url, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                product_id,
                &sample.price,
                &sample.source,
                &sample.url,
                &sample.observed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All samples for a product observed at or after `cutoff`, oldest first.
    pub fn samples_since(
        &self,
        product_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PriceSample>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT price, source, url, observed_at FROM price_samples
             WHERE product_id = ?1 AND observed_at >= ?2
             ORDER BY observed_at ASC",
        )?;
        let rows = stmt.query_map(params![product_id, cutoff.to_rfc3339()], |row| {
            Self::map_sample(row)
        })?;
        let mut samples = Vec::new();
        for sample in rows {
            samples.push(sample?);
        }
        Ok(samples)
    }

    /// Full sample history for a product, oldest first.
    pub fn samples_for_product(&self, product_id: &str) -> Result<Vec<PriceSample>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT price, source, url, observed_at FROM price_samples
             WHERE product_id = ?1 ORDER BY observed_at ASC",
        )?;
        let rows = stmt.query_map(params![product_id], |row| Self::map_sample(row))?;
        let mut samples = Vec::new();
        for sample in rows {
            samples.push(sample?);
        }
        Ok(samples)
    }

    pub fn get_recommendation(&self, id: i64) -> Result<RecommendationRecord, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, suggested_price, predicted_margin, confidence_score,
                    rationale, status, risk_level, competitor_min_price, competitor_max_price,
                    market_position, strategy, implementation_timing, revenue_impact, created_at
             FROM recommendations WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Self::map_recommendation(row)?),
            None => Err(StorageError::NotFound(format!("recommendation {}", id))),
        }
    }

    /// The pending recommendation for a product, if one exists. At most one
    /// pending row per product is maintained by the lifecycle; this read is
    /// part of a check-then-act sequence and is not atomic across writers.
    pub fn pending_recommendation(
        &self,
        product_id: &str,
    ) -> Result<Option<RecommendationRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, suggested_price, predicted_margin, confidence_score,
                    rationale, status, risk_level, competitor_min_price, competitor_max_price,
                    market_position, strategy, implementation_timing, revenue_impact, created_at
             FROM recommendations WHERE product_id = ?1 AND status = 'pending'
             ORDER BY created_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![product_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::map_recommendation(row)?)),
            None => Ok(None),
        }
    }

    pub fn insert_recommendation(
        &self,
        product_id: &str,
        rec: &Recommendation,
    ) -> Result<RecommendationRecord, StorageError> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO recommendations (
                product_id, suggested_price, predicted_margin, confidence_score, rationale,
                status, risk_level, competitor_min_price, competitor_max_price,
                market_position, strategy, implementation_timing, revenue_impact, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                product_id,
                &rec.suggested_price,
                &rec.predicted_margin,
                &rec.confidence_score,
                &rec.rationale,
                rec.status.as_str(),
                rec.risk_level.as_str(),
                &rec.competitor_min_price,
                &rec.competitor_max_price,
                &rec.market_position,
                &rec.strategy,
                &rec.implementation_timing,
                &rec.revenue_impact,
                &created_at.to_rfc3339(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(RecommendationRecord {
            id,
            product_id: product_id.to_string(),
            created_at,
            recommendation: rec.clone(),
        })
    }

    /// Overwrites the optimizer outputs of an existing pending row in place.
    /// Refreshing never creates a duplicate and never touches terminal rows.
    pub fn update_pending(
        &self,
        id: i64,
        rec: &Recommendation,
    ) -> Result<RecommendationRecord, StorageError> {
        let existing = self.get_recommendation(id)?;
        if existing.recommendation.status.is_terminal() {
            return Err(StorageError::InvalidTransition {
                from: existing.recommendation.status,
                to: RecommendationStatus::Pending,
            });
        }
        self.conn.execute(
            "UPDATE recommendations SET
                suggested_price = ?1, predicted_margin = ?2, confidence_score = ?3,
                rationale = ?4, risk_level = ?5, competitor_min_price = ?6,
                competitor_max_price = ?7, market_position = ?8, strategy = ?9,
                implementation_timing = ?10, revenue_impact = ?11
             WHERE id = ?12",
            params![
                &rec.suggested_price,
                &rec.predicted_margin,
                &rec.confidence_score,
                &rec.rationale,
                rec.risk_level.as_str(),
                &rec.competitor_min_price,
                &rec.competitor_max_price,
                &rec.market_position,
                &rec.strategy,
                &rec.implementation_timing,
                &rec.revenue_impact,
                id,
            ],
        )?;
        self.get_recommendation(id)
    }

    /// Marks a pending recommendation as applied and writes the suggested
    /// price back to the product, in one transaction. The cross-entity side
    /// effect is deliberate and atomic with the status change.
    pub fn apply_recommendation(&mut self, id: i64) -> Result<RecommendationRecord, StorageError> {
        let existing = self.get_recommendation(id)?;
        if existing.recommendation.status != RecommendationStatus::Pending {
            return Err(StorageError::InvalidTransition {
                from: existing.recommendation.status,
                to: RecommendationStatus::Applied,
            });
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE recommendations SET status = 'applied' WHERE id = ?1",
            params![id],
        )?;
        tx.execute(
            "UPDATE products SET current_price = ?1 WHERE id = ?2",
            params![&existing.recommendation.suggested_price, &existing.product_id],
        )?;
        tx.commit()?;

        self.get_recommendation(id)
    }

    /// Marks a pending recommendation as rejected.
    pub fn reject_recommendation(&self, id: i64) -> Result<RecommendationRecord, StorageError> {
        let existing = self.get_recommendation(id)?;
        if existing.recommendation.status != RecommendationStatus::Pending {
            return Err(StorageError::InvalidTransition {
                from: existing.recommendation.status,
                to: RecommendationStatus::Rejected,
            });
        }
        self.conn.execute(
            "UPDATE recommendations SET status = 'rejected' WHERE id = ?1",
            params![id],
        )?;
        self.get_recommendation(id)
    }

    fn map_product(row: &Row) -> Result<Product, rusqlite::Error> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            sku: row.get(2)?,
            category: row.get(3)?,
            cost_price: row.get(4)?,
            current_price: row.get(5)?,
            competitor_price: row.get(6)?,
            sales_velocity: row.get(7)?,
        })
    }

    fn map_sample(row: &Row) -> Result<PriceSample, rusqlite::Error> {
        let observed_at_str: String = row.get(3)?;
        let observed_at = observed_at_str.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(PriceSample {
            price: row.get(0)?,
            source: row.get(1)?,
            url: row.get(2)?,
            observed_at,
        })
    }

    fn map_recommendation(row: &Row) -> Result<RecommendationRecord, rusqlite::Error> {
        let status_str: String = row.get(6)?;
        let status = match status_str.as_str() {
            "pending" => RecommendationStatus::Pending,
            "applied" => RecommendationStatus::Applied,
            "rejected" => RecommendationStatus::Rejected,
            other => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    format!("unknown status: {}", other).into(),
                ))
            }
        };
        let risk_str: String = row.get(7)?;
        let risk_level = match risk_str.as_str() {
            "low" => crate::model::RiskLevel::Low,
            "medium" => crate::model::RiskLevel::Medium,
            "high" => crate::model::RiskLevel::High,
            other => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    format!("unknown risk level: {}", other).into(),
                ))
            }
        };
        let created_at_str: String = row.get(14)?;
        let created_at = created_at_str.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(14, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(RecommendationRecord {
            id: row.get(0)?,
            product_id: row.get(1)?,
            created_at,
            recommendation: Recommendation {
                suggested_price: row.get(2)?,
                predicted_margin: row.get(3)?,
                confidence_score: row.get(4)?,
                rationale: row.get(5)?,
                status,
                risk_level,
                competitor_min_price: row.get(8)?,
                competitor_max_price: row.get(9)?,
                market_position: row.get(10)?,
                strategy: row.get(11)?,
                implementation_timing: row.get(12)?,
                revenue_impact: row.get(13)?,
            },
        })
    }
}
