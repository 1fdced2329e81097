use crate::db::models::{CrimeData, CrimeGroupTotal, CrimeRecord, Municipality};
use crate::db::operations::DbOperations;
use crate::error::AppError;
use chrono::Utc;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use tracing::{error, info};

const DEFAULT_ROW_LIMIT: i64 = 1000;
const MAX_ROW_LIMIT: i64 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrimeQuery {
    /// Municipality code, e.g. `564` for Oulu.
    pub municipality: Option<String>,
    pub crime_group: Option<String>,
    /// Inclusive lower bound, `YYYYMmm`.
    pub from_month: Option<String>,
    /// Inclusive upper bound, `YYYYMmm`.
    pub to_month: Option<String>,
    pub limit: Option<i64>,
}

impl CrimeQuery {
    pub fn validate(&self) -> Result<(), AppError> {
        for month in [&self.from_month, &self.to_month].into_iter().flatten() {
            if !is_month_code(month) {
                return Err(AppError::validation(format!(
                    "invalid month '{}', expected e.g. 2024M01",
                    month
                )));
            }
        }
        Ok(())
    }

    fn row_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_ROW_LIMIT).clamp(1, MAX_ROW_LIMIT)
    }
}

/// PxWeb month codes look like `2024M01`; they sort lexically.
pub fn is_month_code(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 7
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'M'
        && bytes[5..].iter().all(u8::is_ascii_digit)
        && matches!(&value[5..], "01" | "02" | "03" | "04" | "05" | "06" | "07" | "08" | "09" | "10" | "11" | "12")
}

/// Outcome of persisting a set of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    pub stored: usize,
    pub failed_batches: usize,
}

fn push_crime_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &CrimeQuery) {
    builder.push(" WHERE TRUE");
    if let Some(code) = &query.municipality {
        builder.push(" AND municipality_code = ").push_bind(code.clone());
    }
    if let Some(group) = &query.crime_group {
        builder.push(" AND crime_group_code = ").push_bind(group.clone());
    }
    if let Some(from) = &query.from_month {
        builder.push(" AND month >= ").push_bind(from.clone());
    }
    if let Some(to) = &query.to_month {
        builder.push(" AND month <= ").push_bind(to.clone());
    }
}

impl DbOperations {
    /// Upserts records in batches, one transaction per batch. A failed batch
    /// is rolled back and counted; later batches still run.
    pub async fn upsert_crime_records(&self, records: &[CrimeRecord], batch_size: usize) -> UpsertOutcome {
        let mut outcome = UpsertOutcome::default();
        let batch_size = batch_size.max(1);

        for (index, batch) in records.chunks(batch_size).enumerate() {
            match self.upsert_crime_batch(batch).await {
                Ok(()) => {
                    outcome.stored += batch.len();
                    info!("Stored crime batch {} ({} rows)", index + 1, batch.len());
                }
                Err(e) => {
                    outcome.failed_batches += 1;
                    error!("Crime batch {} failed: {}", index + 1, e);
                }
            }
        }

        outcome
    }

    async fn upsert_crime_batch(&self, batch: &[CrimeRecord]) -> Result<(), AppError> {
        let mut tx = self.begin_transaction().await?;
        let now = Utc::now();

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO crime_data \
             (month, municipality_code, municipality_name, crime_group_code, crime_group_name, count, updated_at) ",
        );
        builder.push_values(batch, |mut row, record| {
            row.push_bind(record.month.clone())
                .push_bind(record.municipality_code.clone())
                .push_bind(record.municipality_name.clone())
                .push_bind(record.crime_group_code.clone())
                .push_bind(record.crime_group_name.clone())
                .push_bind(record.count)
                .push_bind(now);
        });
        builder.push(
            " ON CONFLICT (month, municipality_code, crime_group_code) DO UPDATE SET \
             municipality_name = EXCLUDED.municipality_name, \
             crime_group_name = EXCLUDED.crime_group_name, \
             count = EXCLUDED.count, \
             updated_at = EXCLUDED.updated_at",
        );

        builder.build().execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_crime_data(&self, query: &CrimeQuery) -> Result<Vec<CrimeData>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM crime_data");
        push_crime_filters(&mut builder, query);
        builder
            .push(" ORDER BY month DESC, municipality_code, crime_group_code LIMIT ")
            .push_bind(query.row_limit());

        let rows = builder
            .build_query_as::<CrimeData>()
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    /// Totals per crime group over the filtered window.
    pub async fn crime_summary(&self, query: &CrimeQuery) -> Result<Vec<CrimeGroupTotal>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT crime_group_code, MAX(crime_group_name) AS crime_group_name, \
             COALESCE(SUM(count), 0)::BIGINT AS total FROM crime_data",
        );
        push_crime_filters(&mut builder, query);
        builder.push(" GROUP BY crime_group_code ORDER BY total DESC, crime_group_code");

        let rows = builder
            .build_query_as::<CrimeGroupTotal>()
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    pub async fn crime_municipalities(&self) -> Result<Vec<Municipality>, AppError> {
        let rows = sqlx::query_as::<_, Municipality>(
            r#"
            SELECT municipality_code, MAX(municipality_name) AS municipality_name
            FROM crime_data
            GROUP BY municipality_code
            ORDER BY municipality_name
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
