//! Database query operations for WeeWX tables

use crate::schema::{
    day_summary_columns, is_valid_identifier, tables, ArchiveSampleRow, DaySummaryRow,
    VectorSummaryRow,
};
use crate::{DbClient, DbError, DbResult};
use tracing::{debug, instrument};
use weex_core::{DaySummaryRecord, SummaryLayout, Timestamp, UnitSystem};

impl DbClient {
    /// Unit system of the archive, `None` when it holds no records
    #[instrument(skip(self))]
    pub async fn get_unit_system(&self) -> DbResult<Option<UnitSystem>> {
        let code: Option<i64> =
            sqlx::query_scalar("SELECT CAST(usUnits AS INTEGER) FROM archive LIMIT 1")
                .fetch_optional(self.pool())
                .await?;

        code.map(|c| {
            UnitSystem::from_code(c as i32).map_err(|e| DbError::InvalidData(e.to_string()))
        })
        .transpose()
    }

    /// Earliest archive timestamp
    #[instrument(skip(self))]
    pub async fn first_timestamp(&self) -> DbResult<Option<Timestamp>> {
        let ts: Option<i64> = sqlx::query_scalar("SELECT MIN(dateTime) FROM archive")
            .fetch_one(self.pool())
            .await?;
        Ok(ts)
    }

    /// Latest archive timestamp
    #[instrument(skip(self))]
    pub async fn last_timestamp(&self) -> DbResult<Option<Timestamp>> {
        let ts: Option<i64> = sqlx::query_scalar("SELECT MAX(dateTime) FROM archive")
            .fetch_one(self.pool())
            .await?;
        Ok(ts)
    }

    /// Whether a table exists
    #[instrument(skip(self))]
    pub async fn table_exists(&self, name: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }

    /// Column names of the archive table
    #[instrument(skip(self))]
    pub async fn archive_columns(&self) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('archive')")
            .fetch_all(self.pool())
            .await?;
        Ok(names)
    }

    /// Samples of one observation with `start < dateTime <= stop`
    #[instrument(skip(self))]
    pub async fn get_archive_samples(
        &self,
        obs_type: &str,
        start: Timestamp,
        stop: Timestamp,
    ) -> DbResult<Vec<ArchiveSampleRow>> {
        let known = is_valid_identifier(obs_type)
            && self.archive_columns().await?.iter().any(|c| c == obs_type);
        if !known {
            return Err(DbError::UnknownObservation(obs_type.to_string()));
        }

        let sql = format!(
            r#"
            SELECT dateTime, CAST("interval" AS INTEGER) AS interval,
                   CAST("{obs_type}" AS REAL) AS value
            FROM {archive}
            WHERE dateTime > ? AND dateTime <= ?
            ORDER BY dateTime ASC
            "#,
            archive = tables::ARCHIVE,
        );
        let rows = sqlx::query_as::<_, ArchiveSampleRow>(&sql)
            .bind(start)
            .bind(stop)
            .fetch_all(self.pool())
            .await?;

        debug!(
            "Retrieved {} {} samples between {} and {}",
            rows.len(),
            obs_type,
            start,
            stop
        );
        Ok(rows)
    }

    /// Day summary rows with `start <= dateTime < stop`
    #[instrument(skip(self))]
    pub async fn get_day_summaries(
        &self,
        obs_type: &str,
        start: Timestamp,
        stop: Timestamp,
        layout: SummaryLayout,
    ) -> DbResult<Vec<DaySummaryRecord>> {
        let table = tables::day_summary(obs_type);
        if !is_valid_identifier(obs_type) || !self.table_exists(&table).await? {
            return Err(DbError::MissingTable(obs_type.to_string()));
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE dateTime >= ? AND dateTime < ? ORDER BY dateTime ASC",
            day_summary_columns(layout),
            table
        );
        let records: Vec<DaySummaryRecord> = match layout {
            SummaryLayout::Scalar => sqlx::query_as::<_, DaySummaryRow>(&sql)
                .bind(start)
                .bind(stop)
                .fetch_all(self.pool())
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
            SummaryLayout::Vector => sqlx::query_as::<_, VectorSummaryRow>(&sql)
                .bind(start)
                .bind(stop)
                .fetch_all(self.pool())
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
        };

        debug!("Retrieved {} rows from {}", records.len(), table);
        Ok(records)
    }

    /// Create an empty archive table with the given observation columns
    #[instrument(skip(self))]
    pub async fn create_archive_table(&self, obs_columns: &[&str]) -> DbResult<()> {
        let mut columns = vec![
            "dateTime INTEGER NOT NULL UNIQUE PRIMARY KEY".to_string(),
            "usUnits INTEGER NOT NULL".to_string(),
            "\"interval\" INTEGER NOT NULL".to_string(),
        ];
        for obs in obs_columns {
            if !is_valid_identifier(obs) {
                return Err(DbError::UnknownObservation(obs.to_string()));
            }
            columns.push(format!("\"{obs}\" REAL"));
        }
        let sql = format!("CREATE TABLE {} ({})", tables::ARCHIVE, columns.join(", "));
        sqlx::query(&sql).execute(self.pool()).await?;
        Ok(())
    }

    /// Insert one archive record
    #[instrument(skip(self, values))]
    pub async fn insert_archive(
        &self,
        date_time: Timestamp,
        unit_system: UnitSystem,
        interval_minutes: i64,
        values: &[(&str, Option<f64>)],
    ) -> DbResult<()> {
        let mut names = vec!["dateTime", "usUnits", "\"interval\""];
        let quoted: Vec<String> = values
            .iter()
            .map(|(obs, _)| {
                if is_valid_identifier(obs) {
                    Ok(format!("\"{obs}\""))
                } else {
                    Err(DbError::UnknownObservation(obs.to_string()))
                }
            })
            .collect::<DbResult<_>>()?;
        names.extend(quoted.iter().map(String::as_str));
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            tables::ARCHIVE,
            names.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(date_time)
            .bind(unit_system.code())
            .bind(interval_minutes);
        for (_, value) in values {
            query = query.bind(*value);
        }
        query.execute(self.pool()).await?;

        debug!("Inserted archive record for timestamp {}", date_time);
        Ok(())
    }

    /// Create an empty day summary table; `vector` adds the wind columns
    #[instrument(skip(self))]
    pub async fn create_day_summary_table(&self, obs_type: &str, vector: bool) -> DbResult<()> {
        if !is_valid_identifier(obs_type) {
            return Err(DbError::UnknownObservation(obs_type.to_string()));
        }
        let mut sql = format!(
            "CREATE TABLE {} (dateTime INTEGER NOT NULL UNIQUE PRIMARY KEY, \
             min REAL, mintime INTEGER, max REAL, maxtime INTEGER, sum REAL, \
             count INTEGER, wsum REAL, sumtime INTEGER",
            tables::day_summary(obs_type)
        );
        if vector {
            sql.push_str(
                ", max_dir REAL, xsum REAL, ysum REAL, dirsumtime INTEGER, \
                 squaresum REAL, wsquaresum REAL",
            );
        }
        sql.push(')');
        sqlx::query(&sql).execute(self.pool()).await?;
        Ok(())
    }

    /// Insert one day summary row
    #[instrument(skip(self, record), fields(day_start = record.day_start))]
    pub async fn insert_day_summary(&self, obs_type: &str, record: &DaySummaryRecord) -> DbResult<()> {
        let table = tables::day_summary(obs_type);
        if !is_valid_identifier(obs_type) || !self.table_exists(&table).await? {
            return Err(DbError::MissingTable(obs_type.to_string()));
        }

        let scalar = "dateTime, min, mintime, max, maxtime, sum, count, wsum, sumtime";
        let query = match &record.vector {
            None => {
                let sql = format!(
                    "INSERT INTO {table} ({scalar}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
                );
                sqlx::query(&sql)
                    .bind(record.day_start)
                    .bind(record.min)
                    .bind(record.min_time)
                    .bind(record.max)
                    .bind(record.max_time)
                    .bind(record.sum)
                    .bind(record.count)
                    .bind(record.wsum)
                    .bind(record.sumtime)
                    .execute(self.pool())
                    .await
            }
            Some(v) => {
                let sql = format!(
                    "INSERT INTO {table} ({scalar}, max_dir, xsum, ysum, dirsumtime, \
                     squaresum, wsquaresum) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                );
                sqlx::query(&sql)
                    .bind(record.day_start)
                    .bind(record.min)
                    .bind(record.min_time)
                    .bind(record.max)
                    .bind(record.max_time)
                    .bind(record.sum)
                    .bind(record.count)
                    .bind(record.wsum)
                    .bind(record.sumtime)
                    .bind(v.max_dir)
                    .bind(v.xsum)
                    .bind(v.ysum)
                    .bind(v.dirsumtime)
                    .bind(v.squaresum)
                    .bind(v.wsquaresum)
                    .execute(self.pool())
                    .await
            }
        };
        query?;

        debug!("Inserted {} summary for {}", obs_type, record.day_start);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weex_core::VectorSums;

    async fn seeded() -> DbClient {
        let db = DbClient::in_memory().await.unwrap();
        db.create_archive_table(&["outTemp", "windSpeed"]).await.unwrap();
        for (i, temp) in [Some(10.0), None, Some(12.5)].into_iter().enumerate() {
            let ts = 1_000 + i as i64 * 300;
            db.insert_archive(ts, UnitSystem::Metric, 5, &[("outTemp", temp), ("windSpeed", Some(3.0))])
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_unit_system_and_bounds() {
        let db = seeded().await;
        assert_eq!(db.get_unit_system().await.unwrap(), Some(UnitSystem::Metric));
        assert_eq!(db.first_timestamp().await.unwrap(), Some(1_000));
        assert_eq!(db.last_timestamp().await.unwrap(), Some(1_600));
    }

    #[tokio::test]
    async fn test_empty_archive() {
        let db = DbClient::in_memory().await.unwrap();
        db.create_archive_table(&["outTemp"]).await.unwrap();
        assert_eq!(db.get_unit_system().await.unwrap(), None);
        assert_eq!(db.last_timestamp().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_archive_samples_half_open() {
        let db = seeded().await;
        let rows = db.get_archive_samples("outTemp", 1_000, 1_600).await.unwrap();
        let stamps: Vec<_> = rows.iter().map(|r| r.date_time).collect();
        assert_eq!(stamps, vec![1_300, 1_600]);
        assert_eq!(rows[0].value, None);
        assert_eq!(rows[1].value, Some(12.5));
        assert_eq!(rows[1].interval, Some(5));
    }

    #[tokio::test]
    async fn test_unknown_column_rejected() {
        let db = seeded().await;
        assert!(matches!(
            db.get_archive_samples("noSuchObs", 0, 2_000).await,
            Err(DbError::UnknownObservation(_))
        ));
        assert!(matches!(
            db.get_archive_samples("outTemp\"--", 0, 2_000).await,
            Err(DbError::UnknownObservation(_))
        ));
    }

    #[tokio::test]
    async fn test_day_summary_layouts() {
        let db = DbClient::in_memory().await.unwrap();
        db.create_day_summary_table("wind", true).await.unwrap();
        db.insert_day_summary(
            "wind",
            &DaySummaryRecord {
                day_start: 0,
                max: Some(9.0),
                count: Some(288),
                wsum: Some(1_000.0),
                sumtime: Some(86_400.0),
                vector: Some(VectorSums {
                    max_dir: Some(180.0),
                    xsum: Some(-2.0),
                    ysum: Some(0.0),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let scalar = db
            .get_day_summaries("wind", 0, 86_400, SummaryLayout::Scalar)
            .await
            .unwrap();
        assert_eq!(scalar.len(), 1);
        assert!(scalar[0].vector.is_none());
        assert_eq!(scalar[0].sumtime, Some(86_400.0));

        let vector = db
            .get_day_summaries("wind", 0, 86_400, SummaryLayout::Vector)
            .await
            .unwrap();
        assert_eq!(vector[0].vector.as_ref().and_then(|v| v.max_dir), Some(180.0));

        let none = db
            .get_day_summaries("wind", 86_400, 172_800, SummaryLayout::Scalar)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_missing_day_summary_table() {
        let db = DbClient::in_memory().await.unwrap();
        assert!(matches!(
            db.get_day_summaries("outTemp", 0, 1, SummaryLayout::Scalar).await,
            Err(DbError::MissingTable(_))
        ));
    }
}
