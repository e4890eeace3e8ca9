//! Row types matching the WeeWX SQLite schema
//!
//! Columns are CAST in the queries so each value arrives with the storage
//! class the row field expects; WeeWX stores some REAL columns as INTEGER.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use weex_core::{DaySummaryRecord, SummaryLayout, VectorSums};

/// One `archive` sample of a single observation column
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ArchiveSampleRow {
    /// End of the archive interval (Unix epoch)
    #[sqlx(rename = "dateTime")]
    pub date_time: i64,

    /// Interval length in minutes
    pub interval: Option<i64>,

    pub value: Option<f64>,
}

/// One row of an `archive_day_<obs>` table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DaySummaryRow {
    #[sqlx(rename = "dateTime")]
    pub date_time: i64,
    pub min: Option<f64>,
    pub mintime: Option<i64>,
    pub max: Option<f64>,
    pub maxtime: Option<i64>,
    pub sum: Option<f64>,
    pub count: Option<i64>,
    pub wsum: Option<f64>,
    pub sumtime: Option<f64>,
}

/// Extra columns present on vector (wind) day summaries
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VectorSummaryRow {
    #[sqlx(flatten)]
    pub scalar: DaySummaryRow,
    pub max_dir: Option<f64>,
    pub xsum: Option<f64>,
    pub ysum: Option<f64>,
    pub dirsumtime: Option<i64>,
    pub squaresum: Option<f64>,
    pub wsquaresum: Option<f64>,
}

impl From<DaySummaryRow> for DaySummaryRecord {
    fn from(row: DaySummaryRow) -> Self {
        DaySummaryRecord {
            day_start: row.date_time,
            min: row.min,
            min_time: row.mintime,
            max: row.max,
            max_time: row.maxtime,
            sum: row.sum,
            count: row.count,
            wsum: row.wsum,
            sumtime: row.sumtime,
            vector: None,
        }
    }
}

impl From<VectorSummaryRow> for DaySummaryRecord {
    fn from(row: VectorSummaryRow) -> Self {
        DaySummaryRecord {
            vector: Some(VectorSums {
                max_dir: row.max_dir,
                xsum: row.xsum,
                ysum: row.ysum,
                dirsumtime: row.dirsumtime,
                squaresum: row.squaresum,
                wsquaresum: row.wsquaresum,
            }),
            ..DaySummaryRecord::from(row.scalar)
        }
    }
}

/// Table names matching the WeeWX schema
pub mod tables {
    pub const ARCHIVE: &str = "archive";

    /// Day summary table for an observation type
    pub fn day_summary(obs_type: &str) -> String {
        format!("archive_day_{obs_type}")
    }
}

/// Column list for a day-summary SELECT
pub fn day_summary_columns(layout: SummaryLayout) -> &'static str {
    match layout {
        SummaryLayout::Scalar => SCALAR_COLUMNS,
        SummaryLayout::Vector => VECTOR_COLUMNS,
    }
}

const SCALAR_COLUMNS: &str = "dateTime, CAST(min AS REAL) AS min, \
     CAST(mintime AS INTEGER) AS mintime, CAST(max AS REAL) AS max, \
     CAST(maxtime AS INTEGER) AS maxtime, CAST(sum AS REAL) AS sum, \
     CAST(count AS INTEGER) AS count, CAST(wsum AS REAL) AS wsum, \
     CAST(sumtime AS REAL) AS sumtime";

const VECTOR_COLUMNS: &str = "dateTime, CAST(min AS REAL) AS min, \
     CAST(mintime AS INTEGER) AS mintime, CAST(max AS REAL) AS max, \
     CAST(maxtime AS INTEGER) AS maxtime, CAST(sum AS REAL) AS sum, \
     CAST(count AS INTEGER) AS count, CAST(wsum AS REAL) AS wsum, \
     CAST(sumtime AS REAL) AS sumtime, CAST(max_dir AS REAL) AS max_dir, \
     CAST(xsum AS REAL) AS xsum, CAST(ysum AS REAL) AS ysum, \
     CAST(dirsumtime AS INTEGER) AS dirsumtime, \
     CAST(squaresum AS REAL) AS squaresum, CAST(wsquaresum AS REAL) AS wsquaresum";

/// Observation names are spliced into SQL, so only plain identifiers pass
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}
