//! MySQL connection implementation

use async_trait::async_trait;
use mysql_async::{
    Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, Row as MySqlRow, consts::ColumnType,
    prelude::*,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tablesync_core::{
    ColumnMeta, Connection, QueryResult, Result, Row, StatementResult, TableSyncError,
    TableTransfer, Value,
};

/// Default upper bound on pooled sessions per connection profile.
///
/// A table copy holds one reading session and one writing session, so a
/// profile used as both source and target needs two per table in flight.
pub const DEFAULT_POOL_MAX: usize = 10;

/// Pool options for `pool_max` sessions.
///
/// Sessions are reset when they return to the pool, so session state such
/// as `FOREIGN_KEY_CHECKS = 0` never outlives an interrupted statement.
pub(crate) fn pool_opts(pool_max: usize) -> Result<PoolOpts> {
    let pool_max = pool_max.max(1);
    let constraints = PoolConstraints::new(1, pool_max).ok_or_else(|| {
        TableSyncError::Connection(format!(
            "Failed to configure MySQL pool constraints (min=1, max={})",
            pool_max
        ))
    })?;
    Ok(PoolOpts::default()
        .with_constraints(constraints)
        .with_reset_connection(true))
}

/// MySQL connection wrapper
///
/// Backed by a small `mysql_async` pool so independent tables can be
/// written concurrently. Statements that depend on session state (`USE`,
/// `SET FOREIGN_KEY_CHECKS`) are issued on one checked-out session, which is
/// reset before the pool hands it out again.
pub struct MySqlConnection {
    pool: Pool,
    closed: AtomicBool,
}

impl MySqlConnection {
    /// Connect to a MySQL server
    pub async fn connect(
        host: &str,
        port: u16,
        database: Option<&str>,
        user: Option<&str>,
        password: Option<&str>,
        pool_max: usize,
    ) -> Result<Self> {
        tracing::info!(host = %host, port = %port, database = ?database, "connecting to MySQL database");

        let mut opts_builder = OptsBuilder::from_opts(Opts::default())
            .ip_or_hostname(host)
            .tcp_port(port);

        if let Some(db) = database {
            opts_builder = opts_builder.db_name(Some(db));
        }
        if let Some(u) = user {
            opts_builder = opts_builder.user(Some(u));
        }
        if let Some(p) = password {
            opts_builder = opts_builder.pass(Some(p));
        }

        opts_builder = opts_builder.pool_opts(pool_opts(pool_max)?);

        let pool = Pool::new(Opts::from(opts_builder));

        // Verify connectivity by acquiring and releasing a session
        let conn = pool
            .get_conn()
            .await
            .map_err(|e| TableSyncError::Connection(format!("Failed to connect to MySQL: {}", e)))?;
        drop(conn);

        tracing::info!(host = %host, port = %port, pool_max = pool_max, "MySQL connection established");
        Ok(Self {
            pool,
            closed: AtomicBool::new(false),
        })
    }

    /// Check out a session from the pool
    pub(crate) async fn get_conn(&self) -> Result<Conn> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TableSyncError::Connection("MySQL connection is closed".into()));
        }
        self.pool
            .get_conn()
            .await
            .map_err(|e| TableSyncError::Connection(format!("Failed to get MySQL connection: {}", e)))
    }
}

/// Escape string content the way the MySQL client library does
pub(crate) fn escape_mysql_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Render a value as a MySQL literal
pub(crate) fn value_to_mysql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => if *v { "1" } else { "0" }.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::UInt64(v) => v.to_string(),
        Value::Float32(v) if v.is_finite() => v.to_string(),
        Value::Float64(v) if v.is_finite() => v.to_string(),
        Value::Float32(_) | Value::Float64(_) => "NULL".to_string(),
        Value::Decimal(v) => v.clone(),
        Value::String(v) => format!("'{}'", escape_mysql_string(v)),
        Value::Bytes(v) => {
            if v.is_empty() {
                return "''".to_string();
            }
            let hex: String = v.iter().map(|b| format!("{:02x}", b)).collect();
            format!("0x{}", hex)
        }
        Value::Uuid(v) => format!("'{}'", v),
        Value::Json(v) => format!("'{}'", escape_mysql_string(&v.to_string())),
        Value::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        Value::Time(v) => format!("'{}'", v.format("%H:%M:%S%.f")),
        Value::DateTime(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::DateTimeUtc(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S%.f")),
    }
}

/// Substitute `?` placeholders with literals, in order
pub(crate) fn bind_params(sql: &str, params: &[Value]) -> String {
    let mut result = sql.to_string();
    for param in params {
        result = result.replacen('?', &value_to_mysql_literal(param), 1);
    }
    result
}

/// Escape a MySQL identifier (database, table, column)
pub(crate) fn escape_identifier_mysql(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// `database`.`table`
pub(crate) fn qualified_table_mysql(database: &str, table: &str) -> String {
    format!(
        "{}.{}",
        escape_identifier_mysql(database),
        escape_identifier_mysql(table)
    )
}

/// Convert mysql_async Value to our Value type, using column type metadata
/// to correctly interpret byte strings from the text protocol.
pub(crate) fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => s
                    .parse::<i64>()
                    .map(Value::Int64)
                    .or_else(|_| s.parse::<u64>().map(Value::UInt64))
                    .unwrap_or(Value::String(s)),
                ColumnType::MYSQL_TYPE_FLOAT => {
                    s.parse::<f32>().map(Value::Float32).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_DOUBLE => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Value::Decimal(s)
                }
                _ => Value::String(s),
            },
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Int64(i),
            Err(_) => Value::UInt64(u),
        },
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            match (date, col_type) {
                (Some(date), ColumnType::MYSQL_TYPE_DATE) => Value::Date(date),
                (Some(date), _) => date
                    .and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Date(date)),
                // Zero dates ('0000-00-00') have no chrono representation
                (None, _) => Value::String(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                )),
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

/// Column names and wire types of a result set, read from one of its rows
pub(crate) struct RowLayout {
    pub(crate) columns: Vec<ColumnMeta>,
    names: Vec<String>,
    types: Vec<ColumnType>,
}

impl RowLayout {
    pub(crate) fn of(row: &MySqlRow) -> Self {
        let mut columns = Vec::new();
        let mut names = Vec::new();
        let mut types = Vec::new();
        for (idx, col) in row.columns_ref().iter().enumerate() {
            let name = col.name_str().to_string();
            names.push(name.clone());
            types.push(col.column_type());
            columns.push(ColumnMeta {
                name,
                data_type: format!("{:?}", col.column_type()),
                ordinal: idx,
            });
        }
        Self {
            columns,
            names,
            types,
        }
    }

    /// Convert one mysql_async row with this layout
    pub(crate) fn convert(&self, mut mysql_row: MySqlRow) -> Row {
        let values = self
            .types
            .iter()
            .enumerate()
            .map(|(idx, col_type)| {
                let mysql_val = mysql_row
                    .take::<mysql_async::Value, _>(idx)
                    .unwrap_or(mysql_async::Value::NULL);
                mysql_value_to_value(mysql_val, *col_type)
            })
            .collect();
        Row::new(self.names.clone(), values)
    }
}

/// Convert a batch of mysql_async rows into column metadata and rows
pub(crate) fn convert_rows(mysql_rows: Vec<MySqlRow>) -> (Vec<ColumnMeta>, Vec<Row>) {
    let Some(layout) = mysql_rows.first().map(RowLayout::of) else {
        return (Vec::new(), Vec::new());
    };
    let rows = mysql_rows
        .into_iter()
        .map(|row| layout.convert(row))
        .collect();
    (layout.columns, rows)
}

#[async_trait]
impl Connection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let final_sql = bind_params(sql, params);
        let mut conn = self.get_conn().await?;

        conn.query_drop(&final_sql)
            .await
            .map_err(|e| TableSyncError::Query(format!("Failed to execute statement: {}", e)))?;
        let affected_rows = conn.affected_rows();

        tracing::debug!(affected_rows = affected_rows, "statement executed");
        Ok(StatementResult { affected_rows })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        let final_sql = bind_params(sql, params);
        let mut conn = self.get_conn().await?;

        let mysql_rows: Vec<MySqlRow> = conn
            .query(&final_sql)
            .await
            .map_err(|e| TableSyncError::Query(format!("Failed to execute query: {}", e)))?;
        let (columns, rows) = convert_rows(mysql_rows);

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );

        Ok(QueryResult {
            id: uuid::Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms,
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("closing MySQL connection pool");
        self.pool.clone().disconnect().await.map_err(|e| {
            TableSyncError::Connection(format!("Failed to close MySQL connection: {}", e))
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_table_transfer(&self) -> Option<&dyn TableTransfer> {
        Some(self)
    }
}
