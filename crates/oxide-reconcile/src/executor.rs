//! Statement executors.
//!
//! The reconciler talks to the database only through [`Executor`]. The
//! sqlx-backed [`MySqlExecutor`] runs statements on a single connection;
//! [`crate::memory::MemoryExecutor`] simulates the catalog in memory.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Connection, Row};
use tracing::{debug, info, warn};

use crate::dialect::Dialect;
use crate::error::Result;

/// One row of a catalog query, every column decoded as text.
pub type CatalogRow = Vec<String>;

/// Database access used by the reconciler.
///
/// Implementations run one statement at a time. `query` must drain and
/// release its result cursor before returning, on success and on error, so
/// the next call can reuse the same connection.
#[async_trait]
pub trait Executor: Send {
    /// Runs a read-only query with bound text arguments and returns all rows.
    async fn query(
        &mut self,
        sql: &str,
        args: &[&str],
    ) -> std::result::Result<Vec<CatalogRow>, sqlx::Error>;

    /// Runs a statement and returns the number of affected rows.
    async fn exec(&mut self, sql: &str) -> std::result::Result<u64, sqlx::Error>;

    /// Returns the schema (database) the connection works in.
    fn schema_name(&self) -> &str;

    /// Rewrites a table name according to the configured prefix policy.
    fn apply_table_prefix(&self, name: &str) -> String;
}

/// Table prefix policy: every `#` in a table name is replaced by the prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePrefix {
    prefix: String,
}

impl TablePrefix {
    /// Placeholder marking where the prefix goes.
    pub const PLACEHOLDER: char = '#';

    /// Creates a prefix policy.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Applies the policy to a table name.
    #[must_use]
    pub fn apply(&self, name: &str) -> String {
        name.replace(Self::PLACEHOLDER, &self.prefix)
    }
}

/// Executes statements on a single MySQL connection.
pub struct MySqlExecutor {
    conn: MySqlConnection,
    schema: String,
    prefix: TablePrefix,
    dry_run: bool,
}

impl MySqlExecutor {
    /// Connects to the database at `url`.
    ///
    /// The schema name is taken from the URL; if the URL names none, the
    /// server's current database is used.
    pub async fn connect(url: &str, dialect: &dyn Dialect) -> Result<Self> {
        let mut conn = MySqlConnection::connect(url).await?;
        let schema = match dialect.database_name(url) {
            "" => {
                let (name,): (Option<String>,) = sqlx::query_as("SELECT DATABASE()")
                    .fetch_one(&mut conn)
                    .await?;
                name.unwrap_or_default()
            }
            name => name.to_string(),
        };
        info!(schema = %schema, "Connected");
        Ok(Self::from_connection(conn, schema))
    }

    /// Wraps an open connection working in `schema`.
    #[must_use]
    pub fn from_connection(conn: MySqlConnection, schema: impl Into<String>) -> Self {
        Self {
            conn,
            schema: schema.into(),
            prefix: TablePrefix::default(),
            dry_run: false,
        }
    }

    /// Sets the table prefix policy.
    #[must_use]
    pub fn with_prefix(mut self, prefix: TablePrefix) -> Self {
        self.prefix = prefix;
        self
    }

    /// Enables dry-run mode (queries run, statements are only logged).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Closes the connection.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

fn decode_row(row: &MySqlRow) -> std::result::Result<CatalogRow, sqlx::Error> {
    (0..row.len())
        .map(|i| match row.try_get::<String, _>(i) {
            Ok(value) => Ok(value),
            // Some catalog columns come back as binary strings.
            Err(_) => row
                .try_get::<Vec<u8>, _>(i)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        })
        .collect()
}

#[async_trait]
impl Executor for MySqlExecutor {
    async fn query(
        &mut self,
        sql: &str,
        args: &[&str],
    ) -> std::result::Result<Vec<CatalogRow>, sqlx::Error> {
        debug!(sql = %sql, ?args, "Running catalog query");
        let mut query = sqlx::query(sql);
        for arg in args {
            query = query.bind(arg.to_string());
        }
        // fetch_all consumes the stream, the cursor is closed on return.
        let rows = query.fetch_all(&mut self.conn).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn exec(&mut self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        if self.dry_run {
            warn!(sql = %sql, "Dry run, statement not executed");
            return Ok(0);
        }
        debug!(sql = %sql, "Executing SQL");
        let result = sqlx::Executor::execute(&mut self.conn, sql).await?;
        Ok(result.rows_affected())
    }

    fn schema_name(&self) -> &str {
        &self.schema
    }

    fn apply_table_prefix(&self, name: &str) -> String {
        self.prefix.apply(name)
    }
}
