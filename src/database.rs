//! PostgreSQL persistence
//!
//! Statements are built by pure functions that return SQL text plus an
//! ordered list of bind values, so the column mapping can be checked
//! without a server. [`Database`] executes them inside one transaction per
//! run.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Postgres;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::query::{Query, QueryScalar};

use crate::config::{ColumnMapping, Config, DatabaseConfig};
use crate::error::LoaderError;
use crate::types::{Document, Stats};

/// A bind parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

/// SQL text with positional (`$1`, `$2`, ...) parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name part by part.
pub fn quote_table(name: &str) -> String {
    name.split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Accumulates column/value pairs in mapping order.
#[derive(Default)]
struct Assignments {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Assignments {
    fn push(&mut self, column: Option<&String>, value: impl FnOnce() -> SqlValue) {
        if let Some(column) = column {
            self.columns.push(quote_identifier(column));
            self.values.push(value());
        }
    }
}

/// Where document fields go in the target table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMapping {
    pub table: String,
    pub columns: ColumnMapping,
    pub custom_columns: BTreeMap<String, String>,
}

impl TableMapping {
    pub fn from_config(config: &Config) -> Self {
        Self {
            table: config.database.table.clone(),
            columns: config.columns.clone(),
            custom_columns: config.custom_columns.clone(),
        }
    }

    /// INSERT for one document.
    ///
    /// File timestamps are only written when known; row timestamps use
    /// `now`. Custom columns follow, ordered by name.
    pub fn insert_statement(&self, doc: &Document, now: DateTime<Utc>) -> Statement {
        let c = &self.columns;
        let mut set = Assignments::default();

        set.push(c.doc_title.as_ref(), || SqlValue::Text(doc.title.clone()));
        set.push(c.doc_content.as_ref(), || SqlValue::Text(doc.content.clone()));
        set.push(c.source_content.as_ref(), || {
            SqlValue::Bytes(doc.source_content.clone())
        });
        set.push(c.file_name.as_ref(), || SqlValue::Text(doc.file_name.clone()));
        if let Some(created) = doc.file_created {
            set.push(c.file_created.as_ref(), || SqlValue::Timestamp(created));
        }
        if let Some(modified) = doc.file_modified {
            set.push(c.file_modified.as_ref(), || SqlValue::Timestamp(modified));
        }
        set.push(c.row_created.as_ref(), || SqlValue::Timestamp(now));
        set.push(c.row_updated.as_ref(), || SqlValue::Timestamp(now));
        self.push_custom(&mut set);

        let table = quote_table(&self.table);
        // Only file timestamps were mapped and neither is known
        if set.columns.is_empty() {
            return Statement {
                sql: format!("INSERT INTO {table} DEFAULT VALUES"),
                values: Vec::new(),
            };
        }

        let placeholders = (1..=set.values.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");

        Statement {
            sql: format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                set.columns.join(", ")
            ),
            values: set.values,
        }
    }

    /// UPDATE of the row whose file-name column equals `doc.file_name`.
    ///
    /// The file name, file creation time and row creation time are left
    /// untouched. Returns `None` when no file-name column is mapped or
    /// nothing besides the file name is mapped.
    pub fn update_statement(&self, doc: &Document, now: DateTime<Utc>) -> Option<Statement> {
        let c = &self.columns;
        let file_name_column = c.file_name.as_ref()?;
        let mut set = Assignments::default();

        set.push(c.doc_title.as_ref(), || SqlValue::Text(doc.title.clone()));
        set.push(c.doc_content.as_ref(), || SqlValue::Text(doc.content.clone()));
        set.push(c.source_content.as_ref(), || {
            SqlValue::Bytes(doc.source_content.clone())
        });
        if let Some(modified) = doc.file_modified {
            set.push(c.file_modified.as_ref(), || SqlValue::Timestamp(modified));
        }
        set.push(c.row_updated.as_ref(), || SqlValue::Timestamp(now));
        self.push_custom(&mut set);

        if set.columns.is_empty() {
            return None;
        }

        let clauses = set
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ${}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let mut values = set.values;
        values.push(SqlValue::Text(doc.file_name.clone()));

        Some(Statement {
            sql: format!(
                "UPDATE {} SET {} WHERE {} = ${}",
                quote_table(&self.table),
                clauses,
                quote_identifier(file_name_column),
                values.len()
            ),
            values,
        })
    }

    /// Row count for a file name; `None` without a file-name column.
    pub fn exists_statement(&self, file_name: &str) -> Option<Statement> {
        let column = self.columns.file_name.as_ref()?;
        Some(Statement {
            sql: format!(
                "SELECT COUNT(*) FROM {} WHERE {} = $1",
                quote_table(&self.table),
                quote_identifier(column)
            ),
            values: vec![SqlValue::Text(file_name.to_owned())],
        })
    }

    fn push_custom(&self, set: &mut Assignments) {
        for (column, value) in &self.custom_columns {
            set.push(Some(column), || SqlValue::Text(value.clone()));
        }
    }
}

/// Connection options for the configured server.
///
/// # Errors
///
/// Returns `LoaderError::Config` for an unknown SSL mode.
pub fn connect_options(db: &DatabaseConfig) -> Result<PgConnectOptions, LoaderError> {
    let ssl_mode = PgSslMode::from_str(&db.sslmode)
        .map_err(|_| LoaderError::Config(format!("invalid SSL mode '{}'", db.sslmode)))?;

    let mut options = PgConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .database(&db.name)
        .username(&db.user)
        .ssl_mode(ssl_mode);

    if let Some(password) = &db.password {
        options = options.password(password);
    }
    if let Some(cert) = &db.sslcert {
        options = options.ssl_client_cert(cert);
    }
    if let Some(key) = &db.sslkey {
        options = options.ssl_client_key(key);
    }
    if let Some(root) = &db.sslrootcert {
        options = options.ssl_root_cert(root);
    }

    Ok(options)
}

/// Open connection to the target database.
pub struct Database {
    pool: PgPool,
    mapping: TableMapping,
    update_mode: bool,
}

impl Database {
    /// Connect using the database section of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the server cannot be
    /// reached.
    pub async fn connect(config: &Config) -> Result<Self, LoaderError> {
        let db = &config.database;
        tracing::info!(
            user = %db.user,
            host = %db.host,
            port = db.port,
            database = %db.name,
            "connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options(db)?)
            .await?;

        Ok(Self {
            pool,
            mapping: TableMapping::from_config(config),
            update_mode: config.update_mode,
        })
    }

    /// Write all documents in one transaction.
    ///
    /// In update mode a document whose file name already exists updates that
    /// row; every other document is inserted. Any failure rolls back the
    /// whole batch.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::Database` on the first failing statement.
    pub async fn store_documents(
        &self,
        documents: &[Document],
        stats: &mut Stats,
    ) -> Result<(), LoaderError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        let mut updated = 0;

        for doc in documents {
            let now = Utc::now();

            if self.update_mode
                && let Some(check) = self.mapping.exists_statement(&doc.file_name)
            {
                let query = sqlx::query_scalar::<Postgres, i64>(&check.sql);
                let count = bind_all(query, check.values).fetch_one(&mut *tx).await?;
                if count > 0 {
                    if let Some(update) = self.mapping.update_statement(doc, now) {
                        bind_all(sqlx::query::<Postgres>(&update.sql), update.values)
                            .execute(&mut *tx)
                            .await?;
                    }
                    tracing::debug!(file = %doc.file_name, "updated row");
                    updated += 1;
                    continue;
                }
            }

            let insert = self.mapping.insert_statement(doc, now);
            bind_all(sqlx::query::<Postgres>(&insert.sql), insert.values)
                .execute(&mut *tx)
                .await?;
            tracing::debug!(file = %doc.file_name, "inserted row");
            inserted += 1;
        }

        tx.commit().await?;

        stats.rows_inserted += inserted;
        stats.rows_updated += updated;
        tracing::info!(inserted, updated, "stored documents");
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Queries that accept positional bind values.
trait Bind: Sized {
    fn bind_value(self, value: SqlValue) -> Self;
}

impl Bind for Query<'_, Postgres, PgArguments> {
    fn bind_value(self, value: SqlValue) -> Self {
        match value {
            SqlValue::Text(text) => self.bind(text),
            SqlValue::Bytes(bytes) => self.bind(bytes),
            SqlValue::Timestamp(ts) => self.bind(ts),
        }
    }
}

impl<O> Bind for QueryScalar<'_, Postgres, O, PgArguments> {
    fn bind_value(self, value: SqlValue) -> Self {
        match value {
            SqlValue::Text(text) => self.bind(text),
            SqlValue::Bytes(bytes) => self.bind(bytes),
            SqlValue::Timestamp(ts) => self.bind(ts),
        }
    }
}

fn bind_all<Q: Bind>(query: Q, values: Vec<SqlValue>) -> Q {
    values.into_iter().fold(query, Bind::bind_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_type::DocumentType;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    fn document() -> Document {
        Document {
            title: "SELECT".to_owned(),
            content: "# SELECT\n\nbody".to_owned(),
            source_content: b"<refentry/>".to_vec(),
            file_name: "ref/select.sgml".to_owned(),
            file_created: None,
            file_modified: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            document_type: DocumentType::Sgml,
        }
    }

    fn full_mapping() -> TableMapping {
        TableMapping {
            table: "docs.pages".to_owned(),
            columns: ColumnMapping {
                doc_title: Some("title".to_owned()),
                doc_content: Some("content".to_owned()),
                source_content: Some("source".to_owned()),
                file_name: Some("filename".to_owned()),
                file_created: Some("created".to_owned()),
                file_modified: Some("modified".to_owned()),
                row_created: Some("row_created".to_owned()),
                row_updated: Some("row_updated".to_owned()),
            },
            custom_columns: BTreeMap::from([
                ("version".to_owned(), "17".to_owned()),
                ("product".to_owned(), "pgEdge".to_owned()),
            ]),
        }
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("title"), "\"title\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_table("public.documents"), "\"public\".\"documents\"");
        assert_eq!(quote_table("documents"), "\"documents\"");
    }

    #[test]
    fn test_insert_statement_full_mapping() {
        let stmt = full_mapping().insert_statement(&document(), now());
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"docs\".\"pages\" (\"title\", \"content\", \"source\", \"filename\", \
             \"modified\", \"row_created\", \"row_updated\", \"product\", \"version\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        );
        assert_eq!(
            stmt.values,
            vec![
                SqlValue::Text("SELECT".to_owned()),
                SqlValue::Text("# SELECT\n\nbody".to_owned()),
                SqlValue::Bytes(b"<refentry/>".to_vec()),
                SqlValue::Text("ref/select.sgml".to_owned()),
                SqlValue::Timestamp(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
                SqlValue::Timestamp(now()),
                SqlValue::Timestamp(now()),
                SqlValue::Text("pgEdge".to_owned()),
                SqlValue::Text("17".to_owned()),
            ]
        );
    }

    #[test]
    fn test_insert_includes_known_creation_time() {
        let mut doc = document();
        doc.file_created = Some(now());
        let stmt = full_mapping().insert_statement(&doc, now());
        assert!(stmt.sql.contains("\"filename\", \"created\", \"modified\""));
        assert_eq!(stmt.values.len(), 10);
    }

    #[test]
    fn test_insert_minimal_mapping() {
        let mapping = TableMapping {
            table: "documents".to_owned(),
            columns: ColumnMapping {
                doc_content: Some("body".to_owned()),
                ..ColumnMapping::default()
            },
            custom_columns: BTreeMap::new(),
        };
        let stmt = mapping.insert_statement(&document(), now());
        assert_eq!(stmt.sql, "INSERT INTO \"documents\" (\"body\") VALUES ($1)");
        assert_eq!(stmt.values.len(), 1);
    }

    #[test]
    fn test_insert_with_only_unknown_timestamps() {
        let mapping = TableMapping {
            table: "documents".to_owned(),
            columns: ColumnMapping {
                file_created: Some("created".to_owned()),
                ..ColumnMapping::default()
            },
            custom_columns: BTreeMap::new(),
        };
        let stmt = mapping.insert_statement(&document(), now());
        assert_eq!(stmt.sql, "INSERT INTO \"documents\" DEFAULT VALUES");
        assert!(stmt.values.is_empty());
    }

    #[test]
    fn test_update_statement() {
        let stmt = full_mapping().update_statement(&document(), now()).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"docs\".\"pages\" SET \"title\" = $1, \"content\" = $2, \"source\" = $3, \
             \"modified\" = $4, \"row_updated\" = $5, \"product\" = $6, \"version\" = $7 \
             WHERE \"filename\" = $8"
        );
        assert_eq!(stmt.values.len(), 8);
        assert_eq!(
            stmt.values.last(),
            Some(&SqlValue::Text("ref/select.sgml".to_owned()))
        );
    }

    #[test]
    fn test_update_requires_file_name_column() {
        let mut mapping = full_mapping();
        mapping.columns.file_name = None;
        assert_eq!(mapping.update_statement(&document(), now()), None);
        assert_eq!(mapping.exists_statement("x"), None);
    }

    #[test]
    fn test_update_with_nothing_to_set() {
        let mapping = TableMapping {
            table: "documents".to_owned(),
            columns: ColumnMapping {
                file_name: Some("filename".to_owned()),
                file_created: Some("created".to_owned()),
                ..ColumnMapping::default()
            },
            custom_columns: BTreeMap::new(),
        };
        assert_eq!(mapping.update_statement(&document(), now()), None);
    }

    #[test]
    fn test_exists_statement() {
        let stmt = full_mapping().exists_statement("a.md").unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) FROM \"docs\".\"pages\" WHERE \"filename\" = $1"
        );
        assert_eq!(stmt.values, vec![SqlValue::Text("a.md".to_owned())]);
    }

    #[test]
    fn test_connect_options() {
        let db = DatabaseConfig {
            host: "db.example.com".to_owned(),
            port: 6432,
            name: "docs".to_owned(),
            user: "loader".to_owned(),
            sslmode: "require".to_owned(),
            table: "documents".to_owned(),
            ..DatabaseConfig::default()
        };
        let options = connect_options(&db).unwrap();
        assert_eq!(options.get_host(), "db.example.com");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_database(), Some("docs"));
        assert_eq!(options.get_username(), "loader");
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn test_connect_options_rejects_unknown_sslmode() {
        let db = DatabaseConfig {
            sslmode: "sometimes".to_owned(),
            ..DatabaseConfig::default()
        };
        assert!(matches!(connect_options(&db), Err(LoaderError::Config(_))));
    }
}
