//! Loader configuration
//!
//! Values come from three layers, lowest precedence first: built-in
//! defaults, an optional YAML file given with `--config`, and command-line
//! flags. YAML keys are the flag names (`db-host`, `col-doc-title`, ...);
//! `source` and `git-doc-path` take a string or a list and
//! `custom-columns` takes a map of column name to value.
//!
//! Relative paths read from the YAML file (sources, SSL files, clone
//! directory) are resolved against the directory that holds the file.
//!
//! ```yaml
//! source:
//!   - docs/*.md
//!   - reference/**/*.sgml
//! db-name: docs
//! db-user: loader
//! db-table: documents
//! col-doc-title: title
//! col-doc-content: content
//! col-file-name: filename
//! custom-columns:
//!   product: pgEdge
//! ```

use clap::Args;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::LoaderError;
use crate::git::is_git_url;

/// Default PostgreSQL host.
pub const DEFAULT_DB_HOST: &str = "localhost";
/// Default PostgreSQL port.
pub const DEFAULT_DB_PORT: u16 = 5432;
/// Default libpq-style SSL mode.
pub const DEFAULT_DB_SSLMODE: &str = "prefer";

/// Command-line settings that override configuration file values.
///
/// Every field is optional; only values given on the command line override
/// the loaded configuration.
#[derive(Debug, Default, Clone, Args)]
pub struct CliSettings {
    /// Path to a YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Source file, directory or glob pattern (repeatable).
    #[arg(short, long = "source")]
    pub source: Vec<PathBuf>,

    /// Store only the base name of each file.
    #[arg(long)]
    pub strip_path: bool,

    /// Git repository URL to load documents from.
    #[arg(long)]
    pub git_url: Option<String>,

    /// Branch to check out.
    #[arg(long, conflicts_with = "git_tag")]
    pub git_branch: Option<String>,

    /// Tag to check out.
    #[arg(long)]
    pub git_tag: Option<String>,

    /// Path inside the repository to process (repeatable).
    #[arg(long = "git-doc-path")]
    pub git_doc_path: Vec<String>,

    /// Directory that holds clones (default: a temporary directory).
    #[arg(long)]
    pub git_clone_dir: Option<PathBuf>,

    /// Keep a temporary clone after the run.
    #[arg(long)]
    pub git_keep_clone: bool,

    /// Reuse an existing clone without fetching.
    #[arg(long)]
    pub git_skip_fetch: bool,

    /// Database host [default: localhost].
    #[arg(long)]
    pub db_host: Option<String>,

    /// Database port [default: 5432].
    #[arg(long)]
    pub db_port: Option<u16>,

    /// Database name.
    #[arg(long)]
    pub db_name: Option<String>,

    /// Database user.
    #[arg(long)]
    pub db_user: Option<String>,

    /// SSL mode: disable, allow, prefer, require, verify-ca, verify-full [default: prefer].
    #[arg(long)]
    pub db_sslmode: Option<String>,

    /// Target table, optionally schema-qualified.
    #[arg(long)]
    pub db_table: Option<String>,

    /// Client SSL certificate.
    #[arg(long)]
    pub db_sslcert: Option<PathBuf>,

    /// Client SSL key.
    #[arg(long)]
    pub db_sslkey: Option<PathBuf>,

    /// SSL root certificate.
    #[arg(long)]
    pub db_sslrootcert: Option<PathBuf>,

    /// Column for the document title.
    #[arg(long)]
    pub col_doc_title: Option<String>,

    /// Column for the Markdown content.
    #[arg(long)]
    pub col_doc_content: Option<String>,

    /// Column for the original file bytes (bytea).
    #[arg(long)]
    pub col_source_content: Option<String>,

    /// Column for the file name.
    #[arg(long)]
    pub col_file_name: Option<String>,

    /// Column for the file creation time.
    #[arg(long)]
    pub col_file_created: Option<String>,

    /// Column for the file modification time.
    #[arg(long)]
    pub col_file_modified: Option<String>,

    /// Column for the row creation time.
    #[arg(long)]
    pub col_row_created: Option<String>,

    /// Column for the row update time.
    #[arg(long)]
    pub col_row_updated: Option<String>,

    /// Fixed column value as column=value (repeatable).
    #[arg(long = "set-column")]
    pub set_column: Vec<String>,

    /// Update rows matched by file name, insert the rest.
    #[arg(short, long)]
    pub update: bool,
}

/// A scalar or a list in the YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) if value.is_empty() => Vec::new(),
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Configuration file as parsed from YAML.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ConfigFile {
    source: Option<OneOrMany>,
    strip_path: Option<bool>,

    git_url: Option<String>,
    git_branch: Option<String>,
    git_tag: Option<String>,
    git_doc_path: Option<OneOrMany>,
    git_clone_dir: Option<String>,
    git_keep_clone: Option<bool>,
    git_skip_fetch: Option<bool>,

    db_host: Option<String>,
    db_port: Option<u16>,
    db_name: Option<String>,
    db_user: Option<String>,
    db_sslmode: Option<String>,
    db_table: Option<String>,
    db_sslcert: Option<String>,
    db_sslkey: Option<String>,
    db_sslrootcert: Option<String>,

    col_doc_title: Option<String>,
    col_doc_content: Option<String>,
    col_source_content: Option<String>,
    col_file_name: Option<String>,
    col_file_created: Option<String>,
    col_file_modified: Option<String>,
    col_row_created: Option<String>,
    col_row_updated: Option<String>,

    custom_columns: BTreeMap<String, serde_yaml::Value>,
    update: Option<bool>,
}

/// Git source settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitConfig {
    pub url: String,
    pub branch: Option<String>,
    pub tag: Option<String>,
    /// Paths inside the repository; empty means the whole tree.
    pub doc_paths: Vec<String>,
    pub clone_dir: Option<PathBuf>,
    pub keep_clone: bool,
    pub skip_fetch: bool,
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub sslmode: String,
    pub table: String,
    pub sslcert: Option<PathBuf>,
    pub sslkey: Option<PathBuf>,
    pub sslrootcert: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_owned(),
            port: DEFAULT_DB_PORT,
            name: String::new(),
            user: String::new(),
            password: None,
            sslmode: DEFAULT_DB_SSLMODE.to_owned(),
            table: String::new(),
            sslcert: None,
            sslkey: None,
            sslrootcert: None,
        }
    }
}

/// Which table column receives which document field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub doc_title: Option<String>,
    pub doc_content: Option<String>,
    pub source_content: Option<String>,
    pub file_name: Option<String>,
    pub file_created: Option<String>,
    pub file_modified: Option<String>,
    pub row_created: Option<String>,
    pub row_updated: Option<String>,
}

impl ColumnMapping {
    /// True when no column is mapped.
    pub fn is_empty(&self) -> bool {
        [
            &self.doc_title,
            &self.doc_content,
            &self.source_content,
            &self.file_name,
            &self.file_created,
            &self.file_modified,
            &self.row_created,
            &self.row_updated,
        ]
        .iter()
        .all(|column| column.is_none())
    }
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Local sources; empty when loading from git.
    pub sources: Vec<PathBuf>,
    pub strip_path: bool,
    pub git: Option<GitConfig>,
    pub database: DatabaseConfig,
    pub columns: ColumnMapping,
    /// Fixed values written to every row, ordered by column name.
    pub custom_columns: BTreeMap<String, String>,
    pub update_mode: bool,
    /// Path to the config file, if one was loaded.
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the file named in `cli` (if any), then apply
    /// the command-line overrides, look up the password and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, a
    /// `--set-column` value is malformed, or validation fails.
    pub fn load(cli: &CliSettings) -> Result<Self, LoaderError> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        config.apply_cli_settings(cli)?;
        config.database.password = lookup_password(&config.database);
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoaderError::io(path, e))?;
        let file: ConfigFile = serde_yaml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_file(file, config_dir)?;
        config.config_path = Some(path.to_path_buf());

        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Build a configuration from parsed file contents, resolving relative
    /// paths against `config_dir`.
    fn from_file(file: ConfigFile, config_dir: &Path) -> Result<Self, LoaderError> {
        let resolve = |value: Option<String>| resolve_path(value.as_deref()?, config_dir);

        let git = file.git_url.filter(|url| !url.is_empty()).map(|url| GitConfig {
            url,
            branch: non_empty(file.git_branch),
            tag: non_empty(file.git_tag),
            doc_paths: file.git_doc_path.map(OneOrMany::into_vec).unwrap_or_default(),
            clone_dir: resolve(file.git_clone_dir),
            keep_clone: file.git_keep_clone.unwrap_or(false),
            skip_fetch: file.git_skip_fetch.unwrap_or(false),
        });

        let defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            host: file.db_host.unwrap_or(defaults.host),
            port: file.db_port.unwrap_or(defaults.port),
            name: file.db_name.unwrap_or_default(),
            user: file.db_user.unwrap_or_default(),
            password: None,
            sslmode: file.db_sslmode.unwrap_or(defaults.sslmode),
            table: file.db_table.unwrap_or_default(),
            sslcert: resolve(file.db_sslcert),
            sslkey: resolve(file.db_sslkey),
            sslrootcert: resolve(file.db_sslrootcert),
        };

        let columns = ColumnMapping {
            doc_title: non_empty(file.col_doc_title),
            doc_content: non_empty(file.col_doc_content),
            source_content: non_empty(file.col_source_content),
            file_name: non_empty(file.col_file_name),
            file_created: non_empty(file.col_file_created),
            file_modified: non_empty(file.col_file_modified),
            row_created: non_empty(file.col_row_created),
            row_updated: non_empty(file.col_row_updated),
        };

        let mut custom_columns = BTreeMap::new();
        for (column, value) in file.custom_columns {
            custom_columns.insert(column.trim().to_owned(), yaml_scalar(&column, value)?);
        }

        Ok(Self {
            sources: file
                .source
                .map(OneOrMany::into_vec)
                .unwrap_or_default()
                .iter()
                .filter_map(|source| resolve_path(source, config_dir))
                .collect(),
            strip_path: file.strip_path.unwrap_or(false),
            git,
            database,
            columns,
            custom_columns,
            update_mode: file.update.unwrap_or(false),
            config_path: None,
        })
    }

    /// Apply command-line settings on top of the loaded values.
    fn apply_cli_settings(&mut self, cli: &CliSettings) -> Result<(), LoaderError> {
        if !cli.source.is_empty() {
            self.sources.clone_from(&cli.source);
        }
        self.strip_path |= cli.strip_path;
        self.update_mode |= cli.update;

        if let Some(url) = cli.git_url.as_ref().filter(|url| !url.is_empty()) {
            let git = self.git.get_or_insert_with(GitConfig::default);
            git.url.clone_from(url);
        }
        if let Some(git) = &mut self.git {
            // Branch and tag select one ref; naming one on the command line
            // replaces whichever the file chose.
            if cli.git_branch.is_some() || cli.git_tag.is_some() {
                git.branch.clone_from(&cli.git_branch);
                git.tag.clone_from(&cli.git_tag);
            }
            if !cli.git_doc_path.is_empty() {
                git.doc_paths.clone_from(&cli.git_doc_path);
            }
            if let Some(dir) = &cli.git_clone_dir {
                git.clone_dir = Some(dir.clone());
            }
            git.keep_clone |= cli.git_keep_clone;
            git.skip_fetch |= cli.git_skip_fetch;
        }

        let db = &mut self.database;
        override_string(&mut db.host, &cli.db_host);
        if let Some(port) = cli.db_port {
            db.port = port;
        }
        override_string(&mut db.name, &cli.db_name);
        override_string(&mut db.user, &cli.db_user);
        override_string(&mut db.sslmode, &cli.db_sslmode);
        override_string(&mut db.table, &cli.db_table);
        override_path(&mut db.sslcert, &cli.db_sslcert);
        override_path(&mut db.sslkey, &cli.db_sslkey);
        override_path(&mut db.sslrootcert, &cli.db_sslrootcert);

        let columns = &mut self.columns;
        override_column(&mut columns.doc_title, &cli.col_doc_title);
        override_column(&mut columns.doc_content, &cli.col_doc_content);
        override_column(&mut columns.source_content, &cli.col_source_content);
        override_column(&mut columns.file_name, &cli.col_file_name);
        override_column(&mut columns.file_created, &cli.col_file_created);
        override_column(&mut columns.file_modified, &cli.col_file_modified);
        override_column(&mut columns.row_created, &cli.col_row_created);
        override_column(&mut columns.row_updated, &cli.col_row_updated);

        for assignment in &cli.set_column {
            let (column, value) = parse_set_column(assignment)?;
            self.custom_columns.insert(column, value);
        }

        Ok(())
    }

    /// Validate the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::Config` describing the first problem found.
    pub fn validate(&self) -> Result<(), LoaderError> {
        match (&self.git, self.sources.is_empty()) {
            (None, true) => {
                return Err(config_error("either a source path or a git URL is required"));
            }
            (Some(_), false) => {
                return Err(config_error(
                    "source paths and a git URL cannot be used together",
                ));
            }
            _ => {}
        }
        if let Some(source) = self
            .sources
            .iter()
            .find(|source| is_git_url(&source.to_string_lossy()))
        {
            return Err(LoaderError::Config(format!(
                "source '{}' looks like a git URL; use --git-url instead",
                source.display()
            )));
        }
        if let Some(git) = &self.git
            && git.branch.is_some()
            && git.tag.is_some()
        {
            return Err(config_error("git branch and git tag are mutually exclusive"));
        }

        require_non_empty(&self.database.host, "database host")?;
        require_non_empty(&self.database.name, "database name")?;
        require_non_empty(&self.database.user, "database user")?;
        require_non_empty(&self.database.table, "database table")?;

        if self.columns.is_empty() {
            return Err(config_error("at least one column mapping must be specified"));
        }
        if self.custom_columns.keys().any(|column| column.is_empty()) {
            return Err(config_error("custom column names cannot be empty"));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> LoaderError {
    LoaderError::Config(message.to_owned())
}

fn require_non_empty(value: &str, field: &str) -> Result<(), LoaderError> {
    if value.trim().is_empty() {
        return Err(LoaderError::Config(format!("{field} is required")));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn override_string(target: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        target.clone_from(value);
    }
}

fn override_path(target: &mut Option<PathBuf>, value: &Option<PathBuf>) {
    if let Some(value) = value.as_ref().filter(|p| !p.as_os_str().is_empty()) {
        *target = Some(value.clone());
    }
}

fn override_column(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *target = non_empty(Some(value.clone()));
    }
}

/// Resolve a path from the config file against the file's directory.
///
/// Empty values yield `None`; absolute paths are returned unchanged.
fn resolve_path(value: &str, config_dir: &Path) -> Option<PathBuf> {
    if value.is_empty() {
        return None;
    }
    let path = Path::new(value);
    if path.is_absolute() {
        Some(path.to_path_buf())
    } else {
        Some(config_dir.join(path))
    }
}

/// Custom column values may be written as YAML numbers or booleans.
fn yaml_scalar(column: &str, value: serde_yaml::Value) -> Result<String, LoaderError> {
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok(String::new()),
        _ => Err(LoaderError::Config(format!(
            "custom column '{column}' must have a scalar value"
        ))),
    }
}

/// Parse a `column=value` assignment.
///
/// Splits at the first `=` and trims both sides.
///
/// # Errors
///
/// Returns `LoaderError::Config` when there is no `=` or the column name
/// is empty.
pub fn parse_set_column(assignment: &str) -> Result<(String, String), LoaderError> {
    let (column, value) = assignment.split_once('=').ok_or_else(|| {
        LoaderError::Config(format!(
            "invalid set-column format '{assignment}': expected column=value"
        ))
    })?;
    let column = column.trim();
    if column.is_empty() {
        return Err(LoaderError::Config(format!(
            "invalid set-column format '{assignment}': column name cannot be empty"
        )));
    }
    Ok((column.to_owned(), value.trim().to_owned()))
}

/// Password from `PGPASSWORD`, then `~/.pgpass`; `None` allows
/// passwordless authentication.
fn lookup_password(db: &DatabaseConfig) -> Option<String> {
    if let Ok(password) = std::env::var("PGPASSWORD")
        && !password.is_empty()
    {
        return Some(password);
    }

    let path = dirs::home_dir()?.join(".pgpass");
    let contents = std::fs::read_to_string(&path).ok()?;
    let password = pgpass_lookup(&contents, &db.host, db.port, &db.name, &db.user);
    if password.is_some() {
        tracing::debug!(path = %path.display(), "using password from pgpass file");
    }
    password
}

/// Find the password of the first `.pgpass` entry matching the connection.
///
/// Entries are `host:port:database:user:password`; `*` matches anything,
/// `\:` and `\\` are literal, and lines starting with `#` are comments.
pub fn pgpass_lookup(
    contents: &str,
    host: &str,
    port: u16,
    database: &str,
    user: &str,
) -> Option<String> {
    let port = port.to_string();
    let wanted = [host, port.as_str(), database, user];

    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(split_pgpass_line)
        .filter(|fields| fields.len() == 5)
        .find(|fields| {
            fields
                .iter()
                .zip(wanted)
                .all(|(field, value)| field == "*" || field == value)
        })
        .and_then(|mut fields| fields.pop())
}

fn split_pgpass_line(line: &str) -> Vec<String> {
    let mut fields = Vec::with_capacity(5);
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> ConfigFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn minimal_cli() -> CliSettings {
        CliSettings {
            source: vec![PathBuf::from("docs")],
            db_name: Some("docs".to_owned()),
            db_user: Some("loader".to_owned()),
            db_table: Some("documents".to_owned()),
            col_doc_content: Some("content".to_owned()),
            ..CliSettings::default()
        }
    }

    fn merged(cli: &CliSettings) -> Result<Config, LoaderError> {
        let mut config = Config::default();
        config.apply_cli_settings(cli)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.sslmode, "prefer");
        assert!(config.sources.is_empty());
        assert!(!config.update_mode);
    }

    #[test]
    fn test_parse_full_file() {
        let file = parse(
            r#"
source:
  - docs/*.md
  - /abs/reference
strip-path: true
db-host: db.internal
db-port: 6432
db-name: docs
db-user: loader
db-table: public.documents
db-sslrootcert: certs/root.crt
col-doc-title: title
col-doc-content: content
col-file-name: filename
custom-columns:
  product: pgEdge
  version: 17
  published: true
update: true
"#,
        );
        let config = Config::from_file(file, Path::new("/etc/docloader")).unwrap();

        assert_eq!(
            config.sources,
            vec![
                PathBuf::from("/etc/docloader/docs/*.md"),
                PathBuf::from("/abs/reference"),
            ]
        );
        assert!(config.strip_path);
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6432);
        assert_eq!(config.database.table, "public.documents");
        assert_eq!(
            config.database.sslrootcert,
            Some(PathBuf::from("/etc/docloader/certs/root.crt"))
        );
        assert_eq!(config.columns.doc_title.as_deref(), Some("title"));
        assert_eq!(config.columns.source_content, None);
        assert_eq!(config.custom_columns["product"], "pgEdge");
        assert_eq!(config.custom_columns["version"], "17");
        assert_eq!(config.custom_columns["published"], "true");
        assert!(config.update_mode);
    }

    #[test]
    fn test_source_accepts_single_string() {
        let config = Config::from_file(parse("source: docs"), Path::new("/base")).unwrap();
        assert_eq!(config.sources, vec![PathBuf::from("/base/docs")]);
    }

    #[test]
    fn test_git_section() {
        let file = parse(
            r#"
git-url: https://github.com/example/docs.git
git-branch: main
git-doc-path: docs
git-clone-dir: clones
git-keep-clone: true
"#,
        );
        let config = Config::from_file(file, Path::new("/base")).unwrap();
        let git = config.git.unwrap();
        assert_eq!(git.url, "https://github.com/example/docs.git");
        assert_eq!(git.branch.as_deref(), Some("main"));
        assert_eq!(git.tag, None);
        assert_eq!(git.doc_paths, vec!["docs".to_owned()]);
        assert_eq!(git.clone_dir, Some(PathBuf::from("/base/clones")));
        assert!(git.keep_clone);
        assert!(!git.skip_fetch);
    }

    #[test]
    fn test_empty_values_are_not_resolved() {
        let config = Config::from_file(parse("db-sslcert: ''\nsource: ''"), Path::new("/base"))
            .unwrap();
        assert_eq!(config.database.sslcert, None);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_custom_column_rejects_nested_value() {
        let file = parse("custom-columns:\n  tags: [a, b]\n");
        let err = Config::from_file(file, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = parse(
            r#"
source: docs
db-name: from_file
db-user: loader
db-table: documents
col-doc-title: title
custom-columns:
  product: old
"#,
        );
        let mut config = Config::from_file(file, Path::new("/base")).unwrap();
        let cli = CliSettings {
            source: vec![PathBuf::from("other")],
            db_name: Some("from_cli".to_owned()),
            col_doc_title: Some("heading".to_owned()),
            set_column: vec!["product = new ".to_owned(), "team=docs".to_owned()],
            update: true,
            ..CliSettings::default()
        };
        config.apply_cli_settings(&cli).unwrap();

        assert_eq!(config.sources, vec![PathBuf::from("other")]);
        assert_eq!(config.database.name, "from_cli");
        assert_eq!(config.columns.doc_title.as_deref(), Some("heading"));
        assert_eq!(config.custom_columns["product"], "new");
        assert_eq!(config.custom_columns["team"], "docs");
        assert!(config.update_mode);
    }

    #[test]
    fn test_cli_branch_replaces_file_tag() {
        let file = parse("git-url: git@github.com:org/repo.git\ngit-tag: v1.0\n");
        let mut config = Config::from_file(file, Path::new(".")).unwrap();
        let cli = CliSettings {
            git_branch: Some("main".to_owned()),
            ..CliSettings::default()
        };
        config.apply_cli_settings(&cli).unwrap();
        let git = config.git.unwrap();
        assert_eq!(git.branch.as_deref(), Some("main"));
        assert_eq!(git.tag, None);
    }

    #[test]
    fn test_parse_set_column() {
        assert_eq!(
            parse_set_column(" product = pgEdge ").unwrap(),
            ("product".to_owned(), "pgEdge".to_owned())
        );
        assert_eq!(
            parse_set_column("expr=a=b").unwrap(),
            ("expr".to_owned(), "a=b".to_owned())
        );
        assert_eq!(
            parse_set_column("empty=").unwrap(),
            ("empty".to_owned(), String::new())
        );
        assert!(parse_set_column("novalue").is_err());
        assert!(parse_set_column(" =value").is_err());
    }

    #[test]
    fn test_validate_minimal() {
        assert!(merged(&minimal_cli()).is_ok());
    }

    #[test]
    fn test_validate_requires_source() {
        let cli = CliSettings {
            source: Vec::new(),
            ..minimal_cli()
        };
        let err = merged(&cli).unwrap_err();
        assert!(err.to_string().contains("source path or a git URL"));
    }

    #[test]
    fn test_validate_source_and_git_exclusive() {
        let cli = CliSettings {
            git_url: Some("https://example.com/docs.git".to_owned()),
            ..minimal_cli()
        };
        assert!(merged(&cli).is_err());
    }

    #[test]
    fn test_validate_rejects_git_url_as_source() {
        let cli = CliSettings {
            source: vec![PathBuf::from("git@github.com:pgEdge/docs.git")],
            ..minimal_cli()
        };
        let err = merged(&cli).unwrap_err();
        assert!(err.to_string().contains("--git-url"));
    }

    #[test]
    fn test_validate_branch_and_tag_exclusive() {
        let mut config = merged(&minimal_cli()).unwrap();
        config.sources.clear();
        config.git = Some(GitConfig {
            url: "https://example.com/docs.git".to_owned(),
            branch: Some("main".to_owned()),
            tag: Some("v1".to_owned()),
            ..GitConfig::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_validate_required_database_fields() {
        for cli in [
            CliSettings {
                db_name: None,
                ..minimal_cli()
            },
            CliSettings {
                db_user: None,
                ..minimal_cli()
            },
            CliSettings {
                db_table: None,
                ..minimal_cli()
            },
            CliSettings {
                db_host: Some(String::new()),
                ..minimal_cli()
            },
        ] {
            assert!(merged(&cli).is_err(), "{cli:?}");
        }
    }

    #[test]
    fn test_validate_requires_a_column() {
        let cli = CliSettings {
            col_doc_content: None,
            ..minimal_cli()
        };
        let err = merged(&cli).unwrap_err();
        assert!(err.to_string().contains("column mapping"));
    }

    #[test]
    fn test_pgpass_lookup() {
        let pgpass = "\
# comment
other:5432:docs:loader:wrong
localhost:5432:docs:loader:secret
*:*:*:*:fallback
";
        assert_eq!(
            pgpass_lookup(pgpass, "localhost", 5432, "docs", "loader").as_deref(),
            Some("secret")
        );
        assert_eq!(
            pgpass_lookup(pgpass, "db", 6432, "x", "y").as_deref(),
            Some("fallback")
        );
    }

    #[test]
    fn test_pgpass_escapes_and_malformed_lines() {
        let pgpass = "bad:line\nhost\\:1:5432:db:user:pa\\:ss\\\\word\n";
        assert_eq!(
            pgpass_lookup(pgpass, "host:1", 5432, "db", "user").as_deref(),
            Some("pa:ss\\word")
        );
        assert_eq!(pgpass_lookup(pgpass, "host", 5432, "db", "user"), None);
    }

    #[test]
    fn test_load_reads_file_relative_to_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docloader.yaml");
        std::fs::write(
            &path,
            "source: docs\ndb-name: docs\ndb-user: loader\ndb-table: documents\ncol-doc-content: content\n",
        )
        .unwrap();

        let cli = CliSettings {
            config: Some(path.clone()),
            ..CliSettings::default()
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.sources, vec![dir.path().join("docs")]);
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_file() {
        let cli = CliSettings {
            config: Some(PathBuf::from("/nonexistent/docloader.yaml")),
            ..CliSettings::default()
        };
        assert!(matches!(Config::load(&cli), Err(LoaderError::Io { .. })));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "db-port: [not, a, port]\n").unwrap();
        let cli = CliSettings {
            config: Some(path),
            ..CliSettings::default()
        };
        assert!(matches!(Config::load(&cli), Err(LoaderError::Yaml(_))));
    }
}
