//! Command-line interface for dbhandle
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and argument overrides
//! - Mapping subcommands onto [`Database`] operations
//! - Rendering outcomes as JSON

use clap::{Parser, Subcommand};
use mongodb::bson::{Bson, Document};
use serde_json::{Value, json};
use std::path::PathBuf;

use crate::command::CreateCollectionOptions;
use crate::config::Config;
use crate::database::Database;
use crate::error::{DbError, Result};
use crate::reference::DbRef;
use crate::response::{CommandOutcome, ProfilingOutcome};

/// Extract database name from MongoDB connection URI
///
/// Format: `mongodb://[username:password@]host[:port][/database][?options]`
fn extract_database_from_uri(uri: &str) -> Option<String> {
    let after_scheme = uri.split("://").nth(1)?;
    let path_part = after_scheme.split('/').nth(1)?;
    let db_name = path_part.split('?').next().unwrap_or("");
    if db_name.is_empty() {
        None
    } else {
        Some(db_name.to_string())
    }
}

/// Database-level administration for MongoDB
#[derive(Parser, Debug)]
#[command(
    name = "dbhandle",
    version,
    about = "Database-level MongoDB administration",
    long_about = "Runs database-level commands (profiling, create/drop, repair, eval, \
DBRef lookups) against a single MongoDB database and prints the server reply as JSON."
)]
pub struct CliArgs {
    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// Database name to use
    #[arg(short = 'd', long, value_name = "NAME")]
    pub database: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for dbhandle
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List collection names
    Collections,

    /// Show or change the profiling level
    Profile {
        /// New level (0 off, 1 slow operations, 2 all)
        #[arg(long, value_name = "LEVEL")]
        set: Option<i32>,
    },

    /// Create a collection
    Create {
        name: String,

        /// Make the collection capped (needs --size)
        #[arg(long)]
        capped: bool,

        /// Capped size in bytes
        #[arg(long, default_value_t = 0)]
        size: i64,

        /// Maximum document count of a capped collection
        #[arg(long, default_value_t = 0)]
        max: i64,
    },

    /// Drop a collection
    DropCollection { name: String },

    /// Drop the whole database
    DropDatabase {
        /// Confirm the drop
        #[arg(long, required = true)]
        yes: bool,
    },

    /// Repair the database
    Repair {
        #[arg(long)]
        preserve_cloned_files: bool,

        #[arg(long)]
        backup_original_files: bool,
    },

    /// Evaluate JavaScript on the server
    Eval {
        code: String,

        /// Arguments as extended JSON values
        #[arg(value_name = "JSON")]
        args: Vec<String>,
    },

    /// Show cursor information
    IndexInfo,

    /// Show the GridFS collection pair
    Gridfs {
        /// Files prefix (defaults to the configured one)
        #[arg(long)]
        prefix: Option<String>,

        /// Chunks prefix (defaults to the configured one)
        #[arg(long)]
        chunks: Option<String>,
    },

    /// Show the last error of the connection
    LastError,

    /// Fetch the document a reference points to
    Deref {
        collection: String,

        /// The referenced _id as extended JSON, e.g. '{"$oid": "..."}' or 7
        #[arg(value_name = "JSON")]
        id: String,
    },

    /// Run an arbitrary command given as extended JSON
    Run {
        #[arg(value_name = "JSON")]
        command: String,
    },

    /// Show the effective configuration
    Config {
        /// Validate instead of printing
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and environment, then apply arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load(args.config_file.as_deref())?;

        if let Some(uri) = &args.uri {
            config.connection.default_uri = uri.clone();
        }
        if let Some(timeout) = args.timeout {
            config.connection.timeout = timeout;
        }

        Ok(config)
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connection URI after argument overrides
    pub fn get_connection_uri(&self) -> String {
        self.config.connection.default_uri.clone()
    }

    /// Database to operate on: `--database`, then the URI path, then config
    pub fn get_database(&self) -> String {
        self.args
            .database
            .clone()
            .or_else(|| extract_database_from_uri(&self.config.connection.default_uri))
            .unwrap_or_else(|| self.config.connection.default_database.clone())
    }

    /// Handle subcommands that need no connection
    pub fn handle_local_command(&self) -> Result<Option<Value>> {
        match &self.args.command {
            Commands::Config { validate: true } => {
                self.config.validate()?;
                Ok(Some(json!({ "valid": true })))
            }
            Commands::Config { validate: false } => {
                Ok(Some(serde_json::to_value(&self.config)?))
            }
            _ => Ok(None),
        }
    }

    /// Run the selected subcommand against `db`
    pub async fn execute(&self, db: &Database) -> Result<Value> {
        match &self.args.command {
            Commands::Collections => Ok(json!(db.list_collections().await?)),
            Commands::Profile { set } => {
                let outcome = match set {
                    Some(level) => db.set_profiling_level(*level).await?,
                    None => db.get_profiling_level().await?,
                };
                Ok(profiling_json(&outcome))
            }
            Commands::Create {
                name,
                capped,
                size,
                max,
            } => {
                let options = CreateCollectionOptions {
                    capped: *capped,
                    size: *size,
                    max: *max,
                };
                let collection = db.create_collection(name, options).await?;
                Ok(json!({ "collection": collection.full_name() }))
            }
            Commands::DropCollection { name } => {
                Ok(outcome_json(&db.drop_collection(name.as_str()).await?))
            }
            Commands::DropDatabase { .. } => Ok(outcome_json(&db.drop().await?)),
            Commands::Repair {
                preserve_cloned_files,
                backup_original_files,
            } => Ok(outcome_json(
                &db.repair(*preserve_cloned_files, *backup_original_files)
                    .await?,
            )),
            Commands::Eval { code, args } => {
                let args = args
                    .iter()
                    .map(|arg| parse_extended_json(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(outcome_json(&db.execute(code, args).await?))
            }
            Commands::IndexInfo => Ok(outcome_json(&db.index_info().await?)),
            Commands::Gridfs { prefix, chunks } => {
                let defaults = &self.config.gridfs;
                let fs = db.gridfs(
                    prefix.as_deref().unwrap_or(defaults.prefix.as_str()),
                    chunks.as_deref().unwrap_or(defaults.chunks.as_str()),
                );
                Ok(json!({
                    "files": fs.files().full_name(),
                    "chunks": fs.chunks().full_name(),
                }))
            }
            Commands::LastError => Ok(outcome_json(&db.last_error().await?)),
            Commands::Deref { collection, id } => {
                let reference = DbRef::new(collection.as_str(), parse_extended_json(id)?);
                match db.get_db_ref(reference).await? {
                    Some(doc) => Ok(document_json(doc)),
                    None => Ok(Value::Null),
                }
            }
            Commands::Run { command } => match parse_extended_json(command)? {
                Bson::Document(command) => Ok(outcome_json(&db.command(command).await?)),
                other => Err(DbError::Bson(format!(
                    "a command must be a JSON object, got {other}"
                ))),
            },
            Commands::Config { .. } => self
                .handle_local_command()
                .map(|value| value.unwrap_or(Value::Null)),
        }
    }
}

/// Parse one extended JSON value (`{"$oid": ...}`, `{"$date": ...}`, plain JSON).
fn parse_extended_json(input: &str) -> Result<Bson> {
    let value: Value = serde_json::from_str(input)?;
    Bson::try_from(value).map_err(|e| DbError::Bson(e.to_string()))
}

fn document_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

fn outcome_json(outcome: &CommandOutcome) -> Value {
    document_json(outcome.response().clone())
}

fn profiling_json(outcome: &ProfilingOutcome) -> Value {
    match outcome {
        ProfilingOutcome::Previous(level) => json!({ "ok": true, "was": level }),
        ProfilingOutcome::Failed(failure) => json!({
            "ok": false,
            "error": failure.info(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::MockConnection;
    use mongodb::bson::doc;
    use std::sync::Arc;

    fn cli(args: &[&str]) -> CliInterface {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        Config::default().save(&config_path).unwrap();

        let mut argv = vec!["dbhandle", "--config", config_path.to_str().unwrap()];
        argv.extend_from_slice(args);
        CliInterface::from_args(CliArgs::try_parse_from(argv).unwrap()).unwrap()
    }

    #[test]
    fn test_extract_database_from_uri() {
        assert_eq!(
            extract_database_from_uri("mongodb://localhost:27017/shop"),
            Some("shop".to_string())
        );
        assert_eq!(
            extract_database_from_uri("mongodb://u:p@h1,h2/shop?replicaSet=rs0"),
            Some("shop".to_string())
        );
        assert_eq!(extract_database_from_uri("mongodb://localhost:27017/"), None);
        assert_eq!(extract_database_from_uri("mongodb://localhost"), None);
    }

    #[test]
    fn test_database_precedence() {
        let from_flag = cli(&["--uri", "mongodb://h/uri_db", "-d", "flag_db", "collections"]);
        assert_eq!(from_flag.get_database(), "flag_db");

        let from_uri = cli(&["--uri", "mongodb://h/uri_db", "collections"]);
        assert_eq!(from_uri.get_database(), "uri_db");
        assert_eq!(from_uri.get_connection_uri(), "mongodb://h/uri_db");

        let from_config = cli(&["collections"]);
        assert_eq!(from_config.get_database(), "test");
    }

    #[test]
    fn test_drop_database_requires_confirmation() {
        assert!(CliArgs::try_parse_from(["dbhandle", "drop-database"]).is_err());
        let args = CliArgs::try_parse_from(["dbhandle", "drop-database", "--yes"]).unwrap();
        assert_eq!(args.command, Commands::DropDatabase { yes: true });
    }

    #[test]
    fn test_local_config_command() {
        let validated = cli(&["config", "--validate"]).handle_local_command().unwrap();
        assert_eq!(validated, Some(json!({ "valid": true })));

        let shown = cli(&["config"]).handle_local_command().unwrap().unwrap();
        assert_eq!(shown["gridfs"]["prefix"], "fs");

        assert!(cli(&["index-info"]).handle_local_command().unwrap().is_none());
    }

    #[test]
    fn test_parse_extended_json() {
        assert_eq!(parse_extended_json("7").unwrap(), Bson::Int32(7));
        let oid = parse_extended_json(r#"{"$oid": "507f1f77bcf86cd799439011"}"#).unwrap();
        assert!(matches!(oid, Bson::ObjectId(_)));
        assert!(parse_extended_json("{not json").is_err());
    }

    #[tokio::test]
    async fn test_create_subcommand() {
        let mock = Arc::new(MockConnection::new());
        let db = Database::new(mock.clone(), "app").unwrap();

        let output = cli(&["create", "events", "--capped", "--size", "4096"])
            .execute(&db)
            .await
            .unwrap();
        assert_eq!(output, json!({ "collection": "app.events" }));
        assert_eq!(
            mock.last_command().unwrap(),
            doc! { "create": "events", "capped": true, "size": 4096_i64 }
        );
    }

    #[tokio::test]
    async fn test_profile_subcommand_failure() {
        let mock = Arc::new(
            MockConnection::new().reply("profile", doc! { "ok": 0.0, "errmsg": "unauthorized", "code": 13 }),
        );
        let db = Database::new(mock, "app").unwrap();

        let output = cli(&["profile"]).execute(&db).await.unwrap();
        assert_eq!(output["ok"], false);
        assert_eq!(output["error"]["name"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_deref_subcommand() {
        let mock = Arc::new(
            MockConnection::new().collection("app.coll", vec![doc! { "_id": 7, "v": "a" }]),
        );
        let db = Database::new(mock, "app").unwrap();

        let found = cli(&["deref", "coll", "7"]).execute(&db).await.unwrap();
        assert_eq!(found, json!({ "_id": 7, "v": "a" }));

        let missing = cli(&["deref", "coll", "8"]).execute(&db).await.unwrap();
        assert_eq!(missing, Value::Null);
    }

    #[tokio::test]
    async fn test_gridfs_subcommand_uses_config_defaults() {
        let db = Database::new(Arc::new(MockConnection::new()), "app").unwrap();

        let defaults = cli(&["gridfs"]).execute(&db).await.unwrap();
        assert_eq!(defaults, json!({ "files": "app.fs.files", "chunks": "app.fs.chunks" }));

        let custom = cli(&["gridfs", "--prefix", "img", "--chunks", "blobs"])
            .execute(&db)
            .await
            .unwrap();
        assert_eq!(custom, json!({ "files": "app.img.files", "chunks": "app.blobs.chunks" }));
    }

    #[tokio::test]
    async fn test_run_rejects_non_object() {
        let db = Database::new(Arc::new(MockConnection::new()), "app").unwrap();
        let err = cli(&["run", "[1, 2]"]).execute(&db).await.unwrap_err();
        assert!(matches!(err, DbError::Bson(_)));
    }
}
