//! Database-level command documents
//!
//! Every administrative operation of [`crate::Database`] is first expressed as
//! a typed [`DatabaseCommand`] and then rendered into the exact ordered BSON
//! document the server expects. Rendering is pure: no I/O, no shared state.
//!
//! The command verb is always the first key of the rendered document.

use mongodb::bson::{Bson, Document, doc};

/// Command verb for reading or changing the profiling level.
pub const PROFILE: &str = "profile";
/// Command verb for dropping the current database.
pub const DROP_DATABASE: &str = "dropDatabase";
/// Command verb for repairing the current database.
pub const REPAIR_DATABASE: &str = "repairDatabase";
/// Command verb for creating a collection.
pub const CREATE: &str = "create";
/// Command verb for server-side JavaScript evaluation.
pub const EVAL: &str = "$eval";
/// Command verb for cursor bookkeeping information.
pub const CURSOR_INFO: &str = "cursorInfo";

/// Value sent with `profile` to read the level without changing it.
pub const PROFILE_QUERY: i32 = -1;

/// Server-side profiling levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingLevel {
    /// Profiling disabled
    Off,
    /// Only slow operations are recorded
    SlowOnly,
    /// All operations are recorded
    All,
}

impl ProfilingLevel {
    /// Map a raw level returned by the server.
    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            0 => Some(ProfilingLevel::Off),
            1 => Some(ProfilingLevel::SlowOnly),
            2 => Some(ProfilingLevel::All),
            _ => None,
        }
    }
}

impl From<ProfilingLevel> for i32 {
    fn from(level: ProfilingLevel) -> Self {
        match level {
            ProfilingLevel::Off => 0,
            ProfilingLevel::SlowOnly => 1,
            ProfilingLevel::All => 2,
        }
    }
}

/// Options for `create`.
///
/// `capped` only takes effect together with a nonzero `size`, and `max`
/// only takes effect inside a capped collection. Use
/// [`CreateCollectionOptions::capped_options`] to see what will actually be
/// sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateCollectionOptions {
    /// Request a capped collection
    pub capped: bool,

    /// Size in bytes of a capped collection
    pub size: i64,

    /// Maximum number of documents in a capped collection
    pub max: i64,
}

/// The capped settings that survive the create-collection gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CappedOptions {
    pub size: i64,
    pub max: Option<i64>,
}

impl CreateCollectionOptions {
    /// A capped collection of `size` bytes.
    pub fn capped(size: i64) -> Self {
        Self {
            capped: true,
            size,
            max: 0,
        }
    }

    /// Limit the number of documents of a capped collection.
    pub fn with_max(mut self, max: i64) -> Self {
        self.max = max;
        self
    }

    /// Resolve the gates: capped needs a nonzero size, and max is only
    /// considered once the collection is capped.
    pub fn capped_options(&self) -> Option<CappedOptions> {
        if !self.capped || self.size == 0 {
            return None;
        }

        Some(CappedOptions {
            size: self.size,
            max: (self.max != 0).then_some(self.max),
        })
    }
}

/// A typed database-level command.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseCommand {
    /// `{ profile: level }`, where `-1` reads the current level
    Profile(i32),

    /// `{ dropDatabase: 1 }`
    DropDatabase,

    /// `{ repairDatabase: 1, preserveClonedFilesOnFailure, backupOriginalFiles }`
    RepairDatabase {
        preserve_cloned_files_on_failure: bool,
        backup_original_files: bool,
    },

    /// `{ create: name [, capped: true, size [, max]] }`
    CreateCollection {
        name: String,
        capped: Option<CappedOptions>,
    },

    /// `{ $eval: code, args: [...] }`
    Eval { code: String, args: Vec<Bson> },

    /// `{ cursorInfo: 1 }`
    CursorInfo,

    /// `{ getlasterror: 1 }`
    LastError,

    /// `{ getpreverror: 1 }`
    PrevError,

    /// `{ reseterror: 1 }`
    ResetError,

    /// `{ forceerror: 1 }`
    ForceError,
}

impl DatabaseCommand {
    /// The command verb, i.e. the first key of the rendered document.
    pub fn verb(&self) -> &'static str {
        match self {
            DatabaseCommand::Profile(_) => PROFILE,
            DatabaseCommand::DropDatabase => DROP_DATABASE,
            DatabaseCommand::RepairDatabase { .. } => REPAIR_DATABASE,
            DatabaseCommand::CreateCollection { .. } => CREATE,
            DatabaseCommand::Eval { .. } => EVAL,
            DatabaseCommand::CursorInfo => CURSOR_INFO,
            DatabaseCommand::LastError => "getlasterror",
            DatabaseCommand::PrevError => "getpreverror",
            DatabaseCommand::ResetError => "reseterror",
            DatabaseCommand::ForceError => "forceerror",
        }
    }

    /// Render the command into the document sent to the server.
    pub fn to_document(&self) -> Document {
        match self {
            DatabaseCommand::Profile(level) => doc! { PROFILE: *level },
            DatabaseCommand::RepairDatabase {
                preserve_cloned_files_on_failure,
                backup_original_files,
            } => doc! {
                REPAIR_DATABASE: 1,
                "preserveClonedFilesOnFailure": *preserve_cloned_files_on_failure,
                "backupOriginalFiles": *backup_original_files,
            },
            DatabaseCommand::CreateCollection { name, capped } => {
                let mut command = doc! { CREATE: name.as_str() };
                if let Some(capped) = capped {
                    command.insert("capped", true);
                    command.insert("size", capped.size);
                    if let Some(max) = capped.max {
                        command.insert("max", max);
                    }
                }
                command
            }
            DatabaseCommand::Eval { code, args } => doc! {
                EVAL: code.as_str(),
                "args": Bson::Array(args.clone()),
            },
            DatabaseCommand::DropDatabase
            | DatabaseCommand::CursorInfo
            | DatabaseCommand::LastError
            | DatabaseCommand::PrevError
            | DatabaseCommand::ResetError
            | DatabaseCommand::ForceError => doc! { self.verb(): 1 },
        }
    }
}

impl From<DatabaseCommand> for Document {
    fn from(command: DatabaseCommand) -> Self {
        command.to_document()
    }
}

pub fn get_profiling_level() -> DatabaseCommand {
    DatabaseCommand::Profile(PROFILE_QUERY)
}

pub fn set_profiling_level(level: i32) -> DatabaseCommand {
    DatabaseCommand::Profile(level)
}

pub fn drop_database() -> DatabaseCommand {
    DatabaseCommand::DropDatabase
}

pub fn repair_database(
    preserve_cloned_files_on_failure: bool,
    backup_original_files: bool,
) -> DatabaseCommand {
    DatabaseCommand::RepairDatabase {
        preserve_cloned_files_on_failure,
        backup_original_files,
    }
}

pub fn create_collection(
    name: impl Into<String>,
    options: CreateCollectionOptions,
) -> DatabaseCommand {
    DatabaseCommand::CreateCollection {
        name: name.into(),
        capped: options.capped_options(),
    }
}

pub fn eval(code: impl Into<String>, args: Vec<Bson>) -> DatabaseCommand {
    DatabaseCommand::Eval {
        code: code.into(),
        args,
    }
}

pub fn index_info() -> DatabaseCommand {
    DatabaseCommand::CursorInfo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(command: &Document) -> Vec<&str> {
        command.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_profile_commands() {
        assert_eq!(get_profiling_level().to_document(), doc! { "profile": -1 });
        assert_eq!(set_profiling_level(2).to_document(), doc! { "profile": 2 });
        assert_eq!(
            set_profiling_level(ProfilingLevel::SlowOnly.into()).to_document(),
            doc! { "profile": 1 }
        );
    }

    #[test]
    fn test_fixed_commands() {
        assert_eq!(drop_database().to_document(), doc! { "dropDatabase": 1 });
        assert_eq!(index_info().to_document(), doc! { "cursorInfo": 1 });
        assert_eq!(
            DatabaseCommand::LastError.to_document(),
            doc! { "getlasterror": 1 }
        );
        assert_eq!(
            DatabaseCommand::ForceError.to_document(),
            doc! { "forceerror": 1 }
        );
    }

    #[test]
    fn test_repair_keeps_both_flags() {
        let command = repair_database(true, false).to_document();
        assert_eq!(
            command,
            doc! {
                "repairDatabase": 1,
                "preserveClonedFilesOnFailure": true,
                "backupOriginalFiles": false,
            }
        );
        assert_eq!(keys(&command)[0], "repairDatabase");
    }

    #[test]
    fn test_create_plain() {
        let command = create_collection("logs", CreateCollectionOptions::default()).to_document();
        assert_eq!(command, doc! { "create": "logs" });
    }

    #[test]
    fn test_create_capped_without_size_is_uncapped() {
        let options = CreateCollectionOptions {
            capped: true,
            size: 0,
            max: 10,
        };
        let command = create_collection("logs", options).to_document();
        assert_eq!(keys(&command), vec!["create"]);
    }

    #[test]
    fn test_create_capped_with_size_and_max() {
        let options = CreateCollectionOptions::capped(100).with_max(10);
        let command = create_collection("logs", options).to_document();
        assert_eq!(
            command,
            doc! { "create": "logs", "capped": true, "size": 100_i64, "max": 10_i64 }
        );
    }

    #[test]
    fn test_create_capped_with_size_only() {
        let command = create_collection("logs", CreateCollectionOptions::capped(4096)).to_document();
        assert_eq!(keys(&command), vec!["create", "capped", "size"]);
    }

    #[test]
    fn test_create_uncapped_ignores_size_and_max() {
        let options = CreateCollectionOptions {
            capped: false,
            size: 100,
            max: 5,
        };
        assert_eq!(options.capped_options(), None);
        let command = create_collection("logs", options).to_document();
        assert_eq!(keys(&command), vec!["create"]);
    }

    #[test]
    fn test_eval_uses_dollar_verb_and_ordered_args() {
        let command = eval("function(a, b) { return a + b; }", vec![Bson::Int32(1), Bson::Int32(2)])
            .to_document();
        assert_eq!(keys(&command), vec!["$eval", "args"]);
        assert_eq!(
            command.get_array("args").unwrap(),
            &vec![Bson::Int32(1), Bson::Int32(2)]
        );
    }

    #[test]
    fn test_profiling_level_mapping() {
        assert_eq!(ProfilingLevel::from_level(0), Some(ProfilingLevel::Off));
        assert_eq!(ProfilingLevel::from_level(2), Some(ProfilingLevel::All));
        assert_eq!(ProfilingLevel::from_level(7), None);
        assert_eq!(i32::from(ProfilingLevel::All), 2);
    }
}
