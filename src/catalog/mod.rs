//! Documentation records and their validation.
//!
//! This module provides:
//! - `RawRecord` as deserialized from the record source
//! - `FunctionDoc`, the validated entity with its `Argument`s and `Example`s
//! - `load` to validate a batch of records (best-effort, report-all)
//! - `read_records` to read records from JSON files

mod loader;
mod record;
pub mod source;

pub use loader::{load, LoadError, LoadOutcome, SchemaViolation};
pub use record::{
    Argument, Example, FunctionDoc, Kind, RawArgument, RawExample, RawRecord, RecordRef,
};
pub use source::{read_records, SourceError, SourceRecords};
