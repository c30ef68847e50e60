//! Strata Config
//!
//! This crate contains the textual inputs of Strata:
//!
//! - [`WorkflowSpec`]: the line-oriented workflow specification (`F` file
//!   records and `T` task records) and its text form.
//! - [`TranslationTable`]: the handle → path table used to instantiate an
//!   abstract workflow against a concrete dataset.
//! - [`DispatchConfig`]: settings for the dispatcher and reconciler, loaded
//!   from JSON.
//!
//! These types are plain data; building graphs from them is the job of
//! `strata-resolver`.

mod dispatch;
mod error;
mod expand;
mod record;
mod translation;

pub use dispatch::DispatchConfig;
pub use error::SpecError;
pub use expand::{ExpandError, expand_handle, expand_list};
pub use record::{FileRecord, Record, SEPARATOR, SpecRecord, TaskRecord, WorkflowSpec};
pub use translation::TranslationTable;
