//! Source tracking module

pub mod source;
pub mod table;

pub use source::{SequenceWindow, Source};
pub use table::{SourceTable, TerminateOutcome, UpsertOutcome};
