//! Google Sheets output sink.
//!
//! [`SheetsSink`] implements [`lmi_core::OutputSink`]: it creates one
//! spreadsheet per run, writes each table to its own tab, optionally moves
//! the file into a Drive folder and shares it.

pub mod client;
pub mod error;
pub mod sink;

mod tabs;

pub use client::{GoogleEndpoints, SheetsClient, Spreadsheet};
pub use error::SheetsError;
pub use sink::SheetsSink;
