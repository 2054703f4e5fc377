//! I/O module
//!
//! CSV input and output for the replay binary:
//! - `csv_format` - Row format, validation and card summary output
//! - `sync_reader` - Streaming iterator over an operations file
//! - `async_reader` - Batched reader on csv-async

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_record, write_cards_csv, CsvRecord};
pub use sync_reader::SyncReader;
