//! Asynchronous CSV reader with batch interface
//!
//! Reads operation records from any `futures` async reader with csv-async and
//! hands them out in batches. Row conversion is shared with the sync reader
//! through the csv_format module.
//!
//! ```text
//! async file → AsyncReader → Vec<OperationRecord> batches
//!                   ↓
//!            csv_format module
//! ```

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::OperationRecord;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Memory use is bounded by the batch size, not the file size.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` records
    ///
    /// Rows that fail to parse or convert are logged and skipped. An empty
    /// batch means the input is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<OperationRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => match convert_csv_record(csv_record) {
                    Ok(record) => batch.push(record),
                    Err(e) => warn!(error = %e, "Skipping invalid operation"),
                },
                Some(Err(e)) => warn!(error = %e, "Skipping unparseable row"),
                None => break,
            }
        }

        batch
    }
}
