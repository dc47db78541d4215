//! Output sinks: append-only tabular destinations for completed records.

use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::traits::RecordSink;
use crate::types::Record;

/// CSV sink with a fixed column schema.
///
/// A new (or empty) file gets the header row; an existing file is opened
/// in append mode so a resumed run continues into the same output. Every
/// append is flushed through to the OS before returning, so an
/// interruption loses at most the in-flight record.
pub struct CsvSink {
    path: PathBuf,
    columns: Vec<String>,
    writer: Mutex<csv::Writer<std::fs::File>>,
    rows_written: StdMutex<usize>,
}

impl CsvSink {
    /// Open or create the sink at `path` with the given column schema.
    pub fn create(
        path: impl Into<PathBuf>,
        columns: Vec<String>,
    ) -> Result<Self, PersistenceError> {
        let path = path.into();
        let needs_header = !has_content(&path);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| PersistenceError::Io {
                path: path.clone(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(&columns)?;
            writer.flush().map_err(|source| PersistenceError::Io {
                path: path.clone(),
                source,
            })?;
            info!(path = ?path, "Created output file with header");
        } else {
            info!(path = ?path, "Appending to existing output file");
        }

        Ok(Self {
            path,
            columns,
            writer: Mutex::new(writer),
            rows_written: StdMutex::new(0),
        })
    }

    /// The configured column names, in output order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows appended by this process (excludes pre-existing rows).
    pub fn rows_written(&self) -> usize {
        *self.rows_written.lock().unwrap()
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn append(&self, record: &Record) -> Result<(), PersistenceError> {
        let row: Vec<&str> = self
            .columns
            .iter()
            .map(|col| record.get(col).unwrap_or(""))
            .collect();

        let mut writer = self.writer.lock().await;
        writer.write_record(&row)?;
        // Flush after every record so partial output survives a crash.
        writer.flush().map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })?;
        drop(writer);

        *self.rows_written.lock().unwrap() += 1;
        debug!(key = %record.key, "Appended record");
        Ok(())
    }

    async fn flush(&self) -> Result<(), PersistenceError> {
        let mut writer = self.writer.lock().await;
        writer.flush().map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn has_content(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemorySink {
    records: StdMutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of appended records, in append order.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, record: &Record) -> Result<(), PersistenceError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordStub;
    use indexmap::IndexMap;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("gleaner-sink-{}.csv", uuid::Uuid::new_v4()))
    }

    fn record(key: &str, name: &str, phone: &str) -> Record {
        let stub = RecordStub::new(key)
            .with_field("Name", name)
            .with_field("Phone", phone);
        Record::merge(&stub, IndexMap::new())
    }

    fn columns() -> Vec<String> {
        vec!["Name".to_string(), "Phone".to_string(), "Website".to_string()]
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let path = temp_path();

        let sink = CsvSink::create(&path, columns()).unwrap();
        sink.append(&record("k1", "Acme", "555-0100")).await.unwrap();
        drop(sink);

        // Reopen: should append, not rewrite the header.
        let sink = CsvSink::create(&path, columns()).unwrap();
        sink.append(&record("k2", "Apex", "555-0101")).await.unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Name,Phone,Website");
        assert!(lines[1].starts_with("Acme"));
        assert!(lines[2].starts_with("Apex"));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_missing_fields_left_empty() {
        let path = temp_path();
        let sink = CsvSink::create(&path, columns()).unwrap();

        sink.append(&record("k1", "Acme", "555-0100")).await.unwrap();
        assert_eq!(sink.rows_written(), 1);
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().nth(1).unwrap().ends_with(','));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_memory_sink_order() {
        let sink = MemorySink::new();
        sink.append(&record("k1", "A", "1")).await.unwrap();
        sink.append(&record("k2", "B", "2")).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "k1");
        assert_eq!(records[1].key, "k2");
    }
}
