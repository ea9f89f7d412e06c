//! File-backed lead sheet.
//!
//! A CSV file standing in for the spreadsheet: a fixed header row, then one
//! row per conversation. Upserting a lead overwrites the conversation's row or
//! appends a new one.

use crate::actors::traits::LeadRecorder;
use crate::error::AppError;
use crate::models::LeadRecord;
use async_trait::async_trait;
use chrono::SecondsFormat;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// Column layout of the sheet.
pub const HEADER: [&str; 6] = [
    "timestamp",
    "client_name",
    "contact",
    "conversation_id",
    "status",
    "agent",
];

const CONVERSATION_COLUMN: usize = 3;

pub struct CsvSheetRecorder {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl CsvSheetRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows, header included. A missing file reads as empty.
    pub async fn rows(&self) -> Result<Vec<Vec<String>>, AppError> {
        let _guard = self.lock.lock().await;
        let records = self.read_records().await?;
        Ok(records
            .iter()
            .map(|r| r.iter().map(str::to_string).collect())
            .collect())
    }

    async fn read_records(&self) -> Result<Vec<StringRecord>, AppError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Recorder(format!("cannot read sheet: {}", e))),
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?);
        }
        Ok(records)
    }

    async fn write_records(&self, records: &[StringRecord]) -> Result<(), AppError> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());
        for record in records {
            writer.write_record(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Recorder(format!("cannot encode sheet: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("csv.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn to_row(record: &LeadRecord) -> StringRecord {
    StringRecord::from(vec![
        record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        record.client_name.clone(),
        record.contact.clone(),
        record.conversation_id.to_string(),
        record.status.clone(),
        record.agent.clone(),
    ])
}

#[async_trait]
impl LeadRecorder for CsvSheetRecorder {
    #[instrument(skip(self, record), fields(conversation_id = record.conversation_id))]
    async fn upsert(&self, record: &LeadRecord) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;

        let has_header = records
            .first()
            .is_some_and(|r| r.iter().eq(HEADER.iter().copied()));
        if !has_header {
            records.insert(0, StringRecord::from(HEADER.to_vec()));
        }

        let key = record.conversation_id.to_string();
        let row = to_row(record);
        match records
            .iter()
            .skip(1)
            .position(|r| r.get(CONVERSATION_COLUMN) == Some(key.as_str()))
        {
            Some(i) => {
                records[i + 1] = row;
                info!("Lead row updated");
            }
            None => {
                records.push(row);
                info!("Lead row appended");
            }
        }

        self.write_records(&records)
            .await
            .map_err(|e| AppError::Recorder(e.to_string()))
    }
}
