//! Sheet Tests
//!
//! Upsert semantics of the CSV lead sheet.

use crate::actors::traits::LeadRecorder;
use crate::models::{LeadRecord, LEAD_STATUS_PROCESSED};
use crate::sheet::{CsvSheetRecorder, HEADER};
use chrono::{TimeZone, Utc};
use tempfile::tempdir;

fn lead(conversation_id: i64, contact: &str) -> LeadRecord {
    LeadRecord {
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        client_name: "Анна".to_string(),
        contact: contact.to_string(),
        conversation_id,
        status: LEAD_STATUS_PROCESSED.to_string(),
        agent: "Никита".to_string(),
    }
}

#[tokio::test]
async fn test_first_upsert_writes_header_and_row() {
    let dir = tempdir().unwrap();
    let recorder = CsvSheetRecorder::new(dir.path().join("leads.csv"));

    recorder.upsert(&lead(100, "+7 900 000 00 00")).await.unwrap();

    let rows = recorder.rows().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], HEADER.to_vec());
    assert_eq!(
        rows[1],
        vec![
            "2024-05-01T12:30:00Z",
            "Анна",
            "+7 900 000 00 00",
            "100",
            "processed",
            "Никита"
        ]
    );
}

#[tokio::test]
async fn test_upsert_replaces_row_for_same_conversation() {
    let dir = tempdir().unwrap();
    let recorder = CsvSheetRecorder::new(dir.path().join("leads.csv"));

    recorder.upsert(&lead(100, "old@example.com")).await.unwrap();
    recorder.upsert(&lead(200, "other@example.com")).await.unwrap();
    recorder.upsert(&lead(100, "new@example.com")).await.unwrap();

    let rows = recorder.rows().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][2], "new@example.com");
    assert_eq!(rows[1][3], "100");
    assert_eq!(rows[2][2], "other@example.com");
}

#[tokio::test]
async fn test_contact_with_commas_and_quotes_survives() {
    let dir = tempdir().unwrap();
    let recorder = CsvSheetRecorder::new(dir.path().join("leads.csv"));

    let contact = r#"call "after 6", please"#;
    recorder.upsert(&lead(1, contact)).await.unwrap();
    recorder.upsert(&lead(2, "second")).await.unwrap();

    let rows = recorder.rows().await.unwrap();
    assert_eq!(rows[1][2], contact);
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_header_is_added_to_headerless_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("leads.csv");
    std::fs::write(&path, "2024-01-01T00:00:00Z,Bob,bob@example.com,5,processed,Oleg\n").unwrap();
    let recorder = CsvSheetRecorder::new(&path);

    recorder.upsert(&lead(5, "bob@new.example.com")).await.unwrap();

    let rows = recorder.rows().await.unwrap();
    assert_eq!(rows[0], HEADER.to_vec());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][2], "bob@new.example.com");
}

#[tokio::test]
async fn test_missing_parent_directory_is_created() {
    let dir = tempdir().unwrap();
    let recorder = CsvSheetRecorder::new(dir.path().join("nested").join("leads.csv"));

    recorder.upsert(&lead(1, "x")).await.unwrap();
    assert!(recorder.path().exists());
}

#[tokio::test]
async fn test_rows_of_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let recorder = CsvSheetRecorder::new(dir.path().join("absent.csv"));
    assert!(recorder.rows().await.unwrap().is_empty());
}
