//! File outcome log writing and rotation.

use std::path::Path;

use bytes::Bytes;
use callsim_core::CallId;
use callsim_delivery::{AttemptOutcome, FileOutcomeLog, LogStream, OutcomeSink};
use chrono::Utc;

fn outcome(call: &str, status_code: Option<u16>, error: Option<&str>) -> AttemptOutcome {
    AttemptOutcome {
        call_id: CallId::new(call),
        url: "http://collector/cdr".to_string(),
        payload: Bytes::from(format!(r#"{{"callId":"{call}"}}"#)),
        status_code,
        error: error.map(str::to_string),
        attempt: 0,
        recorded_at: Utc::now(),
    }
}

fn log_files(dir: &Path) -> Vec<(String, String)> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, std::fs::read_to_string(&path).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn entries_are_appended_in_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = FileOutcomeLog::open(dir.path(), LogStream::Cdr, 1024 * 1024).await?;

    log.record(outcome("NM1", None, Some("network connection failed: refused")));
    log.record(outcome("NM1", Some(200), None));
    log.flush().await;

    let files = log_files(dir.path());
    assert_eq!(files.len(), 1);

    let (name, content) = &files[0];
    assert!(name.starts_with("push_cdr_") && name.ends_with("_0.log"), "unexpected name {name}");
    assert_eq!(content.matches("CallID: NM1").count(), 2);
    assert!(content.contains("StatusCode: 0\nError: network connection failed: refused\n"));
    assert!(content.contains("StatusCode: 200\n----"));
    assert!(content.find("StatusCode: 0").unwrap() < content.find("StatusCode: 200").unwrap());
    Ok(())
}

#[tokio::test]
async fn rotates_once_file_exceeds_limit() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = FileOutcomeLog::open(dir.path(), LogStream::Status, 16).await?;

    for call in ["NM1", "NM2", "NM3"] {
        log.record(outcome(call, Some(200), None));
    }
    log.flush().await;

    let files = log_files(dir.path());
    assert_eq!(files.len(), 3, "each entry overflows the limit: {files:?}");
    assert!(files.iter().all(|(name, _)| name.starts_with("push_status_")));

    let mut calls: Vec<_> = files
        .iter()
        .map(|(_, content)| content.lines().next().unwrap().split("CallID: ").nth(1).unwrap())
        .collect();
    calls.sort_unstable();
    assert_eq!(calls, vec!["NM1", "NM2", "NM3"]);
    Ok(())
}

#[tokio::test]
async fn open_creates_missing_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let nested = dir.path().join("logs").join("push");

    let log = FileOutcomeLog::open(&nested, LogStream::Cdr, 1024).await?;
    log.flush().await;

    assert!(nested.is_dir());
    assert_eq!(log.stream(), LogStream::Cdr);
    Ok(())
}
