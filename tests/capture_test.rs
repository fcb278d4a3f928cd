//! Single-shot capture pipeline against a scripted viewer


use parcelshot::capture::NO_CONTEXT_MESSAGE;
use parcelshot::error::CaptureError;
use parcelshot::sequence::SequenceSource;
use parcelshot::settings::Settings;
use scripted_viewer::{service, ScriptedViewer};
use std::sync::Arc;

#[tokio::test]
async fn test_capture_names_file_after_parcel() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = Arc::new(ScriptedViewer::single("F24ABC-1-2", 10).starting_at(4));
    let service = service(viewer.clone(), Settings::default(), dir.path());

    let record = service.capture().await.unwrap();

    assert_eq!(record.relative_path, "F24/F24ABC/F24ABC-1-2.png");
    assert_eq!(record.context.parcel_id, "F24ABC-1-2");
    assert_eq!(record.context.project_id, "F24ABC");
    assert_eq!((record.sequence.current, record.sequence.total), (4, 10));
    assert!(record.sequence.source.is_ratio());

    let saved = std::fs::read(dir.path().join("F24/F24ABC/F24ABC-1-2.png")).unwrap();
    assert_eq!(saved.len(), record.saved.size_bytes);
    assert_eq!(record.saved.hash.len(), 64);
}

#[tokio::test]
async fn test_custom_output_root_is_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = Arc::new(ScriptedViewer::single("F24ABC-1-2", 10));
    let settings = Settings {
        output_root: r"exports\\2024//".to_string(),
        ..Settings::default()
    };
    let service = service(viewer, settings, dir.path());

    let record = service.capture().await.unwrap();
    assert_eq!(record.relative_path, "exports/2024/F24ABC/F24ABC-1-2.png");
}

#[tokio::test]
async fn test_blank_frames_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = Arc::new(ScriptedViewer::single("F24ABC-1-2", 10).with_blank_frames(2));
    let service = service(viewer.clone(), Settings::default(), dir.path());

    let record = service.capture().await.unwrap();

    assert!(!parcelshot::capture::is_blank_png(
        &std::fs::read(&record.saved.path).unwrap()
    ));
    assert_eq!(viewer.with_log(|log| log.viewport_captures), 3);
    assert_eq!(viewer.with_log(|log| (log.attaches, log.detaches)), (1, 1));
}

#[tokio::test]
async fn test_persistently_blank_frame_is_still_saved() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = Arc::new(ScriptedViewer::single("F24ABC-1-2", 10).with_blank_frames(10));
    let service = service(viewer.clone(), Settings::default(), dir.path());

    let record = service.capture().await.unwrap();

    assert!(parcelshot::capture::is_blank_png(
        &std::fs::read(&record.saved.path).unwrap()
    ));
    assert_eq!(viewer.with_log(|log| log.viewport_captures), 3);
    assert_eq!(viewer.with_log(|log| (log.attaches, log.detaches)), (1, 1));
}

#[tokio::test]
async fn test_transport_failure_detaches_and_saves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = Arc::new(ScriptedViewer::single("F24ABC-1-2", 10).failing_captures(1));
    let service = service(viewer.clone(), Settings::default(), dir.path());

    let result = service.capture().await;

    assert!(matches!(result, Err(CaptureError::Transport(_))));
    assert_eq!(viewer.with_log(|log| (log.attaches, log.detaches)), (1, 1));
    assert_eq!(viewer.with_log(|log| log.viewport_captures), 1);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    assert!(viewer.toasts().iter().any(|t| t.starts_with("截图失败")));

    // The session is free again for the next attempt
    let record = service.capture().await.unwrap();
    assert_eq!(record.relative_path, "F24/F24ABC/F24ABC-1-2.png");
    assert_eq!(viewer.with_log(|log| (log.attaches, log.detaches)), (2, 2));
}

#[tokio::test]
async fn test_missing_identifier_aborts_with_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = Arc::new(ScriptedViewer::single("", 10));
    let service = service(viewer.clone(), Settings::default(), dir.path());

    let result = service.capture().await;

    assert!(matches!(result, Err(CaptureError::NoContext)));
    assert_eq!(viewer.toasts(), vec![NO_CONTEXT_MESSAGE.to_string()]);
    assert_eq!(viewer.with_log(|log| log.attaches), 0);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_untrusted_forward_jump_is_smoothed() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = Arc::new(ScriptedViewer::single("F24ABC-1-2", 10).starting_at(2));
    let service = service(viewer.clone(), Settings::default(), dir.path());

    let first = service.capture().await.unwrap();
    assert_eq!(first.sequence.current, 2);

    viewer.show_image(6);
    let second = service.capture().await.unwrap();
    assert_eq!(second.sequence.current, 3);
    assert_eq!(second.sequence.source, SequenceSource::StabilizedForward);
    assert_eq!(second.context.current, 3);

    service.reset_memory().await;
    let third = service.capture().await.unwrap();
    assert_eq!(third.sequence.current, 6);
}

#[tokio::test]
async fn test_unknown_position_falls_back_to_first() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = Arc::new(ScriptedViewer::single("F24ABC-1-2", 10).hide_counter());
    let service = service(viewer, Settings::default(), dir.path());

    let record = service.capture().await.unwrap();
    assert_eq!(record.sequence.current, 1);
    assert_eq!(record.sequence.total, 0);
}
