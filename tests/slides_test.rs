//! End-to-end tests for slide decks.

mod common;

use std::path::Path;

use common::*;
use docingest::{IngestBatch, IngestInput, IngestOptions, Ingestor, InputStatus, UnitKind};

fn deck() -> Vec<u8> {
    build_deck(&[
        (&["Quarterly results"][..], Some("Mention the Q3 dip")),
        (&["Next steps", "Hire two engineers"][..], None),
    ])
}

fn ingestor(root: &Path, rendered_pages: usize) -> (Ingestor, std::sync::Arc<MockRasterizer>) {
    let (caps, rasterizer) = mock_capabilities(MockDescriber::new("", "a chart"), rendered_pages);
    let ingestor = Ingestor::builder()
        .with_options(IngestOptions::new().with_working_root(root))
        .with_capabilities(caps)
        .build();
    (ingestor, rasterizer)
}

#[tokio::test]
async fn test_one_unit_per_slide() {
    let root = tempfile::tempdir().unwrap();
    let (ingestor, rasterizer) = ingestor(root.path(), 2);
    let batch = IngestBatch::new("c", "i").with_input(IngestInput::from_named_bytes(deck(), "review.pptx"));

    let outcome = ingestor.ingest(batch).await.unwrap();
    assert_eq!(outcome.reports[0].status, InputStatus::Completed { units: 2 });
    assert_eq!(outcome.units.len(), 2);

    let first = &outcome.units[0];
    assert_eq!(first.kind, UnitKind::Image);
    assert_eq!(first.page_number, Some(0));
    assert_eq!(first.provenance.source, "review.pptx");
    assert_eq!(first.text, "This is a slide with the text: Quarterly results");
    assert_eq!(
        first.caption.as_deref(),
        Some("Quarterly results\n\nThe speaker notes for this slide are: Mention the Q3 dip")
    );
    let png = first.artifact_paths[0].file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(png, "review_0000.png");

    let second = &outcome.units[1];
    assert_eq!(second.page_number, Some(1));
    assert_eq!(
        second.text,
        "This is a slide with the text: Next steps Hire two engineers"
    );
    assert_eq!(second.caption.as_deref(), Some("Next steps Hire two engineers"));

    // Whole-page renders of the converted deck
    let calls = rasterizer.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(path, _, clip)| {
        clip.is_none() && path.extension().is_some_and(|e| e == "pdf")
    }));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_page_count_mismatch_fails_deck_only() {
    let root = tempfile::tempdir().unwrap();
    let (ingestor, rasterizer) = ingestor(root.path(), 3);
    let batch = IngestBatch::new("c", "i")
        .with_input(IngestInput::from_named_bytes(deck(), "review.pptx"))
        .with_input(IngestInput::from_named_bytes(b"still here".to_vec(), "after.txt"));

    let outcome = ingestor.ingest(batch).await.unwrap();
    match &outcome.reports[0].status {
        InputStatus::Failed { reason } => {
            assert_eq!(reason, "Slide deck rendered 3 pages but contains 2 slides")
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(outcome.reports[1].is_success());
    assert_eq!(outcome.units.len(), 1);
    assert_eq!(outcome.units[0].text, "still here");

    // Nothing is rendered for a deck that fails the count check
    assert!(rasterizer.calls.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_same_named_decks_do_not_collide() {
    let root = tempfile::tempdir().unwrap();
    let (ingestor, _) = ingestor(root.path(), 2);
    let batch = IngestBatch::new("c", "i")
        .with_input(IngestInput::from_named_bytes(deck(), "review.pptx"))
        .with_input(IngestInput::from_named_bytes(deck(), "review.pptx"));

    let outcome = ingestor.ingest(batch).await.unwrap();
    assert_eq!(outcome.succeeded(), 2);
    assert_eq!(outcome.units.len(), 4);

    let first = &outcome.units[0].artifact_paths[0];
    let third = &outcome.units[2].artifact_paths[0];
    assert_eq!(first.file_name(), third.file_name());
    assert_ne!(first.parent(), third.parent());
}
