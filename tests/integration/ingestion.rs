//! Upload-boundary behavior: byte recovery, format detection, and the
//! combined ingest entry point.

use cadence::codec::{self, tabular, tree, SourceFormat};
use cadence::encoding::recover;
use cadence::error::Error;

use crate::fixtures::{header, sample_schedule};

#[test]
fn ingest_generated_tabular_bytes() {
    let text = tabular::generate(&sample_schedule(), &header());
    let parsed = codec::ingest(text.as_bytes(), "rollout.xer").unwrap();
    assert_eq!(parsed.meta.format, SourceFormat::Tabular);
    assert_eq!(parsed.meta.activities, 3);
    assert!(parsed.meta.total_duration_days > 0.0);
}

#[test]
fn ingest_generated_tree_bytes() {
    let text = tree::generate(&sample_schedule(), &header());
    let parsed = codec::ingest(text.as_bytes(), "rollout.xml").unwrap();
    assert_eq!(parsed.meta.format, SourceFormat::Tree);
    assert_eq!(parsed.meta.activities, 3);
    assert_eq!(parsed.meta.wbs_nodes, 2);
}

#[test]
fn ingest_recovers_windows_1252_task_names() {
    // A curly-quoted task name exported as Windows-1252: invalid UTF-8,
    // no declaration to lean on.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%T\tTASK\n%F\ttask_id\ttask_code\ttask_name\n");
    bytes.extend_from_slice(b"%R\t1\tA\t\x93Soft launch\x94\n%E\n");

    let parsed = codec::ingest(&bytes, "legacy.xer").unwrap();
    assert_eq!(
        parsed.schedule.activities[0].name,
        "\u{201C}Soft launch\u{201D}"
    );
}

#[test]
fn ingest_honors_declared_xml_encoding() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>");
    bytes.extend_from_slice(b"<Project><Name>Expansi\xF3n</Name></Project>");

    let parsed = codec::ingest(&bytes, "plan.xml").unwrap();
    assert_eq!(parsed.schedule.name, "Expansión");
}

#[test]
fn ingest_rejects_unknown_formats() {
    let result = codec::ingest(b"just some notes", "notes.txt");
    assert!(matches!(result, Err(Error::UnknownFormat(_))));
}

#[test]
fn ingest_propagates_structural_failures() {
    let result = codec::ingest(b"ERMHDR\t1.0\n%T\tPROJECT\n%F\tproj_id\n%R\t1\n%E\n", "x.xer");
    assert!(matches!(result, Err(Error::MissingTable(t)) if t == "TASK"));
}

#[test]
fn recover_is_total_over_arbitrary_bytes() {
    for chunk in [
        &[0xFF, 0xFE, 0x00, 0x80][..],
        &[0x93][..],
        &[][..],
        &[0xC3][..], // truncated UTF-8 sequence
    ] {
        let text = recover(chunk, "anything.bin");
        assert_eq!(text.chars().count(), chunk.len());
    }
}
