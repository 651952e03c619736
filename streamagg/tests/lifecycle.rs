#[macro_use]
extern crate hamcrest;

mod common;

use std::io::Write;

use common::{read_in_chunks, TrackedReader};
use hamcrest::prelude::*;
use streamagg::{Aggregate, AggregateError, Length, Mode, Source, StateError, TextEncoding};
use url::Url;

fn file_with(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

// --------------------------------------------------------------------
// Length accounting
//

#[test]
fn test_length_is_sum_of_declared_lengths() {
    let file = file_with(b"12345");
    let aggregate = Aggregate::new();
    assert_that!(aggregate.length(), is(equal_to(Length::Known(0))));

    aggregate.add_buffer(b"abc".to_vec()).unwrap();
    aggregate.add_string("é", TextEncoding::Utf8).unwrap();
    aggregate.add_string("xy", TextEncoding::Utf16Le).unwrap();
    aggregate.add_file(file.path()).unwrap();
    let (stream, _) = TrackedReader::new(b"zz");
    aggregate.add_stream(stream, 2).unwrap();

    assert_that!(aggregate.length(), is(equal_to(Length::Known(3 + 2 + 4 + 5 + 2))));
    assert_that!(aggregate.source_count(), is(equal_to(5)));
}

#[test]
fn test_unknown_length_is_permanent() {
    for unknown_at in 0..3 {
        let aggregate = Aggregate::new();
        for i in 0..3 {
            if i == unknown_at {
                let (stream, _) = TrackedReader::new(b"?");
                aggregate.add_stream_unknown_length(stream).unwrap();
            } else {
                aggregate.add_buffer(b"known".to_vec()).unwrap();
            }
        }
        assert_that!(aggregate.length(), is(equal_to(Length::Unknown)));
        assert_that!(aggregate.length().as_i64(), is(equal_to(-1)));
    }
}

#[test]
fn test_file_length_is_taken_at_add_time() {
    let mut file = file_with(b"four");
    let aggregate = Aggregate::new();
    aggregate.add_file(file.path()).unwrap();

    file.write_all(b" more").unwrap();
    file.flush().unwrap();
    assert_that!(aggregate.length(), is(equal_to(Length::Known(4))));
}

// --------------------------------------------------------------------
// Build phase
//

#[test]
fn test_invalid_file_leaves_aggregate_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let aggregate = Aggregate::new();
    aggregate.add_buffer(b"ok".to_vec()).unwrap();

    let err = aggregate.add_file(dir.path().join("missing.bin")).unwrap_err();
    assert!(matches!(err, AggregateError::InvalidSource { .. }));
    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));

    assert!(aggregate.add_file(dir.path()).is_err());
    assert!(aggregate.error().is_none());
    assert_that!(aggregate.source_count(), is(equal_to(1)));
    assert_that!(aggregate.length(), is(equal_to(Length::Known(2))));
    assert_eq!(aggregate.all_output().unwrap(), b"ok");
}

#[test]
fn test_unencodable_string_is_rejected() {
    let aggregate = Aggregate::new();
    assert!(aggregate.add_string("price: €5", TextEncoding::Latin1).is_err());
    assert_that!(aggregate.source_count(), is(equal_to(0)));
}

#[test]
fn test_add_file_url() {
    let file = file_with(b"via url");
    let aggregate = Aggregate::new();
    let url = Url::from_file_path(file.path()).unwrap();
    aggregate.add_file_url(&url).unwrap();

    let http = Url::parse("https://example.com/file.txt").unwrap();
    assert!(matches!(
        aggregate.add_file_url(&http),
        Err(AggregateError::InvalidSource { .. })
    ));

    assert_eq!(aggregate.all_output().unwrap(), b"via url");
}

#[test]
fn test_add_after_open_is_state_error() {
    let aggregate = Aggregate::new();
    aggregate.add_buffer(b"a".to_vec()).unwrap();
    let _reader = aggregate.open_for_input_stream().unwrap();

    let file = file_with(b"late");
    assert!(matches!(
        aggregate.add_buffer(b"b".to_vec()),
        Err(AggregateError::State(StateError::AlreadyOpen))
    ));
    assert!(matches!(
        aggregate.add_file(file.path()),
        Err(AggregateError::State(StateError::AlreadyOpen))
    ));
    assert!(matches!(
        aggregate.add_source(Source::buffer("c")),
        Err(AggregateError::State(StateError::AlreadyOpen))
    ));
    assert_that!(aggregate.source_count(), is(equal_to(1)));
    assert_that!(aggregate.length(), is(equal_to(Length::Known(1))));
}

// --------------------------------------------------------------------
// Opening and closing
//

#[test]
fn test_pull_then_push_fails() {
    let aggregate = Aggregate::new();
    let _reader = aggregate.open_for_input_stream().unwrap();
    assert_eq!(aggregate.mode(), Some(Mode::Pull));

    assert!(matches!(
        aggregate.open_for_output_to(Vec::<u8>::new()),
        Err(AggregateError::State(StateError::AlreadyOpen))
    ));
    assert!(matches!(
        aggregate.open_for_input_stream(),
        Err(AggregateError::State(StateError::AlreadyOpen))
    ));
}

#[test]
fn test_push_then_pull_fails() {
    let aggregate = Aggregate::new();
    let _adapter = aggregate.open_for_output_to(Vec::<u8>::new()).unwrap();
    assert_eq!(aggregate.mode(), Some(Mode::Push));

    assert!(matches!(
        aggregate.open_for_input_stream(),
        Err(AggregateError::State(StateError::AlreadyOpen))
    ));
    assert!(matches!(
        aggregate.all_output(),
        Err(AggregateError::State(StateError::AlreadyOpen))
    ));
}

#[test]
fn test_closed_aggregate_cannot_reopen() {
    let aggregate = Aggregate::new();
    aggregate.close();
    assert!(matches!(
        aggregate.open_for_input_stream(),
        Err(AggregateError::State(StateError::Closed))
    ));
    assert!(matches!(
        aggregate.add_buffer(b"x".to_vec()),
        Err(AggregateError::State(StateError::Closed))
    ));
}

#[test]
fn test_close_releases_every_source() {
    let first = file_with(b"first file");
    let second = file_with(b"second file");
    let aggregate = Aggregate::new();
    aggregate.add_file(first.path()).unwrap();
    aggregate.add_file(second.path()).unwrap();
    let (stream, probe) = TrackedReader::new(b"stream");
    aggregate.add_stream(stream, 6).unwrap();
    aggregate.add_buffer(b"buffer".to_vec()).unwrap();

    let mut reader = aggregate.open_for_input_stream().unwrap();
    let mut buf = [0u8; 3];
    reader.read(&mut buf).unwrap();
    assert_that!(aggregate.open_source_count(), is(equal_to(4)));

    aggregate.close();
    assert_that!(aggregate.open_source_count(), is(equal_to(0)));
    assert!(probe.dropped());
    assert!(!aggregate.is_open());

    // Second close is a no-op
    aggregate.close();
    assert!(aggregate.is_closed());
}

#[test]
fn test_dropping_unopened_aggregate_releases_streams() {
    let (stream, probe) = TrackedReader::new(b"never read");
    {
        let aggregate = Aggregate::new();
        aggregate.add_stream_unknown_length(stream).unwrap();
    }
    assert!(probe.dropped());
    assert_eq!(probe.reads(), 0);
}

#[test]
fn test_files_read_in_order() {
    let a = file_with(b"alpha ");
    let b = file_with(b"");
    let c = file_with(b"gamma");
    let aggregate = Aggregate::new();
    aggregate.add_file(a.path()).unwrap();
    aggregate.add_file(b.path()).unwrap();
    aggregate.add_file(c.path()).unwrap();

    let mut reader = aggregate.open_for_input_stream().unwrap();
    assert_eq!(read_in_chunks(&mut reader, 4), b"alpha gamma");
    assert_that!(aggregate.bytes_delivered(), is(equal_to(11)));
}

#[test]
fn test_file_removed_after_add_fails_on_read() {
    let file = file_with(b"gone soon");
    let path = file.path().to_path_buf();
    let aggregate = Aggregate::new();
    aggregate.add_buffer(b"head".to_vec()).unwrap();
    aggregate.add_file(&path).unwrap();
    drop(file);

    let mut reader = aggregate.open_for_input_stream().unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(reader.read(&mut buf).unwrap(), 4);
    let err = reader.read(&mut buf).unwrap_err();
    assert!(matches!(err, AggregateError::Read { index: 1, .. }));
    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
}
