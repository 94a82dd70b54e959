//! Session initialisation, playback start, fallback and stop.

mod common;

use std::sync::atomic::Ordering;

use bytes::Bytes;
use player_core::{AudioBlob, AudioFormat, PlaybackOutcome};

use common::*;

#[tokio::test]
async fn test_initialize_creates_context_once() {
    let h = harness(DecodeMode::Accept);

    let first = h.player.initialize().await.unwrap();
    let second = h.player.initialize().await.unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(h.probe.created.load(Ordering::SeqCst), 1);
    assert_eq!(h.probe.resumed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_initialize_resumes_suspended_context_once() {
    let h = HarnessBuilder::new(DecodeMode::Accept).suspended().build();

    h.player.initialize().await.unwrap();
    h.player.initialize().await.unwrap();

    assert_eq!(h.probe.created.load(Ordering::SeqCst), 1);
    assert_eq!(h.probe.resumed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_without_playback_is_noop() {
    let h = harness(DecodeMode::Accept);

    h.player.stop();
    h.player.stop();

    assert!(!h.player.is_playing());
    assert_eq!(h.probe.stopped.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_releases_handle_once() {
    let h = harness(DecodeMode::Accept);
    h.player
        .start_streaming(vec![Bytes::from(vec![0u8; 64])], &AudioFormat::Wav)
        .await;
    assert!(h.player.is_playing());
    assert!(h.player.is_sounding());

    h.player.stop();
    h.player.stop();

    assert!(!h.player.is_playing());
    assert!(!h.player.is_sounding());
    assert_eq!(h.probe.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_decoded_playback_presents_without_playing_blob() {
    let h = harness(DecodeMode::Accept);
    let chunks = vec![Bytes::from_static(b"abc"), Bytes::from_static(b"def")];

    let outcome = h.player.start_streaming(chunks, &AudioFormat::Wav).await;

    assert!(outcome.is_decoded());
    assert_eq!(h.probe.started.load(Ordering::SeqCst), 1);
    let presented = h.sink.presented();
    assert_eq!(presented.len(), 1);
    assert_eq!(&presented[0].bytes[..], b"abcdef");
    assert_eq!(presented[0].mime, "audio/wav");
    assert_eq!(h.sink.plays(), 0);
}

#[tokio::test]
async fn test_malformed_audio_falls_back_to_blob() {
    let h = harness(DecodeMode::Real);
    let garbage = vec![Bytes::from_static(b"not audio "), Bytes::from_static(b"at all")];

    let outcome = h.player.start_streaming(garbage, &AudioFormat::Wav).await;

    assert!(matches!(outcome, PlaybackOutcome::RawFallback { .. }));
    assert!(h.player.is_playing());
    assert_eq!(h.probe.started.load(Ordering::SeqCst), 0);
    let presented = h.sink.presented();
    assert_eq!(presented.len(), 1);
    assert_eq!(&presented[0].bytes[..], b"not audio at all");
    assert_eq!(h.sink.plays(), 1);

    let snapshot = h.player.metrics().snapshot();
    assert_eq!(snapshot.fallback_playbacks, 1);
    assert_eq!(snapshot.decoded_playbacks, 0);
}

#[tokio::test]
async fn test_rejected_decode_reason_is_reported() {
    let h = harness(DecodeMode::Reject);

    let outcome = h
        .player
        .start_streaming(vec![Bytes::from(vec![0u8; 10])], &AudioFormat::Wav)
        .await;

    match outcome {
        PlaybackOutcome::RawFallback { reason } => assert!(reason.contains("mock rejects")),
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unsupported_format_keeps_its_mime() {
    let h = harness(DecodeMode::Real);

    let outcome = h
        .player
        .start_streaming(
            vec![Bytes::from_static(b"ID3....")],
            &AudioFormat::Other("audio/mpeg".to_string()),
        )
        .await;

    assert!(!outcome.is_decoded());
    assert_eq!(h.sink.presented()[0].mime, "audio/mpeg");
}

#[tokio::test]
async fn test_play_blob_presents_then_plays() {
    let h = harness(DecodeMode::Accept);

    h.player.play_blob(&AudioBlob::new(vec![1u8, 2, 3], "audio/wav"));

    assert_eq!(h.sink.presented().len(), 1);
    assert_eq!(h.sink.plays(), 1);
    assert!(h.probe.decoded().is_empty());
}

#[tokio::test]
async fn test_new_playback_supersedes_previous() {
    let h = harness(DecodeMode::Accept);

    h.player
        .start_streaming(vec![Bytes::from(vec![0u8; 8])], &AudioFormat::Wav)
        .await;
    h.player
        .start_streaming(vec![Bytes::from(vec![0u8; 8])], &AudioFormat::Wav)
        .await;

    assert_eq!(h.probe.started.load(Ordering::SeqCst), 2);
    assert_eq!(h.probe.stopped.load(Ordering::SeqCst), 1);
}
