//! Streaming ingestion.
//!
//! The read loop appends every chunk in arrival order and fires playback
//! once, the first time the buffered length goes past the threshold. A
//! stream that never gets that far is played once it ends. Bytes that
//! arrive after playback has started are still read and buffered, but the
//! running playback never sees them.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures_util::{pin_mut, Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::context::AudioContext;
use crate::error::PlayerError;
use crate::format::AudioFormat;
use crate::player::{lock, PlaybackOutcome, Session};

/// Buffered bytes that must be exceeded before early playback starts.
pub const TRIGGER_THRESHOLD: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Streamed,
    WholeBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Threshold,
    EndOfStream,
}

/// When playback was dispatched, and with how much data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub bytes: usize,
    pub chunks: usize,
}

/// Summary of one stream session.
#[derive(Debug)]
pub struct StreamReport {
    pub mode: InputMode,
    pub chunks: usize,
    pub total_bytes: usize,
    pub trigger: Option<Trigger>,
    /// Bytes read after playback was dispatched; these are not played.
    pub late_bytes: usize,
    pub playback: Option<JoinHandle<PlaybackOutcome>>,
}

impl StreamReport {
    /// Wait for the dispatched playback task, if there was one.
    pub async fn wait_playback(&mut self) -> Option<PlaybackOutcome> {
        let handle = self.playback.take()?;
        handle.await.ok()
    }
}

/// Join chunks into one contiguous buffer, in order.
pub fn concat_chunks(chunks: &[Bytes]) -> Bytes {
    if chunks.len() == 1 {
        return chunks[0].clone();
    }
    let total = chunks.iter().map(Bytes::len).sum();
    let mut combined = BytesMut::with_capacity(total);
    for chunk in chunks {
        combined.extend_from_slice(chunk);
    }
    combined.freeze()
}

impl<C: AudioContext> Session<C> {
    pub(crate) async fn read_stream<S, E>(
        self: &Arc<Self>,
        stream: S,
        format: AudioFormat,
        started: Instant,
    ) -> Result<StreamReport, PlayerError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<PlayerError>,
    {
        self.begin();
        pin_mut!(stream);

        let threshold = self.options.threshold;
        let mut total_bytes = 0usize;
        let mut count = 0usize;
        let mut late_bytes = 0usize;
        let mut trigger = None;
        let mut playback = None;

        while let Some(item) = stream.next().await {
            let chunk = item.map_err(Into::into)?;
            let len = chunk.len();
            total_bytes += len;
            count += 1;
            self.metrics.record_bytes(len);

            let snapshot = {
                let mut chunks = lock(&self.chunks);
                chunks.push(chunk);
                let armed = trigger.is_none()
                    && total_bytes > threshold
                    && !self.is_playing.load(Ordering::Acquire);
                armed.then(|| chunks.clone())
            };

            if trigger.is_some() {
                late_bytes += len;
                continue;
            }

            if let Some(chunks) = snapshot {
                if let Some(handle) = self.dispatch(chunks, &format) {
                    debug!("Threshold crossed at {} bytes, starting playback", total_bytes);
                    self.metrics.record_trigger(started.elapsed().as_millis() as u64);
                    trigger = Some(Trigger {
                        kind: TriggerKind::Threshold,
                        bytes: total_bytes,
                        chunks: count,
                    });
                    playback = Some(handle);
                }
            }
        }

        if trigger.is_none() {
            let chunks = lock(&self.chunks).clone();
            if let Some(handle) = self.dispatch(chunks, &format) {
                debug!("Stream ended below threshold, playing {} bytes", total_bytes);
                self.metrics.record_trigger(started.elapsed().as_millis() as u64);
                trigger = Some(Trigger {
                    kind: TriggerKind::EndOfStream,
                    bytes: total_bytes,
                    chunks: count,
                });
                playback = Some(handle);
            }
        }

        if late_bytes > 0 {
            debug!("{} bytes arrived after playback started and were not played", late_bytes);
            self.metrics.record_late_bytes(late_bytes);
        }
        info!("Stream complete: {} chunks, {} bytes", count, total_bytes);

        Ok(StreamReport {
            mode: InputMode::Streamed,
            chunks: count,
            total_bytes,
            trigger,
            late_bytes,
            playback,
        })
    }
}
