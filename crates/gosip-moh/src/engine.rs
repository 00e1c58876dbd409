//! Pace-based MOH emitter, per spec.md §4.7. Streams are addressable by
//! Call-ID; `stop_all` tears every stream down (used on server shutdown).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::watch;
use tracing::debug;

use crate::rtp::{RtpPacket, FRAME_BYTES, TIMESTAMP_INCREMENT};
use crate::source;

const TICK: Duration = Duration::from_millis(20);

/// Sink a caller provides to receive framed RTP packets for a held call;
/// actually writing them to a socket is outside this crate's scope.
pub trait FrameSink: Send + Sync + 'static {
    fn send_frame(&self, call_id: &str, packet: &[u8]);
}

struct StreamHandle {
    stop_tx: watch::Sender<bool>,
}

/// Call-ID-indexed table of active MOH emitters.
#[derive(Default)]
pub struct MohEngine {
    streams: DashMap<String, StreamHandle>,
}

impl MohEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts emitting paced RTP frames for `call_id`, looping the
    /// loaded (or synthesised) audio buffer until `stop` is called.
    /// Replaces any existing stream for the same Call-ID.
    pub fn start(
        &self,
        call_id: String,
        audio_path: Option<PathBuf>,
        sink: Arc<dyn FrameSink>,
    ) {
        self.stop(&call_id);

        let samples = match audio_path {
            Some(path) => source::load(&path),
            None => source::synth_silence(),
        };
        let frames: Vec<Vec<u8>> = samples
            .chunks(FRAME_BYTES)
            .map(|chunk| {
                if chunk.len() == FRAME_BYTES {
                    chunk.to_vec()
                } else {
                    let mut padded = chunk.to_vec();
                    padded.resize(FRAME_BYTES, 0xFF);
                    padded
                }
            })
            .collect();
        let frames = if frames.is_empty() {
            vec![vec![0xFFu8; FRAME_BYTES]]
        } else {
            frames
        };

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let ssrc: u32 = rand::thread_rng().gen();
        let id_for_task = call_id.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK);
            let mut seq: u16 = 0;
            let mut timestamp: u32 = 0;
            let mut frame_idx = 0usize;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let payload = frames[frame_idx % frames.len()].clone();
                        let packet = RtpPacket::new(seq, timestamp, ssrc, payload);
                        sink.send_frame(&id_for_task, &packet.serialize());
                        seq = seq.wrapping_add(1);
                        timestamp = timestamp.wrapping_add(TIMESTAMP_INCREMENT);
                        frame_idx += 1;
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(call_id = %id_for_task, "moh stream stopped");
        });

        self.streams.insert(call_id, StreamHandle { stop_tx });
    }

    /// Signals the emitter for `call_id` to exit. No-op if not streaming.
    pub fn stop(&self, call_id: &str) {
        if let Some((_, handle)) = self.streams.remove(call_id) {
            let _ = handle.stop_tx.send(true);
        }
    }

    pub fn stop_all(&self) {
        let ids: Vec<String> = self.streams.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.stop(&id);
        }
    }

    pub fn is_active(&self, call_id: &str) -> bool {
        self.streams.contains_key(call_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);
    impl FrameSink for CountingSink {
        fn send_frame(&self, _call_id: &str, _packet: &[u8]) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_frames_while_active_and_stops() {
        let engine = MohEngine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(CountingSink(count.clone()));

        engine.start("call-1".into(), None, sink);
        assert!(engine.is_active("call-1"));

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(count.load(Ordering::SeqCst) >= 4);

        engine.stop("call-1");
        assert!(!engine.is_active("call-1"));
    }
}
