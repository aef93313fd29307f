//! FrameSampler - per-frame sampling and gating
//!
//! ## Responsibilities
//!
//! - Copy each newly presented frame into one reusable buffer
//! - Run the gate, and the decoder only when the gate passes
//! - Keep sampling counters for diagnostics
//!
//! Pacing is the caller's job: one `tick` per presented frame.

mod gate;

pub use gate::{AlwaysDecode, DarkPixelGate, FrameGate, GateDecision};

use std::sync::Arc;

use serde::Serialize;

use crate::capture::{FrameBuffer, VideoStream};
use crate::decoder::{Candidate, DecodeOptions, DecoderError, LazyDecoder};

/// Outcome of one sampling tick
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Stream had no frame newer than the last one
    NoNewFrame,
    /// Gate rejected the frame; decoder not invoked
    Gated { signal: f32 },
    /// Decoder ran and found nothing
    NoCandidate { signal: f32 },
    /// Decoder could not be loaded; try again next frame
    DecoderUnavailable(DecoderError),
    Candidate(Candidate),
}

/// Sampling counters
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SamplerStats {
    pub ticks: u64,
    pub sampled: u64,
    pub gated: u64,
    pub decoded: u64,
}

/// Per-session frame sampler
pub struct FrameSampler {
    buffer: FrameBuffer,
    gate: Arc<dyn FrameGate>,
    options: DecodeOptions,
    stats: SamplerStats,
}

impl FrameSampler {
    pub fn new(gate: Arc<dyn FrameGate>, options: DecodeOptions) -> Self {
        Self {
            buffer: FrameBuffer::new(),
            gate,
            options,
            stats: SamplerStats::default(),
        }
    }

    /// Sample the stream's current frame once
    pub async fn tick<S: VideoStream>(&mut self, stream: &mut S, decoder: &LazyDecoder) -> Tick {
        self.stats.ticks += 1;
        if !stream.has_new_frame() {
            return Tick::NoNewFrame;
        }

        stream.read_frame(&mut self.buffer);
        self.stats.sampled += 1;

        let decision = self.gate.evaluate(&self.buffer);
        if !decision.pass {
            self.stats.gated += 1;
            return Tick::Gated {
                signal: decision.signal,
            };
        }

        let decoder = match decoder.get().await {
            Ok(decoder) => decoder,
            Err(e) => return Tick::DecoderUnavailable(e),
        };

        self.stats.decoded += 1;
        match decoder.decode(
            self.buffer.pixels(),
            self.buffer.width(),
            self.buffer.height(),
            &self.options,
        ) {
            Some(candidate) => Tick::Candidate(candidate),
            None => Tick::NoCandidate {
                signal: decision.signal,
            },
        }
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureBackend;
    use crate::testing::{CountingDecoder, MockBackend, BRIGHT, DARK};

    async fn sample_once(frame: [u8; 4]) -> (Tick, Arc<CountingDecoder>) {
        let backend = MockBackend::new(vec![FrameBuffer::filled(32, 32, frame)]);
        let mut stream = backend.acquire(&Default::default()).await.unwrap();
        let counting = Arc::new(CountingDecoder::returning(Some("29901010112345")));
        let decoder = LazyDecoder::ready(counting.clone());
        let mut sampler = FrameSampler::new(Arc::new(DarkPixelGate::default()), DecodeOptions::default());

        assert!(stream.presented().await);
        (sampler.tick(&mut stream, &decoder).await, counting)
    }

    #[tokio::test]
    async fn test_bright_frame_skips_decoder() {
        let (tick, decoder) = sample_once(BRIGHT).await;
        assert!(matches!(tick, Tick::Gated { .. }));
        assert_eq!(decoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_dark_frame_is_decoded() {
        let (tick, decoder) = sample_once(DARK).await;
        assert_eq!(
            tick,
            Tick::Candidate(Candidate {
                data: "29901010112345".to_string()
            })
        );
        assert_eq!(decoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_new_frame_is_not_resampled() {
        let backend = MockBackend::new(vec![FrameBuffer::filled(8, 8, DARK)]);
        let mut stream = backend.acquire(&Default::default()).await.unwrap();
        let counting = Arc::new(CountingDecoder::returning(None));
        let decoder = LazyDecoder::ready(counting.clone());
        let mut sampler = FrameSampler::new(Arc::new(DarkPixelGate::default()), DecodeOptions::default());

        stream.presented().await;
        assert!(matches!(sampler.tick(&mut stream, &decoder).await, Tick::NoCandidate { .. }));
        assert_eq!(sampler.tick(&mut stream, &decoder).await, Tick::NoNewFrame);

        let stats = sampler.stats();
        assert_eq!((stats.ticks, stats.sampled, stats.decoded), (2, 1, 1));
        assert_eq!(counting.calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_decoder_reported_per_tick() {
        let backend = MockBackend::new(vec![FrameBuffer::filled(8, 8, DARK)]);
        let mut stream = backend.acquire(&Default::default()).await.unwrap();
        let decoder = LazyDecoder::new(|| async {
            Err(DecoderError::Unavailable("offline".to_string()))
        });
        let mut sampler = FrameSampler::new(Arc::new(DarkPixelGate::default()), DecodeOptions::default());

        for _ in 0..2 {
            stream.presented().await;
            assert!(matches!(
                sampler.tick(&mut stream, &decoder).await,
                Tick::DecoderUnavailable(_)
            ));
        }
        assert_eq!(decoder.load_attempts(), 2);
    }
}
