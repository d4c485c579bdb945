//! # Media-Core: the audio side of a bridged call
//!
//! Each call gets its own [`MediaEngine`]: a UDP socket leased from the
//! shared [`PortAllocator`](aibridge_rtp_core::PortAllocator), a receive
//! task that segments the caller's speech into [`Utterance`]s, and paced
//! PCMU playback for synthesized replies.
//!
//! Playback and listening are coupled through the [`MuteGate`]: audio
//! received while the gate is closed never reaches the VAD, which keeps the
//! bridge from transcribing its own voice coming back down the line.
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use aibridge_media_core::{MediaConfig, MediaEngine};
//! use aibridge_rtp_core::PortAllocator;
//!
//! # async fn example() -> aibridge_media_core::Result<()> {
//! let allocator = PortAllocator::new(10000, 20000);
//! let engine = MediaEngine::bind("call-1", &allocator, MediaConfig::default())?;
//! let remote: SocketAddr = "10.0.0.66:16970".parse().unwrap();
//! let mut utterances = engine.start(remote)?;
//!
//! engine.play_muted(&vec![0i16; 8000]).await?;
//! engine.gate().unmute_and_recalibrate();
//!
//! while let Some(utterance) = utterances.recv().await {
//!     println!("{} samples", utterance.samples.len());
//! }
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod inbound;
pub mod mute;
pub mod recording;
pub mod tone;
pub mod vad;

pub use activity::Activity;
pub use config::MediaConfig;
pub use engine::{MediaEngine, ToneHandle};
pub use error::{Error, Result};
pub use mute::{Admission, MuteGate, MuteGuard};
pub use recording::CallRecording;
pub use tone::ToneConfig;
pub use vad::{Utterance, UtteranceBuffer, VadConfig, VadEvent};
