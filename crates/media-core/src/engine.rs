//! Per-call media engine
//!
//! One engine owns one UDP socket from the shared port range. A receive
//! task decodes the caller's PCMU audio, runs it past the mute gate and the
//! VAD, and hands completed utterances to the consumer over a channel.
//! Playback goes out one packet per 20ms tick of a [`PacketClock`]; all
//! playback shares a single sequencer so the outbound stream has one
//! continuous sequence space.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aibridge_codec_core::{FRAME_SAMPLES, NARROWBAND_RATE, g711};
use aibridge_rtp_core::{
    PacketClock, PortAllocator, PortLease, ReceiveTracker, RtpPacket, RtpSequencer, RtpStats,
    SequenceVerdict, TELEPHONE_EVENT_PAYLOAD_TYPE,
};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::activity::Activity;
use crate::config::MediaConfig;
use crate::error::{Error, Result};
use crate::inbound::InboundAudio;
use crate::mute::MuteGate;
use crate::recording::CallRecording;
use crate::tone::ToneConfig;
use crate::vad::{Utterance, VadEvent};

const FRAME_PERIOD: Duration = Duration::from_millis(20);
const MAX_DATAGRAM: usize = 1500;

struct Shared {
    call_id: String,
    socket: UdpSocket,
    local_port: u16,
    _lease: PortLease,
    remote: Mutex<Option<SocketAddr>>,
    config: MediaConfig,
    gate: MuteGate,
    activity: Activity,
    tracker: Mutex<ReceiveTracker>,
    sequencer: AsyncMutex<RtpSequencer>,
    recording: Option<CallRecording>,
    cancel: CancellationToken,
}

/// RTP media engine for one call
pub struct MediaEngine {
    shared: Arc<Shared>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for MediaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaEngine")
            .field("call_id", &self.shared.call_id)
            .field("local_port", &self.shared.local_port)
            .field("remote", &self.shared.remote())
            .finish()
    }
}

impl MediaEngine {
    /// Take a port from `allocator` and bind the call's socket.
    ///
    /// Must be called from within a tokio runtime. The engine is idle until
    /// [`MediaEngine::start`]; the port is known right away so it can go
    /// into the SDP answer.
    pub fn bind(
        call_id: impl Into<String>,
        allocator: &PortAllocator,
        config: MediaConfig,
    ) -> Result<Self> {
        let call_id = call_id.into();
        let bound = allocator.allocate(config.bind_ip)?;
        let local_port = bound.port();
        let socket = UdpSocket::from_std(bound.socket)?;

        let recording = config.recording_dir.as_ref().and_then(|dir| {
            let path = dir.join(recording_file_name(&call_id));
            match CallRecording::create(&path, NARROWBAND_RATE) {
                Ok(recording) => Some(recording),
                Err(e) => {
                    warn!(call_id = %call_id, "Cannot record call to {}: {}", path.display(), e);
                    None
                }
            }
        });

        info!(call_id = %call_id, port = local_port, "Media engine bound");

        Ok(Self {
            shared: Arc::new(Shared {
                call_id,
                socket,
                local_port,
                _lease: bound.lease,
                remote: Mutex::new(None),
                config,
                gate: MuteGate::muted(),
                activity: Activity::new(),
                tracker: Mutex::new(ReceiveTracker::new()),
                sequencer: AsyncMutex::new(RtpSequencer::new(g711::PCMU_PAYLOAD_TYPE)),
                recording,
                cancel: CancellationToken::new(),
            }),
            receive_task: Mutex::new(None),
        })
    }

    /// Start receiving from (and sending to) `remote`.
    ///
    /// Completed utterances are delivered on the returned channel in the
    /// order they were spoken. The gate starts muted.
    pub fn start(&self, remote: SocketAddr) -> Result<mpsc::UnboundedReceiver<Utterance>> {
        let mut task = self.receive_task.lock();
        if task.is_some() {
            return Err(Error::AlreadyStarted);
        }
        if self.shared.cancel.is_cancelled() {
            return Err(Error::EngineStopped);
        }

        *self.shared.remote.lock() = Some(remote);
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = self.shared.clone();
        *task = Some(tokio::spawn(shared.receive_loop(tx)));

        debug!(call_id = %self.shared.call_id, "Media engine started, remote {}", remote);
        Ok(rx)
    }

    pub fn call_id(&self) -> &str {
        &self.shared.call_id
    }

    pub fn local_port(&self) -> u16 {
        self.shared.local_port
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.shared.remote()
    }

    pub fn gate(&self) -> &MuteGate {
        &self.shared.gate
    }

    pub fn activity(&self) -> Activity {
        self.shared.activity.clone()
    }

    pub fn stats(&self) -> RtpStats {
        self.shared.tracker.lock().stats().clone()
    }

    pub fn recording_path(&self) -> Option<PathBuf> {
        self.shared
            .recording
            .as_ref()
            .map(|r| r.path().to_path_buf())
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Play 8 kHz audio without touching the gate. Returns packets sent.
    pub async fn play(&self, samples: &[i16]) -> Result<usize> {
        self.shared.play(samples, &self.shared.cancel).await
    }

    /// Play with the gate closed, wait the settle delay, then reopen.
    ///
    /// The gate reopens however this ends, including when the future is
    /// dropped.
    pub async fn play_muted(&self, samples: &[i16]) -> Result<usize> {
        let _hold = self.shared.gate.hold();
        let result = self.shared.play(samples, &self.shared.cancel).await;
        tokio::select! {
            _ = self.shared.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.shared.config.settle_delay) => {}
        }
        result
    }

    /// Start the thinking tone, if configured. The caller is muted while
    /// it plays and for the settle delay after it stops.
    pub fn start_thinking_tone(&self) -> Option<ToneHandle> {
        let tone = self.shared.config.thinking_tone.clone()?;
        let token = self.shared.cancel.child_token();
        let task = tokio::spawn(self.shared.clone().tone_loop(tone, token.clone()));
        Some(ToneHandle {
            token,
            task: Some(task),
        })
    }

    /// Stop all media tasks and return the final statistics
    pub async fn stop(&self) -> RtpStats {
        self.shared.cancel.cancel();

        let task = self.receive_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(call_id = %self.shared.call_id, "Receive task failed: {}", e);
            }
        }
        // Wait out any playback that is between ticks
        drop(self.shared.sequencer.lock().await);

        if let Some(recording) = &self.shared.recording {
            match recording.finalize() {
                Ok(path) => info!(call_id = %self.shared.call_id, "Recording saved to {}", path.display()),
                Err(e) => warn!(call_id = %self.shared.call_id, "Recording not saved: {}", e),
            }
        }

        let stats = self.stats();
        info!(
            call_id = %self.shared.call_id,
            sent = stats.packets_sent,
            received = stats.packets_received,
            lost = stats.packets_lost,
            rejected = stats.packets_rejected,
            "Media engine stopped"
        );
        stats
    }
}

impl Drop for MediaEngine {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl Shared {
    fn remote(&self) -> Option<SocketAddr> {
        *self.remote.lock()
    }

    fn accept_source(&self, source: SocketAddr, latched: &mut bool) -> bool {
        let mut remote = self.remote.lock();
        match *remote {
            Some(expected) if expected == source => {
                *latched = true;
                true
            }
            signaled if self.config.symmetric_rtp && !*latched => {
                info!(
                    call_id = %self.call_id,
                    "Latching media to {} (signaled {:?})", source, signaled
                );
                *remote = Some(source);
                *latched = true;
                true
            }
            _ => {
                trace!(call_id = %self.call_id, "Dropping RTP from unexpected source {}", source);
                false
            }
        }
    }

    async fn receive_loop(self: Arc<Self>, utterances: mpsc::UnboundedSender<Utterance>) {
        let mut inbound = InboundAudio::new(self.config.vad.clone(), self.gate.clone());
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut samples = Vec::with_capacity(FRAME_SAMPLES);
        let mut latched = false;

        loop {
            let (len, source) = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        debug!(call_id = %self.call_id, "RTP receive error: {}", e);
                        continue;
                    }
                },
            };

            if !self.accept_source(source, &mut latched) {
                self.tracker.lock().record_rejected();
                continue;
            }

            let packet = match RtpPacket::parse(&buf[..len]) {
                Ok(packet) => packet,
                Err(e) => {
                    trace!(call_id = %self.call_id, "Ignoring malformed RTP from {}: {}", source, e);
                    continue;
                }
            };

            match packet.header.payload_type {
                g711::PCMU_PAYLOAD_TYPE => {}
                TELEPHONE_EVENT_PAYLOAD_TYPE => {
                    trace!(call_id = %self.call_id, "Telephone event ignored");
                    continue;
                }
                other => {
                    trace!(call_id = %self.call_id, payload_type = other, "Unsupported payload ignored");
                    continue;
                }
            }

            let verdict = self.tracker.lock().record(packet.header.sequence_number, len);
            if let SequenceVerdict::Gap { missing } = verdict {
                debug!(call_id = %self.call_id, missing, "RTP sequence gap");
            }

            samples.clear();
            g711::decode_into(&packet.payload, &mut samples);
            if let Some(recording) = &self.recording {
                recording.append(&samples);
            }

            for event in inbound.ingest(&samples) {
                match event {
                    VadEvent::Calibrated {
                        noise_floor,
                        threshold,
                    } => {
                        info!(call_id = %self.call_id, noise_floor, threshold, "VAD calibrated");
                    }
                    VadEvent::SpeechStarted | VadEvent::Speech => self.activity.touch(),
                    VadEvent::Completed(utterance) => {
                        self.activity.touch();
                        debug!(
                            call_id = %self.call_id,
                            duration_ms = utterance.duration().as_millis() as u64,
                            forced = utterance.forced,
                            "Utterance ready"
                        );
                        if utterances.send(utterance).is_err() {
                            debug!(call_id = %self.call_id, "Utterance consumer gone");
                            return;
                        }
                    }
                    _ => {}
                }
            }
        }

        debug!(call_id = %self.call_id, "Receive loop stopped");
    }

    async fn play(&self, samples: &[i16], cancel: &CancellationToken) -> Result<usize> {
        if self.remote().is_none() {
            return Err(Error::NoRemoteAddress);
        }
        let mut sequencer = self.sequencer.lock().await;
        sequencer.start_talkspurt();
        let mut clock = PacketClock::new(FRAME_PERIOD);
        let mut sent = 0;

        for chunk in samples.chunks(FRAME_SAMPLES) {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = clock.tick() => {}
            }

            let mut payload = g711::encode_frame(chunk);
            payload.resize(FRAME_SAMPLES, g711::MULAW_SILENCE);
            let packet = sequencer.next_packet(Bytes::from(payload), FRAME_SAMPLES as u32);
            let data = packet.serialize()?;
            let remote = self.remote().ok_or(Error::NoRemoteAddress)?;
            self.socket.send_to(&data, remote).await?;

            self.tracker.lock().record_sent(data.len());
            if let Some(recording) = &self.recording {
                recording.append(chunk);
            }
            self.activity.touch();
            sent += 1;
        }

        trace!(call_id = %self.call_id, sent, drift_us = clock.drift().as_micros() as u64, "Playback done");
        Ok(sent)
    }

    /// Beeps with the gate held closed, so their echo never reaches the VAD.
    /// The hold outlives the loop by the settle delay to cover the echo of
    /// the last beep.
    async fn tone_loop(self: Arc<Self>, tone: ToneConfig, token: CancellationToken) {
        let hold = self.gate.hold();
        let beep = tone.beep_samples(NARROWBAND_RATE);
        let pause_samples = tone.pause_samples(NARROWBAND_RATE);

        while !token.is_cancelled() {
            if let Err(e) = self.play(&beep, &token).await {
                debug!(call_id = %self.call_id, "Thinking tone stopped: {}", e);
                break;
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(tone.pause) => {}
            }
            self.sequencer.lock().await.skip(pause_samples);
        }

        let settle = self.config.settle_delay;
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(settle) => {}
            }
            drop(hold);
        });
    }
}

/// Running thinking tone; cancelled when stopped or dropped
#[derive(Debug)]
pub struct ToneHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ToneHandle {
    /// Cancel the tone and wait until its last packet has gone out
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!("Thinking tone task failed: {}", e);
            }
        }
    }
}

impl Drop for ToneHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn recording_file_name(call_id: &str) -> String {
    let safe: String = call_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("call_{safe}.wav")
}
