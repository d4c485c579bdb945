mod common;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use aibridge_media_core::{MediaConfig, MediaEngine, Utterance};
use aibridge_rtp_core::{PortAllocator, RtpPacket};
use aibridge_session_core::prelude::*;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{Mocks, ScriptedTranscriber, speech};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

struct Harness {
    orchestrator: CallOrchestrator,
    engine: Arc<MediaEngine>,
    peer: UdpSocket,
    events: EventBus,
}

async fn harness(mocks: &Mocks, pipeline: PipelineConfig) -> Harness {
    let allocator = PortAllocator::new(0, 0);
    let media = MediaConfig::default()
        .with_bind_ip(LOCALHOST)
        .with_settle_delay(Duration::ZERO)
        .with_thinking_tone(None);
    let engine = Arc::new(MediaEngine::bind("pipeline-test", &allocator, media).unwrap());
    let peer = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    // The pipeline is fed directly; the engine only needs somewhere to send
    let _utterances = engine.start(peer.local_addr().unwrap()).unwrap();

    let mut session = CallSession::new(CallId::from("pipeline-test"), "Jane Doe");
    session.mark_answered();
    let events = EventBus::default();
    let orchestrator = CallOrchestrator::new(
        session,
        engine.clone(),
        mocks.services(),
        pipeline,
        events.clone(),
    );
    Harness {
        orchestrator,
        engine,
        peer,
        events,
    }
}

fn pipeline() -> PipelineConfig {
    PipelineConfig::default().with_welcome_text("")
}

fn utterance(samples: usize) -> Utterance {
    Utterance {
        samples: speech(samples),
        sample_rate: 8000,
        forced: false,
    }
}

async fn count_packets(peer: &UdpSocket, quiet: Duration) -> usize {
    let mut buf = [0u8; 1500];
    let mut count = 0;
    while let Ok(Ok((len, _))) = tokio::time::timeout(quiet, peer.recv_from(&mut buf)).await {
        assert_eq!(RtpPacket::parse(&buf[..len]).unwrap().header.payload_type, 0);
        count += 1;
    }
    count
}

#[tokio::test]
async fn test_empty_transcript_never_reaches_generation() {
    let mocks = Mocks::new(ScriptedTranscriber::new([""], Duration::ZERO));
    let mut h = harness(&mocks, pipeline()).await;

    let outcome = h.orchestrator.handle_utterance(utterance(8000)).await;

    assert_eq!(outcome, PipelineOutcome::Abandoned(AbandonReason::EmptyTranscript));
    assert_eq!(mocks.transcriber.calls(), 1);
    assert_eq!(mocks.generator.calls(), 0);
    assert_eq!(mocks.synthesizer.calls(), 0);
    assert!(h.orchestrator.history().is_empty());
}

#[tokio::test]
async fn test_quiet_utterance_is_not_transcribed() {
    let mocks = Mocks::new(ScriptedTranscriber::new(["hello"], Duration::ZERO));
    let mut h = harness(&mocks, pipeline()).await;

    let quiet = Utterance {
        samples: vec![10; 8000],
        sample_rate: 8000,
        forced: false,
    };
    let outcome = h.orchestrator.handle_utterance(quiet).await;

    assert_eq!(outcome, PipelineOutcome::Abandoned(AbandonReason::TooQuiet));
    assert_eq!(mocks.transcriber.calls(), 0);
}

#[tokio::test]
async fn test_hallucinated_transcript_is_dropped() {
    let mocks = Mocks::new(ScriptedTranscriber::new(["Thank you."], Duration::ZERO));
    let mut h = harness(&mocks, pipeline()).await;
    let mut events = h.events.subscribe();

    let outcome = h.orchestrator.handle_utterance(utterance(8000)).await;

    assert_eq!(outcome, PipelineOutcome::Abandoned(AbandonReason::Hallucination));
    assert_eq!(mocks.generator.calls(), 0);
    // The raw transcript is still published
    match events.try_recv().unwrap() {
        CallEvent::Transcription { text, .. } => assert_eq!(text, "Thank you."),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_reply_is_generated_spoken_and_recorded() {
    let mocks = Mocks::new(ScriptedTranscriber::new(["What time is it?"], Duration::ZERO));
    let mut h = harness(&mocks, pipeline()).await;

    let outcome = h.orchestrator.handle_utterance(utterance(8000)).await;

    assert_eq!(
        outcome,
        PipelineOutcome::Replied {
            transcript: "What time is it?".to_string(),
            reply: "You said What time is it?".to_string(),
        }
    );
    // 8000 samples at 8 kHz reach the transcriber at 16 kHz
    assert_eq!(*mocks.transcriber.inputs.lock(), vec![16000]);

    let requests = mocks.generator.requests.lock().clone();
    let prompt = &requests[0];
    assert_eq!(prompt[0].role, Role::System);
    assert!(prompt[0].content.contains("current date and time"));
    assert_eq!(prompt.last().unwrap(), &ChatMessage::user("What time is it?"));

    // 100ms of synthesized speech is five packets
    assert_eq!(count_packets(&h.peer, Duration::from_millis(200)).await, 5);

    assert_eq!(h.orchestrator.history().len(), 2);
    assert_eq!(
        mocks.recorder.entries(),
        vec!["exchange What time is it? / You said What time is it?".to_string()]
    );
}

#[tokio::test]
async fn test_history_is_limited_to_recent_turns() {
    let mocks = Mocks::new(ScriptedTranscriber::new(["one", "two", "three"], Duration::ZERO));
    let mut h = harness(&mocks, pipeline().with_history_turns(2)).await;

    for _ in 0..3 {
        h.orchestrator.handle_utterance(utterance(4000)).await;
    }

    let requests = mocks.generator.requests.lock().clone();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[1].len(), 4);
    // System prompt, the last two history messages, the new transcript
    assert_eq!(requests[2].len(), 4);
    assert_eq!(requests[2][1], ChatMessage::user("two"));
    assert_eq!(requests[2][3], ChatMessage::user("three"));
}

#[tokio::test]
async fn test_recording_mode_collects_notes_without_replying() {
    let mocks = Mocks::new(ScriptedTranscriber::new(
        ["Take a note.", "Buy milk", "Call the bank", "Stop recording"],
        Duration::ZERO,
    ));
    let mut h = harness(&mocks, pipeline()).await;

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(h.orchestrator.handle_utterance(utterance(4000)).await);
    }

    assert_eq!(outcomes[0], PipelineOutcome::RecordingStarted);
    assert_eq!(outcomes[1], PipelineOutcome::NoteTaken);
    assert_eq!(outcomes[2], PipelineOutcome::NoteTaken);
    assert!(matches!(outcomes[3], PipelineOutcome::NoteSaved(Some(_))));
    assert!(!h.orchestrator.is_recording());

    assert_eq!(mocks.generator.calls(), 0);
    assert_eq!(mocks.synthesizer.calls(), 0);

    let notes = mocks.recorder.notes.lock().clone();
    assert_eq!(notes.len(), 1);
    let lines: Vec<&str> = notes[0].lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("] Buy milk"));
    assert!(lines[1].ends_with("] Call the bank"));
}

#[tokio::test]
async fn test_unfinished_note_is_saved_when_the_call_ends() {
    let mocks = Mocks::new(ScriptedTranscriber::new(
        ["start taking notes", "Remember the dentist"],
        Duration::ZERO,
    ));
    let mut h = harness(&mocks, pipeline()).await;

    h.orchestrator.handle_utterance(utterance(4000)).await;
    h.orchestrator.handle_utterance(utterance(4000)).await;
    assert!(h.orchestrator.is_recording());
    h.orchestrator.finish().await;

    let notes = mocks.recorder.notes.lock().clone();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].ends_with("] Remember the dentist"));
}

#[tokio::test]
async fn test_forced_utterance_at_maximum_length_is_processed() {
    let mocks = Mocks::new(ScriptedTranscriber::new(["a very long story"], Duration::ZERO));
    let mut h = harness(&mocks, pipeline()).await;

    let long = Utterance {
        samples: speech(30 * 8000),
        sample_rate: 8000,
        forced: true,
    };
    let outcome = h.orchestrator.handle_utterance(long).await;

    assert!(matches!(outcome, PipelineOutcome::Replied { .. }));
    assert_eq!(*mocks.transcriber.inputs.lock(), vec![30 * 16000]);
}

#[tokio::test]
async fn test_utterances_are_handled_one_at_a_time_in_order() {
    let mocks = Mocks::new(ScriptedTranscriber::new(
        ["first", "second", "third"],
        Duration::from_millis(50),
    ));
    let h = harness(&mocks, pipeline()).await;

    let (tx, rx) = mpsc::unbounded_channel();
    for len in [4000, 4800, 5600] {
        tx.send(utterance(len)).unwrap();
    }
    drop(tx);

    let run = tokio::spawn(h.orchestrator.run(rx, CancellationToken::new()));
    tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(mocks.transcriber.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(*mocks.transcriber.inputs.lock(), vec![8000, 9600, 11200]);

    let requests = mocks.generator.requests.lock().clone();
    let spoken: Vec<&str> = requests
        .iter()
        .map(|r| r.last().unwrap().content.as_str())
        .collect();
    assert_eq!(spoken, vec!["first", "second", "third"]);
    assert_eq!(mocks.synthesizer.calls(), 3);
}

#[tokio::test]
async fn test_welcome_plays_muted_then_opens_the_gate() {
    let mocks = Mocks::new(ScriptedTranscriber::new(Vec::<String>::new(), Duration::ZERO));
    let h = harness(&mocks, PipelineConfig::default().with_welcome_text("Hi there")).await;
    assert!(h.engine.gate().is_muted());

    let (tx, rx) = mpsc::unbounded_channel::<Utterance>();
    drop(tx);
    h.orchestrator.run(rx, CancellationToken::new()).await;

    assert_eq!(*mocks.synthesizer.texts.lock(), vec!["Hi there".to_string()]);
    assert_eq!(count_packets(&h.peer, Duration::from_millis(200)).await, 5);
    assert!(!h.engine.gate().is_muted());
    assert_eq!(mocks.recorder.entries(), vec!["system Hi there".to_string()]);
}

#[tokio::test]
async fn test_cancellation_stops_a_pipeline_in_progress() {
    let mocks = Mocks::new(ScriptedTranscriber::new(["slow"], Duration::from_secs(30)));
    let h = harness(&mocks, pipeline()).await;

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(utterance(4000)).unwrap();
    let cancel = CancellationToken::new();
    let run = tokio::spawn(h.orchestrator.run(rx, cancel.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mocks.generator.calls(), 0);
}
