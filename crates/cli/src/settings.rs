//! Turns the flat environment settings into the typed per-crate configs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aibridge_ai_services::{
    EdgeTtsSynthesizer, FailoverGenerator, FallbackPolicy, HttpSettings, OllamaChat, OpenAiChat,
    WhisperTranscriber,
};
use aibridge_infra_common::BridgeConfig;
use aibridge_media_core::{MediaConfig, ToneConfig, VadConfig};
use aibridge_session_core::prelude::*;
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::recorder::JsonlCallRecorder;

/// Zero means "no limit"
fn limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn vad_config(bridge: &BridgeConfig) -> VadConfig {
    let vad = &bridge.vad;
    VadConfig::default()
        .with_calibration_frames(vad.calibration_frames)
        .with_threshold_multiplier(vad.threshold_multiplier)
        .with_threshold_bounds(vad.min_threshold, vad.max_threshold)
        .with_silence_duration(Duration::from_millis(vad.silence_ms))
        .with_min_utterance(Duration::from_millis(vad.min_utterance_ms))
        .with_max_utterance(Duration::from_secs(vad.max_utterance_secs))
}

pub fn session_config(bridge: &BridgeConfig) -> SessionConfig {
    let media = MediaConfig::default()
        .with_vad(vad_config(bridge))
        .with_recording_dir(bridge.recordings_dir.clone())
        .with_thinking_tone(bridge.thinking_tone.then(ToneConfig::default));

    let pipeline = PipelineConfig::default()
        .with_voice(bridge.tts_voice.clone())
        .with_persona(bridge.persona.clone())
        .with_welcome_text(bridge.welcome_message.clone());

    SessionConfig::default()
        .with_bind_addr(SocketAddr::new(bridge.sip_bind, bridge.sip_port))
        .with_extension(bridge.extension.clone())
        .with_username(bridge.username.clone())
        .with_advertised_ip(bridge.advertised_ip)
        .with_rtp_ports(bridge.rtp_port_min, bridge.rtp_port_max)
        .with_max_call_duration(limit(bridge.max_call_secs))
        .with_inactivity_timeout(limit(bridge.inactivity_secs))
        .with_media(media)
        .with_pipeline(pipeline)
}

/// Build the HTTP backends and the call recorder
pub async fn build_services(bridge: &BridgeConfig, pipeline: &PipelineConfig) -> Result<Services> {
    let policy: FallbackPolicy = bridge.llm_fallback.parse().context("LLM_FALLBACK")?;

    if bridge.groq_api_key.is_none() {
        warn!("GROQ_API_KEY is not set; transcription will fail and callers will not be heard");
    }

    let transcriber = WhisperTranscriber::new(
        bridge.groq_api_url.clone(),
        bridge.groq_api_key.clone(),
        bridge.groq_model.clone(),
        HttpSettings::default().with_timeout(pipeline.transcribe_timeout),
    )?;

    // The primary gets half the generation budget so a fallback still fits
    let ollama = OllamaChat::new(
        bridge.ollama_url.clone(),
        bridge.ollama_model.clone(),
        HttpSettings::default().with_timeout(pipeline.generate_timeout / 2),
    )?;
    if !ollama.is_available().await {
        warn!(url = %bridge.ollama_url, "Ollama is not reachable");
    }
    let mut generator = FailoverGenerator::new(Arc::new(ollama)).with_policy(policy);
    if bridge.groq_api_key.is_some() && policy != FallbackPolicy::Never {
        let groq = OpenAiChat::new(
            bridge.groq_chat_url.clone(),
            bridge.groq_api_key.clone(),
            bridge.groq_llm_model.clone(),
            HttpSettings::default().with_timeout(pipeline.generate_timeout / 2),
        )?;
        generator = generator.with_secondary(Arc::new(groq));
    }

    let synthesizer = EdgeTtsSynthesizer::new(
        bridge.tts_url.clone(),
        bridge.tts_api_key.clone(),
        HttpSettings::default().with_timeout(pipeline.synthesize_timeout),
    )?;

    let mut services = Services::new(
        Arc::new(transcriber),
        Arc::new(generator),
        Arc::new(synthesizer),
    );
    if let Some(path) = &bridge.events_file {
        let recorder = JsonlCallRecorder::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        info!(path = %recorder.path().display(), "Recording call history");
        services = services.with_recorder(Arc::new(recorder));
    }

    info!(
        transcription = %bridge.groq_model,
        llm = %bridge.ollama_model,
        fallback = %policy,
        voice = %bridge.tts_voice,
        "AI services configured"
    );
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_of_zero_are_disabled() {
        let bridge = BridgeConfig {
            max_call_secs: 0,
            inactivity_secs: 90,
            ..Default::default()
        };
        let config = session_config(&bridge);
        assert_eq!(config.max_call_duration, None);
        assert_eq!(config.inactivity_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_session_config_carries_environment_values() {
        let mut bridge = BridgeConfig::default();
        bridge.sip_port = 5070;
        bridge.extension = "6000".to_string();
        bridge.thinking_tone = false;
        bridge.welcome_message = String::new();
        bridge.vad.silence_ms = 900;

        let config = session_config(&bridge);
        assert_eq!(config.bind_addr.port(), 5070);
        assert_eq!(config.extension, "6000");
        assert_eq!((config.rtp_port_min, config.rtp_port_max), (10000, 10100));
        assert!(config.media.thinking_tone.is_none());
        assert_eq!(config.media.vad.silence_duration, Duration::from_millis(900));
        assert_eq!(config.pipeline.welcome_text, "");
        assert_eq!(config.pipeline.voice, "en-US-GuyNeural");
    }

    #[tokio::test]
    async fn test_unknown_fallback_policy_is_rejected() {
        let bridge = BridgeConfig {
            llm_fallback: "sometimes".to_string(),
            ..Default::default()
        };
        let err = build_services(&bridge, &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("sometimes"));
    }
}
