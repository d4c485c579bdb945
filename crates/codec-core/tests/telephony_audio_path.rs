//! End-to-end audio path tests: RTP payload in, transcription upload out,
//! synthesized speech back to RTP payload.

use aibridge_codec_core::{
    FRAME_SAMPLES, NARROWBAND_RATE, WIDEBAND_RATE, decode_wav, encode_wav, g711, normalize, peak,
    resample, rms,
};

fn tone(freq: f64, rate: u32, samples: usize, amplitude: f64) -> Vec<i16> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / f64::from(rate);
            (amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16
        })
        .collect()
}

#[test]
fn inbound_payload_becomes_wideband_wav() {
    let original = tone(440.0, NARROWBAND_RATE, FRAME_SAMPLES * 50, 4000.0);
    let payloads: Vec<Vec<u8>> = original
        .chunks(FRAME_SAMPLES)
        .map(g711::encode_frame)
        .collect();
    assert!(payloads.iter().all(|p| p.len() == FRAME_SAMPLES));

    let mut narrow = Vec::new();
    for p in &payloads {
        g711::decode_into(p, &mut narrow);
    }
    assert_eq!(narrow.len(), original.len());
    assert!((rms(&narrow) - rms(&original)).abs() / rms(&original) < 0.05);

    let mut wide = resample(&narrow, NARROWBAND_RATE, WIDEBAND_RATE);
    assert_eq!(wide.len(), narrow.len() * 2);
    normalize(&mut wide, 0.9);
    assert_eq!(peak(&wide), 29490);

    let wav = encode_wav(&wide, WIDEBAND_RATE).unwrap();
    let decoded = decode_wav(&wav).unwrap();
    assert_eq!(decoded.sample_rate, WIDEBAND_RATE);
    assert_eq!(decoded.samples.len(), wide.len());
    assert!((decoded.duration_secs() - 1.0).abs() < 1e-9);
}

#[test]
fn synthesized_speech_becomes_rtp_frames() {
    let speech = tone(300.0, 24000, 24000 / 2, 8000.0);
    let wav = encode_wav(&speech, 24000).unwrap();

    let decoded = decode_wav(&wav).unwrap();
    let narrow = resample(&decoded.samples, decoded.sample_rate, NARROWBAND_RATE);
    assert_eq!(narrow.len(), 4000);

    let frames: Vec<Vec<u8>> = narrow.chunks(FRAME_SAMPLES).map(g711::encode_frame).collect();
    assert_eq!(frames.len(), 25);
}
