use std::io::{Cursor, Read};
use std::sync::Arc;

use audioclean_core::{
    ArtifactKind, AudioCleanError, AudioCodec, AudioFormat, CancelToken, ItemState,
    ItemStatusEvent, NativeCodec, OutputArtifact, Pipeline, PipelineConfig, ScratchSpace, Stage,
    UploadedAudio, Waveform,
};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

const SR: u32 = 4_000;

fn tone(secs: f32) -> Vec<f32> {
    let frames = (secs * SR as f32) as usize;
    (0..frames)
        .map(|i| {
            // Whole number of cycles per second.
            let t = (i % SR as usize) as f32 / SR as f32;
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

fn silence(secs: f32) -> Vec<f32> {
    vec![0.0; (secs * SR as f32) as usize]
}

fn wav_item(name: &str, samples: Vec<f32>) -> UploadedAudio {
    let scratch = ScratchSpace::new().expect("scratch");
    let bytes = NativeCodec::new()
        .encode(&Waveform::new(samples, SR, 1), AudioFormat::Wav, &scratch)
        .expect("encode fixture");
    UploadedAudio::new(name, bytes)
}

fn decode_wav(artifact: &OutputArtifact) -> Waveform {
    NativeCodec::new()
        .decode(&artifact.bytes, AudioFormat::Wav)
        .expect("decode artifact")
}

fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).expect("open archive");
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).expect("entry");
            let mut data = Vec::new();
            file.read_to_end(&mut data).expect("read entry");
            (file.name().to_string(), data)
        })
        .collect()
}

fn drain(rx: &mut broadcast::Receiver<ItemStatusEvent>) -> Vec<ItemStatusEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => events.push(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            Err(TryRecvError::Lagged(n)) => panic!("lost {n} status events"),
        }
    }
}

fn kinds(artifacts: &[OutputArtifact]) -> Vec<ArtifactKind> {
    artifacts.iter().map(|a| a.kind).collect()
}

fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::new(config).expect("valid config")
}

#[test]
fn twelve_minute_recording_splits_into_five_five_two() {
    let config = PipelineConfig {
        noise_reduction_enabled: false,
        ..PipelineConfig::default()
    };
    let item = wav_item("clase.wav", tone(12.0 * 60.0));
    let report = pipeline(config).run_batch(&[item]).unwrap();

    let output = report.items[0].output().expect("item should succeed");
    let segments: Vec<&OutputArtifact> = output
        .artifacts
        .iter()
        .filter(|a| matches!(a.kind, ArtifactKind::Segment { .. }))
        .collect();

    let names: Vec<&str> = segments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "clase_parte_1_5min.wav",
            "clase_parte_2_5min.wav",
            "clase_parte_3_5min.wav"
        ]
    );

    let minutes: Vec<f64> = segments
        .iter()
        .map(|a| decode_wav(a).duration_secs() / 60.0)
        .collect();
    assert_eq!(minutes, vec![5.0, 5.0, 2.0]);

    let archive = output.artifacts.last().unwrap();
    assert_eq!(archive.name, "clase_segmentos.zip");
    assert_eq!(archive.mime, "application/zip");
    let entries = zip_entries(&archive.bytes);
    assert_eq!(entries.len(), 3);
    for (segment, (name, data)) in segments.iter().zip(&entries) {
        assert_eq!(&segment.name, name);
        assert_eq!(&segment.bytes, data);
    }
    assert_eq!(output.stats.segments, 3);
}

#[test]
fn fully_silent_input_yields_empty_archive() {
    let item = wav_item("vacio.wav", silence(10.0));
    let report = pipeline(PipelineConfig::default()).run_batch(&[item]).unwrap();

    let output = report.items[0].output().expect("silence is not an error");
    assert_eq!(
        kinds(&output.artifacts),
        vec![
            ArtifactKind::Original,
            ArtifactKind::Cleaned,
            ArtifactKind::Archive
        ]
    );
    assert_eq!(&output.artifacts[1].bytes[..4], b"RIFF");
    assert!(zip_entries(&output.artifacts[2].bytes).is_empty());
    assert_eq!(output.stats.segments, 0);
    assert_eq!(output.stats.output_duration_ms, 0);
    assert_eq!(output.stats.input_level_dbfs, None);
}

#[test]
fn corrupt_item_fails_at_decode_and_siblings_succeed() {
    let items = vec![
        wav_item("uno.wav", tone(2.0)),
        UploadedAudio::new("roto.wav", b"definitely not a riff header".to_vec()),
        wav_item("tres.wav", tone(2.0)),
    ];
    let report = pipeline(PipelineConfig::default()).run_batch(&items).unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(report.items[0].is_success());
    assert!(report.items[2].is_success());

    let failure = report.items[1].failure().expect("corrupt item must fail");
    assert_eq!(failure.stage, Stage::Decode);
    assert!(matches!(
        failure.error,
        AudioCleanError::CorruptInput(_) | AudioCleanError::UnsupportedFormat(_)
    ));
    assert!(report.items[1].artifacts().is_empty());
}

#[test]
fn unknown_extension_fails_at_decode() {
    let item = UploadedAudio::new("notas.ogg", vec![0; 64]);
    let report = pipeline(PipelineConfig::default()).run_batch(&[item]).unwrap();
    let failure = report.items[0].failure().unwrap();
    assert_eq!(failure.stage, Stage::Decode);
    assert!(matches!(failure.error, AudioCleanError::UnsupportedFormat(_)));
}

#[test]
fn artifacts_come_in_documented_order() {
    let item = wav_item("charla.wav", [tone(70.0), tone(20.0)].concat());
    let original = item.bytes.clone();
    let config = PipelineConfig {
        segment_duration_min: 1,
        noise_reduction_enabled: false,
        ..PipelineConfig::default()
    };
    let report = pipeline(config).run_batch(&[item]).unwrap();
    let artifacts = report.items[0].artifacts();

    assert_eq!(
        kinds(artifacts),
        vec![
            ArtifactKind::Original,
            ArtifactKind::Cleaned,
            ArtifactKind::Segment { index: 1 },
            ArtifactKind::Segment { index: 2 },
            ArtifactKind::Archive,
        ]
    );
    assert_eq!(artifacts[0].name, "charla.wav");
    assert_eq!(artifacts[0].bytes, original);
    assert_eq!(artifacts[1].name, "charla_limpio.wav");
    assert_eq!(artifacts[1].mime, "audio/wav");
    assert_eq!(artifacts[2].name, "charla_parte_1_1min.wav");
    assert_eq!(artifacts[3].name, "charla_parte_2_1min.wav");
}

#[test]
fn segmentation_disabled_emits_no_segments_or_archive() {
    let config = PipelineConfig {
        segmentation_enabled: false,
        ..PipelineConfig::default()
    };
    let p = pipeline(config);
    let mut rx = p.subscribe();
    let report = p.run_batch(&[wav_item("a.wav", tone(3.0))]).unwrap();

    assert_eq!(
        kinds(report.items[0].artifacts()),
        vec![ArtifactKind::Original, ArtifactKind::Cleaned]
    );
    let states: Vec<ItemState> = drain(&mut rx).into_iter().map(|e| e.state).collect();
    assert!(!states.contains(&ItemState::Segmented));
    assert!(!states.contains(&ItemState::Packaged));
    assert_eq!(report.diagnostics.archives_built, 0);
}

#[test]
fn cleaned_export_can_be_turned_off() {
    let config = PipelineConfig {
        export_cleaned: false,
        ..PipelineConfig::default()
    };
    let report = pipeline(config)
        .run_batch(&[wav_item("a.wav", tone(3.0))])
        .unwrap();
    assert_eq!(
        kinds(report.items[0].artifacts()),
        vec![
            ArtifactKind::Original,
            ArtifactKind::Segment { index: 1 },
            ArtifactKind::Archive
        ]
    );
}

#[test]
fn silence_between_phrases_is_removed() {
    let item = wav_item("pausas.wav", [tone(2.0), silence(3.0), tone(2.0)].concat());
    let config = PipelineConfig {
        noise_reduction_enabled: false,
        segmentation_enabled: false,
        ..PipelineConfig::default()
    };
    let report = pipeline(config).run_batch(&[item]).unwrap();
    let output = report.items[0].output().unwrap();

    assert_eq!(output.stats.silence_spans_removed, 1);
    assert_eq!(output.stats.input_duration_ms, 7_000);
    assert_eq!(output.stats.output_duration_ms, 4_000);
    assert_eq!(decode_wav(&output.artifacts[1]).frames(), 4 * SR as usize);
}

#[test]
fn state_events_follow_the_stage_order() {
    let p = pipeline(PipelineConfig::default());
    let mut rx = p.subscribe();
    p.run_batch(&[wav_item("a.wav", tone(3.0))]).unwrap();

    let events = drain(&mut rx);
    let states: Vec<ItemState> = events.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![
            ItemState::Received,
            ItemState::Decoded,
            ItemState::Normalized,
            ItemState::Trimmed,
            ItemState::NoiseReduced,
            ItemState::Segmented,
            ItemState::Packaged,
            ItemState::Done,
        ]
    );
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(events.iter().all(|e| e.item == "a.wav" && e.index == 0));
}

#[test]
fn noise_reduction_toggle_controls_stage() {
    let item = wav_item("a.wav", tone(2.5));

    let off = pipeline(PipelineConfig {
        noise_reduction_enabled: false,
        ..PipelineConfig::default()
    });
    let mut rx = off.subscribe();
    let report = off.run_batch(std::slice::from_ref(&item)).unwrap();
    assert!(!report.items[0].output().unwrap().stats.noise_reduced);
    assert!(!drain(&mut rx)
        .iter()
        .any(|e| e.state == ItemState::NoiseReduced));

    let on = pipeline(PipelineConfig::default());
    let report = on.run_batch(&[item]).unwrap();
    let output = report.items[0].output().unwrap();
    assert!(output.stats.noise_reduced);
    assert_eq!(report.diagnostics.noise_reductions, 1);
    // Noise reduction preserves length.
    assert_eq!(decode_wav(&output.artifacts[1]).frames(), (2.5 * SR as f32) as usize);
}

#[test]
fn compressed_output_without_encoder_fails_at_encode() {
    let config = PipelineConfig {
        output_format: AudioFormat::Mp3,
        ..PipelineConfig::default()
    };
    let report = pipeline(config)
        .run_batch(&[wav_item("a.wav", tone(2.0))])
        .unwrap();
    let failure = report.items[0].failure().unwrap();
    assert_eq!(failure.stage, Stage::Encode);
    assert!(matches!(failure.error, AudioCleanError::UnsupportedFormat(_)));
}

#[test]
fn cancelled_batch_fails_every_item_before_decode() {
    let p = pipeline(PipelineConfig::default());
    p.cancel_token().cancel();
    let items = vec![wav_item("a.wav", tone(1.0)), wav_item("b.wav", tone(1.0))];
    let report = p.run_batch(&items).unwrap();

    assert_eq!(report.failed(), 2);
    for item in &report.items {
        let failure = item.failure().unwrap();
        assert!(failure.is_cancelled());
        assert_eq!(failure.stage, Stage::Decode);
    }
    assert_eq!(report.diagnostics.items_cancelled, 2);
}

/// Decodes normally, then trips the cancel token.
struct CancelAfterDecode {
    token: CancelToken,
    inner: NativeCodec,
}

impl AudioCodec for CancelAfterDecode {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> audioclean_core::Result<Waveform> {
        let waveform = self.inner.decode(bytes, format)?;
        self.token.cancel();
        Ok(waveform)
    }

    fn encode(
        &self,
        waveform: &Waveform,
        format: AudioFormat,
        scratch: &ScratchSpace,
    ) -> audioclean_core::Result<Vec<u8>> {
        self.inner.encode(waveform, format, scratch)
    }
}

#[test]
fn cancellation_is_observed_at_next_stage_boundary() {
    let p = pipeline(PipelineConfig::default());
    let codec = CancelAfterDecode {
        token: p.cancel_token(),
        inner: NativeCodec::new(),
    };
    let p = p.with_codec(Arc::new(codec));
    let mut rx = p.subscribe();

    let report = p.run_batch(&[wav_item("a.wav", tone(1.0))]).unwrap();
    let failure = report.items[0].failure().unwrap();
    assert!(failure.is_cancelled());
    assert_eq!(failure.stage, Stage::Normalize);

    let last = drain(&mut rx).pop().unwrap();
    assert_eq!(last.state, ItemState::Failed(Stage::Normalize));
    assert_eq!(last.detail.as_deref(), Some("processing cancelled"));
}

#[test]
fn parallel_workers_keep_input_order() {
    let items: Vec<UploadedAudio> = (0..6)
        .map(|i| wav_item(&format!("pista{i}.wav"), tone(1.0 + i as f32 * 0.25)))
        .collect();
    let p = pipeline(PipelineConfig::default()).with_workers(3);
    let report = p.run_batch(&items).unwrap();

    assert!(report.all_succeeded());
    let names: Vec<&str> = report.items.iter().map(|r| r.name.as_str()).collect();
    let expected: Vec<String> = (0..6).map(|i| format!("pista{i}.wav")).collect();
    assert_eq!(names, expected);
    assert!(report.items.iter().enumerate().all(|(i, r)| r.index == i));
    for (i, r) in report.items.iter().enumerate() {
        let expected_ms = ((1.0 + i as f32 * 0.25) * 1_000.0) as u64;
        assert_eq!(r.output().unwrap().stats.input_duration_ms, expected_ms);
    }
    assert_eq!(report.diagnostics.items_completed, 6);
}

#[test]
fn scratch_space_is_released_after_batch() {
    let root = tempfile::tempdir().unwrap();
    let p = pipeline(PipelineConfig::default())
        .with_scratch_root(root.path())
        .with_workers(2);
    let items = vec![
        wav_item("a.wav", tone(1.0)),
        UploadedAudio::new("b.wav", b"junk".to_vec()),
    ];
    p.run_batch(&items).unwrap();
    assert!(std::fs::read_dir(root.path()).unwrap().next().is_none());
}
