use std::path::{Path, PathBuf};

use sample_chopper::catalog::TAG_TABLE;
use sample_chopper::session::{Session, SessionState};
use sample_chopper::{
    export, level, AffixPosition, ChopError, NamingDirective, OnsetSettings, PipelineConfig,
};

const RATE: u32 = 22050;
const HITS: [f64; 3] = [0.5, 1.5, 2.5];

fn write_drum_loop(dir: &Path) -> PathBuf {
    let mut samples = vec![0.0f32; RATE as usize * 3];
    for hit in HITS {
        let start = (hit * RATE as f64) as usize;
        for i in 0..2000 {
            let decay = (-(i as f32) / 300.0).exp();
            samples[start + i] = (i as f32 * 0.3).sin() * decay;
        }
    }
    let path = dir.join("loop.wav");
    export::write_wav(&path, &samples, RATE).unwrap();
    path
}

fn write_pad(dir: &Path) -> PathBuf {
    let samples: Vec<f32> = (0..RATE).map(|i| (i as f32 * 0.02).sin() * 0.2).collect();
    let path = dir.join("pad.wav");
    export::write_wav(&path, &samples, RATE).unwrap();
    path
}

fn read_wav(path: &Path) -> (u32, Vec<f32>) {
    let mut reader = hound::WavReader::open(path).unwrap();
    let rate = reader.spec().sample_rate;
    let samples = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    (rate, samples)
}

#[test]
fn detect_chop_tag_and_save_a_pack() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut session = Session::new().unwrap();

    let loaded = session.load_samples(&[write_pad(src.path())]);
    assert!(loaded[0].is_ok());
    session.open_source(write_drum_loop(src.path())).unwrap();

    let onsets = session.detect_onsets(&OnsetSettings::default()).unwrap().to_vec();
    assert_eq!(onsets.len(), 3, "onsets: {:?}", onsets);
    for (found, hit) in onsets.iter().zip(HITS) {
        assert!(*found < hit && hit - found < 0.1, "{} vs {}", found, hit);
    }

    let chops = session.chop().unwrap();
    assert_eq!(chops.len(), 3);
    assert_eq!(session.state(), SessionState::Chopped);
    assert_eq!(session.catalog().len(), 4);

    session.rename(chops[0], "kick").unwrap();
    session.set_tag(chops[0], "drums").unwrap();
    let kick_copy = session.catalog().get(chops[0]).unwrap().current_path.clone();
    let kick_before = std::fs::read(&kick_copy).unwrap();

    let table = std::fs::read_to_string(session.catalog().workdir().join(TAG_TABLE)).unwrap();
    assert!(table.lines().any(|l| l == "kick.wav,drums"));

    let config = PipelineConfig {
        crop_silence: true,
        normalize: true,
        target_db: -3.0,
        target_sample_rate: 16000,
        ..PipelineConfig::default()
    };
    let directive = NamingDirective {
        pack_name: Some("Test Pack".to_string()),
        create_pack_folder: true,
        signature: Some("jd".to_string()),
        signature_position: AffixPosition::Suffix,
        sign_pack: true,
        route_by_tag: true,
        ..NamingDirective::default()
    };
    let report = session.save(out.path(), &config, &directive).unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(report.is_complete(), "{:?}", report);

    let pack = out.path().join("Test_Pack_jd");
    assert_eq!(report.pack_folder.as_deref(), Some(pack.as_path()));
    let expected = [
        pack.join("pad.wav"),
        pack.join("drums").join("kick.wav"),
        pack.join("loop_chop_2.wav"),
        pack.join("loop_chop_3.wav"),
    ];
    let saved: Vec<&PathBuf> = report.saved().collect();
    assert_eq!(saved, expected.iter().collect::<Vec<_>>());

    for path in &expected {
        let (rate, samples) = read_wav(path);
        assert_eq!(rate, 16000);
        let db = level::rms_db(&samples).unwrap();
        assert!((db - -3.0).abs() < 1.0, "{:?} at {:.2} dB", path, db);
    }

    // Cropping kept the hit and at most half a second of tail.
    let (_, kick) = read_wav(&expected[1]);
    assert!(kick.len() < 16000);

    assert_eq!(std::fs::read(&kick_copy).unwrap(), kick_before);
}

#[test]
fn a_missing_working_copy_does_not_stop_the_batch() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut session = Session::new().unwrap();
    session.open_source(write_drum_loop(src.path())).unwrap();
    session.set_markers([0.0, 1.0, 2.0]).unwrap();
    let chops = session.chop().unwrap();

    let doomed = session.catalog().get(chops[1]).unwrap().current_path.clone();
    std::fs::remove_file(doomed).unwrap();

    let config = PipelineConfig {
        target_sample_rate: RATE,
        ..PipelineConfig::default()
    };
    let report = session.save(out.path(), &config, &NamingDirective::default()).unwrap();
    assert_eq!(report.saved().count(), 2);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.id, chops[1]);
    assert!(matches!(failures[0].1, ChopError::MissingSampleFile(_)));
}

#[test]
fn chopping_twice_never_overwrites_earlier_pieces() {
    let src = tempfile::tempdir().unwrap();
    let mut session = Session::new().unwrap();
    session.open_source(write_drum_loop(src.path())).unwrap();

    session.set_markers([0.0, 1.5]).unwrap();
    session.chop().unwrap();
    session.set_markers([1.0]).unwrap();
    session.chop().unwrap();

    let names: Vec<&str> = session
        .catalog()
        .records()
        .iter()
        .map(|r| r.renamed_name.as_str())
        .collect();
    assert_eq!(names, vec!["loop_chop_1.wav", "loop_chop_2.wav", "loop_chop_1_2.wav"]);
    for record in session.catalog().records() {
        assert!(record.current_path.is_file());
    }
}

#[test]
fn pack_folder_without_a_name_is_refused_before_writing() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut session = Session::new().unwrap();
    session.load_samples(&[write_pad(src.path())]);

    let directive = NamingDirective {
        create_pack_folder: true,
        ..NamingDirective::default()
    };
    let err = session
        .save(out.path(), &PipelineConfig::default(), &directive)
        .unwrap_err();
    assert!(matches!(err, ChopError::InvalidUserInput(_)));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}
