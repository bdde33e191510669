//! データディレクトリ経由の end-to-end テスト
//!
//! ランダム重みを書き出し → 読み戻し → 推論 → 正解出力と照合。

use cnn1d_core::cnn::{
    load_input, load_reference_output, load_weights_dir, save_input, save_reference_output,
    save_tensor, tensor_names, tensor_path, verify, CnnConfig, CnnError,
    CnnNetwork, CnnWeights, Strategy, IN_SIZE, OUT_SIZE,
};
use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::Path;

fn write_fixture(dir: &Path, seed: u64) -> (CnnWeights, Vec<f32>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let weights = CnnWeights::random(CnnConfig::STANDARD, &mut rng, 0.2).unwrap();
    let input: Vec<f32> = (0..IN_SIZE).map(|_| rng.random_range(-1.0f32..1.0)).collect();

    weights.save_dir(dir).unwrap();
    save_input(dir, &input).unwrap();
    (weights, input)
}

#[test]
fn test_saved_weights_reload_identically() {
    let dir = tempfile::tempdir().unwrap();
    let (weights, _) = write_fixture(dir.path(), 7);

    for name in tensor_names(&CnnConfig::STANDARD) {
        assert!(tensor_path(dir.path(), &name).is_file(), "{name} missing");
    }

    let loaded = CnnWeights::load_dir(dir.path()).unwrap();
    assert_eq!(loaded.config, weights.config);
    for ((name_a, a), (name_b, b)) in loaded.named_tensors().into_iter().zip(weights.named_tensors()) {
        assert_eq!(name_a, name_b);
        assert_eq!(a, b, "{name_a}");
    }
}

#[test]
fn test_end_to_end_both_strategies_pass() {
    let dir = tempfile::tempdir().unwrap();
    let (weights, input) = write_fixture(dir.path(), 11);

    let expected = CnnNetwork::new(weights, Strategy::Reference).unwrap().infer(&input).unwrap();
    save_reference_output(dir.path(), &expected).unwrap();

    let config = CnnConfig::STANDARD;
    let input = load_input(dir.path(), &config).unwrap();
    let expected = load_reference_output(dir.path(), &config).unwrap();
    assert_eq!(expected.len(), OUT_SIZE);

    for strategy in Strategy::ALL {
        let net = CnnNetwork::new(load_weights_dir(dir.path()).unwrap(), strategy).unwrap();
        let actual = net.infer(&input).unwrap();
        let report = verify(&actual, &expected).unwrap();
        assert!(report.passed(), "{strategy}: {report:?}");
        assert_eq!(report.compared, OUT_SIZE);
    }
}

#[test]
fn test_corrupted_reference_reports_mismatches() {
    let dir = tempfile::tempdir().unwrap();
    let (weights, input) = write_fixture(dir.path(), 13);
    let mut expected = CnnNetwork::new(weights, Strategy::Tiled).unwrap().infer(&input).unwrap();
    expected[10] += 1.0;
    expected[500] -= 1.0;
    save_reference_output(dir.path(), &expected).unwrap();

    let net = CnnNetwork::new(load_weights_dir(dir.path()).unwrap(), Strategy::Reference).unwrap();
    let actual = net.infer(&load_input(dir.path(), &CnnConfig::STANDARD).unwrap()).unwrap();
    let report = verify(&actual, &load_reference_output(dir.path(), &CnnConfig::STANDARD).unwrap())
        .unwrap();

    assert_eq!(report.mismatches, 2);
    assert_eq!(report.first.unwrap().index, 10);
}

#[test]
fn test_truncated_tensor_is_shape_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), 17);
    save_tensor(dir.path(), "fc1_bias", &[0.0; 127]).unwrap();

    match load_weights_dir(dir.path()) {
        Err(CnnError::ShapeMismatch {
            name,
            expected,
            actual,
        }) => {
            assert_eq!(name, "fc1_bias");
            assert_eq!(expected, 128);
            assert_eq!(actual, 127);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("truncated tensor was accepted"),
    }
}

#[test]
fn test_missing_tensor_is_file_error() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), 19);
    std::fs::remove_file(tensor_path(dir.path(), "bn3_running_var")).unwrap();

    match load_weights_dir(dir.path()) {
        Err(err @ CnnError::File { .. }) => {
            assert!(err.to_string().contains("bn3_running_var"), "{err}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("missing tensor was accepted"),
    }
}

#[test]
fn test_wrong_input_length_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), 23);
    let net = CnnNetwork::new(load_weights_dir(dir.path()).unwrap(), Strategy::Tiled).unwrap();

    assert!(matches!(net.infer(&[0.0; IN_SIZE - 1]), Err(CnnError::ShapeMismatch { .. })));
}
