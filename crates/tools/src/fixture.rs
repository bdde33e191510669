//! フィクスチャ（データディレクトリ）生成
//!
//! 乱数モデル・乱数入力から参照版で正解出力を求め、
//! パラメータ・入力・正解出力をまとめて書き出す。

use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;
use serde::Serialize;

use cnn1d_core::cnn::{
    CnnConfig, CnnWeights, infer_reference, save_input, save_reference_output,
};

/// 生成結果
#[derive(Debug, Clone, Serialize)]
pub struct FixtureSummary {
    pub seed: u64,
    pub scale: f32,
    pub num_parameters: usize,
    pub num_tensors: usize,
}

/// `dir` にフィクスチャ一式を書き出す
///
/// 同じ `seed` / `scale` なら同じファイルが生成される。
pub fn generate_fixture(dir: &Path, seed: u64, scale: f32) -> Result<FixtureSummary> {
    if !(scale.is_finite() && scale > 0.0) {
        bail!("scale must be a positive finite number: {scale}");
    }

    let config = CnnConfig::STANDARD;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let weights = CnnWeights::random(config, &mut rng, scale)?;
    let input: Vec<f32> = (0..config.input_len).map(|_| rng.random_range(-1.0f32..1.0)).collect();

    let output = infer_reference(&weights, &input)?;

    weights
        .save_dir(dir)
        .with_context(|| format!("failed to write parameters to {}", dir.display()))?;
    save_input(dir, &input)?;
    save_reference_output(dir, &output)?;

    let summary = FixtureSummary {
        seed,
        scale,
        num_parameters: weights.num_parameters(),
        num_tensors: weights.named_tensors().len(),
    };
    info!(
        "wrote fixture to {} (seed={seed}, {} tensors, {} parameters)",
        dir.display(),
        summary.num_tensors,
        summary.num_parameters
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnn1d_core::cnn::{load_input, load_reference_output, tensor_names};

    #[test]
    fn test_fixture_is_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        generate_fixture(a.path(), 5, 0.1).unwrap();
        generate_fixture(b.path(), 5, 0.1).unwrap();

        let config = CnnConfig::STANDARD;
        assert_eq!(load_input(a.path(), &config).unwrap(), load_input(b.path(), &config).unwrap());
        assert_eq!(
            load_reference_output(a.path(), &config).unwrap(),
            load_reference_output(b.path(), &config).unwrap()
        );
    }

    #[test]
    fn test_fixture_writes_every_tensor() {
        let dir = tempfile::tempdir().unwrap();
        let summary = generate_fixture(dir.path(), 1, 0.2).unwrap();
        assert_eq!(summary.num_tensors, tensor_names(&CnnConfig::STANDARD).len());
        assert!(dir.path().join("input.bin").is_file());
        assert!(dir.path().join("output.bin").is_file());
    }

    #[test]
    fn test_rejects_bad_scale() {
        let dir = tempfile::tempdir().unwrap();
        assert!(generate_fixture(dir.path(), 1, 0.0).is_err());
        assert!(generate_fixture(dir.path(), 1, f32::NAN).is_err());
    }
}
