//! 参照 Forward Pass
//!
//! 素直な多重ループで書いた基準実装。タイル版（`tiled`）の数値検証の基準になる。
//!
//! 中間バッファはすべて呼び出し側が所有する `Scratch` に置く。
//! 呼び出し間で状態を持ち越さないため、重みを共有したまま並行に呼び出せる。

use super::config::{CnnConfig, ConvStageConfig};
use super::constants::RMS_EPS;
use super::error::{check_len, CnnResult};
use super::layers::{
    batch_norm_inference, conv1d_same, dense, flatten_channel_major, max_pool2, relu_inplace,
    rms_normalize,
};
use super::weights::{ConvBlock, CnnWeights};

// =============================================================================
// Scratch
// =============================================================================

/// 畳み込みステージ 1 段分の中間バッファ
pub struct StageBuffers {
    /// Conv → BN → ReLU の出力 [out_channels][length]
    pub conv: Vec<f32>,
    /// MaxPool 出力 [out_channels][length / 2]（プーリングなしのステージでは空）
    pub pooled: Vec<f32>,
    /// ゼロパディング済み入力のローカルキャッシュ [in_channels][length + 2 * pad]
    ///
    /// タイル版のみが使う。
    pub padded: Vec<f32>,
}

impl StageBuffers {
    fn new(stage: &ConvStageConfig) -> Self {
        Self {
            conv: vec![0.0; stage.conv_len()],
            pooled: if stage.pool { vec![0.0; stage.output_len()] } else { Vec::new() },
            padded: vec![0.0; stage.in_channels * (stage.length + 2 * stage.padding())],
        }
    }

    /// 次のステージへ渡す信号
    #[inline]
    pub fn output(&self) -> &[f32] {
        if self.pooled.is_empty() { &self.conv } else { &self.pooled }
    }
}

/// 1 推論分の作業領域
///
/// 呼び出しごとに全要素が上書きされる。
pub struct Scratch {
    /// 畳み込みステージごとのバッファ
    pub stages: Vec<StageBuffers>,
    /// Flatten 出力
    pub flat: Vec<f32>,
    /// FC1 + ReLU 出力
    pub hidden: Vec<f32>,
}

impl Scratch {
    /// 構成に合わせて確保
    pub fn new(config: &CnnConfig) -> Self {
        Self {
            stages: config.conv.iter().map(StageBuffers::new).collect(),
            flat: vec![0.0; config.flatten_len()],
            hidden: vec![0.0; config.fc1.out_features],
        }
    }
}

// =============================================================================
// Forward
// =============================================================================

/// 畳み込みステージ 1 段（Conv → BN → ReLU → [MaxPool]）
pub fn conv_stage(input: &[f32], block: &ConvBlock, stage: &ConvStageConfig, buf: &mut StageBuffers) {
    conv1d_same(input, &block.conv.weight, &block.conv.bias, stage, &mut buf.conv);
    batch_norm_inference(&mut buf.conv, &block.bn, stage.out_channels, stage.length);
    relu_inplace(&mut buf.conv);
    if stage.pool {
        max_pool2(&buf.conv, stage.out_channels, stage.length, &mut buf.pooled);
    }
}

/// 参照 forward pass
///
/// # 引数
///
/// - `weights`: 検証済みの重み
/// - `input`: 入力信号（`config.input_len` 要素）
/// - `scratch`: `Scratch::new(&weights.config)` で確保した作業領域
/// - `output`: スコア出力（`config.output_len()` 要素）、RMS 正規化済みで返る
pub fn forward_reference(
    weights: &CnnWeights,
    input: &[f32],
    scratch: &mut Scratch,
    output: &mut [f32],
) -> CnnResult<()> {
    let config = &weights.config;
    check_len("input", input.len(), config.input_len)?;
    check_len("output", output.len(), config.output_len())?;

    // Conv1..Conv3
    for (i, (stage, block)) in config.conv.iter().zip(&weights.blocks).enumerate() {
        let (done, rest) = scratch.stages.split_at_mut(i);
        let src = if i == 0 { input } else { done[i - 1].output() };
        conv_stage(src, block, stage, &mut rest[0]);
    }

    // Flatten
    let last = &config.conv[config.conv.len() - 1];
    let last_out = scratch.stages[config.conv.len() - 1].output();
    flatten_channel_major(last_out, last.out_channels, last.output_length(), &mut scratch.flat);

    // FC1 + ReLU
    dense(&scratch.flat, &weights.fc1.weight, &weights.fc1.bias, &mut scratch.hidden);
    relu_inplace(&mut scratch.hidden);

    // FC2（生スコア）
    dense(&scratch.hidden, &weights.fc2.weight, &weights.fc2.bias, output);

    // RMS 正規化
    rms_normalize(output, RMS_EPS);

    Ok(())
}

/// 作業領域と出力を確保して参照 forward pass を実行
pub fn infer_reference(weights: &CnnWeights, input: &[f32]) -> CnnResult<Vec<f32>> {
    let mut scratch = Scratch::new(&weights.config);
    let mut output = vec![0.0; weights.config.output_len()];
    forward_reference(weights, input, &mut scratch, &mut output)?;
    Ok(output)
}
