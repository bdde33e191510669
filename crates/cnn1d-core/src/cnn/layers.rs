//! ネットワーク層の実装（スカラー参照版）
//!
//! - `conv1d_same`: ゼロパディング付き same 畳み込み
//! - `batch_norm_inference`: running statistics による BatchNorm
//! - `relu_inplace`: ReLU
//! - `max_pool2`: 窓幅 2・ストライド 2 の MaxPool
//! - `flatten_channel_major`: `[C][L]` → `C*L`
//! - `dense`: 全結合アフィン変換
//! - `rms_normalize`: RMS 正規化
//!
//! 信号はすべて `[channels][length]` を平坦化した f32 スライスで受け渡す。
//! 長さ不一致は呼び出し側のバグなので panic する。

use super::config::ConvStageConfig;
use super::constants::POOL_WINDOW;
use super::weights::BatchNormParams;

/// バッファ長の事前条件を検査する
#[inline]
#[track_caller]
pub(crate) fn assert_len(name: &str, actual: usize, expected: usize) {
    assert!(
        actual == expected,
        "buffer `{name}` has {actual} elements, expected {expected}"
    );
}

// =============================================================================
// Conv1D
// =============================================================================

/// same 畳み込み（対称ゼロパディング `k/2`）
///
/// `out[oc][x] = bias[oc] + Σ_ic Σ_k in[ic][x + k - pad] * w[oc][ic][k]`
///
/// 加算順はバイアス → 入力チャネル → タップの順で、参照モデルと同じ丸めになる。
/// 範囲外の入力は 0 として積を加算する。
pub fn conv1d_same(
    input: &[f32],
    weight: &[f32],
    bias: &[f32],
    stage: &ConvStageConfig,
    output: &mut [f32],
) {
    let (c_in, c_out, k_size, len) =
        (stage.in_channels, stage.out_channels, stage.kernel_size, stage.length);
    assert_len("conv input", input.len(), stage.input_len());
    assert_len("conv weight", weight.len(), stage.weight_len());
    assert_len("conv bias", bias.len(), c_out);
    assert_len("conv output", output.len(), stage.conv_len());

    let pad = stage.padding() as isize;

    for oc in 0..c_out {
        for x in 0..len {
            let mut acc = bias[oc];

            for ic in 0..c_in {
                let w_row = &weight[(oc * c_in + ic) * k_size..][..k_size];
                let in_row = &input[ic * len..][..len];
                for (k, &w) in w_row.iter().enumerate() {
                    let idx = x as isize + k as isize - pad;
                    let in_val = if idx >= 0 && (idx as usize) < len {
                        in_row[idx as usize]
                    } else {
                        0.0
                    };
                    acc += in_val * w;
                }
            }

            output[oc * len + x] = acc;
        }
    }
}

// =============================================================================
// BatchNorm（推論モード）
// =============================================================================

/// BatchNorm（推論モード、in-place）
///
/// `y = (x - mean[c]) * inv_sigma[c] * weight[c] + bias[c]`、
/// `inv_sigma = 1 / sqrt(var + eps)` はチャネルごとに 1 回だけ計算する。
pub fn batch_norm_inference(
    signal: &mut [f32],
    bn: &BatchNormParams,
    channels: usize,
    length: usize,
) {
    assert_len("batchnorm signal", signal.len(), channels * length);
    assert_len("bn weight", bn.weight.len(), channels);
    assert_len("bn bias", bn.bias.len(), channels);
    assert_len("bn running_mean", bn.running_mean.len(), channels);
    assert_len("bn running_var", bn.running_var.len(), channels);

    let inv_sigma = bn.inv_sigma();
    for (c, row) in signal.chunks_exact_mut(length).enumerate() {
        let (mean, scale, gamma, beta) =
            (bn.running_mean[c], inv_sigma[c], bn.weight[c], bn.bias[c]);
        for v in row.iter_mut() {
            let normalized = (*v - mean) * scale;
            *v = normalized * gamma + beta;
        }
    }
}

// =============================================================================
// ReLU
// =============================================================================

/// ReLU（in-place）
#[inline]
pub fn relu_inplace(x: &mut [f32]) {
    for v in x.iter_mut() {
        *v = v.max(0.0);
    }
}

// =============================================================================
// MaxPool
// =============================================================================

/// MaxPool（窓幅 2、ストライド 2）
///
/// 出力長は `length / 2`。奇数長の末尾要素は捨てる。
pub fn max_pool2(input: &[f32], channels: usize, length: usize, output: &mut [f32]) {
    let out_len = length / POOL_WINDOW;
    assert_len("maxpool input", input.len(), channels * length);
    assert_len("maxpool output", output.len(), channels * out_len);

    for (in_row, out_row) in input.chunks_exact(length).zip(output.chunks_exact_mut(out_len)) {
        for (i, out) in out_row.iter_mut().enumerate() {
            let base = i * POOL_WINDOW;
            *out = in_row[base].max(in_row[base + 1]);
        }
    }
}

// =============================================================================
// Flatten
// =============================================================================

/// Flatten（チャネル優先）
///
/// チャネル 0 の全位置、チャネル 1 の全位置、… の順に並べる。
/// FC1 の重みはこの並びを前提にしている。
pub fn flatten_channel_major(signal: &[f32], channels: usize, length: usize, output: &mut [f32]) {
    assert_len("flatten input", signal.len(), channels * length);
    assert_len("flatten output", output.len(), channels * length);

    for c in 0..channels {
        for x in 0..length {
            output[c * length + x] = signal[c * length + x];
        }
    }
}

// =============================================================================
// Dense
// =============================================================================

/// 全結合層
///
/// `out[o] = bias[o] + Σ_i w[o][i] * in[i]`（バイアスから順に加算）
pub fn dense(input: &[f32], weight: &[f32], bias: &[f32], output: &mut [f32]) {
    let (n_in, n_out) = (input.len(), output.len());
    assert_len("dense weight", weight.len(), n_out * n_in);
    assert_len("dense bias", bias.len(), n_out);

    for (o, out) in output.iter_mut().enumerate() {
        let row = &weight[o * n_in..][..n_in];
        let mut acc = bias[o];
        for (&x, &w) in input.iter().zip(row.iter()) {
            acc += x * w;
        }
        *out = acc;
    }
}

// =============================================================================
// RMS 正規化
// =============================================================================

/// RMS 正規化（in-place）
///
/// `rms = sqrt(mean(x²) + eps)` を求めてから全要素を割る。
/// 二乗和が確定するまで除算は始められない。
pub fn rms_normalize(x: &mut [f32], eps: f32) {
    if x.is_empty() {
        return;
    }

    let sum_sq: f32 = x.iter().map(|v| v * v).sum();
    let rms = (sum_sq / x.len() as f32 + eps).sqrt();

    for v in x.iter_mut() {
        *v /= rms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::constants::RMS_EPS;

    fn stage(c_in: usize, c_out: usize, k: usize, len: usize) -> ConvStageConfig {
        ConvStageConfig {
            in_channels: c_in,
            out_channels: c_out,
            kernel_size: k,
            length: len,
            pool: false,
        }
    }

    #[test]
    fn test_conv_identity_kernel() {
        // 中央タップのみ 1 → 出力 = 入力 + バイアス
        let s = stage(1, 1, 3, 5);
        let input = [1.0, 2.0, 3.0, 4.0, 5.0];
        let weight = [0.0, 1.0, 0.0];
        let mut out = [0.0; 5];
        conv1d_same(&input, &weight, &[0.5], &s, &mut out);
        assert_eq!(out, [1.5, 2.5, 3.5, 4.5, 5.5]);
    }

    #[test]
    fn test_conv_zero_padding_edges() {
        // 全タップ 1 の窓和。端はパディングの 0 を含む
        let s = stage(1, 1, 3, 4);
        let input = [1.0, 2.0, 3.0, 4.0];
        let weight = [1.0, 1.0, 1.0];
        let mut out = [0.0; 4];
        conv1d_same(&input, &weight, &[0.0], &s, &mut out);
        assert_eq!(out, [3.0, 6.0, 9.0, 7.0]);
    }

    #[test]
    fn test_conv_multichannel_layout() {
        // w[oc][ic][k]: oc0 は ic0 の右隣、ic1 の左隣を拾う
        let s = stage(2, 1, 3, 3);
        let input = [1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
        let weight = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let mut out = [0.0; 3];
        conv1d_same(&input, &weight, &[0.0], &s, &mut out);
        // x=0: in0[1] + in1[-1]=2+0, x=1: in0[2]+in1[0]=3+10, x=2: 0+in1[1]=20
        assert_eq!(out, [2.0, 13.0, 20.0]);
    }

    #[test]
    #[should_panic(expected = "conv weight")]
    fn test_conv_rejects_short_weight() {
        let s = stage(1, 2, 3, 4);
        let mut out = [0.0; 8];
        conv1d_same(&[0.0; 4], &[0.0; 5], &[0.0; 2], &s, &mut out);
    }

    #[test]
    fn test_batch_norm_formula() {
        let bn = BatchNormParams {
            weight: vec![2.0, 1.0].into_boxed_slice(),
            bias: vec![0.5, -1.0].into_boxed_slice(),
            running_mean: vec![1.0, 0.0].into_boxed_slice(),
            running_var: vec![4.0 - 1e-5, 1.0 - 1e-5].into_boxed_slice(),
        };
        let mut signal = [3.0, 5.0, 2.0, -2.0];
        batch_norm_inference(&mut signal, &bn, 2, 2);
        // ch0: (x-1)/2*2+0.5 → 2.5, 4.5 / ch1: x-1 → 1, -3
        let expected = [2.5, 4.5, 1.0, -3.0];
        for (a, b) in signal.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_batch_norm_ignores_input_statistics() {
        // 入力の平均・分散が何であっても running stats のみで変換される
        let bn = BatchNormParams::identity(1);
        let mut a = [100.0, 100.0, 100.0];
        batch_norm_inference(&mut a, &bn, 1, 3);
        for v in a {
            assert!((v - 100.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_relu() {
        let mut x = [-1.0, 0.0, 2.5, -0.0];
        relu_inplace(&mut x);
        assert_eq!(x, [0.0, 0.0, 2.5, 0.0]);
    }

    #[test]
    fn test_max_pool_drops_trailing_element() {
        let input = [1.0, 3.0, 2.0, -1.0, 99.0, /* ch1 */ -5.0, -6.0, 0.0, 7.0, 99.0];
        let mut out = [0.0; 4];
        max_pool2(&input, 2, 5, &mut out);
        assert_eq!(out, [3.0, 2.0, -5.0, 7.0]);
    }

    #[test]
    fn test_flatten_channel_major_order() {
        let signal = [0.0, 1.0, 2.0, 10.0, 11.0, 12.0];
        let mut out = [0.0; 6];
        flatten_channel_major(&signal, 2, 3, &mut out);
        assert_eq!(out, signal);
    }

    #[test]
    fn test_dense() {
        let input = [1.0, 2.0];
        let weight = [1.0, 1.0, /* row1 */ 0.5, -1.0, /* row2 */ 0.0, 0.0];
        let bias = [0.0, 1.0, 7.0];
        let mut out = [0.0; 3];
        dense(&input, &weight, &bias, &mut out);
        assert_eq!(out, [3.0, -0.5, 7.0]);
    }

    #[test]
    fn test_rms_normalize_unit_second_moment() {
        let mut x: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.37).sin() * 5.0).collect();
        rms_normalize(&mut x, RMS_EPS);
        let mean_sq = x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32;
        assert!((mean_sq - 1.0).abs() < 1e-3, "mean_sq = {mean_sq}");
    }

    #[test]
    fn test_rms_normalize_zero_vector() {
        let mut x = vec![0.0f32; 1000];
        rms_normalize(&mut x, RMS_EPS);
        assert!(x.iter().all(|&v| v == 0.0));
    }
}
