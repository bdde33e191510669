//! タイル版 Forward Pass
//!
//! 参照版と同じ計算を、性能向けに組み替えた実装。
//!
//! # 構成
//!
//! ```text
//! 畳み込み:
//!   入力をゼロパディング済みローカルキャッシュへ展開（境界分岐を除去）
//!   出力チャネルを CONV_TILE 本ずつのタイルに分割し、タイル単位で並列実行
//!   重みは [tile][ic][k][oc_in_tile] に並べ替え済み
//!   Conv → BN → ReLU → MaxPool をタイル内で融合
//!
//! 全結合:
//!   出力行を DENSE_TILE 行ずつのタイルに分割し、タイル単位で並列実行
//!   内積は REDUCE_LANES 本の独立アキュムレータ + ツリー集約
//! ```
//!
//! 各タイルは出力の互いに素な範囲だけに書き込む。ステージ境界では
//! 前段の出力がすべて確定してから次段を開始する。
//!
//! 畳み込みの加算順は参照版と同じ（バイアス → 入力チャネル → タップ）なので一致する。
//! 全結合と RMS の二乗和は加算順が異なるため、一致は許容誤差内。

use super::config::ConvStageConfig;
use super::constants::{POOL_WINDOW, RMS_EPS};
use super::error::{check_len, CnnResult};
use super::forward::{Scratch, StageBuffers};
use super::layers::assert_len;
use super::weights::CnnWeights;
use rayon::prelude::*;

/// 畳み込みタイルあたりの出力チャネル数
pub const CONV_TILE: usize = 8;

/// 全結合タイルあたりの出力行数
pub const DENSE_TILE: usize = 32;

/// 内積の独立アキュムレータ数（2 の冪）
pub const REDUCE_LANES: usize = 8;

// =============================================================================
// 重みタイル
// =============================================================================

/// 畳み込み重みをタイル形式に並べ替える
///
/// 入力: `w[oc][ic][k]`
/// 出力: タイルごとに `tile[ic][k][oc_in_tile]`（最内が出力チャネル）
pub fn tile_conv_weights(weight: &[f32], stage: &ConvStageConfig) -> Vec<Box<[f32]>> {
    let (c_in, c_out, k_size) = (stage.in_channels, stage.out_channels, stage.kernel_size);
    assert_len("conv weight", weight.len(), stage.weight_len());

    (0..c_out)
        .step_by(CONV_TILE)
        .map(|oc0| {
            let width = CONV_TILE.min(c_out - oc0);
            let mut tile = vec![0.0f32; c_in * k_size * width];
            for o in 0..width {
                for ic in 0..c_in {
                    for k in 0..k_size {
                        tile[(ic * k_size + k) * width + o] =
                            weight[((oc0 + o) * c_in + ic) * k_size + k];
                    }
                }
            }
            tile.into_boxed_slice()
        })
        .collect()
}

// =============================================================================
// 畳み込みステージ
// =============================================================================

/// ゼロパディング済みローカルキャッシュを構築
///
/// `padded[ic][pad + x] = input[ic][x]`、両端 `pad` 要素は 0。
pub fn fill_padded(input: &[f32], stage: &ConvStageConfig, padded: &mut [f32]) {
    let (len, pad) = (stage.length, stage.padding());
    let plen = len + 2 * pad;
    assert_len("conv input", input.len(), stage.input_len());
    assert_len("padded cache", padded.len(), stage.in_channels * plen);

    for (src, dst) in input.chunks_exact(len).zip(padded.chunks_exact_mut(plen)) {
        dst[..pad].fill(0.0);
        dst[pad..pad + len].copy_from_slice(src);
        dst[pad + len..].fill(0.0);
    }
}

/// BatchNorm の per-channel 定数（タイル単位で切り出して使う）
struct BnTile<'a> {
    mean: &'a [f32],
    inv_sigma: &'a [f32],
    gamma: &'a [f32],
    beta: &'a [f32],
}

/// 1 タイル分の Conv → BN → ReLU
///
/// `conv_out` は `[width][len]`。
fn conv_tile(
    padded: &[f32],
    tile_w: &[f32],
    bias: &[f32],
    bn: &BnTile<'_>,
    stage: &ConvStageConfig,
    conv_out: &mut [f32],
) {
    let (len, k_size) = (stage.length, stage.kernel_size);
    let plen = len + 2 * stage.padding();
    let width = conv_out.len() / len;

    // バイアスで初期化
    for (row, &b) in conv_out.chunks_exact_mut(len).zip(bias) {
        row.fill(b);
    }

    // 積和: 入力チャネル → タップ → タイル内チャネル → 位置
    for (ic, prow) in padded.chunks_exact(plen).enumerate() {
        for k in 0..k_size {
            let w_k = &tile_w[(ic * k_size + k) * width..][..width];
            let src = &prow[k..k + len];
            for (row, &w) in conv_out.chunks_exact_mut(len).zip(w_k) {
                for (acc, &s) in row.iter_mut().zip(src) {
                    *acc += s * w;
                }
            }
        }
    }

    // BN + ReLU（融合）
    for (o, row) in conv_out.chunks_exact_mut(len).enumerate() {
        let (mean, scale, gamma, beta) = (bn.mean[o], bn.inv_sigma[o], bn.gamma[o], bn.beta[o]);
        for v in row.iter_mut() {
            let normalized = (*v - mean) * scale;
            *v = (normalized * gamma + beta).max(0.0);
        }
    }
}

/// タイル内の MaxPool
fn pool_tile(conv_out: &[f32], len: usize, pooled: &mut [f32]) {
    let out_len = len / POOL_WINDOW;
    for (in_row, out_row) in conv_out.chunks_exact(len).zip(pooled.chunks_exact_mut(out_len)) {
        for (i, out) in out_row.iter_mut().enumerate() {
            let base = i * POOL_WINDOW;
            *out = in_row[base].max(in_row[base + 1]);
        }
    }
}

// =============================================================================
// 全結合・正規化
// =============================================================================

/// REDUCE_LANES 本の独立アキュムレータによる内積
#[inline]
pub fn dot_wide(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut lanes = [0.0f32; REDUCE_LANES];

    let a_chunks = a.chunks_exact(REDUCE_LANES);
    let b_chunks = b.chunks_exact(REDUCE_LANES);
    let (a_rem, b_rem) = (a_chunks.remainder(), b_chunks.remainder());

    for (ca, cb) in a_chunks.zip(b_chunks) {
        for l in 0..REDUCE_LANES {
            lanes[l] += ca[l] * cb[l];
        }
    }

    let mut sum = reduce_lanes(lanes);
    for (&x, &y) in a_rem.iter().zip(b_rem) {
        sum += x * y;
    }
    sum
}

/// ツリー集約（lane 数は 2 の冪）
#[inline]
fn reduce_lanes(mut lanes: [f32; REDUCE_LANES]) -> f32 {
    let mut width = REDUCE_LANES;
    while width > 1 {
        width /= 2;
        for l in 0..width {
            lanes[l] += lanes[l + width];
        }
    }
    lanes[0]
}

/// 全結合層（行タイル並列）
pub fn dense_tiled(input: &[f32], weight: &[f32], bias: &[f32], output: &mut [f32]) {
    let (n_in, n_out) = (input.len(), output.len());
    assert_len("dense weight", weight.len(), n_out * n_in);
    assert_len("dense bias", bias.len(), n_out);

    output
        .par_chunks_mut(DENSE_TILE)
        .zip(weight.par_chunks(DENSE_TILE * n_in))
        .zip(bias.par_chunks(DENSE_TILE))
        .for_each(|((out_tile, w_tile), b_tile)| {
            for ((out, row), &b) in out_tile.iter_mut().zip(w_tile.chunks_exact(n_in)).zip(b_tile)
            {
                *out = b + dot_wide(row, input);
            }
        });
}

/// RMS 正規化（二乗和をワイドリダクションで求める）
pub fn rms_normalize_wide(x: &mut [f32], eps: f32) {
    if x.is_empty() {
        return;
    }
    let sum_sq = dot_wide(x, x);
    let rms = (sum_sq / x.len() as f32 + eps).sqrt();
    for v in x.iter_mut() {
        *v /= rms;
    }
}

// =============================================================================
// TiledNetwork
// =============================================================================

/// タイル版ネットワーク
///
/// 構築時に重みをタイル形式へ並べ替え、BatchNorm の `inv_sigma` を前計算する。
/// 推論中は不変で `Sync`。
pub struct TiledNetwork {
    weights: CnnWeights,
    /// ステージごとの畳み込み重みタイル
    conv_tiles: Vec<Vec<Box<[f32]>>>,
    /// ステージごとの `1 / sqrt(var + eps)`
    inv_sigma: Vec<Vec<f32>>,
}

impl TiledNetwork {
    /// 重みからタイル版ネットワークを構築
    pub fn new(weights: CnnWeights) -> CnnResult<Self> {
        weights.validate()?;

        let conv_tiles = weights
            .config
            .conv
            .iter()
            .zip(&weights.blocks)
            .map(|(stage, block)| tile_conv_weights(&block.conv.weight, stage))
            .collect();
        let inv_sigma = weights.blocks.iter().map(|b| b.bn.inv_sigma()).collect();

        Ok(Self {
            weights,
            conv_tiles,
            inv_sigma,
        })
    }

    /// 元の重み
    #[inline]
    pub fn weights(&self) -> &CnnWeights {
        &self.weights
    }

    /// 元の重みを取り出す
    pub fn into_weights(self) -> CnnWeights {
        self.weights
    }

    /// ステージ `i` のタイル数
    #[inline]
    pub fn num_conv_tiles(&self, stage: usize) -> usize {
        self.conv_tiles[stage].len()
    }

    /// 畳み込みステージ 1 段（タイル並列）
    fn conv_stage(&self, i: usize, input: &[f32], buf: &mut StageBuffers) {
        let stage = &self.weights.config.conv[i];
        let block = &self.weights.blocks[i];
        let tiles = &self.conv_tiles[i];
        let inv_sigma = &self.inv_sigma[i];
        let len = stage.length;

        fill_padded(input, stage, &mut buf.padded);
        let padded = &buf.padded;

        let run_tile = |t: usize, conv_out: &mut [f32]| {
            let oc0 = t * CONV_TILE;
            let width = conv_out.len() / len;
            let bn = BnTile {
                mean: &block.bn.running_mean[oc0..oc0 + width],
                inv_sigma: &inv_sigma[oc0..oc0 + width],
                gamma: &block.bn.weight[oc0..oc0 + width],
                beta: &block.bn.bias[oc0..oc0 + width],
            };
            conv_tile(
                padded,
                &tiles[t],
                &block.conv.bias[oc0..oc0 + width],
                &bn,
                stage,
                conv_out,
            );
        };

        if stage.pool {
            let out_len = stage.output_length();
            buf.conv
                .par_chunks_mut(CONV_TILE * len)
                .zip(buf.pooled.par_chunks_mut(CONV_TILE * out_len))
                .enumerate()
                .for_each(|(t, (conv_out, pooled))| {
                    run_tile(t, conv_out);
                    pool_tile(conv_out, len, pooled);
                });
        } else {
            buf.conv
                .par_chunks_mut(CONV_TILE * len)
                .enumerate()
                .for_each(|(t, conv_out)| run_tile(t, conv_out));
        }
    }

    /// タイル版 forward pass
    ///
    /// 引数と戻り値は `forward_reference` と同じ。
    pub fn forward(&self, input: &[f32], scratch: &mut Scratch, output: &mut [f32]) -> CnnResult<()> {
        let config = &self.weights.config;
        check_len("input", input.len(), config.input_len)?;
        check_len("output", output.len(), config.output_len())?;

        for i in 0..config.conv.len() {
            let (done, rest) = scratch.stages.split_at_mut(i);
            let src = if i == 0 { input } else { done[i - 1].output() };
            self.conv_stage(i, src, &mut rest[0]);
        }

        // Flatten: 最終ステージの出力はチャネル優先で連続している
        let last_out = scratch.stages[config.conv.len() - 1].output();
        assert_len("flatten output", scratch.flat.len(), last_out.len());
        scratch.flat.copy_from_slice(last_out);

        dense_tiled(&scratch.flat, &self.weights.fc1.weight, &self.weights.fc1.bias, &mut scratch.hidden);
        for v in scratch.hidden.iter_mut() {
            *v = v.max(0.0);
        }

        dense_tiled(&scratch.hidden, &self.weights.fc2.weight, &self.weights.fc2.bias, output);
        rms_normalize_wide(output, RMS_EPS);

        Ok(())
    }

    /// 作業領域と出力を確保して forward pass を実行
    pub fn infer(&self, input: &[f32]) -> CnnResult<Vec<f32>> {
        let mut scratch = Scratch::new(&self.weights.config);
        let mut output = vec![0.0; self.weights.config.output_len()];
        self.forward(input, &mut scratch, &mut output)?;
        Ok(output)
    }
}
