//! 1D CNN 定数定義
//!
//! 次元定数と数値定数。トポロジーは固定で、すべてコンパイル時に決まる。

// =============================================================================
// 入力
// =============================================================================

/// 入力信号長
pub const IN_SIZE: usize = 41;

/// 入力チャネル数（単一チャネルの 1D 信号）
pub const IN_CHANNELS: usize = 1;

// =============================================================================
// 畳み込みステージ
// =============================================================================

/// Conv1 出力チャネル数
pub const CHANNELS1: usize = 16;

/// Conv1 カーネル長
pub const KERNEL1: usize = 7;

/// Conv2 入力長（MaxPool1 出力: 41 / 2 = 20、末尾の1要素は捨てる）
pub const SIZE2: usize = IN_SIZE / POOL_WINDOW;

/// Conv2 出力チャネル数
pub const CHANNELS2: usize = 32;

/// Conv2 カーネル長
pub const KERNEL2: usize = 5;

/// Conv3 入力長（MaxPool2 出力: 20 / 2 = 10）
pub const SIZE3: usize = SIZE2 / POOL_WINDOW;

/// Conv3 出力チャネル数
pub const CHANNELS3: usize = 64;

/// Conv3 カーネル長
pub const KERNEL3: usize = 3;

/// 畳み込みステージ数
pub const NUM_CONV_STAGES: usize = 3;

/// MaxPool の窓幅（= ストライド）
pub const POOL_WINDOW: usize = 2;

// =============================================================================
// 全結合層
// =============================================================================

/// Flatten 後の次元（FC1 入力）
pub const FLATTEN_SIZE: usize = CHANNELS3 * SIZE3; // 640

/// FC1 出力次元（隠れ層）
pub const HIDDEN_SIZE: usize = 128;

/// FC2 出力次元（最終スコア）
pub const OUT_SIZE: usize = 1000;

// =============================================================================
// パラメータ要素数
// =============================================================================

pub const CONV1_WEIGHT_LEN: usize = CHANNELS1 * IN_CHANNELS * KERNEL1; // 112
pub const CONV2_WEIGHT_LEN: usize = CHANNELS2 * CHANNELS1 * KERNEL2; // 2560
pub const CONV3_WEIGHT_LEN: usize = CHANNELS3 * CHANNELS2 * KERNEL3; // 6144
pub const FC1_WEIGHT_LEN: usize = HIDDEN_SIZE * FLATTEN_SIZE; // 81920
pub const FC2_WEIGHT_LEN: usize = OUT_SIZE * HIDDEN_SIZE; // 128000

// =============================================================================
// 数値定数
// =============================================================================

/// BatchNorm の eps（PyTorch のデフォルト値）
pub const BN_EPS: f32 = 1e-5;

/// RMS 正規化の eps
pub const RMS_EPS: f32 = 1e-6;

/// 検証時の相対誤差しきい値
pub const VERIFY_REL_TOL: f32 = 1e-3;

/// 検証時の絶対誤差しきい値
pub const VERIFY_ABS_TOL: f32 = 0.05;
