//! ネットワーク構成
//!
//! 固定トポロジーの次元を 1 つの不変な構造体にまとめる。
//! 各ステージ実装はここから形状を受け取り、起動時に一度だけ `validate` する。

use super::constants::*;
use super::error::{CnnError, CnnResult};

/// 畳み込みステージ（Conv → BatchNorm → ReLU → [MaxPool]）の形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvStageConfig {
    /// 入力チャネル数
    pub in_channels: usize,
    /// 出力チャネル数
    pub out_channels: usize,
    /// カーネル長（奇数）
    pub kernel_size: usize,
    /// 入力長 = 出力長（same 畳み込み）
    pub length: usize,
    /// ステージ末尾に MaxPool を置くか
    pub pool: bool,
}

impl ConvStageConfig {
    /// 対称ゼロパディング幅
    #[inline]
    pub const fn padding(&self) -> usize {
        self.kernel_size / 2
    }

    /// 重み要素数 `[out][in][k]`
    #[inline]
    pub const fn weight_len(&self) -> usize {
        self.out_channels * self.in_channels * self.kernel_size
    }

    /// 入力信号の要素数
    #[inline]
    pub const fn input_len(&self) -> usize {
        self.in_channels * self.length
    }

    /// 畳み込み出力（プーリング前）の要素数
    #[inline]
    pub const fn conv_len(&self) -> usize {
        self.out_channels * self.length
    }

    /// ステージ出力長（プーリング後、奇数長なら末尾を捨てる）
    #[inline]
    pub const fn output_length(&self) -> usize {
        if self.pool { self.length / POOL_WINDOW } else { self.length }
    }

    /// ステージ出力の要素数
    #[inline]
    pub const fn output_len(&self) -> usize {
        self.out_channels * self.output_length()
    }

    /// 1 推論あたりの積和回数
    #[inline]
    pub const fn macs(&self) -> usize {
        self.out_channels * self.length * self.in_channels * self.kernel_size
    }
}

/// 全結合層の形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenseConfig {
    pub in_features: usize,
    pub out_features: usize,
}

impl DenseConfig {
    /// 重み要素数 `[out][in]`
    #[inline]
    pub const fn weight_len(&self) -> usize {
        self.out_features * self.in_features
    }

    /// 1 推論あたりの積和回数
    #[inline]
    pub const fn macs(&self) -> usize {
        self.weight_len()
    }
}

/// ネットワーク全体の構成
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CnnConfig {
    /// 入力信号長
    pub input_len: usize,
    /// 畳み込みステージ
    pub conv: [ConvStageConfig; NUM_CONV_STAGES],
    /// FC1（Flatten → 隠れ層、直後に ReLU）
    pub fc1: DenseConfig,
    /// FC2（隠れ層 → スコア、活性化なし）
    pub fc2: DenseConfig,
}

impl CnnConfig {
    /// 本番トポロジー: 41 → [16,k7] → [32,k5] → [64,k3] → 640 → 128 → 1000
    pub const STANDARD: Self = Self {
        input_len: IN_SIZE,
        conv: [
            ConvStageConfig {
                in_channels: IN_CHANNELS,
                out_channels: CHANNELS1,
                kernel_size: KERNEL1,
                length: IN_SIZE,
                pool: true,
            },
            ConvStageConfig {
                in_channels: CHANNELS1,
                out_channels: CHANNELS2,
                kernel_size: KERNEL2,
                length: SIZE2,
                pool: true,
            },
            ConvStageConfig {
                in_channels: CHANNELS2,
                out_channels: CHANNELS3,
                kernel_size: KERNEL3,
                length: SIZE3,
                pool: false,
            },
        ],
        fc1: DenseConfig {
            in_features: FLATTEN_SIZE,
            out_features: HIDDEN_SIZE,
        },
        fc2: DenseConfig {
            in_features: HIDDEN_SIZE,
            out_features: OUT_SIZE,
        },
    };

    /// 最終スコア次元
    #[inline]
    pub const fn output_len(&self) -> usize {
        self.fc2.out_features
    }

    /// Flatten 後の次元
    #[inline]
    pub const fn flatten_len(&self) -> usize {
        self.conv[NUM_CONV_STAGES - 1].output_len()
    }

    /// 構成の整合性を検証
    ///
    /// ステージ間の形状の受け渡しが一致していること、カーネルが奇数であること、
    /// Flatten 次元が FC1 入力と一致することを確認する。
    pub fn validate(&self) -> CnnResult<()> {
        let first = &self.conv[0];
        if first.in_channels != IN_CHANNELS {
            return Err(CnnError::InvalidConfig(format!(
                "conv1 in_channels={}, expected {IN_CHANNELS}",
                first.in_channels
            )));
        }
        if first.length != self.input_len {
            return Err(CnnError::InvalidConfig(format!(
                "conv1 length={}, expected input_len={}",
                first.length, self.input_len
            )));
        }

        for (i, stage) in self.conv.iter().enumerate() {
            let n = i + 1;
            if stage.kernel_size == 0 || stage.kernel_size % 2 == 0 {
                return Err(CnnError::InvalidConfig(format!(
                    "conv{n} kernel_size={} must be odd",
                    stage.kernel_size
                )));
            }
            if stage.in_channels == 0 || stage.out_channels == 0 || stage.output_length() == 0 {
                return Err(CnnError::InvalidConfig(format!("conv{n} has an empty dimension")));
            }
        }

        for (i, pair) in self.conv.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.in_channels != prev.out_channels {
                return Err(CnnError::InvalidConfig(format!(
                    "conv{} in_channels={} does not match conv{} out_channels={}",
                    i + 2,
                    next.in_channels,
                    i + 1,
                    prev.out_channels
                )));
            }
            if next.length != prev.output_length() {
                return Err(CnnError::InvalidConfig(format!(
                    "conv{} length={} does not match conv{} output length={}",
                    i + 2,
                    next.length,
                    i + 1,
                    prev.output_length()
                )));
            }
        }

        if self.fc1.in_features != self.flatten_len() {
            return Err(CnnError::InvalidConfig(format!(
                "fc1 in_features={}, expected flatten size {}",
                self.fc1.in_features,
                self.flatten_len()
            )));
        }
        if self.fc2.in_features != self.fc1.out_features {
            return Err(CnnError::InvalidConfig(format!(
                "fc2 in_features={}, expected fc1 out_features={}",
                self.fc2.in_features, self.fc1.out_features
            )));
        }
        if self.fc2.out_features == 0 {
            return Err(CnnError::InvalidConfig("fc2 out_features must be > 0".to_string()));
        }

        Ok(())
    }
}

impl Default for CnnConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}
