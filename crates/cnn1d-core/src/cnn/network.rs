//! CnnNetwork - 実行戦略を統一的に扱う列挙型
//!
//! 参照版とタイル版は同じ重み・同じ入出力形状を持ち、結果は許容誤差内で一致する。
//! 呼び出し側は戦略を意識せず `forward` / `infer` を使う。

use super::error::CnnResult;
use super::forward::{forward_reference, Scratch};
use super::tiled::TiledNetwork;
use super::weights::CnnWeights;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// 実行戦略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// 多重ループの参照実装
    Reference,
    /// タイル分割 + 並列の性能向け実装
    Tiled,
}

impl Strategy {
    /// 全戦略
    pub const ALL: [Strategy; 2] = [Strategy::Reference, Strategy::Tiled];

    /// 文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Tiled => "tiled",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reference" | "ref" | "sequential" => Ok(Self::Reference),
            "tiled" | "tile" | "kernel" => Ok(Self::Tiled),
            other => Err(format!("Unknown strategy: {other}")),
        }
    }
}

/// 実行戦略ごとのネットワーク
pub enum CnnNetwork {
    /// 参照版（重みをそのまま使う）
    Reference(CnnWeights),
    /// タイル版（並べ替え済み重みを持つ）
    Tiled(TiledNetwork),
}

impl CnnNetwork {
    /// 重みと戦略からネットワークを構築
    pub fn new(weights: CnnWeights, strategy: Strategy) -> CnnResult<Self> {
        match strategy {
            Strategy::Reference => {
                weights.validate()?;
                Ok(Self::Reference(weights))
            }
            Strategy::Tiled => Ok(Self::Tiled(TiledNetwork::new(weights)?)),
        }
    }

    /// 現在の戦略
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Reference(_) => Strategy::Reference,
            Self::Tiled(_) => Strategy::Tiled,
        }
    }

    /// 重み
    pub fn weights(&self) -> &CnnWeights {
        match self {
            Self::Reference(w) => w,
            Self::Tiled(net) => net.weights(),
        }
    }

    /// 戦略を切り替える（重みは引き継ぐ）
    pub fn into_strategy(self, strategy: Strategy) -> CnnResult<Self> {
        if self.strategy() == strategy {
            return Ok(self);
        }
        let weights = match self {
            Self::Reference(w) => w,
            Self::Tiled(net) => net.into_weights(),
        };
        Self::new(weights, strategy)
    }

    /// この構成に合った作業領域を確保
    pub fn scratch(&self) -> Scratch {
        Scratch::new(&self.weights().config)
    }

    /// forward pass（作業領域・出力は呼び出し側が所有）
    #[inline]
    pub fn forward(&self, input: &[f32], scratch: &mut Scratch, output: &mut [f32]) -> CnnResult<()> {
        match self {
            Self::Reference(w) => forward_reference(w, input, scratch, output),
            Self::Tiled(net) => net.forward(input, scratch, output),
        }
    }

    /// forward pass（作業領域・出力をその場で確保）
    pub fn infer(&self, input: &[f32]) -> CnnResult<Vec<f32>> {
        let mut scratch = self.scratch();
        let mut output = vec![0.0; self.weights().config.output_len()];
        self.forward(input, &mut scratch, &mut output)?;
        Ok(output)
    }
}
