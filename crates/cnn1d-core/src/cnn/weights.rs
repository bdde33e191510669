//! 1D CNN 重み構造体
//!
//! パラメータファイルから読み込んだ重みを保持する。推論中は不変で、
//! 複数スレッドから同時に読み出してよい。

use super::config::{CnnConfig, ConvStageConfig, DenseConfig};
use super::constants::BN_EPS;
use super::error::{check_len, CnnError, CnnResult};
use rand::Rng;

/// 畳み込み層の重み
pub struct ConvWeights {
    /// 重み: f32[out][in][k]（row-major、カーネル位置が最内）
    pub weight: Box<[f32]>,

    /// バイアス: f32[out]
    pub bias: Box<[f32]>,
}

/// BatchNorm（推論モード）のパラメータ
///
/// running statistics は学習時に確定した定数で、入力から再計算しない。
pub struct BatchNormParams {
    /// スケール γ
    pub weight: Box<[f32]>,
    /// シフト β
    pub bias: Box<[f32]>,
    /// 学習時の移動平均
    pub running_mean: Box<[f32]>,
    /// 学習時の移動分散
    pub running_var: Box<[f32]>,
}

impl BatchNormParams {
    /// チャネルごとの `1 / sqrt(running_var + eps)`
    pub fn inv_sigma(&self) -> Vec<f32> {
        self.running_var.iter().map(|&v| 1.0 / (v + BN_EPS).sqrt()).collect()
    }

    /// 恒等変換になるパラメータ（weight=1, bias=0, mean=0, var=1-eps）
    pub fn identity(channels: usize) -> Self {
        Self {
            weight: vec![1.0; channels].into_boxed_slice(),
            bias: vec![0.0; channels].into_boxed_slice(),
            running_mean: vec![0.0; channels].into_boxed_slice(),
            running_var: vec![1.0 - BN_EPS; channels].into_boxed_slice(),
        }
    }
}

/// 畳み込みステージ 1 段分（Conv + BatchNorm）
pub struct ConvBlock {
    pub conv: ConvWeights,
    pub bn: BatchNormParams,
}

impl ConvBlock {
    /// 新規作成（ゼロ初期化、BatchNorm は恒等）
    pub fn new(stage: &ConvStageConfig) -> Self {
        Self {
            conv: ConvWeights {
                weight: vec![0.0; stage.weight_len()].into_boxed_slice(),
                bias: vec![0.0; stage.out_channels].into_boxed_slice(),
            },
            bn: BatchNormParams::identity(stage.out_channels),
        }
    }
}

/// 全結合層の重み
pub struct DenseWeights {
    /// 重み: f32[out][in]（row-major）
    pub weight: Box<[f32]>,

    /// バイアス: f32[out]
    pub bias: Box<[f32]>,
}

impl DenseWeights {
    /// 新規作成（ゼロ初期化）
    pub fn new(shape: &DenseConfig) -> Self {
        Self {
            weight: vec![0.0; shape.weight_len()].into_boxed_slice(),
            bias: vec![0.0; shape.out_features].into_boxed_slice(),
        }
    }
}

/// ネットワーク全体の重み
pub struct CnnWeights {
    /// 構成（検証済み）
    pub config: CnnConfig,

    /// 畳み込みステージ（conv1, conv2, conv3）
    pub blocks: Vec<ConvBlock>,

    /// FC1
    pub fc1: DenseWeights,

    /// FC2
    pub fc2: DenseWeights,
}

impl CnnWeights {
    /// 新規作成（ゼロ初期化、BatchNorm は恒等）
    pub fn new(config: CnnConfig) -> CnnResult<Self> {
        config.validate()?;
        Ok(Self {
            blocks: config.conv.iter().map(ConvBlock::new).collect(),
            fc1: DenseWeights::new(&config.fc1),
            fc2: DenseWeights::new(&config.fc2),
            config,
        })
    }

    /// 一様乱数で初期化した重み
    ///
    /// 重み・バイアスは `[-scale, scale)`、BatchNorm の分散は `[0.5, 1.5)` から引く。
    /// テスト用フィクスチャ生成で使う。
    pub fn random<R: Rng>(config: CnnConfig, rng: &mut R, scale: f32) -> CnnResult<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(CnnError::InvalidConfig(format!("random weight scale must be > 0: {scale}")));
        }
        let mut weights = Self::new(config)?;

        for block in &mut weights.blocks {
            fill_uniform(rng, &mut block.conv.weight, -scale, scale);
            fill_uniform(rng, &mut block.conv.bias, -scale, scale);
            fill_uniform(rng, &mut block.bn.weight, -scale, scale);
            fill_uniform(rng, &mut block.bn.bias, -scale, scale);
            fill_uniform(rng, &mut block.bn.running_mean, -scale, scale);
        }
        fill_uniform(rng, &mut weights.fc1.weight, -scale, scale);
        fill_uniform(rng, &mut weights.fc1.bias, -scale, scale);
        fill_uniform(rng, &mut weights.fc2.weight, -scale, scale);
        fill_uniform(rng, &mut weights.fc2.bias, -scale, scale);

        for block in &mut weights.blocks {
            fill_uniform(rng, &mut block.bn.running_var, 0.5, 1.5);
        }

        Ok(weights)
    }

    /// 全テンソルの要素数を構成と照合
    ///
    /// フィールドを直接差し替えた後に呼ぶ。不一致のテンソル名を報告する。
    pub fn validate(&self) -> CnnResult<()> {
        self.config.validate()?;
        check_len("conv blocks", self.blocks.len(), self.config.conv.len())?;
        for (name, tensor) in self.named_tensors() {
            let expected = tensor_len(&self.config, &name)?;
            check_len(&name, tensor.len(), expected)?;
        }
        Ok(())
    }

    /// `(名前, テンソル)` の一覧（PyTorch state_dict の `.` を `_` に置換した名前）
    pub fn named_tensors(&self) -> Vec<(String, &[f32])> {
        let mut out = Vec::with_capacity(tensor_names(&self.config).len());
        for (i, block) in self.blocks.iter().enumerate() {
            let n = i + 1;
            out.push((format!("conv{n}_weight"), &*block.conv.weight));
            out.push((format!("conv{n}_bias"), &*block.conv.bias));
            out.push((format!("bn{n}_weight"), &*block.bn.weight));
            out.push((format!("bn{n}_bias"), &*block.bn.bias));
            out.push((format!("bn{n}_running_mean"), &*block.bn.running_mean));
            out.push((format!("bn{n}_running_var"), &*block.bn.running_var));
        }
        out.push(("fc1_weight".to_string(), &*self.fc1.weight));
        out.push(("fc1_bias".to_string(), &*self.fc1.bias));
        out.push(("fc2_weight".to_string(), &*self.fc2.weight));
        out.push(("fc2_bias".to_string(), &*self.fc2.bias));
        out
    }

    /// パラメータ総数
    pub fn num_parameters(&self) -> usize {
        self.named_tensors().iter().map(|(_, t)| t.len()).sum()
    }
}

fn fill_uniform<R: Rng>(rng: &mut R, buf: &mut [f32], lo: f32, hi: f32) {
    for v in buf.iter_mut() {
        *v = rng.random_range(lo..hi);
    }
}

/// 構成に対応するテンソル名の一覧（読み込み順）
pub fn tensor_names(config: &CnnConfig) -> Vec<String> {
    let mut names = Vec::new();
    for i in 0..config.conv.len() {
        let n = i + 1;
        names.push(format!("conv{n}_weight"));
        names.push(format!("conv{n}_bias"));
        names.push(format!("bn{n}_weight"));
        names.push(format!("bn{n}_bias"));
        names.push(format!("bn{n}_running_mean"));
        names.push(format!("bn{n}_running_var"));
    }
    names.extend(["fc1_weight", "fc1_bias", "fc2_weight", "fc2_bias"].map(String::from));
    names
}

/// テンソル名から要求要素数を求める
pub fn tensor_len(config: &CnnConfig, name: &str) -> CnnResult<usize> {
    match name {
        "fc1_weight" => return Ok(config.fc1.weight_len()),
        "fc1_bias" => return Ok(config.fc1.out_features),
        "fc2_weight" => return Ok(config.fc2.weight_len()),
        "fc2_bias" => return Ok(config.fc2.out_features),
        _ => {}
    }

    let unknown = || CnnError::InvalidConfig(format!("Unknown tensor name: {name}"));

    // conv{n}_* / bn{n}_*
    let (prefix, rest) = if let Some(rest) = name.strip_prefix("conv") {
        ("conv", rest)
    } else if let Some(rest) = name.strip_prefix("bn") {
        ("bn", rest)
    } else {
        return Err(unknown());
    };
    let (index, field) = rest.split_once('_').ok_or_else(unknown)?;
    let n: usize = index.parse().map_err(|_| unknown())?;
    let stage = n.checked_sub(1).and_then(|i| config.conv.get(i)).ok_or_else(unknown)?;

    match (prefix, field) {
        ("conv", "weight") => Ok(stage.weight_len()),
        ("conv", "bias") => Ok(stage.out_channels),
        ("bn", "weight" | "bias" | "running_mean" | "running_var") => Ok(stage.out_channels),
        _ => Err(unknown()),
    }
}
