//! 1D CNN 推論実装
//!
//! 固定トポロジーの 1 次元 CNN の推論部実装。
//! BatchNorm は推論モード（学習時の running statistics を使う）で、
//! PyTorch の eval() と同じ計算になる。
//!
//! # アーキテクチャ概要
//!
//! ```text
//! Input [41]
//!     ↓
//! Conv1 [1→16, k7] → BN1 → ReLU → MaxPool [16×20]
//!     ↓
//! Conv2 [16→32, k5] → BN2 → ReLU → MaxPool [32×10]
//!     ↓
//! Conv3 [32→64, k3] → BN3 → ReLU [64×10]
//!     ↓
//! Flatten [640]
//!     ↓
//! FC1 [640→128] → ReLU
//!     ↓
//! FC2 [128→1000]
//!     ↓
//! RMS 正規化 [1000]
//! ```
//!
//! # 実行戦略
//!
//! - `forward`: 参照版（多重ループ、基準実装）
//! - `tiled`: タイル版（ローカルキャッシュ + 重みタイル + ワイドリダクション、rayon 並列）
//!
mod config;
mod constants;
mod error;
mod forward;
mod io;
mod layers;
mod network;
mod stats;
mod tiled;
mod verify;
mod weights;

pub use config::{CnnConfig, ConvStageConfig, DenseConfig};
pub use constants::*;
pub use error::{check_len, CnnError, CnnResult};
pub use forward::{conv_stage, forward_reference, infer_reference, Scratch, StageBuffers};
pub use io::{
    load_input, load_reference_output, load_tensor, load_weights_dir, load_weights_dir_with,
    read_f32_le, save_input, save_reference_output, save_tensor, save_weights_dir, tensor_path,
    write_f32_le, BIN_EXT, INPUT_TENSOR, OUTPUT_TENSOR,
};
pub use layers::{
    batch_norm_inference, conv1d_same, dense, flatten_channel_major, max_pool2, relu_inplace,
    rms_normalize,
};
pub use network::{CnnNetwork, Strategy};
pub use stats::{gflops, OpCount};
pub use tiled::{
    dense_tiled, dot_wide, fill_padded, rms_normalize_wide, tile_conv_weights, TiledNetwork,
    CONV_TILE, DENSE_TILE, REDUCE_LANES,
};
pub use verify::{is_mismatch, verify, Mismatch, VerifyReport};
pub use weights::{
    tensor_len, tensor_names, BatchNormParams, CnnWeights, ConvBlock, ConvWeights, DenseWeights,
};
