//! 1D CNN 推論ツール
//!
//! `cnn_infer`（推論 + 検証 + 計測）と `gen_cnn_fixture`（データディレクトリ生成）の共通部分。

pub mod fixture;
pub mod runner;
