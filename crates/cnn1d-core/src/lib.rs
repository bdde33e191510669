//! 1D CNN 推論ライブラリ
//!
//! 固定トポロジーの 1 次元畳み込みニューラルネットワーク
//! （Conv+BN+ReLU+MaxPool ×3 → FC ×2 → RMS 正規化）の推論を行う。
//!
//! - 参照版（多重ループ）とタイル版（rayon 並列）の 2 つの実行戦略
//! - データディレクトリ（テンソルごとの f32 LE ファイル）からのパラメータ読み込み
//! - 正解出力との要素ごとの検証

pub mod cnn;
