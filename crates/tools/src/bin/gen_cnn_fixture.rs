//! フィクスチャ生成ツール
//!
//! 乱数モデルと乱数入力から参照版で正解出力を計算し、
//! `cnn_infer` が読めるデータディレクトリを書き出す。

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use tools::fixture::generate_fixture;

#[derive(Parser, Debug)]
#[command(name = "gen_cnn_fixture")]
#[command(about = "乱数モデルから 1D CNN のデータディレクトリを生成する")]
struct Cli {
    /// 出力先ディレクトリ（無ければ作成）
    #[arg(long, default_value = "./data")]
    output_dir: PathBuf,

    /// 乱数シード
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// 重み・バイアスの範囲 [-scale, scale)
    #[arg(long, default_value_t = 0.2)]
    scale: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let summary = generate_fixture(&cli.output_dir, cli.seed, cli.scale)?;
    eprintln!(
        "{} tensors / {} parameters -> {}",
        summary.num_tensors,
        summary.num_parameters,
        cli.output_dir.display()
    );
    Ok(())
}
