//! 1D CNN 推論ドライバ
//!
//! データディレクトリからパラメータ・入力・正解出力を読み込み、
//! 選択した戦略で推論して時間と GFLOPS を計測し、正解と照合する。
//! 不一致が 1 件でもあれば終了コード 1。

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

use cnn1d_core::cnn::{CnnNetwork, load_input, load_reference_output, load_weights_dir};
use tools::runner::{StrategyRun, StrategySelection, run_strategy};

#[derive(Parser, Debug)]
#[command(name = "cnn_infer")]
#[command(about = "1D CNN の推論を実行し、正解出力と照合する")]
struct Cli {
    /// パラメータ・入力・正解出力を置いたディレクトリ
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// 実行戦略（reference / tiled / both）
    #[arg(long, default_value = "both")]
    strategy: StrategySelection,

    /// 計測用の繰り返し回数
    #[arg(long, default_value_t = 1)]
    iterations: u32,

    /// タイル版のスレッド数（0 = rayon の既定値）
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// 結果を JSON で標準出力へ
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    data_dir: String,
    passed: bool,
    runs: &'a [StrategyRun],
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("failed to configure rayon thread pool")?;
    }
    info!("rayon threads: {}", rayon::current_num_threads());

    let weights = load_weights_dir(&cli.data_dir)
        .with_context(|| format!("failed to load parameters from {}", cli.data_dir.display()))?;
    let config = weights.config;
    let input = load_input(&cli.data_dir, &config)?;
    let expected = load_reference_output(&cli.data_dir, &config)?;

    let strategies = cli.strategy.strategies();
    let mut runs = Vec::with_capacity(strategies.len());
    let mut net = CnnNetwork::new(weights, strategies[0])?;

    for &strategy in &strategies {
        // 重みは戦略間で引き継ぐ
        net = net.into_strategy(strategy)?;

        let run = run_strategy(&net, &input, &expected, cli.iterations)?;
        for line in report_lines(&run) {
            emit(cli.json, &line);
        }
        runs.push(run);
    }

    let passed = runs.iter().all(StrategyRun::passed);

    if cli.json {
        let summary = Summary {
            data_dir: cli.data_dir.display().to_string(),
            passed,
            runs: &runs,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if passed {
        emit(cli.json, "PASS");
        Ok(ExitCode::SUCCESS)
    } else {
        emit(cli.json, "FAIL");
        Ok(ExitCode::FAILURE)
    }
}

/// 人間向けの行（JSON 出力時は stdout を JSON 専用にするため stderr へ）
fn emit(json: bool, line: &str) {
    if json {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

fn report_lines(run: &StrategyRun) -> Vec<String> {
    let v = &run.verify;
    let mut lines = Vec::new();
    if let Some(first) = v.first {
        lines.push(format!(
            "[{}] First error: got {}, expecting {} @ index {}",
            run.strategy, first.actual, first.expected, first.index
        ));
    }
    if v.mismatches > 0 {
        lines.push(format!("[{}] Found {} error(s)", run.strategy, v.mismatches));
    } else {
        lines.push(format!("[{}] OK (max abs diff {:.3e})", run.strategy, v.max_abs_diff));
    }
    lines
}
