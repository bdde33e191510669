//! 推論の実行・計測・検証

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::info;
use serde::Serialize;

use cnn1d_core::cnn::{CnnNetwork, OpCount, Strategy, VerifyReport, gflops, verify};

/// 実行する戦略の選択
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategySelection {
    Only(Strategy),
    Both,
}

impl StrategySelection {
    /// 実行順に並べた戦略
    pub fn strategies(&self) -> Vec<Strategy> {
        match self {
            Self::Only(s) => vec![*s],
            Self::Both => Strategy::ALL.to_vec(),
        }
    }
}

impl FromStr for StrategySelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("both") || s.eq_ignore_ascii_case("all") {
            return Ok(Self::Both);
        }
        s.parse::<Strategy>().map(Self::Only)
    }
}

impl fmt::Display for StrategySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Only(s) => write!(f, "{s}"),
            Self::Both => f.write_str("both"),
        }
    }
}

/// 1 戦略分の結果
#[derive(Debug, Clone, Serialize)]
pub struct StrategyRun {
    pub strategy: Strategy,
    pub iterations: u32,
    /// 1 回あたりの平均時間（ミリ秒）
    pub avg_ms: f64,
    pub gflops: f64,
    pub verify: VerifyReport,
}

impl StrategyRun {
    pub fn passed(&self) -> bool {
        self.verify.passed()
    }
}

/// `iterations` 回 forward を回して計測し、最後の出力を `expected` と照合する
///
/// 作業領域と出力バッファは最初に 1 度だけ確保する。
pub fn run_strategy(
    net: &CnnNetwork,
    input: &[f32],
    expected: &[f32],
    iterations: u32,
) -> Result<StrategyRun> {
    let iterations = iterations.max(1);
    let config = &net.weights().config;
    let flops = OpCount::from_config(config).flops();

    let mut scratch = net.scratch();
    let mut output = vec![0.0f32; config.output_len()];

    let mut elapsed = Duration::ZERO;
    for _ in 0..iterations {
        let start = Instant::now();
        net.forward(input, &mut scratch, &mut output)?;
        elapsed += start.elapsed();
    }

    let avg_ms = elapsed.as_secs_f64() * 1e3 / iterations as f64;
    let gflops = gflops(flops, iterations, elapsed);
    info!("[{}] {avg_ms:.3} ms/run over {iterations} run(s), {gflops:.3} GFLOPS", net.strategy());

    let verify = verify(&output, expected)?;

    Ok(StrategyRun {
        strategy: net.strategy(),
        iterations,
        avg_ms,
        gflops,
        verify,
    })
}
