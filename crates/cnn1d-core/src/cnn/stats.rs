//! 演算量・スループット統計
//!
//! 畳み込みと全結合の積和回数（1 MAC = 2 FLOP）から GFLOPS を求める。
//! BatchNorm / ReLU / Pool / RMS は数えない。

use super::config::CnnConfig;
use serde::Serialize;
use std::time::Duration;

/// 層ごとの積和回数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpCount {
    /// conv1, conv2, conv3
    pub conv_macs: Vec<u64>,
    pub fc1_macs: u64,
    pub fc2_macs: u64,
}

impl OpCount {
    /// 構成から積和回数を求める
    pub fn from_config(config: &CnnConfig) -> Self {
        Self {
            conv_macs: config.conv.iter().map(|s| s.macs() as u64).collect(),
            fc1_macs: config.fc1.macs() as u64,
            fc2_macs: config.fc2.macs() as u64,
        }
    }

    /// 総積和回数
    pub fn total_macs(&self) -> u64 {
        self.conv_macs.iter().sum::<u64>() + self.fc1_macs + self.fc2_macs
    }

    /// 総 FLOP 数
    pub fn flops(&self) -> u64 {
        self.total_macs() * 2
    }
}

/// `iterations` 回の推論に `elapsed` かかったときの GFLOPS
pub fn gflops(flops_per_run: u64, iterations: u32, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    flops_per_run as f64 * iterations as f64 / secs / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_op_count() {
        let ops = OpCount::from_config(&CnnConfig::STANDARD);
        assert_eq!(ops.conv_macs, vec![16 * 41 * 7, 32 * 20 * 16 * 5, 64 * 10 * 32 * 3]);
        assert_eq!(ops.fc1_macs, 128 * 640);
        assert_eq!(ops.fc2_macs, 1000 * 128);
        assert_eq!(ops.flops(), 2 * (4592 + 51200 + 61440 + 81920 + 128000));
    }

    #[test]
    fn test_gflops() {
        // 1e9 FLOP を 1 秒 → 1 GFLOPS
        assert!((gflops(1_000_000_000, 1, Duration::from_secs(1)) - 1.0).abs() < 1e-12);
        assert!((gflops(500_000_000, 4, Duration::from_secs(1)) - 2.0).abs() < 1e-12);
        assert_eq!(gflops(1, 1, Duration::ZERO), 0.0);
    }
}
