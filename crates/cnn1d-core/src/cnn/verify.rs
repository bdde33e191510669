//! 出力検証
//!
//! 計算結果を事前に求めた正解ベクトルと要素ごとに比較する。
//! 不一致は件数として報告し、エラーにはしない。

use super::constants::{VERIFY_ABS_TOL, VERIFY_REL_TOL};
use super::error::{check_len, CnnResult};
use serde::Serialize;

/// 1 要素が不一致か
///
/// 相対誤差 `|(a - b) / (a + b)|` と絶対誤差 `|a - b|` が両方しきい値を超えたら不一致。
///
/// NOTE: 相対誤差の分母は `max(|a|, |b|)` ではなく `a + b`。符号が逆の値や
/// 打ち消し合う値では相対項が過大になる（`a + b == 0` なら inf）。
/// 既存の正解データとの互換のためこの式を維持しており、実質的な判定は絶対項が担う。
/// `a == b == 0` のとき相対項は NaN になり、比較が偽なので一致扱い。
#[inline]
pub fn is_mismatch(actual: f32, expected: f32) -> bool {
    let diff = actual - expected;
    (diff / (actual + expected)).abs() > VERIFY_REL_TOL && diff.abs() > VERIFY_ABS_TOL
}

/// 最初に見つかった不一致
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mismatch {
    pub index: usize,
    pub actual: f32,
    pub expected: f32,
}

/// 検証結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    /// 比較した要素数
    pub compared: usize,
    /// 不一致件数
    pub mismatches: usize,
    /// 最初の不一致
    pub first: Option<Mismatch>,
    /// 最大絶対誤差
    pub max_abs_diff: f32,
}

impl VerifyReport {
    /// 不一致ゼロか
    #[inline]
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// 出力を正解ベクトルと比較
///
/// 長さが異なる場合のみエラー（`ShapeMismatch`）。
pub fn verify(actual: &[f32], expected: &[f32]) -> CnnResult<VerifyReport> {
    check_len("output", actual.len(), expected.len())?;

    let mut report = VerifyReport {
        compared: actual.len(),
        mismatches: 0,
        first: None,
        max_abs_diff: 0.0,
    };

    for (index, (&a, &b)) in actual.iter().zip(expected).enumerate() {
        let diff = (a - b).abs();
        if diff > report.max_abs_diff {
            report.max_abs_diff = diff;
        }
        if is_mismatch(a, b) {
            if report.first.is_none() {
                report.first = Some(Mismatch {
                    index,
                    actual: a,
                    expected: b,
                });
            }
            report.mismatches += 1;
        }
    }

    if let Some(m) = &report.first {
        log::warn!(
            "First error: got {}, expecting {} @ index {}",
            m.actual,
            m.expected,
            m.index
        );
    }

    Ok(report)
}
