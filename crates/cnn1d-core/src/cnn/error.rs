//! 1D CNN のエラー型

use std::path::PathBuf;

/// CNN 推論まわりのエラー
#[derive(thiserror::Error, Debug)]
pub enum CnnError {
    /// バッファ長が固定トポロジーの要求と一致しない
    #[error("Shape mismatch for `{name}`: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// ネットワーク構成が不整合
    #[error("Invalid network config: {0}")]
    InvalidConfig(String),

    /// パス付きのファイル I/O エラー
    #[error("I/O error on {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ストリーム I/O エラー
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CnnError {
    /// `ShapeMismatch` を生成する
    pub fn shape(name: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }
}

/// CNN 操作の Result 型
pub type CnnResult<T> = Result<T, CnnError>;

/// スライス長を検査し、不一致なら `ShapeMismatch` を返す
#[inline]
pub fn check_len(name: &str, actual: usize, expected: usize) -> CnnResult<()> {
    if actual != expected {
        return Err(CnnError::shape(name, expected, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_names_buffer() {
        let err = check_len("fc1_weight", 10, 81920).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("fc1_weight"), "{msg}");
        assert!(msg.contains("81920"), "{msg}");
        assert!(msg.contains("10"), "{msg}");
    }

    #[test]
    fn test_check_len_ok() {
        assert!(check_len("input", 41, 41).is_ok());
    }

    #[test]
    fn test_file_error_includes_path() {
        let err = CnnError::File {
            path: PathBuf::from("/nonexistent/conv1_bias.bin"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("conv1_bias.bin"));
    }
}
