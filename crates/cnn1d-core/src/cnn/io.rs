//! パラメータファイル I/O
//!
//! データディレクトリに 1 テンソル 1 ファイルで置かれた f32 リトルエンディアン配列を読み書きする。
//! ファイル名は PyTorch の state_dict 名の `.` を `_` に置換したもの（`conv1_weight.bin` 等）。
//!
//! ```text
//! data/
//!   input.bin            f32[41]
//!   conv1_weight.bin     f32[16][1][7]
//!   conv1_bias.bin       f32[16]
//!   bn1_weight.bin / bn1_bias.bin / bn1_running_mean.bin / bn1_running_var.bin
//!   ...
//!   fc2_weight.bin       f32[1000][128]
//!   fc2_bias.bin         f32[1000]
//!   output.bin           f32[1000]（検証用の正解）
//! ```

use super::config::CnnConfig;
use super::error::{CnnError, CnnResult};
use super::weights::{
    tensor_names, BatchNormParams, CnnWeights, ConvBlock, ConvWeights, DenseWeights,
};
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// パラメータファイルの拡張子
pub const BIN_EXT: &str = "bin";

/// 入力信号のテンソル名
pub const INPUT_TENSOR: &str = "input";

/// 正解出力のテンソル名
pub const OUTPUT_TENSOR: &str = "output";

/// f32 1 要素のバイト数
const F32_BYTES: usize = 4;

/// テンソル名からファイルパスを求める
pub fn tensor_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{BIN_EXT}"))
}

// =============================================================================
// 低レベル読み書き
// =============================================================================

/// f32 リトルエンディアン配列をちょうど `count` 要素読み込む
pub fn read_f32_le<R: Read>(reader: &mut R, count: usize) -> io::Result<Vec<f32>> {
    let mut buf = vec![0u8; count * F32_BYTES];
    reader.read_exact(&mut buf)?;

    Ok(buf
        .chunks_exact(F32_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// f32 リトルエンディアン配列を書き込む
pub fn write_f32_le<W: Write>(writer: &mut W, data: &[f32]) -> io::Result<()> {
    for &v in data {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn file_error(path: &Path) -> impl FnOnce(io::Error) -> CnnError + '_ {
    move |source| CnnError::File {
        path: path.to_path_buf(),
        source,
    }
}

// =============================================================================
// テンソル単位
// =============================================================================

/// テンソルを 1 つ読み込む
///
/// ファイルサイズが `expected * 4` バイトと一致しなければ `ShapeMismatch`。
pub fn load_tensor(dir: &Path, name: &str, expected: usize) -> CnnResult<Box<[f32]>> {
    let path = tensor_path(dir, name);
    let file = File::open(&path).map_err(file_error(&path))?;
    let size = file.metadata().map_err(file_error(&path))?.len() as usize;

    if size != expected * F32_BYTES {
        return Err(CnnError::shape(name, expected, size / F32_BYTES));
    }

    let mut reader = BufReader::new(file);
    let data = read_f32_le(&mut reader, expected).map_err(file_error(&path))?;
    debug!("loaded {name}: {expected} floats from {}", path.display());

    Ok(data.into_boxed_slice())
}

/// テンソルを 1 つ書き込む
pub fn save_tensor(dir: &Path, name: &str, data: &[f32]) -> CnnResult<()> {
    let path = tensor_path(dir, name);
    let file = File::create(&path).map_err(file_error(&path))?;
    let mut writer = BufWriter::new(file);
    write_f32_le(&mut writer, data).map_err(file_error(&path))?;
    writer.flush().map_err(file_error(&path))?;
    debug!("saved {name}: {} floats to {}", data.len(), path.display());
    Ok(())
}

// =============================================================================
// ネットワーク単位
// =============================================================================

/// データディレクトリから全パラメータを読み込む（標準トポロジー）
pub fn load_weights_dir(dir: &Path) -> CnnResult<CnnWeights> {
    load_weights_dir_with(dir, CnnConfig::STANDARD)
}

/// データディレクトリから全パラメータを読み込む
pub fn load_weights_dir_with(dir: &Path, config: CnnConfig) -> CnnResult<CnnWeights> {
    config.validate()?;

    let mut blocks = Vec::with_capacity(config.conv.len());
    for (i, stage) in config.conv.iter().enumerate() {
        let n = i + 1;
        let c = stage.out_channels;
        blocks.push(ConvBlock {
            conv: ConvWeights {
                weight: load_tensor(dir, &format!("conv{n}_weight"), stage.weight_len())?,
                bias: load_tensor(dir, &format!("conv{n}_bias"), c)?,
            },
            bn: BatchNormParams {
                weight: load_tensor(dir, &format!("bn{n}_weight"), c)?,
                bias: load_tensor(dir, &format!("bn{n}_bias"), c)?,
                running_mean: load_tensor(dir, &format!("bn{n}_running_mean"), c)?,
                running_var: load_tensor(dir, &format!("bn{n}_running_var"), c)?,
            },
        });
    }

    let fc1 = DenseWeights {
        weight: load_tensor(dir, "fc1_weight", config.fc1.weight_len())?,
        bias: load_tensor(dir, "fc1_bias", config.fc1.out_features)?,
    };
    let fc2 = DenseWeights {
        weight: load_tensor(dir, "fc2_weight", config.fc2.weight_len())?,
        bias: load_tensor(dir, "fc2_bias", config.fc2.out_features)?,
    };

    let weights = CnnWeights {
        config,
        blocks,
        fc1,
        fc2,
    };
    weights.validate()?;

    info!(
        "loaded {} tensors ({} parameters) from {}",
        tensor_names(&config).len(),
        weights.num_parameters(),
        dir.display()
    );

    Ok(weights)
}

/// 全パラメータをデータディレクトリへ書き込む
///
/// ディレクトリが無ければ作成する。
pub fn save_weights_dir(dir: &Path, weights: &CnnWeights) -> CnnResult<()> {
    fs::create_dir_all(dir).map_err(file_error(dir))?;
    for (name, tensor) in weights.named_tensors() {
        save_tensor(dir, &name, tensor)?;
    }
    Ok(())
}

impl CnnWeights {
    /// データディレクトリから読み込む（標準トポロジー）
    pub fn load_dir(dir: &Path) -> CnnResult<Self> {
        load_weights_dir(dir)
    }

    /// データディレクトリへ書き込む
    pub fn save_dir(&self, dir: &Path) -> CnnResult<()> {
        save_weights_dir(dir, self)
    }
}

/// 入力信号（`input.bin`）を読み込む
pub fn load_input(dir: &Path, config: &CnnConfig) -> CnnResult<Vec<f32>> {
    Ok(load_tensor(dir, INPUT_TENSOR, config.input_len)?.into_vec())
}

/// 正解出力（`output.bin`）を読み込む
pub fn load_reference_output(dir: &Path, config: &CnnConfig) -> CnnResult<Vec<f32>> {
    Ok(load_tensor(dir, OUTPUT_TENSOR, config.output_len())?.into_vec())
}

/// 入力信号を書き込む
pub fn save_input(dir: &Path, input: &[f32]) -> CnnResult<()> {
    save_tensor(dir, INPUT_TENSOR, input)
}

/// 正解出力を書き込む
pub fn save_reference_output(dir: &Path, output: &[f32]) -> CnnResult<()> {
    save_tensor(dir, OUTPUT_TENSOR, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_f32_le() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-2.25f32).to_le_bytes());
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_f32_le(&mut cursor, 2).unwrap(), vec![1.5, -2.25]);
    }

    #[test]
    fn test_read_f32_le_short_stream() {
        let mut cursor = Cursor::new(vec![0u8; 7]);
        let err = read_f32_le(&mut cursor, 2).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_write_then_read_bytes_layout() {
        let mut buf = Vec::new();
        write_f32_le(&mut buf, &[1.0, 0.5]).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(&buf[0..4], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_tensor_path() {
        let p = tensor_path(Path::new("data"), "bn2_running_var");
        assert_eq!(p, Path::new("data").join("bn2_running_var.bin"));
    }

    #[test]
    fn test_load_tensor_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        match load_tensor(dir.path(), "conv1_bias", 16) {
            Err(CnnError::File { path, source }) => {
                assert!(path.ends_with("conv1_bias.bin"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_load_tensor_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        save_tensor(dir.path(), "conv1_bias", &[0.0; 15]).unwrap();
        match load_tensor(dir.path(), "conv1_bias", 16) {
            Err(CnnError::ShapeMismatch {
                name,
                expected,
                actual,
            }) => {
                assert_eq!(name, "conv1_bias");
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
