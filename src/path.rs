//! Bucket directory and data-file path layout
//! 桶目录与数据文件路径布局

use std::path::{Path, PathBuf};

/// Width of the zero-padded file-id component, e.g. `0000000007.dat`
/// 零填充文件 id 部分的宽度，如 `0000000007.dat`
pub const FID_WIDTH: usize = 10;

/// Data-file extension, without the leading dot.
/// 数据文件扩展名（不含前导点）
pub const DATA_EXT: &str = "dat";

/// Directory holding a single bucket's data files: `<root>/<name>`
/// 单个桶的数据文件所在目录：`<root>/<name>`
pub fn bucket_dir(root: &Path, name: &str) -> PathBuf {
  root.join(name)
}

/// Path of data file `fid` inside `bucket_dir`: `<bucket_dir>/<fid:010>.dat`
/// `bucket_dir` 内文件 `fid` 的路径：`<bucket_dir>/<fid:010>.dat`
pub fn data_path(bucket_dir: &Path, fid: u64) -> PathBuf {
  bucket_dir.join(format!("{fid:0width$}.{DATA_EXT}", width = FID_WIDTH))
}

/// Parse a file id back out of a data file's name, e.g. `"0000000007.dat"` -> `Some(7)`.
/// 从数据文件名解析出文件 id，如 `"0000000007.dat"` -> `Some(7)`
///
/// Returns `None` for anything that isn't a `.dat` file with an all-digit stem
/// — such entries are ignored rather than treated as corrupt (§4.2 of the spec).
/// 对任何非全数字词干的 `.dat` 文件返回 `None`——此类条目被忽略而非视为损坏
pub fn parse_fid(file_name: &str) -> Option<u64> {
  let stem = file_name.strip_suffix(&format!(".{DATA_EXT}"))?;
  if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  stem.parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_fid() {
    let dir = Path::new("/tmp/db/0");
    let p = data_path(dir, 7);
    assert_eq!(p, Path::new("/tmp/db/0/0000000007.dat"));
    let name = p.file_name().unwrap().to_str().unwrap();
    assert_eq!(parse_fid(name), Some(7));
  }

  #[test]
  fn rejects_non_data_names() {
    assert_eq!(parse_fid("hint.idx"), None);
    assert_eq!(parse_fid("abc.dat"), None);
    assert_eq!(parse_fid(".dat"), None);
    assert_eq!(parse_fid("0000000007.txt"), None);
  }
}
