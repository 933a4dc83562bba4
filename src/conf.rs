// Configuration for jdb_cask
// jdb_cask 配置模块

use std::path::PathBuf;

/// Default active-file rotation threshold (64MB)
/// 默认活动文件轮转阈值（64MB）
pub const DEFAULT_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Configuration item enum
/// 配置项枚举
pub enum ConfItem {
  /// Active-file rotation threshold in bytes (default: 64MB)
  /// 活动文件轮转阈值（字节，默认 64MB）
  FileSize(u64),
}

/// Database configuration
/// 数据库配置
#[derive(Clone, Debug)]
pub struct Conf {
  /// Database root directory
  /// 数据库根目录
  pub dir: PathBuf,
  pub file_size: u64,
}

impl Conf {
  /// Create configuration for `dir`, applying `items` over the defaults.
  /// 为 `dir` 创建配置，`items` 覆盖默认值
  pub fn new(dir: impl Into<PathBuf>, items: &[ConfItem]) -> Self {
    let mut conf = Self {
      dir: dir.into(),
      file_size: DEFAULT_FILE_SIZE,
    };
    for item in items {
      match item {
        ConfItem::FileSize(v) => conf.file_size = *v,
      }
    }
    conf
  }
}
