// Error types for jdb_cask
// jdb_cask 错误类型定义

use thiserror::Error;

/// Typed failure behind every sentinel-returning public method.
/// 每个返回哨兵值的公共方法背后的类型化错误
#[derive(Error, Debug)]
pub enum Error {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid config: {reason}")]
  InvalidConfig { reason: &'static str },

  #[error("key must not be empty")]
  KeyEmpty,

  #[error("value must not be empty")]
  ValueEmpty,

  #[error("unknown bucket: {name}")]
  UnknownBucket { name: String },

  #[error("checksum mismatch in bucket {bucket} at {fid:0>10}.dat:{offset}")]
  ChecksumMismatch {
    bucket: String,
    fid: u64,
    offset: u64,
  },

  #[error("key mismatch in bucket {bucket} at {fid:0>10}.dat:{offset}")]
  KeyMismatch {
    bucket: String,
    fid: u64,
    offset: u64,
  },
}

pub type Result<T> = std::result::Result<T, Error>;
