//! Record header and codec
//! 记录头与编解码
//!
//! ## Record Layout
//! 记录布局
//!
//! ```text
//! | Head(24) | key_data | val_data? |
//! ```
//!
//! - Head: 24 bytes, six little-endian u32 fields: `time, fid, offset, ksize, vsize, crc32`
//!   24 字节定长头：六个小端 u32 字段
//! - key_data: `ksize` bytes, always present
//!   key 数据，永远存在
//! - val_data: `vsize` bytes, present only when `vsize > 0` (omitted for tombstones)
//!   val 数据，仅当 `vsize > 0` 时存在（墓碑省略）
//!
//! `crc32` covers `key ‖ val`, not the header itself — this is a compatibility
//! surface (§6 of the spec) and must stay bit-exact with existing databases.

use std::{
  fs::{File, OpenOptions},
  io::{self, Read, Seek, SeekFrom, Write},
  path::Path,
};

use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout,
  byteorder::little_endian::U32,
};

use crate::error::Result;

/// Header size on disk (24 bytes)
/// 磁盘上的头大小（24 字节）
pub const HEAD_SIZE: usize = 24;

/// Fixed-size record header
/// 定长记录头
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Head {
  pub time: U32,
  pub fid: U32,
  pub offset: U32,
  pub ksize: U32,
  pub vsize: U32,
  pub crc32: U32,
}

const _: () = assert!(size_of::<Head>() == HEAD_SIZE);

impl Head {
  /// Build a header for a live (non-tombstone) record.
  /// 构建一条活记录的头
  #[inline]
  #[allow(clippy::too_many_arguments)]
  pub fn live(time: u32, fid: u64, offset: u64, ksize: u32, vsize: u32, crc32: u32) -> Self {
    Self {
      time: U32::new(time),
      fid: U32::new(fid as u32),
      offset: U32::new(offset as u32),
      ksize: U32::new(ksize),
      vsize: U32::new(vsize),
      crc32: U32::new(crc32),
    }
  }

  /// Build a tombstone header pointing at the shadowed record's `(fid, offset)`.
  /// 构建指向被遮蔽记录 `(fid, offset)` 的墓碑头
  #[inline]
  pub fn tombstone(time: u32, target_fid: u64, target_offset: u64, ksize: u32, crc32: u32) -> Self {
    Self {
      time: U32::new(time),
      fid: U32::new(target_fid as u32),
      offset: U32::new(target_offset as u32),
      ksize: U32::new(ksize),
      vsize: U32::new(0),
      crc32: U32::new(crc32),
    }
  }

  #[inline]
  pub fn is_tombstone(&self) -> bool {
    self.vsize.get() == 0
  }

  #[inline]
  pub fn fid(&self) -> u64 {
    self.fid.get() as u64
  }

  #[inline]
  pub fn offset(&self) -> u64 {
    self.offset.get() as u64
  }

  #[inline]
  pub fn ksize(&self) -> u32 {
    self.ksize.get()
  }

  #[inline]
  pub fn vsize(&self) -> u32 {
    self.vsize.get()
  }

  #[inline]
  pub fn crc32(&self) -> u32 {
    self.crc32.get()
  }

  #[inline]
  pub fn time(&self) -> u32 {
    self.time.get()
  }

  /// Size in bytes this record occupies on disk, header included.
  /// 该记录在磁盘上占用的字节数（含头）
  #[inline]
  pub fn record_len(&self) -> u64 {
    HEAD_SIZE as u64 + self.ksize() as u64 + self.vsize() as u64
  }
}

/// One decoded record: header, key, and (if requested and live) value.
/// 一条解码后的记录：头、key，以及（若请求且非墓碑）value
#[derive(Debug)]
pub struct Record {
  pub head: Head,
  pub key: Vec<u8>,
  pub value: Option<Vec<u8>>,
}

/// Append `head ‖ key ‖ value?` to `path`, opening, writing, and closing once.
/// 以一次开-写-关周期，将 `head ‖ key ‖ value?` 追加到 `path`
///
/// No partial-record rollback is attempted: a failure mid-write leaves
/// whatever bytes were already flushed in place (§7 of the spec).
/// 不尝试部分记录回滚：写入中途失败时已落盘的字节原样保留
pub fn append(path: &Path, head: &Head, key: &[u8], value: Option<&[u8]>) -> Result<()> {
  let mut f = OpenOptions::new().create(true).append(true).open(path)?;
  f.write_all(head.as_bytes())?;
  f.write_all(key)?;
  if let Some(v) = value {
    f.write_all(v)?;
  }
  Ok(())
}

/// Read exactly `n` bytes, treating a short/empty read as a clean
/// end-of-stream (`Ok(None)`) rather than an error — a truncated trailing
/// record is left in place for GC to rewrite away (§4.1 of the spec).
/// 精确读取 `n` 字节；读取不足视为干净的流结束而非错误
fn read_exact_or_eof(f: &mut File, buf: &mut [u8]) -> Result<Option<()>> {
  match f.read_exact(buf) {
    Ok(()) => Ok(Some(())),
    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
    Err(e) => Err(e.into()),
  }
}

/// Read one record from the current position of `f`.
/// 从 `f` 当前位置读取一条记录
///
/// Returns `Ok(None)` at a clean or truncated end-of-file. On success the
/// stream cursor is left at the next record's header start: if
/// `want_value` is `false` and the record is live, the value bytes are
/// skipped with a seek rather than read.
/// 成功返回时，流游标停在下一条记录头的起始位置；若 `want_value` 为
/// `false` 且记录为活记录，则用 seek 跳过 value 字节而非读取
pub fn read(f: &mut File, want_value: bool) -> Result<Option<Record>> {
  let mut head_buf = [0u8; HEAD_SIZE];
  if read_exact_or_eof(f, &mut head_buf)?.is_none() {
    return Ok(None);
  }
  let head = Head::read_from_bytes(&head_buf).expect("HEAD_SIZE buffer matches Head layout");

  let mut key = vec![0u8; head.ksize() as usize];
  if read_exact_or_eof(f, &mut key)?.is_none() {
    return Ok(None);
  }

  let vsize = head.vsize() as usize;
  if vsize == 0 {
    return Ok(Some(Record {
      head,
      key,
      value: None,
    }));
  }

  if want_value {
    let mut value = vec![0u8; vsize];
    if read_exact_or_eof(f, &mut value)?.is_none() {
      return Ok(None);
    }
    Ok(Some(Record {
      head,
      key,
      value: Some(value),
    }))
  } else {
    f.seek(SeekFrom::Current(vsize as i64))?;
    Ok(Some(Record {
      head,
      key,
      value: None,
    }))
  }
}

/// Read the single record at `offset` in `path`, value included, verifying
/// it against `expect_key` and `expect_crc32`.
/// 读取 `path` 中 `offset` 处的单条记录（含 value），并据 `expect_key` 与
/// `expect_crc32` 校验
///
/// Returns `Ok(None)` on any mismatch — corruption is a silent "not found"
/// signal at this layer (§7 of the spec); callers that need to log the
/// distinction should compare head/key/crc themselves.
/// 任何不匹配都返回 `Ok(None)`——在此层，损坏是静默的“未找到”信号
pub fn read_verified(
  path: &Path,
  offset: u64,
  expect_key: &[u8],
  expect_crc32: u32,
) -> Result<Option<Vec<u8>>> {
  let mut f = File::open(path)?;
  f.seek(SeekFrom::Start(offset))?;
  let Some(record) = read(&mut f, true)? else {
    return Ok(None);
  };
  if record.key != expect_key {
    return Ok(None);
  }
  let Some(value) = record.value else {
    return Ok(None);
  };
  if crc32(&record.key, &value) != expect_crc32 {
    return Ok(None);
  }
  Ok(Some(value))
}

/// CRC32 of `key ‖ value`, the external collaborator the spec calls out
/// (§6): computed with `crc32fast`, never hand-rolled.
/// `key ‖ value` 的 CRC32（外部协作方 `crc32fast`，从不自行实现）
#[inline]
pub fn crc32(key: &[u8], value: &[u8]) -> u32 {
  let mut hasher = crc32fast::Hasher::new();
  hasher.update(key);
  hasher.update(value);
  hasher.finalize()
}
