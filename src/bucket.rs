//! Bucket file manager: fid allocation, active-file rotation, path resolution
//! 桶文件管理：fid 分配、活动文件轮转、路径解析

use std::{
  collections::BTreeSet,
  path::{Path, PathBuf},
};

use log::debug;

use crate::{error::Result, path};

/// One bucket's file-id bookkeeping and rotation policy.
/// 单个桶的文件 id 记录与轮转策略
#[derive(Debug)]
pub struct Bucket {
  pub name: String,
  pub dir: PathBuf,
  /// File id currently receiving appends
  /// 当前接收追加写的文件 id
  pub act_fid: u64,
  /// Largest known file id
  /// 已知最大文件 id
  pub max_fid: u64,
  /// Fids ≤ max_fid that are gaps or were vacated by GC
  /// 小于等于 max_fid 的空缺或已被 GC 清空的 fid
  pub free_fids: BTreeSet<u64>,
}

impl Bucket {
  /// A brand-new bucket: single fid 0, nothing free.
  /// 全新的桶：仅 fid 0，没有空闲 fid
  pub fn new(root: &Path, name: impl Into<String>) -> Self {
    let name = name.into();
    let dir = path::bucket_dir(root, &name);
    Self {
      name,
      dir,
      act_fid: 0,
      max_fid: 0,
      free_fids: BTreeSet::new(),
    }
  }

  /// Path to data file `fid` in this bucket.
  /// 该桶中文件 `fid` 的路径
  pub fn data_path(&self, fid: u64) -> PathBuf {
    path::data_path(&self.dir, fid)
  }

  /// Path to this bucket's current active data file.
  /// 该桶当前活动数据文件的路径
  pub fn active_path(&self) -> PathBuf {
    self.data_path(self.act_fid)
  }

  /// Advance `act_fid` to a fresh target: reuse the smallest free fid if any
  /// exist, otherwise grow `max_fid` by one. Returns the new `act_fid`.
  /// 推进 `act_fid` 到一个新的目标：若存在空闲 fid 则复用最小者，否则
  /// `max_fid` 加一。返回新的 `act_fid`
  pub fn next_empty_fid(&mut self) -> u64 {
    let fid = if let Some(fid) = self.free_fids.pop_first() {
      fid
    } else {
      self.max_fid += 1;
      self.max_fid
    };
    self.act_fid = fid;
    debug!("bucket {} rotated active file to fid {}", self.name, fid);
    fid
  }

  /// Resolve `(act_fid, append_offset)` for the next write, rotating as
  /// needed so the append never starts past `file_size`.
  /// 解析下一次写入的 `(act_fid, append_offset)`，按需轮转以保证追加
  /// 起始位置不超过 `file_size`
  ///
  /// Policy (§4.2 of the spec): inspect the active file's current size; if
  /// it is at or past `file_size`, advance to `max_fid` (if not already
  /// there) or allocate a fresh fid, then retry. A missing active file
  /// yields offset 0 without allocating anything.
  /// 若活动文件大小已达到或超过 `file_size`，推进到 `max_fid`（若尚未到达）
  /// 或分配新 fid 后重试；活动文件不存在则直接返回偏移 0，不做任何分配
  pub fn active_fid(&mut self, file_size: u64) -> Result<(u64, u64)> {
    loop {
      let active_path = self.active_path();
      let len = match std::fs::metadata(&active_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((self.act_fid, 0)),
        Err(e) => return Err(e.into()),
      };
      if len < file_size {
        return Ok((self.act_fid, len));
      }
      if self.act_fid != self.max_fid {
        self.act_fid = self.max_fid;
      } else {
        self.next_empty_fid();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  #[test]
  fn next_empty_fid_prefers_free_list() -> aok::Void {
    let dir = tempfile::tempdir()?;
    let mut b = Bucket::new(dir.path(), "0");
    b.max_fid = 5;
    b.free_fids.insert(2);
    b.free_fids.insert(1);
    assert_eq!(b.next_empty_fid(), 1);
    assert_eq!(b.act_fid, 1);
    assert_eq!(b.next_empty_fid(), 2);
    assert!(b.free_fids.is_empty());
    assert_eq!(b.next_empty_fid(), 6);
    assert_eq!(b.max_fid, 6);
    aok::OK
  }

  #[test]
  fn active_fid_rotates_past_threshold() -> aok::Void {
    let dir = tempfile::tempdir()?;
    let mut b = Bucket::new(dir.path(), "0");
    fs::create_dir_all(&b.dir)?;
    assert_eq!(b.active_fid(64)?, (0, 0));
    fs::write(b.active_path(), vec![0u8; 64])?;
    let (fid, offset) = b.active_fid(64)?;
    assert_eq!(fid, 1);
    assert_eq!(offset, 0);
    aok::OK
  }
}
