//! In-memory key index: key bytes -> most recent record descriptor
//! 内存键索引：key 字节 -> 最新记录描述符

use std::collections::HashMap;

use crate::record::Head;

/// Where to find a key's live record: which bucket, file id, offset, and
/// the fields needed to re-verify it on read without reopening every
/// file.
/// 定位 key 对应活记录的位置：所在桶、文件 id、偏移量，以及无需重新
/// 打开每个文件即可在读取时重新校验所需的字段
///
/// `bucket` is an in-memory addition, not part of the 24-byte on-disk
/// header (§6 of the spec): fids are allocated per bucket, so two
/// buckets can both hold a `0000000000.dat` — without recording which
/// bucket a descriptor came from, a key's record could resolve to the
/// wrong file.
/// `bucket` 是内存中的附加字段，不属于 24 字节的磁盘头：fid 是按桶分配
/// 的，两个桶可能都持有 `0000000000.dat`——不记录描述符来自哪个桶，key
/// 的记录可能解析到错误的文件
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
  pub bucket: String,
  pub fid: u64,
  pub offset: u64,
  pub ksize: u32,
  pub vsize: u32,
  pub crc32: u32,
  pub time: u32,
}

impl Descriptor {
  pub fn from_head(bucket: impl Into<String>, head: &Head) -> Self {
    Self {
      bucket: bucket.into(),
      fid: head.fid(),
      offset: head.offset(),
      ksize: head.ksize(),
      vsize: head.vsize(),
      crc32: head.crc32(),
      time: head.time(),
    }
  }
}

/// Global, cross-bucket map from key to its current descriptor.
/// 跨桶的全局 key -> 当前描述符映射
///
/// Kept flat rather than scoped per bucket — this preserves the source's
/// observed behavior that buckets only route writes, not visibility (§3,
/// §9 of the spec).
/// 保持扁平而非按桶隔离——这保留了源实现的观察行为：桶只负责写入路由，
/// 不影响可见性
#[derive(Default, Debug)]
pub struct KeyIndex {
  map: HashMap<Vec<u8>, Descriptor>,
}

impl KeyIndex {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &[u8]) -> Option<&Descriptor> {
    self.map.get(key)
  }

  pub fn insert(&mut self, key: Vec<u8>, descriptor: Descriptor) {
    self.map.insert(key, descriptor);
  }

  pub fn remove(&mut self, key: &[u8]) -> Option<Descriptor> {
    self.map.remove(key)
  }

  pub fn contains(&self, key: &[u8]) -> bool {
    self.map.contains_key(key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
    self.map.keys()
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn desc(fid: u64, offset: u64) -> Descriptor {
    Descriptor {
      bucket: "0".to_string(),
      fid,
      offset,
      ksize: 1,
      vsize: 1,
      crc32: 0,
      time: 0,
    }
  }

  #[test]
  fn insert_overwrites_prior_descriptor() {
    let mut idx = KeyIndex::new();
    idx.insert(b"k".to_vec(), desc(0, 0));
    idx.insert(b"k".to_vec(), desc(1, 24));
    assert_eq!(idx.get(b"k"), Some(&desc(1, 24)));
    assert_eq!(idx.len(), 1);
  }

  #[test]
  fn remove_clears_visibility() {
    let mut idx = KeyIndex::new();
    idx.insert(b"k".to_vec(), desc(0, 0));
    idx.remove(b"k");
    assert!(idx.get(b"k").is_none());
    assert!(idx.is_empty());
  }
}
