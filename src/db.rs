//! Database façade: open/recovery, `get`/`set`/`remove`, and GC dispatch
//! 数据库门面：打开/恢复，`get`/`set`/`remove`，以及 GC 调度

use std::{
  fs,
  time::{SystemTime, UNIX_EPOCH},
};

use log::info;

use crate::{
  bucket::Bucket,
  conf::Conf,
  error::{Error, Result},
  gc,
  index::{Descriptor, KeyIndex},
  path,
  record::{self, Head},
};

/// Name of the bucket created when a fresh database directory has none.
/// 新数据库目录在没有任何桶时创建的默认桶名
pub const DEFAULT_BUCKET: &str = "0";

/// Point-in-time usage snapshot for one bucket, supplementing the core
/// spec's exposed operations (§10.5 of the expanded spec).
/// 某个桶某一时刻的使用情况快照，补充核心规范暴露的操作
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketStats {
  pub act_fid: u64,
  pub max_fid: u64,
  pub free_fid_count: usize,
}

/// An open database instance.
/// 一个已打开的数据库实例
pub struct Db {
  file_size: u64,
  buckets: std::collections::HashMap<String, Bucket>,
  index: KeyIndex,
  current_bucket: String,
}

fn now_secs() -> u32 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs() as u32)
    .unwrap_or(0)
}

impl Db {
  /// Open (and recover) the database rooted at `conf.dir`.
  /// 打开（并恢复）根目录为 `conf.dir` 的数据库
  ///
  /// Scans existing bucket subdirectories, replays every data file in fid
  /// order to rebuild the key index, and picks each bucket's initial
  /// active fid. A directory with no buckets gets the default bucket
  /// [`DEFAULT_BUCKET`] (§4.4, step 1 of the spec).
  /// 扫描已存在的桶子目录，按 fid 顺序重放每个数据文件以重建键索引，并为
  /// 每个桶选定初始活动 fid。没有任何桶的目录会创建默认桶
  pub fn open(conf: &Conf) -> Result<Self> {
    if conf.dir.as_os_str().is_empty() {
      return Err(Error::InvalidConfig {
        reason: "dir must not be empty",
      });
    }
    fs::create_dir_all(&conf.dir)?;

    let mut buckets = scan_buckets(&conf.dir)?;
    if buckets.is_empty() {
      info!("jdb_cask: no buckets found, creating default bucket {DEFAULT_BUCKET}");
      let b = Bucket::new(&conf.dir, DEFAULT_BUCKET);
      fs::create_dir_all(&b.dir)?;
      buckets.insert(DEFAULT_BUCKET.to_string(), b);
    }

    let mut index = KeyIndex::new();
    for bucket in buckets.values_mut() {
      replay_bucket(bucket, &mut index)?;
      bucket.active_fid(conf.file_size)?;
    }

    info!(
      "jdb_cask: opened {:?} with {} bucket(s), {} live key(s)",
      conf.dir,
      buckets.len(),
      index.len()
    );

    Ok(Self {
      file_size: conf.file_size,
      buckets,
      index,
      current_bucket: DEFAULT_BUCKET.to_string(),
    })
  }

  /// All bucket names known to this instance, in no particular order.
  /// 该实例已知的全部桶名，顺序不固定
  pub fn all_buckets(&self) -> Vec<String> {
    self.buckets.keys().cloned().collect()
  }

  /// Switch the bucket that new writes land in, creating it on disk if
  /// it doesn't exist yet. Never affects key visibility (§3 of the spec).
  /// 切换新写入落地的桶，如果该桶不存在则在磁盘上创建。从不影响 key 的
  /// 可见性
  pub fn change_bucket(&mut self, name: &str) -> bool {
    self.try_change_bucket(name).is_ok()
  }

  pub fn try_change_bucket(&mut self, name: &str) -> Result<()> {
    if !self.buckets.contains_key(name) {
      let b = Bucket::new(self.root_dir(), name);
      fs::create_dir_all(&b.dir)?;
      self.buckets.insert(name.to_string(), b);
    }
    self.current_bucket = name.to_string();
    Ok(())
  }

  /// All live keys across every bucket (the index is global, §3).
  /// 所有桶中全部活 key（索引是全局的）
  pub fn all_keys(&self) -> Vec<Vec<u8>> {
    self.index.keys().cloned().collect()
  }

  /// Number of live keys.
  /// 活 key 的数量
  pub fn len(&self) -> usize {
    self.index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.index.is_empty()
  }

  /// Snapshot of one bucket's fid bookkeeping, or `None` if unknown.
  /// 某个桶 fid 记录的快照，未知则为 `None`
  pub fn bucket_stats(&self, name: &str) -> Option<BucketStats> {
    self.buckets.get(name).map(|b| BucketStats {
      act_fid: b.act_fid,
      max_fid: b.max_fid,
      free_fid_count: b.free_fids.len(),
    })
  }

  /// Look up `key`, verifying its record's key and CRC32 on read.
  /// 查找 `key`，读取时校验其记录的 key 与 CRC32
  ///
  /// Rejects an empty key, a missing key, and a record that fails
  /// verification — all uniformly as `None` (§4.4/§7 of the spec: a
  /// corruption signal is silent at this layer).
  /// 拒绝空 key、不存在的 key，以及未通过校验的记录——均统一返回 `None`
  pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
    self.try_get(key).ok().flatten()
  }

  pub fn try_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    if key.is_empty() {
      return Ok(None);
    }
    let Some(desc) = self.index.get(key) else {
      return Ok(None);
    };
    let Some(bucket) = self.buckets.get(&desc.bucket) else {
      return Ok(None);
    };
    let path = bucket.data_path(desc.fid);
    match record::read_verified(&path, desc.offset, key, desc.crc32) {
      Ok(v) => Ok(v),
      Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// Write `key -> value`, shadowing any prior record with a tombstone
  /// first (§4.4 `set` of the spec).
  /// 写入 `key -> value`，若有先前记录先以墓碑遮蔽之
  ///
  /// A same-value write against the current descriptor is a no-op: the
  /// prior value is read back and compared before anything is appended.
  /// 若新值与当前描述符指向的值相同，则为空操作：在追加任何内容前先读回
  /// 旧值比较
  pub fn set(&mut self, key: &[u8], value: &[u8]) -> bool {
    self.try_set(key, value).is_ok()
  }

  pub fn try_set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
    if key.is_empty() {
      return Err(Error::KeyEmpty);
    }
    if value.is_empty() {
      return Err(Error::ValueEmpty);
    }

    if let Some(prior) = self.index.get(key).cloned() {
      if self.prior_value_matches(key, &prior, value)? {
        return Ok(());
      }
      self.append_tombstone(key, &prior)?;
    }

    let crc = record::crc32(key, value);
    let current_bucket = self.current_bucket.clone();
    let bucket = self.current_bucket_mut()?;
    let (fid, offset) = bucket.active_fid(self.file_size)?;
    let head = Head::live(now_secs(), fid, offset, key.len() as u32, value.len() as u32, crc);
    record::append(&bucket.active_path(), &head, key, Some(value))?;
    self
      .index
      .insert(key.to_vec(), Descriptor::from_head(current_bucket, &head));
    Ok(())
  }

  /// Delete `key`, appending a tombstone that points at the shadowed
  /// record (§4.4 `remove` of the spec). Returns `Ok(false)`, not an
  /// error, for an unknown key.
  /// 删除 `key`，追加一个指向被遮蔽记录的墓碑。对于未知 key 返回
  /// `Ok(false)` 而非错误
  pub fn remove(&mut self, key: &[u8]) -> bool {
    self.try_remove(key).unwrap_or(false)
  }

  pub fn try_remove(&mut self, key: &[u8]) -> Result<bool> {
    if key.is_empty() {
      return Ok(false);
    }
    let Some(prior) = self.index.remove(key) else {
      return Ok(false);
    };
    self.append_tombstone(key, &prior)?;
    Ok(true)
  }

  /// Compact `bucket`: drop tombstoned records and the records they
  /// shadow, rewrite survivors into a fresh file (§4.4 `gc` of the spec).
  /// 压缩 `bucket`：丢弃墓碑记录及其遮蔽的记录，将幸存记录重写到新文件
  pub fn gc(&mut self, bucket: &str) -> bool {
    self.try_gc(bucket).is_ok()
  }

  pub fn try_gc(&mut self, bucket: &str) -> Result<()> {
    let Some(b) = self.buckets.get_mut(bucket) else {
      return Err(Error::UnknownBucket {
        name: bucket.to_string(),
      });
    };
    gc::run(b, &mut self.index, self.file_size)
  }

  fn root_dir(&self) -> &std::path::Path {
    self
      .buckets
      .get(&self.current_bucket)
      .map(|b| b.dir.parent().expect("bucket dir has a parent"))
      .unwrap_or_else(|| {
        self
          .buckets
          .values()
          .next()
          .expect("at least one bucket exists")
          .dir
          .parent()
          .expect("bucket dir has a parent")
      })
  }

  fn current_bucket_mut(&mut self) -> Result<&mut Bucket> {
    self.buckets.get_mut(&self.current_bucket).ok_or_else(|| Error::UnknownBucket {
      name: self.current_bucket.clone(),
    })
  }

  fn prior_value_matches(&self, key: &[u8], prior: &Descriptor, value: &[u8]) -> Result<bool> {
    let Some(bucket) = self.buckets.get(&prior.bucket) else {
      return Ok(false);
    };
    let path = bucket.data_path(prior.fid);
    let mut f = match fs::File::open(&path) {
      Ok(f) => f,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
      Err(e) => return Err(e.into()),
    };
    use std::io::{Seek, SeekFrom};
    f.seek(SeekFrom::Start(
      prior.offset + crate::record::HEAD_SIZE as u64 + key.len() as u64,
    ))?;
    let mut existing = vec![0u8; prior.vsize as usize];
    use std::io::Read;
    if f.read_exact(&mut existing).is_err() {
      return Ok(false);
    }
    Ok(existing == value)
  }

  fn append_tombstone(&mut self, key: &[u8], prior: &Descriptor) -> Result<()> {
    let bucket = self.current_bucket_mut()?;
    let (_fid, _offset) = bucket.active_fid(self.file_size)?;
    let head = Head::tombstone(now_secs(), prior.fid, prior.offset, key.len() as u32, prior.crc32);
    record::append(&bucket.active_path(), &head, key, None)?;
    Ok(())
  }
}

fn scan_buckets(root: &std::path::Path) -> Result<std::collections::HashMap<String, Bucket>> {
  let mut buckets = std::collections::HashMap::new();
  for entry in fs::read_dir(root)? {
    let entry = entry?;
    if !entry.file_type()?.is_dir() {
      continue;
    }
    let name = entry.file_name().to_string_lossy().into_owned();
    if name.starts_with('.') {
      continue;
    }
    let mut bucket = Bucket::new(root, &name);
    let mut max_fid = 0u64;
    let mut seen = std::collections::BTreeSet::new();
    for file in fs::read_dir(&bucket.dir)? {
      let file = file?;
      let Some(fid) = path::parse_fid(&file.file_name().to_string_lossy()) else {
        continue;
      };
      seen.insert(fid);
      max_fid = max_fid.max(fid);
    }
    bucket.max_fid = max_fid;
    bucket.act_fid = max_fid;
    for fid in 0..max_fid {
      if !seen.contains(&fid) {
        bucket.free_fids.insert(fid);
      }
    }
    buckets.insert(name, bucket);
  }
  Ok(buckets)
}

/// Replay every data file 0..=max_fid in order, rebuilding `index`
/// entries for this bucket. A gap for `fid < max_fid` marks that fid free
/// (§4.4, step 2 of the spec).
/// 按顺序重放 0..=max_fid 的每个数据文件，重建该桶的索引条目。`fid <
/// max_fid` 处的空缺会将该 fid 标记为空闲
fn replay_bucket(bucket: &mut Bucket, index: &mut KeyIndex) -> Result<()> {
  for fid in 0..=bucket.max_fid {
    let path = bucket.data_path(fid);
    let mut f = match fs::File::open(&path) {
      Ok(f) => f,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        if fid < bucket.max_fid {
          bucket.free_fids.insert(fid);
        }
        continue;
      }
      Err(e) => return Err(e.into()),
    };
    loop {
      let Some(rec) = record::read(&mut f, false)? else {
        break;
      };
      if rec.head.is_tombstone() {
        index.remove(&rec.key);
      } else {
        index.insert(rec.key.clone(), Descriptor::from_head(&bucket.name, &rec.head));
      }
    }
  }
  Ok(())
}
