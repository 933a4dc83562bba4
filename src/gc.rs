//! Offline per-bucket compaction
//! 离线按桶压缩
//!
//! Two passes, run synchronously and to completion — there is no
//! background scheduler or thread pool here (§5 of the spec forbids one);
//! this is a deliberately simplified sibling of the teacher's threaded,
//! core-affine `jdb_val::gc` machinery.
//! 两遍扫描，同步运行至完成——此处没有后台调度器或线程池

use std::{
  collections::{HashMap, HashSet},
  fs,
};

use log::{debug, info, warn};

use crate::{
  bucket::Bucket,
  error::Result,
  index::{Descriptor, KeyIndex},
  record::{self, Head},
};

/// Coordinates to drop during the rewrite pass: file id -> set of
/// physical offsets within that file that must not be copied forward.
/// 重写阶段要丢弃的坐标：文件 id -> 该文件内不得被复制的物理偏移集合
type DropTable = HashMap<u64, HashSet<u64>>;

/// Run Pass 1 + Pass 2 of compaction over `bucket`, updating `index` in
/// place. Returns `Ok(())` whether or not any work was found — gc never
/// fails just because there was nothing to collect.
/// 对 `bucket` 运行压缩的第一遍与第二遍，原地更新 `index`。无论是否
/// 发现待回收的内容都返回 `Ok(())`——没有可回收内容不是失败
pub fn run(bucket: &mut Bucket, index: &mut KeyIndex, file_size: u64) -> Result<()> {
  let drop_table = collect_tombstones(bucket)?;
  if drop_table.is_empty() {
    debug!("gc: bucket {} has nothing to collect", bucket.name);
    return Ok(());
  }
  rewrite_survivors(bucket, index, file_size, drop_table)
}

/// Pass 1: scan every file, recording each tombstone twice — once under
/// the record it shadows, once under its own physical location — so both
/// are excluded from the rewrite regardless of which file holds which.
/// 第一遍：扫描每个文件，每个墓碑记录两次——一次记在它所遮蔽的记录下，
/// 一次记在自己的物理位置下——这样无论哪个文件持有哪一项都会被排除
fn collect_tombstones(bucket: &Bucket) -> Result<DropTable> {
  let mut drop_table: DropTable = HashMap::new();
  for fid in 0..=bucket.max_fid {
    let path = bucket.data_path(fid);
    let mut f = match fs::File::open(&path) {
      Ok(f) => f,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
      Err(e) => return Err(e.into()),
    };
    let mut offset = 0u64;
    loop {
      let Some(rec) = record::read(&mut f, false)? else {
        break;
      };
      let record_len = rec.head.record_len();
      if rec.head.is_tombstone() {
        drop_table
          .entry(rec.head.fid())
          .or_default()
          .insert(rec.head.offset());
        drop_table.entry(fid).or_default().insert(offset);
      }
      offset += record_len;
    }
  }
  Ok(drop_table)
}

/// Pass 2: advance to a fresh active file, then for each file named in
/// `drop_table`, copy forward every record not marked for drop and delete
/// the file once fully processed.
/// 第二遍：先推进到新的活动文件，然后对 `drop_table` 中提到的每个文件，
/// 复制所有未被标记丢弃的记录，完全处理完后删除该文件
fn rewrite_survivors(
  bucket: &mut Bucket,
  index: &mut KeyIndex,
  file_size: u64,
  mut drop_table: DropTable,
) -> Result<()> {
  bucket.next_empty_fid();

  let mut in_fids: Vec<u64> = drop_table.keys().copied().collect();
  in_fids.sort_unstable();

  for in_fid in in_fids {
    let Some(mut drops) = drop_table.remove(&in_fid) else {
      continue;
    };
    let in_path = bucket.data_path(in_fid);
    let mut in_fp = match fs::File::open(&in_path) {
      Ok(f) => f,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        warn!(
          "gc: bucket {} expected file for fid {} during rewrite but it is missing",
          bucket.name, in_fid
        );
        continue;
      }
      Err(e) => return Err(e.into()),
    };

    let mut has_skip = false;
    let mut in_offset = 0u64;
    loop {
      let Some(rec) = record::read(&mut in_fp, true)? else {
        break;
      };
      let record_len = rec.head.record_len();
      if drops.remove(&in_offset) {
        has_skip = true;
      } else if !rec.head.is_tombstone() {
        let value = rec.value.expect("live record carries a value");
        let (fid, offset) = bucket.active_fid(file_size)?;
        let new_head = Head::live(
          rec.head.time(),
          fid,
          offset,
          rec.head.ksize(),
          rec.head.vsize(),
          rec.head.crc32(),
        );
        record::append(&bucket.active_path(), &new_head, &rec.key, Some(&value))?;
        index.insert(rec.key, Descriptor::from_head(&bucket.name, &new_head));
      } else {
        has_skip = true;
      }
      in_offset += record_len;
    }
    drop(in_fp);

    if has_skip {
      fs::remove_file(&in_path)?;
      bucket.free_fids.insert(in_fid);
    }
  }

  info!("gc: bucket {} compaction complete", bucket.name);
  Ok(())
}
