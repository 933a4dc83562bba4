//! End-to-end scenarios (S1-S6) and invariants from the core spec
//! 核心规范中的端到端场景（S1-S6）与不变量

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use aok::{OK, Void};
use jdb_cask::{Conf, ConfItem, Db};

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

#[test]
fn s1_basic() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  assert!(db.set(b"k", b"v"));
  assert_eq!(db.get(b"k"), Some(b"v".to_vec()));
  assert!(db.remove(b"k"));
  assert_eq!(db.get(b"k"), None);
  OK
}

#[test]
fn s2_recovery() -> Void {
  let dir = tempfile::tempdir()?;
  {
    let conf = Conf::new(dir.path(), &[]);
    let mut db = Db::open(&conf)?;
    db.set(b"x", b"1");
    db.set(b"y", b"2");
    db.set(b"x", b"11");
  }
  let conf = Conf::new(dir.path(), &[]);
  let db = Db::open(&conf)?;
  assert_eq!(db.get(b"x"), Some(b"11".to_vec()));
  assert_eq!(db.get(b"y"), Some(b"2".to_vec()));
  OK
}

#[test]
fn s3_rotation() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[ConfItem::FileSize(64)]);
  let mut db = Db::open(&conf)?;
  db.set(b"a", &[b'A'; 50]);
  db.set(b"b", &[b'B'; 50]);

  let bucket_dir = dir.path().join("0");
  assert!(bucket_dir.join("0000000000.dat").exists());
  assert!(bucket_dir.join("0000000001.dat").exists());
  assert_eq!(db.get(b"a"), Some(vec![b'A'; 50]));
  assert_eq!(db.get(b"b"), Some(vec![b'B'; 50]));
  OK
}

#[test]
fn s4_gc_reclaim() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  db.set(b"a", b"1");
  db.set(b"a", b"2");
  db.set(b"a", b"3");
  assert!(db.gc("0"));
  assert_eq!(db.get(b"a"), Some(b"3".to_vec()));
  OK
}

#[test]
fn s5_default_bucket() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let db = Db::open(&conf)?;
  assert!(dir.path().join("0").is_dir());
  assert_eq!(db.all_buckets(), vec!["0".to_string()]);
  OK
}

#[test]
fn s6_corruption() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  db.set(b"k", b"v");

  let data_path = dir.path().join("0").join("0000000000.dat");
  let mut f = OpenOptions::new().write(true).open(&data_path)?;
  // header(24) + key(1) lands at the start of the value region
  f.seek(SeekFrom::Start(24 + 1))?;
  f.write_all(b"X")?;
  drop(f);

  assert_eq!(db.get(b"k"), None);
  OK
}

#[test]
fn invariant_idempotent_same_value_write() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  db.set(b"k", b"v");
  let data_path = dir.path().join("0").join("0000000000.dat");
  let size_after_first = fs::metadata(&data_path)?.len();
  db.set(b"k", b"v");
  let size_after_second = fs::metadata(&data_path)?.len();
  assert_eq!(size_after_first, size_after_second);
  OK
}

#[test]
fn invariant_tombstone_shadowing() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  db.set(b"k", b"v");
  assert!(db.remove(b"k"));
  assert_eq!(db.get(b"k"), None);
  assert!(!db.all_keys().contains(&b"k".to_vec()));
  OK
}

#[test]
fn invariant_gc_preserves_live_state() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  db.set(b"a", b"1");
  db.set(b"b", b"2");
  db.set(b"a", b"3");
  db.remove(b"b");

  let before: std::collections::HashMap<_, _> = db
    .all_keys()
    .into_iter()
    .map(|k| {
      let v = db.get(&k);
      (k, v)
    })
    .collect();

  assert!(db.gc("0"));

  for (k, v) in &before {
    assert_eq!(&db.get(k), v);
  }
  assert_eq!(db.get(b"b"), None);
  OK
}

#[test]
fn remove_unknown_key_returns_false() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  assert!(!db.remove(b"nope"));
  OK
}

#[test]
fn empty_key_and_value_rejected() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  assert!(!db.set(b"", b"v"));
  assert!(!db.set(b"k", b""));
  assert_eq!(db.get(b""), None);
  OK
}

#[test]
fn change_bucket_routes_new_writes_only() -> Void {
  let dir = tempfile::tempdir()?;
  let conf = Conf::new(dir.path(), &[]);
  let mut db = Db::open(&conf)?;
  db.set(b"in-zero", b"1");
  assert!(db.change_bucket("1"));
  db.set(b"in-one", b"2");

  assert_eq!(db.get(b"in-zero"), Some(b"1".to_vec()));
  assert_eq!(db.get(b"in-one"), Some(b"2".to_vec()));
  assert!(dir.path().join("1").is_dir());
  let mut buckets = db.all_buckets();
  buckets.sort();
  assert_eq!(buckets, vec!["0".to_string(), "1".to_string()]);
  OK
}
