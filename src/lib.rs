//! `jdb_cask` — a Bitcask-style append-only embedded key/value store.
//! `jdb_cask` —— 日志结构追加写嵌入式键值存储
//!
//! Every write is appended to a per-bucket data file; a full in-memory
//! index maps keys to the byte offset of their latest record. The store
//! is single-threaded and synchronous: no background thread, no async
//! surface, no file locks across processes.
//! 每次写入都追加到按桶划分的数据文件；一张完整的内存索引将 key 映射到
//! 其最新记录的字节偏移。该存储是单线程同步的：没有后台线程、没有异步
//! 接口、没有跨进程文件锁
//!
//! ```no_run
//! use jdb_cask::{Conf, ConfItem, Db};
//!
//! let conf = Conf::new("/tmp/example-db", &[]);
//! let mut db = Db::open(&conf)?;
//! db.set(b"hello", b"world");
//! assert_eq!(db.get(b"hello"), Some(b"world".to_vec()));
//! # let _ = ConfItem::FileSize(0);
//! # Ok::<(), jdb_cask::Error>(())
//! ```

mod bucket;
mod conf;
mod db;
mod error;
mod gc;
mod index;
mod path;
mod record;

pub use conf::{Conf, ConfItem, DEFAULT_FILE_SIZE};
pub use db::{BucketStats, Db, DEFAULT_BUCKET};
pub use error::{Error, Result};
pub use index::Descriptor;
pub use record::{HEAD_SIZE, Head};
