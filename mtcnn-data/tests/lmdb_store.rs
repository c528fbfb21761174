mod common;

use common::*;
use heed::{types::Bytes, Database, EnvOpenOptions};
use mtcnn_data::{
    store::{LmdbCursor, RecordCursor},
    Config, Error, Prefetcher, StoreConfig,
};
use std::path::Path;
use tempfile::TempDir;

fn write_lmdb(dir: &Path, count: i32) {
    let env = unsafe {
        EnvOpenOptions::new()
            .map_size(16 * 1024 * 1024)
            .open(dir)
            .unwrap()
    };
    let mut wtxn = env.write_txn().unwrap();
    let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, None).unwrap();
    (0..count).for_each(|label| {
        let key = format!("{:08}_face.jpg", label);
        db.put(&mut wtxn, key.as_bytes(), &record(label, 4).encode())
            .unwrap();
    });
    wtxn.commit().unwrap();
    env.prepare_for_closing().wait();
}

#[test]
fn lmdb_cursor_wraps_around() {
    let dir = TempDir::new().unwrap();
    write_lmdb(dir.path(), 3);

    let lmdb = LmdbCursor::open(dir.path()).unwrap();
    assert_eq!(lmdb.len().unwrap(), 3);

    let mut cursor = RecordCursor::open(lmdb).unwrap();
    let mut labels = vec![];
    for _ in 0..7 {
        let record = mtcnn_data::Record::decode(cursor.current().unwrap()).unwrap();
        labels.push(record.label.unwrap());
        cursor.advance().unwrap();
    }
    assert_eq!(labels, [0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(cursor.offset(), 7);
}

#[test]
fn prefetch_from_lmdb_config() {
    let dir = TempDir::new().unwrap();
    write_lmdb(dir.path(), 5);

    let config = Config {
        store: StoreConfig::Lmdb {
            source: dir.path().to_owned(),
        },
        pipeline: pipeline_config(3, 2),
    };
    let prefetcher = Prefetcher::new(&config).unwrap();

    let batch = prefetcher.next_batch().unwrap();
    assert_eq!(batch.label().unwrap().to_vec(), [0, 1, 2]);
    prefetcher.release(batch);
    let batch = prefetcher.next_batch().unwrap();
    assert_eq!(batch.label().unwrap().to_vec(), [3, 4, 0]);
    prefetcher.release(batch);

    prefetcher.shutdown().unwrap();
}

#[test]
fn missing_lmdb_directory() {
    let dir = TempDir::new().unwrap();
    let result = LmdbCursor::open(dir.path().join("missing"));
    assert!(matches!(result, Err(Error::Io { .. })));
}
