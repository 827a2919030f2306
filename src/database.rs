//-
// Copyright 2017, 2018, 2019 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Modifications: adapted from `failure_persistence`'s seed-keyed,
// source-file-resolved hierarchy into the conjecture engine's much simpler
// buffer-keyed `Database` (spec.md §6): three concrete keys derived from one
// opaque `database_key`, four operations (`fetch`/`save`/`delete`/`move`),
// no `source_file` resolution since the key is supplied directly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::RwLock;

/// External persistence for previously-seen buffers, keyed by an opaque
/// byte string.
///
/// Implementations must tolerate concurrent single-process use (the engine
/// itself is sequential, per spec.md §5, but a `Database` may be shared
/// across independently-run engines in the same process).
pub trait Database: fmt::Debug + Send + Sync {
    /// Return every buffer previously saved under `key`, in unspecified
    /// order.
    fn fetch(&self, key: &[u8]) -> Vec<Vec<u8>>;

    /// Persist `buffer` under `key`. A database that cannot persist (e.g.
    /// because the key is unusable as a storage key) silently does
    /// nothing; see spec.md §7, "missing database key (no-op save)".
    fn save(&self, key: &[u8], buffer: &[u8]);

    /// Remove `buffer` from `key`, if present. A no-op if it is absent.
    fn delete(&self, key: &[u8], buffer: &[u8]);

    /// Atomically move `buffer` from `src` to `dst` ("demotion" of a
    /// superseded interesting example to the secondary corpus).
    ///
    /// The default implementation is `save(dst, buffer)` followed by
    /// `delete(src, buffer)`, which is correct but not atomic; backends for
    /// which atomicity is cheap (e.g. a single directory rename) should
    /// override it.
    fn move_buffer(&self, src: &[u8], dst: &[u8], buffer: &[u8]) {
        self.save(dst, buffer);
        self.delete(src, buffer);
    }
}

/// The three derived database keys for a test (spec.md §6).
pub struct DatabaseKeys<'a> {
    /// `database_key` itself: a small set of minimized examples, each
    /// demonstrating a distinct bug.
    pub primary: &'a [u8],
    /// `database_key + ".secondary"`: examples that were interesting at
    /// some point but have since been superseded by a smaller one.
    pub secondary: Vec<u8>,
    /// `database_key + ".coverage"`: examples kept because they found new
    /// coverage targets, independent of whether they were ever interesting.
    pub covering: Vec<u8>,
}

impl<'a> DatabaseKeys<'a> {
    pub fn new(database_key: &'a [u8]) -> Self {
        let mut secondary = database_key.to_vec();
        secondary.extend_from_slice(b".secondary");
        let mut covering = database_key.to_vec();
        covering.extend_from_slice(b".coverage");
        DatabaseKeys {
            primary: database_key,
            secondary,
            covering,
        }
    }
}

/// A database that persists nothing.
#[derive(Debug, Default)]
pub struct NoopDatabase;

impl Database for NoopDatabase {
    fn fetch(&self, _key: &[u8]) -> Vec<Vec<u8>> {
        Vec::new()
    }
    fn save(&self, _key: &[u8], _buffer: &[u8]) {}
    fn delete(&self, _key: &[u8], _buffer: &[u8]) {}
}

/// A database that persists buffers on the heap, in memory.
///
/// Useful for accumulating failures across multiple `Engine` instances
/// within a single process, or for tests of the engine itself.
#[derive(Default, Debug)]
pub struct InMemoryDatabase {
    map: RwLock<BTreeMap<Vec<u8>, BTreeSet<Vec<u8>>>>,
}

impl Database for InMemoryDatabase {
    fn fetch(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.map
            .read()
            .unwrap()
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn save(&self, key: &[u8], buffer: &[u8]) {
        self.map
            .write()
            .unwrap()
            .entry(key.to_vec())
            .or_insert_with(BTreeSet::new)
            .insert(buffer.to_vec());
    }

    fn delete(&self, key: &[u8], buffer: &[u8]) {
        if let Some(set) = self.map.write().unwrap().get_mut(key) {
            set.remove(buffer);
        }
    }
}

/// A database that persists each buffer as one file inside a
/// per-key directory under `root`.
///
/// Keys and buffers may contain arbitrary bytes, so both are hex-encoded
/// into filesystem-safe names (c.f. the teacher's `FileFailurePersistence`,
/// which instead derives a path from the test's source location — not
/// applicable here since spec.md's `database_key` is already opaque).
#[derive(Debug)]
pub struct DirectoryDatabase {
    root: PathBuf,
}

impl DirectoryDatabase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryDatabase { root: root.into() }
    }

    fn key_dir(&self, key: &[u8]) -> PathBuf {
        self.root.join(hex_encode(key))
    }

    fn buffer_path(&self, key: &[u8], buffer: &[u8]) -> PathBuf {
        self.key_dir(key).join(hex_encode(buffer))
    }

    fn try_fetch(&self, key: &[u8]) -> io::Result<Vec<Vec<u8>>> {
        let dir = self.key_dir(key);
        let mut out = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let mut buf = Vec::new();
            fs::File::open(entry.path())?.read_to_end(&mut buf)?;
            out.push(buf);
        }
        Ok(out)
    }

    fn try_save(&self, key: &[u8], buffer: &[u8]) -> io::Result<()> {
        let dir = self.key_dir(key);
        fs::create_dir_all(&dir)?;
        let path = self.buffer_path(key, buffer);
        let mut f = fs::File::create(path)?;
        f.write_all(buffer)
    }

    fn try_delete(&self, key: &[u8], buffer: &[u8]) -> io::Result<()> {
        match fs::remove_file(self.buffer_path(key, buffer)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Database for DirectoryDatabase {
    fn fetch(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.try_fetch(key).unwrap_or_else(|e| {
            eprintln!(
                "conjecture-engine: failed to read {}: {}",
                self.key_dir(key).display(),
                e
            );
            Vec::new()
        })
    }

    fn save(&self, key: &[u8], buffer: &[u8]) {
        if let Err(e) = self.try_save(key, buffer) {
            eprintln!(
                "conjecture-engine: failed to save to {}: {}",
                self.key_dir(key).display(),
                e
            );
        }
    }

    fn delete(&self, key: &[u8], buffer: &[u8]) {
        if let Err(e) = self.try_delete(key, buffer) {
            eprintln!(
                "conjecture-engine: failed to delete from {}: {}",
                self.key_dir(key).display(),
                e
            );
        }
    }

    fn move_buffer(&self, src: &[u8], dst: &[u8], buffer: &[u8]) {
        let src_path = self.buffer_path(src, buffer);
        let dst_dir = self.key_dir(dst);
        if let Err(e) = fs::create_dir_all(&dst_dir) {
            eprintln!("conjecture-engine: failed to create {:?}: {}", dst_dir, e);
            return;
        }
        let dst_path = dst_dir.join(hex_encode(buffer));
        match fs::rename(&src_path, &dst_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Nothing at `src`; treat the demotion as already done.
            }
            Err(_) => {
                // Cross-device or other rename failure: fall back to the
                // non-atomic copy+delete sequence.
                self.save(dst, buffer);
                self.delete(src, buffer);
            }
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2 + 1);
    if bytes.is_empty() {
        s.push_str("empty");
    }
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_round_trips() {
        let db = InMemoryDatabase::default();
        db.save(b"k", b"hello");
        db.save(b"k", b"world");
        let mut got = db.fetch(b"k");
        got.sort();
        assert_eq!(vec![b"hello".to_vec(), b"world".to_vec()], got);

        db.delete(b"k", b"hello");
        assert_eq!(vec![b"world".to_vec()], db.fetch(b"k"));
    }

    #[test]
    fn in_memory_move_demotes() {
        let db = InMemoryDatabase::default();
        db.save(b"primary", b"buf");
        db.move_buffer(b"primary", b"secondary", b"buf");
        assert!(db.fetch(b"primary").is_empty());
        assert_eq!(vec![b"buf".to_vec()], db.fetch(b"secondary"));
    }

    #[test]
    fn directory_round_trips() {
        let dir = std::env::temp_dir().join(format!(
            "conjecture-engine-test-{}-{}",
            std::process::id(),
            "directory_round_trips"
        ));
        let _ = fs::remove_dir_all(&dir);
        let db = DirectoryDatabase::new(&dir);
        db.save(b"k", b"alpha");
        db.save(b"k", b"beta");
        let mut got = db.fetch(b"k");
        got.sort();
        assert_eq!(vec![b"alpha".to_vec(), b"beta".to_vec()], got);

        db.move_buffer(b"k", b"k.secondary", b"alpha");
        assert_eq!(vec![b"beta".to_vec()], db.fetch(b"k"));
        assert_eq!(vec![b"alpha".to_vec()], db.fetch(b"k.secondary"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_key_is_empty_not_an_error() {
        let db = InMemoryDatabase::default();
        assert!(db.fetch(b"nope").is_empty());
        let dir_db = DirectoryDatabase::new(std::env::temp_dir().join("conjecture-engine-test-missing"));
        assert!(dir_db.fetch(b"nope").is_empty());
    }

    #[test]
    fn database_keys_derive_correctly() {
        let keys = DatabaseKeys::new(b"abc");
        assert_eq!(b"abc", keys.primary);
        assert_eq!(b"abc.secondary".to_vec(), keys.secondary);
        assert_eq!(b"abc.coverage".to_vec(), keys.covering);
    }
}
