//! Two-tier lexical index store: a bounded in-memory map from document id to
//! index, filled lazily from per-document directories on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use blendrag_core::error::{Error, Result};
use blendrag_core::types::Chunk;

use crate::index::LexicalIndex;

struct Slot {
	index: Arc<LexicalIndex>,
	last_used: u64,
}

#[derive(Default)]
struct Cache {
	slots: HashMap<String, Slot>,
	clock: u64,
}

impl Cache {
	fn touch(&mut self, document_id: &str) -> Option<Arc<LexicalIndex>> {
		self.clock += 1;
		let now = self.clock;
		self.slots.get_mut(document_id).map(|slot| { slot.last_used = now; slot.index.clone() })
	}

	fn insert(&mut self, document_id: &str, index: Arc<LexicalIndex>) {
		self.clock += 1;
		self.slots.insert(document_id.to_string(), Slot { index, last_used: self.clock });
	}

	/// Keeps an entry that appeared while `index` was read from disk; it may
	/// come from a newer build.
	fn insert_if_absent(&mut self, document_id: &str, index: Arc<LexicalIndex>) -> Arc<LexicalIndex> {
		if let Some(current) = self.touch(document_id) {
			return current;
		}
		self.insert(document_id, index.clone());
		index
	}

	fn evict_lru(&mut self, capacity: usize) {
		while self.slots.len() > capacity {
			let Some(oldest) = self.slots.iter().min_by_key(|(_, s)| s.last_used).map(|(k, _)| k.clone()) else { break };
			debug!(document_id = %oldest, "evicting lexical index from memory");
			self.slots.remove(&oldest);
		}
	}
}

/// Owns every document's lexical index.
///
/// On-disk stores keep at most `capacity` indexes in memory and reload
/// evicted ones from `root/<document>` on the next access. In-memory stores
/// have nowhere to reload from, so they never evict.
pub struct LexicalStore {
	root: Option<PathBuf>,
	capacity: usize,
	cache: Mutex<Cache>,
}

impl LexicalStore {
	pub fn on_disk(root: impl Into<PathBuf>, capacity: usize) -> Self {
		Self { root: Some(root.into()), capacity: capacity.max(1), cache: Mutex::new(Cache::default()) }
	}

	pub fn in_memory() -> Self {
		Self { root: None, capacity: usize::MAX, cache: Mutex::new(Cache::default()) }
	}

	fn lock(&self) -> Result<MutexGuard<'_, Cache>> {
		self.cache.lock().map_err(|_| Error::Operation("lexical cache lock poisoned".into()))
	}

	fn dir_for(&self, document_id: &str) -> Option<PathBuf> {
		self.root.as_deref().map(|root| root.join(dir_name(document_id)))
	}

	/// Builds (or rebuilds wholesale) the index for `document_id` and caches it.
	pub fn build(&self, document_id: &str, chunks: &[Chunk]) -> Result<Arc<LexicalIndex>> {
		let staged = self.stage(document_id, chunks)?;
		self.commit(staged)
	}

	/// Builds a replacement index without touching the live one. On disk it
	/// is written next to the document's directory; nothing reads it until
	/// `commit`, and dropping it uncommitted removes it.
	pub fn stage(&self, document_id: &str, chunks: &[Chunk]) -> Result<StagedIndex> {
		let mut staged = StagedIndex { document_id: document_id.to_string(), chunks: chunks.len(), index: None, dir: None };
		match self.dir_for(document_id) {
			Some(dir) => {
				let staging = staging_dir(&dir);
				staged.dir = Some(staging.clone());
				LexicalIndex::build(document_id, chunks, Some(&staging))?;
			}
			None => staged.index = Some(Arc::new(LexicalIndex::build(document_id, chunks, None)?)),
		}
		debug!(document_id, "lexical index staged");
		Ok(staged)
	}

	/// Makes a staged index the live one, replacing any previous index.
	pub fn commit(&self, mut staged: StagedIndex) -> Result<Arc<LexicalIndex>> {
		let document_id = std::mem::take(&mut staged.document_id);
		let mut cache = self.lock()?;
		let index = match (staged.index.take(), staged.dir.take()) {
			(Some(index), _) => index,
			(None, Some(staging)) => {
				let dir = self
					.dir_for(&document_id)
					.ok_or_else(|| Error::Operation("on-disk staged index committed to an in-memory store".into()))?;
				if let Err(e) = swap_dirs(&staging, &dir) {
					let _ = std::fs::remove_dir_all(&staging);
					return Err(e);
				}
				Arc::new(LexicalIndex::open(&document_id, &dir)?)
			}
			(None, None) => return Err(Error::Operation(format!("staged index for '{document_id}' already consumed"))),
		};
		cache.insert(&document_id, index.clone());
		cache.evict_lru(self.capacity);
		info!(document_id = %document_id, chunks = staged.chunks, "lexical index built");
		Ok(index)
	}

	/// Returns the cached index, loading it from disk on a miss.
	/// Fails with `NotFound` when the document has no index.
	pub fn load(&self, document_id: &str) -> Result<Arc<LexicalIndex>> {
		if let Some(index) = self.lock()?.touch(document_id) {
			return Ok(index);
		}
		let Some(dir) = self.dir_for(document_id) else {
			return Err(Error::NotFound(format!("lexical index for document '{document_id}'")));
		};
		let index = Arc::new(LexicalIndex::open(document_id, &dir)?);
		let mut cache = self.lock()?;
		let index = cache.insert_if_absent(document_id, index);
		cache.evict_lru(self.capacity);
		debug!(document_id, "lexical index loaded from disk");
		Ok(index)
	}

	pub fn contains(&self, document_id: &str) -> Result<bool> {
		if self.lock()?.slots.contains_key(document_id) {
			return Ok(true);
		}
		Ok(self.dir_for(document_id).is_some_and(|d| d.join("meta.json").exists()))
	}

	/// Drops the in-memory copy only; the next `load` reads it back from disk.
	pub fn evict(&self, document_id: &str) -> Result<bool> {
		if self.root.is_none() {
			return Ok(false);
		}
		Ok(self.lock()?.slots.remove(document_id).is_some())
	}

	/// Removes the document's index from memory and disk.
	pub fn delete(&self, document_id: &str) -> Result<()> {
		self.lock()?.slots.remove(document_id);
		if let Some(dir) = self.dir_for(document_id) {
			for path in [retired_dir(&dir), dir] {
				if path.exists() {
					std::fs::remove_dir_all(&path).map_err(|e| Error::Index(e.to_string()))?;
				}
			}
		}
		info!(document_id, "lexical index deleted");
		Ok(())
	}

	pub fn cached_len(&self) -> Result<usize> {
		Ok(self.lock()?.slots.len())
	}

	pub fn root(&self) -> Option<&Path> {
		self.root.as_deref()
	}
}

/// A built index that readers cannot see yet. See [`LexicalStore::stage`].
pub struct StagedIndex {
	document_id: String,
	chunks: usize,
	index: Option<Arc<LexicalIndex>>,
	dir: Option<PathBuf>,
}

impl StagedIndex {
	pub fn document_id(&self) -> &str { &self.document_id }

	/// Directory the index was written to; `None` for in-memory stores.
	pub fn path(&self) -> Option<&Path> { self.dir.as_deref() }
}

impl Drop for StagedIndex {
	fn drop(&mut self) {
		if let Some(dir) = self.dir.take() {
			if dir.exists() {
				if let Err(e) = std::fs::remove_dir_all(&dir) {
					warn!(path = %dir.display(), error = %e, "failed to remove staged lexical index");
				}
			}
		}
	}
}

/// Document directory names never contain '.', so these cannot collide with
/// another document's directory.
fn staging_dir(dir: &Path) -> PathBuf { dir.with_extension("staging") }

fn retired_dir(dir: &Path) -> PathBuf { dir.with_extension("old") }

/// Moves `staging` into place at `dir`. The previous index is restored if the
/// final rename fails.
fn swap_dirs(staging: &Path, dir: &Path) -> Result<()> {
	let io_err = |e: std::io::Error| Error::Index(e.to_string());
	let retired = retired_dir(dir);
	if retired.exists() { std::fs::remove_dir_all(&retired).map_err(io_err)?; }
	if dir.exists() { std::fs::rename(dir, &retired).map_err(io_err)?; }
	if let Err(e) = std::fs::rename(staging, dir) {
		if retired.exists() { let _ = std::fs::rename(&retired, dir); }
		return Err(io_err(e));
	}
	if retired.exists() {
		if let Err(e) = std::fs::remove_dir_all(&retired) {
			warn!(path = %retired.display(), error = %e, "failed to remove replaced lexical index");
		}
	}
	Ok(())
}

/// Filesystem-safe, collision-free directory name for a document id.
fn dir_name(document_id: &str) -> String {
	let mut out = String::with_capacity(document_id.len());
	for b in document_id.bytes() {
		if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' { out.push(b as char); } else { out.push_str(&format!("~{b:02X}")); }
	}
	if out.is_empty() { "~".to_string() } else { out }
}
