//! Partial, random-access loading of TAF files.
//!
//! [`StreamingLoader`] keeps the file open and serves individual chunk
//! payloads on demand, backed by an access-counted cache with a hard
//! size bound. Two locks split the state: one guards the file handle and
//! the parsed directory (all seeks and reads are serialized), the other
//! guards the cache and its counters. The two are never held at the same
//! time.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use taf_asset::{AssetHeader, ChunkDirectoryEntry, ChunkType, DIRECTORY_ENTRY_SIZE, HEADER_SIZE};

use crate::{Error, Result};

/// Cache size bound in bytes.
pub const CACHE_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of chunks currently cached.
    pub loaded_count: usize,
    /// Total cached payload bytes.
    pub size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct CachedChunk {
    data: Vec<u8>,
    access_count: u64,
}

#[derive(Debug, Default)]
struct ChunkCache {
    chunks: FxHashMap<u32, CachedChunk>,
    size_bytes: usize,
    hits: u64,
    misses: u64,
}

impl ChunkCache {
    fn clear(&mut self) {
        self.chunks.clear();
        self.size_bytes = 0;
        self.hits = 0;
        self.misses = 0;
    }

    fn insert(&mut self, index: u32, data: Vec<u8>) {
        self.size_bytes += data.len();
        self.chunks.insert(
            index,
            CachedChunk {
                data,
                access_count: 1,
            },
        );

        // Least-accessed chunks go first; on equal counts the
        // earliest-resident (lowest index) chunk stays.
        while self.size_bytes > CACHE_LIMIT_BYTES && !self.chunks.is_empty() {
            let victim = self
                .chunks
                .iter()
                .min_by_key(|&(&idx, chunk)| (chunk.access_count, std::cmp::Reverse(idx)))
                .map(|(&idx, _)| idx)
                .expect("cache is non-empty");
            if let Some(evicted) = self.chunks.remove(&victim) {
                self.size_bytes -= evicted.data.len();
                log::debug!(
                    "evicted chunk {victim} ({} bytes, {} accesses)",
                    evicted.data.len(),
                    evicted.access_count
                );
            }
        }
    }
}

#[derive(Debug, Default)]
struct FileState {
    file: Option<File>,
    path: PathBuf,
    header: AssetHeader,
    directory: Vec<ChunkDirectoryEntry>,
}

/// A TAF file opened for random-access chunk reads.
///
/// Shared across threads behind an `Arc`; see [`crate::StreamingHandle`]
/// for reference-counted sharing with a process-wide registry.
#[derive(Debug, Default)]
pub struct StreamingLoader {
    state: Mutex<FileState>,
    cache: Mutex<ChunkCache>,
}

impl StreamingLoader {
    /// Create a closed loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a TAF file, validating the header and directory without
    /// reading any payload. A prior open file is closed first.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        {
            let mut state = self.state.lock();
            state.file = None;
            state.directory.clear();

            let mut file = File::open(path)?;
            let file_size = file.metadata()?.len();
            if file_size < HEADER_SIZE as u64 {
                return Err(Error::Validation(format!(
                    "file too small for header: {file_size} bytes"
                )));
            }

            let mut header_bytes = vec![0u8; HEADER_SIZE];
            file.read_exact(&mut header_bytes)
                .map_err(|e| Error::Read(format!("failed to read header: {e}")))?;
            let header = AssetHeader::decode(&header_bytes)?;
            header.validate(file_size, &header_bytes)?;

            let mut directory = Vec::with_capacity(header.chunk_count as usize);
            let mut entry_bytes = vec![0u8; DIRECTORY_ENTRY_SIZE];
            for i in 0..header.chunk_count {
                file.read_exact(&mut entry_bytes)
                    .map_err(|e| Error::Read(format!("failed to read directory entry {i}: {e}")))?;
                let entry = ChunkDirectoryEntry::decode(&entry_bytes)?;
                if entry.offset >= file_size || entry.offset + entry.size > file_size {
                    return Err(Error::Validation(format!(
                        "chunk {i} ({:?}) extends beyond file: offset={}, size={}",
                        entry.name, entry.offset, entry.size
                    )));
                }
                directory.push(entry);
            }

            log::info!(
                "opened streaming TAF {} ({} chunks, version {}.{}.{})",
                path.display(),
                header.chunk_count,
                header.version_major,
                header.version_minor,
                header.version_patch
            );

            state.file = Some(file);
            state.path = path.to_path_buf();
            state.header = header;
            state.directory = directory;
        }

        self.cache.lock().clear();
        Ok(())
    }

    /// Close the file and drop the directory and cache.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.file = None;
            state.directory.clear();
        }
        self.cache.lock().clear();
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().file.is_some()
    }

    pub fn path(&self) -> PathBuf {
        self.state.lock().path.clone()
    }

    /// Snapshot of the parsed header.
    pub fn header(&self) -> AssetHeader {
        self.state.lock().header.clone()
    }

    /// Snapshot of the chunk directory.
    pub fn directory(&self) -> Vec<ChunkDirectoryEntry> {
        self.state.lock().directory.clone()
    }

    pub fn chunk_count(&self) -> u32 {
        self.state.lock().directory.len() as u32
    }

    /// Directory entry for a chunk index, without touching the file.
    pub fn get_chunk_info(&self, index: u32) -> Option<ChunkDirectoryEntry> {
        self.state.lock().directory.get(index as usize).cloned()
    }

    /// Directory entry by chunk name, without touching the file.
    pub fn get_chunk_info_by_name(&self, name: &str) -> Option<ChunkDirectoryEntry> {
        self.state
            .lock()
            .directory
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    /// Find a chunk index by name.
    pub fn find_chunk_index(&self, name: &str) -> Option<u32> {
        self.state
            .lock()
            .directory
            .iter()
            .position(|e| e.name == name)
            .map(|i| i as u32)
    }

    /// Load a chunk's payload, consulting the cache first.
    pub fn load_chunk(&self, index: u32) -> Result<Vec<u8>> {
        {
            let mut cache = self.cache.lock();
            if let Some(chunk) = cache.chunks.get_mut(&index) {
                chunk.access_count += 1;
                let data = chunk.data.clone();
                cache.hits += 1;
                return Ok(data);
            }
            cache.misses += 1;
        }

        let data = self.read_chunk(index)?;

        // Insert and evict inside one critical section, so eviction is
        // never observable mid-load.
        self.cache.lock().insert(index, data.clone());
        Ok(data)
    }

    /// Load a chunk by its directory name.
    pub fn load_chunk_by_name(&self, name: &str) -> Result<Vec<u8>> {
        let index = self
            .find_chunk_index(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.load_chunk(index)
    }

    /// Load the first AUDI chunk, the out-of-band metadata for streaming
    /// audio assets.
    pub fn load_metadata(&self) -> Result<Vec<u8>> {
        let index = {
            let state = self.state.lock();
            state
                .directory
                .iter()
                .position(|e| e.chunk_type == ChunkType::Audio)
                .map(|i| i as u32)
        };
        match index {
            Some(index) => self.load_chunk(index),
            None => Err(Error::NotFound("no AUDI chunk present".into())),
        }
    }

    /// Load a sequentially named audio data chunk.
    pub fn load_audio_chunk(&self, chunk_index: u32) -> Result<Vec<u8>> {
        self.load_chunk_by_name(&format!("audio_chunk_{chunk_index}"))
    }

    /// Populate the cache for a set of chunk indices.
    pub fn preload_chunks(&self, indices: &[u32]) -> Result<()> {
        for &index in indices {
            self.load_chunk(index)?;
        }
        Ok(())
    }

    /// Drop all cached chunks and reset the hit/miss counters.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Snapshot of cache occupancy and counters.
    pub fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            loaded_count: cache.chunks.len(),
            size_bytes: cache.size_bytes,
            hits: cache.hits,
            misses: cache.misses,
        }
    }

    /// Read a chunk from disk under the file lock.
    fn read_chunk(&self, index: u32) -> Result<Vec<u8>> {
        let mut state = self.state.lock();

        let entry = state
            .directory
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("chunk index {index}")))?;

        let file = state
            .file
            .as_mut()
            .ok_or_else(|| Error::Read("file not open".into()))?;

        file.seek(SeekFrom::Start(entry.offset)).map_err(|e| {
            Error::Read(format!(
                "failed to seek to offset {} for chunk {:?}: {e}",
                entry.offset, entry.name
            ))
        })?;

        let mut data = vec![0u8; entry.size as usize];
        file.read_exact(&mut data).map_err(|e| {
            Error::Read(format!(
                "short read for chunk {:?} (expected {} bytes): {e}",
                entry.name, entry.size
            ))
        })?;
        Ok(data)
    }
}
