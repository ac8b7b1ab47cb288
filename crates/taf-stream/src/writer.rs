//! Two-pass writer for streaming-oriented TAF files.
//!
//! [`ChunkedWriter`] accepts payloads whose offsets stay zero until
//! [`finalize`](ChunkedWriter::finalize), which lays out the file and
//! writes header, directory and all buffered payloads in one pass.
//! Payloads are buffered in memory so the finalized file always carries
//! the bytes its directory declares.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use taf_asset::{
    AssetHeader, ChunkDirectoryEntry, ChunkType, FeatureFlags, DIRECTORY_ENTRY_SIZE, HEADER_SIZE,
};

use crate::{Error, Result};

/// Incremental writer for chunked streaming TAF files.
#[derive(Debug)]
pub struct ChunkedWriter {
    path: PathBuf,
    file: Option<File>,
    directory: Vec<ChunkDirectoryEntry>,
    payloads: Vec<Vec<u8>>,
    header_written: bool,
}

impl ChunkedWriter {
    /// Create the output file and an empty directory.
    pub fn begin<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            directory: Vec::new(),
            payloads: Vec::new(),
            header_written: false,
        })
    }

    /// Number of chunks added so far.
    pub fn chunk_count(&self) -> u32 {
        self.directory.len() as u32
    }

    /// Buffer an AUDI metadata chunk. Should be added first so it is the
    /// chunk a streaming loader's metadata lookup finds.
    pub fn add_metadata_chunk(&mut self, data: Vec<u8>, name: &str) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::Write("writer is not open".into()));
        }
        if self.header_written {
            return Err(Error::Write("writer is already finalized".into()));
        }
        let entry = ChunkDirectoryEntry::for_payload(ChunkType::Audio, &data, name);
        self.directory.push(entry);
        self.payloads.push(data);
        Ok(())
    }

    /// Buffer a sequentially named audio data chunk.
    pub fn add_audio_chunk(&mut self, data: Vec<u8>, chunk_index: u32) -> Result<()> {
        self.add_metadata_chunk(data, &format!("audio_chunk_{chunk_index}"))
    }

    /// Lay out offsets and write header, directory and payloads.
    ///
    /// Guarded by a latch: a second call is an error, as is adding
    /// further chunks afterwards.
    pub fn finalize(&mut self) -> Result<()> {
        if self.header_written {
            return Err(Error::Write("writer is already finalized".into()));
        }
        let mut file = self
            .file
            .take()
            .ok_or_else(|| Error::Write("writer is not open".into()))?;

        let data_start = (HEADER_SIZE + self.directory.len() * DIRECTORY_ENTRY_SIZE) as u64;
        let mut current_offset = data_start;
        for entry in &mut self.directory {
            entry.offset = current_offset;
            current_offset += entry.size;
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let header = AssetHeader {
            feature_flags: FeatureFlags::AUDIO | FeatureFlags::STREAMING,
            chunk_count: self.directory.len() as u32,
            total_size: current_offset,
            created_timestamp: timestamp,
            creator: "taf chunked writer".to_string(),
            description: "Chunked streaming audio".to_string(),
            ..Default::default()
        };

        file.write_all(&header.encode())
            .map_err(|e| Error::Write(format!("failed to write header: {e}")))?;
        for entry in &self.directory {
            file.write_all(&entry.encode())
                .map_err(|e| Error::Write(format!("failed to write entry {:?}: {e}", entry.name)))?;
        }

        for (entry, payload) in self.directory.iter().zip(&self.payloads) {
            let pos = file.stream_position()?;
            if pos != entry.offset {
                return Err(Error::Write(format!(
                    "offset drift for chunk {:?}: expected {}, at {pos}",
                    entry.name, entry.offset
                )));
            }
            file.write_all(payload)
                .map_err(|e| Error::Write(format!("failed to write chunk {:?}: {e}", entry.name)))?;
        }
        file.flush()?;

        self.header_written = true;
        log::info!(
            "finalized chunked TAF {}: {} chunks, {} bytes",
            self.path.display(),
            self.directory.len(),
            current_offset
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StreamingLoader;
    use taf_asset::Asset;

    #[test]
    fn finalized_file_is_a_valid_taf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunked.taf");

        let mut writer = ChunkedWriter::begin(&path).unwrap();
        writer
            .add_metadata_chunk(vec![9u8; 100], "audio_metadata")
            .unwrap();
        writer.add_audio_chunk(vec![1u8; 500], 0).unwrap();
        writer.add_audio_chunk(vec![2u8; 500], 1).unwrap();
        assert_eq!(writer.chunk_count(), 3);
        writer.finalize().unwrap();

        // The full container loader accepts the file, CRCs included.
        let asset = Asset::load_from_file_safe(&path).unwrap();
        assert_eq!(asset.get_chunk_count(), 3);
        assert!(asset.has_feature(FeatureFlags::STREAMING));
        assert!(asset.has_feature(FeatureFlags::AUDIO));

        // And the streaming loader serves the named chunks.
        let loader = StreamingLoader::new();
        loader.open(&path).unwrap();
        assert_eq!(loader.load_metadata().unwrap(), vec![9u8; 100]);
        assert_eq!(loader.load_audio_chunk(1).unwrap(), vec![2u8; 500]);
    }

    #[test]
    fn layout_is_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.taf");

        let mut writer = ChunkedWriter::begin(&path).unwrap();
        writer.add_audio_chunk(vec![0u8; 10], 0).unwrap();
        writer.add_audio_chunk(vec![0u8; 20], 1).unwrap();
        writer.finalize().unwrap();

        let loader = StreamingLoader::new();
        loader.open(&path).unwrap();
        let directory = loader.directory();
        let data_start = (HEADER_SIZE + 2 * DIRECTORY_ENTRY_SIZE) as u64;
        assert_eq!(directory[0].offset, data_start);
        assert_eq!(directory[1].offset, data_start + 10);
    }

    #[test]
    fn finalize_is_latched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latch.taf");

        let mut writer = ChunkedWriter::begin(&path).unwrap();
        writer.add_audio_chunk(vec![0u8; 10], 0).unwrap();
        writer.finalize().unwrap();

        assert!(writer.finalize().is_err());
        assert!(writer.add_audio_chunk(vec![0u8; 10], 1).is_err());
    }
}
