// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed storage for chunk embedding vectors.
//!
//! A store is persisted as two artifacts sharing a base path:
//!
//! * `<base>.vectors` - binary header plus little-endian `f32` rows
//! * `<base>.meta.json` - pretty JSON array with one entry per row
//!
//! The vectors header records the row count and a blake3 digest of the
//! metadata file, so a load fails loudly when the two disagree.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::embedding::chunker::Chunk;
use crate::errors::StoreError;

/// Default embedding dimension for text-embedding-3-small.
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

const MAGIC: &[u8; 8] = b"DOCRAGV1";
const HEADER_LEN: usize = 8 + 4 + 8 + 32;

/// Metadata kept for each stored vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(rename = "text_chunk")]
    pub text: String,
    #[serde(rename = "source")]
    pub source_id: String,
}

impl From<Chunk> for ChunkMetadata {
    fn from(chunk: Chunk) -> Self {
        Self {
            text: chunk.text,
            source_id: chunk.source_id,
        }
    }
}

/// A search result from similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    /// Inner product between the query and the stored vector
    pub score: f32,
    pub text: String,
    pub source_id: String,
}

/// Paths of the two persisted artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingFiles {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl BackingFiles {
    pub fn for_base(base: &Path) -> Self {
        Self {
            vectors: with_suffix(base, ".vectors"),
            metadata: with_suffix(base, ".meta.json"),
        }
    }

    /// Returns true if either artifact is present on disk.
    pub fn any_exists(&self) -> bool {
        self.vectors.exists() || self.metadata.exists()
    }

    /// Deletes both artifacts, ignoring ones that do not exist.
    pub fn remove(&self) -> Result<(), StoreError> {
        for path in [&self.vectors, &self.metadata] {
            match fs::remove_file(path) {
                Ok(()) => debug!("removed {}", path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

/// Append-only vector store with exact inner-product search.
///
/// Vectors are kept row-major in one flat buffer; `metadata[i]` describes
/// row `i`.
#[derive(Debug)]
pub struct EmbeddingStorage {
    dimension: usize,
    vectors: Vec<f32>,
    metadata: Vec<ChunkMetadata>,
    base_path: PathBuf,
}

impl EmbeddingStorage {
    /// An empty store that will persist to `base_path`; existing files are
    /// neither read nor touched until [`persist`](Self::persist).
    pub fn new<P: AsRef<Path>>(dimension: usize, base_path: P) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            metadata: Vec::new(),
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Loads the store at `base_path`, or creates an empty one if no backing
    /// files exist.
    ///
    /// Corrupt or inconsistent backing files are an error; there is no
    /// fallback to an empty store.
    pub fn open<P: AsRef<Path>>(dimension: usize, base_path: P) -> Result<Self, StoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        let files = BackingFiles::for_base(&base_path);

        if !files.any_exists() {
            info!("created new vector store (dim={})", dimension);
            return Ok(Self::new(dimension, base_path));
        }

        info!("loading vector store from {}", base_path.display());
        let (vectors, metadata) = load_files(&files, dimension)?;
        info!("loaded vector store with {} entries", metadata.len());

        Ok(Self {
            dimension,
            vectors,
            metadata,
            base_path,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn backing_files(&self) -> BackingFiles {
        BackingFiles::for_base(&self.base_path)
    }

    /// Metadata for every entry, in insertion order.
    pub fn metadata(&self) -> &[ChunkMetadata] {
        &self.metadata
    }

    /// Appends vectors with their metadata after any existing entries.
    ///
    /// The batch is validated before anything is appended, so a rejected
    /// batch leaves the store untouched.
    pub fn append_batch(
        &mut self,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
    ) -> Result<(), StoreError> {
        if vectors.len() != metadatas.len() {
            return Err(StoreError::LengthMismatch {
                vectors: vectors.len(),
                metadatas: metadatas.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        if vectors.is_empty() {
            return Ok(());
        }

        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.vectors.extend_from_slice(&vector);
        }
        self.metadata.extend(metadatas);

        Ok(())
    }

    /// Writes both artifacts to disk.
    ///
    /// Each artifact is written to a `.tmp` sibling, synced and renamed into
    /// place, metadata first.
    pub fn persist(&self) -> Result<(), StoreError> {
        let files = self.backing_files();
        if let Some(parent) = files.vectors.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let meta_bytes = serde_json::to_vec_pretty(&self.metadata)?;
        let digest = blake3::hash(&meta_bytes);

        let meta_tmp = with_suffix(&files.metadata, ".tmp");
        let vectors_tmp = with_suffix(&files.vectors, ".tmp");

        write_synced(&meta_tmp, |w| w.write_all(&meta_bytes))?;
        write_synced(&vectors_tmp, |w| {
            w.write_all(MAGIC)?;
            w.write_all(&(self.dimension as u32).to_le_bytes())?;
            w.write_all(&(self.len() as u64).to_le_bytes())?;
            w.write_all(digest.as_bytes())?;
            w.write_all(&Self::embedding_to_blob(&self.vectors))
        })?;

        fs::rename(&meta_tmp, &files.metadata)?;
        fs::rename(&vectors_tmp, &files.vectors)?;

        info!(
            "vector store saved to {} ({} entries)",
            self.base_path.display(),
            self.len()
        );
        Ok(())
    }

    /// Performs brute-force inner-product search across all entries.
    ///
    /// Returns at most `top_k` results sorted by descending score; ties keep
    /// insertion order.
    pub fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityResult>, StoreError> {
        if query_embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| Self::inner_product(query_embedding, row))
            .enumerate()
            .collect();

        // Sort by score (descending)
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| {
                let meta = &self.metadata[idx];
                SimilarityResult {
                    score,
                    text: meta.text.clone(),
                    source_id: meta.source_id.clone(),
                }
            })
            .collect())
    }

    /// Converts embedding values to a compact blob.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Converts a blob back to embedding values.
    fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn inner_product(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }
}

fn load_files(
    files: &BackingFiles,
    dimension: usize,
) -> Result<(Vec<f32>, Vec<ChunkMetadata>), StoreError> {
    let vectors_path = &files.vectors;
    if !vectors_path.exists() {
        return Err(StoreError::corrupt(vectors_path, "vectors file is missing"));
    }
    if !files.metadata.exists() {
        return Err(StoreError::corrupt(&files.metadata, "metadata file is missing"));
    }

    let raw = fs::read(vectors_path)?;
    let meta_bytes = fs::read(&files.metadata)?;

    if raw.len() < HEADER_LEN || &raw[..8] != MAGIC {
        return Err(StoreError::corrupt(vectors_path, "bad header"));
    }
    let stored_dim = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&raw[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;
    let digest = &raw[20..HEADER_LEN];

    if stored_dim != dimension {
        return Err(StoreError::DimensionMismatch {
            expected: dimension,
            actual: stored_dim,
        });
    }

    let payload = &raw[HEADER_LEN..];
    let expected_len = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| StoreError::corrupt(vectors_path, "entry count overflows"))?;
    if payload.len() != expected_len {
        return Err(StoreError::corrupt(
            vectors_path,
            format!(
                "expected {} payload bytes for {} entries, found {}",
                expected_len,
                count,
                payload.len()
            ),
        ));
    }

    if blake3::hash(&meta_bytes).as_bytes() != digest {
        return Err(StoreError::corrupt(
            &files.metadata,
            "metadata does not match the vectors file",
        ));
    }

    let metadata: Vec<ChunkMetadata> = serde_json::from_slice(&meta_bytes)
        .map_err(|e| StoreError::corrupt(&files.metadata, e.to_string()))?;
    if metadata.len() != count {
        return Err(StoreError::corrupt(
            &files.metadata,
            format!("{} metadata entries for {} vectors", metadata.len(), count),
        ));
    }

    Ok((EmbeddingStorage::blob_to_embedding(payload), metadata))
}

fn write_synced(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<(), StoreError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
