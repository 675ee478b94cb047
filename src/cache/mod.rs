use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StatusOr;

/// On-disk cache for Nominatim and Overpass responses, keyed by request.
#[derive(Debug, Clone)]
pub struct Cache {
    cache_dir: PathBuf,
}

impl Cache {
    /// Create a new cache with the given directory
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> StatusOr<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Read the cached response for a request key, if any
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.get_cache_path(key)).ok()
    }

    /// Save a response to the cache
    pub fn save(&self, key: &str, data: &[u8]) -> StatusOr<PathBuf> {
        let file_path = self.get_cache_path(key);

        // Entries appear whole: write a sibling file, then rename
        let partial = file_path.with_extension("part");
        let mut file = File::create(&partial)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&partial, &file_path)?;

        Ok(file_path)
    }

    /// Get the cache path for a request key
    fn get_cache_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        self.cache_dir.join(format!("{}.json", hash))
    }

    /// Clear the cache
    pub fn clear(&self) -> StatusOr<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
        }
        fs::create_dir_all(&self.cache_dir)?;
        Ok(())
    }
}
