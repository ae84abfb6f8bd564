use crate::error::WindSpeedError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "urma_wind_rs_cache";

pub fn get_cache_dir() -> Result<PathBuf, WindSpeedError> {
    dirs::cache_dir()
        .ok_or(WindSpeedError::CacheDirResolution)
        .map(|p| p.join(CACHE_DIR_NAME))
}

pub async fn ensure_cache_dir_exists(path: &Path) -> Result<(), WindSpeedError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(WindSpeedError::CacheDirCreation(
            path.to_path_buf(),
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "cache path exists but is not a directory",
            ),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating cache directory: {}", path.display());
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| WindSpeedError::CacheDirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(WindSpeedError::CacheDirCreation(path.to_path_buf(), e)),
    }
}
