//! Downloads URMA 10 m wind subsets from NOAA and caches them on disk.
//!
//! Only the U and V messages are fetched: the `.idx` inventory next to each
//! analysis file gives their byte offsets and two ranged GETs pull them out of
//! the ~150 MB file.

use crate::grid::field::GridField;
use crate::provider::error::ProviderError;
use crate::provider::grib2::decode_wind_field;
use crate::provider::index::{find, parse_index, ByteRange, IndexTarget};
use crate::provider::GridProvider;
use crate::types::model::Model;
use bon::bon;
use chrono::{NaiveDateTime, Timelike};
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use reqwest::{header, Client, StatusCode};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::pin;
use tempfile::NamedTempFile;
use tokio::{fs, task};

const WIND_TARGETS: [IndexTarget; 2] = [IndexTarget::U_10M, IndexTarget::V_10M];

/// A mirror that publishes URMA analysis files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// NOAA Open Data Dissemination bucket on AWS. Keeps the full archive.
    Aws,
    /// NCEP NOMADS. Only holds the last few days.
    Nomads,
    /// Any mirror with the NOAA directory layout under this base URL.
    Custom(String),
}

impl Source {
    /// Order in which sources are tried by default.
    pub fn priority() -> Vec<Source> {
        vec![Source::Aws, Source::Nomads]
    }

    fn base_url(&self) -> &str {
        match self {
            Source::Aws => "https://noaa-urma-pds.s3.amazonaws.com",
            Source::Nomads => "https://nomads.ncep.noaa.gov/pub/data/nccf/com/urma/prod",
            Source::Custom(base) => base.trim_end_matches('/'),
        }
    }

    /// URL of the analysis file for the cycle starting at `cycle`.
    pub fn grib_url(&self, model: Model, cycle: NaiveDateTime) -> String {
        format!(
            "{}/{}.{}/{}",
            self.base_url(),
            model.product_prefix(),
            cycle.format("%Y%m%d"),
            remote_file_name(model, cycle)
        )
    }

    /// URL of the `.idx` inventory for the cycle starting at `cycle`.
    pub fn index_url(&self, model: Model, cycle: NaiveDateTime) -> String {
        format!("{}.idx", self.grib_url(model, cycle))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Aws => write!(f, "aws"),
            Source::Nomads => write!(f, "nomads"),
            Source::Custom(base) => write!(f, "{}", base),
        }
    }
}

/// Analyses are hourly, so minutes and seconds are dropped.
pub fn analysis_cycle(valid_time: NaiveDateTime) -> NaiveDateTime {
    valid_time
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(valid_time)
}

/// File name NOAA uses for the analysis of `cycle`, e.g. `urma2p5.t12z.2dvaranl_ndfd.grb2_wexp`.
pub fn remote_file_name(model: Model, cycle: NaiveDateTime) -> String {
    format!(
        "{}.t{:02}z.{}",
        model.product_prefix(),
        cycle.hour(),
        model.analysis_suffix()
    )
}

pub struct UrmaProvider {
    save_dir: PathBuf,
    overwrite: bool,
    sources: Vec<Source>,
    client: Client,
}

#[bon]
impl UrmaProvider {
    /// Creates a provider caching under `save_dir`.
    ///
    /// With `overwrite` set, cached subsets are downloaded again instead of reused.
    #[builder]
    pub fn new(
        save_dir: PathBuf,
        #[builder(default)] overwrite: bool,
        #[builder(default = Source::priority())] sources: Vec<Source>,
    ) -> Self {
        Self {
            save_dir,
            overwrite,
            sources,
            client: Client::new(),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Location of the cached U/V subset for a cycle.
    pub fn cache_path(&self, model: Model, cycle: NaiveDateTime) -> PathBuf {
        self.save_dir
            .join(model.id())
            .join(cycle.format("%Y%m%d").to_string())
            .join(format!(
                "subset_UGRD-VGRD-10m__{}",
                remote_file_name(model, cycle)
            ))
    }

    /// Returns the raw GRIB2 subset for a cycle, from cache when possible.
    async fn load_subset(
        &self,
        model: Model,
        cycle: NaiveDateTime,
    ) -> Result<Vec<u8>, ProviderError> {
        let path = self.cache_path(model, cycle);

        if !self.overwrite && fs::metadata(&path).await.is_ok() {
            info!("Cache hit for {} {} at {:?}", model, cycle, path);
            return fs::read(&path)
                .await
                .map_err(|e| ProviderError::CacheRead(path, e));
        }

        if self.overwrite {
            info!("Overwrite requested for {} {}. Downloading.", model, cycle);
        } else {
            warn!("Cache miss for {} {}. Downloading.", model, cycle);
        }
        let bytes = self.download_subset(model, cycle).await?;
        let bytes = Self::write_cache(&path, bytes).await?;
        info!("Cached {} {} to {:?}", model, cycle, path);
        Ok(bytes)
    }

    /// Tries each source in order. A missing file moves on to the next source,
    /// any other failure is returned immediately.
    async fn download_subset(
        &self,
        model: Model,
        cycle: NaiveDateTime,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut tried = Vec::new();
        for source in &self.sources {
            match self.download_from(source, model, cycle).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if is_missing(&e) => {
                    debug!("{} has no {} file for {}: {}", source, model, cycle, e);
                    tried.push(source.index_url(model, cycle));
                }
                Err(e) => return Err(e),
            }
        }

        Err(ProviderError::NotFound {
            model,
            valid_time: cycle,
            tried: if tried.is_empty() {
                "no sources configured".to_string()
            } else {
                tried.join(", ")
            },
        })
    }

    async fn download_from(
        &self,
        source: &Source,
        model: Model,
        cycle: NaiveDateTime,
    ) -> Result<Vec<u8>, ProviderError> {
        let index_url = source.index_url(model, cycle);
        let grib_url = source.grib_url(model, cycle);

        info!("Downloading index from {}", index_url);
        let text = self
            .get(&index_url, None)
            .await
            .map(|body| String::from_utf8_lossy(&body).into_owned())?;
        let entries = parse_index(&index_url, &text)?;

        let mut ranges: Vec<ByteRange> = Vec::with_capacity(WIND_TARGETS.len());
        for target in &WIND_TARGETS {
            let (entry, range) =
                find(&entries, target).ok_or_else(|| ProviderError::NoMatchingMessages {
                    url: index_url.clone(),
                    pattern: target.to_string(),
                })?;
            debug!("{} is message {} ({})", target, entry.message, range.header_value());
            if !ranges.contains(&range) {
                ranges.push(range);
            }
        }

        let mut bytes = Vec::new();
        for range in ranges {
            bytes.extend(self.get(&grib_url, Some(range)).await?);
        }
        info!(
            "Successfully downloaded {} bytes of {} wind data from {}",
            bytes.len(),
            model,
            source
        );
        Ok(bytes)
    }

    /// GETs `url`, optionally restricted to `range`, and collects the body.
    async fn get(&self, url: &str, range: Option<ByteRange>) -> Result<Vec<u8>, ProviderError> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(header::RANGE, range.header_value());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    ProviderError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    ProviderError::NetworkRequest(url.to_string(), e)
                });
            }
        };
        let ignored_range = range.is_some() && response.status() == StatusCode::OK;

        let mut stream = pin!(response.bytes_stream());
        let mut body = Vec::new();
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| ProviderError::NetworkRequest(url.to_string(), e))?
        {
            body.extend_from_slice(&chunk);
        }

        match range {
            Some(range) if ignored_range => {
                warn!("{} ignored the Range header, slicing locally", url);
                slice_range(body, range, url)
            }
            _ => Ok(body),
        }
    }

    /// Writes through a temporary file in the target directory so readers never
    /// see a partial subset.
    async fn write_cache(path: &Path, bytes: Vec<u8>) -> Result<Vec<u8>, ProviderError> {
        let dir = match path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProviderError::CacheDirCreation(dir.clone(), e))?;

        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let mut temp_file = NamedTempFile::new_in(&dir)
                .map_err(|e| ProviderError::CacheWrite(path_buf.clone(), e))?;
            temp_file
                .write_all(&bytes)
                .map_err(|e| ProviderError::CacheWrite(path_buf.clone(), e))?;
            temp_file
                .flush()
                .map_err(|e| ProviderError::CacheWrite(path_buf.clone(), e))?;
            temp_file
                .persist(&path_buf)
                .map_err(|e| ProviderError::CacheWrite(path_buf.clone(), e.error))?;
            Ok(bytes)
        })
        .await?
    }
}

impl GridProvider for UrmaProvider {
    async fn fetch_grid(
        &self,
        model: Model,
        valid_time: NaiveDateTime,
    ) -> Result<GridField, ProviderError> {
        let cycle = analysis_cycle(valid_time);
        if cycle != valid_time {
            debug!("Using the {} analysis for {}", cycle, valid_time);
        }
        let bytes = self.load_subset(model, cycle).await?;
        task::spawn_blocking(move || decode_wind_field(&bytes, cycle)).await?
    }
}

fn is_missing(error: &ProviderError) -> bool {
    match error {
        ProviderError::HttpStatus { status, .. } => *status == StatusCode::NOT_FOUND,
        other => other.is_not_found(),
    }
}

fn slice_range(body: Vec<u8>, range: ByteRange, url: &str) -> Result<Vec<u8>, ProviderError> {
    let start = range.start as usize;
    let end = match range.end {
        Some(end) => (end as usize + 1).min(body.len()),
        None => body.len(),
    };
    if start >= end {
        return Err(ProviderError::MalformedGrib(format!(
            "{} returned {} bytes, range {} is out of bounds",
            url,
            body.len(),
            range.header_value()
        )));
    }
    Ok(body[start..end].to_vec())
}
