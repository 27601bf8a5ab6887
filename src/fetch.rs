use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::MapsError;

const CHUNK_SIZE: usize = 64 * 1024;
const SCALE_LIMIT: u64 = 1024 * 1024;

/// Called with `(bytes received, total bytes)` after every chunk.
pub type ProgressCallback<'a> = dyn FnMut(u64, Option<u64>) + 'a;

pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<(), MapsError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, MapsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| MapsError::InvalidArgument(err.to_string()))?,
        );
        // No overall timeout: planet extracts take hours.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|err| MapsError::Network {
                url: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<(), MapsError> {
        info!(url, destination = %destination.display(), "downloading");
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| MapsError::Network {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(MapsError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let total = response.content_length().filter(|total| *total > 0);

        let parent = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| MapsError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".cartos-download")
            .tempfile_in(parent)
            .map_err(|err| MapsError::Filesystem(err.to_string()))?;

        let mut received = 0u64;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        progress(received, total);
        loop {
            let read = response.read(&mut chunk).map_err(|err| MapsError::Network {
                url: url.to_string(),
                message: err.to_string(),
            })?;
            if read == 0 {
                break;
            }
            temp.write_all(&chunk[..read])
                .map_err(|err| MapsError::Filesystem(err.to_string()))?;
            received += read as u64;
            progress(received, total);
        }
        temp.flush()
            .map_err(|err| MapsError::Filesystem(err.to_string()))?;
        temp.persist(destination)
            .map_err(|err| MapsError::Filesystem(err.to_string()))?;
        debug!(url, received, "download complete");
        Ok(())
    }
}

/// Display scaling for a download of known size: the unit is the smallest
/// power of 1024 that brings the total under 1024*1024 steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressScale {
    pub divider: u64,
    pub max_steps: u64,
}

impl ProgressScale {
    pub fn for_total(total: u64) -> Self {
        let mut divider = 1u64;
        while total / divider > SCALE_LIMIT
            || (total / divider == SCALE_LIMIT && total % divider != 0)
        {
            divider *= 1024;
        }
        Self {
            divider,
            max_steps: total.div_ceil(divider),
        }
    }

    pub fn position(&self, received: u64) -> u64 {
        received / self.divider
    }

    pub fn unit(&self) -> &'static str {
        const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
        let exponent = self.divider.max(1).ilog(1024) as usize;
        UNITS[exponent.min(UNITS.len() - 1)]
    }
}
