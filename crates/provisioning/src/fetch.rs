//! Source archive download and extraction.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::info;

use crate::error::ProvisioningError;

/// Downloads a source archive and unpacks it into `dest`.
pub trait ArchiveFetcher {
    fn fetch(&self, source: &str, dest: &Path) -> Result<(), ProvisioningError>;
}

/// Fetches a single file into memory.
pub trait Downloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, ProvisioningError>;
}

/// Fetches gzip tarballs over HTTP.
pub struct HttpArchiveFetcher {
    client: reqwest::blocking::Client,
}

impl HttpArchiveFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ProvisioningError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ProvisioningError::Download {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

impl Downloader for HttpArchiveFetcher {
    fn download(&self, url: &str) -> Result<Vec<u8>, ProvisioningError> {
        info!(url, "downloading");
        let download = |source| ProvisioningError::Download {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(download)?;
        if !response.status().is_success() {
            return Err(ProvisioningError::DownloadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes().map_err(download)?.to_vec())
    }
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch(&self, source: &str, dest: &Path) -> Result<(), ProvisioningError> {
        let url = tarball_url(source);
        let bytes = self.download(&url)?;
        unpack_tarball(&bytes, dest).map_err(|source| ProvisioningError::Extract { url, source })
    }
}

/// Unpack a `.tar.gz` held in memory into `dest`.
pub fn unpack_tarball(bytes: &[u8], dest: &Path) -> std::io::Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    archive.unpack(dest)
}

/// GitHub serves the same tree as `.zip` and `.tar.gz`; we only unpack tarballs.
pub fn tarball_url(source: &str) -> String {
    match source.strip_suffix(".zip") {
        Some(stem) if stem.contains("/archive/") => format!("{}.tar.gz", stem),
        _ => source.to_string(),
    }
}
