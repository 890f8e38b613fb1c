use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use flate2::read::MultiGzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::{ResolvedConfig, ServiceUrls};
use crate::domain::{AmrMode, GenomeId, SampleId, StudyName};
use crate::error::SpireError;
use crate::table::Table;

/// Preamble lines before the eggNOG-mapper column header.
pub const EGGNOG_HEADER_LINES: usize = 4;
/// Summary lines after the last eggNOG-mapper annotation row.
pub const EGGNOG_FOOTER_LINES: usize = 3;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Every resource the client reads from SPIRE.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    StudyMetadata(StudyName),
    SampleMetadata(SampleId),
    Eggnog(SampleId),
    Amr(AmrMode, SampleId),
    GenomeFile(GenomeId),
    StudyMags(StudyName),
    GenomeMetadata,
    ClusterMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Tsv { skip_head: usize, skip_tail: usize },
    Binary,
}

impl Endpoint {
    pub fn url(&self, urls: &ServiceUrls) -> String {
        let api = &urls.api;
        let archive = &urls.archive;
        match self {
            Endpoint::StudyMetadata(name) => format!("{api}/api/study/{name}?format=tsv"),
            Endpoint::SampleMetadata(id) => format!("{api}/api/sample/{id}?format=tsv"),
            Endpoint::Eggnog(id) => format!("{api}/download_eggnog/{id}"),
            Endpoint::Amr(mode, id) => format!("{api}/{}/{id}", mode.route()),
            Endpoint::GenomeFile(id) => format!("{api}/download_file/{id}"),
            Endpoint::StudyMags(name) => {
                format!("{archive}/~fullam/spire/compiled/{name}_spire_v1_MAGs.tar")
            }
            Endpoint::GenomeMetadata => {
                format!("{archive}/~fullam/spire/metadata/spire_v1_genome_metadata.tsv.gz")
            }
            Endpoint::ClusterMetadata => {
                format!("{archive}/~fullam/spire/metadata/spire_v1_cluster_metadata.tsv.gz")
            }
        }
    }

    pub fn payload(&self) -> Payload {
        match self {
            Endpoint::Eggnog(_) => Payload::Tsv {
                skip_head: EGGNOG_HEADER_LINES,
                skip_tail: EGGNOG_FOOTER_LINES,
            },
            Endpoint::GenomeFile(_) | Endpoint::StudyMags(_) => Payload::Binary,
            _ => Payload::Tsv {
                skip_head: 0,
                skip_tail: 0,
            },
        }
    }
}

/// Data source behind `Study` and `Sample`.
pub trait SpireClient: Send + Sync {
    fn fetch_table(&self, endpoint: &Endpoint) -> Result<Table, SpireError>;
    fn download(&self, endpoint: &Endpoint, destination: &Path) -> Result<(), SpireError>;
}

#[derive(Clone)]
pub struct SpireHttpClient {
    client: Client,
    urls: ServiceUrls,
    timeout: Duration,
}

impl SpireHttpClient {
    pub fn new(urls: ServiceUrls, timeout: Duration) -> Result<Self, SpireError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("spire-client/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SpireError::Http(err.to_string()))?,
        );
        // Archive downloads can run for minutes; only table fetches carry the
        // request timeout.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| SpireError::Http(err.to_string()))?;
        Ok(Self {
            client,
            urls,
            timeout,
        })
    }

    pub fn from_config(config: &ResolvedConfig) -> Result<Self, SpireError> {
        Self::new(config.urls.clone(), config.timeout)
    }

    pub fn urls(&self) -> &ServiceUrls {
        &self.urls
    }

    fn handle_status(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SpireError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "SPIRE request failed".to_string());
        Err(SpireError::Status {
            status,
            url: url.to_string(),
            message,
        })
    }
}

impl SpireClient for SpireHttpClient {
    fn fetch_table(&self, endpoint: &Endpoint) -> Result<Table, SpireError> {
        let url = endpoint.url(&self.urls);
        debug!(%url, "fetching table");
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .map_err(|err| SpireError::Http(err.to_string()))?;
        let response = Self::handle_status(&url, response)?;
        let bytes = response
            .bytes()
            .map_err(|err| SpireError::Http(err.to_string()))?;
        decode_table(&url, &bytes, endpoint.payload())
    }

    fn download(&self, endpoint: &Endpoint, destination: &Path) -> Result<(), SpireError> {
        let url = endpoint.url(&self.urls);
        info!(%url, destination = %destination.display(), "downloading");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| SpireError::Http(err.to_string()))?;
        let mut response = Self::handle_status(&url, response)?;

        let parent = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| SpireError::Filesystem(err.to_string()))?;
        let mut temp =
            NamedTempFile::new_in(parent).map_err(|err| SpireError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| SpireError::Http(err.to_string()))?;
        temp.persist(destination)
            .map_err(|err| SpireError::Filesystem(err.error.to_string()))?;
        Ok(())
    }
}

/// Decompresses (when gzip magic is present), trims and parses a TSV body.
pub fn decode_table(url: &str, bytes: &[u8], payload: Payload) -> Result<Table, SpireError> {
    let (skip_head, skip_tail) = match payload {
        Payload::Tsv {
            skip_head,
            skip_tail,
        } => (skip_head, skip_tail),
        Payload::Binary => {
            return Err(SpireError::Payload {
                url: url.to_string(),
                message: "binary resource cannot be read as a table".to_string(),
            });
        }
    };

    let text = if bytes.starts_with(&GZIP_MAGIC) {
        let mut text = String::new();
        MultiGzDecoder::new(bytes)
            .read_to_string(&mut text)
            .map_err(|err| SpireError::Payload {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        text
    } else {
        String::from_utf8(bytes.to_vec()).map_err(|err| SpireError::Payload {
            url: url.to_string(),
            message: err.to_string(),
        })?
    };

    if skip_head == 0 && skip_tail == 0 {
        return Table::from_tsv_str(&text);
    }
    let lines = text.lines().collect::<Vec<_>>();
    if lines.len() <= skip_head + skip_tail {
        return Err(SpireError::Payload {
            url: url.to_string(),
            message: format!(
                "body has {} lines, no header left after trimming {skip_head}+{skip_tail}",
                lines.len()
            ),
        });
    }
    let kept = &lines[skip_head..lines.len() - skip_tail];
    Table::from_tsv_str(&kept.join("\n"))
}
