use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::cache::get_or_try_init;
use crate::client::{Endpoint, SpireClient};
use crate::domain::{SampleId, StudyName, columns};
use crate::error::SpireError;
use crate::fs_util::extract_tar;
use crate::sample::Sample;
use crate::store::{Layout, ensure_dir};
use crate::table::Table;

/// A SPIRE study and the samples it lists.
pub struct Study<C: SpireClient> {
    name: StudyName,
    client: Arc<C>,
    layout: Layout,
    metadata: OnceLock<Table>,
    samples: OnceLock<Vec<Sample<C>>>,
    mags: OnceLock<Table>,
}

impl<C: SpireClient> Study<C> {
    pub fn new(name: StudyName, client: Arc<C>, layout: Layout) -> Self {
        Self {
            name,
            client,
            layout,
            metadata: OnceLock::new(),
            samples: OnceLock::new(),
            mags: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &StudyName {
        &self.name
    }

    pub fn folder(&self) -> Utf8PathBuf {
        self.layout.study_dir(&self.name)
    }

    pub fn metadata(&self) -> Result<&Table, SpireError> {
        get_or_try_init(&self.metadata, || {
            info!(study = %self.name, "downloading study metadata");
            self.client
                .fetch_table(&Endpoint::StudyMetadata(self.name.clone()))
        })
    }

    pub fn sample_ids(&self) -> Result<Vec<SampleId>, SpireError> {
        self.metadata()?
            .column_values(columns::SAMPLE_ID)?
            .into_iter()
            .map(|cell| {
                cell.as_key()
                    .ok_or_else(|| SpireError::InvalidSampleId("null".to_string()))?
                    .parse::<SampleId>()
            })
            .collect()
    }

    /// One sample per metadata row, in row order.
    pub fn samples(&self) -> Result<&[Sample<C>], SpireError> {
        get_or_try_init(&self.samples, || {
            Ok(self
                .sample_ids()?
                .into_iter()
                .map(|id| {
                    Sample::new(
                        id,
                        Some(self.name.clone()),
                        Arc::clone(&self.client),
                        self.layout.clone(),
                    )
                })
                .collect())
        })
        .map(Vec::as_slice)
    }

    /// Rows of the global genome table derived from this study's samples.
    pub fn mags(&self) -> Result<&Table, SpireError> {
        get_or_try_init(&self.mags, || {
            let ids = self
                .sample_ids()?
                .into_iter()
                .map(|id| id.as_str().to_string())
                .collect::<HashSet<_>>();
            let genomes = self.client.fetch_table(&Endpoint::GenomeMetadata)?;
            genomes.filter_in(columns::DERIVED_FROM_SAMPLE, &ids)
        })
    }

    /// Fetches the precompiled MAG archive into `output` and unpacks it into
    /// `output/mags`, returning that directory.
    pub fn download_mags(&self, output: &Utf8Path) -> Result<Utf8PathBuf, SpireError> {
        ensure_dir(output)?;
        let archive = output.join(format!("{}_mags.tar", self.name));
        self.client.download(
            &Endpoint::StudyMags(self.name.clone()),
            archive.as_std_path(),
        )?;
        let target = output.join("mags");
        let count = extract_tar(archive.as_std_path(), target.as_std_path())?;
        info!(study = %self.name, entries = count, path = %target, "extracted MAG archive");
        Ok(target)
    }
}

impl<C: SpireClient> fmt::Display for Study<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Study: {}", self.name)
    }
}

impl<C: SpireClient> fmt::Debug for Study<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Study")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
