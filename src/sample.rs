use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::sync::{Arc, OnceLock};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{error, info, warn};

use crate::cache::get_or_try_init;
use crate::client::{Endpoint, SpireClient};
use crate::domain::{AmrMode, GenomeId, SampleId, StudyName, columns};
use crate::error::SpireError;
use crate::reconstruct::Reconstructor;
use crate::store::{Layout, ensure_dir};
use crate::table::{Cell, Table};

pub const MANIFEST_COLUMNS: [&str; 10] = [
    "id", "kingdom", "phylum", "class", "order", "family", "genus", "species", "file", "sample_id",
];

/// A SPIRE sample. Remote tables are fetched on first access and kept for the
/// lifetime of the value.
pub struct Sample<C: SpireClient> {
    id: SampleId,
    study: Option<StudyName>,
    client: Arc<C>,
    layout: Layout,
    metadata: OnceLock<Table>,
    mags: OnceLock<Table>,
    eggnog: OnceLock<Table>,
    amr: OnceLock<Table>,
    manifest: OnceLock<Table>,
    reconstructions: OnceLock<Vec<Utf8PathBuf>>,
}

impl<C: SpireClient> Sample<C> {
    pub fn new(id: SampleId, study: Option<StudyName>, client: Arc<C>, layout: Layout) -> Self {
        Self {
            id,
            study,
            client,
            layout,
            metadata: OnceLock::new(),
            mags: OnceLock::new(),
            eggnog: OnceLock::new(),
            amr: OnceLock::new(),
            manifest: OnceLock::new(),
            reconstructions: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &SampleId {
        &self.id
    }

    pub fn study(&self) -> Option<&StudyName> {
        self.study.as_ref()
    }

    pub fn out_folder(&self) -> Utf8PathBuf {
        self.layout.sample_dir(self.study.as_ref(), &self.id)
    }

    pub fn mags_dir(&self) -> Utf8PathBuf {
        self.out_folder().join("mags")
    }

    pub fn reconstructions_dir(&self) -> Utf8PathBuf {
        self.out_folder().join("reconstructions")
    }

    pub fn metadata(&self) -> Result<&Table, SpireError> {
        get_or_try_init(&self.metadata, || {
            info!(sample = %self.id, "downloading sample metadata");
            self.client
                .fetch_table(&Endpoint::SampleMetadata(self.id.clone()))
        })
    }

    /// Genomes whose cluster appears in this sample's metadata, joined with the
    /// global cluster table.
    pub fn mags(&self) -> Result<&Table, SpireError> {
        get_or_try_init(&self.mags, || {
            let assigned = self.metadata()?.filter_not_null(columns::CLUSTER)?;
            let clusters = assigned
                .keys(columns::CLUSTER)?
                .into_iter()
                .collect::<HashSet<_>>();
            let cluster_meta = self.client.fetch_table(&Endpoint::ClusterMetadata)?;
            let members = cluster_meta.filter_in(columns::CLUSTER, &clusters)?;
            let mags = assigned.inner_join(&members, columns::CLUSTER)?;
            Ok(mags.foreground(&[columns::GENOME_ID, columns::CLUSTER, columns::SAMPLE_ID]))
        })
    }

    pub fn eggnog_data(&self) -> Result<&Table, SpireError> {
        get_or_try_init(&self.eggnog, || {
            info!(sample = %self.id, "downloading eggNOG annotations");
            self.client.fetch_table(&Endpoint::Eggnog(self.id.clone()))
        })
    }

    /// Default-mode (DeepARG) annotations, cached.
    pub fn amr_annotations(&self) -> Result<&Table, SpireError> {
        get_or_try_init(&self.amr, || self.amr_annotations_for(AmrMode::default()))
    }

    pub fn amr_annotations_for(&self, mode: AmrMode) -> Result<Table, SpireError> {
        info!(sample = %self.id, %mode, "downloading AMR annotations");
        self.client
            .fetch_table(&Endpoint::Amr(mode, self.id.clone()))
    }

    /// Unknown modes are logged and yield `Ok(None)` without a request.
    pub fn get_amr_annotations(&self, mode: &str) -> Result<Option<Table>, SpireError> {
        let mode = match mode.parse::<AmrMode>() {
            Ok(mode) => mode,
            Err(err) => {
                error!(sample = %self.id, "{err}");
                return Ok(None);
            }
        };
        self.amr_annotations_for(mode).map(Some)
    }

    pub fn genome_ids(&self) -> Result<Vec<GenomeId>, SpireError> {
        self.mags()?
            .keys(columns::GENOME_ID)?
            .iter()
            .map(|id| id.parse())
            .collect()
    }

    /// Downloads every genome of `mags` into `out_folder`, one request per
    /// genome. The first failure aborts.
    pub fn download_mags(&self, out_folder: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SpireError> {
        ensure_dir(out_folder)?;
        let genomes = self.genome_ids()?;
        let mut written = Vec::with_capacity(genomes.len());
        for genome in genomes {
            let destination = Layout::genome_path(out_folder, &genome);
            self.client
                .download(&Endpoint::GenomeFile(genome), destination.as_std_path())?;
            written.push(destination);
        }
        Ok(written)
    }

    /// Runs the reconstruction tool on a genome previously fetched with
    /// `download_mags(&self.mags_dir())`.
    pub fn reconstruct(
        &self,
        genome: &GenomeId,
        tool: &dyn Reconstructor,
    ) -> Result<Utf8PathBuf, SpireError> {
        let reconstructions = self.reconstructions_dir();
        ensure_dir(&reconstructions)?;
        let input = Layout::genome_path(&self.mags_dir(), genome);
        if !input.as_std_path().exists() {
            return Err(SpireError::Filesystem(format!(
                "genome file not downloaded: {input}"
            )));
        }
        let output = Layout::reconstruction_path(&reconstructions, genome);
        tool.reconstruct(genome, input.as_std_path(), output.as_std_path())?;
        Ok(output)
    }

    pub fn reconstructions(&self, tool: &dyn Reconstructor) -> Result<&[Utf8PathBuf], SpireError> {
        get_or_try_init(&self.reconstructions, || {
            warn!(sample = %self.id, "starting reconstruction process");
            let mut outputs = Vec::new();
            for genome in self.genome_ids()? {
                let output = self.reconstruct(&genome, tool)?;
                info!(%genome, "finished reconstruction");
                outputs.push(output);
            }
            Ok(outputs)
        })
        .map(Vec::as_slice)
    }

    pub fn manifest(&self) -> Result<&Table, SpireError> {
        get_or_try_init(&self.manifest, || self.generate_manifest())
    }

    /// One row per genome: taxonomy, reconstruction path and owning sample,
    /// ordered by sample.
    pub fn generate_manifest(&self) -> Result<Table, SpireError> {
        let mags = self.mags()?;
        mags.require_column(columns::GENOME_ID)?;
        let reconstructions = self.reconstructions_dir();

        let mut rows = Vec::with_capacity(mags.len());
        for row in mags.rows() {
            let genome = row.get(columns::GENOME_ID).cloned().unwrap_or(Cell::Null);
            let file = match genome.as_key() {
                Some(id) => {
                    let genome_id = id.parse::<GenomeId>()?;
                    let path = Layout::reconstruction_path(&reconstructions, &genome_id);
                    Cell::Text(path.to_string())
                }
                None => Cell::Null,
            };
            let sample = row
                .get(columns::DERIVED_FROM_SAMPLE)
                .filter(|cell| !cell.is_null())
                .or_else(|| row.get(columns::SAMPLE_ID).filter(|cell| !cell.is_null()))
                .cloned()
                .unwrap_or_else(|| Cell::Text(self.id.to_string()));

            let mut cells = vec![
                genome,
                row.get(columns::DOMAIN).cloned().unwrap_or(Cell::Null),
            ];
            cells.extend(
                columns::TAXONOMY
                    .iter()
                    .map(|rank| row.get(rank).cloned().unwrap_or(Cell::Null)),
            );
            cells.push(file);
            cells.push(sample);
            rows.push(cells);
        }

        let manifest = Table::new(
            MANIFEST_COLUMNS.iter().map(|name| name.to_string()).collect(),
            rows,
        )?;
        manifest.sort_by("sample_id")
    }

    pub fn write_manifest(&self) -> Result<Utf8PathBuf, SpireError> {
        let path = self.out_folder().join("manifest.tsv");
        write_table_file(self.manifest()?, &path)?;
        Ok(path)
    }

    pub fn export_eggnog(&self) -> Result<Utf8PathBuf, SpireError> {
        let path = self.out_folder().join("emapper_annotations.tsv");
        write_table_file(self.eggnog_data()?, &path)?;
        Ok(path)
    }
}

fn write_table_file(table: &Table, path: &Utf8Path) -> Result<(), SpireError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let file = File::create(path.as_std_path())
        .map_err(|err| SpireError::Filesystem(format!("create {path}: {err}")))?;
    table.write_tsv(file)
}

impl<C: SpireClient> fmt::Display for Sample<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.study {
            Some(study) => write!(f, "Sample id: {} \tStudy: {}", self.id, study),
            None => write!(f, "Sample id: {}", self.id),
        }
    }
}

impl<C: SpireClient> fmt::Debug for Sample<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("id", &self.id)
            .field("study", &self.study)
            .finish_non_exhaustive()
    }
}
