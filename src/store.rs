use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::{ResolvedConfig, default_data_dir};
use crate::domain::{GenomeId, SampleId, StudyName};
use crate::error::SpireError;

/// Directory used for samples constructed without an owning study.
pub const UNASSIGNED_STUDY_DIR: &str = "_unassigned";

/// On-disk placement of study and sample artifacts under one data root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: Utf8PathBuf,
}

impl Layout {
    pub fn new() -> Result<Self, SpireError> {
        Ok(Self {
            root: default_data_dir()?,
        })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new_with_root(config.data_dir.clone())
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn study_dir(&self, name: &StudyName) -> Utf8PathBuf {
        self.root.join(name.as_str())
    }

    pub fn sample_dir(&self, study: Option<&StudyName>, id: &SampleId) -> Utf8PathBuf {
        match study {
            Some(name) => self.study_dir(name).join(id.as_str()),
            None => self.root.join(UNASSIGNED_STUDY_DIR).join(id.as_str()),
        }
    }

    pub fn genome_path(mags_dir: &Utf8Path, genome: &GenomeId) -> Utf8PathBuf {
        mags_dir.join(format!("{genome}.fa.gz"))
    }

    pub fn reconstruction_path(reconstructions_dir: &Utf8Path, genome: &GenomeId) -> Utf8PathBuf {
        reconstructions_dir.join(format!("{genome}.xml"))
    }
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), SpireError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| SpireError::Filesystem(format!("create {path}: {err}")))
}
