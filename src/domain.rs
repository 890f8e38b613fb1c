use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SpireError;

/// Ids are interpolated into URLs and directory names.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("identifier pattern is valid")
});

fn is_identifier(value: &str) -> bool {
    IDENTIFIER.is_match(value)
}

/// Column names shared by the SPIRE tables.
pub mod columns {
    pub const SAMPLE_ID: &str = "sample_id";
    pub const GENOME_ID: &str = "genome_id";
    pub const CLUSTER: &str = "spire_cluster";
    pub const DERIVED_FROM_SAMPLE: &str = "derived_from_sample";
    pub const DOMAIN: &str = "domain";
    pub const TAXONOMY: [&str; 6] = ["phylum", "class", "order", "family", "genus", "species"];

    /// Identifier columns, always read as text.
    pub const KEYS: [&str; 4] = [SAMPLE_ID, GENOME_ID, CLUSTER, DERIVED_FROM_SAMPLE];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleId(String);

impl SampleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SampleId {
    type Err = SpireError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !is_identifier(trimmed) {
            return Err(SpireError::InvalidSampleId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudyName(String);

impl StudyName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudyName {
    type Err = SpireError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !is_identifier(trimmed) {
            return Err(SpireError::InvalidStudyName(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomeId(String);

impl GenomeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GenomeId {
    type Err = SpireError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !is_identifier(trimmed) {
            return Err(SpireError::InvalidGenomeId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Annotation pipeline behind an AMR download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AmrMode {
    #[default]
    Deeparg,
    Megares,
    Vfdb,
}

impl AmrMode {
    pub const ALL: [AmrMode; 3] = [AmrMode::Deeparg, AmrMode::Megares, AmrMode::Vfdb];

    /// Download route on the SPIRE web service.
    pub fn route(&self) -> &'static str {
        match self {
            AmrMode::Deeparg => "download_deeparg",
            AmrMode::Megares => "download_abricate_megares",
            AmrMode::Vfdb => "download_abricate_vfdb",
        }
    }
}

impl fmt::Display for AmrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmrMode::Deeparg => write!(f, "deeparg"),
            AmrMode::Megares => write!(f, "megares"),
            AmrMode::Vfdb => write!(f, "vfdb"),
        }
    }
}

impl FromStr for AmrMode {
    type Err = SpireError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deeparg" => Ok(AmrMode::Deeparg),
            "megares" => Ok(AmrMode::Megares),
            "vfdb" => Ok(AmrMode::Vfdb),
            _ => Err(SpireError::InvalidAmrMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Study,
    Sample,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Study => write!(f, "study"),
            ItemKind::Sample => write!(f, "sample"),
        }
    }
}

/// Property a `view` call renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewTarget {
    Metadata,
    Samples,
    Mags,
    Manifest,
    Eggnog,
    Amr,
}

impl fmt::Display for ViewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewTarget::Metadata => write!(f, "metadata"),
            ViewTarget::Samples => write!(f, "samples"),
            ViewTarget::Mags => write!(f, "mags"),
            ViewTarget::Manifest => write!(f, "manifest"),
            ViewTarget::Eggnog => write!(f, "eggnog"),
            ViewTarget::Amr => write!(f, "amr"),
        }
    }
}

impl FromStr for ViewTarget {
    type Err = SpireError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metadata" => Ok(ViewTarget::Metadata),
            "samples" => Ok(ViewTarget::Samples),
            "mags" => Ok(ViewTarget::Mags),
            "manifest" => Ok(ViewTarget::Manifest),
            "eggnog" => Ok(ViewTarget::Eggnog),
            "amr" | "amr_annotations" => Ok(ViewTarget::Amr),
            _ => Err(SpireError::InvalidTarget(value.to_string())),
        }
    }
}
