#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use spire_client::client::{Endpoint, SpireClient, decode_table};
use spire_client::error::SpireError;
use spire_client::sample::Sample;
use spire_client::store::Layout;
use spire_client::study::Study;
use spire_client::table::Table;

pub const STUDY: &str = "Wirbel_2019_CRC";

pub const STUDY_METADATA: &str = "sample_id\tenvironment\tcountry\n\
    S1\thuman gut\tFR\n\
    S2\thuman gut\tDE\n";

/// Five genomes, two of them derived from the study's samples.
pub const GENOME_METADATA: &str = "genome_id\tderived_from_sample\tdomain\tcompleteness\n\
    g1\tS1\tBacteria\t97.2\n\
    g2\tX7\tBacteria\t88.0\n\
    g3\tS2\tArchaea\t71.5\n\
    g4\tX8\tBacteria\t64.1\n\
    g5\tX9\tBacteria\t90.3\n";

/// One descriptor row without a cluster plus three binned genomes.
pub const SAMPLE_METADATA: &str = "sample_id\tgenome_id\tspire_cluster\tcompleteness\n\
    S1\t\t\t\n\
    S1\tg1\tc1\t97.2\n\
    S1\tg2\tc2\t81.0\n\
    S1\tg6\tc1\t66.4\n";

pub const CLUSTER_METADATA: &str = "spire_cluster\tdomain\tphylum\tclass\torder\tfamily\tgenus\tspecies\n\
    c1\tBacteria\tBacteroidota\tBacteroidia\tBacteroidales\tBacteroidaceae\tBacteroides\tBacteroides fragilis\n\
    c2\tBacteria\tBacillota\tClostridia\tLachnospirales\tLachnospiraceae\tBlautia\t\n\
    c3\tArchaea\tMethanobacteriota\tMethanobacteria\tMethanobacteriales\tMethanobacteriaceae\tMethanobrevibacter\tMethanobrevibacter smithii\n";

pub const EGGNOG: &str = "## Mon Jan  1 00:00:00 2024\n\
    ## emapper-2.1.12\n\
    ## emapper.py -m diamond\n\
    ##\n\
    #query\tseed_ortholog\tevalue\tscore\tCOG_category\n\
    k141_1_1\t1235.A\t1.2e-80\t250.4\tE\n\
    k141_2_1\t818.B\t3.1e-12\t70.0\tS\n\
    ## 2 queries scanned\n\
    ## Total time (seconds): 10.1\n\
    ## Rate: 0.20 q/s\n";

pub const AMR: &str = "#ARG\tquery-start\tquery-end\tread_id\tpredicted_ARG-class\tprobability\n\
    tetQ\t1\t1926\tk141_7\ttetracycline\t0.99\n";

/// Data source serving fixture bodies and recording every call.
#[derive(Default)]
pub struct MockSpire {
    tables: HashMap<Endpoint, Vec<u8>>,
    files: HashMap<Endpoint, Vec<u8>>,
    fetches: Mutex<Vec<Endpoint>>,
    downloads: Mutex<Vec<(Endpoint, PathBuf)>>,
}

impl MockSpire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, endpoint: Endpoint, body: &str) -> Self {
        self.with_table_bytes(endpoint, body.as_bytes().to_vec())
    }

    pub fn with_table_bytes(mut self, endpoint: Endpoint, body: Vec<u8>) -> Self {
        self.tables.insert(endpoint, body);
        self
    }

    pub fn with_file(mut self, endpoint: Endpoint, body: Vec<u8>) -> Self {
        self.files.insert(endpoint, body);
        self
    }

    pub fn fetched(&self) -> Vec<Endpoint> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, endpoint: &Endpoint) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|seen| *seen == endpoint)
            .count()
    }

    pub fn downloaded(&self) -> Vec<(Endpoint, PathBuf)> {
        self.downloads.lock().unwrap().clone()
    }
}

impl SpireClient for MockSpire {
    fn fetch_table(&self, endpoint: &Endpoint) -> Result<Table, SpireError> {
        self.fetches.lock().unwrap().push(endpoint.clone());
        let url = format!("mock://{endpoint:?}");
        match self.tables.get(endpoint) {
            Some(body) => decode_table(&url, body, endpoint.payload()),
            None => Err(SpireError::Status {
                status: 404,
                url,
                message: "not found".to_string(),
            }),
        }
    }

    fn download(&self, endpoint: &Endpoint, destination: &Path) -> Result<(), SpireError> {
        self.downloads
            .lock()
            .unwrap()
            .push((endpoint.clone(), destination.to_path_buf()));
        let body = self
            .files
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| format!("{endpoint:?}").into_bytes());
        std::fs::write(destination, body).map_err(|err| SpireError::Filesystem(err.to_string()))
    }
}

pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

pub fn temp_layout() -> (tempfile::TempDir, Layout) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, Layout::new_with_root(root))
}

pub fn study_mock() -> MockSpire {
    MockSpire::new()
        .with_table(
            Endpoint::StudyMetadata(STUDY.parse().unwrap()),
            STUDY_METADATA,
        )
        .with_table_bytes(Endpoint::GenomeMetadata, gzip(GENOME_METADATA))
}

pub fn sample_mock() -> MockSpire {
    let id = "S1".parse().unwrap();
    MockSpire::new()
        .with_table(Endpoint::SampleMetadata("S1".parse().unwrap()), SAMPLE_METADATA)
        .with_table_bytes(Endpoint::ClusterMetadata, gzip(CLUSTER_METADATA))
        .with_table_bytes(Endpoint::Eggnog("S1".parse().unwrap()), gzip(EGGNOG))
        .with_table(
            Endpoint::Amr(spire_client::domain::AmrMode::Deeparg, "S1".parse().unwrap()),
            AMR,
        )
        .with_table(
            Endpoint::Amr(spire_client::domain::AmrMode::Megares, "S1".parse().unwrap()),
            AMR,
        )
        .with_table(Endpoint::Amr(spire_client::domain::AmrMode::Vfdb, id), AMR)
}

pub fn new_study(mock: &Arc<MockSpire>, layout: &Layout) -> Study<MockSpire> {
    Study::new(STUDY.parse().unwrap(), Arc::clone(mock), layout.clone())
}

pub fn new_sample(mock: &Arc<MockSpire>, layout: &Layout) -> Sample<MockSpire> {
    Sample::new(
        "S1".parse().unwrap(),
        Some(STUDY.parse().unwrap()),
        Arc::clone(mock),
        layout.clone(),
    )
}
