mod common;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;

use spire_client::client::Endpoint;
use spire_client::domain::{AmrMode, GenomeId};
use spire_client::error::SpireError;
use spire_client::reconstruct::Reconstructor;
use spire_client::sample::{MANIFEST_COLUMNS, Sample};
use spire_client::table::Cell;

use common::{MockSpire, new_sample, sample_mock, temp_layout};

#[derive(Default)]
struct RecordingTool {
    calls: Mutex<Vec<(String, PathBuf, PathBuf)>>,
}

impl Reconstructor for RecordingTool {
    fn reconstruct(
        &self,
        genome: &GenomeId,
        input: &Path,
        output: &Path,
    ) -> Result<(), SpireError> {
        self.calls.lock().unwrap().push((
            genome.to_string(),
            input.to_path_buf(),
            output.to_path_buf(),
        ));
        std::fs::write(output, b"<sbml/>").map_err(|err| SpireError::Filesystem(err.to_string()))
    }
}

fn s1() -> spire_client::domain::SampleId {
    "S1".parse().unwrap()
}

#[test]
fn metadata_is_fetched_once_and_shared() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);

    let first = sample.metadata().unwrap();
    let second = sample.metadata().unwrap();
    assert!(std::ptr::eq(first, second));
    assert_eq!(mock.fetch_count(&Endpoint::SampleMetadata(s1())), 1);
}

#[test]
fn mags_only_contain_clusters_of_the_sample() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);

    let own_clusters = sample
        .metadata()
        .unwrap()
        .keys("spire_cluster")
        .unwrap()
        .into_iter()
        .collect::<HashSet<_>>();
    let mags = sample.mags().unwrap();

    assert_eq!(mags.len(), 3);
    assert!(
        mags.keys("spire_cluster")
            .unwrap()
            .iter()
            .all(|cluster| own_clusters.contains(cluster))
    );
    assert!(!mags.keys("spire_cluster").unwrap().contains(&"c3".to_string()));
    assert_eq!(&mags.columns()[..3], ["genome_id", "spire_cluster", "sample_id"]);
    assert_eq!(mags.keys("genome_id").unwrap(), vec!["g1", "g2", "g6"]);
    assert_eq!(mags.keys("genus").unwrap(), vec!["Bacteroides", "Blautia", "Bacteroides"]);

    assert!(std::ptr::eq(mags, sample.mags().unwrap()));
    assert_eq!(mock.fetch_count(&Endpoint::ClusterMetadata), 1);
}

#[test]
fn eggnog_preamble_and_summary_are_dropped() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);

    let eggnog = sample.eggnog_data().unwrap();
    assert_eq!(eggnog.len(), 2);
    assert_eq!(eggnog.columns()[0], "query");
    assert_eq!(eggnog.keys("COG_category").unwrap(), vec!["E", "S"]);

    let exported = sample.export_eggnog().unwrap();
    let text = std::fs::read_to_string(exported.as_std_path()).unwrap();
    assert!(text.starts_with("query\tseed_ortholog"));
    assert_eq!(mock.fetch_count(&Endpoint::Eggnog(s1())), 1);
}

#[test]
fn unknown_amr_mode_is_soft_failure() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);

    let result = sample.get_amr_annotations("resfinder").unwrap();
    assert!(result.is_none());
    assert!(mock.fetched().is_empty());
}

#[test]
fn each_amr_mode_requests_its_own_endpoint() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);

    for mode in ["deeparg", "megares", "vfdb"] {
        let table = sample.get_amr_annotations(mode).unwrap().unwrap();
        assert_eq!(table.keys("ARG").unwrap(), vec!["tetQ"]);
    }
    assert_eq!(
        mock.fetched(),
        AmrMode::ALL
            .iter()
            .map(|mode| Endpoint::Amr(*mode, s1()))
            .collect::<Vec<_>>()
    );
}

#[test]
fn default_amr_is_cached_but_ad_hoc_calls_are_not() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);
    let deeparg = Endpoint::Amr(AmrMode::Deeparg, s1());

    let first = sample.amr_annotations().unwrap();
    assert!(std::ptr::eq(first, sample.amr_annotations().unwrap()));
    assert_eq!(mock.fetch_count(&deeparg), 1);

    sample.amr_annotations_for(AmrMode::Deeparg).unwrap();
    sample.amr_annotations_for(AmrMode::Deeparg).unwrap();
    assert_eq!(mock.fetch_count(&deeparg), 3);
}

#[test]
fn download_mags_issues_one_request_per_genome() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);

    let out = layout.root().join("fresh").join("mags");
    assert!(!out.as_std_path().exists());
    let written = sample.download_mags(&out).unwrap();

    assert!(out.as_std_path().is_dir());
    assert_eq!(written.len(), 3);
    let downloads = mock.downloaded();
    assert_eq!(downloads.len(), 3);
    assert_eq!(downloads[2].0, Endpoint::GenomeFile("g6".parse().unwrap()));
    assert_eq!(downloads[0].1, out.join("g1.fa.gz").into_std_path_buf());
    assert!(written.iter().all(|path| path.as_std_path().is_file()));
}

#[test]
fn download_aborts_on_first_failure() {
    struct FailingSecond {
        inner: MockSpire,
        count: Mutex<usize>,
    }

    impl spire_client::client::SpireClient for FailingSecond {
        fn fetch_table(
            &self,
            endpoint: &Endpoint,
        ) -> Result<spire_client::table::Table, SpireError> {
            self.inner.fetch_table(endpoint)
        }

        fn download(&self, endpoint: &Endpoint, destination: &Path) -> Result<(), SpireError> {
            let mut count = self.count.lock().unwrap();
            *count += 1;
            if *count == 2 {
                return Err(SpireError::Http("connection reset".to_string()));
            }
            self.inner.download(endpoint, destination)
        }
    }

    let (_temp, layout) = temp_layout();
    let client = Arc::new(FailingSecond {
        inner: sample_mock(),
        count: Mutex::new(0),
    });
    let sample = Sample::new(s1(), None, client.clone(), layout.clone());
    let err = sample.download_mags(&sample.mags_dir()).unwrap_err();
    assert_matches!(err, SpireError::Http(_));
    assert_eq!(*client.count.lock().unwrap(), 2);
    assert_eq!(client.inner.downloaded().len(), 1);
}

#[test]
fn manifest_lists_taxonomy_and_reconstruction_paths() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);

    let manifest = sample.manifest().unwrap();
    assert_eq!(manifest.columns(), MANIFEST_COLUMNS);
    assert_eq!(manifest.len(), 3);

    let first = manifest.rows().next().unwrap();
    assert_eq!(first.get("id"), Some(&Cell::from("g1")));
    assert_eq!(first.get("kingdom"), Some(&Cell::from("Bacteria")));
    assert_eq!(first.get("sample_id"), Some(&Cell::from("S1")));
    let expected = sample.reconstructions_dir().join("g1.xml");
    assert_eq!(first.get("file"), Some(&Cell::from(expected.to_string())));

    let blautia = manifest.rows().nth(1).unwrap();
    assert_eq!(blautia.get("species"), Some(&Cell::Null));

    assert!(std::ptr::eq(manifest, sample.manifest().unwrap()));
    let path = sample.write_manifest().unwrap();
    let text = std::fs::read_to_string(path.as_std_path()).unwrap();
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn manifest_is_ordered_by_owning_sample() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(
        MockSpire::new()
            .with_table(
                Endpoint::SampleMetadata(s1()),
                "genome_id\tspire_cluster\tderived_from_sample\n\
                 g9\tc1\tS9\n\
                 g1\tc2\tS1\n\
                 g5\tc1\tS5\n",
            )
            .with_table(
                Endpoint::ClusterMetadata,
                "spire_cluster\tdomain\nc1\tBacteria\nc2\tArchaea\n",
            ),
    );
    let sample = Sample::new(s1(), None, mock, layout);

    let manifest = sample.generate_manifest().unwrap();
    assert_eq!(manifest.keys("sample_id").unwrap(), vec!["S1", "S5", "S9"]);
    assert_eq!(manifest.keys("id").unwrap(), vec!["g1", "g5", "g9"]);
    assert_eq!(manifest.column_values("phylum").unwrap(), vec![&Cell::Null; 3]);
}

#[test]
fn reconstructions_run_once_per_genome_and_are_cached() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);
    sample.download_mags(&sample.mags_dir()).unwrap();

    let tool = RecordingTool::default();
    let outputs = sample.reconstructions(&tool).unwrap();
    assert_eq!(outputs.len(), 3);
    assert!(outputs.iter().all(|path| path.as_std_path().is_file()));

    let calls = tool.calls.lock().unwrap().clone();
    assert_eq!(
        calls.iter().map(|call| call.0.as_str()).collect::<Vec<_>>(),
        ["g1", "g2", "g6"]
    );
    assert_eq!(
        calls[0].1,
        sample.mags_dir().join("g1.fa.gz").into_std_path_buf()
    );

    let other = RecordingTool::default();
    let again = sample.reconstructions(&other).unwrap();
    assert!(std::ptr::eq(outputs, again));
    assert!(other.calls.lock().unwrap().is_empty());
}

#[test]
fn reconstruct_requires_downloaded_genome() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);
    let tool = RecordingTool::default();

    let err = sample
        .reconstruct(&"g1".parse().unwrap(), &tool)
        .unwrap_err();
    assert_matches!(err, SpireError::Filesystem(_));
    assert!(tool.calls.lock().unwrap().is_empty());
}

#[test]
fn display_names_sample_and_study() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);
    assert_eq!(sample.to_string(), "Sample id: S1 \tStudy: Wirbel_2019_CRC");
}

#[test]
fn manifest_file_matches_reconstruction_output() {
    let (_temp, layout) = temp_layout();
    let mock = Arc::new(sample_mock());
    let sample = new_sample(&mock, &layout);
    sample.download_mags(&sample.mags_dir()).unwrap();

    let output = sample
        .reconstruct(&"g2".parse().unwrap(), &RecordingTool::default())
        .unwrap();
    let manifest = sample.manifest().unwrap();
    let row = manifest
        .rows()
        .find(|row| row.get("id") == Some(&Cell::from("g2")))
        .unwrap();
    assert_eq!(row.get("file"), Some(&Cell::from(output.to_string())));
}
