use std::io::Write;

use serde::Serialize;

use crate::client::SpireClient;
use crate::domain::{ItemKind, ViewTarget};
use crate::error::SpireError;
use crate::output::{OutputFormat, write_lines, write_table};
use crate::sample::Sample;
use crate::study::Study;

/// Something `view` can render.
pub enum Item<'a, C: SpireClient> {
    Study(&'a Study<C>),
    Sample(&'a Sample<C>),
}

impl<C: SpireClient> Item<'_, C> {
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Study(_) => ItemKind::Study,
            Item::Sample(_) => ItemKind::Sample,
        }
    }
}

#[derive(Debug, Serialize)]
struct SampleRecord<'a> {
    sample_id: &'a str,
    study: Option<&'a str>,
}

/// Writes the property named by `target`. Combinations a kind does not carry
/// are `UnsupportedTarget`.
pub fn view<C, W>(
    item: &Item<'_, C>,
    target: ViewTarget,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), SpireError>
where
    C: SpireClient,
    W: Write,
{
    match (item, target) {
        (Item::Study(study), ViewTarget::Metadata) => write_table(study.metadata()?, format, out),
        (Item::Study(study), ViewTarget::Mags) => write_table(study.mags()?, format, out),
        (Item::Study(study), ViewTarget::Samples) => {
            let samples = study.samples()?;
            let lines = samples.iter().map(ToString::to_string).collect::<Vec<_>>();
            let records = samples
                .iter()
                .map(|sample| SampleRecord {
                    sample_id: sample.id().as_str(),
                    study: sample.study().map(|name| name.as_str()),
                })
                .collect::<Vec<_>>();
            write_lines(&lines, &records, format, out)
        }
        (Item::Sample(sample), ViewTarget::Metadata) => {
            write_table(sample.metadata()?, format, out)
        }
        (Item::Sample(sample), ViewTarget::Mags) => write_table(sample.mags()?, format, out),
        (Item::Sample(sample), ViewTarget::Manifest) => {
            write_table(sample.manifest()?, format, out)
        }
        (Item::Sample(sample), ViewTarget::Eggnog) => {
            write_table(sample.eggnog_data()?, format, out)
        }
        (Item::Sample(sample), ViewTarget::Amr) => {
            write_table(sample.amr_annotations()?, format, out)
        }
        (Item::Study(_), ViewTarget::Manifest | ViewTarget::Eggnog | ViewTarget::Amr)
        | (Item::Sample(_), ViewTarget::Samples) => Err(SpireError::UnsupportedTarget {
            kind: item.kind().to_string(),
            target: target.to_string(),
        }),
    }
}
