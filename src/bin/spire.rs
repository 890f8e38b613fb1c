use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spire_client::client::{SpireClient, SpireHttpClient};
use spire_client::config::{ConfigLoader, ResolvedConfig};
use spire_client::domain::{SampleId, StudyName, ViewTarget};
use spire_client::error::SpireError;
use spire_client::output::{OutputFormat, write_table};
use spire_client::reconstruct::CarveReconstructor;
use spire_client::sample::Sample;
use spire_client::store::Layout;
use spire_client::study::Study;
use spire_client::view::{Item, view};

#[derive(Parser)]
#[command(name = "spire")]
#[command(about = "Browse and download studies, samples and MAGs from the SPIRE database")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print a study or sample property")]
    View(ViewArgs),
    #[command(about = "Print AMR annotations of a sample for one annotation mode")]
    Amr(AmrArgs),
    #[command(about = "Download MAGs of a study or sample")]
    Download(DownloadArgs),
    #[command(about = "Reconstruct metabolic models for every MAG of a sample")]
    Reconstruct(SampleArgs),
}

#[derive(Args)]
struct ViewArgs {
    #[command(subcommand)]
    item: ViewItem,
}

#[derive(Subcommand)]
enum ViewItem {
    Study {
        name: String,
        target: String,
    },
    Sample {
        id: String,
        target: String,
        #[arg(long)]
        study: Option<String>,
    },
}

#[derive(Args)]
struct AmrArgs {
    sample: String,

    #[arg(long, default_value = "deeparg")]
    mode: String,

    #[arg(long)]
    study: Option<String>,
}

#[derive(Args)]
struct DownloadArgs {
    #[command(subcommand)]
    item: DownloadItem,
}

#[derive(Subcommand)]
enum DownloadItem {
    Study {
        name: String,
        #[arg(long)]
        output: Option<Utf8PathBuf>,
    },
    Sample {
        id: String,
        #[arg(long)]
        study: Option<String>,
        #[arg(long)]
        output: Option<Utf8PathBuf>,
    },
}

#[derive(Args)]
struct SampleArgs {
    sample: String,

    #[arg(long)]
    study: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(spire) = report.downcast_ref::<SpireError>() {
            return ExitCode::from(map_exit_code(spire));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SpireError) -> u8 {
    match error {
        SpireError::InvalidSampleId(_)
        | SpireError::InvalidStudyName(_)
        | SpireError::InvalidGenomeId(_)
        | SpireError::InvalidAmrMode(_)
        | SpireError::InvalidTarget(_)
        | SpireError::UnsupportedTarget { .. } => 2,
        SpireError::Http(_)
        | SpireError::Status { .. }
        | SpireError::Payload { .. }
        | SpireError::MissingTool(_)
        | SpireError::Reconstruction { .. } => 3,
        _ => 1,
    }
}

struct Context {
    config: ResolvedConfig,
    client: Arc<SpireHttpClient>,
    layout: Layout,
    format: OutputFormat,
}

impl Context {
    fn study(&self, name: &str) -> miette::Result<Study<SpireHttpClient>> {
        let name: StudyName = name.parse()?;
        Ok(Study::new(name, Arc::clone(&self.client), self.layout.clone()))
    }

    fn sample(&self, id: &str, study: Option<&str>) -> miette::Result<Sample<SpireHttpClient>> {
        let id: SampleId = id.parse()?;
        let study = study.map(str::parse::<StudyName>).transpose()?;
        Ok(Sample::new(
            id,
            study,
            Arc::clone(&self.client),
            self.layout.clone(),
        ))
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let client = Arc::new(SpireHttpClient::from_config(&config)?);
    let ctx = Context {
        layout: Layout::from_config(&config),
        config,
        client,
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
    };

    match cli.command {
        Commands::View(args) => run_view(&ctx, args.item),
        Commands::Amr(args) => run_amr(&ctx, args),
        Commands::Download(args) => run_download(&ctx, args.item),
        Commands::Reconstruct(args) => run_reconstruct(&ctx, args),
    }
}

fn run_view(ctx: &Context, item: ViewItem) -> miette::Result<()> {
    let mut stdout = io::stdout().lock();
    let result = match item {
        ViewItem::Study { name, target } => {
            let target: ViewTarget = target.parse()?;
            let study = ctx.study(&name)?;
            view(&Item::Study(&study), target, ctx.format, &mut stdout)
        }
        ViewItem::Sample { id, target, study } => {
            let target: ViewTarget = target.parse()?;
            let sample = ctx.sample(&id, study.as_deref())?;
            view(&Item::Sample(&sample), target, ctx.format, &mut stdout)
        }
    };
    if let Err(err @ SpireError::UnsupportedTarget { .. }) = &result {
        error!("{err}");
    }
    Ok(result?)
}

fn run_amr(ctx: &Context, args: AmrArgs) -> miette::Result<()> {
    let sample = ctx.sample(&args.sample, args.study.as_deref())?;
    write_amr(&sample, &args.mode, ctx.format, &mut io::stdout().lock())?;
    Ok(())
}

/// An unknown mode has already been logged by the sample; nothing is written.
fn write_amr<C: SpireClient, W: Write>(
    sample: &Sample<C>,
    mode: &str,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), SpireError> {
    match sample.get_amr_annotations(mode)? {
        Some(table) => write_table(&table, format, out),
        None => Ok(()),
    }
}

fn run_download(ctx: &Context, item: DownloadItem) -> miette::Result<()> {
    match item {
        DownloadItem::Study { name, output } => {
            let study = ctx.study(&name)?;
            let output = output.unwrap_or_else(|| study.folder());
            let target = study.download_mags(&output)?;
            println!("{target}");
        }
        DownloadItem::Sample { id, study, output } => {
            let sample = ctx.sample(&id, study.as_deref())?;
            let output = output.unwrap_or_else(|| sample.mags_dir());
            let written = sample.download_mags(&output)?;
            info!(count = written.len(), path = %output, "downloaded MAGs");
            for path in written {
                println!("{path}");
            }
        }
    }
    Ok(())
}

fn run_reconstruct(ctx: &Context, args: SampleArgs) -> miette::Result<()> {
    let sample = ctx.sample(&args.sample, args.study.as_deref())?;
    let tool = CarveReconstructor::new(&ctx.config.reconstruction);
    if !tool.is_available() {
        return Err(SpireError::MissingTool(ctx.config.reconstruction.command.clone()).into());
    }
    sample.download_mags(&sample.mags_dir())?;
    for path in sample.reconstructions(&tool)? {
        println!("{path}");
    }
    let manifest = sample.write_manifest()?;
    info!(path = %manifest, "wrote manifest");
    Ok(())
}
