use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cartos::app::{App, ProgressSink};
use cartos::config::{ConfigLoader, Overrides};
use cartos::domain::{
    FormatSelector, NameSelector, RegionName, Schema, TargetName, TileFormat, TileName,
};
use cartos::error::MapsError;
use cartos::fetch::HttpFetcher;
use cartos::output::{ConsoleOutput, JsonOutput, OutputMode};
use cartos::process::SystemRunner;
use cartos::styles::StyleCatalog;
use cartos::tasks::{CompletionProvider, StyleSource};

const NAMESPACE: &str = "maps";
const VALUE_FLAGS: &[&str] = &["--data-dir", "--project-dir", "--config", "--image"];

#[derive(Parser)]
#[command(name = "cartos")]
#[command(about = "Map data pipeline: OSM extracts, tilemaker configs, MBTiles and PMTiles")]
#[command(version, author)]
struct Cli {
    /// Data directory (defaults to `<project>/data`)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Project root commands run from (defaults to the current directory)
    #[arg(long, global = true)]
    project_dir: Option<String>,

    /// Config file (defaults to ./cartos.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Container image to run tools in
    #[arg(long, global = true)]
    image: Option<String>,

    /// Run tools on the host instead of in the container
    #[arg(long, global = true)]
    no_container: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download source data and binaries")]
    Download(DownloadArgs),
    #[command(about = "Manage PBF extracts")]
    Pbf(PbfArgs),
    #[command(about = "Download tilemaker resources")]
    Resources(ResourcesArgs),
    #[command(about = "Download and inspect map styles")]
    Styles(StylesArgs),
    #[command(about = "Generate, convert and manage tiles")]
    Tiles(TilesArgs),
    #[command(about = "Build and enter the tools container")]
    Infra(InfraArgs),
    #[command(about = "Print a shell completion script")]
    Completion {
        shell: Shell,
    },
    #[command(hide = true)]
    Complete {
        provider: CompletionProvider,
        #[arg(value_name = "TYPE")]
        kind: Option<String>,
    },
}

#[derive(Args)]
struct DownloadArgs {
    #[command(subcommand)]
    command: DownloadCommand,
}

#[derive(Subcommand)]
enum DownloadCommand {
    #[command(about = "Download the PBF extract of a region (`world` for the planet)")]
    Pbf(PbfDownloadArgs),
    #[command(about = "Download tool binaries")]
    Binaries {
        #[command(subcommand)]
        binary: BinaryCommand,
    },
}

#[derive(Subcommand)]
enum BinaryCommand {
    #[command(about = "Download the pmtiles binary")]
    Pmtiles {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Clone)]
struct PbfDownloadArgs {
    #[arg(default_value = "world")]
    name: RegionName,

    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct PbfArgs {
    #[command(subcommand)]
    command: PbfCommand,
}

#[derive(Subcommand)]
enum PbfCommand {
    #[command(about = "Download the PBF extract of a region (alias of download pbf)")]
    Download(PbfDownloadArgs),
    #[command(about = "List downloaded PBF files")]
    List,
    #[command(about = "Delete PBF files")]
    Delete {
        name: Option<String>,
    },
}

#[derive(Args)]
struct ResourcesArgs {
    #[command(subcommand)]
    command: ResourcesCommand,
}

#[derive(Subcommand)]
enum ResourcesCommand {
    #[command(about = "Download shapefiles and tilemaker configs")]
    Download {
        resource: ResourceKind,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResourceKind {
    Shapefiles,
    Shortbread,
    Openmaptiles,
    All,
}

#[derive(Args)]
struct StylesArgs {
    #[command(subcommand)]
    command: StylesCommand,
}

#[derive(Subcommand)]
enum StylesCommand {
    #[command(about = "Download style sources")]
    Download {
        source: StyleSource,
        #[arg(long)]
        force: bool,
    },
    #[command(about = "List styles per schema")]
    List,
    #[command(about = "Print a style document pointing at a PMTiles archive")]
    Show {
        schema: Schema,
        location: String,
        style: Option<String>,
        #[arg(long, default_value = "http://localhost:8000")]
        base_url: String,
    },
}

#[derive(Args)]
struct TilesArgs {
    #[command(subcommand)]
    command: TilesCommand,
}

#[derive(Subcommand)]
enum TilesCommand {
    #[command(about = "Generate MBTiles from a PBF extract with tilemaker")]
    Generate {
        name: RegionName,
        schema: Schema,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        target_name: Option<TargetName>,
    },
    #[command(about = "Convert MBTiles to PMTiles")]
    Convert {
        #[arg(value_name = "SCHEMA/NAME")]
        name: TileName,
        #[arg(long)]
        target_name: Option<TargetName>,
        #[arg(long)]
        force: bool,
    },
    #[command(about = "List tile files")]
    List {
        #[arg(value_name = "TYPE")]
        kind: Option<TileFormat>,
    },
    #[command(about = "Delete tile files")]
    Delete {
        #[arg(value_name = "TYPE")]
        kind: FormatSelector,
        #[arg(value_name = "SCHEMA/NAME")]
        name: Option<String>,
    },
}

#[derive(Args)]
struct InfraArgs {
    #[command(subcommand)]
    command: InfraCommand,
}

#[derive(Subcommand)]
enum InfraCommand {
    #[command(about = "Build the tools image")]
    Build {
        /// Push new image layers
        #[arg(long)]
        push: bool,
    },
    #[command(about = "Open a shell (bash) into the tools container")]
    Builder,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<MapsError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MapsError) -> u8 {
    match error {
        MapsError::MissingInput { .. }
        | MapsError::InvalidArgument(_)
        | MapsError::InvalidRegion(_)
        | MapsError::StyleNotFound { .. } => 2,
        MapsError::Network { .. }
        | MapsError::HttpStatus { .. }
        | MapsError::ProcessExecution { .. }
        | MapsError::Precondition(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_from(expand_namespaced(std::env::args_os().collect()));
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    if let Commands::Completion { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "cartos", &mut io::stdout());
        return Ok(());
    }

    let settings = ConfigLoader::resolve(
        Overrides {
            config_path: cli.config,
            project_root: cli.project_dir,
            data_dir: cli.data_dir,
            image: cli.image,
            no_container: cli.no_container,
        }
        .with_env(),
    )?;
    let fetcher = HttpFetcher::new(&settings.user_agent)?;
    let runner = SystemRunner::new().stdout_to_stderr(matches!(output_mode, OutputMode::Json));
    let app = App::new(settings, fetcher, runner);

    let console = ConsoleOutput::new();
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Console => &console,
    };

    match cli.command {
        Commands::Download(args) => match args.command {
            DownloadCommand::Pbf(args) => {
                emit(output_mode, &app.download_pbf(&args.name, args.force, sink)?)
            }
            DownloadCommand::Binaries {
                binary: BinaryCommand::Pmtiles { force },
            } => emit(output_mode, &app.download_pmtiles_binary(force, sink)?),
        },
        Commands::Pbf(args) => match args.command {
            PbfCommand::Download(args) => {
                emit(output_mode, &app.download_pbf(&args.name, args.force, sink)?)
            }
            PbfCommand::List => {
                let result = app.list_pbf(sink)?;
                match output_mode {
                    OutputMode::Json => JsonOutput::print_json(&result).into_diagnostic(),
                    OutputMode::Console => {
                        console.print_listing(&result);
                        Ok(())
                    }
                }
            }
            PbfCommand::Delete { name } => {
                let name: NameSelector<RegionName> = name.as_deref().unwrap_or_default().parse()?;
                emit(output_mode, &app.delete_pbf(&name, sink)?)
            }
        },
        Commands::Resources(args) => match args.command {
            ResourcesCommand::Download { resource, force } => {
                let outcomes = match resource {
                    ResourceKind::Shapefiles => vec![app.download_shapefiles(force, sink)?],
                    ResourceKind::Shortbread => app.download_shortbread_resources(force, sink)?,
                    ResourceKind::Openmaptiles => {
                        app.download_openmaptiles_resources(force, sink)?
                    }
                    ResourceKind::All => app.download_all_resources(force, sink)?,
                };
                emit(output_mode, &outcomes)
            }
        },
        Commands::Styles(args) => run_styles(args.command, &app, output_mode, &console, sink),
        Commands::Tiles(args) => match args.command {
            TilesCommand::Generate {
                name,
                schema,
                force,
                target_name,
            } => emit(
                output_mode,
                &app.generate_tiles(&name, schema, force, target_name.as_ref(), sink)?,
            ),
            TilesCommand::Convert {
                name,
                target_name,
                force,
            } => emit(
                output_mode,
                &app.convert_tiles(&name, target_name.as_ref(), force, sink)?,
            ),
            TilesCommand::List { kind } => {
                let results = app.list_tiles(kind, sink)?;
                match output_mode {
                    OutputMode::Json => JsonOutput::print_json(&results).into_diagnostic(),
                    OutputMode::Console => {
                        for result in &results {
                            console.print_listing(result);
                        }
                        Ok(())
                    }
                }
            }
            TilesCommand::Delete { kind, name } => {
                let name: NameSelector<TileName> = name.as_deref().unwrap_or_default().parse()?;
                emit(output_mode, &app.delete_tiles(kind, &name, sink)?)
            }
        },
        Commands::Infra(args) => match args.command {
            InfraCommand::Build { push } => emit(output_mode, &app.build_image(push, sink)?),
            InfraCommand::Builder => emit(output_mode, &app.open_builder()?),
        },
        Commands::Complete { provider, kind } => {
            for candidate in app.completion_candidates(provider, kind.as_deref())? {
                println!("{candidate}");
            }
            Ok(())
        }
        Commands::Completion { .. } => Ok(()),
    }
}

fn run_styles(
    command: StylesCommand,
    app: &App<HttpFetcher, SystemRunner>,
    output_mode: OutputMode,
    console: &ConsoleOutput,
    sink: &dyn ProgressSink,
) -> miette::Result<()> {
    match command {
        StylesCommand::Download { source, force } => {
            emit(output_mode, &app.download_styles(source, force, sink)?)
        }
        StylesCommand::List => {
            let catalog = StyleCatalog::new(app.store().clone());
            let styles = catalog.available();
            match output_mode {
                OutputMode::Json => JsonOutput::print_json(&styles).into_diagnostic(),
                OutputMode::Console => {
                    console.print_styles(&styles);
                    Ok(())
                }
            }
        }
        StylesCommand::Show {
            schema,
            location,
            style,
            base_url,
        } => {
            let catalog = StyleCatalog::new(app.store().clone());
            let style = style.unwrap_or_else(|| StyleCatalog::default_style(schema).to_string());
            let document = catalog.style_document(schema, &location, &style, &base_url)?;
            JsonOutput::print_json(&document).into_diagnostic()
        }
    }
}

/// Console mode already reported through the sink; JSON mode prints the
/// result.
fn emit<T: Serialize>(mode: OutputMode, value: &T) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_json(value).into_diagnostic(),
        OutputMode::Console => Ok(()),
    }
}

/// Accepts `maps:tiles:generate`-style task names: the first positional
/// argument is split on `:` and a leading `maps` namespace is dropped.
fn expand_namespaced(args: Vec<OsString>) -> Vec<OsString> {
    let mut expanded = Vec::with_capacity(args.len() + 2);
    let mut iter = args.into_iter();
    expanded.extend(iter.next());

    let mut done = false;
    let mut takes_value = false;
    for arg in iter {
        if done {
            expanded.push(arg);
            continue;
        }
        let text = arg.to_string_lossy().into_owned();
        if takes_value {
            takes_value = false;
        } else if text.starts_with('-') {
            takes_value = VALUE_FLAGS.contains(&text.as_str());
        } else {
            done = true;
            if text.contains(':') {
                let mut words = text.split(':').filter(|word| !word.is_empty()).peekable();
                if words.peek() == Some(&NAMESPACE) {
                    words.next();
                }
                expanded.extend(words.map(OsString::from));
                continue;
            }
        }
        expanded.push(arg);
    }
    expanded
}
