use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use prediction_viz::chart::{self, Chart, DEFAULT_HISTORIC_LABEL, PredictionBands};
use prediction_viz::models::{ChartConfig, Role, RoleAssignment, Series, TabularResult};
use prediction_viz::pipeline::{self, RenderOutcome};
use prediction_viz::reshape::{self, DimensionFilter};
use prediction_viz::store::{self, ConfigStore, FileStore};
use prediction_viz::viz::{self, RenderOptions};
use prediction_viz::{Client, MatchMode, PeriodType, Settings, matcher, period, storage};

#[derive(Parser, Debug)]
#[command(
    name = "pviz",
    version,
    about = "Build historic + prediction charts from DHIS2 analytics data"
)]
struct Cli {
    /// JSON settings file (base URL, dataStore key, query windows).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// DHIS2 instance root; overrides the settings file.
    #[arg(long, global = true, env = "PVIZ_BASE_URL")]
    base_url: Option<String>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the period ids of a window around an anchor date.
    Periods(PeriodsArgs),
    /// Decode period ids into their start dates.
    Decode {
        #[arg(required = true)]
        periods: Vec<String>,
    },
    /// Find the prediction band elements that belong to a historic code.
    Match(MatchArgs),
    /// Assemble a chart from saved analytics responses.
    Render(RenderArgs),
    /// Inspect or store a dashboard item's chart config.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Load a stored chart config and render it against the live server.
    Fetch(FetchArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PeriodArg {
    Monthly,
    Weekly,
}

impl From<PeriodArg> for PeriodType {
    fn from(p: PeriodArg) -> Self {
        match p {
            PeriodArg::Monthly => PeriodType::Monthly,
            PeriodArg::Weekly => PeriodType::Weekly,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Contains,
    StartsWith,
}

impl From<ModeArg> for MatchMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Contains => MatchMode::Contains,
            ModeArg::StartsWith => MatchMode::StartsWith,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct PeriodsArgs {
    #[arg(long = "type", value_enum, default_value = "monthly")]
    period_type: PeriodArg,
    #[arg(long, default_value_t = 0)]
    before: u32,
    #[arg(long, default_value_t = 0)]
    after: u32,
    /// Anchor date (YYYY-MM-DD); defaults to today (UTC).
    #[arg(long)]
    anchor: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct MatchArgs {
    /// Catalog JSON: an array of data elements or a `dataElements` page.
    #[arg(long)]
    catalog: PathBuf,
    #[arg(long)]
    base_code: String,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

#[derive(Args, Debug, Default)]
struct RoleArgs {
    #[arg(long)]
    high: Option<String>,
    #[arg(long)]
    mid_high: Option<String>,
    #[arg(long)]
    median: Option<String>,
    #[arg(long)]
    mid_low: Option<String>,
    #[arg(long)]
    low: Option<String>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Create a chart at the given path (.svg or .png).
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Save the assembled series (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    #[arg(long, default_value_t = 1000)]
    width: u32,
    #[arg(long, default_value_t = 600)]
    height: u32,
    /// Locale for axis numbers (en, de, fr, es, pt).
    #[arg(long, default_value = "en")]
    locale: String,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Saved analytics response for the historic element.
    #[arg(long)]
    historic: PathBuf,
    /// Saved analytics response holding the prediction elements.
    #[arg(long)]
    bands: Option<PathBuf>,
    /// Chart config JSON supplying band ids and period type.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    roles: RoleArgs,
    #[arg(long = "type", value_enum)]
    period_type: Option<PeriodArg>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Dashboard item id.
    #[arg(long)]
    item: String,
    /// Local JSON store file (default: user config dir).
    #[arg(long, conflicts_with = "remote")]
    file: Option<PathBuf>,
    /// Use the server's dataStore instead of a local file.
    #[arg(long)]
    remote: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the stored config for an item.
    Show(StoreArgs),
    /// Store a config JSON for an item.
    Set {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct FetchArgs {
    #[command(flatten)]
    store: StoreArgs,
    #[arg(long)]
    anchor: Option<NaiveDate>,
    #[command(flatten)]
    output: OutputArgs,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut settings = Settings::load_or_default(cli.settings.as_deref())?;
    if let Some(url) = cli.base_url {
        settings.base_url = url;
    }
    match cli.cmd {
        Command::Periods(args) => cmd_periods(args),
        Command::Decode { periods } => cmd_decode(&periods),
        Command::Match(args) => cmd_match(args, &settings),
        Command::Render(args) => cmd_render(args),
        Command::Config(ConfigCommand::Show(args)) => cmd_config_show(&args, &settings),
        Command::Config(ConfigCommand::Set { store, config }) => {
            cmd_config_set(&store, &config, &settings)
        }
        Command::Fetch(args) => cmd_fetch(args, &settings),
    }
}

fn cmd_periods(args: PeriodsArgs) -> Result<()> {
    let anchor = args.anchor.unwrap_or_else(period::today);
    for id in period::generate_periods(args.period_type.into(), anchor, args.before, args.after) {
        println!("{id}");
    }
    Ok(())
}

fn cmd_decode(periods: &[String]) -> Result<()> {
    for p in periods {
        let tp = period::decode(p)?;
        println!(
            "{p}\t{}\t{}\t{}",
            tp.period_type,
            chart::format_timestamp(tp.timestamp, tp.period_type),
            tp.timestamp
        );
    }
    Ok(())
}

fn cmd_match(args: MatchArgs, settings: &Settings) -> Result<()> {
    let catalog = storage::read_catalog(&args.catalog)?;
    let mode = args.mode.map(MatchMode::from).unwrap_or(settings.match_mode);
    let roles = matcher::match_related(&catalog, &args.base_code, mode);
    for role in Role::ALL {
        println!("{role}\t{}", roles.get(role).unwrap_or("-"));
    }
    Ok(())
}

fn roles_from(args: &RoleArgs, config: Option<&ChartConfig>) -> RoleAssignment {
    let base = config.map(ChartConfig::roles).unwrap_or_default();
    RoleAssignment {
        high: args.high.clone().or(base.high),
        mid_high: args.mid_high.clone().or(base.mid_high),
        median: args.median.clone().or(base.median),
        mid_low: args.mid_low.clone().or(base.mid_low),
        low: args.low.clone().or(base.low),
    }
}

fn band_series(table: &TabularResult, id: Option<&str>) -> Result<Series> {
    Ok(match id {
        Some(id) => reshape::reshape(table, Some(&DimensionFilter::data_element(id)))?,
        None => Series::new(),
    })
}

fn cmd_render(args: RenderArgs) -> Result<()> {
    let config: Option<ChartConfig> = match &args.config {
        Some(p) => {
            let raw = std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
            Some(serde_json::from_str(&raw).with_context(|| format!("parse {}", p.display()))?)
        }
        None => None,
    };
    let period_type = args
        .period_type
        .map(PeriodType::from)
        .or(config.as_ref().map(|c| c.period_type))
        .unwrap_or_default();
    let roles = roles_from(&args.roles, config.as_ref());

    let historic_table = storage::read_table(&args.historic)?;
    let historic_filter = config
        .as_ref()
        .and_then(|c| c.historic_data.clone())
        .map(DimensionFilter::data_element);
    let historic = reshape::reshape(&historic_table, historic_filter.as_ref())?;
    let label = reshape::extract_label(&historic_table, "dx", DEFAULT_HISTORIC_LABEL);

    let bands = match &args.bands {
        Some(p) => {
            let t = storage::read_table(p)?;
            PredictionBands {
                median: band_series(&t, roles.get(Role::Median))?,
                high: band_series(&t, roles.get(Role::High))?,
                low: band_series(&t, roles.get(Role::Low))?,
                mid_high: band_series(&t, roles.get(Role::MidHigh))?,
                mid_low: band_series(&t, roles.get(Role::MidLow))?,
            }
        }
        None => PredictionBands::default(),
    };

    let chart = chart::assemble(historic, &label, bands, period_type);
    write_outputs(&chart, &args.output)
}

fn open_store(args: &StoreArgs, settings: &Settings) -> Result<Box<dyn ConfigStore>> {
    if args.remote {
        let client = Client::new(&settings.base_url, settings.timeout_secs)?;
        return Ok(Box::new(client.data_store(&settings.namespace, &settings.key)));
    }
    let path = args.file.clone().unwrap_or_else(FileStore::default_location);
    Ok(Box::new(FileStore::new(path)))
}

fn cmd_config_show(args: &StoreArgs, settings: &Settings) -> Result<()> {
    let backend = open_store(args, settings)?;
    match store::load_config(backend.as_ref(), &args.item)? {
        Some(cfg) => println!("{}", serde_json::to_string_pretty(&cfg)?),
        None => eprintln!("No config stored for {}", args.item),
    }
    Ok(())
}

fn cmd_config_set(args: &StoreArgs, config: &Path, settings: &Settings) -> Result<()> {
    let raw = std::fs::read_to_string(config).with_context(|| format!("read {}", config.display()))?;
    let cfg: ChartConfig =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", config.display()))?;
    cfg.org_unit_selector()?;
    let backend = open_store(args, settings)?;
    let outcome = store::save_config(backend.as_ref(), &args.item, &cfg)?;
    eprintln!("Saved config for {} ({outcome:?})", args.item);
    Ok(())
}

fn cmd_fetch(args: FetchArgs, settings: &Settings) -> Result<()> {
    let backend = open_store(&args.store, settings)?;
    let Some(cfg) = store::load_config(backend.as_ref(), &args.store.item)? else {
        bail!("no config stored for dashboard item {}", args.store.item);
    };
    let client = Client::new(&settings.base_url, settings.timeout_secs)?;
    let anchor = args.anchor.unwrap_or_else(period::today);
    match pipeline::render(&client, &cfg, &settings.windows, anchor)? {
        RenderOutcome::Chart(chart) => write_outputs(&chart, &args.output),
        RenderOutcome::NotConfigured => {
            eprintln!("Dashboard item {} has no historic data element selected", args.store.item);
            Ok(())
        }
        RenderOutcome::Discarded => Ok(()),
    }
}

fn write_outputs(chart: &Chart, out: &OutputArgs) -> Result<()> {
    for s in &chart.series {
        eprintln!("{}: {} points", s.name, s.data.len());
    }
    if let Some(path) = out.out.as_ref() {
        let fmt = match out.format {
            Some(OutFormat::Csv) => "csv",
            Some(OutFormat::Json) => "json",
            None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
        }
        .to_ascii_lowercase();
        match fmt.as_str() {
            "csv" => storage::save_chart_csv(chart, path)?,
            "json" => storage::save_chart_json(chart, path)?,
            other => bail!("unsupported format: {}", other),
        }
        eprintln!("Saved {} series to {}", chart.series.len(), path.display());
    }
    if let Some(plot_path) = out.plot.as_ref() {
        let opts = RenderOptions {
            width: out.width,
            height: out.height,
            locale: out.locale.clone(),
        };
        viz::render_chart(chart, plot_path, &opts)?;
        eprintln!("Wrote plot to {}", plot_path.display());
    }
    Ok(())
}
