use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use takeoff_core::{
    Color, DispatchOutcome, DrawInstruction, EngineConfig, Measure, MeasureId, MeasureKind,
    OverlayStyle, Point, RecordStore, TakeoffSession, Tool, ViewTransform,
};
use takeoff_storage::JsonFileStore;

#[derive(Debug, Parser)]
#[command(name = "takeoff")]
#[command(about = "Plan takeoff measurements")]
pub struct Cli {
    /// Directory holding the takeoff records (defaults to the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,
    /// JSON engine configuration; environment variables are used otherwise
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct PageArgs {
    #[arg(long)]
    plan: String,
    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    page: u32,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Calibrate a page from a reference segment of known length.
    Calibrate {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long, value_name = "X,Y", value_parser = parse_point)]
        from: Point,
        #[arg(long, value_name = "X,Y", value_parser = parse_point)]
        to: Point,
        #[arg(long)]
        distance: f64,
        #[arg(long)]
        unit: String,
    },
    /// Record a measure from canonical page points.
    Measure {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long)]
        kind: MeasureKind,
        #[arg(long = "point", value_name = "X,Y", value_parser = parse_point, required = true)]
        points: Vec<Point>,
        #[arg(long, default_value = "")]
        label: String,
        #[arg(long, default_value = "")]
        category: String,
        /// `#RRGGBB` or `#RRGGBBAA`
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        unit_price: Option<f64>,
    },
    /// Print stored measures as JSON.
    List {
        #[arg(long)]
        plan: Option<String>,
    },
    /// Delete a measure by id.
    Delete {
        #[arg(value_name = "ID")]
        id: MeasureId,
    },
    /// Print the overlay draw list for a page.
    Overlay {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long, default_value_t = 100.0)]
        zoom: f64,
        #[arg(long, default_value_t = 0.0)]
        rotation: f64,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    measures: Vec<Measure>,
    total_price: f64,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    deleted: MeasureId,
}

#[derive(Debug, Serialize)]
struct OverlayOutput {
    zoom_percent: f64,
    rotation_degrees: f64,
    instructions: Vec<DrawInstruction>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing();

    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let store = open_store(cli.store.as_deref())?;

    match cli.command {
        Commands::Calibrate { page, from, to, distance, unit } => {
            run_calibrate(store, config, &page, from, to, distance, &unit)
        }
        Commands::Measure { page, kind, points, label, category, color, unit_price } => {
            let color = color
                .map(|hex| {
                    Color::from_hex(&hex).with_context(|| format!("invalid color: {hex}"))
                })
                .transpose()?;
            let request = MeasureRequest { kind, points, label, category, color, unit_price };
            run_measure(store, config, &page, request)
        }
        Commands::List { plan } => run_list(&store, plan.as_deref()),
        Commands::Delete { id } => run_delete(store, config, id),
        Commands::Overlay { page, zoom, rotation } => {
            run_overlay(store, config, &page, zoom, rotation)
        }
        Commands::Version => Ok(()),
    }
}

/// Log to stderr so stdout stays machine-readable
fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let _ = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => EngineConfig::from_env().context("invalid configuration in environment"),
    }
}

fn open_store(root: Option<&Path>) -> Result<JsonFileStore> {
    match root {
        Some(root) => JsonFileStore::open(root)
            .with_context(|| format!("failed to open record store at {}", root.display())),
        None => JsonFileStore::from_default_project().context("failed to open record store"),
    }
}

fn open_session(
    store: JsonFileStore,
    config: EngineConfig,
    page: &PageArgs,
) -> Result<TakeoffSession<JsonFileStore>> {
    if page.page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut session =
        TakeoffSession::open(store, page.plan.as_str(), config).context("failed to load records")?;
    session.set_page(page.page);
    Ok(session)
}

fn ensure_synced(outcome: &DispatchOutcome) -> Result<()> {
    match outcome.store_errors.first() {
        Some(error) => anyhow::bail!("failed to save records: {error}"),
        None => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn run_calibrate(
    store: JsonFileStore,
    config: EngineConfig,
    page: &PageArgs,
    from: Point,
    to: Point,
    distance: f64,
    unit: &str,
) -> Result<()> {
    let mut session = open_session(store, config, page)?;

    session.select_tool(Tool::Calibrate)?;
    session.click(from)?;
    session.click(to)?;
    let outcome = session.submit_calibration(distance, unit)?;
    ensure_synced(&outcome)?;

    let calibration = session.calibration().context("calibration was not stored")?;
    print_json(calibration)
}

struct MeasureRequest {
    kind: MeasureKind,
    points: Vec<Point>,
    label: String,
    category: String,
    color: Option<Color>,
    unit_price: Option<f64>,
}

fn run_measure(
    store: JsonFileStore,
    config: EngineConfig,
    page: &PageArgs,
    request: MeasureRequest,
) -> Result<()> {
    if request.kind == MeasureKind::Rectangle && request.points.len() != 2 {
        anyhow::bail!("a rectangle takes exactly 2 points, got {}", request.points.len());
    }

    let mut session = open_session(store, config, page)?;
    session.set_label(request.label);
    session.set_category(request.category);
    if let Some(color) = request.color {
        session.set_color(color);
    }
    if let Some(unit_price) = request.unit_price {
        session.set_unit_price(unit_price);
    }

    session.select_tool(Tool::from(request.kind))?;

    let mut persisted = None;
    for point in request.points {
        let outcome = session.click(point)?;
        ensure_synced(&outcome)?;
        persisted = outcome.persisted.or(persisted);
    }
    if session.tool_state().is_drawing() {
        let outcome = session.finish()?;
        ensure_synced(&outcome)?;
        persisted = outcome.persisted.or(persisted);
    }

    let id = persisted.context("no measure was produced")?;
    let measure = session.measure(id).context("measure was not stored")?;
    print_json(measure)
}

fn run_list(store: &JsonFileStore, plan: Option<&str>) -> Result<()> {
    let measures = store.list_measures(plan).context("failed to list measures")?;
    let total_price = measures.iter().map(Measure::total_price).sum();
    print_json(&ListOutput { measures, total_price })
}

fn run_delete(store: JsonFileStore, config: EngineConfig, id: MeasureId) -> Result<()> {
    let plan_id = store
        .list_measures(None)
        .context("failed to list measures")?
        .into_iter()
        .find(|m| m.id() == id)
        .map(|m| m.plan_id().to_string())
        .with_context(|| format!("measure not found: {id}"))?;

    let mut session =
        TakeoffSession::open(store, plan_id, config).context("failed to load records")?;
    let outcome = session.delete_measure(id)?;
    ensure_synced(&outcome)?;

    print_json(&DeleteOutput { deleted: id })
}

fn run_overlay(
    store: JsonFileStore,
    config: EngineConfig,
    page: &PageArgs,
    zoom: f64,
    rotation: f64,
) -> Result<()> {
    let transform = ViewTransform::new(zoom, rotation, config.base_render_scale)
        .context("invalid --zoom")?;
    let session = open_session(store, config, page)?;
    let instructions = session.overlay(&transform, &OverlayStyle::default());

    print_json(&OverlayOutput {
        zoom_percent: transform.zoom_percent(),
        rotation_degrees: transform.rotation_degrees(),
        instructions,
    })
}

fn parse_point(raw: &str) -> Result<Point, String> {
    let (x, y) = raw.split_once(',').ok_or_else(|| format!("expected X,Y but got `{raw}`"))?;
    let coordinate = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid coordinate `{value}`"))
    };
    Ok(Point::new(coordinate(x)?, coordinate(y)?))
}
