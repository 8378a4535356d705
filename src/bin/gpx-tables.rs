//! Inspect GPX files as feature tables.

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use tracing::Level;

use gpx_tables::{
    Envelope, GpxDataset, GpxDocument, GpxSource, LoadOptions, Materialization, QueryFilter,
    SpatialReference, converter, has_gpx_extension,
};

#[derive(Parser)]
#[command(
    name = "gpx-tables",
    version,
    about = "List the feature classes of GPX files and export their rows as GeoJSON",
    after_help = "EXAMPLES:\n  \
                  gpx-tables hike.gpx https://example.com/ride.gpx\n  \
                  gpx-tables --schema hike.gpx\n  \
                  gpx-tables --class Tracks hike.gpx\n  \
                  gpx-tables --class Waypoints --bbox -148,64,-147,65 --web-mercator hike.gpx"
)]
struct Cli {
    /// GPX paths or file://, http://, https:// or ftp:// URIs
    #[arg(required = true)]
    sources: Vec<String>,

    /// Print the fields of every feature class
    #[arg(long)]
    schema: bool,

    /// Print the rows of this feature class as GeoJSON
    #[arg(long, value_name = "NAME")]
    class: Option<String>,

    /// Only the row with this object id (requires --class)
    #[arg(long, requires = "class")]
    id: Option<i64>,

    /// Only rows intersecting xmin,ymin,xmax,ymax in degrees (requires --class)
    #[arg(long, requires = "class", value_parser = parse_bbox, allow_hyphen_values = true)]
    bbox: Option<Envelope>,

    /// Output coordinates in Web Mercator (EPSG:3857)
    #[arg(long, requires = "class")]
    web_mercator: bool,

    /// Read rows from the document on demand instead of building them up front
    #[arg(long)]
    lazy: bool,

    /// Increase logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let options = LoadOptions {
        materialization: if cli.lazy {
            Materialization::Lazy
        } else {
            Materialization::Eager
        },
        ..LoadOptions::default()
    };

    for source in &cli.sources {
        if !has_gpx_extension(source) {
            tracing::warn!(%source, "source does not end in .gpx");
        }
        let document = GpxDocument::new(GpxSource::parse(source), options.clone());
        let dataset = GpxDataset::new(&document);

        match &cli.class {
            Some(name) => print_geojson(&dataset, name, &cli)?,
            None => print_summary(source, &dataset, cli.schema),
        }
    }
    Ok(())
}

fn print_summary(source: &str, dataset: &GpxDataset<'_>, schema: bool) {
    let document = dataset.document();
    let version = document
        .version()
        .map(|v| format!("GPX {v}"))
        .unwrap_or_else(|| "not GPX".to_string());
    println!("{source} ({version})");
    if let Some(e) = document.load_error() {
        println!("  error: {e}");
    }
    match dataset.bounds() {
        Some(b) => println!("  bounds: {}, {}, {}, {}", b.xmin, b.ymin, b.xmax, b.ymax),
        None => println!("  bounds: none"),
    }
    for summary in dataset.summaries() {
        println!(
            "  {:<13} {:<9} {} rows",
            summary.name,
            format!("{:?}", summary.shape),
            summary.row_count
        );
        if schema {
            for field in &summary.fields {
                let length = field.length.map(|l| format!("({l})")).unwrap_or_default();
                println!(
                    "      {:<14} {:?}{length:<4} {}",
                    field.name, field.field_type, field.alias
                );
            }
        }
    }
}

fn print_geojson(dataset: &GpxDataset<'_>, name: &str, cli: &Cli) -> Result<()> {
    let Some(index) = dataset.class_index(name) else {
        tracing::warn!(class = name, "feature class not present");
        return Ok(());
    };

    let cursor = match (cli.id, cli.bbox, cli.web_mercator) {
        (Some(oid), None, false) => dataset.fetch_by_id(index, oid)?,
        (None, Some(bbox), false) => dataset.fetch_by_envelope(index, bbox)?,
        (None, None, false) => dataset.fetch_all(index)?,
        (Some(oid), Some(bbox), _) => dataset.fetch_by_id_and_envelope(index, oid, bbox)?,
        (id, bbox, _) => {
            let mut filter = QueryFilter::default()
                .with_object_ids(id)
                .with_output_spatial_reference(SpatialReference::WebMercator);
            filter.envelope = bbox;
            dataset.search(index, &filter)?
        }
    };

    let fc = converter::to_feature_collection(cursor)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&fc).context("serializing GeoJSON")?
    );
    Ok(())
}

fn parse_bbox(text: &str) -> Result<Envelope> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid bbox '{text}'"))?;
    let [xmin, ymin, xmax, ymax] = values[..] else {
        bail!("bbox needs four values: xmin,ymin,xmax,ymax");
    };
    Ok(Envelope::new(xmin, ymin, xmax, ymax))
}
