use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use arrow::util::pretty::pretty_format_batches;
use log::info;

use fits_spectra::data::{export, loader};
use fits_spectra::format::{FormatConfig, SINGLE_SPLIT_LABEL};
use fits_spectra::registry::FormatRegistry;
use fits_spectra::SpectrumCollection;

const USAGE: &str = "usage: fits-spectra <file> [format | config.json] [output.parquet | output.csv | output.json]";

fn read(registry: &FormatRegistry, path: &Path, format: Option<&str>) -> Result<SpectrumCollection> {
    match format {
        Some(config) if config.ends_with(".json") => {
            let text = std::fs::read_to_string(config)
                .with_context(|| format!("reading format config {config}"))?;
            let config = FormatConfig::from_json(&text).context("parsing format config")?;
            registry
                .read_with_config(path, SINGLE_SPLIT_LABEL, &config)
                .with_context(|| format!("reading {}", path.display()))
        }
        format => loader::load_file(registry, path, format),
    }
}

fn write(registry: &FormatRegistry, collection: &SpectrumCollection, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "parquet" | "pq" => export::write_parquet(collection, path)?,
        "csv" => export::write_csv(collection, path)?,
        "json" => registry
            .write(collection, path, None)
            .with_context(|| format!("writing {}", path.display()))?,
        other => bail!("Unsupported output extension: .{other}"),
    }
    info!("wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        bail!(USAGE);
    };
    let format = args.next();
    let output = args.next().map(PathBuf::from);

    let registry = FormatRegistry::with_builtin_formats();
    if format.is_none() && path.is_file() {
        let candidates = registry.whatformat(&path, None).unwrap_or_default();
        info!("candidate formats: {candidates:?}");
    }

    let collection = read(&registry, &path, format.as_deref())?;
    let summary = export::summary_batch(&collection)?;
    println!("{}", pretty_format_batches(&[summary]).context("formatting summary")?);

    if let Some(output) = output {
        write(&registry, &collection, &output)?;
    }
    Ok(())
}
