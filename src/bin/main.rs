use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use serde::Serialize;
use std::error::Error;
use std::io::{stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tender_core::config::RegistryConfig;
use tender_core::explain::{GlobalImportanceRanker, GlobalImportanceSnapshot, TokenImportance};
use tender_core::persistence::{DiskArchive, ModelArchive};
use tender_core::report::{self, CountryDetail, CountrySummary};
use tender_core::CountryModelStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: tender_inspect [--config FILE] [--data-dir DIR] [--words N] [--json] [COUNTRY...]";

struct Args {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    words: Option<usize>,
    json: bool,
    countries: Vec<String>,
}

#[derive(Serialize)]
struct CountryReport {
    summary: CountrySummary,
    detail: CountryDetail,
    importance: GlobalImportanceSnapshot,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tender_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let mut config = match &args.config {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(words) = args.words {
        config = config.with_importance_words(words);
    }
    config.validate()?;

    let countries = if args.countries.is_empty() {
        archived_countries(&config)?
    } else {
        args.countries
    };
    info!(data_dir = %config.data_dir.display(), countries = countries.len(), "inspecting archives");

    let archive: Arc<dyn ModelArchive> = Arc::new(DiskArchive::new(config.data_dir.clone()));
    let ranker = GlobalImportanceRanker::new(config.importance_words);

    let mut reports = Vec::new();
    for country in countries {
        let store = CountryModelStore::new(&country, Arc::clone(&archive))?;
        if !store.reload()? {
            warn!(country, "no archived model");
            continue;
        }
        let model = store.get()?;
        reports.push(CountryReport {
            summary: report::summary(&country, &model),
            detail: report::detail(&model),
            importance: ranker.rank(&country, &model),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report)?;
        }
    }
    Ok(())
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, Box<dyn Error>> {
    let mut args = Args {
        config: None,
        data_dir: None,
        words: None,
        json: false,
        countries: Vec::new(),
    };
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--json" => args.json = true,
            "--config" => args.config = Some(raw.next().ok_or(USAGE)?.into()),
            "--data-dir" => args.data_dir = Some(raw.next().ok_or(USAGE)?.into()),
            "--words" => args.words = Some(raw.next().ok_or(USAGE)?.parse()?),
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            s if s.starts_with('-') => return Err(format!("unknown option {s}\n{USAGE}").into()),
            country => args.countries.push(country.to_uppercase()),
        }
    }
    Ok(args)
}

/// Country codes with an archive file in the data directory.
fn archived_countries(config: &RegistryConfig) -> Result<Vec<String>, Box<dyn Error>> {
    let mut countries = Vec::new();
    for entry in std::fs::read_dir(&config.data_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bin") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            countries.push(stem.to_string());
        }
    }
    countries.sort();
    Ok(countries)
}

fn print_report(report: &CountryReport) -> Result<(), Box<dyn Error>> {
    let mut stdout = stdout();
    let meta = &report.summary.metadata;
    let buckets = &report.detail.details;

    execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print(format!(
            "{} ({})\n",
            report.summary.country_name, report.summary.country_code
        )),
        ResetColor,
        Print(format!(
            "  {} tenders, {} labeled, {} innovative, {} not innovative\n",
            meta.num_examples, meta.num_labeled, meta.num_innovative, meta.num_non_innovative
        )),
        Print(format!(
            "  TP {}  TN {}  FP {}  FN {}  unlabeled +{} / -{}\n",
            buckets.true_positive.len(),
            buckets.true_negative.len(),
            buckets.false_positive.len(),
            buckets.false_negative.len(),
            buckets.unlabeled_positive.len(),
            buckets.unlabeled_negative.len()
        )),
    )?;

    print_words(&mut stdout, "top", &report.importance.top_words, Color::Green)?;
    print_words(&mut stdout, "bottom", &report.importance.bottom_words, Color::Red)?;
    if !report.importance.deleted_words.is_empty() {
        execute!(
            stdout,
            SetForegroundColor(Color::DarkGrey),
            Print(format!(
                "  deleted: {}\n",
                report.importance.deleted_words.join(", ")
            )),
            ResetColor
        )?;
    }
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

fn print_words(
    out: &mut impl Write,
    title: &str,
    words: &[TokenImportance],
    color: Color,
) -> Result<(), Box<dyn Error>> {
    execute!(out, Print(format!("  {title} words:\n")))?;
    for word in words.iter().take(10) {
        execute!(
            out,
            SetForegroundColor(color),
            Print(format!("    {:>9.4}  ", word.weight)),
            ResetColor,
            Print(format!("{} ({} tenders)\n", word.token, word.tender_ids.len())),
        )?;
    }
    Ok(())
}
