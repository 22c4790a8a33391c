#![cfg(not(tarpaulin_include))]

use env_logger::Env;
use log::{error, info};
use samplesheets::{
    FileConfigStore, NoLinks, Settings, SheetError, Study, TableCache, get_sheet_config,
    render_study_with,
};
use std::env;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} render <study.json>", program);
    eprintln!("  {} config <store-dir> <project> <study.json>...", program);
    eprintln!("  {} rebuild-cache <cache-dir> <study.json>...", program);
    eprintln!();
    eprintln!("Settings are read from SAMPLESHEETS_SETTINGS (a JSON file) when set,");
    eprintln!("otherwise from defaults and SAMPLESHEETS_*_VERSION variables.");
}

fn load_study(path: &str) -> Result<Study, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn load_settings() -> Result<Settings, SheetError> {
    let settings = match env::var("SAMPLESHEETS_SETTINGS") {
        Ok(path) => Settings::from_json_file(path)?,
        Err(_) => Settings::from_env()?,
    };
    Ok(settings)
}

fn render(settings: &Settings, path: &str) -> CliResult {
    let study = load_study(path)?;
    let tables = render_study_with(&study, settings, &NoLinks)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &tables)?;
    writeln!(out)?;
    Ok(())
}

fn config(settings: &Settings, dir: &str, project: &str, paths: &[String]) -> CliResult {
    let studies = paths
        .iter()
        .map(|p| load_study(p))
        .collect::<Result<Vec<_>, _>>()?;
    let store = FileConfigStore::open(dir)?;
    let config = get_sheet_config(&store, project, &studies, settings)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn rebuild_cache(settings: &Settings, dir: &str, paths: &[String]) -> CliResult {
    let cache = TableCache::open(dir)?;
    cache.clear()?;
    for path in paths {
        let study = load_study(path)?;
        let tables = render_study_with(&study, settings, &NoLinks)?;
        cache.put(&study.name, &tables)?;
        info!("cached {}", study.name);
    }
    Ok(())
}

fn run(args: &[String]) -> Result<bool, Box<dyn std::error::Error>> {
    let settings = load_settings()?;
    match args.get(1).map(String::as_str) {
        Some("render") if args.len() == 3 => render(&settings, &args[2])?,
        Some("config") if args.len() >= 5 => config(&settings, &args[2], &args[3], &args[4..])?,
        Some("rebuild-cache") if args.len() >= 3 => rebuild_cache(&settings, &args[2], &args[3..])?,
        _ => return Ok(false),
    }
    Ok(true)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("cli");

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            usage(program);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
