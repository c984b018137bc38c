use std::error::Error;
use std::path::PathBuf;

use arsc_batch::{
    collect_keyword_stats, convert_and_repackage, ensure_all_converted, extract_and_convert,
    list_native_entries, read_keyword_report, write_keyword_report, BatchStats, Config,
    ConfigLayer, FsPorts, IndicatifProgressReporter, ProcessConverter, STATS_FILE_NAME,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract archives and convert their models to the exchange format
    Extract(ConfigArgs),
    /// Convert the exchange-format tree back and rebuild the archives
    Repackage(ConfigArgs),
    /// Index `#keyword` lines of every model into a JSON report
    Stats {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long, value_name = "FILE", default_value = STATS_FILE_NAME)]
        report: PathBuf,
    },
    /// Print keyword counts of a JSON report, least frequent first
    Summary {
        #[arg(long, value_name = "FILE", default_value = STATS_FILE_NAME)]
        report: PathBuf,
    },
    /// List the models held by every archive
    List(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML file with defaults for the options below
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    source_root: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    output_root: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    repackage_root: Option<PathBuf>,
    #[arg(long = "converter", value_name = "EXECUTABLE")]
    converter_executable_path: Option<PathBuf>,
    /// Directory name to skip while walking; repeatable
    #[arg(long = "exclude", value_name = "DIR_NAME")]
    excluded_dir_names: Vec<String>,
    #[arg(long, value_name = "FORMAT")]
    texture_format: Option<String>,
    #[arg(long, value_name = "LEVEL")]
    notify_level: Option<String>,
}

impl ConfigArgs {
    fn load(self) -> Result<Config, Box<dyn Error>> {
        let base = match &self.config {
            Some(path) => ConfigLayer::read(path)?,
            None => ConfigLayer::default(),
        };
        let flags = ConfigLayer {
            source_root: self.source_root,
            output_root: self.output_root,
            repackage_root: self.repackage_root,
            converter_executable_path: self.converter_executable_path,
            excluded_dir_names: (!self.excluded_dir_names.is_empty())
                .then_some(self.excluded_dir_names),
            texture_format: self.texture_format,
            notify_level: self.notify_level,
        };

        let config = base.merge(flags).resolve()?;
        if !config.source_root.is_dir() {
            return Err(format!("not a directory: {}", config.source_root.display()).into());
        }

        Ok(config)
    }
}

fn print_stats(stats: &BatchStats) {
    println!(
        "archives: {} converted: {} failed: {} archives_written: {}",
        stats.archives_scanned, stats.converted, stats.failed, stats.archives_written
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let ports = FsPorts::new();

    match cli.command {
        Command::Extract(args) => {
            let config = args.load()?;
            let converter = ProcessConverter::from_config(&config);
            let progress = IndicatifProgressReporter::new();
            let stats = extract_and_convert(&ports, &converter, &progress, &config)?;
            print_stats(&stats);
            ensure_all_converted(&stats).map_err(|err| err.to_string())?;
        }
        Command::Repackage(args) => {
            let config = args.load()?;
            let converter = ProcessConverter::from_config(&config);
            let progress = IndicatifProgressReporter::new();
            let stats = convert_and_repackage(&ports, &converter, &progress, &config)?;
            print_stats(&stats);
            ensure_all_converted(&stats).map_err(|err| err.to_string())?;
        }
        Command::Stats { config, report } => {
            let config = config.load()?;
            let progress = IndicatifProgressReporter::new();
            let index = collect_keyword_stats(&ports, &progress, &config)?;
            if index.is_empty() {
                log::warn!("no keywords found under {}", config.source_root.display());
            }
            write_keyword_report(&report, &index)?;
            println!("keywords: {} report: {}", index.len(), report.display());
        }
        Command::Summary { report } => {
            let index = read_keyword_report(&report)?;
            for count in index.counts() {
                println!("{} {}", count.keyword, count.count);
            }
        }
        Command::List(args) => {
            let config = args.load()?;
            list_native_entries(&ports, &config, &mut |archive_path, name| {
                let archive_name = archive_path
                    .file_name()
                    .map(|file_name| file_name.to_string_lossy())
                    .unwrap_or_default();
                println!("{name}: {archive_name}");
            })?;
        }
    }

    Ok(())
}
