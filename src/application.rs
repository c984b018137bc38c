use std::io::BufRead;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::{Config, ConfigError};
use crate::domain::{
    entry_location, has_extension, parse_keyword, BatchStats, KeywordIndex, PathMapping,
    ARCHIVE_EXTENSION, EXCHANGE_MODEL_EXTENSION, NATIVE_MODEL_EXTENSION,
};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },
    #[error("failed to launch converter {}: {source}", executable.display())]
    Launch {
        executable: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not under {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("walk error: {0}")]
    Walk(String),
    #[error("stats report error: {0}")]
    Report(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{failed} of {attempted} conversions failed")]
    ConversionsFailed { failed: u64, attempted: u64 },
}

pub trait FilePorts {
    /// Visits every file below `root`, never descending into a directory
    /// whose name is listed in `excluded_dir_names`.
    fn for_each_file(
        &self,
        root: &Path,
        excluded_dir_names: &[String],
        on_file: &mut dyn FnMut(PathBuf) -> Result<(), BatchError>,
    ) -> Result<(), BatchError>;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_scratch_dir(&self) -> Result<TempDir, BatchError>;
    fn extract_archive(
        &self,
        archive_path: &Path,
        destination: &Path,
    ) -> Result<usize, BatchError>;
    fn write_archive(&self, source_dir: &Path, archive_path: &Path) -> Result<usize, BatchError>;
    fn list_archive_entries(&self, archive_path: &Path) -> Result<Vec<String>, BatchError>;
    fn for_each_archive_entry(
        &self,
        archive_path: &Path,
        on_entry: &mut dyn FnMut(&str, &mut dyn BufRead) -> Result<(), BatchError>,
    ) -> Result<(), BatchError>;
}

pub trait ModelConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<ConversionOutcome, BatchError>;
}

pub trait ProgressReporter {
    fn on_start(&self, root: &Path);
    fn on_update(&self, stats: &BatchStats);
    fn on_conversion_failed(&self, input: &Path, reason: &str);
    fn on_finish(&self, stats: &BatchStats);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Converted,
    Failed(String),
}

fn collect_files(
    ports: &dyn FilePorts,
    root: &Path,
    excluded_dir_names: &[String],
    extension: &str,
) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    ports.for_each_file(root, excluded_dir_names, &mut |path| {
        if has_extension(&path, extension) {
            files.push(path);
        }
        Ok::<(), BatchError>(())
    })?;

    Ok(files)
}

fn map_forward(mapping: &PathMapping, path: &Path) -> Result<PathBuf, BatchError> {
    mapping
        .forward(path)
        .ok_or_else(|| BatchError::OutsideRoot {
            path: path.to_path_buf(),
            root: mapping.source_root().to_path_buf(),
        })
}

fn map_archive_dir(mapping: &PathMapping, archive_path: &Path) -> Result<PathBuf, BatchError> {
    mapping
        .archive_dir(archive_path)
        .ok_or_else(|| BatchError::OutsideRoot {
            path: archive_path.to_path_buf(),
            root: mapping.source_root().to_path_buf(),
        })
}

fn convert_one(
    converter: &dyn ModelConverter,
    progress: &dyn ProgressReporter,
    stats: &mut BatchStats,
    input: &Path,
    output: &Path,
    label: &Path,
) -> Result<(), BatchError> {
    stats.entries_scanned += 1;

    match converter.convert(input, output)? {
        ConversionOutcome::Converted => {
            stats.converted += 1;
        }
        ConversionOutcome::Failed(reason) => {
            stats.failed += 1;
            progress.on_conversion_failed(label, &reason);
        }
    }

    progress.on_update(stats);
    Ok(())
}

pub fn ensure_all_converted(stats: &BatchStats) -> Result<(), BatchError> {
    if stats.failed > 0 {
        return Err(BatchError::ConversionsFailed {
            failed: stats.failed,
            attempted: stats.attempted(),
        });
    }

    Ok(())
}

// `scenes/asia/pagoda.arsc` holding `roof/main.aoa` ends up as
// `<output_root>/asia/pagoda/roof/main.fbx`.
pub fn extract_and_convert(
    ports: &dyn FilePorts,
    converter: &dyn ModelConverter,
    progress: &dyn ProgressReporter,
    config: &Config,
) -> Result<BatchStats, BatchError> {
    let tree = PathMapping::new(&config.source_root, config.output_root()?);
    let mut stats = BatchStats::default();

    progress.on_start(&config.source_root);

    let archives = collect_files(
        ports,
        &config.source_root,
        &config.excluded_dir_names,
        ARCHIVE_EXTENSION,
    )?;

    for archive_path in archives {
        stats.archives_scanned += 1;
        let archive_dir = map_archive_dir(&tree, &archive_path)?;

        let scratch = ports.create_scratch_dir()?;
        ports.extract_archive(&archive_path, scratch.path())?;
        let entries = PathMapping::new(scratch.path(), &archive_dir);

        for model in collect_files(ports, scratch.path(), &[], NATIVE_MODEL_EXTENSION)? {
            let output = map_forward(&entries, &model)?.with_extension(EXCHANGE_MODEL_EXTENSION);
            let label = match model.strip_prefix(scratch.path()) {
                Ok(relative) => archive_path.join(relative),
                Err(_) => model.clone(),
            };

            convert_one(converter, progress, &mut stats, &model, &output, &label)?;
        }

        progress.on_update(&stats);
    }

    progress.on_finish(&stats);
    Ok(stats)
}

pub fn convert_and_repackage(
    ports: &dyn FilePorts,
    converter: &dyn ModelConverter,
    progress: &dyn ProgressReporter,
    config: &Config,
) -> Result<BatchStats, BatchError> {
    let converted_tree = PathMapping::new(&config.source_root, config.output_root()?);
    let archive_tree = PathMapping::new(&config.source_root, config.repackage_root()?);
    let mut stats = BatchStats::default();

    progress.on_start(&config.source_root);

    let archives = collect_files(
        ports,
        &config.source_root,
        &config.excluded_dir_names,
        ARCHIVE_EXTENSION,
    )?;

    for archive_path in archives {
        stats.archives_scanned += 1;
        let mirror_dir = map_archive_dir(&converted_tree, &archive_path)?;

        if !ports.is_dir(&mirror_dir) {
            log::warn!(
                "skipping {}: no converted tree at {}",
                archive_path.display(),
                mirror_dir.display()
            );
            progress.on_update(&stats);
            continue;
        }

        let scratch = ports.create_scratch_dir()?;
        let entries = PathMapping::new(&mirror_dir, scratch.path());

        for model in collect_files(ports, &mirror_dir, &[], EXCHANGE_MODEL_EXTENSION)? {
            let output = map_forward(&entries, &model)?.with_extension(NATIVE_MODEL_EXTENSION);
            convert_one(converter, progress, &mut stats, &model, &output, &model)?;
        }

        let destination = map_forward(&archive_tree, &archive_path)?;
        let written = ports.write_archive(scratch.path(), &destination)?;
        log::debug!("wrote {} entries to {}", written, destination.display());
        stats.archives_written += 1;

        progress.on_update(&stats);
    }

    progress.on_finish(&stats);
    Ok(stats)
}

pub fn collect_keyword_stats(
    ports: &dyn FilePorts,
    progress: &dyn ProgressReporter,
    config: &Config,
) -> Result<KeywordIndex, BatchError> {
    let mut index = KeywordIndex::new();
    let mut stats = BatchStats::default();

    progress.on_start(&config.source_root);

    let archives = collect_files(
        ports,
        &config.source_root,
        &config.excluded_dir_names,
        ARCHIVE_EXTENSION,
    )?;

    for archive_path in archives {
        stats.archives_scanned += 1;

        ports.for_each_archive_entry(&archive_path, &mut |name, reader| {
            if !has_extension(Path::new(name), NATIVE_MODEL_EXTENSION) {
                return Ok(());
            }
            stats.entries_scanned += 1;

            let location = entry_location(&archive_path, name);
            let mut line = Vec::new();
            loop {
                line.clear();
                if reader.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                if let Some(keyword) = parse_keyword(&String::from_utf8_lossy(&line)) {
                    index.record(keyword, &location);
                }
            }

            Ok(())
        })?;

        progress.on_update(&stats);
    }

    progress.on_finish(&stats);
    Ok(index)
}

pub fn list_native_entries(
    ports: &dyn FilePorts,
    config: &Config,
    on_entry: &mut dyn FnMut(&Path, &str),
) -> Result<usize, BatchError> {
    let archives = collect_files(
        ports,
        &config.source_root,
        &config.excluded_dir_names,
        ARCHIVE_EXTENSION,
    )?;

    let mut count = 0;
    for archive_path in archives {
        for name in ports.list_archive_entries(&archive_path)? {
            if has_extension(Path::new(&name), NATIVE_MODEL_EXTENSION) {
                on_entry(&archive_path, &name);
                count += 1;
            }
        }
    }

    Ok(count)
}
