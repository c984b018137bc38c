use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::application::{
    BatchError, ConversionOutcome, FilePorts, ModelConverter, ProgressReporter,
};
use crate::config::Config;
use crate::domain::{
    BatchStats, KeywordIndex, CONVERT_TEXTURES_FLAG, LOG_FILE_NAME, NOTIFY_LEVEL_ENV,
};

const SCRATCH_DIR_PREFIX: &str = "arsc-batch-";

pub struct FsPorts;

impl FsPorts {
    pub fn new() -> Self {
        Self
    }
}

fn open_archive(archive_path: &Path) -> Result<ZipArchive<fs::File>, BatchError> {
    let invalid = |reason: String| BatchError::Archive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(archive_path).map_err(|err| invalid(err.to_string()))?;
    ZipArchive::new(file).map_err(|err| invalid(err.to_string()))
}

fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    Some(segments.join("/"))
}

impl FilePorts for FsPorts {
    fn for_each_file(
        &self,
        root: &Path,
        excluded_dir_names: &[String],
        on_file: &mut dyn FnMut(PathBuf) -> Result<(), BatchError>,
    ) -> Result<(), BatchError> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let excluded = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| excluded_dir_names.iter().any(|skip| skip == name));
                if excluded {
                    log::info!("pruned {}", entry.path().display());
                }
                !excluded
            });

        for entry in walker {
            let entry = entry.map_err(|err| BatchError::Walk(err.to_string()))?;

            if entry.file_type().is_file() {
                on_file(entry.into_path())?;
            }
        }

        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_scratch_dir(&self) -> Result<TempDir, BatchError> {
        Ok(tempfile::Builder::new()
            .prefix(SCRATCH_DIR_PREFIX)
            .tempdir()?)
    }

    fn extract_archive(
        &self,
        archive_path: &Path,
        destination: &Path,
    ) -> Result<usize, BatchError> {
        let invalid = |reason: String| BatchError::Archive {
            path: archive_path.to_path_buf(),
            reason,
        };
        let mut archive = open_archive(archive_path)?;
        let mut extracted = 0;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|err| invalid(err.to_string()))?;

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                log::warn!(
                    "skipping unsafe entry {} in {}",
                    entry.name(),
                    archive_path.display()
                );
                continue;
            };
            let output_path = destination.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&output_path)?;
                continue;
            }

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut output_file = fs::File::create(&output_path)?;
            io::copy(&mut entry, &mut output_file).map_err(|err| invalid(err.to_string()))?;
            extracted += 1;
        }

        log::debug!(
            "extracted {} entries from {}",
            extracted,
            archive_path.display()
        );
        Ok(extracted)
    }

    fn write_archive(&self, source_dir: &Path, archive_path: &Path) -> Result<usize, BatchError> {
        let invalid = |reason: String| BatchError::Archive {
            path: archive_path.to_path_buf(),
            reason,
        };

        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut zip = ZipWriter::new(fs::File::create(archive_path)?);
        let options = FileOptions::default();
        let mut written = 0;

        for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|err| BatchError::Walk(err.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = entry_name(source_dir, entry.path()) else {
                continue;
            };
            zip.start_file(name, options)
                .map_err(|err| invalid(err.to_string()))?;
            let mut input = fs::File::open(entry.path())?;
            io::copy(&mut input, &mut zip)?;
            written += 1;
        }

        zip.finish().map_err(|err| invalid(err.to_string()))?;
        Ok(written)
    }

    fn list_archive_entries(&self, archive_path: &Path) -> Result<Vec<String>, BatchError> {
        let mut archive = open_archive(archive_path)?;
        let mut names = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(|err| BatchError::Archive {
                path: archive_path.to_path_buf(),
                reason: err.to_string(),
            })?;
            if !entry.is_dir() {
                names.push(entry.name().to_string());
            }
        }

        Ok(names)
    }

    fn for_each_archive_entry(
        &self,
        archive_path: &Path,
        on_entry: &mut dyn FnMut(&str, &mut dyn BufRead) -> Result<(), BatchError>,
    ) -> Result<(), BatchError> {
        let mut archive = open_archive(archive_path)?;

        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(|err| BatchError::Archive {
                path: archive_path.to_path_buf(),
                reason: err.to_string(),
            })?;
            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_string();
            let mut reader = BufReader::new(entry);
            on_entry(&name, &mut reader)?;
        }

        Ok(())
    }
}

/// Runs the external model converter, one process per file.
///
/// Output and errors of each run go to a `log.txt` next to the converted
/// file; the converter's exit status decides the outcome.
pub struct ProcessConverter {
    executable: PathBuf,
    texture_format: String,
    notify_level: String,
}

impl ProcessConverter {
    pub fn new(
        executable: impl Into<PathBuf>,
        texture_format: impl Into<String>,
        notify_level: impl Into<String>,
    ) -> Self {
        Self {
            executable: executable.into(),
            texture_format: texture_format.into(),
            notify_level: notify_level.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.converter_executable_path,
            &config.texture_format,
            &config.notify_level,
        )
    }
}

impl ModelConverter for ProcessConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<ConversionOutcome, BatchError> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        let log_file = fs::File::create(output.with_file_name(LOG_FILE_NAME))?;
        let error_log = log_file.try_clone()?;

        log::debug!(
            "{} {} {} {} {}",
            self.executable.display(),
            CONVERT_TEXTURES_FLAG,
            self.texture_format,
            input.display(),
            output.display()
        );

        let status = Command::new(&self.executable)
            .arg(CONVERT_TEXTURES_FLAG)
            .arg(&self.texture_format)
            .arg(input)
            .arg(output)
            .env(NOTIFY_LEVEL_ENV, &self.notify_level)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(error_log))
            .status()
            .map_err(|source| BatchError::Launch {
                executable: self.executable.clone(),
                source,
            })?;

        if status.success() {
            Ok(ConversionOutcome::Converted)
        } else {
            Ok(ConversionOutcome::Failed(format!("converter {status}")))
        }
    }
}

pub fn write_keyword_report(path: &Path, index: &KeywordIndex) -> Result<(), BatchError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);

    {
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        index.serialize(&mut serializer)?;
    }

    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn read_keyword_report(path: &Path) -> Result<KeywordIndex, BatchError> {
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub struct NoProgressReporter;

impl NoProgressReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NoProgressReporter {
    fn on_start(&self, _root: &Path) {}

    fn on_update(&self, _stats: &BatchStats) {}

    fn on_conversion_failed(&self, _input: &Path, _reason: &str) {}

    fn on_finish(&self, _stats: &BatchStats) {}
}

pub struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(draw_target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, draw_target);
        let style = ProgressStyle::with_template("{spinner:.yellow} {msg:.blue}")
            .expect("invalid progress style template")
            .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));

        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn on_start(&self, root: &Path) {
        let _ = self
            .bar
            .println(format!("scanning: {}", root.display()));
        self.bar.set_message(format_stats(&BatchStats::default()));
    }

    fn on_update(&self, stats: &BatchStats) {
        self.bar.set_message(format_stats(stats));
    }

    fn on_conversion_failed(&self, input: &Path, reason: &str) {
        // `println` is dropped when stderr is not a terminal
        let message = format_failure(input, reason);
        self.bar
            .suspend(|| eprintln!("{}", style(message).red().for_stderr()));
    }

    fn on_finish(&self, stats: &BatchStats) {
        self.bar.disable_steady_tick();
        self.bar.finish_with_message(format_stats(stats));
    }
}

struct LineProgressState<W: Write> {
    writer: W,
    last_stats: Option<BatchStats>,
}

// Plain-text progress for non-interactive runs; redraws `\r` status lines
// only when the counters change.
pub struct LineProgressReporter<W: Write> {
    state: RefCell<LineProgressState<W>>,
}

impl LineProgressReporter<std::io::Stderr> {
    pub fn new() -> Self {
        Self::with_writer(std::io::stderr())
    }
}

impl<W: Write> LineProgressReporter<W> {
    pub fn with_writer(writer: W) -> Self {
        Self {
            state: RefCell::new(LineProgressState {
                writer,
                last_stats: None,
            }),
        }
    }

    pub fn into_inner(self) -> W {
        self.state.into_inner().writer
    }

    fn emit(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        let _ = state.writer.write_all(text.as_bytes());
        let _ = state.writer.flush();
    }
}

impl<W: Write> ProgressReporter for LineProgressReporter<W> {
    fn on_start(&self, root: &Path) {
        self.emit(&format!("scanning: {}\n", root.display()));
    }

    fn on_update(&self, stats: &BatchStats) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.last_stats != Some(*stats);
            state.last_stats = Some(*stats);
            changed
        };

        if changed {
            self.emit(&format!("\r{}", format_stats(stats)));
        }
    }

    fn on_conversion_failed(&self, input: &Path, reason: &str) {
        self.emit(&format!("\n{}\n", format_failure(input, reason)));
    }

    fn on_finish(&self, stats: &BatchStats) {
        self.on_update(stats);
        self.emit("\n");
    }
}

fn format_stats(stats: &BatchStats) -> String {
    format!(
        "archives: {} entries: {} converted: {} failed: {}",
        stats.archives_scanned, stats.entries_scanned, stats.converted, stats.failed
    )
}

fn format_failure(input: &Path, reason: &str) -> String {
    format!("{} was not converted ({})", input.display(), reason)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{entry_name, format_failure, format_stats};
    use crate::domain::BatchStats;

    #[test]
    fn format_stats_omits_archive_writes() {
        let stats = BatchStats {
            archives_scanned: 1,
            entries_scanned: 5,
            converted: 3,
            failed: 2,
            archives_written: 99,
        };

        assert_eq!(
            format_stats(&stats),
            "archives: 1 entries: 5 converted: 3 failed: 2"
        );
    }

    #[test]
    fn format_failure_names_input() {
        assert_eq!(
            format_failure(Path::new("a.arsc/m.aoa"), "converter exit status: 1"),
            "a.arsc/m.aoa was not converted (converter exit status: 1)"
        );
    }

    #[test]
    fn entry_name_uses_forward_slashes() {
        let root = Path::new("/scratch");
        let nested = root.join("roof").join("tiles").join("main.aoa");

        assert_eq!(
            entry_name(root, &nested).as_deref(),
            Some("roof/tiles/main.aoa")
        );
        assert_eq!(entry_name(root, Path::new("/elsewhere/x.aoa")), None);
    }
}
