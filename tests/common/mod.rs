#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use arsc_batch::{BatchError, ConversionOutcome, ModelConverter};

pub fn create_zip(path: &Path, entries: &[(&str, &str)]) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();

    for (name, contents) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(contents.as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

pub fn read_zip(path: &Path) -> Result<BTreeMap<String, Vec<u8>>, Box<dyn std::error::Error>> {
    let mut archive = zip::ZipArchive::new(fs::File::open(path)?)?;
    let mut entries = BTreeMap::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        entries.insert(entry.name().to_string(), contents);
    }

    Ok(entries)
}

/// Copies input to output, tagging the copy, and fails for any input whose
/// file name contains `broken`. Records every input it was handed.
pub struct CopyConverter {
    pub inputs: RefCell<Vec<PathBuf>>,
}

impl CopyConverter {
    pub fn new() -> Self {
        Self {
            inputs: RefCell::new(Vec::new()),
        }
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs
            .borrow()
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

impl ModelConverter for CopyConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<ConversionOutcome, BatchError> {
        self.inputs.borrow_mut().push(input.to_path_buf());

        let is_broken = input
            .file_name()
            .is_some_and(|name| name.to_string_lossy().contains("broken"));
        if is_broken {
            return Ok(ConversionOutcome::Failed("exit status: 1".to_string()));
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = fs::read_to_string(input)?;
        fs::write(output, format!("converted:{contents}"))?;

        Ok(ConversionOutcome::Converted)
    }
}
