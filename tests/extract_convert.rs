mod common;

use std::fs;

use arsc_batch::{
    extract_and_convert, BatchError, Config, FsPorts, LineProgressReporter, NoProgressReporter,
};

use common::{create_zip, CopyConverter};

#[test]
fn converts_models_into_mirrored_tree() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let source = temp_dir.path().join("scenes");
    let output = temp_dir.path().join("converted");

    create_zip(
        &source.join("asia").join("pagoda.arsc"),
        &[
            ("main.aoa", "root model"),
            ("roof/tiles.aoa", "roof model"),
            ("roof/tiles.dds", "texture"),
        ],
    )?;

    let config = Config::new(&source).with_output_root(&output);
    let converter = CopyConverter::new();
    let stats = extract_and_convert(&FsPorts::new(), &converter, &NoProgressReporter::new(), &config)?;

    let archive_dir = output.join("asia").join("pagoda");
    assert_eq!(
        fs::read_to_string(archive_dir.join("main.fbx"))?,
        "converted:root model"
    );
    assert_eq!(
        fs::read_to_string(archive_dir.join("roof").join("tiles.fbx"))?,
        "converted:roof model"
    );
    assert!(!archive_dir.join("roof").join("tiles.dds").exists());
    assert_eq!(stats.archives_scanned, 1);
    assert_eq!(stats.converted, 2);
    assert_eq!(stats.failed, 0);

    Ok(())
}

#[test]
fn never_visits_excluded_directories() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let source = temp_dir.path().join("scenes");
    let output = temp_dir.path().join("converted");

    create_zip(&source.join("kept.arsc"), &[("kept.aoa", "k")])?;
    create_zip(
        &source.join("airports-db").join("hidden.arsc"),
        &[("hidden.aoa", "h")],
    )?;
    create_zip(
        &source
            .join("asia")
            .join("airports-db")
            .join("deep")
            .join("deeper.arsc"),
        &[("deeper.aoa", "d")],
    )?;

    let config = Config::new(&source).with_output_root(&output);
    let converter = CopyConverter::new();
    let stats = extract_and_convert(&FsPorts::new(), &converter, &NoProgressReporter::new(), &config)?;

    assert_eq!(converter.input_names(), vec!["kept.aoa".to_string()]);
    assert_eq!(stats.archives_scanned, 1);
    assert!(!output.join("airports-db").exists());
    assert!(!output.join("asia").exists());

    Ok(())
}

#[test]
fn continues_after_failed_conversion() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let source = temp_dir.path().join("scenes");
    let output = temp_dir.path().join("converted");

    create_zip(
        &source.join("a.arsc"),
        &[("first.aoa", "1"), ("broken.aoa", "2"), ("third.aoa", "3")],
    )?;
    create_zip(&source.join("b.arsc"), &[("fourth.aoa", "4")])?;

    let config = Config::new(&source).with_output_root(&output);
    let converter = CopyConverter::new();
    let progress = LineProgressReporter::with_writer(Vec::new());
    let stats = extract_and_convert(&FsPorts::new(), &converter, &progress, &config)?;

    assert!(output.join("a").join("first.fbx").exists());
    assert!(!output.join("a").join("broken.fbx").exists());
    assert!(output.join("a").join("third.fbx").exists());
    assert!(output.join("b").join("fourth.fbx").exists());
    assert_eq!(stats.converted, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.attempted(), 4);

    let report = String::from_utf8(progress.into_inner())?;
    let failed_entry = source.join("a.arsc").join("broken.aoa");
    assert!(report.contains(&format!("{} was not converted", failed_entry.display())));

    Ok(())
}

#[test]
fn removes_scratch_directories_after_each_archive() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let source = temp_dir.path().join("scenes");
    let output = temp_dir.path().join("converted");

    create_zip(&source.join("a.arsc"), &[("dir/model.aoa", "m")])?;
    create_zip(&source.join("b.arsc"), &[("model.aoa", "m")])?;

    let config = Config::new(&source).with_output_root(&output);
    let converter = CopyConverter::new();
    extract_and_convert(&FsPorts::new(), &converter, &NoProgressReporter::new(), &config)?;

    let inputs = converter.inputs.borrow();
    assert_eq!(inputs.len(), 2);
    for input in inputs.iter() {
        assert!(!input.exists(), "scratch file survived: {}", input.display());
    }

    Ok(())
}

#[test]
fn corrupt_archive_aborts_the_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let source = temp_dir.path().join("scenes");
    fs::create_dir_all(&source)?;
    fs::write(source.join("bad.arsc"), b"not a zip")?;

    let config = Config::new(&source).with_output_root(temp_dir.path().join("converted"));
    let result = extract_and_convert(
        &FsPorts::new(),
        &CopyConverter::new(),
        &NoProgressReporter::new(),
        &config,
    );

    match result {
        Err(BatchError::Archive { path, .. }) => assert_eq!(path, source.join("bad.arsc")),
        other => panic!("expected archive error, got {other:?}"),
    }

    Ok(())
}

#[test]
fn requires_output_root() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;

    let result = extract_and_convert(
        &FsPorts::new(),
        &CopyConverter::new(),
        &NoProgressReporter::new(),
        &Config::new(temp_dir.path()),
    );

    assert!(matches!(result, Err(BatchError::Config(_))));

    Ok(())
}
