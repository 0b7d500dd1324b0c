use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{ConvertArgs, OcrMode, SortDirection};
use crate::commands::inventory;
use crate::model::{
    ConvertCounts, ConvertOutputs, ConvertRunManifest, PageRecord, SourceRecord, ToolVersions,
};
use crate::pipeline::batch::{
    self, BatchOptions, NamingOutcome, ProgressObserver, SourceOutcome,
};
use crate::pipeline::page_number::{OcrEngine, TesseractCli};
use crate::pipeline::{SourceFile, assemble, natural_sort};
use crate::util::{
    ensure_directory, now_utc_string, sha256_bytes, utc_compact_string, write_bytes,
    write_json_pretty,
};

const PDF_FILENAME: &str = "split_book.pdf";
const ZIP_FILENAME: &str = "split_images.zip";

pub fn run(args: ConvertArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    if !args.pdf && !args.zip {
        bail!("no output format selected: pass --pdf, --zip, or both");
    }
    if args.jpeg_quality == 0 || args.jpeg_quality > 100 {
        bail!("--jpeg-quality must be between 1 and 100");
    }

    let input_paths = inventory::collect_inputs(&args.inputs)?;

    let mut warnings = Vec::new();
    let engine = resolve_ocr_engine(args.ocr_mode, &args.ocr_lang, &mut warnings)?;
    let ocr_naming_active = engine.is_some();

    info!(
        run_id = %run_id,
        source_count = input_paths.len(),
        ocr_mode = args.ocr_mode.as_str(),
        ocr_naming_active,
        "starting convert"
    );

    let (sources, source_hashes) = load_sources(&input_paths)?;

    let batch = batch::process(
        &sources,
        engine.as_ref().map(|engine| engine as &dyn OcrEngine),
        &BatchOptions {
            jpeg_quality: args.jpeg_quality,
        },
        &mut LogProgress,
    )?;

    let mut entries = batch.entries;
    natural_sort::sort_entries(&mut entries, args.sort == SortDirection::Desc);

    // Both payloads are built before either is written, so a failed batch
    // leaves no partial output behind.
    let document = if args.pdf {
        Some(assemble::build_document(&entries)?)
    } else {
        None
    };
    let archive = if args.zip {
        Some(assemble::build_archive(&entries)?)
    } else {
        None
    };

    ensure_directory(&args.output)?;
    let mut outputs = ConvertOutputs {
        pdf_path: None,
        zip_path: None,
    };

    if let Some(document) = document {
        let path = args.output.join(PDF_FILENAME);
        write_bytes(&path, &document)?;
        info!(path = %path.display(), pages = entries.len(), "wrote document");
        outputs.pdf_path = Some(path.display().to_string());
    }
    if let Some(archive) = archive {
        let path = args.output.join(ZIP_FILENAME);
        write_bytes(&path, &archive)?;
        info!(path = %path.display(), entries = entries.len(), "wrote archive");
        outputs.zip_path = Some(path.display().to_string());
    }

    let counts = count_outcomes(&batch.outcomes, entries.len());
    let manifest = ConvertRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        completed_at: now_utc_string(),
        ocr_mode: args.ocr_mode.as_str().to_string(),
        ocr_naming_active,
        sort_direction: args.sort.as_str().to_string(),
        jpeg_quality: args.jpeg_quality,
        tool_versions: ToolVersions {
            tesseract: TesseractCli::version(),
        },
        counts,
        outputs,
        sources: source_records(&batch.outcomes, &source_hashes),
        warnings,
    };

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.output.join("manifests").join(format!(
            "convert_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote run manifest");

    info!(
        run_id = %run_id,
        sources = manifest.counts.source_count,
        pages = manifest.counts.page_count,
        "convert completed"
    );

    Ok(())
}

struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_source_done(&mut self, completed: usize, total: usize) {
        info!(completed, total, "processed source image");
    }
}

fn resolve_ocr_engine(
    mode: OcrMode,
    lang: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<TesseractCli>> {
    match mode {
        OcrMode::Off => Ok(None),
        OcrMode::Auto => {
            if TesseractCli::available() {
                Ok(Some(TesseractCli::new(lang)))
            } else {
                let message =
                    "ocr mode 'auto' requested but tesseract is unavailable, using sequential naming"
                        .to_string();
                warn!("{message}");
                warnings.push(message);
                Ok(None)
            }
        }
        OcrMode::Force => {
            if TesseractCli::available() {
                Ok(Some(TesseractCli::new(lang)))
            } else {
                bail!("ocr mode 'force' requested but tesseract is unavailable");
            }
        }
    }
}

fn load_sources(paths: &[PathBuf]) -> Result<(Vec<SourceFile>, Vec<String>)> {
    let mut sources = Vec::with_capacity(paths.len());
    let mut hashes = Vec::with_capacity(paths.len());

    for path in paths {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

        hashes.push(sha256_bytes(&bytes));
        sources.push(SourceFile { name, bytes });
    }

    Ok((sources, hashes))
}

fn count_outcomes(outcomes: &[SourceOutcome], page_count: usize) -> ConvertCounts {
    let detected_number_count = outcomes
        .iter()
        .flat_map(|outcome| outcome.pages.iter())
        .filter(|page| page.detected_number.is_some())
        .count();
    let fallback_named_source_count = outcomes
        .iter()
        .filter(|outcome| outcome.naming == NamingOutcome::OcrFallback)
        .count();
    let collision_rewrite_count = outcomes
        .iter()
        .flat_map(|outcome| outcome.pages.iter())
        .filter(|page| page.collision_rewritten)
        .count();

    ConvertCounts {
        source_count: outcomes.len(),
        page_count,
        detected_number_count,
        fallback_named_source_count,
        collision_rewrite_count,
    }
}

fn source_records(outcomes: &[SourceOutcome], hashes: &[String]) -> Vec<SourceRecord> {
    outcomes
        .iter()
        .zip(hashes)
        .map(|(outcome, sha256)| SourceRecord {
            filename: outcome.source_name.clone(),
            sha256: sha256.clone(),
            width: outcome.width,
            height: outcome.height,
            naming: outcome.naming.as_str().to_string(),
            pages: outcome
                .pages
                .iter()
                .map(|page| PageRecord {
                    filename: page.filename.clone(),
                    side: page.side.as_str().to_string(),
                    detected_number: page.detected_number.clone(),
                    collision_rewritten: page.collision_rewritten,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};
    use std::path::Path;

    use image::{DynamicImage, RgbImage};

    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let dir = std::env::temp_dir().join(format!(
            "scansplit_convert_{}_{}_{}",
            label,
            std::process::id(),
            stamp
        ));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    fn write_jpeg(path: &Path, width: u32, height: u32) {
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut bytes, image::ImageFormat::Jpeg)
            .expect("encode test image");
        fs::write(path, bytes.into_inner()).expect("write test image");
    }

    fn convert_args(input: PathBuf, output: PathBuf) -> ConvertArgs {
        ConvertArgs {
            inputs: vec![input],
            output,
            pdf: false,
            zip: false,
            sort: SortDirection::Asc,
            ocr_mode: OcrMode::Off,
            ocr_lang: "eng".to_string(),
            jpeg_quality: 95,
            manifest_path: None,
        }
    }

    #[test]
    fn run_rejects_empty_output_selection() {
        let dir = scratch_dir("no_output");
        let args = convert_args(dir.clone(), dir.join("out"));

        let err = run(args).unwrap_err();
        assert!(err.to_string().contains("no output format selected"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_rejects_out_of_range_jpeg_quality() {
        let dir = scratch_dir("quality");
        let mut args = convert_args(dir.clone(), dir.join("out"));
        args.zip = true;
        args.jpeg_quality = 0;

        let err = run(args).unwrap_err();
        assert!(err.to_string().contains("jpeg-quality"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn archive_only_run_splits_two_scans_into_four_pages() {
        let dir = scratch_dir("end_to_end");
        write_jpeg(&dir.join("A.jpg"), 800, 600);
        write_jpeg(&dir.join("B.jpg"), 800, 600);

        let output = dir.join("out");
        let mut args = convert_args(dir.clone(), output.clone());
        args.zip = true;

        run(args).unwrap();

        let bytes = fs::read(output.join(ZIP_FILENAME)).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 4);

        let expected = ["A_01_L.jpg", "A_02_R.jpg", "B_01_L.jpg", "B_02_R.jpg"];
        for (index, expected_name) in expected.iter().enumerate() {
            let mut file = archive.by_index(index).unwrap();
            assert_eq!(file.name(), *expected_name);

            let mut payload = Vec::new();
            file.read_to_end(&mut payload).unwrap();
            let page = image::load_from_memory(&payload).unwrap();
            assert_eq!((page.width(), page.height()), (400, 600));
        }

        let manifests: Vec<_> = fs::read_dir(output.join("manifests"))
            .unwrap()
            .collect::<std::io::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(manifests.len(), 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn descending_sort_reverses_archive_order() {
        let dir = scratch_dir("descending");
        write_jpeg(&dir.join("A.jpg"), 100, 80);
        write_jpeg(&dir.join("B.jpg"), 100, 80);

        let output = dir.join("out");
        let mut args = convert_args(dir.clone(), output.clone());
        args.zip = true;
        args.sort = SortDirection::Desc;

        run(args).unwrap();

        let bytes = fs::read(output.join(ZIP_FILENAME)).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        let names: Vec<String> = (0..archive.len())
            .map(|index| archive.by_index(index).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["B_02_R.jpg", "B_01_L.jpg", "A_02_R.jpg", "A_01_L.jpg"]
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn pdf_run_writes_a_document() {
        let dir = scratch_dir("pdf");
        write_jpeg(&dir.join("A.jpg"), 100, 80);

        let output = dir.join("out");
        let mut args = convert_args(dir.clone(), output.clone());
        args.pdf = true;

        run(args).unwrap();

        let bytes = fs::read(output.join(PDF_FILENAME)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(!output.join(ZIP_FILENAME).exists());

        fs::remove_dir_all(&dir).ok();
    }
}
