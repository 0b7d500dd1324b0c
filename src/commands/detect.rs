use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::DetectArgs;
use crate::commands::inventory;
use crate::model::{DetectionManifest, DetectionRecord};
use crate::pipeline::page_number::{self, TesseractCli};
use crate::pipeline::splitter;
use crate::util::{now_utc_string, write_json_pretty};

pub fn run(args: DetectArgs) -> Result<()> {
    if !TesseractCli::available() {
        bail!("tesseract is unavailable; detect requires a working ocr engine");
    }
    let engine = TesseractCli::new(&args.ocr_lang);

    let input_paths = inventory::collect_inputs(&args.inputs)?;
    let mut detections = Vec::with_capacity(input_paths.len() * 2);

    for path in &input_paths {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

        let (left, right) = splitter::split(&name, &bytes)?;
        for half in [left, right] {
            let number = page_number::locate(&half, &engine);
            info!(
                source = %name,
                side = half.side.as_str(),
                number = number.as_deref().unwrap_or("-"),
                "page number detection"
            );
            detections.push(DetectionRecord {
                source: name.clone(),
                side: half.side.as_str().to_string(),
                number,
            });
        }
    }

    let manifest = DetectionManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        ocr_lang: args.ocr_lang.clone(),
        source_count: input_paths.len(),
        detections,
    };

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| PathBuf::from("page_number_detections.json"));
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote detection manifest");

    Ok(())
}
