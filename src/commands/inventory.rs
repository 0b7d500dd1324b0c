use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::model::{ImageEntry, ImageInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

const SUPPORTED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.source)?;

    if args.dry_run {
        info!(
            image_count = manifest.image_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.source.join("image_inventory.json"));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(image_count = manifest.image_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(source: &Path) -> Result<ImageInventoryManifest> {
    let mut image_paths = discover_images(source)?;
    image_paths.sort();

    if image_paths.is_empty() {
        bail!("no supported images found in {}", source.display());
    }

    let mut images = Vec::with_capacity(image_paths.len());
    for path in image_paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let byte_size = fs::metadata(&path)
            .with_context(|| format!("failed to inspect {}", path.display()))?
            .len();
        let (width, height) = image::image_dimensions(&path)
            .with_context(|| format!("failed to probe image dimensions: {}", path.display()))?;
        let sha256 = sha256_file(&path)?;

        images.push(ImageEntry {
            filename,
            byte_size,
            width,
            height,
            sha256,
        });
    }

    Ok(ImageInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: source.display().to_string(),
        image_count: images.len(),
        images,
    })
}

pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        if is_supported_image(&path) {
            images.push(path);
        }
    }

    Ok(images)
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for input in inputs {
        if input.is_dir() {
            paths.extend(discover_images(input)?);
        } else if input.is_file() {
            if !is_supported_image(input) {
                bail!("unsupported image extension: {}", input.display());
            }
            paths.push(input.clone());
        } else {
            bail!("input path does not exist: {}", input.display());
        }
    }

    paths.sort();

    if paths.is_empty() {
        bail!("no supported images found in the given inputs");
    }

    Ok(paths)
}
