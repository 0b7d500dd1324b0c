use std::collections::HashSet;

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

use crate::pipeline::page_number::{self, OcrEngine};
use crate::pipeline::{PageSide, PipelineError, SourceFile, namer, splitter};

pub struct ProcessedEntry {
    pub filename: String,
    pub jpeg_bytes: Vec<u8>,
    pub page: RgbImage,
}

#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub filename: String,
    pub side: PageSide,
    pub detected_number: Option<String>,
    pub collision_rewritten: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NamingOutcome {
    OcrBoth,
    OcrLeftOnly,
    OcrRightOnly,
    OcrFallback,
    Sequential,
}

impl NamingOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OcrBoth => "ocr_both",
            Self::OcrLeftOnly => "ocr_left_only",
            Self::OcrRightOnly => "ocr_right_only",
            Self::OcrFallback => "ocr_fallback",
            Self::Sequential => "sequential",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source_name: String,
    pub width: u32,
    pub height: u32,
    pub naming: NamingOutcome,
    pub pages: Vec<PageOutcome>,
}

pub struct Batch {
    pub entries: Vec<ProcessedEntry>,
    pub outcomes: Vec<SourceOutcome>,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub jpeg_quality: u8,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { jpeg_quality: 95 }
    }
}

pub trait ProgressObserver {
    fn on_source_done(&mut self, completed: usize, total: usize);
}

pub struct NullProgress;

impl ProgressObserver for NullProgress {
    fn on_source_done(&mut self, _completed: usize, _total: usize) {}
}

pub fn process(
    sources: &[SourceFile],
    engine: Option<&dyn OcrEngine>,
    options: &BatchOptions,
    progress: &mut dyn ProgressObserver,
) -> Result<Batch, PipelineError> {
    let mut entries: Vec<ProcessedEntry> = Vec::with_capacity(sources.len() * 2);
    let mut outcomes = Vec::with_capacity(sources.len());
    let mut taken: HashSet<String> = HashSet::with_capacity(sources.len() * 2);

    for (index, source) in sources.iter().enumerate() {
        let (left, right) = splitter::split(&source.name, &source.bytes)?;
        let width = left.pixels.width() + right.pixels.width();
        let height = left.pixels.height();
        let base = source_base_name(&source.name);

        let (left_number, right_number) = match engine {
            Some(engine) => (
                page_number::locate(&left, engine),
                page_number::locate(&right, engine),
            ),
            None => (None, None),
        };

        let naming = naming_outcome(engine.is_some(), left_number.as_deref(), right_number.as_deref());
        let (left_name, right_name) = match engine {
            Some(_) => {
                namer::ocr_name_pair(left_number.as_deref(), right_number.as_deref(), &base)?
            }
            None => namer::sequential_name_pair(&base),
        };

        let mut pages = Vec::with_capacity(2);
        for (half, candidate, detected_number) in [
            (left, left_name, left_number),
            (right, right_name, right_number),
        ] {
            let (filename, collision_rewritten) = resolve_collision(candidate, index, &taken);
            taken.insert(filename.clone());

            let jpeg_bytes = encode_jpeg(&half.pixels, options.jpeg_quality, &source.name)?;
            pages.push(PageOutcome {
                filename: filename.clone(),
                side: half.side,
                detected_number,
                collision_rewritten,
            });
            entries.push(ProcessedEntry {
                filename,
                jpeg_bytes,
                page: half.pixels,
            });
        }

        outcomes.push(SourceOutcome {
            source_name: source.name.clone(),
            width,
            height,
            naming,
            pages,
        });
        progress.on_source_done(index + 1, sources.len());
    }

    Ok(Batch { entries, outcomes })
}

fn naming_outcome(ocr_active: bool, left: Option<&str>, right: Option<&str>) -> NamingOutcome {
    if !ocr_active {
        return NamingOutcome::Sequential;
    }
    match (left, right) {
        (Some(_), Some(_)) => NamingOutcome::OcrBoth,
        (Some(_), None) => NamingOutcome::OcrLeftOnly,
        (None, Some(_)) => NamingOutcome::OcrRightOnly,
        (None, None) => NamingOutcome::OcrFallback,
    }
}

// Rewrites a colliding name by inserting the zero-based source index before the
// extension. Both halves of one scan can detect the same number, so the
// insertion repeats until the name is actually free.
fn resolve_collision(
    candidate: String,
    source_index: usize,
    taken: &HashSet<String>,
) -> (String, bool) {
    if !taken.contains(&candidate) {
        return (candidate, false);
    }

    let mut rewritten = insert_index(&candidate, source_index);
    while taken.contains(&rewritten) {
        rewritten = insert_index(&rewritten, source_index);
    }

    (rewritten, true)
}

fn insert_index(filename: &str, source_index: usize) -> String {
    let (stem, ext) = split_extension(filename);
    format!("{stem}_{source_index}{ext}")
}

fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(position) => filename.split_at(position),
        None => (filename, ""),
    }
}

fn source_base_name(filename: &str) -> String {
    split_extension(filename).0.to_string()
}

fn encode_jpeg(
    page: &RgbImage,
    quality: u8,
    source_name: &str,
) -> Result<Vec<u8>, PipelineError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder
        .encode_image(page)
        .map_err(|source| PipelineError::Encode {
            name: source_name.to_string(),
            source,
        })?;
    Ok(bytes)
}
