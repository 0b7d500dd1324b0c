use std::fs;
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use image::{GrayImage, Luma, RgbImage};
use tracing::warn;

use crate::pipeline::HalfImage;

const REGION_WIDTH_RATIO: f32 = 0.30;
const REGION_HEIGHT_RATIO: f32 = 0.15;
const MIN_CONFIDENCE: f32 = 30.0;
const MIN_GLYPH_HEIGHT_PX: u32 = 5;
const BINARIZE_LUMA_THRESHOLD: u8 = 160;

#[derive(Debug, Clone)]
pub struct OcrToken {
    pub text: String,
    pub glyph_height: u32,
    pub confidence: f32,
}

pub trait OcrEngine {
    fn recognize_sparse(&self, region: &GrayImage) -> Result<Vec<OcrToken>>;
}

pub fn locate(half: &HalfImage, engine: &dyn OcrEngine) -> Option<String> {
    let mut best: Option<Candidate> = None;

    for region in corner_regions(&half.pixels) {
        let binarized = binarize(&region);
        let tokens = match engine.recognize_sparse(&binarized) {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(
                    source = %half.source_name,
                    side = half.side.as_str(),
                    error = %err,
                    "ocr failed, treating region as empty"
                );
                continue;
            }
        };

        for token in tokens {
            if let Some(candidate) = filter_token(token) {
                best = Some(match best {
                    Some(current) => pick_candidate(current, candidate),
                    None => candidate,
                });
            }
        }
    }

    best.map(|candidate| candidate.digits)
}

#[derive(Debug, Clone)]
struct Candidate {
    digits: String,
    glyph_height: u32,
    confidence: f32,
}

fn filter_token(token: OcrToken) -> Option<Candidate> {
    let digits: String = token.text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if token.confidence <= MIN_CONFIDENCE {
        return None;
    }
    if token.glyph_height <= MIN_GLYPH_HEIGHT_PX {
        return None;
    }

    Some(Candidate {
        digits,
        glyph_height: token.glyph_height,
        confidence: token.confidence,
    })
}

// Page numbers are usually the most prominent numeral in a scan corner, so
// glyph height outranks confidence.
fn pick_candidate(current: Candidate, challenger: Candidate) -> Candidate {
    if challenger.glyph_height > current.glyph_height {
        return challenger;
    }
    if challenger.glyph_height == current.glyph_height
        && challenger.confidence > current.confidence
    {
        return challenger;
    }
    current
}

fn corner_regions(page: &RgbImage) -> Vec<RgbImage> {
    let (width, height) = page.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let region_width = ((width as f32 * REGION_WIDTH_RATIO) as u32).max(1).min(width);
    let region_height = ((height as f32 * REGION_HEIGHT_RATIO) as u32)
        .max(1)
        .min(height);
    let top = height - region_height;

    vec![
        image::imageops::crop_imm(page, 0, top, region_width, region_height).to_image(),
        image::imageops::crop_imm(page, width - region_width, top, region_width, region_height)
            .to_image(),
    ]
}

fn binarize(region: &RgbImage) -> GrayImage {
    let mut gray = image::imageops::grayscale(region);
    for pixel in gray.pixels_mut() {
        *pixel = if pixel.0[0] > BINARIZE_LUMA_THRESHOLD {
            Luma([255])
        } else {
            Luma([0])
        };
    }
    gray
}

pub struct TesseractCli {
    lang: String,
}

impl TesseractCli {
    pub fn new(lang: &str) -> Self {
        Self {
            lang: lang.to_string(),
        }
    }

    pub fn available() -> bool {
        Command::new("tesseract").arg("--version").output().is_ok()
    }

    pub fn version() -> Option<String> {
        let output = Command::new("tesseract").arg("--version").output().ok()?;
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        String::from_utf8_lossy(&text)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }
}

impl OcrEngine for TesseractCli {
    fn recognize_sparse(&self, region: &GrayImage) -> Result<Vec<OcrToken>> {
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let png_path = std::env::temp_dir().join(format!(
            "scansplit_ocr_{}_{}.png",
            std::process::id(),
            stamp
        ));

        region
            .save_with_format(&png_path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write ocr region to {}", png_path.display()))?;

        let output = Command::new("tesseract")
            .arg(&png_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("--psm")
            .arg("11")
            .arg("tsv")
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", png_path.display()));

        let _ = fs::remove_file(&png_path);
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status: {}",
                stderr.trim()
            );
        }

        Ok(parse_tsv_tokens(&String::from_utf8_lossy(&output.stdout)))
    }
}

// Tesseract TSV rows: level page block par line word left top width height conf text.
// Word-level rows carry level 5; rows with conf -1 are layout nodes, not text.
fn parse_tsv_tokens(tsv: &str) -> Vec<OcrToken> {
    let mut tokens = Vec::new();

    for line in tsv.lines().skip(1) {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }

        let Ok(level) = columns[0].parse::<u32>() else {
            continue;
        };
        if level != 5 {
            continue;
        }

        let Ok(glyph_height) = columns[9].parse::<u32>() else {
            continue;
        };
        let Ok(confidence) = columns[10].parse::<f32>() else {
            continue;
        };
        if confidence < 0.0 {
            continue;
        }

        let text = columns[11].trim();
        if text.is_empty() {
            continue;
        }

        tokens.push(OcrToken {
            text: text.to_string(),
            glyph_height,
            confidence,
        });
    }

    tokens
}
