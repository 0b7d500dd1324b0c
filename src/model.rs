use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    pub filename: String,
    pub byte_size: u64,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub image_count: usize,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub filename: String,
    pub side: String,
    pub detected_number: Option<String>,
    pub collision_rewritten: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub filename: String,
    pub sha256: String,
    pub width: u32,
    pub height: u32,
    pub naming: String,
    pub pages: Vec<PageRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertCounts {
    pub source_count: usize,
    pub page_count: usize,
    pub detected_number_count: usize,
    pub fallback_named_source_count: usize,
    pub collision_rewrite_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertOutputs {
    pub pdf_path: Option<String>,
    pub zip_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: String,
    pub ocr_mode: String,
    pub ocr_naming_active: bool,
    pub sort_direction: String,
    pub jpeg_quality: u8,
    pub tool_versions: ToolVersions,
    pub counts: ConvertCounts,
    pub outputs: ConvertOutputs,
    pub sources: Vec<SourceRecord>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionRecord {
    pub source: String,
    pub side: String,
    pub number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub ocr_lang: String,
    pub source_count: usize,
    pub detections: Vec<DetectionRecord>,
}
