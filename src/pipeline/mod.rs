use image::RgbImage;
use thiserror::Error;

pub mod assemble;
pub mod batch;
pub mod namer;
pub mod natural_sort;
pub mod page_number;
pub mod splitter;

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PageSide {
    Left,
    Right,
}

impl PageSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug)]
pub struct HalfImage {
    pub pixels: RgbImage,
    pub side: PageSide,
    pub source_name: String,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode image '{name}'")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("could not normalize '{name}' to a 3-channel color model")]
    UnsupportedColorModel { name: String },

    #[error("detected page number is not numeric: '{value}'")]
    PageNumberParse { value: String },

    #[error("failed to encode page image from '{name}'")]
    Encode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot build a document from an empty batch")]
    EmptyBatch,

    #[error("failed to write archive")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to write archive entry '{name}'")]
    ArchiveWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render document: {0}")]
    Document(String),
}
