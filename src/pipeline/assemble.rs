use std::io::{Cursor, Write};

use printpdf::{Image, ImageTransform, Mm, PdfDocument, image_crate};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::pipeline::PipelineError;
use crate::pipeline::batch::ProcessedEntry;

// Page geometry targets a 200 DPI viewing scale, matching the archive JPEGs'
// native pixel dimensions.
const DOCUMENT_DPI: f32 = 200.0;
const MM_PER_INCH: f32 = 25.4;

const DOCUMENT_TITLE: &str = "split_book";

pub fn build_document(entries: &[ProcessedEntry]) -> Result<Vec<u8>, PipelineError> {
    let first = entries.first().ok_or(PipelineError::EmptyBatch)?;

    let (first_width, first_height) = page_size_mm(&first.page);
    let (document, first_page, first_layer) =
        PdfDocument::new(DOCUMENT_TITLE, first_width, first_height, "page");

    place_page(&document, first_page, first_layer, first)?;

    for entry in entries.iter().skip(1) {
        let (width, height) = page_size_mm(&entry.page);
        let (page, layer) = document.add_page(width, height, "page");
        place_page(&document, page, layer, entry)?;
    }

    document
        .save_to_bytes()
        .map_err(|err| PipelineError::Document(err.to_string()))
}

pub fn build_archive(entries: &[ProcessedEntry]) -> Result<Vec<u8>, PipelineError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // Payloads are already JPEG-compressed, so entries are stored as-is.
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for entry in entries {
        writer.start_file(entry.filename.as_str(), options)?;
        writer
            .write_all(&entry.jpeg_bytes)
            .map_err(|source| PipelineError::ArchiveWrite {
                name: entry.filename.clone(),
                source,
            })?;
    }

    Ok(writer.finish()?.into_inner())
}

fn page_size_mm(page: &image::RgbImage) -> (Mm, Mm) {
    (
        Mm(page.width() as f32 * MM_PER_INCH / DOCUMENT_DPI),
        Mm(page.height() as f32 * MM_PER_INCH / DOCUMENT_DPI),
    )
}

fn place_page(
    document: &printpdf::PdfDocumentReference,
    page: printpdf::PdfPageIndex,
    layer: printpdf::PdfLayerIndex,
    entry: &ProcessedEntry,
) -> Result<(), PipelineError> {
    let (width, height) = entry.page.dimensions();
    let buffer = image_crate::RgbImage::from_raw(width, height, entry.page.as_raw().clone())
        .ok_or_else(|| PipelineError::UnsupportedColorModel {
            name: entry.filename.clone(),
        })?;

    let pdf_image = Image::from_dynamic_image(&image_crate::DynamicImage::ImageRgb8(buffer));
    pdf_image.add_to_layer(
        document.get_page(page).get_layer(layer),
        ImageTransform {
            dpi: Some(DOCUMENT_DPI),
            ..Default::default()
        },
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use image::RgbImage;

    use super::*;

    fn entry(filename: &str, payload: &[u8], width: u32, height: u32) -> ProcessedEntry {
        ProcessedEntry {
            filename: filename.to_string(),
            jpeg_bytes: payload.to_vec(),
            page: RgbImage::new(width, height),
        }
    }

    #[test]
    fn empty_document_request_fails() {
        match build_document(&[]) {
            Err(PipelineError::EmptyBatch) => {}
            other => panic!("expected empty batch error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_archive_is_valid() {
        let bytes = build_archive(&[]).unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn archive_round_trips_names_and_contents_in_order() {
        let entries = vec![
            entry("9.jpg", b"nine", 10, 10),
            entry("10.jpg", b"ten", 10, 10),
            entry("scan_L.jpg", b"left", 10, 10),
        ];

        let bytes = build_archive(&entries).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        assert_eq!(archive.len(), 3);

        let expected = [
            ("9.jpg", b"nine".as_slice()),
            ("10.jpg", b"ten".as_slice()),
            ("scan_L.jpg", b"left".as_slice()),
        ];
        for (index, (name, payload)) in expected.iter().enumerate() {
            let mut file = archive.by_index(index).unwrap();
            assert_eq!(file.name(), *name);

            let mut contents = Vec::new();
            file.read_to_end(&mut contents).unwrap();
            assert_eq!(contents, *payload);
        }
    }

    #[test]
    fn document_bytes_carry_one_page_per_entry() {
        let entries = vec![
            entry("1.jpg", b"", 40, 60),
            entry("2.jpg", b"", 40, 60),
            entry("3.jpg", b"", 41, 60),
        ];

        let bytes = build_document(&entries).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let single = build_document(&entries[..1]).unwrap();
        assert!(bytes.len() > single.len());
    }

    #[test]
    fn page_size_targets_the_document_dpi() {
        let page = RgbImage::new(400, 600);
        let (width, height) = page_size_mm(&page);

        assert!((width.0 - 50.8).abs() < 0.01);
        assert!((height.0 - 76.2).abs() < 0.01);
    }
}
