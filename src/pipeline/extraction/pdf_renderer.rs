//! Page images for scanned PDFs.
//!
//! A scanned page is a single image XObject painted over the page. We pull
//! the largest one out of the page resources and hand it to OCR as PNG.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageOutputFormat, RgbImage, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Extracts embedded page images with lopdf.
pub struct LopdfImageExtractor;

impl PdfPageRenderer for LopdfImageExtractor {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
    ) -> Result<Option<Vec<u8>>, ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(format!("Failed to parse PDF: {e}")))?;

        let pages = doc.get_pages();
        let page_id = u32::try_from(page_number)
            .ok()
            .and_then(|n| pages.get(&n).copied())
            .ok_or_else(|| {
                ExtractionError::PdfParsing(format!(
                    "Page {page_number} not found (PDF has {} pages)",
                    pages.len()
                ))
            })?;

        let Some(image_bytes) = largest_page_image(&doc, page_id)? else {
            return Ok(None);
        };

        // Re-encode whatever the stream held into PNG
        let img = image::load_from_memory(&image_bytes).map_err(|e| {
            ExtractionError::ImageProcessing(format!("Failed to decode page image: {e}"))
        })?;
        let png = encode_png(&img)?;

        tracing::debug!(
            page = page_number,
            raw_size = image_bytes.len(),
            png_size = png.len(),
            "Extracted image from PDF page"
        );

        Ok(Some(png))
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("Failed to encode PNG: {e}")))?;
    Ok(buf.into_inner())
}

/// Bytes of the largest image XObject on the page, if any.
fn largest_page_image(
    doc: &Document,
    page_id: ObjectId,
) -> Result<Option<Vec<u8>>, ExtractionError> {
    let page_dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| ExtractionError::PdfParsing(format!("Page object error: {e}")))?;

    let Some(xobjects) = dict_entry(doc, page_dict, b"Resources")
        .and_then(|resources| dict_entry(doc, resources, b"XObject"))
    else {
        return Ok(None);
    };

    let mut largest: Option<Vec<u8>> = None;
    for (_name, obj) in xobjects.iter() {
        let Object::Stream(stream) = resolve_object(doc, obj) else {
            continue;
        };
        if !is_image_subtype(&stream.dict) {
            continue;
        }

        let image_bytes = match image_stream_bytes(doc, stream) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable image XObject");
                continue;
            }
        };

        if largest.as_ref().map_or(true, |prev| image_bytes.len() > prev.len()) {
            largest = Some(image_bytes);
        }
    }

    Ok(largest)
}

fn is_image_subtype(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
}

fn has_filter(dict: &Dictionary, name: &[u8]) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == name,
        Ok(Object::Array(arr)) => arr
            .iter()
            .any(|o| matches!(o, Object::Name(n) if n == name)),
        _ => false,
    }
}

/// Encoded image bytes for a stream: JPEG as-is, embedded image files as-is,
/// raw samples rebuilt into PNG from the image dictionary.
fn image_stream_bytes(doc: &Document, stream: &Stream) -> Result<Vec<u8>, ExtractionError> {
    if has_filter(&stream.dict, b"DCTDecode") {
        // DCTDecode content is the JPEG file itself
        return Ok(stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone()));
    }

    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    if image::load_from_memory(&content).is_ok() {
        return Ok(content);
    }

    raw_samples_to_png(doc, &stream.dict, &content)
}

fn raw_samples_to_png(
    doc: &Document,
    dict: &Dictionary,
    samples: &[u8],
) -> Result<Vec<u8>, ExtractionError> {
    let width = get_int(dict, b"Width")? as u32;
    let height = get_int(dict, b"Height")? as u32;
    let bpc = get_int(dict, b"BitsPerComponent").unwrap_or(8) as u32;
    if bpc != 8 {
        return Err(ExtractionError::ImageProcessing(format!(
            "Unsupported bits per component: {bpc}"
        )));
    }

    let channels = color_channels(doc, dict);
    let expected = (width as usize) * (height as usize) * channels as usize;
    if samples.len() < expected {
        return Err(ExtractionError::ImageProcessing(format!(
            "Raw pixel buffer too small: {} bytes, expected {expected} ({width}x{height}x{channels})",
            samples.len()
        )));
    }
    let samples = samples[..expected].to_vec();

    let img = match channels {
        1 => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        // CMYK read as RGBA; OCR only needs the luminance structure
        4 => RgbaImage::from_raw(width, height, samples).map(DynamicImage::ImageRgba8),
        _ => None,
    }
    .ok_or_else(|| {
        ExtractionError::ImageProcessing(format!("Cannot rebuild {channels}-channel image"))
    })?;

    encode_png(&img)
}

/// Channel count from /ColorSpace. Defaults to RGB.
fn color_channels(doc: &Document, dict: &Dictionary) -> u32 {
    let Ok(cs) = dict.get(b"ColorSpace") else {
        return 3;
    };

    match resolve_object(doc, cs) {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" => 1,
            b"DeviceCMYK" => 4,
            _ => 3,
        },
        Object::Array(arr) => match arr.first() {
            Some(Object::Name(n)) if n == b"Indexed" => 1,
            Some(Object::Name(n)) if n == b"ICCBased" => arr
                .get(1)
                .map(|o| resolve_object(doc, o))
                .and_then(|o| o.as_stream().ok())
                .and_then(|s| get_int(&s.dict, b"N").ok())
                .map_or(3, |n| n as u32),
            _ => 3,
        },
        _ => 3,
    }
}

fn resolve_object<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .map(|obj| resolve_object(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
}

fn get_int(dict: &Dictionary, key: &[u8]) -> Result<i64, ExtractionError> {
    dict.get(key).and_then(Object::as_i64).map_err(|_| {
        ExtractionError::PdfParsing(format!(
            "Missing or non-integer /{} in image dictionary",
            String::from_utf8_lossy(key)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_fixtures::*;
    use super::*;
    use image::GenericImageView;
    use lopdf::dictionary;

    #[test]
    fn renderer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LopdfImageExtractor>();
    }

    #[test]
    fn extracts_page_image_as_png() {
        let pdf = make_scanned_pdf(&[(make_test_jpeg(200, 300), 200, 300)]);
        let png = LopdfImageExtractor.render_page(&pdf, 1).unwrap().unwrap();
        assert_eq!(&png[0..4], b"\x89PNG");
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.dimensions(), (200, 300));
    }

    #[test]
    fn pages_are_one_based() {
        let pdf = make_scanned_pdf(&[
            (make_test_jpeg(40, 40), 40, 40),
            (make_test_jpeg(80, 60), 80, 60),
        ]);
        let png = LopdfImageExtractor.render_page(&pdf, 2).unwrap().unwrap();
        assert_eq!(image::load_from_memory(&png).unwrap().dimensions(), (80, 60));

        let err = LopdfImageExtractor.render_page(&pdf, 0).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(LopdfImageExtractor.render_page(&pdf, 3).is_err());
    }

    #[test]
    fn text_only_page_has_no_image() {
        let pdf = make_text_pdf(&["Hello"]);
        assert!(LopdfImageExtractor.render_page(&pdf, 1).unwrap().is_none());
        assert!(LopdfImageExtractor
            .render_page(&make_blank_pdf(), 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn largest_image_wins() {
        let pdf = make_two_image_pdf(
            (make_test_jpeg(10, 10), 10, 10),
            (make_test_jpeg(200, 300), 200, 300),
        );
        let png = LopdfImageExtractor.render_page(&pdf, 1).unwrap().unwrap();
        assert_eq!(image::load_from_memory(&png).unwrap().dimensions(), (200, 300));
    }

    #[test]
    fn raw_gray_samples_are_rebuilt() {
        let dict = dictionary! {
            "Width" => 4,
            "Height" => 2,
            "BitsPerComponent" => 8,
            "ColorSpace" => "DeviceGray",
        };
        let doc = Document::with_version("1.4");
        let png = raw_samples_to_png(&doc, &dict, &[0, 64, 128, 255, 255, 128, 64, 0]).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.dimensions(), (4, 2));
    }

    #[test]
    fn short_sample_buffer_is_rejected() {
        let dict = dictionary! {
            "Width" => 10,
            "Height" => 10,
            "ColorSpace" => "DeviceRGB",
        };
        let doc = Document::with_version("1.4");
        assert!(matches!(
            raw_samples_to_png(&doc, &dict, &[0u8; 12]),
            Err(ExtractionError::ImageProcessing(_))
        ));
    }
}
