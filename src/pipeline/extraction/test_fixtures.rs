//! In-memory PDFs and images for extraction tests.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

fn escape_pdf_string(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

fn finish(mut doc: Document, pages_id: ObjectId, page_ids: Vec<ObjectId>) -> Vec<u8> {
    for page_id in &page_ids {
        if let Ok(Object::Dictionary(ref mut dict)) = doc.get_object_mut(*page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Digital PDF, one page per entry, each page one text line per `\n`.
pub fn make_text_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for page_text in pages {
        let mut content = String::new();
        for (i, line) in page_text.lines().enumerate() {
            let y = 720 - (i as i64) * 16;
            content.push_str(&format!(
                "BT /F1 12 Tf 72 {y} Td ({}) Tj ET\n",
                escape_pdf_string(line)
            ));
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }));
    }

    finish(doc, pages_id, page_ids)
}

/// Light gray JPEG.
pub fn make_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([128u8, 128, 128]));
    let mut jpeg_bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut jpeg_bytes, ImageOutputFormat::Jpeg(85))
        .unwrap();
    jpeg_bytes.into_inner()
}

/// PNG with a dark band on white, enough structure for preprocessing.
pub fn make_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |_, y| {
        if y % 12 < 4 {
            Rgb([20, 20, 20])
        } else {
            Rgb([240, 240, 240])
        }
    });
    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut png, ImageOutputFormat::Png)
        .unwrap();
    png.into_inner()
}

fn jpeg_xobject(doc: &mut Document, jpeg: &[u8], width: i64, height: i64) -> ObjectId {
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
            "Length" => jpeg.len() as i64,
        },
        jpeg.to_vec(),
    );
    stream.allows_compression = false;
    doc.add_object(Object::Stream(stream))
}

/// Scanned PDF: each page is a single embedded JPEG and no text layer.
/// `images` holds (jpeg bytes, width, height) per page.
pub fn make_scanned_pdf(images: &[(Vec<u8>, u32, u32)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for (jpeg, width, height) in images {
        let img_id = jpeg_xobject(&mut doc, jpeg, *width as i64, *height as i64);
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"q 612 0 0 792 0 0 cm /Img1 Do Q".to_vec(),
        ));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Img1" => img_id },
            },
        }));
    }

    finish(doc, pages_id, page_ids)
}

/// One page carrying two images of different sizes.
pub fn make_two_image_pdf(small: (Vec<u8>, u32, u32), large: (Vec<u8>, u32, u32)) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let small_id = jpeg_xobject(&mut doc, &small.0, small.1 as i64, small.2 as i64);
    let large_id = jpeg_xobject(&mut doc, &large.0, large.1 as i64, large.2 as i64);
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        b"q 10 0 0 10 0 0 cm /Small Do Q q 612 0 0 792 0 0 cm /Large Do Q".to_vec(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Small" => small_id,
                "Large" => large_id,
            },
        },
    });

    finish(doc, pages_id, vec![page_id])
}

/// Page with neither text nor images.
pub fn make_blank_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {},
    });
    finish(doc, pages_id, vec![page_id])
}

/// Digital PDF whose trailer carries an /Encrypt entry.
pub fn make_encrypted_marker_pdf() -> Vec<u8> {
    let bytes = make_text_pdf(&["Confidential lab results"]);
    let mut doc = Document::load_mem(&bytes).unwrap();
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "O" => Object::string_literal(vec![0u8; 32]),
        "U" => Object::string_literal(vec![0u8; 32]),
        "P" => -44,
    });
    doc.trailer.set("Encrypt", encrypt_id);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
