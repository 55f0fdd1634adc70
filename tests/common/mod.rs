//! Shared fixtures for integration tests.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};
use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a PDF with one page per entry; each page shows its lines top-down,
/// one text object per line.
pub fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids = Vec::new();
    for lines in pages {
        let mut content = String::new();
        for (i, line) in lines.iter().enumerate() {
            let escaped = line
                .replace('\\', "\\\\")
                .replace('(', "\\(")
                .replace(')', "\\)");
            let y = 720 - 14 * i as i64;
            content.push_str(&format!("BT /F1 12 Tf 72 {y} Td ({escaped}) Tj ET\n"));
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_ids.len() as i64),
    });
    for page_id in &page_ids {
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(*page_id) {
            dict.set("Parent", pages_id);
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("serialise test PDF");
    buffer
}

/// A small two-page paper.
pub fn sample_paper() -> Vec<u8> {
    build_pdf(&[
        &[
            "Sparse Attention for Long Documents",
            "ABSTRACT",
            "We study sparse attention patterns.",
            "1. Introduction",
            "Transformers scale poorly with length.",
        ],
        &[
            "2.1 Setup",
            "- long inputs",
            "- limited memory",
            "Conclusion",
            "Sparse patterns help.",
        ],
    ])
}
