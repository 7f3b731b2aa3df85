//! Fixtures shared by the dossier test suites: in-memory PDFs and a scripted provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::dossier::prompts::ExtractionPrompt;
use crate::llm_client::{CompletionProvider, LlmError, ModelResponse};

pub struct SampleImage {
    width: i64,
    height: i64,
    filter: &'static str,
    data: Vec<u8>,
}

impl SampleImage {
    pub fn jpeg(width: i64, height: i64, data: &[u8]) -> Self {
        Self {
            width,
            height,
            filter: "DCTDecode",
            data: data.to_vec(),
        }
    }

    pub fn flate(width: i64, height: i64) -> Self {
        Self {
            width,
            height,
            filter: "FlateDecode",
            data: vec![0; 16],
        }
    }
}

/// Builds a PDF with one page per entry of `pages`; `images` are attached to page one.
pub fn sample_pdf(pages: &[&str], images: &[SampleImage]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let shared_resources = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut xobjects = lopdf::Dictionary::new();
    for (i, image) in images.iter().enumerate() {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width,
                "Height" => image.height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => image.filter,
            },
            image.data.clone(),
        ));
        xobjects.set(format!("Im{i}"), image_id);
    }

    let mut kids: Vec<Object> = Vec::new();
    for (i, text) in pages.iter().enumerate() {
        let mut operations = Vec::new();
        if !text.is_empty() {
            operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ];
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if i == 0 && !images.is_empty() {
            page.set(
                "Resources",
                dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects.clone(),
                },
            );
        }
        kids.push(doc.add_object(page).into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => shared_resources,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
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

/// Provider that replays scripted results and counts how often it was called.
pub struct StubProvider {
    responses: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(responses: Vec<Result<ModelResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(ModelResponse::new(text))])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for StubProvider {
    async fn complete(&self, _prompt: &ExtractionPrompt) -> Result<ModelResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("StubProvider ran out of scripted responses"))
    }
}
