use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::error::ExtractError;

/// Tesseract-backed OCR engine for question images.
///
/// Images are decoded with the `image` crate and re-encoded as PNG in
/// memory before being handed to leptess, so every format the decoder
/// supports can be recognized.
#[derive(Clone)]
pub struct OcrEngine {
    inner: Arc<OcrEngineInner>,
}

struct OcrEngineInner {
    languages: String,
    dpi: u32,
}

impl OcrEngine {
    pub fn new(languages: &[String], dpi: u32) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(OcrEngineInner {
                languages: lang_str,
                dpi,
            }),
        }
    }

    pub fn dpi(&self) -> u32 {
        self.inner.dpi
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }

    /// Runs OCR on the image at `path`, returning the raw recognized text.
    pub fn recognize(&self, path: &Path) -> Result<String, ExtractError> {
        if !path.exists() {
            return Err(ExtractError::NotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|e| ExtractError::ReadImage {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.recognize_bytes(&bytes)
    }

    /// Runs OCR on in-memory image data.
    pub fn recognize_bytes(&self, image_data: &[u8]) -> Result<String, ExtractError> {
        let _span = tracing::info_span!("extractor.ocr").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| ExtractError::Decode(format!("Failed to load image: {}", e)))?;

        let mut png_data = Vec::new();
        let mut cursor = Cursor::new(&mut png_data);
        img.write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| ExtractError::Decode(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.inner.languages).map_err(|e| {
            ExtractError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ExtractError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;
        lt.set_source_resolution(self.inner.dpi as i32);

        let text = lt
            .get_utf8_text()
            .map_err(|e| ExtractError::OcrFailed(format!("Text recognition failed: {}", e)))?;

        Ok(text)
    }
}
