//! OCR capability: image/PDF in, raw text out.
//!
//! The engine treats OCR as an opaque external collaborator; anything
//! implementing [`OcrCapability`] can feed the queue. The shipped
//! implementation talks to Azure Document Intelligence `prebuilt-read`
//! with credentials from `.env`.

use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ReconcileError;

pub trait OcrCapability {
    /// Recognize one file into raw text. May fail; an empty string is a
    /// valid (if useless) success.
    fn recognize(&self, file: &Path) -> Result<String, ReconcileError>;
}

const POLL_ATTEMPTS: u32 = 60;
const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct AzureOcr {
    key: String,
    endpoint: String,
    client: Client,
}

impl AzureOcr {
    /// Build a client from `AZURE_OCR_KEY` / `AZURE_OCR_ENDPOINT`
    /// (loaded from `.env` when present).
    pub fn from_env() -> Result<Self, ReconcileError> {
        let _ = dotenvy::dotenv();
        let key = std::env::var("AZURE_OCR_KEY")
            .map_err(|_| ReconcileError::Ocr("AZURE_OCR_KEY not set in .env".to_string()))?;
        let endpoint = std::env::var("AZURE_OCR_ENDPOINT")
            .map_err(|_| ReconcileError::Ocr("AZURE_OCR_ENDPOINT not set in .env".to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ReconcileError::Ocr(e.to_string()))?;
        Ok(Self {
            key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl OcrCapability for AzureOcr {
    fn recognize(&self, file: &Path) -> Result<String, ReconcileError> {
        let url = format!(
            "{}/documentintelligence/documentModels/prebuilt-read:analyze?api-version=2024-11-30",
            self.endpoint
        );

        let bytes = fs::read(file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReconcileError::Ocr("File not found.".to_string())
            } else {
                ReconcileError::Ocr(format!("Could not read file: {}", e))
            }
        })?;

        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ReconcileError::Ocr("Check your internet connection and try again.".to_string())
                } else {
                    ReconcileError::Ocr("Network error.".to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ReconcileError::Ocr(format!(
                "OCR failed ({}): {}",
                status,
                if body.is_empty() {
                    "Invalid key or endpoint?"
                } else {
                    body.as_str()
                }
            )));
        }

        let poll_url = response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ReconcileError::Ocr("No Operation-Location in response".to_string()))?
            .to_string();

        // Poll for result
        for _ in 0..POLL_ATTEMPTS {
            std::thread::sleep(POLL_INTERVAL);
            let poll_resp = self
                .client
                .get(&poll_url)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .send()
                .map_err(|e| ReconcileError::Ocr(e.to_string()))?;
            let poll_json: serde_json::Value = poll_resp
                .json()
                .map_err(|e| ReconcileError::Ocr(format!("Invalid JSON: {}", e)))?;
            let status_str = poll_json
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("");
            if status_str == "succeeded" {
                let result = poll_json
                    .get("analyzeResult")
                    .ok_or_else(|| ReconcileError::Ocr("No analyzeResult".to_string()))?;
                let mut lines: Vec<String> = Vec::new();
                let empty = Vec::new();
                let pages = result.get("pages").and_then(|p| p.as_array()).unwrap_or(&empty);
                for page in pages {
                    let page_lines = page.get("lines").and_then(|l| l.as_array()).unwrap_or(&empty);
                    for line in page_lines {
                        if let Some(text) = line.get("content").and_then(|c| c.as_str()) {
                            lines.push(text.to_string());
                        }
                    }
                }
                log::debug!("OCR recognized {} line(s) from {}", lines.len(), file.display());
                return Ok(lines.join("\n"));
            }
            if status_str == "failed" {
                let err = poll_json
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown error");
                return Err(ReconcileError::Ocr(format!("OCR analysis failed: {}", err)));
            }
        }
        Err(ReconcileError::Ocr("OCR timed out. Try again.".to_string()))
    }
}
