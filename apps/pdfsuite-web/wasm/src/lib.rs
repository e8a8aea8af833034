//! WASM bindings for the PDF transformation engine
//!
//! A stateless boundary: every call takes the input bytes and options,
//! runs one operation through [`Orchestrator`], and returns a plain result
//! object. No document survives between calls.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { processFile, getPdfInfo } from './pkg/pdfsuite_wasm.js';
//!
//! await init();
//!
//! const info = getPdfInfo(bytes);
//! const result = processFile(
//!     "delete-pages",
//!     [{ name: "report.pdf", bytes }],
//!     { pageIndices: [1, 3] },
//! );
//! if (result.success) {
//!     for (const file of result.files) download(file.filename, file.data);
//! } else {
//!     showError(result.error_category, result.error);
//! }
//! ```

pub mod validation;

use js_sys::{Array, Reflect, Uint8Array};
use pdfsuite_core::{EngineConfig, InputFile, Orchestrator, ProcessResult};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

pub use validation::PdfInfo;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Run one operation.
///
/// `files` is an array of `{ name?: string, bytes: Uint8Array }` in the
/// order the operation should see them. `config` is an optional TOML
/// engine configuration. Engine failures come back as a result object
/// with `success: false`; only malformed arguments throw.
#[wasm_bindgen(js_name = processFile)]
pub fn process_file(
    operation: &str,
    files: Array,
    options: JsValue,
    config: Option<String>,
) -> Result<JsValue, JsValue> {
    let orchestrator = match config {
        Some(toml) => Orchestrator::new(
            EngineConfig::from_str(&toml).map_err(|e| JsValue::from_str(&format!("{:#}", e)))?,
        ),
        None => Orchestrator::default(),
    };
    let inputs = read_files(&files)?;
    let options: Value = serde_wasm_bindgen::from_value(options)
        .map_err(|e| JsValue::from_str(&format!("Invalid options: {}", e)))?;

    let result = run(&orchestrator, operation, &inputs, &options, js_sys::Date::now);
    to_js(&result)
}

/// Get detailed PDF info without running an operation
/// Useful for showing file info before user commits to an operation
#[wasm_bindgen(js_name = getPdfInfo)]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = validation::validate_pdf(bytes).map_err(|e| JsValue::from_str(&e))?;
    to_js(&info)
}

/// Quick validation check for a PDF file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    validation::quick_validate(bytes).map_err(|e| JsValue::from_str(&e))
}

/// Get page count from PDF bytes (convenience function)
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    let info = validation::validate_pdf(bytes).map_err(|e| JsValue::from_str(&e))?;
    Ok(info.page_count)
}

/// Format bytes as human-readable string
#[wasm_bindgen]
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Process and time one request. `now` returns milliseconds; the engine
/// has no clock of its own on wasm32.
fn run(
    orchestrator: &Orchestrator,
    operation: &str,
    files: &[InputFile],
    options: &Value,
    now: impl Fn() -> f64,
) -> ProcessResult {
    let started = now();
    let mut result = ProcessResult::from(orchestrator.process(operation, files, options));
    if let Some(metrics) = result.metrics.as_mut() {
        metrics.processing_time_ms = (now() - started).max(0.0) as u64;
    }
    result
}

fn read_files(files: &Array) -> Result<Vec<InputFile>, JsValue> {
    files
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let bytes = Reflect::get(&entry, &JsValue::from_str("bytes"))?;
            if !bytes.is_instance_of::<Uint8Array>() {
                return Err(JsValue::from_str(&format!(
                    "files[{}].bytes must be a Uint8Array",
                    i
                )));
            }
            let name = Reflect::get(&entry, &JsValue::from_str("name"))?.as_string();
            Ok(InputFile {
                name,
                bytes: Uint8Array::new(&bytes).to_vec(),
            })
        })
        .collect()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::fixtures::create_test_pdf;
    use pdfsuite_core::ErrorCategory;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_get_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(2621440), "2.5 MB");
    }

    #[test]
    fn test_run_records_elapsed_time() {
        let clock = Cell::new(1_000.0);
        let now = || {
            let t = clock.get();
            clock.set(t + 25.0);
            t
        };
        let files = [InputFile::new("doc.pdf", create_test_pdf(3))];
        let result = run(
            &Orchestrator::default(),
            "extract-pages",
            &files,
            &json!({ "pageIndices": [2] }),
            now,
        );
        assert!(result.success);
        assert_eq!(result.files[0].filename, "extract-pages-doc.pdf");
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.processing_time_ms, 25);
        assert_eq!(metrics.page_count, 1);
    }

    #[test]
    fn test_run_reports_failures() {
        let result = run(
            &Orchestrator::default(),
            "split-pdf",
            &[InputFile::new("doc.pdf", create_test_pdf(2))],
            &json!({ "ranges": "5" }),
            || 0.0,
        );
        assert!(!result.success);
        assert_eq!(result.error_category, Some(ErrorCategory::InvalidPage));
        assert!(result.metrics.is_none());
    }
}
