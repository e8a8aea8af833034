use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compression::{CompressionReport, CompressionTier};
use crate::encryption::PermissionSet;
use crate::error::{ErrorCategory, PdfSuiteError, Result};
use crate::ocr::RecognizedPage;
use crate::operations::EditOperation;

/// Tool names the orchestrator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    CompressPdf,
    MergePdf,
    PdfOcr,
    UnlockPdf,
    ProtectPdf,
    SignPdf,
    SplitPdf,
    RotatePdf,
    DeletePages,
    ExtractPages,
    EditPdf,
    JpgToPdf,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::CompressPdf,
        Operation::MergePdf,
        Operation::PdfOcr,
        Operation::UnlockPdf,
        Operation::ProtectPdf,
        Operation::SignPdf,
        Operation::SplitPdf,
        Operation::RotatePdf,
        Operation::DeletePages,
        Operation::ExtractPages,
        Operation::EditPdf,
        Operation::JpgToPdf,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::CompressPdf => "compress-pdf",
            Operation::MergePdf => "merge-pdf",
            Operation::PdfOcr => "pdf-ocr",
            Operation::UnlockPdf => "unlock-pdf",
            Operation::ProtectPdf => "protect-pdf",
            Operation::SignPdf => "sign-pdf",
            Operation::SplitPdf => "split-pdf",
            Operation::RotatePdf => "rotate-pdf",
            Operation::DeletePages => "delete-pages",
            Operation::ExtractPages => "extract-pages",
            Operation::EditPdf => "edit-pdf",
            Operation::JpgToPdf => "jpg-to-pdf",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = PdfSuiteError;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| PdfSuiteError::UnknownOperation(s.to_string()))
    }
}

/// A validated request. Built from an options bag with
/// [`OperationRequest::from_options`].
#[derive(Debug, Clone)]
pub enum OperationRequest {
    Compress {
        tier: CompressionTier,
    },
    Merge,
    Ocr {
        pages: Vec<RecognizedPage>,
    },
    Unlock {
        password: String,
    },
    Protect {
        password: String,
        owner_password: Option<String>,
        permissions: Option<PermissionSet>,
    },
    Sign {
        /// Decoded PNG or JPEG bytes.
        signature_image: Vec<u8>,
        /// Defaults to the last page.
        page: Option<usize>,
    },
    Split {
        ranges: String,
    },
    Rotate {
        degrees: i64,
        /// Defaults to every page.
        page_indices: Option<Vec<usize>>,
    },
    DeletePages {
        page_indices: Vec<usize>,
    },
    ExtractPages {
        page_indices: Vec<usize>,
    },
    Edit {
        edits: Vec<EditOperation>,
    },
    ImagesToPdf,
}

impl OperationRequest {
    /// Validate a loosely typed camelCase options object for `op`.
    pub fn from_options(op: Operation, options: &Value) -> Result<Self> {
        let bag = Options { op, value: options };
        let request = match op {
            Operation::CompressPdf => OperationRequest::Compress {
                tier: bag.optional("tier")?.unwrap_or_default(),
            },
            Operation::MergePdf => OperationRequest::Merge,
            Operation::PdfOcr => OperationRequest::Ocr {
                pages: bag.required("pages")?,
            },
            Operation::UnlockPdf => OperationRequest::Unlock {
                password: bag.required("password")?,
            },
            Operation::ProtectPdf => OperationRequest::Protect {
                password: bag.required("password")?,
                owner_password: bag.optional("ownerPassword")?,
                permissions: bag.optional("permissions")?,
            },
            Operation::SignPdf => {
                let encoded: String = bag.required("signatureImage")?;
                OperationRequest::Sign {
                    signature_image: decode_base64("signatureImage", &encoded)?,
                    page: bag.optional("pageIndex")?,
                }
            }
            Operation::SplitPdf => OperationRequest::Split {
                ranges: bag.required("ranges")?,
            },
            Operation::RotatePdf => OperationRequest::Rotate {
                degrees: bag.optional("degrees")?.unwrap_or(90),
                page_indices: bag.optional("pageIndices")?,
            },
            Operation::DeletePages => OperationRequest::DeletePages {
                page_indices: bag.required("pageIndices")?,
            },
            Operation::ExtractPages => OperationRequest::ExtractPages {
                page_indices: bag.required("pageIndices")?,
            },
            Operation::EditPdf => OperationRequest::Edit {
                edits: bag.required("edits")?,
            },
            Operation::JpgToPdf => OperationRequest::ImagesToPdf,
        };
        Ok(request)
    }

    pub fn operation(&self) -> Operation {
        match self {
            OperationRequest::Compress { .. } => Operation::CompressPdf,
            OperationRequest::Merge => Operation::MergePdf,
            OperationRequest::Ocr { .. } => Operation::PdfOcr,
            OperationRequest::Unlock { .. } => Operation::UnlockPdf,
            OperationRequest::Protect { .. } => Operation::ProtectPdf,
            OperationRequest::Sign { .. } => Operation::SignPdf,
            OperationRequest::Split { .. } => Operation::SplitPdf,
            OperationRequest::Rotate { .. } => Operation::RotatePdf,
            OperationRequest::DeletePages { .. } => Operation::DeletePages,
            OperationRequest::ExtractPages { .. } => Operation::ExtractPages,
            OperationRequest::Edit { .. } => Operation::EditPdf,
            OperationRequest::ImagesToPdf => Operation::JpgToPdf,
        }
    }
}

struct Options<'a> {
    op: Operation,
    value: &'a Value,
}

impl Options<'_> {
    fn field(&self, key: &str) -> Option<&Value> {
        self.value.get(key).filter(|v| !v.is_null())
    }

    fn required<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        match self.field(key) {
            Some(value) => parse_option(key, value),
            None => Err(PdfSuiteError::MissingRequiredOption {
                operation: self.op.name().to_string(),
                option: key.to_string(),
            }),
        }
    }

    fn optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.field(key).map(|value| parse_option(key, value)).transpose()
    }
}

fn parse_option<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|e| PdfSuiteError::invalid_option(key, e.to_string()))
}

/// Accepts bare base64 or a `data:` URL.
fn decode_base64(key: &str, encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| PdfSuiteError::invalid_option(key, e.to_string()))
}

#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: Option<String>,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: Some(name.into()),
            bytes,
        }
    }

    pub fn unnamed(bytes: Vec<u8>) -> Self {
        Self { name: None, bytes }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn pdf(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: "application/pdf".to_string(),
            bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationOutput {
    pub files: Vec<OutputFile>,
    /// Present for `compress-pdf`.
    pub report: Option<CompressionReport>,
    pub metrics: ProcessMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Base64-encoded data of the first output file
    pub data: Option<String>,
    pub files: Vec<EncodedFile>,
    pub error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub report: Option<CompressionReport>,
    pub metrics: Option<ProcessMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodedFile {
    pub filename: String,
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

impl ProcessResult {
    pub fn from_output(output: &OperationOutput) -> Self {
        let files: Vec<EncodedFile> = output
            .files
            .iter()
            .map(|file| EncodedFile {
                filename: file.filename.clone(),
                mime_type: file.mime_type.clone(),
                data: STANDARD.encode(&file.bytes),
            })
            .collect();
        Self {
            success: true,
            data: files.first().map(|f| f.data.clone()),
            files,
            error: None,
            error_category: None,
            report: output.report.clone(),
            metrics: Some(output.metrics.clone()),
        }
    }

    pub fn from_error(err: &PdfSuiteError) -> Self {
        Self {
            success: false,
            data: None,
            files: Vec::new(),
            error: Some(err.user_message()),
            error_category: Some(err.category()),
            report: None,
            metrics: None,
        }
    }
}

impl From<Result<OperationOutput>> for ProcessResult {
    fn from(result: Result<OperationOutput>) -> Self {
        match result {
            Ok(output) => ProcessResult::from_output(&output),
            Err(err) => ProcessResult::from_error(&err),
        }
    }
}
