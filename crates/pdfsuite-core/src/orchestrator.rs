//! Single entry point mapping a tool name, its input files and an options
//! bag to one of the document transforms.

use std::path::Path;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use crate::apply_operations::apply_edits;
use crate::codec::{self, LoadOptions, SaveOptions};
use crate::command::{
    InputFile, Operation, OperationOutput, OperationRequest, OutputFile, ProcessMetrics,
};
use crate::compression::{compress, CompressionReport};
use crate::config::EngineConfig;
use crate::encryption::{self, EncryptionSpec};
use crate::error::{PdfSuiteError, Result};
use crate::image::{self, ImageFormat};
use crate::merge::merge;
use crate::model::Document;
use crate::ocr::apply_recognized_text;
use crate::overlay::{add_signature, place_image, ImagePlacement, SignatureTarget};
use crate::pages::{add_page, extract_pages, remove_pages, rotate};
use crate::split::split;

#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    config: EngineConfig,
}

struct Produced {
    files: Vec<OutputFile>,
    report: Option<CompressionReport>,
    page_count: usize,
}

impl Produced {
    fn single(file: OutputFile, page_count: usize) -> Self {
        Self {
            files: vec![file],
            report: None,
            page_count,
        }
    }
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse `operation` and `options`, then run the request.
    pub fn process(
        &self,
        operation: &str,
        files: &[InputFile],
        options: &Value,
    ) -> Result<OperationOutput> {
        let op: Operation = operation.parse()?;
        let request = OperationRequest::from_options(op, options)?;
        self.apply(&request, files)
    }

    /// Run a validated request. Inputs are processed in the order given.
    pub fn apply(&self, request: &OperationRequest, files: &[InputFile]) -> Result<OperationOutput> {
        let started = start_clock();
        let op = request.operation();
        let produced = self.dispatch(op, request, files)?;

        let metrics = ProcessMetrics {
            input_size_bytes: files.iter().map(|f| f.bytes.len()).sum(),
            output_size_bytes: produced.files.iter().map(|f| f.bytes.len()).sum(),
            page_count: produced.page_count as u32,
            processing_time_ms: started.map_or(0, |t| t.elapsed().as_millis() as u64),
        };
        info!(
            operation = %op,
            inputs = files.len(),
            outputs = produced.files.len(),
            elapsed_ms = metrics.processing_time_ms,
            "processed request"
        );
        Ok(OperationOutput {
            files: produced.files,
            report: produced.report,
            metrics,
        })
    }

    fn dispatch(
        &self,
        op: Operation,
        request: &OperationRequest,
        files: &[InputFile],
    ) -> Result<Produced> {
        match request {
            OperationRequest::Compress { tier } => {
                let input = single_input(op, files)?;
                let doc = load(input, &self.config)?;
                let report = compress(&doc, *tier, &self.config.compression)?;
                let file = OutputFile::pdf(self.output_name(op, input), report.bytes.clone());
                Ok(Produced {
                    files: vec![file],
                    report: Some(report),
                    page_count: doc.page_count(),
                })
            }
            OperationRequest::Merge => {
                let docs = files
                    .iter()
                    .map(|f| load(f, &self.config))
                    .collect::<Result<Vec<_>>>()?;
                let merged = merge(&docs)?;
                let bytes = codec::save(
                    &merged,
                    &SaveOptions {
                        encryption: None,
                        compact: true,
                    },
                )?;
                let name = self.config.output.merged_name.clone();
                Ok(Produced::single(OutputFile::pdf(name, bytes), merged.page_count()))
            }
            OperationRequest::Ocr { pages } => self.edit_single(op, files, |doc| {
                apply_recognized_text(doc, pages).map(|_| ())
            }),
            OperationRequest::Unlock { password } => {
                let input = single_input(op, files)?;
                let (doc, _) = encryption::unlock(&input.bytes, password)?;
                self.save_single(op, input, &doc)
            }
            OperationRequest::Protect {
                password,
                owner_password,
                permissions,
            } => {
                let input = single_input(op, files)?;
                let doc = load(input, &self.config)?;
                let mut spec = EncryptionSpec::new(password.as_str());
                if let Some(owner) = owner_password {
                    spec = spec.with_owner_password(owner.as_str());
                }
                if let Some(permissions) = permissions {
                    spec = spec.with_permissions(*permissions);
                }
                let bytes = encryption::protect(&doc, &spec)?;
                Ok(Produced::single(
                    OutputFile::pdf(self.output_name(op, input), bytes),
                    doc.page_count(),
                ))
            }
            OperationRequest::Sign {
                signature_image,
                page,
            } => {
                let target = page.map_or(SignatureTarget::Last, SignatureTarget::Page);
                self.edit_single(op, files, |doc| {
                    add_signature(doc, target, signature_image, &self.config.signature).map(|_| ())
                })
            }
            OperationRequest::Split { ranges } => {
                let input = single_input(op, files)?;
                let doc = load(input, &self.config)?;
                let parts = split(&doc, ranges)?;
                let base = self.output_name(op, input);
                let mut out = Vec::with_capacity(parts.len());
                let mut page_count = 0;
                for (i, part) in parts.iter().enumerate() {
                    page_count += part.page_count();
                    let bytes = codec::save(part, &SaveOptions::default())?;
                    out.push(OutputFile::pdf(numbered(&base, i + 1), bytes));
                }
                Ok(Produced {
                    files: out,
                    report: None,
                    page_count,
                })
            }
            OperationRequest::Rotate {
                degrees,
                page_indices,
            } => self.edit_single(op, files, |doc| {
                let indices = match page_indices {
                    Some(indices) => indices.clone(),
                    None => (0..doc.page_count()).collect(),
                };
                rotate(doc, &indices, *degrees)
            }),
            OperationRequest::DeletePages { page_indices } => {
                self.edit_single(op, files, |doc| remove_pages(doc, page_indices))
            }
            OperationRequest::ExtractPages { page_indices } => {
                let input = single_input(op, files)?;
                let doc = load(input, &self.config)?;
                let extracted = extract_pages(&doc, page_indices)?;
                self.save_single(op, input, &extracted)
            }
            OperationRequest::Edit { edits } => {
                self.edit_single(op, files, |doc| apply_edits(doc, edits, &self.config))
            }
            OperationRequest::ImagesToPdf => {
                let doc = images_to_pdf(files)?;
                let bytes = codec::save(&doc, &SaveOptions::default())?;
                let name = match files.first().and_then(|f| f.name.as_deref()) {
                    Some(original) => format!("{}-{}", op, with_pdf_extension(original)),
                    None => format!("{}-{}", op, self.config.output.default_name),
                };
                Ok(Produced::single(OutputFile::pdf(name, bytes), doc.page_count()))
            }
        }
    }

    /// Load the single input, mutate it, save it under the default name.
    fn edit_single<F>(&self, op: Operation, files: &[InputFile], edit: F) -> Result<Produced>
    where
        F: FnOnce(&mut Document) -> Result<()>,
    {
        let input = single_input(op, files)?;
        let mut doc = load(input, &self.config)?;
        edit(&mut doc)?;
        self.save_single(op, input, &doc)
    }

    fn save_single(&self, op: Operation, input: &InputFile, doc: &Document) -> Result<Produced> {
        let bytes = codec::save(doc, &SaveOptions::default())?;
        Ok(Produced::single(
            OutputFile::pdf(self.output_name(op, input), bytes),
            doc.page_count(),
        ))
    }

    fn output_name(&self, op: Operation, input: &InputFile) -> String {
        let original = input
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.config.output.default_name);
        format!("{}-{}", op, original)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn start_clock() -> Option<Instant> {
    Some(Instant::now())
}

/// There is no monotonic clock on wasm32-unknown-unknown; the web boundary
/// fills in the timing instead.
#[cfg(target_arch = "wasm32")]
fn start_clock() -> Option<Instant> {
    None
}

fn single_input(op: Operation, files: &[InputFile]) -> Result<&InputFile> {
    match files {
        [] => Err(PdfSuiteError::InsufficientInput(format!(
            "{} needs an input file",
            op
        ))),
        [first] => Ok(first),
        [first, rest @ ..] => {
            warn!(operation = %op, ignored = rest.len(), "extra input files ignored");
            Ok(first)
        }
    }
}

fn load(input: &InputFile, config: &EngineConfig) -> Result<Document> {
    let options = LoadOptions {
        page_size: Some(config.page_size()),
        ..Default::default()
    };
    codec::load(&input.bytes, &options).map_err(|e| match (e, &input.name) {
        (PdfSuiteError::CorruptDocument(msg), Some(name)) => {
            PdfSuiteError::CorruptDocument(format!("{}: {}", name, msg))
        }
        (other, _) => other,
    })
}

/// One page per image, each page sized to its image at 1 px = 1 pt.
fn images_to_pdf(files: &[InputFile]) -> Result<Document> {
    if files.is_empty() {
        return Err(PdfSuiteError::InsufficientInput(
            "jpg-to-pdf needs at least one image".into(),
        ));
    }
    let mut doc = codec::create();
    for file in files {
        let resource = image::decode(&file.bytes, ImageFormat::sniff(&file.bytes)?)?;
        let (width, height) = (resource.width as f32, resource.height as f32);
        let index = add_page(&mut doc, Some((width, height)))?;
        place_image(
            &mut doc,
            index,
            resource,
            ImagePlacement {
                x: 0.0,
                y: 0.0,
                width: Some(width),
                height: Some(height),
            },
        )?;
    }
    Ok(doc)
}

fn with_pdf_extension(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    format!("{}.pdf", stem)
}

/// `split-pdf-report.pdf` -> `split-pdf-report-2.pdf`
fn numbered(name: &str, n: usize) -> String {
    match name.strip_suffix(".pdf") {
        Some(stem) => format!("{}-{}.pdf", stem, n),
        None => format!("{}-{}", name, n),
    }
}
