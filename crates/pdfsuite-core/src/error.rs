use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfSuiteError {
    #[error("Failed to parse PDF: {0}")]
    CorruptDocument(String),

    #[error("Document is encrypted and requires a password")]
    PasswordRequired,

    #[error("Incorrect password")]
    WrongPassword,

    #[error("Page index {index} is out of range (document has {page_count} pages)")]
    PageIndexOutOfRange { index: usize, page_count: usize },

    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("Operation '{operation}' requires option '{option}'")]
    MissingRequiredOption { operation: String, option: String },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Insufficient input: {0}")]
    InsufficientInput(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, PdfSuiteError>;

/// Stable error classes the UI switches on to render feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    CorruptFile,
    PasswordRequired,
    WrongPassword,
    InvalidPage,
    UnsupportedImage,
    InvalidOptions,
    UnknownOperation,
    InsufficientInput,
    UnsupportedEncryption,
    Internal,
}

impl PdfSuiteError {
    pub(crate) fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        PdfSuiteError::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PdfSuiteError::CorruptDocument(_) => ErrorCategory::CorruptFile,
            PdfSuiteError::PasswordRequired => ErrorCategory::PasswordRequired,
            PdfSuiteError::WrongPassword => ErrorCategory::WrongPassword,
            PdfSuiteError::PageIndexOutOfRange { .. } | PdfSuiteError::InvalidRange(_) => {
                ErrorCategory::InvalidPage
            }
            PdfSuiteError::UnsupportedImageFormat(_) => ErrorCategory::UnsupportedImage,
            PdfSuiteError::MissingRequiredOption { .. } | PdfSuiteError::InvalidOption { .. } => {
                ErrorCategory::InvalidOptions
            }
            PdfSuiteError::UnknownOperation(_) => ErrorCategory::UnknownOperation,
            PdfSuiteError::InsufficientInput(_) => ErrorCategory::InsufficientInput,
            PdfSuiteError::UnsupportedEncryption(_) => ErrorCategory::UnsupportedEncryption,
            PdfSuiteError::OperationError(_) | PdfSuiteError::SerializationError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Message shown to the end user. Deliberately free of parser internals.
    pub fn user_message(&self) -> String {
        match self {
            PdfSuiteError::CorruptDocument(_) => {
                "This file appears to be corrupted or is not a valid PDF.".to_string()
            }
            PdfSuiteError::PasswordRequired => {
                "This PDF is password protected. Please enter the password.".to_string()
            }
            PdfSuiteError::WrongPassword => {
                "The password is incorrect. Please try again.".to_string()
            }
            PdfSuiteError::PageIndexOutOfRange { index, page_count } => format!(
                "Page {} does not exist. The document has {} page(s).",
                index + 1,
                page_count
            ),
            PdfSuiteError::InvalidRange(detail) => format!("Invalid page range: {}", detail),
            PdfSuiteError::UnsupportedImageFormat(_) => {
                "Only JPEG and PNG images are supported.".to_string()
            }
            PdfSuiteError::MissingRequiredOption { option, .. } => {
                format!("Missing required setting: {}", option)
            }
            PdfSuiteError::InvalidOption { option, .. } => {
                format!("Invalid value for setting: {}", option)
            }
            PdfSuiteError::UnknownOperation(name) => format!("Unknown tool: {}", name),
            PdfSuiteError::InsufficientInput(detail) => detail.clone(),
            PdfSuiteError::UnsupportedEncryption(_) => {
                "This PDF uses an encryption method that is not supported.".to_string()
            }
            PdfSuiteError::OperationError(_) | PdfSuiteError::SerializationError(_) => {
                "Something went wrong while processing the PDF.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_errors_have_distinct_categories() {
        assert_ne!(
            PdfSuiteError::PasswordRequired.category(),
            PdfSuiteError::WrongPassword.category()
        );
        assert_ne!(
            PdfSuiteError::WrongPassword.user_message(),
            PdfSuiteError::CorruptDocument("x".into()).user_message()
        );
    }

    #[test]
    fn test_page_index_message_is_one_based() {
        let err = PdfSuiteError::PageIndexOutOfRange {
            index: 4,
            page_count: 3,
        };
        assert_eq!(err.category(), ErrorCategory::InvalidPage);
        assert!(err.user_message().contains("Page 5"));
        assert!(err.to_string().contains("index 4"));
    }

    #[test]
    fn test_category_serializes_kebab_case() {
        let json = serde_json::to_string(&ErrorCategory::WrongPassword).unwrap();
        assert_eq!(json, "\"wrong-password\"");
    }
}
