//! Password protection applied at save time, and unlocking of protected
//! input.

mod crypt;
mod rc4;
mod standard;

pub(crate) use crypt::{open, seal};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::{self, LoadOptions, SaveOptions};
use crate::error::{PdfSuiteError, Result};
use crate::model::Document;

const PRINT: i32 = 1 << 2;
const MODIFY: i32 = 1 << 3;
const COPY: i32 = 1 << 4;
const ANNOTATE: i32 = 1 << 5;
const FILL_FORMS: i32 = 1 << 8;
const ACCESSIBILITY: i32 = 1 << 9;
const ASSEMBLE: i32 = 1 << 10;
const PRINT_HIGH_RES: i32 = 1 << 11;
/// Bits 7-8 and 13-32 must be set for revision 3 handlers.
const RESERVED: i32 = 0xFFFF_F0C0_u32 as i32;

/// What a user opening the protected file with the user password may do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionSet {
    pub printing: bool,
    /// Print at full resolution rather than a degraded rendering.
    pub high_quality_printing: bool,
    pub modifying: bool,
    pub copying: bool,
    pub annotating: bool,
    pub form_filling: bool,
    /// Text extraction for screen readers.
    pub accessibility: bool,
    pub assembly: bool,
}

impl Default for PermissionSet {
    /// Share but don't edit: printing and accessibility only.
    fn default() -> Self {
        Self {
            printing: true,
            high_quality_printing: true,
            modifying: false,
            copying: false,
            annotating: false,
            form_filling: false,
            accessibility: true,
            assembly: false,
        }
    }
}

impl PermissionSet {
    pub fn all() -> Self {
        Self {
            printing: true,
            high_quality_printing: true,
            modifying: true,
            copying: true,
            annotating: true,
            form_filling: true,
            accessibility: true,
            assembly: true,
        }
    }

    /// The `/P` value of the encryption dictionary.
    pub fn to_p(self) -> i32 {
        let flags = [
            (self.printing, PRINT),
            (self.modifying, MODIFY),
            (self.copying, COPY),
            (self.annotating, ANNOTATE),
            (self.form_filling, FILL_FORMS),
            (self.accessibility, ACCESSIBILITY),
            (self.assembly, ASSEMBLE),
            (self.printing && self.high_quality_printing, PRINT_HIGH_RES),
        ];
        flags
            .iter()
            .filter(|(allowed, _)| *allowed)
            .fold(RESERVED, |p, (_, bit)| p | bit)
    }

    pub fn from_p(p: i32) -> Self {
        let has = |bit: i32| p & bit != 0;
        Self {
            printing: has(PRINT),
            high_quality_printing: has(PRINT_HIGH_RES),
            modifying: has(MODIFY),
            copying: has(COPY),
            annotating: has(ANNOTATE),
            form_filling: has(FILL_FORMS),
            accessibility: has(ACCESSIBILITY),
            assembly: has(ASSEMBLE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionSpec {
    pub user_password: String,
    /// Defaults to the user password.
    #[serde(default)]
    pub owner_password: Option<String>,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl EncryptionSpec {
    pub fn new(user_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: None,
            permissions: PermissionSet::default(),
        }
    }

    pub fn with_owner_password(mut self, owner_password: impl Into<String>) -> Self {
        self.owner_password = Some(owner_password.into());
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn owner_password(&self) -> &str {
        match self.owner_password.as_deref() {
            Some(owner) if !owner.is_empty() => owner,
            _ => &self.user_password,
        }
    }
}

/// Serialize `doc` with password protection. The document itself is untouched.
pub fn protect(doc: &Document, spec: &EncryptionSpec) -> Result<Vec<u8>> {
    if spec.user_password.is_empty() {
        return Err(PdfSuiteError::MissingRequiredOption {
            operation: "protect-pdf".to_string(),
            option: "password".to_string(),
        });
    }
    codec::save(
        doc,
        &SaveOptions {
            encryption: Some(spec.clone()),
            compact: false,
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnlockOutcome {
    /// The input was encrypted and the password opened it.
    Decrypted,
    /// The input had no encryption; it passes through unchanged.
    NotEncrypted,
}

/// Open a protected file with `password`. Saving the returned document
/// without an [`EncryptionSpec`] yields the unlocked PDF.
///
/// Unencrypted input is accepted as a passthrough and reported as
/// [`UnlockOutcome::NotEncrypted`] rather than failing.
pub fn unlock(bytes: &[u8], password: &str) -> Result<(Document, UnlockOutcome)> {
    let doc = codec::load(
        bytes,
        &LoadOptions {
            password: Some(password.to_string()),
            ..Default::default()
        },
    )?;
    let outcome = if doc.security().encrypted {
        UnlockOutcome::Decrypted
    } else {
        UnlockOutcome::NotEncrypted
    };
    info!(?outcome, pages = doc.page_count(), "unlocked document");
    Ok((doc, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_permissions_restrict_editing() {
        let p = PermissionSet::default();
        assert!(p.printing && p.accessibility);
        assert!(!p.modifying && !p.copying && !p.annotating && !p.form_filling && !p.assembly);
    }

    #[test]
    fn test_p_value_layout() {
        let p = PermissionSet::default().to_p();
        assert_eq!(p & 0b11, 0);
        assert_eq!(p & 0xC0, 0xC0);
        assert_ne!(p & PRINT, 0);
        assert_ne!(p & PRINT_HIGH_RES, 0);
        assert_eq!(p & COPY, 0);
        assert!(p < 0, "upper reserved bits are set");
    }

    #[test]
    fn test_p_value_roundtrip() {
        for set in [PermissionSet::default(), PermissionSet::all()] {
            assert_eq!(PermissionSet::from_p(set.to_p()), set);
        }
        let nothing = PermissionSet::from_p(RESERVED);
        assert!(!nothing.printing && !nothing.accessibility);
    }

    #[test]
    fn test_owner_password_defaults_to_user() {
        let spec = EncryptionSpec::new("x");
        assert_eq!(spec.owner_password(), "x");
        assert_eq!(spec.clone().with_owner_password("").owner_password(), "x");
        assert_eq!(spec.with_owner_password("y").owner_password(), "y");
    }

    #[test]
    fn test_protect_requires_password() {
        let doc = Document::new();
        let err = protect(&doc, &EncryptionSpec::new("")).unwrap_err();
        assert!(matches!(err, PdfSuiteError::MissingRequiredOption { .. }));
    }

    #[test]
    fn test_permissions_deserialize_with_defaults() {
        let p: PermissionSet = serde_json::from_str(r#"{"copying": true}"#).unwrap();
        assert!(p.copying);
        assert!(p.printing);
        assert!(!p.modifying);
    }
}
