use serde::{Deserialize, Serialize};

use quickship_core::ValueObject;

/// Inventory source a quantity is drawn from.
///
/// `Unmatched` is the fallback bucket: quantity that could not be matched to
/// any real source. It is a variant, never a magic string, so a real source
/// that happens to be named like the fallback code stays a real source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCode {
    Real(String),
    Unmatched,
}

impl SourceCode {
    /// Code used when the fallback bucket has to be rendered as text.
    pub const UNMATCHED_CODE: &'static str = "no_source";

    pub fn real(code: impl Into<String>) -> Self {
        Self::Real(code.into())
    }

    pub fn is_unmatched(&self) -> bool {
        matches!(self, SourceCode::Unmatched)
    }

    pub fn as_real(&self) -> Option<&str> {
        match self {
            SourceCode::Real(code) => Some(code),
            SourceCode::Unmatched => None,
        }
    }

    /// Textual code (the fallback bucket renders as [`Self::UNMATCHED_CODE`]).
    pub fn code(&self) -> &str {
        match self {
            SourceCode::Real(code) => code,
            SourceCode::Unmatched => Self::UNMATCHED_CODE,
        }
    }
}

impl ValueObject for SourceCode {}

impl core::fmt::Display for SourceCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}
