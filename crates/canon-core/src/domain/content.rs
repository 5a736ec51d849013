//! Content types and source-type codes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

use super::identifier::VersionedIdentifier;

/// Dissemination content types known to the record.
///
/// Serializes as its string value, also when used as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ContentType {
    Pdf,
    Targz,
    Json,
    Abs,
    Html,
    Dvi,
    Ps,
}

impl ContentType {
    pub fn mime_type(self) -> &'static str {
        match self {
            ContentType::Pdf => "application/pdf",
            ContentType::Targz => "application/gzip",
            ContentType::Json => "application/json",
            ContentType::Abs => "text/plain",
            ContentType::Html => "text/html",
            ContentType::Dvi => "application/x-dvi",
            ContentType::Ps => "application/postscript",
        }
    }

    /// Filename extension for this content type.
    pub fn ext(self) -> &'static str {
        match self {
            ContentType::Pdf => "pdf",
            ContentType::Targz => "tar.gz",
            ContentType::Json => "json",
            ContentType::Abs => "abs",
            ContentType::Html => "html",
            ContentType::Dvi => "dvi",
            ContentType::Ps => "ps.gz",
        }
    }

    /// String value used in serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Pdf => "pdf",
            ContentType::Targz => "targz",
            ContentType::Json => "json",
            ContentType::Abs => "abs",
            ContentType::Html => "html",
            ContentType::Dvi => "dvi",
            ContentType::Ps => "ps",
        }
    }

    const ALL: [ContentType; 7] = [
        ContentType::Pdf,
        ContentType::Targz,
        ContentType::Json,
        ContentType::Abs,
        ContentType::Html,
        ContentType::Dvi,
        ContentType::Ps,
    ];

    /// Infer a content type from a filename extension.
    pub fn from_filename(filename: &str) -> Result<Self, DomainError> {
        // `.ps.gz` must win over a bare `.gz` interpretation, so check the
        // longest extensions first.
        let mut candidates = Self::ALL;
        candidates.sort_by_key(|c| std::cmp::Reverse(c.ext().len()));
        candidates
            .into_iter()
            .find(|c| filename.ends_with(&format!(".{}", c.ext())))
            .ok_or_else(|| DomainError::UnknownContentType {
                value: filename.to_string(),
            })
    }

    pub fn from_mime_type(mime: &str) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|c| c.mime_type() == mime)
            .ok_or_else(|| DomainError::UnknownContentType {
                value: mime.to_string(),
            })
    }

    /// Parse a serialized value.
    pub fn from_value(value: &str) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == value)
            .ok_or_else(|| DomainError::UnknownContentType {
                value: value.to_string(),
            })
    }

    /// Make a filename for this content type based on an identifier.
    pub fn make_filename(self, identifier: &VersionedIdentifier) -> String {
        if identifier.arxiv_id.is_old_style() {
            let (yy, mm) = identifier.arxiv_id.yymm();
            format!(
                "{yy:02}{mm:02}{:03}v{}.{}",
                identifier.arxiv_id.incremental_part(),
                identifier.version,
                self.ext()
            )
        } else {
            format!("{identifier}.{}", self.ext())
        }
    }
}

impl From<ContentType> for String {
    fn from(content_type: ContentType) -> String {
        content_type.as_str().to_string()
    }
}

impl TryFrom<String> for ContentType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

/// Source file types, represented by single-character codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFileType {
    /// All files auto ignore. No paper available.
    Ignore,
    /// Source is encrypted and should not be made available.
    SourceEncrypted,
    /// Multi-file PS submission.
    PostscriptOnly,
    /// A TeX submission that must be processed with PDFlatex.
    PdfLatex,
    /// Multi-file HTML submission.
    Html,
    /// Submission includes ancillary files in the /anc directory.
    Ancillary,
    /// Submission has associated data in the DC pilot system.
    DcPilot,
    /// Submission in Microsoft DOCX (Office Open XML) format.
    Docx,
    /// Submission in Open Document Format.
    Odf,
    /// PDF-only with .tar.gz package (likely because of anc files).
    PdfOnly,
}

impl SourceFileType {
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'I' => Some(Self::Ignore),
            'S' => Some(Self::SourceEncrypted),
            'P' => Some(Self::PostscriptOnly),
            'D' => Some(Self::PdfLatex),
            'H' => Some(Self::Html),
            'A' => Some(Self::Ancillary),
            'B' => Some(Self::DcPilot),
            'X' => Some(Self::Docx),
            'O' => Some(Self::Odf),
            'F' => Some(Self::PdfOnly),
            _ => None,
        }
    }
}

/// Internal source-type code: a string of [`SourceFileType`] characters.
///
/// Unknown characters are preserved verbatim so that legacy codes survive a
/// round trip, but they carry no flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceType(String);

impl SourceType {
    pub fn new(code: impl Into<String>) -> Self {
        SourceType(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    fn has(&self, t: SourceFileType) -> bool {
        self.0
            .chars()
            .filter_map(SourceFileType::from_code)
            .any(|f| f == t)
    }

    pub fn has_docx(&self) -> bool {
        self.has(SourceFileType::Docx)
    }

    pub fn has_encrypted_source(&self) -> bool {
        self.has(SourceFileType::SourceEncrypted)
    }

    pub fn has_html(&self) -> bool {
        self.has(SourceFileType::Html)
    }

    pub fn has_ignore(&self) -> bool {
        self.has(SourceFileType::Ignore)
    }

    pub fn has_odf(&self) -> bool {
        self.has(SourceFileType::Odf)
    }

    pub fn has_pdf_only(&self) -> bool {
        self.has(SourceFileType::PdfOnly)
    }

    pub fn has_pdflatex(&self) -> bool {
        self.has(SourceFileType::PdfLatex)
    }

    pub fn has_ps_only(&self) -> bool {
        self.has(SourceFileType::PostscriptOnly)
    }

    /// Dissemination formats that can be derived from this source type.
    ///
    /// Does not include the source format itself, and does not enforce
    /// display rules.
    pub fn available_formats(&self) -> Vec<ContentType> {
        if self.has_ignore() && !self.has_encrypted_source() {
            vec![]
        } else if self.has_ps_only() {
            vec![ContentType::Pdf, ContentType::Ps]
        } else if self.has_pdflatex() || self.has_pdf_only() {
            vec![ContentType::Pdf]
        } else if self.has_html() {
            vec![ContentType::Html]
        } else if self.has_docx() || self.has_odf() {
            vec![ContentType::Pdf]
        } else {
            vec![ContentType::Pdf, ContentType::Ps, ContentType::Dvi]
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(SourceType(String::deserialize(deserializer)?))
    }
}
