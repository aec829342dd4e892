//! # Error Types Module
//!
//! Domain errors raised by the PDF layer, the processing guard, the batch
//! queue, the rate limiter and the wizard. Handlers turn them into localized
//! chat messages through [`user_message_key`](PdfError::user_message_key).

/// Errors from PDF operations
#[derive(Debug, Clone, PartialEq)]
pub enum PdfError {
    /// The document is encrypted and no password was supplied
    PasswordRequired,
    /// The supplied password does not open the document
    WrongPassword,
    /// Bytes could not be parsed as a PDF
    Load(String),
    /// Serializing the document failed
    Save(String),
    /// The removal would leave an empty document
    WouldRemoveAllPages,
    /// The user has no banner configured
    NoBanner,
    /// Banner image could not be decoded
    Image(String),
    /// Encryption failed
    Encrypt(String),
    /// A step exceeded its time budget
    Timeout(String),
    /// Blocking worker failed
    Worker(String),
}

impl std::fmt::Display for PdfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfError::PasswordRequired => write!(f, "Document is password protected"),
            PdfError::WrongPassword => write!(f, "Incorrect password"),
            PdfError::Load(msg) => write!(f, "Load error: {msg}"),
            PdfError::Save(msg) => write!(f, "Save error: {msg}"),
            PdfError::WouldRemoveAllPages => write!(f, "Cannot remove every page"),
            PdfError::NoBanner => write!(f, "No banner configured"),
            PdfError::Image(msg) => write!(f, "Image error: {msg}"),
            PdfError::Encrypt(msg) => write!(f, "Encryption error: {msg}"),
            PdfError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            PdfError::Worker(msg) => write!(f, "Worker error: {msg}"),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<lopdf::Error> for PdfError {
    fn from(err: lopdf::Error) -> Self {
        PdfError::Load(err.to_string())
    }
}

impl PdfError {
    /// Localization key describing the error to the user
    pub fn user_message_key(&self) -> &'static str {
        match self {
            PdfError::PasswordRequired => "error-password-required",
            PdfError::WrongPassword => "error-wrong-password",
            PdfError::WouldRemoveAllPages => "error-remove-all-pages",
            PdfError::NoBanner => "error-no-banner",
            PdfError::Image(_) => "error-banner-image",
            PdfError::Timeout(_) => "error-timeout",
            PdfError::Load(_) => "error-invalid-pdf",
            PdfError::Save(_) | PdfError::Encrypt(_) | PdfError::Worker(_) => "error-processing",
        }
    }
}

/// Processing guard refusal
#[derive(Debug, Clone, PartialEq)]
pub enum GuardError {
    /// Another operation already holds the flag
    Busy { source: String },
}

impl std::fmt::Display for GuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardError::Busy { source } => write!(f, "Another process is running ({source})"),
        }
    }
}

impl std::error::Error for GuardError {}

/// Batch queue errors
#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    /// Batch mode is not active for the user
    NotActive,
    /// The queue already holds the maximum number of files
    Full { max: usize },
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::NotActive => write!(f, "Batch mode is not active"),
            BatchError::Full { max } => write!(f, "Batch limit of {max} files reached"),
        }
    }
}

impl std::error::Error for BatchError {}

/// Rate limiter verdicts
#[derive(Debug, Clone, PartialEq)]
pub enum LimitError {
    /// Too many actions inside the sliding window
    RateLimited,
    /// The same command or message was seen very recently
    Duplicate,
}

impl std::fmt::Display for LimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitError::RateLimited => write!(f, "Rate limit exceeded"),
            LimitError::Duplicate => write!(f, "Duplicate request"),
        }
    }
}

impl std::error::Error for LimitError {}

/// Rejected wizard input; the wizard stays on the same stage
#[derive(Debug, Clone, PartialEq)]
pub enum WizardError {
    /// Page text contains characters other than digits, commas, dashes, spaces
    InvalidPageFormat,
    /// Page text parsed to nothing
    NoValidPages,
    /// Empty input where a value is required
    EmptyInput,
}

impl std::fmt::Display for WizardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WizardError::InvalidPageFormat => {
                write!(f, "Invalid format. Use numbers, commas and dashes only")
            }
            WizardError::NoValidPages => write!(f, "No valid pages found. Example: 1,3-5"),
            WizardError::EmptyInput => write!(f, "Input cannot be empty"),
        }
    }
}

impl std::error::Error for WizardError {}

impl WizardError {
    pub fn user_message_key(&self) -> &'static str {
        match self {
            WizardError::InvalidPageFormat => "error-invalid-page-format",
            WizardError::NoValidPages => "error-no-valid-pages",
            WizardError::EmptyInput => "error-empty-input",
        }
    }
}
