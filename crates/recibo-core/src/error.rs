//! Error types for the recibo-core library.
//!
//! `Display` output is technical and meant for logs. Text shown to the
//! person reviewing a document comes from `user_message()`.

use recibo_llm::LlmError;
use thiserror::Error;

/// Main error type for the recibo library.
#[derive(Error, Debug)]
pub enum ReciboError {
    /// PDF text extraction error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// LLM interpretation error.
    #[error("interpretation error: {0}")]
    Interpret(#[from] InterpretError),

    /// Pipeline outcome error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Rejected edit of session data.
    #[error("edit error: {0}")]
    Edit(#[from] EditError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ReciboError {
    /// Localized message suitable for the end user.
    pub fn user_message(&self) -> String {
        match self {
            ReciboError::Pdf(e) => e.user_message().to_string(),
            ReciboError::Interpret(e) => e.user_message().to_string(),
            ReciboError::Pipeline(e) => e.user_message().to_string(),
            ReciboError::Edit(e) => e.user_message().to_string(),
            ReciboError::Io(e) => format!("Error de lectura: {}", e),
            ReciboError::Config(msg) => format!("Error de configuración: {}", msg),
        }
    }
}

/// Errors related to PDF text extraction.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// The page carries no selectable text.
    #[error("no selectable text found")]
    NoText,
}

impl PdfError {
    pub fn user_message(&self) -> &'static str {
        "No se pudo extraer texto del documento. Verifique que el PDF no esté protegido y que \
         contenga texto seleccionable, o seleccione manualmente la zona a procesar."
    }
}

/// Errors raised while interpreting text through an LLM.
#[derive(Error, Debug)]
pub enum InterpretError {
    /// Text is blank or too long to send.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The provider call failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The provider answered with text that holds no usable JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A detail entry is not a JSON object.
    #[error("detail item {index} is invalid: {reason}")]
    InvalidDetail { index: usize, reason: String },

    /// Validation left no detail items.
    #[error("no usable detail items in response")]
    EmptyResult,

    /// No chunk of the details section produced items.
    #[error("no details found in document")]
    NoDetails,
}

impl InterpretError {
    /// Localized message suitable for the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            InterpretError::InvalidInput(_) => {
                "El texto del documento está vacío o es demasiado extenso para procesarlo."
            }
            InterpretError::Llm(LlmError::Auth(_)) => {
                "Clave de API inválida. Por favor, verifique su configuración."
            }
            InterpretError::Llm(LlmError::RateLimited(_)) => {
                "Se excedió el límite de la API. Por favor, intente más tarde."
            }
            InterpretError::Llm(LlmError::Upstream(_)) => {
                "Error interno del servidor de IA. Por favor, intente más tarde."
            }
            InterpretError::Llm(LlmError::Network(_)) | InterpretError::Llm(LlmError::Timeout(_)) => {
                "No se pudo conectar al servicio de IA. Por favor, verifique su conexión a internet."
            }
            InterpretError::MalformedResponse(_) | InterpretError::InvalidDetail { .. } => {
                "La respuesta del servicio de IA no tiene un formato válido. Intente usar la \
                 selección manual de zonas."
            }
            _ => "Error al procesar el documento. Por favor, intente usar la selección manual de zonas.",
        }
    }
}

/// Terminal outcomes of the interpretation pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Text extraction produced nothing to interpret.
    #[error("no text could be extracted")]
    NoTextExtracted,

    /// Neither the LLM nor the heuristics found a header name or detail items.
    #[error("no header or detail data could be extracted")]
    NothingExtracted,

    /// Zone processing is switched off in the feature configuration.
    #[error("zone selection is disabled")]
    ZoneSelectionDisabled,
}

impl PipelineError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::NoTextExtracted => {
                "No se pudo extraer texto del documento. Intente seleccionar manualmente la zona a procesar."
            }
            PipelineError::NothingExtracted => {
                "No se pudo extraer información del documento. Por favor, utilice la selección \
                 manual de zonas para indicar el encabezado y los detalles."
            }
            PipelineError::ZoneSelectionDisabled => "La selección manual de zonas está deshabilitada.",
        }
    }
}

/// Rejected edit commands.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    /// No item exists at the given position.
    #[error("item index {index} out of range ({len} items)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Editing is switched off in the feature configuration.
    #[error("data editing is disabled")]
    EditingDisabled,
}

impl EditError {
    pub fn user_message(&self) -> &'static str {
        match self {
            EditError::IndexOutOfRange { .. } => "El elemento seleccionado no existe.",
            EditError::EditingDisabled => "La edición de datos está deshabilitada.",
        }
    }
}

/// Result type for the recibo library.
pub type Result<T> = std::result::Result<T, ReciboError>;
