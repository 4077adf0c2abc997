use serde::Serialize;

/// Extension-wide error type. Every fallible action returns `Result<T, ExtensionError>`.
/// Serializes as `{ error, kind }` so the UI layer can render structured messages.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// No target parameter has been selected yet.
    #[error("Please configure the extension by selecting a parameter first.")]
    ConfigurationMissing,

    /// The stored parameter id no longer matches any dashboard parameter.
    #[error("The configured parameter was not found. Please reconfigure the extension.")]
    ParameterNotFound { id: String },

    /// Bad form input or license key. Shown inline.
    #[error("{0}")]
    Validation(String),

    /// A host call was rejected. The host's message is kept verbatim.
    #[error("{0}")]
    HostOperationFailed(String),

    #[error("Failed to initialize extension: {0}")]
    HostInitialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ExtensionError {
    pub(crate) fn host(message: impl Into<String>) -> Self {
        Self::HostOperationFailed(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short machine-readable kind, also used as the serialized `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing => "configuration_missing",
            Self::ParameterNotFound { .. } => "parameter_not_found",
            Self::Validation(_) => "validation",
            Self::HostOperationFailed(_) => "host_operation_failed",
            Self::HostInitialization(_) => "host_initialization",
            Self::Io(_) => "io",
            Self::Serde(_) => "serde",
        }
    }

    /// Initialization failures leave no usable UI and must be shown as a blocking alert.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::HostInitialization(_))
    }
}

impl Serialize for ExtensionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ExtensionError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field("kind", self.kind())?;
        s.end()
    }
}
