//! Error types for the scene compiler

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    #[error("Node '{name}' ({id}) is not a component, instance or variant set")]
    NotAComponent { id: String, name: String },

    #[error("Extraction error in '{component}': {message}")]
    Extraction { component: String, message: String },

    #[error("Code generation error: {message}")]
    CodeGen { message: String },

    #[error("Cached bundle for {id} could not be decoded: {source}")]
    CacheDecode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cache write failed for {id}: {message}")]
    CacheWrite { id: String, message: String },

    #[error("Asset error for node {id}: {message}")]
    Asset { id: String, message: String },

    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn extraction(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn asset(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Asset {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Whether this error only means "recompute", never "abort".
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::CacheDecode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CompilerError::extraction("Button", "variant set has no members");
        assert_eq!(
            err.to_string(),
            "Extraction error in 'Button': variant set has no members"
        );

        let err = CompilerError::precondition("Generate a theme before importing icons");
        assert!(err.to_string().contains("Generate a theme"));
    }

    #[test]
    fn test_cache_decode_is_miss() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = CompilerError::CacheDecode {
            id: "1:2".to_string(),
            source,
        };
        assert!(err.is_cache_miss());
        assert!(!CompilerError::node_not_found("1:2").is_cache_miss());
    }
}
