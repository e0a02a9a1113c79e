//! Provider-specific error types.
//!
//! Structured errors for the provider layer, so the lifecycle and the CLI
//! can attribute a failure to the phase and provider it came from.

use thiserror::Error;

/// Errors raised by provider plugins and the registry.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credential validation failed (bad API key, expired token, etc.)
    #[error("Authentication failed for {provider}: {message}")]
    Authentication { provider: String, message: String },

    /// The configured provider name does not match any registered plugin
    #[error("Unknown provider: {name}. Supported providers: {supported:?}")]
    UnknownProvider {
        name: String,
        supported: Vec<String>,
    },

    /// The plugin does not implement this optional capability
    #[error("Not supported: {feature}")]
    NotSupported { feature: String },

    /// The target application identifier is missing or rejected
    #[error("Invalid application {app}: {message}")]
    InvalidApp { app: String, message: String },

    /// Platform API returned an error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Generic plugin error for edge cases
    #[error("{message}")]
    Other { message: String },
}

impl ProviderError {
    /// Create an authentication error
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authentication {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a not-supported error
    pub fn not_supported(feature: impl Into<String>) -> Self {
        Self::NotSupported {
            feature: feature.into(),
        }
    }

    /// Create an invalid-application error
    pub fn invalid_app(app: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidApp {
            app: app.into(),
            message: message.into(),
        }
    }

    /// Create an API error from status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a generic plugin error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
