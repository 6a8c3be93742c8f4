//! Error types for the pim-audit tool.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Directory API error: {0}")]
    Api(#[from] ApiError),

    #[error("Evidence error: {0}")]
    Evidence(#[from] EvidenceError),

    #[error("Ticketing error: {0}")]
    Ticket(#[from] TicketError),
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing/empty {0} in environment or .env")]
    MissingVar(&'static str),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Identity token acquisition errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token acquisition failed: {error}: {description}")]
    Rejected {
        error: String,
        description: String,
        correlation_id: Option<String>,
    },

    #[error("Token endpoint unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected token response: {0}")]
    InvalidResponse(String),
}

/// Directory (Microsoft Graph) API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Graph request failed (HTTP {status}) {code}: {message}")]
    Graph {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse API response: {0}")]
    ParseFailed(String),
}

/// Snapshot and CSV output errors.
#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// GitHub issue tracker errors.
#[derive(Error, Debug)]
pub enum TicketError {
    #[error("GitHub request failed (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to render issue body: {0}")]
    Render(#[from] serde_json::Error),
}

impl AppError {
    /// Returns a short operator-facing hint for the console.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Config(ConfigError::MissingVar(_)) => {
                "Set TENANT_ID, CLIENT_ID and CLIENT_SECRET in the environment or .env."
            }
            Self::Config(_) => "Check config.toml and the environment overrides.",
            Self::Auth(AuthError::Rejected { .. }) => {
                "Paste the secret *Value* (not its ID), verify TENANT_ID & CLIENT_ID, remove quotes/spaces."
            }
            Self::Auth(_) => "Could not reach the identity provider. Check your connection.",
            Self::Api(ApiError::Graph { status: 401, .. }) => {
                "The directory rejected the token. Check the app registration credentials."
            }
            Self::Api(ApiError::Graph { status: 403, .. }) => {
                "Grant RoleManagement.Read.Directory and User.Read.All (application) with admin consent."
            }
            Self::Api(_) => "Directory API request failed. No report was produced.",
            Self::Evidence(_) => "Failed to write evidence files. Check the output directory.",
            Self::Ticket(_) => "Failed to create a GitHub issue. Check token permissions.",
        }
    }

    /// Returns true for errors that stop the process before any output is produced.
    pub fn is_fatal_startup(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Auth(_))
    }
}

/// Cut `text` to at most `max` characters, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Render an error response body for the console: JSON when it parses, else the first 800 characters.
pub fn render_error_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => truncate(body, 800),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err = AppError::Config(ConfigError::MissingVar("TENANT_ID"));
        assert_eq!(
            err.user_message(),
            "Set TENANT_ID, CLIENT_ID and CLIENT_SECRET in the environment or .env."
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing/empty TENANT_ID in environment or .env"
        );

        let err = AppError::Api(ApiError::Graph {
            status: 403,
            code: "Authorization_RequestDenied".into(),
            message: "Insufficient privileges".into(),
        });
        assert!(err.user_message().contains("RoleManagement.Read.Directory"));
    }

    #[test]
    fn test_fatal_startup() {
        let err = AppError::Auth(AuthError::Rejected {
            error: "invalid_client".into(),
            description: "AADSTS7000215: Invalid client secret provided.".into(),
            correlation_id: None,
        });
        assert!(err.is_fatal_startup());

        let err = AppError::Api(ApiError::ParseFailed("bad".into()));
        assert!(!err.is_fatal_startup());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 800), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
        assert_eq!(truncate("ééé", 2), "éé…");
    }

    #[test]
    fn test_render_error_body() {
        assert_eq!(
            render_error_body(r#"{ "error": { "code": "BadRequest" } }"#),
            r#"{"error":{"code":"BadRequest"}}"#
        );

        let html = "x".repeat(1000);
        assert_eq!(render_error_body(&html).chars().count(), 801);
    }
}
