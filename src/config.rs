use std::time::Duration;

use crate::domains::export::types::ExportError;

pub const ENV_EXPORT_DIR: &str = "MOVEOPS_EXPORT_DIR";
pub const ENV_PDF_ASSEMBLY_DELAY_MS: &str = "MOVEOPS_PDF_ASSEMBLY_DELAY_MS";
pub const ENV_EXPORT_TITLE: &str = "MOVEOPS_EXPORT_TITLE";

/// Runtime settings for the export pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Directory the local delivery backend saves downloads into.
    pub output_dir: String,
    pub pdf_assembly_delay_ms: u64,
    /// Title used by the document format when the host supplies none.
    pub default_title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "./exports".to_string(),
            pdf_assembly_delay_ms: 500,
            default_title: "Data Export".to_string(),
        }
    }
}

impl ExportConfig {
    /// Load from the process environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ExportError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(dir) = value(ENV_EXPORT_DIR) {
            config.output_dir = dir;
        }

        if let Some(delay) = value(ENV_PDF_ASSEMBLY_DELAY_MS) {
            config.pdf_assembly_delay_ms = delay.parse().map_err(|_| {
                ExportError::InvalidConfig(format!("{} must be a whole number of milliseconds, got '{}'", ENV_PDF_ASSEMBLY_DELAY_MS, delay))
            })?;
        }

        if let Some(title) = value(ENV_EXPORT_TITLE) {
            config.default_title = title;
        }

        Ok(config)
    }

    pub fn pdf_assembly_delay(&self) -> Duration {
        Duration::from_millis(self.pdf_assembly_delay_ms)
    }
}
