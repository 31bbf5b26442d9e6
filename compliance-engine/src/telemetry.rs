//! Tracing initialisation

use crate::config::LogConfig;
use crate::error::{ComplianceError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
/// A second call leaves the first subscriber in place and succeeds.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.filter),
    }
    .map_err(|e| ComplianceError::Config(format!("Invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        let config = LogConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&LogConfig { json: true, ..config }).is_ok());
    }

    #[test]
    fn test_bad_filter() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LogConfig {
            filter: "compliance_engine=notalevel".to_string(),
            json: false,
        };
        assert!(matches!(init_tracing(&config), Err(ComplianceError::Config(_))));
    }
}
