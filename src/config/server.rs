//! Listener, environment and browser-origin settings

use axum::http::HeaderValue;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

use super::error::ValidationError;

/// Where the WebSocket server binds and which browser origins may open it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to bind (IPv4 or IPv6 literal)
    pub host: String,

    pub port: u16,

    pub environment: Environment,

    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,

    /// Comma-separated origins allowed to open `/ws`; unset allows any
    pub cors_origins: Option<String>,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// Resolved CORS rule for the chat widget's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    AnyOrigin,
    Origins(Vec<HeaderValue>),
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        let ip: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidAddress(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Parses `cors_origins`.
    ///
    /// Each entry must be an `http://` or `https://` origin. A lone `*`
    /// means any origin and is refused in production.
    pub fn cors_policy(&self) -> Result<CorsPolicy, ValidationError> {
        let entries: Vec<&str> = self
            .cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect();

        if entries.is_empty() {
            return Ok(CorsPolicy::AnyOrigin);
        }

        if entries.contains(&"*") {
            if self.is_production() || entries.len() > 1 {
                return Err(ValidationError::InvalidOrigin("*".to_string()));
            }
            return Ok(CorsPolicy::AnyOrigin);
        }

        entries
            .into_iter()
            .map(|entry| {
                let origin = entry.trim_end_matches('/');
                let scheme_ok = origin.starts_with("http://") || origin.starts_with("https://");
                match HeaderValue::from_str(origin) {
                    Ok(value) if scheme_ok => Ok(value),
                    _ => Err(ValidationError::InvalidOrigin(entry.to_string())),
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(CorsPolicy::Origins)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.log_level.trim().is_empty() {
            return Err(ValidationError::MissingRequired("server.log_level"));
        }
        self.socket_addr()?;
        self.cors_policy()?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::Development,
            log_level: "info,lead_flow=debug,tower_http=info".to_string(),
            cors_origins: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_origins(origins: &str, environment: Environment) -> ServerConfig {
        ServerConfig {
            cors_origins: Some(origins.to_string()),
            environment,
            ..Default::default()
        }
    }

    #[test]
    fn binds_ipv6_literal() {
        let config = ServerConfig {
            host: "::1".to_string(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(config.socket_addr().unwrap().to_string(), "[::1]:9000");
    }

    #[test]
    fn hostname_is_not_a_bind_address() {
        let config = ServerConfig {
            host: "chat.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidAddress("chat.example.com".to_string()))
        );
    }

    #[test]
    fn unset_origins_allow_any() {
        assert_eq!(ServerConfig::default().cors_policy(), Ok(CorsPolicy::AnyOrigin));
    }

    #[test]
    fn widget_origins_are_parsed_and_normalised() {
        let config = with_origins(
            "https://shop.example.com/, http://localhost:5173,,",
            Environment::Staging,
        );

        assert_eq!(
            config.cors_policy(),
            Ok(CorsPolicy::Origins(vec![
                HeaderValue::from_static("https://shop.example.com"),
                HeaderValue::from_static("http://localhost:5173"),
            ]))
        );
    }

    #[test]
    fn origin_without_scheme_is_rejected() {
        let config = with_origins("shop.example.com", Environment::Development);
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidOrigin("shop.example.com".to_string()))
        );
    }

    #[test]
    fn wildcard_is_development_only() {
        let dev = with_origins("*", Environment::Development);
        assert_eq!(dev.cors_policy(), Ok(CorsPolicy::AnyOrigin));

        let prod = with_origins("*", Environment::Production);
        assert_eq!(
            prod.validate(),
            Err(ValidationError::InvalidOrigin("*".to_string()))
        );

        let mixed = with_origins("*, https://shop.example.com", Environment::Development);
        assert!(mixed.cors_policy().is_err());
    }

    #[test]
    fn blank_log_level_is_rejected() {
        let config = ServerConfig {
            log_level: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("server.log_level"))
        );
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));
    }
}
