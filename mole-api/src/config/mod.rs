use secrecy::Secret;
use service_core::config::{self as core_config, get_env, get_optional_env, parse_env};
use service_core::error::AppError;
use std::path::PathBuf;

use crate::services::KeySource;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub keys: KeyConfig,
    pub identity: IdentityConfig,
    pub storage: StorageConfig,
    pub push: PushConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct KeyConfig {
    pub source: Option<KeySource>,
    /// Additional JWK appended to the loaded set.
    pub extra_jwk: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub region: String,
    pub user_pool_id: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub region: String,
    pub bucket: String,
    pub upload_prefix: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub enabled: bool,
    pub fcm_project_id: String,
    pub fcm_access_token: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub allowed_origins: Vec<String>,
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let environment: Environment = get_env("ENVIRONMENT", Some("dev"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let key_source = match (
            get_optional_env("JWKS_PATH"),
            get_optional_env("JWKS_JSON"),
            get_optional_env("JWKS_URL"),
        ) {
            (Some(path), _, _) => Some(KeySource::File(PathBuf::from(path))),
            (None, Some(json), _) => Some(KeySource::Inline(json)),
            (None, None, Some(url)) => Some(KeySource::Url(url)),
            (None, None, None) => None,
        };

        let aws_region = get_env("AWS_REGION", Some("ap-southeast-2"), false)?;

        let config = ApiConfig {
            common,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("mole-api"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env(
                    "DATABASE_MAX_CONNECTIONS",
                    &get_env("DATABASE_MAX_CONNECTIONS", Some("10"), false)?,
                )?,
                min_connections: parse_env(
                    "DATABASE_MIN_CONNECTIONS",
                    &get_env("DATABASE_MIN_CONNECTIONS", Some("1"), false)?,
                )?,
            },
            keys: KeyConfig {
                source: key_source,
                extra_jwk: get_optional_env("EXTRA_JWK_JSON"),
            },
            identity: IdentityConfig {
                region: get_env("COGNITO_REGION", Some(&aws_region), false)?,
                user_pool_id: get_env("COGNITO_USER_POOL_ID", Some(""), is_prod)?,
                endpoint: get_optional_env("COGNITO_ENDPOINT"),
            },
            storage: StorageConfig {
                region: aws_region.clone(),
                bucket: get_env("PHOTOS_BUCKET", Some("molepatrol-photos"), false)?,
                upload_prefix: get_env("UPLOAD_PREFIX", Some("private"), false)?,
                endpoint: get_optional_env("S3_ENDPOINT"),
            },
            push: PushConfig {
                enabled: parse_env("PUSH_ENABLED", &get_env("PUSH_ENABLED", Some("false"), false)?)?,
                fcm_project_id: get_optional_env("FCM_PROJECT_ID").unwrap_or_default(),
                fcm_access_token: Secret::new(get_optional_env("FCM_ACCESS_TOKEN").unwrap_or_default()),
            },
            http: HttpConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("*"), false)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                request_timeout_seconds: parse_env(
                    "REQUEST_TIMEOUT_SECONDS",
                    &get_env("REQUEST_TIMEOUT_SECONDS", Some("30"), false)?,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.keys.source.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "One of JWKS_PATH, JWKS_JSON or JWKS_URL must be set"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS exceeds DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.http.request_timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REQUEST_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.push.enabled && self.push.fcm_project_id.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "FCM_PROJECT_ID is required when PUSH_ENABLED is set"
            )));
        }

        if self.environment == Environment::Prod {
            if self.identity.user_pool_id.is_empty() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "COGNITO_USER_POOL_ID is required in production"
                )));
            }
            if self.http.allowed_origins.iter().any(|o| o == "*") {
                tracing::warn!("Wildcard CORS origin configured in production");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            common: core_config::Config { port: 8080 },
            environment: Environment::Dev,
            service_name: "mole-api".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://localhost/mole".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            keys: KeyConfig {
                source: Some(KeySource::Inline(r#"{"keys":[]}"#.to_string())),
                extra_jwk: None,
            },
            identity: IdentityConfig {
                region: "ap-southeast-2".to_string(),
                user_pool_id: String::new(),
                endpoint: None,
            },
            storage: StorageConfig {
                region: "ap-southeast-2".to_string(),
                bucket: "molepatrol-photos".to_string(),
                upload_prefix: "private".to_string(),
                endpoint: None,
            },
            push: PushConfig {
                enabled: false,
                fcm_project_id: String::new(),
                fcm_access_token: Secret::new(String::new()),
            },
            http: HttpConfig {
                allowed_origins: vec!["*".to_string()],
                request_timeout_seconds: 30,
            },
        }
    }

    #[test]
    fn requires_a_key_source() {
        assert!(config().validate().is_ok());

        let mut missing = config();
        missing.keys.source = None;
        assert!(missing.validate().is_err());
    }

    #[test]
    fn production_requires_a_user_pool() {
        let mut prod = config();
        prod.environment = Environment::Prod;
        assert!(prod.validate().is_err());

        prod.identity.user_pool_id = "ap-southeast-2_pool".to_string();
        assert!(prod.validate().is_ok());
    }

    #[test]
    fn push_needs_a_project() {
        let mut push = config();
        push.push.enabled = true;
        assert!(push.validate().is_err());
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
