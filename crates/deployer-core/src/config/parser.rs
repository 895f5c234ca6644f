//! TOML parser with helpful error messages

use std::path::Path;

use super::ConfigError;
use super::schema::DeployerConfig;

/// Parse deployer.toml with detailed error messages
pub fn parse_config(path: &Path) -> Result<DeployerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&content)
}

/// Parse deployer.toml content from string
pub fn parse_config_str(content: &str) -> Result<DeployerConfig, ConfigError> {
    let config: DeployerConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    validate_config(&config)?;

    Ok(config)
}

/// Enhance TOML parsing errors with the surrounding lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> ConfigError {
    let error_msg = error.to_string();

    let line_hint = error
        .span()
        .map(|span| content[..span.start.min(content.len())].matches('\n').count() + 1);

    match line_hint {
        Some(line_num) => {
            let context = get_line_context(content, line_num);
            ConfigError::Parse(format!(
                "TOML parsing error at line {}:\n{}\n\nError: {}",
                line_num, context, error_msg
            ))
        }
        None => ConfigError::Parse(format!("TOML parsing error: {}", error_msg)),
    }
}

fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validate a parsed configuration.
///
/// Shape errors (unknown keys, wrong value types, unsupported `api` values,
/// uncompilable branch patterns) are already rejected while deserializing.
pub fn validate_config(config: &DeployerConfig) -> Result<(), ConfigError> {
    let providers = config.configured_providers();
    if providers.is_empty() {
        return Err(ConfigError::NoProvider);
    }

    for kind in &providers {
        let Some(settings) = config.provider(*kind) else {
            continue;
        };
        if settings.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                provider: *kind,
                field: "base_url",
            });
        }
        if settings.deploy_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyField {
                provider: *kind,
                field: "deploy_path",
            });
        }
    }

    if let Some(github) = &config.providers.github {
        if github.access_token.is_none() {
            tracing::info!(
                "ReleaseOnly mode not supported for private repositories, github 'access_token' is missing."
            );
        }
        if github.username.is_none() {
            tracing::info!(
                "ReleaseOnly mode not supported for private repositories, github 'username' is missing."
            );
        }
        if github.hmac_secret.is_none() {
            tracing::info!(
                "Signature of github webhook requests can't be validated, 'hmac_secret' is missing."
            );
        }
    }
    if let Some(gitlab) = &config.providers.gitlab
        && gitlab.secret.is_none()
    {
        tracing::info!("Gitlab webhook requests can't be validated, 'secret' is missing.");
    }

    if let Some(protection) = &config.protection {
        let has_user = protection.username.is_some() || protection.password.is_some();
        if has_user && protection.basic_credentials().is_none() {
            tracing::warn!("Incomplete protection credentials, basic auth disabled.");
        }
        if protection.cookie.is_some() && protection.session_cookie().is_none() {
            tracing::warn!("Incomplete protection cookie configuration, cookie auth disabled.");
        }
    }

    if let Some(default_api) = config.default_api
        && !providers.contains(&default_api)
    {
        return Err(ConfigError::UnconfiguredDefaultApi(default_api));
    }

    for (name, repo) in &config.repos {
        if let Some(api) = repo.api
            && !providers.contains(&api)
        {
            return Err(ConfigError::UnconfiguredApi {
                repo: name.clone(),
                api,
            });
        }
    }

    if !config.repos.is_empty() {
        let names: Vec<&str> = config.repos.keys().map(String::as_str).collect();
        tracing::info!("Detected repository configurations: {}", names.join(", "));
    }

    Ok(())
}
