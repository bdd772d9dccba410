// src/config/validate.rs

use globset::Glob;

use crate::config::model::{OverrideFile, RawOverrideFile};
use crate::errors::{Result, TsrunError};

impl TryFrom<RawOverrideFile> for OverrideFile {
    type Error = TsrunError;

    fn try_from(raw: RawOverrideFile) -> std::result::Result<Self, Self::Error> {
        validate_override(&raw)?;
        Ok(OverrideFile::new_unchecked(raw.build, raw.watch))
    }
}

fn validate_override(raw: &RawOverrideFile) -> Result<()> {
    validate_programs(raw)?;
    validate_plugins(raw)?;
    validate_watch(raw)?;
    Ok(())
}

fn validate_programs(raw: &RawOverrideFile) -> Result<()> {
    let build = &raw.build;
    let programs = [
        ("compiler", &build.compiler),
        ("type_checker", &build.type_checker),
        ("runtime", &build.runtime),
        ("mode_variable", &build.mode_variable),
    ];

    for (key, value) in programs {
        if let Some(value) = value {
            if value.trim().is_empty() {
                return Err(TsrunError::ConfigError(format!(
                    "[build].{key} must not be empty"
                )));
            }
        }
    }
    Ok(())
}

fn validate_plugins(raw: &RawOverrideFile) -> Result<()> {
    for (idx, plugin) in raw.build.plugins.iter().enumerate() {
        if plugin.trim().is_empty() {
            return Err(TsrunError::ConfigError(format!(
                "[build].plugins[{idx}] must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_watch(raw: &RawOverrideFile) -> Result<()> {
    for pattern in raw.watch.ignore.iter() {
        Glob::new(pattern).map_err(|err| {
            TsrunError::ConfigError(format!(
                "[watch].ignore contains an invalid glob '{pattern}': {err}"
            ))
        })?;
    }

    if raw.watch.debounce_ms == Some(0) {
        return Err(TsrunError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
