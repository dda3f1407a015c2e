use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::file_format::SerdeFormat;
use crate::normalize_string::NormalizeString;

#[macro_use]
pub mod macros;
pub mod file_format;
pub mod float_ext;
pub mod log_setup;
pub mod normalize_string;

pub const EPSILON: f64 = 1e-6;

#[derive(Debug, thiserror::Error)]
pub enum SerdeFormatError {
    #[error("YAML serialization failed")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),
}

pub type SerdeFormatResult<T> = Result<T, SerdeFormatError>;

pub fn is_debug() -> bool {
    cfg!(debug_assertions)
}

pub fn serialize<T: Serialize>(value: &T, format: SerdeFormat) -> SerdeFormatResult<String> {
    let text = match format {
        SerdeFormat::Yaml => serde_yml::to_string(value)?,
        SerdeFormat::Json => serde_json::to_string_pretty(value)?,
    };

    Ok(text.normalize())
}

pub fn deserialize<T: DeserializeOwned>(
    serialized: &str,
    format: SerdeFormat,
) -> SerdeFormatResult<T> {
    match format {
        SerdeFormat::Yaml => Ok(serde_yml::from_str(serialized)?),
        SerdeFormat::Json => Ok(serde_json::from_str(serialized)?),
    }
}

/// Reads a file and deserializes it, picking the format from the extension.
pub fn read_file<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let format = SerdeFormat::from_file_name(path)?;
    let text = std::fs::read_to_string(path)?;

    Ok(deserialize(&text, format)?)
}

pub fn write_file<T: Serialize>(path: &str, value: &T) -> anyhow::Result<()> {
    let format = SerdeFormat::from_file_name(path)?;
    let text = serialize(value, format)?;
    std::fs::write(path, text)?;

    Ok(())
}
