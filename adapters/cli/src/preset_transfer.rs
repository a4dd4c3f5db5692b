use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use cave_core::{ParameterSet, RefinementStep};
use serde::{Deserialize, Serialize};

const PRESET_DOMAIN: &str = "cave";
const PRESET_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded preset payload.
pub(crate) const PRESET_HEADER: &str = "cave:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Encodes a parameter set into a single-line string suitable for sharing.
pub(crate) fn encode(params: &ParameterSet) -> Result<String, PresetTransferError> {
    let payload = SerializablePreset::from(params);
    let json = serde_json::to_vec(&payload).map_err(PresetTransferError::InvalidPayload)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!(
        "{PRESET_HEADER}:{}x{}:{encoded}",
        params.width, params.height
    ))
}

/// Decodes a parameter set from its transfer string.
pub(crate) fn decode(value: &str) -> Result<ParameterSet, PresetTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PresetTransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(PresetTransferError::MissingPrefix)?;
    let version = parts.next().ok_or(PresetTransferError::MissingVersion)?;
    let dimensions = parts.next().ok_or(PresetTransferError::MissingDimensions)?;
    let payload = parts.next().ok_or(PresetTransferError::MissingPayload)?;

    if domain != PRESET_DOMAIN {
        return Err(PresetTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != PRESET_VERSION {
        return Err(PresetTransferError::UnsupportedVersion(version.to_owned()));
    }

    let (width, height) = parse_dimensions(dimensions)?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(PresetTransferError::InvalidEncoding)?;
    let decoded: SerializablePreset =
        serde_json::from_slice(&bytes).map_err(PresetTransferError::InvalidPayload)?;

    Ok(decoded.into_params(width, height))
}

/// Every parameter except the dimensions, which travel in the header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct SerializablePreset {
    seed: i64,
    wall_height: f32,
    fill_density: f32,
    refinement_steps: Vec<RefinementStep>,
    min_room_area: u32,
    min_wall_area: u32,
}

impl From<&ParameterSet> for SerializablePreset {
    fn from(params: &ParameterSet) -> Self {
        Self {
            seed: params.seed,
            wall_height: params.wall_height,
            fill_density: params.fill_density,
            refinement_steps: params.refinement_steps.clone(),
            min_room_area: params.min_room_area,
            min_wall_area: params.min_wall_area,
        }
    }
}

impl SerializablePreset {
    fn into_params(self, width: u32, height: u32) -> ParameterSet {
        ParameterSet {
            seed: self.seed,
            width,
            height,
            wall_height: self.wall_height,
            fill_density: self.fill_density,
            refinement_steps: self.refinement_steps,
            min_room_area: self.min_room_area,
            min_wall_area: self.min_wall_area,
        }
    }
}

/// Errors that can occur while encoding or decoding preset transfer strings.
#[derive(Debug)]
pub(crate) enum PresetTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded preset.
    MissingPrefix,
    /// The encoded preset did not contain a version segment.
    MissingVersion,
    /// The encoded preset did not include grid dimensions.
    MissingDimensions,
    /// The encoded preset did not include the payload segment.
    MissingPayload,
    /// The encoded preset used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded preset used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed from the encoded preset.
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload could not be serialised or deserialised.
    InvalidPayload(serde_json::Error),
}

impl fmt::Display for PresetTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "preset string was empty"),
            Self::MissingPrefix => write!(f, "preset string is missing the prefix"),
            Self::MissingVersion => write!(f, "preset string is missing the version"),
            Self::MissingDimensions => write!(f, "preset string is missing the grid dimensions"),
            Self::MissingPayload => write!(f, "preset string is missing the payload"),
            Self::InvalidPrefix(prefix) => write!(f, "preset prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "preset version '{version}' is not supported")
            }
            Self::InvalidDimensions(dimensions) => {
                write!(f, "could not parse grid dimensions '{dimensions}'")
            }
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode preset payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not parse preset payload: {error}")
            }
        }
    }
}

impl Error for PresetTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), PresetTransferError> {
    let (width, height) = dimensions
        .split_once(['x', 'X'])
        .ok_or_else(|| PresetTransferError::InvalidDimensions(dimensions.to_owned()))?;

    let width = width
        .trim()
        .parse::<u32>()
        .map_err(|_| PresetTransferError::InvalidDimensions(dimensions.to_owned()))?;
    let height = height
        .trim()
        .parse::<u32>()
        .map_err(|_| PresetTransferError::InvalidDimensions(dimensions.to_owned()))?;

    if width == 0 || height == 0 {
        return Err(PresetTransferError::InvalidDimensions(
            dimensions.to_owned(),
        ));
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_survives_transfer() {
        let params = ParameterSet::default();

        let encoded = encode(&params).expect("preset encodes");
        assert!(encoded.starts_with(&format!("{PRESET_HEADER}:128x128:")));

        let decoded = decode(&encoded).expect("preset decodes");
        assert_eq!(params, decoded);
    }

    #[test]
    fn subdividing_preset_survives_transfer() {
        let step = RefinementStep::new(4, 3, 5);
        let params = ParameterSet {
            seed: -9_001,
            width: 40,
            height: 24,
            fill_density: 0.42,
            refinement_steps: vec![step, step.subdivided()],
            min_room_area: 30,
            ..ParameterSet::default()
        };

        let encoded = encode(&params).expect("preset encodes");
        assert!(encoded.starts_with(&format!("{PRESET_HEADER}:40x24:")));

        let decoded = decode(&format!("  {encoded}\n")).expect("preset decodes");
        assert_eq!(params, decoded);
    }

    #[test]
    fn malformed_strings_are_rejected() {
        assert!(matches!(decode("   "), Err(PresetTransferError::EmptyPayload)));
        assert!(matches!(
            decode("dungeon:v1:4x4:e30"),
            Err(PresetTransferError::InvalidPrefix(prefix)) if prefix == "dungeon"
        ));
        assert!(matches!(
            decode("cave:v2:4x4:e30"),
            Err(PresetTransferError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            decode("cave:v1:0x4:e30"),
            Err(PresetTransferError::InvalidDimensions(_))
        ));
        assert!(matches!(
            decode("cave:v1:4x4"),
            Err(PresetTransferError::MissingPayload)
        ));
        assert!(matches!(
            decode("cave:v1:4x4:!!!"),
            Err(PresetTransferError::InvalidEncoding(_))
        ));
    }
}
