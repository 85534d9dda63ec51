use super::MediaError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fs;
use std::path::{Path, PathBuf};

pub const FALLBACK_TONE_LABEL: &str = "built-in fallback tone";

const FALLBACK_SAMPLE_RATE: u32 = 8_000;
const FALLBACK_DURATION_MS: u32 = 400;
const FALLBACK_FREQUENCY_HZ: f32 = 660.0;
const FALLBACK_FADE_MS: u32 = 40;
const FALLBACK_AMPLITUDE: f32 = 0.35;

/// A resolved media reference.
///
/// `mediaRef`/`audioRef` strings from the catalog are opaque locators: embedded
/// `data:` URIs, local paths (relative ones are joined onto the media directory)
/// or remote URLs, which this host cannot fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    File(PathBuf),
    Embedded { label: String, bytes: Vec<u8> },
    Remote(String),
}

impl MediaSource {
    pub fn resolve(media_ref: &str, media_dir: Option<&Path>) -> Result<Self, MediaError> {
        let trimmed = media_ref.trim();
        if trimmed.is_empty() {
            return Err(MediaError::Empty);
        }

        if let Some(rest) = trimmed.strip_prefix("data:") {
            return decode_data_uri(rest);
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Remote(trimmed.to_string()));
        }

        let raw = trimmed.strip_prefix("file://").unwrap_or(trimmed);
        let path = PathBuf::from(raw);
        let path = match media_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        };
        Ok(Self::File(path))
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, MediaError> {
        match self {
            Self::File(path) => fs::read(path).map_err(|source| MediaError::Io {
                path: path.clone(),
                source,
            }),
            Self::Embedded { bytes, .. } => Ok(bytes.clone()),
            Self::Remote(url) => Err(MediaError::Unsupported(url.clone())),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Embedded { label, .. } => label.clone(),
            Self::Remote(url) => url.clone(),
        }
    }
}

fn decode_data_uri(rest: &str) -> Result<MediaSource, MediaError> {
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(MediaError::InvalidDataUri(String::from("missing ',' separator")));
    };
    let Some(mime) = header.strip_suffix(";base64") else {
        return Err(MediaError::InvalidDataUri(format!(
            "only base64 payloads are supported ({header})"
        )));
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| MediaError::InvalidDataUri(err.to_string()))?;
    let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
    Ok(MediaSource::Embedded {
        label: format!("embedded {mime}"),
        bytes,
    })
}

/// The clip every player falls back to when its own sound cannot be used.
/// Synthesized in memory, so it is available with no files and no network.
pub fn fallback_tone() -> MediaSource {
    MediaSource::Embedded {
        label: String::from(FALLBACK_TONE_LABEL),
        bytes: fallback_tone_wav(),
    }
}

pub fn fallback_tone_data_uri() -> String {
    format!(
        "data:audio/wav;base64,{}",
        STANDARD.encode(fallback_tone_wav())
    )
}

/// Short mono 16-bit PCM sine blip with linear fades at both ends.
pub fn fallback_tone_wav() -> Vec<u8> {
    let total_samples = FALLBACK_SAMPLE_RATE * FALLBACK_DURATION_MS / 1_000;
    let fade_samples = (FALLBACK_SAMPLE_RATE * FALLBACK_FADE_MS / 1_000).max(1);

    let samples = (0..total_samples).map(|n| {
        let t = n as f32 / FALLBACK_SAMPLE_RATE as f32;
        let from_edge = n.min(total_samples - 1 - n);
        let envelope = (from_edge as f32 / fade_samples as f32).min(1.0);
        let value = (t * FALLBACK_FREQUENCY_HZ * std::f32::consts::TAU).sin()
            * FALLBACK_AMPLITUDE
            * envelope;
        (value * f32::from(i16::MAX)) as i16
    });

    pcm16_mono_wav(FALLBACK_SAMPLE_RATE, samples)
}

fn pcm16_mono_wav(sample_rate: u32, samples: impl ExactSizeIterator<Item = i16>) -> Vec<u8> {
    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let bytes_per_sample = u32::from(bits_per_sample / 8);
    let data_size = samples.len() as u32 * u32::from(channels) * bytes_per_sample;
    let byte_rate = sample_rate * u32::from(channels) * bytes_per_sample;
    let block_align = channels * (bits_per_sample / 8);

    let mut bytes = Vec::with_capacity((44 + data_size) as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
