//! Parsed probe output for media information sessions.
//!
//! The probe is run with JSON output (`-print_format json`); the document is
//! mapped onto typed fields, and every property without a dedicated field is
//! kept in the `extra` maps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Container-level properties and the streams/chapters it holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaInformation {
    /// Input path or URL.
    pub filename: Option<String>,
    /// Short container format name(s).
    pub format_name: Option<String>,
    /// Descriptive container format name.
    pub format_long_name: Option<String>,
    /// Start time in seconds, as reported.
    pub start_time: Option<String>,
    /// Duration in seconds, as reported.
    pub duration: Option<String>,
    /// Size in bytes, as reported.
    pub size: Option<String>,
    /// Bitrate in bits per second, as reported.
    pub bit_rate: Option<String>,
    /// Container tags.
    pub tags: Map<String, Value>,
    /// Elementary streams.
    pub streams: Vec<StreamInformation>,
    /// Chapters.
    pub chapters: Vec<Chapter>,
    /// Remaining container properties.
    pub extra: Map<String, Value>,
}

/// One elementary stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamInformation {
    /// Stream index within the container.
    pub index: u32,
    /// `video`, `audio`, `subtitle`, `data`, ...
    pub codec_type: Option<String>,
    /// Short codec name.
    pub codec_name: Option<String>,
    /// Descriptive codec name.
    pub codec_long_name: Option<String>,
    /// Frame width for video streams.
    pub width: Option<u32>,
    /// Frame height for video streams.
    pub height: Option<u32>,
    /// Sample rate for audio streams, as reported.
    pub sample_rate: Option<String>,
    /// Channel count for audio streams.
    pub channels: Option<u32>,
    /// Bitrate, as reported.
    pub bit_rate: Option<String>,
    /// Stream tags.
    #[serde(default)]
    pub tags: Map<String, Value>,
    /// Remaining stream properties.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One chapter marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chapter {
    /// Chapter identifier.
    pub id: i64,
    /// Time base of `start`/`end`.
    pub time_base: Option<String>,
    /// Start in time-base units.
    pub start: Option<i64>,
    /// Start in seconds, as reported.
    pub start_time: Option<String>,
    /// End in time-base units.
    pub end: Option<i64>,
    /// End in seconds, as reported.
    pub end_time: Option<String>,
    /// Chapter tags.
    #[serde(default)]
    pub tags: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<StreamInformation>,
    #[serde(default)]
    chapters: Vec<Chapter>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    filename: Option<String>,
    format_name: Option<String>,
    format_long_name: Option<String>,
    start_time: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: Map<String, Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl MediaInformation {
    /// Parse the JSON document printed by the probe.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Executor` if `output` is not a probe JSON document.
    pub fn from_json(output: &str) -> Result<Self> {
        let document: ProbeDocument = serde_json::from_str(output)?;
        let format = document.format.unwrap_or_default();

        Ok(Self {
            filename: format.filename,
            format_name: format.format_name,
            format_long_name: format.format_long_name,
            start_time: format.start_time,
            duration: format.duration,
            size: format.size,
            bit_rate: format.bit_rate,
            tags: format.tags,
            streams: document.streams,
            chapters: document.chapters,
            extra: format.extra,
        })
    }

    /// Streams whose `codec_type` matches.
    pub fn streams_of_type<'a>(
        &'a self,
        codec_type: &'a str,
    ) -> impl Iterator<Item = &'a StreamInformation> + 'a {
        self.streams
            .iter()
            .filter(move |stream| stream.codec_type.as_deref() == Some(codec_type))
    }
}
