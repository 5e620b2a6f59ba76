use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EncoderError, Result};

/// One container/codec combination the streaming recorder may produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCandidate {
    /// File extension of the container, without the dot
    pub extension: String,

    /// MIME type including the codecs parameter
    pub mime_type: String,

    /// ffmpeg video encoder name
    pub video_encoder: String,

    /// ffmpeg audio encoder name, if the format carries an audio track
    pub audio_encoder: Option<String>,

    /// ffmpeg muxer name
    pub muxer: String,
}

impl FormatCandidate {
    pub fn new(
        extension: &str,
        mime_type: &str,
        video_encoder: &str,
        audio_encoder: Option<&str>,
        muxer: &str,
    ) -> Self {
        Self {
            extension: extension.to_string(),
            mime_type: mime_type.to_string(),
            video_encoder: video_encoder.to_string(),
            audio_encoder: audio_encoder.map(str::to_string),
            muxer: muxer.to_string(),
        }
    }

    /// MIME type without parameters, e.g. `video/mp4`
    pub fn container_mime(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or(&self.mime_type)
            .trim()
    }

    pub fn filename(&self) -> String {
        format!("video.{}", self.extension)
    }
}

/// The fixed preference list: H.264/AAC in MP4, H.264/AAC in WebM, VP8/Opus in WebM
pub fn default_candidates() -> Vec<FormatCandidate> {
    vec![
        FormatCandidate::new(
            "mp4",
            "video/mp4; codecs=\"avc1.42E01E, mp4a.40.2\"",
            "libx264",
            Some("aac"),
            "mp4",
        ),
        FormatCandidate::new(
            "webm",
            "video/webm; codecs=\"avc1.42E01E, mp4a.40.2\"",
            "libx264",
            Some("aac"),
            "webm",
        ),
        FormatCandidate::new(
            "webm",
            "video/webm; codecs=\"vp8, opus\"",
            "libvpx",
            Some("libopus"),
            "webm",
        ),
    ]
}

/// Availability predicate for format candidates
pub trait FormatProbe: Send + Sync {
    fn is_supported(&self, candidate: &FormatCandidate) -> bool;
}

impl<F> FormatProbe for F
where
    F: Fn(&FormatCandidate) -> bool + Send + Sync,
{
    fn is_supported(&self, candidate: &FormatCandidate) -> bool {
        self(candidate)
    }
}

/// Pick the first candidate the probe accepts
///
/// The list is tried top to bottom and the winner is used for the whole run.
pub fn negotiate<P>(candidates: &[FormatCandidate], probe: &P) -> Result<FormatCandidate>
where
    P: FormatProbe + ?Sized,
{
    for candidate in candidates {
        if probe.is_supported(candidate) {
            info!("Selected format {} (.{})", candidate.mime_type, candidate.extension);
            return Ok(candidate.clone());
        }
        debug!("Format not available: {}", candidate.mime_type);
    }

    Err(EncoderError::NoSupportedFormat {
        tried: candidates.iter().map(|c| c.mime_type.clone()).collect(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecorderError;

    #[test]
    fn test_first_available_wins() {
        let candidates = default_candidates();
        let selected = negotiate(&candidates, &|c: &FormatCandidate| c.extension == "webm").unwrap();
        assert_eq!(selected, candidates[1]);

        let selected = negotiate(&candidates, &|_: &FormatCandidate| true).unwrap();
        assert_eq!(selected, candidates[0]);
    }

    #[test]
    fn test_probe_order_is_list_order() {
        let seen = std::sync::Mutex::new(Vec::new());
        let probe = |c: &FormatCandidate| {
            seen.lock().unwrap().push(c.mime_type.clone());
            c.video_encoder == "libvpx"
        };

        let candidates = default_candidates();
        negotiate(&candidates, &probe).unwrap();

        let seen = seen.into_inner().unwrap();
        let expected: Vec<String> = candidates.iter().map(|c| c.mime_type.clone()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_nothing_available() {
        let err = negotiate(&default_candidates(), &|_: &FormatCandidate| false).unwrap_err();
        match err {
            RecorderError::Encoder(EncoderError::NoSupportedFormat { tried }) => {
                assert_eq!(tried.len(), 3)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_container_mime_and_filename() {
        let mp4 = &default_candidates()[0];
        assert_eq!(mp4.container_mime(), "video/mp4");
        assert_eq!(mp4.filename(), "video.mp4");
    }
}
