use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// A playable media stream, independent of how the engine wrapped it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    pub id: String,
    #[serde(default)]
    pub tracks: Vec<MediaTrack>,
}

/// Every shape the engine has been seen to return from a play call.
/// Order matters, the most nested shape is tried first.
#[derive(Deserialize)]
#[serde(untagged)]
enum VendorStream {
    Wrapped {
        #[serde(rename = "zegoStream")]
        zego_stream: Inner,
    },
    Direct {
        stream: MediaStream,
    },
    Bare(MediaStream),
}

#[derive(Deserialize)]
struct Inner {
    stream: MediaStream,
}

impl MediaStream {
    /// Extracts the media stream from an engine payload
    pub fn from_vendor(value: Value) -> Result<Self, EngineError> {
        let vendor: VendorStream =
            serde_json::from_value(value).map_err(|_| EngineError::UnrecognizedStream)?;

        Ok(match vendor {
            VendorStream::Wrapped { zego_stream } => zego_stream.stream,
            VendorStream::Direct { stream } => stream,
            VendorStream::Bare(stream) => stream,
        })
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Audio)
    }
}

fn enabled_by_default() -> bool {
    true
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_vendor_shapes() {
        let tracks = json!([{ "id": "a1", "kind": "audio" }, { "id": "v1", "kind": "video" }]);

        let wrapped = json!({ "zegoStream": { "stream": { "id": "s1", "tracks": tracks } } });
        let direct = json!({ "stream": { "id": "s2" }, "state": "playing" });
        let bare = json!({ "id": "s3", "tracks": [] });

        let wrapped = MediaStream::from_vendor(wrapped).unwrap();
        assert_eq!(wrapped.id, "s1");
        assert!(wrapped.has_audio());
        assert!(wrapped.tracks.iter().all(|t| t.enabled));

        assert_eq!(MediaStream::from_vendor(direct).unwrap().id, "s2");
        assert_eq!(MediaStream::from_vendor(bare).unwrap().id, "s3");
    }

    #[test]
    fn test_unrecognized_payload() {
        let result = MediaStream::from_vendor(json!({ "element": null }));
        assert_eq!(result, Err(EngineError::UnrecognizedStream));
    }
}
