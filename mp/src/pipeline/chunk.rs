//! Streaming output unit of a planning run

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a [`StreamingChunk`]
///
/// The pipeline reports structure analysis and waypoint progress as `Status`
/// chunks with the payload under `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Reasoning,
    Plan,
    Waypoint,
    Status,
    Error,
    StructureAnalysis,
    LocationGeocoded,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Reasoning => "reasoning",
            ChunkType::Plan => "plan",
            ChunkType::Waypoint => "waypoint",
            ChunkType::Status => "status",
            ChunkType::Error => "error",
            ChunkType::StructureAnalysis => "structure_analysis",
            ChunkType::LocationGeocoded => "location_geocoded",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered unit of pipeline output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingChunk {
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub sequence: u64,
    #[serde(default)]
    pub is_final: bool,
}

impl StreamingChunk {
    /// Progress percentage carried in `data.progress`, if any
    pub fn progress(&self) -> Option<f64> {
        self.data.as_ref()?.get("progress")?.as_f64()
    }

    /// Phase number carried in `data.phase`, if any
    pub fn phase(&self) -> Option<u64> {
        self.data.as_ref()?.get("phase")?.as_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_wire_shape() {
        let chunk = StreamingChunk {
            chunk_type: ChunkType::LocationGeocoded,
            content: Some("Geocoded location: Pier 39".to_string()),
            data: Some(json!({"phase": 2, "progress": 42.5})),
            sequence: 7,
            is_final: false,
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["type"], "location_geocoded");
        assert_eq!(value["sequence"], 7);
        assert_eq!(value["is_final"], false);
        assert_eq!(chunk.progress(), Some(42.5));
        assert_eq!(chunk.phase(), Some(2));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let chunk = StreamingChunk {
            chunk_type: ChunkType::Reasoning,
            content: Some("thinking".to_string()),
            data: None,
            sequence: 0,
            is_final: false,
        };
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(!json.contains("data"));
        assert_eq!(chunk.progress(), None);
    }
}
