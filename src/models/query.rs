use serde::{ Deserialize, Serialize };

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub knowledge_base_id: i64,
    pub query: String,
    pub max_results: u32,
}

/// One incremental unit of a streamed answer. `response` carries a text
/// delta; `start_time`/`end_time` arrive as stringified seconds and are
/// parsed leniently because the backend omits or blanks them freely.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponseChunk {
    #[serde(rename = "query", default)]
    pub query_text: String,
    #[serde(rename = "response", default)]
    pub response_fragment: String,
    #[serde(default)]
    pub video_path: Option<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl QueryResponseChunk {
    pub fn start_seconds(&self) -> Option<f64> {
        parse_seconds(self.start_time.as_deref())
    }

    pub fn end_seconds(&self) -> Option<f64> {
        parse_seconds(self.end_time.as_deref())
    }

    /// A chunk can drive a video seek only when it names a source and a
    /// usable offset.
    pub fn video_hint(&self) -> Option<(&str, f64)> {
        let path = self.video_path.as_deref().filter(|p| !p.is_empty())?;
        let start = self.start_seconds()?;
        Some((path, start))
    }
}

fn parse_seconds(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok()).filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryFeedbackRequest {
    pub knowledge_base_id: i64,
    pub query: String,
    pub response: String,
    pub thumbs_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryFeedbackResponse {
    pub success: bool,
}
