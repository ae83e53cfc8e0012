use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    Processing,
    Ready,
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodStatus::Processing => write!(f, "processing"),
            PodStatus::Ready => write!(f, "ready"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsePodStatusError {
    message: String,
}

impl fmt::Display for ParsePodStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParsePodStatusError {}

impl FromStr for PodStatus {
    type Err = ParsePodStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(PodStatus::Processing),
            "ready" => Ok(PodStatus::Ready),
            _ =>
                Err(ParsePodStatusError {
                    message: format!("Invalid pod status: '{}'", s),
                }),
        }
    }
}

/// Summary entity returned by the pod listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub query_count: u64,
    pub status: PodStatus,
}

/// Full entity fetched by id; adds the playable source and the intro blurb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodDetail {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub query_count: u64,
    pub status: PodStatus,
    #[serde(default)]
    pub video_path: Option<String>,
    #[serde(default)]
    pub introduction: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePodRequest {
    pub title: String,
    pub video_urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePodResponse {
    pub pod_id: i64,
    pub title: String,
    pub status: PodStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsageEntry {
    pub queries: u64,
}
