use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::{ error, info };
use reqwest::{ Client as HttpClient, Response, StatusCode };
use reqwest::header::{ HeaderMap, HeaderValue };
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use crate::models::pod::{ CreatePodRequest, CreatePodResponse, Pod, PodDetail, UsageEntry };
use crate::models::query::{
    QueryFeedbackRequest,
    QueryFeedbackResponse,
    QueryRequest,
    QueryResponseChunk,
};
use crate::stream::ChunkDecoder;

const SESSION_HEADER: &str = "X-Session-Token";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("resource not found")]
    NotFound,
    #[error("request failed with status {0}")]
    Status(StatusCode),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("stream read timed out after {0:?}")]
    Timeout(Duration),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type ChunkStream = Pin<
    Box<dyn Stream<Item = Result<QueryResponseChunk, GatewayError>> + Send>
>;

/// The slice of the API the chat controller depends on. Kept behind a trait
/// so transcripts can be exercised against scripted backends.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query_stream(
        &self,
        pod_id: i64,
        question: &str
    ) -> Result<ChunkStream, GatewayError>;

    async fn submit_feedback(
        &self,
        request: QueryFeedbackRequest
    ) -> Result<QueryFeedbackResponse, GatewayError>;
}

/// Typed wrapper over the VideoIndex HTTP API. Every request carries the
/// session token header; 404s surface as `NotFound` so callers can render a
/// dedicated missing-pod state instead of a generic failure.
#[derive(Debug)]
pub struct PodGateway {
    http: HttpClient,
    base_url: String,
    max_results: u32,
    request_timeout: Duration,
    stream_read_timeout: Duration,
}

impl PodGateway {
    pub fn new(
        base_url: &str,
        session_token: &str,
        max_results: u32,
        request_timeout: Duration,
        stream_read_timeout: Duration
    ) -> Result<Self, GatewayError> {
        Url::parse(base_url).map_err(|e|
            GatewayError::Config(format!("invalid base URL '{}': {}", base_url, e))
        )?;

        let mut headers = HeaderMap::new();
        headers.insert(
            SESSION_HEADER,
            HeaderValue::from_str(session_token).map_err(|e|
                GatewayError::Config(format!("invalid session token: {}", e))
            )?
        );

        // A whole-request timeout would cut long answer streams short, so
        // the client only bounds connect time; plain calls add their own
        // deadline per request and streaming reads are bounded per chunk.
        let http = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(request_timeout)
            .build()
            .map_err(GatewayError::Transport)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results,
            request_timeout,
            stream_read_timeout,
        })
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    pub async fn list_pods(&self) -> Result<Vec<Pod>, GatewayError> {
        let resp = self.http
            .get(self.endpoint("/knowledge-bases"))
            .timeout(self.request_timeout)
            .send().await?;
        Ok(check_status(resp)?.json::<Vec<Pod>>().await?)
    }

    pub async fn get_pod(&self, id: i64) -> Result<PodDetail, GatewayError> {
        let resp = self.http
            .get(self.endpoint(&format!("/knowledge-bases/{}", id)))
            .timeout(self.request_timeout)
            .send().await?;
        Ok(check_status(resp)?.json::<PodDetail>().await?)
    }

    pub async fn create_pod(
        &self,
        title: &str,
        video_urls: Vec<String>
    ) -> Result<CreatePodResponse, GatewayError> {
        let req = CreatePodRequest {
            title: title.to_string(),
            video_urls,
        };
        let resp = self.http
            .post(self.endpoint("/upload"))
            .json(&req)
            .timeout(self.request_timeout)
            .send().await?;
        Ok(check_status(resp)?.json::<CreatePodResponse>().await?)
    }

    /// Non-streaming variant: the whole answer arrives as one chunk.
    pub async fn query(
        &self,
        pod_id: i64,
        question: &str
    ) -> Result<QueryResponseChunk, GatewayError> {
        let req = QueryRequest {
            knowledge_base_id: pod_id,
            query: question.to_string(),
            max_results: self.max_results,
        };
        let resp = self.http
            .post(self.endpoint("/query"))
            .json(&req)
            .timeout(self.request_timeout)
            .send().await?;
        Ok(check_status(resp)?.json::<QueryResponseChunk>().await?)
    }

    pub async fn usage(&self) -> Result<HashMap<String, UsageEntry>, GatewayError> {
        let resp = self.http
            .get(self.endpoint("/usage"))
            .timeout(self.request_timeout)
            .send().await?;
        Ok(check_status(resp)?.json::<HashMap<String, UsageEntry>>().await?)
    }
}

#[async_trait]
impl QueryBackend for PodGateway {
    /// Streaming query: the chunked response body is fed through the
    /// incremental decoder and forwarded chunk-by-chunk, in arrival order,
    /// over a channel-backed stream. Per-read timeouts terminate the stream
    /// with an error; the caller decides what a dead stream means.
    async fn query_stream(
        &self,
        pod_id: i64,
        question: &str
    ) -> Result<ChunkStream, GatewayError> {
        let url = self.endpoint("/query");
        let req = QueryRequest {
            knowledge_base_id: pod_id,
            query: question.to_string(),
            max_results: self.max_results,
        };
        let client = self.http.clone();
        let read_timeout = self.stream_read_timeout;
        let (tx, rx) = mpsc::channel(32);

        info!("Starting streaming query against {}", url);

        tokio::spawn(async move {
            let resp = match client.post(&url).json(&req).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let _ = tx.send(Err(GatewayError::Transport(e))).await;
                    return;
                }
            };
            let resp = match check_status(resp) {
                Ok(resp) => resp,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            let mut decoder = ChunkDecoder::<QueryResponseChunk>::new();
            let mut body = resp.bytes_stream();
            loop {
                let read = tokio::time::timeout(read_timeout, body.next()).await;
                match read {
                    Err(_) => {
                        error!("Streaming query timed out after {:?}", read_timeout);
                        let _ = tx.send(Err(GatewayError::Timeout(read_timeout))).await;
                        return;
                    }
                    Ok(None) => {
                        break;
                    }
                    Ok(Some(Ok(buf))) => {
                        let mut decoded = Vec::new();
                        decoder.feed(&buf, |chunk| decoded.push(chunk));
                        for chunk in decoded {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(Some(Err(e))) => {
                        let _ = tx.send(Err(GatewayError::Transport(e))).await;
                        return;
                    }
                }
            }

            let mut decoded = Vec::new();
            decoder.finish(|chunk| decoded.push(chunk));
            for chunk in decoded {
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn submit_feedback(
        &self,
        request: QueryFeedbackRequest
    ) -> Result<QueryFeedbackResponse, GatewayError> {
        let resp = self.http
            .post(self.endpoint("/query-feedback"))
            .json(&request)
            .timeout(self.request_timeout)
            .send().await?;
        Ok(check_status(resp)?.json::<QueryFeedbackResponse>().await?)
    }
}

fn check_status(resp: Response) -> Result<Response, GatewayError> {
    match resp.status() {
        s if s.is_success() => Ok(resp),
        StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
        s => Err(GatewayError::Status(s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(base: &str) -> PodGateway {
        PodGateway::new(
            base,
            "7e2f8a1c-4e61-4af0-9f3e-0d6e4b7a2c11",
            5,
            Duration::from_secs(30),
            Duration::from_secs(60)
        ).unwrap()
    }

    #[test]
    fn endpoint_joins_with_and_without_trailing_slash() {
        let plain = gateway("https://api.videoindex.app");
        let slashed = gateway("https://api.videoindex.app/");
        assert_eq!(plain.endpoint("/query"), "https://api.videoindex.app/query");
        assert_eq!(slashed.endpoint("/query"), "https://api.videoindex.app/query");
        assert_eq!(
            plain.endpoint("/knowledge-bases/42"),
            "https://api.videoindex.app/knowledge-bases/42"
        );
    }

    #[test]
    fn constructor_rejects_invalid_base_url() {
        let err = PodGateway::new(
            "not a url",
            "token",
            5,
            Duration::from_secs(30),
            Duration::from_secs(60)
        ).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn not_found_is_distinct_from_generic_status() {
        let not_found = GatewayError::NotFound;
        let server_err = GatewayError::Status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(not_found.to_string(), "resource not found");
        assert!(server_err.to_string().contains("500"));
    }
}
