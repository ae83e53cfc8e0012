pub mod chat;
pub mod cli;
pub mod console;
pub mod gateway;
pub mod models;
pub mod player;
pub mod session;
pub mod stream;

use cli::Args;
use gateway::{ GatewayError, PodGateway };
use log::info;
use session::SessionStore;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("API Base URL: {}", args.api_base_url);
    info!("Session Token Path: {}", args.session_token_path);
    info!("Query Max Results: {}", args.query_max_results);
    info!("Request Timeout: {}s", args.request_timeout_secs);
    info!("Stream Read Timeout: {}s", args.stream_read_timeout_secs);
    info!("Seek Settle Delay: {}ms", args.seek_settle_ms);
    info!("-------------------------");

    let session = SessionStore::new(&args.session_token_path);
    let token = session.get_or_create()?;

    let gateway = Arc::new(
        PodGateway::new(
            &args.api_base_url,
            &token,
            args.query_max_results,
            Duration::from_secs(args.request_timeout_secs),
            Duration::from_secs(args.stream_read_timeout_secs)
        )?
    );

    if args.usage {
        return console::print_usage(&gateway).await;
    }

    if let Some(title) = &args.create_title {
        return console::create_pod(&gateway, title, &args.video_url).await;
    }

    if let Some(pod_id) = args.pod_id {
        match gateway.get_pod(pod_id).await {
            Ok(detail) => {
                return console::chat_loop(
                    gateway,
                    detail,
                    Duration::from_millis(args.seek_settle_ms)
                ).await;
            }
            Err(GatewayError::NotFound) => {
                // Distinct missing-pod state with a way back to the list.
                println!("Pod {} was not found. Available pods:", pod_id);
            }
            Err(e) => {
                return Err(Box::new(e));
            }
        }
    }

    let pods = gateway.list_pods().await?;
    console::print_pod_list(&pods);

    Ok(())
}
