use async_trait::async_trait;
use log::info;
use once_cell::sync::Lazy;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{ AsyncBufReadExt, BufReader };
use url::Url;

use crate::chat::ChatController;
use crate::gateway::PodGateway;
use crate::models::chat::Feedback;
use crate::models::pod::{ Pod, PodDetail };
use crate::player::{ VideoPositionSynchronizer, VideoSurface };

static DISLIKE_CATEGORIES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("incorrect", "Incorrect information"),
        ("irrelevant", "Not relevant to my question"),
        ("unclear", "Response is unclear or confusing"),
        ("incomplete", "Missing important details"),
        ("other", "Other (please specify)")
    ]
});

/// Terminal stand-in for the video player: source switches and seeks are
/// printed instead of rendered.
struct ConsoleSurface;

#[async_trait]
impl VideoSurface for ConsoleSurface {
    async fn load_source(&self, path: &str) {
        println!("[player] loading {}", path);
    }

    async fn seek(&self, seconds: f64) {
        println!("[player] jumped to {:.0}s", seconds);
    }
}

pub fn print_pod_list(pods: &[Pod]) {
    if pods.is_empty() {
        println!("No pods yet. Create one with --create-title and --video-url.");
        return;
    }
    println!("{:<8} {:<12} {:>8}  TITLE", "ID", "STATUS", "QUERIES");
    for pod in pods {
        println!("{:<8} {:<12} {:>8}  {}", pod.id, pod.status, pod.query_count, pod.title);
        if !pod.tags.is_empty() {
            println!("{:<8} {:<12} {:>8}  tags: {}", "", "", "", pod.tags.join(", "));
        }
    }
}

pub async fn print_usage(gateway: &PodGateway) -> Result<(), Box<dyn Error + Send + Sync>> {
    let usage = gateway.usage().await?;
    let mut entries: Vec<_> = usage.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, entry) in entries {
        println!("{:<20} {} queries", key, entry.queries);
    }
    Ok(())
}

pub async fn create_pod(
    gateway: &PodGateway,
    title: &str,
    video_urls: &[String]
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if video_urls.is_empty() {
        return Err("pod creation needs at least one --video-url".into());
    }
    for raw in video_urls {
        Url::parse(raw).map_err(|e| format!("invalid video URL '{}': {}", raw, e))?;
    }

    let created = gateway.create_pod(title, video_urls.to_vec()).await?;
    println!("Created pod {} ('{}'), status: {}", created.pod_id, created.title, created.status);
    if created.status == crate::models::pod::PodStatus::Processing {
        println!("Indexing runs in the background; the pod turns ready once it finishes.");
    }
    Ok(())
}

/// Interactive question loop for one pod. Answers render progressively as
/// fragments stream in; `:like` / `:dislike <category> [comment]` rate the
/// last answer, `:quit` leaves the pod.
pub async fn chat_loop(
    gateway: Arc<PodGateway>,
    detail: PodDetail,
    settle: Duration
) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("== {} ==", detail.title);
    if let Some(intro) = &detail.introduction {
        println!("{}", intro);
    }
    println!("Ask a question, or :help for commands.");

    let synchronizer = Arc::new(
        VideoPositionSynchronizer::new(Arc::new(ConsoleSurface), settle)
    );
    if let Some(path) = &detail.video_path {
        synchronizer.load_initial(path).await;
        synchronizer.on_video_ready().await;
    }

    let mut controller = ChatController::new(
        detail.id,
        gateway,
        synchronizer.clone()
    ).with_fragment_observer(|fragment| {
        print!("{}", fragment);
        let _ = std::io::stdout().flush();
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let input = line.trim();

        match input {
            "" => continue,
            ":quit" | ":q" => break,
            ":help" => {
                println!(":like                         rate the last answer up");
                println!(":dislike <category> [note]    rate the last answer down");
                println!(":quit                         leave this pod");
                print_categories();
            }
            ":like" => {
                rate(&mut controller, Feedback::Like, None, None).await;
            }
            _ if input.starts_with(":dislike") => {
                let rest = input.trim_start_matches(":dislike").trim();
                let (category, comment) = match rest.split_once(char::is_whitespace) {
                    Some((cat, note)) => (cat, Some(note.trim().to_string())),
                    None if !rest.is_empty() => (rest, None),
                    None => ("", None),
                };
                if !DISLIKE_CATEGORIES.iter().any(|(value, _)| *value == category) {
                    println!("Pick a category:");
                    print_categories();
                    continue;
                }
                rate(
                    &mut controller,
                    Feedback::Dislike,
                    comment,
                    Some(category.to_string())
                ).await;
            }
            question => {
                controller.submit_question(question).await;
                // The console player is always ready right after a switch.
                synchronizer.on_video_ready().await;
                println!();
            }
        }
    }

    info!("Leaving pod {}", detail.id);
    controller.clear_transcript();
    Ok(())
}

fn print_categories() {
    for (value, label) in DISLIKE_CATEGORIES.iter() {
        println!("  {:<12} {}", value, label);
    }
}

async fn rate(
    controller: &mut ChatController,
    sentiment: Feedback,
    comment: Option<String>,
    category: Option<String>
) {
    let id = match controller.last_answer_id() {
        Some(id) => id.to_string(),
        None => {
            println!("Nothing to rate yet.");
            return;
        }
    };
    controller.submit_feedback(&id, sentiment, comment, category).await;

    let recorded = controller
        .messages()
        .iter()
        .find(|m| m.id == id)
        .map(|m| m.feedback == Some(sentiment))
        .unwrap_or(false);
    if recorded {
        println!("Thanks for the feedback.");
    } else {
        println!("Feedback could not be recorded.");
    }
}
