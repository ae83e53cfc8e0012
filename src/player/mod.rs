use async_trait::async_trait;
use log::debug;
use std::sync::{ Arc, Mutex };
use std::time::Duration;

/// The playback component the synchronizer drives. The real player lives
/// outside this crate; the console binary and the tests provide their own
/// surfaces.
#[async_trait]
pub trait VideoSurface: Send + Sync {
    async fn load_source(&self, path: &str);
    async fn seek(&self, seconds: f64);
}

#[derive(Default)]
struct SyncState {
    current_source: Option<String>,
    pending_seek: Option<f64>,
    ready: bool,
}

/// Bridges answer timestamps to the video player. A seek that targets a
/// different video first switches the source and holds the seek until the
/// player reports ready; seeking an unloaded video is avoided by design, not
/// by retry.
pub struct VideoPositionSynchronizer {
    surface: Arc<dyn VideoSurface>,
    state: Mutex<SyncState>,
    settle: Duration,
}

impl VideoPositionSynchronizer {
    pub fn new(surface: Arc<dyn VideoSurface>, settle: Duration) -> Self {
        Self {
            surface,
            state: Mutex::new(SyncState::default()),
            settle,
        }
    }

    /// Loads the pod's own video without any seek attached, e.g. when a pod
    /// view opens.
    pub async fn load_initial(&self, path: &str) {
        {
            let mut state = self.state.lock().unwrap();
            state.current_source = Some(path.to_string());
            state.pending_seek = None;
            state.ready = false;
        }
        self.surface.load_source(path).await;
    }

    /// Seeks to `time`, switching the source first when `video_path` names a
    /// different video. Seeks against a source that is still loading are
    /// parked until `on_video_ready`; a later request overwrites a parked one.
    pub async fn request_seek(&self, time: f64, video_path: Option<&str>) {
        enum Action {
            Switch(String),
            SeekNow,
            Defer,
        }

        let action = {
            let mut state = self.state.lock().unwrap();
            match video_path {
                Some(path) if state.current_source.as_deref() != Some(path) => {
                    state.current_source = Some(path.to_string());
                    state.pending_seek = Some(time);
                    state.ready = false;
                    Action::Switch(path.to_string())
                }
                _ => {
                    if state.current_source.is_some() && !state.ready {
                        state.pending_seek = Some(time);
                        Action::Defer
                    } else {
                        Action::SeekNow
                    }
                }
            }
        };

        match action {
            Action::Switch(path) => {
                debug!("Switching video source to {} with pending seek {}s", path, time);
                self.surface.load_source(&path).await;
            }
            Action::SeekNow => self.surface.seek(time).await,
            Action::Defer => debug!("Parking seek to {}s until the video is ready", time),
        }
    }

    /// Player callback: the current source finished loading. Performs the
    /// parked seek, if any, after a short settle delay.
    pub async fn on_video_ready(&self) {
        let pending = {
            let mut state = self.state.lock().unwrap();
            state.ready = true;
            state.pending_seek.take()
        };

        if let Some(time) = pending {
            tokio::time::sleep(self.settle).await;
            self.surface.seek(time).await;
        }
    }

    pub fn current_source(&self) -> Option<String> {
        self.state.lock().unwrap().current_source.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum SurfaceEvent {
        Load(String),
        Seek(f64),
    }

    #[derive(Default)]
    struct RecordingSurface {
        events: Mutex<Vec<SurfaceEvent>>,
    }

    impl RecordingSurface {
        fn events(&self) -> Vec<SurfaceEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VideoSurface for RecordingSurface {
        async fn load_source(&self, path: &str) {
            self.events.lock().unwrap().push(SurfaceEvent::Load(path.to_string()));
        }

        async fn seek(&self, seconds: f64) {
            self.events.lock().unwrap().push(SurfaceEvent::Seek(seconds));
        }
    }

    fn setup() -> (Arc<RecordingSurface>, VideoPositionSynchronizer) {
        let surface = Arc::new(RecordingSurface::default());
        let sync = VideoPositionSynchronizer::new(
            surface.clone(),
            Duration::from_millis(5)
        );
        (surface, sync)
    }

    #[tokio::test]
    async fn switching_source_defers_seek_until_ready() {
        let (surface, sync) = setup();

        sync.request_seek(120.0, Some("a.mp4")).await;
        assert_eq!(surface.events(), vec![SurfaceEvent::Load("a.mp4".to_string())]);

        sync.on_video_ready().await;
        assert_eq!(
            surface.events(),
            vec![SurfaceEvent::Load("a.mp4".to_string()), SurfaceEvent::Seek(120.0)]
        );
    }

    #[tokio::test]
    async fn same_source_seeks_immediately_once_ready() {
        let (surface, sync) = setup();
        sync.load_initial("a.mp4").await;
        sync.on_video_ready().await;

        sync.request_seek(42.0, Some("a.mp4")).await;
        assert_eq!(
            surface.events(),
            vec![SurfaceEvent::Load("a.mp4".to_string()), SurfaceEvent::Seek(42.0)]
        );
    }

    #[tokio::test]
    async fn missing_path_seeks_current_video() {
        let (surface, sync) = setup();
        sync.load_initial("a.mp4").await;
        sync.on_video_ready().await;

        sync.request_seek(10.0, None).await;
        assert_eq!(
            surface.events(),
            vec![SurfaceEvent::Load("a.mp4".to_string()), SurfaceEvent::Seek(10.0)]
        );
    }

    #[tokio::test]
    async fn seek_against_loading_video_is_parked_not_applied() {
        let (surface, sync) = setup();
        sync.load_initial("a.mp4").await;

        // Player has not reported ready yet: no seek may reach the surface.
        sync.request_seek(30.0, Some("a.mp4")).await;
        sync.request_seek(45.0, None).await;
        assert_eq!(surface.events(), vec![SurfaceEvent::Load("a.mp4".to_string())]);

        // Latest parked seek wins once the player settles.
        sync.on_video_ready().await;
        assert_eq!(
            surface.events(),
            vec![SurfaceEvent::Load("a.mp4".to_string()), SurfaceEvent::Seek(45.0)]
        );
    }

    #[tokio::test]
    async fn ready_without_pending_seek_is_a_no_op() {
        let (surface, sync) = setup();
        sync.load_initial("a.mp4").await;
        sync.on_video_ready().await;
        sync.on_video_ready().await;
        assert_eq!(surface.events(), vec![SurfaceEvent::Load("a.mp4".to_string())]);
    }

    #[tokio::test]
    async fn no_source_loaded_seeks_straight_through() {
        let (surface, sync) = setup();
        sync.request_seek(5.0, None).await;
        assert_eq!(surface.events(), vec![SurfaceEvent::Seek(5.0)]);
    }
}
