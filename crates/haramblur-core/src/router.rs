//! File-open routing.
//!
//! [`FileOpenRouter`] is a pure state machine: it takes surface lifecycle
//! events and delivery requests, and answers with the effects the host has to
//! perform. References that arrive before the main surface is ready are held
//! in arrival order and flushed exactly once, on that surface's first ready
//! signal.

use std::collections::VecDeque;

use crate::media::MediaReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceState {
    /// No main window exists
    #[default]
    Absent,
    /// Window created, page still loading
    Loading,
    /// Page finished loading; pushes reach it
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    Deliver(MediaReference),
    SurfaceCreated,
    SurfaceReady,
    SurfaceClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEffect {
    /// Push `hb:openMedia` to the main surface
    OpenMedia(MediaReference),
    /// Bring the main window to the foreground
    Focus,
}

#[derive(Debug, Default)]
pub struct FileOpenRouter {
    surface: SurfaceState,
    pending: VecDeque<MediaReference>,
}

impl FileOpenRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(&self) -> SurfaceState {
        self.surface
    }

    pub fn pending(&self) -> impl Iterator<Item = &MediaReference> {
        self.pending.iter()
    }

    pub fn handle(&mut self, event: RouterEvent) -> Vec<RouterEffect> {
        match event {
            RouterEvent::Deliver(media) => {
                if self.surface == SurfaceState::Ready {
                    vec![RouterEffect::OpenMedia(media), RouterEffect::Focus]
                } else {
                    self.pending.push_back(media);
                    Vec::new()
                }
            }
            RouterEvent::SurfaceCreated => {
                self.surface = SurfaceState::Loading;
                Vec::new()
            }
            RouterEvent::SurfaceReady => {
                if self.surface == SurfaceState::Ready {
                    // page reload: the queue was flushed already
                    return Vec::new();
                }
                self.surface = SurfaceState::Ready;
                self.pending.drain(..).map(RouterEffect::OpenMedia).collect()
            }
            RouterEvent::SurfaceClosed => {
                self.surface = SurfaceState::Absent;
                Vec::new()
            }
        }
    }
}
