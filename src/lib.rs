//! Show, hear, recall: an appliance that learns objects from two photos and
//! a spoken label, then names them again when they are shown.
//!
//! [`Lighthouse`] is the boundary API. RECORD and IDENTIFY are posted to a
//! single loop thread that owns the camera, the audio devices and catalog
//! writes. The synchronous lookups read the shared catalog directly.

pub mod appliance;
pub mod audio;
pub mod capture;
pub mod cli;
pub mod event_loop;
pub mod feedback;
pub mod settings;

use std::io;
use std::sync::Arc;

use lighthouse_matching::{ImageDescription, ImageMatcher, MatchingResult, ScoredMatch};
use lighthouse_types::ImageFrame;

pub use appliance::{Appliance, ApplianceOptions, Collaborators, VoiceSettings};
pub use event_loop::{EventLoop, Message, RecordDelegate, RecordError, ValueDelegate};

pub struct Lighthouse {
    matcher: Arc<ImageMatcher>,
    event_loop: EventLoop,
}

impl Lighthouse {
    /// Starts the loop thread. The matcher is shared with it.
    pub fn start(
        matcher: Arc<ImageMatcher>,
        collaborators: Collaborators,
        options: ApplianceOptions,
    ) -> io::Result<Self> {
        let appliance = Appliance::new(Arc::clone(&matcher), collaborators, options);
        let event_loop = EventLoop::spawn(appliance)?;
        Ok(Self {
            matcher,
            event_loop,
        })
    }

    pub fn matcher(&self) -> &Arc<ImageMatcher> {
        &self.matcher
    }

    pub fn start_record<S, E>(&self, on_success: S, on_error: E)
    where
        S: FnOnce(ImageFrame) + Send + 'static,
        E: FnOnce(RecordError) + Send + 'static,
    {
        self.event_loop
            .send(Message::Record(RecordDelegate::new(on_success, on_error)));
    }

    pub fn start_identify(&self) {
        self.event_loop.send(Message::Identify);
    }

    /// Supersedes whatever task is running.
    pub fn stop(&self) {
        self.event_loop.send(Message::Wait(None));
    }

    /// Calls `callback(value)` from the loop once everything posted earlier
    /// has been handled. Like [`stop`](Self::stop), posting it supersedes a
    /// RECORD or IDENTIFY that is queued or running: that task aborts
    /// without reporting an outcome.
    pub fn wait<F>(&self, value: i64, callback: F)
    where
        F: FnOnce(i64) + Send + 'static,
    {
        self.event_loop
            .send(Message::Wait(Some(ValueDelegate::new(value, callback))));
    }

    pub fn shutdown(&mut self) {
        self.event_loop.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.event_loop.is_running()
    }

    pub fn extract_descriptor(&self, frame: &ImageFrame) -> MatchingResult<ImageDescription> {
        self.matcher.get_description(frame)
    }

    pub fn find_matches(&self, query: &ImageDescription) -> Vec<ScoredMatch> {
        self.matcher.find_matches(query)
    }

    pub fn find_matches_for_frame(&self, frame: &ImageFrame) -> MatchingResult<Vec<ScoredMatch>> {
        let query = self.matcher.get_description(frame)?;
        Ok(self.matcher.find_matches(&query))
    }

    pub fn descriptor_by_id(&self, id: &str) -> MatchingResult<Arc<ImageDescription>> {
        self.matcher.get_description_by_id(id)
    }

    pub fn catalog_ids(&self) -> Vec<String> {
        self.matcher.ids()
    }
}
