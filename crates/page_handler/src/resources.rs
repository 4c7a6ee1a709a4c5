//! Load state for the page's images and videos.
//!
//! Stands in for the host's media elements: the `complete` flag of images,
//! the ready state of videos, and their one-shot load/error listeners.
//! Firing an event delivers it to every listener registered at that moment
//! and discards them; listeners whose receiver was dropped are skipped.

use html::NodeKey;
use log::{debug, trace};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Outcome delivered to a load listener.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResourceEvent {
    /// `load` for images, `loadeddata` for videos.
    Loaded,
    Errored,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

/// Media ready state, ordered from least to most data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Whether the current frame is available, the point `loadeddata` fires.
    #[must_use]
    pub fn has_current_data(self) -> bool {
        self >= Self::HaveCurrentData
    }
}

#[derive(Debug, Default)]
pub struct ImageState {
    pub complete: bool,
    pub errored: bool,
    listeners: Vec<oneshot::Sender<ResourceEvent>>,
}

#[derive(Debug, Default)]
pub struct VideoState {
    pub ready_state: ReadyState,
    pub errored: bool,
    listeners: Vec<oneshot::Sender<ResourceEvent>>,
}

fn deliver(listeners: &mut Vec<oneshot::Sender<ResourceEvent>>, event: ResourceEvent) -> usize {
    listeners
        .drain(..)
        .filter_map(|listener| listener.send(event).ok())
        .count()
}

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    images: HashMap<NodeKey, ImageState>,
    videos: HashMap<NodeKey, VideoState>,
    registrations: usize,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Image `complete` flag. Unknown images are not complete.
    #[must_use]
    pub fn is_image_complete(&self, key: NodeKey) -> bool {
        self.images.get(&key).is_some_and(|image| image.complete)
    }

    #[must_use]
    pub fn image(&self, key: NodeKey) -> Option<&ImageState> {
        self.images.get(&key)
    }

    #[must_use]
    pub fn video_ready_state(&self, key: NodeKey) -> ReadyState {
        self.videos
            .get(&key)
            .map(|video| video.ready_state)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn video(&self, key: NodeKey) -> Option<&VideoState> {
        self.videos.get(&key)
    }

    /// Register a one-shot load/error listener for a media element.
    pub fn listen(&mut self, key: NodeKey, kind: MediaKind) -> oneshot::Receiver<ResourceEvent> {
        let (sender, receiver) = oneshot::channel();
        self.registrations = self.registrations.saturating_add(1);
        trace!("listening for {kind:?} {key}");
        match kind {
            MediaKind::Image => self.images.entry(key).or_default().listeners.push(sender),
            MediaKind::Video => self.videos.entry(key).or_default().listeners.push(sender),
        }
        receiver
    }

    /// Total listener registrations since creation.
    #[must_use]
    pub const fn listener_registrations(&self) -> usize {
        self.registrations
    }

    /// Listeners registered and not yet fired or abandoned.
    #[must_use]
    pub fn pending_listeners(&self) -> usize {
        let open = |listeners: &Vec<oneshot::Sender<ResourceEvent>>| {
            listeners.iter().filter(|listener| !listener.is_closed()).count()
        };
        self.images.values().map(|image| open(&image.listeners)).sum::<usize>()
            + self.videos.values().map(|video| open(&video.listeners)).sum::<usize>()
    }

    /// Mark an image loaded and fire `load`. Returns the listeners notified.
    pub fn complete_image(&mut self, key: NodeKey) -> usize {
        let image = self.images.entry(key).or_default();
        image.complete = true;
        image.errored = false;
        let notified = deliver(&mut image.listeners, ResourceEvent::Loaded);
        debug!("image {key} loaded ({notified} listeners)");
        notified
    }

    /// Fire `error` on an image. The `complete` flag stays unset.
    pub fn fail_image(&mut self, key: NodeKey) -> usize {
        let image = self.images.entry(key).or_default();
        image.errored = true;
        let notified = deliver(&mut image.listeners, ResourceEvent::Errored);
        debug!("image {key} failed ({notified} listeners)");
        notified
    }

    /// Advance a video's ready state; crossing into current data fires `loadeddata`.
    pub fn set_video_ready_state(&mut self, key: NodeKey, state: ReadyState) -> usize {
        let video = self.videos.entry(key).or_default();
        let crossed = !video.ready_state.has_current_data() && state.has_current_data();
        video.ready_state = state;
        if !crossed {
            return 0;
        }
        let notified = deliver(&mut video.listeners, ResourceEvent::Loaded);
        debug!("video {key} has data ({notified} listeners)");
        notified
    }

    pub fn fail_video(&mut self, key: NodeKey) -> usize {
        let video = self.videos.entry(key).or_default();
        video.errored = true;
        let notified = deliver(&mut video.listeners, ResourceEvent::Errored);
        debug!("video {key} failed ({notified} listeners)");
        notified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::DOM;

    fn two_nodes() -> (NodeKey, NodeKey) {
        let mut dom = DOM::new();
        (dom.create_element("img"), dom.create_element("video"))
    }

    #[test]
    fn image_events_reach_current_listeners_once() {
        let (img, _) = two_nodes();
        let mut registry = ResourceRegistry::new();
        let mut first = registry.listen(img, MediaKind::Image);
        let dropped = registry.listen(img, MediaKind::Image);
        drop(dropped);
        assert_eq!(registry.pending_listeners(), 1);

        assert_eq!(registry.complete_image(img), 1);
        assert_eq!(first.try_recv(), Ok(ResourceEvent::Loaded));
        assert!(registry.is_image_complete(img));
        assert_eq!(registry.complete_image(img), 0);
        assert_eq!(registry.listener_registrations(), 2);
    }

    #[test]
    fn failed_image_is_not_complete() {
        let (img, _) = two_nodes();
        let mut registry = ResourceRegistry::new();
        let mut listener = registry.listen(img, MediaKind::Image);
        assert_eq!(registry.fail_image(img), 1);
        assert_eq!(listener.try_recv(), Ok(ResourceEvent::Errored));
        assert!(!registry.is_image_complete(img));
        assert!(registry.image(img).is_some_and(|image| image.errored));
    }

    #[test]
    fn video_fires_when_crossing_current_data() {
        let (_, video) = two_nodes();
        let mut registry = ResourceRegistry::new();
        let mut listener = registry.listen(video, MediaKind::Video);
        assert_eq!(registry.set_video_ready_state(video, ReadyState::HaveMetadata), 0);
        assert!(listener.try_recv().is_err());
        assert_eq!(registry.set_video_ready_state(video, ReadyState::HaveEnoughData), 1);
        assert_eq!(listener.try_recv(), Ok(ResourceEvent::Loaded));
        assert_eq!(registry.video_ready_state(video), ReadyState::HaveEnoughData);
    }
}
