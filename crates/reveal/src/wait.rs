//! One-shot readiness futures for images, videos and fonts.
//!
//! Each wait resolves once when its resource is usable and rejects on an
//! explicit error. Resources that are already usable resolve immediately
//! without registering a listener, and resources that already failed reject
//! immediately.

use core::fmt;
use futures::FutureExt as _;
use futures::future::{self, LocalBoxFuture};
use html::NodeKey;
use log::{debug, trace};
use page_handler::HtmlPage;
use page_handler::fonts::{FaceStatus, FontKey, FontSnapshot, FontsReady};
use page_handler::resources::{MediaKind, ResourceEvent};
use thiserror::Error;
use tokio::sync::oneshot;

/// A resource an animation waits for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dependency {
    Image(NodeKey),
    Video(NodeKey),
    /// The face used by one or more text runs.
    Font(FontKey),
}

impl fmt::Display for Dependency {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(key) => write!(formatter, "image {key}"),
            Self::Video(key) => write!(formatter, "video {key}"),
            Self::Font(key) => write!(formatter, "font {key}"),
        }
    }
}

/// Why a dependency will never become ready.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("{0} failed to load")]
    Failed(Dependency),
    /// The host went away before the resource settled.
    #[error("{0} was abandoned before it settled")]
    Abandoned(Dependency),
}

/// A pending readiness check for one dependency.
pub type ResourceWait = LocalBoxFuture<'static, Result<(), ResourceError>>;

fn resolved() -> ResourceWait {
    future::ready(Ok(())).boxed_local()
}

/// An error that fired before anyone listened still fails the wait.
fn rejected(dependency: Dependency) -> ResourceWait {
    trace!("{dependency} already failed");
    future::ready(Err(ResourceError::Failed(dependency))).boxed_local()
}

fn settle_on(listener: oneshot::Receiver<ResourceEvent>, dependency: Dependency) -> ResourceWait {
    async move {
        match listener.await {
            Ok(ResourceEvent::Loaded) => Ok(()),
            Ok(ResourceEvent::Errored) => Err(ResourceError::Failed(dependency)),
            Err(_) => Err(ResourceError::Abandoned(dependency)),
        }
    }
    .boxed_local()
}

/// Wait for an image to finish loading.
///
/// Incomplete images are switched to eager loading before listening.
pub fn image_wait(page: &HtmlPage, image: NodeKey) -> ResourceWait {
    let (complete, errored) = page
        .resources()
        .borrow()
        .image(image)
        .map_or((false, false), |state| (state.complete, state.errored));
    if complete {
        trace!("image {image} already complete");
        return resolved();
    }
    if errored {
        return rejected(Dependency::Image(image));
    }
    if let Err(err) = page.dom_mut().set_attr(image, "loading", "eager") {
        debug!("could not force eager loading on {image}: {err}");
    }
    let listener = page.resources().borrow_mut().listen(image, MediaKind::Image);
    settle_on(listener, Dependency::Image(image))
}

/// Wait for a video's current frame. A declared poster counts as ready.
pub fn video_wait(page: &HtmlPage, video: NodeKey) -> ResourceWait {
    let has_data = page
        .resources()
        .borrow()
        .video_ready_state(video)
        .has_current_data();
    let has_poster = page
        .dom()
        .attr(video, "poster")
        .is_some_and(|poster| !poster.trim().is_empty());
    if has_data || has_poster {
        trace!("video {video} ready (data: {has_data}, poster: {has_poster})");
        return resolved();
    }
    if page.resources().borrow().video(video).is_some_and(|state| state.errored) {
        return rejected(Dependency::Video(video));
    }
    let listener = page.resources().borrow_mut().listen(video, MediaKind::Video);
    settle_on(listener, Dependency::Video(video))
}

/// Wait for the face matching `key`.
///
/// Faces known to `snapshot` resolve when that face loads and reject if it
/// errors. Unknown faces fall back to the set-wide ready signal.
pub fn font_wait(snapshot: &FontSnapshot, ready: &FontsReady, key: FontKey) -> ResourceWait {
    if let Some(face) = snapshot.face(&key) {
        return async move {
            match face.settled().await {
                Ok(FaceStatus::Error) => Err(ResourceError::Failed(Dependency::Font(key))),
                Ok(_) => Ok(()),
                Err(_) => Err(ResourceError::Abandoned(Dependency::Font(key))),
            }
        }
        .boxed_local();
    }
    trace!("no face registered for {key}; waiting for all fonts");
    let ready = ready.clone();
    async move {
        ready
            .wait()
            .await
            .map_err(|_| ResourceError::Abandoned(Dependency::Font(key)))
    }
    .boxed_local()
}
