//! Decides what a visible container animates, and when.
//!
//! A container tagged with the animated class waits for its dependencies (if
//! it has any) and then starts on the next painted frame. An untagged
//! container hands off to its first element child, repeatedly, until an
//! animated element is found or there is no child left.

use crate::aggregate::JoinSet;
use crate::predicates::has_dependencies;
use crate::wait::ResourceError;
use html::{DOM, NodeKey};
use log::{debug, info, trace};
use page_handler::HtmlPage;
use std::rc::Rc;

/// Inline style property that expresses the running state.
pub const PLAY_STATE: &str = "animation-play-state";

/// How one container's dispatch ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// `target` was switched to running during `frame`.
    Started { target: NodeKey, frame: u64 },
    AlreadyRunning { target: NodeKey },
    /// A dependency failed; `target` stays non-running for good.
    Failed {
        target: NodeKey,
        error: ResourceError,
    },
    /// The page stopped painting before the start could be applied.
    Abandoned { target: NodeKey },
    /// Nothing below the container is animated.
    Skipped,
}

impl DispatchOutcome {
    /// The element that was (or would have been) animated.
    pub const fn target(&self) -> Option<NodeKey> {
        match self {
            Self::Started { target, .. }
            | Self::AlreadyRunning { target }
            | Self::Failed { target, .. }
            | Self::Abandoned { target } => Some(*target),
            Self::Skipped => None,
        }
    }

    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// Whether the element's animation is running.
pub fn is_running(dom: &DOM, key: NodeKey) -> bool {
    dom.inline_style(key, PLAY_STATE)
        .is_some_and(|state| state.trim().eq_ignore_ascii_case("running"))
}

/// Run the dispatch procedure for one container.
pub async fn dispatch(page: Rc<HtmlPage>, container: NodeKey) -> DispatchOutcome {
    let animated_class = page.config().animated_class.clone();
    let mut target = container;
    loop {
        let (animated, dependent, child) = {
            let dom = page.dom();
            (
                dom.has_class(target, &animated_class),
                has_dependencies(&dom, target),
                dom.first_element_child(target),
            )
        };
        if animated {
            if dependent {
                let joins = JoinSet::collect(&page, target);
                if let Err(error) = joins.join().await {
                    debug!("{target}: not animating, {error}");
                    return DispatchOutcome::Failed { target, error };
                }
            }
            return start(&page, target).await;
        }
        let Some(next) = child else {
            trace!("{container}: nothing to animate");
            return DispatchOutcome::Skipped;
        };
        trace!("{target}: not animated, descending to {next}");
        target = next;
    }
}

/// Switch `target` to running on the next painted frame.
async fn start(page: &HtmlPage, target: NodeKey) -> DispatchOutcome {
    if is_running(&page.dom(), target) {
        return DispatchOutcome::AlreadyRunning { target };
    }
    let Ok(frame) = page.next_frame().await else {
        debug!("{target}: page stopped painting before the animation started");
        return DispatchOutcome::Abandoned { target };
    };
    if is_running(&page.dom(), target) {
        return DispatchOutcome::AlreadyRunning { target };
    }
    if let Err(err) = page.dom_mut().set_inline_style(target, PLAY_STATE, "running") {
        debug!("{target}: cannot start animation: {err}");
        return DispatchOutcome::Abandoned { target };
    }
    info!("{target}: animation running (frame {frame})");
    DispatchOutcome::Started { target, frame }
}
