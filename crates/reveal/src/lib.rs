//! Viewport-triggered animation readiness coordinator.
//!
//! Once the document is parsed, every animation container on the page is
//! observed for viewport entry. The first time a container becomes visible
//! it is dispatched: the animated element it stands for waits until its
//! images, videos and fonts are ready, then starts running on the next
//! painted frame. A container whose dependencies fail never animates.
//!
//! Everything runs on one thread inside a `tokio::task::LocalSet`.

pub mod aggregate;
pub mod dispatch;
pub mod observer;
pub mod predicates;
pub mod wait;

pub use aggregate::JoinSet;
pub use dispatch::{DispatchOutcome, dispatch, is_running};
pub use observer::{DispatchReport, observe_containers};
pub use wait::{Dependency, ResourceError, ResourceWait};

use page_handler::HtmlPage;
use std::rc::Rc;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

/// Startup priority the coordinator registers with by default.
pub const SETUP_PRIORITY: i32 = 10;

/// Hook the coordinator onto the page's startup gate.
///
/// Setup runs when the document finishes parsing, or right away if it
/// already has. A report arrives on the returned receiver for every
/// container that was dispatched; the channel closes once no container can
/// produce further reports.
pub fn install(page: &Rc<HtmlPage>, priority: i32) -> UnboundedReceiver<DispatchReport> {
    let (reports, receiver) = unbounded_channel();
    let weak = Rc::downgrade(page);
    page.startup().register(priority, move || {
        if let Some(page) = weak.upgrade() {
            observe_containers(&page, reports);
        }
    });
    receiver
}
