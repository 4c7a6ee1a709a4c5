//! Observes containers and dispatches each one the first time it becomes visible.

use crate::dispatch::{DispatchOutcome, dispatch};
use html::NodeKey;
use log::{debug, info, trace};
use page_handler::HtmlPage;
use page_handler::viewport::ObserverId;
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task;

/// What happened to one container after it became visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    pub container: NodeKey,
    pub outcome: DispatchOutcome,
}

/// Start observing every container on the page.
///
/// Returns `None` without creating an observer when the page has no
/// containers. Entry batches are handled on a local task, so this must be
/// called from inside a `LocalSet`. Each container is unobserved as soon as
/// it intersects and is dispatched on its own task; the observer disconnects
/// once no container is left.
pub fn observe_containers(
    page: &Rc<HtmlPage>,
    reports: UnboundedSender<DispatchReport>,
) -> Option<ObserverId> {
    let config = page.config();
    let containers = page.dom().elements_by_class(&config.container_class);
    if containers.is_empty() {
        debug!("no .{} containers on the page", config.container_class);
        return None;
    }

    let (id, mut batches) = {
        let mut intersections = page.intersections().borrow_mut();
        let (id, batches) = intersections.create(config.visibility_threshold);
        for container in &containers {
            if let Err(err) = intersections.observe(id, *container) {
                debug!("cannot observe {container}: {err}");
            }
        }
        (id, batches)
    };
    info!("observing {} animation containers", containers.len());

    let page = Rc::downgrade(page);
    task::spawn_local(async move {
        while let Some(batch) = batches.recv().await {
            let Some(page) = page.upgrade() else {
                break;
            };
            for entry in batch.into_iter().filter(|entry| entry.is_intersecting) {
                let container = entry.target;
                // Already dispatched from an earlier entry.
                if !page.intersections().borrow_mut().unobserve(id, container) {
                    continue;
                }
                trace!("{container} entered the viewport (ratio {:.3})", entry.ratio);
                let reports = reports.clone();
                let page = Rc::clone(&page);
                task::spawn_local(async move {
                    let outcome = dispatch(page, container).await;
                    if reports.send(DispatchReport { container, outcome }).is_err() {
                        trace!("{container}: nobody is listening for dispatch reports");
                    }
                });
            }
            if page.intersections().borrow().observed_targets(id).is_empty() {
                page.intersections().borrow_mut().disconnect(id);
                break;
            }
        }
        trace!("observer {id:?} finished");
    });
    Some(id)
}
