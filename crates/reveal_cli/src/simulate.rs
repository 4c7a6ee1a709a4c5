//! Scripted browsing session: scroll through the page while the network
//! delivers images, videos and fonts.
//!
//! Images marked `loading="lazy"` only load once they reach the viewport,
//! unless something switched them to eager loading. Media carrying a
//! `data-fail` attribute fail instead of loading. Every font face used by
//! the page is registered up front and loads after the first scroll step.

use crate::report::{DispatchEntry, SessionReport};
use anyhow::Error;
use html::NodeKey;
use log::{debug, info, warn};
use page_handler::HtmlPage;
use page_handler::fonts::{FaceStatus, FontKey, computed_font};
use page_handler::resources::ReadyState;
use reveal::{DispatchReport, SETUP_PRIORITY, install};
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;

/// Give up draining frames after this many extra turns.
const MAX_DRAIN_TURNS: usize = 64;

/// Register a face for every font the page's text uses and start loading it.
fn register_fonts(page: &HtmlPage) -> Result<usize, Error> {
    let keys: Vec<FontKey> = {
        let dom = page.dom();
        let mut keys = Vec::new();
        for run in dom.text_runs(dom.root()) {
            let key = computed_font(&dom, run, &page.config().default_font_family);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    };
    let mut fonts = page.fonts().borrow_mut();
    for key in &keys {
        fonts.add_face(key.clone());
        fonts.request_load(key)?;
    }
    Ok(keys.len())
}

fn load_fonts(page: &HtmlPage) -> Result<(), Error> {
    let mut fonts = page.fonts().borrow_mut();
    let loading: Vec<FontKey> = fonts
        .keys()
        .filter(|key| fonts.status(key) == Some(FaceStatus::Loading))
        .cloned()
        .collect();
    for key in &loading {
        fonts.set_status(key, FaceStatus::Loaded)?;
    }
    Ok(())
}

/// Deliver every image and video the network would have fetched by now.
fn deliver_media(page: &HtmlPage) {
    let viewport = page.viewport().rect();
    let (images, videos) = {
        let dom = page.dom();
        let root = dom.root();
        let images: Vec<(NodeKey, bool, bool)> = dom
            .descendants_by_tag(root, "img")
            .into_iter()
            .map(|image| {
                let lazy = dom.attr(image, "loading") == Some("lazy");
                (image, lazy, dom.attr(image, "data-fail").is_some())
            })
            .collect();
        let videos: Vec<(NodeKey, bool)> = dom
            .descendants_by_tag(root, "video")
            .into_iter()
            .map(|video| (video, dom.attr(video, "data-fail").is_some()))
            .collect();
        (images, videos)
    };

    let mut resources = page.resources().borrow_mut();
    for (image, lazy, fails) in images {
        let settled = resources
            .image(image)
            .is_some_and(|state| state.complete || state.errored);
        let visible = page
            .layout_box(image)
            .is_some_and(|bounds| bounds.intersection(&viewport).is_some());
        if settled || (lazy && !visible) {
            continue;
        }
        if fails {
            resources.fail_image(image);
        } else {
            resources.complete_image(image);
        }
    }
    for (video, fails) in videos {
        let settled = resources
            .video(video)
            .is_some_and(|state| state.errored || state.ready_state.has_current_data());
        if settled {
            continue;
        }
        if fails {
            resources.fail_video(video);
        } else {
            resources.set_video_ready_state(video, ReadyState::HaveEnoughData);
        }
    }
}

/// Wait out the frame budget, then run one page turn.
async fn tick(page: &HtmlPage) {
    sleep(page.config().frame_budget()).await;
    let outcome = page.turn().await;
    debug!("turn: {outcome:?}");
}

fn collect(page: &HtmlPage, reports: &mut UnboundedReceiver<DispatchReport>) -> Vec<DispatchEntry> {
    let dom = page.dom();
    let mut entries = Vec::new();
    while let Ok(report) = reports.try_recv() {
        entries.push(DispatchEntry::new(&dom, &report));
    }
    entries
}

/// Run a whole session over `page`, which must not have finished parsing yet.
///
/// # Errors
/// Returns an error if the page's font set rejects an update.
pub async fn run(page: Rc<HtmlPage>) -> Result<SessionReport, Error> {
    let mut reports = install(&page, SETUP_PRIORITY);
    let faces = register_fonts(&page)?;
    let boxes = page.apply_stack_layout();
    let containers = page
        .dom()
        .elements_by_class(&page.config().container_class)
        .len();
    info!("page has {containers} containers, {faces} font faces, {boxes} boxes");
    page.finish_parsing();

    let viewport = page.viewport();
    let step = (viewport.height / 2.0).max(1.0);
    let bottom = page.content_height();
    let mut scroll = 0.0;
    let mut dispatches = Vec::new();
    loop {
        page.scroll_to(0.0, scroll);
        tick(&page).await;
        deliver_media(&page);
        load_fonts(&page)?;
        tick(&page).await;
        dispatches.extend(collect(&page, &mut reports));
        if scroll + viewport.height >= bottom {
            break;
        }
        scroll += step;
    }

    let mut drained = 0;
    while page.pending_frames() > 0 {
        if drained == MAX_DRAIN_TURNS {
            warn!("{} frame callbacks still pending", page.pending_frames());
            break;
        }
        tick(&page).await;
        drained += 1;
    }
    dispatches.extend(collect(&page, &mut reports));

    Ok(SessionReport {
        containers,
        frames: page.frame_count(),
        deferred_frames: page.deferred_frames(),
        dispatches,
    })
}
