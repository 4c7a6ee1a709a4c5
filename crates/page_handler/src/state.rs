use crate::config::RevealConfig;
use crate::fonts::FontFaceSet;
use crate::layout::stack_layout;
use crate::resources::ResourceRegistry;
use crate::scheduler::{FrameScheduler, FrameTicket};
use crate::startup::StartupGate;
use crate::viewport::{IntersectionRegistry, Rect, Viewport};
use anyhow::Error;
use core::cell::{Cell, Ref, RefCell, RefMut};
use html::{DOM, NodeKey, parse_html};
use log::{debug, info, trace};
use once_cell::unsync::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::task::yield_now;
use tracing::info_span;

/// Scheduler yields in one `settle` pass.
const SETTLE_YIELDS: usize = 32;

/// Let local tasks run until they park on something outside the page.
pub async fn settle() {
    for _ in 0..SETTLE_YIELDS {
        yield_now().await;
    }
}

/// Structured outcome of a single `turn()`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Intersection entries queued this turn.
    pub entries: usize,
    /// Frame callbacks woken, or `None` if the frame was deferred by the budget.
    pub painted: Option<usize>,
}

/// A single page: the DOM plus the host services the reveal coordinator uses.
///
/// Shared between local tasks as `Rc<HtmlPage>`; each component sits in its
/// own `RefCell` and callers keep borrows short, never across an `.await`.
pub struct HtmlPage {
    config: RevealConfig,
    // The DOM of the page.
    dom: RefCell<DOM>,
    /// Built on first access and kept for the page's lifetime.
    startup: OnceCell<StartupGate>,
    resources: RefCell<ResourceRegistry>,
    fonts: RefCell<FontFaceSet>,
    intersections: RefCell<IntersectionRegistry>,
    /// Border boxes in page coordinates.
    layout: RefCell<HashMap<NodeKey, Rect>>,
    viewport: Cell<Viewport>,
    // Frame scheduler providing the next rendering opportunity
    frames: RefCell<FrameScheduler>,
}

impl HtmlPage {
    /// An empty page.
    #[must_use]
    pub fn new(config: RevealConfig) -> Rc<Self> {
        Self::with_dom(config, DOM::new())
    }

    #[must_use]
    pub fn with_dom(config: RevealConfig, dom: DOM) -> Rc<Self> {
        let viewport = Viewport::new(config.viewport_width, config.viewport_height);
        let frames = FrameScheduler::new(config.frame_budget());
        Rc::new(Self {
            dom: RefCell::new(dom),
            startup: OnceCell::new(),
            resources: RefCell::new(ResourceRegistry::new()),
            fonts: RefCell::new(FontFaceSet::new()),
            intersections: RefCell::new(IntersectionRegistry::new()),
            layout: RefCell::new(HashMap::new()),
            viewport: Cell::new(viewport),
            frames: RefCell::new(frames),
            config,
        })
    }

    /// Parse `source` into a new page. The startup gate stays closed until
    /// [`HtmlPage::finish_parsing`] is called.
    ///
    /// # Errors
    /// Returns an error if the document cannot be built.
    pub fn parse(config: RevealConfig, source: &str) -> Result<Rc<Self>, Error> {
        let dom = parse_html(source)?;
        Ok(Self::with_dom(config, dom))
    }

    pub const fn config(&self) -> &RevealConfig {
        &self.config
    }

    pub fn dom(&self) -> Ref<'_, DOM> {
        self.dom.borrow()
    }

    pub fn dom_mut(&self) -> RefMut<'_, DOM> {
        self.dom.borrow_mut()
    }

    /// The document-parsed gate, created on first use.
    pub fn startup(&self) -> &StartupGate {
        self.startup.get_or_init(|| {
            trace!("startup gate created");
            StartupGate::new()
        })
    }

    pub fn parsing_finished(&self) -> bool {
        self.startup.get().is_some_and(StartupGate::is_parsed)
    }

    /// Signal that the document structure is complete and run startup work.
    pub fn finish_parsing(&self) -> usize {
        let ran = self.startup().mark_parsed();
        info!("document parsing finished ({ran} startup callbacks)");
        ran
    }

    pub const fn resources(&self) -> &RefCell<ResourceRegistry> {
        &self.resources
    }

    pub const fn fonts(&self) -> &RefCell<FontFaceSet> {
        &self.fonts
    }

    pub const fn intersections(&self) -> &RefCell<IntersectionRegistry> {
        &self.intersections
    }

    pub fn set_layout_box(&self, key: NodeKey, rect: Rect) {
        self.layout.borrow_mut().insert(key, rect);
    }

    /// Replace every layout box.
    pub fn set_layout_boxes(&self, boxes: HashMap<NodeKey, Rect>) {
        *self.layout.borrow_mut() = boxes;
    }

    pub fn layout_box(&self, key: NodeKey) -> Option<Rect> {
        self.layout.borrow().get(&key).copied()
    }

    /// Lay the document out as stacked blocks at the viewport width.
    pub fn apply_stack_layout(&self) -> usize {
        let boxes = stack_layout(&self.dom.borrow(), self.viewport.get().width);
        let count = boxes.len();
        self.set_layout_boxes(boxes);
        count
    }

    /// Page height covered by layout boxes.
    pub fn content_height(&self) -> f32 {
        self.layout
            .borrow()
            .values()
            .map(Rect::bottom)
            .fold(0.0, f32::max)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    pub fn scroll_to(&self, scroll_x: f32, scroll_y: f32) {
        let mut viewport = self.viewport.get();
        viewport.scroll_x = scroll_x;
        viewport.scroll_y = scroll_y;
        self.viewport.set(viewport);
        trace!("scrolled to ({scroll_x}, {scroll_y})");
    }

    pub fn resize(&self, width: f32, height: f32) {
        let mut viewport = self.viewport.get();
        viewport.width = width;
        viewport.height = height;
        self.viewport.set(viewport);
    }

    /// Measure observed targets against the viewport and queue entries.
    pub fn compute_intersections(&self) -> usize {
        let _span = info_span!("page.compute_intersections").entered();
        let layout = self.layout.borrow();
        let queued = self
            .intersections
            .borrow_mut()
            .measure(self.viewport.get().rect(), &layout);
        if queued > 0 {
            debug!("queued {queued} intersection entries");
        }
        queued
    }

    /// Ticket for the next painted frame.
    pub fn next_frame(&self) -> FrameTicket {
        self.frames.borrow_mut().next_frame()
    }

    /// Paint a frame if the frame budget allows.
    pub fn run_frame(&self) -> Option<usize> {
        let _span = info_span!("page.run_frame").entered();
        self.frames.borrow_mut().run_frame()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().pending()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.borrow().frames()
    }

    pub fn deferred_frames(&self) -> u64 {
        self.frames.borrow().deferred()
    }

    /// One turn of the page's event loop: deliver intersections, let tasks
    /// react, paint a frame, and let tasks react to the frame.
    pub async fn turn(&self) -> TurnOutcome {
        let entries = self.compute_intersections();
        settle().await;
        let painted = self.run_frame();
        settle().await;
        TurnOutcome { entries, painted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr;

    #[test]
    fn startup_gate_is_created_once() {
        let page = HtmlPage::new(RevealConfig::default());
        assert!(!page.parsing_finished());
        let first: *const StartupGate = page.startup();
        assert!(ptr::eq(first, page.startup()));
        assert_eq!(page.finish_parsing(), 0);
        assert!(page.parsing_finished());
    }

    #[tokio::test]
    async fn turn_reports_entries_and_frames() -> Result<(), Error> {
        let config = RevealConfig::default().with_frame_budget_ms(0);
        let page = HtmlPage::parse(config, "<div data-height='100'>x</div>")?;
        page.apply_stack_layout();
        let target = page.dom().descendants_by_tag(page.dom().root(), "div")[0];
        let (id, mut batches) = page.intersections().borrow_mut().create(0.01);
        page.intersections().borrow_mut().observe(id, target)?;
        let mut ticket = page.next_frame();

        let outcome = page.turn().await;
        assert_eq!(outcome, TurnOutcome { entries: 1, painted: Some(1) });
        assert_eq!(ticket.try_recv(), Ok(1));
        assert!(batches.try_recv()?[0].is_intersecting);

        // Shrinking the viewport to nothing and moving the box away flips it back.
        page.resize(100.0, 0.0);
        page.set_layout_box(target, Rect::new(0.0, 500.0, 100.0, 100.0));
        assert_eq!(page.layout_box(target).map(|rect| rect.y), Some(500.0));
        assert_eq!(page.compute_intersections(), 1);
        assert!(!batches.try_recv()?[0].is_intersecting);
        Ok(())
    }
}
