//! Gathers a container's dependencies into one joined wait.

use crate::wait::{Dependency, ResourceError, ResourceWait, font_wait, image_wait, video_wait};
use futures::future::try_join_all;
use html::NodeKey;
use log::{debug, trace};
use page_handler::HtmlPage;
use page_handler::fonts::{FaceStatus, FontKey, computed_font};

/// Every wait needed before one container may animate.
///
/// Built from a single snapshot of the container's subtree: resources added
/// afterwards are not waited on.
pub struct JoinSet {
    container: NodeKey,
    dependencies: Vec<Dependency>,
    waits: Vec<ResourceWait>,
}

impl JoinSet {
    /// Build one wait per image and video below `container`, and one per
    /// distinct font used by its text runs.
    ///
    /// Registered faces that have not started loading are asked to load.
    pub fn collect(page: &HtmlPage, container: NodeKey) -> Self {
        let (images, videos, fonts) = {
            let dom = page.dom();
            let default_family = &page.config().default_font_family;
            let mut fonts: Vec<FontKey> = Vec::new();
            for run in dom.text_runs(container) {
                let key = computed_font(&dom, run, default_family);
                if !fonts.contains(&key) {
                    fonts.push(key);
                }
            }
            (
                dom.descendants_by_tag(container, "img"),
                dom.descendants_by_tag(container, "video"),
                fonts,
            )
        };
        let (snapshot, ready) = {
            let mut face_set = page.fonts().borrow_mut();
            for font in &fonts {
                if face_set.status(font) != Some(FaceStatus::Unloaded) {
                    continue;
                }
                match face_set.request_load(font) {
                    Ok(_) => trace!("{container}: started loading font {font}"),
                    Err(err) => debug!("{container}: cannot load font {font}: {err}"),
                }
            }
            (face_set.snapshot(), face_set.ready())
        };

        let mut dependencies = Vec::with_capacity(images.len() + videos.len() + fonts.len());
        let mut waits = Vec::with_capacity(dependencies.capacity());
        for image in images {
            waits.push(image_wait(page, image));
            dependencies.push(Dependency::Image(image));
        }
        for video in videos {
            waits.push(video_wait(page, video));
            dependencies.push(Dependency::Video(video));
        }
        for font in fonts {
            waits.push(font_wait(&snapshot, &ready, font.clone()));
            dependencies.push(Dependency::Font(font));
        }
        debug!("{container}: waiting on {} dependencies", dependencies.len());
        Self {
            container,
            dependencies,
            waits,
        }
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn len(&self) -> usize {
        self.waits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waits.is_empty()
    }

    /// Resolve once every wait resolves.
    ///
    /// # Errors
    /// Fails with the first rejection; the remaining waits are dropped.
    pub async fn join(self) -> Result<(), ResourceError> {
        if self.is_empty() {
            return Ok(());
        }
        let container = self.container;
        let count = self.len();
        try_join_all(self.waits).await?;
        debug!("{container}: all {count} dependencies ready");
        Ok(())
    }
}
