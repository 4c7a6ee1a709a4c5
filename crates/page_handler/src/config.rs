//! Configuration settings for the reveal coordinator and its host page.
//!
//! This module defines which classes mark animation containers, the
//! visibility threshold, frame budgeting and the simulated viewport.
//! Configuration can be loaded from environment variables or constructed
//! programmatically.

use core::time::Duration;
use std::env;

/// Class marking elements observed for viewport entry.
pub const DEFAULT_CONTAINER_CLASS: &str = "animate-on-scroll";
/// Class marking elements that carry the animation itself.
pub const DEFAULT_ANIMATED_CLASS: &str = "animated";
/// Fraction of a container's area that must be visible to trigger it.
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.01;

/// Runtime configuration for the reveal coordinator.
#[derive(Clone, Debug)]
pub struct RevealConfig {
    /// Class selecting animation containers.
    pub container_class: String,
    /// Class tagging an element as animated.
    pub animated_class: String,
    /// Intersection ratio in `[0, 1]` at which a container counts as visible.
    pub visibility_threshold: f32,
    /// Minimum interval between painted frames; 0 paints on every request.
    pub frame_budget_ms: u64,
    /// Viewport width in pixels
    pub viewport_width: f32,
    /// Viewport height in pixels
    pub viewport_height: f32,
    /// Font family used when no ancestor declares one.
    pub default_font_family: String,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            container_class: DEFAULT_CONTAINER_CLASS.to_owned(),
            animated_class: DEFAULT_ANIMATED_CLASS.to_owned(),
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            frame_budget_ms: 16,
            viewport_width: 1024.0,
            viewport_height: 768.0,
            default_font_family: "serif".to_owned(),
        }
    }
}

impl RevealConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `REVEAL_CONTAINER_CLASS`: container class (default: `animate-on-scroll`)
    /// - `REVEAL_ANIMATED_CLASS`: animated class (default: `animated`)
    /// - `REVEAL_THRESHOLD`: visibility threshold, clamped to `[0, 1]` (default: 0.01)
    /// - `REVEAL_FRAME_BUDGET_MS`: frame budget in milliseconds (default: 16)
    /// - `REVEAL_VIEWPORT_WIDTH` / `REVEAL_VIEWPORT_HEIGHT`: viewport size (default: 1024x768)
    /// - `REVEAL_DEFAULT_FONT`: fallback font family (default: `serif`)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let container_class = non_empty_var("REVEAL_CONTAINER_CLASS")
            .unwrap_or(defaults.container_class);
        let animated_class =
            non_empty_var("REVEAL_ANIMATED_CLASS").unwrap_or(defaults.animated_class);
        let visibility_threshold = env::var("REVEAL_THRESHOLD")
            .ok()
            .and_then(|val| val.parse::<f32>().ok())
            .filter(|val| val.is_finite())
            .unwrap_or(defaults.visibility_threshold)
            .clamp(0.0, 1.0);
        let frame_budget_ms = env::var("REVEAL_FRAME_BUDGET_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(defaults.frame_budget_ms);
        let viewport_width = env::var("REVEAL_VIEWPORT_WIDTH")
            .ok()
            .and_then(|val| val.parse::<f32>().ok())
            .unwrap_or(defaults.viewport_width);
        let viewport_height = env::var("REVEAL_VIEWPORT_HEIGHT")
            .ok()
            .and_then(|val| val.parse::<f32>().ok())
            .unwrap_or(defaults.viewport_height);
        let default_font_family =
            non_empty_var("REVEAL_DEFAULT_FONT").unwrap_or(defaults.default_font_family);
        Self {
            container_class,
            animated_class,
            visibility_threshold,
            frame_budget_ms,
            viewport_width,
            viewport_height,
            default_font_family,
        }
    }

    /// Get the frame budget as a `Duration`.
    #[must_use]
    pub const fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }

    #[must_use]
    pub fn with_frame_budget_ms(mut self, frame_budget_ms: u64) -> Self {
        self.frame_budget_ms = frame_budget_ms;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.visibility_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    #[must_use]
    pub fn with_classes(mut self, container_class: &str, animated_class: &str) -> Self {
        container_class.clone_into(&mut self.container_class);
        animated_class.clone_into(&mut self.animated_class);
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|val| val.trim().to_owned())
        .filter(|val| !val.is_empty())
}
