//! Font-face set and effective font computation.
//!
//! Each registered face publishes its status on a `watch` channel so readers
//! can await the face settling. The set also publishes how many faces are
//! loading; "fonts ready" is the moment that count drops to zero.

use anyhow::{Error, anyhow};
use core::fmt;
use html::{DOM, NodeKey};
use log::{debug, trace};
use std::collections::HashMap;
use tokio::sync::watch;

pub use watch::error::RecvError;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        match value.split_ascii_whitespace().next()? {
            "normal" => Some(Self::Normal),
            "italic" => Some(Self::Italic),
            "oblique" => Some(Self::Oblique),
            _ => None,
        }
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Normal => "normal",
            Self::Italic => "italic",
            Self::Oblique => "oblique",
        })
    }
}

/// Identity of a font face: family, style and weight.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    /// Lowercase family name without quotes.
    pub family: String,
    pub style: FontStyle,
    pub weight: u16,
}

impl FontKey {
    #[must_use]
    pub fn new(family: &str, style: FontStyle, weight: u16) -> Self {
        Self {
            family: normalize_family(family),
            style,
            weight,
        }
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {} {}", self.style, self.weight, self.family)
    }
}

fn normalize_family(family: &str) -> String {
    family
        .trim()
        .trim_matches(|ch| ch == '"' || ch == '\'')
        .trim()
        .to_ascii_lowercase()
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FaceStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Error,
}

impl FaceStatus {
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Loaded | Self::Error)
    }
}

/// Awaitable view of one face's status.
#[derive(Clone, Debug)]
pub struct FaceHandle {
    status: watch::Receiver<FaceStatus>,
}

impl FaceHandle {
    #[must_use]
    pub fn status(&self) -> FaceStatus {
        *self.status.borrow()
    }

    /// Resolve once the face is loaded or errored, with the settled status.
    ///
    /// # Errors
    /// Returns `RecvError` if the face set went away while the face was unsettled.
    pub async fn settled(mut self) -> Result<FaceStatus, RecvError> {
        let status = self.status.wait_for(|status| status.is_settled()).await?;
        Ok(*status)
    }
}

/// Awaitable "all fonts ready" signal.
#[derive(Clone, Debug)]
pub struct FontsReady {
    loading: watch::Receiver<usize>,
}

impl FontsReady {
    /// Resolve once no face is loading.
    ///
    /// # Errors
    /// Returns `RecvError` if the face set went away while faces were loading.
    pub async fn wait(mut self) -> Result<(), RecvError> {
        self.loading.wait_for(|count| *count == 0).await?;
        Ok(())
    }
}

/// Read-only mapping of registered face keys to their readiness, taken at one instant.
#[derive(Clone, Debug, Default)]
pub struct FontSnapshot {
    faces: HashMap<FontKey, watch::Receiver<FaceStatus>>,
}

impl FontSnapshot {
    #[must_use]
    pub fn face(&self, key: &FontKey) -> Option<FaceHandle> {
        self.faces.get(key).map(|status| FaceHandle {
            status: status.clone(),
        })
    }
}

#[derive(Debug)]
pub struct FontFaceSet {
    faces: HashMap<FontKey, watch::Sender<FaceStatus>>,
    loading: watch::Sender<usize>,
}

impl Default for FontFaceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FontFaceSet {
    #[must_use]
    pub fn new() -> Self {
        let (loading, _) = watch::channel(0);
        Self {
            faces: HashMap::new(),
            loading,
        }
    }

    /// Register a face in the `Unloaded` state. Re-adding a known face is a no-op.
    pub fn add_face(&mut self, key: FontKey) {
        self.faces.entry(key).or_insert_with_key(|key| {
            trace!("font face {key} added");
            watch::channel(FaceStatus::Unloaded).0
        });
    }

    #[must_use]
    pub fn status(&self, key: &FontKey) -> Option<FaceStatus> {
        self.faces.get(key).map(|status| *status.borrow())
    }

    /// Update a face's status, keeping the loading count in step.
    ///
    /// # Errors
    /// Returns an error if the face was never added.
    pub fn set_status(&mut self, key: &FontKey, status: FaceStatus) -> Result<(), Error> {
        let sender = self
            .faces
            .get(key)
            .ok_or_else(|| anyhow!("font face {key} is not in the set"))?;
        let previous = sender.send_replace(status);
        let was_loading = previous == FaceStatus::Loading;
        let is_loading = status == FaceStatus::Loading;
        if was_loading != is_loading {
            self.loading.send_modify(|count| {
                *count = if is_loading {
                    count.saturating_add(1)
                } else {
                    count.saturating_sub(1)
                };
            });
        }
        debug!("font face {key}: {previous:?} -> {status:?}");
        Ok(())
    }

    /// Start loading an unloaded face. Returns whether a load was started.
    ///
    /// # Errors
    /// Returns an error if the face was never added.
    pub fn request_load(&mut self, key: &FontKey) -> Result<bool, Error> {
        match self.status(key) {
            Some(FaceStatus::Unloaded) => {
                self.set_status(key, FaceStatus::Loading)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(anyhow!("font face {key} is not in the set")),
        }
    }

    #[must_use]
    pub fn loading_count(&self) -> usize {
        *self.loading.borrow()
    }

    #[must_use]
    pub fn snapshot(&self) -> FontSnapshot {
        FontSnapshot {
            faces: self
                .faces
                .iter()
                .map(|(key, sender)| (key.clone(), sender.subscribe()))
                .collect(),
        }
    }

    #[must_use]
    pub fn ready(&self) -> FontsReady {
        FontsReady {
            loading: self.loading.subscribe(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &FontKey> + '_ {
        self.faces.keys()
    }
}

fn tag_weight(tag: &str) -> Option<u16> {
    matches!(tag, "b" | "strong" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6").then_some(700)
}

fn tag_style(tag: &str) -> Option<FontStyle> {
    matches!(tag, "i" | "em").then_some(FontStyle::Italic)
}

fn parse_weight(value: &str) -> Option<u16> {
    match value.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(400),
        "bold" => Some(700),
        other => other.parse::<u16>().ok().filter(|weight| (1..=1000).contains(weight)),
    }
}

fn parse_family(value: &str) -> Option<String> {
    let first = normalize_family(value.split(',').next()?);
    (!first.is_empty()).then_some(first)
}

/// Effective font of the element owning `node` (a text node's parent element).
///
/// Each property comes from the nearest element, walking outward, that
/// declares it inline or whose tag implies it.
#[must_use]
pub fn computed_font(dom: &DOM, node: NodeKey, default_family: &str) -> FontKey {
    let mut family = None;
    let mut style = None;
    let mut weight = None;
    for element in dom.ancestor_elements(node) {
        let tag = dom.tag_name(element).unwrap_or_default();
        if family.is_none() {
            family = dom
                .inline_style(element, "font-family")
                .as_deref()
                .and_then(parse_family);
        }
        if style.is_none() {
            style = dom
                .inline_style(element, "font-style")
                .as_deref()
                .and_then(FontStyle::parse)
                .or_else(|| tag_style(tag));
        }
        if weight.is_none() {
            weight = dom
                .inline_style(element, "font-weight")
                .as_deref()
                .and_then(parse_weight)
                .or_else(|| tag_weight(tag));
        }
        if family.is_some() && style.is_some() && weight.is_some() {
            break;
        }
    }
    FontKey {
        family: family.unwrap_or_else(|| normalize_family(default_family)),
        style: style.unwrap_or_default(),
        weight: weight.unwrap_or(400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_count_follows_status_changes() -> Result<(), Error> {
        let mut set = FontFaceSet::new();
        let inter = FontKey::new("Inter", FontStyle::Normal, 400);
        set.add_face(inter.clone());
        assert_eq!(set.status(&inter), Some(FaceStatus::Unloaded));

        assert!(set.request_load(&inter)?);
        assert!(!set.request_load(&inter)?);
        assert_eq!(set.loading_count(), 1);
        set.set_status(&inter, FaceStatus::Error)?;
        assert_eq!(set.loading_count(), 0);
        assert!(set.set_status(&FontKey::new("Nope", FontStyle::Normal, 400), FaceStatus::Loaded).is_err());
        Ok(())
    }

    #[test]
    fn snapshot_sees_later_status_updates() -> Result<(), Error> {
        let mut set = FontFaceSet::new();
        let key = FontKey::new("'Fira Sans'", FontStyle::Italic, 700);
        set.add_face(key.clone());
        let snapshot = set.snapshot();
        set.set_status(&key, FaceStatus::Loaded)?;
        let face = snapshot.face(&FontKey::new("fira sans", FontStyle::Italic, 700));
        assert_eq!(face.map(|handle| handle.status()), Some(FaceStatus::Loaded));
        Ok(())
    }

    #[test]
    fn computed_font_inherits_and_applies_tag_defaults() -> Result<(), Error> {
        let mut dom = DOM::new();
        let root = dom.root();
        let section = dom.append_element(
            root,
            "section",
            &[("style", "font-family: \"Playfair Display\", serif; font-weight: 300")],
        )?;
        let heading = dom.append_element(section, "h2", &[])?;
        let em = dom.append_element(heading, "em", &[])?;
        let text = dom.append_text(em, "Hi")?;
        let plain = dom.append_text(section, "body")?;

        assert_eq!(
            computed_font(&dom, text, "serif"),
            FontKey::new("playfair display", FontStyle::Italic, 700)
        );
        assert_eq!(
            computed_font(&dom, plain, "serif"),
            FontKey::new("Playfair Display", FontStyle::Normal, 300)
        );
        let loose = dom.append_element(root, "p", &[])?;
        assert_eq!(computed_font(&dom, loose, "Serif").to_string(), "normal 400 serif");
        Ok(())
    }
}
