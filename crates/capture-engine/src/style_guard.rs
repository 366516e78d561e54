//! Scoped, exception-safe style mutation.
//!
//! Every property is snapshotted the first time the guard touches it and
//! restored, in reverse order, when the guard is dropped. Restoration also
//! runs when the owning future is cancelled or a panic unwinds through it.

use crate::dom::{ElementId, PreviewDocument};

/// Original value of one inline style property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSnapshot {
    pub element: ElementId,
    pub property: String,
    /// `None` when the property was not set inline.
    pub value: Option<String>,
}

/// Acquire → mutate → guaranteed restore.
pub struct StyleGuard<'a, D: PreviewDocument + ?Sized> {
    doc: &'a D,
    styles: Vec<StyleSnapshot>,
    scrolls: Vec<(ElementId, (f64, f64))>,
}

impl<'a, D: PreviewDocument + ?Sized> StyleGuard<'a, D> {
    pub fn new(doc: &'a D) -> Self {
        Self {
            doc,
            styles: Vec::new(),
            scrolls: Vec::new(),
        }
    }

    /// Set an inline property, remembering its original value.
    pub fn set(&mut self, element: ElementId, property: &str, value: &str) {
        self.remember(element, property);
        self.doc.set_style_property(element, property, Some(value));
    }

    /// Scroll an element to its origin, remembering the previous offset.
    pub fn scroll_to_origin(&mut self, element: ElementId) {
        if !self.scrolls.iter().any(|(el, _)| *el == element) {
            let offset = self.doc.scroll_offset(element);
            self.scrolls.push((element, offset));
        }
        self.doc.set_scroll_offset(element, (0.0, 0.0));
    }

    /// Snapshots taken so far, in acquisition order.
    pub fn snapshots(&self) -> &[StyleSnapshot] {
        &self.styles
    }

    /// Restore now instead of at end of scope.
    pub fn restore(self) {
        // Drop does the work.
    }

    fn remember(&mut self, element: ElementId, property: &str) {
        let known = self
            .styles
            .iter()
            .any(|s| s.element == element && s.property == property);
        if !known {
            self.styles.push(StyleSnapshot {
                element,
                property: property.to_string(),
                value: self.doc.style_property(element, property),
            });
        }
    }

    fn restore_all(&mut self) {
        for snapshot in self.styles.drain(..).rev() {
            self.doc.set_style_property(
                snapshot.element,
                &snapshot.property,
                snapshot.value.as_deref(),
            );
        }
        for (element, offset) in self.scrolls.drain(..).rev() {
            self.doc.set_scroll_offset(element, offset);
        }
    }
}

impl<D: PreviewDocument + ?Sized> Drop for StyleGuard<'_, D> {
    fn drop(&mut self) {
        let restored = self.styles.len();
        self.restore_all();
        if restored > 0 {
            tracing::trace!(restored, "Restored export style overrides");
        }
    }
}
