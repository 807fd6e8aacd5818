use std::time::Duration;

pub const DEFAULT_FOCUS_SCALE: f32 = 2.0;
pub const DEFAULT_FOCUS_DURATION: Duration = Duration::from_millis(300);

/// Pan/zoom surface driven by the gallery.
///
/// The gallery only ever resets the view and asks it to center on one element,
/// so tests can swap in a recorder instead of the real animated viewport.
pub trait ViewportController {
    type Element;

    fn reset_transform(&mut self, duration: Duration);

    fn zoom_to_element(&mut self, element: &Self::Element, scale: f32, duration: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusSettings {
    pub scale: f32,
    pub duration: Duration,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            scale: DEFAULT_FOCUS_SCALE,
            duration: DEFAULT_FOCUS_DURATION,
        }
    }
}

/// Centering deferred to the next layout pass. There is one slot, and each
/// selection overwrites it, so only the latest selection is ever centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCenter {
    generation: u64,
    index: usize,
}

/// Ordered image list plus the "bring to center" selection.
#[derive(Debug, Clone)]
pub struct Gallery<T> {
    items: Vec<T>,
    selected: Option<usize>,
    generation: u64,
    pending_center: Option<PendingCenter>,
    focus: FocusSettings,
}

impl<T> Gallery<T> {
    pub fn new(items: Vec<T>, focus: FocusSettings) -> Self {
        Self {
            items,
            selected: None,
            generation: 0,
            pending_center: None,
            focus,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending_center(&self) -> bool {
        self.pending_center.is_some()
    }

    /// Moves the clicked item to the middle of the list, selects it, and resets
    /// the viewport. Centering on the item is deferred until the next
    /// [`Gallery::on_layout_complete`], once the layout reflects the new order.
    ///
    /// Returns the new selected index, `floor((n - 1) / 2)`.
    ///
    /// # Panics
    ///
    /// Panics if `clicked_index` is out of range. Indices come from hit-testing
    /// the current layout, so that is a caller bug.
    pub fn select_and_center<V>(&mut self, clicked_index: usize, viewport: &mut V) -> usize
    where
        V: ViewportController + ?Sized,
    {
        let clicked = self.items.remove(clicked_index);
        let middle_index = self.items.len() / 2;
        self.items.insert(middle_index, clicked);

        self.selected = Some(middle_index);
        self.generation = self.generation.wrapping_add(1);

        viewport.reset_transform(Duration::ZERO);

        if let Some(superseded) = self.pending_center.replace(PendingCenter {
            generation: self.generation,
            index: middle_index,
        }) {
            log::debug!(
                "selection {} supersedes pending centering from selection {}",
                self.generation,
                superseded.generation
            );
        }
        log::debug!(
            "moved item {clicked_index} to {middle_index} (selection {})",
            self.generation
        );

        middle_index
    }

    /// Runs the deferred centering command, if any, against the freshly laid
    /// out view. `locate` maps a list position to the element currently drawn
    /// there.
    ///
    /// Returns `true` when a zoom command was issued.
    pub fn on_layout_complete<V, F>(&mut self, viewport: &mut V, locate: F) -> bool
    where
        V: ViewportController + ?Sized,
        F: FnOnce(usize) -> Option<V::Element>,
    {
        let Some(pending) = self.pending_center.take() else {
            return false;
        };

        let Some(element) = locate(pending.index) else {
            log::warn!(
                "no laid out element at position {}; skipping centering",
                pending.index
            );
            return false;
        };

        viewport.zoom_to_element(&element, self.focus.scale, self.focus.duration);
        true
    }
}
