use eframe::egui::{self, Pos2, Rect, Vec2};

/// Aspect ratio (width / height) used for cards whose image is not loaded yet.
pub const PLACEHOLDER_ASPECT: f32 = 4.0 / 3.0;

const BALANCE_ITERATIONS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasonryStyle {
    pub max_columns: usize,
    pub column_width: f32,
    pub column_gap: f32,
    pub card_margin: f32,
    pub content_width_fraction: f32,
    pub selected_padding: f32,
    pub selected_width_factor: f32,
    pub selected_max_width: f32,
}

impl Default for MasonryStyle {
    fn default() -> Self {
        Self {
            max_columns: 5,
            column_width: 100.0,
            column_gap: 24.0,
            card_margin: 8.0,
            content_width_fraction: 0.9,
            selected_padding: 20.0,
            selected_width_factor: 1.5,
            selected_max_width: 400.0,
        }
    }
}

/// One card to lay out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardInput {
    pub aspect: f32,
    /// 0 for a plain card, 1 for the fully selected style.
    pub emphasis: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardLayout {
    pub column: usize,
    /// Card box including padding, excluding margins.
    pub outer: Rect,
    pub image: Rect,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MasonryLayout {
    pub columns: usize,
    pub column_width: f32,
    pub cards: Vec<CardLayout>,
    pub content_size: Vec2,
}

impl MasonryLayout {
    pub fn card(&self, index: usize) -> Option<&CardLayout> {
        self.cards.get(index)
    }

    /// Index of the card whose box contains `pos` (content coordinates).
    pub fn hit_test(&self, pos: Pos2) -> Option<usize> {
        self.cards.iter().position(|card| card.outer.contains(pos))
    }
}

pub fn column_count(content_width: f32, style: &MasonryStyle) -> usize {
    let span = style.column_width + style.column_gap;
    let fitting = if span > 0.0 {
        ((content_width + style.column_gap) / span).floor()
    } else {
        1.0
    };
    (fitting.max(1.0) as usize).clamp(1, style.max_columns.max(1))
}

/// Lays out cards in list order down balanced columns.
///
/// `surface_width` is the width of the content surface; the columns occupy
/// `content_width_fraction` of it, centered.
pub fn layout(surface_width: f32, cards: &[CardInput], style: &MasonryStyle) -> MasonryLayout {
    let content_width = (surface_width * style.content_width_fraction).max(0.0);
    let left = (surface_width - content_width) * 0.5;
    let columns = column_count(content_width, style);
    let column_width =
        ((content_width - style.column_gap * (columns - 1) as f32) / columns as f32).max(1.0);

    let sizes = cards
        .iter()
        .map(|card| card_size(column_width, *card, style))
        .collect::<Vec<_>>();
    let heights = sizes.iter().map(|size| size.box_height).collect::<Vec<_>>();
    let breaks = balance_columns(&heights, columns, style.card_margin);

    let mut laid_out = Vec::with_capacity(cards.len());
    let mut tallest: f32 = 0.0;
    let mut column = 0;
    let mut y = style.card_margin;
    for (index, size) in sizes.iter().enumerate() {
        if breaks.get(column).is_some_and(|start| *start == index) {
            column += 1;
            y = style.card_margin;
        }

        let column_left = left + column as f32 * (column_width + style.column_gap);
        let outer = Rect::from_min_size(
            egui::pos2(column_left, y),
            egui::vec2(column_width, size.box_height),
        );
        let image = Rect::from_center_size(
            outer.center(),
            egui::vec2(size.image_width, size.image_height),
        );
        laid_out.push(CardLayout {
            column,
            outer,
            image,
        });

        y = outer.max.y + style.card_margin;
        tallest = tallest.max(y);
    }

    MasonryLayout {
        columns,
        column_width,
        cards: laid_out,
        content_size: egui::vec2(surface_width, tallest),
    }
}

#[derive(Debug, Clone, Copy)]
struct CardSize {
    box_height: f32,
    image_width: f32,
    image_height: f32,
}

fn card_size(column_width: f32, card: CardInput, style: &MasonryStyle) -> CardSize {
    let emphasis = card.emphasis.clamp(0.0, 1.0);
    let aspect = if card.aspect.is_finite() && card.aspect > 0.0 {
        card.aspect
    } else {
        PLACEHOLDER_ASPECT
    };

    let padding = style.selected_padding * emphasis;
    let inner = (column_width - padding * 2.0).max(1.0);
    let enlarged = (inner * style.selected_width_factor).min(style.selected_max_width);
    let plain = column_width;
    let image_width = plain + (enlarged - plain) * emphasis;
    let image_height = image_width / aspect;

    CardSize {
        box_height: image_height + padding * 2.0,
        image_width,
        image_height,
    }
}

/// Returns the index at which each column after the first starts.
fn balance_columns(heights: &[f32], columns: usize, margin: f32) -> Vec<usize> {
    if columns <= 1 || heights.len() <= 1 {
        return Vec::new();
    }

    let total = heights.iter().map(|height| height + margin).sum::<f32>() + margin;
    let tallest = heights.iter().copied().fold(0.0_f32, f32::max) + margin * 2.0;

    let mut low = tallest;
    let mut high = total.max(tallest);
    for _ in 0..BALANCE_ITERATIONS {
        let mid = (low + high) * 0.5;
        if pack(heights, mid, margin).len() < columns {
            high = mid;
        } else {
            low = mid;
        }
    }

    let limit = if pack(heights, low, margin).len() < columns {
        low
    } else {
        high
    };
    pack(heights, limit, margin)
}

/// Greedy sequential fill with columns capped at `limit`; returns column starts
/// after the first.
fn pack(heights: &[f32], limit: f32, margin: f32) -> Vec<usize> {
    let mut breaks = Vec::new();
    let mut used = margin;
    for (index, height) in heights.iter().enumerate() {
        let needed = height + margin;
        if index > 0 && used + needed > limit + f32::EPSILON * limit.max(1.0) {
            breaks.push(index);
            used = margin;
        }
        used += needed;
    }
    breaks
}
