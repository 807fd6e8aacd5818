use std::time::Duration;

use eframe::egui::{self, Pos2, Rect, Vec2};

use crate::gallery::ViewportController;
use crate::settings::ViewportSettings;

/// Scroll points treated as one wheel notch.
const WHEEL_NOTCH_POINTS: f32 = 50.0;
/// Pinch step at which the platform zoom factor is applied unchanged.
const REFERENCE_PINCH_STEP: f32 = 5.0;
const INERTIA_TIME_CONSTANT_SECS: f32 = 0.15;
const INERTIA_STOP_SPEED: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f32,
    pub offset: Vec2,
}

impl Transform {
    fn lerp(self, target: Self, t: f32) -> Self {
        Self {
            scale: self.scale + (target.scale - self.scale) * t,
            offset: self.offset + (target.offset - self.offset) * t,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Animation {
    from: Transform,
    to: Transform,
    start: f64,
    duration: f64,
}

fn ease_out(t: f32) -> f32 {
    t * (2.0 - t)
}

/// Pan/zoom state for a viewport showing a larger content surface.
///
/// A content point `p` is drawn at `viewport.min + offset + p * scale`.
#[derive(Debug, Clone)]
pub struct PanZoom {
    settings: ViewportSettings,
    viewport: Rect,
    content_size: Vec2,
    transform: Transform,
    animation: Option<Animation>,
    velocity: Vec2,
    now: f64,
    initialized: bool,
}

impl PanZoom {
    pub fn new(settings: ViewportSettings) -> Self {
        Self {
            settings,
            viewport: Rect::from_min_size(Pos2::ZERO, Vec2::ZERO),
            content_size: Vec2::ZERO,
            transform: Transform {
                scale: 1.0,
                offset: Vec2::ZERO,
            },
            animation: None,
            velocity: Vec2::ZERO,
            now: 0.0,
            initialized: false,
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn scale(&self) -> f32 {
        self.transform.scale
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some() || self.velocity != Vec2::ZERO
    }

    /// Records where the viewport sits on screen this frame.
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    /// Updates the unscaled content size. The first call with a non-empty
    /// content places the view at its initial position.
    pub fn set_content_size(&mut self, size: Vec2) {
        self.content_size = size;
        if !self.initialized && size.x > 0.0 && size.y > 0.0 && self.viewport.is_positive() {
            self.transform = self.initial_transform();
            self.initialized = true;
        } else if self.settings.limit_to_bounds && self.animation.is_none() {
            self.transform.offset = self.clamp_offset(self.transform.offset, self.transform.scale);
        }
    }

    /// Advances any running animation or inertia to `now` (seconds).
    pub fn tick(&mut self, now: f64) {
        let dt = (now - self.now).max(0.0) as f32;
        self.now = now;

        if let Some(animation) = self.animation {
            let elapsed = (now - animation.start) as f32;
            let progress = if animation.duration <= 0.0 {
                1.0
            } else {
                (elapsed / animation.duration as f32).clamp(0.0, 1.0)
            };
            self.transform = animation.from.lerp(animation.to, ease_out(progress));
            if progress >= 1.0 {
                self.transform = animation.to;
                self.animation = None;
            }
            return;
        }

        if self.velocity != Vec2::ZERO && dt > 0.0 {
            self.transform.offset += self.velocity * dt;
            if self.settings.limit_to_bounds {
                self.transform.offset =
                    self.clamp_offset(self.transform.offset, self.transform.scale);
            }
            self.velocity *= (-dt / INERTIA_TIME_CONSTANT_SECS).exp();
            if self.velocity.length() < INERTIA_STOP_SPEED {
                self.velocity = Vec2::ZERO;
            }
        }
    }

    pub fn to_screen(&self, content: Pos2) -> Pos2 {
        self.viewport.min + self.transform.offset + content.to_vec2() * self.transform.scale
    }

    pub fn to_content(&self, screen: Pos2) -> Pos2 {
        let local = screen - self.viewport.min - self.transform.offset;
        (local / self.transform.scale.max(f32::EPSILON)).to_pos2()
    }

    pub fn transform_rect(&self, content: Rect) -> Rect {
        Rect::from_min_max(self.to_screen(content.min), self.to_screen(content.max))
    }

    /// Wheel zoom around `pointer`; `scroll` is the vertical scroll in points.
    pub fn wheel(&mut self, scroll: f32, pointer: Pos2) {
        if scroll.abs() <= f32::EPSILON {
            return;
        }
        let notches = scroll / WHEEL_NOTCH_POINTS;
        let factor = (1.0 + self.settings.wheel_step * notches).max(0.05);
        self.zoom_at(self.transform.scale * factor, pointer);
    }

    /// Pinch zoom around `pointer`; `zoom_delta` is the platform's
    /// multiplicative zoom factor for this frame.
    pub fn pinch(&mut self, zoom_delta: f32, pointer: Pos2) {
        if (zoom_delta - 1.0).abs() <= f32::EPSILON || zoom_delta <= 0.0 {
            return;
        }
        let factor = zoom_delta.powf(self.settings.pinch_step / REFERENCE_PINCH_STEP);
        self.zoom_at(self.transform.scale * factor, pointer);
    }

    pub fn drag(&mut self, delta: Vec2) {
        self.interrupt();
        self.transform.offset += delta;
        if self.settings.limit_to_bounds {
            self.transform.offset = self.clamp_offset(self.transform.offset, self.transform.scale);
        }
    }

    /// Ends a drag gesture; keeps gliding when inertia is enabled.
    pub fn release(&mut self, velocity: Vec2) {
        if self.settings.velocity_disabled || velocity.length() < INERTIA_STOP_SPEED {
            self.velocity = Vec2::ZERO;
        } else {
            self.velocity = velocity;
        }
    }

    /// Returns `true` when the double click was consumed.
    pub fn double_click(&mut self, pointer: Pos2) -> bool {
        if self.settings.double_click_disabled {
            return false;
        }
        let target = self.transform.scale * (1.0 + self.settings.double_click_step);
        self.zoom_at(target, pointer);
        true
    }

    fn zoom_at(&mut self, scale: f32, pointer: Pos2) {
        self.interrupt();
        let scale = self.clamp_scale(scale);
        let old_scale = self.transform.scale;
        if (scale - old_scale).abs() <= f32::EPSILON {
            return;
        }
        let anchor = pointer - self.viewport.min;
        let ratio = scale / old_scale;
        let mut offset = anchor - (anchor - self.transform.offset) * ratio;
        if self.settings.limit_to_bounds {
            offset = self.clamp_offset(offset, scale);
        }
        self.transform = Transform { scale, offset };
    }

    fn interrupt(&mut self) {
        self.animation = None;
        self.velocity = Vec2::ZERO;
    }

    fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.settings.min_scale, self.settings.max_scale)
    }

    fn clamp_offset(&self, offset: Vec2, scale: f32) -> Vec2 {
        let viewport = self.viewport.size();
        let content = self.content_size * scale;
        let clamp_axis = |value: f32, viewport: f32, content: f32| {
            let diff = viewport - content;
            if diff >= 0.0 {
                value.clamp(0.0, diff)
            } else {
                value.clamp(diff, 0.0)
            }
        };
        egui::vec2(
            clamp_axis(offset.x, viewport.x, content.x),
            clamp_axis(offset.y, viewport.y, content.y),
        )
    }

    fn initial_transform(&self) -> Transform {
        let scale = self.clamp_scale(1.0);
        let offset = match self.settings.initial_position {
            Some([x, y]) => egui::vec2(x, y),
            None => (self.viewport.size() - self.content_size * scale) * 0.5,
        };
        let offset = if self.settings.limit_to_bounds {
            self.clamp_offset(offset, scale)
        } else {
            offset
        };
        Transform { scale, offset }
    }

    fn animate_to(&mut self, target: Transform, duration: Duration) {
        self.velocity = Vec2::ZERO;
        if duration.is_zero() {
            self.animation = None;
            self.transform = target;
            return;
        }
        self.animation = Some(Animation {
            from: self.transform,
            to: target,
            start: self.now,
            duration: duration.as_secs_f64(),
        });
    }
}

impl ViewportController for PanZoom {
    type Element = Rect;

    fn reset_transform(&mut self, duration: Duration) {
        let target = self.initial_transform();
        self.animate_to(target, duration);
    }

    fn zoom_to_element(&mut self, element: &Rect, scale: f32, duration: Duration) {
        let scale = self.clamp_scale(scale);
        let mut offset = (self.viewport.size() - element.size() * scale) * 0.5
            - element.min.to_vec2() * scale;
        if self.settings.limit_to_bounds {
            offset = self.clamp_offset(offset, scale);
        }
        self.animate_to(Transform { scale, offset }, duration);
    }
}
