use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError};

use eframe::egui::{
    self, epaint::RectShape, Color32, ColorImage, Sense, TextureHandle, TextureId, TextureOptions,
};

use crate::gallery::Gallery;
use crate::images::{
    gallery_items, spawn_image_loader, GalleryItem, ImageId, ImageSource, LoadedImage,
    SUPPORTED_EXTENSIONS,
};
use crate::masonry::{self, CardInput, MasonryLayout, PLACEHOLDER_ASPECT};
use crate::renderer::{aspect_ratio, render_placeholder};
use crate::settings::Settings;
use crate::viewport::PanZoom;

pub const APP_TITLE: &str = "Centerpiece";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const FRAME_FILL: Color32 = Color32::from_rgb(0xf9, 0xf9, 0xf9);
const FRAME_STROKE: Color32 = Color32::from_rgb(0x33, 0x33, 0x33);
const FRAME_STROKE_WIDTH: f32 = 2.0;
const FRAME_ROUNDING: f32 = 12.0;
const IMAGE_ROUNDING: f32 = 8.0;
const ALT_TEXT_SIZE: f32 = 12.0;
const PLACEHOLDER_SIZE: [usize; 2] = [64, 48];

enum CardImage {
    Loading,
    Ready(TextureHandle),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardPhase {
    /// Emphasis as currently animating on screen.
    Animated,
    /// Emphasis after every transition has finished.
    Settled,
}

struct Placeholders {
    loading: TextureHandle,
    failed: TextureHandle,
}

pub struct GalleryApp {
    settings: Settings,
    gallery: Gallery<GalleryItem>,
    pan_zoom: PanZoom,
    images: HashMap<ImageId, CardImage>,
    placeholders: Option<Placeholders>,
    /// Cards as painted in the last frame.
    card_layout: MasonryLayout,
    pending_sources: Option<Vec<ImageSource>>,
    load_receiver: Option<Receiver<LoadedImage>>,
    loaded_count: usize,
    failed_count: usize,
    status_line: String,
}

impl Default for GalleryApp {
    fn default() -> Self {
        Self::new(Settings::default(), Vec::new(), None)
    }
}

impl GalleryApp {
    pub fn new(settings: Settings, sources: Vec<ImageSource>, initial_status: Option<String>) -> Self {
        let gallery = Gallery::new(Vec::new(), settings.gallery.focus());
        let pan_zoom = PanZoom::new(settings.viewport.clone());
        Self {
            settings,
            gallery,
            pan_zoom,
            images: HashMap::new(),
            placeholders: None,
            card_layout: MasonryLayout::default(),
            pending_sources: (!sources.is_empty()).then_some(sources),
            load_receiver: None,
            loaded_count: 0,
            failed_count: 0,
            status_line: initial_status.unwrap_or_default(),
        }
    }

    fn is_loading(&self) -> bool {
        self.pending_sources.is_some() || self.load_receiver.is_some()
    }

    fn can_open_images(&self) -> bool {
        self.gallery.is_empty() && !self.is_loading()
    }

    /// Builds the image list once. A populated gallery is only ever reordered.
    fn start_loading(&mut self, sources: Vec<ImageSource>, ctx: &egui::Context) {
        if !self.gallery.is_empty() {
            log::warn!("gallery already populated; ignoring {} new sources", sources.len());
            return;
        }
        if sources.is_empty() {
            self.status_line = "No images found.".to_string();
            return;
        }

        let items = gallery_items(sources);
        log::info!("loading {} images", items.len());
        self.images = items.iter().map(|item| (item.id, CardImage::Loading)).collect();
        self.gallery = Gallery::new(items.clone(), self.settings.gallery.focus());
        self.loaded_count = 0;
        self.failed_count = 0;

        let repaint_ctx = ctx.clone();
        self.load_receiver = Some(spawn_image_loader(
            items,
            self.settings.gallery.max_texture_dim,
            move || repaint_ctx.request_repaint(),
        ));
        self.refresh_status_line();
    }

    fn open_images_dialog(&mut self, ctx: &egui::Context) {
        let picked = rfd::FileDialog::new()
            .add_filter("Images", SUPPORTED_EXTENSIONS)
            .pick_files();

        if let Some(paths) = picked {
            self.pending_sources = Some(paths.into_iter().map(ImageSource::Local).collect());
            ctx.request_repaint();
        }
    }

    fn poll_image_loads(&mut self, ctx: &egui::Context) {
        let Some(receiver) = self.load_receiver.take() else {
            return;
        };

        let mut finished = false;
        loop {
            match receiver.try_recv() {
                Ok(loaded) => self.insert_loaded_image(loaded, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    finished = true;
                    break;
                }
            }
        }

        if finished {
            log::info!(
                "finished loading: {} ready, {} failed",
                self.loaded_count,
                self.failed_count
            );
        } else {
            self.load_receiver = Some(receiver);
        }
        self.refresh_status_line();
    }

    fn insert_loaded_image(&mut self, loaded: LoadedImage, ctx: &egui::Context) {
        let entry = match loaded.result {
            Ok(color_image) => {
                self.loaded_count += 1;
                CardImage::Ready(ctx.load_texture(
                    format!("gallery-image-{}", loaded.id),
                    color_image,
                    TextureOptions::LINEAR,
                ))
            }
            Err(err) => {
                self.failed_count += 1;
                CardImage::Failed(err)
            }
        };
        self.images.insert(loaded.id, entry);
    }

    fn refresh_status_line(&mut self) {
        let total = self.gallery.len();
        if total == 0 {
            return;
        }

        let done = self.loaded_count + self.failed_count;
        self.status_line = if self.load_receiver.is_some() {
            format!("Loading {done}/{total} images...")
        } else if self.failed_count > 0 {
            format!("{total} images, {} failed", self.failed_count)
        } else {
            format!("{total} images")
        };
    }

    fn placeholder_ids(&mut self, ctx: &egui::Context) -> (TextureId, TextureId) {
        let placeholders = self.placeholders.get_or_insert_with(|| {
            let [width, height] = PLACEHOLDER_SIZE;
            let texture = |name: &str, image: ColorImage| {
                ctx.load_texture(name, image, TextureOptions::LINEAR)
            };
            Placeholders {
                loading: texture(
                    "gallery-placeholder-loading",
                    render_placeholder(width, height, false),
                ),
                failed: texture(
                    "gallery-placeholder-failed",
                    render_placeholder(width, height, true),
                ),
            }
        });
        (placeholders.loading.id(), placeholders.failed.id())
    }

    fn card_inputs(&self, ctx: &egui::Context, phase: CardPhase) -> Vec<CardInput> {
        let selected = self.gallery.selected();
        let transition = self.settings.gallery.card_transition_secs();
        self.gallery
            .items()
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let is_selected = selected == Some(index);
                let emphasis = match phase {
                    CardPhase::Settled => f32::from(u8::from(is_selected)),
                    CardPhase::Animated => ctx.animate_bool_with_time(
                        egui::Id::new(("card-emphasis", item.id)),
                        is_selected,
                        transition,
                    ),
                };
                let aspect = match self.images.get(&item.id) {
                    Some(CardImage::Ready(texture)) => {
                        aspect_ratio(texture.size()).unwrap_or(PLACEHOLDER_ASPECT)
                    }
                    _ => PLACEHOLDER_ASPECT,
                };
                CardInput { aspect, emphasis }
            })
            .collect()
    }

    /// Handles a click on the card at `index` of the current order.
    fn select_card(&mut self, index: usize) {
        if let Some(item) = self.gallery.get(index) {
            log::info!("centering {}", item.source.label());
        }
        let middle = self.gallery.select_and_center(index, &mut self.pan_zoom);
        log::debug!(
            "selection {} moved card {index} to {middle}",
            self.gallery.generation()
        );
    }

    fn show_title_bar(&mut self, ctx: &egui::Context) -> bool {
        let mut open_clicked = false;
        egui::TopBottomPanel::top("titlebar")
            .exact_height(30.0)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.strong(format!("{APP_TITLE} v{APP_VERSION}"));
                    ui.separator();
                    let open_button = ui
                        .add_enabled(self.can_open_images(), egui::Button::new("Open Images..."));
                    if open_button.clicked() {
                        open_clicked = true;
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(&self.status_line);
                    });
                });
            });
        open_clicked
    }

    fn show_gallery_frame(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_rect_before_wrap();
        let frame_size = egui::vec2(
            self.settings.gallery.frame_width.min(available.width()),
            self.settings.gallery.frame_height.min(available.height()),
        );
        let frame_rect = egui::Rect::from_center_size(available.center(), frame_size);
        let response = ui.allocate_rect(frame_rect, Sense::click_and_drag());

        ui.painter().rect(
            frame_rect,
            FRAME_ROUNDING,
            FRAME_FILL,
            egui::Stroke::new(FRAME_STROKE_WIDTH, FRAME_STROKE),
        );
        let viewport_rect = frame_rect.shrink(FRAME_STROKE_WIDTH);
        if !viewport_rect.is_positive() {
            return;
        }

        if self.gallery.is_empty() {
            let message = if self.is_loading() {
                "Loading images..."
            } else {
                "Open images to start."
            };
            ui.painter().text(
                viewport_rect.center(),
                egui::Align2::CENTER_CENTER,
                message,
                egui::FontId::proportional(16.0),
                Color32::from_gray(90),
            );
            return;
        }

        let ctx = ui.ctx().clone();
        let now = ui.input(|input| input.time);
        self.pan_zoom.set_viewport(viewport_rect);
        self.pan_zoom.tick(now);

        let style = self.settings.gallery.masonry_style();
        let surface_width = viewport_rect.width();
        let settled = masonry::layout(
            surface_width,
            &self.card_inputs(&ctx, CardPhase::Settled),
            &style,
        );
        let animated = masonry::layout(
            surface_width,
            &self.card_inputs(&ctx, CardPhase::Animated),
            &style,
        );
        self.pan_zoom.set_content_size(settled.content_size);

        // The new order is laid out; a deferred centering can now resolve positions.
        self.gallery
            .on_layout_complete(&mut self.pan_zoom, |index| {
                settled.card(index).map(|card| card.outer)
            });

        let generation = self.gallery.generation();
        self.handle_viewport_input(ui, &response, &animated);
        self.card_layout = if self.gallery.generation() == generation {
            animated
        } else {
            // Reordered by this frame's click.
            masonry::layout(
                surface_width,
                &self.card_inputs(&ctx, CardPhase::Animated),
                &style,
            )
        };
        self.paint_cards(ui, viewport_rect);

        if self.pan_zoom.is_animating() || self.gallery.has_pending_center() {
            ctx.request_repaint();
        }
    }

    fn handle_viewport_input(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        layout: &MasonryLayout,
    ) {
        if response.dragged() {
            self.pan_zoom.drag(ui.input(|input| input.pointer.delta()));
        }
        if response.drag_stopped() {
            self.pan_zoom.release(ui.input(|input| input.pointer.velocity()));
        }

        if let Some(pointer) = response.hover_pos() {
            let (zoom_delta, scroll) =
                ui.input(|input| (input.zoom_delta(), input.smooth_scroll_delta.y));
            if (zoom_delta - 1.0).abs() > f32::EPSILON {
                self.pan_zoom.pinch(zoom_delta, pointer);
            } else if scroll.abs() > f32::EPSILON {
                self.pan_zoom.wheel(scroll, pointer);
            }

            if let Some(index) = layout.hit_test(self.pan_zoom.to_content(pointer)) {
                ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
                let failure = self
                    .gallery
                    .get(index)
                    .and_then(|item| match self.images.get(&item.id) {
                        Some(CardImage::Failed(message)) => Some(message.clone()),
                        _ => None,
                    });
                if let Some(message) = failure {
                    response.clone().on_hover_text(message);
                }
            }
        }

        // With double-click zoom off, the second click of a pair still selects.
        if response.double_clicked() {
            let zoomed = response
                .interact_pointer_pos()
                .is_some_and(|pointer| self.pan_zoom.double_click(pointer));
            if zoomed {
                return;
            }
        }

        if response.clicked() {
            let clicked_index = response
                .interact_pointer_pos()
                .and_then(|pointer| layout.hit_test(self.pan_zoom.to_content(pointer)));
            if let Some(index) = clicked_index {
                self.select_card(index);
                ui.ctx().request_repaint();
            }
        }
    }

    fn paint_cards(&mut self, ui: &egui::Ui, viewport_rect: egui::Rect) {
        let (loading_id, failed_id) = self.placeholder_ids(ui.ctx());
        let painter = ui.painter_at(viewport_rect);
        let scale = self.pan_zoom.scale();
        let uv = egui::Rect::from_min_max(egui::Pos2::ZERO, egui::pos2(1.0, 1.0));

        let cards = &self.card_layout.cards;
        for (index, (item, card)) in self.gallery.items().iter().zip(cards).enumerate() {
            let image_rect = self.pan_zoom.transform_rect(card.image);
            if !image_rect.intersects(viewport_rect) {
                continue;
            }

            let (texture_id, alt_text) = match self.images.get(&item.id) {
                Some(CardImage::Ready(texture)) => (texture.id(), None),
                Some(CardImage::Failed(_)) => (failed_id, Some(format!("img-{index}"))),
                Some(CardImage::Loading) | None => (loading_id, None),
            };

            let mut shape = RectShape::filled(image_rect, IMAGE_ROUNDING * scale, Color32::WHITE);
            shape.fill_texture_id = texture_id;
            shape.uv = uv;
            painter.add(shape);

            if let Some(alt_text) = alt_text {
                painter.text(
                    image_rect.center(),
                    egui::Align2::CENTER_CENTER,
                    alt_text,
                    egui::FontId::proportional(ALT_TEXT_SIZE * scale),
                    Color32::from_gray(90),
                );
            }
        }
    }

    fn show(&mut self, ctx: &egui::Context) {
        if let Some(sources) = self.pending_sources.take() {
            self.start_loading(sources, ctx);
        }
        self.poll_image_loads(ctx);

        if self.show_title_bar(ctx) {
            self.open_images_dialog(ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_gallery_frame(ui);
        });

        if self.is_loading() {
            ctx.set_cursor_icon(egui::CursorIcon::Progress);
        }
    }
}

impl eframe::App for GalleryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.show(ctx);
    }
}
