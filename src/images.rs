use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use eframe::egui::ColorImage;
use reqwest::blocking::Client;

use crate::renderer::render_texture_image;

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff", "ico",
];

const LOAD_WORKERS: usize = 4;

/// Position of an image in the startup order. Stable across reordering.
pub type ImageId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    Local(PathBuf),
    Remote(String),
}

impl ImageSource {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if is_remote_reference(trimmed) {
            Self::Remote(trimmed.to_string())
        } else {
            Self::Local(PathBuf::from(trimmed))
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| path.display().to_string()),
            Self::Remote(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                let location = without_query
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(without_query);
                match location.trim_end_matches('/').split_once('/') {
                    Some((_, tail)) => tail
                        .rsplit('/')
                        .next()
                        .filter(|segment| !segment.is_empty())
                        .unwrap_or(url)
                        .to_string(),
                    None => url.clone(),
                }
            }
        }
    }
}

/// An entry of the gallery's image list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub id: ImageId,
    pub source: ImageSource,
}

pub fn gallery_items(sources: Vec<ImageSource>) -> Vec<GalleryItem> {
    sources
        .into_iter()
        .enumerate()
        .map(|(id, source)| GalleryItem { id, source })
        .collect()
}

pub fn is_remote_reference(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn is_supported_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Turns launch inputs into image sources. Directories expand to their
/// supported image files, sorted by file name.
pub fn resolve_sources(inputs: &[String]) -> Result<Vec<ImageSource>> {
    let mut sources = Vec::new();
    for input in inputs {
        if input.trim().is_empty() {
            continue;
        }
        match ImageSource::parse(input) {
            ImageSource::Local(path) if path.is_dir() => {
                sources.extend(scan_directory(&path)?.into_iter().map(ImageSource::Local));
            }
            source => sources.push(source),
        }
    }
    Ok(sources)
}

pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Could not read image directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Could not list image directory {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && is_supported_image_path(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    log::debug!("found {} images in {}", paths.len(), dir.display());
    Ok(paths)
}

/// Reads a list file: one image reference per line, `#` starts a comment.
/// Relative paths resolve against the list file's directory.
pub fn read_source_list(path: &Path) -> Result<Vec<ImageSource>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Could not read image list {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let sources = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match ImageSource::parse(line) {
            ImageSource::Local(local) if local.is_relative() => {
                ImageSource::Local(base.join(local))
            }
            source => source,
        })
        .collect();
    Ok(sources)
}

pub fn build_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .context("Could not initialize HTTP client for remote images")
}

fn http_get_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("HTTP request failed for {url}"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {status} for {url}");
    }

    response
        .bytes()
        .map(|body| body.to_vec())
        .with_context(|| format!("Could not read response body from {url}"))
}

pub fn fetch_bytes(source: &ImageSource, client: Option<&Client>) -> Result<Vec<u8>> {
    match source {
        ImageSource::Local(path) => {
            fs::read(path).with_context(|| format!("Could not read {}", path.display()))
        }
        ImageSource::Remote(url) => {
            let Some(client) = client else {
                bail!("No HTTP client available for {url}");
            };
            http_get_bytes(client, url)
        }
    }
}

pub fn load_image(
    source: &ImageSource,
    client: Option<&Client>,
    max_dim: u32,
) -> Result<ColorImage> {
    let bytes = fetch_bytes(source, client)?;
    let decoded = image::load_from_memory(&bytes)
        .with_context(|| format!("Could not decode {}", source.label()))?;
    Ok(render_texture_image(&decoded, max_dim))
}

pub struct LoadedImage {
    pub id: ImageId,
    pub result: Result<ColorImage, String>,
}

/// Fetches and decodes `items` on background threads. Each result is sent as
/// soon as it is ready, followed by a call to `notify`.
pub fn spawn_image_loader<F>(
    items: Vec<GalleryItem>,
    max_dim: u32,
    notify: F,
) -> Receiver<LoadedImage>
where
    F: Fn() + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel::<LoadedImage>();
    thread::spawn(move || load_all(&items, max_dim, &tx, &notify));
    rx
}

fn load_all<F>(items: &[GalleryItem], max_dim: u32, tx: &Sender<LoadedImage>, notify: &F)
where
    F: Fn() + Sync,
{
    let needs_http = items
        .iter()
        .any(|item| matches!(item.source, ImageSource::Remote(_)));
    let client = if needs_http {
        match build_http_client() {
            Ok(client) => Some(client),
            Err(err) => {
                log::error!("{err:#}");
                None
            }
        }
    } else {
        None
    };

    let next = AtomicUsize::new(0);
    let workers = LOAD_WORKERS.min(items.len()).max(1);
    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let client = client.as_ref();
            let next = &next;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(item) = items.get(index) else {
                    break;
                };

                let result = load_image(&item.source, client, max_dim).map_err(|err| {
                    log::warn!("failed to load {}: {err:#}", item.source.label());
                    format!("Error loading {}: {err:#}", item.source.label())
                });
                if tx.send(LoadedImage { id: item.id, result }).is_err() {
                    break;
                }
                notify();
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
            .save(path)
            .expect("should write test png");
    }

    #[test]
    fn urls_are_remote_and_everything_else_is_local() {
        assert_eq!(
            ImageSource::parse("https://example.com/a.jpg"),
            ImageSource::Remote("https://example.com/a.jpg".to_string())
        );
        assert_eq!(
            ImageSource::parse(" HTTP://example.com/b.png "),
            ImageSource::Remote("HTTP://example.com/b.png".to_string())
        );
        assert_eq!(
            ImageSource::parse("photos/c.png"),
            ImageSource::Local(PathBuf::from("photos/c.png"))
        );
    }

    #[test]
    fn labels_use_the_last_path_segment() {
        assert_eq!(ImageSource::parse("/tmp/shots/one.png").label(), "one.png");
        assert_eq!(
            ImageSource::parse("https://cdn.example.com/img/two.jpg?w=400").label(),
            "two.jpg"
        );
        assert_eq!(
            ImageSource::parse("https://example.com").label(),
            "https://example.com"
        );
    }

    #[test]
    fn directories_expand_to_sorted_supported_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_png(&dir.path().join("b.png"), 2, 2);
        write_png(&dir.path().join("a.PNG"), 2, 2);
        fs::write(dir.path().join("notes.txt"), "not an image").expect("write notes");
        fs::create_dir(dir.path().join("nested.png")).expect("nested dir");

        let inputs = vec![
            dir.path().display().to_string(),
            "https://example.com/c.webp".to_string(),
        ];
        let sources = resolve_sources(&inputs).expect("sources should resolve");

        assert_eq!(
            sources,
            vec![
                ImageSource::Local(dir.path().join("a.PNG")),
                ImageSource::Local(dir.path().join("b.png")),
                ImageSource::Remote("https://example.com/c.webp".to_string()),
            ]
        );
    }

    #[test]
    fn list_files_skip_comments_and_resolve_relative_paths() {
        let dir = tempfile::tempdir().expect("temp dir");
        let list = dir.path().join("gallery.txt");
        fs::write(
            &list,
            "# holiday\nbeach.jpg\n\n  https://example.com/x.png  \n/abs/y.png\n",
        )
        .expect("write list");

        let sources = read_source_list(&list).expect("list should parse");

        assert_eq!(
            sources,
            vec![
                ImageSource::Local(dir.path().join("beach.jpg")),
                ImageSource::Remote("https://example.com/x.png".to_string()),
                ImageSource::Local(PathBuf::from("/abs/y.png")),
            ]
        );
    }

    #[test]
    fn gallery_items_number_sources_in_startup_order() {
        let items = gallery_items(vec![ImageSource::parse("a.png"), ImageSource::parse("b.png")]);
        assert_eq!(items[0].id, 0);
        assert_eq!(items[1].id, 1);
        assert_eq!(items[1].source, ImageSource::parse("b.png"));
    }

    #[test]
    fn load_image_decodes_and_downscales() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("wide.png");
        write_png(&path, 64, 16);

        let image = load_image(&ImageSource::Local(path), None, 32).expect("image should load");
        assert_eq!(image.size, [32, 8]);
    }

    #[test]
    fn remote_sources_need_a_client() {
        let err = fetch_bytes(&ImageSource::parse("https://example.com/a.png"), None)
            .expect_err("should fail without client");
        assert!(err.to_string().contains("No HTTP client"));
    }

    #[test]
    fn loader_reports_every_item_by_id() {
        let dir = tempfile::tempdir().expect("temp dir");
        let good = dir.path().join("good.png");
        write_png(&good, 4, 3);
        let items = gallery_items(vec![
            ImageSource::Local(good),
            ImageSource::Local(dir.path().join("missing.png")),
        ]);

        let rx = spawn_image_loader(items, 256, || {});
        let mut results = rx.iter().collect::<Vec<_>>();
        results.sort_by_key(|loaded| loaded.id);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].result.as_ref().map(|image| image.size), Ok([4, 3]));
        let err = results[1].result.as_ref().expect_err("missing file should fail");
        assert!(err.contains("missing.png"));
    }
}
