use std::path::PathBuf;

use clap::Parser;

use crate::images::{read_source_list, resolve_sources, ImageSource};

const URI_SCHEME: &str = "centerpiece://";

/// Image gallery with click-to-center zoom.
#[derive(Debug, Clone, Parser)]
#[command(name = "centerpiece", version)]
pub struct Cli {
    /// Settings file to use instead of the one in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the effective settings as TOML and exit.
    #[arg(long)]
    pub print_settings: bool,

    /// Text file with one image path or URL per line.
    #[arg(long = "list", value_name = "FILE")]
    pub lists: Vec<PathBuf>,

    /// Image files, directories, http(s) URLs, or a single centerpiece:// link.
    #[arg(value_name = "SOURCE")]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    pub inputs: Vec<String>,
    pub lists: Vec<PathBuf>,
}

impl LaunchRequest {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.lists.is_empty()
    }

    /// Expands directories and list files into the startup image list.
    pub fn resolve_sources(&self) -> anyhow::Result<Vec<ImageSource>> {
        let mut sources = resolve_sources(&self.inputs)?;
        for list in &self.lists {
            sources.extend(read_source_list(list)?);
        }
        Ok(sources)
    }
}

pub fn launch_request_from_cli(cli: &Cli) -> Result<LaunchRequest, String> {
    let links = cli
        .sources
        .iter()
        .filter(|source| is_centerpiece_uri(source))
        .count();

    let mut request = match (links, cli.sources.len()) {
        (0, _) => LaunchRequest {
            inputs: cli.sources.clone(),
            lists: Vec::new(),
        },
        (1, 1) => parse_centerpiece_uri(&cli.sources[0])?,
        _ => {
            return Err("A centerpiece:// link must be the only SOURCE argument.".to_string());
        }
    };

    request.lists.extend(cli.lists.iter().cloned());
    Ok(request)
}

/// Parses `centerpiece://open?src=...&src=...` style links.
pub fn parse_centerpiece_uri(uri: &str) -> Result<LaunchRequest, String> {
    let rest =
        strip_uri_scheme(uri).ok_or_else(|| format!("URL must start with {URI_SCHEME}"))?;

    let (location, query) = split_location_and_query(rest);
    let mut request = LaunchRequest::default();

    if let Some(source) = parse_location_source(location)? {
        request.inputs.push(source);
    }

    if let Some(query_string) = query {
        for pair in query_string.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = key.trim().to_ascii_lowercase();
            let decoded_value = percent_decode(value)?;
            let trimmed = decoded_value.trim();
            match key.as_str() {
                "src" | "path" | "file" | "url" | "image" => {
                    if !trimmed.is_empty() {
                        request.inputs.push(trimmed.to_string());
                    }
                }
                "srcs" | "paths" | "files" | "images" => {
                    request.inputs.extend(
                        split_source_list(trimmed)
                            .into_iter()
                            .map(str::trim)
                            .filter(|source| !source.is_empty())
                            .map(str::to_string),
                    );
                }
                "list" => {
                    if !trimmed.is_empty() {
                        request.lists.push(PathBuf::from(trimmed));
                    }
                }
                other => log::debug!("ignoring unknown link parameter {other:?}"),
            }
        }
    }

    if request.is_empty() {
        return Err(
            "No image source found in link. Use src=..., paths=..., or list=...".to_string(),
        );
    }
    Ok(request)
}

fn is_centerpiece_uri(value: &str) -> bool {
    strip_uri_scheme(value).is_some()
}

fn strip_uri_scheme(uri: &str) -> Option<&str> {
    uri.get(..URI_SCHEME.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(URI_SCHEME))
        .map(|_| &uri[URI_SCHEME.len()..])
}

fn split_location_and_query(value: &str) -> (&str, Option<&str>) {
    match value.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (value, None),
    }
}

fn parse_location_source(location: &str) -> Result<Option<String>, String> {
    let location = location.trim();
    if location.is_empty() || location == "/" || location.eq_ignore_ascii_case("open") {
        return Ok(None);
    }

    let candidate = match location.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("open/") => &location[5..],
        _ => location,
    };
    let decoded = percent_decode(candidate)?;
    if decoded.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(decoded))
}

fn split_source_list(value: &str) -> Vec<&str> {
    if value.contains('|') {
        value.split('|').collect()
    } else {
        value.split(',').collect()
    }
}

fn percent_decode(value: &str) -> Result<String, String> {
    let invalid = || "Invalid percent-encoding in URL.".to_string();
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            b'%' => {
                let hi = bytes
                    .get(index + 1)
                    .copied()
                    .and_then(decode_hex_digit)
                    .ok_or_else(invalid)?;
                let lo = bytes
                    .get(index + 2)
                    .copied()
                    .and_then(decode_hex_digit)
                    .ok_or_else(invalid)?;
                decoded.push((hi << 4) | lo);
                index += 3;
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }

    String::from_utf8(decoded).map_err(|_| "URL contains invalid UTF-8 after decoding.".to_string())
}

fn decode_hex_digit(value: u8) -> Option<u8> {
    match value {
        b'0'..=b'9' => Some(value - b'0'),
        b'a'..=b'f' => Some(value - b'a' + 10),
        b'A'..=b'F' => Some(value - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("centerpiece").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn plain_arguments_become_inputs() {
        let request = launch_request_from_cli(&cli(&["a.png", "shots", "https://x.test/b.jpg"]))
            .expect("request should build");
        assert_eq!(request.inputs, vec!["a.png", "shots", "https://x.test/b.jpg"]);
        assert!(request.lists.is_empty());
    }

    #[test]
    fn no_arguments_is_an_empty_request() {
        let request = launch_request_from_cli(&cli(&[])).expect("request should build");
        assert!(request.is_empty());
    }

    #[test]
    fn config_and_list_flags_are_collected() {
        let cli = cli(&["--config", "my.toml", "--list", "a.txt", "--list", "b.txt", "c.png"]);
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        assert!(!cli.print_settings);

        let request = launch_request_from_cli(&cli).expect("request should build");
        assert_eq!(request.inputs, vec!["c.png"]);
        assert_eq!(
            request.lists,
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
        );
    }

    #[test]
    fn print_settings_flag_parses() {
        assert!(cli(&["--print-settings"]).print_settings);
    }

    #[test]
    fn single_link_is_decoded() {
        let request = launch_request_from_cli(&cli(&[
            "centerpiece://open?src=photos%2Fone.png&src=https%3A%2F%2Fx.test%2Ftwo.jpg",
        ]))
        .expect("link should parse");
        assert_eq!(
            request.inputs,
            vec!["photos/one.png", "https://x.test/two.jpg"]
        );
    }

    #[test]
    fn link_mixed_with_paths_is_rejected() {
        let error = launch_request_from_cli(&cli(&["centerpiece://open?src=a.png", "b.png"]))
            .expect_err("mixing should fail");
        assert!(error.contains("only SOURCE"));
    }

    #[test]
    fn link_path_lists_and_location_paths() {
        let request =
            parse_centerpiece_uri("CENTERPIECE://open/gallery%20dir?paths=a.png|b.png&list=l.txt")
                .expect("link should parse");
        assert_eq!(request.inputs, vec!["gallery dir", "a.png", "b.png"]);
        assert_eq!(request.lists, vec![PathBuf::from("l.txt")]);

        let request = parse_centerpiece_uri("centerpiece://open?files=a.png,%20b.png")
            .expect("comma lists should parse");
        assert_eq!(request.inputs, vec!["a.png", "b.png"]);
    }

    #[test]
    fn link_without_sources_is_an_error() {
        let error = parse_centerpiece_uri("centerpiece://open?zoom=2").expect_err("no sources");
        assert!(error.contains("No image source"));
    }

    #[test]
    fn bad_percent_encoding_is_reported() {
        let error = parse_centerpiece_uri("centerpiece://open?src=a%2").expect_err("bad escape");
        assert!(error.contains("percent-encoding"));
    }

    #[test]
    fn list_files_resolve_into_sources() {
        let dir = tempfile::tempdir().expect("temp dir");
        let list = dir.path().join("list.txt");
        std::fs::write(&list, "one.png\nhttps://x.test/two.png\n").expect("write list");

        let request = LaunchRequest {
            inputs: vec!["zero.png".to_string()],
            lists: vec![list],
        };
        let sources = request.resolve_sources().expect("sources should resolve");

        assert_eq!(
            sources,
            vec![
                ImageSource::parse("zero.png"),
                ImageSource::Local(dir.path().join("one.png")),
                ImageSource::parse("https://x.test/two.png"),
            ]
        );
    }
}
