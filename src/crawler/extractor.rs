//! Media extraction from fetched HTML
//!
//! This module turns a page's raw HTML into the ordered list of media
//! references it embeds:
//! - `<img src="...">` elements become image records
//! - `<video src="...">` elements and `<source src="...">` elements nested
//!   under a `<video>` become video records
//!
//! Extraction is pure: no I/O, and the same input always yields the same
//! output.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

const IMAGE_FALLBACK_NAME: &str = "image";
const VIDEO_FALLBACK_NAME: &str = "unknown.mp4";

/// Kind of media a record points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Converts the media type to its database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Parses a media type from its database string representation
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One media reference extracted from a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    /// The task URL the reference was found under, exactly as submitted
    pub source_url: String,

    /// Absolute URL of the media, resolved against the page URL
    pub media_url: String,

    pub media_type: MediaType,

    /// Last path segment of the raw `src` attribute
    pub file_name: String,

    /// The `alt` attribute for images, always empty for videos
    pub alt_text: String,
}

/// Extracts every image and video reference from an HTML document
///
/// Images come first, then videos, each in document order. A reference whose
/// `src` cannot be resolved against `base` is skipped on its own; it never
/// fails the rest of the extraction.
///
/// # Arguments
///
/// * `source_url` - The task URL exactly as submitted, recorded on every record
/// * `base` - The parsed page URL that `src` values are resolved against
/// * `html` - The raw HTML content
///
/// # Example
///
/// ```
/// use media_sweep::crawler::{extract_media, MediaType};
/// use url::Url;
///
/// let raw = "HTTPS://X.test/dir/page.html";
/// let base = Url::parse(raw).unwrap();
/// let records = extract_media(raw, &base, r#"<img src="photo.jpg">"#);
/// assert_eq!(records[0].source_url, raw);
/// assert_eq!(records[0].media_url, "https://x.test/dir/photo.jpg");
/// assert_eq!(records[0].media_type, MediaType::Image);
/// ```
pub fn extract_media(source_url: &str, base: &Url, html: &str) -> Vec<MediaRecord> {
    let document = Html::parse_document(html);

    let mut records = extract_images(&document, source_url, base);
    records.extend(extract_videos(&document, source_url, base));
    records
}

/// Extracts image records from `<img>` elements
fn extract_images(document: &Html, source_url: &str, base: &Url) -> Vec<MediaRecord> {
    let mut images = Vec::new();

    if let Ok(img_selector) = Selector::parse("img[src]") {
        for element in document.select(&img_selector) {
            let Some(src) = non_empty_src(&element) else {
                continue;
            };

            let Some(media_url) = resolve_media(src, base) else {
                tracing::trace!("Dropping unresolvable image src {:?} on {}", src, base);
                continue;
            };

            images.push(MediaRecord {
                source_url: source_url.to_owned(),
                media_url,
                media_type: MediaType::Image,
                file_name: last_segment(src)
                    .unwrap_or(IMAGE_FALLBACK_NAME)
                    .to_string(),
                alt_text: element.value().attr("alt").unwrap_or_default().to_string(),
            });
        }
    }

    images
}

/// Extracts video records from `<video>` elements and their `<source>` children
fn extract_videos(document: &Html, source_url: &str, base: &Url) -> Vec<MediaRecord> {
    let mut videos = Vec::new();

    // A selector list matches in document order, so a <video> is yielded
    // before the <source> elements it contains.
    if let Ok(video_selector) = Selector::parse("video[src], video source[src]") {
        for element in document.select(&video_selector) {
            let Some(src) = non_empty_src(&element) else {
                continue;
            };

            let Some(media_url) = resolve_media(src, base) else {
                tracing::trace!("Dropping unresolvable video src {:?} on {}", src, base);
                continue;
            };

            let file_name = last_segment(src)
                .and_then(|segment| segment.split('?').next())
                .filter(|name| !name.is_empty())
                .unwrap_or(VIDEO_FALLBACK_NAME);

            videos.push(MediaRecord {
                source_url: source_url.to_owned(),
                media_url,
                media_type: MediaType::Video,
                file_name: file_name.to_string(),
                alt_text: String::new(),
            });
        }
    }

    videos
}

/// Returns the element's `src` attribute unless it is missing or empty
///
/// Only the empty string counts as "no source". A whitespace-only `src` is
/// kept: `Url::join` strips the whitespace and resolves it to the page itself,
/// which is what a browser requests for such an element.
fn non_empty_src<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    element.value().attr("src").filter(|src| !src.is_empty())
}

/// Resolves a media `src` against the page URL
///
/// Returns None if the reference cannot be turned into an absolute URL.
fn resolve_media(src: &str, base: &Url) -> Option<String> {
    base.join(src).ok().map(|absolute| absolute.to_string())
}

/// Returns the text after the last `/` of a raw `src`, if non-empty
fn last_segment(src: &str) -> Option<&str> {
    src.rsplit('/').next().filter(|segment| !segment.is_empty())
}
