//! # Images in Columns
//!
//! Committed column markup has every `<img>` tagged with the column width and
//! a deterministic id, and its `src` recorded. Once layout finishes, those
//! sources are preloaded: images that were measured before they loaded take
//! no space, so a column holding one may turn out taller than it was when
//! it was filled.
//!
//! Supported `src` formats for [`SourceImageLoader`]:
//! - `data:image/...;base64,...`: data URI
//! - File path: absolute, `./`/`../` relative, or relative to a base directory
//! - Raw base64-encoded image data

use std::io::Cursor;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::FlowError;
use crate::model::attribute_pairs;

/// Pixel dimensions of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// An image referenced from a committed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub src: String,
    pub column_id: String,
}

/// Add `width` and `id` attributes to every `<img` in `html` and collect the
/// image sources. Ids are `pic-<column id>-<n>`, counting from 1.
pub fn tag_images(html: &str, column_width: f64, column_id: &str) -> (String, Vec<ImageRef>) {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len() + 48);
    let mut images = Vec::new();
    let mut last = 0;

    for (n, (pos, _)) in lower.match_indices("<img").enumerate() {
        let after = pos + "<img".len();
        out.push_str(&html[last..after]);

        let tag_end = html[after..].find('>').map_or(html.len(), |i| after + i);
        let attributes = html[after..tag_end].trim_end_matches('/');
        if let Some(src) = attribute_value(attributes, "src") {
            images.push(ImageRef {
                src,
                column_id: column_id.to_string(),
            });
        }

        out.push_str(&format!(
            " width=\"{}\" id=\"pic-{}-{}\"",
            column_width,
            column_id,
            n + 1
        ));
        last = after;
    }
    out.push_str(&html[last..]);
    (out, images)
}

/// Look up one attribute in an opaque attribute string such as
/// `src="a.png" alt=photo`. Names compare case-insensitively.
pub fn attribute_value(attributes: &str, name: &str) -> Option<String> {
    attribute_pairs(attributes)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Loads images referenced by committed markup.
pub trait ImageLoader {
    fn load(&self, src: &str) -> Result<ImageSize, FlowError>;
}

/// Reads data URIs, file paths and raw base64 and reports pixel dimensions
/// without decoding the full image.
#[derive(Debug, Clone, Default)]
pub struct SourceImageLoader {
    /// Directory that plain relative paths resolve against.
    pub base_dir: Option<PathBuf>,
}

impl SourceImageLoader {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Resolve the source string to raw image bytes.
    fn read_source_bytes(&self, src: &str) -> Result<Vec<u8>, FlowError> {
        // Data URI: data:image/png;base64,iVBOR...
        if src.starts_with("data:image/") {
            let comma_pos = src
                .find(',')
                .ok_or_else(|| FlowError::Image("Invalid data URI: missing comma".to_string()))?;
            return base64_decode(&src[comma_pos + 1..]);
        }

        if src.starts_with("http://") || src.starts_with("https://") {
            return Err(FlowError::Image(format!(
                "Remote images are not fetched: '{}'",
                src
            )));
        }

        // Only explicit path prefixes count as paths, so base64 payloads
        // (which contain '/') are not mistaken for files.
        if src.starts_with('/') || src.starts_with("./") || src.starts_with("../") {
            return read_file(PathBuf::from(src));
        }

        if let Some(base) = &self.base_dir {
            let candidate = base.join(src);
            if candidate.is_file() {
                return read_file(candidate);
            }
        }

        base64_decode(src)
    }
}

impl ImageLoader for SourceImageLoader {
    fn load(&self, src: &str) -> Result<ImageSize, FlowError> {
        let bytes = self.read_source_bytes(src)?;
        image_dimensions(&bytes)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn read_file(path: PathBuf) -> Result<Vec<u8>, FlowError> {
    std::fs::read(&path).map_err(|e| {
        FlowError::Image(format!("Failed to read image file '{}': {}", path.display(), e))
    })
}

#[cfg(target_arch = "wasm32")]
fn read_file(path: PathBuf) -> Result<Vec<u8>, FlowError> {
    Err(FlowError::Image(format!(
        "File path images not supported in WASM: '{}'. Use data URIs or base64.",
        path.display()
    )))
}

fn base64_decode(input: &str) -> Result<Vec<u8>, FlowError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|e| FlowError::Image(format!("Base64 decode error: {}", e)))
}

/// Read dimensions from the image header.
fn image_dimensions(data: &[u8]) -> Result<ImageSize, FlowError> {
    if data.len() < 4 {
        return Err(FlowError::Image("Image data too short".to_string()));
    }
    let reader = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| FlowError::Image(format!("Image format detection error: {}", e)))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| FlowError::Image(format!("Failed to read image dimensions: {}", e)))?;
    Ok(ImageSize { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::new(width, height);
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            width,
            height,
            image::ColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn tags_every_image() {
        let html = "<p>x</p><img src=\"a.png\"/><IMG src=\"b.jpg\" alt=\"b\"/>";
        let (tagged, images) = tag_images(html, 240.0, "col_0");
        assert_eq!(
            tagged,
            "<p>x</p><img width=\"240\" id=\"pic-col_0-1\" src=\"a.png\"/>\
             <IMG width=\"240\" id=\"pic-col_0-2\" src=\"b.jpg\" alt=\"b\"/>"
        );
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].src, "a.png");
        assert_eq!(images[1].src, "b.jpg");
        assert_eq!(images[1].column_id, "col_0");
    }

    #[test]
    fn markup_without_images_is_untouched() {
        let (tagged, images) = tag_images("<p>plain</p>", 100.0, "c");
        assert_eq!(tagged, "<p>plain</p>");
        assert!(images.is_empty());
    }

    #[test]
    fn image_without_src_still_gets_an_id() {
        let (tagged, images) = tag_images("<img alt=\"none\"/>", 50.5, "c");
        assert_eq!(tagged, "<img width=\"50.5\" id=\"pic-c-1\" alt=\"none\"/>");
        assert!(images.is_empty());
    }

    #[test]
    fn reads_attribute_values() {
        let attrs = "src=\"pics/a.png\" ALT='A photo' width=300";
        assert_eq!(attribute_value(attrs, "src").as_deref(), Some("pics/a.png"));
        assert_eq!(attribute_value(attrs, "alt").as_deref(), Some("A photo"));
        assert_eq!(attribute_value(attrs, "width").as_deref(), Some("300"));
        assert_eq!(attribute_value(attrs, "height"), None);
        assert_eq!(attribute_value("", "src"), None);
    }

    #[test]
    fn loads_data_uri_dimensions() {
        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes(3, 2));
        let size = SourceImageLoader::default()
            .load(&format!("data:image/png;base64,{}", b64))
            .unwrap();
        assert_eq!(size, ImageSize { width: 3, height: 2 });
    }

    #[test]
    fn loads_raw_base64() {
        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes(1, 4));
        let size = SourceImageLoader::default().load(&b64).unwrap();
        assert_eq!(size, ImageSize { width: 1, height: 4 });
    }

    #[test]
    fn invalid_sources_fail() {
        let loader = SourceImageLoader::default();
        assert!(loader.load("data:image/png;base64").is_err());
        assert!(loader.load("https://example.com/a.png").is_err());
        assert!(loader.load("./does/not/exist.png").is_err());
        assert!(image_dimensions(&[0x00, 0x01]).is_err());
        assert!(image_dimensions(&[0x00, 0x01, 0x02, 0x03, 0x04]).is_err());
    }
}
