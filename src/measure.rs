//! # Measurement
//!
//! The fill search never computes text metrics itself. It asks a
//! [`Measure`] implementation how tall a fragment of markup would be when
//! placed in a column of a given width. In a browser that is a scratch
//! element and `offsetHeight`; natively it can be a real text shaper.
//!
//! [`EstimatingOracle`] is a deterministic stand-in: fixed character advance,
//! fixed line height, block spacing and image boxes. It drives the CLI and
//! keeps tests independent of any rendering engine.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::image_loader::ImageSize;
use crate::render::Column;

/// Reports rendered sizes of markup fragments.
///
/// Calls must be idempotent from the caller's point of view: the same
/// fragment at the same width yields the same height.
pub trait Measure {
    /// Height of `html` laid out in a column `column_width` wide.
    fn measure_height(&self, html: &str, column_width: f64) -> f64;

    /// Realized width of a committed column.
    fn measure_width(&self, column: &Column) -> f64 {
        column.width
    }

    /// An image referenced by committed markup finished loading.
    fn image_loaded(&self, _src: &str, _size: ImageSize) {}
}

impl<F> Measure for F
where
    F: Fn(&str, f64) -> f64,
{
    fn measure_height(&self, html: &str, column_width: f64) -> f64 {
        self(html, column_width)
    }
}

/// Heuristic layout model used where no real layout engine is available.
#[derive(Debug)]
pub struct EstimatingOracle {
    /// Horizontal advance of one character.
    pub char_width: f64,
    /// Height of one line of body text.
    pub line_height: f64,
    /// Space after each paragraph-level block.
    pub block_spacing: f64,
    images: RefCell<HashMap<String, ImageSize>>,
}

impl Default for EstimatingOracle {
    fn default() -> Self {
        Self::new(7.0, 18.0, 12.0)
    }
}

impl EstimatingOracle {
    pub fn new(char_width: f64, line_height: f64, block_spacing: f64) -> Self {
        Self {
            char_width,
            line_height,
            block_spacing,
            images: RefCell::new(HashMap::new()),
        }
    }

    /// Register known image dimensions ahead of layout.
    pub fn with_image(self, src: &str, size: ImageSize) -> Self {
        self.images.borrow_mut().insert(src.to_string(), size);
        self
    }

    fn image_height(&self, attributes: &str, column_width: f64) -> f64 {
        let Some(src) = crate::image_loader::attribute_value(attributes, "src") else {
            return 0.0;
        };
        // Unloaded images occupy no space, as in a browser.
        let Some(size) = self.images.borrow().get(&src).copied() else {
            return 0.0;
        };
        if size.width == 0 {
            return 0.0;
        }
        let width = crate::image_loader::attribute_value(attributes, "width")
            .and_then(|w| w.parse::<f64>().ok())
            .unwrap_or(size.width as f64)
            .min(column_width);
        width * size.height as f64 / size.width as f64
    }

    fn lines(&self, chars: usize, scale: f64, column_width: f64) -> f64 {
        if chars == 0 {
            return 0.0;
        }
        let per_line = (column_width / (self.char_width * scale)).floor().max(1.0);
        (chars as f64 / per_line).ceil()
    }
}

impl Measure for EstimatingOracle {
    fn measure_height(&self, html: &str, column_width: f64) -> f64 {
        let mut height = 0.0;
        let mut run = TextRun::default();
        let mut scales: Vec<f64> = Vec::new();

        for token in tokenize(html) {
            match token {
                Token::Text(text) => run.push(text),
                Token::Tag { name, attributes, closing } => {
                    let name = name.to_ascii_lowercase();
                    match name.as_str() {
                        "br" => {
                            let scale = scales.last().copied().unwrap_or(1.0);
                            let lines = self.lines(run.take(), scale, column_width).max(1.0);
                            height += lines * self.line_height * scale;
                        }
                        "hr" => {
                            let scale = scales.last().copied().unwrap_or(1.0);
                            height += self.lines(run.take(), scale, column_width)
                                * self.line_height
                                * scale;
                        }
                        "img" => {
                            let scale = scales.last().copied().unwrap_or(1.0);
                            height += self.lines(run.take(), scale, column_width)
                                * self.line_height
                                * scale;
                            height += self.image_height(attributes, column_width);
                        }
                        _ if is_block(&name) => {
                            let scale = scales.last().copied().unwrap_or(1.0);
                            height += self.lines(run.take(), scale, column_width)
                                * self.line_height
                                * scale;
                            if closing {
                                scales.pop();
                                if has_spacing(&name) {
                                    height += self.block_spacing;
                                }
                            } else {
                                scales.push(heading_scale(&name).unwrap_or(
                                    scales.last().copied().unwrap_or(1.0),
                                ));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        let scale = scales.last().copied().unwrap_or(1.0);
        height + self.lines(run.take(), scale, column_width) * self.line_height * scale
    }

    fn image_loaded(&self, src: &str, size: ImageSize) {
        self.images.borrow_mut().insert(src.to_string(), size);
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "ul" | "ol" | "li" | "table" | "tr" | "blockquote" | "pre"
    ) || heading_scale(name).is_some()
}

fn has_spacing(name: &str) -> bool {
    matches!(name, "p" | "ul" | "ol" | "table" | "blockquote" | "pre")
        || heading_scale(name).is_some()
}

fn heading_scale(name: &str) -> Option<f64> {
    match name {
        "h1" => Some(2.0),
        "h2" => Some(1.5),
        "h3" => Some(1.25),
        "h4" | "h5" | "h6" => Some(1.0),
        _ => None,
    }
}

/// Visible characters accumulated since the last line break.
#[derive(Debug, Default)]
struct TextRun {
    chars: usize,
    last_was_space: bool,
}

impl TextRun {
    fn push(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                if self.chars > 0 && !self.last_was_space {
                    self.chars += 1;
                }
                self.last_was_space = true;
            } else {
                self.chars += 1;
                self.last_was_space = false;
            }
        }
    }

    fn take(&mut self) -> usize {
        let chars = if self.last_was_space {
            self.chars.saturating_sub(1)
        } else {
            self.chars
        };
        *self = Self::default();
        chars
    }
}

enum Token<'a> {
    Text(&'a str),
    Tag {
        name: &'a str,
        attributes: &'a str,
        closing: bool,
    },
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        if lt > 0 {
            tokens.push(Token::Text(&rest[..lt]));
        }
        let Some(gt) = rest[lt..].find('>') else {
            tokens.push(Token::Text(&rest[lt..]));
            return tokens;
        };
        let inner = rest[lt + 1..lt + gt].trim();
        let closing = inner.starts_with('/');
        let inner = inner.trim_start_matches('/').trim_end_matches('/').trim();
        let (name, attributes) = match inner.find(char::is_whitespace) {
            Some(space) => (&inner[..space], inner[space..].trim()),
            None => (inner, ""),
        };
        tokens.push(Token::Tag {
            name,
            attributes,
            closing,
        });
        rest = &rest[lt + gt + 1..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}
