//! # Colflow
//!
//! A column-native markup pagination engine.
//!
//! Long text on a wide screen is easiest to read the way a newspaper prints
//! it: in fixed-width columns that run side by side. Colflow takes a block of
//! markup (headings, paragraphs, lists, images, inline formatting) and
//! redistributes it into a row of equally tall columns, filling each one as
//! far as it goes without overflowing. Headings are never left hanging at
//! the foot of a column, short word runs are not stranded, and ordered lists
//! keep their numbering across the break.
//!
//! Colflow never computes text metrics. Every height comes from a
//! [`Measure`] oracle supplied by the host: a browser's layout engine over
//! wasm, a real text shaper, or the heuristic [`EstimatingOracle`].
//!
//! ## Architecture
//!
//! ```text
//! Input (markup + geometry)
//!       ↓
//!   [markup]   — Tree builder: top-level nodes, nesting kept inline
//!       ↓
//!   [layout]   — Column-fill search against the measure oracle
//!       ↓
//!   [layout::column_break] — Heading, list and progress corrections
//!       ↓
//!   [render]   — Step-wise render loop, restarts, image correction
//!       ↓
//! Output (Container of columns)
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod image_loader;
pub mod layout;
pub mod markup;
pub mod measure;
pub mod model;
pub mod render;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::{ColumnGeometry, FlowConfig};
pub use error::FlowError;
pub use measure::{EstimatingOracle, Measure};
pub use render::{ColumnRenderer, Container};

use image_loader::SourceImageLoader;

/// Lay `markup` out into columns in one call.
///
/// Runs the render loop to completion, loads images referenced by the
/// result from data URIs or the file system and applies the image
/// correction when needed.
pub fn paginate<M: Measure>(
    markup: &str,
    config: FlowConfig,
    geometry: ColumnGeometry,
    oracle: M,
) -> Result<Container, FlowError> {
    let mut renderer = ColumnRenderer::new(config, geometry, oracle);
    renderer.load(markup);
    render::run(&mut renderer, &SourceImageLoader::default())?;
    Ok(renderer.container().clone())
}

/// Lay out markup with configuration given as JSON.
pub fn paginate_json<M: Measure>(
    markup: &str,
    config_json: &str,
    geometry: ColumnGeometry,
    oracle: M,
) -> Result<Container, FlowError> {
    let config = FlowConfig::from_json(config_json)?;
    paginate(markup, config, geometry, oracle)
}
