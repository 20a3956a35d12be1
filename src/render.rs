//! # Render Loop
//!
//! [`ColumnRenderer`] turns loaded markup into a [`Container`] of columns,
//! one column per [`ColumnRenderer::step`]. Between steps the host is free to
//! repaint, handle input, or ask for a new render. Asking while a run is in
//! flight does not start a second run: the current one is flagged, stops at
//! its next step and tells the host to restart after a short delay.
//!
//! ```text
//!            render()                    step() ... step()
//!   Idle ─────────────────▶ Running ─────────────────────────▶ Idle
//!                             │  ▲                          (Finished)
//!          render() while     │  │ re_render()
//!          running, step()    ▼  │
//!                         RestartPending
//! ```
//!
//! Once a run finishes, the images it placed are loaded by the host and
//! reported through [`ColumnRenderer::image_loaded`]. Images measured before
//! they loaded took no space, so when the last one arrives each column
//! holding an image is measured again, and one that grew well past the
//! budget triggers a single corrective restart.
//!
//! [`run`] drives the whole cycle synchronously for hosts without an event
//! loop, such as the CLI.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;

use crate::config::{ColumnGeometry, FlowConfig};
use crate::error::FlowError;
use crate::events::{EventSink, FlowEvent, Listeners, RenderedEvent};
use crate::ids::{IdGenerator, UuidIds};
use crate::image_loader::{tag_images, ImageLoader, ImageRef, ImageSize};
use crate::layout::column_break::{continue_ordered_list, ensure_progress, hold_back_headings};
use crate::layout::ColumnFiller;
use crate::markup;
use crate::measure::Measure;
use crate::model::{serialize, ContentNode, NodeSequence};

/// One committed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub class_name: String,
    pub html: String,
    pub width: f64,
    pub height: f64,
}

impl Column {
    pub fn to_html(&self) -> String {
        format!(
            "<div id=\"{}\" class=\"{}\" style=\"height:{}px\">{}</div>",
            self.id, self.class_name, self.height, self.html
        )
    }

    /// True when the column holds a single image and nothing else.
    fn is_lone_image(&self) -> bool {
        self.html.starts_with("<img") && self.html.split('>').count() <= 2
    }
}

/// The columns of one layout, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub selector: String,
    /// Total width of all columns including their margins.
    pub width: f64,
    pub columns: Vec<Column>,
}

impl Container {
    fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            ..Default::default()
        }
    }

    pub fn to_html(&self) -> String {
        self.columns
            .iter()
            .map(Column::to_html)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text of every column with tags removed, for comparing layouts.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for column in &self.columns {
            let mut inside = false;
            for c in column.html.chars() {
                match c {
                    '<' => inside = true,
                    '>' => inside = false,
                    _ if !inside => text.push(c),
                    _ => {}
                }
            }
        }
        text
    }
}

/// Outcome of [`ColumnRenderer::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStart {
    /// A fresh run began.
    Started,
    /// A run was already in flight; it will stop and restart.
    Deferred,
}

/// Outcome of one [`ColumnRenderer::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A column was committed and content remains.
    Continue,
    /// The run was abandoned. Call [`ColumnRenderer::re_render`] after the
    /// delay.
    RestartAfter(Duration),
    /// The last column was committed.
    Finished(RenderedEvent),
    /// Nothing to do.
    Idle,
}

/// Outcome of [`ColumnRenderer::image_loaded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCheck {
    /// More images are still loading.
    Pending(usize),
    /// All images are in and the layout stands.
    Settled,
    /// A column overflowed once its images loaded; a new run has started.
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    RestartPending,
}

/// Per-run state, rebuilt by every render.
#[derive(Debug, Default)]
struct RenderState {
    remaining: NodeSequence,
    budget: f64,
    column_index: usize,
    /// Characters placed so far, for the start hint of the next column.
    placed_chars: usize,
    max_height: f64,
    images: Vec<ImageRef>,
    pending_images: usize,
}

impl RenderState {
    /// Number of leading nodes that make up an average column so far.
    fn start_hint(&self) -> usize {
        if self.column_index == 0 {
            return 0;
        }
        let average = self.placed_chars as f64 / self.column_index as f64;
        let mut chars = 0.0;
        let mut count = 0;
        for node in &self.remaining {
            if chars >= average {
                break;
            }
            chars += node.len() as f64;
            count += 1;
        }
        count
    }
}

/// Lays markup out into fixed-size columns.
pub struct ColumnRenderer<M: Measure> {
    config: FlowConfig,
    geometry: ColumnGeometry,
    oracle: M,
    ids: Box<dyn IdGenerator>,
    events: Box<dyn EventSink>,
    source: Option<String>,
    id_prefix: String,
    phase: Phase,
    abort_requested: bool,
    image_correction_used: bool,
    state: RenderState,
    container: Container,
}

impl<M: Measure> ColumnRenderer<M> {
    pub fn new(config: FlowConfig, geometry: ColumnGeometry, oracle: M) -> Self {
        let container = Container::new(&config.container_selector);
        Self {
            config,
            geometry,
            oracle,
            ids: Box::new(UuidIds::default()),
            events: Box::new(Listeners::new()),
            source: None,
            id_prefix: String::new(),
            phase: Phase::Idle,
            abort_requested: false,
            image_correction_used: false,
            state: RenderState::default(),
            container,
        }
    }

    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_events(mut self, events: impl EventSink + 'static) -> Self {
        self.events = Box::new(events);
        self
    }

    /// Take the markup to lay out. Column ids of every later run share a
    /// fresh prefix.
    pub fn load(&mut self, markup: &str) {
        self.source = Some(markup.to_string());
        self.id_prefix = format!("{}_", self.ids.next_id());
    }

    /// Start a run. If one is already running it is asked to restart
    /// instead.
    pub fn render(&mut self) -> Result<RenderStart, FlowError> {
        if self.source.is_none() {
            return Err(FlowError::NotInitialized);
        }
        self.image_correction_used = false;
        if self.phase == Phase::Running {
            debug!(target: "colflow::render", "render requested mid-run, aborting");
            self.abort_requested = true;
            return Ok(RenderStart::Deferred);
        }
        self.start_run()
    }

    /// Restart after an aborted run.
    pub fn re_render(&mut self) -> Result<RenderStart, FlowError> {
        self.abort_requested = false;
        self.phase = Phase::Idle;
        self.start_run()
    }

    /// The available height changed. Re-renders when it moved by more than
    /// the configured threshold.
    pub fn resize(&mut self, height: f64) -> Result<Option<RenderStart>, FlowError> {
        if (self.geometry.height - height).abs() <= self.config.resize_threshold {
            return Ok(None);
        }
        debug!(target: "colflow::render", "resize {} -> {}", self.geometry.height, height);
        self.geometry.height = height;
        self.render().map(Some)
    }

    /// Lay out one column.
    pub fn step(&mut self) -> Step {
        if self.phase != Phase::Running {
            return Step::Idle;
        }
        if self.abort_requested {
            debug!(
                target: "colflow::render",
                "run aborted after {} columns",
                self.container.columns.len()
            );
            self.phase = Phase::RestartPending;
            return Step::RestartAfter(self.config.restart_delay());
        }
        if self.state.remaining.is_empty() {
            return Step::Finished(self.finish());
        }

        let column_id = format!("{}{}", self.id_prefix, self.state.column_index);
        let hint = self.state.start_hint();
        let nodes = std::mem::take(&mut self.state.remaining);
        let filler = ColumnFiller::new(
            &self.oracle,
            &self.config,
            self.state.budget,
            self.geometry.width,
        );
        let mut placement = filler.fill(nodes, hint);

        let held = hold_back_headings(&mut placement, &self.config);
        if held > 0 {
            debug!(
                target: "colflow::render",
                "{}: held back {} trailing headings",
                column_id,
                held
            );
        }
        if let Some(start) = continue_ordered_list(&mut placement) {
            debug!(target: "colflow::render", "{}: list continues at {}", column_id, start);
        }
        if ensure_progress(&mut placement) {
            debug!(
                target: "colflow::render",
                "{}: first node overflows, placing it anyway",
                column_id
            );
        }

        self.state.placed_chars += placement.added_chars();
        self.state.remaining = placement.remaining;
        self.commit(column_id, &placement.added);

        if self.state.remaining.is_empty() {
            Step::Finished(self.finish())
        } else {
            Step::Continue
        }
    }

    /// Report an image load. A failed load counts as loaded.
    pub fn image_loaded(
        &mut self,
        src: &str,
        result: Result<ImageSize, FlowError>,
    ) -> Result<ImageCheck, FlowError> {
        match result {
            Ok(size) => self.oracle.image_loaded(src, size),
            Err(e) => warn!(target: "colflow::render", "image {} failed to load: {}", src, e),
        }
        if self.state.pending_images == 0 {
            return Ok(ImageCheck::Settled);
        }
        self.state.pending_images -= 1;
        if self.state.pending_images > 0 {
            return Ok(ImageCheck::Pending(self.state.pending_images));
        }

        if !self.columns_overflow_with_images() {
            return Ok(ImageCheck::Settled);
        }
        if self.image_correction_used {
            debug!(target: "colflow::render", "columns still overflow after image restart");
            return Ok(ImageCheck::Settled);
        }
        debug!(target: "colflow::render", "images made a column overflow, restarting");
        self.image_correction_used = true;
        self.start_run()?;
        Ok(ImageCheck::Restart)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn geometry(&self) -> &ColumnGeometry {
        &self.geometry
    }

    pub fn oracle(&self) -> &M {
        &self.oracle
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Images placed by the last finished run.
    pub fn images(&self) -> &[ImageRef] {
        &self.state.images
    }

    pub fn pending_images(&self) -> usize {
        self.state.pending_images
    }

    fn start_run(&mut self) -> Result<RenderStart, FlowError> {
        let source = self.source.as_deref().ok_or(FlowError::NotInitialized)?;
        let nodes = markup::parse(source);
        debug!(
            target: "colflow::render",
            "render {} nodes into {}x{} columns",
            nodes.len(),
            self.geometry.width,
            self.geometry.height
        );
        self.state = RenderState {
            remaining: nodes,
            budget: self.geometry.height - self.config.extra_height_margin,
            ..Default::default()
        };
        self.container = Container::new(&self.config.container_selector);
        self.abort_requested = false;
        self.phase = Phase::Running;
        Ok(RenderStart::Started)
    }

    fn commit(&mut self, id: String, added: &[ContentNode]) {
        let html = strip_edge_breaks(&serialize(added, None));
        let (html, images) = tag_images(&html, self.geometry.width, &id);
        let mut column = Column {
            id,
            class_name: self.config.column_class_name.clone(),
            html,
            width: self.geometry.width,
            height: 0.0,
        };
        column.height = self.oracle.measure_height(&column.html, column.width);
        column.width = self.oracle.measure_width(&column);
        debug!(
            target: "colflow::render",
            "{}: {} nodes, height {:.1} of {:.1}",
            column.id,
            added.len(),
            column.height,
            self.state.budget
        );

        self.state.max_height = self.state.max_height.max(column.height);
        self.state.images.extend(images);
        self.state.column_index += 1;
        self.container.width += column.width + self.geometry.margin;
        self.container.columns.push(column);
    }

    fn finish(&mut self) -> RenderedEvent {
        for column in &mut self.container.columns {
            column.height = self.state.max_height;
        }
        self.state.pending_images = self.state.images.len();
        self.phase = Phase::Idle;
        self.abort_requested = false;

        let event = RenderedEvent {
            width: self.container.width,
            columns: self.container.columns.len(),
        };
        debug!(
            target: "colflow::render",
            "rendered {} columns, width {}",
            event.columns,
            event.width
        );
        self.events.fire(&FlowEvent::Rendered(event.clone()));
        event
    }

    fn columns_overflow_with_images(&self) -> bool {
        let limit = self.state.max_height.max(self.state.budget);
        let mut checked: Vec<&str> = Vec::new();
        for image in &self.state.images {
            if checked.contains(&image.column_id.as_str()) {
                continue;
            }
            checked.push(&image.column_id);
            let column = self
                .container
                .columns
                .iter()
                .find(|c| c.id == image.column_id);
            let Some(column) = column else {
                continue;
            };
            let height = self.oracle.measure_height(&column.html, column.width)
                - self.config.image_height_tolerance;
            if height > limit && !column.is_lone_image() {
                debug!(
                    target: "colflow::render",
                    "{} grew to {:.1} with images",
                    column.id,
                    height + self.config.image_height_tolerance
                );
                return true;
            }
        }
        false
    }
}

impl<M: Measure> std::fmt::Debug for ColumnRenderer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnRenderer")
            .field("phase", &self.phase)
            .field("columns", &self.container.columns.len())
            .field("remaining", &self.state.remaining.len())
            .finish()
    }
}

/// Drop `<br/>` runs at either end of a column.
fn strip_edge_breaks(html: &str) -> String {
    let mut s = html.trim();
    loop {
        let before = s.len();
        s = s.strip_prefix("<br/>").unwrap_or(s).trim_start();
        s = s.strip_suffix("<br/>").unwrap_or(s).trim_end();
        if s.len() == before {
            return s.to_string();
        }
    }
}

/// Run a complete layout synchronously: render, step until finished,
/// preload images and apply at most one image correction.
///
/// Restart delays are skipped; there is nothing to wait for.
pub fn run<M: Measure>(
    renderer: &mut ColumnRenderer<M>,
    loader: &dyn ImageLoader,
) -> Result<RenderedEvent, FlowError> {
    let mut loaded: HashMap<String, Result<ImageSize, String>> = HashMap::new();
    renderer.render()?;
    loop {
        let event = loop {
            match renderer.step() {
                Step::Continue => {}
                Step::RestartAfter(_) => {
                    renderer.re_render()?;
                }
                Step::Finished(event) => break event,
                Step::Idle => {
                    break RenderedEvent {
                        width: renderer.container().width,
                        columns: renderer.container().columns.len(),
                    }
                }
            }
        };

        let sources: Vec<String> = renderer.images().iter().map(|i| i.src.clone()).collect();
        let mut restarted = false;
        for src in sources {
            let result = loaded
                .entry(src.clone())
                .or_insert_with(|| loader.load(&src).map_err(|e| e.to_string()))
                .clone()
                .map_err(FlowError::Image);
            if renderer.image_loaded(&src, result)? == ImageCheck::Restart {
                restarted = true;
                break;
            }
        }
        if !restarted {
            return Ok(event);
        }
    }
}
