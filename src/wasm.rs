//! Browser binding. The host page supplies the measuring function, usually
//! one that writes the fragment into a hidden column element and returns its
//! `offsetHeight`, and drives `step()` from `setTimeout` so the page can
//! repaint between columns.

use js_sys::Function;
use log::warn;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::{ColumnGeometry, FlowConfig};
use crate::events::FlowEvent;
use crate::image_loader::ImageSize;
use crate::measure::Measure;
use crate::render::{ColumnRenderer, ImageCheck, RenderStart, Step};
use crate::FlowError;

/// Calls `measure(html, columnWidth)` in JavaScript.
struct JsOracle {
    measure: Function,
}

impl Measure for JsOracle {
    fn measure_height(&self, html: &str, column_width: f64) -> f64 {
        let result = self.measure.call2(
            &JsValue::NULL,
            &JsValue::from_str(html),
            &JsValue::from_f64(column_width),
        );
        match result.ok().and_then(|v| v.as_f64()) {
            Some(height) => height,
            None => {
                warn!(target: "colflow::render", "measure callback returned no number");
                f64::INFINITY
            }
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
enum StepReport {
    Continue,
    #[serde(rename_all = "camelCase")]
    Restart { delay_ms: u64 },
    #[serde(rename_all = "camelCase")]
    Finished { width: f64, columns: usize },
    Idle,
}

impl From<Step> for StepReport {
    fn from(step: Step) -> Self {
        match step {
            Step::Continue => StepReport::Continue,
            Step::RestartAfter(delay) => StepReport::Restart {
                delay_ms: delay.as_millis() as u64,
            },
            Step::Finished(event) => StepReport::Finished {
                width: event.width,
                columns: event.columns,
            },
            Step::Idle => StepReport::Idle,
        }
    }
}

fn js_error(e: FlowError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub struct WasmColumnFlow {
    renderer: ColumnRenderer<JsOracle>,
}

#[wasm_bindgen]
impl WasmColumnFlow {
    /// `config` is the camelCase options object (or `undefined`);
    /// `on_rendered` receives `{ type: "rendered", width, columns }`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: JsValue,
        width: f64,
        height: f64,
        margin: f64,
        measure: Function,
        on_rendered: Option<Function>,
    ) -> Result<WasmColumnFlow, JsValue> {
        let config: FlowConfig = if config.is_undefined() || config.is_null() {
            FlowConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid configuration: {}", e)))?
        };
        let geometry = ColumnGeometry::new(width, height).with_margin(margin);
        let mut renderer = ColumnRenderer::new(config, geometry, JsOracle { measure });
        if let Some(callback) = on_rendered {
            renderer = renderer.with_events(move |event: &FlowEvent| {
                let payload = match serde_wasm_bindgen::to_value(event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(target: "colflow::render", "event not delivered: {}", e);
                        return;
                    }
                };
                if let Err(e) = callback.call1(&JsValue::NULL, &payload) {
                    warn!(target: "colflow::render", "rendered callback threw: {:?}", e);
                }
            });
        }
        Ok(WasmColumnFlow { renderer })
    }

    pub fn load(&mut self, markup: &str) {
        self.renderer.load(markup);
    }

    /// Returns `"started"` or `"deferred"`.
    pub fn render(&mut self) -> Result<String, JsValue> {
        let start = self.renderer.render().map_err(js_error)?;
        Ok(start_name(start).to_string())
    }

    #[wasm_bindgen(js_name = reRender)]
    pub fn re_render(&mut self) -> Result<String, JsValue> {
        let start = self.renderer.re_render().map_err(js_error)?;
        Ok(start_name(start).to_string())
    }

    pub fn resize(&mut self, height: f64) -> Result<bool, JsValue> {
        let start = self.renderer.resize(height).map_err(js_error)?;
        Ok(start.is_some())
    }

    /// Lay out one column. Returns `{ state, ... }`.
    pub fn step(&mut self) -> Result<JsValue, JsValue> {
        to_js(&StepReport::from(self.renderer.step()))
    }

    /// Report a loaded image. Returns `"pending"`, `"settled"` or `"restart"`.
    #[wasm_bindgen(js_name = imageLoaded)]
    pub fn image_loaded(&mut self, src: &str, width: u32, height: u32) -> Result<String, JsValue> {
        let check = self
            .renderer
            .image_loaded(src, Ok(ImageSize { width, height }))
            .map_err(js_error)?;
        Ok(check_name(check).to_string())
    }

    #[wasm_bindgen(js_name = imageFailed)]
    pub fn image_failed(&mut self, src: &str) -> Result<String, JsValue> {
        let check = self
            .renderer
            .image_loaded(src, Err(FlowError::Image(format!("{} failed to load", src))))
            .map_err(js_error)?;
        Ok(check_name(check).to_string())
    }

    /// Image sources placed by the last run, for preloading.
    pub fn images(&self) -> Result<JsValue, JsValue> {
        to_js(&self.renderer.images())
    }

    /// The committed columns as `{ selector, width, columns: [...] }`.
    pub fn container(&self) -> Result<JsValue, JsValue> {
        to_js(self.renderer.container())
    }

    pub fn html(&self) -> String {
        self.renderer.container().to_html()
    }
}

fn start_name(start: RenderStart) -> &'static str {
    match start {
        RenderStart::Started => "started",
        RenderStart::Deferred => "deferred",
    }
}

fn check_name(check: ImageCheck) -> &'static str {
    match check {
        ImageCheck::Pending(_) => "pending",
        ImageCheck::Settled => "settled",
        ImageCheck::Restart => "restart",
    }
}
