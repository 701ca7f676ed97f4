//! Browser Platform Implementation
//!
//! - DOM elements for presentation
//! - requestAnimationFrame for frame timing
//! - setTimeout for the load timeout

use super::{FrameSource, PlatformError, PlatformResult, Presenter};
use crate::config::HostConfig;
use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, HtmlElement, Window};

/// Best-effort message for a thrown JS value
pub fn describe(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return err.message().into();
    }
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}

fn window() -> PlatformResult<Window> {
    web_sys::window().ok_or_else(|| PlatformError::NotSupported("no window object".into()))
}

fn document() -> PlatformResult<Document> {
    window()?
        .document()
        .ok_or_else(|| PlatformError::NotSupported("no document".into()))
}

fn query(document: &Document, selector: &str) -> PlatformResult<Element> {
    document
        .query_selector(selector)
        .map_err(|e| PlatformError::InitFailed(format!("bad selector '{}': {}", selector, describe(&e))))?
        .ok_or_else(|| PlatformError::InitFailed(format!("no element matches '{}'", selector)))
}

/// Writes colors into two page elements
///
/// Elements are looked up once, when the presenter is built. Nothing is
/// written until the first color arrives.
pub struct DomPresenter {
    background: HtmlElement,
    label: Element,
}

impl DomPresenter {
    pub fn new(background_selector: &str, label_selector: &str) -> PlatformResult<Self> {
        let document = document()?;
        let background = query(&document, background_selector)?
            .dyn_into::<HtmlElement>()
            .map_err(|_| {
                PlatformError::InitFailed(format!(
                    "'{}' is not an HTML element",
                    background_selector
                ))
            })?;
        let label = query(&document, label_selector)?;
        Ok(Self { background, label })
    }

    pub fn from_config(config: &HostConfig) -> PlatformResult<Self> {
        Self::new(&config.background_selector, &config.label_selector)
    }
}

impl Presenter for DomPresenter {
    fn set_background(&mut self, css: &str) -> PlatformResult<()> {
        self.background
            .style()
            .set_property("background-color", css)
            .map_err(|e| PlatformError::Io(describe(&e)))
    }

    fn set_label(&mut self, text: &str) -> PlatformResult<()> {
        self.label.set_text_content(Some(text));
        Ok(())
    }
}

/// requestAnimationFrame as a [`FrameSource`]
pub struct AnimationFrames {
    window: Option<Window>,
}

impl AnimationFrames {
    pub fn new() -> Self {
        Self {
            window: web_sys::window(),
        }
    }
}

impl Default for AnimationFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for AnimationFrames {
    async fn next_frame(&mut self) -> Option<f64> {
        let window = self.window.as_ref()?;

        let mut requested = true;
        let promise = Promise::new(&mut |resolve, _reject| {
            requested = window.request_animation_frame(&resolve).is_ok();
        });
        if !requested {
            return None;
        }

        JsFuture::from(promise).await.ok()?.as_f64()
    }
}

/// Resolve after `ms` milliseconds (never, if there is no window)
pub async fn sleep_ms(ms: u32) {
    let promise = Promise::new(&mut |resolve, _reject| {
        if let Some(window) = web_sys::window() {
            let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                &resolve,
                ms.min(i32::MAX as u32) as i32,
            );
        }
    });
    let _ = JsFuture::from(promise).await;
}
