//! Browser runtime integration
//!
//! Assembles the host from its parts and hands it to the page:
//! - DOM presenter and color callback are built first
//! - the guest is loaded against the callback's import table
//! - the frame driver runs on requestAnimationFrame until stopped

use crate::color::{self, Presentation};
use crate::config::{ConfigError, HostConfig};
use crate::console_log;
use crate::driver::{CancelToken, DriverState, FrameDriver, StopReason, TickOutcome};
use crate::guest::{
    self, ColorCallback, ImportTable, LoadError, MemorySlot, ModuleInstance, SharedCallback,
};
use crate::platform::web::{AnimationFrames, DomPresenter};
use crate::platform::PlatformError;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// Anything that keeps the host from starting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    Config(ConfigError),
    Platform(PlatformError),
    Load(LoadError),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Platform(e) => write!(f, "{}", e),
            Self::Load(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StartError {}

impl From<ConfigError> for StartError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PlatformError> for StartError {
    fn from(e: PlatformError) -> Self {
        Self::Platform(e)
    }
}

impl From<LoadError> for StartError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<StartError> for JsValue {
    fn from(e: StartError) -> Self {
        js_sys::Error::new(&e.to_string()).into()
    }
}

/// A loaded guest wired to the page, not yet scheduled
pub struct Host {
    driver: FrameDriver<ModuleInstance>,
    callback: SharedCallback<DomPresenter>,
    stopped: Rc<Cell<bool>>,
    // Keeps the import closure alive for as long as the guest may call it
    _imports: ImportTable,
}

impl Host {
    /// Fetch the configured artifact and assemble the host
    pub async fn load(config: &HostConfig) -> Result<Self, StartError> {
        let (callback, imports) = Self::prepare(config)?;
        let instance = guest::load(config, &imports).await?;
        Ok(Self::assemble(config, instance, callback, imports))
    }

    /// Assemble the host around module bytes that are already in hand
    pub async fn instantiate(config: &HostConfig, bytes: &[u8]) -> Result<Self, StartError> {
        let (callback, imports) = Self::prepare(config)?;
        let instance = guest::instantiate(bytes, config, &imports).await?;
        Ok(Self::assemble(config, instance, callback, imports))
    }

    fn prepare(
        config: &HostConfig,
    ) -> Result<(SharedCallback<DomPresenter>, ImportTable), StartError> {
        config.validate()?;
        let presenter = DomPresenter::from_config(config)?;
        let memory = MemorySlot::new();
        let callback = Rc::new(std::cell::RefCell::new(ColorCallback::new(
            memory.clone(),
            presenter,
            config.label_format,
        )));
        let imports = ImportTable::new(config, memory, Rc::clone(&callback))?;
        Ok((callback, imports))
    }

    fn assemble(
        config: &HostConfig,
        instance: ModuleInstance,
        callback: SharedCallback<DomPresenter>,
        imports: ImportTable,
    ) -> Self {
        Self {
            driver: FrameDriver::from_config(instance, config),
            callback,
            stopped: Rc::new(Cell::new(false)),
            _imports: imports,
        }
    }

    /// Run a single frame right now, starting the driver if needed
    pub fn tick(&mut self) -> TickOutcome {
        if self.driver.state() == &DriverState::Idle {
            self.driver.start();
        }
        self.driver.tick()
    }

    pub fn driver(&self) -> &FrameDriver<ModuleInstance> {
        &self.driver
    }

    pub fn presentation(&self) -> Option<Presentation> {
        self.callback.borrow().presentation().cloned()
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            cancel: self.driver.cancel_token(),
            callback: Rc::clone(&self.callback),
            stopped: Rc::clone(&self.stopped),
        }
    }

    /// Drive the guest on animation frames until stopped
    pub async fn run(mut self) -> StopReason {
        let state = self.driver.run(&mut AnimationFrames::new()).await.clone();
        self.stopped.set(true);

        match state {
            DriverState::Stopped(reason) => reason,
            // run() only returns once the driver has stopped
            _ => StopReason::SourceClosed,
        }
    }
}

/// Page-side handle on a running host
#[wasm_bindgen]
pub struct HostHandle {
    cancel: CancelToken,
    callback: SharedCallback<DomPresenter>,
    stopped: Rc<Cell<bool>>,
}

#[wasm_bindgen]
impl HostHandle {
    /// Stop scheduling; takes effect at the next frame boundary
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[wasm_bindgen(js_name = isStopped)]
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Current background color string
    pub fn color(&self) -> Option<String> {
        self.callback
            .borrow()
            .presentation()
            .map(|p| p.background.clone())
    }

    /// Current label text
    pub fn label(&self) -> Option<String> {
        self.callback
            .borrow()
            .presentation()
            .map(|p| p.label.clone())
    }
}

/// Load the guest and start the frame loop
///
/// `config_json` is an optional JSON object of [`HostConfig`] fields. The
/// returned promise rejects if configuration, DOM lookup, or loading fails;
/// in that case no frame is ever scheduled.
#[wasm_bindgen]
pub async fn start(config_json: Option<String>) -> Result<HostHandle, JsValue> {
    let config = match config_json {
        Some(json) => HostConfig::from_json(&json).map_err(StartError::from)?,
        None => HostConfig::default(),
    };

    let host = match Host::load(&config).await {
        Ok(host) => host,
        Err(e) => {
            web_sys::console::error_1(&format!("[runtime] Start failed: {}", e).into());
            return Err(e.into());
        }
    };

    let handle = host.handle();
    console_log!("[runtime] Starting frame loop...");
    wasm_bindgen_futures::spawn_local(async move {
        let reason = host.run().await;
        console_log!("[runtime] Frame loop ended: {:?}", reason);
    });

    Ok(handle)
}

/// Zero-pad a channel value for display
///
/// Throws `TypeError` for non-numbers and `RangeError` for numbers that are
/// not integers in 0..=255.
#[wasm_bindgen(js_name = padValue)]
pub fn pad_value(value: JsValue) -> Result<String, JsValue> {
    let Some(number) = value.as_f64() else {
        return Err(js_sys::TypeError::new("Value must be a number!").into());
    };
    color::pad_number(number).map_err(|e| js_sys::RangeError::new(&e.to_string()).into())
}
