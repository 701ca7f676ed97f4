//! huehost - drive a WebAssembly color guest from the browser
//!
//! The host loads a guest module, calls its frame export once per display
//! refresh, and mirrors the 3-byte color the guest reports onto the page.
//!
//! - [`guest`]: loading, validation, the color callback import
//! - [`driver`]: the per-frame loop and its lifecycle
//! - [`color`]: color samples and their text forms
//! - [`platform`]: presentation and frame-timing traits (browser impls)
//!
//! Everything outside `runtime` and the browser platform builds natively,
//! which is where most of the tests run.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod color;
pub mod config;
pub mod driver;
pub mod guest;
pub mod platform;

#[cfg(target_arch = "wasm32")]
pub mod runtime;

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Module start hook. The page calls `start()` to actually run the host.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    init_panic_hook();
}

/// Console logging helper
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

/// Log to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::log(&format!($($t)*))
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
