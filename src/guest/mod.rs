//! Guest module hosting
//!
//! A guest is a WebAssembly module that computes a color for each frame and
//! hands it to the host through linear memory.
//!
//! # Guest ABI
//!
//! ## Required Exports
//!
//! | Export                 | Type                                   | Description            |
//! |------------------------|----------------------------------------|------------------------|
//! | `memory`               | Memory                                 | Holds the color bytes  |
//! | `set_background_color` | `(frame: i32, total_steps: i32) -> ()` | Per-frame entry point  |
//!
//! Guests without a step count export `draw_frame(frame: i32) -> ()`
//! instead; the host is told which through
//! [`HostConfig::total_steps`](crate::config::HostConfig::total_steps).
//! Return values are ignored.
//!
//! ## Host Import
//!
//! ```text
//! env.jsSetBackgroundColor(vals_ptr: i32) -> ()
//!   vals_ptr[0..3] holds red, green, blue. Read once, during the call.
//! ```
//!
//! Nothing else may be imported; the validator rejects modules that ask
//! for more.
//!
//! ## Example Guest (Rust)
//!
//! ```rust,ignore
//! #[link(wasm_import_module = "env")]
//! unsafe extern "C" {
//!     fn jsSetBackgroundColor(vals_ptr: *const u8);
//! }
//!
//! #[unsafe(no_mangle)]
//! pub extern "C" fn draw_frame(frame: u32) {
//!     let vals = [(frame % 256) as u8, 0, 0];
//!     unsafe { jsSetBackgroundColor(vals.as_ptr()) }
//! }
//! ```
//!
//! # Invariants
//!
//! 1. **Read only**: the host never writes guest memory.
//! 2. **Fresh views**: every read measures the memory at call time; no view
//!    outlives the callback that created it.
//! 3. **Bounded**: a window that does not fit the current memory is a
//!    [`BoundsError`] and nothing is read.
//!
//! ```text
//! INIT -> LOADING -> READY -> RUNNING -> STOPPED
//!            |
//!            +-- (LoadError) --> never runs
//! ```

pub mod abi;
mod callback;
mod error;
mod loader;
mod memory;
mod validate;

pub use callback::*;
pub use error::*;
pub use loader::*;
pub use memory::*;
pub use validate::*;

/// A running guest the frame driver can call into
pub trait Guest {
    /// Invoke the per-frame export
    ///
    /// `total_steps` is passed as a second argument when present.
    fn draw_frame(&mut self, frame: u64, total_steps: Option<u32>) -> Result<(), TickError>;
}
