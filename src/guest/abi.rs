//! Guest ABI names and constants
//!
//! Defaults for the interface between the host and a color guest. All names
//! can be overridden through [`HostConfig`](crate::config::HostConfig).

/// Import module namespace
pub const IMPORT_NAMESPACE: &str = "env";

/// Step count handed to two-argument frame exports
pub const DEFAULT_TOTAL_STEPS: u32 = 200;

/// Host functions the guest may import
pub mod imports {
    /// `(vals_ptr: i32) -> ()`: 3 bytes at `vals_ptr` are the new color
    pub const SET_BACKGROUND_COLOR: &str = "jsSetBackgroundColor";
}

/// Exports the host looks for
pub mod exports {
    /// The linear memory export name
    pub const MEMORY: &str = "memory";
    /// `(frame: i32, total_steps: i32) -> ()`
    pub const SET_BACKGROUND_COLOR: &str = "set_background_color";
    /// `(frame: i32) -> ()`
    pub const DRAW_FRAME: &str = "draw_frame";
}

/// Value type bytes from the binary format
pub mod valtype {
    pub const I32: u8 = 0x7F;
    pub const I64: u8 = 0x7E;
    pub const F32: u8 = 0x7D;
    pub const F64: u8 = 0x7C;
    pub const V128: u8 = 0x7B;
    pub const FUNCREF: u8 = 0x70;
    pub const EXTERNREF: u8 = 0x6F;

    /// Text name for error messages
    pub fn name(byte: u8) -> &'static str {
        match byte {
            I32 => "i32",
            I64 => "i64",
            F32 => "f32",
            F64 => "f64",
            V128 => "v128",
            FUNCREF => "funcref",
            EXTERNREF => "externref",
            _ => "?",
        }
    }
}

/// Import/export kind bytes
pub mod kind {
    pub const FUNC: u8 = 0x00;
    pub const TABLE: u8 = 0x01;
    pub const MEMORY: u8 = 0x02;
    pub const GLOBAL: u8 = 0x03;

    pub fn name(byte: u8) -> &'static str {
        match byte {
            FUNC => "function",
            TABLE => "table",
            MEMORY => "memory",
            GLOBAL => "global",
            _ => "unknown",
        }
    }
}

/// Signature text of the color callback, for error messages
pub const CALLBACK_SIGNATURE: &str = "(i32) -> ()";
