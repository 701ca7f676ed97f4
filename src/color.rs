//! Color samples and their text forms
//!
//! A guest reports a color as three bytes in its linear memory. The host
//! turns those into two strings: a CSS color for the page background and a
//! label for humans.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Errors from the padding utilities
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// Input was not a number at all
    NotANumber { got: String },
    /// Input was a number but not an integer in 0..=255
    OutOfRange { value: f64 },
}

impl FormatError {
    /// True for the type-class variant
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::NotANumber { .. })
    }

    /// True for the range-class variant
    pub fn is_range_error(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber { got } => write!(f, "Value must be a number! (got {})", got),
            Self::OutOfRange { value } => {
                write!(f, "Value must be an integer in 0..=255 (got {})", value)
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// One RGB triple as read from guest memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorSample {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ColorSample {
    /// Number of bytes a sample occupies in guest memory
    pub const LEN: u32 = 3;

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    /// CSS color expression: `rgb(R, G, B)`
    pub fn css(&self) -> String {
        format!("rgb({}, {}, {})", self.red, self.green, self.blue)
    }

    /// Fixed-width form: `rgb(RRR, GGG, BBB)`
    pub fn padded(&self) -> String {
        format!(
            "rgb({}, {}, {})",
            pad_channel(self.red),
            pad_channel(self.green),
            pad_channel(self.blue)
        )
    }

    /// Label text in the requested format
    pub fn label(&self, format: LabelFormat) -> String {
        match format {
            LabelFormat::Css => self.css(),
            LabelFormat::Padded => self.padded(),
        }
    }
}

impl fmt::Display for ColorSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.red, self.green, self.blue)
    }
}

/// How the label element renders a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFormat {
    /// Same string as the background style
    Css,
    /// Three zero-padded digits per channel
    #[default]
    Padded,
}

/// Host-side mirror of what is currently on the page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Presentation {
    pub sample: ColorSample,
    pub background: String,
    pub label: String,
}

impl Presentation {
    pub fn new(sample: ColorSample, format: LabelFormat) -> Self {
        Self {
            sample,
            background: sample.css(),
            label: sample.label(format),
        }
    }
}

/// Pad a channel to exactly three ASCII digits
pub fn pad_channel(value: u8) -> String {
    format!("{:03}", value)
}

/// Pad an arbitrary number, rejecting anything that is not a channel value
pub fn pad_number(value: f64) -> Result<String, FormatError> {
    // NaN fails every comparison, so it lands here too
    if !(0.0..=255.0).contains(&value) || value.fract() != 0.0 {
        return Err(FormatError::OutOfRange { value });
    }
    Ok(pad_channel(value as u8))
}

/// Pad a dynamically typed value
pub fn pad_value(value: &Value) -> Result<String, FormatError> {
    match value {
        Value::Number(n) => {
            let v = n.as_f64().ok_or_else(|| FormatError::NotANumber {
                got: n.to_string(),
            })?;
            pad_number(v)
        }
        other => Err(FormatError::NotANumber {
            got: type_name(other).to_string(),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
