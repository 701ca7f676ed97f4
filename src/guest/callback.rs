//! The color callback import
//!
//! The guest writes three bytes somewhere in its memory and calls the
//! callback with their address. The callback reads them through a fresh
//! bounded view and pushes the formatted color to the page.

use super::error::TickError;
use super::memory::{read_array, LinearMemory};
use crate::color::{ColorSample, LabelFormat, Presentation};
use crate::platform::Presenter;

pub struct ColorCallback<M, P> {
    memory: M,
    presenter: P,
    label_format: LabelFormat,
    current: Option<Presentation>,
    calls: u64,
}

impl<M: LinearMemory, P: Presenter> ColorCallback<M, P> {
    pub fn new(memory: M, presenter: P, label_format: LabelFormat) -> Self {
        Self {
            memory,
            presenter,
            label_format,
            current: None,
            calls: 0,
        }
    }

    /// Handle one guest call with the raw `i32` argument
    ///
    /// Wasm addresses are unsigned; the argument is reinterpreted, not
    /// range-checked for sign.
    pub fn on_color(&mut self, vals_ptr: i32) -> Result<ColorSample, TickError> {
        self.calls += 1;
        let sample = ColorSample::from_bytes(read_array(&self.memory, vals_ptr as u32)?);
        let presentation = Presentation::new(sample, self.label_format);

        self.presenter.set_background(&presentation.background)?;
        // The background is on the page now, even if the label write fails
        let label = self.current.take().map(|p| p.label).unwrap_or_default();
        self.current = Some(Presentation {
            label,
            ..presentation.clone()
        });

        self.presenter.set_label(&presentation.label)?;
        self.current = Some(presentation);
        Ok(sample)
    }

    /// What the page shows, if any color has been presented yet
    ///
    /// Each field follows its own last successful write, so after a failed
    /// label write the label still holds the previous text.
    pub fn presentation(&self) -> Option<&Presentation> {
        self.current.as_ref()
    }

    /// Number of guest calls, successful or not
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest::error::BoundsError;
    use crate::guest::memory::HeapMemory;
    use crate::platform::{PlatformError, PlatformResult};

    #[derive(Default)]
    struct Recorder {
        ops: Vec<(&'static str, String)>,
        fail_label: bool,
    }

    impl Presenter for Recorder {
        fn set_background(&mut self, css: &str) -> PlatformResult<()> {
            self.ops.push(("background", css.to_string()));
            Ok(())
        }

        fn set_label(&mut self, text: &str) -> PlatformResult<()> {
            if self.fail_label {
                return Err(PlatformError::Io("label gone".to_string()));
            }
            self.ops.push(("label", text.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_reads_and_presents() {
        let mut mem = HeapMemory::new(1);
        mem.write(64, &[255, 0, 0]).unwrap();

        let mut cb = ColorCallback::new(mem, Recorder::default(), LabelFormat::Css);
        let sample = cb.on_color(64).unwrap();

        assert_eq!(sample, ColorSample::new(255, 0, 0));
        assert_eq!(
            cb.presenter().ops,
            vec![
                ("background", "rgb(255, 0, 0)".to_string()),
                ("label", "rgb(255, 0, 0)".to_string()),
            ]
        );
        assert_eq!(cb.presentation().unwrap().label, "rgb(255, 0, 0)");
    }

    #[test]
    fn test_padded_label() {
        let mut mem = HeapMemory::new(1);
        mem.write(0, &[7, 42, 255]).unwrap();

        let mut cb = ColorCallback::new(mem, Recorder::default(), LabelFormat::Padded);
        cb.on_color(0).unwrap();

        let p = cb.presentation().unwrap();
        assert_eq!(p.background, "rgb(7, 42, 255)");
        assert_eq!(p.label, "rgb(007, 042, 255)");
    }

    #[test]
    fn test_out_of_bounds_presents_nothing() {
        let mem = HeapMemory::with_len(16);
        let mut cb = ColorCallback::new(mem, Recorder::default(), LabelFormat::Css);

        let err = cb.on_color(14).unwrap_err();
        assert_eq!(
            err,
            TickError::Bounds(BoundsError {
                address: 14,
                size: 3,
                memory_size: 16
            })
        );
        assert!(cb.presenter().ops.is_empty());
        assert!(cb.presentation().is_none());
        assert_eq!(cb.calls(), 1);
    }

    #[test]
    fn test_negative_offset_is_high_address() {
        let mem = HeapMemory::new(1);
        let mut cb = ColorCallback::new(mem, Recorder::default(), LabelFormat::Css);

        match cb.on_color(-1) {
            Err(TickError::Bounds(e)) => assert_eq!(e.address, u32::MAX),
            other => panic!("expected bounds error, got {:?}", other),
        }
    }

    #[test]
    fn test_label_failure_mirrors_written_background() {
        let mut mem = HeapMemory::new(1);
        mem.write(0, &[1, 2, 3]).unwrap();
        mem.write(3, &[4, 5, 6]).unwrap();

        let mut cb = ColorCallback::new(mem, Recorder::default(), LabelFormat::Css);
        cb.on_color(0).unwrap();

        cb.presenter.fail_label = true;
        let err = cb.on_color(3).unwrap_err();
        assert!(matches!(err, TickError::Present(_)));

        let p = cb.presentation().unwrap();
        assert_eq!(p.background, "rgb(4, 5, 6)");
        assert_eq!(p.label, "rgb(1, 2, 3)");
        assert_eq!(
            cb.presenter().ops.last(),
            Some(&("background", "rgb(4, 5, 6)".to_string()))
        );
    }

    #[test]
    fn test_first_label_failure_still_mirrors_background() {
        let mut mem = HeapMemory::new(1);
        mem.write(0, &[1, 2, 3]).unwrap();

        let mut cb = ColorCallback::new(
            mem,
            Recorder {
                fail_label: true,
                ..Recorder::default()
            },
            LabelFormat::Css,
        );
        assert!(cb.on_color(0).is_err());

        let p = cb.presentation().unwrap();
        assert_eq!(p.background, "rgb(1, 2, 3)");
        assert_eq!(p.label, "");
    }
}
