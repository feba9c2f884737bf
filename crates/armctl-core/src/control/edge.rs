//! Limit switch edge detection
//!
//! Turns a raw digital level into press/release events. A sticky
//! `triggered` flag makes the press event fire once per press: it is set by
//! the rising edge and only cleared by a falling edge or an explicit reset.

use crate::config::validate_dio;
use crate::hardware::DigitalInput;
use crate::Result;

/// A detected transition of the switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

/// Edge detector over a debounced digital input
pub struct EdgeDetector {
    input: Box<dyn DigitalInput>,
    dio: u8,
    normally_open: bool,
    triggered: bool,
    last_state: bool,
}

impl EdgeDetector {
    /// Wrap a digital input on the given DIO port
    ///
    /// `normally_open` switches read high when pressed; normally-closed
    /// switches are inverted so that `read()` is always "pressed".
    pub fn new(input: Box<dyn DigitalInput>, dio: u8, normally_open: bool) -> Result<Self> {
        validate_dio(dio)?;
        tracing::info!(dio, normally_open, "limit switch initialized");
        Ok(Self {
            input,
            dio,
            normally_open,
            triggered: false,
            last_state: false,
        })
    }

    /// DIO port of this switch
    pub fn dio(&self) -> u8 {
        self.dio
    }

    /// Current pressed state with polarity applied
    ///
    /// A failed read is logged and reported as not pressed.
    pub fn read(&mut self) -> bool {
        let state = match self.input.get() {
            Ok(raw) => raw == self.normally_open,
            Err(e) => {
                tracing::warn!(dio = self.dio, error = %e, "limit switch read failed");
                false
            }
        };
        self.last_state = state;
        state
    }

    /// True once when the switch goes from released to pressed
    pub fn rising_edge(&mut self) -> bool {
        let state = self.read();
        if state && !self.triggered {
            self.triggered = true;
            tracing::info!(dio = self.dio, "limit switch pressed");
            return true;
        }
        false
    }

    /// True once when the switch goes from pressed to released
    ///
    /// Re-arms [`rising_edge`](Self::rising_edge).
    pub fn falling_edge(&mut self) -> bool {
        let state = self.read();
        if !state && self.triggered {
            self.triggered = false;
            tracing::info!(dio = self.dio, "limit switch released");
            return true;
        }
        false
    }

    /// Sample once and report whichever edge occurred
    ///
    /// Equivalent to checking both edges against a single read, which is
    /// what a control tick wants.
    pub fn poll(&mut self) -> Option<Edge> {
        let state = self.read();
        match (state, self.triggered) {
            (true, false) => {
                self.triggered = true;
                tracing::info!(dio = self.dio, "limit switch pressed");
                Some(Edge::Pressed)
            }
            (false, true) => {
                self.triggered = false;
                tracing::info!(dio = self.dio, "limit switch released");
                Some(Edge::Released)
            }
            _ => None,
        }
    }

    /// Whether a press has been seen and not yet released
    pub fn is_pressed(&self) -> bool {
        self.triggered
    }

    /// Level seen by the most recent read
    pub fn last_state(&self) -> bool {
        self.last_state
    }

    /// Forget edge tracking
    pub fn reset(&mut self) {
        self.triggered = false;
        self.last_state = false;
    }
}

impl std::fmt::Debug for EdgeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeDetector")
            .field("dio", &self.dio)
            .field("normally_open", &self.normally_open)
            .field("triggered", &self.triggered)
            .field("last_state", &self.last_state)
            .finish()
    }
}
