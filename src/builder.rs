use crate::{
    CompareCallback, Hooks, PinsClearCallback, PinsWriteCallback, Spwm, SpwmError,
    TimerStartCallback, TimerStopCallback,
};
use core::marker::PhantomData;

pub struct SpwmPinsBuildState {}
pub struct SpwmFinalizedBuildState {}

pub struct SpwmBuilder<T, const N: usize> {
    pins: [u8; N],
    pins_write_callback: Option<PinsWriteCallback>,
    pins_clear_callback: Option<PinsClearCallback>,
    compare_callback: Option<CompareCallback>,
    timer_start_callback: Option<TimerStartCallback>,
    timer_stop_callback: Option<TimerStopCallback>,
    _phantom: PhantomData<T>,
}

impl<T, const N: usize> SpwmBuilder<T, N> {
    pub fn pins_write_callback(mut self, pins_write_callback: PinsWriteCallback) -> Self {
        self.pins_write_callback = Some(pins_write_callback);
        self
    }

    pub fn pins_clear_callback(mut self, pins_clear_callback: PinsClearCallback) -> Self {
        self.pins_clear_callback = Some(pins_clear_callback);
        self
    }

    pub fn compare_callback(mut self, compare_callback: CompareCallback) -> Self {
        self.compare_callback = Some(compare_callback);
        self
    }

    pub fn timer_start_callback(mut self, timer_start_callback: TimerStartCallback) -> Self {
        self.timer_start_callback = Some(timer_start_callback);
        self
    }

    pub fn timer_stop_callback(mut self, timer_stop_callback: TimerStopCallback) -> Self {
        self.timer_stop_callback = Some(timer_stop_callback);
        self
    }
}

impl<const N: usize> SpwmBuilder<SpwmPinsBuildState, N> {
    pub(crate) fn new() -> Self {
        Self {
            pins: [0; N],
            pins_write_callback: None,
            pins_clear_callback: None,
            compare_callback: None,
            timer_start_callback: None,
            timer_stop_callback: None,
            _phantom: PhantomData,
        }
    }

    /// Assigns a pin mask to every channel, `pins[i]` being driven by channel `i`.
    ///
    /// Every mask must have exactly one bit set and no two channels may share
    /// a pin.
    pub fn pins(
        self,
        pins: [u8; N],
    ) -> Result<SpwmBuilder<SpwmFinalizedBuildState, N>, SpwmError> {
        let mut all_pins = 0;

        for pin in pins {
            if pin.count_ones() != 1 {
                return Err(SpwmError::InvalidPin);
            }

            if all_pins & pin != 0 {
                return Err(SpwmError::DuplicatePin);
            }

            all_pins |= pin;
        }

        Ok(SpwmBuilder {
            pins,
            pins_write_callback: self.pins_write_callback,
            pins_clear_callback: self.pins_clear_callback,
            compare_callback: self.compare_callback,
            timer_start_callback: self.timer_start_callback,
            timer_stop_callback: self.timer_stop_callback,
            _phantom: PhantomData,
        })
    }
}

impl<const N: usize> SpwmBuilder<SpwmFinalizedBuildState, N> {
    pub fn build(self) -> Result<Spwm<N>, SpwmError> {
        let (
            Some(pins_write),
            Some(pins_clear),
            Some(compare),
            Some(timer_start),
            Some(timer_stop),
        ) = (
            self.pins_write_callback,
            self.pins_clear_callback,
            self.compare_callback,
            self.timer_start_callback,
            self.timer_stop_callback,
        )
        else {
            return Err(SpwmError::CallbackSetError);
        };

        Ok(Spwm::new(
            self.pins,
            Hooks {
                pins_write,
                pins_clear,
                compare,
                timer_start,
                timer_stop,
            },
        ))
    }
}
