//! Software PWM for several pins driven by a single hardware timer.
//!
//! Every duty change produces a sorted list of turn-off events. The timer
//! interrupts replay that list once per period: all active pins go high at
//! period start, and each compare match turns off the pins whose on-time has
//! elapsed. A freshly built list waits in a pending slot until the next period
//! start promotes it, so the interrupt side never sees a half-built schedule.
#![no_std]

// This must go first so the logging macros are visible in the other modules.
mod fmt;

mod builder;
mod channel;
mod runner;
mod schedule;

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use channel::DutyTable;
use critical_section::Mutex;
use heapless::Vec;

pub use builder::{SpwmBuilder, SpwmFinalizedBuildState, SpwmPinsBuildState};
pub use channel::DutyRecord;
pub use schedule::{EventList, Events, TransitionEvent};

/// Timer ticks in one PWM period the compare offsets are measured against.
pub const PERIOD_TICKS: u16 = 256;

/// Errors that can occur during SPWM operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpwmError {
    /// A pin mask does not have exactly one bit set
    InvalidPin,
    /// Two channels drive the same pin
    DuplicatePin,
    /// The specified channel index is out of range
    InvalidChannel,
    /// A required hardware callback was not provided
    CallbackSetError,
    /// No free node left while building an event list
    EventPoolExhausted,
}

impl core::fmt::Display for SpwmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SpwmError::InvalidPin => write!(f, "pin mask must have exactly one bit set"),
            SpwmError::DuplicatePin => write!(f, "pin is assigned to more than one channel"),
            SpwmError::InvalidChannel => write!(f, "channel index out of range"),
            SpwmError::CallbackSetError => write!(f, "hardware callback missing"),
            SpwmError::EventPoolExhausted => write!(f, "event pool exhausted"),
        }
    }
}

impl core::error::Error for SpwmError {}

/// Callback that writes the whole output port; bits outside the mask go low.
pub type PinsWriteCallback = fn(u8);

/// Callback that drives the pins in the mask low.
pub type PinsClearCallback = fn(u8);

/// Callback that programs the tick offset of the next compare interrupt.
pub type CompareCallback = fn(u8);

/// Callback that enables the compare interrupt (timer should start).
pub type TimerStartCallback = fn();

/// Callback that disables the compare interrupt (timer can stop).
pub type TimerStopCallback = fn();

/// Index of a channel in the pin table passed to [`SpwmBuilder::pins`].
pub type ChannelId = usize;

#[derive(Clone, Copy)]
pub(crate) struct Hooks {
    pub(crate) pins_write: PinsWriteCallback,
    pub(crate) pins_clear: PinsClearCallback,
    pub(crate) compare: CompareCallback,
    pub(crate) timer_start: TimerStartCallback,
    pub(crate) timer_stop: TimerStopCallback,
}

/// The active/pending schedule pair plus the replay cursor.
pub(crate) struct Slots<const N: usize> {
    lists: [EventList<N>; 2],
    active: usize,
    cursor: Option<u8>,
}

impl<const N: usize> Slots<N> {
    fn new(all_pins: u8) -> Self {
        Self {
            lists: [EventList::new(all_pins), EventList::new(all_pins)],
            active: 0,
            cursor: None,
        }
    }

    pub(crate) fn active(&self) -> &EventList<N> {
        &self.lists[self.active]
    }

    fn pending(&self) -> &EventList<N> {
        &self.lists[self.active ^ 1]
    }

    fn pending_mut(&mut self) -> &mut EventList<N> {
        &mut self.lists[self.active ^ 1]
    }

    /// Promotes the pending list and parks the cursor on its head.
    pub(crate) fn swap(&mut self) {
        self.active ^= 1;
        self.cursor = self.lists[self.active].head();
    }
}

pub struct Spwm<const N: usize> {
    duties: Mutex<RefCell<DutyTable<N>>>,
    slots: Mutex<RefCell<Slots<N>>>,
    swap_pending: AtomicBool,
    all_pins: u8,
    hooks: Hooks,
}

impl<const N: usize> Spwm<N> {
    #[must_use]
    pub fn builder() -> SpwmBuilder<SpwmPinsBuildState, N> {
        SpwmBuilder::new()
    }

    pub(crate) fn new(pins: [u8; N], hooks: Hooks) -> Self {
        let all_pins = pins.iter().fold(0, |all, pin| all | pin);

        Self {
            duties: Mutex::new(RefCell::new(DutyTable::new(&pins))),
            slots: Mutex::new(RefCell::new(Slots::new(all_pins))),
            swap_pending: AtomicBool::new(false),
            all_pins,
            hooks,
        }
    }

    /// Drives every output low and stops the compare interrupt.
    ///
    /// Outputs stay low until a schedule with at least one non-zero duty is
    /// published and promoted by [`Spwm::period_irq_handler`].
    pub fn init(&self) {
        (self.hooks.timer_stop)();
        (self.hooks.pins_write)(0);
        debug!("spwm initialized, pins {}", self.all_pins);
    }

    /// Sets the on-time of one channel and publishes the new schedule.
    ///
    /// Blocks while a previously published schedule waits for the next
    /// period start.
    pub fn set_duty(&self, channel: ChannelId, length: u8) -> Result<(), SpwmError> {
        critical_section::with(|cs| self.duties.borrow_ref_mut(cs).set(channel, length))
            .inspect_err(|_| warn!("channel {} out of range", channel))?;

        self.rebuild()
    }

    /// Sets several channels at once and publishes a single schedule.
    ///
    /// Nothing is changed if any channel index is out of range.
    pub fn set_duties(&self, duties: &[(ChannelId, u8)]) -> Result<(), SpwmError> {
        critical_section::with(|cs| self.duties.borrow_ref_mut(cs).set_many(duties))
            .inspect_err(|_| warn!("duty batch rejected, channel out of range"))?;

        self.rebuild()
    }

    /// Sets every channel to the same on-time and publishes the schedule.
    pub fn set_all(&self, length: u8) -> Result<(), SpwmError> {
        critical_section::with(|cs| self.duties.borrow_ref_mut(cs).set_all(length));

        self.rebuild()
    }

    /// Rebuilds the schedule from the current duty table and publishes it.
    pub fn rebuild(&self) -> Result<(), SpwmError> {
        let records = critical_section::with(|cs| *self.duties.borrow_ref(cs).records());
        let list = EventList::build(&records, self.all_pins)?;

        self.publish(list);

        Ok(())
    }

    fn publish(&self, list: EventList<N>) {
        // The pending slot still holds the previous schedule until the period
        // start promotes it.
        while self.swap_pending.load(Ordering::Acquire) {
            core::hint::spin_loop();
        }

        let events = list.len();
        let active_mask = list.active_mask();
        let released = critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);

            debug_assert!(!self.swap_pending.load(Ordering::Acquire));

            let released = slots.pending_mut().release();

            *slots.pending_mut() = list;
            self.swap_pending.store(true, Ordering::Release);

            released
        });

        trace!("released {} events", released);
        debug!(
            "published {} events, active mask {}",
            events,
            active_mask
        );

        if active_mask != 0 {
            (self.hooks.timer_start)();
        } else {
            (self.hooks.timer_stop)();
        }
    }

    /// Current on-time of `channel`, `None` if the index is out of range.
    pub fn duty(&self, channel: ChannelId) -> Option<u8> {
        critical_section::with(|cs| self.duties.borrow_ref(cs).get(channel))
    }

    /// Pins switched on at period start by the schedule being replayed.
    pub fn active_mask(&self) -> u8 {
        critical_section::with(|cs| self.slots.borrow_ref(cs).active().active_mask())
    }

    /// `true` while a published schedule has not yet been promoted.
    pub fn is_swap_pending(&self) -> bool {
        self.swap_pending.load(Ordering::Acquire)
    }

    /// Snapshot of the schedule being replayed.
    pub fn active_events(&self) -> Vec<TransitionEvent, N> {
        critical_section::with(|cs| self.slots.borrow_ref(cs).active().iter().collect())
    }

    /// Snapshot of the pending slot: the schedule awaiting promotion, or the
    /// previous schedule once a swap has happened and before it is released.
    pub fn pending_events(&self) -> Vec<TransitionEvent, N> {
        critical_section::with(|cs| self.slots.borrow_ref(cs).pending().iter().collect())
    }
}
