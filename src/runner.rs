//! Interrupt side of the engine.
//!
//! Both handlers take the slot pair inside a critical section, touch at most
//! one event and return. Neither one logs.

use core::sync::atomic::Ordering;

use crate::Spwm;

impl<const N: usize> Spwm<N> {
    /// Period-start interrupt, called at tick 0 of every period.
    ///
    /// Promotes a pending schedule if one was published and switches every
    /// active pin on. Must keep running even while the compare interrupt is
    /// stopped, otherwise a pending schedule is never promoted.
    pub fn period_irq_handler(&self) {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);

            if self.swap_pending.load(Ordering::Acquire) {
                slots.swap();

                if let Some(head) = slots.cursor {
                    (self.hooks.compare)(slots.active().node(head).length());
                }

                self.swap_pending.store(false, Ordering::Release);
            }

            (self.hooks.pins_write)(slots.active().active_mask());
        });
    }

    /// Compare-match interrupt, called when the timer reaches the offset
    /// programmed through the compare callback.
    ///
    /// Turns off the pins of the current event and programs the next one. At
    /// the tail the cursor wraps to the head, whose offset then fires in the
    /// following period.
    pub fn compare_irq_handler(&self) {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);

            let Some(index) = slots.cursor else {
                return;
            };

            let active = slots.active();
            let event = active.node(index);

            debug_assert!(!event.is_released(), "compare interrupt read a released event");

            let off_mask = active.off_mask(event);
            let next = event.next().or(active.head());
            let next_length = next.map(|next| active.node(next).length());

            slots.cursor = next;
            (self.hooks.pins_clear)(off_mask);

            if let Some(length) = next_length {
                (self.hooks.compare)(length);
            }
        });
    }
}
