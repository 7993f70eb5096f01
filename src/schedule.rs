//! Sorted list of turn-off events replayed once per PWM period.
//!
//! Every list owns a fixed pool of `N` nodes, one per channel, which is the
//! upper bound on the number of distinct non-zero lengths. Links between nodes
//! are pool indices, so a list can be moved between the pending and active
//! slots as a plain value.

use crate::{DutyRecord, SpwmError};

#[derive(Debug, Clone, Copy)]
pub(crate) struct EventNode {
    length: u8,
    keep_mask: u8,
    next: Option<u8>,
}

impl EventNode {
    // A live node never has a zero length, so zero marks a released node.
    const RELEASED: Self = Self {
        length: 0,
        keep_mask: 0,
        next: None,
    };

    pub(crate) fn length(&self) -> u8 {
        self.length
    }

    pub(crate) fn next(&self) -> Option<u8> {
        self.next
    }

    pub(crate) fn is_released(&self) -> bool {
        self.length == 0
    }
}

/// A single point in the period at which one or more pins turn off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitionEvent {
    /// Offset from the start of the period, in timer ticks
    pub length: u8,
    /// Pins turned off at `length`
    pub off_mask: u8,
}

#[derive(Debug, Clone)]
pub struct EventList<const N: usize> {
    nodes: [EventNode; N],
    head: Option<u8>,
    allocated: usize,
    active_mask: u8,
    all_pins: u8,
}

impl<const N: usize> EventList<N> {
    #[must_use]
    pub const fn new(all_pins: u8) -> Self {
        Self {
            nodes: [EventNode::RELEASED; N],
            head: None,
            allocated: 0,
            active_mask: 0,
            all_pins,
        }
    }

    /// Builds the event list for `records`, visiting channels in index order.
    ///
    /// Channels sharing a length are coalesced into one event, channels with
    /// a zero length are skipped.
    ///
    /// # Errors
    ///
    /// - [`SpwmError::DuplicatePin`] if two records drive the same pin
    /// - [`SpwmError::EventPoolExhausted`] if the node pool runs out
    pub fn build(records: &[DutyRecord; N], all_pins: u8) -> Result<Self, SpwmError> {
        let mut list = Self::new(all_pins);

        for record in records {
            list.insert(record.length(), record.pin_mask())?;
        }

        Ok(list)
    }

    fn insert(&mut self, length: u8, pin: u8) -> Result<(), SpwmError> {
        if length == 0 {
            return Ok(());
        }

        // Each pin has to land in exactly one event, the XOR below would
        // otherwise toggle it back on.
        if self.active_mask & pin != 0 {
            return Err(SpwmError::DuplicatePin);
        }

        let mut prev = None;
        let mut item = self.head;

        while let Some(index) = item {
            let node = &self.nodes[usize::from(index)];

            if length <= node.length {
                break;
            }

            prev = item;
            item = node.next;
        }

        match item {
            Some(index) if self.nodes[usize::from(index)].length == length => {
                self.nodes[usize::from(index)].keep_mask ^= pin;
            }
            _ => {
                let index = self.allocate(EventNode {
                    length,
                    keep_mask: self.all_pins ^ pin,
                    next: item,
                })?;

                match prev {
                    Some(prev) => self.nodes[usize::from(prev)].next = Some(index),
                    None => self.head = Some(index),
                }
            }
        }

        self.active_mask |= pin;

        Ok(())
    }

    fn allocate(&mut self, node: EventNode) -> Result<u8, SpwmError> {
        let index = u8::try_from(self.allocated).map_err(|_| SpwmError::EventPoolExhausted)?;
        let slot = self
            .nodes
            .get_mut(self.allocated)
            .ok_or(SpwmError::EventPoolExhausted)?;

        *slot = node;
        self.allocated += 1;

        Ok(index)
    }

    /// Walks the list and returns every node to the pool, poisoning it.
    ///
    /// Returns the number of released nodes.
    pub(crate) fn release(&mut self) -> usize {
        let mut released = 0;
        let mut item = self.head.take();

        while let Some(index) = item {
            let node = &mut self.nodes[usize::from(index)];

            item = node.next;
            *node = EventNode::RELEASED;
            released += 1;
        }

        self.allocated = 0;
        self.active_mask = 0;

        released
    }

    pub(crate) fn head(&self) -> Option<u8> {
        self.head
    }

    pub(crate) fn node(&self, index: u8) -> &EventNode {
        &self.nodes[usize::from(index)]
    }

    pub(crate) fn off_mask(&self, node: &EventNode) -> u8 {
        self.all_pins ^ node.keep_mask
    }

    /// Pins with a non-zero length, i.e. the pins switched on at period start.
    #[must_use]
    pub fn active_mask(&self) -> u8 {
        self.active_mask
    }

    /// `true` if at least one channel has a non-zero length.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_mask != 0
    }

    #[must_use]
    pub fn all_pins(&self) -> u8 {
        self.all_pins
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Iterates the events from the start of the period to its end.
    #[must_use]
    pub fn iter(&self) -> Events<'_, N> {
        Events {
            list: self,
            item: self.head,
        }
    }
}

pub struct Events<'a, const N: usize> {
    list: &'a EventList<N>,
    item: Option<u8>,
}

impl<const N: usize> Iterator for Events<'_, N> {
    type Item = TransitionEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.node(self.item?);

        self.item = node.next;

        Some(TransitionEvent {
            length: node.length,
            off_mask: self.list.off_mask(node),
        })
    }
}

impl<'a, const N: usize> IntoIterator for &'a EventList<N> {
    type Item = TransitionEvent;
    type IntoIter = Events<'a, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
