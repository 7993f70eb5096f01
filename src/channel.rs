use crate::{ChannelId, SpwmError};

/// Requested on-time of a single channel together with the pin it drives.
///
/// The pin mask is fixed when the record is created; only the length changes
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyRecord {
    pin_mask: u8,
    length: u8,
}

impl DutyRecord {
    #[must_use]
    pub const fn new(pin_mask: u8, length: u8) -> Self {
        Self { pin_mask, length }
    }

    /// On-time in timer ticks. `0` keeps the channel off for the whole period.
    #[must_use]
    pub const fn length(&self) -> u8 {
        self.length
    }

    #[must_use]
    pub const fn pin_mask(&self) -> u8 {
        self.pin_mask
    }

    pub fn set_length(&mut self, length: u8) {
        self.length = length;
    }
}

pub(crate) struct DutyTable<const N: usize> {
    records: [DutyRecord; N],
}

impl<const N: usize> DutyTable<N> {
    pub(crate) fn new(pins: &[u8; N]) -> Self {
        Self {
            records: core::array::from_fn(|i| DutyRecord::new(pins[i], 0)),
        }
    }

    pub(crate) fn records(&self) -> &[DutyRecord; N] {
        &self.records
    }

    pub(crate) fn get(&self, channel: ChannelId) -> Option<u8> {
        self.records.get(channel).map(DutyRecord::length)
    }

    pub(crate) fn set(&mut self, channel: ChannelId, length: u8) -> Result<(), SpwmError> {
        self.records
            .get_mut(channel)
            .ok_or(SpwmError::InvalidChannel)?
            .set_length(length);

        Ok(())
    }

    /// Applies every `(channel, length)` pair or none of them.
    pub(crate) fn set_many(&mut self, duties: &[(ChannelId, u8)]) -> Result<(), SpwmError> {
        if duties.iter().any(|&(channel, _)| channel >= N) {
            return Err(SpwmError::InvalidChannel);
        }

        for &(channel, length) in duties {
            self.records[channel].set_length(length);
        }

        Ok(())
    }

    pub(crate) fn set_all(&mut self, length: u8) {
        for record in &mut self.records {
            record.set_length(length);
        }
    }
}
