use std::sync::Arc;

use corelink_transport::{SharedRam, TransportError, WakeReason, MAX_CHANNELS};

use crate::error::ConfigError;

/// The inter-core links a platform carries. They share one protocol and
/// differ only in sizing and the reason code reported to the power manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Application core to audio/radio core.
    AudioCore,
    /// Application core to coprocessor.
    Coprocessor,
    /// Application core to sensor subsystem.
    SensorHub,
}

impl LinkKind {
    pub const ALL: [LinkKind; 3] = [
        LinkKind::AudioCore,
        LinkKind::Coprocessor,
        LinkKind::SensorHub,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LinkKind::AudioCore => "audio-core",
            LinkKind::Coprocessor => "coprocessor",
            LinkKind::SensorHub => "sensor-hub",
        }
    }
}

/// Shape of a link: channel count, descriptor pool depth and wake reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub kind: LinkKind,
    /// Number of channels, `1..=MAX_CHANNELS`.
    pub channels: usize,
    /// Descriptors available to each side of each channel.
    pub slots_per_channel: u16,
    pub wake_reason: WakeReason,
}

impl LinkConfig {
    pub fn preset(kind: LinkKind) -> Self {
        let (channels, slots_per_channel, reason) = match kind {
            LinkKind::AudioCore => (2, 16, 0x0101),
            LinkKind::Coprocessor => (2, 8, 0x0102),
            LinkKind::SensorHub => (4, 8, 0x0103),
        };
        Self {
            kind,
            channels,
            slots_per_channel,
            wake_reason: WakeReason(reason),
        }
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_slots(mut self, slots_per_channel: u16) -> Self {
        self.slots_per_channel = slots_per_channel;
        self
    }

    pub fn with_wake_reason(mut self, reason: WakeReason) -> Self {
        self.wake_reason = reason;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(TransportError::InvalidChannelCount {
                requested: self.channels,
                maximum: MAX_CHANNELS,
            }
            .into());
        }
        if self.slots_per_channel == 0 {
            return Err(TransportError::InvalidPoolSize {
                requested: 0,
                minimum: 1,
            }
            .into());
        }
        Ok(())
    }

    /// Lays out a shared region matching this configuration.
    pub fn build_region(&self) -> Result<Arc<SharedRam>, ConfigError> {
        self.validate()?;
        Ok(Arc::new(SharedRam::new(
            self.channels,
            self.slots_per_channel,
        )?))
    }

    pub(crate) fn check_region(&self, ram: &SharedRam) -> Result<(), ConfigError> {
        self.validate()?;
        if ram.channels() != self.channels || ram.slots_per_channel() != self.slots_per_channel {
            return Err(ConfigError::RegionMismatch {
                config_channels: self.channels,
                config_slots: self.slots_per_channel,
                region_channels: ram.channels(),
                region_slots: ram.slots_per_channel(),
            });
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::preset(LinkKind::Coprocessor)
    }
}
