use std::net::Ipv4Addr;

use crate::error::ReceiverError;

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub source_ip: Ipv4Addr,
    pub port: u16,
    pub payload_type: u8,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples_per_packet: usize,
    pub stream_channels: u16,
    pub channel_offset: u16,
    pub socket_rcvbuf: usize,
    pub bind_interface: Option<Ipv4Addr>,
}

impl ReceiverConfig {
    /// The number of interleaved channels present in the wire payload,
    /// defaulting to `channels` when the stream carries no extra channels.
    pub fn effective_stream_channels(&self) -> u16 {
        if self.stream_channels == 0 {
            self.channels
        } else {
            self.stream_channels
        }
    }

    pub fn is_multicast(&self) -> bool {
        self.source_ip.octets()[0] & 0xF0 == 0xE0
    }

    pub(crate) fn validate(&self) -> Result<(), ReceiverError> {
        if self.port == 0 {
            return Err(ReceiverError::ConfigInvalid("port must be 1..65535".into()));
        }
        if self.payload_type > 127 {
            return Err(ReceiverError::ConfigInvalid(
                "payload_type must be 0..127".into(),
            ));
        }
        if !(1..=384_000).contains(&self.sample_rate) {
            return Err(ReceiverError::ConfigInvalid(
                "sample_rate must be 1..384000".into(),
            ));
        }
        if !(1..=32).contains(&self.channels) {
            return Err(ReceiverError::ConfigInvalid(
                "channels must be 1..32".into(),
            ));
        }
        if !(1..=1024).contains(&self.samples_per_packet) {
            return Err(ReceiverError::ConfigInvalid(
                "samples_per_packet must be 1..1024".into(),
            ));
        }
        let stream_channels = self.effective_stream_channels();
        if stream_channels < self.channel_offset + self.channels {
            return Err(ReceiverError::ConfigInvalid(
                "stream_channels must be at least channel_offset + channels".into(),
            ));
        }
        Ok(())
    }
}
