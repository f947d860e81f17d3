//! Service frame layout: `mux (1) | command (1) | payload`.

use crate::error::{FrameError, Result};

/// Mux + command.
pub const SERVICE_HEADER_SIZE: usize = 2;

/// Service commands the mediator interprets. Anything else is forwarded
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    /// `count (1) | count × (signal id u16 LE, value u32 LE)`
    SignalData,
    /// `group id u16 LE | group payload`
    GroupData,
    /// Guest asks for the boot (wakeup) reason on the lifecycle channel.
    BootReasonQuery,
    /// `boot reason u32 LE`
    BootReasonReply,
    Other(u8),
}

impl ServiceCommand {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => ServiceCommand::SignalData,
            0x02 => ServiceCommand::GroupData,
            0x10 => ServiceCommand::BootReasonQuery,
            0x11 => ServiceCommand::BootReasonReply,
            other => ServiceCommand::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ServiceCommand::SignalData => 0x01,
            ServiceCommand::GroupData => 0x02,
            ServiceCommand::BootReasonQuery => 0x10,
            ServiceCommand::BootReasonReply => 0x11,
            ServiceCommand::Other(byte) => byte,
        }
    }
}

/// The fixed prefix of a service frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHeader {
    pub mux: u8,
    pub command: ServiceCommand,
}

impl ServiceHeader {
    pub fn parse(service: &[u8]) -> Result<Self> {
        if service.len() < SERVICE_HEADER_SIZE {
            return Err(FrameError::Truncated { len: service.len() });
        }
        Ok(Self {
            mux: service[0],
            command: ServiceCommand::from_byte(service[1]),
        })
    }

    pub fn write(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() < SERVICE_HEADER_SIZE {
            return Err(FrameError::BufferTooSmall {
                size: dst.len(),
                needed: SERVICE_HEADER_SIZE,
            });
        }
        dst[0] = self.mux;
        dst[1] = self.command.to_byte();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header() {
        let header = ServiceHeader::parse(&[0x01, 0x10]).unwrap();
        assert_eq!(header.mux, 1);
        assert_eq!(header.command, ServiceCommand::BootReasonQuery);

        let raw = ServiceHeader::parse(&[0x08, 0x7F, 0x00]).unwrap();
        assert_eq!(raw.command, ServiceCommand::Other(0x7F));
    }

    #[test]
    fn parse_rejects_truncated_frame() {
        assert!(matches!(
            ServiceHeader::parse(&[0x01]),
            Err(FrameError::Truncated { len: 1 })
        ));
    }

    #[test]
    fn write_header() {
        let mut buf = [0u8; 4];
        ServiceHeader {
            mux: 1,
            command: ServiceCommand::BootReasonReply,
        }
        .write(&mut buf)
        .unwrap();
        assert_eq!(&buf[..2], &[0x01, 0x11]);
    }
}
