//! Default CBC protocol handlers.

use iocmed_channel::ChannelId;
use iocmed_frame::{write_link_header, ServiceCommand, ServiceHeader, SERVICE_HEADER_SIZE, SRV_POS};
use tracing::{debug, trace, warn};

use crate::config::RoutingConfig;
use crate::handler::{HandlerContext, ProtocolHandler, Route};
use crate::request::{Request, RequestType};

/// Signal entry: id (u16 LE) + value (u32 LE).
const SIGNAL_ENTRY_SIZE: usize = 6;
/// First signal entry, after the count byte.
const SIGNAL_ENTRIES_POS: usize = SERVICE_HEADER_SIZE + 1;
/// Boot reason reply: header + u32 LE.
const BOOT_REASON_REPLY_LEN: usize = SERVICE_HEADER_SIZE + 4;

/// Drop signals the routing table does not allow, compacting the survivors
/// in place. Returns `false` when no signal is left.
fn filter_signals(req: &mut Request, routing: &RoutingConfig) -> bool {
    let srv_len = req.srv_len;
    let service = &mut req.service_region_mut()[..srv_len];
    if service.len() < SIGNAL_ENTRIES_POS {
        return false;
    }

    let declared = service[SERVICE_HEADER_SIZE] as usize;
    let count = declared.min((service.len() - SIGNAL_ENTRIES_POS) / SIGNAL_ENTRY_SIZE);
    let mut kept = 0usize;
    for i in 0..count {
        let src = SIGNAL_ENTRIES_POS + i * SIGNAL_ENTRY_SIZE;
        let id = u16::from_le_bytes([service[src], service[src + 1]]);
        if !routing.is_signal_allowed(id) {
            trace!(signal = id, "signal filtered");
            continue;
        }
        let dst = SIGNAL_ENTRIES_POS + kept * SIGNAL_ENTRY_SIZE;
        service.copy_within(src..src + SIGNAL_ENTRY_SIZE, dst);
        kept += 1;
    }
    service[SERVICE_HEADER_SIZE] = kept as u8;

    req.srv_len = SIGNAL_ENTRIES_POS + kept * SIGNAL_ENTRY_SIZE;
    kept > 0
}

fn group_id(service: &[u8]) -> Option<u16> {
    let raw = service.get(SERVICE_HEADER_SIZE..SERVICE_HEADER_SIZE + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

/// Guest → native.
///
/// Resolves the target channel from the mux byte and writes the service
/// frame to it. A boot reason query on the lifecycle channel is answered
/// directly: the request is rewritten into the reply and forwarded to the
/// Tx direction.
#[derive(Debug, Default)]
pub struct CbcRxHandler {
    _private: (),
}

impl CbcRxHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn reply_boot_reason(req: &mut Request, boot_reason: u32) {
        let service = req.service_region_mut();
        service[1] = ServiceCommand::BootReasonReply.to_byte();
        service[SERVICE_HEADER_SIZE..BOOT_REASON_REPLY_LEN]
            .copy_from_slice(&boot_reason.to_le_bytes());
        req.srv_len = BOOT_REASON_REPLY_LEN;
        req.link_len = 0;
        req.channel = ChannelId::Lifecycle;
        req.rtype = RequestType::Other;
    }
}

impl ProtocolHandler for CbcRxHandler {
    fn process(&mut self, req: &mut Request, ctx: &HandlerContext<'_>) -> Route {
        let header = match ServiceHeader::parse(req.service()) {
            Ok(header) => header,
            Err(err) => {
                debug!(id = req.id().0, error = %err, "unparseable service frame");
                return Route::Free;
            }
        };
        let Some(target) = ChannelId::from_mux(header.mux).filter(|id| id.is_native()) else {
            debug!(mux = header.mux, "unknown mux, frame dropped");
            return Route::Free;
        };

        match header.command {
            ServiceCommand::BootReasonQuery if target == ChannelId::Lifecycle => {
                debug!(boot_reason = ctx.boot_reason, "answering boot reason query");
                Self::reply_boot_reason(req, ctx.boot_reason);
                return Route::Forward;
            }
            ServiceCommand::SignalData => {
                if !filter_signals(req, ctx.routing) {
                    trace!(channel = %target, "no signals left after filtering");
                    return Route::Free;
                }
            }
            ServiceCommand::GroupData => match group_id(req.service()) {
                Some(group) if ctx.routing.is_group_allowed(group) => {}
                group => {
                    trace!(?group, "group filtered");
                    return Route::Free;
                }
            },
            _ => {}
        }

        if !ctx.channels.is_open(target) {
            debug!(channel = %target, "target channel not open, frame dropped");
            return Route::Free;
        }
        if let Err(err) = ctx.channels.xmit(target, req.service()) {
            warn!(channel = %target, error = %err, "native write failed");
        }
        Route::Free
    }
}

/// Native → guest.
///
/// Wraps the service frame read from a native channel in a link header and
/// writes it to the virtual UART. Signal data from the signal channel goes
/// through the tx routing table first.
#[derive(Debug, Default)]
pub struct CbcTxHandler {
    _private: (),
}

impl CbcTxHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolHandler for CbcTxHandler {
    fn process(&mut self, req: &mut Request, ctx: &HandlerContext<'_>) -> Route {
        if req.srv_len == 0 {
            return Route::Free;
        }

        let is_signal_data = req.channel == ChannelId::Signal
            && req.service().get(1).copied() == Some(ServiceCommand::SignalData.to_byte());
        if is_signal_data && !filter_signals(req, ctx.routing) {
            trace!("no signals left after filtering");
            return Route::Free;
        }

        if let Err(err) = write_link_header(req.srv_len, req.buf_mut()) {
            warn!(id = req.id().0, error = %err, "cannot frame service data");
            return Route::Free;
        }
        req.link_len = SRV_POS + req.srv_len;

        if let Err(err) = ctx.channels.xmit(ChannelId::VirtualUart, req.link()) {
            warn!(channel = %req.channel, error = %err, "virtual uart write failed");
        }
        Route::Free
    }
}
