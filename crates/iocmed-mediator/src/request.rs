use iocmed_channel::ChannelId;
use iocmed_frame::{MAX_LINK_SIZE, SRV_POS};

/// Capacity of every request buffer: one maximum-size link frame.
pub const REQUEST_BUF_SIZE: usize = MAX_LINK_SIZE;

/// Slab identity of a request. Fixed for the life of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub usize);

/// What a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestType {
    /// CBC protocol data read from a channel.
    #[default]
    Protocol,
    /// Generated by a handler (e.g. a lifecycle reply).
    Other,
}

/// One reusable unit of work.
///
/// The buffer holds a link frame: header at `0..SRV_POS`, service frame at
/// `SRV_POS..SRV_POS + srv_len`. Requests are allocated once by the pool and
/// only ever move between queues and the thread currently processing them.
#[derive(Debug)]
pub struct Request {
    id: RequestId,
    buf: Box<[u8; REQUEST_BUF_SIZE]>,
    pub channel: ChannelId,
    /// Length of the service frame.
    pub srv_len: usize,
    /// Length of the whole link frame, or 0 when only the service part is valid.
    pub link_len: usize,
    pub rtype: RequestType,
}

impl Request {
    pub(crate) fn new(id: RequestId) -> Self {
        Self {
            id,
            buf: Box::new([0u8; REQUEST_BUF_SIZE]),
            channel: ChannelId::VirtualUart,
            srv_len: 0,
            link_len: 0,
            rtype: RequestType::Protocol,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..]
    }

    /// The valid link frame bytes.
    pub fn link(&self) -> &[u8] {
        &self.buf[..self.link_len]
    }

    /// The valid service frame bytes.
    pub fn service(&self) -> &[u8] {
        &self.buf[SRV_POS..SRV_POS + self.srv_len]
    }

    /// The service region at full capacity, for reads and in-place rewrites.
    pub fn service_region_mut(&mut self) -> &mut [u8] {
        &mut self.buf[SRV_POS..]
    }

    pub(crate) fn reset(&mut self) {
        self.channel = ChannelId::VirtualUart;
        self.srv_len = 0;
        self.link_len = 0;
        self.rtype = RequestType::Protocol;
    }
}

#[cfg(test)]
mod tests {
    use iocmed_frame::MAX_SERVICE_SIZE;

    use super::*;

    #[test]
    fn service_view_starts_after_link_header() {
        let mut req = Request::new(RequestId(7));
        req.service_region_mut()[..3].copy_from_slice(&[1, 2, 3]);
        req.srv_len = 3;
        assert_eq!(req.service(), &[1, 2, 3]);
        assert_eq!(req.service_region_mut().len(), MAX_SERVICE_SIZE);
        assert_eq!(req.id(), RequestId(7));
    }

    #[test]
    fn reset_clears_metadata() {
        let mut req = Request::new(RequestId(0));
        req.channel = ChannelId::Signal;
        req.srv_len = 4;
        req.link_len = 7;
        req.rtype = RequestType::Other;
        req.reset();
        assert_eq!(req.srv_len, 0);
        assert_eq!(req.link_len, 0);
        assert_eq!(req.rtype, RequestType::Protocol);
        assert!(req.link().is_empty());
    }
}
