//! Per-socket-family `msghdr` scratch.
//!
//! The reference binding keeps one used-message scratch array per socket
//! family group (`inet_used_messages`, `unix_used_messages`); a worker
//! serving both INET and UNIX-domain clients needs both live at once. This
//! generalizes that to the full `SocketFamily` set via a small fixed-size
//! table rather than hardcoding the family count.

use transport_core::socket::SocketFamily;

pub struct MsgScratch {
    addr: libc::sockaddr_storage,
    addr_len: libc::socklen_t,
    iov: libc::iovec,
    hdr: libc::msghdr,
}

impl Default for MsgScratch {
    fn default() -> Self {
        Self {
            addr: unsafe { std::mem::zeroed() },
            addr_len: std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t,
            iov: libc::iovec { iov_base: std::ptr::null_mut(), iov_len: 0 },
            hdr: unsafe { std::mem::zeroed() },
        }
    }
}

impl MsgScratch {
    /// Builds a `msghdr` pointing at `buffer`, stored in this scratch slot
    /// so the pointer stays valid until the SQE completes (the kernel reads
    /// `msg_iov`/`msg_name` at execution time, not at submission time).
    /// Returns a pointer into `self`; do not reuse this family's scratch
    /// for another operation while this one is in flight.
    pub fn build_msghdr(&mut self, buffer: &mut [u8]) -> *mut libc::msghdr {
        self.iov = libc::iovec {
            iov_base: buffer.as_mut_ptr() as *mut libc::c_void,
            iov_len: buffer.len(),
        };
        self.addr_len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        self.hdr.msg_name = &mut self.addr as *mut _ as *mut libc::c_void;
        self.hdr.msg_namelen = self.addr_len;
        self.hdr.msg_iov = &mut self.iov as *mut libc::iovec;
        self.hdr.msg_iovlen = 1;
        &mut self.hdr as *mut libc::msghdr
    }

    pub fn source_addr(&self) -> (libc::sockaddr_storage, libc::socklen_t) {
        (self.addr, self.addr_len)
    }
}

/// Fixed-size table of per-family scratch, indexed by `SocketFamily::index`.
#[derive(Default)]
pub struct MsgScratchTable([MsgScratch; SocketFamily::COUNT]);

impl MsgScratchTable {
    pub fn for_family(&mut self, family: SocketFamily) -> &mut MsgScratch {
        &mut self.0[family.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_msghdr_points_at_the_given_buffer() {
        let mut scratch = MsgScratch::default();
        let mut buf = [0u8; 16];
        let hdr_ptr = scratch.build_msghdr(&mut buf);
        unsafe {
            let hdr = &*hdr_ptr;
            assert_eq!(hdr.msg_iovlen, 1);
            let iov = &*(hdr.msg_iov);
            assert_eq!(iov.iov_len, 16);
            assert_eq!(iov.iov_base, buf.as_mut_ptr() as *mut libc::c_void);
        }
    }

    #[test]
    fn families_get_independent_scratch_slots() {
        let mut table = MsgScratchTable::default();
        let mut udp_buf = [1u8; 8];
        table.for_family(SocketFamily::Udp).build_msghdr(&mut udp_buf);

        let mut unix_buf = [2u8; 4];
        table.for_family(SocketFamily::UnixDatagram).build_msghdr(&mut unix_buf);

        // Writing the unix-datagram slot must not have disturbed the udp
        // slot's already-built msghdr.
        let udp_hdr = table.for_family(SocketFamily::Udp).build_msghdr(&mut udp_buf);
        unsafe {
            assert_eq!((*udp_hdr).msg_iovlen, 1);
            let iov = &*((*udp_hdr).msg_iov);
            assert_eq!(iov.iov_len, 8);
        }
    }

    #[test]
    fn source_addr_reflects_namelen_set_by_build() {
        let mut scratch = MsgScratch::default();
        let mut buf = [0u8; 4];
        scratch.build_msghdr(&mut buf);
        let (_addr, addr_len) = scratch.source_addr();
        assert_eq!(addr_len as usize, std::mem::size_of::<libc::sockaddr_storage>());
    }
}
