//! `IoUringWorker` — default `Worker` implementation.
//!
//! Wraps a real `io_uring::IoUring`, builds one SQE per prepared operation
//! following the opcode mapping used throughout this codebase's io_uring
//! translation layer, and dispatches completions by tag class in `drain`.

use io_uring::{opcode, squeue, types, IoUring};
use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, RawFd};

use transport_core::buffer::BufferPool;
use transport_core::config::WorkerConfig;
use transport_core::error::{Result, TransportError};
use transport_core::port::{PortPayload, TransferPayload, AddressPayload, SENTINEL_SIZE};
use transport_core::registry::EventRegistry;
use transport_core::sequence::SequencePool;
use transport_core::socket::SocketFamily;
use transport_core::tag::{self, OpClass};
use transport_core::worker::{sqe_flags, MessageParams, TransferParams, Worker};
use transport_core::yield_::{InlineYielder, Yield};

use crate::event_registry::HashMapEventRegistry;
use crate::fixed_buffer_pool::FixedBufferPool;
use crate::linked_sequence_pool::LinkedSequencePool;
use crate::msg_scratch::MsgScratchTable;
use crate::time::now_ns;

const CQE_F_BUFFER: u32 = 1 << 0;

fn to_squeue_flags(flags: u8) -> squeue::Flags {
    let mut out = squeue::Flags::empty();
    if flags & sqe_flags::IO_LINK != 0 {
        out |= squeue::Flags::IO_LINK;
    }
    if flags & sqe_flags::IO_HARDLINK != 0 {
        out |= squeue::Flags::IO_HARDLINK;
    }
    if flags & sqe_flags::BUFFER_SELECT != 0 {
        out |= squeue::Flags::BUFFER_SELECT;
    }
    out
}

/// Delivered completions, queued here for the host runtime to drain via
/// [`IoUringWorker::take_port_payload`]. One queue per port, matching the
/// four typed ports in the external-interfaces design.
#[derive(Default)]
struct Ports {
    read: Vec<*mut PortPayload>,
    write: Vec<*mut PortPayload>,
    accept: Vec<*mut PortPayload>,
    connect: Vec<*mut PortPayload>,
}

/// Addressing mode resolved for a given fd: either a raw fd or the fixed
/// file slot it was registered under on accept/connect.
enum SqeTarget {
    Fixed(u32),
    Raw(RawFd),
}

pub struct IoUringWorker<Y: Yield = InlineYielder> {
    id: usize,
    ring: IoUring,
    buffers: FixedBufferPool,
    sequences: LinkedSequencePool,
    events: HashMapEventRegistry,
    msg_scratch: MsgScratchTable,
    connect_targets: HashMap<RawFd, (libc::sockaddr_storage, libc::socklen_t)>,
    listener_ring_fd: Option<RawFd>,
    ports: Ports,
    yielder: Y,
    timeout_checker_period_ns: u64,
    last_timeout_check_ns: u64,
    /// Sparse fixed-file table, one slot per buffer (a connection can't do
    /// I/O without a buffer, so it can't outgrow this).
    fixed_file_slots: Vec<Option<RawFd>>,
    fd_slots: HashMap<RawFd, u32>,
}

impl IoUringWorker<InlineYielder> {
    pub fn new(id: usize, config: WorkerConfig) -> Result<Self> {
        Self::with_yielder(id, config, InlineYielder)
    }
}

impl<Y: Yield> IoUringWorker<Y> {
    pub fn with_yielder(id: usize, config: WorkerConfig, yielder: Y) -> Result<Self> {
        let ring = IoUring::builder()
            .build(config.ring_size)
            .map_err(|e| TransportError::IoUringSetup(e.raw_os_error().unwrap_or(-1)))?;

        let buffers = FixedBufferPool::new(config.buffers_count, config.buffer_size);
        unsafe {
            ring.submitter()
                .register_buffers(buffers.registered_iovecs())
        }
        .map_err(|e| TransportError::IoUringSetup(e.raw_os_error().unwrap_or(-1)))?;
        ring.submitter()
            .register_files_sparse(config.buffers_count as u32)
            .map_err(|e| TransportError::IoUringSetup(e.raw_os_error().unwrap_or(-1)))?;

        let timeout_checker_period_ns = config.timeout_checker_period_ms.saturating_mul(1_000_000);

        Ok(Self {
            id,
            ring,
            buffers,
            sequences: LinkedSequencePool::new(config.sequences_count, config.sequences_count * 4),
            events: HashMapEventRegistry::new(),
            msg_scratch: MsgScratchTable::default(),
            connect_targets: HashMap::new(),
            listener_ring_fd: None,
            ports: Ports::default(),
            yielder,
            timeout_checker_period_ns,
            last_timeout_check_ns: 0,
            fixed_file_slots: vec![None; config.buffers_count],
            fd_slots: HashMap::new(),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn ring_fd(&self) -> RawFd {
        self.ring.as_raw_fd()
    }

    /// Points this worker at a listener ring; each drained batch will
    /// signal readiness with `msg_ring(listener_ring_fd, worker_id, 0)`.
    pub fn attach_listener(&mut self, listener_ring_fd: RawFd) {
        self.listener_ring_fd = Some(listener_ring_fd);
    }

    pub fn buffers_mut(&mut self) -> &mut FixedBufferPool {
        &mut self.buffers
    }

    pub fn sequences_mut(&mut self) -> &mut LinkedSequencePool {
        &mut self.sequences
    }

    /// Pre-loads the destination address a subsequent `connect(fd, ..)` will
    /// target. Socket creation is out of scope; the caller supplies the
    /// address once the fd and its family are known.
    pub fn set_connect_target(&mut self, fd: RawFd, addr: libc::sockaddr_storage, addr_len: libc::socklen_t) {
        self.connect_targets.insert(fd, (addr, addr_len));
    }

    /// Registers `fd` in the sparse fixed-file table and remembers its slot
    /// so subsequent `add_read`/`add_write`/message ops address it by index
    /// instead of by raw fd. Returns `None` if the table is full.
    fn register_fixed_file(&mut self, fd: RawFd) -> Option<u32> {
        let slot = self.fixed_file_slots.iter().position(|s| s.is_none())? as u32;
        self.ring.submitter().register_files_update(slot, &[fd]).ok()?;
        self.fixed_file_slots[slot as usize] = Some(fd);
        self.fd_slots.insert(fd, slot);
        Some(slot)
    }

    /// Releases `fd`'s fixed-file slot, if it has one. The runtime calls
    /// this alongside closing a connection's fd.
    pub fn unregister_fixed_file(&mut self, fd: RawFd) {
        if let Some(slot) = self.fd_slots.remove(&fd) {
            let _ = self.ring.submitter().register_files_update(slot, &[-1]);
            self.fixed_file_slots[slot as usize] = None;
        }
    }

    fn resolve(&self, fd: RawFd) -> SqeTarget {
        match self.fd_slots.get(&fd) {
            Some(&slot) => SqeTarget::Fixed(slot),
            None => SqeTarget::Raw(fd),
        }
    }

    /// Walks `seq` looking for the element holding `buffer_id` and releases
    /// it — the worker's half of "consumed element-by-element" sequence
    /// semantics; the runtime populated the sequence via `add_buffer` before
    /// issuing the chained ops.
    fn release_sequence_element(&mut self, seq: transport_core::sequence::SequenceId, buffer_id: u16) {
        let mut cur = self.sequences.first(seq);
        while let Some(elem) = cur {
            let next = self.sequences.next(seq, elem);
            if self.sequences.buffer_of(elem) == buffer_id {
                self.sequences.release_element(seq, elem);
                break;
            }
            cur = next;
        }
    }

    /// Drains one delivered payload from `port`, if any. The caller takes
    /// ownership and must eventually call [`Self::release_port_payload`].
    pub fn take_read_payload(&mut self) -> Option<*mut PortPayload> {
        self.ports.read.pop()
    }

    pub fn take_write_payload(&mut self) -> Option<*mut PortPayload> {
        self.ports.write.pop()
    }

    pub fn take_accept_payload(&mut self) -> Option<*mut PortPayload> {
        self.ports.accept.pop()
    }

    pub fn take_connect_payload(&mut self) -> Option<*mut PortPayload> {
        self.ports.connect.pop()
    }

    /// Reclaims a payload delivered through any port and returns its buffer
    /// id, if any, to the pool.
    ///
    /// # Safety
    /// `ptr` must have come from one of this worker's `take_*_payload`
    /// methods and must not have been released already.
    pub unsafe fn release_port_payload(&mut self, ptr: *mut PortPayload) {
        let payload = PortPayload::from_raw(ptr);
        if let Some(id) = payload.buffer_id() {
            self.buffers.release(id);
        }
    }

    /// The hard SQE-acquisition contract: push never fails visibly. If the
    /// ring is full, submit what's queued, yield, and retry.
    fn provide_sqe(&mut self, entry: &squeue::Entry) -> Result<()> {
        loop {
            let pushed = unsafe { self.ring.submission().push(entry) };
            if pushed.is_ok() {
                return Ok(());
            }
            self.ring
                .submit()
                .map_err(|e| TransportError::IoUringSubmit(e.raw_os_error().unwrap_or(-1)))?;
            self.yielder.yield_now();
        }
    }

    fn signal_listener_ready(&mut self) {
        let Some(listener_fd) = self.listener_ring_fd else { return };
        let sqe = opcode::MsgRingData::new(types::Fd(listener_fd), self.id as i32, 0, None)
            .build()
            .user_data(tag::encode(OpClass::Message, 0, None, None));
        let _ = self.provide_sqe(&sqe);
    }

    fn dispatch_accept_or_connect(&mut self, class: OpClass, fd: RawFd) {
        if fd >= 0 {
            if self.register_fixed_file(fd).is_none() {
                eprintln!("transport-io: worker {} has no free fixed-file slot for fd {}", self.id, fd);
            }
            match self.buffers.get() {
                Some(buffer_id) => {
                    let _ = self.add_read(TransferParams {
                        fd,
                        buffer_id,
                        offset: 0,
                        timeout_ns: 0,
                        sqe_flags: 0,
                        sequence_id: None,
                    });
                }
                None => {
                    // No buffer to read into means no usable connection;
                    // close it here rather than hand the runtime a fd it
                    // can't do anything with.
                    eprintln!("transport-io: worker {} has no free buffer for fd {}, closing", self.id, fd);
                    self.unregister_fixed_file(fd);
                    unsafe {
                        libc::close(fd);
                    }
                    return;
                }
            }
        }

        let payload = PortPayload::Address(AddressPayload {
            fd,
            sockaddr: unsafe { std::mem::zeroed() },
            sockaddr_len: 0,
        });
        let raw = payload.into_raw();
        match class {
            OpClass::Accept => self.ports.accept.push(raw),
            OpClass::Connect => self.ports.connect.push(raw),
            _ => unreachable!(),
        }
    }

    fn dispatch_read(&mut self, user_data: u64, res: i32, flags: u32, decoded: tag::Tag) {
        self.events.remove(user_data);

        let buffer_id = if flags & CQE_F_BUFFER != 0 {
            Some((flags >> 16) as u16)
        } else {
            decoded.buffer_id
        };

        if res < 0 {
            eprintln!("transport-io: worker {} read error fd={} errno={}", self.id, decoded.fd, -res);
            let payload = PortPayload::Transfer(TransferPayload {
                data_ptr: std::ptr::null_mut(),
                size: SENTINEL_SIZE,
                fd: decoded.fd,
                buffer_id,
                sequence_id: decoded.sequence_id,
            });
            self.ports.read.push(payload.into_raw());
            return;
        }

        let Some(id) = buffer_id else {
            eprintln!("transport-io: worker {} read completion missing buffer id", self.id);
            return;
        };
        if let Some(seq) = decoded.sequence_id {
            self.release_sequence_element(seq, id);
        }
        self.buffers.set_length(id, res as usize);
        let data_ptr = self.buffers.as_mut_slice(id).as_mut_ptr();
        let payload = PortPayload::Transfer(TransferPayload {
            data_ptr,
            size: res as usize,
            fd: decoded.fd,
            buffer_id: Some(id),
            sequence_id: decoded.sequence_id,
        });
        self.ports.read.push(payload.into_raw());
    }

    fn dispatch_write(&mut self, user_data: u64, res: i32, decoded: tag::Tag) {
        self.events.remove(user_data);

        let payload = PortPayload::Transfer(TransferPayload {
            data_ptr: std::ptr::null_mut(),
            size: if res < 0 { SENTINEL_SIZE } else { res as usize },
            fd: decoded.fd,
            buffer_id: decoded.buffer_id,
            sequence_id: decoded.sequence_id,
        });
        self.ports.write.push(payload.into_raw());

        if let Some(seq) = decoded.sequence_id {
            if let Some(buffer_id) = decoded.buffer_id {
                self.release_sequence_element(seq, buffer_id);
            }
        }

        if res < 0 {
            eprintln!("transport-io: worker {} write error fd={} errno={}", self.id, decoded.fd, -res);
            return;
        }
        // re-arm a read on the same fd, matching the echo discipline. The
        // buffer's length currently holds the echoed byte count from the
        // write that just completed; reset it to full capacity before the
        // next read lands in it.
        if let Some(buffer_id) = decoded.buffer_id {
            self.buffers.set_length(buffer_id, usize::MAX);
            let _ = self.add_read(TransferParams {
                fd: decoded.fd,
                buffer_id,
                offset: u64::MAX,
                timeout_ns: 0,
                sqe_flags: 0,
                sequence_id: None,
            });
        }
    }
}

impl<Y: Yield> Worker for IoUringWorker<Y> {
    fn add_read(&mut self, p: TransferParams) -> Result<u64> {
        let tag = tag::encode(OpClass::Read, p.fd, Some(p.buffer_id), p.sequence_id);
        let iov = *self.buffers.get_iovec(p.buffer_id);
        let sqe = match self.resolve(p.fd) {
            SqeTarget::Fixed(slot) => opcode::ReadFixed::new(types::Fixed(slot), iov.iov_base as *mut u8, iov.iov_len as u32, p.buffer_id)
                .offset(p.offset)
                .build()
                .flags(to_squeue_flags(p.sqe_flags))
                .user_data(tag),
            SqeTarget::Raw(fd) => opcode::ReadFixed::new(types::Fd(fd), iov.iov_base as *mut u8, iov.iov_len as u32, p.buffer_id)
                .offset(p.offset)
                .build()
                .flags(to_squeue_flags(p.sqe_flags))
                .user_data(tag),
        };
        self.provide_sqe(&sqe)?;
        if p.timeout_ns != 0 {
            self.events.register(tag, p.timeout_ns, now_ns());
        }
        Ok(tag)
    }

    fn add_write(&mut self, p: TransferParams) -> Result<u64> {
        let tag = tag::encode(OpClass::Write, p.fd, Some(p.buffer_id), p.sequence_id);
        let iov = *self.buffers.get_iovec(p.buffer_id);
        let sqe = match self.resolve(p.fd) {
            SqeTarget::Fixed(slot) => opcode::WriteFixed::new(types::Fixed(slot), iov.iov_base as *const u8, iov.iov_len as u32, p.buffer_id)
                .offset(p.offset)
                .build()
                .flags(to_squeue_flags(p.sqe_flags))
                .user_data(tag),
            SqeTarget::Raw(fd) => opcode::WriteFixed::new(types::Fd(fd), iov.iov_base as *const u8, iov.iov_len as u32, p.buffer_id)
                .offset(p.offset)
                .build()
                .flags(to_squeue_flags(p.sqe_flags))
                .user_data(tag),
        };
        self.provide_sqe(&sqe)?;
        if p.timeout_ns != 0 {
            self.events.register(tag, p.timeout_ns, now_ns());
        }
        Ok(tag)
    }

    fn add_send_message(&mut self, p: MessageParams) -> Result<u64> {
        let t = p.transfer;
        let tag = tag::encode(OpClass::Write, t.fd, Some(t.buffer_id), t.sequence_id);
        let data = self.buffers.as_mut_slice(t.buffer_id);
        let scratch = self.msg_scratch.for_family(p.family);
        let hdr_ptr = scratch.build_msghdr(data);
        let sqe = match self.resolve(t.fd) {
            SqeTarget::Fixed(slot) => opcode::SendMsg::new(types::Fixed(slot), hdr_ptr as *const libc::msghdr)
                .build()
                .flags(to_squeue_flags(t.sqe_flags))
                .user_data(tag),
            SqeTarget::Raw(fd) => opcode::SendMsg::new(types::Fd(fd), hdr_ptr as *const libc::msghdr)
                .build()
                .flags(to_squeue_flags(t.sqe_flags))
                .user_data(tag),
        };
        self.provide_sqe(&sqe)?;
        if t.timeout_ns != 0 {
            self.events.register(tag, t.timeout_ns, now_ns());
        }
        Ok(tag)
    }

    fn add_receive_message(&mut self, p: MessageParams) -> Result<u64> {
        let t = p.transfer;
        let tag = tag::encode(OpClass::Read, t.fd, Some(t.buffer_id), t.sequence_id);
        let data = self.buffers.as_mut_slice(t.buffer_id);
        let scratch = self.msg_scratch.for_family(p.family);
        let hdr_ptr = scratch.build_msghdr(data);
        let sqe = match self.resolve(t.fd) {
            SqeTarget::Fixed(slot) => opcode::RecvMsg::new(types::Fixed(slot), hdr_ptr)
                .build()
                .flags(to_squeue_flags(t.sqe_flags))
                .user_data(tag),
            SqeTarget::Raw(fd) => opcode::RecvMsg::new(types::Fd(fd), hdr_ptr)
                .build()
                .flags(to_squeue_flags(t.sqe_flags))
                .user_data(tag),
        };
        self.provide_sqe(&sqe)?;
        if t.timeout_ns != 0 {
            self.events.register(tag, t.timeout_ns, now_ns());
        }
        Ok(tag)
    }

    fn connect(&mut self, fd: RawFd, timeout_ns: u64) -> Result<u64> {
        let (addr, addr_len) = *self
            .connect_targets
            .get(&fd)
            .ok_or(TransportError::NotInitialized)?;
        let tag = tag::encode(OpClass::Connect, fd, None, None);
        let sqe = opcode::Connect::new(types::Fd(fd), &addr as *const _ as *const libc::sockaddr, addr_len)
            .build()
            .user_data(tag);
        self.provide_sqe(&sqe)?;
        if timeout_ns != 0 {
            self.events.register(tag, timeout_ns, now_ns());
        }
        Ok(tag)
    }

    fn accept(&mut self, server_fd: RawFd) -> Result<u64> {
        // Multishot accept yields only the new fd per completion; the peer
        // address is not captured here (the runtime may call getpeername
        // if it needs it).
        let tag = tag::encode(OpClass::Accept, server_fd, None, None);
        let sqe = opcode::AcceptMulti::new(types::Fd(server_fd))
            .build()
            .user_data(tag);
        self.provide_sqe(&sqe)?;
        Ok(tag)
    }

    fn cancel_by_fd(&mut self, fd: RawFd) -> Result<()> {
        for t in self.events.tags_for_fd(fd) {
            let sqe = opcode::AsyncCancel::new(t).build().user_data(tag::encode(OpClass::Close, fd, None, None));
            self.provide_sqe(&sqe)?;
        }
        Ok(())
    }

    fn remove_event(&mut self, tag: u64) {
        self.events.remove(tag);
    }

    fn submit(&mut self) -> Result<usize> {
        self.ring
            .submit()
            .map_err(|e| TransportError::IoUringSubmit(e.raw_os_error().unwrap_or(-1)))
    }

    fn custom(&mut self, id: u64, data: u64) -> Result<()> {
        let sqe = opcode::MsgRingData::new(types::Fd(self.ring_fd()), data as i32, id, None)
            .build()
            .user_data(tag::encode(OpClass::Message, 0, None, None));
        self.provide_sqe(&sqe)
    }

    fn drain(&mut self, max: usize) -> usize {
        let now = now_ns();
        if now.saturating_sub(self.last_timeout_check_ns) >= self.timeout_checker_period_ns {
            self.last_timeout_check_ns = now;
            // `check_timeouts` already removed these tags from the registry,
            // so routing them through `cancel_by_fd` would look them up by fd
            // and find nothing to cancel. Cancel by tag directly instead.
            for expired_tag in self.events.check_timeouts(now) {
                let fd = tag::decode(expired_tag).map(|d| d.fd).unwrap_or(-1);
                let sqe = opcode::AsyncCancel::new(expired_tag)
                    .build()
                    .user_data(tag::encode(OpClass::Close, fd, None, None));
                let _ = self.provide_sqe(&sqe);
            }
        }

        // Copy CQE fields out before dispatching — `cqueue::Entry` borrows
        // the ring, and dispatch needs `&mut self` to recycle buffers and
        // push to ports.
        let batch: Vec<(u64, i32, u32)> = {
            let cq = self.ring.completion();
            cq.take(max).map(|cqe| (cqe.user_data(), cqe.result(), cqe.flags())).collect()
        };

        let n = batch.len();
        for (user_data, result, flags) in batch {
            let Some(decoded) = tag::decode(user_data) else {
                continue;
            };
            match decoded.class {
                OpClass::Accept | OpClass::Connect => {
                    self.dispatch_accept_or_connect(decoded.class, result);
                }
                OpClass::Read => self.dispatch_read(user_data, result, flags, decoded),
                OpClass::Write => self.dispatch_write(user_data, result, decoded),
                OpClass::Message => {}
                OpClass::Close => self.events.remove(user_data),
            }
        }
        if n > 0 {
            self.signal_listener_ready();
        }
        n
    }
}
