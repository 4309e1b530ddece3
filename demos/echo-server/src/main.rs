//! Multi-threaded TCP echo server.
//!
//! One `io_uring` ring per worker thread, connections spread across workers
//! by the acceptor's round-robin balancer. Proves the transport crates
//! handle real concurrent I/O end to end: accept -> read -> echo -> read...
//!
//! Usage:
//!     cargo run --release -p echo-server -- [port] [worker_count]
//!
//! Test with:
//!     echo "hello" | nc localhost 9999

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use transport_core::buffer::BufferPool;
use transport_core::config::{AcceptorConfig, WorkerConfig};
use transport_core::port::{PortPayload, SENTINEL_SIZE};
use transport_core::worker::{TransferParams, Worker};
use transport_io::iouring_worker::IoUringWorker;
use transport_runtime::{TransportRoot, WorkerHandler};

fn setup_listener(ip: &str, port: u16) -> i32 {
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0);
        assert!(fd >= 0, "socket() failed");

        let opt: i32 = 1;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &opt as *const _ as *const _,
            std::mem::size_of::<i32>() as u32,
        );

        let mut addr: libc::sockaddr_in = std::mem::zeroed();
        addr.sin_family = libc::AF_INET as u16;
        addr.sin_addr.s_addr = ip.parse::<std::net::Ipv4Addr>().expect("invalid ip").into();
        addr.sin_port = port.to_be();

        let ret = libc::bind(fd, &addr as *const _ as *const _, std::mem::size_of_val(&addr) as u32);
        assert_eq!(ret, 0, "bind() failed: {}", std::io::Error::last_os_error());
        fd
    }
}

/// Echoes every byte read on a connection straight back to it.
struct EchoHandler;

impl WorkerHandler for EchoHandler {
    fn on_tick(&self, worker: &mut IoUringWorker, _drained: usize) {
        // The worker already registered the fd as a fixed file and armed the
        // initial read on accept; nothing left to do here but drain the
        // payload.
        while let Some(ptr) = worker.take_accept_payload() {
            unsafe { PortPayload::from_raw(ptr) };
        }

        while let Some(ptr) = worker.take_read_payload() {
            let payload = unsafe { PortPayload::from_raw(ptr) };
            let PortPayload::Transfer(t) = *payload else { continue };
            let Some(buffer_id) = t.buffer_id else { continue };
            if t.size == SENTINEL_SIZE || t.size == 0 {
                worker.unregister_fixed_file(t.fd);
                unsafe {
                    libc::close(t.fd);
                }
                worker.buffers_mut().release(buffer_id);
                continue;
            }
            // Echo what we just read straight back out of the same buffer.
            let _ = worker.add_write(TransferParams {
                fd: t.fd,
                buffer_id,
                offset: 0,
                timeout_ns: 0,
                sqe_flags: 0,
                sequence_id: None,
            });
        }

        while let Some(ptr) = worker.take_write_payload() {
            let payload = unsafe { PortPayload::from_raw(ptr) };
            let PortPayload::Transfer(t) = *payload else { continue };
            if t.size == SENTINEL_SIZE {
                worker.unregister_fixed_file(t.fd);
                unsafe {
                    libc::close(t.fd);
                }
                if let Some(buffer_id) = t.buffer_id {
                    worker.buffers_mut().release(buffer_id);
                }
            }
            // On success the worker has already re-armed a read on this fd
            // and buffer; nothing left to do here.
        }
    }
}

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_sigint(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let port: u16 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(9999);
    let worker_count: usize = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));

    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as usize);
        libc::signal(libc::SIGTERM, handle_sigint as usize);
    }

    eprintln!("echo-server: starting on port {port} with {worker_count} workers");

    let acceptor_config = AcceptorConfig { port, ..Default::default() };
    let server_fd = setup_listener(&acceptor_config.ip, acceptor_config.port);

    let root = TransportRoot::builder()
        .worker_count(worker_count)
        .worker_config(WorkerConfig::default())
        .acceptor_config(acceptor_config)
        .build(server_fd, Arc::new(EchoHandler))
        .expect("failed to start transport");

    eprintln!("echo-server: listening on 0.0.0.0:{port}");

    while RUNNING.load(Ordering::Relaxed) && root.is_running() {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    eprintln!("echo-server: shutting down...");
    drop(root);
    unsafe {
        libc::close(server_fd);
    }
    eprintln!("echo-server: done.");
}
