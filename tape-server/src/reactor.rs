//! Readiness reactor
//!
//! A single-threaded `mio` loop owns the listening socket and every idle
//! connection. It accepts until the listener would block, and when a
//! connection turns readable it does one bounded read. A non-empty read
//! detaches the socket from the loop and hands it, with the bytes, to the
//! [`IoPool`]; the reactor never touches it again.

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use std::collections::HashMap;
use std::io::{self, ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::pool::IoPool;
use crate::routes;
use crate::AppState;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;

const EVENT_CAPACITY: usize = 1024;

/// Reactor tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactorOptions {
    /// Bytes read per readiness event
    pub read_buffer: usize,
    /// Longest single wait for readiness
    pub poll_timeout: Duration,
}

impl Default for ReactorOptions {
    fn default() -> Self {
        Self {
            read_buffer: 4096,
            poll_timeout: Duration::from_secs(1),
        }
    }
}

/// Stops a running reactor from another thread
#[derive(Clone)]
pub struct ReactorHandle {
    stop: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ReactorHandle {
    /// Ask the loop to exit; returns immediately
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            warn!("Failed to wake reactor: {}", e);
        }
    }
}

/// The event loop
pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: HashMap<Token, TcpStream>,
    next_token: usize,
    pool: Arc<IoPool>,
    state: Arc<AppState>,
    options: ReactorOptions,
    stop: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl Reactor {
    /// Bind a non-blocking listener and register it for readability
    pub fn bind(
        addr: SocketAddr,
        pool: Arc<IoPool>,
        state: Arc<AppState>,
        options: ReactorOptions,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let poll = Poll::new()?;
        poll.registry().register(
            &mut SourceFd(&listener.as_raw_fd()),
            LISTENER,
            Interest::READABLE,
        )?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        Ok(Self {
            poll,
            listener,
            local_addr,
            connections: HashMap::new(),
            next_token: FIRST_CONNECTION,
            pool,
            state,
            options,
            stop: Arc::new(AtomicBool::new(false)),
            waker,
        })
    }

    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            stop: Arc::clone(&self.stop),
            waker: Arc::clone(&self.waker),
        }
    }

    /// Run until [`ReactorHandle::shutdown`] is called
    ///
    /// On exit the listener and idle connections are closed and the I/O pool
    /// stops accepting work; requests already handed over are not awaited.
    pub fn run(mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);
        info!("Listening on {}", self.local_addr);

        let result = loop {
            if self.stop.load(Ordering::Acquire) {
                break Ok(());
            }

            if let Err(e) = self.poll.poll(&mut events, Some(self.options.poll_timeout)) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                error!("Reactor poll failed: {}", e);
                break Err(e.into());
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_pending(),
                    WAKER => {}
                    token => self.read_ready(token),
                }
            }
        };

        self.close();
        result
    }

    /// Accept until the listener would block
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.track(stream) {
                        warn!("Dropping connection from {}: {}", peer, e);
                        continue;
                    }
                    debug!("Accepted connection from {}", peer);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    break;
                }
            }
        }
    }

    fn track(&mut self, stream: TcpStream) -> io::Result<()> {
        stream.set_nonblocking(true)?;

        let token = Token(self.next_token);
        self.next_token += 1;

        self.poll.registry().register(
            &mut SourceFd(&stream.as_raw_fd()),
            token,
            Interest::READABLE,
        )?;
        self.connections.insert(token, stream);
        Ok(())
    }

    /// One bounded read from a readable connection
    fn read_ready(&mut self, token: Token) {
        let Some(stream) = self.connections.get_mut(&token) else {
            return;
        };

        let mut buf = vec![0u8; self.options.read_buffer];
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("Client closed connection before sending a request");
                self.detach(token);
            }
            Ok(n) => {
                buf.truncate(n);
                if let Some(stream) = self.detach(token) {
                    self.dispatch(stream, buf);
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) => {
                warn!("Error reading from connection: {}", e);
                self.detach(token);
            }
        }
    }

    /// Remove a connection from the loop, returning the socket
    fn detach(&mut self, token: Token) -> Option<TcpStream> {
        let stream = self.connections.remove(&token)?;
        deregister(self.poll.registry(), &stream);
        Some(stream)
    }

    fn dispatch(&self, stream: TcpStream, request: Vec<u8>) {
        let state = Arc::clone(&self.state);
        if let Err(e) = self.pool.submit(respond(state, stream, request)) {
            warn!("Dropping request: {}", e);
        }
    }

    fn close(&mut self) {
        info!("Shutting down reactor");

        for (_, stream) in self.connections.drain() {
            deregister(self.poll.registry(), &stream);
        }
        deregister(self.poll.registry(), &self.listener);

        self.pool.shutdown();
    }
}

fn deregister<S: AsRawFd>(registry: &Registry, socket: &S) {
    if let Err(e) = registry.deregister(&mut SourceFd(&socket.as_raw_fd())) {
        debug!("Failed to deregister socket: {}", e);
    }
}

/// Build the response for one request and write it back on a pool worker
async fn respond(state: Arc<AppState>, stream: TcpStream, request: Vec<u8>) {
    let response = routes::handle(&state, &request).await;
    let bytes = response.to_bytes(&state.cors);

    let mut stream = match tokio::net::TcpStream::from_std(stream) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to adopt connection: {}", e);
            return;
        }
    };

    if let Err(e) = stream.write_all(&bytes).await {
        warn!("Error sending response: {}", e);
        return;
    }
    if let Err(e) = stream.shutdown().await {
        debug!("Error closing connection: {}", e);
    }
}
