// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Non-blocking unix socket primitives on top of [`AsyncFd`].

use nix::cmsg_space;
use nix::errno::Errno;
use nix::sys::socket::{
    AddressFamily, Backlog, ControlMessage, ControlMessageOwned, MsgFlags, SockFlag, UnixAddr,
    accept4, bind, connect, getsockopt, listen, recvmsg, sendmsg, socket, sockopt,
};
use std::io::{self, IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tracing::{debug, warn};

use crate::SocketKind;

/// Size of the relay buffer. Memif control messages are 128 bytes.
pub(crate) const BUFFER_SIZE: usize = 128;
/// Descriptors accepted per message
const MAX_FDS: usize = 4;
const LISTEN_BACKLOG: i32 = 16;
const CONNECT_RETRY: Duration = Duration::from_millis(20);

pub(crate) type Socket = AsyncFd<OwnedFd>;

fn flags() -> SockFlag {
    SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC
}

#[allow(unsafe_code)]
fn owned(fd: RawFd) -> OwnedFd {
    // SAFETY: fd was just handed over by the kernel (accept4 or SCM_RIGHTS) and nothing
    // else owns it.
    unsafe { OwnedFd::from_raw_fd(fd) }
}

/// A bound, listening socket registered with the runtime
pub(crate) fn listen_on(addr: &UnixAddr, kind: SocketKind) -> io::Result<Socket> {
    let fd = socket(AddressFamily::Unix, kind.sock_type(), flags(), None)?;
    bind(fd.as_raw_fd(), addr)?;
    listen(&fd, Backlog::new(LISTEN_BACKLOG)?)?;
    AsyncFd::new(fd)
}

pub(crate) async fn accept(listener: &Socket) -> io::Result<Socket> {
    loop {
        let mut guard = listener.readable().await?;
        match guard.try_io(|inner| {
            accept4(inner.as_raw_fd(), flags()).map_err(io::Error::from)
        }) {
            Ok(fd) => return AsyncFd::new(owned(fd?)),
            Err(_would_block) => {}
        }
    }
}

/// Connect to `target`. A full backlog on the target side is retried until the caller gives up.
pub(crate) async fn connect_to(target: &UnixAddr, kind: SocketKind) -> io::Result<Socket> {
    loop {
        let fd = socket(AddressFamily::Unix, kind.sock_type(), flags(), None)?;
        match connect(fd.as_raw_fd(), target) {
            Ok(()) => return AsyncFd::new(fd),
            Err(Errno::EINPROGRESS) => {
                let fd = AsyncFd::new(fd)?;
                drop(fd.writable().await?);
                return match getsockopt(fd.get_ref(), sockopt::SocketError)? {
                    0 => Ok(fd),
                    e => Err(io::Error::from_raw_os_error(e)),
                };
            }
            Err(Errno::EAGAIN) => {
                debug!("Backlog of {target} is full, retrying");
                tokio::time::sleep(CONNECT_RETRY).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// One message read off a socket: payload length and the descriptors that came with it
pub(crate) struct Received {
    pub(crate) len: usize,
    pub(crate) fds: Vec<OwnedFd>,
}

impl Received {
    pub(crate) fn is_eof(&self) -> bool {
        self.len == 0 && self.fds.is_empty()
    }
}

pub(crate) async fn receive(from: &Socket, data: &mut [u8]) -> io::Result<Received> {
    let mut cmsg = cmsg_space!([RawFd; MAX_FDS]);
    loop {
        let mut guard = from.readable().await?;
        let res = guard.try_io(|inner| {
            let mut iov = [IoSliceMut::new(&mut *data)];
            let msg = recvmsg::<()>(
                inner.as_raw_fd(),
                &mut iov,
                Some(&mut cmsg),
                MsgFlags::MSG_CMSG_CLOEXEC,
            )?;
            if msg.flags.contains(MsgFlags::MSG_CTRUNC) {
                warn!("Control data truncated, some descriptors were dropped");
            }
            if msg.flags.contains(MsgFlags::MSG_TRUNC) {
                warn!("Message larger than {BUFFER_SIZE} bytes got truncated");
            }
            let mut fds = Vec::new();
            for control in msg.cmsgs()? {
                if let ControlMessageOwned::ScmRights(raw) = control {
                    fds.extend(raw.into_iter().map(owned));
                }
            }
            Ok(Received {
                len: msg.bytes,
                fds,
            })
        });
        match res {
            Ok(received) => return received,
            Err(_would_block) => {}
        }
    }
}

async fn send_once(
    to: &Socket,
    iov: &[IoSlice<'_>],
    cmsgs: &[ControlMessage<'_>],
) -> io::Result<usize> {
    loop {
        let mut guard = to.writable().await?;
        match guard.try_io(|inner| {
            sendmsg::<()>(inner.as_raw_fd(), iov, cmsgs, MsgFlags::MSG_NOSIGNAL, None)
                .map_err(io::Error::from)
        }) {
            Ok(sent) => return sent,
            Err(_would_block) => {}
        }
    }
}

/// Send `data` with `fds` attached. An empty payload or an empty set of descriptors is left out
/// of the message rather than sent as a zero-length part.
pub(crate) async fn send(to: &Socket, data: &[u8], fds: &[OwnedFd]) -> io::Result<()> {
    let raw: Vec<RawFd> = fds.iter().map(AsRawFd::as_raw_fd).collect();
    let rights = [ControlMessage::ScmRights(&raw)];
    let mut cmsgs: &[ControlMessage] = if raw.is_empty() { &[] } else { &rights };
    let mut rest = data;
    loop {
        let slice = [IoSlice::new(rest)];
        let iov: &[IoSlice] = if rest.is_empty() { &[] } else { &slice };
        let sent = send_once(to, iov, cmsgs).await?;
        rest = &rest[sent.min(rest.len())..];
        if rest.is_empty() {
            return Ok(());
        }
        if sent == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        // descriptors travel with the first part only
        cmsgs = &[];
    }
}
