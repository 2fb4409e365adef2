// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use forwarder_proxy::{
    Proxy, ProxyError, RX_BYTES, SocketKind, StopListener, StopListenerFn, TX_BYTES,
};
use nix::cmsg_space;
use nix::sys::socket::{
    AddressFamily, Backlog, ControlMessage, ControlMessageOwned, MsgFlags, SockFlag, SockType,
    UnixAddr, accept, bind, connect, listen, recvmsg, sendmsg, socket,
};
use pretty_assertions::assert_eq;
use std::fs::File;
use std::io::{IoSlice, IoSliceMut, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

fn paths(dir: &TempDir) -> (PathBuf, PathBuf) {
    (dir.path().join("source.sock"), dir.path().join("target.sock"))
}

async fn connect_and_send(path: &Path) {
    let mut conn = UnixStream::connect(path).await.unwrap();
    conn.write_all(b"secret").await.unwrap();
}

async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

fn counting_listener() -> (Arc<AtomicUsize>, Arc<dyn StopListener>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let listener = Arc::new(StopListenerFn(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    (count, listener)
}

#[tokio::test]
async fn start_stop_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let (source, target) = paths(&dir);
    let mut proxy = Proxy::new(&source, &target, SocketKind::Stream, None).unwrap();
    for _ in 0..10 {
        proxy.start().unwrap();
        assert!(source.exists());
        proxy.stop().await.unwrap();
        assert!(!source.exists());
    }
    // nothing listens there anymore
    std::os::unix::net::UnixListener::bind(&source).unwrap();
}

#[tokio::test]
async fn start_twice_and_stop_unstarted() {
    let dir = tempfile::tempdir().unwrap();
    let (source, target) = paths(&dir);
    let mut proxy = Proxy::new(&source, &target, SocketKind::Stream, None).unwrap();

    let stopped = tokio::time::timeout(Duration::from_millis(100), proxy.stop())
        .await
        .unwrap();
    assert!(matches!(stopped, Err(ProxyError::NotStarted)));

    proxy.start().unwrap();
    assert!(matches!(proxy.start(), Err(ProxyError::AlreadyStarted)));
    proxy.stop().await.unwrap();
    assert!(matches!(proxy.stop().await, Err(ProxyError::NotStarted)));
}

#[tokio::test]
async fn stale_file_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let (source, target) = paths(&dir);
    File::create(&source).unwrap().write_all(b"stale").unwrap();
    let mut proxy = Proxy::new(&source, &target, SocketKind::SeqPacket, None).unwrap();
    assert!(!source.exists());
    proxy.start().unwrap();
    proxy.stop().await.unwrap();
}

#[test]
fn path_too_long() {
    let long = PathBuf::from(format!("/tmp/{}.sock", "x".repeat(200)));
    assert!(matches!(
        Proxy::new(&long, "/tmp/target.sock", SocketKind::Stream, None),
        Err(ProxyError::InvalidAddress { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn back_to_back_transfer() {
    for _ in 0..10 {
        let dir = tempfile::tempdir().unwrap();
        let (source, target) = paths(&dir);
        let mut p1 = Proxy::new(&source, &target, SocketKind::Stream, None).unwrap();
        let mut p2 = Proxy::new(&target, &source, SocketKind::Stream, None).unwrap();
        p1.start().unwrap();
        p2.start().unwrap();

        connect_and_send(&source).await;
        connect_and_send(&target).await;

        assert!(eventually(|| p1.metrics()[TX_BYTES] == "6").await);
        assert_eq!(p1.metrics().len(), 2);

        p1.stop().await.unwrap();
        p2.stop().await.unwrap();
    }
}

#[tokio::test]
async fn listener_called_on_stop() {
    let dir = tempfile::tempdir().unwrap();
    let (source, target) = paths(&dir);
    let (count, listener) = counting_listener();
    let mut proxy = Proxy::new(&source, &target, SocketKind::Stream, Some(listener)).unwrap();
    proxy.start().unwrap();
    proxy.stop().await.unwrap();
    assert!(eventually(|| count.load(Ordering::SeqCst) == 1).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_does_not_wait_for_the_listener() {
    let dir = tempfile::tempdir().unwrap();
    let (source, target) = paths(&dir);
    let (release, released) = mpsc::channel::<()>();
    let released = Mutex::new(released);
    let done = Arc::new(AtomicUsize::new(0));
    let seen = done.clone();
    // returns only once the proxy is fully stopped
    let listener = Arc::new(StopListenerFn(move |_| {
        let _ = released.lock().unwrap().recv_timeout(Duration::from_secs(5));
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    let mut proxy = Proxy::new(&source, &target, SocketKind::SeqPacket, Some(listener)).unwrap();
    proxy.start().unwrap();

    tokio::time::timeout(Duration::from_secs(1), proxy.stop())
        .await
        .unwrap()
        .unwrap();
    assert!(!source.exists());
    assert_eq!(done.load(Ordering::SeqCst), 0);

    release.send(()).unwrap();
    assert!(eventually(|| done.load(Ordering::SeqCst) == 1).await);
}

#[tokio::test]
async fn listener_called_when_target_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let (source, target) = paths(&dir);
    let (count, listener) = counting_listener();
    let mut proxy = Proxy::new(&source, &target, SocketKind::Stream, Some(listener)).unwrap();
    proxy.start().unwrap();

    connect_and_send(&source).await;
    std::fs::remove_file(&source).unwrap();
    assert!(eventually(|| count.load(Ordering::SeqCst) == 1).await);

    // stopping a proxy whose worker is gone still succeeds, and does not notify again
    proxy.stop().await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

fn seqpacket() -> OwnedFd {
    socket(
        AddressFamily::Unix,
        SockType::SeqPacket,
        SockFlag::SOCK_CLOEXEC,
        None,
    )
    .unwrap()
}

fn recv_with_fds(fd: RawFd) -> (Vec<u8>, Vec<OwnedFd>) {
    let mut buf = [0u8; 64];
    let mut cmsg = cmsg_space!([RawFd; 2]);
    let mut iov = [IoSliceMut::new(&mut buf)];
    let msg = recvmsg::<()>(fd, &mut iov, Some(&mut cmsg), MsgFlags::empty()).unwrap();
    let mut fds = Vec::new();
    for control in msg.cmsgs().unwrap() {
        if let ControlMessageOwned::ScmRights(raw) = control {
            fds.extend(
                raw.into_iter()
                    .map(|fd| unsafe { OwnedFd::from_raw_fd(fd) }),
            );
        }
    }
    let len = msg.bytes;
    (buf[..len].to_vec(), fds)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn descriptors_travel_with_messages() {
    let dir = tempfile::tempdir().unwrap();
    let (source, target) = paths(&dir);

    let server = seqpacket();
    bind(server.as_raw_fd(), &UnixAddr::new(&target).unwrap()).unwrap();
    listen(&server, Backlog::new(1).unwrap()).unwrap();

    let mut proxy = Proxy::new(&source, &target, SocketKind::SeqPacket, None).unwrap();
    proxy.start().unwrap();

    let mut shared = tempfile::tempfile().unwrap();
    shared.write_all(b"shared memory").unwrap();

    let (received, reply) = tokio::task::spawn_blocking(move || {
        let client = seqpacket();
        connect(client.as_raw_fd(), &UnixAddr::new(&source).unwrap()).unwrap();
        let fds = [shared.as_raw_fd()];
        sendmsg::<()>(
            client.as_raw_fd(),
            &[IoSlice::new(b"hello")],
            &[ControlMessage::ScmRights(&fds)],
            MsgFlags::empty(),
            None,
        )
        .unwrap();

        let conn = unsafe { OwnedFd::from_raw_fd(accept(server.as_raw_fd()).unwrap()) };
        let (data, fds) = recv_with_fds(conn.as_raw_fd());
        assert_eq!(data, b"hello");
        assert_eq!(fds.len(), 1);
        let mut content = [0u8; 13];
        File::from(fds.into_iter().next().unwrap())
            .read_exact_at(&mut content, 0)
            .unwrap();

        sendmsg::<()>(
            conn.as_raw_fd(),
            &[IoSlice::new(b"pong")],
            &[],
            MsgFlags::empty(),
            None,
        )
        .unwrap();
        let (reply, fds) = recv_with_fds(client.as_raw_fd());
        assert!(fds.is_empty());
        (content, reply)
    })
    .await
    .unwrap();

    assert_eq!(&received, b"shared memory");
    assert_eq!(reply, b"pong");
    assert!(eventually(|| proxy.metrics()[TX_BYTES] == "5").await);
    assert!(eventually(|| proxy.metrics()[RX_BYTES] == "4").await);
    proxy.stop().await.unwrap();
}
