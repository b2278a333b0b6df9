//! End-to-end tests against a real server on 127.0.0.1

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use rtmp_hub::protocol::{client_handshake, HandshakeMode};
use rtmp_hub::registry::{Admission, Group};
use rtmp_hub::session::{
    Membership, ProtocolFuture, SessionContext, SessionHandle, SessionIo, SessionProtocol,
};
use rtmp_hub::{Error, RtmpHandler, RtmpServer, ServerConfig};

const ACCEPTED: u8 = b'A';

/// Lets anyone publish, refuses subscribers of "private"
///
/// Records lifecycle hook calls so tests can look at them.
#[derive(Clone, Default)]
struct Policy {
    hooks: Arc<Hooks>,
}

#[derive(Default)]
struct Hooks {
    modes: Mutex<Vec<(u64, HandshakeMode)>>,
    /// Session id and membership as seen by `on_session_end`
    ended: Mutex<Vec<(u64, Membership)>>,
}

impl RtmpHandler for Policy {
    fn on_handshake_complete(&self, session: &SessionHandle, mode: HandshakeMode) {
        self.hooks.modes.lock().unwrap().push((session.id(), mode));
    }

    fn on_session_end(&self, session: &SessionHandle) {
        self.hooks
            .ended
            .lock()
            .unwrap()
            .push((session.id(), session.membership()));
    }

    fn decide_publish(&self, _session: &SessionHandle, _group: &Group) -> bool {
        true
    }

    fn decide_subscribe(&self, _session: &SessionHandle, group: &Group) -> bool {
        group.stream_name() != "private"
    }
}

/// Minimal stand-in for the command layer
///
/// Frame: `b'P'` or `b'S'`, name length, name. Answers `ACCEPTED` on
/// admission and then waits for the peer to hang up.
struct TinyCommands;

impl SessionProtocol for TinyCommands {
    fn serve<'a>(&'a self, io: &'a mut dyn SessionIo, ctx: &'a SessionContext) -> ProtocolFuture<'a> {
        Box::pin(async move {
            let mut header = [0u8; 2];
            io.read_exact(&mut header).await?;
            let mut name = vec![0u8; header[1] as usize];
            io.read_exact(&mut name).await?;
            let name = String::from_utf8_lossy(&name).into_owned();

            let admission = match header[0] {
                b'P' => ctx.publish("live", &name).await?,
                _ => ctx.play("live", &name).await?,
            };
            if admission == Admission::Accepted {
                io.write_all(&[ACCEPTED]).await?;
            }

            let mut buf = [0u8; 256];
            while io.read(&mut buf).await? > 0 {}
            Ok(())
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Running = (Arc<RtmpServer>, SocketAddr, JoinHandle<rtmp_hub::Result<()>>);

async fn start(config: ServerConfig) -> Running {
    start_with(config, Policy::default()).await
}

async fn start_with(config: ServerConfig, policy: Policy) -> Running {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RtmpServer::new(config, policy, TinyCommands));

    let task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run_on(listener).await })
    };

    (server, addr, task)
}

async fn connect(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    client_handshake(&mut stream).await.unwrap();
    stream
}

/// Send a command; `Some(status)` if the server answered, `None` on close
async fn command(stream: &mut TcpStream, cmd: u8, name: &str) -> Option<u8> {
    let mut frame = vec![cmd, name.len() as u8];
    frame.extend_from_slice(name.as_bytes());
    stream.write_all(&frame).await.unwrap();

    let mut status = [0u8; 1];
    match tokio::time::timeout(Duration::from_secs(5), stream.read(&mut status)).await {
        Ok(Ok(1)) => Some(status[0]),
        Ok(Ok(_)) | Ok(Err(_)) => None,
        Err(_) => panic!("server neither answered nor closed"),
    }
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn publish_and_play_share_a_group() {
    let (server, addr, _task) = start(ServerConfig::default()).await;

    let mut publisher = connect(addr).await;
    assert_eq!(command(&mut publisher, b'P', "abc").await, Some(ACCEPTED));

    let mut subscriber = connect(addr).await;
    assert_eq!(command(&mut subscriber, b'S', "abc").await, Some(ACCEPTED));

    let registry = Arc::clone(server.registry());
    assert_eq!(registry.stream_count().await, 1);

    let group = registry.group("abc").await.unwrap();
    assert!(group.has_publisher());
    assert_eq!(group.subscriber_count(), 1);
}

#[tokio::test]
async fn second_publisher_is_closed() {
    let (server, addr, _task) = start(ServerConfig::default()).await;

    let mut first = connect(addr).await;
    assert_eq!(command(&mut first, b'P', "abc").await, Some(ACCEPTED));

    let mut second = connect(addr).await;
    assert_eq!(command(&mut second, b'P', "abc").await, None);

    let group = server.registry().group("abc").await.unwrap();
    assert_eq!(group.stats().publisher_id, Some(1));
}

#[tokio::test]
async fn policy_rejected_subscriber_is_closed() {
    let (server, addr, _task) = start(ServerConfig::default()).await;

    let mut subscriber = connect(addr).await;
    assert_eq!(command(&mut subscriber, b'S', "private").await, None);

    // The group exists, the subscriber never joined it
    let group = server.registry().group("private").await.unwrap();
    assert_eq!(group.subscriber_count(), 0);
}

#[tokio::test]
async fn publisher_disconnect_frees_the_stream() {
    let (server, addr, _task) = start(ServerConfig::default()).await;

    let mut first = connect(addr).await;
    assert_eq!(command(&mut first, b'P', "abc").await, Some(ACCEPTED));
    drop(first);

    let registry = Arc::clone(server.registry());
    eventually(|| {
        let registry = Arc::clone(&registry);
        async move {
            match registry.group("abc").await {
                Some(group) => !group.has_publisher(),
                None => false,
            }
        }
    })
    .await;

    let mut second = connect(addr).await;
    assert_eq!(command(&mut second, b'P', "abc").await, Some(ACCEPTED));
}

#[tokio::test]
async fn session_end_fires_once_after_release() {
    let policy = Policy::default();
    let hooks = Arc::clone(&policy.hooks);
    let (_server, addr, _task) = start_with(ServerConfig::default(), policy).await;

    let mut publisher = connect(addr).await;
    assert_eq!(command(&mut publisher, b'P', "abc").await, Some(ACCEPTED));
    assert_eq!(
        *hooks.modes.lock().unwrap(),
        vec![(1, HandshakeMode::Simple)]
    );
    assert!(hooks.ended.lock().unwrap().is_empty());

    drop(publisher);
    eventually(|| {
        let hooks = Arc::clone(&hooks);
        async move { !hooks.ended.lock().unwrap().is_empty() }
    })
    .await;

    // Give a duplicate call the chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        *hooks.ended.lock().unwrap(),
        vec![(1, Membership::Deregistered)]
    );
}

#[tokio::test]
async fn unclassified_disconnect_registers_nothing() {
    let (server, addr, _task) = start(ServerConfig::default()).await;

    let stream = connect(addr).await;
    drop(stream);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.registry().stream_count().await, 0);
}

#[tokio::test]
async fn silent_client_hits_handshake_timeout() {
    let config = ServerConfig::default().handshake_timeout(Duration::from_millis(100));
    let (_server, addr, _task) = start(config).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server should drop the connection");

    assert!(matches!(read, Ok(0) | Err(_)));
}

#[tokio::test]
async fn connection_limit_drops_excess_clients() {
    let config = ServerConfig::default().max_connections(1);
    let (_server, addr, _task) = start(config).await;

    let mut first = connect(addr).await;

    // No handshake answer for the second one, just a close
    let mut second = TcpStream::connect(addr).await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), client_handshake(&mut second))
        .await
        .expect("server should drop the connection");
    assert!(result.is_err());

    // The first connection is unaffected
    assert_eq!(command(&mut first, b'P', "abc").await, Some(ACCEPTED));
}

#[tokio::test]
async fn dispose_ends_the_accept_loop() {
    let (server, _addr, task) = start(ServerConfig::default()).await;

    server.dispose();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(Error::ListenerClosed)));
}

#[tokio::test]
async fn run_until_returns_ok_on_shutdown() {
    init_tracing();

    let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap());
    let server = RtmpServer::new(config, Policy::default(), TinyCommands);

    let result = server
        .run_until(tokio::time::sleep(Duration::from_millis(50)))
        .await;
    assert!(result.is_ok());
}
