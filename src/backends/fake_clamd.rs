//! In-process stand-in for clamd used by tests.
//!
//! Listens on a loopback TCP port, parses real INSTREAM framing and reports
//! every session it served, so tests can assert on the exact frames a
//! client sent.

use super::mock::{contains_eicar, EICAR_SIGNATURE};

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// How the fake daemon answers an INSTREAM session.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Scan the payload: EICAR is infected, anything else is clean.
    Verdict,
    /// Answer with these bytes regardless of the payload.
    Fixed(Vec<u8>),
    /// Answer `stream: OK` right after the command, then drain the frames.
    Early,
}

/// What the fake daemon observed on one connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct Session {
    pub command: Vec<u8>,
    /// Length prefix of every frame, terminator included.
    pub frames: Vec<u32>,
    pub payload: Vec<u8>,
    /// Whether the zero-length terminator arrived.
    pub terminated: bool,
}

impl Session {
    pub fn terminator_count(&self) -> usize {
        self.frames.iter().filter(|&&len| len == 0).count()
    }
}

#[derive(Debug)]
pub(crate) struct FakeClamd {
    addr: SocketAddr,
    sessions: mpsc::UnboundedReceiver<Session>,
}

impl FakeClamd {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, sessions) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((conn, _)) = listener.accept().await {
                let tx = tx.clone();
                let reply = reply.clone();
                tokio::spawn(async move {
                    let session = serve(conn, reply).await;
                    let _ = tx.send(session);
                });
            }
        });

        Self { addr, sessions }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn next_session(&mut self) -> Session {
        self.sessions.recv().await.unwrap()
    }
}

async fn serve(mut conn: TcpStream, reply: Reply) -> Session {
    let mut session = Session::default();

    loop {
        match conn.read_u8().await {
            Ok(0) | Err(_) => break,
            Ok(byte) => session.command.push(byte),
        }
    }

    match session.command.as_slice() {
        b"zPING" => {
            let _ = conn.write_all(b"PONG\0").await;
            return session;
        }
        b"zVERSION" => {
            let _ = conn
                .write_all(b"ClamAV 1.2.1/27100/Mon Nov 20 08:00:00 2023\0")
                .await;
            return session;
        }
        b"zINSTREAM" => {}
        _ => {
            let _ = conn.write_all(b"UNKNOWN COMMAND\0").await;
            return session;
        }
    }

    if matches!(reply, Reply::Early) {
        let _ = conn.write_all(b"stream: OK\0").await;
    }

    loop {
        let len = match conn.read_u32().await {
            Ok(len) => len,
            Err(_) => return session,
        };
        session.frames.push(len);
        if len == 0 {
            session.terminated = true;
            break;
        }
        let mut chunk = vec![0u8; len as usize];
        if conn.read_exact(&mut chunk).await.is_err() {
            return session;
        }
        session.payload.extend_from_slice(&chunk);
    }

    let response = match reply {
        Reply::Verdict if contains_eicar(&session.payload) => {
            format!("stream: {} FOUND\0", EICAR_SIGNATURE).into_bytes()
        }
        Reply::Verdict => b"stream: OK\0".to_vec(),
        Reply::Fixed(bytes) => bytes,
        Reply::Early => Vec::new(),
    };
    let _ = conn.write_all(&response).await;
    let _ = conn.shutdown().await;
    session
}
