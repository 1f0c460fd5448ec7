//! TCP upload/console server worker.
//!
//! Runs on a dedicated thread in network mode. One client connection
//! is served per session:
//!
//! 1. The client uploads a firmware image: `LOAD <size>\n` followed by
//!    `size` raw bytes; the server replies `OK <size>\n`.
//! 2. Every subsequent line is a debugger command. Command output is
//!    written back to the same connection through [`TcpConsole`].
//!
//! All cross-thread traffic flows through a [`ServerEvent`] channel:
//! `Ready` is sent once a client has connected (so a banner reaches
//! it), `Firmware` once the image has arrived, and the main thread
//! processes events in that order — the emulator never runs before the
//! upload completes. An incoming line also raises the [`StopToken`] so
//! typing while the processor runs drops it back into debug mode; the
//! line is then consumed as a command.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use crate::debugger::Console;
use crate::firmware::DEFAULT_LOAD_ADDR;
use crate::memory::MEM_SIZE;
use crate::StopToken;

/// Events delivered from the worker to the main thread.
pub enum ServerEvent {
    /// A client connected; the console writes to its stream
    Ready(TcpConsole),
    /// A firmware image was received
    Firmware { image: Vec<u8>, load_addr: u16 },
    /// A command line arrived
    Command(String),
    /// The connection ended or the worker failed
    Closed,
}

/// Console sink writing rendered text to the connected client.
pub struct TcpConsole {
    stream: TcpStream,
}

impl Console for TcpConsole {
    fn print(&mut self, text: &str) {
        let _ = self.stream.write_all(text.as_bytes());
        let _ = self.stream.flush();
    }
}

/// Upload/console server bound to a local TCP port.
pub struct UploadServer {
    listener: TcpListener,
    port: u16,
}

impl UploadServer {
    /// Bind to the given port (0 picks an ephemeral port).
    pub fn bind(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        let port = listener.local_addr()?.port();
        eprintln!("Upload server listening on 127.0.0.1:{}", port);
        Ok(UploadServer { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve one client session. Blocks until the client disconnects.
    pub fn run(self, events: &Sender<ServerEvent>, stop: &StopToken) -> io::Result<()> {
        let (stream, addr) = self.listener.accept()?;
        eprintln!("Client connected from {}", addr);
        stream.set_nodelay(true)?;

        let mut writer = stream.try_clone()?;
        let console = TcpConsole {
            stream: stream.try_clone()?,
        };
        if events.send(ServerEvent::Ready(console)).is_err() {
            return Ok(());
        }
        let mut reader = BufReader::new(stream);

        // Upload phase: wait for a valid LOAD framing line
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let mut parts = line.split_whitespace();
            let is_load = parts
                .next()
                .map(|t| t.eq_ignore_ascii_case("LOAD"))
                .unwrap_or(false);
            if !is_load {
                writer.write_all(b"ERR upload required: LOAD <size>\n")?;
                continue;
            }
            let size: usize = parts.next().and_then(|t| t.parse().ok()).unwrap_or(0);
            if size == 0 || size > MEM_SIZE {
                writer.write_all(b"ERR bad size\n")?;
                continue;
            }
            let mut image = vec![0u8; size];
            reader.read_exact(&mut image)?;
            writer.write_all(format!("OK {}\n", size).as_bytes())?;
            let _ = events.send(ServerEvent::Firmware {
                image,
                load_addr: DEFAULT_LOAD_ADDR,
            });
            break;
        }

        // Command phase: forward lines, requesting a stop first so a
        // running processor halts before the command is consumed
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            stop.request_stop();
            if events
                .send(ServerEvent::Command(line.trim_end().to_string()))
                .is_err()
            {
                return Ok(());
            }
        }
    }
}

/// Bind and spawn the worker thread. `Closed` is always delivered when
/// the session ends, however it ends.
pub fn spawn(
    port: u16,
    events: Sender<ServerEvent>,
    stop: StopToken,
) -> io::Result<(u16, JoinHandle<()>)> {
    let server = UploadServer::bind(port)?;
    let bound = server.port();
    let handle = thread::spawn(move || {
        if let Err(e) = server.run(&events, &stop) {
            eprintln!("Upload server error: {}", e);
        }
        let _ = events.send(ServerEvent::Closed);
    });
    Ok((bound, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn recv(rx: &mpsc::Receiver<ServerEvent>) -> ServerEvent {
        rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_upload_then_commands() {
        let (tx, rx) = mpsc::channel();
        let stop = StopToken::new();
        let (port, handle) = spawn(0, tx, stop.clone()).unwrap();

        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        assert!(matches!(recv(&rx), ServerEvent::Ready(_)));

        // A stray line before the upload is rejected
        client.write_all(b"regs\n").unwrap();
        let mut reader = BufReader::new(client.try_clone().unwrap());
        let mut reply = String::new();
        reader.read_line(&mut reply).unwrap();
        assert!(reply.starts_with("ERR"));

        client.write_all(b"LOAD 4\n").unwrap();
        client.write_all(&[0x31, 0x40, 0x00, 0x04]).unwrap();
        reply.clear();
        reader.read_line(&mut reply).unwrap();
        assert_eq!(reply.trim(), "OK 4");
        match recv(&rx) {
            ServerEvent::Firmware { image, load_addr } => {
                assert_eq!(image, vec![0x31, 0x40, 0x00, 0x04]);
                assert_eq!(load_addr, DEFAULT_LOAD_ADDR);
            }
            _ => panic!("expected firmware event"),
        }

        client.write_all(b"step 2\n").unwrap();
        match recv(&rx) {
            ServerEvent::Command(line) => assert_eq!(line, "step 2"),
            _ => panic!("expected command event"),
        }
        assert!(stop.take());

        drop(reader);
        drop(client);
        assert!(matches!(recv(&rx), ServerEvent::Closed));
        handle.join().unwrap();
    }
}
