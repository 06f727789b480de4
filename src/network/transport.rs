use std::io::{self, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::message::{Message, TERMINATOR};

/// Attempts per outbound message before it is dropped.
const SEND_RETRIES: u32 = 3;
/// Pause between attempts.
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// A participant's listening endpoint on the loopback interface.
///
/// Every participant binds an ephemeral port; the port doubles as the node's
/// identity on the wire (and as the proposal-id tie-breaker for proposers).
pub struct Listener {
    listener: TcpListener,
    port: u16,
}

impl Listener {
    pub fn bind() -> io::Result<Listener> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        let port = listener.local_addr()?.port();
        Ok(Listener { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accept loop: one frame per connection, handed to `handler` in arrival
    /// order. Running on a single thread, this loop is what serializes all
    /// state mutation for the participant that owns it. The handler returns
    /// `false` to stop serving.
    pub fn serve<F>(&self, mut handler: F) -> io::Result<()>
    where
        F: FnMut(Message) -> bool,
    {
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("listener {}: accept failed: {}", self.port, e);
                    continue;
                }
            };
            let msg = match read_frame(stream) {
                Ok(body) => match Message::parse(&body) {
                    Ok(msg) => msg,
                    Err(e) => {
                        // Malformed input never touches protocol state.
                        warn!("listener {}: discarding frame: {}", self.port, e);
                        continue;
                    }
                },
                Err(e) => {
                    warn!("listener {}: dropped connection: {}", self.port, e);
                    continue;
                }
            };
            if !handler(msg) {
                break;
            }
        }
        Ok(())
    }
}

/// Reads one `!`-terminated frame body from the connection.
fn read_frame(stream: TcpStream) -> io::Result<String> {
    let mut body = Vec::new();
    for byte in BufReader::new(stream).bytes() {
        let byte = byte?;
        if byte == TERMINATOR {
            return String::from_utf8(body)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
        }
        body.push(byte);
    }
    Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed before frame terminator",
    ))
}

/// Fire-and-forget delivery: connect, write the frame, hang up.
///
/// Runs on its own thread so the caller never blocks on a slow or dead peer.
/// Transient connect/write failures are retried a bounded number of times,
/// then the message is dropped with a warning; the protocol layer never
/// hears about it.
pub fn send(port: u16, msg: &Message) {
    let frame = msg.encode();
    thread::spawn(move || {
        for attempt in 1..=SEND_RETRIES {
            match try_send(port, &frame) {
                Ok(()) => {
                    debug!("sent frame to {}", port);
                    return;
                }
                Err(e) if attempt < SEND_RETRIES => {
                    debug!("send to {} failed (attempt {}): {}", port, attempt, e);
                    thread::sleep(RETRY_DELAY);
                }
                Err(e) => {
                    warn!(
                        "dropping message to {} after {} attempts: {}",
                        port, SEND_RETRIES, e
                    );
                }
            }
        }
    });
}

fn try_send(port: u16, frame: &[u8]) -> io::Result<()> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.write_all(frame)
}
