//! Line protocol with the motion controller.
//!
//! Every request is one ASCII line terminated by `\r`. Commands are
//! acknowledged by a line containing `ok`; queries return one or more lines
//! followed by a line that is exactly `ok`. A read that times out yields an
//! empty line and counts against a fixed retry budget.

use crate::defaults::{COMMAND_READ_ATTEMPTS, QUERY_READ_ATTEMPTS};
use crate::errors::ProtocolError;
use crate::log::{debug, trace};
use std::io::{self, Read, Write};

/// Bidirectional line transport to the controller
pub trait LineTransport {
    /// Write `line` verbatim; it already carries its terminator
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Read the next line without its terminator. An empty string means the
    /// read timed out.
    fn read_line(&mut self) -> io::Result<String>;
}

impl<T: LineTransport + ?Sized> LineTransport for &mut T {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self) -> io::Result<String> {
        (**self).read_line()
    }
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self) -> io::Result<String> {
        (**self).read_line()
    }
}

/// Adapts a byte stream (serial port, socket) configured with a read
/// timeout. Timeouts become empty reads; `\r` and `\n` both end a line.
pub struct StreamTransport<S> {
    stream: S,
    pending: Vec<u8>,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        StreamTransport {
            stream,
            pending: Vec::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> LineTransport for StreamTransport<S> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\r' || b == b'\n') {
                let raw: Vec<u8> = self.pending.drain(..=end).collect();
                if end == 0 {
                    // Second half of a `\r\n` pair
                    continue;
                }
                return Ok(String::from_utf8_lossy(&raw[..end]).into_owned());
            }
            let mut buf = [0u8; 256];
            match self.stream.read(&mut buf) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    return Ok(String::new());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Show control characters as `<XX>` so logged traffic stays on one line
pub fn escape_control(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_control() {
            out.push_str(&format!("<{:02X}>", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Request/response exchange with retry and acknowledgment checking.
///
/// The first failure closes the link; every later call fails with
/// [`ProtocolError::LinkClosed`] without touching the transport.
pub struct SerialLink<T> {
    transport: T,
    closed: bool,
}

impl<T: LineTransport> SerialLink<T> {
    pub fn new(transport: T) -> Self {
        SerialLink {
            transport,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send a command and wait for its acknowledgment
    pub fn command(&mut self, line: &str) -> Result<(), ProtocolError> {
        let result = self.exchange_command(line);
        self.close_on_error(result)
    }

    /// Send a query and collect its reply lines, joined with `\n`
    pub fn query(&mut self, line: &str) -> Result<String, ProtocolError> {
        let result = self.exchange_query(line);
        self.close_on_error(result)
    }

    fn close_on_error<R>(&mut self, result: Result<R, ProtocolError>) -> Result<R, ProtocolError> {
        if let Err(e) = &result {
            debug!(error = %e, "closing controller link");
            self.closed = true;
        }
        result
    }

    fn send(&mut self, line: &str) -> Result<(), ProtocolError> {
        if self.closed {
            return Err(ProtocolError::LinkClosed);
        }
        let framed = format!("{line}\r");
        trace!(line = %escape_control(&framed), "send");
        self.transport
            .write_line(&framed)
            .map_err(|source| ProtocolError::Transport {
                command: line.to_string(),
                source,
            })
    }

    fn receive(&mut self, line: &str) -> Result<String, ProtocolError> {
        let response = self
            .transport
            .read_line()
            .map_err(|source| ProtocolError::Transport {
                command: line.to_string(),
                source,
            })?;
        if !response.is_empty() {
            trace!(line = %escape_control(&response), "receive");
        }
        Ok(response.trim().to_string())
    }

    fn exchange_command(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.send(line)?;
        let mut response = String::new();
        for _ in 0..COMMAND_READ_ATTEMPTS {
            response = self.receive(line)?;
            if !response.is_empty() {
                break;
            }
        }
        if response.is_empty() {
            return Err(ProtocolError::Timeout {
                command: line.to_string(),
                attempts: COMMAND_READ_ATTEMPTS,
            });
        }
        if response.contains("ok") {
            Ok(())
        } else {
            Err(ProtocolError::Unexpected {
                command: line.to_string(),
                response,
            })
        }
    }

    fn exchange_query(&mut self, line: &str) -> Result<String, ProtocolError> {
        self.send(line)?;
        let mut reply: Vec<String> = Vec::new();
        let mut attempts = 0;
        loop {
            if attempts >= QUERY_READ_ATTEMPTS {
                return Err(ProtocolError::Timeout {
                    command: line.to_string(),
                    attempts: QUERY_READ_ATTEMPTS,
                });
            }
            let response = self.receive(line)?;
            if response.is_empty() {
                attempts += 1;
                continue;
            }
            if response == "ok" {
                return Ok(reply.join("\n"));
            }
            if response.starts_with("error:") {
                return Err(ProtocolError::Unexpected {
                    command: line.to_string(),
                    response,
                });
            }
            reply.push(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted reads; an exhausted script reads as a timeout
    #[derive(Default)]
    struct Scripted {
        reads: VecDeque<String>,
        written: Vec<String>,
        read_calls: usize,
    }

    impl Scripted {
        fn new(reads: &[&str]) -> Self {
            Scripted {
                reads: reads.iter().map(|s| s.to_string()).collect(),
                ..Scripted::default()
            }
        }
    }

    impl LineTransport for Scripted {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            self.written.push(line.to_string());
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<String> {
            self.read_calls += 1;
            Ok(self.reads.pop_front().unwrap_or_default())
        }
    }

    #[test]
    fn command_acknowledged_on_first_read() {
        let mut link = SerialLink::new(Scripted::new(&["ok\r"]));
        link.command("G90").unwrap();
        let transport = link.into_inner();
        assert_eq!(transport.written, ["G90\r"]);
        assert_eq!(transport.read_calls, 1);
    }

    #[test]
    fn command_retries_empty_reads() {
        let mut link = SerialLink::new(Scripted::new(&["", "", "ok"]));
        link.command("M3 S40").unwrap();
        assert_eq!(link.into_inner().read_calls, 3);
    }

    #[test]
    fn command_times_out_after_thirty_empty_reads() {
        let mut link = SerialLink::new(Scripted::new(&[]));
        let err = link.command("G90").unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout { attempts: 30, .. }));
        assert!(link.is_closed());

        let err = link.command("G4 P0").unwrap_err();
        assert!(matches!(err, ProtocolError::LinkClosed));
        let transport = link.into_inner();
        assert_eq!(transport.read_calls, 30);
        assert_eq!(transport.written, ["G90\r"]);
    }

    #[test]
    fn command_rejects_other_responses() {
        let mut link = SerialLink::new(Scripted::new(&["error:20"]));
        let err = link.command("G7").unwrap_err();
        match err {
            ProtocolError::Unexpected { response, .. } => assert_eq!(response, "error:20"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(link.is_closed());
    }

    #[test]
    fn query_single_line() {
        let mut link = SerialLink::new(Scripted::new(&["v1.0", "ok"]));
        assert_eq!(link.query("$I").unwrap(), "v1.0");
    }

    #[test]
    fn query_multiple_lines() {
        let mut link = SerialLink::new(Scripted::new(&["line1", "", "line2", "ok"]));
        assert_eq!(link.query("$$").unwrap(), "line1\nline2");
    }

    #[test]
    fn query_bare_ok_is_empty_reply() {
        let mut link = SerialLink::new(Scripted::new(&["ok"]));
        assert_eq!(link.query("$#").unwrap(), "");
    }

    #[test]
    fn query_error_line_is_unexpected() {
        let mut link = SerialLink::new(Scripted::new(&["error:3"]));
        assert!(matches!(link.query("$Q").unwrap_err(), ProtocolError::Unexpected { .. }));
    }

    #[test]
    fn query_budget_covers_continuation_reads() {
        let mut link = SerialLink::new(Scripted::new(&["partial"]));
        let err = link.query("$$").unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout { attempts: 100, .. }));
        assert_eq!(link.into_inner().read_calls, 101);
    }

    #[test]
    fn transport_failure_is_distinct() {
        struct Broken;
        impl LineTransport for Broken {
            fn write_line(&mut self, _: &str) -> io::Result<()> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
            fn read_line(&mut self) -> io::Result<String> {
                Ok(String::new())
            }
        }
        let mut link = SerialLink::new(Broken);
        assert!(matches!(link.command("G90").unwrap_err(), ProtocolError::Transport { .. }));
        assert!(link.is_closed());
    }

    /// Byte stream that hands out one chunk per read, then times out
    struct Chunks(VecDeque<Vec<u8>>, Vec<u8>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    impl Write for Chunks {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.1.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stream_transport_splits_lines_across_reads() {
        let chunks = Chunks(
            [b"[VER:1.1".to_vec(), b"h]\r\nok\r\n".to_vec()].into_iter().collect(),
            Vec::new(),
        );
        let mut link = SerialLink::new(StreamTransport::new(chunks));
        assert_eq!(link.query("$I").unwrap(), "[VER:1.1h]");
        let stream = link.into_inner().into_inner();
        assert_eq!(stream.1, b"$I\r");
    }

    #[test]
    fn stream_transport_timeout_reads_empty() {
        let mut transport = StreamTransport::new(Chunks(VecDeque::new(), Vec::new()));
        assert_eq!(transport.read_line().unwrap(), "");
    }

    #[test]
    fn escape_control_characters() {
        assert_eq!(escape_control("ok\r\n"), "ok<0D><0A>");
    }
}
