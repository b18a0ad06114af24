//! Newline framing over blocking byte streams
//!
//! Both station channels are line oriented: the master station answers in
//! `\r\n` terminated ASCII and teamwork frames are newline-delimited JSON.
//! A read timeout may split a line across calls, so the partial tail is kept
//! until the terminator arrives.

use std::io::{self, Read};

/// Longest line accepted before the buffer is considered corrupt
pub const MAX_LINE_LEN: usize = 1024 * 1024;

const CHUNK_SIZE: usize = 512;

/// Outcome of one read attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete line, terminator included
    Line(String),
    /// The read timed out before a terminator arrived
    Pending,
    /// The peer closed the stream
    Closed,
}

/// Splits a byte stream into lines, keeping partial input between reads
#[derive(Debug, Default)]
pub struct LineReader {
    buffer: Vec<u8>,
}

impl LineReader {
    /// Create an empty reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not yet returned as a line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Read until one complete line is available
    ///
    /// Timeouts (`TimedOut`, `WouldBlock`) end the attempt with
    /// [`LineEvent::Pending`]; other I/O errors are returned.
    pub fn read_line<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<LineEvent> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(LineEvent::Line(line));
            }

            match reader.read(&mut chunk) {
                Ok(0) => return Ok(LineEvent::Closed),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    if self.buffer.len() > MAX_LINE_LEN && !self.buffer.contains(&b'\n') {
                        self.buffer.clear();
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("line exceeds {} bytes", MAX_LINE_LEN),
                        ));
                    }
                }
                Err(e) if is_timeout(&e) => return Ok(LineEvent::Pending),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// True for the error kinds blocking reads report when their timeout expires
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Returns one scripted chunk per read, then times out
    struct Chunks(VecDeque<&'static [u8]>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let mut reader = LineReader::new();
        let mut stream = Chunks(VecDeque::from(vec![&b"Card: 0A"[..]]));
        assert_eq!(reader.read_line(&mut stream).unwrap(), LineEvent::Pending);
        assert_eq!(reader.pending(), 8);

        let mut stream = Chunks(VecDeque::from(vec![&b" 1B 2C 3D\r\nnext"[..]]));
        assert_eq!(
            reader.read_line(&mut stream).unwrap(),
            LineEvent::Line("Card: 0A 1B 2C 3D\r\n".to_string())
        );
        assert_eq!(reader.pending(), 4);
    }

    #[test]
    fn test_several_lines_in_one_chunk() {
        let mut reader = LineReader::new();
        let mut stream = Chunks(VecDeque::from(vec![&b"a\nb\n"[..]]));
        assert_eq!(reader.read_line(&mut stream).unwrap(), LineEvent::Line("a\n".into()));
        assert_eq!(reader.read_line(&mut stream).unwrap(), LineEvent::Line("b\n".into()));
        assert_eq!(reader.read_line(&mut stream).unwrap(), LineEvent::Pending);
    }

    #[test]
    fn test_eof_reports_closed() {
        let mut reader = LineReader::new();
        let mut empty: &[u8] = &[];
        assert_eq!(reader.read_line(&mut empty).unwrap(), LineEvent::Closed);
    }
}
