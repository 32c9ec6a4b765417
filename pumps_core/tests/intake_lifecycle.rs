//! Command intake thread lifecycle.
//!
//! The intake thread must end on EOF, on a read error, and when the reader
//! is dropped while lines are still queued behind a full channel.

use std::io::{self, BufRead, Cursor, Read};
use std::time::{Duration, Instant};

use pumps_core::CommandReader;

fn wait_closed(reader: &CommandReader) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut lines = Vec::new();
    while !reader.is_closed() {
        assert!(Instant::now() < deadline, "intake never closed");
        match reader.poll() {
            Some(l) => lines.push(l),
            None => std::thread::sleep(Duration::from_millis(1)),
        }
    }
    lines
}

#[test]
fn dropping_a_reader_behind_a_full_queue_does_not_hang() {
    let many: String = (0..1_000).map(|i| format!("1 1 {i}\n")).collect();
    for _ in 0..10 {
        let reader = CommandReader::spawn(Cursor::new(many.clone()));
        std::thread::sleep(Duration::from_millis(5));
        assert!(reader.poll().is_some());
        drop(reader);
    }
}

/// Yields one line, then fails every read.
struct FailingSource {
    served: bool,
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.fill_buf()?.len().min(buf.len());
        buf[..n].copy_from_slice(&b"3\n"[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for FailingSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.served {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "serial port unplugged"))
        } else {
            Ok(b"3\n")
        }
    }

    fn consume(&mut self, amt: usize) {
        if amt > 0 {
            self.served = true;
        }
    }
}

#[test]
fn read_error_closes_the_reader_after_delivered_lines() {
    let reader = CommandReader::spawn(FailingSource { served: false });
    assert_eq!(wait_closed(&reader), vec!["3"]);
    assert!(reader.poll().is_none());
}

#[test]
fn empty_source_closes_immediately() {
    let reader = CommandReader::spawn(Cursor::new(""));
    assert!(wait_closed(&reader).is_empty());
}
