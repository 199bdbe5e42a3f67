//! Scriptable in-memory transport shared by the unit tests.

use embedded_hal::i2c::ErrorKind;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use crate::bus::Transport;
use crate::error::BusError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(Vec<u8>),
    Read(usize),
}

enum WriteReply {
    Accept(usize),
    Fail(ErrorKind),
}

enum ReadReply {
    Data(Vec<u8>),
    Fail(ErrorKind),
}

struct Inner {
    writes: VecDeque<WriteReply>,
    reads: VecDeque<ReadReply>,
    default_frame: [u8; 6],
    ops: Vec<(Instant, Op)>,
}

/// Unscripted writes accept every byte; unscripted reads return the default frame.
#[derive(Clone)]
pub struct FakeBus {
    inner: Arc<Mutex<Inner>>,
    in_flight: Arc<AtomicBool>,
}

impl FakeBus {
    pub fn new() -> Self {
        FakeBus {
            inner: Arc::new(Mutex::new(Inner {
                writes: VecDeque::new(),
                reads: VecDeque::new(),
                default_frame: [0xff, 0xff, 0xff, 0xff, 0xff, 0b11],
                ops: Vec::new(),
            })),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_default_frame(&self, frame: [u8; 6]) {
        self.inner.lock().unwrap().default_frame = frame;
    }

    /// Next write accepts only `accepted` bytes.
    pub fn script_write(&self, accepted: usize) {
        self.inner
            .lock()
            .unwrap()
            .writes
            .push_back(WriteReply::Accept(accepted));
    }

    pub fn script_write_error(&self, kind: ErrorKind) {
        self.inner.lock().unwrap().writes.push_back(WriteReply::Fail(kind));
    }

    /// Next read returns `data` (possibly shorter than requested).
    pub fn script_read(&self, data: Vec<u8>) {
        self.inner.lock().unwrap().reads.push_back(ReadReply::Data(data));
    }

    pub fn script_read_error(&self, kind: ErrorKind) {
        self.inner.lock().unwrap().reads.push_back(ReadReply::Fail(kind));
    }

    pub fn ops(&self) -> Vec<Op> {
        self.inner
            .lock()
            .unwrap()
            .ops
            .iter()
            .map(|(_, op)| op.clone())
            .collect()
    }

    pub fn timed_ops(&self) -> Vec<(Instant, Op)> {
        self.inner.lock().unwrap().ops.clone()
    }

    fn enter(&self) {
        assert!(
            !self.in_flight.swap(true, Ordering::SeqCst),
            "overlapping bus transactions"
        );
    }

    fn leave(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

impl Transport for FakeBus {
    fn write(&mut self, _address: u8, bytes: &[u8]) -> Result<usize, BusError> {
        self.enter();
        let reply = {
            let mut inner = self.inner.lock().unwrap();
            inner.ops.push((Instant::now(), Op::Write(bytes.to_vec())));
            inner.writes.pop_front()
        };
        // widen the window a racing writer would have to hit
        std::thread::yield_now();
        self.leave();
        match reply {
            None => Ok(bytes.len()),
            Some(WriteReply::Accept(n)) => Ok(n.min(bytes.len())),
            Some(WriteReply::Fail(kind)) => Err(BusError::Transport(kind)),
        }
    }

    fn read(&mut self, _address: u8, buf: &mut [u8]) -> Result<usize, BusError> {
        self.enter();
        let reply = {
            let mut inner = self.inner.lock().unwrap();
            inner.ops.push((Instant::now(), Op::Read(buf.len())));
            let default = inner.default_frame.to_vec();
            inner.reads.pop_front().unwrap_or(ReadReply::Data(default))
        };
        std::thread::yield_now();
        self.leave();
        match reply {
            ReadReply::Data(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            ReadReply::Fail(kind) => Err(BusError::Transport(kind)),
        }
    }
}

/// Check that every frame request is answered by its read before anything else
/// reaches the bus, and that handshake writes arrive as an uninterrupted pair.
pub fn assert_transactions_serialized(ops: &[Op]) {
    let mut i = 0;
    while i < ops.len() {
        match &ops[i] {
            Op::Write(bytes) if bytes.as_slice() == [0x00] => {
                assert_eq!(ops.get(i + 1), Some(&Op::Read(6)), "request at {} interleaved", i);
                i += 2;
            }
            Op::Write(bytes) if bytes.as_slice() == [0xf0, 0x55] => {
                assert_eq!(
                    ops.get(i + 1),
                    Some(&Op::Write(vec![0xfb, 0x00])),
                    "handshake at {} interleaved",
                    i
                );
                i += 2;
            }
            other => panic!("unexpected bus op at {}: {:?}", i, other),
        }
    }
}
