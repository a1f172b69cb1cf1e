//! Concurrent access stress tests
//!
//! Several writers and one reader hammer the same device. Each writer tags
//! its bytes with its id and a running counter, so the reader can check that
//! nothing was invented, lost, or torn.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use chardev::{CharDevice, DeviceConfig};

const WRITERS: usize = 4;
const CAPACITY: usize = 64;
const PER_WRITER: usize = 20_000;

fn tag(writer: usize, seq: usize) -> u8 {
    ((writer << 6) | (seq & 0x3F)) as u8
}

#[test]
fn writers_and_reader_preserve_order() {
    let dev = Arc::new(
        CharDevice::new(DeviceConfig {
            capacity: CAPACITY,
            ..DeviceConfig::default()
        })
        .unwrap(),
    );
    let start = Arc::new(Barrier::new(WRITERS + 2));
    let done_writing = Arc::new(AtomicBool::new(false));
    let accepted_total = Arc::new(AtomicUsize::new(0));

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let dev = Arc::clone(&dev);
            let start = Arc::clone(&start);
            let accepted_total = Arc::clone(&accepted_total);
            thread::spawn(move || {
                let session = dev.open();
                start.wait();

                let mut next = 0usize;
                while next < PER_WRITER {
                    let chunk_len = (1 + next % 7).min(PER_WRITER - next);
                    let chunk: Vec<u8> = (next..next + chunk_len).map(|s| tag(w, s)).collect();
                    let out = session.write(&chunk).unwrap();
                    next += out.accepted;
                    accepted_total.fetch_add(out.accepted, Ordering::Relaxed);
                    if out.accepted == 0 {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let reader = {
        let dev = Arc::clone(&dev);
        let start = Arc::clone(&start);
        let done_writing = Arc::clone(&done_writing);
        thread::spawn(move || {
            let session = dev.open();
            start.wait();

            let mut seen = Vec::new();
            let mut buf = [0u8; 13];
            loop {
                let finished = done_writing.load(Ordering::Acquire);
                let out = session.read(&mut buf).unwrap();
                assert!(out.returned <= buf.len());
                seen.extend_from_slice(&buf[..out.returned]);
                if finished && out.returned == 0 {
                    break;
                }
            }
            seen
        })
    };

    start.wait();
    for handle in writers {
        handle.join().unwrap();
    }
    done_writing.store(true, Ordering::Release);
    let seen = reader.join().unwrap();

    assert_eq!(seen.len(), accepted_total.load(Ordering::Relaxed));
    assert_eq!(seen.len(), WRITERS * PER_WRITER);
    assert!(dev.is_empty());

    // Every writer's bytes arrive in the order it wrote them
    let mut expected = [0usize; WRITERS];
    for byte in seen {
        let w = (byte >> 6) as usize;
        assert_eq!(byte, tag(w, expected[w]), "writer {} out of order", w);
        expected[w] += 1;
    }
    assert!(expected.iter().all(|&n| n == PER_WRITER));
}

#[test]
fn length_stays_within_capacity() {
    let dev = Arc::new(
        CharDevice::new(DeviceConfig {
            capacity: CAPACITY,
            ..DeviceConfig::default()
        })
        .unwrap(),
    );
    let stop = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..6)
        .map(|i| {
            let dev = Arc::clone(&dev);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let session = dev.open();
                let mut buf = [0u8; 24];
                while !stop.load(Ordering::Relaxed) {
                    if i % 2 == 0 {
                        session.write(&[0xEE; 24]).unwrap();
                    } else {
                        let out = session.read(&mut buf).unwrap();
                        assert!(buf[..out.returned].iter().all(|&b| b == 0xEE));
                    }
                }
            })
        })
        .collect();

    for _ in 0..10_000 {
        let len = dev.len();
        assert!(len <= CAPACITY, "length {} escaped capacity", len);
    }

    stop.store(true, Ordering::Relaxed);
    for handle in workers {
        handle.join().unwrap();
    }
    assert_eq!(dev.open_count(), 6);
}
