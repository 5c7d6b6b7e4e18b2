//! Allocation balance of the comm queues.
//!
//! A counting allocator tracks live heap bytes per thread. Every packet
//! buffer the queues take in must be released exactly once, whether it
//! is unqueued, overwritten by `init` or dropped with the queue.

#![allow(unsafe_code)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use cnc_core::comm_queue::{CommBuffer, SharedCommBuffer};

struct CountingAlloc;

thread_local! {
    static LIVE_BYTES: Cell<isize> = const { Cell::new(0) };
}

fn adjust(delta: isize) {
    // The slot may be gone while the thread is being torn down.
    let _ = LIVE_BYTES.try_with(|live| live.set(live.get() + delta));
}

// SAFETY: forwards to the system allocator unchanged and only updates a
// plain thread-local counter.
unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            adjust(layout.size() as isize);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        adjust(-(layout.size() as isize));
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            adjust(layout.size() as isize);
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            adjust(new_size as isize - layout.size() as isize);
        }
        new_ptr
    }
}

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc;

fn live_bytes() -> isize {
    LIVE_BYTES.with(Cell::get)
}

/// Run `f` and return how many heap bytes it left allocated.
fn leaked_by<F: FnOnce()>(f: F) -> isize {
    let before = live_bytes();
    f();
    live_bytes() - before
}

#[test]
fn test_queue_and_unqueue_balance() {
    let leaked = leaked_by(|| {
        let mut buffer = CommBuffer::new(4, 4, 64);
        for round in 0..50u8 {
            assert!(buffer.queue_send(&[round; 40]).is_some());
            assert!(buffer.queue_receive(&[round; 24]).is_some());
            buffer.get_send_mut(0).unwrap().is_ack = true;
            buffer.get_receive_mut(0).unwrap().is_read = true;
            let sent = buffer.unqueue_next_send().unwrap();
            let received = buffer.unqueue_next_receive().unwrap();
            assert_eq!(sent[0], round);
            assert_eq!(received.len(), 24);
        }
    });
    assert_eq!(leaked, 0);
}

#[test]
fn test_full_queue_rejects_without_allocating() {
    let mut buffer = CommBuffer::new(4, 4, 64);
    for i in 0..4u8 {
        assert!(buffer.queue_send(&[i; 16]).is_some());
    }
    let leaked = leaked_by(|| {
        for _ in 0..10 {
            assert!(buffer.queue_send(&[9; 16]).is_none());
        }
        assert!(buffer.queue_send(&[0; 65]).is_none());
    });
    assert_eq!(leaked, 0);
}

#[test]
fn test_init_and_drop_release_everything() {
    let leaked = leaked_by(|| {
        let mut buffer = CommBuffer::new(8, 8, 128);
        for i in 0..8u8 {
            buffer.queue_send(&[i; 100]);
            buffer.queue_receive(&[i; 100]);
        }
        buffer.init();
        for i in 0..5u8 {
            buffer.queue_send(&[i; 50]);
        }
        drop(buffer);
    });
    assert_eq!(leaked, 0);
}

#[test]
fn test_acked_drain_and_retain_balance() {
    let leaked = leaked_by(|| {
        let mut buffer = CommBuffer::new(8, 8, 64);
        for i in 0..6u8 {
            buffer.queue_send(&[i; 32]);
            buffer.queue_receive(&[i; 32]);
        }
        for entry in buffer.send_entries_mut().step_by(2) {
            entry.is_ack = true;
        }
        let drained = buffer.drain_acked_sends();
        assert_eq!(drained.len(), 3);
        drop(drained);

        for index in 0..3 {
            if let Some(entry) = buffer.get_receive_mut(index) {
                entry.is_read = true;
            }
        }
        buffer.retain_receives(|entry| !entry.is_read);
        assert_eq!(buffer.num_receive(), 3);
    });
    assert_eq!(leaked, 0);
}

#[test]
fn test_shared_buffer_balance() {
    let leaked = leaked_by(|| {
        let shared = SharedCommBuffer::new(CommBuffer::new(4, 4, 32));
        for i in 0..20u8 {
            shared.queue_send(&[i; 8]);
            shared.queue_receive(&[i; 8]);
            assert_eq!(shared.take_send().as_deref(), Some(&[i; 8][..]));
            assert_eq!(shared.take_receive().as_deref(), Some(&[i; 8][..]));
        }
    });
    assert_eq!(leaked, 0);
}
