//! Cross-thread render event queue
//!
//! A single-producer/single-consumer double-buffered byte queue. The UI
//! thread appends typed, trivially-copyable events into the write buffer;
//! the render thread drains the read buffer. The two halves swap roles on
//! `dispatch_write` only when the consumer has finished the previous batch,
//! so neither side ever observes a buffer the other is touching.

pub mod fence;

pub use fence::{Fence, FenceState};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytemuck::{Pod, Zeroable};
use parking_lot::{Mutex, MutexGuard};

/// Fixed-size header preceding every event payload.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct EventHeader {
    pub event_id: u32,
    pub data_size: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<EventHeader>();

/// Growable byte buffer of `EventHeader` + payload records.
#[derive(Default)]
pub struct EventQueue {
    data: Vec<u8>,
}

impl EventQueue {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Append a typed event. The payload must be trivially copyable; the
    /// only sanctioned pointer payload is an opaque fence handle.
    pub fn write_event<T: Pod>(&mut self, event_id: u32, event: &T) {
        self.write_raw(event_id, bytemuck::bytes_of(event));
    }

    pub fn write_raw(&mut self, event_id: u32, payload: &[u8]) {
        let header = EventHeader {
            event_id,
            data_size: payload.len() as u32,
        };
        self.data.extend_from_slice(bytemuck::bytes_of(&header));
        self.data.extend_from_slice(payload);
    }

    /// Iterate events in append order.
    pub fn iter(&self) -> EventIter<'_> {
        EventIter {
            data: &self.data,
            offset: 0,
        }
    }
}

/// Iterator over `(header, payload)` records of one queue buffer.
pub struct EventIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for EventIter<'a> {
    type Item = (EventHeader, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let header: EventHeader =
            bytemuck::pod_read_unaligned(&self.data[self.offset..self.offset + HEADER_SIZE]);
        let payload_start = self.offset + HEADER_SIZE;
        let payload_end = payload_start + header.data_size as usize;
        let payload = &self.data[payload_start..payload_end];

        self.offset = payload_end;
        Some((header, payload))
    }
}

/// Double-buffered SPSC queue with a single atomic handoff signal.
///
/// The producer owns the write buffer and the swap; the consumer owns the
/// read buffer while the signal is set. The mutexes are never contended,
/// they only make the role handoff expressible in safe code.
pub struct EventDoubleBuffer {
    queues: [Mutex<EventQueue>; 2],
    read_index: AtomicUsize,
    signal: AtomicBool,
}

impl Default for EventDoubleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDoubleBuffer {
    pub fn new() -> Self {
        Self {
            queues: [
                Mutex::new(EventQueue::default()),
                Mutex::new(EventQueue::default()),
            ],
            read_index: AtomicUsize::new(0),
            signal: AtomicBool::new(false),
        }
    }

    /// Producer side: the buffer currently accepting writes.
    pub fn write_queue(&self) -> MutexGuard<'_, EventQueue> {
        let write_index = 1 - self.read_index.load(Ordering::Relaxed);
        self.queues[write_index].lock()
    }

    /// Producer side: hand the write buffer to the consumer. No-op while
    /// the consumer is still reading the previous batch; the producer keeps
    /// appending into its current write buffer until the next attempt.
    pub fn dispatch_write(&self) {
        if self.signal.load(Ordering::Acquire) {
            return;
        }

        let old_read = self.read_index.load(Ordering::Relaxed);
        self.read_index.store(1 - old_read, Ordering::Relaxed);

        // The previous read buffer becomes the fresh write buffer.
        self.queues[old_read].lock().clear();

        self.signal.store(true, Ordering::Release);
    }

    /// Consumer side: the delivered buffer, if a batch is pending.
    pub fn read_queue(&self) -> Option<MutexGuard<'_, EventQueue>> {
        if !self.signal.load(Ordering::Acquire) {
            return None;
        }
        let read_index = self.read_index.load(Ordering::Relaxed);
        Some(self.queues[read_index].lock())
    }

    /// Consumer side: release the read buffer back to the producer.
    pub fn finish_read(&self) {
        self.signal.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_iterate_in_append_order() {
        let mut queue = EventQueue::default();
        queue.write_event(7, &42u32);
        queue.write_event(8, &[1.0f32, 2.0, 3.0]);
        queue.write_event(9, &0u8);

        let mut iter = queue.iter();

        let (header, payload) = iter.next().unwrap();
        assert_eq!(header.event_id, 7);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(payload), 42);

        let (header, payload) = iter.next().unwrap();
        assert_eq!(header.event_id, 8);
        assert_eq!(payload.len(), 12);

        let (header, _) = iter.next().unwrap();
        assert_eq!(header.event_id, 9);

        assert!(iter.next().is_none());
    }

    #[test]
    fn dispatch_is_noop_while_consumer_reads() {
        let buffer = EventDoubleBuffer::new();
        buffer.write_queue().write_event(1, &1u32);
        buffer.dispatch_write();

        // Consumer has not finished; producer writes more and tries to swap.
        buffer.write_queue().write_event(2, &2u32);
        buffer.dispatch_write();

        {
            let read = buffer.read_queue().expect("batch pending");
            let ids: Vec<u32> = read.iter().map(|(h, _)| h.event_id).collect();
            assert_eq!(ids, vec![1]);
        }
        buffer.finish_read();

        // Now the second batch can be delivered.
        buffer.dispatch_write();
        {
            let read = buffer.read_queue().expect("batch pending");
            let ids: Vec<u32> = read.iter().map(|(h, _)| h.event_id).collect();
            assert_eq!(ids, vec![2]);
        }
        buffer.finish_read();
    }

    #[test]
    fn no_batch_without_dispatch() {
        let buffer = EventDoubleBuffer::new();
        buffer.write_queue().write_event(1, &1u32);
        assert!(buffer.read_queue().is_none());
    }
}
