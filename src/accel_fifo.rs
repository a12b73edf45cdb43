//! Shared accelerometer FIFO (§4.1, §6): `imu_feed_task` pushes samples in
//! at ADC rate; `attitude_task` drains them each cycle through
//! `attitude_core::driver::AccelFifo`.

use core::cell::RefCell;

use attitude_core::driver::AccelFifo;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;

const CAPACITY: usize = 64;

pub struct SharedAccelFifo {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Deque<[i32; 3], CAPACITY>>>,
}

impl SharedAccelFifo {
    pub const fn new() -> Self {
        Self { inner: Mutex::new(RefCell::new(Deque::new())) }
    }

    /// Push one accel sample. Drops the oldest pending sample on overflow
    /// rather than blocking the feed task — the same "always the latest
    /// wins" semantics the fast-loop's slow-data channels already use.
    pub fn push(&self, sample: [i32; 3]) {
        self.inner.lock(|cell| {
            let mut fifo = cell.borrow_mut();
            if fifo.is_full() {
                fifo.pop_front();
            }
            let _ = fifo.push_back(sample);
        });
    }
}

/// Handle `attitude_task` holds: a `'static` reference to the shared FIFO,
/// cheap to pass by value into `AttitudeEstimator::run_cycle`.
#[derive(Clone, Copy)]
pub struct AccelFifoHandle(pub &'static SharedAccelFifo);

impl AccelFifo for AccelFifoHandle {
    fn fifo_elements(&self) -> usize {
        self.0.inner.lock(|cell| cell.borrow().len())
    }

    fn pop(&mut self) -> Option<([i32; 3], usize)> {
        self.0.inner.lock(|cell| {
            let mut fifo = cell.borrow_mut();
            let sample = fifo.pop_front()?;
            Some((sample, fifo.len()))
        })
    }
}
