// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Fair spinning mutual exclusion between cores.
//!
//! [`TicketLock`] is the raw lock: a gate word serializes the ticket
//! dispenser, and each locker then spins until the `current` counter reaches
//! the ticket it drew, so cores enter in the order they drew tickets.
//! [`Mutex`] wraps a value behind a `TicketLock` and hands out an RAII guard.
//!
//! There is no scheduler to yield to, so waiting is always a busy loop and
//! never times out.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::config::CONFIG;

pub struct TicketLock {
    gate: AtomicUsize,
    ticket: AtomicUsize,
    current: AtomicUsize,
}

impl TicketLock {
    pub const fn new() -> TicketLock {
        TicketLock {
            gate: AtomicUsize::new(0),
            ticket: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
        }
    }

    /// Blocks until the caller owns the lock.
    pub fn lock(&self) {
        self.acquire(CONFIG.guard_ticket_wrap)
    }

    fn acquire(&self, guard_wrap: bool) {
        while self.gate.swap(1, Ordering::Acquire) != 0 {
            spin_loop();
        }
        if guard_wrap {
            // With every ticket handed out, drawing one more would wrap onto
            // the holder's ticket.
            while self
                .ticket
                .load(Ordering::Relaxed)
                .wrapping_sub(self.current.load(Ordering::Acquire))
                == usize::MAX
            {
                spin_loop();
            }
        }
        let ticket = self.ticket.load(Ordering::Relaxed);
        self.ticket.store(ticket.wrapping_add(1), Ordering::Relaxed);
        self.gate.store(0, Ordering::Release);

        while self.current.load(Ordering::Acquire) != ticket {
            spin_loop();
        }
    }

    /// Hands the lock to the next ticket holder.
    ///
    /// Must only be called by the core that owns the lock.
    pub fn unlock(&self) {
        let current = self.current.load(Ordering::Relaxed);
        self.current.store(current.wrapping_add(1), Ordering::Release);
    }

    /// Number of tickets drawn but not yet released, the holder included.
    pub fn queued(&self) -> usize {
        self.ticket
            .load(Ordering::Acquire)
            .wrapping_sub(self.current.load(Ordering::Acquire))
    }
}

/// A value protected by a [`TicketLock`].
pub struct Mutex<T> {
    lock: TicketLock,
    value: UnsafeCell<T>,
}

// SAFETY: the ticket lock gives a single core access to `value` at a time.
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Mutex<T> {
        Mutex {
            lock: TicketLock::new(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.lock.lock();
        MutexGuard { mutex: self }
    }

    pub fn queued(&self) -> usize {
        self.lock.queued()
    }
}

pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while the lock is held.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard exists only while the lock is held.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::{Mutex, TicketLock};
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use std::vec::Vec;

    #[test]
    fn lock_unlock_advances_counters() {
        let lock = TicketLock::new();
        assert_eq!(lock.queued(), 0);
        lock.lock();
        assert_eq!(lock.queued(), 1);
        lock.unlock();
        assert_eq!(lock.queued(), 0);
        lock.lock();
        lock.unlock();
        assert_eq!(lock.queued(), 0);
    }

    #[test]
    fn waiters_enter_in_ticket_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let held = order.lock();

        let mut handles = Vec::new();
        for i in 0..6usize {
            let shared = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                shared.lock().push(i);
            }));
            // Wait for thread `i` to draw its ticket before starting the next
            // one, so ticket order equals spawn order.
            while order.queued() != i + 2 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        drop(held);

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(order.lock().as_slice(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn counter_survives_contention() {
        let counter = Arc::new(Mutex::new(0usize));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *shared.lock() += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*counter.lock(), 4000);
    }

    #[test]
    fn guarded_lock_waits_for_a_free_ticket() {
        let lock = Arc::new(TicketLock::new());
        // Every ticket is handed out: drawing one more would collide with
        // the holder's.
        lock.current.store(5, Ordering::Relaxed);
        lock.ticket.store(4, Ordering::Relaxed);

        let entered = Arc::new(AtomicBool::new(false));
        let waiter = {
            let lock = Arc::clone(&lock);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                lock.acquire(true);
                entered.store(true, Ordering::Release);
                lock.unlock();
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!entered.load(Ordering::Acquire));
        assert_eq!(lock.ticket.load(Ordering::Relaxed), 4);

        // Free the ticket space; the waiter draws ticket 5 and enters.
        lock.ticket.store(5, Ordering::Relaxed);
        waiter.join().unwrap();
        assert!(entered.load(Ordering::Acquire));
        assert_eq!(lock.ticket.load(Ordering::Relaxed), 6);
        assert_eq!(lock.queued(), 0);
    }
}
