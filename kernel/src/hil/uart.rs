// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for polled console I/O.

/// A polled character device.
///
/// Both directions are non-blocking: they move as many bytes as the device
/// FIFOs allow right now and report how many that was.
pub trait Console {
    /// Queues bytes for transmission. Returns the number of bytes accepted.
    fn transmit(&self, bytes: &[u8]) -> usize;

    /// Moves pending received bytes into `buf`. Returns the number of bytes
    /// stored.
    fn receive(&self, buf: &mut [u8]) -> usize;
}
