// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for polled block storage controllers.
//!
//! Transfers are split in two calls. A first `read()` (or `write()`) of a
//! given `(buffer, block)` pair starts the operation on the controller; once
//! [`BlockDevice::is_ready`] reports [`Status::Ready`], calling again with the
//! same pair completes it. A controller has a single data window, so there is
//! at most one read and one write in flight and starting one cancels the
//! other.

use crate::ErrorCode;

/// Size in bytes of one block.
pub const BLOCK_SIZE: usize = 512;

/// Readiness of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ready,
    Busy,
}

pub trait BlockDevice {
    /// Resets the controller, discovers its capacity and presents block `idx`
    /// in the data window. On failure the device reports zero blocks.
    fn init(&self, idx: usize) -> Result<(), ErrorCode>;

    /// Capacity in blocks, 0 until `init()` succeeded.
    fn block_count(&self) -> usize;

    /// Polls the controller. A powered-off or faulted controller is an
    /// error.
    fn is_ready(&self) -> Result<Status, ErrorCode>;

    /// Address of the data window the controller presents blocks in.
    fn window(&self) -> usize;

    /// Starts or completes the read of block `idx` into `buf`.
    ///
    /// Returns 0 when the read was started, 1 when the block was copied into
    /// `buf`. With `prefetch`, completing a read also starts the read of
    /// `idx + 1` into `buf + BLOCK_SIZE`.
    ///
    /// # Safety
    ///
    /// `buf` must be valid for `BLOCK_SIZE` bytes of writes, and the
    /// controller must be ready when completing.
    unsafe fn read(&self, buf: usize, idx: usize, prefetch: bool) -> usize;

    /// Starts or continues the write of `buf` to block `idx`.
    ///
    /// With `prefetch`, the data at `buf + BLOCK_SIZE` is staged for block
    /// `idx + 1`, which a following call for that pair then writes without
    /// copying again.
    ///
    /// # Safety
    ///
    /// `buf` must be valid for `BLOCK_SIZE` bytes of reads (twice that with
    /// `prefetch`), and the controller must be ready.
    unsafe fn write(&self, buf: usize, idx: usize, prefetch: bool);

    /// Copies `count` blocks from `src` to `dst` inside the device, handling
    /// overlap. Returns the number of blocks copied, or 0 if the controller
    /// failed; blocks already copied are not restored.
    fn copy(&self, dst: usize, src: usize, count: usize) -> usize;
}
