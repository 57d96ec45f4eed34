// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Standard error enum for BIOS operations.

use core::fmt;

/// Standard errors in the BIOS.
///
/// None of these cross the syscall boundary as-is: the syscall layer reports
/// every failure to the caller as the single `-1` sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL = 0,
    /// The component is powered down
    OFF = 3,
    /// An invalid parameter was passed
    INVAL = 5,
    /// Parameter passed was too large
    SIZE = 6,
    /// Operation or command is unsupported
    NOSUPPORT = 9,
    /// File descriptor is not handled by this call
    BADFD = 13,
    /// Offset is outside of the device
    RANGE = 14,
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorCode::FAIL => "FAIL",
            ErrorCode::OFF => "OFF",
            ErrorCode::INVAL => "INVAL",
            ErrorCode::SIZE => "SIZE",
            ErrorCode::NOSUPPORT => "NOSUPPORT",
            ErrorCode::BADFD => "BADFD",
            ErrorCode::RANGE => "RANGE",
        };
        f.write_str(name)
    }
}
