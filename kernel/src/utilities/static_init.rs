// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for statically initializing objects in memory.

/// Allocates a statically-sized global buffer and initializes it with a
/// value of a particular type, returning a `&'static mut` reference to it.
///
/// Because this instantiates a static object, the type cannot mention
/// generic parameters of the enclosing function.
///
/// # Safety
///
/// The macro writes to a global without any locking. The code expanding it
/// must run at most once, otherwise the first value is overwritten without
/// running its destructor.
#[macro_export]
macro_rules! static_init {
    ($T:ty, $e:expr $(,)?) => {{
        let buf = $crate::static_buf!($T);
        buf.write($e)
    }};
}

/// Allocates a statically-sized global buffer for a value of type `$T`
/// without initializing it, and returns `&'static mut MaybeUninit<$T>`.
#[macro_export]
macro_rules! static_buf {
    ($T:ty $(,)?) => {{
        static mut BUF: core::mem::MaybeUninit<$T> = core::mem::MaybeUninit::uninit();
        &mut *core::ptr::addr_of_mut!(BUF)
    }};
}
