// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host routines callable from generated code.

use std::io::Write;

/// Default `print`: writes the value and a newline to stdout.
///
/// Write failures are dropped; nothing may unwind out of this frame.
pub extern "C" fn builtin_print(value: i32) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{value}");
}

/// Address of a host `print` routine, as embedded in generated code.
pub fn print_address(print: extern "C" fn(i32)) -> u64 {
    print as usize as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn other(_: i32) {}

    #[test]
    fn test_addresses_differ() {
        assert_ne!(print_address(builtin_print), 0);
        assert_ne!(print_address(builtin_print), print_address(other));
    }
}
