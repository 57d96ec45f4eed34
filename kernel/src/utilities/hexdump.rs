// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Canonical hex+ASCII dump of a memory region.

use core::fmt::{self, Write};

const COLUMNS: usize = 16;

/// Writes `mem` as lines of 16 bytes: offset, two groups of eight hex bytes
/// and the printable characters between `|`. Offsets start at `base`. A run
/// of lines identical to the previous one is collapsed into a single `*`
/// line; the last line is always printed.
pub fn hexdump(out: &mut dyn Write, base: usize, mem: &[u8]) -> fmt::Result {
    let mut dump = HexDump::new(out, base);
    dump.feed(mem)?;
    dump.finish()
}

/// [`hexdump`] over a region fed in pieces, for memory that is read through
/// a bounce buffer. Lines and repeated runs carry across pieces.
pub struct HexDump<'a> {
    out: &'a mut dyn Write,
    base: usize,
    /// Offset of the line being filled.
    offset: usize,
    line: [u8; COLUMNS],
    fill: usize,
    /// Last line printed or collapsed into it.
    previous: Option<[u8; COLUMNS]>,
    starred: bool,
    /// Offset of a repeated line that is printed only if it turns out to be
    /// the last one.
    held: Option<usize>,
}

impl<'a> HexDump<'a> {
    pub fn new(out: &'a mut dyn Write, base: usize) -> HexDump<'a> {
        HexDump {
            out,
            base,
            offset: 0,
            line: [0; COLUMNS],
            fill: 0,
            previous: None,
            starred: false,
            held: None,
        }
    }

    pub fn feed(&mut self, mut mem: &[u8]) -> fmt::Result {
        while !mem.is_empty() {
            let n = (COLUMNS - self.fill).min(mem.len());
            self.line[self.fill..self.fill + n].copy_from_slice(&mem[..n]);
            self.fill += n;
            mem = &mem[n..];
            if self.fill == COLUMNS {
                self.full_line()?;
            }
        }
        Ok(())
    }

    /// Prints what is left of the region.
    pub fn finish(mut self) -> fmt::Result {
        if self.fill > 0 {
            self.skip_held()?;
            let line = self.line;
            return self.print(self.offset, &line[..self.fill]);
        }
        match self.held.take() {
            Some(offset) => {
                let line = self.line;
                self.print(offset, &line)
            }
            None => Ok(()),
        }
    }

    fn full_line(&mut self) -> fmt::Result {
        self.skip_held()?;
        let line = self.line;
        if self.previous == Some(line) {
            self.held = Some(self.offset);
        } else {
            self.print(self.offset, &line)?;
            self.previous = Some(line);
            self.starred = false;
        }
        self.offset += COLUMNS;
        self.fill = 0;
        Ok(())
    }

    /// A held repeat followed by more data is not the last line.
    fn skip_held(&mut self) -> fmt::Result {
        if self.held.take().is_some() && !self.starred {
            self.out.write_str("*\n")?;
            self.starred = true;
        }
        Ok(())
    }

    fn print(&mut self, offset: usize, line: &[u8]) -> fmt::Result {
        write!(self.out, "{:08x}  ", self.base + offset)?;
        for col in 0..COLUMNS {
            if col == COLUMNS / 2 {
                self.out.write_char(' ')?;
            }
            match line.get(col) {
                Some(b) => write!(self.out, "{:02x} ", b)?,
                None => self.out.write_str("   ")?,
            }
        }
        self.out.write_str(" |")?;
        for &c in line {
            self.out
                .write_char(if (0x20..=0x7e).contains(&c) { c as char } else { '.' })?;
        }
        self.out.write_str("|\n")
    }
}

#[cfg(test)]
mod tests {
    use super::{hexdump, HexDump};
    use std::string::String;
    use std::vec;

    #[test]
    fn formats_partial_line() {
        let mut out = String::new();
        hexdump(&mut out, 0, b"PU32\x00\x01").unwrap();
        assert_eq!(
            out,
            "00000000  50 55 33 32 00 01                                 |PU32..|\n"
        );
    }

    #[test]
    fn collapses_repeated_lines() {
        let mut mem = vec![0u8; 80];
        mem[79] = 0x41;
        let mut out = String::new();
        hexdump(&mut out, 0x4000, &mem).unwrap();

        let lines: std::vec::Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("00004000  00 00"));
        assert_eq!(lines[1], "*");
        assert!(lines[2].starts_with("00004040  "));
        assert!(lines[2].ends_with("|...............A|"));
    }

    #[test]
    fn repeats_collapse_across_pieces() {
        let mut mem = vec![0u8; 1024];
        mem[1023] = 0x41;

        let mut pieces = String::new();
        let mut dump = HexDump::new(&mut pieces, 0x4000);
        for chunk in mem.chunks(512) {
            dump.feed(chunk).unwrap();
        }
        dump.finish().unwrap();

        assert_eq!(
            pieces,
            "00004000  00 00 00 00 00 00 00 00  00 00 00 00 00 00 00 00  |................|\n\
             *\n\
             000043f0  00 00 00 00 00 00 00 00  00 00 00 00 00 00 00 41  |...............A|\n"
        );

        let mut whole = String::new();
        hexdump(&mut whole, 0x4000, &mem).unwrap();
        assert_eq!(whole, pieces);
    }

    #[test]
    fn last_repeated_line_is_printed() {
        let mut out = String::new();
        hexdump(&mut out, 0, &[0x2a; 48]).unwrap();
        let lines: std::vec::Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "*");
        assert!(lines[2].starts_with("00000020  2a"));

        let mut out = String::new();
        hexdump(&mut out, 0, &[0x2a; 32]).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(!out.contains('*'));
    }
}
