//! `print!` and `println!` over the serial console.
//!
//! A record is formatted into a stack buffer and sent while holding
//! [`CONSOLE`], so output of a task and of the timer interrupt never mixes
//! within a line.

use core::fmt::{self, Write};

use crate::hal::Mutex;

static CONSOLE: Mutex<()> = Mutex::new(());

const LINE_CAPACITY: usize = 256;

/// Formats into a fixed buffer and hands full chunks to `sink`.
struct LineWriter<F: FnMut(&[u8])> {
    buf: [u8; LINE_CAPACITY],
    len: usize,
    sink: F,
}

impl<F: FnMut(&[u8])> LineWriter<F> {
    fn new(sink: F) -> Self {
        Self {
            buf: [0; LINE_CAPACITY],
            len: 0,
            sink,
        }
    }

    fn drain(&mut self) {
        if self.len > 0 {
            (self.sink)(&self.buf[..self.len]);
            self.len = 0;
        }
    }

    fn finish(mut self) {
        self.drain();
    }
}

impl<F: FnMut(&[u8])> Write for LineWriter<F> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            if self.len == LINE_CAPACITY {
                self.drain();
            }
            let n = bytes.len().min(LINE_CAPACITY - self.len);
            self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
            self.len += n;
            bytes = &bytes[n..];
        }
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    let _console = CONSOLE.lock();
    let mut writer = LineWriter::new(crate::drivers::uart::write_bytes);
    let _ = writer.write_fmt(args);
    writer.finish();
}

/// Prints to the kernel console.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ({
        $crate::console::print::_print(format_args!($($arg)*))
    });
}

/// Prints to the kernel console, with a newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
