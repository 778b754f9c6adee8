//! Console echo for response elements.
//!
//! stdout carries echoed response data and nothing else; logs go to
//! stderr. Each element is written as one line and flushed
//! immediately so streamed responses appear as they arrive, even when
//! stdout is a pipe.

use std::io::Write;

/// Write one line to stdout and flush.
pub fn print_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}

/// Echo one response element as lossily-decoded UTF-8.
pub fn echo_element(bytes: &[u8]) -> std::io::Result<()> {
    print_line(&String::from_utf8_lossy(bytes))
}
