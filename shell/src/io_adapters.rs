use std::cell::RefCell;
use std::io::{Result as IoResult, Write};
use std::rc::Rc;

/// Memory-backed output sink whose contents can be read back.
///
/// Clones share one buffer: hand one clone to an [`crate::Interpreter`] or a
/// [`crate::Session`] and keep another to inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }

    /// Discards everything written so far.
    pub fn clear(&self) {
        self.buf.borrow_mut().clear();
    }
}

impl Write for SharedOutput {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}
