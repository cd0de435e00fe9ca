use crate::Error;

/// Console UART.
pub trait Serial {
    fn init(&mut self, baudrate: u32) -> Result<(), Error>;

    /// Blocks until the FIFO has room, then queues `c`.
    fn put_char(&mut self, c: u8);

    /// Waits until everything queued has left the wire.
    fn flush(&mut self) {}
}
