use core::convert::Infallible;

use crate::hal::SerialTx;

pub struct SerialConsole<T> {
    uart: T,
}

impl<T: SerialTx> SerialConsole<T> {
    pub fn new(uart: T) -> Self {
        Self { uart }
    }

    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.uart.write_byte(byte);
        }
    }
}

impl<T: SerialTx> ufmt::uWrite for SerialConsole<T> {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        SerialConsole::write_str(self, s);
        Ok(())
    }
}
