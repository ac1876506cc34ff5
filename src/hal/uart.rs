//! Polled USART transmitter used by the serial console

#[cfg(target_arch = "avr")]
use avr_device::atmega32a::USART;

/// Byte sink of the serial console
pub trait SerialTx {
    fn write_byte(&mut self, byte: u8);
}

/// UBRR for normal-speed asynchronous mode
pub const fn ubrr(cpu_hz: u32, baud: u32) -> u16 {
    (cpu_hz / (16 * baud) - 1) as u16
}

/// USART of the ATmega32, transmit only
#[cfg(target_arch = "avr")]
pub struct Uart {
    _private: (),
}

#[cfg(target_arch = "avr")]
impl Uart {
    const TXEN: u8 = 1 << 3;
    const UDRE: u8 = 1 << 5;
    const URSEL: u8 = 1 << 7;
    // 8 data bits, no parity, one stop bit
    const UCSZ_8N1: u8 = 0b0000_0110;

    pub fn new(cpu_hz: u32, baud: u32) -> Self {
        let ubrr = ubrr(cpu_hz, baud);
        unsafe {
            let p = USART::ptr();
            // UBRRH shares its address with UCSRC, URSEL clear selects UBRRH
            (*p).ucsrc.write(|w| w.bits(((ubrr >> 8) as u8) & !Self::URSEL));
            (*p).ubrrl.write(|w| w.bits(ubrr as u8));
            (*p).ucsrc.write(|w| w.bits(Self::URSEL | Self::UCSZ_8N1));
            (*p).ucsrb.write(|w| w.bits(Self::TXEN));
        }
        Self { _private: () }
    }
}

#[cfg(target_arch = "avr")]
impl SerialTx for Uart {
    fn write_byte(&mut self, byte: u8) {
        unsafe {
            let p = USART::ptr();
            while (*p).ucsra.read().bits() & Self::UDRE == 0 {}
            (*p).udr.write(|w| w.bits(byte));
        }
    }
}
