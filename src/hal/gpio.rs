use crate::error::{Error, Fault};
use embedded_hal::digital::v2::OutputPin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    A,
    B,
    C,
    D,
}

/// One pin of one port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinId {
    pub port: Port,
    pub pin: u8,
}

impl PinId {
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }

    #[inline]
    pub fn mask(&self) -> Result<u8, Error> {
        if self.pin > 7 {
            return Err(Error::InvalidConfiguration(Fault::Pin));
        }
        Ok(1 << self.pin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Raw digital I/O capability every driver is written against.
///
/// Writing `High` to a pin configured as input enables its pull-up.
pub trait Gpio {
    fn configure(&mut self, pin: PinId, direction: Direction) -> Result<(), Error>;
    fn write(&mut self, pin: PinId, level: Level) -> Result<(), Error>;
    fn read(&mut self, pin: PinId) -> Result<Level, Error>;
}

/// A single output pin of a [`Gpio`] exposed as an embedded-hal `OutputPin`
pub struct GpioPin<G> {
    gpio: G,
    id: PinId,
}

impl<G: Gpio> GpioPin<G> {
    pub fn output(mut gpio: G, id: PinId) -> Result<Self, Error> {
        gpio.configure(id, Direction::Output)?;
        Ok(Self { gpio, id })
    }
}

impl<G: Gpio> OutputPin for GpioPin<G> {
    type Error = Error;

    fn set_low(&mut self) -> Result<(), Error> {
        self.gpio.write(self.id, Level::Low)
    }

    fn set_high(&mut self) -> Result<(), Error> {
        self.gpio.write(self.id, Level::High)
    }
}

/// Port registers of the ATmega32
#[cfg(target_arch = "avr")]
#[derive(Clone, Copy, Default)]
pub struct Atmega32Gpio {
    _private: (),
}

#[cfg(target_arch = "avr")]
impl Atmega32Gpio {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

// Binds the DDRx, PORTx and PINx registers of `$port` for `$body`
#[cfg(target_arch = "avr")]
macro_rules! with_port {
    ($port:expr, |$ddr:ident, $out:ident, $input:ident| $body:expr) => {{
        use avr_device::atmega32a::{PORTA, PORTB, PORTC, PORTD};
        unsafe {
            match $port {
                Port::A => {
                    let p = &*PORTA::ptr();
                    let ($ddr, $out, $input) = (&p.ddra, &p.porta, &p.pina);
                    $body
                }
                Port::B => {
                    let p = &*PORTB::ptr();
                    let ($ddr, $out, $input) = (&p.ddrb, &p.portb, &p.pinb);
                    $body
                }
                Port::C => {
                    let p = &*PORTC::ptr();
                    let ($ddr, $out, $input) = (&p.ddrc, &p.portc, &p.pinc);
                    $body
                }
                Port::D => {
                    let p = &*PORTD::ptr();
                    let ($ddr, $out, $input) = (&p.ddrd, &p.portd, &p.pind);
                    $body
                }
            }
        }
    }};
}

#[cfg(target_arch = "avr")]
impl Gpio for Atmega32Gpio {
    fn configure(&mut self, pin: PinId, direction: Direction) -> Result<(), Error> {
        let mask = pin.mask()?;
        avr_device::interrupt::free(|_| {
            with_port!(pin.port, |ddr, out, _input| match direction {
                Direction::Output => ddr.modify(|r, w| w.bits(r.bits() | mask)),
                Direction::Input => {
                    // Input with the pull-up off
                    ddr.modify(|r, w| w.bits(r.bits() & !mask));
                    out.modify(|r, w| w.bits(r.bits() & !mask));
                }
            })
        });
        Ok(())
    }

    fn write(&mut self, pin: PinId, level: Level) -> Result<(), Error> {
        let mask = pin.mask()?;
        avr_device::interrupt::free(|_| {
            with_port!(pin.port, |_ddr, out, _input| match level {
                Level::High => out.modify(|r, w| w.bits(r.bits() | mask)),
                Level::Low => out.modify(|r, w| w.bits(r.bits() & !mask)),
            })
        });
        Ok(())
    }

    fn read(&mut self, pin: PinId) -> Result<Level, Error> {
        let mask = pin.mask()?;
        let high = with_port!(pin.port, |_ddr, _out, input| input.read().bits() & mask != 0);
        Ok(Level::from(high))
    }
}
