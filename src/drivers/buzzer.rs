use embedded_hal::digital::v2::OutputPin;

use crate::error::Error;

/// Audible over-temperature alarm
pub trait Alarm {
    fn start(&mut self) -> Result<(), Error>;
    fn stop(&mut self) -> Result<(), Error>;
    fn is_active(&self) -> bool;
}

/// Active buzzer on one push-pull pin, sounding while the pin is high
pub struct Buzzer<P> {
    pin: P,
    active: bool,
}

impl<P: OutputPin> Buzzer<P> {
    pub fn new(mut pin: P) -> Result<Self, P::Error> {
        pin.set_low()?;
        Ok(Self { pin, active: false })
    }

    pub fn start(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()?;
        self.active = true;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.active = false;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin<Error = Error>> Alarm for Buzzer<P> {
    fn start(&mut self) -> Result<(), Error> {
        Buzzer::start(self)
    }

    fn stop(&mut self) -> Result<(), Error> {
        Buzzer::stop(self)
    }

    fn is_active(&self) -> bool {
        Buzzer::is_active(self)
    }
}
