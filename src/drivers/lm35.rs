//! LM35 analog temperature sensor: 10 mV per degree Celsius.

use crate::config::LM35_VOLTS_PER_DEGREE;
use crate::error::Error;
use crate::hal::adc::{Adc, AdcChannel, AdcConfig, AdcHw, Pending};
use crate::hal::gpio::Gpio;

pub trait TemperatureSensor {
    fn read_celsius(&mut self) -> Result<f32, Error>;
}

#[inline]
pub fn volts_to_celsius(volts: f32) -> f32 {
    volts / LM35_VOLTS_PER_DEGREE
}

pub struct Lm35<'a, H, G> {
    adc: Adc<'a, H, G>,
    channel: AdcChannel,
}

impl<'a, H: AdcHw, G: Gpio> Lm35<'a, H, G> {
    pub fn new(adc: Adc<'a, H, G>, channel: AdcChannel) -> Self {
        Self { adc, channel }
    }

    pub fn init(&mut self, config: &AdcConfig) -> Result<(), Error> {
        self.adc.init(Some(config))?;
        self.adc.channel_init(&self.channel)
    }

    pub fn read_celsius(&mut self) -> Result<f32, Error> {
        let volts = self.adc.read_blocking(&self.channel)?;
        Ok(volts_to_celsius(volts))
    }

    /// Interrupt-completed reading. `stage` runs inside the ADC interrupt
    /// ahead of the conversion.
    pub fn read_async(&mut self, stage: Option<fn()>) -> Result<CelsiusPending<'a>, Error> {
        let inner = self.adc.read_async(&self.channel, stage, |_| {})?;
        Ok(CelsiusPending { inner })
    }
}

impl<H: AdcHw, G: Gpio> TemperatureSensor for Lm35<'_, H, G> {
    fn read_celsius(&mut self) -> Result<f32, Error> {
        Lm35::read_celsius(self)
    }
}

/// [`Pending`] conversion reported in degrees Celsius
pub struct CelsiusPending<'a> {
    inner: Pending<'a>,
}

impl CelsiusPending<'_> {
    pub fn poll(&self) -> nb::Result<f32, Error> {
        self.inner.poll().map(volts_to_celsius)
    }

    pub fn wait(&self) -> Result<f32, Error> {
        nb::block!(self.poll())
    }
}
