pub mod adc;
pub mod gpio;
pub mod timer;
pub mod uart;

// Re-export commonly used types
pub use adc::{Adc, AdcChannel, AdcCompletion, AdcConfig, AdcHw, Pending};
pub use gpio::{Direction, Gpio, GpioPin, Level, PinId, Port};
pub use timer::{DelayService, Prescaler, TickCounter, TickWait, TimerHw};
pub use uart::SerialTx;

#[cfg(target_arch = "avr")]
pub use adc::Atmega32Adc;
#[cfg(target_arch = "avr")]
pub use gpio::Atmega32Gpio;
#[cfg(target_arch = "avr")]
pub use timer::{CycleDelay, Timer1};
#[cfg(target_arch = "avr")]
pub use uart::Uart;
