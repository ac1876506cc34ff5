//! Thermostatic air-conditioner controller for the ATmega32.
//!
//! An LM35 on the ADC is compared against a user setpoint entered on a 4x3
//! keypad; state is shown on a 16x2 character LCD and a buzzer sounds while
//! the room is warmer than the setpoint.
//!
//! Layers, leaves first:
//!
//! - [`hal`]: GPIO capability, Timer1 tick/delay service, ADC engine, USART
//! - [`drivers`]: LCD protocol, keypad scanner, LM35, buzzer, serial console
//! - [`application`]: the Welcome -> SetTemp -> Working state machine
//!
//! Register backends are only built for `target_arch = "avr"`; everything
//! else is generic over the `hal` traits and runs on the host against the
//! simulated peripherals in [`testing`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod application;
pub mod config;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod logger;

#[cfg(any(test, feature = "std"))]
pub mod testing;

pub use error::{Error, Fault};
