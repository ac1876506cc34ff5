//! Configuration constants for the air-conditioner firmware

use crate::hal::timer::Prescaler;

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 8_000_000;

/// UART baud rate
pub const UART_BAUD: u32 = 9600;

/// Timer1 prescaler for the tick service
pub const TICK_PRESCALER: Prescaler = Prescaler::Div1024;

/// Timer1 reload value: 4088 counts of 128us, one overflow every ~0.5s
pub const TICK_RELOAD: u16 = 61448;

/// Ticks for the one-second screens
pub const DWELL_LONG_TICKS: u16 = 2;

/// Ticks for the half-second screens
pub const DWELL_SHORT_TICKS: u16 = 1;

/// Setpoint bounds and power-on default, in degrees Celsius
pub const TEMP_MIN: u8 = 18;
pub const TEMP_MAX: u8 = 35;
pub const TEMP_DEFAULT: u8 = 20;

/// First setpoint that draws a bar mark
pub const BAR_ORIGIN: u8 = 19;

/// LCD settle time after every enable pulse, in microseconds
pub const LCD_SETTLE_US: u16 = 3000;

/// ADC reference voltage in volts
pub const ADC_VREF_VOLTS: f32 = 5.0;

/// ADC resolution in bits
pub const ADC_RESOLUTION_BITS: u8 = 10;

/// LM35 output slope in volts per degree Celsius
pub const LM35_VOLTS_PER_DEGREE: f32 = 0.01;

/// Pin assignment of the controller board
pub mod board {
    use crate::drivers::keypad::KeypadConfig;
    use crate::drivers::lcd::{LcdConfig, LcdMode};
    use crate::hal::adc::{AdcChannel, AdcConfig, AdcPrescaler, Adjust, Reference};
    use crate::hal::gpio::{PinId, Port};

    pub const BUZZER: PinId = PinId::new(Port::B, 0);

    pub const LM35: AdcChannel = AdcChannel::new(Port::A, 7);
    pub const LM35_PIN: PinId = PinId::new(Port::A, 7);

    pub const fn adc_config() -> AdcConfig {
        AdcConfig {
            reference: Reference::Avcc,
            prescaler: AdcPrescaler::Div2,
            adjust: Adjust::Right,
            interrupt: false,
            vref_volts: super::ADC_VREF_VOLTS,
            resolution_bits: super::ADC_RESOLUTION_BITS,
        }
    }

    // D4..D7 on PC0..PC3, the upper four entries are unused in 4-bit mode
    pub const fn lcd_config() -> LcdConfig {
        LcdConfig {
            mode: LcdMode::FourBit,
            data: [
                PinId::new(Port::C, 0),
                PinId::new(Port::C, 1),
                PinId::new(Port::C, 2),
                PinId::new(Port::C, 3),
                PinId::new(Port::D, 4),
                PinId::new(Port::D, 5),
                PinId::new(Port::D, 6),
                PinId::new(Port::D, 7),
            ],
            rs: PinId::new(Port::C, 4),
            rw: PinId::new(Port::C, 5),
            en: PinId::new(Port::C, 6),
        }
    }

    pub const fn keypad_config() -> KeypadConfig {
        KeypadConfig {
            rows: [
                PinId::new(Port::A, 0),
                PinId::new(Port::A, 1),
                PinId::new(Port::A, 2),
                PinId::new(Port::A, 3),
            ],
            cols: [
                PinId::new(Port::A, 4),
                PinId::new(Port::A, 5),
                PinId::new(Port::A, 6),
            ],
        }
    }
}
