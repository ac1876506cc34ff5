#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

#[cfg(target_arch = "avr")]
mod firmware {
    use panic_halt as _;

    use air_conditioner::application::Controller;
    use air_conditioner::config::{board, CPU_FREQ_HZ, TICK_PRESCALER, TICK_RELOAD, UART_BAUD};
    use air_conditioner::drivers::{Buzzer, Keypad, Lcd, Lm35, SerialConsole};
    use air_conditioner::hal::{
        Adc, AdcCompletion, Atmega32Adc, Atmega32Gpio, CycleDelay, DelayService, GpioPin,
        TickCounter, Timer1, Uart,
    };
    use air_conditioner::logger::{Level, Logger};
    use air_conditioner::Error;

    // Written only by the interrupt handlers below
    static TICKS: TickCounter = TickCounter::new();
    static ADC_COMPLETION: AdcCompletion = AdcCompletion::new();

    #[avr_device::interrupt(atmega32a)]
    fn TIMER1_OVF() {
        TICKS.on_overflow(&mut Timer1::new(), TICK_RELOAD);
    }

    #[avr_device::interrupt(atmega32a)]
    fn ADC() {
        ADC_COMPLETION.on_interrupt(&mut Atmega32Adc::new());
    }

    fn halt<W: ufmt::uWrite>(log: &mut Logger<W>, what: &str, err: Error) -> ! {
        log.log_value(Level::Error, what, &err);
        loop {
            avr_device::asm::sleep();
        }
    }

    #[avr_device::entry]
    fn main() -> ! {
        let console = SerialConsole::new(Uart::new(CPU_FREQ_HZ, UART_BAUD));
        let mut log = Logger::new(console, Level::Info);
        log.info("air conditioner v0.1.0");

        let gpio = Atmega32Gpio::new();

        let mut delay = DelayService::new(Timer1::new(), &TICKS);
        delay.configure(TICK_PRESCALER, TICK_RELOAD);

        let adc_config = board::adc_config();
        let mut sensor = Lm35::new(Adc::new(Atmega32Adc::new(), gpio, &ADC_COMPLETION), board::LM35);
        if let Err(err) = sensor.init(&adc_config) {
            halt(&mut log, "lm35", err);
        }

        let lcd_config = board::lcd_config();
        let mut lcd = Lcd::new(&lcd_config, gpio, CycleDelay::new());
        if let Err(err) = lcd.init() {
            halt(&mut log, "lcd", err);
        }

        let keypad_config = board::keypad_config();
        let mut keypad = Keypad::new(&keypad_config, gpio);
        if let Err(err) = keypad.init() {
            halt(&mut log, "keypad", err);
        }

        let buzzer = match GpioPin::output(gpio, board::BUZZER).and_then(Buzzer::new) {
            Ok(buzzer) => buzzer,
            Err(err) => halt(&mut log, "buzzer", err),
        };

        // SAFETY: every shared state the handlers touch is initialised above
        unsafe { avr_device::interrupt::enable() };
        log.info("ready");

        Controller::new(lcd, keypad, buzzer, sensor, delay, log).run()
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    eprintln!("air_conditioner: firmware image, build for the avr-atmega32 target");
}
