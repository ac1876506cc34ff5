use air_conditioner::application::{Controller, State};
use air_conditioner::config::{board, TICK_PRESCALER, TICK_RELOAD};
use air_conditioner::drivers::{Buzzer, Keypad, KeypadConfig, Lcd, LcdConfig, Lm35};
use air_conditioner::hal::adc::{Adc, AdcCompletion};
use air_conditioner::hal::gpio::{GpioPin, Level};
use air_conditioner::hal::timer::{DelayService, TickCounter};
use air_conditioner::logger::{Level as LogLevel, Logger};
use air_conditioner::testing::{
    LcdDecoder, LcdScreen, SimAdc, SimDelay, SimGpio, SimTimer, StringSink,
};

type Rig<'a> = Controller<
    Lcd<'a, SimGpio, SimDelay>,
    Keypad<'a, SimGpio>,
    Buzzer<GpioPin<SimGpio>>,
    Lm35<'a, SimAdc, SimGpio>,
    DelayService<'a, SimTimer>,
    StringSink,
>;

// ADC codes for the sensor: 52 reads about 25.4 C, 41 about 20.0 C
const WARM: u16 = 52;
const COOL: u16 = 41;

struct Bench {
    gpio: SimGpio,
    adc: SimAdc,
    timer: SimTimer,
    lcd: LcdConfig,
    keypad: KeypadConfig,
    ticks: TickCounter,
    completion: AdcCompletion,
}

impl Bench {
    fn new() -> Self {
        let gpio = SimGpio::new();
        let keypad = board::keypad_config();
        gpio.attach_keypad(keypad);
        let adc = SimAdc::new();
        adc.set_code(COOL);
        Self {
            gpio,
            adc,
            timer: SimTimer::new(),
            lcd: board::lcd_config(),
            keypad,
            ticks: TickCounter::new(),
            completion: AdcCompletion::new(),
        }
    }

    fn controller(&self) -> Rig<'_> {
        self.build(true)
    }

    fn build(&self, init_lcd: bool) -> Rig<'_> {
        let mut lcd = Lcd::new(&self.lcd, self.gpio.clone(), SimDelay::new());
        if init_lcd {
            lcd.init().unwrap();
        }
        let mut keypad = Keypad::new(&self.keypad, self.gpio.clone());
        keypad.init().unwrap();
        let buzzer = Buzzer::new(GpioPin::output(self.gpio.clone(), board::BUZZER).unwrap()).unwrap();
        let mut sensor = Lm35::new(
            Adc::new(self.adc.clone(), self.gpio.clone(), &self.completion),
            board::LM35,
        );
        sensor.init(&board::adc_config()).unwrap();
        let mut delay = DelayService::new(self.timer.clone(), &self.ticks);
        delay.configure(TICK_PRESCALER, TICK_RELOAD);

        Controller::new(
            lcd,
            keypad,
            buzzer,
            sensor,
            delay,
            Logger::new(StringSink::new(), LogLevel::Debug),
        )
    }

    fn screen(&self) -> LcdScreen {
        let mut screen = LcdScreen::new();
        screen.apply(&LcdDecoder::new(self.lcd).decode(&self.gpio.writes()));
        screen
    }

    fn buzzer(&self) -> Level {
        self.gpio.level(board::BUZZER)
    }

    /// Press `symbol` and let the controller poll once.
    fn press(&self, ctl: &mut Rig<'_>, symbol: char) {
        self.gpio.press(symbol);
        ctl.step();
        assert_eq!(self.gpio.keys_held(), 0, "key {symbol:?} was not consumed");
    }
}

fn into_working(bench: &Bench, ctl: &mut Rig<'_>, setpoint: u8) {
    ctl.step();
    ctl.step();
    while ctl.program_temperature() < setpoint {
        bench.press(ctl, '1');
    }
    bench.press(ctl, '3');
    assert_eq!(ctl.state(), State::Working);
}

#[test]
fn welcome_lands_in_set_temp_with_the_default() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    assert_eq!(ctl.state(), State::Welcome);

    ctl.step();

    assert_eq!(ctl.state(), State::SetTemp);
    assert_eq!(ctl.program_temperature(), 20);
    let screen = bench.screen();
    assert_eq!(screen.row(1).trim_end(), "default Temp is");
    assert_eq!(screen.row(2).trim_end(), "20");
    // two dwells of two ticks, each ending on the third overflow
    assert_eq!(bench.timer.overflows(), 6);
    assert!(!bench.timer.is_running());
    assert!(ctl.logger().sink().contents().contains("[INF] state: set-temp"));
}

#[test]
fn set_temp_draws_bounds_and_bar() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    ctl.step();
    ctl.step();

    let screen = bench.screen();
    assert_eq!(screen.row(1), "Min=18 20 Max=35");
    assert_eq!(screen.row(2).trim_end(), "||");
    assert_eq!(bench.timer.overflows(), 8);
}

#[test]
fn increments_and_decrements_touch_one_cell_each() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    ctl.step();
    ctl.step();

    for _ in 0..3 {
        bench.press(&mut ctl, '1');
    }
    assert_eq!(bench.screen().row(2).trim_end(), "|||||");
    bench.press(&mut ctl, '2');
    assert_eq!(ctl.program_temperature(), 22);
    assert_eq!(bench.screen().row(2).trim_end(), "||||");

    ctl.step();
    assert_eq!(bench.screen().row(1), "Min=18 22 Max=35");

    bench.press(&mut ctl, '3');
    assert_eq!(ctl.state(), State::Working);
    assert_eq!(ctl.program_temperature(), 22);
}

#[test]
fn other_keys_are_ignored_while_setting() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    ctl.step();
    ctl.step();

    for key in ['4', '5', '0', '*', '#'] {
        bench.press(&mut ctl, key);
        assert_eq!(ctl.state(), State::SetTemp);
        assert_eq!(ctl.program_temperature(), 20);
    }
}

#[test]
fn setpoint_is_clamped_to_its_bounds() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    ctl.step();
    ctl.step();

    for _ in 0..25 {
        bench.press(&mut ctl, '1');
        assert!(ctl.program_temperature() <= 35);
    }
    assert_eq!(ctl.program_temperature(), 35);
    assert_eq!(bench.screen().row(2), "|".repeat(16));

    for _ in 0..25 {
        bench.press(&mut ctl, '2');
        assert!(ctl.program_temperature() >= 18);
    }
    assert_eq!(ctl.program_temperature(), 18);
    assert_eq!(bench.screen().row(2).trim_end(), "");
}

#[test]
fn warm_room_rings_the_bell_and_cool_room_silences_it() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    into_working(&bench, &mut ctl, 22);

    bench.adc.set_code(WARM);
    ctl.step();
    assert!(ctl.current_temperature() > 25.0);
    assert_eq!(bench.buzzer(), Level::High);
    let screen = bench.screen();
    assert_eq!(screen.row(1).trim_end(), "Current Temp =");
    assert_eq!(screen.cell(2, 0), 3);
    assert_eq!(&screen.row(2)[1..4], "25 ");

    bench.adc.set_code(COOL);
    ctl.step();
    assert!(ctl.current_temperature() < 22.0);
    assert_eq!(bench.buzzer(), Level::Low);
    let screen = bench.screen();
    assert_eq!(screen.cell(2, 0), b' ');
    assert_eq!(&screen.row(2)[1..4], "20 ");

    let log = ctl.logger().sink().contents();
    assert!(log.contains("[WRN] alarm on: 25"));
    assert!(log.contains("[INF] alarm off: 20"));
}

#[test]
fn reset_restores_the_default_setpoint() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    into_working(&bench, &mut ctl, 22);
    bench.adc.set_code(WARM);
    ctl.step();
    assert_eq!(bench.buzzer(), Level::High);

    bench.press(&mut ctl, '5');

    assert_eq!(ctl.state(), State::SetTemp);
    assert_eq!(ctl.program_temperature(), 20);
    assert_eq!(bench.buzzer(), Level::Low);
    let screen = bench.screen();
    assert_eq!(screen.row(1).trim_end(), "Temp value is");
    assert_eq!(screen.row(2).trim_end(), "resettled to 20");
}

#[test]
fn adjust_returns_to_set_temp_keeping_the_setpoint() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    into_working(&bench, &mut ctl, 22);
    bench.adc.set_code(WARM);
    ctl.step();
    let overflows = bench.timer.overflows();

    bench.press(&mut ctl, '4');

    assert_eq!(ctl.state(), State::SetTemp);
    assert_eq!(ctl.program_temperature(), 22);
    assert_eq!(bench.buzzer(), Level::Low);
    // no message dwell on the way out
    assert_eq!(bench.timer.overflows(), overflows);

    ctl.step();
    assert_eq!(bench.screen().row(2).trim_end(), "||||");
}

#[test]
fn invalid_key_shows_a_transient_message_and_keeps_working() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    into_working(&bench, &mut ctl, 22);
    let overflows = bench.timer.overflows();

    bench.press(&mut ctl, '9');

    assert_eq!(ctl.state(), State::Working);
    assert_eq!(ctl.program_temperature(), 22);
    assert_eq!(bench.timer.overflows(), overflows + 3);
    assert_eq!(bench.screen().row(1).trim_end(), "Current Temp =");
}

#[test]
fn no_key_while_working_is_a_no_op() {
    let bench = Bench::new();
    let mut ctl = bench.controller();
    into_working(&bench, &mut ctl, 22);
    let overflows = bench.timer.overflows();

    for _ in 0..4 {
        ctl.step();
    }

    assert_eq!(ctl.state(), State::Working);
    assert_eq!(bench.timer.overflows(), overflows);
    assert_eq!(bench.adc.conversions(), 4);
}

#[test]
fn driver_errors_are_logged_and_do_not_escape() {
    let bench = Bench::new();
    let mut ctl = bench.build(false);

    ctl.step();
    ctl.step();

    assert_eq!(ctl.state(), State::Welcome);
    let log = ctl.logger().sink().contents();
    assert_eq!(log.matches("[ERR] driver: not initialized").count(), 2);
}
