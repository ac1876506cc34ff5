pub mod buzzer;
pub mod keypad;
pub mod lcd;
pub mod lm35;
pub mod serial_console;

pub use buzzer::{Alarm, Buzzer};
pub use keypad::{KeySource, Keypad, KeypadConfig};
pub use lcd::{Display, Lcd, LcdConfig, LcdMode, SpecialChar};
pub use lm35::{Lm35, TemperatureSensor};
pub use serial_console::SerialConsole;
