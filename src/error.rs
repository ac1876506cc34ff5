//! Status codes shared by every driver

use ufmt::{uDisplay, uWrite, Formatter};

/// What was wrong with a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// LCD bus width is neither 4 nor 8 bits
    Mode,
    /// LCD row outside 1..=2
    Row,
    /// LCD column past the end of the DDRAM line
    Column,
    /// Port without ADC multiplexer
    Port,
    /// Pin index outside 0..=7
    Pin,
    /// CGRAM slot outside 0..=7
    Slot,
    /// ADC resolution outside 1..=10 bits
    Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A required argument was absent
    NullArgument,
    /// Operation attempted before the component's `init`
    NotInitialized,
    InvalidConfiguration(Fault),
    /// An asynchronous conversion is still outstanding
    Busy,
}

impl uDisplay for Error {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        match self {
            Error::NullArgument => f.write_str("null argument"),
            Error::NotInitialized => f.write_str("not initialized"),
            Error::InvalidConfiguration(fault) => {
                f.write_str("invalid ")?;
                f.write_str(match fault {
                    Fault::Mode => "mode",
                    Fault::Row => "row",
                    Fault::Column => "column",
                    Fault::Port => "port",
                    Fault::Pin => "pin",
                    Fault::Slot => "slot",
                    Fault::Resolution => "resolution",
                })
            }
            Error::Busy => f.write_str("busy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StringSink;
    use ufmt::uwrite;

    #[test]
    fn configuration_faults_name_the_offending_field() {
        let mut sink = StringSink::new();
        uwrite!(sink, "{}", Error::InvalidConfiguration(Fault::Port)).unwrap();
        uwrite!(sink, ",{}", Error::InvalidConfiguration(Fault::Resolution)).unwrap();
        uwrite!(sink, ",{}", Error::NotInitialized).unwrap();
        assert_eq!(sink.contents(), "invalid port,invalid resolution,not initialized");
    }
}
