use crate::{config::Config, hal::Indicator};

/// What the indicator light is telling the operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// Carrying out a command.
    Active,
    /// Running the calibration sequence.
    Calibrating,
    /// Idle, either parked or finished calibrating.
    Off,
    /// Stopped after a fatal error.
    Fault,
}

impl Status {
    pub fn show(self, indicator: &mut impl Indicator, config: &Config) {
        match self {
            Status::Active => indicator.named_color(config.active_color),
            Status::Calibrating => {
                indicator.named_color(config.active_color);
                indicator.blink(config.blink_on_ms, config.blink_off_ms);
            }
            Status::Off => indicator.off(),
            Status::Fault => indicator.named_color(config.fault_color),
        }
    }
}
