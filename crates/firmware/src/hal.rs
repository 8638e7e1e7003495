//! The hardware the controller drives.
//!
//! These traits describe what we need from the board's motor, sensor, light
//! and serial drivers, and nothing more. Position control, stall detection
//! and current limiting all happen inside the motor driver.

/// A smart motor with a built-in encoder and position controller.
///
/// Speeds are percentages of full speed, with the sign giving the direction.
/// Positions are in encoder units (degrees of motor rotation), relative to
/// the last call to [`Motor::reset_position`].
pub trait Motor {
    /// Run continuously at `speed` until told otherwise.
    fn run(&mut self, speed: i32);

    /// Cut power to the motor.
    fn off(&mut self);

    /// Start moving towards `target`. Returns immediately.
    fn run_to_position(&mut self, speed: i32, target: i32);

    /// Move towards `target` and hold there. If `blocking` is set, this only
    /// returns once the target has been reached.
    fn run_until_position(&mut self, speed: i32, target: i32, blocking: bool);

    fn reached_target(&mut self) -> bool;

    fn position(&mut self) -> i32;

    /// Makes the current position the new zero.
    fn reset_position(&mut self);

    /// Is the motor being held back by something? We use this to detect
    /// mechanical end-stops.
    fn stalled(&mut self) -> bool;

    /// Limits the current the motor may draw, as a percentage of the maximum.
    fn set_max_current(&mut self, percent: u8);
}

pub trait Bumper {
    fn is_pressed(&mut self) -> bool;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Blue,
    White,
    Orange,
}

/// A light for showing what the plotter is up to.
pub trait Indicator {
    fn named_color(&mut self, color: Color);

    /// Blink the current color.
    fn blink(&mut self, on_ms: u32, off_ms: u32);

    fn off(&mut self);
}

/// The byte queue connecting us to the host.
pub trait SerialPort {
    /// How many received bytes are waiting to be read.
    fn bytes_to_read(&mut self) -> usize;

    /// Blocks until a byte is available.
    fn read_byte(&mut self) -> u8;

    /// Blocks until `buf` has been filled.
    fn read_bytes(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.read_byte();
        }
    }

    fn write(&mut self, bytes: &[u8]);

    fn flush(&mut self);
}
