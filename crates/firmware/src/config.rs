use crate::hal::Color;

/// Motor degrees per degree of the geared output.
pub const GEAR_RATIO: i32 = 5 * 3;

/// Where the carriages park, in output turns from the calibrated zero.
pub const PARK_TURNS: i32 = 30;

/// How far the calibrated zero sits from the end-stops, in output turns.
pub const END_STOP_TURNS: i32 = 47;

/// Speed of the carriage motors for every move, as a percentage.
pub const CARRIAGE_SPEED: i32 = 100;

/// Half-period of the calibration blink.
pub const BLINK_MS: u32 = 200;

pub struct ConfigBuilder {
    gear_ratio: i32,
    calibration_timeout_ms: Option<u32>,
    payload_timeout_ms: Option<u32>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            gear_ratio: GEAR_RATIO,
            calibration_timeout_ms: None,
            payload_timeout_ms: None,
        }
    }
}

impl ConfigBuilder {
    pub fn build(&self) -> Config {
        Config {
            park_position: PARK_TURNS * self.gear_ratio,
            carriage_speed: CARRIAGE_SPEED,
            pen: PenConfig::default(),
            calibration: CalibrationConfig {
                end_stop_offset: END_STOP_TURNS * self.gear_ratio,
                timeout_ms: self.calibration_timeout_ms,
                ..CalibrationConfig::default()
            },
            payload_timeout_ms: self.payload_timeout_ms,
            active_color: Color::Blue,
            fault_color: Color::Red,
            blink_on_ms: BLINK_MS,
            blink_off_ms: BLINK_MS,
        }
    }

    pub fn with_gear_ratio(&mut self, ratio: i32) -> &mut Self {
        self.gear_ratio = ratio;
        self
    }

    /// Give up on calibration if any single wait takes longer than this.
    pub fn with_calibration_timeout_ms(&mut self, ms: u32) -> &mut Self {
        self.calibration_timeout_ms = Some(ms);
        self
    }

    /// Give up on a command's payload if it hasn't fully arrived after this long.
    pub fn with_payload_timeout_ms(&mut self, ms: u32) -> &mut Self {
        self.payload_timeout_ms = Some(ms);
        self
    }
}

/// Pen lift positions and speeds.
///
/// The lift's encoder is zeroed by calibration, and larger positions press
/// the pen further towards the paper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PenConfig {
    /// Positions above this count as "down", positions below it as "up".
    pub threshold: i32,
    pub up_position: i32,
    pub up_speed: i32,
    pub down_position: i32,
    pub down_speed: i32,
}

impl Default for PenConfig {
    fn default() -> Self {
        Self {
            threshold: 90,
            up_position: 70,
            up_speed: 100,
            down_position: 120,
            down_speed: 50,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationConfig {
    /// Speed for turning the lift towards the bumper.
    pub lift_speed: i32,
    /// How far to keep turning the lift after the bumper is pressed. This
    /// takes up slack between the bumper and the cam.
    pub lift_slack: i32,
    pub lift_settle_ms: u32,
    /// Polling interval while waiting for an already-pressed bumper to be released.
    pub release_poll_ms: u32,
    /// Speed for driving the carriages into their end-stops. Negative, so
    /// that the end-stops are at the low end of the encoder range.
    pub homing_speed: i32,
    /// Current limit while homing. Low, so that the stall is gentle.
    pub homing_current: u8,
    /// Current limit for normal operation.
    pub normal_current: u8,
    pub carriage_settle_ms: u32,
    /// Distance from an end-stop to the carriage's zero.
    pub end_stop_offset: i32,
    /// `None` waits forever for each sensor or stall.
    pub timeout_ms: Option<u32>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            lift_speed: 30,
            lift_slack: 30,
            lift_settle_ms: 300,
            release_poll_ms: 1000,
            homing_speed: -100,
            homing_current: 15,
            normal_current: 100,
            carriage_settle_ms: 200,
            end_stop_offset: END_STOP_TURNS * GEAR_RATIO,
            timeout_ms: None,
        }
    }
}

/// Everything about the plotter that isn't wired into the control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Both carriages go here after calibration and at the end of a drawing.
    pub park_position: i32,
    pub carriage_speed: i32,
    pub pen: PenConfig,
    pub calibration: CalibrationConfig,
    /// `None` blocks until the payload arrives, however long that takes.
    pub payload_timeout_ms: Option<u32>,
    pub active_color: Color,
    pub fault_color: Color,
    pub blink_on_ms: u32,
    pub blink_off_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}
