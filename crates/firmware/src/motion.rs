//! Moving the carriages and the pen.

use log::debug;

use crate::{
    config::{Config, PenConfig},
    hal::{Indicator, Motor},
    status::Status,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeftRight<T> {
    pub left: T,
    pub right: T,
}

impl<T: Copy> LeftRight<T> {
    pub fn splat(v: T) -> Self {
        LeftRight { left: v, right: v }
    }
}

/// Encoder positions for the two carriage motors.
///
/// The plotter's coordinates are already in encoder units: `x` drives the
/// left motor and `y` drives the right one.
pub type MotorTargets = LeftRight<i32>;

impl MotorTargets {
    pub fn from_point(x: i32, y: i32) -> Self {
        LeftRight { left: x, right: y }
    }
}

/// All of the plotter's hardware, apart from the serial link.
pub struct Devices<M, B, I, D> {
    pub left: M,
    pub right: M,
    pub lift: M,
    pub bumper: B,
    pub indicator: I,
    pub delay: D,
}

impl<M: Motor, B, I: Indicator, D> Devices<M, B, I, D> {
    /// Raises the pen and moves to `(x, y)`.
    pub fn move_to(&mut self, config: &Config, x: i32, y: i32) {
        Status::Active.show(&mut self.indicator, config);
        self.pen_up(&config.pen);
        self.move_to_targets(config.carriage_speed, MotorTargets::from_point(x, y));
    }

    /// Lowers the pen and moves to `(x, y)`.
    pub fn draw_to(&mut self, config: &Config, x: i32, y: i32) {
        Status::Active.show(&mut self.indicator, config);
        self.pen_down(&config.pen);
        self.move_to_targets(config.carriage_speed, MotorTargets::from_point(x, y));
    }

    /// Raises the pen, parks, and turns off the light.
    pub fn finish(&mut self, config: &Config) {
        self.pen_up(&config.pen);
        self.park(config);
        Status::Off.show(&mut self.indicator, config);
    }

    pub fn park(&mut self, config: &Config) {
        self.move_to_targets(
            config.carriage_speed,
            MotorTargets::splat(config.park_position),
        );
    }

    /// Starts raising the pen, unless it's already up. Returns whether the
    /// lift motor was told to move.
    ///
    /// This doesn't wait for the pen to get there.
    pub fn pen_up(&mut self, pen: &PenConfig) -> bool {
        if self.lift.position() > pen.threshold {
            self.lift
                .run_until_position(pen.up_speed, pen.up_position, false);
            true
        } else {
            false
        }
    }

    /// Starts lowering the pen, unless it's already down. Returns whether
    /// the lift motor was told to move.
    pub fn pen_down(&mut self, pen: &PenConfig) -> bool {
        if self.lift.position() < pen.threshold {
            self.lift
                .run_until_position(pen.down_speed, pen.down_position, false);
            true
        } else {
            false
        }
    }

    /// Sends both carriages to their targets, and spins until they've both arrived.
    pub fn move_to_targets(&mut self, speed: i32, targets: MotorTargets) {
        debug!("carriages to {targets:?}");
        self.left.run_to_position(speed, targets.left);
        self.right.run_to_position(speed, targets.right);

        while !self.left.reached_target() || !self.right.reached_target() {
            core::hint::spin_loop();
        }
    }

    pub fn all_off(&mut self) {
        self.lift.off();
        self.left.off();
        self.right.off();
    }
}
