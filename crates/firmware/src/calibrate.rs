//! Finding the zero positions of all three motors.
//!
//! Nothing is remembered across power cycles, so this runs at the start of
//! every session. The pen lift is zeroed against the bumper, and each
//! carriage is driven gently into its end-stop until it stalls.

use core::fmt;

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, info};

use crate::{
    config::{CalibrationConfig, Config},
    error::Error,
    hal::{Bumper, Indicator, Motor},
    motion::Devices,
    status::Status,
    wait::wait_until,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    Left,
    Right,
}

/// A condition that calibration waits for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    BumperRelease,
    BumperPress,
    Stall(Axis),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::BumperRelease => f.write_str("the bumper to be released"),
            Phase::BumperPress => f.write_str("the bumper to be pressed"),
            Phase::Stall(Axis::Left) => f.write_str("the left carriage to stall"),
            Phase::Stall(Axis::Right) => f.write_str("the right carriage to stall"),
        }
    }
}

/// How far calibration has got.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CalibrationState {
    pub bumper_released: bool,
    pub bumper_pressed: bool,
    pub left_stalled: bool,
    pub right_stalled: bool,
}

impl CalibrationState {
    /// The condition we're waiting on next, or `None` if all the motors
    /// have found their references.
    pub fn phase(&self) -> Option<Phase> {
        if !self.bumper_released {
            Some(Phase::BumperRelease)
        } else if !self.bumper_pressed {
            Some(Phase::BumperPress)
        } else if !self.left_stalled {
            Some(Phase::Stall(Axis::Left))
        } else if !self.right_stalled {
            Some(Phase::Stall(Axis::Right))
        } else {
            None
        }
    }

    fn mark_stalled(&mut self, axis: Axis) {
        match axis {
            Axis::Left => self.left_stalled = true,
            Axis::Right => self.right_stalled = true,
        }
    }
}

impl<M: Motor, B: Bumper, I: Indicator, D: DelayMs<u32>> Devices<M, B, I, D> {
    /// Zeroes all the motors and parks the carriages.
    pub fn calibrate(&mut self, config: &Config) -> Result<(), Error> {
        info!("calibrating");
        Status::Calibrating.show(&mut self.indicator, config);

        self.all_off();

        let mut state = CalibrationState::default();
        self.home_lift(&config.calibration, &mut state)?;
        self.home_carriage(Axis::Left, config, &mut state)?;
        self.home_carriage(Axis::Right, config, &mut state)?;
        debug_assert_eq!(state.phase(), None);

        self.park(config);
        Status::Off.show(&mut self.indicator, config);
        info!("calibration finished");
        Ok(())
    }

    fn home_lift(
        &mut self,
        cal: &CalibrationConfig,
        state: &mut CalibrationState,
    ) -> Result<(), Error> {
        let Devices {
            lift,
            bumper,
            delay,
            ..
        } = self;

        lift.run(cal.lift_speed);

        // If we start out on the bumper, waiting for a press would be over
        // immediately without telling us anything.
        if bumper.is_pressed() {
            debug!("bumper already pressed, waiting for it to be released");
            wait_until(delay, cal.release_poll_ms, cal.timeout_ms, || {
                !bumper.is_pressed()
            })
            .map_err(|_| Error::CalibrationTimeout(Phase::BumperRelease))?;
        }
        state.bumper_released = true;

        wait_until(delay, 0, cal.timeout_ms, || bumper.is_pressed())
            .map_err(|_| Error::CalibrationTimeout(Phase::BumperPress))?;
        state.bumper_pressed = true;
        debug!("bumper pressed at lift position {}", lift.position());

        let target = lift.position() + cal.lift_slack;
        lift.run_until_position(cal.lift_speed, target, false);
        delay.delay_ms(cal.lift_settle_ms);
        lift.reset_position();
        lift.off();
        Ok(())
    }

    fn home_carriage(
        &mut self,
        axis: Axis,
        config: &Config,
        state: &mut CalibrationState,
    ) -> Result<(), Error> {
        let cal = &config.calibration;
        let Devices {
            left, right, delay, ..
        } = self;
        let motor = match axis {
            Axis::Left => left,
            Axis::Right => right,
        };

        motor.set_max_current(cal.homing_current);
        motor.run(cal.homing_speed);
        if wait_until(delay, 0, cal.timeout_ms, || motor.stalled()).is_err() {
            motor.off();
            motor.set_max_current(cal.normal_current);
            return Err(Error::CalibrationTimeout(Phase::Stall(axis)));
        }
        state.mark_stalled(axis);
        delay.delay_ms(cal.carriage_settle_ms);

        // Back off from the end-stop, and make that the zero.
        motor.reset_position();
        motor.run_until_position(config.carriage_speed, cal.end_stop_offset, true);
        delay.delay_ms(cal.carriage_settle_ms);
        motor.reset_position();

        motor.off();
        motor.set_max_current(cal.normal_current);
        debug!("{axis:?} carriage homed");
        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::{
        config::ConfigBuilder,
        hal::Color,
        motion::LeftRight,
        sim::{Light, MotorCmd, Sim, World},
    };
    use proptest::prelude::*;

    fn calibrated(world: World) -> Sim {
        let sim = Sim::with_world(world);
        sim.devices().calibrate(&Config::default()).unwrap();
        sim
    }

    #[test]
    fn carriages_zero_at_offset_from_end_stops() {
        let sim = calibrated(World::default());
        let world = sim.world();
        assert_eq!(world.left.zero, -1000 + 705);
        assert_eq!(world.right.zero, -1000 + 705);
        assert_eq!(world.carriage_positions(), LeftRight::splat(450));
        assert_eq!(world.left.max_current, 100);
        assert_eq!(world.right.max_current, 100);
    }

    #[test]
    fn carriage_homing_sequence() {
        let sim = calibrated(World::default());
        let log = &sim.world().left.log;
        let homing = [
            MotorCmd::SetMaxCurrent(15),
            MotorCmd::Run { speed: -100 },
            MotorCmd::ResetPosition,
            MotorCmd::RunUntilPosition {
                speed: 100,
                target: 705,
                blocking: true,
            },
            MotorCmd::ResetPosition,
            MotorCmd::Off,
            MotorCmd::SetMaxCurrent(100),
        ];
        // The first entry is the `off` from before homing started.
        assert_eq!(log[0], MotorCmd::Off);
        assert_eq!(&log[1..8], &homing);
    }

    #[test]
    fn lift_zeroes_past_the_bumper() {
        let sim = calibrated(World::default());
        let world = sim.world();
        // The lift turns 3 units per tick, so it first presses the bumper (whose
        // window starts at 200) at 201. Then we take up 30 units of slack.
        assert_eq!(world.lift.zero, 231);
        assert_eq!(world.lift.encoder(), 0);
        assert!(world.lift.is_off());
    }

    #[test]
    fn waits_for_release_when_starting_on_the_bumper() {
        let mut world = World::default();
        world.lift.mech = 210;
        let sim = calibrated(world);
        // The first press was skipped, so we zeroed on the next turn of the cam.
        assert_eq!(sim.world().lift.zero, 360 + 231);
    }

    #[test]
    fn indicator_blinks_then_turns_off() {
        let sim = calibrated(World::default());
        let world = sim.world();
        assert_eq!(
            world.light_log,
            vec![
                Light::Solid(Color::Blue),
                Light::Blinking {
                    color: Color::Blue,
                    on_ms: 200,
                    off_ms: 200
                },
                Light::Off,
            ]
        );
    }

    #[test]
    fn disconnected_bumper_times_out() {
        let mut world = World::default();
        world.bumper_connected = false;
        let sim = Sim::with_world(world);
        let config = ConfigBuilder::default()
            .with_calibration_timeout_ms(2000)
            .build();

        let err = sim.devices().calibrate(&config).unwrap_err();
        assert_eq!(err, Error::CalibrationTimeout(Phase::BumperPress));
    }

    #[test]
    fn missing_end_stop_times_out() {
        let mut world = World::default();
        world.right.end_stop = None;
        let sim = Sim::with_world(world);
        let config = ConfigBuilder::default()
            .with_calibration_timeout_ms(5000)
            .build();

        let err = sim.devices().calibrate(&config).unwrap_err();
        assert_eq!(err, Error::CalibrationTimeout(Phase::Stall(Axis::Right)));
        let world = sim.world();
        assert!(world.right.is_off());
        assert_eq!(world.right.max_current, 100);
    }

    #[test]
    fn state_phases_in_order() {
        let mut state = CalibrationState::default();
        assert_eq!(state.phase(), Some(Phase::BumperRelease));
        state.bumper_released = true;
        assert_eq!(state.phase(), Some(Phase::BumperPress));
        state.bumper_pressed = true;
        state.mark_stalled(Axis::Left);
        assert_eq!(state.phase(), Some(Phase::Stall(Axis::Right)));
        state.mark_stalled(Axis::Right);
        assert_eq!(state.phase(), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Wherever the motors start out, calibration leaves them in the same place.
        #[test]
        fn calibration_is_independent_of_start(
            left in -1000..3000i32,
            right in -1000..3000i32,
            lift in 0..720i32,
            left_zero in -500..500i32,
            right_zero in -500..500i32,
        ) {
            let mut world = World::default();
            world.left.mech = left;
            world.left.zero = left_zero;
            world.right.mech = right;
            world.right.zero = right_zero;
            world.lift.mech = lift;
            let sim = calibrated(world);

            let world = sim.world();
            prop_assert_eq!(world.left.mech, -1000 + 705 + 450);
            prop_assert_eq!(world.right.mech, -1000 + 705 + 450);
            prop_assert_eq!(world.carriage_positions(), LeftRight::splat(450));
            prop_assert_eq!(world.lift.encoder(), 0);
        }
    }
}
