//! A simulated plotter, for tests and for dry runs on the host.
//!
//! All the simulated devices share one [`World`]. Time in the world only
//! moves forward when the controller waits for something: every
//! [`Motor::reached_target`], [`Motor::stalled`] and [`Bumper::is_pressed`]
//! poll advances it by one tick, and delays advance it by as many ticks as
//! they last.
//!
//! The carriages can't go below their end-stops; trying to makes them
//! stall. The pen lift is a cam, so it can turn forever, and it holds the
//! bumper down over part of each revolution.

use std::{
    cell::{Ref, RefCell, RefMut},
    collections::VecDeque,
    ops::Range,
    rc::Rc,
};

use embedded_hal::blocking::delay::DelayMs;

use crate::{
    hal::{Bumper, Color, Indicator, Motor, SerialPort},
    motion::{Devices, LeftRight},
};

/// How much simulated time passes in one tick.
pub const TICK_MS: u32 = 10;

// Don't let a blocking move spin forever if its target is behind an end-stop.
const MAX_BLOCKING_TICKS: u32 = 1_000_000;

/// Everything a motor has been told to do, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotorCmd {
    Run { speed: i32 },
    Off,
    RunToPosition { speed: i32, target: i32 },
    RunUntilPosition { speed: i32, target: i32, blocking: bool },
    ResetPosition,
    SetMaxCurrent(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Drive {
    Off,
    Run(i32),
    // The target is a mechanical position, not an encoder reading.
    ToTarget { speed: i32, target: i32 },
}

#[derive(Clone, Debug)]
pub struct SimMotorState {
    /// The true position of the motor's shaft.
    pub mech: i32,
    /// The mechanical position at which the encoder reads zero.
    pub zero: i32,
    /// The motor can't turn below this mechanical position.
    pub end_stop: Option<i32>,
    pub stalled: bool,
    pub max_current: u8,
    pub log: Vec<MotorCmd>,
    drive: Drive,
}

impl SimMotorState {
    pub fn new(mech: i32, end_stop: Option<i32>) -> Self {
        SimMotorState {
            mech,
            zero: 0,
            end_stop,
            stalled: false,
            max_current: 100,
            log: Vec::new(),
            drive: Drive::Off,
        }
    }

    pub fn encoder(&self) -> i32 {
        self.mech - self.zero
    }

    pub fn is_off(&self) -> bool {
        self.drive == Drive::Off
    }

    fn reached_target(&self) -> bool {
        match self.drive {
            Drive::Off => true,
            Drive::Run(_) => false,
            Drive::ToTarget { target, .. } => self.mech == target,
        }
    }

    fn tick(&mut self) {
        let (speed, target) = match self.drive {
            Drive::Off => {
                self.stalled = false;
                return;
            }
            Drive::Run(speed) => (speed, None),
            Drive::ToTarget { speed, target } => (speed, Some(target)),
        };

        // Full speed is 1000 degrees per second.
        let rate = (speed.abs() * TICK_MS as i32 / 100).max(1);
        let mut next = match target {
            Some(target) => self.mech + (target - self.mech).clamp(-rate, rate),
            None => self.mech + speed.signum() * rate,
        };

        self.stalled = false;
        if let Some(stop) = self.end_stop {
            if next < stop {
                next = stop;
                self.stalled = true;
            }
        }
        self.mech = next;
    }
}

/// What the simulated indicator is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Light {
    Off,
    Solid(Color),
    Blinking { color: Color, on_ms: u32, off_ms: u32 },
}

/// A point that the carriages passed through, in encoder units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TracePoint {
    pub left: i32,
    pub right: i32,
    pub pen_down: bool,
}

#[derive(Clone, Debug)]
pub struct World {
    pub left: SimMotorState,
    pub right: SimMotorState,
    pub lift: SimMotorState,
    /// The bumper is pressed while the lift's mechanical angle, modulo a
    /// full turn, is in this range.
    pub bumper_window: Range<i32>,
    /// A disconnected bumper never reports being pressed.
    pub bumper_connected: bool,
    /// Lift encoder readings above this count as the pen touching the paper.
    pub pen_threshold: i32,
    pub light: Light,
    pub light_log: Vec<Light>,
    pub serial_in: VecDeque<u8>,
    pub serial_out: Vec<u8>,
    /// How much of `serial_out` has been flushed.
    pub flushed: usize,
    pub ticks: u64,
    pub trace: Vec<TracePoint>,
}

impl Default for World {
    fn default() -> Self {
        World {
            left: SimMotorState::new(0, Some(-1000)),
            right: SimMotorState::new(0, Some(-1000)),
            lift: SimMotorState::new(0, None),
            bumper_window: 200..260,
            bumper_connected: true,
            pen_threshold: 90,
            light: Light::Off,
            light_log: Vec::new(),
            serial_in: VecDeque::new(),
            serial_out: Vec::new(),
            flushed: 0,
            ticks: 0,
            trace: Vec::new(),
        }
    }
}

impl World {
    pub fn motor(&self, id: MotorId) -> &SimMotorState {
        match id {
            MotorId::Left => &self.left,
            MotorId::Right => &self.right,
            MotorId::Lift => &self.lift,
        }
    }

    pub fn motor_mut(&mut self, id: MotorId) -> &mut SimMotorState {
        match id {
            MotorId::Left => &mut self.left,
            MotorId::Right => &mut self.right,
            MotorId::Lift => &mut self.lift,
        }
    }

    pub fn bumper_pressed(&self) -> bool {
        self.bumper_connected && self.bumper_window.contains(&self.lift.mech.rem_euclid(360))
    }

    pub fn pen_down(&self) -> bool {
        self.lift.encoder() > self.pen_threshold
    }

    pub fn carriage_positions(&self) -> LeftRight<i32> {
        LeftRight {
            left: self.left.encoder(),
            right: self.right.encoder(),
        }
    }

    pub fn tick(&mut self) {
        let before = self.carriage_positions();
        self.left.tick();
        self.right.tick();
        self.lift.tick();
        self.ticks += 1;

        let after = self.carriage_positions();
        if after != before {
            if self.trace.is_empty() {
                self.trace.push(TracePoint {
                    left: before.left,
                    right: before.right,
                    pen_down: self.pen_down(),
                });
            }
            self.trace.push(TracePoint {
                left: after.left,
                right: after.right,
                pen_down: self.pen_down(),
            });
        }
    }

    fn set_light(&mut self, light: Light) {
        self.light = light;
        self.light_log.push(light);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MotorId {
    Left,
    Right,
    Lift,
}

pub type SimDevices = Devices<SimMotor, SimBumper, SimIndicator, SimDelay>;

/// A handle to a simulated world. Clones share the same world.
#[derive(Clone, Default)]
pub struct Sim {
    world: Rc<RefCell<World>>,
}

impl Sim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_world(world: World) -> Self {
        Sim {
            world: Rc::new(RefCell::new(world)),
        }
    }

    pub fn world(&self) -> Ref<'_, World> {
        self.world.borrow()
    }

    pub fn world_mut(&self) -> RefMut<'_, World> {
        self.world.borrow_mut()
    }

    pub fn devices(&self) -> SimDevices {
        let motor = |id| SimMotor {
            world: self.world.clone(),
            id,
        };
        Devices {
            left: motor(MotorId::Left),
            right: motor(MotorId::Right),
            lift: motor(MotorId::Lift),
            bumper: SimBumper {
                world: self.world.clone(),
            },
            indicator: SimIndicator {
                world: self.world.clone(),
            },
            delay: SimDelay {
                world: self.world.clone(),
            },
        }
    }

    pub fn serial(&self) -> SimSerial {
        SimSerial {
            world: self.world.clone(),
        }
    }

    /// Queues bytes as if the host had sent them.
    pub fn send(&self, bytes: &[u8]) {
        self.world.borrow_mut().serial_in.extend(bytes);
    }

    /// Takes everything the plotter has written so far.
    pub fn take_output(&self) -> Vec<u8> {
        let mut world = self.world.borrow_mut();
        world.flushed = 0;
        std::mem::take(&mut world.serial_out)
    }
}

pub struct SimMotor {
    world: Rc<RefCell<World>>,
    id: MotorId,
}

impl SimMotor {
    fn with<T>(&mut self, f: impl FnOnce(&mut SimMotorState) -> T) -> T {
        f(self.world.borrow_mut().motor_mut(self.id))
    }
}

impl Motor for SimMotor {
    fn run(&mut self, speed: i32) {
        self.with(|m| {
            m.log.push(MotorCmd::Run { speed });
            m.stalled = false;
            m.drive = Drive::Run(speed);
        });
    }

    fn off(&mut self) {
        self.with(|m| {
            m.log.push(MotorCmd::Off);
            m.drive = Drive::Off;
        });
    }

    fn run_to_position(&mut self, speed: i32, target: i32) {
        self.with(|m| {
            m.log.push(MotorCmd::RunToPosition { speed, target });
            m.stalled = false;
            m.drive = Drive::ToTarget {
                speed,
                target: target + m.zero,
            };
        });
    }

    fn run_until_position(&mut self, speed: i32, target: i32, blocking: bool) {
        self.with(|m| {
            m.log.push(MotorCmd::RunUntilPosition {
                speed,
                target,
                blocking,
            });
            // A stall is only reported for the drive that caused it.
            m.stalled = false;
            m.drive = Drive::ToTarget {
                speed,
                target: target + m.zero,
            };
        });

        if blocking {
            let mut world = self.world.borrow_mut();
            for _ in 0..MAX_BLOCKING_TICKS {
                let m = world.motor(self.id);
                if m.reached_target() || m.stalled {
                    break;
                }
                world.tick();
            }
        }
    }

    fn reached_target(&mut self) -> bool {
        let mut world = self.world.borrow_mut();
        world.tick();
        world.motor(self.id).reached_target()
    }

    fn position(&mut self) -> i32 {
        self.world.borrow().motor(self.id).encoder()
    }

    fn reset_position(&mut self) {
        self.with(|m| {
            m.log.push(MotorCmd::ResetPosition);
            let old_zero = m.zero;
            m.zero = m.mech;
            // A pending target is an encoder reading, so it moves along with the frame.
            if let Drive::ToTarget { speed, target } = m.drive {
                m.drive = Drive::ToTarget {
                    speed,
                    target: target - old_zero + m.zero,
                };
            }
        });
    }

    fn stalled(&mut self) -> bool {
        let mut world = self.world.borrow_mut();
        world.tick();
        world.motor(self.id).stalled
    }

    fn set_max_current(&mut self, percent: u8) {
        self.with(|m| {
            m.log.push(MotorCmd::SetMaxCurrent(percent));
            m.max_current = percent;
        });
    }
}

pub struct SimBumper {
    world: Rc<RefCell<World>>,
}

impl Bumper for SimBumper {
    fn is_pressed(&mut self) -> bool {
        let mut world = self.world.borrow_mut();
        world.tick();
        world.bumper_pressed()
    }
}

pub struct SimIndicator {
    world: Rc<RefCell<World>>,
}

impl Indicator for SimIndicator {
    fn named_color(&mut self, color: Color) {
        self.world.borrow_mut().set_light(Light::Solid(color));
    }

    fn blink(&mut self, on_ms: u32, off_ms: u32) {
        let mut world = self.world.borrow_mut();
        let color = match world.light {
            Light::Solid(color) | Light::Blinking { color, .. } => color,
            Light::Off => Color::White,
        };
        world.set_light(Light::Blinking {
            color,
            on_ms,
            off_ms,
        });
    }

    fn off(&mut self) {
        self.world.borrow_mut().set_light(Light::Off);
    }
}

pub struct SimDelay {
    world: Rc<RefCell<World>>,
}

impl DelayMs<u32> for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        let mut world = self.world.borrow_mut();
        for _ in 0..ms.div_ceil(TICK_MS) {
            world.tick();
        }
    }
}

pub struct SimSerial {
    world: Rc<RefCell<World>>,
}

impl SerialPort for SimSerial {
    fn bytes_to_read(&mut self) -> usize {
        self.world.borrow().serial_in.len()
    }

    /// # Panics
    ///
    /// Nothing in the simulation can send more bytes while the controller
    /// is blocked, so reading from an empty queue panics instead of hanging.
    fn read_byte(&mut self) -> u8 {
        self.world
            .borrow_mut()
            .serial_in
            .pop_front()
            .expect("blocking read from an empty serial queue")
    }

    fn write(&mut self, bytes: &[u8]) {
        self.world.borrow_mut().serial_out.extend_from_slice(bytes);
    }

    fn flush(&mut self) {
        let mut world = self.world.borrow_mut();
        world.flushed = world.serial_out.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carriage_stalls_at_end_stop() {
        let sim = Sim::new();
        let mut dev = sim.devices();
        dev.left.run(-100);
        while !dev.left.stalled() {}
        assert_eq!(sim.world().left.mech, -1000);
        dev.left.off();
        assert!(!dev.left.stalled());
    }

    #[test]
    fn blocking_move_away_from_a_stall() {
        let sim = Sim::new();
        let mut dev = sim.devices();
        dev.left.run(-100);
        while !dev.left.stalled() {}
        dev.left.reset_position();

        dev.left.run_until_position(100, 705, true);
        assert_eq!(dev.left.position(), 705);
        assert_eq!(sim.world().left.mech, -1000 + 705);
        assert!(!dev.left.stalled());
    }

    #[test]
    fn reset_moves_the_encoder_frame() {
        let sim = Sim::new();
        let mut dev = sim.devices();
        dev.right.run_until_position(100, 300, true);
        assert_eq!(dev.right.position(), 300);
        dev.right.reset_position();
        assert_eq!(dev.right.position(), 0);
        dev.right.run_to_position(100, -50);
        while !dev.right.reached_target() {}
        assert_eq!(sim.world().right.mech, 250);
    }

    #[test]
    fn lift_cam_presses_bumper_once_per_turn() {
        let sim = Sim::new();
        let mut dev = sim.devices();
        dev.lift.run(30);
        let mut presses = 0;
        let mut was_pressed = false;
        while sim.world().lift.mech < 720 {
            let pressed = dev.bumper.is_pressed();
            if pressed && !was_pressed {
                presses += 1;
            }
            was_pressed = pressed;
        }
        assert_eq!(presses, 2);
    }

    #[test]
    fn serial_round_trip() {
        let sim = Sim::new();
        let mut serial = sim.serial();
        sim.send(&[1, 2]);
        assert_eq!(serial.bytes_to_read(), 2);
        assert_eq!(serial.read_byte(), 1);
        serial.write(b"ok");
        serial.flush();
        assert_eq!(sim.world().flushed, 2);
        assert_eq!(sim.take_output(), b"ok");
    }
}
