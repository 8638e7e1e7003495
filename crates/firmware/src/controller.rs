//! The serial command interpreter.

use core::convert::Infallible;

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, error, info, warn};
use vexplot_protocol::{Cmd, Opcode, PAYLOAD_LEN, READY};

use crate::{
    config::Config,
    error::Error,
    hal::{Bumper, Indicator, Motor, SerialPort},
    motion::Devices,
    status::Status,
    wait::wait_until,
};

pub struct Controller<M, B, I, D, S> {
    devices: Devices<M, B, I, D>,
    serial: S,
    config: Config,
}

impl<M, B, I, D, S> Controller<M, B, I, D, S>
where
    M: Motor,
    B: Bumper,
    I: Indicator,
    D: DelayMs<u32>,
    S: SerialPort,
{
    pub fn new(devices: Devices<M, B, I, D>, serial: S, config: Config) -> Self {
        Controller {
            devices,
            serial,
            config,
        }
    }

    /// Throws away anything that arrived before we were ready to listen.
    pub fn drain_input(&mut self) -> usize {
        let mut dropped = 0;
        while self.serial.bytes_to_read() > 0 {
            self.serial.read_byte();
            dropped += 1;
        }
        if dropped > 0 {
            debug!("dropped {dropped} stale input bytes");
        }
        dropped
    }

    /// Handles one command, if there's one waiting.
    ///
    /// The ready acknowledgment is written only if the command was carried
    /// out successfully.
    pub fn poll(&mut self) -> Result<Option<Cmd>, Error> {
        if self.serial.bytes_to_read() == 0 {
            return Ok(None);
        }

        let opcode = Opcode::try_from(self.serial.read_byte())?;
        let payload = self.read_payload(opcode)?;
        let cmd = Cmd::from_parts(opcode, payload);
        self.execute(cmd)?;

        self.serial.write(&READY);
        self.serial.flush();
        Ok(Some(cmd))
    }

    fn read_payload(&mut self, opcode: Opcode) -> Result<[u8; PAYLOAD_LEN], Error> {
        let mut payload = [0u8; PAYLOAD_LEN];
        let len = opcode.payload_len();
        if len == 0 {
            return Ok(payload);
        }

        if let Some(timeout_ms) = self.config.payload_timeout_ms {
            let serial = &mut self.serial;
            let arrived = wait_until(&mut self.devices.delay, 0, Some(timeout_ms), || {
                serial.bytes_to_read() >= len
            });
            if arrived.is_err() {
                let received = self.drain_input();
                return Err(Error::IncompletePayload {
                    opcode,
                    received,
                    expected: len,
                });
            }
        }

        self.serial.read_bytes(&mut payload[..len]);
        Ok(payload)
    }

    pub fn execute(&mut self, cmd: Cmd) -> Result<(), Error> {
        debug!("executing {cmd:?}");
        let config = &self.config;
        match cmd {
            Cmd::Setup => self.devices.calibrate(config)?,
            Cmd::Draw { x, y } => self.devices.draw_to(config, x, y),
            Cmd::Move { x, y } => self.devices.move_to(config, x, y),
            Cmd::Finish => {
                self.devices.finish(config);
                info!("drawing finished");
            }
        }
        Ok(())
    }

    /// Turns off all the motors and shows the fault color.
    pub fn safe_stop(&mut self) {
        self.devices.all_off();
        Status::Fault.show(&mut self.devices.indicator, &self.config);
    }

    /// Processes commands until something goes irrecoverably wrong.
    pub fn run(&mut self) -> Result<Infallible, Error> {
        self.drain_input();
        info!("listening for commands");
        self.serve()
    }

    /// Like [`Controller::run`], but without first dropping queued input.
    pub fn serve(&mut self) -> Result<Infallible, Error> {
        loop {
            match self.poll() {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    error!("{e}, stopping");
                    self.safe_stop();
                    return Err(e);
                }
                Err(e) => warn!("{e}"),
            }
        }
    }
}
