use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::Path,
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context as _};
use vexplot_protocol::{AckMatcher, Cmd};

pub trait Plotter {
    /// Sends a command, and waits until the plotter says it's done with it.
    fn send_cmd(&mut self, cmd: Cmd) -> anyhow::Result<()>;
}

/// A plotter on the other end of a serial device.
pub struct SerialPlotter<W> {
    out: W,
    incoming: Receiver<Vec<u8>>,
    // Bytes that arrived after the last acknowledgment.
    pending: VecDeque<u8>,
    acks: AckMatcher,
    timeout: Duration,
}

impl SerialPlotter<File> {
    /// Opens a serial device.
    ///
    /// The device is expected to be configured (baud rate and so on) already.
    pub fn open(path: &Path, timeout: Duration) -> anyhow::Result<Self> {
        let out = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut input = out.try_clone()?;

        // Reads block, so they get their own thread.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; 64];
            loop {
                match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => {
                        log::warn!("serial read failed: {e}");
                        break;
                    }
                }
            }
        });

        log::info!("opened {}", path.display());
        Ok(SerialPlotter::new(out, rx, timeout))
    }
}

impl<W: Write> SerialPlotter<W> {
    pub fn new(out: W, incoming: Receiver<Vec<u8>>, timeout: Duration) -> Self {
        SerialPlotter {
            out,
            incoming,
            pending: VecDeque::new(),
            acks: AckMatcher::new(),
            timeout,
        }
    }

    fn take_ack(&mut self) -> bool {
        while let Some(byte) = self.pending.pop_front() {
            if self.acks.push(byte) {
                return true;
            }
        }
        false
    }

    fn wait_for_ack(&mut self) -> anyhow::Result<()> {
        let deadline = Instant::now() + self.timeout;
        while !self.take_ack() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.incoming.recv_timeout(remaining) {
                Ok(bytes) => self.pending.extend(bytes),
                Err(RecvTimeoutError::Timeout) => {
                    bail!("no acknowledgment after {:?}", self.timeout)
                }
                Err(RecvTimeoutError::Disconnected) => bail!("serial port closed"),
            }
        }
        Ok(())
    }
}

impl<W: Write> Plotter for SerialPlotter<W> {
    fn send_cmd(&mut self, cmd: Cmd) -> anyhow::Result<()> {
        log::debug!("sending {cmd:?}");
        let buf = cmd.encode()?;
        self.out.write_all(&buf)?;
        self.out.flush()?;
        self.wait_for_ack()
            .with_context(|| format!("plotter didn't finish {cmd:?}"))
    }
}
