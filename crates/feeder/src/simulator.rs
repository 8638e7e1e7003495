use std::path::Path;

use anyhow::bail;
use svg::{
    node::element::{path::Data, Path as SvgPath},
    Document,
};
use vexplot_firmware::{
    sim::{Sim, SimBumper, SimDelay, SimIndicator, SimMotor, SimSerial, TracePoint},
    Config, Controller,
};
use vexplot_protocol::{AckMatcher, Cmd};

use crate::connection::Plotter;

/// Runs commands through the real firmware, on simulated hardware.
pub struct SimPlotter {
    sim: Sim,
    controller: Controller<SimMotor, SimBumper, SimIndicator, SimDelay, SimSerial>,
    acks: AckMatcher,
}

impl Default for SimPlotter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl SimPlotter {
    pub fn new(config: Config) -> Self {
        let sim = Sim::new();
        let controller = Controller::new(sim.devices(), sim.serial(), config);
        SimPlotter {
            sim,
            controller,
            acks: AckMatcher::new(),
        }
    }

    pub fn sim(&self) -> &Sim {
        &self.sim
    }

    /// Draws the path that the pen took.
    ///
    /// Strokes made with the pen down are black. Travel with the pen up is
    /// drawn faintly, so that it's easy to see where the plotter wastes time.
    pub fn illustrate(&self) -> Document {
        let world = self.sim.world();
        let trace = &world.trace;

        let mut document = Document::new();
        for pair in trace.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let data = Data::new()
                .move_to((start.left as f32, start.right as f32))
                .line_to((end.left as f32, end.right as f32));
            let line = if end.pen_down {
                SvgPath::new().set("stroke", "black").set("stroke-width", 2)
            } else {
                SvgPath::new()
                    .set("stroke", "lightgray")
                    .set("stroke-width", 1)
            };
            document = document.add(line.set("fill", "none").set("d", data));
        }

        let (x0, y0, x1, y1) = bounds(trace);
        let pad = 10;
        document.set(
            "viewBox",
            (x0 - pad, y0 - pad, x1 - x0 + 2 * pad, y1 - y0 + 2 * pad),
        )
    }

    pub fn save_illustration(&self, path: &Path) -> anyhow::Result<()> {
        svg::save(path, &self.illustrate())?;
        log::info!("wrote {}", path.display());
        Ok(())
    }
}

fn bounds(trace: &[TracePoint]) -> (i32, i32, i32, i32) {
    trace.iter().fold((0, 0, 0, 0), |(x0, y0, x1, y1), p| {
        (x0.min(p.left), y0.min(p.right), x1.max(p.left), y1.max(p.right))
    })
}

impl Plotter for SimPlotter {
    fn send_cmd(&mut self, cmd: Cmd) -> anyhow::Result<()> {
        self.sim.send(&cmd.encode()?);
        if let Err(e) = self.controller.poll() {
            if e.is_fatal() {
                self.controller.safe_stop();
            }
            return Err(e.into());
        }
        if cmd == Cmd::Setup {
            // The encoders were being re-zeroed while this was recorded.
            self.sim.world_mut().trace.clear();
        }

        let out = self.sim.take_output();
        if !out.into_iter().any(|b| self.acks.push(b)) {
            bail!("simulated plotter didn't acknowledge {cmd:?}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use vexplot_firmware::motion::LeftRight;

    use super::*;

    fn square() -> Vec<Cmd> {
        vec![
            Cmd::Setup,
            Cmd::Move { x: 100, y: 100 },
            Cmd::Draw { x: 300, y: 100 },
            Cmd::Draw { x: 300, y: 300 },
            Cmd::Draw { x: 100, y: 300 },
            Cmd::Draw { x: 100, y: 100 },
            Cmd::Finish,
        ]
    }

    #[test]
    fn draws_and_parks() {
        let mut plotter = SimPlotter::default();
        for cmd in square() {
            plotter.send_cmd(cmd).unwrap();
        }

        let world = plotter.sim().world();
        assert_eq!(world.carriage_positions(), LeftRight::splat(450));
        assert!(world.trace.iter().any(|p| p.pen_down));
        assert!(world.trace.iter().any(|p| !p.pen_down));
    }

    #[test]
    fn illustration_has_strokes() {
        let mut plotter = SimPlotter::default();
        for cmd in square() {
            plotter.send_cmd(cmd).unwrap();
        }

        let svg = plotter.illustrate().to_string();
        assert!(svg.contains("stroke=\"black\""));
        assert!(svg.contains("viewBox"));
    }

    #[test]
    fn unencodable_commands_are_rejected() {
        let mut plotter = SimPlotter::default();
        assert!(plotter.send_cmd(Cmd::Draw { x: -20000, y: 0 }).is_err());
        assert!(plotter.sim().world().serial_in.is_empty());
    }
}
