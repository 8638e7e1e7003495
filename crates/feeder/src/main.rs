use std::{path::PathBuf, time::Duration};

use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use vexplot_protocol::Cmd;

use crate::{
    connection::{Plotter, SerialPlotter},
    drawing::DrawingArea,
    simulator::SimPlotter,
};

mod connection;
mod drawing;
mod simulator;

/// Draws an SVG file on a vexplot.
#[derive(Parser)]
#[command(group(
    ArgGroup::new("output")
        .required(true)
        .multiple(true)
        .args(["port", "simulate", "dump"]),
))]
struct Args {
    path: PathBuf,

    /// Send the drawing to the plotter on this serial device.
    #[arg(long, conflicts_with = "simulate")]
    port: Option<PathBuf>,

    /// Draw on a simulated plotter, and save what it drew to this SVG file.
    #[arg(long)]
    simulate: Option<PathBuf>,

    /// Write the planned commands to this file, as JSON.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Width of the drawing area, in encoder units.
    #[arg(long, default_value_t = 900.0)]
    width: f64,

    /// Height of the drawing area, in encoder units.
    #[arg(long, default_value_t = 900.0)]
    height: f64,

    #[arg(long, default_value_t = 30.0)]
    margin: f64,

    /// How far the flattened lines may stray from the curves, in encoder units.
    #[arg(long, default_value_t = 1.0)]
    tolerance: f64,

    /// Assume the plotter is already calibrated.
    #[arg(long)]
    no_setup: bool,

    /// How long to wait for the plotter to finish a command. Calibration is
    /// the slowest one.
    #[arg(long, default_value_t = 120)]
    ack_timeout_secs: u64,
}

fn send_all(plotter: &mut impl Plotter, cmds: &[Cmd]) -> anyhow::Result<()> {
    let bar = ProgressBar::new(cmds.len() as u64)
        .with_style(ProgressStyle::with_template("{wide_bar} {pos}/{len} {msg}")?);
    for &cmd in cmds {
        bar.set_message(format!("{cmd:?}"));
        plotter.send_cmd(cmd)?;
        bar.inc(1);
    }
    bar.finish_with_message("done!");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let mut path = drawing::load_svg(&args.path)?;
    let area = DrawingArea {
        width: args.width,
        height: args.height,
        margin: args.margin,
    };
    drawing::transform(&mut path, &area);
    let cmds = drawing::plan(&path, args.tolerance, !args.no_setup);

    // Catch coordinates that don't fit on the wire before anything moves.
    for cmd in &cmds {
        cmd.encode()?;
    }
    info!("planned {} commands", cmds.len());

    if let Some(dump) = &args.dump {
        std::fs::write(dump, serde_json::to_vec_pretty(&cmds)?)?;
        info!("wrote {}", dump.display());
    }

    if let Some(port) = &args.port {
        let timeout = Duration::from_secs(args.ack_timeout_secs);
        let mut plotter = SerialPlotter::open(port, timeout)?;
        send_all(&mut plotter, &cmds)?;
    } else if let Some(out) = &args.simulate {
        let mut plotter = SimPlotter::default();
        send_all(&mut plotter, &cmds)?;
        plotter.save_illustration(out)?;
    }

    Ok(())
}
