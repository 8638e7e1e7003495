//! Turning SVG drawings into plotter commands.

use std::path::Path;

use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape};
use usvg::{tiny_skia_path::PathSegment, TreeParsing};
use vexplot_protocol::Cmd;

/// The region of the page that we're allowed to draw on, in encoder units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawingArea {
    pub width: f64,
    pub height: f64,
    /// Blank space to leave on every side.
    pub margin: f64,
}

impl DrawingArea {
    fn target(&self) -> Rect {
        Rect::new(
            self.margin,
            self.margin,
            self.width - self.margin,
            self.height - self.margin,
        )
    }
}

/// Scales and translates `path` to fill as much of `area` as it can without
/// changing its aspect ratio.
pub fn transform(path: &mut BezPath, area: &DrawingArea) {
    let bbox = path.bounding_box();
    let target = area.target();

    // A horizontal or vertical line has no extent in one direction, so only
    // the other one constrains the scale.
    let scale = [
        target.width() / bbox.width(),
        target.height() / bbox.height(),
    ]
    .into_iter()
    .filter(|s| s.is_finite())
    .reduce(f64::min)
    .unwrap_or(1.0);

    let transform = Affine::translate(-bbox.center().to_vec2())
        .then_scale(scale)
        .then_translate(target.center().to_vec2());

    path.apply_affine(transform);
}

fn round(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

#[derive(Default)]
struct Planner {
    cmds: Vec<Cmd>,
    subpath_start: Option<(i32, i32)>,
    pending_move: Option<(i32, i32)>,
    pos: Option<(i32, i32)>,
}

impl Planner {
    fn move_to(&mut self, p: (i32, i32)) {
        self.subpath_start = Some(p);
        self.pending_move = Some(p);
    }

    fn line_to(&mut self, p: (i32, i32)) {
        // Subpaths that never draw anything don't need a move either.
        if let Some((x, y)) = self.pending_move.take() {
            self.cmds.push(Cmd::Move { x, y });
            self.pos = Some((x, y));
        }
        if self.pos == Some(p) {
            return;
        }
        let (x, y) = p;
        self.cmds.push(Cmd::Draw { x, y });
        self.pos = Some(p);
    }

    fn close(&mut self) {
        // Closing a subpath that hasn't drawn anything yet leaves us where we started.
        if self.pending_move.is_some() {
            return;
        }
        if let Some(start) = self.subpath_start {
            self.line_to(start);
        }
    }
}

/// Flattens `path` into straight lines, and turns them into commands.
///
/// Each subpath becomes a `Move` to its start followed by a `Draw` for each
/// of its segments. The commands always end with a `Finish`, and start with a
/// `Setup` if `setup` is true.
pub fn plan(path: &BezPath, tolerance: f64, setup: bool) -> Vec<Cmd> {
    let mut planner = Planner::default();
    if setup {
        planner.cmds.push(Cmd::Setup);
    }

    path.flatten(tolerance, |el| match el {
        PathEl::MoveTo(p) => planner.move_to(round(p)),
        PathEl::LineTo(p) => planner.line_to(round(p)),
        PathEl::ClosePath => planner.close(),
        // Flattening only produces lines.
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });

    planner.cmds.push(Cmd::Finish);
    planner.cmds
}

pub fn load_svg(path: &Path) -> anyhow::Result<BezPath> {
    let data = std::fs::read(path)?;
    load_svg_data(&data)
}

/// Collects all the paths in an SVG document into one.
pub fn load_svg_data(data: &[u8]) -> anyhow::Result<BezPath> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(data, &opt)?;
    let mut ret = BezPath::new();

    let cvt = |pt: usvg::tiny_skia_path::Point| Point::new(pt.x as f64, pt.y as f64);

    for node in tree.root.descendants() {
        if let usvg::NodeKind::Path(p) = &*node.borrow() {
            let map = |mut pt: usvg::tiny_skia_path::Point| {
                p.transform.map_point(&mut pt);
                cvt(pt)
            };
            for seg in p.data.segments() {
                match seg {
                    PathSegment::MoveTo(pt) => ret.move_to(map(pt)),
                    PathSegment::LineTo(pt) => ret.line_to(map(pt)),
                    PathSegment::QuadTo(pt1, pt2) => ret.quad_to(map(pt1), map(pt2)),
                    PathSegment::CubicTo(pt1, pt2, pt3) => {
                        ret.curve_to(map(pt1), map(pt2), map(pt3))
                    }
                    PathSegment::Close => ret.close_path(),
                }
            }
        }
    }
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, side: f64) -> BezPath {
        let mut p = BezPath::new();
        p.move_to((x0, y0));
        p.line_to((x0 + side, y0));
        p.line_to((x0 + side, y0 + side));
        p.line_to((x0, y0 + side));
        p.close_path();
        p
    }

    #[test]
    fn moves_to_each_subpath_then_draws() {
        let mut path = square(0.0, 0.0, 10.0);
        path.move_to((20.0, 0.0));
        path.line_to((30.0, 0.0));

        let cmds = plan(&path, 0.5, true);
        assert_eq!(
            cmds,
            vec![
                Cmd::Setup,
                Cmd::Move { x: 0, y: 0 },
                Cmd::Draw { x: 10, y: 0 },
                Cmd::Draw { x: 10, y: 10 },
                Cmd::Draw { x: 0, y: 10 },
                Cmd::Draw { x: 0, y: 0 },
                Cmd::Move { x: 20, y: 0 },
                Cmd::Draw { x: 30, y: 0 },
                Cmd::Finish,
            ]
        );
    }

    #[test]
    fn setup_is_optional() {
        let cmds = plan(&BezPath::new(), 0.5, false);
        assert_eq!(cmds, vec![Cmd::Finish]);
    }

    #[test]
    fn skips_segments_that_round_away() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((0.2, 0.1));
        path.line_to((5.0, 0.0));
        path.move_to((50.0, 50.0));

        let cmds = plan(&path, 0.5, false);
        assert_eq!(
            cmds,
            vec![
                Cmd::Move { x: 0, y: 0 },
                Cmd::Draw { x: 5, y: 0 },
                Cmd::Finish,
            ]
        );
    }

    #[test]
    fn closing_an_empty_subpath_draws_nothing() {
        let mut path = BezPath::new();
        path.move_to((40.0, 40.0));
        path.close_path();
        path.move_to((0.0, 0.0));
        path.line_to((5.0, 0.0));

        let cmds = plan(&path, 0.5, false);
        assert_eq!(
            cmds,
            vec![
                Cmd::Move { x: 0, y: 0 },
                Cmd::Draw { x: 5, y: 0 },
                Cmd::Finish,
            ]
        );
    }

    #[test]
    fn curves_are_flattened() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.curve_to((0.0, 100.0), (100.0, 100.0), (100.0, 0.0));

        let cmds = plan(&path, 1.0, false);
        let draws = cmds
            .iter()
            .filter(|c| matches!(c, Cmd::Draw { .. }))
            .count();
        assert!(draws > 2);
        assert_eq!(cmds[cmds.len() - 2], Cmd::Draw { x: 100, y: 0 });
    }

    #[test]
    fn transform_fits_the_area() {
        let mut path = square(-3.0, 7.0, 2.0);
        path.line_to((-3.0, 11.0));
        let area = DrawingArea {
            width: 900.0,
            height: 600.0,
            margin: 50.0,
        };
        transform(&mut path, &area);

        // The drawing is twice as tall as it is wide, so the height is what limits it.
        let bbox = path.bounding_box();
        assert!((bbox.y0 - 50.0).abs() < 1e-9);
        assert!((bbox.y1 - 550.0).abs() < 1e-9);
        assert!((bbox.width() - 250.0).abs() < 1e-9);
        assert!((bbox.center().x - 450.0).abs() < 1e-9);
    }

    #[test]
    fn transform_handles_straight_lines() {
        let mut path = BezPath::new();
        path.move_to((0.0, 5.0));
        path.line_to((10.0, 5.0));
        let area = DrawingArea {
            width: 100.0,
            height: 100.0,
            margin: 0.0,
        };
        transform(&mut path, &area);

        let bbox = path.bounding_box();
        assert_eq!(bbox, Rect::new(0.0, 50.0, 100.0, 50.0));
    }

    #[test]
    fn loads_paths_from_svg() {
        let data = br#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
            <path d="M 10 10 L 90 10 L 90 40" stroke="black" fill="none"/>
        </svg>"#;
        let path = load_svg_data(data).unwrap();
        let bbox = path.bounding_box();
        assert_eq!(bbox, Rect::new(10.0, 10.0, 90.0, 40.0));
    }
}
