//! Display-list surface for inspecting layers in tests

use super::render::{Stroke, Surface};

/// One recorded drawing call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: String,
    },
    StrokeRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        stroke: Stroke,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        stroke: Stroke,
    },
    FillCircle {
        x: f32,
        y: f32,
        r: f32,
        color: String,
    },
    StrokeCircle {
        x: f32,
        y: f32,
        r: f32,
        stroke: Stroke,
    },
    Polygon {
        points: Vec<(f32, f32)>,
        color: String,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        color: String,
    },
}

/// Surface that records a display list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSurface {
    pub ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> impl Iterator<Item = (&(f32, f32), &(f32, f32), &Stroke)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Line { from, to, stroke } => Some((from, to, stroke)),
            _ => None,
        })
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self) {
        self.ops.clear();
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: &str) {
        self.ops.push(DrawOp::FillRect {
            x,
            y,
            w,
            h,
            color: color.to_string(),
        });
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, stroke: &Stroke) {
        self.ops.push(DrawOp::StrokeRect {
            x,
            y,
            w,
            h,
            stroke: stroke.clone(),
        });
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: &Stroke) {
        self.ops.push(DrawOp::Line {
            from,
            to,
            stroke: stroke.clone(),
        });
    }

    fn fill_circle(&mut self, x: f32, y: f32, r: f32, color: &str) {
        self.ops.push(DrawOp::FillCircle {
            x,
            y,
            r,
            color: color.to_string(),
        });
    }

    fn stroke_circle(&mut self, x: f32, y: f32, r: f32, stroke: &Stroke) {
        self.ops.push(DrawOp::StrokeCircle {
            x,
            y,
            r,
            stroke: stroke.clone(),
        });
    }

    fn fill_polygon(&mut self, points: &[(f32, f32)], color: &str) {
        self.ops.push(DrawOp::Polygon {
            points: points.to_vec(),
            color: color.to_string(),
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: &str) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            color: color.to_string(),
        });
    }

    fn blit(&mut self, layer: &Self) {
        self.ops.extend(layer.ops.iter().cloned());
    }
}
