use cgmath::{InnerSpace, MetricSpace, Vector2};
use std::f32::consts::TAU;

pub type Point = Vector2<f32>;

// Maximum chord length when sampling curved sections into a polyline.
const MAX_CHORD_LENGTH: f32 = 0.25;
// Spacing of the resampled equal-distance points.
const EQUAL_POINT_SPACING: f32 = 2.0;
// Below this triangle area the three arc points are treated as collinear.
const COLLINEAR_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    Linear,
    Bezier,
    Passthrough,
}

/// One continuous piece of a slider's control-point list. Sections
/// concatenate into a single path per slider.
#[derive(Debug, Clone)]
pub struct CurveSection {
    pub kind: CurveKind,
    pub points: Vec<Point>,
}

/// Splits a raw control-point list into curve sections. A section ends
/// wherever the same point appears twice in a row; the duplicate starts the
/// next section. A perfect-circle slider only stays a passthrough arc when
/// it has exactly three control points, otherwise it degrades to bezier.
pub fn split_sections(kind: CurveKind, raw: &[Point]) -> Vec<CurveSection> {
    match kind {
        CurveKind::Linear => {
            if raw.len() < 2 {
                return Vec::new();
            }
            // Linear sliders are judged pairwise so duplicates are harmless.
            vec![CurveSection { kind: CurveKind::Linear, points: raw.to_vec() }]
        }
        CurveKind::Passthrough if raw.len() == 3 => {
            vec![CurveSection { kind: CurveKind::Passthrough, points: raw.to_vec() }]
        }
        _ => {
            let mut sections = Vec::new();
            let mut current: Vec<Point> = Vec::new();
            for (i, &p) in raw.iter().enumerate() {
                current.push(p);
                let duplicate_next = raw.get(i + 1).is_some_and(|&next| next == p);
                if duplicate_next || i + 1 == raw.len() {
                    if current.len() > 1 {
                        sections.push(CurveSection {
                            kind: CurveKind::Bezier,
                            points: std::mem::take(&mut current),
                        });
                    } else {
                        current.clear();
                    }
                }
            }
            sections
        }
    }
}

/// Evaluates a Bézier curve of arbitrary degree at `t`. Degrees 1-3 take
/// closed-form shortcuts; every degree agrees with De Casteljau.
pub fn bezier_point(control: &[Point], t: f32) -> Point {
    let u = 1.0 - t;
    match control.len() {
        0 => Point::new(0.0, 0.0),
        1 => control[0],
        2 => control[0] * u + control[1] * t,
        3 => control[0] * (u * u) + control[1] * (2.0 * u * t) + control[2] * (t * t),
        4 => {
            control[0] * (u * u * u)
                + control[1] * (3.0 * u * u * t)
                + control[2] * (3.0 * u * t * t)
                + control[3] * (t * t * t)
        }
        _ => de_casteljau(control, t),
    }
}

fn de_casteljau(control: &[Point], t: f32) -> Point {
    let mut scratch = control.to_vec();
    for step in (1..scratch.len()).rev() {
        for i in 0..step {
            scratch[i] = scratch[i] * (1.0 - t) + scratch[i + 1] * t;
        }
    }
    scratch[0]
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    let area = (a.x as f64) * (b.y as f64 - c.y as f64)
        + (b.x as f64) * (c.y as f64 - a.y as f64)
        + (c.x as f64) * (a.y as f64 - b.y as f64);
    (area / 2.0).abs()
}

/// Circumscribed circle through three points, or `None` when they are
/// collinear and no finite circle exists.
pub fn circle_through_points(a: Point, b: Point, c: Point) -> Option<(Point, f32)> {
    if triangle_area(a, b, c) < COLLINEAR_EPSILON {
        return None;
    }
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);
    let (cx, cy) = (c.x as f64, c.y as f64);
    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    let asq = ax * ax + ay * ay;
    let bsq = bx * bx + by * by;
    let csq = cx * cx + cy * cy;
    let ux = (asq * (by - cy) + bsq * (cy - ay) + csq * (ay - by)) / d;
    let uy = (asq * (cx - bx) + bsq * (ax - cx) + csq * (bx - ax)) / d;
    let center = Point::new(ux as f32, uy as f32);
    Some((center, center.distance(a)))
}

/// Smallest signed rotation taking angle `from` to angle `to`, in
/// (-pi, pi].
pub fn normalized_angle_delta(from: f32, to: f32) -> f32 {
    let mut delta = (to - from) % TAU;
    if delta > TAU / 2.0 {
        delta -= TAU;
    } else if delta <= -TAU / 2.0 {
        delta += TAU;
    }
    delta
}

/// Folds a completion value in [0, repeat_count] into a path fraction in
/// [0, 1], alternating direction every whole repeat.
pub fn mirror(completion: f64) -> f64 {
    let m = completion.rem_euclid(2.0);
    if m > 1.0 { 2.0 - m } else { m }
}

fn sample_section(section: &CurveSection, out: &mut Vec<Point>) {
    match section.kind {
        CurveKind::Linear => out.extend_from_slice(&section.points),
        CurveKind::Bezier => {
            let poly_length: f32 = section
                .points
                .windows(2)
                .map(|pair| pair[0].distance(pair[1]))
                .sum();
            let steps = ((poly_length / MAX_CHORD_LENGTH).ceil() as usize).max(2);
            for i in 0..=steps {
                out.push(bezier_point(&section.points, i as f32 / steps as f32));
            }
        }
        CurveKind::Passthrough => {
            let [a, b, c] = [section.points[0], section.points[1], section.points[2]];
            match circle_through_points(a, b, c) {
                Some((center, radius)) => sample_arc(a, b, c, center, radius, out),
                // Collinear arc degrades to its chord line.
                None => out.extend_from_slice(&section.points),
            }
        }
    }
}

fn sample_arc(a: Point, b: Point, c: Point, center: Point, radius: f32, out: &mut Vec<Point>) {
    let start = (a.y - center.y).atan2(a.x - center.x);
    let mut end = (c.y - center.y).atan2(c.x - center.x);
    let ab = b - a;
    let ac = c - a;
    let counter_clockwise = ab.x * ac.y - ab.y * ac.x > 0.0;
    if counter_clockwise {
        while end < start {
            end += TAU;
        }
    } else {
        while end > start {
            end -= TAU;
        }
    }
    let arc_length = (end - start).abs() * radius;
    let steps = ((arc_length / MAX_CHORD_LENGTH).ceil() as usize).max(2);
    for i in 0..=steps {
        let angle = start + (end - start) * (i as f32 / steps as f32);
        out.push(center + Point::new(angle.cos(), angle.sin()) * radius);
    }
}

/// Flattens curve sections into points spaced at approximately equal arc
/// length, with total traced length exactly `target_length`. A path shorter
/// than the target is extended straight past its last point; a longer one is
/// truncated.
pub fn flatten_path(sections: &[CurveSection], target_length: f32) -> Vec<Point> {
    let mut raw = Vec::new();
    for section in sections {
        sample_section(section, &mut raw);
    }
    resample_equal(&raw, target_length)
}

fn resample_equal(raw: &[Point], target_length: f32) -> Vec<Point> {
    if raw.is_empty() {
        return Vec::new();
    }
    let segments = ((target_length / EQUAL_POINT_SPACING).ceil() as usize).max(1);
    let spacing = target_length / segments as f32;

    // Direction used to extend past the end when the raw trace comes up
    // short: the last segment with nonzero length.
    let extension = raw
        .windows(2)
        .rev()
        .map(|pair| pair[1] - pair[0])
        .find(|d| d.magnitude2() > 0.0)
        .map(|d| d.normalize())
        .unwrap_or_else(|| Point::new(1.0, 0.0));

    let mut out = Vec::with_capacity(segments + 1);
    out.push(raw[0]);
    let mut segment_index = 0;
    let mut traced = 0.0_f32;
    for i in 1..=segments {
        let want = spacing * i as f32;
        loop {
            if segment_index + 1 >= raw.len() {
                // Raw path exhausted, extend linearly.
                let last = *raw.last().map_or(&raw[0], |p| p);
                out.push(last + extension * (want - traced));
                break;
            }
            let seg = raw[segment_index + 1] - raw[segment_index];
            let seg_len = seg.magnitude();
            if traced + seg_len >= want {
                let along = if seg_len > 0.0 { (want - traced) / seg_len } else { 0.0 };
                out.push(raw[segment_index] + seg * along);
                break;
            }
            traced += seg_len;
            segment_index += 1;
        }
    }
    out
}

/// A slider's resampled path: equally spaced points, cached length and
/// bounding box. Lookups by fraction are O(1) thanks to the even spacing.
#[derive(Debug, Clone)]
pub struct SliderPath {
    pub points: Vec<Point>,
    pub length: f32,
    pub min: Point,
    pub max: Point,
}

impl SliderPath {
    pub fn new(sections: &[CurveSection], target_length: f32) -> Self {
        let points = flatten_path(sections, target_length);
        let mut path = Self {
            points,
            length: target_length,
            min: Point::new(0.0, 0.0),
            max: Point::new(0.0, 0.0),
        };
        path.recompute_bounds();
        path
    }

    fn recompute_bounds(&mut self) {
        let first = self.points.first().copied().unwrap_or(Point::new(0.0, 0.0));
        let mut min = first;
        let mut max = first;
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        self.min = min;
        self.max = max;
    }

    /// Position at path fraction `t` in [0, 1]. Repeat completions must be
    /// folded through [`mirror`] first.
    pub fn point_at(&self, t: f32) -> Point {
        match self.points.len() {
            0 => Point::new(0.0, 0.0),
            1 => self.points[0],
            n => {
                let clamped = t.clamp(0.0, 1.0) * (n - 1) as f32;
                let i = (clamped.floor() as usize).min(n - 2);
                let frac = clamped - i as f32;
                self.points[i] * (1.0 - frac) + self.points[i + 1] * frac
            }
        }
    }

    pub fn start_point(&self) -> Point {
        self.points.first().copied().unwrap_or(Point::new(0.0, 0.0))
    }

    pub fn end_point(&self) -> Point {
        self.points.last().copied().unwrap_or(Point::new(0.0, 0.0))
    }

    /// Stacking shift, applied once after processing.
    pub fn translate(&mut self, offset: Point) {
        for p in &mut self.points {
            *p += offset;
        }
        self.min += offset;
        self.max += offset;
    }
}
