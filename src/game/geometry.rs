use super::constants::ASPECT_RATIO;
use super::types::{Direction, Point, Segment};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

pub fn translated(point: Point, direction: Direction, distance: f64) -> Point {
    let (dx, dy) = direction.unit();
    Point {
        x: point.x + dx * distance,
        y: point.y + dy * distance,
    }
}

pub fn field_contains(point: Point) -> bool {
    point.x >= -ASPECT_RATIO && point.x <= ASPECT_RATIO && point.y >= -1.0 && point.y <= 1.0
}

// Expands perpendicular to the segment's axis only; a zero-length segment
// (fresh turn seed) widens on both axes.
pub fn fat_aabb(segment: &Segment, line_width: f64) -> Aabb {
    let mut min = Point {
        x: segment.start.x.min(segment.end.x),
        y: segment.start.y.min(segment.end.y),
    };
    let mut max = Point {
        x: segment.start.x.max(segment.end.x),
        y: segment.start.y.max(segment.end.y),
    };
    if segment.start.x == segment.end.x {
        min.x -= line_width;
        max.x += line_width;
    }
    if segment.start.y == segment.end.y {
        min.y -= line_width;
        max.y += line_width;
    }
    Aabb { min, max }
}

// All segments are axis-aligned, so the intersection of two fat lines is a
// rectangle; the entry corner is the first point of the target's footprint
// touched along the travel direction and is where a dying head snaps to.
pub fn line_to_line(
    travel: &Segment,
    direction: Direction,
    target: &Segment,
    line_width: f64,
) -> Option<(Point, Point)> {
    let travel_box = fat_aabb(travel, line_width);
    let target_box = fat_aabb(target, line_width);
    if !travel_box.overlaps(&target_box) {
        return None;
    }
    let head = travel.end;
    let (entry, exit) = match direction {
        Direction::Right => (
            Point { x: target_box.min.x, y: head.y },
            Point { x: target_box.max.x, y: head.y },
        ),
        Direction::Left => (
            Point { x: target_box.max.x, y: head.y },
            Point { x: target_box.min.x, y: head.y },
        ),
        Direction::Down => (
            Point { x: head.x, y: target_box.min.y },
            Point { x: head.x, y: target_box.max.y },
        ),
        Direction::Up => (
            Point { x: head.x, y: target_box.max.y },
            Point { x: head.x, y: target_box.min.y },
        ),
    };
    Some((entry, exit))
}

// Wall-clock time at which a head traversing the segment reached the given
// point on it.
pub fn time_at_point(segment: &Segment, point: Point, start_ms: f64, duration_ms: f64) -> f64 {
    let dx = segment.end.x - segment.start.x;
    let dy = segment.end.y - segment.start.y;
    let (offset, span) = if dx.abs() > dy.abs() {
        (point.x - segment.start.x, dx)
    } else {
        (point.y - segment.start.y, dy)
    };
    if span == 0.0 {
        return start_ms;
    }
    start_ms + (offset / span).clamp(0.0, 1.0) * duration_ms
}
