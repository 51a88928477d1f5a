//! Boundary tracing and per-bubble geometry.

use core::f32::consts::PI;

use serde::Serialize;

use super::watershed::LabelMap;

/// Chain-code steps, anticlockwise from east, with y pointing down.
const CHAIN: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// One segmented bubble.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubbleRegion {
    /// Closed outer boundary, pixel centres in tracing order.
    pub contour: Vec<(i32, i32)>,
    /// Polygon area enclosed by `contour` (px²).
    pub area: f32,
    /// Number of pixels carrying the label.
    pub pixel_area: u32,
    /// Closed chain length (px).
    pub perimeter: f32,
    /// `4π·area / perimeter²`; 0 for degenerate contours.
    pub circularity: f32,
}

impl BubbleRegion {
    pub fn from_contour(contour: Vec<(i32, i32)>, pixel_area: u32) -> Self {
        let area = polygon_area(&contour);
        let perimeter = chain_length(&contour);
        Self {
            area,
            pixel_area,
            perimeter,
            circularity: circularity(area, perimeter),
            contour,
        }
    }

    /// Diameter of the circle with the same area.
    pub fn equivalent_diameter(&self) -> f32 {
        2.0 * (self.area / PI).sqrt()
    }
}

/// Moore-neighbour boundary trace of the 8-connected set containing
/// `start`, which must be its raster-first pixel.
///
/// Stops when the walk re-enters the second boundary pixel from the first,
/// so single-pixel-wide necks are walked in both directions.
pub fn trace_boundary(start: (i32, i32), inside: impl Fn(i32, i32) -> bool, max_steps: usize) -> Vec<(i32, i32)> {
    let mut points = vec![start];
    let mut current = start;
    let mut dir = 7usize;

    for _ in 0..max_steps {
        let first = if dir % 2 == 0 { (dir + 7) % 8 } else { (dir + 6) % 8 };
        let next = (0..8).map(|i| (first + i) % 8).find_map(|d| {
            let (dx, dy) = CHAIN[d];
            let p = (current.0 + dx, current.1 + dy);
            inside(p.0, p.1).then_some((d, p))
        });
        let Some((d, p)) = next else {
            // Isolated pixel.
            return points;
        };

        let n = points.len();
        if n >= 2 && p == points[1] && points[n - 1] == start {
            points.pop();
            return points;
        }
        points.push(p);
        dir = d;
        current = p;
    }
    points
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[(i32, i32)]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, &(x0, y0)) in points.iter().enumerate() {
        let (x1, y1) = points[(i + 1) % points.len()];
        twice += x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64;
    }
    (twice.abs() as f32) * 0.5
}

/// Closed length of a boundary chain: 1 per axial step, √2 per diagonal.
pub fn chain_length(points: &[(i32, i32)]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut len = 0.0;
    for (i, &(x0, y0)) in points.iter().enumerate() {
        let (x1, y1) = points[(i + 1) % points.len()];
        len += (((x1 - x0).pow(2) + (y1 - y0).pow(2)) as f32).sqrt();
    }
    len
}

pub fn circularity(area: f32, perimeter: f32) -> f32 {
    if perimeter <= 0.0 {
        return 0.0;
    }
    4.0 * PI * area / (perimeter * perimeter)
}

/// One region per basin label, in label order.
pub fn extract_regions(map: &LabelMap) -> Vec<BubbleRegion> {
    let count = map.count.max(0) as usize;
    let mut first = vec![None; count + 1];
    let mut pixels = vec![0u32; count + 1];
    for (i, &l) in map.labels.iter().enumerate() {
        if l <= 0 {
            continue;
        }
        let l = l as usize;
        pixels[l] += 1;
        if first[l].is_none() {
            let w = map.width as usize;
            first[l] = Some(((i % w) as i32, (i / w) as i32));
        }
    }

    let max_steps = 4 * map.labels.len() + 8;
    (1..=count)
        .filter_map(|l| {
            let start = first[l]?;
            let contour = trace_boundary(start, |x, y| map.get(x, y) == l as i32, max_steps);
            Some(BubbleRegion::from_contour(contour, pixels[l]))
        })
        .collect()
}
