//! Distance transform and marker-controlled watershed.
//!
//! Touching bubbles fuse into one blob after thresholding.  Each bubble
//! has its own peak in the Euclidean distance map, so seeding a flood
//! from every peak and stopping where two floods meet splits them again.

use core::cmp::Ordering;
use std::collections::BinaryHeap;

use image::GrayImage;

/// Label of pixels where two basins meet.
pub const BOUNDARY: i32 = -1;

/// Dense `i32` label grid.  0 = unlabelled / background, `BOUNDARY` =
/// watershed line, `1..=count` = basins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<i32>,
    pub count: i32,
}

impl LabelMap {
    pub fn get(&self, x: i32, y: i32) -> i32 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.labels[y as usize * self.width as usize + x as usize]
    }
}

// ── Euclidean distance transform ──────────────────────────────────

const FAR: f64 = 1e20;

/// Exact Euclidean distance from every foreground pixel to the nearest
/// background pixel (Felzenszwalb–Huttenlocher lower envelope).  The frame
/// is surrounded by one pixel of background.
pub fn distance_transform(mask: &GrayImage) -> Vec<f32> {
    let (w, h) = (mask.width() as usize, mask.height() as usize);
    let (pw, ph) = (w + 2, h + 2);
    let mut grid = vec![0.0f64; pw * ph];
    for (x, y, px) in mask.enumerate_pixels() {
        if px[0] != 0 {
            grid[(y as usize + 1) * pw + x as usize + 1] = FAR;
        }
    }

    let longest = pw.max(ph);
    let mut f = vec![0.0; longest];
    let mut d = vec![0.0; longest];
    let mut v = vec![0usize; longest];
    let mut z = vec![0.0; longest + 1];

    for x in 0..pw {
        for y in 0..ph {
            f[y] = grid[y * pw + x];
        }
        squared_distance_1d(&f[..ph], &mut d[..ph], &mut v, &mut z);
        for y in 0..ph {
            grid[y * pw + x] = d[y];
        }
    }
    for y in 0..ph {
        f[..pw].copy_from_slice(&grid[y * pw..(y + 1) * pw]);
        squared_distance_1d(&f[..pw], &mut d[..pw], &mut v, &mut z);
        grid[y * pw..(y + 1) * pw].copy_from_slice(&d[..pw]);
    }

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            out.push(grid[(y + 1) * pw + x + 1].sqrt() as f32);
        }
    }
    out
}

fn squared_distance_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let parabola = |q: usize, p: usize| {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };

    let mut k = 0usize;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        let mut s = parabola(q, v[k]);
        while s <= z[k] && k > 0 {
            k -= 1;
            s = parabola(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    k = 0;
    for (q, out) in d.iter_mut().enumerate().take(n) {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let dq = q as f64 - v[k] as f64;
        *out = dq * dq + f[v[k]];
    }
}

// ── Markers ───────────────────────────────────────────────────────

const NEIGHBOURS_8: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const NEIGHBOURS_4: [(i32, i32); 4] = [(1, 0), (0, -1), (-1, 0), (0, 1)];

/// Seed one marker per 8-connected cluster of pixels whose distance
/// exceeds `fraction × max distance`.  Labels are assigned in raster
/// order of each cluster's first pixel.
pub fn markers(distance: &[f32], width: u32, height: u32, fraction: f32) -> LabelMap {
    let peak = distance.iter().copied().fold(0.0f32, f32::max);
    let cut = fraction * peak;
    let seed: Vec<bool> = distance.iter().map(|&d| d > cut && d > 0.0).collect();
    connected_components(&seed, width, height)
}

/// 8-connected component labelling of a boolean grid.
pub fn connected_components(set: &[bool], width: u32, height: u32) -> LabelMap {
    let (w, h) = (width as i32, height as i32);
    let mut labels = vec![0i32; set.len()];
    let mut count = 0;
    let mut stack = Vec::new();

    for start in 0..set.len() {
        if !set[start] || labels[start] != 0 {
            continue;
        }
        count += 1;
        labels[start] = count;
        stack.push(start);
        while let Some(i) = stack.pop() {
            let (x, y) = ((i % width as usize) as i32, (i / width as usize) as i32);
            for (dx, dy) in NEIGHBOURS_8 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let j = ny as usize * width as usize + nx as usize;
                if set[j] && labels[j] == 0 {
                    labels[j] = count;
                    stack.push(j);
                }
            }
        }
    }

    LabelMap {
        width,
        height,
        labels,
        count,
    }
}

// ── Flooding ──────────────────────────────────────────────────────

/// Flood queue entry: deeper pixels (larger distance) first, FIFO among
/// equals so the result does not depend on heap internals.
#[derive(Debug, Clone, Copy)]
struct Pending {
    depth: f32,
    seq: u64,
    index: usize,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth
            .total_cmp(&other.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Grow `markers` over the foreground of `mask` in order of decreasing
/// distance.  A pixel whose labelled 4-neighbours disagree becomes a
/// [`BOUNDARY`] and does not spread further.
pub fn flood(mask: &GrayImage, distance: &[f32], markers: LabelMap) -> LabelMap {
    let LabelMap {
        width,
        height,
        mut labels,
        count,
    } = markers;
    let (w, h) = (width as i32, height as i32);
    let inside = |i: usize| mask.as_raw()[i] != 0;

    let mut queued = vec![false; labels.len()];
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    let mut enqueue = |heap: &mut BinaryHeap<Pending>, queued: &mut [bool], i: usize| {
        queued[i] = true;
        heap.push(Pending {
            depth: distance[i],
            seq,
            index: i,
        });
        seq += 1;
    };

    let neighbours = |i: usize| {
        let (x, y) = ((i % width as usize) as i32, (i / width as usize) as i32);
        NEIGHBOURS_4.into_iter().filter_map(move |(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);
            (nx >= 0 && ny >= 0 && nx < w && ny < h).then(|| ny as usize * width as usize + nx as usize)
        })
    };

    for i in 0..labels.len() {
        if labels[i] > 0 {
            for j in neighbours(i) {
                if labels[j] == 0 && !queued[j] && inside(j) {
                    enqueue(&mut heap, &mut queued, j);
                }
            }
        }
    }

    while let Some(Pending { index, .. }) = heap.pop() {
        let mut label = 0;
        let mut conflict = false;
        for j in neighbours(index) {
            let l = labels[j];
            if l > 0 {
                if label == 0 {
                    label = l;
                } else if label != l {
                    conflict = true;
                }
            }
        }
        if conflict {
            labels[index] = BOUNDARY;
            continue;
        }
        if label == 0 {
            continue;
        }
        labels[index] = label;
        for j in neighbours(index) {
            if labels[j] == 0 && !queued[j] && inside(j) {
                enqueue(&mut heap, &mut queued, j);
            }
        }
    }

    LabelMap {
        width,
        height,
        labels,
        count,
    }
}
