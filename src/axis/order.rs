//! Loop nesting for the three sweep axes
//!
//! Changing some values (a model checkpoint, a VAE) is expensive for the
//! pipeline, so the costliest axis goes in the outermost loop.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        write!(f, "{}", name)
    }
}

/// Nesting of the three loops, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOrder {
    pub outer: Axis,
    pub middle: Axis,
    pub inner: Axis,
}

impl Default for LoopOrder {
    fn default() -> Self {
        Self { outer: Axis::Z, middle: Axis::Y, inner: Axis::X }
    }
}

impl LoopOrder {
    fn new(outer: Axis, middle: Axis) -> Self {
        let inner = [Axis::X, Axis::Y, Axis::Z]
            .into_iter()
            .find(|a| *a != outer && *a != middle)
            .unwrap_or(Axis::X);
        Self { outer, middle, inner }
    }

    /// All `(ix, iy, iz)` index triples in execution order.
    pub fn cells(&self, nx: usize, ny: usize, nz: usize) -> Vec<(usize, usize, usize)> {
        let len = |axis: Axis| match axis {
            Axis::X => nx,
            Axis::Y => ny,
            Axis::Z => nz,
        };

        let mut cells = Vec::with_capacity(nx * ny * nz);
        for a in 0..len(self.outer) {
            for b in 0..len(self.middle) {
                for c in 0..len(self.inner) {
                    let mut idx = [0usize; 3];
                    idx[slot(self.outer)] = a;
                    idx[slot(self.middle)] = b;
                    idx[slot(self.inner)] = c;
                    cells.push((idx[0], idx[1], idx[2]));
                }
            }
        }
        cells
    }
}

fn slot(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
    }
}

/// Pick the loop nesting from the axis costs.
///
/// Only a strictly highest cost claims the outer loop; ties keep Z
/// outermost and Y in the middle. The second slot goes to the strictly
/// costlier of the remaining two, falling back to the later axis.
pub fn choose_order(cx: f64, cy: f64, cz: f64) -> LoopOrder {
    if cx > cy && cx > cz {
        LoopOrder::new(Axis::X, if cy > cz { Axis::Y } else { Axis::Z })
    } else if cy > cx && cy > cz {
        LoopOrder::new(Axis::Y, if cx > cz { Axis::X } else { Axis::Z })
    } else if cz > cx && cz > cy {
        LoopOrder::new(Axis::Z, if cx > cy { Axis::X } else { Axis::Y })
    } else {
        LoopOrder::default()
    }
}
