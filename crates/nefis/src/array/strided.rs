//! Strided N-dimensional access planning.
//!
//! A [`FieldLayout`] describes where one field of one table instance lives;
//! an [`AccessPlan`] combines it with per-axis [`Selector`]s and the caller's
//! axis order and enumerates every selected cell together with its position
//! in the caller's buffer.
//!
//! Cells are numbered on disk by the table's storage order (`order[0]`
//! fastest). In the caller's buffer, caller axis 0 varies fastest.

use crate::error::{NefisError, Result};
use crate::format::{ElementType, MAX_DIM};

/// Inclusive, 1-based `{start, stop, step}` range along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    /// First index, at least 1.
    pub start: u32,
    /// Last index, at least `start`.
    pub stop: u32,
    /// Increment, at least 1.
    pub step: u32,
}

impl Selector {
    /// Creates a selector.
    pub fn new(start: u32, stop: u32, step: u32) -> Self {
        Self { start, stop, step }
    }

    /// Every index from `start` to `stop`.
    pub fn range(start: u32, stop: u32) -> Self {
        Self::new(start, stop, 1)
    }

    /// Just `index`.
    pub fn single(index: u32) -> Self {
        Self::new(index, index, 1)
    }

    /// Number of selected indices; zero for an invalid selector.
    pub fn count(&self) -> u64 {
        if self.step == 0 || self.stop < self.start {
            return 0;
        }
        u64::from((self.stop - self.start) / self.step) + 1
    }
}

/// Everything needed to address one field of one table instance.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    /// Element type of the field.
    pub element_type: ElementType,
    /// Bytes per single value.
    pub single_bytes: u32,
    /// Bytes of the whole field within one record.
    pub field_bytes: u64,
    /// Byte offset of the field within the record.
    pub field_offset: u64,
    /// Bytes of one record.
    pub record_bytes: u64,
    /// Table extents, 0 for the growable dimension.
    pub dims: Vec<u32>,
    /// Table storage order, 1-based, fastest first.
    pub order: Vec<u32>,
    /// Fixed tables: offset of the data region. Growable tables: offset of
    /// the sparse index root node.
    pub data_offset: u64,
    /// Index (0-based) of the growable dimension.
    pub growable_dim: Option<usize>,
    /// Bytes of one slice along the growable dimension.
    pub slice_bytes: u64,
}

/// One selected cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Position in the caller's buffer, in values of the field.
    pub buffer_index: u64,
    /// Record number within the data region or the slice.
    pub record_index: u64,
    /// 1-based index along the growable dimension.
    pub growable_index: Option<u64>,
}

#[derive(Debug, Clone)]
struct Axis {
    start: u64,
    step: u64,
    count: u64,
    record_stride: u64,
    growable: bool,
}

/// Validated selection over a field.
#[derive(Debug, Clone)]
pub struct AccessPlan {
    axes: Vec<Axis>,
    cells: u64,
    buffer_len: u64,
}

impl AccessPlan {
    /// Validates `selectors` and `order` against `layout`.
    ///
    /// `selectors[i]` applies to caller axis `i`, which addresses table
    /// dimension `order[i]` (1-based).
    ///
    /// # Errors
    ///
    /// Returns an error if the selector count or axis order does not match
    /// the table, or if any selector is malformed or out of range, and
    /// [`NefisError::SizeOverflow`] if the selection exceeds 64 bits.
    pub fn new(layout: &FieldLayout, selectors: &[Selector], order: &[usize]) -> Result<Self> {
        let ndim = layout.dims.len();
        if selectors.len() != ndim {
            return Err(NefisError::SelectorCount {
                expected: ndim,
                actual: selectors.len(),
            });
        }
        let mut seen = [false; MAX_DIM];
        let permutation = order.len() == ndim
            && order.iter().all(|&dim| {
                (1..=ndim).contains(&dim) && !std::mem::replace(&mut seen[dim - 1], true)
            });
        if !permutation {
            return Err(NefisError::InvalidAxisOrder {
                order: order.to_vec(),
                ndim,
            });
        }

        let strides = record_strides(&layout.dims, &layout.order).ok_or_else(selection_overflow)?;
        let mut axes = Vec::with_capacity(ndim);
        for (axis, (selector, &dim)) in selectors.iter().zip(order).enumerate() {
            let dim = dim - 1;
            if selector.start > selector.stop {
                return Err(NefisError::StartAfterStop {
                    axis,
                    start: selector.start,
                    stop: selector.stop,
                });
            }
            if selector.step < 1 {
                return Err(NefisError::InvalidStep { axis });
            }
            if selector.start < 1 {
                return Err(NefisError::StartBelowOne { axis });
            }
            let extent = layout.dims[dim];
            if extent > 0 && selector.stop > extent {
                return Err(NefisError::StopBeyondExtent {
                    axis,
                    stop: selector.stop,
                    extent,
                });
            }
            axes.push(Axis {
                start: u64::from(selector.start - 1),
                step: u64::from(selector.step),
                count: selector.count(),
                record_stride: strides[dim],
                growable: layout.growable_dim == Some(dim),
            });
        }

        let cells = axes
            .iter()
            .try_fold(1u64, |acc, a| acc.checked_mul(a.count))
            .ok_or_else(selection_overflow)?;
        let buffer_len = cells
            .checked_mul(layout.field_bytes)
            .ok_or_else(selection_overflow)?;
        Ok(Self {
            axes,
            cells,
            buffer_len,
        })
    }

    /// Number of selected cells.
    pub fn cells(&self) -> u64 {
        self.cells
    }

    /// Bytes the caller's buffer must hold.
    pub fn buffer_len(&self) -> u64 {
        self.buffer_len
    }

    /// Smallest selected growable index above `max`, if the selection
    /// reaches past it.
    pub fn growable_beyond(&self, max: u64) -> Option<u64> {
        let axis = self.axes.iter().find(|a| a.growable)?;
        let first = axis.start + 1;
        let last = first + (axis.count - 1) * axis.step;
        if last <= max {
            return None;
        }
        if first > max {
            return Some(first);
        }
        Some(first + ((max - first) / axis.step + 1) * axis.step)
    }

    /// Visits every selected cell, caller axis 0 innermost.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error from `visit`.
    pub fn for_each_cell<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(Cell) -> Result<()>,
    {
        if self.cells == 0 {
            return Ok(());
        }
        let mut counters = vec![0u64; self.axes.len()];
        for buffer_index in 0..self.cells {
            let mut record_index = 0;
            let mut growable_index = None;
            for (axis, &n) in self.axes.iter().zip(&counters) {
                let position = axis.start + n * axis.step;
                if axis.growable {
                    growable_index = Some(position + 1);
                } else {
                    record_index += position * axis.record_stride;
                }
            }
            visit(Cell {
                buffer_index,
                record_index,
                growable_index,
            })?;

            for (axis, n) in self.axes.iter().zip(counters.iter_mut()) {
                *n += 1;
                if *n < axis.count {
                    break;
                }
                *n = 0;
            }
        }
        Ok(())
    }
}

/// Record stride of every table dimension, following the storage order.
///
/// The growable dimension counts as extent 1: each slice is stored on its own.
fn record_strides(dims: &[u32], order: &[u32]) -> Option<Vec<u64>> {
    let mut strides = vec![0u64; dims.len()];
    let mut stride = 1u64;
    for &dim in order {
        let dim = dim as usize - 1;
        strides[dim] = stride;
        stride = stride.checked_mul(u64::from(dims[dim].max(1)))?;
    }
    Some(strides)
}

fn selection_overflow() -> NefisError {
    NefisError::SizeOverflow {
        name: "selection".to_string(),
    }
}
