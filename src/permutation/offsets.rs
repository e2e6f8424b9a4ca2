use log::debug;

use crate::{Result, ReverseErr};

/// A permutation over the batch axis: the `i`-th output unit is read from the
/// `offsets()[i]`-th input unit.
///
/// The table is made of independent reversal blocks, so it is its own inverse, but the
/// inverse is still kept apart so the gradient pass never relies on that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: Vec<usize>,
    inverse: Vec<usize>,
    unit_size: usize,
}

impl OffsetTable {
    /// Builds the offset table for a batch.
    ///
    /// # Arguments
    /// * `batch` - The amount of units in the batch.
    /// * `unit_size` - The amount of values in each unit.
    /// * `segments` - Flat `(start, length)` pairs, terminated by the first pair holding a
    ///   negative value. `None`, or a list with no pair before its sentinel, reverses the
    ///   whole batch.
    ///
    /// # Returns
    /// The offset table or an error if a segment is out of range or overlaps another one.
    pub fn build(batch: usize, unit_size: usize, segments: Option<&[i64]>) -> Result<Self> {
        let offsets = match segments {
            Some(segments) if pairs(segments).next().is_some() => {
                segmented(batch, segments)?
            }
            Some(&[start]) if start >= 0 => {
                return Err(ReverseErr::OddSegmentCount { len: 1 });
            }
            _ => (0..batch).rev().collect(),
        };

        debug!(batch = batch, unit_size = unit_size; "built offset table");
        Ok(Self::from_offsets(offsets, unit_size))
    }

    /// Creates a table that reverses the whole batch.
    pub fn full(batch: usize, unit_size: usize) -> Self {
        Self::from_offsets((0..batch).rev().collect(), unit_size)
    }

    fn from_offsets(offsets: Vec<usize>, unit_size: usize) -> Self {
        let mut inverse = vec![0; offsets.len()];
        for (i, &src) in offsets.iter().enumerate() {
            inverse[src] = i;
        }

        Self {
            offsets,
            inverse,
            unit_size,
        }
    }

    /// The amount of units in the batch this table was built for.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if the table was built for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// The source unit of every output unit.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The output unit every input unit was moved to.
    pub fn inverse(&self) -> &[usize] {
        &self.inverse
    }

    /// Returns `true` if applying the table twice yields the identity.
    pub fn is_involution(&self) -> bool {
        self.offsets == self.inverse
    }
}

/// Iterates the meaningful `(start, length)` pairs, stopping at the first sentinel.
fn pairs(segments: &[i64]) -> impl Iterator<Item = (i64, i64)> + '_ {
    segments
        .chunks(2)
        .map_while(|pair| match *pair {
            [start, length] if start >= 0 && length >= 0 => Some((start, length)),
            _ => None,
        })
}

fn segmented(batch: usize, segments: &[i64]) -> Result<Vec<usize>> {
    let mut offsets: Vec<usize> = (0..batch).collect();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut npairs = 0;

    for (start, length) in pairs(segments) {
        npairs += 1;

        match start.checked_add(length) {
            Some(end) if end <= batch as i64 => {}
            _ => {
                return Err(ReverseErr::SegmentOutOfRange {
                    start,
                    length,
                    batch,
                });
            }
        }

        let (start, length) = (start as usize, length as usize);
        if length == 0 {
            continue;
        }

        if let Some(&other) = spans
            .iter()
            .find(|&&(s, l)| start < s + l && s < start + length)
        {
            return Err(ReverseErr::OverlappingSegments {
                first: other,
                second: (start, length),
            });
        }
        spans.push((start, length));

        let last = start + length - 1;
        for (k, offset) in offsets[start..=last].iter_mut().enumerate() {
            *offset = last - k;
        }
    }

    // A non-negative value left unpaired right after the meaningful pairs is a dangling
    // start. A negative one is padding.
    if segments.len() % 2 != 0
        && npairs * 2 == segments.len() - 1
        && segments.last().is_some_and(|&start| start >= 0)
    {
        return Err(ReverseErr::OddSegmentCount {
            len: segments.len(),
        });
    }

    Ok(offsets)
}
