//! Outline of the union of contour slabs seen from a cutting plane
//! orthogonal to the contours.
//!
//! Each contour crossed by such a plane leaves a rectangle on it: the
//! crossing segment (`along`) extruded over the thickness of its slice
//! (`across`). Rectangles may overlap when the slice thickness exceeds the
//! spacing. The union of all of them is drawn as a set of 2-point segments.

use crate::geometry::{self, TOLERANCE};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlabRectangle {
    pub along_min: f64,
    pub along_max: f64,
    pub across_min: f64,
    pub across_max: f64,
}

/// Segment between two `(along, across)` positions.
pub type SlabSegment = [(f64, f64); 2];

type Interval = (f64, f64);

#[derive(Debug)]
struct Slab {
    low: f64,
    high: f64,
    intervals: Vec<Interval>,
}

fn merge_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 + TOLERANCE => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Parts of the line covered by exactly one of the two interval sets.
fn symmetric_difference(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    let mut cuts: Vec<f64> = a.iter().chain(b).flat_map(|&(s, e)| [s, e]).collect();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup_by(|x, y| geometry::approx_eq(*x, *y));

    let covers = |set: &[Interval], x: f64| set.iter().any(|&(s, e)| s < x && x < e);

    let mut result: Vec<Interval> = Vec::new();
    for w in cuts.windows(2) {
        let middle = (w[0] + w[1]) / 2.0;
        if covers(a, middle) != covers(b, middle) {
            match result.last_mut() {
                Some(last) if geometry::approx_eq(last.1, w[0]) => last.1 = w[1],
                _ => result.push((w[0], w[1])),
            }
        }
    }
    result
}

/// Splits the union of the rectangles into bands between consecutive
/// `across` boundaries. Overlapping slabs become several bands, each holding
/// the merged intervals of every rectangle spanning it. Uncovered bands are
/// left out.
fn group_into_slabs(rectangles: &[SlabRectangle]) -> Vec<Slab> {
    let mut boundaries: Vec<f64> = rectangles
        .iter()
        .flat_map(|rectangle| [rectangle.across_min, rectangle.across_max])
        .collect();
    boundaries.sort_by(f64::total_cmp);
    boundaries.dedup_by(|x, y| geometry::approx_eq(*x, *y));

    boundaries
        .windows(2)
        .filter_map(|band| {
            let (low, high) = (band[0], band[1]);
            let intervals: Vec<Interval> = rectangles
                .iter()
                .filter(|rectangle| {
                    rectangle.across_min <= low + TOLERANCE
                        && rectangle.across_max >= high - TOLERANCE
                })
                .map(|rectangle| (rectangle.along_min, rectangle.along_max))
                .collect();

            (!intervals.is_empty()).then(|| Slab {
                low,
                high,
                intervals: merge_intervals(intervals),
            })
        })
        .collect()
}

/// Joins vertical sides that continue from one band into the next.
fn merge_vertical(mut sides: Vec<(f64, Interval)>) -> Vec<SlabSegment> {
    sides.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.0.total_cmp(&b.1.0)));

    let mut merged: Vec<(f64, Interval)> = Vec::with_capacity(sides.len());
    for (along, (low, high)) in sides {
        match merged.last_mut() {
            Some((last_along, last))
                if geometry::approx_eq(*last_along, along) && geometry::approx_eq(last.1, low) =>
            {
                last.1 = high;
            }
            _ => merged.push((along, (low, high))),
        }
    }

    merged
        .into_iter()
        .map(|(along, (low, high))| [(along, low), (along, high)])
        .collect()
}

fn push_horizontal(segments: &mut Vec<SlabSegment>, intervals: &[Interval], across: f64) {
    segments.extend(
        intervals
            .iter()
            .map(|&(start, end)| [(start, across), (end, across)]),
    );
}

/// Boundary of the union of the rectangles.
///
/// Adjacent bands share their common edge, on which only the parts covered
/// by one side are drawn. Overlapping slabs therefore leave no edge inside
/// their union.
pub fn outline(rectangles: &[SlabRectangle]) -> Vec<SlabSegment> {
    let slabs = group_into_slabs(rectangles);
    let mut segments = merge_vertical(
        slabs
            .iter()
            .flat_map(|slab| {
                slab.intervals.iter().flat_map(move |&(start, end)| {
                    [(start, (slab.low, slab.high)), (end, (slab.low, slab.high))]
                })
            })
            .collect(),
    );

    if let Some(first) = slabs.first() {
        push_horizontal(&mut segments, &first.intervals, first.low);
    }

    for pair in slabs.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        if geometry::approx_eq(lower.high, upper.low) {
            let difference = symmetric_difference(&lower.intervals, &upper.intervals);
            push_horizontal(&mut segments, &difference, lower.high);
        } else {
            push_horizontal(&mut segments, &lower.intervals, lower.high);
            push_horizontal(&mut segments, &upper.intervals, upper.low);
        }
    }

    if let Some(last) = slabs.last() {
        push_horizontal(&mut segments, &last.intervals, last.high);
    }

    segments
}
