//! Seat placement around a table.
//!
//! Seat positions are relative to the table centre. Every seat sits
//! [`SEAT_OFFSET`] units outside the table edge and faces the table.

use crate::types::{Position, Seat, SeatStatus, TableShape, new_record_id};

/// Distance between a table edge and the centre of its seats.
pub const SEAT_OFFSET: f64 = 30.0;

/// Generate `n` unassigned seats for a table of the given shape and size.
pub fn generate_seats(n: u32, shape: TableShape, width: f64, height: f64) -> Vec<Seat> {
    let n = n as usize;
    if n == 0 {
        return Vec::new();
    }
    match shape {
        TableShape::Round => round_seats(n, width),
        TableShape::Rectangular => rectangular_seats(n, width, height),
    }
}

fn seat(x: f64, y: f64, rotation: f64) -> Seat {
    Seat {
        id: new_record_id(),
        position: Position::new(x, y),
        rotation,
        guest_id: None,
        status: SeatStatus::Unassigned,
    }
}

fn round_seats(n: usize, width: f64) -> Vec<Seat> {
    let radius = width / 2.0 + SEAT_OFFSET;
    let step = 360.0 / n as f64;
    (0..n)
        .map(|i| {
            let angle = i as f64 * step;
            let rad = angle.to_radians();
            seat(radius * rad.cos(), radius * rad.sin(), angle % 360.0)
        })
        .collect()
}

/// Per-side seat counts `(top, right, bottom, left)`.
///
/// The longer pair of sides gets a share proportional to its length; the
/// remainder is split over the other pair, and an odd seat goes to the top.
fn side_counts(n: usize, width: f64, height: f64) -> (usize, usize, usize, usize) {
    let (long_len, short_len) = if width >= height {
        (width, height)
    } else {
        (height, width)
    };
    let ratio = if long_len + short_len > 0.0 {
        long_len / (long_len + short_len)
    } else {
        0.5
    };
    let long = ((n as f64 / 2.0 * ratio).ceil() as usize).min(n / 2);
    let short = (n - 2 * long) / 2;
    let (mut top, right, bottom, left) = if width >= height {
        (long, short, long, short)
    } else {
        (short, long, short, long)
    };
    while top + right + bottom + left < n {
        top += 1;
    }
    (top, right, bottom, left)
}

fn rectangular_seats(n: usize, width: f64, height: f64) -> Vec<Seat> {
    let (top, right, bottom, left) = side_counts(n, width, height);
    let (hw, hh) = (width / 2.0, height / 2.0);
    let mut seats = Vec::with_capacity(n);

    for i in 0..top {
        let x = -hw + width / (top + 1) as f64 * (i + 1) as f64;
        seats.push(seat(x, -hh - SEAT_OFFSET, 0.0));
    }
    for i in 0..right {
        let y = -hh + height / (right + 1) as f64 * (i + 1) as f64;
        seats.push(seat(hw + SEAT_OFFSET, y, 90.0));
    }
    for i in 0..bottom {
        let x = hw - width / (bottom + 1) as f64 * (i + 1) as f64;
        seats.push(seat(x, hh + SEAT_OFFSET, 180.0));
    }
    for i in 0..left {
        let y = hh - height / (left + 1) as f64 * (i + 1) as f64;
        seats.push(seat(-hw - SEAT_OFFSET, y, 270.0));
    }
    seats
}
