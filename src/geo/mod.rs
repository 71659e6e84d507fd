//! Geographic primitives and zoom-dependent coordinate precision.

use serde::{Deserialize, Serialize};

/// Geographic coordinate in degrees (longitude, latitude).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// True when both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }
}

/// Number of decimal digits needed so that rounding error stays below one
/// rendered pixel at the given zoom (512-pixel tiles, 360 degrees of
/// longitude at zoom 0).
///
/// Zoom is rounded to 2 decimal places first — sub-pixel zoom changes must
/// not churn the digit count.
pub fn precision_digits(zoom: f64) -> i32 {
    let zoom = (zoom * 100.0).round() / 100.0;
    ((zoom * std::f64::consts::LN_2 + (512.0_f64 / 360.0).ln()) / std::f64::consts::LN_10).ceil()
        as i32
}

/// Round a coordinate to the precision appropriate for a zoom level.
///
/// Deterministic and idempotent. At very low zoom the digit count reaches
/// zero or below, which still produces a finite (integer or coarser) value.
pub fn round_position(pos: LngLat, zoom: f64) -> LngLat {
    let m = 10.0_f64.powi(precision_digits(zoom));
    LngLat {
        lng: (pos.lng * m).round() / m,
        lat: (pos.lat * m).round() / m,
    }
}
