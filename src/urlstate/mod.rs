//! Shareable-URL view state.
//!
//! The map view is encoded as a `zoom/lat/lng` fragment with the center
//! rounded to the zoom's precision, so copied URLs carry no spurious digits.
//! Named parameters (the dropped marker, enabled layers) ride along as
//! `key=value` pairs. Parsing is total: malformed input yields no state
//! rather than an error.

use crate::geo::{round_position, LngLat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current map view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub center: LngLat,
    pub zoom: f64,
}

/// Typed map events. Controls consume these through an explicit dispatch
/// instead of binding themselves to DOM callbacks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MapEvent {
    Move(LngLat),
    Zoom(f64),
}

/// The URL fragment: view position plus named parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct UrlState {
    view: ViewState,
    params: BTreeMap<String, String>,
}

impl UrlState {
    pub fn new(view: ViewState) -> Self {
        Self {
            view,
            params: BTreeMap::new(),
        }
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn apply_event(&mut self, event: MapEvent) {
        match event {
            MapEvent::Move(center) => self.view.center = center,
            MapEvent::Zoom(zoom) => self.view.zoom = zoom,
        }
    }

    /// Set or clear a named parameter.
    pub fn set_param(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.params.insert(key.to_string(), value);
            }
            None => {
                self.params.remove(key);
            }
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Store the dropped-marker position, rounded for the current zoom.
    pub fn set_marker(&mut self, position: Option<LngLat>) {
        let value = position.map(|pos| {
            let rounded = round_position(pos, self.view.zoom);
            format!("{},{}", rounded.lat, rounded.lng)
        });
        self.set_param("m", value);
    }

    /// The dropped-marker position, if one is set and well-formed.
    pub fn marker(&self) -> Option<LngLat> {
        parse_marker(self.param("m")?)
    }

    /// Encode as a fragment: `zoom/lat/lng` then `&key=value` pairs.
    pub fn fragment(&self) -> String {
        let center = round_position(self.view.center, self.view.zoom);
        let mut fragment = format!(
            "{}/{}/{}",
            format_zoom(self.view.zoom),
            center.lat,
            center.lng
        );
        for (key, value) in &self.params {
            fragment.push('&');
            fragment.push_str(key);
            fragment.push('=');
            fragment.push_str(value);
        }
        fragment
    }

    /// Decode a fragment (with or without the leading `#`).
    pub fn parse(fragment: &str) -> Option<Self> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let mut parts = fragment.split('&');

        let view_part = parts.next()?;
        let mut fields = view_part.split('/');
        let zoom: f64 = fields.next()?.parse().ok()?;
        let lat: f64 = fields.next()?.parse().ok()?;
        let lng: f64 = fields.next()?.parse().ok()?;
        if !zoom.is_finite() || !lat.is_finite() || !lng.is_finite() {
            return None;
        }

        let mut params = BTreeMap::new();
        for pair in parts {
            let (key, value) = pair.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            params.insert(key.to_string(), value.to_string());
        }

        Some(Self {
            view: ViewState {
                center: LngLat::new(lng, lat),
                zoom,
            },
            params,
        })
    }
}

fn format_zoom(zoom: f64) -> String {
    let rounded = (zoom * 100.0).round() / 100.0;
    format!("{}", rounded)
}

// Marker values are `lat,lng`. Zero coordinates are treated as unset.
fn parse_marker(value: &str) -> Option<LngLat> {
    let (lat, lng) = value.split_once(',')?;
    let lat: f64 = lat.parse().ok()?;
    let lng: f64 = lng.parse().ok()?;
    if !lat.is_finite() || !lng.is_finite() || lat == 0.0 || lng == 0.0 {
        return None;
    }
    Some(LngLat::new(lng, lat))
}
