//! Departure-board queries (HAFAS-style endpoint).
//!
//! Fetched on demand when a stop is opened, never polled. Realtime times are
//! compared against the schedule to classify how late a departure runs.

use crate::fetch::{self, FetchError};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Delay still presented as "slightly late".
const SLIGHTLY_LATE_MAX_SECS: i64 = 300;

/// How a departure runs relative to its schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Punctuality {
    /// No realtime data, scheduled time only
    Scheduled,
    OnTime,
    SlightlyLate,
    Late,
    Cancelled,
}

/// One departure from a stop.
#[derive(Clone, Debug)]
pub struct Departure {
    pub name: String,
    pub direction: String,
    pub scheduled: DateTime<Utc>,
    pub realtime: Option<DateTime<Utc>>,
    pub platform: Option<String>,
    pub operator: Option<String>,
    pub notes: Vec<String>,
    pub cancelled: bool,
}

impl Departure {
    /// Realtime delay against the schedule; `None` without realtime data.
    pub fn delay(&self) -> Option<chrono::Duration> {
        self.realtime.map(|rt| rt - self.scheduled)
    }

    pub fn punctuality(&self) -> Punctuality {
        if self.cancelled {
            return Punctuality::Cancelled;
        }
        match self.delay() {
            None => Punctuality::Scheduled,
            Some(delay) if delay.num_seconds() <= 0 => Punctuality::OnTime,
            Some(delay) if delay.num_seconds() <= SLIGHTLY_LATE_MAX_SECS => {
                Punctuality::SlightlyLate
            }
            Some(_) => Punctuality::Late,
        }
    }

    /// The time to display: realtime when present, otherwise scheduled.
    pub fn display_time(&self) -> DateTime<Utc> {
        self.realtime.unwrap_or(self.scheduled)
    }
}

// ── Wire schema ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BoardDocument {
    #[serde(rename = "Departure", default)]
    departures: Vec<RawDeparture>,
}

#[derive(Debug, Deserialize)]
struct RawDeparture {
    #[serde(default)]
    name: String,
    #[serde(default)]
    direction: String,
    date: String,
    time: String,
    #[serde(rename = "rtDate", default)]
    rt_date: Option<String>,
    #[serde(rename = "rtTime", default)]
    rt_time: Option<String>,
    #[serde(rename = "rtPlatform", default)]
    rt_platform: Option<RawPlatform>,
    #[serde(default)]
    cancelled: bool,
    #[serde(rename = "Notes", default)]
    notes: Option<RawNotes>,
    #[serde(rename = "Product", default)]
    products: Vec<RawProduct>,
}

#[derive(Debug, Deserialize)]
struct RawPlatform {
    text: String,
    #[serde(default)]
    hidden: bool,
}

#[derive(Debug, Deserialize)]
struct RawNotes {
    #[serde(rename = "Note", default)]
    notes: Vec<RawNote>,
}

#[derive(Debug, Deserialize)]
struct RawNote {
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    #[serde(rename = "operatorInfo", default)]
    operator_info: Option<RawOperatorInfo>,
}

#[derive(Debug, Deserialize)]
struct RawOperatorInfo {
    name: String,
}

// The endpoint sends local wall-clock times with no offset; they are UTC.
fn parse_timestamp(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

fn parse_departure(raw: RawDeparture) -> Option<Departure> {
    let scheduled = parse_timestamp(&raw.date, &raw.time)?;
    let realtime = raw
        .rt_time
        .as_deref()
        .and_then(|rt_time| parse_timestamp(raw.rt_date.as_deref().unwrap_or(&raw.date), rt_time));

    let platform = raw
        .rt_platform
        .filter(|p| !p.hidden)
        .map(|p| p.text);
    let operator = raw
        .products
        .into_iter()
        .next()
        .and_then(|p| p.operator_info)
        .map(|o| o.name);
    let notes = raw
        .notes
        .map(|n| n.notes.into_iter().map(|note| note.value).collect())
        .unwrap_or_default();

    Some(Departure {
        name: raw.name,
        direction: raw.direction,
        scheduled,
        realtime,
        platform,
        operator,
        notes,
        cancelled: raw.cancelled,
    })
}

/// HTTP client for the departure-board endpoint.
pub struct DepartureBoardClient {
    base_url: String,
    http_client: reqwest::Client,
    deadline: Duration,
}

impl DepartureBoardClient {
    pub fn new(base_url: String, http_client: reqwest::Client, deadline: Duration) -> Self {
        Self {
            base_url,
            http_client,
            deadline,
        }
    }

    /// Fetch departures from a stop over the next `duration_minutes`.
    ///
    /// A departure whose times cannot be parsed is skipped, not fatal to the
    /// board.
    pub async fn fetch_departures(
        &self,
        stop_id: &str,
        duration_minutes: u32,
    ) -> Result<Vec<Departure>, FetchError> {
        let duration = duration_minutes.to_string();
        let request = self
            .http_client
            .get(format!("{}/departureBoard", self.base_url))
            .query(&[
                ("format", "json"),
                ("id", stop_id),
                ("duration", duration.as_str()),
            ]);

        let response = fetch::send_with_timeout(request, self.deadline).await?;
        let doc: BoardDocument = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut departures = Vec::with_capacity(doc.departures.len());
        for raw in doc.departures {
            match parse_departure(raw) {
                Some(departure) => departures.push(departure),
                None => warn!(stop_id = %stop_id, "Skipping departure with unparseable times"),
            }
        }
        Ok(departures)
    }
}
