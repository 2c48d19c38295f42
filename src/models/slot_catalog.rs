use chrono::{NaiveTime, Timelike};
use serde::Serialize;

/// The canonical times of day a resource can be booked at, before
/// availability filtering. Always sorted and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotCatalog {
    times: Vec<NaiveTime>,
}

impl SlotCatalog {
    pub fn new(mut times: Vec<NaiveTime>) -> Self {
        times.sort();
        times.dedup();
        Self { times }
    }

    /// Every `step_minutes` from `open` up to and including `close`.
    pub fn every(open: NaiveTime, close: NaiveTime, step_minutes: u32) -> Self {
        let start = open.hour() * 60 + open.minute();
        let end = close.hour() * 60 + close.minute();
        let step = step_minutes.max(1) as usize;

        let times = (start..=end)
            .step_by(step)
            .filter_map(|m| NaiveTime::from_hms_opt(m / 60, m % 60, 0))
            .collect();
        Self::new(times)
    }

    /// Half-hourly grid offered by the booking pages.
    pub fn booking_ui() -> Self {
        Self::every(hm(8, 0), hm(18, 0), 30)
    }

    /// Hourly grid offered over WhatsApp.
    pub fn whatsapp() -> Self {
        Self::every(hm(9, 0), hm(17, 0), 60)
    }

    /// Parses a comma-separated list such as `"09:00, 10:30"`.
    pub fn parse(list: &str) -> anyhow::Result<Self> {
        let times = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_time)
            .collect::<anyhow::Result<Vec<_>>>()?;
        if times.is_empty() {
            return Err(anyhow::anyhow!("slot catalog is empty"));
        }
        Ok(Self::new(times))
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let raw: Vec<String> = serde_json::from_str(s)?;
        let times = raw
            .iter()
            .map(|t| parse_time(t))
            .collect::<anyhow::Result<Vec<_>>>()?;
        if times.is_empty() {
            return Err(anyhow::anyhow!("slot catalog is empty"));
        }
        Ok(Self::new(times))
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.times.binary_search(&time).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn to_human_readable(&self) -> String {
        self.times
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
}
