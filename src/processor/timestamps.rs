//! Timestamp detection and timezone conversion.
//!
//! Candidates are found with the configured patterns, parsed against an
//! ordered list of strftime-style templates, shifted from the source zone to
//! the target zone and rendered back through the template that matched, so
//! the output keeps the input's shape.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::config::{TimestampConfig, TimezoneConfig};

/// Tried in order; the first template that matches the whole candidate wins.
/// Day-first and month-first orders overlap, and nothing here disambiguates.
const TEMPLATES: &[&str] = &[
    "%H:%M:%S",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%y %H:%M",
    "%d/%m/%y %H:%M:%S",
    "%d-%m-%y %H:%M",
    "%d-%m-%y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m-%d-%Y %H:%M",
    "%m-%d-%Y %H:%M:%S",
    "%d/%m/%Y %I:%M %p",
    "%d/%m/%Y %I:%M:%S %p",
    "%d-%m-%Y %I:%M %p",
    "%d-%m-%Y %I:%M:%S %p",
    "%Y/%m/%d %I:%M %p",
    "%Y/%m/%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%Y-%m-%d %I:%M:%S %p",
    "%d/%m/%y %I:%M %p",
    "%d/%m/%y %I:%M:%S %p",
    "%d-%m-%y %I:%M %p",
    "%d-%m-%y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m-%d-%Y %I:%M %p",
    "%m-%d-%Y %I:%M:%S %p",
];

/// A parsed candidate. `date` is `None` for time-only templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Parsed {
    date: Option<NaiveDate>,
    time: NaiveTime,
}

/// One template, compiled into an anchored matcher with a named group per
/// field.
#[derive(Debug)]
struct TimestampFormat {
    template: &'static str,
    shape: Regex,
}

impl TimestampFormat {
    fn compile(template: &'static str) -> Result<Self> {
        let mut pattern = String::from("^");
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            match c {
                '%' => {
                    let field = chars
                        .next()
                        .with_context(|| format!("Dangling '%' in template {}", template))?;
                    let group = match field {
                        'd' => r"(?P<d>\d{1,2})",
                        'm' => r"(?P<m>\d{1,2})",
                        'Y' => r"(?P<Y>\d{4})",
                        'y' => r"(?P<y>\d{2})",
                        'H' => r"(?P<H>\d{1,2})",
                        'I' => r"(?P<I>\d{1,2})",
                        'M' => r"(?P<M>\d{1,2})",
                        'S' => r"(?P<S>\d{1,2})",
                        'p' => r"(?P<p>(?i:am|pm))",
                        other => anyhow::bail!("Unsupported field %{} in {}", other, template),
                    };
                    pattern.push_str(group);
                }
                c if c.is_whitespace() => pattern.push_str(r"\s+"),
                c => pattern.push_str(&regex::escape(&c.to_string())),
            }
        }
        pattern.push('$');

        let shape = Regex::new(&pattern)
            .with_context(|| format!("Failed to compile template {}", template))?;
        Ok(Self { template, shape })
    }

    fn parse(&self, candidate: &str) -> Option<Parsed> {
        let caps = self.shape.captures(candidate)?;
        let field = |name: &str| -> Option<u32> { caps.name(name)?.as_str().parse().ok() };

        let time = parse_time(&caps, field("M")?, field("S").unwrap_or(0))?;
        let date = match (field("d"), field("m")) {
            (Some(day), Some(month)) => {
                let year = year_of(&caps)?;
                Some(NaiveDate::from_ymd_opt(year, month, day)?)
            }
            _ => None,
        };
        Some(Parsed { date, time })
    }
}

fn parse_time(caps: &Captures<'_>, minute: u32, second: u32) -> Option<NaiveTime> {
    if let Some(hour) = caps.name("H") {
        let hour: u32 = hour.as_str().parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minute, second);
    }

    let hour: u32 = caps.name("I")?.as_str().parse().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = caps
        .name("p")
        .is_some_and(|p| p.as_str().eq_ignore_ascii_case("pm"));
    let hour = hour % 12 + if pm { 12 } else { 0 };
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Four-digit years are taken as-is; two-digit years 69-99 land in the 1900s
/// and 00-68 in the 2000s.
fn year_of(caps: &Captures<'_>) -> Option<i32> {
    if let Some(year) = caps.name("Y") {
        return year.as_str().parse().ok();
    }
    let short: i32 = caps.name("y")?.as_str().parse().ok()?;
    Some(if short >= 69 { 1900 + short } else { 2000 + short })
}

/// Rewrites timestamps from one zone into another.
#[derive(Debug)]
pub struct TimestampConverter {
    source: Tz,
    target: Tz,
    primary: Regex,
    fallbacks: Vec<Regex>,
    formats: Vec<TimestampFormat>,
}

impl TimestampConverter {
    pub fn new(zones: &TimezoneConfig, patterns: &TimestampConfig) -> Result<Self> {
        let source = parse_zone(&zones.source)?;
        let target = parse_zone(&zones.target)?;

        let primary = Regex::new(&patterns.primary_pattern).with_context(|| {
            format!("Invalid primary timestamp pattern: {}", patterns.primary_pattern)
        })?;
        let fallbacks = patterns
            .fallback_patterns
            .iter()
            .map(|p| {
                Regex::new(p).with_context(|| format!("Invalid fallback timestamp pattern: {}", p))
            })
            .collect::<Result<Vec<_>>>()?;
        let formats = TEMPLATES
            .iter()
            .copied()
            .map(TimestampFormat::compile)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source,
            target,
            primary,
            fallbacks,
            formats,
        })
    }

    pub fn convert(&self, text: &str) -> String {
        self.convert_at(text, Utc::now())
    }

    /// Like [`convert`](Self::convert), with "today" for time-only
    /// timestamps taken from `now` in the source zone.
    pub fn convert_at(&self, text: &str, now: DateTime<Utc>) -> String {
        if text.is_empty() {
            return text.to_string();
        }

        let candidates = self.find_candidates(text);
        debug!("Found {} timestamp candidate(s)", candidates.len());

        let mut modified = text.to_string();
        for candidate in candidates {
            match self.convert_one(candidate, now) {
                Some(rendered) => {
                    // first literal occurrence only, which may not be the
                    // occurrence that was matched when the same text repeats
                    modified = modified.replacen(candidate, &rendered, 1);
                    info!("Converted timestamp: '{}' -> '{}'", candidate, rendered);
                }
                None => warn!("Could not parse timestamp: '{}'", candidate),
            }
        }
        modified
    }

    /// Primary matches, or else the matches of the first fallback pattern
    /// that finds anything.
    fn find_candidates<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let primary: Vec<&str> = self.primary.find_iter(text).map(|m| m.as_str()).collect();
        if !primary.is_empty() {
            return primary;
        }

        for (i, pattern) in self.fallbacks.iter().enumerate() {
            let found: Vec<&str> = pattern.find_iter(text).map(|m| m.as_str()).collect();
            if !found.is_empty() {
                debug!("Fallback pattern {} matched {} time(s)", i + 1, found.len());
                return found;
            }
        }
        Vec::new()
    }

    fn convert_one(&self, candidate: &str, now: DateTime<Utc>) -> Option<String> {
        let (format, parsed) = self
            .formats
            .iter()
            .find_map(|f| f.parse(candidate).map(|p| (f, p)))?;

        let date = parsed
            .date
            .unwrap_or_else(|| now.with_timezone(&self.source).date_naive());
        let naive = NaiveDateTime::new(date, parsed.time);

        let Some(local) = self.source.from_local_datetime(&naive).earliest() else {
            warn!(
                "Timestamp '{}' does not exist in {}",
                candidate,
                self.source.name()
            );
            return None;
        };

        let converted = local.with_timezone(&self.target);
        Some(converted.format(format.template).to_string())
    }
}

fn parse_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("Unknown timezone '{}': {}", name, e))
}
