//! Timestamp parsing for operator-supplied date filters
//!
//! Operators type dates into report forms, so both full RFC 3339 timestamps and
//! bare calendar dates are accepted. A bare date resolves to midnight UTC when
//! it opens a range and to the last instant of that day when it closes one.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::{AdmissionsError, Result};

/// Which side of a range a bare date is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Start,
    End,
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date
pub fn parse_timestamp(value: &str, bound: RangeBound) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        AdmissionsError::InvalidTimestamp {
            value: value.to_string(),
        }
    })?;

    let start_of_day = date.and_time(NaiveTime::default()).and_utc();
    match bound {
        RangeBound::Start => Ok(start_of_day),
        // Dates at the edge of the representable range have no end of day
        RangeBound::End => start_of_day
            .checked_add_signed(Duration::days(1))
            .and_then(|next| next.checked_sub_signed(Duration::milliseconds(1)))
            .ok_or_else(|| AdmissionsError::InvalidTimestamp {
                value: value.to_string(),
            }),
    }
}

/// Parse an optional `[start, end]` pair and reject inverted ranges
pub fn parse_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let start = start
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_timestamp(s, RangeBound::Start))
        .transpose()?;
    let end = end
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_timestamp(s, RangeBound::End))
        .transpose()?;

    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(AdmissionsError::InvalidRange {
                start: s.to_rfc3339(),
                end: e.to_rfc3339(),
            });
        }
    }

    Ok((start, end))
}
