use crate::error::{Error, Result};

/// Parses the leading `HH:MM:SS[.fraction]` token of `input` into seconds.
///
/// Anything after the first whitespace is ignored, so `"00:01:02.500 [frame 1500]"`
/// parses the same as `"00:01:02.500"`.
pub(crate) fn parse_timecode(input: &str) -> Result<f64> {
    let format_error = |reason| Error::Format {
        input: input.to_owned(),
        reason,
    };

    let token = input
        .split_whitespace()
        .next()
        .ok_or_else(|| format_error("empty input"))?;

    let parts: Vec<&str> = token.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(format_error("expected HH:MM:SS"));
    };

    let hours: u64 = hours.parse().map_err(|_| format_error("bad hours"))?;
    let minutes: u64 = minutes.parse().map_err(|_| format_error("bad minutes"))?;
    let seconds: f64 = seconds
        .parse()
        .ok()
        .filter(|s: &f64| s.is_finite() && s.is_sign_positive())
        .ok_or_else(|| format_error("bad seconds"))?;

    let whole = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes.checked_mul(60)?))
        .ok_or_else(|| format_error("out of range"))?;

    Ok(whole as f64 + seconds)
}

/// Formats seconds as `HH:MM:SS.mmm`.
pub(crate) fn format_timecode(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
