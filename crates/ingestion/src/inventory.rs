//! `.idx` sidecar inventories published next to each GRIB2 object.
//!
//! Line format: `line:offset:d=YYYYMMDDHH:VAR:LEVEL:FORECAST:`

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use forecast_common::{ForecastError, ForecastResult};

/// One message listed in an inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxEntry {
    pub message: u32,
    /// Byte offset of the message in the GRIB2 object
    pub offset: u64,
    /// Last byte of the message; `None` for the final message
    pub end: Option<u64>,
    pub reference_time: DateTime<Utc>,
    pub variable: String,
    pub level: String,
    pub forecast: String,
}

impl IdxEntry {
    /// `VAR:LEVEL`, the form used for catalog matching.
    pub fn description(&self) -> String {
        format!("{}:{}", self.variable, self.level)
    }

    /// HTTP `Range` value covering this message, as listed by `inventory`.
    pub fn byte_range(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.offset, end),
            None => format!("bytes={}-", self.offset),
        }
    }
}

/// Parse inventory text. Blank lines are ignored.
pub fn parse_idx(text: &str) -> ForecastResult<Vec<IdxEntry>> {
    let mut entries: Vec<IdxEntry> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let invalid = |what: &str| {
            ForecastError::InvalidConfig(format!("idx line {}: {} in {:?}", line_no + 1, what, line))
        };

        let parts: Vec<&str> = line.splitn(7, ':').collect();
        if parts.len() < 6 {
            return Err(invalid("expected at least 6 fields"));
        }

        let message = parts[0].parse().map_err(|_| invalid("bad message number"))?;
        let offset = parts[1].parse().map_err(|_| invalid("bad byte offset"))?;
        let stamp = parts[2]
            .strip_prefix("d=")
            .ok_or_else(|| invalid("missing d= reference time"))?;
        let reference_time = NaiveDateTime::parse_from_str(&format!("{}00", stamp), "%Y%m%d%H%M")
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|_| invalid("bad reference time"))?;

        if let Some(previous) = entries.last_mut() {
            if offset <= previous.offset {
                return Err(invalid("offsets must increase"));
            }
            previous.end = Some(offset - 1);
        }

        entries.push(IdxEntry {
            message,
            offset,
            end: None,
            reference_time,
            variable: parts[3].to_string(),
            level: parts[4].to_string(),
            forecast: parts[5].to_string(),
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
1:0:d=2025010106:REFC:entire atmosphere:anl:
2:420381:d=2025010106:PRES:surface:anl:
3:1372310:d=2025010106:TMP:2 m above ground:anl:
4:2251114:d=2025010106:UGRD:80 m above ground:anl:
";

    #[test]
    fn test_parse_sample() {
        let entries = parse_idx(SAMPLE).unwrap();
        assert_eq!(entries.len(), 4);

        assert_eq!(entries[1].message, 2);
        assert_eq!(entries[1].description(), "PRES:surface");
        assert_eq!(entries[1].byte_range(), "bytes=420381-1372309");
        assert_eq!(entries[1].forecast, "anl");
        assert_eq!(
            entries[1].reference_time.to_rfc3339(),
            "2025-01-01T06:00:00+00:00"
        );

        assert_eq!(entries[3].end, None);
        assert_eq!(entries[3].byte_range(), "bytes=2251114-");
    }

    #[test]
    fn test_forecast_descriptions_keep_spaces() {
        let entries =
            parse_idx("1:0:d=2025010106:APCP:surface:0-1 hour acc fcst:\n").unwrap();
        assert_eq!(entries[0].forecast, "0-1 hour acc fcst");
    }

    #[test]
    fn test_blank_lines_ignored() {
        assert!(parse_idx("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(parse_idx("1:0:PRES:surface\n").is_err());
        assert!(parse_idx("x:0:d=2025010106:PRES:surface:anl:\n").is_err());
        assert!(parse_idx("1:0:2025010106:PRES:surface:anl:\n").is_err());
        assert!(parse_idx(
            "1:50:d=2025010106:PRES:surface:anl:\n2:10:d=2025010106:TMP:surface:anl:\n"
        )
        .is_err());
    }
}
