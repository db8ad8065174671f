//! Installed-apps record and its line parser

use crate::error::RecordError;

/// Field separator of the input format
pub const FIELD_DELIMITER: char = '\t';

/// Separator of the app id list
pub const APP_DELIMITER: char = ',';

/// One device's installed applications, as read from a single input line
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Device identifier type (idfa, gaid, ...), selects the backend
    pub dev_type: String,
    pub dev_id: String,
    pub lat: f64,
    pub lon: f64,
    pub apps: Vec<u32>,
}

impl Record {
    /// Backend key: `<dev_type>:<dev_id>`
    pub fn key(&self) -> String {
        format!("{}:{}", self.dev_type, self.dev_id)
    }
}

/// Parse a trimmed line of the form
/// `dev_type \t dev_id \t lat \t lon \t app,app,...`.
///
/// Fields beyond the fifth are ignored. App ids that are not valid unsigned
/// 32-bit integers are dropped without failing the record.
pub fn parse_line(line: &str) -> Result<Record, RecordError> {
    let parts: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if parts.len() < 5 {
        return Err(RecordError::TooFewFields(parts.len()));
    }

    let (dev_type, dev_id) = (parts[0], parts[1]);
    if dev_type.is_empty() || dev_id.is_empty() {
        return Err(RecordError::MissingIdentity);
    }

    let lat = parts[2]
        .trim()
        .parse::<f64>()
        .map_err(|_| RecordError::InvalidLatitude(parts[2].to_string()))?;
    let lon = parts[3]
        .trim()
        .parse::<f64>()
        .map_err(|_| RecordError::InvalidLongitude(parts[3].to_string()))?;

    Ok(Record {
        dev_type: dev_type.to_string(),
        dev_id: dev_id.to_string(),
        lat,
        lon,
        apps: parse_apps(parts[4]),
    })
}

/// Lenient app id list parsing: bad tokens are skipped
pub fn parse_apps(raw: &str) -> Vec<u32> {
    raw.split(APP_DELIMITER)
        .filter_map(|token| token.trim().parse::<u32>().ok())
        .collect()
}
