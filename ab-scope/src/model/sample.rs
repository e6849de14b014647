use thiserror::Error;

/// Number of tab-separated fields in one `ab -g` log line.
pub const AB_FIELDS: usize = 6;

/// One completed request as reported by the load generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub marker: String,
    pub active_threads: u32,
    pub overall_response_time: i64,
    pub http_status_code: u16,
    pub network_code: i32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub connect_time: i64,
    pub send_time: i64,
    pub latency: i64,
    pub receive_time: i64,
    /// Reserved, always 0 for ab.
    pub accuracy_flag: i32,
}

/// Why a log line was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {AB_FIELDS} tab-separated fields, got {0}")]
    FieldCount(usize),
    #[error("field `{field}` is not an integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },
    #[error("receive time {total} - {connect} - {wait} overflows")]
    Overflow { total: i64, connect: i64, wait: i64 },
}

/// A record together with the unix second it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSample {
    pub second: i64,
    pub record: SampleRecord,
}

/// Parses one `ab -g` data line:
///
/// `{human time}\t{unix time}\t{connect}\t{processing}\t{total}\t{wait}`
///
/// The processing column is checked but not used. Concurrency and marker come
/// from the run parameters, not from the line.
pub fn parse_ab_line(line: &str, active_threads: u32, marker: &str) -> Result<ParsedSample, ParseError> {
    let fields: Vec<&str> = line.trim().split('\t').collect();
    if fields.len() != AB_FIELDS {
        return Err(ParseError::FieldCount(fields.len()));
    }

    let second = int_field("seconds", fields[1])?;
    let connect = int_field("ctime", fields[2])?;
    let _processing = int_field("dtime", fields[3])?;
    let total = int_field("ttime", fields[4])?;
    let wait = int_field("wait", fields[5])?;
    let receive = total
        .checked_sub(connect)
        .and_then(|v| v.checked_sub(wait))
        .ok_or(ParseError::Overflow {
            total,
            connect,
            wait,
        })?;

    Ok(ParsedSample {
        second,
        record: SampleRecord {
            marker: marker.to_string(),
            active_threads,
            overall_response_time: total,
            http_status_code: 0,
            network_code: 0,
            bytes_sent: 0,
            bytes_received: 0,
            connect_time: connect,
            send_time: 0,
            latency: wait,
            receive_time: receive,
            accuracy_flag: 0,
        },
    })
}

fn int_field(field: &'static str, value: &str) -> Result<i64, ParseError> {
    value.trim().parse().map_err(|_| ParseError::NotAnInteger {
        field,
        value: value.to_string(),
    })
}
