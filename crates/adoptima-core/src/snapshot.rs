//! CSV dataset snapshots
//!
//! Header layout: `month,<channel>_spend...,revenue,roi,competitor_activity,season`
//! with months as `YYYY-MM`. Numbers are written in shortest round-trip form
//! so a snapshot reads back to an identical dataset.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Allocation, Channel, Dataset, MonthlyRecord, Season};

const SPEND_SUFFIX: &str = "_spend";

fn header(channels: &[Channel]) -> Vec<String> {
    let mut columns = vec!["month".to_string()];
    columns.extend(channels.iter().map(|c| format!("{}{}", c, SPEND_SUFFIX)));
    columns.extend(
        ["revenue", "roi", "competitor_activity", "season"]
            .iter()
            .map(|s| s.to_string()),
    );
    columns
}

/// Write a dataset as CSV
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(header(dataset.channels()))?;

    for record in dataset.records() {
        let mut row = vec![record.month_label()];
        row.extend(
            dataset
                .channels()
                .iter()
                .map(|c| record.spend(*c).to_string()),
        );
        row.push(record.revenue.to_string());
        row.push(record.roi.to_string());
        row.push(record.competitor_activity.to_string());
        row.push(record.season.as_str().to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Snapshot text of a dataset
pub fn to_csv_string(dataset: &Dataset) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(dataset, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::InvalidData(e.to_string()))
}

pub fn save_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_csv(dataset, file)?;
    debug!(path = %path.display(), rows = dataset.len(), "Saved dataset snapshot");
    Ok(())
}

/// Column positions resolved from a header row
struct Layout {
    month: usize,
    spend: Vec<(Channel, usize)>,
    revenue: usize,
    roi: usize,
    competitor: usize,
    season: usize,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| Error::Import(format!("Missing column: {}", name)))
        };

        let mut spend = Vec::new();
        for (i, h) in headers.iter().enumerate() {
            if let Some(key) = h.trim().strip_suffix(SPEND_SUFFIX) {
                let channel: Channel = key.parse().map_err(Error::Import)?;
                if spend.iter().any(|(c, _)| *c == channel) {
                    return Err(Error::Import(format!("Duplicate column: {}", h)));
                }
                spend.push((channel, i));
            }
        }
        if spend.is_empty() {
            return Err(Error::Import("No *_spend columns found".into()));
        }

        Ok(Self {
            month: find("month")?,
            spend,
            revenue: find("revenue")?,
            roi: find("roi")?,
            competitor: find("competitor_activity")?,
            season: find("season")?,
        })
    }
}

fn field<'r>(record: &'r StringRecord, index: usize, line: u64) -> Result<&'r str> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| Error::Import(format!("Line {}: missing field {}", line, index + 1)))
}

fn number(record: &StringRecord, index: usize, line: u64) -> Result<f64> {
    let raw = field(record, index, line)?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Import(format!("Line {}: invalid number: {}", line, raw)))
}

fn parse_month(s: &str, line: u64) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .map_err(|_| Error::Import(format!("Line {}: invalid month: {} (expected YYYY-MM)", line, s)))
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// Read a CSV snapshot, detecting the channel set from its header
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let layout = Layout::from_headers(&headers)?;

    let mut records: Vec<MonthlyRecord> = Vec::new();
    let mut first_period: Option<NaiveDate> = None;

    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let period = parse_month(field(&record, layout.month, line)?, line)?;
        let origin = *first_period.get_or_insert(period);
        let offset = months_between(origin, period);
        if let Some(previous) = records.last() {
            if offset <= previous.month_index as i64 {
                return Err(Error::Import(format!(
                    "Line {}: month {} is not after {}",
                    line,
                    field(&record, layout.month, line)?,
                    previous.month_label()
                )));
            }
        }

        let mut channel_spend = Allocation::new();
        for (channel, index) in &layout.spend {
            channel_spend.insert(*channel, number(&record, *index, line)?);
        }

        let season_raw = field(&record, layout.season, line)?;
        let season: Season = season_raw
            .parse()
            .map_err(|e: String| Error::Import(format!("Line {}: {}", line, e)))?;

        records.push(MonthlyRecord {
            month_index: offset as u32,
            period,
            channel_spend,
            revenue: number(&record, layout.revenue, line)?,
            roi: number(&record, layout.roi, line)?,
            competitor_activity: number(&record, layout.competitor, line)?,
            season,
        });
    }

    if records.is_empty() {
        return Err(Error::Import("Snapshot has no data rows".into()));
    }

    debug!(rows = records.len(), channels = layout.spend.len(), "Read dataset snapshot");
    Dataset::new(records)
}

pub fn load_csv(path: &Path) -> Result<Dataset> {
    let file = File::open(path)?;
    read_csv(file)
}

/// SHA-256 of the snapshot text, identifying the data a model was trained on
pub fn fingerprint(dataset: &Dataset) -> Result<String> {
    let text = to_csv_string(dataset)?;
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
