use crate::log::row::{Io, LogRecord};
use crate::spec::ClusterAddr;

use anyhow::Context;
use regex::Regex;

/// Full line layout written by the simulator:
///
/// timestamp:<secs.frac> ,cluster_id:chip:<n>;die:<n>;quad:<n>;row:<n>;col:<n> ,area:<text>,unit:<text>,in/out:<in|out>,tid:<n>,packet/data:<text>
///
/// Example:
/// timestamp:1700000000.25 ,cluster_id:chip:0;die:1;quad:2;row:3;col:4 ,area:hbm,unit:hbm,in/out:in,tid:7,packet/data:rd 0x40
const LOG_LINE_RE: &str = r#"^timestamp:(\d+(?:\.\d+)?)\s*,cluster_id:chip:(-?\d+);die:(-?\d+);quad:(-?\d+);row:(-?\d+);col:(-?\d+)\s*,area:(.*?),unit:(.*?),in/out:(in|out),tid:(\d+),packet/data:(.*)$"#;

/// Compiled line matcher. Build once per scan and reuse across lines.
pub struct LineParser {
    re: Regex,
}

impl LineParser {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            re: Regex::new(LOG_LINE_RE)?,
        })
    }

    /// Parse one line. `Ok(None)` means the line is not a log record (header,
    /// blank, truncated); `Err` means it looked like a record but a numeric
    /// field could not be decoded.
    pub fn parse_line(&self, line: &str) -> anyhow::Result<Option<LogRecord>> {
        let line = line.trim_end_matches(['\r', '\n']);
        let caps = match self.re.captures(line) {
            Some(c) => c,
            None => return Ok(None),
        };

        // All groups are mandatory in the pattern, so indexing cannot miss.
        let secs: f64 = caps[1]
            .parse()
            .with_context(|| format!("bad timestamp {:?}", &caps[1]))?;
        let int = |idx: usize, field: &str| -> anyhow::Result<i32> {
            caps[idx]
                .parse::<i32>()
                .with_context(|| format!("bad {} {:?}", field, &caps[idx]))
        };

        let cluster_id = ClusterAddr::new(
            int(2, "chip")?,
            int(3, "die")?,
            int(4, "quad")?,
            int(5, "row")?,
            int(6, "col")?,
        );
        let io: Io = caps[9].parse().map_err(anyhow::Error::msg)?;
        let tid: u32 = caps[10]
            .parse()
            .with_context(|| format!("bad tid {:?}", &caps[10]))?;

        Ok(Some(LogRecord {
            timestamp: secs as i64,
            cluster_id,
            area: caps[7].to_string(),
            unit: caps[8].to_string(),
            io,
            tid,
            packet: caps[11].to_string(),
        }))
    }
}

/// Render a record back into the line layout above.
pub fn format_line(record: &LogRecord) -> String {
    format!(
        "timestamp:{} ,cluster_id:{} ,area:{},unit:{},in/out:{},tid:{},packet/data:{}",
        record.timestamp,
        record.cluster_id,
        record.area,
        record.unit,
        record.io,
        record.tid,
        record.packet
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_line() {
        let parser = LineParser::new().unwrap();
        let rec = parser
            .parse_line("timestamp:1700000000.75 ,cluster_id:chip:0;die:1;quad:2;row:-1;col:4 ,area:mcu gate 0,unit:eq;2,in/out:out,tid:42,packet/data:wr 0x10, len 4")
            .unwrap()
            .unwrap();

        assert_eq!(
            rec,
            LogRecord {
                timestamp: 1_700_000_000,
                cluster_id: ClusterAddr::new(0, 1, 2, -1, 4),
                area: "mcu gate 0".to_string(),
                unit: "eq;2".to_string(),
                io: Io::Out,
                tid: 42,
                packet: "wr 0x10, len 4".to_string(),
            }
        );
    }

    #[test]
    fn non_record_lines_are_skipped() {
        let parser = LineParser::new().unwrap();
        assert_eq!(parser.parse_line("").unwrap(), None);
        assert_eq!(parser.parse_line("timestamp,cluster_id,area").unwrap(), None);
        assert_eq!(
            parser
                .parse_line("timestamp:1 ,cluster_id:chip:0;die:0;quad:0;row:0;col:0 ,area:hbm,unit:hbm,in/out:both,tid:1,packet/data:x")
                .unwrap(),
            None
        );
    }

    #[test]
    fn overflowing_field_is_an_error() {
        let parser = LineParser::new().unwrap();
        let line = "timestamp:1 ,cluster_id:chip:0;die:99999999999;quad:0;row:0;col:0 ,area:hbm,unit:hbm,in/out:in,tid:1,packet/data:x";
        assert!(parser.parse_line(line).is_err());
    }

    #[test]
    fn format_line_is_parseable() {
        let parser = LineParser::new().unwrap();
        let rec = LogRecord {
            timestamp: 12,
            cluster_id: ClusterAddr::new(0, 0, 3, 7, 7),
            area: "nfi".to_string(),
            unit: "lnb".to_string(),
            io: Io::In,
            tid: 3,
            packet: "p".to_string(),
        };
        assert_eq!(parser.parse_line(&format_line(&rec)).unwrap(), Some(rec));
    }
}
