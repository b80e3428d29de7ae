//! Extraction of the reported affinity from a docking output file.
//!
//! Result records look like `REMARK VINA RESULT:    -9.5      0.000      0.000`.
//! The tool writes poses best-first, so the first valid record is taken as the
//! best affinity. No minimum is computed over later records.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

pub const RESULT_MARKER: &str = "REMARK VINA RESULT";

/// Token index of the affinity when the line is split on whitespace
/// (`REMARK`, `VINA`, `RESULT:`, affinity, ...).
const AFFINITY_TOKEN: usize = 3;

/// Affinity of a single result line, or `None` if the line is not a well-formed record.
/// `nan` and `inf` count as malformed.
pub fn parse_result_line(line: &str) -> Option<f64> {
    if !line.starts_with(RESULT_MARKER) {
        return None;
    }
    line.split_whitespace()
        .nth(AFFINITY_TOKEN)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// First well-formed record in `content`.
pub fn parse_affinity_text(content: &str) -> Option<f64> {
    content.lines().find_map(parse_result_line)
}

/// Best affinity recorded in the output file at `path`.
///
/// Missing or unreadable files yield `None`; callers that need to tell
/// "no file" from "no score" check for the file first.
pub async fn parse_best_affinity<P: AsRef<Path>>(path: P) -> Option<f64> {
    let path = path.as_ref();
    let file = match File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            debug!("Cannot open docking output {:?}: {}", path, e);
            return None;
        }
    };

    let mut lines = BufReader::new(file).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(affinity) = parse_result_line(&line) {
                    return Some(affinity);
                }
                if line.starts_with(RESULT_MARKER) {
                    debug!("Skipping malformed result record in {:?}: {}", path, line);
                }
            }
            Ok(None) => return None,
            Err(e) => {
                debug!("Read error in docking output {:?}: {}", path, e);
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_single_record() {
        assert_eq!(parse_affinity_text("REMARK VINA RESULT: -9.5 0.0 0.0\n"), Some(-9.5));
    }

    #[test]
    fn test_no_record() {
        assert_eq!(parse_affinity_text("MODEL 1\nATOM      1  C   LIG\nENDMDL\n"), None);
    }

    #[test]
    fn test_first_record_wins_even_if_worse() {
        let content = "MODEL 1\n\
                       REMARK VINA RESULT:    -7.2      0.000      0.000\n\
                       ENDMDL\n\
                       MODEL 2\n\
                       REMARK VINA RESULT:    -9.1      1.204      2.311\n\
                       ENDMDL\n";
        assert_eq!(parse_affinity_text(content), Some(-7.2));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let content = "REMARK VINA RESULT:\n\
                       REMARK VINA RESULT: n/a 0.0 0.0\n\
                       REMARK VINA RESULT: -6.4 0.0 0.0\n";
        assert_eq!(parse_affinity_text(content), Some(-6.4));
    }

    #[test]
    fn test_non_finite_values_are_skipped() {
        assert_eq!(parse_result_line("REMARK VINA RESULT: nan 0.0 0.0"), None);
        assert_eq!(parse_result_line("REMARK VINA RESULT: -inf 0.0 0.0"), None);
        let content = "REMARK VINA RESULT: NaN 0.0 0.0\n\
                       REMARK VINA RESULT: -7.7 0.0 0.0\n";
        assert_eq!(parse_affinity_text(content), Some(-7.7));
    }

    #[test]
    fn test_marker_must_start_the_line() {
        assert_eq!(parse_result_line("  REMARK VINA RESULT: -5.0 0 0"), None);
        assert_eq!(parse_result_line("REMARK VINA RESULT: +1.25 0 0"), Some(1.25));
    }

    #[tokio::test]
    async fn test_parse_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lig_t1_out.pdbqt");
        std::fs::write(&path, "MODEL 1\nREMARK VINA RESULT:    -8.3      0.000      0.000\n").unwrap();
        assert_eq!(parse_best_affinity(&path).await, Some(-8.3));
    }

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let dir = tempdir().unwrap();
        assert_eq!(parse_best_affinity(dir.path().join("nope.pdbqt")).await, None);
    }

    #[tokio::test]
    async fn test_unreadable_content_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("binary.pdbqt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x81]).unwrap();
        assert_eq!(parse_best_affinity(&path).await, None);
    }
}
