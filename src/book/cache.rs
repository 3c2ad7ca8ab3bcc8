// Snapshot of the preprocessed data, to skip dataset parsing on repeated
// runs. The snapshot is not invalidated automatically; delete it (or pass
// --no-cache-read) after changing data files or the poll key mode.

use std::fs;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::book::{BookResult, OpeningFileSnafu, ParsingJsonSnafu};

/// One address resolved all the way to its polling place.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollAssignment {
    pub poll: String,
    pub number: u32,
    pub street: String,
    pub zip: String,
    pub ward: u32,
    pub precinct: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessedData {
    #[serde(rename = "pollNames")]
    pub poll_names: Vec<(String, String)>,
    pub assignments: Vec<PollAssignment>,
}

/// A missing snapshot is not an error: the caller falls back to parsing the
/// datasets.
pub fn read_snapshot(path: &str) -> BookResult<Option<PreprocessedData>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context(OpeningFileSnafu { path }),
    };
    let data: PreprocessedData = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read snapshot with {} assignments", data.assignments.len());
    Ok(Some(data))
}

pub fn write_snapshot(path: &str, data: &PreprocessedData) -> BookResult<()> {
    let contents = serde_json::to_string(data).context(ParsingJsonSnafu {})?;
    fs::write(path, contents).context(OpeningFileSnafu { path })?;
    info!("Wrote preprocessed data to {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PreprocessedData {
        PreprocessedData {
            poll_names: vec![("LIBRARY (1 MAIN ST)".to_string(), "LIBRARY".to_string())],
            assignments: vec![PollAssignment {
                poll: "LIBRARY (1 MAIN ST)".to_string(),
                number: 9,
                street: "Appleton St".to_string(),
                zip: "02116".to_string(),
                ward: 5,
                precinct: 14,
            }],
        }
    }

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preprocessed.json");
        let path = path.to_str().unwrap();
        let data = sample();
        write_snapshot(path, &data).unwrap();
        let read = read_snapshot(path).unwrap();
        assert_eq!(read, Some(data));
    }

    #[test]
    fn missing_snapshot_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert_eq!(read_snapshot(path.to_str().unwrap()).unwrap(), None);
    }
}
