// Readers for the polling place roster.

use std::collections::BTreeMap;

use calamine::{open_workbook, Reader, Xlsx};
use log::{debug, info};
use serde::Deserialize;
use snafu::prelude::*;

use precinct_ranges::WardPrecinct;

use crate::book::{
    BookResult, BookSettings, EmptyExcelSnafu, OpeningCsvSnafu, OpeningExcelSnafu,
    ParsingCsvSnafu, PollKey, PollKeyMode, PollRoster,
};

/// One roster row, with the column names used on the open data portal.
#[derive(Debug, Clone, Deserialize)]
pub struct PollRow {
    #[serde(rename = "USER_Ward")]
    pub ward: String,
    #[serde(rename = "USER_Precinct")]
    pub precinct: String,
    #[serde(rename = "USER_Location2", default)]
    pub location2: String,
    #[serde(rename = "USER_Location3", default)]
    pub location3: String,
    #[serde(rename = "Match_addr", default)]
    pub match_addr: String,
}

pub fn read_polling_places(settings: &BookSettings) -> BookResult<PollRoster> {
    info!(
        "Attempting to read polling place roster {:?}",
        settings.polls_file
    );
    let rows = match settings.polls_provider.as_str() {
        "csv" => read_csv_roster(&settings.polls_file)?,
        "xlsx" => read_excel_roster(&settings.polls_file)?,
        x => {
            whatever!("Roster provider not implemented {:?}", x)
        }
    };
    assemble_roster(&rows, settings)
}

fn read_csv_roster(path: &str) -> BookResult<Vec<PollRow>> {
    let rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    let mut res: Vec<PollRow> = Vec::new();
    for row in rdr.into_deserialize::<PollRow>() {
        let row = row.context(ParsingCsvSnafu { path })?;
        debug!("roster row: {:?}", row);
        res.push(row);
    }
    Ok(res)
}

fn read_excel_roster(path: &str) -> BookResult<Vec<PollRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu {})?
        .context(OpeningExcelSnafu { path })?;

    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu {})?;
    debug!("header: {:?}", header);
    let col = |name: &str| -> BookResult<usize> {
        header
            .iter()
            .position(|c| matches!(c, calamine::DataType::String(s) if s == name))
            .with_whatever_context(|| format!("Roster column {} not found", name))
    };
    let ward_idx = col("USER_Ward")?;
    let precinct_idx = col("USER_Precinct")?;
    let location2_idx = col("USER_Location2")?;
    let location3_idx = col("USER_Location3")?;
    let match_addr_idx = col("Match_addr")?;

    let mut res: Vec<PollRow> = Vec::new();
    for row in rows {
        debug!("roster row: {:?}", row);
        res.push(PollRow {
            ward: cell_string(row.get(ward_idx)),
            precinct: cell_string(row.get(precinct_idx)),
            location2: cell_string(row.get(location2_idx)),
            location3: cell_string(row.get(location3_idx)),
            match_addr: cell_string(row.get(match_addr_idx)),
        });
    }
    Ok(res)
}

fn cell_string(cell: Option<&calamine::DataType>) -> String {
    match cell {
        Some(calamine::DataType::String(s)) => s.trim().to_string(),
        Some(calamine::DataType::Float(f)) => format!("{}", f),
        Some(calamine::DataType::Int(i)) => format!("{}", i),
        _ => String::new(),
    }
}

/// Derives poll keys and display names, applying the roster fix-ups.
fn assemble_roster(rows: &[PollRow], settings: &BookSettings) -> BookResult<PollRoster> {
    let mut polls: BTreeMap<WardPrecinct, PollKey> = BTreeMap::new();
    let mut names: BTreeMap<PollKey, String> = BTreeMap::new();
    for row in rows.iter() {
        let ward = row
            .ward
            .parse::<u32>()
            .ok()
            .with_whatever_context(|| format!("Roster row has bad ward {:?}", row.ward))?;
        let precinct = row
            .precinct
            .parse::<u32>()
            .ok()
            .with_whatever_context(|| format!("Roster row has bad precinct {:?}", row.precinct))?;
        let wp = WardPrecinct { ward, precinct };
        let location2 = settings
            .fixes
            .location_names
            .get(&wp)
            .cloned()
            .unwrap_or_else(|| row.location2.clone());
        let (key, name) = match settings.poll_key {
            PollKeyMode::Address => {
                let key = settings
                    .fixes
                    .match_addresses
                    .get(&wp)
                    .cloned()
                    .unwrap_or_else(|| row.match_addr.clone());
                (key, location2)
            }
            PollKeyMode::Location => {
                let location3 = settings
                    .fixes
                    .location_details
                    .get(&wp)
                    .cloned()
                    .unwrap_or_else(|| row.location3.clone());
                (format!("{} ({})", location2, location3), location2)
            }
        };
        polls.insert(wp, key.clone());
        names.insert(key, name);
    }
    Ok(PollRoster { polls, names })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::test_settings;
    use std::io::Write;

    fn roster_rows() -> Vec<PollRow> {
        vec![
            PollRow {
                ward: "1".to_string(),
                precinct: "1".to_string(),
                location2: "LIBRARY".to_string(),
                location3: "1 MAIN ST".to_string(),
                match_addr: "1 Main Street, 02100".to_string(),
            },
            PollRow {
                ward: "1".to_string(),
                precinct: "2".to_string(),
                location2: "LIBRARY".to_string(),
                location3: "1 MAIN ST".to_string(),
                match_addr: "1 Main Street, 02100".to_string(),
            },
            PollRow {
                ward: "2".to_string(),
                precinct: "1".to_string(),
                location2: "SCHOOL".to_string(),
                location3: "2 ELM ST".to_string(),
                match_addr: "2 Elm Street, 02101".to_string(),
            },
        ]
    }

    #[test]
    fn location_mode_combines_both_fields() {
        let settings = test_settings();
        let roster = assemble_roster(&roster_rows(), &settings).unwrap();
        assert_eq!(
            roster
                .polls
                .get(&WardPrecinct { ward: 1, precinct: 2 })
                .map(|s| s.as_str()),
            Some("LIBRARY (1 MAIN ST)")
        );
        // Two precincts, one polling place.
        assert_eq!(roster.polls.len(), 3);
        assert_eq!(roster.names.len(), 2);
        assert_eq!(
            roster.names.get("LIBRARY (1 MAIN ST)").map(|s| s.as_str()),
            Some("LIBRARY")
        );
    }

    #[test]
    fn address_mode_uses_the_match_address() {
        let mut settings = test_settings();
        settings.poll_key = PollKeyMode::Address;
        let roster = assemble_roster(&roster_rows(), &settings).unwrap();
        assert_eq!(
            roster
                .polls
                .get(&WardPrecinct { ward: 2, precinct: 1 })
                .map(|s| s.as_str()),
            Some("2 Elm Street, 02101")
        );
    }

    #[test]
    fn location_detail_fix_overrides_the_roster() {
        let mut settings = test_settings();
        settings.fixes.location_details.insert(
            WardPrecinct { ward: 2, precinct: 1 },
            "2A ELM ST".to_string(),
        );
        let roster = assemble_roster(&roster_rows(), &settings).unwrap();
        assert_eq!(
            roster
                .polls
                .get(&WardPrecinct { ward: 2, precinct: 1 })
                .map(|s| s.as_str()),
            Some("SCHOOL (2A ELM ST)")
        );
    }

    #[test]
    fn csv_roster_reads_and_trims() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "USER_Ward,USER_Precinct,USER_Location2,USER_Location3,Match_addr"
        )
        .unwrap();
        writeln!(file, "1,1, LIBRARY ,1 MAIN ST,\"1 Main Street, 02100\"").unwrap();
        let rows = read_csv_roster(file.path().to_str().unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location2, "LIBRARY");
        assert_eq!(rows[0].match_addr, "1 Main Street, 02100");
    }
}
