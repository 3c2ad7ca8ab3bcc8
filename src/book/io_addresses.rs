// Reader for the street address list.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;

use bzip2::read::BzDecoder;
use log::{info, warn};
use serde::Deserialize;
use snafu::prelude::*;

use precinct_ranges::WardPrecinct;

use crate::book::locator::PrecinctResolver;
use crate::book::{AddressKey, BookResult, BookSettings, OpeningFileSnafu, ParsingCsvSnafu};

/// One address list row, with the column names used on the open data portal.
/// A row is either a single address or a numeric range covering one side of
/// a street.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressRow {
    #[serde(rename = "FULL_ADDRESS", default)]
    pub full_address: String,
    #[serde(rename = "MAILING_NEIGHBORHOOD", default)]
    pub mailing_neighborhood: String,
    #[serde(rename = "STREET_NUMBER", default)]
    pub street_number: String,
    #[serde(rename = "IS_RANGE", default)]
    pub is_range: String,
    #[serde(rename = "RANGE_FROM", default)]
    pub range_from: String,
    #[serde(rename = "RANGE_TO", default)]
    pub range_to: String,
    #[serde(rename = "STREET_PREFIX", default)]
    pub street_prefix: String,
    #[serde(rename = "STREET_BODY", default)]
    pub street_body: String,
    #[serde(rename = "STREET_SUFFIX_ABBR", default)]
    pub street_suffix_abbr: String,
    #[serde(rename = "STREET_SUFFIX_DIR", default)]
    pub street_suffix_dir: String,
    #[serde(rename = "ZIP_CODE", default)]
    pub zip_code: String,
    #[serde(rename = "WARD", default)]
    pub ward: String,
    #[serde(rename = "PRECINCT_WARD", default)]
    pub precinct_ward: String,
    #[serde(rename = "SAM_ADDRESS_ID", default)]
    pub sam_address_id: String,
    #[serde(rename = "LONGITUDE", default)]
    pub longitude: String,
    #[serde(rename = "LATITUDE", default)]
    pub latitude: String,
}

pub fn read_addresses(
    settings: &BookSettings,
    resolver: &PrecinctResolver,
) -> BookResult<BTreeMap<AddressKey, WardPrecinct>> {
    let path = &settings.addresses_file;
    info!("Attempting to read address list {:?}", path);
    let file = File::open(path).context(OpeningFileSnafu { path: path.clone() })?;
    let reader: Box<dyn Read> = if path.ends_with(".bz2") {
        Box::new(BzDecoder::new(file))
    } else {
        Box::new(file)
    };
    read_from_reader(reader, path, settings, resolver)
}

pub fn read_from_reader<R: Read>(
    reader: R,
    path: &str,
    settings: &BookSettings,
    resolver: &PrecinctResolver,
) -> BookResult<BTreeMap<AddressKey, WardPrecinct>> {
    let rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut addresses: BTreeMap<AddressKey, WardPrecinct> = BTreeMap::new();
    // A range row can start and end in different precincts but carries only
    // one, so plain rows are preferred over range rows on a conflict.
    let mut range_keys: BTreeSet<AddressKey> = BTreeSet::new();
    let mut ids: HashMap<AddressKey, String> = HashMap::new();
    for row in rdr.into_deserialize::<AddressRow>() {
        let row = row.context(ParsingCsvSnafu { path })?;
        let error_key = format!("{} ({})", row.full_address, row.mailing_neighborhood);
        let wp = match resolver.resolve(&row, &error_key) {
            Some(wp) => wp,
            None => continue,
        };
        let is_range = row.is_range == "1";
        let (range_start, range_end) = match row_numbers(&row, is_range, &error_key) {
            Some(p) => p,
            None => continue,
        };
        let street = assemble_street(&row);
        let mut number = range_start;
        // Ranges always cover just one side of the street, hence the step
        // of two.
        while number <= range_end {
            let key: AddressKey = (number, street.clone(), row.zip_code.clone());
            let this_wp = settings
                .fixes
                .address_precincts
                .get(&key)
                .copied()
                .unwrap_or(wp);
            if let Some(&prev) = addresses.get(&key) {
                if prev != this_wp {
                    let prev_is_range = range_keys.contains(&key);
                    if is_range != prev_is_range {
                        if is_range {
                            number += 2;
                            continue;
                        }
                        range_keys.remove(&key);
                    } else {
                        warn!(
                            "Ward/Precinct mismatch for {:?}: {:?} at {} vs. {:?} at {}",
                            key,
                            this_wp,
                            row.sam_address_id,
                            prev,
                            ids.get(&key).map(|s| s.as_str()).unwrap_or("")
                        );
                        number += 2;
                        continue;
                    }
                }
            }
            if is_range {
                range_keys.insert(key.clone());
            }
            ids.insert(key.clone(), row.sam_address_id.clone());
            addresses.insert(key, this_wp);
            number += 2;
        }
    }
    Ok(addresses)
}

/// The street numbers a row covers, or `None` after a warning when the row
/// is unusable. Street numbers are expected to start with digits; a few
/// rows in the data don't.
fn row_numbers(row: &AddressRow, is_range: bool, error_key: &str) -> Option<(u32, u32)> {
    let (start, end) = if is_range {
        let start = match number_prefix(&row.range_from) {
            Some(n) => n,
            None => {
                warn!("{} has bad range start {:?}", error_key, row.range_from);
                return None;
            }
        };
        let end = match number_prefix(&row.range_to) {
            Some(n) => n,
            None => {
                // At least one entry ends its range with a letter
                // ("1-P South St"); degrade to the single starting number.
                warn!(
                    "{} has bad RANGE_TO {:?}, ignoring it",
                    error_key, row.range_to
                );
                start
            }
        };
        (start, end)
    } else {
        match number_prefix(&row.street_number) {
            Some(n) => (n, n),
            None => {
                warn!("{} has bad street number", error_key);
                return None;
            }
        }
    };
    if start == 0 {
        warn!("{} has street number zero", error_key);
        return None;
    }
    Some((start, end))
}

fn number_prefix(value: &str) -> Option<u32> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().ok()
}

fn assemble_street(row: &AddressRow) -> String {
    [
        row.street_prefix.as_str(),
        row.street_body.as_str(),
        row.street_suffix_abbr.as_str(),
        row.street_suffix_dir.as_str(),
    ]
    .iter()
    .filter(|p| !p.is_empty())
    .cloned()
    .collect::<Vec<&str>>()
    .join(" ")
}
