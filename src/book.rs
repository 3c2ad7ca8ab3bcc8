use log::{info, warn};

use precinct_ranges::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;

use text_diff::print_diff;

use crate::args::Args;
use crate::book::config_reader::*;

pub mod cache;
pub mod config_reader;
pub mod io_addresses;
pub mod io_polls;
pub mod locator;
pub mod render_html;
pub mod render_text;

#[derive(Debug, Snafu)]
pub enum BookError {
    #[snafu(display("Error opening file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading a row of {path}"))]
    ParsingCsv { source: csv::Error, path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display(""))]
    EmptyExcel {},
    #[snafu(display("Error opening {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error reading shapefile {path}"))]
    OpeningShapefile {
        source: shapefile::Error,
        path: String,
    },
    #[snafu(display("Collapse failed: {source}"))]
    Collapse { source: CollapseErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type BookResult<T> = Result<T, BookError>;

/// Identifies one polling place. The published roster carries no unique key,
/// so one is derived from the location or address fields.
pub type PollKey = String;

/// Uniquely identifies one address across the city: street number, street
/// name, ZIP code. The ZIP is needed city-wide but is ignored again within a
/// single polling place.
pub type AddressKey = (u32, String, String);

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PollKeyMode {
    Location,
    Address,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum OutputFormat {
    Html,
    Text,
}

/// Fix-up tables for known defects in the source datasets, indexed for
/// lookup. Injected through the configuration file so the pipeline itself
/// stays free of hard-coded data corrections.
#[derive(Debug, Clone, Default)]
pub struct FixIndex {
    pub location_names: HashMap<WardPrecinct, String>,
    pub location_details: HashMap<WardPrecinct, String>,
    pub match_addresses: HashMap<WardPrecinct, String>,
    pub precinct_codes: HashMap<String, String>,
    pub address_precincts: HashMap<AddressKey, WardPrecinct>,
}

impl FixIndex {
    pub fn from_tables(tables: &Option<FixTables>) -> FixIndex {
        let mut res = FixIndex::default();
        if let Some(t) = tables {
            for f in t.location_names.iter() {
                res.location_names.insert(
                    WardPrecinct {
                        ward: f.ward,
                        precinct: f.precinct,
                    },
                    f.value.clone(),
                );
            }
            for f in t.location_details.iter() {
                res.location_details.insert(
                    WardPrecinct {
                        ward: f.ward,
                        precinct: f.precinct,
                    },
                    f.value.clone(),
                );
            }
            for f in t.match_addresses.iter() {
                res.match_addresses.insert(
                    WardPrecinct {
                        ward: f.ward,
                        precinct: f.precinct,
                    },
                    f.value.clone(),
                );
            }
            for f in t.precinct_codes.iter() {
                res.precinct_codes.insert(f.from.clone(), f.to.clone());
            }
            for f in t.address_precincts.iter() {
                res.address_precincts.insert(
                    (f.number, f.street.clone(), f.zip.clone()),
                    WardPrecinct {
                        ward: f.ward,
                        precinct: f.precinct,
                    },
                );
            }
        }
        res
    }
}

/// The effective settings for one run: configuration file values with the
/// command line flags applied on top, and defaults for the rest.
#[derive(Debug, Clone)]
pub struct BookSettings {
    pub poll_key: PollKeyMode,
    pub polls_file: String,
    pub polls_provider: String,
    pub addresses_file: String,
    pub boundaries: Option<BoundariesConfig>,
    pub cache_read: bool,
    pub cache_write: bool,
    pub cache_file: String,
    pub fixes: FixIndex,
    pub column_rows: usize,
    pub double_sided: bool,
    pub copies_per_precinct: u32,
    pub copies_per_polling_place: u32,
    pub print_homogeneous: bool,
    pub format: OutputFormat,
    pub out: Option<String>,
}

pub fn validate_settings(config: &BookConfig, args: &Args) -> BookResult<BookSettings> {
    let poll_key = match config.poll_key.as_deref() {
        None | Some("location") => PollKeyMode::Location,
        Some("address") => PollKeyMode::Address,
        Some(x) => {
            whatever!("Unrecognized poll key {:?} (expected location or address)", x)
        }
    };

    let polls_file = args
        .polls_file
        .clone()
        .or_else(|| config.polls.as_ref().map(|s| s.file_path.clone()))
        .unwrap_or_else(|| "Polling_Locations_2022.csv".to_string());
    let polls_provider = match config.polls.as_ref().and_then(|s| s.provider.clone()) {
        Some(p) => p,
        None if polls_file.ends_with(".xlsx") => "xlsx".to_string(),
        None => "csv".to_string(),
    };

    let addresses_file = args
        .addresses_file
        .clone()
        .or_else(|| config.addresses.as_ref().map(|s| s.file_path.clone()))
        .unwrap_or_else(|| {
            "Live_Street_Address_Management_(SAM)_Addresses.csv.bz2".to_string()
        });

    let cache = config.cache.clone().unwrap_or_default();
    let output = config.output.clone().unwrap_or_default();

    let format = match args
        .format
        .clone()
        .or_else(|| output.format.clone())
        .unwrap_or_else(|| "html".to_string())
        .as_str()
    {
        "html" => OutputFormat::Html,
        "text" => OutputFormat::Text,
        x => {
            whatever!("Unrecognized output format {:?} (expected html or text)", x)
        }
    };

    Ok(BookSettings {
        poll_key,
        polls_file,
        polls_provider,
        addresses_file,
        boundaries: config.boundaries.clone(),
        cache_read: !args.no_cache_read && cache.read.unwrap_or(true),
        cache_write: !args.no_cache_write && cache.write.unwrap_or(true),
        cache_file: args
            .cache_file
            .clone()
            .or(cache.file_path)
            .unwrap_or_else(|| "preprocessed.json".to_string()),
        fixes: FixIndex::from_tables(&config.fixes),
        column_rows: args
            .column_rows
            .or(output.column_rows)
            .unwrap_or(30)
            .max(1),
        double_sided: output.double_sided.unwrap_or(true),
        copies_per_precinct: output.copies_per_precinct.unwrap_or(0),
        copies_per_polling_place: output.copies_per_polling_place.unwrap_or(0),
        print_homogeneous: args.print_homogeneous || output.print_homogeneous.unwrap_or(false),
        format,
        out: args.out.clone().or(output.output_path),
    })
}

/// The polling place roster: which ward/precincts vote where, and what each
/// polling place is called on the printed sheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PollRoster {
    pub polls: BTreeMap<WardPrecinct, PollKey>,
    pub names: BTreeMap<PollKey, String>,
}

/// Everything one polling place's sheet needs.
#[derive(Debug, Clone)]
pub struct PollBook {
    pub key: PollKey,
    pub name: String,
    /// The ward/precincts actually present in the collapsed ranges.
    pub precincts: BTreeSet<WardPrecinct>,
    pub ranges: Vec<CompactRange>,
}

impl PollBook {
    pub fn wards(&self) -> BTreeSet<u32> {
        self.precincts.iter().map(|wp| wp.ward).collect()
    }

    /// When the whole sheet is within one ward, the ward moves into the
    /// title and the rows show bare precinct numbers.
    pub fn title(&self) -> String {
        let wards = self.wards();
        if wards.len() == 1 {
            match wards.iter().next() {
                Some(w) => format!("{} (Ward {})", self.name, w),
                None => self.name.clone(),
            }
        } else {
            self.name.clone()
        }
    }
}

/// Joins resolved addresses to polling places through the roster. Addresses
/// whose ward/precinct is not in the roster are a data defect: warned about
/// and dropped.
fn map_addresses(
    roster: &PollRoster,
    addresses: &BTreeMap<AddressKey, WardPrecinct>,
) -> Vec<cache::PollAssignment> {
    let mut res: Vec<cache::PollAssignment> = Vec::new();
    for (key, wp) in addresses.iter() {
        match roster.polls.get(wp) {
            Some(poll) => res.push(cache::PollAssignment {
                poll: poll.clone(),
                number: key.0,
                street: key.1.clone(),
                zip: key.2.clone(),
                ward: wp.ward,
                precinct: wp.precinct,
            }),
            None => {
                warn!("Invalid ward/precinct {:?} for {:?}", wp, key);
            }
        }
    }
    res
}

fn preprocess(settings: &BookSettings) -> BookResult<cache::PreprocessedData> {
    let roster = io_polls::read_polling_places(settings)?;
    info!(
        "Roster: {} ward/precincts at {} polling places",
        roster.polls.len(),
        roster.names.len()
    );
    let resolver = locator::PrecinctResolver::from_settings(settings)?;
    let addresses = io_addresses::read_addresses(settings, &resolver)?;
    info!("Read {} addresses", addresses.len());
    let assignments = map_addresses(&roster, &addresses);
    Ok(cache::PreprocessedData {
        poll_names: roster.names.into_iter().collect(),
        assignments,
    })
}

/// Builds the per-poll sheets: dedup, collapse, order.
pub fn assemble_books(
    settings: &BookSettings,
    data: &cache::PreprocessedData,
) -> BookResult<Vec<PollBook>> {
    let names: BTreeMap<String, String> = data.poll_names.iter().cloned().collect();

    // Within one polling place the ZIP code is dropped from the key: the
    // source lists some addresses redundantly under two ZIPs.
    let mut per_poll: BTreeMap<PollKey, BTreeSet<(String, u32, WardPrecinct)>> = BTreeMap::new();
    for a in data.assignments.iter() {
        per_poll.entry(a.poll.clone()).or_default().insert((
            a.street.clone(),
            a.number,
            WardPrecinct {
                ward: a.ward,
                precinct: a.precinct,
            },
        ));
    }

    let mut books: Vec<PollBook> = Vec::new();
    for (poll, entries) in per_poll {
        let input: Vec<AddressAssignment> = entries
            .iter()
            .map(|(street, number, wp)| AddressAssignment {
                number: *number,
                street: street.clone(),
                ward_precinct: *wp,
            })
            .collect();
        let result = collapse_poll_addresses(&input).context(CollapseSnafu {})?;
        for c in result.conflicts.iter() {
            warn!(
                "{}: conflicting precinct for {} {}: kept {:?}, discarded {:?}",
                poll, c.number, c.street, c.kept, c.discarded
            );
        }
        let precincts: BTreeSet<WardPrecinct> =
            result.ranges.iter().map(|r| r.ward_precinct).collect();
        if precincts.len() == 1 && !settings.print_homogeneous {
            continue;
        }
        let name = names.get(&poll).cloned().unwrap_or_else(|| poll.clone());
        books.push(PollBook {
            key: poll,
            name,
            precincts,
            ranges: result.ranges,
        });
    }

    // Sheets come out in a consistent order: sorted by the set of
    // ward/precincts they serve.
    books.sort_by(|a, b| a.precincts.cmp(&b.precincts).then_with(|| a.key.cmp(&b.key)));
    Ok(books)
}

pub fn run_book(args: &Args) -> BookResult<()> {
    let config = read_config(&args.config)?;
    let settings = validate_settings(&config, args)?;
    info!("settings: {:?}", settings);

    let mut data: Option<cache::PreprocessedData> = None;
    if settings.cache_read {
        data = cache::read_snapshot(&settings.cache_file)?;
        if data.is_some() {
            info!("Using preprocessed data from {}", settings.cache_file);
        }
    }
    let data = match data {
        Some(d) => d,
        None => {
            let d = preprocess(&settings)?;
            if settings.cache_write {
                cache::write_snapshot(&settings.cache_file, &d)?;
            }
            d
        }
    };

    let books = assemble_books(&settings, &data)?;
    info!("Assembled {} polling place sheets", books.len());

    let rendered = match settings.format {
        OutputFormat::Html => render_html::render(&settings, &books),
        OutputFormat::Text => render_text::render(&books),
    };

    match settings.out {
        Some(ref path) if path != "stdout" => {
            fs::write(path, &rendered).context(OpeningFileSnafu { path: path.clone() })?;
            info!("Wrote book to {}", path);
        }
        _ => print!("{}", rendered),
    }

    // The reference rendering, if provided for comparison.
    if let Some(ref reference_path) = args.reference {
        let reference = fs::read_to_string(reference_path).context(OpeningFileSnafu {
            path: reference_path.clone(),
        })?;
        let text = match settings.format {
            OutputFormat::Text => rendered,
            _ => render_text::render(&books),
        };
        if reference != text {
            warn!("Found differences with the reference rendering");
            print_diff(reference.as_str(), text.as_ref(), "\n");
            whatever!("Difference detected between rendered book and reference");
        }
    }

    Ok(())
}

#[cfg(test)]
pub fn test_args() -> Args {
    Args {
        config: None,
        polls_file: None,
        addresses_file: None,
        out: None,
        format: None,
        column_rows: None,
        no_cache_read: false,
        no_cache_write: false,
        cache_file: None,
        print_homogeneous: false,
        reference: None,
        verbose: false,
    }
}

#[cfg(test)]
pub fn test_settings() -> BookSettings {
    validate_settings(&BookConfig::default(), &test_args()).unwrap()
}
