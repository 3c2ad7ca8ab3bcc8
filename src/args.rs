use clap::Parser;

/// Generates compact precinct books for every polling place, showing the
/// ward and precinct for every street address that votes there.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) JSON configuration describing the data sources,
    /// the fix-up tables for known source-data defects, and output settings.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) Polling place roster downloaded from the city's open data
    /// portal (CSV or Excel). Overrides the configuration file.
    #[clap(long, value_parser)]
    pub polls_file: Option<String>,

    /// (file path) Street address list downloaded from the city's open data
    /// portal (CSV, optionally bzip2-compressed). Overrides the configuration
    /// file.
    #[clap(long, value_parser)]
    pub addresses_file: Option<String>,

    /// (file path, 'stdout' or empty) Where the rendered book is written.
    /// Defaults to stdout.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (default html) Output format: html or text.
    #[clap(long, value_parser)]
    pub format: Option<String>,

    /// Number of data rows per print column, determined empirically by how
    /// many rows fit when you print with the desired settings.
    #[clap(long, value_parser)]
    pub column_rows: Option<usize>,

    /// Skip reading preprocessed data from the snapshot file even when one
    /// exists.
    #[clap(long, takes_value = false)]
    pub no_cache_read: bool,

    /// Skip writing preprocessed data to the snapshot file after parsing.
    #[clap(long, takes_value = false)]
    pub no_cache_write: bool,

    /// (file path) Location of the preprocessed data snapshot.
    #[clap(long, value_parser)]
    pub cache_file: Option<String>,

    /// Also print sheets for polling places with only one precinct.
    #[clap(long, takes_value = false)]
    pub print_homogeneous: bool,

    /// (file path) A reference text rendering of the book. If provided,
    /// precinctbook will check that its output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard
    /// output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
