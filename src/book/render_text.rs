// Fixed-width text rendering, for terminal preview and reference checks.

use precinct_ranges::{CompactRange, Parity};

use crate::book::PollBook;

pub fn parity_label(parity: Parity) -> &'static str {
    match parity {
        Parity::All => "",
        Parity::Odd => "Odd",
        Parity::Even => "Even",
    }
}

/// The printed form of a range's numbers. Open-ended boundaries render as a
/// dash on that side; a single number renders without a dash.
pub fn numbers_label(range: &CompactRange) -> String {
    match (range.start, range.end) {
        (None, None) => String::new(),
        (None, Some(end)) => format!("-{}", end),
        (Some(start), None) => format!("{}-", start),
        (Some(start), Some(end)) if start == end => format!("{}", start),
        (Some(start), Some(end)) => format!("{}-{}", start, end),
    }
}

fn precinct_label(range: &CompactRange, include_ward: bool) -> String {
    if include_ward {
        format!("{}-{}", range.ward_precinct.ward, range.ward_precinct.precinct)
    } else {
        format!("{}", range.ward_precinct.precinct)
    }
}

pub fn render(books: &[PollBook]) -> String {
    let mut out = String::new();
    for book in books.iter() {
        let title = book.title();
        out.push_str(&title);
        out.push('\n');
        out.push_str(&"=".repeat(title.chars().count()));
        out.push('\n');

        let include_ward = book.wards().len() > 1;
        let street_width = book
            .ranges
            .iter()
            .map(|r| r.street.chars().count())
            .chain([6])
            .max()
            .unwrap_or(6);
        let numbers_width = book
            .ranges
            .iter()
            .map(|r| numbers_label(r).chars().count())
            .chain([1])
            .max()
            .unwrap_or(1);
        let precinct_width = book
            .ranges
            .iter()
            .map(|r| precinct_label(r, include_ward).chars().count())
            .chain([5])
            .max()
            .unwrap_or(5);

        out.push_str(&format!(
            "{:<sw$}  {:>nw$}  {:<4}  {:>pw$}\n",
            "Street",
            "#",
            "Side",
            "Prec.",
            sw = street_width,
            nw = numbers_width,
            pw = precinct_width,
        ));
        for range in book.ranges.iter() {
            out.push_str(&format!(
                "{:<sw$}  {:>nw$}  {:<4}  {:>pw$}\n",
                range.street,
                numbers_label(range),
                parity_label(range.parity),
                precinct_label(range, include_ward),
                sw = street_width,
                nw = numbers_width,
                pw = precinct_width,
            ));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use precinct_ranges::WardPrecinct;
    use std::collections::BTreeSet;

    fn range(
        start: Option<u32>,
        end: Option<u32>,
        street: &str,
        ward: u32,
        precinct: u32,
        parity: Parity,
    ) -> CompactRange {
        CompactRange {
            start,
            end,
            street: street.to_string(),
            ward_precinct: WardPrecinct { ward, precinct },
            parity,
        }
    }

    #[test]
    fn numbers_render_with_open_ends() {
        assert_eq!(
            numbers_label(&range(None, None, "x", 1, 1, Parity::All)),
            ""
        );
        assert_eq!(
            numbers_label(&range(None, Some(8), "x", 1, 1, Parity::All)),
            "-8"
        );
        assert_eq!(
            numbers_label(&range(Some(3), None, "x", 1, 1, Parity::All)),
            "3-"
        );
        assert_eq!(
            numbers_label(&range(Some(3), Some(3), "x", 1, 1, Parity::All)),
            "3"
        );
        assert_eq!(
            numbers_label(&range(Some(3), Some(9), "x", 1, 1, Parity::All)),
            "3-9"
        );
    }

    #[test]
    fn single_ward_sheet_moves_the_ward_into_the_title() {
        let book = PollBook {
            key: "LIBRARY (1 MAIN ST)".to_string(),
            name: "LIBRARY".to_string(),
            precincts: vec![
                WardPrecinct { ward: 4, precinct: 1 },
                WardPrecinct { ward: 4, precinct: 2 },
            ]
            .into_iter()
            .collect::<BTreeSet<_>>(),
            ranges: vec![
                range(None, Some(5), "Elm St", 4, 1, Parity::All),
                range(Some(6), None, "Elm St", 4, 2, Parity::Even),
            ],
        };
        let out = render(&[book]);
        let expected = [
            "LIBRARY (Ward 4)",
            "================",
            "Street   #  Side  Prec.",
            "Elm St  -5            1",
            "Elm St  6-  Even      2",
            "",
            "",
        ]
        .join("\n");
        assert_eq!(out, expected);
    }

    #[test]
    fn multi_ward_sheet_shows_ward_and_precinct_per_row() {
        let book = PollBook {
            key: "SCHOOL (2 ELM ST)".to_string(),
            name: "SCHOOL".to_string(),
            precincts: vec![
                WardPrecinct { ward: 4, precinct: 1 },
                WardPrecinct { ward: 5, precinct: 14 },
            ]
            .into_iter()
            .collect::<BTreeSet<_>>(),
            ranges: vec![
                range(None, None, "Oak St", 4, 1, Parity::All),
                range(None, None, "Pine St", 5, 14, Parity::All),
            ],
        };
        let out = render(&[book]);
        assert!(out.starts_with("SCHOOL\n"));
        assert!(out.contains("  4-1\n"));
        assert!(out.contains(" 5-14\n"));
    }
}
