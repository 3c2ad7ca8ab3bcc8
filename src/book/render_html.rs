// Paginated HTML rendering, meant to be printed from a browser.
//
// After rendering, scroll through the output in the browser before printing
// to make sure no page ran long; if one did, reduce the configured rows per
// column.

use crate::book::render_text::parity_label;
use crate::book::{BookSettings, PollBook};

const COLUMN_HEADER: &str = "<td style=\"vertical-align: top;\">\n\
    <table class=\"columnTable\"><tbody>\n\
    <tr><th align=\"left\">Street</th><th>#</th><th>Side</th>\n\
    <th>Prec.</th></tr>\n";
const COLUMN_FOOTER: &str = "</tbody></table></td>\n";
const PAGE_FOOTER: &str = "</tbody></table>\n";

pub fn render(settings: &BookSettings, books: &[PollBook]) -> String {
    let mut out = String::new();
    out.push_str("<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(
        "<style>\n\
        .columnTable th{background-color: #c2c2c2;}\n\
        .columnTable tr:nth-child(even){background-color: #e2e2e2;}\n\
        </style>\n",
    );
    out.push_str("</head>\n<body>\n");

    let mut page_count: usize = 0;
    for book in books.iter() {
        render_poll(settings, book, &mut page_count, &mut out);
    }

    out.push_str("</body></html>\n");
    out
}

fn render_poll(settings: &BookSettings, book: &PollBook, page_count: &mut usize, out: &mut String) {
    let mut rows_per_column = settings.column_rows;
    let mut columns = ceil_div(book.ranges.len(), rows_per_column);
    if columns > 2 {
        // Make room for the page number.
        rows_per_column = (rows_per_column - 1).max(1);
        columns = ceil_div(book.ranges.len(), rows_per_column);
    }

    let include_ward = book.wards().len() > 1;
    let title = book.title();

    let copies = if settings.copies_per_precinct > 0 || settings.copies_per_polling_place > 0 {
        settings.copies_per_precinct as usize * book.precincts.len()
            + settings.copies_per_polling_place as usize
    } else {
        1
    };

    let precinct_pad = book
        .ranges
        .iter()
        .map(|r| r.ward_precinct.precinct.to_string().len())
        .max()
        .unwrap_or(0);
    let address_pad = book
        .ranges
        .iter()
        .flat_map(|r| [r.start, r.end])
        .flatten()
        .map(|v| v.to_string().len())
        .max()
        .unwrap_or(0);

    for _ in 0..copies {
        let mut row_count = 0usize;
        let mut column_count = 0usize;
        out.push_str(&page_header(&title, columns, column_count));
        out.push_str(COLUMN_HEADER);
        for range in book.ranges.iter() {
            if row_count > 0 && row_count % rows_per_column == 0 {
                out.push_str(COLUMN_FOOTER);
                column_count += 1;
                if column_count % 2 == 0 {
                    *page_count += 1;
                    out.push_str(PAGE_FOOTER);
                    out.push_str(&page_header(&title, columns, column_count));
                }
                out.push_str(COLUMN_HEADER);
            }
            row_count += 1;

            out.push_str("<tr>\n");
            out.push_str(&format!("<td>{}</td>\n", escape_html(&range.street)));
            let numbers = match (range.start, range.end) {
                (None, None) => String::new(),
                (None, Some(end)) => format!(
                    "{}&ndash;{}",
                    nbsp_pad("", address_pad),
                    nbsp_pad(&end.to_string(), address_pad)
                ),
                (Some(start), None) => format!(
                    "{}&ndash;{}",
                    nbsp_pad(&start.to_string(), address_pad),
                    nbsp_pad("", address_pad)
                ),
                (Some(start), Some(end)) if start == end => {
                    nbsp_pad(&start.to_string(), address_pad)
                }
                (Some(start), Some(end)) => format!(
                    "{}&ndash;{}",
                    nbsp_pad(&start.to_string(), address_pad),
                    nbsp_pad(&end.to_string(), address_pad)
                ),
            };
            out.push_str(&format!(
                "<td style=\"font-family: monospace;\">{}</td>\n",
                numbers
            ));
            out.push_str(&format!("<td>{}</td>\n", parity_label(range.parity)));
            let precinct = if include_ward {
                format!(
                    "{}-{}",
                    range.ward_precinct.ward,
                    nbsp_pad(&range.ward_precinct.precinct.to_string(), precinct_pad)
                )
            } else {
                range.ward_precinct.precinct.to_string()
            };
            out.push_str(&format!(
                "<td style=\"font-family: monospace; text-align: right;\">{}</td>\n",
                precinct
            ));
            out.push_str("</tr>\n");
        }
        out.push_str(COLUMN_FOOTER);
        *page_count += 1;
        out.push_str(PAGE_FOOTER);
        // Keep each polling place on its own sheet of paper when printing
        // double-sided.
        if settings.double_sided && *page_count % 2 == 1 {
            *page_count += 1;
            out.push_str("<div style=\"page-break-after: always;\"></div>\n");
        }
    }
}

fn page_header(title: &str, columns: usize, column_count: usize) -> String {
    let mut header = format!("<h2>{}</h2>\n", escape_html(title));
    if columns > 2 {
        header.push_str(&format!("<h3>Page {}</h3>\n", 1 + column_count / 2));
    }
    header.push_str("<table width=\"100%\" style=\"page-break-after: always;\">\n<tbody>\n");
    header
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

fn nbsp_pad(value: &str, width: usize) -> String {
    let pad = "&nbsp;".repeat(width.saturating_sub(value.len()));
    format!("{}{}", pad, value)
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::test_settings;
    use precinct_ranges::{CompactRange, Parity, WardPrecinct};
    use std::collections::BTreeSet;

    fn book(range_count: u32) -> PollBook {
        let ranges: Vec<CompactRange> = (0..range_count)
            .map(|i| CompactRange {
                start: Some(2 * i + 1),
                end: Some(2 * i + 1),
                street: format!("Street {}", i),
                ward_precinct: WardPrecinct {
                    ward: 1,
                    precinct: 1 + i % 2,
                },
                parity: Parity::All,
            })
            .collect();
        PollBook {
            key: "LIBRARY (1 MAIN ST)".to_string(),
            name: "LIBRARY".to_string(),
            precincts: ranges.iter().map(|r| r.ward_precinct).collect::<BTreeSet<_>>(),
            ranges,
        }
    }

    fn count_occurrences(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn short_sheet_fits_one_page() {
        let mut settings = test_settings();
        settings.column_rows = 30;
        let out = render(&settings, &[book(3)]);
        assert_eq!(count_occurrences(&out, "columnTable tr"), 1); // style only
        assert_eq!(count_occurrences(&out, COLUMN_HEADER), 1);
        assert_eq!(count_occurrences(&out, "<h2>LIBRARY (Ward 1)</h2>"), 1);
        assert_eq!(count_occurrences(&out, "<h3>Page"), 0);
        assert_eq!(count_occurrences(&out, "<tr>\n"), 3);
        // One rendered page gets a blank back side for double-sided printing.
        assert_eq!(
            count_occurrences(&out, "<div style=\"page-break-after: always;\"></div>"),
            1
        );
    }

    #[test]
    fn rows_split_into_two_columns() {
        let mut settings = test_settings();
        settings.column_rows = 2;
        let out = render(&settings, &[book(3)]);
        assert_eq!(count_occurrences(&out, COLUMN_HEADER), 2);
        assert_eq!(count_occurrences(&out, "<h2>"), 1);
    }

    #[test]
    fn long_sheets_get_page_numbers() {
        let mut settings = test_settings();
        settings.column_rows = 2;
        // Five ranges at two rows per column would need three columns, so
        // rows are cut to one and the sheet spans three numbered pages.
        let out = render(&settings, &[book(5)]);
        assert!(count_occurrences(&out, "<h3>Page 1</h3>") >= 1);
        assert!(count_occurrences(&out, "<h3>Page 3</h3>") >= 1);
        assert_eq!(count_occurrences(&out, "<h2>"), 3);
    }

    #[test]
    fn copies_repeat_the_sheet() {
        let mut settings = test_settings();
        settings.copies_per_precinct = 2;
        let out = render(&settings, &[book(3)]);
        // Two precincts at two copies each.
        assert_eq!(count_occurrences(&out, "<h2>"), 4);
    }

    #[test]
    fn ward_appears_in_rows_only_when_sheets_span_wards() {
        let settings = test_settings();
        let mut multi = book(2);
        multi.ranges[1].ward_precinct = WardPrecinct { ward: 2, precinct: 7 };
        multi.precincts = multi.ranges.iter().map(|r| r.ward_precinct).collect();
        let out = render(&settings, &[multi]);
        assert_eq!(count_occurrences(&out, "<h2>LIBRARY</h2>"), 1);
        assert!(out.contains(">2-7</td>"));
    }

    #[test]
    fn escaping_covers_the_html_specials() {
        assert_eq!(escape_html("A & B <Hall>"), "A &amp; B &lt;Hall&gt;");
        assert_eq!(nbsp_pad("7", 3), "&nbsp;&nbsp;7");
        assert_eq!(nbsp_pad("123", 3), "123");
    }
}
