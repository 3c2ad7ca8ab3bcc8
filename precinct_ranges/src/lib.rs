mod config;
pub mod builder;
pub mod manual;

use log::{debug, warn};

use std::collections::{BTreeMap, HashMap};

pub use crate::config::*;

// **** Private structures ****

/// One entry in the per-street merge arena.
///
/// The consumed flag is how the merge passes communicate: a consumed entry
/// never joins another run, but it stays in the parity views where it breaks
/// adjacency between the real entries around it.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct StreetEntry {
    number: u32,
    ward_precinct: WardPrecinct,
    consumed: bool,
}

/// A merged run before boundary elision. Bounds are always concrete here;
/// they only become optional once elision decides they can be dropped.
#[derive(Eq, PartialEq, Debug, Clone)]
struct MergedRange {
    start: u32,
    end: u32,
    ward_precinct: WardPrecinct,
    parity: Parity,
}

/// Collapses one polling place's address list into compact range form.
///
/// Arguments:
/// * `coll` every address assigned to the polling place, in source order.
///
/// The output reproduces the input mapping exactly when re-expanded: every
/// input address is covered by a range of matching parity and precinct.
/// Ranges may claim house numbers that do not appear in the input; the book
/// documents the addresses a poll-worker will encounter, not a census.
///
/// Duplicate `(number, street)` keys with a differing precinct keep the
/// first-seen assignment and are reported in the result.
pub fn collapse_poll_addresses(
    coll: &[AddressAssignment],
) -> Result<CollapseResult, CollapseErrors> {
    debug!("collapse_poll_addresses: {:?} assignments", coll.len());
    let (streets, conflicts) = group_streets(coll)?;
    let mut ranges: Vec<CompactRange> = Vec::new();
    for (street, entries) in streets.iter() {
        ranges.extend(merge_street(street, entries));
    }
    Ok(CollapseResult { ranges, conflicts })
}

/// Partitions assignments by street and sorts each group by house number.
///
/// Conflict detection happens here, before any merging: the merger is never
/// asked to reconcile competing precinct claims for the same number.
fn group_streets(
    coll: &[AddressAssignment],
) -> Result<(Vec<(String, Vec<StreetEntry>)>, Vec<AssignmentConflict>), CollapseErrors> {
    let mut seen: HashMap<(String, u32), WardPrecinct> = HashMap::new();
    let mut groups: BTreeMap<String, Vec<StreetEntry>> = BTreeMap::new();
    let mut conflicts: Vec<AssignmentConflict> = Vec::new();
    for a in coll.iter() {
        if a.number == 0 {
            return Err(CollapseErrors::InvalidHouseNumber {
                street: a.street.clone(),
            });
        }
        match seen.get(&(a.street.clone(), a.number)) {
            Some(&kept) if kept != a.ward_precinct => {
                warn!(
                    "conflicting precinct for {} {}: keeping {:?}, discarding {:?}",
                    a.number, a.street, kept, a.ward_precinct
                );
                conflicts.push(AssignmentConflict {
                    number: a.number,
                    street: a.street.clone(),
                    kept,
                    discarded: a.ward_precinct,
                });
                continue;
            }
            Some(_) => {
                // Exact duplicate, nothing to report.
                continue;
            }
            None => {}
        }
        seen.insert((a.street.clone(), a.number), a.ward_precinct);
        groups.entry(a.street.clone()).or_default().push(StreetEntry {
            number: a.number,
            ward_precinct: a.ward_precinct,
            consumed: false,
        });
    }
    let mut streets: Vec<(String, Vec<StreetEntry>)> = Vec::new();
    for (street, mut entries) in groups {
        entries.sort_by_key(|e| e.number);
        streets.push((street, entries));
    }
    Ok((streets, conflicts))
}

/// Merges and compacts the addresses of one street.
///
/// Three passes over an index-tagged arena, then promotion and elision:
/// 1. runs over the full sequence become All ranges, but only when the run
///    contains both parities (an all-odd run labeled All would falsely claim
///    the even side),
/// 2. runs within the odd and even filtered views become Odd/Even ranges,
/// 3. whatever is left cannot be merged and becomes single-number ranges.
fn merge_street(street: &str, entries: &[StreetEntry]) -> Vec<CompactRange> {
    let mut arena: Vec<StreetEntry> = entries.to_vec();
    let mut merged: Vec<MergedRange> = Vec::new();

    // Pass A.
    let keys: Vec<WardPrecinct> = arena.iter().map(|e| e.ward_precinct).collect();
    for (s, e) in maximal_runs(&keys) {
        if !has_even_and_odd(&arena[s..=e]) {
            continue;
        }
        merged.push(MergedRange {
            start: arena[s].number,
            end: arena[e].number,
            ward_precinct: arena[s].ward_precinct,
            parity: Parity::All,
        });
        for entry in arena[s..=e].iter_mut() {
            entry.consumed = true;
        }
    }

    // Pass B. Both views are fixed against the pass-A state: entries the
    // first pass consumed stay in each view as run breaks, and a merge in
    // the odd view must not reshape the even view.
    let consumed_a: Vec<bool> = arena.iter().map(|e| e.consumed).collect();
    for (parity, rem) in [(Parity::Odd, 1u32), (Parity::Even, 0u32)] {
        let view: Vec<usize> = (0..arena.len())
            .filter(|&i| arena[i].number % 2 == rem || consumed_a[i])
            .collect();
        let keys: Vec<Option<WardPrecinct>> = view
            .iter()
            .map(|&i| {
                if consumed_a[i] {
                    None
                } else {
                    Some(arena[i].ward_precinct)
                }
            })
            .collect();
        for (s, e) in maximal_runs(&keys) {
            let ward_precinct = match keys[s] {
                Some(wp) => wp,
                None => continue,
            };
            merged.push(MergedRange {
                start: arena[view[s]].number,
                end: arena[view[e]].number,
                ward_precinct,
                parity,
            });
            for &i in view[s..=e].iter() {
                arena[i].consumed = true;
            }
        }
    }

    // Leftovers are unmergeable: one single-number range each.
    for entry in arena.iter().filter(|e| !e.consumed) {
        merged.push(MergedRange {
            start: entry.number,
            end: entry.number,
            ward_precinct: entry.ward_precinct,
            parity: Parity::All,
        });
    }

    promote_unoverlapped(&mut merged);
    merged.sort_by_key(|m| (m.start, m.end, m.ward_precinct, m.parity));

    let mut ranges: Vec<CompactRange> = merged
        .into_iter()
        .map(|m| CompactRange {
            start: Some(m.start),
            end: Some(m.end),
            street: street.to_string(),
            ward_precinct: m.ward_precinct,
            parity: m.parity,
        })
        .collect();
    elide_boundaries(&mut ranges);
    ranges.sort_by(|a, b| {
        (a.street.as_str(), a.start.unwrap_or(0), a.end.unwrap_or(0)).cmp(&(
            b.street.as_str(),
            b.start.unwrap_or(0),
            b.end.unwrap_or(0),
        ))
    });
    ranges
}

/// Maximal blocks of at least two adjacent equal keys, as inclusive index
/// pairs. Adjacency is positional, not numeric: gaps in house numbering are
/// expected and do not split a run.
fn maximal_runs<K: PartialEq>(keys: &[K]) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    if keys.is_empty() {
        return runs;
    }
    let mut start = 0usize;
    for i in 1..keys.len() {
        if keys[i] == keys[start] {
            continue;
        }
        if i - start > 1 {
            runs.push((start, i - 1));
        }
        start = i;
    }
    if keys.len() - start > 1 {
        runs.push((start, keys.len() - 1));
    }
    runs
}

fn has_even_and_odd(entries: &[StreetEntry]) -> bool {
    entries.iter().any(|e| e.number % 2 == 1) && entries.iter().any(|e| e.number % 2 == 0)
}

/// Relabels an Odd/Even range as All when no other range overlaps its
/// numeric interval: with nothing competing on that span, the parity
/// qualifier would only clutter the rendered book.
fn promote_unoverlapped(merged: &mut [MergedRange]) {
    let intervals: Vec<(u32, u32)> = merged.iter().map(|m| (m.start, m.end)).collect();
    for m in merged.iter_mut() {
        if m.parity == Parity::All {
            continue;
        }
        let overlapping = intervals
            .iter()
            .filter(|(s, e)| m.start.max(*s) <= m.end.min(*e))
            .count();
        if overlapping == 1 {
            m.parity = Parity::All;
        }
    }
}

fn is_parity_pair(a: &CompactRange, b: &CompactRange) -> bool {
    a.parity != Parity::All && b.parity != Parity::All && a.parity != b.parity
}

/// Drops boundary numbers that carry no information for the reader of a
/// single street block. Operates on the numerically sorted ranges of one
/// street; purely presentational and idempotent.
fn elide_boundaries(ranges: &mut [CompactRange]) {
    let n = ranges.len();
    if n == 0 {
        return;
    }
    // A lone range implicitly covers the whole street.
    if n == 1 {
        ranges[0].start = None;
        ranges[0].end = None;
        ranges[0].parity = Parity::All;
        return;
    }
    // A pure odd/even pair implicitly covers the whole street together.
    if n == 2 && is_parity_pair(&ranges[0], &ranges[1]) {
        for r in ranges.iter_mut() {
            r.start = None;
            r.end = None;
        }
        return;
    }
    if ranges[0].parity == Parity::All {
        ranges[0].start = None;
    } else if n > 2 && is_parity_pair(&ranges[0], &ranges[1]) {
        ranges[0].start = None;
        ranges[1].start = None;
    }
    if ranges[n - 1].parity == Parity::All {
        ranges[n - 1].end = None;
    } else if n > 2 && is_parity_pair(&ranges[n - 2], &ranges[n - 1]) {
        ranges[n - 2].end = None;
        ranges[n - 1].end = None;
    }
}
