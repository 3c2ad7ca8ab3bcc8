/*!

This is the long-form manual for `precinct_ranges` and `precinctbook`.

## What the program produces

Each polling place serves one or more ward/precinct pairs, and on election
day every precinct table needs a book listing which addresses check in where.
Listing every single address makes a book many pages long; the same
information fits on one or two pages when consecutive addresses in the same
precinct are collapsed into ranges. `precinctbook` reads the city's polling
place roster and street address list and prints one compact sheet per
polling place.

A rendered row looks like:

```text
Street            #        Side  Prec.
Washington St         -  5  Odd      2
Washington St         -  6  Even     3
Washington St     101-104           4
```

An empty boundary means the range runs to the start or end of the street's
numbering at this polling place. An empty Side column means both sides.

## Input datasets

* **Polling place roster** (CSV or Excel): one row per ward/precinct with the
  polling location fields `USER_Ward`, `USER_Precinct`, `USER_Location2`,
  `USER_Location3` and `Match_addr`.
* **Street address list** (CSV, optionally bzip2-compressed): one row per
  address or per address range, with street number and name parts, ZIP code,
  and either `WARD`/`PRECINCT_WARD` columns or coordinates for the geometric
  lookup.
* **Precinct boundaries** (optional, ESRI shapefile): precinct polygons used
  to resolve each address by containment instead of trusting the
  `WARD`/`PRECINCT_WARD` columns.

## Configuration

The program accepts a JSON configuration file describing the data sources,
the output settings and the fix-up tables for known defects in the source
data. Command line flags override the corresponding configuration values.

```json
{
  "pollKey": "location",
  "polls": { "provider": "csv", "filePath": "Polling_Locations_2022.csv" },
  "addresses": { "filePath": "Live_Street_Address_Management_(SAM)_Addresses.csv.bz2" },
  "fixes": {
    "precinctCodes": [ { "from": "0502A", "to": "0502" } ],
    "locationDetails": [ { "ward": 15, "precinct": 5, "value": "35 WESTVILLE STREET" } ]
  },
  "output": { "columnRows": 30, "doubleSided": true, "format": "html" }
}
```

`pollKey` selects what identifies a polling place in the roster, since the
published data carries no unique key:

* `location` (default) combines the `USER_Location2` and `USER_Location3`
  fields.
* `address` uses the `Match_addr` field.

Neither is fully reliable; if you switch modes, delete the preprocessed
snapshot or pass `--no-cache-read` so the change takes effect. Running once
with each mode and diffing the text output is a cheap consistency check on
the source data.

## Library use

The collapse itself is exposed by this crate without any of the dataset
machinery: build the address list for one polling place and call
[`collapse_poll_addresses`](crate::collapse_poll_addresses), or use the
[`builder`](crate::builder) API. The output order and content are fully
deterministic for a given input set.

*/
