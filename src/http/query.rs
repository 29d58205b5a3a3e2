//! Query-string parsing
//!
//! Decodes the raw query string into a map where repeated parameters
//! collapse into an array value, mirroring what the generated stubs
//! embed in their request snapshot.

use std::collections::BTreeMap;

use crate::mock::QueryValue;

/// Parse a raw query string (no leading `?`) into a parameter map.
///
/// Repeated names become `QueryValue::Multi` in first-seen order.
pub fn parse_query(raw: Option<&str>) -> BTreeMap<String, QueryValue> {
    let mut params: BTreeMap<String, QueryValue> = BTreeMap::new();
    let Some(raw) = raw else {
        return params;
    };

    for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let name = name.into_owned();
        let value = value.into_owned();
        match params.remove(&name) {
            None => {
                params.insert(name, QueryValue::Single(value));
            }
            Some(QueryValue::Single(first)) => {
                params.insert(name, QueryValue::Multi(vec![first, value]));
            }
            Some(QueryValue::Multi(mut values)) => {
                values.push(value);
                params.insert(name, QueryValue::Multi(values));
            }
        }
    }
    params
}
