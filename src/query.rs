// Query string decoding
//
// Splits `key=value&key=value` into pairs and percent-decodes them.

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_till, take_while_m_n},
    character::complete::char,
    combinator::{map, map_res, opt, value},
    multi::{many0, separated_list0},
    sequence::{pair, preceded},
    IResult,
};

/// A decoded piece of a percent-encoded string
#[derive(Debug, Clone, PartialEq)]
enum Chunk<'a> {
    Literal(&'a str),
    Byte(u8),
}

/// Parse `%XX` into the byte it encodes
fn escaped_byte(input: &str) -> IResult<&str, u8> {
    map_res(
        preceded(
            char('%'),
            take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        ),
        |hex: &str| u8::from_str_radix(hex, 16),
    )(input)
}

fn chunks(input: &str, plus_as_space: bool) -> IResult<&str, Vec<Chunk<'_>>> {
    let stop = if plus_as_space { "%+" } else { "%" };
    many0(alt((
        map(escaped_byte, Chunk::Byte),
        map(is_not(stop), Chunk::Literal),
        // A '%' that does not start a valid escape is kept as-is
        value(Chunk::Literal("%"), char('%')),
        value(Chunk::Byte(b' '), char('+')),
    )))(input)
}

fn decode(input: &str, plus_as_space: bool) -> String {
    let parts = match chunks(input, plus_as_space) {
        Ok((_, parts)) => parts,
        Err(_) => return input.to_string(),
    };

    let mut bytes = Vec::with_capacity(input.len());
    for part in parts {
        match part {
            Chunk::Literal(s) => bytes.extend_from_slice(s.as_bytes()),
            Chunk::Byte(b) => bytes.push(b),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Percent-decode a query component (`+` means space)
pub fn decode_component(input: &str) -> String {
    decode(input, true)
}

/// Percent-decode a string, leaving `+` untouched
pub fn unquote(input: &str) -> String {
    decode(input, false)
}

/// Parse one raw `key[=value]` segment
fn segment(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(
        take_till(|c: char| c == '=' || c == '&'),
        opt(preceded(char('='), take_till(|c: char| c == '&'))),
    )(input)
}

fn segments(input: &str) -> IResult<&str, Vec<(&str, Option<&str>)>> {
    separated_list0(char('&'), segment)(input)
}

/// Parse a query string into decoded `(key, value)` pairs.
///
/// Accepts a bare query (`a=1&b=2`), one with a leading `?`, or a full URL.
/// Pairs keep their original order; segments with an empty key are dropped.
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    // Strip a URL prefix and fragment, but only when the text before '?'
    // cannot itself be part of a query
    let query = match raw.split_once('?') {
        Some((prefix, rest)) if !prefix.contains('=') && !prefix.contains('&') => {
            rest.split('#').next().unwrap_or(rest)
        }
        _ => raw,
    };

    let parsed = match segments(query) {
        Ok((_, parsed)) => parsed,
        Err(_) => return Vec::new(),
    };

    parsed
        .into_iter()
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| {
            (
                decode_component(key),
                value.map(decode_component).unwrap_or_default(),
            )
        })
        .collect()
}

/// Value for `key`; a repeated key resolves to its final occurrence
pub fn last_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
