//! Line tokenizer for recorder CSV files.
//!
//! Fields are comma separated. Leading spaces are skipped, unquoted fields
//! lose trailing spaces, and double-quoted fields may contain commas and
//! `""` escapes.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_till, take_till1},
    character::complete::{char, space0},
    combinator::{eof, map, peek, rest, value},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded, separated_pair, terminated},
    IResult, Parser,
};

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        many0(alt((value("\"", tag("\"\"")), is_not("\"")))),
        char('"'),
    )
    .map(|parts: Vec<&str>| parts.concat())
    .parse(input)
}

fn unquoted(input: &str) -> IResult<&str, String> {
    map(take_till(|c| c == ','), |s: &str| s.trim_end().to_string()).parse(input)
}

fn field(input: &str) -> IResult<&str, String> {
    preceded(
        space0,
        alt((
            terminated(quoted, (space0, peek(alt((tag(","), eof))))),
            unquoted,
        )),
    )
    .parse(input)
}

/// Split one line into fields. Trailing `\r`/`\n` are ignored.
pub fn split_line(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    match separated_list0(char(','), field).parse(line) {
        Ok((_, fields)) => fields,
        Err(_) => Vec::new(),
    }
}

fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(take_till1(|c| c == '='), char('='), rest).parse(input)
}

/// Split a `key=value` metadata token at the first `=`, with quotes removed
/// from the value.
pub fn meta_token(token: &str) -> Option<(String, String)> {
    let (_, (key, val)) = key_value(token.trim()).ok()?;
    Some((key.trim().to_string(), val.replace('"', "")))
}
