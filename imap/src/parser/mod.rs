use bytes::Bytes;
use nom::{
    IResult, Needed, Offset, Parser,
    branch::alt,
    bytes::streaming::{tag, tag_no_case, take, take_till, take_while1},
    character::streaming::{char, crlf, u32 as number},
    combinator::{map, opt},
    error::ErrorKind,
    multi::many0,
    sequence::{delimited, preceded},
};
use thiserror::Error;

use crate::types::{Response, Status};

pub mod fetch;
pub mod mailbox;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Invalid IMAP response: {0:?}")]
    InvalidResponse(String),
}

/// Outcome of one decoding attempt over the buffered bytes.
#[derive(Debug)]
pub enum Decoded {
    /// A complete response and the number of bytes it occupied.
    Response(Response, usize),
    /// More bytes are needed; at least this many beyond what is buffered.
    Incomplete(usize),
}

pub fn decode(buf: &[u8]) -> Result<Decoded, ParserError> {
    match response(buf) {
        Ok((rest, resp)) => Ok(Decoded::Response(resp, buf.offset(rest))),
        Err(nom::Err::Incomplete(Needed::Size(n))) => Ok(Decoded::Incomplete(n.get())),
        Err(nom::Err::Incomplete(Needed::Unknown)) => Ok(Decoded::Incomplete(1)),
        Err(_) => Err(ParserError::InvalidResponse(preview(buf))),
    }
}

fn preview(buf: &[u8]) -> String {
    let line = buf.split(|&b| b == b'\n').next().unwrap_or_default();
    let line = &line[..line.len().min(80)];
    String::from_utf8_lossy(line).trim_end().to_string()
}

fn response(i: &[u8]) -> IResult<&[u8], Response> {
    alt((continuation, untagged_response, tagged_response)).parse(i)
}

fn untagged_response(i: &[u8]) -> IResult<&[u8], Response> {
    preceded(
        tag(&b"* "[..]),
        alt((untagged_status, search_data, fetch::fetch_data, other_data)),
    )
    .parse(i)
}

fn untagged_status(i: &[u8]) -> IResult<&[u8], Response> {
    map((status, status_text, crlf), |(status, text, _)| {
        Response::Untagged { status, text }
    })
    .parse(i)
}

fn tagged_response(i: &[u8]) -> IResult<&[u8], Response> {
    map(
        (tag_token, char(' '), status, status_text, crlf),
        |(tag, _, status, text, _)| Response::Tagged {
            tag: String::from_utf8_lossy(tag).into_owned(),
            status,
            text,
        },
    )
    .parse(i)
}

fn continuation(i: &[u8]) -> IResult<&[u8], Response> {
    map((char('+'), opt(char(' ')), take_till(is_eol), crlf), |(_, _, text, _)| {
        Response::Continuation {
            text: lossy(text),
        }
    })
    .parse(i)
}

// `* SEARCH 2 5 9` possibly followed by extension data we do not need.
fn search_data(i: &[u8]) -> IResult<&[u8], Response> {
    map(
        (
            tag_no_case(&b"SEARCH"[..]),
            many0(preceded(char(' '), number)),
            take_till(is_eol),
            crlf,
        ),
        |(_, ids, _, _)| Response::Search(ids),
    )
    .parse(i)
}

fn other_data(i: &[u8]) -> IResult<&[u8], Response> {
    map(line_with_literals, |raw| Response::Data(Bytes::copy_from_slice(raw))).parse(i)
}

fn status(i: &[u8]) -> IResult<&[u8], Status> {
    alt((
        map(tag_no_case(&b"OK"[..]), |_| Status::Ok),
        map(tag_no_case(&b"NO"[..]), |_| Status::No),
        map(tag_no_case(&b"BAD"[..]), |_| Status::Bad),
        map(tag_no_case(&b"PREAUTH"[..]), |_| Status::PreAuth),
        map(tag_no_case(&b"BYE"[..]), |_| Status::Bye),
    ))
    .parse(i)
}

fn status_text(i: &[u8]) -> IResult<&[u8], String> {
    map(opt(preceded(char(' '), take_till(is_eol))), |text| {
        text.map(lossy).unwrap_or_default()
    })
    .parse(i)
}

fn tag_token(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|c: u8| c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'.').parse(i)
}

/// One logical response line, following any `{n}` literals it announces.
/// Yields everything up to, not including, the final CRLF.
fn line_with_literals(i: &[u8]) -> IResult<&[u8], &[u8]> {
    let mut pos = 0;
    loop {
        let (rest, line) = take_till(is_eol).parse(&i[pos..])?;
        crlf.parse(rest)?;
        pos += line.len();
        match literal_len(line) {
            Some(n) => {
                let end = pos
                    .checked_add(2)
                    .and_then(|p| p.checked_add(n))
                    .ok_or_else(|| nom::Err::Failure(nom::error::Error::new(&i[pos..], ErrorKind::TooLarge)))?;
                if i.len() < end {
                    return Err(nom::Err::Incomplete(Needed::new(end - i.len())));
                }
                pos = end;
            }
            None => return Ok((&i[pos + 2..], &i[..pos])),
        }
    }
}

fn literal_len(line: &[u8]) -> Option<usize> {
    let inner = line.strip_suffix(b"}")?;
    let open = inner.iter().rposition(|&b| b == b'{')?;
    let digits = &inner[open + 1..];
    let digits = digits.strip_suffix(b"+").unwrap_or(digits);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    // All digits, so parsing only fails on overflow.
    Some(std::str::from_utf8(digits).ok()?.parse().unwrap_or(usize::MAX))
}

/// `{n}CRLF` followed by exactly `n` bytes.
pub(crate) fn literal(i: &[u8]) -> IResult<&[u8], &[u8]> {
    let (i, n) = delimited(char('{'), number, (opt(char('+')), char('}'), crlf)).parse(i)?;
    take(n as usize).parse(i)
}

/// Quoted string with `\"` and `\\` escapes removed.
pub(crate) fn quoted(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (i, _) = char('"').parse(i)?;
    let mut out = Vec::new();
    let mut escaped = false;
    for (idx, &b) in i.iter().enumerate() {
        if escaped {
            out.push(b);
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'"' => return Ok((&i[idx + 1..], out)),
            _ => out.push(b),
        }
    }
    Err(nom::Err::Incomplete(Needed::new(1)))
}

/// `NIL`, a quoted string or a literal.
pub(crate) fn nstring(i: &[u8]) -> IResult<&[u8], Option<Bytes>> {
    alt((
        map(tag_no_case(&b"NIL"[..]), |_| None),
        map(quoted, |s| Some(Bytes::from(s))),
        map(literal, |s| Some(Bytes::copy_from_slice(s))),
    ))
    .parse(i)
}

pub(crate) fn is_eol(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

pub(crate) fn lossy(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &[u8]) -> Response {
        match decode(input).unwrap() {
            Decoded::Response(resp, consumed) => {
                assert_eq!(consumed, input.len());
                resp
            }
            Decoded::Incomplete(_) => panic!("incomplete: {:?}", String::from_utf8_lossy(input)),
        }
    }

    #[test]
    fn test_greeting() {
        let resp = parse_one(b"* OK [CAPABILITY IMAP4rev1] Dovecot ready.\r\n");
        assert_eq!(
            resp,
            Response::Untagged {
                status: Status::Ok,
                text: "[CAPABILITY IMAP4rev1] Dovecot ready.".to_string(),
            }
        );
    }

    #[test]
    fn test_bye_without_text() {
        let resp = parse_one(b"* BYE\r\n");
        assert_eq!(
            resp,
            Response::Untagged {
                status: Status::Bye,
                text: String::new(),
            }
        );
    }

    #[test]
    fn test_tagged_no() {
        let resp = parse_one(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n");
        assert_eq!(
            resp,
            Response::Tagged {
                tag: "A0001".to_string(),
                status: Status::No,
                text: "[AUTHENTICATIONFAILED] Invalid credentials".to_string(),
            }
        );
        assert!(resp.completes("A0001"));
        assert!(!resp.completes("A0002"));
    }

    #[test]
    fn test_search_with_ids() {
        assert_eq!(parse_one(b"* SEARCH 2 84 882\r\n"), Response::Search(vec![2, 84, 882]));
    }

    #[test]
    fn test_empty_search() {
        assert_eq!(parse_one(b"* SEARCH\r\n"), Response::Search(vec![]));
    }

    #[test]
    fn test_search_with_trailing_modseq() {
        assert_eq!(
            parse_one(b"* SEARCH 4 9 (MODSEQ 917162500)\r\n"),
            Response::Search(vec![4, 9])
        );
    }

    #[test]
    fn test_other_data() {
        assert_eq!(parse_one(b"* 23 EXISTS\r\n"), Response::Data(Bytes::from_static(b"23 EXISTS")));
    }

    #[test]
    fn test_other_data_follows_literals() {
        let input = b"* LIST () \"/\" {5}\r\nIN\r\nX\r\n";
        assert_eq!(
            parse_one(input),
            Response::Data(Bytes::from_static(b"LIST () \"/\" {5}\r\nIN\r\nX"))
        );
    }

    #[test]
    fn test_continuation() {
        assert_eq!(
            parse_one(b"+ Ready for literal\r\n"),
            Response::Continuation {
                text: "Ready for literal".to_string(),
            }
        );
    }

    #[test]
    fn test_partial_line_is_incomplete() {
        assert!(matches!(decode(b"* SEARCH 1 2").unwrap(), Decoded::Incomplete(_)));
        assert!(matches!(decode(b"A00").unwrap(), Decoded::Incomplete(_)));
        assert!(matches!(decode(b"").unwrap(), Decoded::Incomplete(_)));
    }

    #[test]
    fn test_partial_literal_reports_missing_bytes() {
        match decode(b"* 1 FETCH (UID 7 BODY[] {10}\r\nabcd").unwrap() {
            Decoded::Incomplete(n) => assert_eq!(n, 6),
            other => panic!("expected incomplete, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_literal_is_rejected() {
        assert!(decode(b"* LIST () \"/\" {18446744073709551615}\r\nx").is_err());
        assert!(decode(b"* LIST () \"/\" {99999999999999999999999}\r\nx").is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode(b"!!! nonsense\r\n").is_err());
    }

    #[test]
    fn test_leaves_following_response_in_buffer() {
        let input = b"* SEARCH 3\r\nA0003 OK done\r\n";
        match decode(input).unwrap() {
            Decoded::Response(Response::Search(ids), consumed) => {
                assert_eq!(ids, vec![3]);
                assert_eq!(&input[consumed..], b"A0003 OK done\r\n");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
