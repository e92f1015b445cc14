use nom::{
    IResult, Parser,
    branch::alt,
    bytes::streaming::{tag_no_case, take_till, take_while1},
    character::streaming::{char, crlf, digit1, space1, u32 as number},
    combinator::{map, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, preceded},
};

use super::{lossy, nstring, quoted};
use crate::types::{FetchItem, Flag, Response};

// `* 12 FETCH (UID 4827 BODY[] {2310}\r\n...)`
pub(super) fn fetch_data(i: &[u8]) -> IResult<&[u8], Response> {
    map(
        (
            number,
            tag_no_case(&b" FETCH ("[..]),
            separated_list0(char(' '), fetch_item),
            char(')'),
            crlf,
        ),
        |(seq, _, items, _, _)| Response::Fetch { seq, items },
    )
    .parse(i)
}

fn fetch_item(i: &[u8]) -> IResult<&[u8], FetchItem> {
    alt((
        map(preceded(tag_no_case(&b"UID "[..]), number), FetchItem::Uid),
        map(preceded(tag_no_case(&b"RFC822.SIZE "[..]), number), FetchItem::Rfc822Size),
        map(preceded(tag_no_case(&b"INTERNALDATE "[..]), quoted), |d| {
            FetchItem::InternalDate(lossy(&d))
        }),
        map(preceded(tag_no_case(&b"FLAGS "[..]), flag_list), FetchItem::Flags),
        map(
            preceded(
                (
                    tag_no_case(&b"BODY[]"[..]),
                    opt(delimited(char('<'), digit1, char('>'))),
                    char(' '),
                ),
                nstring,
            ),
            FetchItem::Body,
        ),
        map(preceded(tag_no_case(&b"RFC822 "[..]), nstring), FetchItem::Body),
        other_item,
    ))
    .parse(i)
}

fn flag_list(i: &[u8]) -> IResult<&[u8], Vec<Flag>> {
    delimited(
        char('('),
        separated_list0(
            char(' '),
            map(take_while1(is_flag_char), |f| Flag::from_atom(&lossy(f))),
        ),
        char(')'),
    )
    .parse(i)
}

// Anything else (`MODSEQ (12)`, `BODYSTRUCTURE (...)`, `BODY[HEADER] {n}`):
// keep the name, skip the value.
fn other_item(i: &[u8]) -> IResult<&[u8], FetchItem> {
    map((item_name, char(' '), skip_value), |(name, _, _)| {
        FetchItem::Other(lossy(name))
    })
    .parse(i)
}

fn item_name(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize((
        take_while1(|c: u8| is_atom_char(c) && c != b'[' && c != b'<'),
        opt((char('['), take_till(|c: u8| c == b']'), char(']'))),
        opt((char('<'), digit1, char('>'))),
    ))
    .parse(i)
}

fn skip_value(i: &[u8]) -> IResult<&[u8], ()> {
    alt((
        map(nstring, |_| ()),
        map(
            delimited(char('('), separated_list0(space1, skip_value), char(')')),
            |_| (),
        ),
        map(take_while1(is_atom_char), |_| ()),
    ))
    .parse(i)
}

fn is_atom_char(c: u8) -> bool {
    c > b' ' && c < 0x7f && !b"(){\"\\%*]".contains(&c)
}

fn is_flag_char(c: u8) -> bool {
    c > b' ' && c < 0x7f && c != b'(' && c != b')'
}
