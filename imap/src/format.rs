use chrono::NaiveDate;

pub(crate) fn quote_astring(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push('"');
    for ch in input.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Whether `input` can go on the wire as a quoted string. CR or LF would end
/// the command line early; NUL is never allowed.
pub(crate) fn is_quotable(input: &str) -> bool {
    !input.contains(['\r', '\n', '\0'])
}

/// RFC 3501 `date`: `d-Mon-yyyy` with English month abbreviations.
pub(crate) fn imap_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}
