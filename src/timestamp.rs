//! RFC 1123 / RFC 850 / asctime date parsing (C3), dispatching on the
//! weekday prefix exactly as
//! `original_source/src/http/parser/utility/httpdate.cpp` does: a long
//! weekday name selects RFC 850, a short weekday followed by whitespace
//! selects asctime, and a short weekday followed by `,` selects RFC 1123.

use crate::trie::Trie;

/// Sentinel returned by every parse entry point on failure, per `spec.md`
/// §3 ("negative values signal invalid").
pub const INVALID_TIMESTAMP: i64 = -1;

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn get(&mut self) -> Option<u8> {
        if self.pos < self.data.len() {
            let b = self.data[self.pos];
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }

    fn get_non_whitespace(&mut self) -> Option<u8> {
        loop {
            match self.get() {
                Some(b' ') | Some(b'\t') => continue,
                other => return other,
            }
        }
    }

    /// Consumes consecutive ASCII digits, starting with the byte already
    /// held in `character`. Leaves `character` holding the first
    /// non-digit byte encountered (or `None` at end of input). Returns
    /// `-1` if `character` was not itself a digit.
    fn get_unsigned_integer(&mut self, character: &mut Option<u8>) -> i64 {
        let mut value: i64 = 0;
        let mut any = false;

        while let Some(b) = *character {
            if b.is_ascii_digit() {
                any = true;
                value = value * 10 + (b - b'0') as i64;
                *character = self.get();
            } else {
                break;
            }
        }

        if any {
            value
        } else {
            -1
        }
    }
}

fn skip_separator(cursor: &mut Cursor<'_>, character: &mut Option<u8>) {
    if *character == Some(b' ') || *character == Some(b'\n') {
        *character = cursor.get_non_whitespace();
    }
}

fn month_trie() -> Trie<i64> {
    let mut t = Trie::new(true);
    for (name, value) in [
        ("jan", 1i64), ("feb", 2), ("mar", 3), ("apr", 4), ("may", 5), ("jun", 6),
        ("jul", 7), ("aug", 8), ("sep", 9), ("oct", 10), ("nov", 11), ("dec", 12),
    ] {
        t.insert(name.as_bytes(), value);
    }
    t
}

fn weekday_trie() -> Trie<(i8, bool)> {
    let mut t = Trie::new(true);
    for (short, long, value) in [
        ("sun", "sunday", 0i8), ("mon", "monday", 1), ("tue", "tuesday", 2),
        ("wed", "wednesday", 3), ("thu", "thursday", 4), ("fri", "friday", 5),
        ("sat", "saturday", 6),
    ] {
        t.insert(short.as_bytes(), (value, false));
        t.insert(long.as_bytes(), (value, true));
    }
    t
}

/// Reads a trie token starting at the byte already held in `character`,
/// consuming until the trie stops matching (mirroring how the original's
/// `trie<T>::parse` walks the lexer one character at a time).
fn parse_token_via_trie<V: Clone>(
    trie: &Trie<V>,
    cursor: &mut Cursor<'_>,
    character: &mut Option<u8>,
) -> Option<V> {
    let mut buf = Vec::new();
    if let Some(c) = character {
        buf.push(*c);
    }
    // Greedily accumulate alphabetic bytes; the trie's longest-match will
    // decide how many of them actually formed a token.
    let mut lookahead_pos = cursor.pos;
    while lookahead_pos < cursor.data.len() && cursor.data[lookahead_pos].is_ascii_alphabetic() {
        buf.push(cursor.data[lookahead_pos]);
        lookahead_pos += 1;
    }

    let m = trie.find(&buf, buf.len());
    if m.used_size == 0 {
        return None;
    }

    // Advance the real cursor/character by (used_size - 1) more bytes,
    // since `character` already accounted for the first one.
    let mut advanced = 1usize.min(m.used_size);
    while advanced < m.used_size {
        cursor.pos += 1;
        advanced += 1;
    }
    *character = if cursor.pos < cursor.data.len() {
        let b = cursor.data[cursor.pos];
        cursor.pos += 1;
        Some(b)
    } else {
        cursor.pos += 1;
        None
    };

    m.value.cloned()
}

fn parse_month(cursor: &mut Cursor<'_>, character: &mut Option<u8>) -> i64 {
    let trie = month_trie();
    parse_token_via_trie(&trie, cursor, character).unwrap_or(-1)
}

fn parse_gmt(cursor: &mut Cursor<'_>, character: &mut Option<u8>) -> bool {
    let mut t = Trie::new(true);
    t.insert(b"gmt", true);
    parse_token_via_trie(&t, cursor, character).unwrap_or(false)
}

fn parse_time(cursor: &mut Cursor<'_>, character: &mut Option<u8>) -> i64 {
    let hour = cursor.get_unsigned_integer(character);
    if hour < 0 || hour > 23 || *character != Some(b':') {
        return -1;
    }
    *character = cursor.get_non_whitespace();
    let minute = cursor.get_unsigned_integer(character);
    if minute < 0 || minute > 59 || *character != Some(b':') {
        return -1;
    }
    *character = cursor.get_non_whitespace();
    let second = cursor.get_unsigned_integer(character);
    if second < 0 || second > 59 {
        return -1;
    }
    (60 * ((60 * hour) + minute)) + second
}

fn day_of_the_year(day: i64, month: i64, year: i64) -> i64 {
    let mut result = day;
    if month < 3 {
        result += (306 * month - 301) / 10;
    } else {
        result += (306 * month - 913) / 10;
        if year % 4 == 0 {
            result += 60;
        } else {
            result += 59;
        }
    }
    result
}

/// Sums year-to-date plus day-of-year using the pre-2100 leap rule
/// (`year % 4 == 0`), per `spec.md` §3/§4.3.
fn seconds_since_epoch(second_of_day: i64, day: i64, month: i64, year: i64) -> i64 {
    let second_of_year = second_of_day + ((day_of_the_year(day, month, year) - 1) * 86400);
    let year_seconds_since_epoch =
        ((year - 1970) * 86400 * 365) + (((year - (1972 - 3)) / 4) * 86400);
    year_seconds_since_epoch + second_of_year
}

fn is_valid_epoch_date(day: i64, month: i64, year: i64) -> bool {
    if year < 1970 || month < 1 || month > 12 || day < 1 {
        return false;
    }
    if month < 8 && month % 2 == 1 && day > 31 {
        return false;
    }
    if month < 8 && month % 2 == 0 && day > 30 {
        return false;
    }
    if month > 7 && month % 2 == 0 && day > 31 {
        return false;
    }
    if month > 7 && month % 2 == 1 && day > 30 {
        return false;
    }
    if month == 2 && year % 4 != 0 && day > 28 {
        return false;
    }
    if month == 2 && year % 4 == 0 && day > 29 {
        return false;
    }
    true
}

fn parse_rfc1123_date_time(cursor: &mut Cursor<'_>, character: &mut Option<u8>) -> i64 {
    *character = cursor.get_non_whitespace();
    let day = cursor.get_unsigned_integer(character);

    skip_separator(cursor, character);
    let month = parse_month(cursor, character);

    skip_separator(cursor, character);
    let year = cursor.get_unsigned_integer(character);

    skip_separator(cursor, character);
    let second_of_day = parse_time(cursor, character);
    if second_of_day < 0 {
        return -1;
    }

    skip_separator(cursor, character);
    if !parse_gmt(cursor, character) {
        return -1;
    }

    if !is_valid_epoch_date(day, month, year) {
        return -1;
    }
    seconds_since_epoch(second_of_day, day, month, year)
}

fn parse_rfc850_date_time(cursor: &mut Cursor<'_>, character: &mut Option<u8>) -> i64 {
    skip_separator(cursor, character);
    if *character != Some(b',') {
        return -1;
    }
    *character = cursor.get_non_whitespace();
    let day = cursor.get_unsigned_integer(character);

    if *character != Some(b'-') {
        return -1;
    }
    *character = cursor.get();
    let month = parse_month(cursor, character);

    if *character != Some(b'-') {
        return -1;
    }
    *character = cursor.get();
    let two_digit_year = cursor.get_unsigned_integer(character);
    let year = 1900 + two_digit_year;
    if year < 1900 || year > 1999 {
        return -1;
    }

    skip_separator(cursor, character);
    let second_of_day = parse_time(cursor, character);

    skip_separator(cursor, character);
    if !parse_gmt(cursor, character) {
        return -1;
    }

    if !is_valid_epoch_date(day, month, year) {
        return -1;
    }
    seconds_since_epoch(second_of_day, day, month, year)
}

fn parse_asctime_date_time(cursor: &mut Cursor<'_>, character: &mut Option<u8>) -> i64 {
    skip_separator(cursor, character);
    let month = parse_month(cursor, character);

    *character = cursor.get_non_whitespace();
    let day = cursor.get_unsigned_integer(character);

    *character = cursor.get_non_whitespace();
    let second_of_day = parse_time(cursor, character);

    *character = cursor.get_non_whitespace();
    let year = cursor.get_unsigned_integer(character);

    if *character == Some(b' ') {
        *character = cursor.get_non_whitespace();
    }

    if !is_valid_epoch_date(day, month, year) {
        return -1;
    }
    seconds_since_epoch(second_of_day, day, month, year)
}

/// Parses any of the three supported HTTP date formats, returning epoch
/// seconds, or [`INVALID_TIMESTAMP`] if the input matches none of them.
pub fn parse_timestamp(input: &[u8]) -> i64 {
    let mut cursor = Cursor::new(input);
    let mut character = cursor.get();

    let weekday_trie = weekday_trie();
    let (_, is_long_format) = match parse_token_via_trie(&weekday_trie, &mut cursor, &mut character) {
        Some(v) => v,
        None => (-1i8, false),
    };

    if is_long_format {
        parse_rfc850_date_time(&mut cursor, &mut character)
    } else if character == Some(b' ') || character == Some(b'\t') {
        parse_asctime_date_time(&mut cursor, &mut character)
    } else {
        parse_rfc1123_date_time(&mut cursor, &mut character)
    }
}
