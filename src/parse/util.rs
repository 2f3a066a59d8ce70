use std::str;

use nom::{self, IResult, Needed};

/// Parse an 8-byte, zero-padded ASCII name.  The logical string runs up to
/// the first zero byte, or all eight if none; it is canonicalized to upper
/// case on the way in (lump names are case-insensitive, and a few stock
/// patch names are stored lower-case).
pub fn name8(input: &[u8]) -> IResult<&[u8], String> {
    if input.len() < 8 {
        return Err(nom::Err::Incomplete(Needed::Size(8)));
    }

    let mut end = 8;
    for i in 0..8 {
        match input[i] {
            0 => {
                end = i;
                break;
            }
            32..=126 => {
                // printable, keep going
            }
            _ => {
                // not a name byte at all
                return Err(nom::Err::Error(nom::Context::Code(
                    &input[i..],
                    nom::ErrorKind::Custom(0),
                )));
            }
        }
    }

    let name = unsafe { str::from_utf8_unchecked(&input[..end]) };
    Ok((&input[8..], name.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::name8;

    #[test]
    fn stops_at_the_first_zero() {
        let (rest, name) = name8(b"E1M1\0\0\0\0tail").unwrap();
        assert_eq!(name, "E1M1");
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn takes_all_eight_bytes_without_a_terminator() {
        let (_, name) = name8(b"BLOODFAL").unwrap();
        assert_eq!(name, "BLOODFAL");
    }

    #[test]
    fn upper_cases_on_ingest() {
        let (_, name) = name8(b"w94_1\0\0\0").unwrap();
        assert_eq!(name, "W94_1");
    }

    #[test]
    fn rejects_short_input_and_control_bytes() {
        assert!(name8(b"SHORT").is_err());
        assert!(name8(b"BAD\x01NAME").is_err());
    }
}
