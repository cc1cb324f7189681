use super::DecodeError;

/// TIMESTAMP cells are epoch seconds in exponent notation, we want milliseconds.
const SECONDS_TO_MILLIS_EXPONENT: i64 = 3;

/// Parses a TIMESTAMP cell literal of the form `<mantissa>E<exponent>` (i.e.
/// `"1.422943323461E9"`) into integer milliseconds since the unix epoch,
/// truncating toward zero.
///
/// The decimal point is shifted on the digits themselves, so the result never
/// picks up binary floating point error.
pub fn parse_exponential_timestamp(literal: &str) -> Result<i64, DecodeError> {
    let invalid = || DecodeError::InvalidTimestampFormat(literal.into());

    let (mantissa, exponent) = literal.split_once(['E', 'e']).ok_or_else(invalid)?;
    let (integral, fraction) = mantissa.split_once('.').ok_or_else(invalid)?;

    let exponent: i64 = exponent.parse().map_err(|_| invalid())?;

    let (negative, integral) = match integral.as_bytes().first() {
        Some(b'-') => (true, &integral[1..]),
        Some(b'+') => (false, &integral[1..]),
        _ => (false, integral),
    };

    if integral.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }

    let mut digits: i128 = 0;
    for byte in integral.bytes().chain(fraction.bytes()) {
        if !byte.is_ascii_digit() {
            return Err(invalid());
        }

        digits = digits
            .checked_mul(10)
            .and_then(|value| value.checked_add(i128::from(byte - b'0')))
            .ok_or_else(invalid)?;
    }

    let shift = exponent
        .checked_add(SECONDS_TO_MILLIS_EXPONENT)
        .and_then(|shift| shift.checked_sub(fraction.len() as i64))
        .ok_or_else(invalid)?;

    let magnitude = if shift >= 0 {
        pow10(shift)
            .and_then(|factor| digits.checked_mul(factor))
            .ok_or_else(invalid)?
    } else {
        // a divisor too large to represent truncates everything away
        pow10(-shift).map_or(0, |divisor| digits / divisor)
    };

    let millis = if negative { -magnitude } else { magnitude };

    i64::try_from(millis).map_err(|_| invalid())
}

fn pow10(exponent: i64) -> Option<i128> {
    10_i128.checked_pow(u32::try_from(exponent).ok()?)
}
