//! Primitive content encoding.
//!
//! Primitives are written as their *content* only; the enclosing entry
//! supplies the length. A zero-length content is a blank value of the
//! entry's type.
//!
//! ```text
//! Int / UInt      trimmed big-endian, 1..=8 bytes
//! Enum            trimmed big-endian, 1..=2 bytes
//! Float / Double  IEEE-754 big-endian, 4 / 8 bytes
//! Real            [hint][trimmed mantissa]; Inf/-Inf/NaN are the hint alone
//! Date            [day][month][year u16]
//! Time            [hour][minute] (+[second]) (+[milli u16]) (+[micro u16]) (+[nano lo])
//!                 2/3/5/7/8 bytes; the 8-byte form keeps nano bits 8..10 in
//!                 bits 11..13 of the micro word
//! DateTime        Date followed by Time: 6/7/9/11/12 bytes
//! Qos             [timeliness<<5 | rate<<1 | dynamic] [time_info u16]? [rate_info u16]?
//! State           [stream<<3 | data] [code] [u15rb text]
//! Buffer/strings  raw bytes
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use omm_core::{
    real_hint, Data, DataState, DataType, Date, DateTime, Qos, QosRate, QosTimeliness, Real,
    State, StateCode, StreamState, Time,
};

use crate::error::CodecError;
use crate::wire_types::{
    put_buf15, put_int_trimmed, put_uint_trimmed, read_int_be, read_uint_be, Reader,
};

/// Hint byte bit that marks a blank Real, unless the hint is Inf/-Inf/NaN.
const BLANK_REAL_BIT: u8 = 0x20;

// ============================================================================
// Encode
// ============================================================================

/// Append the content bytes of a primitive value.
pub fn encode_primitive(data: &Data, out: &mut BytesMut) -> Result<(), CodecError> {
    match data {
        Data::Blank(t) => {
            if !t.is_primitive() {
                return Err(CodecError::UnsupportedType(*t, "blank primitive"));
            }
        }
        Data::Int(v) => put_int_trimmed(out, *v),
        Data::UInt(v) => put_uint_trimmed(out, *v),
        Data::Enum(v) => put_uint_trimmed(out, *v as u64),
        Data::Float(v) => out.put_f32(*v),
        Data::Double(v) => out.put_f64(*v),
        Data::Real(r) => encode_real(r, out)?,
        Data::Date(d) => {
            if !d.is_blank() {
                encode_date(d, out)?;
            }
        }
        Data::Time(t) => {
            if !t.is_blank() {
                encode_time(t, out)?;
            }
        }
        Data::DateTime(dt) => {
            if !dt.is_blank() {
                encode_date(&dt.date, out)?;
                encode_time(&dt.time, out)?;
            }
        }
        Data::Qos(q) => encode_qos(q, out)?,
        Data::State(s) => encode_state(s, out)?,
        Data::Buffer(b) | Data::Rmtes(b) => out.put_slice(b),
        Data::Ascii(s) | Data::Utf8(s) => out.put_slice(s.as_bytes()),
        other => {
            return Err(CodecError::UnsupportedType(other.data_type(), "primitive encoding"));
        }
    }
    Ok(())
}

/// Encode a primitive into exactly `width` bytes (fixed-width arrays).
pub fn encode_fixed_width(data: &Data, width: usize, out: &mut BytesMut) -> Result<(), CodecError> {
    match data {
        Data::Int(v) => {
            if !(1..=8).contains(&width) || !fits_signed(*v, width) {
                return Err(CodecError::InvalidData("fixed-width Int"));
            }
            out.put_slice(&v.to_be_bytes()[8 - width..]);
            Ok(())
        }
        Data::UInt(v) => put_fixed_unsigned(*v, width, out),
        Data::Enum(v) => put_fixed_unsigned(*v as u64, width, out),
        Data::Blank(_) => Err(CodecError::InvalidData("blank entry in fixed-width array")),
        _ => {
            let mut tmp = BytesMut::new();
            encode_primitive(data, &mut tmp)?;
            if tmp.len() != width {
                return Err(CodecError::InvalidData("fixed-width array item length"));
            }
            out.put_slice(&tmp);
            Ok(())
        }
    }
}

fn fits_signed(v: i64, width: usize) -> bool {
    if width >= 8 {
        return true;
    }
    let bits = (width * 8) as u32;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&v)
}

fn put_fixed_unsigned(v: u64, width: usize, out: &mut BytesMut) -> Result<(), CodecError> {
    if !(1..=8).contains(&width) || (width < 8 && v >> (width * 8) != 0) {
        return Err(CodecError::InvalidData("fixed-width UInt"));
    }
    out.put_slice(&v.to_be_bytes()[8 - width..]);
    Ok(())
}

fn encode_real(r: &Real, out: &mut BytesMut) -> Result<(), CodecError> {
    if !real_hint::is_valid(r.hint) {
        return Err(CodecError::InvalidRealHint(r.hint));
    }
    out.put_u8(r.hint);
    if !r.is_special() {
        put_int_trimmed(out, r.mantissa);
    }
    Ok(())
}

fn encode_date(d: &Date, out: &mut BytesMut) -> Result<(), CodecError> {
    if !d.is_valid() {
        return Err(CodecError::InvalidData("date"));
    }
    out.put_u8(d.day);
    out.put_u8(d.month);
    out.put_u16(d.year);
    Ok(())
}

fn encode_time(t: &Time, out: &mut BytesMut) -> Result<(), CodecError> {
    if !t.is_valid() {
        return Err(CodecError::InvalidData("time"));
    }
    out.put_u8(t.hour);
    out.put_u8(t.minute);
    if t.nanosecond != 0 {
        out.put_u8(t.second);
        out.put_u16(t.millisecond);
        let micro = t.microsecond | ((t.nanosecond & 0xFF00) << 3);
        out.put_u16(micro);
        out.put_u8(t.nanosecond as u8);
    } else if t.microsecond != 0 {
        out.put_u8(t.second);
        out.put_u16(t.millisecond);
        out.put_u16(t.microsecond);
    } else if t.millisecond != 0 {
        out.put_u8(t.second);
        out.put_u16(t.millisecond);
    } else if t.second != 0 {
        out.put_u8(t.second);
    }
    Ok(())
}

/// Qos bytes, shared with the message header encoder.
pub fn encode_qos(q: &Qos, out: &mut BytesMut) -> Result<(), CodecError> {
    if q.timeliness == QosTimeliness::Unspecified || q.rate == QosRate::Unspecified {
        return Err(CodecError::InvalidData("qos timeliness/rate unspecified"));
    }
    let b = ((q.timeliness as u8) << 5) | ((q.rate as u8) << 1) | q.dynamic as u8;
    out.put_u8(b);
    if q.timeliness == QosTimeliness::Delayed {
        out.put_u16(q.time_info);
    }
    if q.rate == QosRate::TimeConflated {
        out.put_u16(q.rate_info);
    }
    Ok(())
}

/// State bytes, shared with the message header encoder.
pub fn encode_state(s: &State, out: &mut BytesMut) -> Result<(), CodecError> {
    if s.stream_state == StreamState::Unspecified {
        return Err(CodecError::InvalidData("state stream state unspecified"));
    }
    out.put_u8(((s.stream_state as u8) << 3) | (s.data_state as u8 & 0x07));
    out.put_u8(s.code.0);
    put_buf15(out, s.text.as_bytes(), "state text")
}

// ============================================================================
// Decode
// ============================================================================

/// Decode primitive content of the given type.
pub fn decode_primitive(t: DataType, content: &[u8]) -> Result<Data, CodecError> {
    if content.is_empty() {
        return Ok(Data::Blank(t));
    }

    let data = match t {
        DataType::Int => Data::Int(read_int_be(content)?),
        DataType::UInt => Data::UInt(read_uint_be(content)?),
        DataType::Enum => {
            if content.len() > 2 {
                return Err(CodecError::InvalidData("enum length"));
            }
            Data::Enum(read_uint_be(content)? as u16)
        }
        DataType::Float => {
            let b: [u8; 4] = content
                .try_into()
                .map_err(|_| CodecError::InvalidData("float length"))?;
            Data::Float(f32::from_be_bytes(b))
        }
        DataType::Double => {
            let b: [u8; 8] = content
                .try_into()
                .map_err(|_| CodecError::InvalidData("double length"))?;
            Data::Double(f64::from_be_bytes(b))
        }
        DataType::Real => decode_real(content)?,
        DataType::Date => {
            let d = decode_date(&mut Reader::new(content))?;
            if content.len() != 4 {
                return Err(CodecError::InvalidData("date length"));
            }
            if d.is_blank() {
                Data::Blank(DataType::Date)
            } else {
                Data::Date(d)
            }
        }
        DataType::Time => {
            let time = decode_time(content)?;
            if time.is_blank() {
                Data::Blank(DataType::Time)
            } else {
                Data::Time(time)
            }
        }
        DataType::DateTime => {
            if content.len() < 6 {
                return Err(CodecError::Incomplete);
            }
            let date = decode_date(&mut Reader::new(&content[..4]))?;
            let time = decode_time(&content[4..])?;
            let dt = DateTime::new(date, time);
            if dt.is_blank() {
                Data::Blank(DataType::DateTime)
            } else {
                Data::DateTime(dt)
            }
        }
        DataType::Qos => Data::Qos(decode_qos(&mut Reader::new(content))?),
        DataType::State => Data::State(decode_state(&mut Reader::new(content))?),
        DataType::Buffer => Data::Buffer(Bytes::copy_from_slice(content)),
        DataType::RmtesString => Data::Rmtes(Bytes::copy_from_slice(content)),
        DataType::AsciiString => Data::Ascii(utf8(content, "ascii string")?),
        DataType::Utf8String => Data::Utf8(utf8(content, "utf8 string")?),
        other => return Err(CodecError::UnsupportedType(other, "primitive decoding")),
    };
    Ok(data)
}

pub(crate) fn utf8(content: &[u8], what: &'static str) -> Result<String, CodecError> {
    std::str::from_utf8(content)
        .map(str::to_string)
        .map_err(|_| CodecError::InvalidData(what))
}

fn decode_real(content: &[u8]) -> Result<Data, CodecError> {
    let hint = content[0] & 0x3F;
    match hint {
        real_hint::INFINITY | real_hint::NEG_INFINITY | real_hint::NOT_A_NUMBER => {
            Ok(Data::Real(Real::new(0, hint)))
        }
        _ if content[0] & BLANK_REAL_BIT != 0 => Ok(Data::Blank(DataType::Real)),
        _ if content.len() == 1 => Ok(Data::Blank(DataType::Real)),
        _ => {
            let hint = content[0] & 0x1F;
            if !real_hint::is_valid(hint) {
                return Err(CodecError::InvalidRealHint(hint));
            }
            Ok(Data::Real(Real::new(read_int_be(&content[1..])?, hint)))
        }
    }
}

fn decode_date(r: &mut Reader<'_>) -> Result<Date, CodecError> {
    let day = r.u8()?;
    let month = r.u8()?;
    let year = r.u16()?;
    Ok(Date::new(year, month, day))
}

fn decode_time(content: &[u8]) -> Result<Time, CodecError> {
    let mut r = Reader::new(content);
    let mut t = Time::hms(0, 0, 0);
    match content.len() {
        2 | 3 | 5 | 7 | 8 => {}
        _ => return Err(CodecError::InvalidData("time length")),
    }

    t.hour = r.u8()?;
    t.minute = r.u8()?;
    if content.len() >= 3 {
        t.second = r.u8()?;
    }
    if content.len() >= 5 {
        t.millisecond = r.u16()?;
    }
    if content.len() >= 7 {
        let micro = r.u16()?;
        t.microsecond = micro & 0x07FF;
        if content.len() == 8 {
            t.nanosecond = ((micro & 0x3800) >> 3) | r.u8()? as u16;
        }
    }

    // A blank prefix means the omitted tail is blank too.
    let blank = Time::BLANK;
    let prefix_blank = t.hour == blank.hour
        && t.minute == blank.minute
        && (content.len() < 3 || t.second == blank.second)
        && (content.len() < 5 || t.millisecond == blank.millisecond)
        && (content.len() < 7 || t.microsecond == blank.microsecond);
    if prefix_blank {
        if content.len() < 3 {
            t.second = blank.second;
        }
        if content.len() < 5 {
            t.millisecond = blank.millisecond;
        }
        if content.len() < 7 {
            t.microsecond = blank.microsecond;
        }
        if content.len() < 8 {
            t.nanosecond = blank.nanosecond;
        }
    }
    Ok(t)
}

/// Qos from a header or entry.
pub fn decode_qos(r: &mut Reader<'_>) -> Result<Qos, CodecError> {
    let b = r.u8()?;
    let timeliness =
        QosTimeliness::from_u8(b >> 5).ok_or(CodecError::InvalidData("qos timeliness"))?;
    let rate = QosRate::from_u8((b >> 1) & 0x0F).ok_or(CodecError::InvalidData("qos rate"))?;
    let mut q = Qos::new(timeliness, rate);
    q.dynamic = b & 0x01 != 0;
    if timeliness == QosTimeliness::Delayed {
        q.time_info = r.u16()?;
    }
    if rate == QosRate::TimeConflated {
        q.rate_info = r.u16()?;
    }
    Ok(q)
}

/// State from a header or entry.
pub fn decode_state(r: &mut Reader<'_>) -> Result<State, CodecError> {
    let b = r.u8()?;
    let stream_state =
        StreamState::from_u8(b >> 3).ok_or(CodecError::InvalidData("stream state"))?;
    let data_state = DataState::from_u8(b & 0x07).ok_or(CodecError::InvalidData("data state"))?;
    let code = StateCode(r.u8()?);
    let text = utf8(r.buf15()?, "state text")?;
    Ok(State {
        stream_state,
        data_state,
        code,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(d: &Data) -> Vec<u8> {
        let mut out = BytesMut::new();
        encode_primitive(d, &mut out).unwrap();
        out.to_vec()
    }

    fn round_trip(d: Data) {
        let bytes = content(&d);
        assert_eq!(decode_primitive(d.data_type(), &bytes).unwrap(), d, "bytes {:02X?}", bytes);
    }

    #[test]
    fn real_wire_forms() {
        let r = Data::Real(Real::new(12345, real_hint::EXPONENT_2));
        assert_eq!(content(&r), vec![12, 0x30, 0x39]);
        round_trip(r);

        assert_eq!(content(&Data::Real(Real::new(0, real_hint::NEG_INFINITY))), vec![34]);
        round_trip(Data::Real(Real::new(0, real_hint::NOT_A_NUMBER)));

        assert_eq!(decode_primitive(DataType::Real, &[12]).unwrap(), Data::Blank(DataType::Real));
        assert_eq!(
            decode_primitive(DataType::Real, &[0x20, 0x01]).unwrap(),
            Data::Blank(DataType::Real)
        );
        assert!(encode_primitive(&Data::Real(Real::new(1, 31)), &mut BytesMut::new()).is_err());
    }

    #[test]
    fn real_blank_bit_wins_over_the_mantissa() {
        for bytes in [&[0x2C, 0x01][..], &[0x2E, 0x12, 0x34], &[0x3E, 0x01]] {
            assert_eq!(
                decode_primitive(DataType::Real, bytes).unwrap(),
                Data::Blank(DataType::Real),
                "bytes {:02X?}",
                bytes
            );
        }
        assert_eq!(
            decode_primitive(DataType::Real, &[0x0C, 0x01]).unwrap(),
            Data::Real(Real::new(1, real_hint::EXPONENT_2))
        );
    }

    #[test]
    fn special_reals_have_no_mantissa() {
        let inf = Real::new(5, real_hint::INFINITY);
        assert_eq!(inf.mantissa, 0);
        assert_eq!(content(&Data::Real(inf)), vec![33]);
        assert_eq!(decode_primitive(DataType::Real, &[33]).unwrap(), Data::Real(inf));
        round_trip(Data::Real(Real::new(-7, real_hint::NEG_INFINITY)));
    }

    #[test]
    fn time_length_follows_precision() {
        assert_eq!(content(&Data::Time(Time::hms(10, 5, 0))).len(), 2);
        assert_eq!(content(&Data::Time(Time::hms(10, 5, 1))).len(), 3);
        assert_eq!(content(&Data::Time(Time::new(10, 5, 1, 7, 0, 0))).len(), 5);
        assert_eq!(content(&Data::Time(Time::new(10, 5, 1, 7, 8, 0))).len(), 7);
        assert_eq!(content(&Data::Time(Time::new(10, 5, 1, 7, 8, 999))).len(), 8);

        round_trip(Data::Time(Time::new(23, 59, 59, 999, 999, 999)));
        round_trip(Data::Time(Time::new(1, 2, 0, 0, 0, 1)));
        round_trip(Data::Time(Time::hms(0, 0, 0)));
    }

    #[test]
    fn blank_time_prefix_blanks_the_tail() {
        assert_eq!(
            decode_primitive(DataType::Time, &[255, 255]).unwrap(),
            Data::Blank(DataType::Time)
        );
        assert!(content(&Data::Time(Time::BLANK)).is_empty());
    }

    #[test]
    fn date_and_datetime() {
        let d = Date::new(2012, 6, 1);
        assert_eq!(content(&Data::Date(d)), vec![1, 6, 0x07, 0xDC]);
        round_trip(Data::Date(d));

        let dt = DateTime::new(d, Time::new(10, 11, 12, 13, 0, 0));
        assert_eq!(content(&Data::DateTime(dt)).len(), 9);
        round_trip(Data::DateTime(dt));

        assert!(encode_primitive(&Data::Date(Date::new(2023, 2, 30)), &mut BytesMut::new()).is_err());
    }

    #[test]
    fn qos_and_state() {
        let mut q = Qos::new(QosTimeliness::Delayed, QosRate::TimeConflated);
        q.time_info = 500;
        q.rate_info = 1000;
        q.dynamic = true;
        assert_eq!(content(&Data::Qos(q)), vec![0x67, 0x01, 0xF4, 0x03, 0xE8]);
        round_trip(Data::Qos(q));

        assert!(encode_primitive(&Data::Qos(Qos::default()), &mut BytesMut::new()).is_err());

        let s = State::open_ok("All is well").with_code(StateCode::NONE);
        round_trip(Data::State(s));
        assert!(encode_primitive(&Data::State(State::default()), &mut BytesMut::new()).is_err());
    }

    #[test]
    fn integers_and_floats() {
        round_trip(Data::Int(-32768));
        round_trip(Data::UInt(u64::MAX));
        round_trip(Data::Enum(65535));
        round_trip(Data::Float(1.5));
        round_trip(Data::Double(-2.25));
        assert!(decode_primitive(DataType::Enum, &[1, 2, 3]).is_err());
        assert!(decode_primitive(DataType::Float, &[1, 2, 3]).is_err());
    }

    #[test]
    fn blank_is_zero_length() {
        for t in [DataType::Int, DataType::UInt, DataType::Real, DataType::AsciiString] {
            assert!(content(&Data::Blank(t)).is_empty());
            assert_eq!(decode_primitive(t, &[]).unwrap(), Data::Blank(t));
        }
    }

    #[test]
    fn fixed_width_integers_pad() {
        let mut out = BytesMut::new();
        encode_fixed_width(&Data::Int(-2), 4, &mut out).unwrap();
        assert_eq!(&out[..], &[0xFF, 0xFF, 0xFF, 0xFE]);
        assert!(encode_fixed_width(&Data::UInt(0x1_0000), 2, &mut BytesMut::new()).is_err());
        assert!(encode_fixed_width(&Data::Blank(DataType::Int), 2, &mut BytesMut::new()).is_err());
    }
}
