//! Hessian 2.0 object codec.
//!
//! Covers the part of the format Dubbo providers exchange: compact
//! ints/longs/doubles, chunked strings and binaries, typed and untyped
//! lists and maps, class definitions with object instances, back references
//! and dates. String lengths count UTF-16 units, as Java does.

use std::convert::TryFrom;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};

use crate::{Error, ErrorKind, ObjectCodec, Result, Value};

const CHUNK_LEN: usize = 0x8000;
const MAX_DEPTH: usize = 256;
const REPLACEMENT: u32 = 0xfffd;

fn is_high_surrogate(unit: u16) -> bool {
    (0xd800..=0xdbff).contains(&unit)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Hessian2;

impl Hessian2 {
    pub fn new() -> Hessian2 {
        Hessian2
    }
}

impl ObjectCodec for Hessian2 {
    fn write(&self, values: &[&Value]) -> Result<Vec<u8>> {
        let mut enc = Encoder::default();
        for v in values {
            enc.write_value(v)?;
        }
        Ok(enc.buf.to_vec())
    }

    fn read(&self, data: &[u8]) -> Result<Value> {
        Decoder::new(data).read_value()
    }

    fn read_all(&self, data: &[u8]) -> Result<Vec<Value>> {
        let mut dec = Decoder::new(data);
        let mut values = Vec::new();
        while dec.pos < data.len() {
            values.push(dec.read_value()?);
        }
        Ok(values)
    }
}

#[derive(Default)]
struct Encoder {
    buf: BytesMut,
    types: Vec<String>,
    classes: Vec<(String, Vec<String>)>,
}

impl Encoder {
    fn write_value(&mut self, v: &Value) -> Result<()> {
        match v {
            Value::Null => self.buf.put_u8(b'N'),
            Value::Bool(true) => self.buf.put_u8(b'T'),
            Value::Bool(false) => self.buf.put_u8(b'F'),
            Value::Int(i) => self.write_int(*i),
            Value::Long(l) => self.write_long(*l),
            Value::Double(d) => self.write_double(*d),
            Value::String(s) => self.write_string(s),
            Value::Bytes(b) => self.write_bytes(b),
            Value::Date(ms) => {
                self.buf.put_u8(0x4a);
                self.buf.put_i64(*ms);
            }
            Value::List { class, items } => {
                let len = items.len();
                match class {
                    Some(t) if len <= 7 => {
                        self.buf.put_u8(0x70 + len as u8);
                        self.write_type(t);
                    }
                    Some(t) => {
                        self.buf.put_u8(b'V');
                        self.write_type(t);
                        self.write_int(len as i32);
                    }
                    None if len <= 7 => self.buf.put_u8(0x78 + len as u8),
                    None => {
                        self.buf.put_u8(b'X');
                        self.write_int(len as i32);
                    }
                }
                for item in items {
                    self.write_value(item)?;
                }
            }
            Value::Map { class, entries } => {
                match class.as_deref() {
                    None | Some("java.util.HashMap") | Some("java.util.Map") => {
                        self.buf.put_u8(b'H')
                    }
                    Some(t) => {
                        self.buf.put_u8(b'M');
                        self.write_type(t);
                    }
                }
                for (k, v) in entries {
                    self.write_value(k)?;
                    self.write_value(v)?;
                }
                self.buf.put_u8(b'Z');
            }
            Value::Object { class, fields } => {
                let idx = self.class_def(class, fields);
                if idx <= 15 {
                    self.buf.put_u8(0x60 + idx as u8);
                } else {
                    self.buf.put_u8(b'O');
                    self.write_int(idx as i32);
                }
                for (_, v) in fields {
                    self.write_value(v)?;
                }
            }
        }
        Ok(())
    }

    fn write_int(&mut self, v: i32) {
        if (-16..=47).contains(&v) {
            self.buf.put_u8((0x90 + v) as u8);
        } else if (-2048..=2047).contains(&v) {
            self.buf.put_u8((0xc8 + (v >> 8)) as u8);
            self.buf.put_u8(v as u8);
        } else if (-262_144..=262_143).contains(&v) {
            self.buf.put_u8((0xd4 + (v >> 16)) as u8);
            self.buf.put_u16(v as u16);
        } else {
            self.buf.put_u8(b'I');
            self.buf.put_i32(v);
        }
    }

    fn write_long(&mut self, v: i64) {
        if (-8..=15).contains(&v) {
            self.buf.put_u8((0xe0 + v) as u8);
        } else if (-2048..=2047).contains(&v) {
            self.buf.put_u8((0xf8 + (v >> 8)) as u8);
            self.buf.put_u8(v as u8);
        } else if (-262_144..=262_143).contains(&v) {
            self.buf.put_u8((0x3c + (v >> 16)) as u8);
            self.buf.put_u16(v as u16);
        } else if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
            self.buf.put_u8(0x59);
            self.buf.put_i32(v as i32);
        } else {
            self.buf.put_u8(b'L');
            self.buf.put_i64(v);
        }
    }

    fn write_double(&mut self, d: f64) {
        if d == 0.0 {
            self.buf.put_u8(0x5b);
        } else if d == 1.0 {
            self.buf.put_u8(0x5c);
        } else if d.fract() == 0.0 && (-128.0..=127.0).contains(&d) {
            self.buf.put_u8(0x5d);
            self.buf.put_i8(d as i8);
        } else if d.fract() == 0.0 && (-32768.0..=32767.0).contains(&d) {
            self.buf.put_u8(0x5e);
            self.buf.put_i16(d as i16);
        } else {
            self.buf.put_u8(b'D');
            self.buf.put_f64(d);
        }
    }

    /// Strings go out the way Java writes them: lengths count UTF-16 units
    /// and each unit is encoded on its own, so a surrogate pair becomes two
    /// 3 byte sequences.
    fn write_string(&mut self, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        if units.is_empty() {
            self.buf.put_u8(0x00);
            return;
        }
        let mut rest = &units[..];
        while !rest.is_empty() {
            let mut len = rest.len().min(CHUNK_LEN);
            // never split a surrogate pair across chunks
            if len < rest.len() && is_high_surrogate(rest[len - 1]) {
                len -= 1;
            }
            let (chunk, tail) = rest.split_at(len);
            if !tail.is_empty() {
                self.buf.put_u8(b'R');
                self.buf.put_u16(len as u16);
            } else if len <= 31 {
                self.buf.put_u8(len as u8);
            } else if len <= 1023 {
                self.buf.put_u8(0x30 + (len >> 8) as u8);
                self.buf.put_u8(len as u8);
            } else {
                self.buf.put_u8(b'S');
                self.buf.put_u16(len as u16);
            }
            for &unit in chunk {
                self.put_utf16_unit(unit);
            }
            rest = tail;
        }
    }

    fn put_utf16_unit(&mut self, unit: u16) {
        let u = unit as u32;
        if u < 0x80 {
            self.buf.put_u8(u as u8);
        } else if u < 0x800 {
            self.buf.put_u8((0xc0 | u >> 6) as u8);
            self.buf.put_u8((0x80 | u & 0x3f) as u8);
        } else {
            self.buf.put_u8((0xe0 | u >> 12) as u8);
            self.buf.put_u8((0x80 | (u >> 6) & 0x3f) as u8);
            self.buf.put_u8((0x80 | u & 0x3f) as u8);
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        let mut chunks = b.chunks(CHUNK_LEN).peekable();
        if chunks.peek().is_none() {
            self.buf.put_u8(0x20);
            return;
        }
        while let Some(chunk) = chunks.next() {
            let len = chunk.len();
            if chunks.peek().is_some() {
                self.buf.put_u8(b'A');
                self.buf.put_u16(len as u16);
            } else if len <= 15 {
                self.buf.put_u8(0x20 + len as u8);
            } else if len <= 1023 {
                self.buf.put_u8(0x34 + (len >> 8) as u8);
                self.buf.put_u8(len as u8);
            } else {
                self.buf.put_u8(b'B');
                self.buf.put_u16(len as u16);
            }
            self.buf.put_slice(chunk);
        }
    }

    fn write_type(&mut self, t: &str) {
        match self.types.iter().position(|x| x == t) {
            Some(idx) => self.write_int(idx as i32),
            None => {
                self.types.push(t.to_owned());
                self.write_string(t);
            }
        }
    }

    /// Returns the index of the class definition, emitting it first if new.
    fn class_def(&mut self, class: &str, fields: &[(String, Value)]) -> usize {
        let names: Vec<String> = fields.iter().map(|(k, _)| k.clone()).collect();
        if let Some(idx) = self
            .classes
            .iter()
            .position(|(c, f)| c == class && *f == names)
        {
            return idx;
        }
        self.buf.put_u8(b'C');
        self.write_string(class);
        self.write_int(names.len() as i32);
        for name in &names {
            self.write_string(name);
        }
        self.classes.push((class.to_owned(), names));
        self.classes.len() - 1
    }
}

#[derive(Clone)]
struct ClassDef {
    name: String,
    fields: Vec<String>,
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
    types: Vec<String>,
    classes: Vec<ClassDef>,
    refs: Vec<Value>,
}

fn codec_err<M: std::fmt::Display>(msg: M) -> Error {
    Error::new(ErrorKind::Codec, msg)
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Decoder<'a> {
        Decoder {
            data,
            pos: 0,
            depth: 0,
            types: Vec::new(),
            classes: Vec::new(),
            refs: Vec::new(),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(codec_err(format!(
                "unexpected end of hessian data at offset {}",
                self.pos
            )));
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| codec_err("unexpected end of hessian data"))
    }

    fn read_value(&mut self) -> Result<Value> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(codec_err("hessian value nested too deeply"));
        }
        let v = self.read_tagged();
        self.depth -= 1;
        v
    }

    fn read_tagged(&mut self) -> Result<Value> {
        let tag = self.byte()?;
        let v = match tag {
            0x00..=0x1f => Value::String(self.read_chars(tag as usize)?),
            0x20..=0x2f => Value::Bytes(self.take((tag - 0x20) as usize)?.to_vec()),
            0x30..=0x33 => {
                let len = ((tag - 0x30) as usize) << 8 | self.byte()? as usize;
                Value::String(self.read_chars(len)?)
            }
            0x34..=0x37 => {
                let len = ((tag - 0x34) as usize) << 8 | self.byte()? as usize;
                Value::Bytes(self.take(len)?.to_vec())
            }
            0x38..=0x3f => {
                let b = self.take(2)?;
                let hi = (tag as i64 - 0x3c) << 16;
                Value::Long(hi + BigEndian::read_u16(b) as i64)
            }
            b'A' | b'B' => Value::Bytes(self.read_binary_chunks(tag)?),
            b'C' => {
                self.read_class_def()?;
                return self.read_value();
            }
            b'D' => Value::Double(BigEndian::read_f64(self.take(8)?)),
            b'F' => Value::Bool(false),
            b'T' => Value::Bool(true),
            b'H' => self.read_map(None)?,
            b'I' => Value::Int(BigEndian::read_i32(self.take(4)?)),
            0x4a => Value::Date(BigEndian::read_i64(self.take(8)?)),
            0x4b => Value::Date(BigEndian::read_i32(self.take(4)?) as i64 * 60_000),
            b'L' => Value::Long(BigEndian::read_i64(self.take(8)?)),
            b'M' => {
                let t = self.read_type()?;
                self.read_map(Some(t))?
            }
            b'N' => Value::Null,
            b'O' => {
                let idx = self.read_index()?;
                self.read_instance(idx)?
            }
            b'Q' => {
                let idx = self.read_index()?;
                self.refs
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| codec_err(format!("unknown hessian reference {}", idx)))?
            }
            b'R' | b'S' => Value::String(self.read_string_chunks(tag)?),
            b'U' => {
                let t = self.read_type()?;
                self.read_list(Some(t), None)?
            }
            b'V' => {
                let t = self.read_type()?;
                let len = self.read_index()?;
                self.read_list(Some(t), Some(len))?
            }
            b'W' => self.read_list(None, None)?,
            b'X' => {
                let len = self.read_index()?;
                self.read_list(None, Some(len))?
            }
            b'Y' => Value::Long(BigEndian::read_i32(self.take(4)?) as i64),
            0x5b => Value::Double(0.0),
            0x5c => Value::Double(1.0),
            0x5d => Value::Double(self.byte()? as i8 as f64),
            0x5e => Value::Double(BigEndian::read_i16(self.take(2)?) as f64),
            0x5f => Value::Double(BigEndian::read_i32(self.take(4)?) as f64 * 0.001),
            0x60..=0x6f => self.read_instance((tag - 0x60) as usize)?,
            0x70..=0x77 => {
                let t = self.read_type()?;
                self.read_list(Some(t), Some((tag - 0x70) as usize))?
            }
            0x78..=0x7f => self.read_list(None, Some((tag - 0x78) as usize))?,
            0x80..=0xbf => Value::Int(tag as i32 - 0x90),
            0xc0..=0xcf => Value::Int((tag as i32 - 0xc8) << 8 | self.byte()? as i32),
            0xd0..=0xd7 => {
                let b = self.take(2)?;
                Value::Int(((tag as i32 - 0xd4) << 16) + BigEndian::read_u16(b) as i32)
            }
            0xd8..=0xef => Value::Long(tag as i64 - 0xe0),
            0xf0..=0xff => Value::Long((tag as i64 - 0xf8) << 8 | self.byte()? as i64),
            _ => {
                return Err(codec_err(format!(
                    "unknown hessian tag 0x{:02x} at offset {}",
                    tag,
                    self.pos - 1
                )))
            }
        };
        Ok(v)
    }

    fn read_int(&mut self) -> Result<i32> {
        match self.read_value()? {
            Value::Int(i) => Ok(i),
            Value::Long(l) => i32::try_from(l)
                .map_err(|_| codec_err(format!("int out of range: {}", l))),
            other => Err(codec_err(format!("expected int, found {:?}", other))),
        }
    }

    /// A length or reference index.
    fn read_index(&mut self) -> Result<usize> {
        let i = self.read_int()?;
        usize::try_from(i).map_err(|_| codec_err(format!("negative hessian length {}", i)))
    }

    fn read_string(&mut self) -> Result<String> {
        match self.read_value()? {
            Value::String(s) => Ok(s),
            other => Err(codec_err(format!("expected string, found {:?}", other))),
        }
    }

    fn read_chars(&mut self, n: usize) -> Result<String> {
        let mut units = Vec::with_capacity(n);
        self.read_utf16_units(n, &mut units)?;
        Ok(String::from_utf16_lossy(&units))
    }

    /// Reads `n` UTF-16 units, each sent as its own 1 to 3 byte sequence.
    /// A 4 byte sequence is accepted too and counts as two units.
    fn read_utf16_units(&mut self, n: usize, units: &mut Vec<u16>) -> Result<()> {
        let target = units.len() + n;
        while units.len() < target {
            let lead = self.byte()? as u32;
            let cp = match lead {
                0x00..=0x7f => lead,
                0xc0..=0xdf => (lead & 0x1f) << 6 | self.continuation()?,
                0xe0..=0xef => {
                    let b1 = self.continuation()?;
                    let b2 = self.continuation()?;
                    (lead & 0x0f) << 12 | b1 << 6 | b2
                }
                0xf0..=0xf7 => {
                    let b1 = self.continuation()?;
                    let b2 = self.continuation()?;
                    let b3 = self.continuation()?;
                    (lead & 0x07) << 18 | b1 << 12 | b2 << 6 | b3
                }
                _ => REPLACEMENT,
            };
            match std::char::from_u32(cp) {
                Some(c) => {
                    let mut buf = [0u16; 2];
                    units.extend_from_slice(c.encode_utf16(&mut buf));
                }
                // a lone surrogate half, paired up by from_utf16_lossy
                None if cp <= 0xffff => units.push(cp as u16),
                None => units.push(REPLACEMENT as u16),
            }
        }
        Ok(())
    }

    fn continuation(&mut self) -> Result<u32> {
        Ok((self.byte()? & 0x3f) as u32)
    }

    fn read_string_chunks(&mut self, mut tag: u8) -> Result<String> {
        let mut units = Vec::new();
        loop {
            let len = match tag {
                b'R' | b'S' => BigEndian::read_u16(self.take(2)?) as usize,
                0x00..=0x1f => tag as usize,
                0x30..=0x33 => ((tag - 0x30) as usize) << 8 | self.byte()? as usize,
                _ => return Err(codec_err(format!("bad string chunk tag 0x{:02x}", tag))),
            };
            self.read_utf16_units(len, &mut units)?;
            if tag != b'R' {
                return Ok(String::from_utf16_lossy(&units));
            }
            tag = self.byte()?;
        }
    }

    fn read_binary_chunks(&mut self, mut tag: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let len = match tag {
                b'A' | b'B' => BigEndian::read_u16(self.take(2)?) as usize,
                0x20..=0x2f => (tag - 0x20) as usize,
                0x34..=0x37 => ((tag - 0x34) as usize) << 8 | self.byte()? as usize,
                _ => return Err(codec_err(format!("bad binary chunk tag 0x{:02x}", tag))),
            };
            out.extend_from_slice(self.take(len)?);
            if tag != b'A' {
                return Ok(out);
            }
            tag = self.byte()?;
        }
    }

    fn read_type(&mut self) -> Result<String> {
        match self.peek()? {
            0x00..=0x1f | 0x30..=0x33 | b'R' | b'S' => {
                let t = self.read_string()?;
                self.types.push(t.clone());
                Ok(t)
            }
            _ => {
                let idx = self.read_index()?;
                self.types
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| codec_err(format!("unknown hessian type reference {}", idx)))
            }
        }
    }

    fn read_class_def(&mut self) -> Result<()> {
        let name = self.read_string()?;
        let n = self.read_int()?;
        let mut fields = Vec::new();
        for _ in 0..n {
            fields.push(self.read_string()?);
        }
        self.classes.push(ClassDef { name, fields });
        Ok(())
    }

    fn reserve_ref(&mut self) -> usize {
        self.refs.push(Value::Null);
        self.refs.len() - 1
    }

    fn read_instance(&mut self, idx: usize) -> Result<Value> {
        let def = self
            .classes
            .get(idx)
            .cloned()
            .ok_or_else(|| codec_err(format!("unknown hessian class definition {}", idx)))?;
        let slot = self.reserve_ref();
        let mut fields = Vec::with_capacity(def.fields.len());
        for name in def.fields {
            let v = self.read_value()?;
            fields.push((name, v));
        }
        let v = Value::Object {
            class: def.name,
            fields,
        };
        self.refs[slot] = v.clone();
        Ok(v)
    }

    fn read_list(&mut self, class: Option<String>, len: Option<usize>) -> Result<Value> {
        let slot = self.reserve_ref();
        let mut items = Vec::new();
        match len {
            Some(n) => {
                for _ in 0..n {
                    items.push(self.read_value()?);
                }
            }
            None => {
                while self.peek()? != b'Z' {
                    items.push(self.read_value()?);
                }
                self.pos += 1;
            }
        }
        let v = Value::List { class, items };
        self.refs[slot] = v.clone();
        Ok(v)
    }

    fn read_map(&mut self, class: Option<String>) -> Result<Value> {
        let slot = self.reserve_ref();
        let mut entries = Vec::new();
        while self.peek()? != b'Z' {
            let k = self.read_value()?;
            let v = self.read_value()?;
            entries.push((k, v));
        }
        self.pos += 1;
        let v = Value::Map { class, entries };
        self.refs[slot] = v.clone();
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(v: Value) -> Vec<u8> {
        Hessian2.write(&[&v]).unwrap()
    }

    #[test]
    fn compact_ints() {
        assert_eq!(vec![0x90], encode(Value::Int(0)));
        assert_eq!(vec![0x80], encode(Value::Int(-16)));
        assert_eq!(vec![0xbf], encode(Value::Int(47)));
        assert_eq!(vec![0xc8, 0x30], encode(Value::Int(48)));
        assert_eq!(vec![0xd4, 0x08, 0x00], encode(Value::Int(2048)));
        assert_eq!(vec![b'I', 0x00, 0x04, 0x00, 0x00], encode(Value::Int(262_144)));
    }

    #[test]
    fn compact_longs() {
        assert_eq!(vec![0xe0], encode(Value::Long(0)));
        assert_eq!(vec![0xf8, 0x10], encode(Value::Long(16)));
        assert_eq!(vec![0x3c, 0x08, 0x00], encode(Value::Long(2048)));
        assert_eq!(vec![0x59, 0x00, 0x04, 0x00, 0x00], encode(Value::Long(262_144)));
    }

    #[test]
    fn short_strings() {
        assert_eq!(vec![0x00], encode(Value::from("")));
        assert_eq!(vec![0x05, b'h', b'e', b'l', b'l', b'o'], encode(Value::from("hello")));
        // length counts chars, not bytes
        assert_eq!(vec![0x02, 0xc3, 0xa9, 0xc3, 0xa9], encode(Value::from("éé")));
    }

    #[test]
    fn supplementary_chars_travel_as_surrogate_pairs() {
        let java = vec![0x02, 0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80];
        assert_eq!(java, encode(Value::from("😀")));
        assert_eq!(Value::from("😀"), Hessian2.read(&java).unwrap());

        // plain UTF-8 from a lenient writer still decodes
        let utf8 = vec![0x02, 0xf0, 0x9f, 0x98, 0x80];
        assert_eq!(Value::from("😀"), Hessian2.read(&utf8).unwrap());
    }

    #[test]
    fn chunks_do_not_split_surrogate_pairs() {
        let mut s: String = std::iter::repeat('x').take(CHUNK_LEN - 1).collect();
        s.push_str("😀tail");
        let data = encode(Value::String(s.clone()));
        assert_eq!(b'R', data[0]);
        assert_eq!(((CHUNK_LEN - 1) as u16).to_be_bytes(), [data[1], data[2]]);
        assert_eq!(Value::String(s), Hessian2.read(&data).unwrap());
    }

    #[test]
    fn oversized_lengths_are_rejected() {
        // a fixed list whose length is a long past i32::MAX
        let data = vec![b'X', b'L', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        let err = Hessian2.read(&data).unwrap_err();
        assert_eq!(ErrorKind::Codec, err.kind());

        let data = vec![b'X', 0x8f];
        let err = Hessian2.read(&data).unwrap_err();
        assert_eq!(ErrorKind::Codec, err.kind());
    }

    #[test]
    fn long_strings_are_chunked() {
        let s: String = std::iter::repeat('x').take(CHUNK_LEN + 10).collect();
        let data = encode(Value::String(s.clone()));
        assert_eq!(b'R', data[0]);
        assert_eq!(Value::String(s), Hessian2.read(&data).unwrap());
    }

    #[test]
    fn untyped_hash_map_for_attachments() {
        let v = Value::typed_map(
            "java.util.HashMap",
            vec![(Value::from("k"), Value::from("v"))],
        );
        assert_eq!(vec![b'H', 0x01, b'k', 0x01, b'v', b'Z'], encode(v));
    }

    #[test]
    fn reads_mixed_values() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-300),
            Value::Long(i64::MAX),
            Value::Double(2.5),
            Value::Double(-7.0),
            Value::Bytes(vec![1, 2, 3]),
            Value::Date(1_600_000_000_000),
            Value::list(vec![Value::Int(1), Value::from("two")]),
        ];
        let refs: Vec<&Value> = values.iter().collect();
        let data = Hessian2.write(&refs).unwrap();
        assert_eq!(values, Hessian2.read_all(&data).unwrap());
    }

    #[test]
    fn reuses_class_definitions() {
        let user = |name: &str| Value::Object {
            class: "com.example.User".to_owned(),
            fields: vec![("name".to_owned(), Value::from(name))],
        };
        let list = Value::List {
            class: Some("java.util.ArrayList".to_owned()),
            items: vec![user("a"), user("b")],
        };
        let data = encode(list.clone());
        assert_eq!(1, data.iter().filter(|b| **b == b'C').count());
        assert_eq!(list, Hessian2.read(&data).unwrap());
    }

    #[test]
    fn resolves_back_references() {
        // C "E" 1 "self", instance 0 whose field refers back to itself
        let data = vec![b'C', 0x01, b'E', 0x91, 0x04, b's', b'e', b'l', b'f', 0x60, b'Q', 0x90];
        let v = Hessian2.read(&data).unwrap();
        assert_eq!(Some(&Value::Null), v.get("self"));
    }

    #[test]
    fn truncated_input_is_a_codec_error() {
        let err = Hessian2.read(&[b'I', 0x00]).unwrap_err();
        assert_eq!(ErrorKind::Codec, err.kind());
    }
}
