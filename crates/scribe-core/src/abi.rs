//! Contract ABI descriptors and binary payload decoding.
//!
//! An [`AbiDefinition`] describes a contract's action and data layouts. The
//! [`AbiDecoder`] built from it translates opaque binary action payloads
//! into structured JSON. Descriptors travel in two forms: structured JSON
//! (as persisted in `accounts` documents) and the packed binary form carried
//! by `setabi` payloads, handled by [`AbiDefinition::from_bytes`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::name::Name;

/// Nesting bound for struct/array recursion.
const MAX_DEPTH: usize = 32;

/// Bound on typedef chains; anything longer is treated as a cycle.
const MAX_TYPEDEF_HOPS: usize = 16;

/// A type alias entry in an ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiTypeDef {
    pub new_type_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// One field of an ABI struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A struct layout in an ABI; `base` fields are decoded first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiStruct {
    pub name: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub fields: Vec<AbiField>,
}

/// Binding from an action name to the struct that lays out its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiAction {
    pub name: Name,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A contract's binary-interface descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiDefinition {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub types: Vec<AbiTypeDef>,
    #[serde(default)]
    pub structs: Vec<AbiStruct>,
    #[serde(default)]
    pub actions: Vec<AbiAction>,
}

impl AbiDefinition {
    /// Decode the packed binary form carried by `setabi` payloads.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = BinReader::new(data);
        let version = r.read_string()?;
        let mut types = Vec::new();
        for _ in 0..r.read_varuint32()? {
            types.push(AbiTypeDef {
                new_type_name: r.read_string()?,
                type_name: r.read_string()?,
            });
        }
        let mut structs = Vec::new();
        for _ in 0..r.read_varuint32()? {
            let name = r.read_string()?;
            let base = r.read_string()?;
            let mut fields = Vec::new();
            for _ in 0..r.read_varuint32()? {
                fields.push(AbiField {
                    name: r.read_string()?,
                    type_name: r.read_string()?,
                });
            }
            structs.push(AbiStruct { name, base, fields });
        }
        let mut actions = Vec::new();
        for _ in 0..r.read_varuint32()? {
            actions.push(AbiAction {
                name: r.read_name()?,
                type_name: r.read_string()?,
            });
        }
        Ok(AbiDefinition {
            version,
            types,
            structs,
            actions,
        })
    }

    /// Pack into the binary form understood by [`AbiDefinition::from_bytes`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BinWriter::default();
        w.write_string(&self.version);
        w.write_varuint32(self.types.len() as u32);
        for t in &self.types {
            w.write_string(&t.new_type_name);
            w.write_string(&t.type_name);
        }
        w.write_varuint32(self.structs.len() as u32);
        for s in &self.structs {
            w.write_string(&s.name);
            w.write_string(&s.base);
            w.write_varuint32(s.fields.len() as u32);
            for f in &s.fields {
                w.write_string(&f.name);
                w.write_string(&f.type_name);
            }
        }
        w.write_varuint32(self.actions.len() as u32);
        for a in &self.actions {
            w.write_name(a.name);
            w.write_string(&a.type_name);
        }
        w.into_bytes()
    }

    /// Rewrite the `setabi` action's `abi` field from raw bytes to the
    /// structured form, so persisted documents carry decoded interfaces
    /// rather than opaque byte blobs. Applied to the system account's
    /// descriptor when it enters the cache.
    pub fn rewrite_setabi_to_structured(&mut self) {
        if let Some(st) = self.structs.iter_mut().find(|s| s.name == "setabi")
            && let Some(field) = st.fields.iter_mut().find(|f| f.name == "abi")
            && field.type_name == "bytes"
        {
            field.type_name = "abi_def".to_string();
        }
    }
}

/// Cursor over a binary payload.
#[derive(Debug)]
pub struct BinReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BinReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        BinReader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Stream(format!(
                "payload ended early: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_varuint32(&mut self) -> Result<u32> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let b = self.read_u8()?;
            value |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(Error::Stream("varuint32 takes more than 5 bytes".into()));
            }
        }
        u32::try_from(value).map_err(|_| Error::Stream("varuint32 out of range".into()))
    }

    /// Length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varuint32()? as usize;
        self.take(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let raw = self.read_bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|e| Error::Stream(format!("bad utf-8: {e}")))
    }

    pub fn read_name(&mut self) -> Result<Name> {
        Ok(Name::from_u64(self.read_u64()?))
    }

    pub fn read_checksum256(&mut self) -> Result<[u8; 32]> {
        self.take_array()
    }
}

/// Builder for binary payloads; the inverse of [`BinReader`].
#[derive(Debug, Default)]
pub struct BinWriter {
    buf: Vec<u8>,
}

impl BinWriter {
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_varuint32(&mut self, mut v: u32) {
        loop {
            let mut b = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                b |= 0x80;
            }
            self.buf.push(b);
            if v == 0 {
                break;
            }
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_varuint32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    pub fn write_name(&mut self, n: Name) {
        self.write_u64(n.as_u64());
    }

    pub fn write_checksum256(&mut self, bytes: &[u8; 32]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

struct DecodeBudget {
    deadline: Instant,
    budget: Duration,
}

impl DecodeBudget {
    fn check(&self) -> Result<()> {
        if Instant::now() >= self.deadline {
            return Err(Error::DeadlineExceeded(self.budget));
        }
        Ok(())
    }
}

/// Translates binary action payloads into structured JSON values.
///
/// Built once per descriptor and kept in the ABI cache; lookups after
/// construction are map hits.
#[derive(Debug)]
pub struct AbiDecoder {
    typedefs: HashMap<String, String>,
    structs: HashMap<String, AbiStruct>,
    actions: HashMap<Name, String>,
}

impl AbiDecoder {
    pub fn new(abi: &AbiDefinition) -> Self {
        let typedefs = abi
            .types
            .iter()
            .map(|t| (t.new_type_name.clone(), t.type_name.clone()))
            .collect();
        let structs = abi
            .structs
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect();
        let actions = abi
            .actions
            .iter()
            .map(|a| (a.name, a.type_name.clone()))
            .collect();
        AbiDecoder {
            typedefs,
            structs,
            actions,
        }
    }

    /// The payload type bound to an action, if the ABI names one.
    pub fn action_type(&self, action: Name) -> Option<&str> {
        self.actions.get(&action).map(String::as_str)
    }

    /// Decode an action payload. `max_time` bounds total decoding time.
    pub fn decode_action(&self, action: Name, data: &[u8], max_time: Duration) -> Result<Value> {
        let ty = self
            .actions
            .get(&action)
            .ok_or_else(|| Error::Abi(format!("ABI does not define action {action}")))?
            .clone();
        let budget = DecodeBudget {
            deadline: Instant::now() + max_time,
            budget: max_time,
        };
        let mut reader = BinReader::new(data);
        self.decode_type(&ty, &mut reader, &budget, 0)
    }

    fn resolve<'a>(&'a self, mut ty: &'a str) -> &'a str {
        for _ in 0..MAX_TYPEDEF_HOPS {
            match self.typedefs.get(ty) {
                Some(next) => ty = next,
                None => break,
            }
        }
        ty
    }

    fn decode_type(
        &self,
        ty: &str,
        reader: &mut BinReader<'_>,
        budget: &DecodeBudget,
        depth: usize,
    ) -> Result<Value> {
        budget.check()?;
        if depth > MAX_DEPTH {
            return Err(Error::Abi(format!("type {ty} nests deeper than {MAX_DEPTH}")));
        }
        let ty = self.resolve(ty);

        if let Some(inner) = ty.strip_suffix("[]") {
            let len = reader.read_varuint32()? as usize;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(self.decode_type(inner, reader, budget, depth + 1)?);
            }
            return Ok(Value::Array(items));
        }
        if let Some(inner) = ty.strip_suffix('?') {
            if !reader.read_bool()? {
                return Ok(Value::Null);
            }
            return self.decode_type(inner, reader, budget, depth + 1);
        }

        match ty {
            "bool" => Ok(Value::Bool(reader.read_bool()?)),
            "uint8" => Ok(Value::from(reader.read_u8()?)),
            "uint16" => Ok(Value::from(reader.read_u16()?)),
            "uint32" => Ok(Value::from(reader.read_u32()?)),
            "uint64" => Ok(Value::from(reader.read_u64()?)),
            "int8" => Ok(Value::from(reader.read_u8()? as i8)),
            "int16" => Ok(Value::from(reader.read_u16()? as i16)),
            "int32" => Ok(Value::from(reader.read_u32()? as i32)),
            "int64" => Ok(Value::from(reader.read_u64()? as i64)),
            "varuint32" => Ok(Value::from(reader.read_varuint32()?)),
            "name" => Ok(Value::String(reader.read_name()?.to_string())),
            "string" => Ok(Value::String(reader.read_string()?)),
            "bytes" => Ok(Value::String(hex::encode(reader.read_bytes()?))),
            "checksum256" => Ok(Value::String(hex::encode(reader.read_checksum256()?))),
            "time_point_sec" => Ok(Value::from(reader.read_u32()?)),
            // Specialized unpack: the field carries a length-prefixed,
            // binary-packed descriptor, decoded to its structured form.
            "abi_def" => {
                let raw = reader.read_bytes()?;
                let abi = AbiDefinition::from_bytes(raw)?;
                serde_json::to_value(&abi).map_err(|e| Error::Abi(e.to_string()))
            }
            other => {
                let st = self
                    .structs
                    .get(other)
                    .ok_or_else(|| Error::Abi(format!("unknown type {other}")))?;
                self.decode_struct(st, reader, budget, depth)
            }
        }
    }

    fn decode_struct(
        &self,
        st: &AbiStruct,
        reader: &mut BinReader<'_>,
        budget: &DecodeBudget,
        depth: usize,
    ) -> Result<Value> {
        let mut obj = Map::new();
        if !st.base.is_empty() {
            match self.decode_type(&st.base, reader, budget, depth + 1)? {
                Value::Object(base) => obj.extend(base),
                _ => {
                    return Err(Error::Abi(format!(
                        "base {} of struct {} is not a struct",
                        st.base, st.name
                    )));
                }
            }
        }
        for field in &st.fields {
            let v = self.decode_type(&field.type_name, reader, budget, depth + 1)?;
            obj.insert(field.name.clone(), v);
        }
        Ok(Value::Object(obj))
    }
}

/// Payload of the system `setabi` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAbi {
    pub account: Name,
    pub abi: Vec<u8>,
}

impl SetAbi {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = BinReader::new(data);
        Ok(SetAbi {
            account: r.read_name()?,
            abi: r.read_bytes()?.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BinWriter::default();
        w.write_name(self.account);
        w.write_bytes(&self.abi);
        w.into_bytes()
    }
}

/// Leading fields of the system `newaccount` action payload. Trailing
/// authority data is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAccount {
    pub creator: Name,
    pub name: Name,
}

impl NewAccount {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = BinReader::new(data);
        Ok(NewAccount {
            creator: r.read_name()?,
            name: r.read_name()?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BinWriter::default();
        w.write_name(self.creator);
        w.write_name(self.name);
        w.into_bytes()
    }
}
