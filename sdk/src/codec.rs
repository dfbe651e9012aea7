use std::collections::HashMap;

use gram_tl_compiler::{
    plan::{Codec, DecodeOp, DefaultValue, DispatchAction, EncodeOp, GenerationPlan},
    CompiledUnit,
};
use gram_tl_wire::{ByteBuffer, ByteBufferMut, Value, WireError};
use tracing::{trace, warn};

use crate::error::CodecError;

/// Upper bound on sibling-to-sibling hand-offs while routing one tag.
pub const MAX_DELEGATION_DEPTH: usize = 64;

/// Upper bound on objects nested inside one another while encoding or
/// decoding. Self-referential types would otherwise recurse as deep as the
/// input goes.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Executes generation plans against dynamic [`Value`]s, without generating
/// any code.
///
/// Objects are `Value::Object(type_name, fields)`. A field missing from an
/// object is treated as holding its default.
#[derive(Debug, Clone)]
pub struct Registry<'p> {
    by_key:  HashMap<&'p str, &'p GenerationPlan>,
    by_name: HashMap<&'p str, &'p GenerationPlan>,
}

impl<'p> Registry<'p> {
    /// When two plans share a key or a name, the first one wins.
    pub fn new(plans: &'p [GenerationPlan]) -> Registry<'p> {
        let mut by_key = HashMap::new();
        let mut by_name = HashMap::new();
        for plan in plans {
            by_key.entry(plan.key.as_str()).or_insert(plan);
            by_name.entry(plan.type_name.as_str()).or_insert(plan);
        }
        Registry { by_key, by_name }
    }

    pub fn from_unit(unit: &'p CompiledUnit) -> Registry<'p> {
        Registry::new(&unit.plans)
    }

    pub fn plan(&self, type_name: &str) -> Result<&'p GenerationPlan, CodecError> {
        self.by_name
            .get(type_name)
            .copied()
            .ok_or_else(|| CodecError::UnknownType(type_name.to_string()))
    }

    /// Looks a plan up by its schema key, e.g. `help.getSensitiveWords`.
    pub fn plan_for_key(&self, key: &str) -> Result<&'p GenerationPlan, CodecError> {
        self.by_key
            .get(key)
            .copied()
            .ok_or_else(|| CodecError::UnknownType(key.to_string()))
    }

    /// A new object with every field at its default. Nested objects are
    /// left empty, which reads as their own defaults.
    pub fn instantiate(&self, type_name: &str) -> Result<Value, CodecError> {
        let plan = self.plan(type_name)?;
        Ok(plan.defaults().fold(Value::object(&plan.type_name), |object, (name, default)| {
            object.with(name, default_value(default))
        }))
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut stream = ByteBufferMut::new();
        self.encode_into(value, &mut stream)?;
        Ok(stream.data())
    }

    /// Writes the constructor id followed by the fields. The flags word is
    /// rebuilt from the guarded fields, ignoring whatever the value holds.
    pub fn encode_into(&self, value: &Value, stream: &mut ByteBufferMut) -> Result<(), CodecError> {
        self.encode_object(value, stream, 0)
    }

    fn encode_object(&self, value: &Value, stream: &mut ByteBufferMut, depth: usize) -> Result<(), CodecError> {
        let type_name = value.type_name().ok_or_else(|| shape("object", value))?;
        let plan = self.plan(type_name)?;
        let mut flags: Option<(&str, i32)> = None;

        for op in &plan.encode {
            match op {
                EncodeOp::WriteConstructor(id) => stream.write_uint32(*id),

                EncodeOp::RecomputeFlags { flags_field, bindings } => {
                    let mut word = value.get(flags_field).map_or(0, Value::as_int);
                    for binding in bindings {
                        if self.field_is_default(plan, value, &binding.field, depth)? {
                            word &= !(1 << binding.bit);
                        } else {
                            word |= 1 << binding.bit;
                        }
                    }
                    flags = Some((flags_field.as_str(), word));
                }

                EncodeOp::Write { field, codec } => match flags {
                    Some((flags_field, word)) if flags_field == field => stream.write_int32(word),
                    _ => self.write_field(plan, value, field, codec, stream, depth)?,
                },

                EncodeOp::WriteIfFlag { bit, field, codec } => {
                    let word = match flags {
                        Some((_, word)) => word,
                        None => value.get("flags").map_or(0, Value::as_int),
                    };
                    if word & (1 << bit) != 0 {
                        self.write_field(plan, value, field, codec, stream, depth)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_field(
        &self,
        plan: &GenerationPlan,
        value: &Value,
        field: &str,
        codec: &Codec,
        stream: &mut ByteBufferMut,
        depth: usize,
    ) -> Result<(), CodecError> {
        match value.get(field) {
            Some(field_value) => self.write_value(codec, field_value, stream, depth),
            None => {
                let default = plan
                    .field(field)
                    .map(|field| default_value(&field.default))
                    .ok_or_else(|| CodecError::UnknownType(format!("{}.{}", plan.type_name, field)))?;
                self.write_value(codec, &default, stream, depth)
            }
        }
    }

    fn write_value(
        &self,
        codec: &Codec,
        value: &Value,
        stream: &mut ByteBufferMut,
        depth: usize,
    ) -> Result<(), CodecError> {
        match (codec, value) {
            (Codec::String, Value::String(text)) => stream.write_string(text)?,
            (Codec::Boolean, Value::Bool(flag)) => stream.write_bool(*flag),
            (Codec::Int32, Value::Int(number)) => stream.write_int32(*number),
            (Codec::Int64, Value::Long(number)) => stream.write_int64(*number),
            (Codec::Object { .. }, Value::Object(..)) => self.encode_object(value, stream, nested(depth)?)?,
            (Codec::Vector { tag, element }, Value::Vector(items)) => {
                stream.write_uint32(*tag);
                stream.write_int32(items.len() as i32);
                for item in items {
                    self.write_value(element, item, stream, depth)?;
                }
            }
            (codec, value) => return Err(shape(codec_name(codec), value)),
        }
        Ok(())
    }

    fn field_is_default(
        &self,
        plan: &GenerationPlan,
        value: &Value,
        field: &str,
        depth: usize,
    ) -> Result<bool, CodecError> {
        match (value.get(field), plan.field(field)) {
            (None, _) => Ok(true),
            (Some(field_value), Some(field_plan)) => self.is_default(field_value, &field_plan.default, depth),
            (Some(_), None) => Ok(false),
        }
    }

    fn is_default(&self, value: &Value, default: &DefaultValue, depth: usize) -> Result<bool, CodecError> {
        Ok(match (default, value) {
            (DefaultValue::String(expected), Value::String(text)) => text == expected,
            (DefaultValue::Int32(expected), Value::Int(number)) => number == expected,
            (DefaultValue::Int64(expected), Value::Long(number)) => number == expected,
            (DefaultValue::Bool(expected), Value::Bool(flag)) => flag == expected,
            (DefaultValue::EmptyVector, Value::Vector(items)) => items.is_empty(),
            (DefaultValue::Construct(type_name), Value::Object(name, _)) if name == type_name => {
                let plan = self.plan(type_name)?;
                for field in &plan.fields {
                    if let Some(field_value) = value.get(&field.name) {
                        if !self.is_default(field_value, &field.default, nested(depth)?)? {
                            return Ok(false);
                        }
                    }
                }
                true
            }
            _ => false,
        })
    }

    /// Reads a constructor id and decodes the rest through `type_name`'s
    /// entry point. `Ok(None)` means the tag was not recognized.
    pub fn decode(&self, bytes: &[u8], type_name: &str, exception: bool) -> Result<Option<Value>, CodecError> {
        let mut bb = ByteBuffer::new(bytes);
        let tag = bb.read_uint32()?;
        self.decode_entry(&mut bb, type_name, tag, exception)
    }

    /// The entry point of `type_name`: routes `tag` to the type itself or to
    /// one of its siblings. An unknown tag is an error when `exception` is
    /// set and `Ok(None)` otherwise.
    pub fn decode_entry(
        &self,
        bb: &mut ByteBuffer,
        type_name: &str,
        tag: u32,
        exception: bool,
    ) -> Result<Option<Value>, CodecError> {
        self.decode_object(bb, type_name, tag, exception, 0)
    }

    fn decode_object(
        &self,
        bb: &mut ByteBuffer,
        type_name: &str,
        tag: u32,
        exception: bool,
        depth: usize,
    ) -> Result<Option<Value>, CodecError> {
        let mut plan = self.plan(type_name)?;

        for _ in 0..=MAX_DELEGATION_DEPTH {
            let branch = match plan.dispatch.route(tag) {
                Some(branch) => branch,
                None if exception => {
                    return Err(WireError::UnrecognizedConstructor {
                        tag,
                        type_name: plan.type_name.clone(),
                    }
                    .into())
                }
                None => return Ok(None),
            };

            match &branch.action {
                DispatchAction::DecodeSelf => {
                    let mut object = self.instantiate(&plan.type_name)?;
                    self.read_params(plan, &mut object, bb, exception, depth)?;
                    return Ok(Some(object));
                }
                DispatchAction::Delegate(sibling) => {
                    trace!(from = %plan.type_name, to = %sibling, tag, "delegating decode");
                    plan = self.plan(sibling)?;
                }
            }
        }

        Err(CodecError::DelegationDepth { tag, limit: MAX_DELEGATION_DEPTH })
    }

    /// Decodes the reply to a request of type `type_name`.
    pub fn decode_response(&self, bytes: &[u8], type_name: &str, exception: bool) -> Result<Option<Value>, CodecError> {
        let plan = self.plan(type_name)?;
        let response = plan
            .response
            .as_ref()
            .ok_or_else(|| CodecError::NoResponse(plan.type_name.clone()))?;
        self.decode(bytes, &response.type_name, exception)
    }

    fn read_params(
        &self,
        plan: &GenerationPlan,
        object: &mut Value,
        bb: &mut ByteBuffer,
        exception: bool,
        depth: usize,
    ) -> Result<(), CodecError> {
        for op in &plan.decode {
            let (field, codec) = match op {
                DecodeOp::Read { field, codec } => (field, codec),
                DecodeOp::ReadIfFlag { bit, field, codec } => {
                    let word = object.get("flags").map_or(0, Value::as_int);
                    if word & (1 << bit) == 0 {
                        continue;
                    }
                    (field, codec)
                }
            };

            match self.read_value(codec, bb, &plan.type_name, exception, depth)? {
                Some(value) => object.set(field, value),
                None => {
                    warn!(type_name = %plan.type_name, field = %field, "wrong vector magic, stopping decode");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// `Ok(None)` when a vector's framing tag is wrong and `exception` is off.
    fn read_value(
        &self,
        codec: &Codec,
        bb: &mut ByteBuffer,
        owner: &str,
        exception: bool,
        depth: usize,
    ) -> Result<Option<Value>, CodecError> {
        Ok(Some(match codec {
            Codec::String => Value::String(bb.read_string()?.into_owned()),
            Codec::Boolean => Value::Bool(bb.read_bool()?),
            Codec::Int32 => Value::Int(bb.read_int32()?),
            Codec::Int64 => Value::Long(bb.read_int64()?),

            Codec::Object { type_name } => {
                let depth = nested(depth)?;
                let tag = bb.read_uint32()?;
                match self.decode_object(bb, type_name, tag, exception, depth)? {
                    Some(object) => object,
                    None => self.instantiate(type_name)?,
                }
            }

            Codec::Vector { tag, element } => {
                let magic = bb.read_uint32()?;
                if magic != *tag {
                    if exception {
                        return Err(WireError::VectorTagMismatch {
                            found:     magic,
                            expected:  *tag,
                            type_name: owner.to_string(),
                        }
                        .into());
                    }
                    return Ok(None);
                }

                let count = bb.read_int32()?;
                let mut items = Vec::new();
                for _ in 0..count {
                    match self.read_value(element, bb, owner, exception, depth)? {
                        Some(item) => items.push(item),
                        None => return Ok(None),
                    }
                }
                Value::Vector(items)
            }
        }))
    }
}

fn default_value(default: &DefaultValue) -> Value {
    match default {
        DefaultValue::String(text) => Value::String(text.clone()),
        DefaultValue::Int32(number) => Value::Int(*number),
        DefaultValue::Int64(number) => Value::Long(*number),
        DefaultValue::Bool(flag) => Value::Bool(*flag),
        DefaultValue::EmptyVector => Value::Vector(Vec::new()),
        DefaultValue::Construct(type_name) => Value::object(type_name),
    }
}

/// The depth of an object nested one level below `depth`.
fn nested(depth: usize) -> Result<usize, CodecError> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(CodecError::NestingDepth { limit: MAX_NESTING_DEPTH });
    }
    Ok(depth + 1)
}

fn codec_name(codec: &Codec) -> &'static str {
    match codec {
        Codec::String => "string",
        Codec::Boolean => "bool",
        Codec::Int32 => "int",
        Codec::Int64 => "long",
        Codec::Vector { .. } => "vector",
        Codec::Object { .. } => "object",
    }
}

fn shape(expected: &str, found: &Value) -> CodecError {
    let found = match found {
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Long(_) => "long",
        Value::String(_) => "string",
        Value::Vector(_) => "vector",
        Value::Object(..) => "object",
    };
    CodecError::Shape {
        expected: expected.to_string(),
        found:    found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gram_tl_compiler::{compile_schema, Settings};

    #[test]
    fn test_instantiate_fills_defaults() {
        let unit = compile_schema(
            "a.peer#1 = a.Peer;\na.b#2 flags:# on:flags.0?true name:string peer:a.Peer ids:Vector<int> = a.B;",
            &Settings::default(),
        )
        .unwrap();
        let registry = Registry::from_unit(&unit);

        let object = registry.instantiate("a_B").unwrap();
        assert_eq!(
            object,
            Value::object("a_B")
                .with("flags", Value::Int(0))
                .with("on", Value::Bool(true))
                .with("name", Value::String(String::new()))
                .with("peer", Value::object("a_Peer"))
                .with("ids", Value::Vector(vec![]))
        );
        assert_eq!(registry.plan_for_key("a.b").unwrap().type_name, "a_B");
        assert!(matches!(registry.instantiate("a_C"), Err(CodecError::UnknownType(_))));
    }

    #[test]
    fn test_empty_nested_object_is_default() {
        let unit = compile_schema("a.peer#1 id:int = a.Peer;", &Settings::default()).unwrap();
        let registry = Registry::from_unit(&unit);
        let default = DefaultValue::Construct("a_Peer".into());

        assert!(registry.is_default(&Value::object("a_Peer"), &default, 0).unwrap());
        assert!(registry.is_default(&registry.instantiate("a_Peer").unwrap(), &default, 0).unwrap());
        assert!(!registry.is_default(&Value::object("a_Peer").with("id", Value::Int(3)), &default, 0).unwrap());
    }

    #[test]
    fn test_encode_rejects_wrong_shape() {
        let unit = compile_schema("a.b#1 x:int = a.B;", &Settings::default()).unwrap();
        let registry = Registry::from_unit(&unit);

        let value = Value::object("a_B").with("x", Value::String("1".into()));
        assert_eq!(
            registry.encode(&value),
            Err(CodecError::Shape { expected: "int".into(), found: "string".into() })
        );
        assert_eq!(
            registry.encode(&Value::Int(1)),
            Err(CodecError::Shape { expected: "object".into(), found: "int".into() })
        );
    }
}
