use crate::{
    compiler::CompiledUnit,
    plan::{Codec, DecodeOp, DefaultValue, DispatchAction, EncodeOp, EntryResult, GenerationPlan, TargetType},
    settings::Settings,
};

/// Converts a string to snake_case.
/// Runs of capitals stay together, so "userID" becomes "user_id".
fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut snake = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                if prev != '_' && (!prev.is_uppercase() || chars.get(i + 1).map_or(false, |next| next.is_lowercase())) {
                    snake.push('_');
                }
            }
            snake.extend(c.to_lowercase());
        } else if c == '.' {
            snake.push('_');
        } else {
            snake.push(c);
        }
    }
    snake
}

/// Escapes Rust reserved keywords by suffixing with an underscore.
fn escape_rust_keyword(s: &str) -> String {
    let keywords = [
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else",
        "enum", "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop",
        "match", "mod", "move", "mut", "pub", "ref", "return", "self", "Self",
        "static", "struct", "super", "trait", "true", "type", "unsafe", "use",
        "where", "while",
    ];
    if keywords.contains(&s) {
        format!("{}_", s)
    } else {
        s.to_string()
    }
}

fn field_ident(name: &str) -> String {
    escape_rust_keyword(&to_snake_case(name))
}

fn rust_type(target: &TargetType) -> String {
    match target {
        TargetType::String => "String".to_string(),
        TargetType::Boolean => "bool".to_string(),
        TargetType::Int32 => "i32".to_string(),
        TargetType::Int64 => "i64".to_string(),
        TargetType::Vector(inner) => format!("Vec<{}>", rust_type(inner)),
        TargetType::Named(_) => "Box<dyn TlObject>".to_string(),
    }
}

fn default_expr(default: &DefaultValue) -> String {
    match default {
        DefaultValue::String(text) if text.is_empty() => "String::new()".to_string(),
        DefaultValue::String(text) => format!("{:?}.to_string()", text),
        DefaultValue::Int32(value) => value.to_string(),
        DefaultValue::Int64(value) => value.to_string(),
        DefaultValue::Bool(value) => value.to_string(),
        DefaultValue::EmptyVector => "Vec::new()".to_string(),
        DefaultValue::Construct(type_name) => format!("Box::new({}::default())", type_name),
    }
}

/// An expression that is true when the field still holds its default.
fn is_default_expr(place: &str, default: &DefaultValue) -> String {
    match default {
        DefaultValue::String(text) if text.is_empty() => format!("{}.is_empty()", place),
        DefaultValue::String(text) => format!("{} == {:?}", place, text),
        DefaultValue::Int32(value) => format!("{} == {}", place, value),
        DefaultValue::Int64(value) => format!("{} == {}", place, value),
        DefaultValue::Bool(value) => format!("{} == {}", place, value),
        DefaultValue::EmptyVector => format!("{}.is_empty()", place),
        DefaultValue::Construct(type_name) => {
            format!("{}.to_bytes()? == {}::default().to_bytes()?", place, type_name)
        }
    }
}

fn unrecognized(indent: &str, type_name: &str, out: &mut Vec<String>) {
    out.push(format!("{}if exception {{", indent));
    out.push(format!(
        "{}    return Err(WireError::UnrecognizedConstructor {{ tag: constructor, type_name: {:?}.to_string() }});",
        indent, type_name
    ));
    out.push(format!("{}}}", indent));
    out.push(format!("{}return Ok(None);", indent));
}

/// Emits statements binding `value{depth}` to the next decoded value.
/// A vector with the wrong framing tag ends `read_params` early unless
/// `exception` is set.
fn read_value(codec: &Codec, depth: usize, indent: &str, owner: &str, out: &mut Vec<String>) {
    let var = format!("value{}", depth);
    match codec {
        Codec::String => out.push(format!("{}let {} = stream.read_string()?.into_owned();", indent, var)),
        Codec::Boolean => out.push(format!("{}let {} = stream.read_bool()?;", indent, var)),
        Codec::Int32 => out.push(format!("{}let {} = stream.read_int32()?;", indent, var)),
        Codec::Int64 => out.push(format!("{}let {} = stream.read_int64()?;", indent, var)),

        Codec::Object { type_name } => {
            out.push(format!("{}let tag{} = stream.read_uint32()?;", indent, depth));
            out.push(format!(
                "{}let {} = {}::tl_deserialize_boxed(stream, tag{}, exception)?",
                indent, var, type_name, depth
            ));
            out.push(format!("{}    .unwrap_or_else(|| Box::new({}::default()));", indent, type_name));
        }

        Codec::Vector { tag, element } => {
            out.push(format!("{}let magic{} = stream.read_uint32()?;", indent, depth));
            out.push(format!("{}if magic{} != 0x{:08x} {{", indent, depth, tag));
            out.push(format!("{}    if exception {{", indent));
            out.push(format!("{}        return Err(WireError::VectorTagMismatch {{", indent));
            out.push(format!("{}            found: magic{},", indent, depth));
            out.push(format!("{}            expected: 0x{:08x},", indent, tag));
            out.push(format!("{}            type_name: {:?}.to_string(),", indent, owner));
            out.push(format!("{}        }});", indent));
            out.push(format!("{}    }}", indent));
            out.push(format!("{}    return Ok(());", indent));
            out.push(format!("{}}}", indent));
            out.push(format!("{}let count{} = stream.read_int32()?;", indent, depth));
            out.push(format!("{}let mut {} = Vec::new();", indent, var));
            out.push(format!("{}for _ in 0..count{} {{", indent, depth));
            read_value(element, depth + 1, &format!("{}    ", indent), owner, out);
            out.push(format!("{}    {}.push(value{});", indent, var, depth + 1));
            out.push(format!("{}}}", indent));
        }
    }
}

/// Emits statements writing `place`. `by_ref` marks `place` as a reference
/// (a loop variable) rather than a field.
fn write_value(codec: &Codec, place: &str, by_ref: bool, depth: usize, indent: &str, out: &mut Vec<String>) {
    let deref = if by_ref { "*" } else { "" };
    match codec {
        Codec::String => out.push(format!("{}stream.write_string(&{})?;", indent, place)),
        Codec::Boolean => out.push(format!("{}stream.write_bool({}{});", indent, deref, place)),
        Codec::Int32 => out.push(format!("{}stream.write_int32({}{});", indent, deref, place)),
        Codec::Int64 => out.push(format!("{}stream.write_int64({}{});", indent, deref, place)),
        Codec::Object { .. } => out.push(format!("{}{}.serialize_to_stream(stream)?;", indent, place)),

        Codec::Vector { tag, element } => {
            let item = format!("item{}", depth);
            out.push(format!("{}stream.write_uint32(0x{:08x});", indent, tag));
            out.push(format!("{}stream.write_int32({}.len() as i32);", indent, place));
            out.push(format!("{}for {} in {}.iter() {{", indent, item, place));
            write_value(element, &item, true, depth + 1, &format!("{}    ", indent), out);
            out.push(format!("{}}}", indent));
        }
    }
}

fn render_struct(plan: &GenerationPlan, known: &[&str], rust_code: &mut Vec<String>) {
    let name = &plan.type_name;

    rust_code.push(format!("/// `{}#{:08x}`", plan.key, plan.constructor_id));
    rust_code.push("#[allow(non_camel_case_types)]".to_string());
    rust_code.push("#[derive(Debug)]".to_string());
    rust_code.push(format!("pub struct {} {{", name));
    for field in &plan.fields {
        rust_code.push(format!("    pub {}: {},", field_ident(&field.name), rust_type(&field.target)));
    }
    rust_code.push("}".to_string());
    rust_code.push("".to_string());

    rust_code.push(format!("impl Default for {} {{", name));
    rust_code.push("    fn default() -> Self {".to_string());
    if plan.fields.is_empty() {
        rust_code.push(format!("        {} {{}}", name));
    } else {
        rust_code.push(format!("        {} {{", name));
        for field in &plan.fields {
            rust_code.push(format!("            {}: {},", field_ident(&field.name), default_expr(&field.default)));
        }
        rust_code.push("        }".to_string());
    }
    rust_code.push("    }".to_string());
    rust_code.push("}".to_string());
    rust_code.push("".to_string());

    rust_code.push(format!("impl {} {{", name));
    rust_code.push(format!("    pub const CONSTRUCTOR: u32 = 0x{:08x};", plan.constructor_id));
    rust_code.push("".to_string());

    // read_params
    rust_code.push("    #[allow(unused_variables)]".to_string());
    rust_code.push(
        "    pub fn read_params(&mut self, stream: &mut ByteBuffer, exception: bool) -> Result<(), WireError> {".to_string(),
    );
    for op in &plan.decode {
        let (field, codec, indent) = match op {
            DecodeOp::Read { field, codec } => (field, codec, "        "),
            DecodeOp::ReadIfFlag { bit, field, codec } => {
                rust_code.push(format!("        if (self.flags & (1 << {})) != 0 {{", bit));
                (field, codec, "            ")
            }
        };
        read_value(codec, 0, indent, name, rust_code);
        rust_code.push(format!("{}self.{} = value0;", indent, field_ident(field)));
        if let DecodeOp::ReadIfFlag { .. } = op {
            rust_code.push("        }".to_string());
        }
    }
    rust_code.push("        Ok(())".to_string());
    rust_code.push("    }".to_string());
    rust_code.push("".to_string());

    // tl_deserialize
    let boxed = matches!(plan.dispatch.result, EntryResult::Abstract(_)) || plan.dispatch.delegates();
    let result_type = if boxed { "Box<dyn TlObject>" } else { "Self" };
    rust_code.push(format!(
        "    /// Decodes the body following `constructor`. Returns `Ok(None)` for an unknown tag unless `exception` is set. Declared result: `{}`.",
        plan.dispatch.result.type_name()
    ));
    rust_code.push(format!(
        "    pub fn tl_deserialize(stream: &mut ByteBuffer, constructor: u32, exception: bool) -> Result<Option<{}>, WireError> {{",
        result_type
    ));
    if boxed {
        rust_code.push("        let result: Box<dyn TlObject> = match constructor {".to_string());
        for branch in &plan.dispatch.branches {
            match &branch.action {
                DispatchAction::DecodeSelf => {
                    rust_code.push(format!("            0x{:08x} => {{", branch.tag));
                    rust_code.push("                let mut result = Self::default();".to_string());
                    rust_code.push("                result.read_params(stream, exception)?;".to_string());
                    rust_code.push("                Box::new(result)".to_string());
                    rust_code.push("            }".to_string());
                }
                DispatchAction::Delegate(sibling) => {
                    rust_code.push(format!(
                        "            0x{:08x} => return {}::tl_deserialize_boxed(stream, constructor, exception),",
                        branch.tag, sibling
                    ));
                }
            }
        }
        rust_code.push("            _ => {".to_string());
        unrecognized("                ", name, rust_code);
        rust_code.push("            }".to_string());
        rust_code.push("        };".to_string());
        rust_code.push("        Ok(Some(result))".to_string());
    } else {
        rust_code.push("        if constructor != Self::CONSTRUCTOR {".to_string());
        unrecognized("            ", name, rust_code);
        rust_code.push("        }".to_string());
        rust_code.push("        let mut result = Self::default();".to_string());
        rust_code.push("        result.read_params(stream, exception)?;".to_string());
        rust_code.push("        Ok(Some(result))".to_string());
    }
    rust_code.push("    }".to_string());
    rust_code.push("".to_string());

    rust_code.push(
        "    pub fn tl_deserialize_boxed(stream: &mut ByteBuffer, constructor: u32, exception: bool) -> Result<Option<Box<dyn TlObject>>, WireError> {".to_string(),
    );
    if boxed {
        rust_code.push("        Self::tl_deserialize(stream, constructor, exception)".to_string());
    } else {
        rust_code.push(
            "        Ok(Self::tl_deserialize(stream, constructor, exception)?.map(|result| Box::new(result) as Box<dyn TlObject>))"
                .to_string(),
        );
    }
    rust_code.push("    }".to_string());

    // A response type the unit never defines is left to hand-written code.
    if let Some(response) = plan.response.as_ref().filter(|r| known.contains(&r.type_name.as_str())) {
        rust_code.push("".to_string());
        rust_code.push(
            "    pub fn deserialize_response(stream: &mut ByteBuffer, constructor: u32, exception: bool) -> Result<Option<Box<dyn TlObject>>, WireError> {".to_string(),
        );
        rust_code.push(format!(
            "        {}::tl_deserialize_boxed(stream, constructor, exception)",
            response.type_name
        ));
        rust_code.push("    }".to_string());
    }
    rust_code.push("}".to_string());
    rust_code.push("".to_string());

    // TlObject
    rust_code.push(format!("impl TlObject for {} {{", name));
    rust_code.push("    fn constructor_id(&self) -> u32 {".to_string());
    rust_code.push("        Self::CONSTRUCTOR".to_string());
    rust_code.push("    }".to_string());
    rust_code.push("".to_string());
    rust_code.push("    fn serialize_to_stream(&self, stream: &mut ByteBufferMut) -> Result<(), WireError> {".to_string());

    let mut flags_local: Option<&str> = None;
    for op in &plan.encode {
        match op {
            EncodeOp::WriteConstructor(_) => {
                rust_code.push("        stream.write_uint32(Self::CONSTRUCTOR);".to_string());
            }
            EncodeOp::RecomputeFlags { flags_field, bindings } => {
                rust_code.push(format!("        let mut flags = self.{};", field_ident(flags_field)));
                for binding in bindings {
                    let default = plan
                        .field(&binding.field)
                        .map(|field| is_default_expr(&format!("self.{}", field_ident(&field.name)), &field.default))
                        .unwrap_or_else(|| "true".to_string());
                    rust_code.push(format!("        if {} {{", default));
                    rust_code.push(format!("            flags &= !(1 << {});", binding.bit));
                    rust_code.push("        } else {".to_string());
                    rust_code.push(format!("            flags |= 1 << {};", binding.bit));
                    rust_code.push("        }".to_string());
                }
                flags_local = Some(flags_field);
            }
            EncodeOp::Write { field, codec } => {
                if flags_local == Some(field.as_str()) {
                    rust_code.push("        stream.write_int32(flags);".to_string());
                } else {
                    write_value(codec, &format!("self.{}", field_ident(field)), false, 0, "        ", rust_code);
                }
            }
            EncodeOp::WriteIfFlag { bit, field, codec } => {
                let word = if flags_local.is_some() { "flags".to_string() } else { "self.flags".to_string() };
                rust_code.push(format!("        if ({} & (1 << {})) != 0 {{", word, bit));
                write_value(codec, &format!("self.{}", field_ident(field)), false, 0, "            ", rust_code);
                rust_code.push("        }".to_string());
            }
        }
    }
    rust_code.push("        Ok(())".to_string());
    rust_code.push("    }".to_string());
    rust_code.push("}".to_string());
    rust_code.push("".to_string());
}

/// Renders every plan of the unit as Rust source against `gram_tl_wire`,
/// in definition order.
pub fn render_rust(unit: &CompiledUnit, settings: &Settings) -> String {
    let mut rust_code: Vec<String> = Vec::new();
    let namespace = settings.output_namespace.trim();

    if !namespace.is_empty() {
        rust_code.push(format!("pub mod {} {{", escape_rust_keyword(&to_snake_case(namespace))));
    }

    rust_code.push("use gram_tl_wire::{ByteBuffer, ByteBufferMut, TlObject, WireError};".to_string());
    rust_code.push("".to_string());

    let known: Vec<&str> = unit.plans.iter().map(|plan| plan.type_name.as_str()).collect();
    for (_, plan) in unit.pairs() {
        // Duplicate keys share a name; the first definition wins.
        if unit.plan(&plan.type_name).map_or(false, |first| !std::ptr::eq(first, plan)) {
            continue;
        }
        render_struct(plan, &known, &mut rust_code);
    }

    if !namespace.is_empty() {
        rust_code.push("}".to_string());
    }

    rust_code.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_schema;

    fn render(text: &str, settings: &Settings) -> String {
        render_rust(&compile_schema(text, settings).unwrap(), settings)
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("user_id"), "user_id");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("sessionIdValue"), "session_id_value");
        assert_eq!(to_snake_case("api.v2"), "api_v2");
        assert_eq!(field_ident("type"), "type_");
    }

    #[test]
    fn test_render_leaf() {
        let code = render(
            "help.getSensitiveWords#519536bc hash:int = help.SensitiveWordList;",
            &Settings::new("api", "TL_"),
        );
        assert!(code.starts_with("pub mod api {\nuse gram_tl_wire::{ByteBuffer, ByteBufferMut, TlObject, WireError};"));
        assert!(code.contains("pub struct TL_help_GetSensitiveWords {\n    pub hash: i32,\n}"));
        assert!(code.contains("pub const CONSTRUCTOR: u32 = 0x519536bc;"));
        assert!(code.contains("-> Result<Option<Self>, WireError> {"));
        assert!(code.contains("if constructor != Self::CONSTRUCTOR {"));
        assert!(code.contains("self.hash = value0;"));
        assert!(code.contains("stream.write_int32(self.hash);"));
        // The response type is not part of this unit.
        assert!(!code.contains("deserialize_response"));
        assert!(code.ends_with("}"));
    }

    #[test]
    fn test_render_flags() {
        let code = render(
            "enterprise.deleteMessages#1e4a1320 flags:# revoke:flags.0?true id:Vector<int> user_id:long = enterprise.AffectedMessages;",
            &Settings::default(),
        );
        assert!(code.contains("            revoke: true,"));
        assert!(code.contains("        let mut flags = self.flags;\n        if self.revoke == true {\n            flags &= !(1 << 0);"));
        assert!(code.contains("        stream.write_int32(flags);"));
        assert!(code.contains("        if (flags & (1 << 0)) != 0 {\n            stream.write_bool(self.revoke);"));
        assert!(code.contains("        if (self.flags & (1 << 0)) != 0 {"));
        assert!(code.contains("stream.write_uint32(0x1cb5c415);"));
        assert!(code.contains("for item0 in self.id.iter() {\n            stream.write_int32(*item0);"));
        assert!(code.contains("if magic0 != 0x1cb5c415 {"));
        assert!(code.contains("            return Ok(());"));
    }

    #[test]
    fn test_render_family() {
        let code = render(
            "help.sensitiveWord#4c5d13a2 = help.SensitiveWordList;\n\
             help.sensitiveWordList#79d54d0d words:Vector<Vector<string>> = help.SensitiveWordList;\n\
             help.getSensitiveWords#519536bc hash:int = help.SensitiveWordList;",
            &Settings::new("", "TL_"),
        );
        assert!(!code.contains("pub mod"));
        assert!(code.contains("0x79d54d0d => return TL_help_SensitiveWordList::tl_deserialize_boxed(stream, constructor, exception),"));
        assert!(code.contains("0x4c5d13a2 => return TL_help_SensitiveWord::tl_deserialize_boxed(stream, constructor, exception),"));
        assert!(code.contains("pub words: Vec<Vec<String>>,"));
        assert!(code.contains("let mut value1 = Vec::new();"));
        assert!(code.contains("let value2 = stream.read_string()?.into_owned();"));
        assert!(code.contains("TL_help_SensitiveWordList::tl_deserialize_boxed(stream, constructor, exception)\n    }"));
    }

    #[test]
    fn test_render_named_field() {
        let code = render(
            "help.peer#10 id:long = help.Peer;\nhelp.wrap#11 flags:# peer:flags.1?help.Peer type:string = help.Wrap;",
            &Settings::default(),
        );
        assert!(code.contains("pub peer: Box<dyn TlObject>,"));
        assert!(code.contains("pub type_: String,"));
        assert!(code.contains("peer: Box::new(help_Peer::default()),"));
        assert!(code.contains("if self.peer.to_bytes()? == help_Peer::default().to_bytes()? {"));
        assert!(code.contains("let tag0 = stream.read_uint32()?;"));
        assert!(code.contains(".unwrap_or_else(|| Box::new(help_Peer::default()));"));
        assert!(code.contains("self.peer.serialize_to_stream(stream)?;"));
    }
}
