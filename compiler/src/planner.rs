use tracing::{debug, trace};

use crate::{
    error::GramError,
    naming::resolve_name,
    plan::{
        Codec, DecodeOp, DefaultValue, DispatchAction, DispatchBranch, DispatchPlan, EncodeOp, EntryResult,
        FieldPlan, FlagBinding, GenerationPlan, ResponsePlan, TargetType,
    },
    settings::Settings,
    types::{Schema, TypeDefinition, FLAGS_FIELD},
    value_type::ValueType,
    verifier::check_references,
};

/// Builds one plan per definition, in definition order.
pub fn plan_schema(schema: &Schema, settings: &Settings) -> Result<Vec<GenerationPlan>, GramError> {
    check_references(schema)?;
    let vector_tag = settings.vector_tag()?;
    let plans = schema
        .definitions
        .iter()
        .map(|def| plan_definition(schema, def, &settings.symbol_prefix, vector_tag))
        .collect::<Vec<_>>();
    debug!(plans = plans.len(), prefix = %settings.symbol_prefix, "planned schema");
    Ok(plans)
}

pub fn plan_definition(schema: &Schema, def: &TypeDefinition, prefix: &str, vector_tag: u32) -> GenerationPlan {
    let type_name = resolve_name(prefix, &def.key);
    let fields: Vec<FieldPlan> = def
        .fields
        .iter()
        .map(|field| FieldPlan {
            name:     field.name.clone(),
            target:   target_type(&field.ty, prefix),
            default:  default_value(&field.ty, prefix),
            flag_bit: field.flag_bit,
        })
        .collect();

    let mut encode = vec![EncodeOp::WriteConstructor(def.constructor_id)];
    let bindings: Vec<FlagBinding> = def
        .fields
        .iter()
        .filter_map(|field| field.flag_bit.map(|bit| FlagBinding { field: field.name.clone(), bit }))
        .collect();
    if def.field(FLAGS_FIELD).is_some() && !bindings.is_empty() {
        encode.push(EncodeOp::RecomputeFlags {
            flags_field: FLAGS_FIELD.to_string(),
            bindings,
        });
    }

    let mut decode = Vec::with_capacity(def.fields.len());
    for field in &def.fields {
        let codec = codec(&field.ty, prefix, vector_tag);
        match field.flag_bit {
            Some(bit) => {
                encode.push(EncodeOp::WriteIfFlag { bit, field: field.name.clone(), codec: codec.clone() });
                decode.push(DecodeOp::ReadIfFlag { bit, field: field.name.clone(), codec });
            }
            None => {
                encode.push(EncodeOp::Write { field: field.name.clone(), codec: codec.clone() });
                decode.push(DecodeOp::Read { field: field.name.clone(), codec });
            }
        }
    }

    let dispatch = dispatch_plan(schema, def, &type_name, prefix);
    let response = match &def.return_type {
        ValueType::Named(name) => Some(ResponsePlan { type_name: resolve_name(prefix, name) }),
        ValueType::Boolean(_) => Some(ResponsePlan { type_name: format!("{}Bool", prefix) }),
        _ => None,
    };

    trace!(key = %def.key, %type_name, siblings = dispatch.siblings.len(), "planned definition");
    GenerationPlan {
        key: def.key.clone(),
        type_name,
        constructor_id: def.constructor_id,
        fields,
        encode,
        decode,
        dispatch,
        response,
    }
}

fn dispatch_plan(schema: &Schema, def: &TypeDefinition, type_name: &str, prefix: &str) -> DispatchPlan {
    let own_branch = || DispatchBranch {
        tag:       def.constructor_id,
        key:       def.key.clone(),
        type_name: type_name.to_string(),
        action:    DispatchAction::DecodeSelf,
    };

    // A bucket holding only this definition is not a family.
    let family = schema
        .child_map
        .find_family(&def.key)
        .filter(|(_, members)| !(members.len() == 1 && members.contains(&def.key)));
    let (bucket, members) = match family {
        Some(family) => family,
        None => {
            return DispatchPlan {
                result:   EntryResult::Concrete(type_name.to_string()),
                siblings: Vec::new(),
                branches: vec![own_branch()],
            };
        }
    };

    let mut branches = Vec::with_capacity(members.len() + 1);
    for member in members {
        if *member == def.key {
            branches.push(own_branch());
            continue;
        }
        let tag = schema
            .find(member)
            .map(|sibling| sibling.constructor_id)
            .unwrap_or_default();
        let sibling_name = resolve_name(prefix, member);
        branches.push(DispatchBranch {
            tag,
            key: member.clone(),
            type_name: sibling_name.clone(),
            action: DispatchAction::Delegate(sibling_name),
        });
    }
    // A containment match can land in a bucket the definition is not part of.
    if !members.contains(&def.key) {
        branches.push(own_branch());
    }

    let result = match members.first() {
        Some(first) if *first == def.key => EntryResult::Concrete(type_name.to_string()),
        _ => EntryResult::Abstract(resolve_name(prefix, bucket)),
    };

    DispatchPlan {
        result,
        siblings: members.iter().map(|member| resolve_name(prefix, member)).collect(),
        branches,
    }
}

fn target_type(ty: &ValueType, prefix: &str) -> TargetType {
    match ty {
        ValueType::String => TargetType::String,
        ValueType::Boolean(_) => TargetType::Boolean,
        ValueType::Int32 => TargetType::Int32,
        ValueType::Int64 => TargetType::Int64,
        ValueType::Vector(inner) => TargetType::Vector(Box::new(target_type(inner, prefix))),
        ValueType::Named(name) => TargetType::Named(resolve_name(prefix, name)),
    }
}

fn default_value(ty: &ValueType, prefix: &str) -> DefaultValue {
    match ty {
        ValueType::String => DefaultValue::String(String::new()),
        ValueType::Boolean(literal) => DefaultValue::Bool(*literal),
        ValueType::Int32 => DefaultValue::Int32(0),
        ValueType::Int64 => DefaultValue::Int64(0),
        ValueType::Vector(_) => DefaultValue::EmptyVector,
        ValueType::Named(name) => DefaultValue::Construct(resolve_name(prefix, name)),
    }
}

fn codec(ty: &ValueType, prefix: &str, vector_tag: u32) -> Codec {
    match ty {
        ValueType::String => Codec::String,
        ValueType::Boolean(_) => Codec::Boolean,
        ValueType::Int32 => Codec::Int32,
        ValueType::Int64 => Codec::Int64,
        ValueType::Vector(inner) => Codec::Vector {
            tag:     vector_tag,
            element: Box::new(codec(inner, prefix, vector_tag)),
        },
        ValueType::Named(name) => Codec::Object { type_name: resolve_name(prefix, name) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_schema, tokenizer::tokenize_schema};

    fn plan(text: &str, prefix: &str) -> Vec<GenerationPlan> {
        let schema = parse_schema(&tokenize_schema(text).unwrap()).unwrap();
        plan_schema(&schema, &Settings::new("", prefix)).unwrap()
    }

    #[test]
    fn test_plan_leaf_definition() {
        let plans = plan("help.getSensitiveWords#519536bc hash:int = help.SensitiveWordList;", "TL_");
        assert_eq!(plans.len(), 1);

        let plan = &plans[0];
        assert_eq!(plan.type_name, "TL_help_GetSensitiveWords");
        assert_eq!(plan.constructor_id, 0x519536bc);
        assert_eq!(
            plan.encode,
            vec![
                EncodeOp::WriteConstructor(0x519536bc),
                EncodeOp::Write { field: "hash".into(), codec: Codec::Int32 },
            ]
        );
        assert_eq!(plan.decode, vec![DecodeOp::Read { field: "hash".into(), codec: Codec::Int32 }]);
        assert_eq!(plan.response, Some(ResponsePlan { type_name: "TL_help_SensitiveWordList".into() }));

        // No bucket key contains `help.getsensitivewords`, so it is a leaf.
        assert!(!plan.dispatch.is_polymorphic());
        assert_eq!(plan.dispatch.result, EntryResult::Concrete("TL_help_GetSensitiveWords".into()));
        let branch = plan.dispatch.route(0x519536bc).unwrap();
        assert_eq!(branch.action, DispatchAction::DecodeSelf);
    }

    #[test]
    fn test_plan_flags() {
        let plans = plan(
            "enterprise.deleteMessages#1e4a1320 flags:# revoke:flags.0?true id:Vector<int> user_id:long = enterprise.AffectedMessages;",
            "",
        );
        let plan = &plans[0];
        assert!(plan.has_flags());

        let defaults: Vec<_> = plan.defaults().collect();
        assert_eq!(
            defaults,
            vec![
                ("flags", &DefaultValue::Int32(0)),
                ("revoke", &DefaultValue::Bool(true)),
                ("id", &DefaultValue::EmptyVector),
                ("user_id", &DefaultValue::Int64(0)),
            ]
        );
        assert_eq!(
            plan.encode[1],
            EncodeOp::RecomputeFlags {
                flags_field: "flags".into(),
                bindings:    vec![FlagBinding { field: "revoke".into(), bit: 0 }],
            }
        );
        assert_eq!(
            plan.decode[1],
            DecodeOp::ReadIfFlag { bit: 0, field: "revoke".into(), codec: Codec::Boolean }
        );
        assert_eq!(
            plan.field("id").unwrap().target,
            TargetType::Vector(Box::new(TargetType::Int32))
        );
        assert_eq!(
            plan.decode[2],
            DecodeOp::Read {
                field: "id".into(),
                codec: Codec::Vector { tag: 0x1cb5c415, element: Box::new(Codec::Int32) },
            }
        );
    }

    #[test]
    fn test_plan_family_dispatch() {
        let plans = plan(
            "help.sensitiveWord#4c5d13a2 = help.SensitiveWordList;\n\
             help.sensitiveWordList#79d54d0d hash:int words:Vector<string> = help.SensitiveWordList;",
            "TL_",
        );
        let siblings = vec!["TL_help_SensitiveWord".to_string(), "TL_help_SensitiveWordList".to_string()];

        for plan in &plans {
            assert!(plan.dispatch.is_polymorphic());
            assert_eq!(plan.dispatch.siblings, siblings);
            assert_eq!(plan.dispatch.branches.len(), 2);
        }

        let first = &plans[0].dispatch;
        assert_eq!(first.result, EntryResult::Concrete("TL_help_SensitiveWord".into()));
        assert_eq!(first.route(0x4c5d13a2).unwrap().action, DispatchAction::DecodeSelf);
        assert_eq!(
            first.route(0x79d54d0d).unwrap().action,
            DispatchAction::Delegate("TL_help_SensitiveWordList".into())
        );

        let second = &plans[1].dispatch;
        assert_eq!(second.result, EntryResult::Abstract("TL_help_SensitiveWordList".into()));
        assert_eq!(second.route(0x79d54d0d).unwrap().action, DispatchAction::DecodeSelf);
        assert_eq!(
            second.route(0x4c5d13a2).unwrap().action,
            DispatchAction::Delegate("TL_help_SensitiveWord".into())
        );
        assert!(second.route(0xdeadbeef).is_none());
    }

    #[test]
    fn test_plan_self_only_bucket_is_not_polymorphic() {
        let plans = plan("a.peer#7 id:int = a.Peer;", "");
        let dispatch = &plans[0].dispatch;
        assert!(dispatch.siblings.is_empty());
        assert!(!dispatch.is_polymorphic());
        assert_eq!(dispatch.result, EntryResult::Concrete("a_Peer".into()));
        assert_eq!(dispatch.branches.len(), 1);
        assert_eq!(dispatch.route(7).unwrap().action, DispatchAction::DecodeSelf);
    }

    #[test]
    fn test_plan_longer_member_key_is_leaf() {
        let plans = plan(
            "help.sensitiveWordListNotModified#4c5d13a2 = help.SensitiveWordList;\n\
             help.sensitiveWordList#79d54d0d hash:int = help.SensitiveWordList;",
            "TL_",
        );
        // The bucket key does not contain the longer key.
        assert!(!plans[0].dispatch.is_polymorphic());
        assert_eq!(plans[0].dispatch.result, EntryResult::Concrete("TL_help_SensitiveWordListNotModified".into()));
        assert_eq!(plans[1].dispatch.branches.len(), 2);
        assert_eq!(plans[1].dispatch.result, EntryResult::Abstract("TL_help_SensitiveWordList".into()));
    }

    #[test]
    fn test_plan_case_insensitive_family() {
        let plans = plan(
            "a.other#1 = help.sensitivewords;\nHelp.SensitiveWords#2 = a.Words;",
            "",
        );
        // Contained in the first bucket, so the member list is the other definition.
        let dispatch = &plans[1].dispatch;
        assert_eq!(dispatch.siblings, vec!["a_Other".to_string()]);
        assert_eq!(dispatch.result, EntryResult::Abstract("help_Sensitivewords".into()));
        assert_eq!(dispatch.route(2).unwrap().action, DispatchAction::DecodeSelf);
        assert_eq!(dispatch.route(1).unwrap().action, DispatchAction::Delegate("a_Other".into()));
    }

    #[test]
    fn test_plan_named_fields_and_responses() {
        let plans = plan(
            "help.peer#10 id:int = help.Peer;\n\
             help.getPeers#11 peers:Vector<help.Peer> main:help.peer = help.Peer;\n\
             help.ping#12 = Bool;\n\
             help.count#13 = int;",
            "TL_",
        );
        let get_peers = &plans[1];
        assert_eq!(
            get_peers.field("peers").unwrap().target,
            TargetType::Vector(Box::new(TargetType::Named("TL_help_Peer".into())))
        );
        assert_eq!(get_peers.field("main").unwrap().default, DefaultValue::Construct("TL_help_Peer".into()));
        assert_eq!(plans[2].response, Some(ResponsePlan { type_name: "TL_Bool".into() }));
        assert_eq!(plans[3].response, None);
    }

    #[test]
    fn test_plan_custom_vector_tag() {
        let schema = parse_schema(&tokenize_schema("a.b#1 ids:Vector<long> = a.B;").unwrap()).unwrap();
        let settings = Settings::default().with_vector_framing_tag("0x00000001");
        let plans = plan_schema(&schema, &settings).unwrap();
        assert_eq!(
            plans[0].decode[0],
            DecodeOp::Read {
                field: "ids".into(),
                codec: Codec::Vector { tag: 1, element: Box::new(Codec::Int64) },
            }
        );
    }

    #[test]
    fn test_plan_unresolved_reference() {
        let schema = parse_schema(&tokenize_schema("a.b#1 peer:a.Missing = a.B;").unwrap()).unwrap();
        let err = plan_schema(&schema, &Settings::default()).unwrap_err();
        assert!(matches!(err, GramError::UnresolvedReference { .. }));
    }
}
