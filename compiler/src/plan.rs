//! The generation plan: a renderer-independent description of how one schema
//! definition is encoded, decoded and dispatched.

use serde::Serialize;

/// A field's type after naming resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TargetType {
    String,
    Boolean,
    Int32,
    Int64,
    Vector(Box<TargetType>),
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DefaultValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    EmptyVector,
    /// Zero-argument construction of the named output type.
    Construct(String),
}

/// How a value crosses the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Codec {
    String,
    Boolean,
    Int32,
    Int64,
    /// Framing tag, element count, then each element.
    Vector { tag: u32, element: Box<Codec> },
    /// Delegates to the object's own encoder, or to the named type's entry
    /// point when decoding.
    Object { type_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPlan {
    pub name:     String,
    pub target:   TargetType,
    pub default:  DefaultValue,
    pub flag_bit: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagBinding {
    pub field: String,
    pub bit:   u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EncodeOp {
    WriteConstructor(u32),
    /// Rebuilds the flags word from the guarded fields before anything else
    /// is written: bit set iff the field differs from its default.
    RecomputeFlags { flags_field: String, bindings: Vec<FlagBinding> },
    Write { field: String, codec: Codec },
    WriteIfFlag { bit: u8, field: String, codec: Codec },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DecodeOp {
    Read { field: String, codec: Codec },
    ReadIfFlag { bit: u8, field: String, codec: Codec },
}

/// The declared result of a definition's entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntryResult {
    Concrete(String),
    Abstract(String),
}

impl EntryResult {
    pub fn type_name(&self) -> &str {
        match self {
            EntryResult::Concrete(name) | EntryResult::Abstract(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DispatchAction {
    DecodeSelf,
    /// Hands the stream to the named sibling's entry point.
    Delegate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchBranch {
    pub tag:       u32,
    pub key:       String,
    pub type_name: String,
    pub action:    DispatchAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchPlan {
    pub result:   EntryResult,
    /// Resolved names of the family members, in declaration order.
    pub siblings: Vec<String>,
    pub branches: Vec<DispatchBranch>,
}

impl DispatchPlan {
    pub fn is_polymorphic(&self) -> bool {
        !self.siblings.is_empty()
    }

    /// The first branch accepting `tag`.
    pub fn route(&self, tag: u32) -> Option<&DispatchBranch> {
        self.branches.iter().find(|branch| branch.tag == tag)
    }

    pub fn delegates(&self) -> bool {
        self.branches
            .iter()
            .any(|branch| matches!(branch.action, DispatchAction::Delegate(_)))
    }
}

/// Decoding a response to this definition delegates to `type_name`'s entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponsePlan {
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationPlan {
    pub key:            String,
    pub type_name:      String,
    pub constructor_id: u32,
    pub fields:         Vec<FieldPlan>,
    pub encode:         Vec<EncodeOp>,
    pub decode:         Vec<DecodeOp>,
    pub dispatch:       DispatchPlan,
    pub response:       Option<ResponsePlan>,
}

impl GenerationPlan {
    /// The default-value table, in field order.
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &DefaultValue)> {
        self.fields.iter().map(|field| (field.name.as_str(), &field.default))
    }

    pub fn field(&self, name: &str) -> Option<&FieldPlan> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_flags(&self) -> bool {
        self.encode
            .iter()
            .any(|op| matches!(op, EncodeOp::RecomputeFlags { .. }))
    }
}
