//! Runtime values and the validation + construction engine.
//!
//! Every tree node is checked against its declared shape when it is built
//! and again on every later mutation, so a producer (the parser, or anything
//! else) cannot create a structurally invalid node.
//!
//! Design notes:
//! - Construction goes through `NodeBuilder`: accumulate fields, validate
//!   each assignment immediately, freeze into an `Instance` on `finish()`.
//! - Duplicate-assignment and missing-field checks are builder contracts
//!   enforced before the freeze; defaults for `Maybe`/`Array` fields do not
//!   count as caller assignments.
//! - Checks compare descriptor identity (`Arc::ptr_eq`), not names.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::descriptor::{
    ConstructorType, FieldSpec, OpaqueType, ProductType, SumType, TypeDescriptor,
};
use crate::error::FieldError;

/// Sentinel stored in a `Maybe(Int)` field that was never assigned.
pub const NO_INTEGER: i64 = -1;

// ------------------------------- Values ----------------------------------- //

#[derive(Debug, Clone)]
pub enum Value {
    /// The "absent" sentinel for `Maybe` fields whose wrapped type has no
    /// in-band sentinel of its own.
    Unset,
    Str(String),
    Int(i64),
    Bool(bool),
    Array(Vec<Value>),
    /// Singleton variant of a simple sum. Never constructed by callers;
    /// cloned out of the registry.
    Simple(Arc<SimpleValue>),
    /// Compound-sum constructor instance or product record.
    Node(Box<Instance>),
    Opaque(OpaqueValue),
}

impl Value {
    pub fn as_node(&self) -> Option<&Instance> {
        match self {
            Value::Node(inst) => Some(inst),
            _ => None,
        }
    }
}

/// An enum-like value: one immutable instance per variant of a simple sum,
/// created once at registry build time and compared by identity/ordinal.
#[derive(Debug)]
pub struct SimpleValue {
    parent: Arc<SumType>,
    pub tag: u32,
    pub name: String,
}

impl SimpleValue {
    pub(crate) fn new(parent: &Arc<SumType>, tag: u32, name: &str) -> Arc<Self> {
        Arc::new(SimpleValue {
            parent: parent.clone(),
            tag,
            name: name.to_string(),
        })
    }

    pub fn parent(&self) -> &Arc<SumType> {
        &self.parent
    }
}

impl fmt::Display for SimpleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.parent.name, self.name, self.tag)
    }
}

/// Value of an externally supplied host type. Conformance is decided by the
/// payload's actual `TypeId`, not by what the caller claims.
#[derive(Clone)]
pub struct OpaqueValue {
    ty: Arc<OpaqueType>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(ty: &Arc<OpaqueType>, payload: T) -> Self {
        OpaqueValue {
            ty: ty.clone(),
            payload: Arc::new(payload),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.ty.name
    }

    pub fn payload_type_id(&self) -> TypeId {
        self.payload.as_ref().type_id()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueValue")
            .field("ty", &self.ty.name)
            .finish_non_exhaustive()
    }
}

// --------------------------- Constructible types -------------------------- //

/// The two constructible shapes: a compound-sum constructor (tagged) or a
/// product record (untagged).
#[derive(Debug, Clone)]
pub enum NodeType {
    Constructor(Arc<ConstructorType>),
    Product(Arc<ProductType>),
}

impl NodeType {
    pub fn name(&self) -> &str {
        match self {
            NodeType::Constructor(c) => &c.name,
            NodeType::Product(p) => &p.name,
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        match self {
            NodeType::Constructor(c) => &c.fields,
            NodeType::Product(p) => p.fields(),
        }
    }

    /// 1-based tag for constructors; products carry none.
    pub fn tag(&self) -> Option<u32> {
        match self {
            NodeType::Constructor(c) => Some(c.tag),
            NodeType::Product(_) => None,
        }
    }
}

// ------------------------------ Instances --------------------------------- //

/// A finalized tree node: current field values in declaration order plus the
/// per-field assigned flags kept for mutation bookkeeping. Owned exclusively
/// by its creator until handed to a consumer; mutation requires `&mut`.
#[derive(Debug, Clone)]
pub struct Instance {
    ty: NodeType,
    values: Vec<Value>,
    assigned: Vec<bool>,
}

impl Instance {
    pub fn ty(&self) -> &NodeType {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    pub fn tag(&self) -> Option<u32> {
        self.ty.tag()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        let i = self.ty.fields().iter().position(|f| f.name == name)?;
        Some(&self.values[i])
    }

    /// Fields in declaration order, for encoders and pretty-printers.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ty
            .fields()
            .iter()
            .zip(&self.values)
            .map(|(spec, v)| (spec.name.as_str(), v))
    }

    /// Re-validates `value` against the field's declared shape before
    /// committing it. Unknown names fail distinctly from shape mismatches.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let Some(i) = self.ty.fields().iter().position(|f| f.name == name) else {
            return Err(FieldError::UnknownField {
                type_name: self.type_name().to_string(),
                field: name.to_string(),
            });
        };
        let desc = &self.ty.fields()[i].desc;
        if !structural_check(&value, desc) {
            return Err(FieldError::ShapeMismatch {
                type_name: self.type_name().to_string(),
                field: name.to_string(),
                expected: desc.to_string(),
                actual: shape_of(&value),
            });
        }
        self.values[i] = value;
        self.assigned[i] = true;
        Ok(())
    }

    /// Is this instance exactly the given constructor? Identity, not name.
    pub fn is_type(&self, cons: &Arc<ConstructorType>) -> bool {
        match &self.ty {
            NodeType::Constructor(c) => Arc::ptr_eq(c, cons),
            NodeType::Product(_) => false,
        }
    }

    fn is_product(&self, product: &Arc<ProductType>) -> bool {
        match &self.ty {
            NodeType::Product(p) => Arc::ptr_eq(p, product),
            NodeType::Constructor(_) => false,
        }
    }

    fn is_constructor_of(&self, sum: &Arc<SumType>) -> bool {
        match &self.ty {
            NodeType::Constructor(c) => c.belongs_to(sum),
            NodeType::Product(_) => false,
        }
    }
}

// ------------------------------- Builder ---------------------------------- //

/// Accumulates field assignments, validating each one immediately, and
/// freezes into an `Instance` on `finish()`.
#[derive(Debug)]
pub struct NodeBuilder {
    ty: NodeType,
    values: Vec<Value>,
    assigned: Vec<bool>,
}

impl NodeBuilder {
    pub fn new(ty: NodeType) -> Self {
        let values = ty.fields().iter().map(|f| default_for(&f.desc)).collect();
        let assigned = vec![false; ty.fields().len()];
        NodeBuilder {
            ty,
            values,
            assigned,
        }
    }

    /// Assign fields by position, left to right from the first field.
    pub fn positional(
        mut self,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self, FieldError> {
        let arity = self.ty.fields().len();
        for (i, value) in values.into_iter().enumerate() {
            if i >= arity {
                return Err(FieldError::TooManyPositional {
                    type_name: self.ty.name().to_string(),
                    arity,
                    got: i + 1,
                });
            }
            self.assign(i, value)?;
        }
        Ok(self)
    }

    /// Assign one field by name.
    pub fn named(mut self, name: &str, value: Value) -> Result<Self, FieldError> {
        let Some(i) = self.ty.fields().iter().position(|f| f.name == name) else {
            return Err(FieldError::UnknownField {
                type_name: self.ty.name().to_string(),
                field: name.to_string(),
            });
        };
        self.assign(i, value)?;
        Ok(self)
    }

    /// Completeness check, then freeze. Every unassigned field whose shape is
    /// neither `Maybe` nor `Array` is reported, all of them at once.
    pub fn finish(self) -> Result<Instance, FieldError> {
        let missing: Vec<String> = self
            .ty
            .fields()
            .iter()
            .zip(&self.assigned)
            .filter(|(spec, done)| !**done && !has_default(&spec.desc))
            .map(|(spec, _)| spec.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(FieldError::MissingFields {
                type_name: self.ty.name().to_string(),
                fields: missing,
            });
        }
        Ok(Instance {
            ty: self.ty,
            values: self.values,
            assigned: self.assigned,
        })
    }

    fn assign(&mut self, i: usize, value: Value) -> Result<(), FieldError> {
        let spec = &self.ty.fields()[i];
        if self.assigned[i] {
            return Err(FieldError::DuplicateAssignment {
                type_name: self.ty.name().to_string(),
                field: spec.name.clone(),
            });
        }
        if !structural_check(&value, &spec.desc) {
            return Err(FieldError::ShapeMismatch {
                type_name: self.ty.name().to_string(),
                field: spec.name.clone(),
                expected: spec.desc.to_string(),
                actual: shape_of(&value),
            });
        }
        self.values[i] = value;
        self.assigned[i] = true;
        Ok(())
    }
}

/// Default applied at builder creation. Maybe fields get an "unset" sentinel
/// matched to the wrapped type; arrays start empty. Anything else has no
/// default and must be assigned before the freeze.
fn default_for(desc: &TypeDescriptor) -> Value {
    match desc {
        TypeDescriptor::Maybe(inner) => match inner.as_ref() {
            TypeDescriptor::Int => Value::Int(NO_INTEGER),
            TypeDescriptor::Str => Value::Str(String::new()),
            _ => Value::Unset,
        },
        TypeDescriptor::Array(_) => Value::Array(Vec::new()),
        _ => Value::Unset,
    }
}

fn has_default(desc: &TypeDescriptor) -> bool {
    matches!(
        desc,
        TypeDescriptor::Maybe(_) | TypeDescriptor::Array(_)
    )
}

// --------------------------- Structural check ----------------------------- //

/// Does `value` conform to `desc`? Exact representation everywhere, no
/// coercion; type checks are identity checks on shared descriptors.
pub fn structural_check(value: &Value, desc: &TypeDescriptor) -> bool {
    match desc {
        TypeDescriptor::Maybe(inner) => {
            matches!(value, Value::Unset) || structural_check(value, inner)
        }
        TypeDescriptor::Array(item) => match value {
            Value::Array(xs) => xs.iter().all(|x| structural_check(x, item)),
            _ => false,
        },
        TypeDescriptor::Str => matches!(value, Value::Str(_)),
        TypeDescriptor::Int => matches!(value, Value::Int(_)),
        TypeDescriptor::Bool => matches!(value, Value::Bool(_)),
        TypeDescriptor::Opaque(host) => match value {
            Value::Opaque(v) => host.matches(v.payload_type_id()),
            _ => false,
        },
        TypeDescriptor::Product(p) => match value {
            Value::Node(inst) => inst.is_product(p),
            _ => false,
        },
        TypeDescriptor::Sum(s) => match value {
            Value::Simple(v) if s.simple => Arc::ptr_eq(v.parent(), s),
            Value::Node(inst) if !s.simple => inst.is_constructor_of(s),
            _ => false,
        },
    }
}

/// Short description of a value's shape, for mismatch messages.
pub fn shape_of(value: &Value) -> String {
    match value {
        Value::Unset => "unset".to_string(),
        Value::Str(_) => "string".to_string(),
        Value::Int(_) => "int".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Simple(v) => format!("{}.{}", v.parent().name, v.name),
        Value::Node(inst) => inst.type_name().to_string(),
        Value::Opaque(v) => v.type_name().to_string(),
    }
}

// ------------------------------- Display ---------------------------------- //

// Compact s-expression render: `(ConsName field ...)` with fields in
// declaration order, `_` for unset. A full pretty-printer is a separate
// consumer; this form is what the CLI prints and what the parser tests
// assert against.

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "_"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Value::Simple(v) => write!(f, "{v}"),
            Value::Node(inst) => write!(f, "{inst}"),
            Value::Opaque(v) => write!(f, "<{}>", v.type_name()),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.type_name())?;
        for (_, v) in self.fields() {
            write!(f, " {v}")?;
        }
        write!(f, ")")
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ConstructorType, OpaqueType, ProductType, SumType};

    // Hand-built compound sum: expr = Num(int i) | Pair(expr left, expr right)
    fn expr_sum() -> (Arc<SumType>, Arc<ConstructorType>, Arc<ConstructorType>) {
        let sum = SumType::shell("expr", false);
        let num = ConstructorType::new(
            "Num",
            1,
            &sum,
            vec![FieldSpec {
                name: "i".to_string(),
                desc: TypeDescriptor::Int,
            }],
        );
        let pair = ConstructorType::new(
            "Pair",
            2,
            &sum,
            vec![
                FieldSpec {
                    name: "left".to_string(),
                    desc: TypeDescriptor::Sum(sum.clone()),
                },
                FieldSpec {
                    name: "right".to_string(),
                    desc: TypeDescriptor::Sum(sum.clone()),
                },
            ],
        );
        sum.freeze(vec![num.clone(), pair.clone()]);
        (sum, num, pair)
    }

    fn num(cons: &Arc<ConstructorType>, i: i64) -> Value {
        let inst = NodeBuilder::new(NodeType::Constructor(cons.clone()))
            .positional([Value::Int(i)])
            .unwrap()
            .finish()
            .unwrap();
        Value::Node(Box::new(inst))
    }

    #[test]
    fn positional_and_named_assignment_both_work() {
        let (_, num_c, pair) = expr_sum();
        let inst = NodeBuilder::new(NodeType::Constructor(pair.clone()))
            .positional([num(&num_c, 1)])
            .unwrap()
            .named("right", num(&num_c, 2))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(inst.to_string(), "(Pair (Num 1) (Num 2))");
        assert_eq!(inst.ty().name(), "Pair");
        assert_eq!(inst.tag(), Some(2));
    }

    #[test]
    fn duplicate_assignment_names_the_field() {
        let (_, num_c, pair) = expr_sum();
        let err = NodeBuilder::new(NodeType::Constructor(pair))
            .positional([num(&num_c, 1)])
            .unwrap()
            .named("left", num(&num_c, 2))
            .unwrap_err();
        match err {
            FieldError::DuplicateAssignment { field, .. } => assert_eq!(field, "left"),
            other => panic!("expected duplicate assignment, got {other}"),
        }
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let (_, _, pair) = expr_sum();
        let err = NodeBuilder::new(NodeType::Constructor(pair))
            .finish()
            .unwrap_err();
        match err {
            FieldError::MissingFields { fields, .. } => {
                assert_eq!(fields, vec!["left".to_string(), "right".to_string()]);
            }
            other => panic!("expected missing fields, got {other}"),
        }
    }

    #[test]
    fn shape_mismatch_reports_expected_and_actual() {
        let (_, num_c, _) = expr_sum();
        let err = NodeBuilder::new(NodeType::Constructor(num_c))
            .positional([Value::Str("1".to_string())])
            .unwrap_err();
        match err {
            FieldError::ShapeMismatch {
                field,
                expected,
                actual,
                ..
            } => {
                assert_eq!(field, "i");
                assert_eq!(expected, "int");
                assert_eq!(actual, "string");
            }
            other => panic!("expected shape mismatch, got {other}"),
        }
    }

    #[test]
    fn too_many_positional_values_fail() {
        let (_, num_c, _) = expr_sum();
        let err = NodeBuilder::new(NodeType::Constructor(num_c))
            .positional([Value::Int(1), Value::Int(2)])
            .unwrap_err();
        assert!(matches!(err, FieldError::TooManyPositional { arity: 1, got: 2, .. }));
    }

    #[test]
    fn set_field_round_trips_and_rejects_mismatch() {
        let (_, num_c, pair) = expr_sum();
        let mut inst = NodeBuilder::new(NodeType::Constructor(pair))
            .positional([num(&num_c, 1), num(&num_c, 2)])
            .unwrap()
            .finish()
            .unwrap();

        inst.set_field("left", num(&num_c, 9)).unwrap();
        assert_eq!(inst.field("left").unwrap().to_string(), "(Num 9)");

        let err = inst.set_field("left", Value::Int(3)).unwrap_err();
        assert!(matches!(err, FieldError::ShapeMismatch { .. }));

        let err = inst.set_field("nonesuch", Value::Int(3)).unwrap_err();
        assert!(matches!(err, FieldError::UnknownField { .. }));
    }

    #[test]
    fn maybe_and_array_defaults_apply() {
        // rec = (int? count, string? label, expr? child, expr* items)
        let (sum, _, _) = expr_sum();
        let rec = ProductType::shell("rec");
        rec.freeze(vec![
            FieldSpec {
                name: "count".to_string(),
                desc: TypeDescriptor::Maybe(Box::new(TypeDescriptor::Int)),
            },
            FieldSpec {
                name: "label".to_string(),
                desc: TypeDescriptor::Maybe(Box::new(TypeDescriptor::Str)),
            },
            FieldSpec {
                name: "child".to_string(),
                desc: TypeDescriptor::Maybe(Box::new(TypeDescriptor::Sum(sum))),
            },
            FieldSpec {
                name: "items".to_string(),
                desc: TypeDescriptor::Array(Box::new(TypeDescriptor::Int)),
            },
        ]);
        let inst = NodeBuilder::new(NodeType::Product(rec))
            .finish()
            .expect("all fields default");
        assert!(matches!(inst.field("count"), Some(Value::Int(NO_INTEGER))));
        assert!(matches!(inst.field("label"), Some(Value::Str(s)) if s.is_empty()));
        assert!(matches!(inst.field("child"), Some(Value::Unset)));
        assert!(matches!(inst.field("items"), Some(Value::Array(xs)) if xs.is_empty()));
        assert!(inst.tag().is_none());
    }

    #[test]
    fn arrays_check_every_element() {
        let desc = TypeDescriptor::Array(Box::new(TypeDescriptor::Int));
        assert!(structural_check(
            &Value::Array(vec![Value::Int(1), Value::Int(2)]),
            &desc
        ));
        assert!(!structural_check(
            &Value::Array(vec![Value::Int(1), Value::Bool(true)]),
            &desc
        ));
        assert!(!structural_check(&Value::Int(1), &desc));
    }

    #[test]
    fn sum_checks_are_identity_based() {
        let (sum_a, num_a, _) = expr_sum();
        let (sum_b, num_b, _) = expr_sum();
        let desc_a = TypeDescriptor::Sum(sum_a);
        // Same declaration, different compilation: not interchangeable.
        assert!(structural_check(&num(&num_a, 1), &desc_a));
        assert!(!structural_check(&num(&num_b, 1), &desc_a));
        let _ = sum_b;
    }

    #[test]
    fn simple_sum_singletons_render_with_tag() {
        let sum = SumType::shell("op_id", true);
        sum.freeze(Vec::new());
        let plus = SimpleValue::new(&sum, 1, "Plus");
        let minus = SimpleValue::new(&sum, 2, "Minus");
        assert_eq!(plus.to_string(), "op_id.Plus(1)");
        assert_eq!(minus.to_string(), "op_id.Minus(2)");
        assert!(structural_check(
            &Value::Simple(plus),
            &TypeDescriptor::Sum(sum)
        ));
    }

    #[test]
    fn opaque_checks_payload_type() {
        let host = OpaqueType::of::<std::time::Duration>("duration");
        let desc = TypeDescriptor::Opaque(host.clone());
        let ok = Value::Opaque(OpaqueValue::new(&host, std::time::Duration::from_secs(1)));
        let bad = Value::Opaque(OpaqueValue::new(&host, "not a duration".to_string()));
        assert!(structural_check(&ok, &desc));
        assert!(!structural_check(&bad, &desc));
        match ok {
            Value::Opaque(v) => {
                let d: &std::time::Duration = v.downcast_ref().unwrap();
                assert_eq!(d.as_secs(), 1);
            }
            _ => unreachable!(),
        }
    }
}
