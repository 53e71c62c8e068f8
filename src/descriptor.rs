// Shape descriptors for schema-validated tree nodes. Immutable once built.

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

/// Declared shape of a field or value. Built by the schema compiler, shared
/// via `Arc`, never mutated afterwards.
///
/// A constructor is deliberately *not* a variant here: a field may be
/// declared as a sum (`arith_expr`) but never as one of its alternatives
/// (`ArithBinary`). The enum makes that state unrepresentable.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Str,
    Int,
    Bool,
    /// Externally supplied host type, matched by `TypeId`.
    Opaque(Arc<OpaqueType>),
    Maybe(Box<TypeDescriptor>),
    Array(Box<TypeDescriptor>),
    Product(Arc<ProductType>),
    Sum(Arc<SumType>),
}

impl fmt::Display for TypeDescriptor {
    /// ASDL-flavored notation: `T?` for Maybe, `T*` for Array.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Str => write!(f, "string"),
            TypeDescriptor::Int => write!(f, "int"),
            TypeDescriptor::Bool => write!(f, "bool"),
            TypeDescriptor::Opaque(host) => write!(f, "{}", host.name),
            TypeDescriptor::Maybe(inner) => write!(f, "{inner}?"),
            TypeDescriptor::Array(item) => write!(f, "{item}*"),
            TypeDescriptor::Product(p) => write!(f, "{}", p.name),
            TypeDescriptor::Sum(s) => write!(f, "{}", s.name),
        }
    }
}

/// One named, typed field slot. Order within the owning type is semantic.
#[derive(Debug)]
pub struct FieldSpec {
    pub name: String,
    pub desc: TypeDescriptor,
}

/// A record type: ordered fields, no tag.
#[derive(Debug)]
pub struct ProductType {
    pub name: String,
    fields: OnceCell<Vec<FieldSpec>>,
}

impl ProductType {
    /// Shell with unresolved fields; the compiler freezes it exactly once.
    pub(crate) fn shell(name: &str) -> Arc<Self> {
        Arc::new(ProductType {
            name: name.to_string(),
            fields: OnceCell::new(),
        })
    }

    pub(crate) fn freeze(&self, fields: Vec<FieldSpec>) {
        self.fields
            .set(fields)
            .expect("product fields frozen twice");
    }

    pub fn fields(&self) -> &[FieldSpec] {
        self.fields.get().expect("schema not finalized")
    }
}

/// A sum type. Simple sums (no constructor carries fields) compile to
/// per-variant singletons; compound sums compile to one constructor type per
/// alternative.
#[derive(Debug)]
pub struct SumType {
    pub name: String,
    pub simple: bool,
    constructors: OnceCell<Vec<Arc<ConstructorType>>>,
}

impl SumType {
    pub(crate) fn shell(name: &str, simple: bool) -> Arc<Self> {
        Arc::new(SumType {
            name: name.to_string(),
            simple,
            constructors: OnceCell::new(),
        })
    }

    pub(crate) fn freeze(&self, constructors: Vec<Arc<ConstructorType>>) {
        self.constructors
            .set(constructors)
            .expect("sum constructors frozen twice");
    }

    pub fn constructors(&self) -> &[Arc<ConstructorType>] {
        self.constructors.get().expect("schema not finalized")
    }

    pub fn constructor(&self, name: &str) -> Option<&Arc<ConstructorType>> {
        self.constructors().iter().find(|c| c.name == name)
    }
}

/// One alternative of a compound sum. The tag is the 1-based declaration
/// position within the parent sum, stable for the lifetime of the registry;
/// downstream encoders depend on it and it is never recomputed.
#[derive(Debug)]
pub struct ConstructorType {
    pub name: String,
    pub tag: u32,
    pub fields: Vec<FieldSpec>,
    parent: Weak<SumType>,
}

impl ConstructorType {
    pub(crate) fn new(
        name: &str,
        tag: u32,
        parent: &Arc<SumType>,
        fields: Vec<FieldSpec>,
    ) -> Arc<Self> {
        Arc::new(ConstructorType {
            name: name.to_string(),
            tag,
            fields,
            parent: Arc::downgrade(parent),
        })
    }

    /// Identity check against a sum descriptor. Pointer equality on the
    /// shared descriptor, not name comparison.
    pub fn belongs_to(&self, sum: &Arc<SumType>) -> bool {
        self.parent
            .upgrade()
            .is_some_and(|p| Arc::ptr_eq(&p, sum))
    }
}

/// An opaque host type: values conform iff their payload's `TypeId` matches.
#[derive(Debug)]
pub struct OpaqueType {
    pub name: String,
    id: TypeId,
}

impl OpaqueType {
    pub fn of<T: 'static>(name: &str) -> Arc<Self> {
        Arc::new(OpaqueType {
            name: name.to_string(),
            id: TypeId::of::<T>(),
        })
    }

    pub fn matches(&self, id: TypeId) -> bool {
        self.id == id
    }
}

// ------------------------------- Tests ------------------------------------ //
