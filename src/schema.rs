//! Schema compiler: named definitions in, immutable type registry out.
//!
//! The input is a value-level schema module (the textual schema grammar and
//! its parser live outside this crate). Field types are syntactic
//! `TypeExpr`s so definitions can reference each other, including self- and
//! forward-references; resolution happens here in a second pass.
//!
//! Compilation is all-or-nothing: on any error the partially built registry
//! is dropped, never returned. The returned `Registry` is immutable and safe
//! for unsynchronized concurrent reads.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::descriptor::{
    ConstructorType, FieldSpec, OpaqueType, ProductType, SumType, TypeDescriptor,
};
use crate::error::SchemaError;
use crate::value::SimpleValue;

// ----------------------------- Definitions -------------------------------- //

/// Syntactic field type, resolved against the definition sequence.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Str,
    Int,
    Bool,
    Named(String),
    Opaque(Arc<OpaqueType>),
    Maybe(Box<TypeExpr>),
    Array(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: &str) -> Self {
        TypeExpr::Named(name.to_string())
    }

    pub fn maybe(inner: TypeExpr) -> Self {
        TypeExpr::Maybe(Box::new(inner))
    }

    pub fn array(item: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(item))
    }
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeExpr,
}

impl FieldDef {
    pub fn new(name: &str, ty: TypeExpr) -> Self {
        FieldDef {
            name: name.to_string(),
            ty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl ConstructorDef {
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Self {
        ConstructorDef {
            name: name.to_string(),
            fields,
        }
    }
}

/// One named definition: a sum of constructors or a product record.
#[derive(Debug, Clone)]
pub enum SchemaDef {
    Sum {
        name: String,
        constructors: Vec<ConstructorDef>,
    },
    Product {
        name: String,
        fields: Vec<FieldDef>,
    },
}

impl SchemaDef {
    pub fn sum(name: &str, constructors: Vec<ConstructorDef>) -> Self {
        SchemaDef::Sum {
            name: name.to_string(),
            constructors,
        }
    }

    pub fn product(name: &str, fields: Vec<FieldDef>) -> Self {
        SchemaDef::Product {
            name: name.to_string(),
            fields,
        }
    }

    fn name(&self) -> &str {
        match self {
            SchemaDef::Sum { name, .. } | SchemaDef::Product { name, .. } => name,
        }
    }
}

// ------------------------------ Registry ---------------------------------- //

/// Compiled form of one definition.
#[derive(Debug, Clone)]
pub enum CompiledType {
    /// Enum-like: one immutable singleton per variant, tags 1..N.
    SimpleSum {
        sum: Arc<SumType>,
        variants: Vec<Arc<SimpleValue>>,
    },
    /// Abstract base plus one concrete constructor type per alternative.
    CompoundSum { sum: Arc<SumType> },
    /// Single concrete record type. No tag.
    Product { product: Arc<ProductType> },
}

/// Name-to-type mapping in declaration order. Built exactly once by
/// `compile`, then immutable; consumers receive it explicitly.
#[derive(Debug)]
pub struct Registry {
    types: IndexMap<String, CompiledType>,
}

impl Registry {
    pub fn compile(defs: &[SchemaDef]) -> Result<Registry, SchemaError> {
        // Shell pass: allocate one shared descriptor per definition so field
        // resolution can point at it before its own fields exist.
        let mut shells: IndexMap<String, Shell> = IndexMap::new();
        for def in defs {
            let shell = match def {
                SchemaDef::Sum { name, constructors } => {
                    let simple = constructors.iter().all(|c| c.fields.is_empty());
                    Shell::Sum(SumType::shell(name, simple))
                }
                SchemaDef::Product { name, .. } => Shell::Product(ProductType::shell(name)),
            };
            if shells.insert(def.name().to_string(), shell).is_some() {
                return Err(SchemaError::DuplicateDefinition(def.name().to_string()));
            }
        }

        // Resolve pass: build constructors and freeze every shell.
        let mut types = IndexMap::new();
        for def in defs {
            let compiled = match def {
                SchemaDef::Sum { name, constructors } => {
                    let Shell::Sum(sum) = &shells[name.as_str()] else {
                        unreachable!("shell kind matches definition kind");
                    };
                    let mut built = Vec::with_capacity(constructors.len());
                    for (i, cons) in constructors.iter().enumerate() {
                        if constructors[..i].iter().any(|c| c.name == cons.name) {
                            return Err(SchemaError::DuplicateConstructor {
                                sum: name.clone(),
                                cons: cons.name.clone(),
                            });
                        }
                        let fields = resolve_fields(&cons.fields, &shells, &cons.name)?;
                        // Tags are 1-based declaration order, stable for the
                        // lifetime of the registry.
                        built.push(ConstructorType::new(&cons.name, i as u32 + 1, sum, fields));
                    }
                    sum.freeze(built);
                    if sum.simple {
                        let variants = sum
                            .constructors()
                            .iter()
                            .map(|c| SimpleValue::new(sum, c.tag, &c.name))
                            .collect();
                        CompiledType::SimpleSum {
                            sum: sum.clone(),
                            variants,
                        }
                    } else {
                        CompiledType::CompoundSum { sum: sum.clone() }
                    }
                }
                SchemaDef::Product { name, fields } => {
                    let Shell::Product(product) = &shells[name.as_str()] else {
                        unreachable!("shell kind matches definition kind");
                    };
                    product.freeze(resolve_fields(fields, &shells, name)?);
                    CompiledType::Product {
                        product: product.clone(),
                    }
                }
            };
            types.insert(def.name().to_string(), compiled);
        }

        Ok(Registry { types })
    }

    pub fn get(&self, name: &str) -> Option<&CompiledType> {
        self.types.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CompiledType)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn sum(&self, name: &str) -> Option<&Arc<SumType>> {
        match self.types.get(name)? {
            CompiledType::SimpleSum { sum, .. } | CompiledType::CompoundSum { sum } => Some(sum),
            CompiledType::Product { .. } => None,
        }
    }

    pub fn product(&self, name: &str) -> Option<&Arc<ProductType>> {
        match self.types.get(name)? {
            CompiledType::Product { product } => Some(product),
            _ => None,
        }
    }

    /// Constructor handle within a compound sum, for node producers.
    pub fn constructor(&self, sum: &str, cons: &str) -> Option<&Arc<ConstructorType>> {
        self.sum(sum)?.constructor(cons)
    }

    /// Singleton of a simple-sum variant. Callers clone the handle; they
    /// never construct singletons themselves.
    pub fn singleton(&self, sum: &str, variant: &str) -> Option<&Arc<SimpleValue>> {
        match self.types.get(sum)? {
            CompiledType::SimpleSum { variants, .. } => {
                variants.iter().find(|v| v.name == variant)
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Shell {
    Sum(Arc<SumType>),
    Product(Arc<ProductType>),
}

fn resolve_fields(
    fields: &[FieldDef],
    shells: &IndexMap<String, Shell>,
    referrer: &str,
) -> Result<Vec<FieldSpec>, SchemaError> {
    fields
        .iter()
        .map(|f| {
            Ok(FieldSpec {
                name: f.name.clone(),
                desc: resolve(&f.ty, shells, referrer)?,
            })
        })
        .collect()
}

fn resolve(
    expr: &TypeExpr,
    shells: &IndexMap<String, Shell>,
    referrer: &str,
) -> Result<TypeDescriptor, SchemaError> {
    Ok(match expr {
        TypeExpr::Str => TypeDescriptor::Str,
        TypeExpr::Int => TypeDescriptor::Int,
        TypeExpr::Bool => TypeDescriptor::Bool,
        TypeExpr::Opaque(host) => TypeDescriptor::Opaque(host.clone()),
        TypeExpr::Maybe(inner) => {
            TypeDescriptor::Maybe(Box::new(resolve(inner, shells, referrer)?))
        }
        TypeExpr::Array(item) => {
            TypeDescriptor::Array(Box::new(resolve(item, shells, referrer)?))
        }
        TypeExpr::Named(name) => match shells.get(name.as_str()) {
            Some(Shell::Sum(sum)) => TypeDescriptor::Sum(sum.clone()),
            Some(Shell::Product(product)) => TypeDescriptor::Product(product.clone()),
            None => {
                return Err(SchemaError::UnknownType {
                    name: name.clone(),
                    referrer: referrer.to_string(),
                });
            }
        },
    })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{NodeBuilder, NodeType, Value, structural_check};

    fn demo_defs() -> Vec<SchemaDef> {
        vec![
            SchemaDef::sum(
                "op_id",
                vec![
                    ConstructorDef::new("Plus", Vec::new()),
                    ConstructorDef::new("Minus", Vec::new()),
                ],
            ),
            // References "expr" before it is defined.
            SchemaDef::product(
                "span",
                vec![
                    FieldDef::new("start", TypeExpr::Int),
                    FieldDef::new("node", TypeExpr::maybe(TypeExpr::named("expr"))),
                ],
            ),
            SchemaDef::sum(
                "expr",
                vec![
                    ConstructorDef::new("Num", vec![FieldDef::new("i", TypeExpr::Int)]),
                    ConstructorDef::new(
                        "Add",
                        vec![
                            FieldDef::new("left", TypeExpr::named("expr")),
                            FieldDef::new("right", TypeExpr::named("expr")),
                        ],
                    ),
                ],
            ),
        ]
    }

    #[test]
    fn tags_are_one_based_declaration_order() {
        let reg = Registry::compile(&demo_defs()).unwrap();
        let sum = reg.sum("expr").unwrap();
        let tags: Vec<(String, u32)> = sum
            .constructors()
            .iter()
            .map(|c| (c.name.clone(), c.tag))
            .collect();
        assert_eq!(tags, vec![("Num".to_string(), 1), ("Add".to_string(), 2)]);
    }

    #[test]
    fn simple_sum_gets_singletons() {
        let reg = Registry::compile(&demo_defs()).unwrap();
        let plus = reg.singleton("op_id", "Plus").unwrap();
        assert_eq!(plus.to_string(), "op_id.Plus(1)");
        let minus = reg.singleton("op_id", "Minus").unwrap();
        assert_eq!(minus.tag, 2);
        // Constructors of a simple sum are not constructible node types.
        assert!(reg.constructor("op_id", "Plus").is_some());
        assert!(reg.sum("op_id").unwrap().simple);
    }

    #[test]
    fn self_reference_resolves_to_the_same_descriptor() {
        let reg = Registry::compile(&demo_defs()).unwrap();
        let sum = reg.sum("expr").unwrap();
        let add = reg.constructor("expr", "Add").unwrap();
        match &add.fields[0].desc {
            TypeDescriptor::Sum(s) => assert!(Arc::ptr_eq(s, sum)),
            other => panic!("expected sum descriptor, got {other}"),
        }
    }

    #[test]
    fn forward_reference_from_product_resolves() {
        let reg = Registry::compile(&demo_defs()).unwrap();
        let span = reg.product("span").unwrap();
        assert_eq!(span.fields()[1].desc.to_string(), "expr?");
    }

    #[test]
    fn compiled_types_are_usable_for_construction() {
        let reg = Registry::compile(&demo_defs()).unwrap();
        let num = reg.constructor("expr", "Num").unwrap().clone();
        let value = Value::Node(Box::new(
            NodeBuilder::new(NodeType::Constructor(num))
                .positional([Value::Int(7)])
                .unwrap()
                .finish()
                .unwrap(),
        ));
        let desc = TypeDescriptor::Sum(reg.sum("expr").unwrap().clone());
        assert!(structural_check(&value, &desc));
        assert_eq!(value.to_string(), "(Num 7)");
    }

    #[test]
    fn duplicate_definition_is_fatal() {
        let defs = vec![
            SchemaDef::product("p", Vec::new()),
            SchemaDef::product("p", Vec::new()),
        ];
        assert!(matches!(
            Registry::compile(&defs),
            Err(SchemaError::DuplicateDefinition(name)) if name == "p"
        ));
    }

    #[test]
    fn duplicate_constructor_is_fatal() {
        let defs = vec![SchemaDef::sum(
            "s",
            vec![
                ConstructorDef::new("A", Vec::new()),
                ConstructorDef::new("A", Vec::new()),
            ],
        )];
        assert!(matches!(
            Registry::compile(&defs),
            Err(SchemaError::DuplicateConstructor { .. })
        ));
    }

    #[test]
    fn unknown_type_reference_is_fatal() {
        let defs = vec![SchemaDef::product(
            "p",
            vec![FieldDef::new("x", TypeExpr::named("nonesuch"))],
        )];
        match Registry::compile(&defs) {
            Err(SchemaError::UnknownType { name, referrer }) => {
                assert_eq!(name, "nonesuch");
                assert_eq!(referrer, "p");
            }
            other => panic!("expected unknown type error, got {other:?}"),
        }
    }

    #[test]
    fn registry_preserves_declaration_order() {
        let reg = Registry::compile(&demo_defs()).unwrap();
        let names: Vec<&str> = reg.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["op_id", "span", "expr"]);
        assert!(matches!(reg.get("op_id"), Some(CompiledType::SimpleSum { .. })));
        assert!(reg.get("nonesuch").is_none());
    }

    #[test]
    fn primitive_and_opaque_field_types_resolve() {
        let host = crate::descriptor::OpaqueType::of::<std::time::Duration>("duration");
        let defs = vec![SchemaDef::product(
            "timing",
            vec![
                FieldDef::new("enabled", TypeExpr::Bool),
                FieldDef::new("label", TypeExpr::Str),
                FieldDef::new("elapsed", TypeExpr::Opaque(host)),
            ],
        )];
        let reg = Registry::compile(&defs).unwrap();
        let timing = reg.product("timing").unwrap();
        assert_eq!(timing.fields()[0].desc.to_string(), "bool");
        assert_eq!(timing.fields()[1].desc.to_string(), "string");
        assert_eq!(timing.fields()[2].desc.to_string(), "duration");
    }
}
