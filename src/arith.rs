//! The arithmetic grammar: schema, null/left handlers, precedence table.
//!
//! Every handler both performs its syntax action and constructs the result
//! node through the validation engine, so a handler bug that would produce a
//! malformed tree fails the parse instead of building the tree.
//!
//! Precedence follows the C operator table, high to low: postfix/call/index
//! (31), prefix (29), `**` (27, right-assoc), `* / %` (25), `+ -` (23),
//! shifts (21), relational (19), equality (17), `&` (15), `^` (13), `|`
//! (11), `&&` (9), `||` (7), ternary (5, right-assoc), assignment (3,
//! right-assoc), comma (1), grouping/atoms (0 / -1).

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::descriptor::ConstructorType;
use crate::error::ParseError;
use crate::lexer;
use crate::schema::{ConstructorDef, FieldDef, Registry, SchemaDef, TypeExpr};
use crate::tdop::{Parser, ParserSpec, Token};
use crate::value::{NodeBuilder, NodeType, Value};

/// Reserved low binding power for argument separation, so a bare `,`
/// operator and call arguments never conflict.
const COMMA_PREC: i32 = 1;

// ------------------------------- Schema ----------------------------------- //

fn schema_defs() -> Vec<SchemaDef> {
    let expr = TypeExpr::named("arith_expr");
    vec![
        SchemaDef::sum(
            "op_id",
            vec![
                ConstructorDef::new("Plus", Vec::new()),
                ConstructorDef::new("Minus", Vec::new()),
            ],
        ),
        SchemaDef::sum(
            "arith_expr",
            vec![
                ConstructorDef::new("Const", vec![FieldDef::new("i", TypeExpr::Int)]),
                ConstructorDef::new("ArithVar", vec![FieldDef::new("name", TypeExpr::Str)]),
                ConstructorDef::new(
                    "ArithUnary",
                    vec![
                        FieldDef::new("op", TypeExpr::Str),
                        FieldDef::new("a", expr.clone()),
                    ],
                ),
                ConstructorDef::new(
                    "ArithBinary",
                    vec![
                        FieldDef::new("op", TypeExpr::Str),
                        FieldDef::new("left", expr.clone()),
                        FieldDef::new("right", expr.clone()),
                    ],
                ),
                ConstructorDef::new(
                    "Ternary",
                    vec![
                        FieldDef::new("cond", expr.clone()),
                        FieldDef::new("true_expr", expr.clone()),
                        FieldDef::new("false_expr", expr.clone()),
                    ],
                ),
                ConstructorDef::new(
                    "FuncCall",
                    vec![
                        FieldDef::new("name", TypeExpr::Str),
                        FieldDef::new("args", TypeExpr::array(expr.clone())),
                    ],
                ),
                ConstructorDef::new(
                    "Index",
                    vec![
                        FieldDef::new("a", expr.clone()),
                        FieldDef::new("index", expr.clone()),
                    ],
                ),
                ConstructorDef::new(
                    "Slice",
                    vec![
                        FieldDef::new("a", expr.clone()),
                        FieldDef::new("begin", TypeExpr::maybe(expr.clone())),
                        FieldDef::new("end", TypeExpr::maybe(expr.clone())),
                        FieldDef::new("stride", TypeExpr::maybe(expr)),
                    ],
                ),
            ],
        ),
    ]
}

/// The compiled arithmetic registry plus the constructor handles the
/// handlers build nodes with. Built exactly once; a schema defect here is a
/// programmer error and aborts at first use.
pub struct ArithTypes {
    pub registry: Registry,
    pub const_: Arc<ConstructorType>,
    pub var: Arc<ConstructorType>,
    pub unary: Arc<ConstructorType>,
    pub binary: Arc<ConstructorType>,
    pub ternary: Arc<ConstructorType>,
    pub func_call: Arc<ConstructorType>,
    pub index: Arc<ConstructorType>,
    pub slice: Arc<ConstructorType>,
}

impl ArithTypes {
    fn build() -> Self {
        let registry =
            Registry::compile(&schema_defs()).expect("arithmetic schema must compile");
        let cons = |name: &str| {
            registry
                .constructor("arith_expr", name)
                .expect("constructor declared in schema")
                .clone()
        };
        ArithTypes {
            const_: cons("Const"),
            var: cons("ArithVar"),
            unary: cons("ArithUnary"),
            binary: cons("ArithBinary"),
            ternary: cons("Ternary"),
            func_call: cons("FuncCall"),
            index: cons("Index"),
            slice: cons("Slice"),
            registry,
        }
    }
}

static TYPES: Lazy<ArithTypes> = Lazy::new(ArithTypes::build);

pub fn types() -> &'static ArithTypes {
    &TYPES
}

fn node(cons: &Arc<ConstructorType>, values: Vec<Value>) -> Result<Value, ParseError> {
    let inst = NodeBuilder::new(NodeType::Constructor(cons.clone()))
        .positional(values)?
        .finish()?;
    Ok(Value::Node(Box::new(inst)))
}

/// The name of a plain variable reference, or None for anything else.
fn var_name(v: &Value) -> Option<String> {
    let inst = v.as_node()?;
    if !inst.is_type(&types().var) {
        return None;
    }
    match inst.field("name") {
        Some(Value::Str(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Assignable target: a variable reference or an index expression. The only
/// operand forms valid on the left of assignment or increment/decrement.
fn is_assignable(v: &Value) -> bool {
    match v.as_node() {
        Some(inst) => inst.is_type(&types().var) || inst.is_type(&types().index),
        None => false,
    }
}

// --------------------------- Null denotation ------------------------------ //
// Handlers for tokens that start an expression.

fn null_constant(
    _p: &mut Parser<'_, Value>,
    tok: &Token,
    _bp: i32,
) -> Result<Value, ParseError> {
    match tok.kind {
        "number" => {
            let i: i64 = tok.text.parse().map_err(|_| ParseError::BadToken {
                text: tok.text.clone(),
                pos: tok.pos,
            })?;
            node(&types().const_, vec![Value::Int(i)])
        }
        "name" => node(&types().var, vec![Value::Str(tok.text.clone())]),
        _ => Err(ParseError::Unexpected {
            kind: tok.kind.to_string(),
            pos: tok.pos,
        }),
    }
}

/// Arithmetic grouping; binds nothing until the closing paren.
fn null_paren(p: &mut Parser<'_, Value>, _tok: &Token, bp: i32) -> Result<Value, ParseError> {
    let r = p.parse_until(bp)?;
    p.eat(")")?;
    Ok(r)
}

fn null_prefix_op(p: &mut Parser<'_, Value>, tok: &Token, bp: i32) -> Result<Value, ParseError> {
    let r = p.parse_until(bp)?;
    node(&types().unary, vec![Value::Str(tok.text.clone()), r])
}

/// `++x` or `++x[1]`: the operand must be an assignable target.
fn null_inc_dec(p: &mut Parser<'_, Value>, tok: &Token, bp: i32) -> Result<Value, ParseError> {
    let right = p.parse_until(bp)?;
    if !is_assignable(&right) {
        return Err(ParseError::InvalidTarget {
            target: right.to_string(),
        });
    }
    node(&types().unary, vec![Value::Str(tok.text.clone()), right])
}

// --------------------------- Left denotation ------------------------------ //
// Handlers for tokens that continue an expression already parsed.

/// `i++` and `i--`: re-tag the operator as its postfix form.
fn left_inc_dec(
    _p: &mut Parser<'_, Value>,
    tok: &Token,
    left: Value,
    _rbp: i32,
) -> Result<Value, ParseError> {
    if !is_assignable(&left) {
        return Err(ParseError::InvalidTarget {
            target: left.to_string(),
        });
    }
    let op = format!("post{}", tok.kind);
    node(&types().unary, vec![Value::Str(op), left])
}

/// `x[i]` or `x[a:b]`; only a plain variable can be indexed.
fn left_index(
    p: &mut Parser<'_, Value>,
    _tok: &Token,
    left: Value,
    _rbp: i32,
) -> Result<Value, ParseError> {
    if var_name(&left).is_none() {
        return Err(ParseError::NotIndexable {
            target: left.to_string(),
        });
    }
    let index = p.parse_until(0)?;
    let end = if p.at(":") {
        p.next();
        Some(p.parse_until(0)?)
    } else {
        None
    };
    p.eat("]")?;
    match end {
        // Two-part slices only; the stride field stays unset.
        Some(end) => node(&types().slice, vec![left, index, end]),
        None => node(&types().index, vec![left, index]),
    }
}

/// `cond ? a : b`; both branches parse at the ternary's own bound.
fn left_ternary(
    p: &mut Parser<'_, Value>,
    _tok: &Token,
    left: Value,
    rbp: i32,
) -> Result<Value, ParseError> {
    let true_expr = p.parse_until(rbp)?;
    p.eat(":")?;
    let false_expr = p.parse_until(rbp)?;
    node(&types().ternary, vec![left, true_expr, false_expr])
}

fn left_binary_op(
    p: &mut Parser<'_, Value>,
    tok: &Token,
    left: Value,
    rbp: i32,
) -> Result<Value, ParseError> {
    let right = p.parse_until(rbp)?;
    node(
        &types().binary,
        vec![Value::Str(tok.text.clone()), left, right],
    )
}

/// `x = 1`, `a[i] += 1`: binary shape, but the left side must be assignable.
fn left_assign(
    p: &mut Parser<'_, Value>,
    tok: &Token,
    left: Value,
    rbp: i32,
) -> Result<Value, ParseError> {
    if !is_assignable(&left) {
        return Err(ParseError::InvalidTarget {
            target: left.to_string(),
        });
    }
    left_binary_op(p, tok, left, rbp)
}

/// `f(a, b)`: only a plain variable names a callee; arguments parse at the
/// reserved comma precedence so `,` separates instead of sequencing.
fn left_func_call(
    p: &mut Parser<'_, Value>,
    _tok: &Token,
    left: Value,
    _rbp: i32,
) -> Result<Value, ParseError> {
    let Some(func_name) = var_name(&left) else {
        return Err(ParseError::NotCallable {
            target: left.to_string(),
        });
    };
    let mut args = Vec::new();
    while !p.at(")") {
        args.push(p.parse_until(COMMA_PREC)?);
        if p.at(",") {
            p.next();
        }
    }
    p.eat(")")?;
    node(
        &types().func_call,
        vec![Value::Str(func_name), Value::Array(args)],
    )
}

// ---------------------------- Precedence table ---------------------------- //

fn build_spec() -> ParserSpec<Value> {
    let mut spec = ParserSpec::new();

    spec.left(31, &["++", "--"], left_inc_dec);
    spec.left(31, &["("], left_func_call);
    spec.left(31, &["["], left_index);

    // 29 binds to everything except call, indexing, and postfix ops.
    spec.null(29, &["++", "--"], null_inc_dec);
    spec.null(29, &["+", "!", "~", "-"], null_prefix_op);

    // Right associative: 2 ** 3 ** 2 == 2 ** (3 ** 2).
    spec.left_right_assoc(27, &["**"], left_binary_op);
    spec.left(25, &["*", "/", "%"], left_binary_op);

    spec.left(23, &["+", "-"], left_binary_op);
    spec.left(21, &["<<", ">>"], left_binary_op);
    spec.left(19, &["<", ">", "<=", ">="], left_binary_op);
    spec.left(17, &["!=", "=="], left_binary_op);

    spec.left(15, &["&"], left_binary_op);
    spec.left(13, &["^"], left_binary_op);
    spec.left(11, &["|"], left_binary_op);
    spec.left(9, &["&&"], left_binary_op);
    spec.left(7, &["||"], left_binary_op);

    spec.left_right_assoc(5, &["?"], left_ternary);

    // Right associative: a = b = 2 is a = (b = 2).
    spec.left_right_assoc(
        3,
        &[
            "=", "+=", "-=", "*=", "/=", "%=", "<<=", ">>=", "&=", "^=", "|=",
        ],
        left_assign,
    );

    spec.left(COMMA_PREC, &[","], left_binary_op);

    // 0 precedence: doesn't bind until `)`.
    spec.null(0, &["("], null_paren);

    // -1 precedence: atoms, never consulted as a bound.
    spec.null(-1, &["name", "number"], null_constant);

    spec
}

static SPEC: Lazy<ParserSpec<Value>> = Lazy::new(build_spec);

pub fn spec() -> &'static ParserSpec<Value> {
    &SPEC
}

/// Parse one arithmetic expression into a schema-validated tree.
pub fn parse(input: &str) -> Result<Value, ParseError> {
    let tokens = lexer::tokenize(input)?;
    let mut p = Parser::new(spec(), tokens);
    p.parse()
}

// ------------------------------- Tests ------------------------------------ //
