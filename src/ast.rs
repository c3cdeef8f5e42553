use std::sync::Arc;

use crate::value::Value;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// Target of an `Await`: a single named task or a (possibly nested) join.
#[derive(Debug, Clone)]
pub enum AwaitTarget {
    Task(String),
    Join(Vec<AwaitTarget>),
}

/// Callee of a `Call`: a plain name resolved through the routine tables and
/// the environment, or an arbitrary expression evaluating to a callable.
#[derive(Debug, Clone)]
pub enum Callee {
    Name(String),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    // Scalar literals in the surface language; drivers may also embed
    // sequence and mapping values directly.
    Literal(Value),
    Identifier(String),

    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    AsyncLambda {
        params: Vec<Pattern>,
        body: Arc<Vec<Stmt>>,
    },

    Call {
        callee: Callee,
        args: Vec<Expr>,
    },

    Await(AwaitTarget),
}

/// One slot of an object pattern. When `nested` is set the looked-up value is
/// matched against the nested pattern and `name`/`alias` are not bound.
#[derive(Debug, Clone)]
pub struct ObjectSlot {
    pub key: String,
    pub name: String,
    pub alias: Option<String>,
    pub default: Option<Expr>,
    pub nested: Option<Pattern>,
}

/// Structural template usable both as a binding target and as a match
/// discriminator. A `Rest` inside a sequence pattern must be its last entry.
#[derive(Debug, Clone)]
pub enum Pattern {
    Wildcard,
    Name(String),
    Sequence(Vec<Pattern>),
    Object(Vec<ObjectSlot>),
    Slot {
        name: String,
        default: Option<Expr>,
    },
    Alias {
        name: String,
        alias: String,
        default: Option<Expr>,
    },
    Rest(String),
}

#[derive(Debug, Clone)]
pub struct Case {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Intention {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Logic {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    // Program roots.
    Program {
        body: Vec<Stmt>,
    },
    Main {
        body: Vec<Stmt>,
    },
    Prog {
        name: String,
        body: Vec<Stmt>,
    },

    // Declarative block.
    Task {
        intention: Intention,
        tool: Tool,
        logic: Logic,
    },

    Declaration {
        target: Pattern,
        expr: Expr,
    },

    Assignment {
        target: Pattern,
        expr: Expr,
    },

    Print {
        expr: Expr,
    },

    Return {
        expr: Expr,
    },

    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },

    // Half-open integer range; the body sees and may mutate `var`.
    Loop {
        var: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
    },

    TryCatch {
        try_body: Vec<Stmt>,
        catch_body: Vec<Stmt>,
    },

    Async {
        name: Option<String>,
        body: Arc<Vec<Stmt>>,
    },

    Await(AwaitTarget),

    Routine {
        name: String,
        params: Vec<Pattern>,
        body: Arc<Vec<Stmt>>,
    },

    AsyncRoutine {
        name: String,
        params: Vec<Pattern>,
        body: Arc<Vec<Stmt>>,
    },

    Call {
        callee: Callee,
        args: Vec<Expr>,
    },

    Match {
        expr: Expr,
        cases: Vec<Case>,
    },
}

impl Pattern {
    /// All identifier, alias and rest names this pattern can introduce.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pattern::Wildcard => {}
            Pattern::Name(n) | Pattern::Rest(n) => out.push(n),
            Pattern::Slot { name, .. } => out.push(name),
            Pattern::Alias { name, alias, .. } => {
                out.push(name);
                out.push(alias);
            }
            Pattern::Sequence(items) => {
                for p in items {
                    p.collect_names(out);
                }
            }
            Pattern::Object(slots) => {
                for slot in slots {
                    match &slot.nested {
                        Some(nested) => nested.collect_names(out),
                        None => {
                            out.push(&slot.name);
                            if let Some(alias) = &slot.alias {
                                out.push(alias);
                            }
                        }
                    }
                }
            }
        }
    }
}

impl ObjectSlot {
    pub fn new(key: &str, name: &str) -> Self {
        ObjectSlot {
            key: key.to_string(),
            name: name.to_string(),
            alias: None,
            default: None,
            nested: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_nested(mut self, nested: Pattern) -> Self {
        self.nested = Some(nested);
        self
    }
}
