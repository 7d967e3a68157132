//! AST types for the flint language

/// Source span (byte offsets into the source text)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// An identifier with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// Declarable type keywords. `instance` covers any class instance; `void` is
/// only meaningful as a return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    Int,
    Float,
    Double,
    Bool,
    Str,
    Anon,
    Func,
    Array,
    Instance,
    Reflection,
    Void,
}

impl TypeName {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeName::Int => "int",
            TypeName::Float => "float",
            TypeName::Double => "double",
            TypeName::Bool => "bool",
            TypeName::Str => "string",
            TypeName::Anon => "anon",
            TypeName::Func => "func",
            TypeName::Array => "array",
            TypeName::Instance => "instance",
            TypeName::Reflection => "reflection",
            TypeName::Void => "void",
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field/variable modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    None,
    Readonly,
    Const,
}

/// A parsed program: the root of the tree handed to the evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    VarDecl {
        modifier: Modifier,
        ty: TypeName,
        name: Identifier,
        init: Option<Expr>,
    },
    Assign {
        target: LValue,
        value: Expr,
    },
    FnDef(FnDef),
    ClassDef(ClassDef),
    InterfaceDef(InterfaceDef),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    For {
        init: Box<Stmt>,
        condition: Expr,
        update: Box<Stmt>,
        body: Box<Stmt>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Print(Expr),
    Quit,
    Expr(Expr),
}

/// A function definition (named) or lambda body (name absent)
#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub return_type: TypeName,
    pub name: Option<Identifier>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub return_expr: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeName,
    pub name: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: Identifier,
    pub implements: Vec<Identifier>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Field {
        modifier: Modifier,
        ty: TypeName,
        name: Identifier,
        init: Option<Expr>,
    },
    Method(FnDef),
    Constructor {
        name: Identifier,
        params: Vec<Param>,
        body: Vec<Stmt>,
        span: Span,
    },
    NestedClass(ClassDef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDef {
    pub name: Identifier,
    pub methods: Vec<InterfaceMethod>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMethod {
    pub return_type: TypeName,
    pub name: Identifier,
    pub param_types: Vec<TypeName>,
}

/// Assignment target: a root name plus a member/index accessor chain
#[derive(Debug, Clone, PartialEq)]
pub struct LValue {
    pub root: Identifier,
    pub accessors: Vec<Accessor>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Member(Identifier),
    Index(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(Identifier),
    MemberAccess {
        base: Box<Expr>,
        member: Identifier,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Prefix or postfix `++`/`--` on an lvalue
    IncDec {
        target: LValue,
        op: IncDecOp,
        prefix: bool,
    },
    Cast {
        target: CastTarget,
        operand: Box<Expr>,
    },
    NewInstance {
        class_path: Vec<Identifier>,
        args: Vec<Expr>,
    },
    NewArray {
        elem_type: TypeName,
        length: Box<Expr>,
    },
    NewReflection {
        class: String,
        args: Vec<Expr>,
    },
    /// `reflection("pkg.Class")`, a host class handle for static access
    ReflectionHandle {
        class: String,
    },
    Lambda(Box<FnDef>),
    AnonRecord {
        fields: Vec<(Identifier, Expr)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CastTarget {
    Type(TypeName),
    HostClass(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Binding strength, loosest first; used by the expression builder.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 0,
            BinaryOp::And => 1,
            BinaryOp::Eq | BinaryOp::Ne => 2,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}
