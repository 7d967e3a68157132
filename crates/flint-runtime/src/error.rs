//! Evaluation errors.
//!
//! Every variant carries the full diagnostic text in its `Display` impl, so
//! the CLI can print `Error: {message}` without further formatting. The
//! wording of these messages is part of the language surface and is asserted
//! verbatim by the integration tests.

use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    // ====== Name lookup ====== //
    #[error("Variable or parameter {0} is undefined.")]
    UndefinedVariable(String),

    #[error("Function {0} is undefined.")]
    UndefinedFunction(String),

    #[error("Class {0} could not be found.")]
    ClassNotFound(String),

    #[error("Interface {0} does not exist.")]
    InterfaceNotFound(String),

    #[error("Member variable does not exist.")]
    UndefinedMember,

    #[error("Variable {0} does not exist yet. Are you missing a declaration?")]
    AssignTargetMissing(String),

    #[error("Variable {0} does not exist in the current context.")]
    AssignRootMissing(String),

    // ====== Redefinition ====== //
    #[error("Variable {0} already exists.")]
    VariableExists(String),

    #[error("Variable '{0}' has already been defined in this scope.")]
    VariableRedefined(String),

    #[error("Function {0} already exists.")]
    FunctionExists(String),

    #[error("Class: {0} already exists.")]
    ClassExists(String),

    #[error("Variable {name} already exists in class {class}")]
    FieldExists { name: String, class: String },

    #[error("Parameter {name} already exists in function {function}")]
    ParameterExists { name: String, function: String },

    // ====== Type mismatches ====== //
    #[error("Cannot assign value of type: {got} to variable of type: {want}. Are you missing a cast?")]
    AssignTypeMismatch { got: &'static str, want: &'static str },

    #[error("Cannot assign value of type: {got} to parameter of type: {want}. Are you missing a cast?")]
    ParameterTypeMismatch { got: &'static str, want: &'static str },

    #[error("Cannot apply operator '{op}' to values of type {left} and {right}. Are you missing a cast?")]
    OperatorTypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("Cannot apply operator '{op}' to a value of type {operand}.")]
    UnaryTypeMismatch { op: &'static str, operand: &'static str },

    #[error("Cannot assign value of {got} to array of type {want}")]
    ArrayElementMismatch { got: &'static str, want: &'static str },

    // ====== Function returns ====== //
    #[error("Cannot return value of type {got} from a function with a return type of {want}")]
    ReturnTypeMismatch { got: &'static str, want: &'static str },

    #[error("Cannot return a value from a void method.")]
    ReturnFromVoid,

    #[error("Cannot set return type for function without return expression.")]
    ReturnTypeWithoutReturn,

    #[error("Function {0} is being invoked in an expression but does not have a return value.")]
    NoReturnValue(String),

    #[error("Cannot invoke a value of type: {0} like a function.")]
    NotInvocable(&'static str),

    #[error("Function {signature} expected {expected} arguments but got {got}.")]
    WrongArgCount {
        signature: String,
        expected: usize,
        got: usize,
    },

    // ====== Mutability ====== //
    #[error("Cannot re-assign to constant value.")]
    ConstReassignment,

    #[error("Cannot set the value of a constant variable")]
    ConstFieldWrite,

    #[error("Cannot modify readonly variable value outside of constructor.")]
    ReadonlyFieldWrite,

    #[error("Cannot edit members of an anonymous type; members are immutable")]
    RecordMemberWrite,

    // ====== Arrays and containers ====== //
    #[error("Index '{index}' is out of bounds of the array. Array length is: {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("Array index must be an int.")]
    BadIndexType,

    #[error("Array length must be a non-negative int.")]
    BadArrayLength,

    #[error("Cannot create an array of type {0}.")]
    BadArrayElementType(&'static str),

    #[error("Cannot index a value of type {0}.")]
    NotIndexable(&'static str),

    #[error("Cannot access member {member} on a value of type {ty}.")]
    NotAContainer { member: String, ty: &'static str },

    // ====== Control flow ====== //
    #[error("The test expression of an if statement must be boolean.")]
    IfConditionNotBoolean,

    #[error("The test expression of a for loop must be boolean.")]
    ForConditionNotBoolean,

    #[error("The test expression of a while loop must be boolean.")]
    WhileConditionNotBoolean,

    #[error("Cannot apply const/readonly to variable used for loop initialisation.")]
    LoopInitModifier,

    // ====== Declarations ====== //
    #[error("Cannot declare a const variable without a definition.")]
    ConstWithoutInit,

    #[error("Cannot declare a constant variable without a definition.")]
    ConstFieldWithoutInit,

    #[error("Cannot declare a readonly variable outside of a class.")]
    ReadonlyOutsideClass,

    #[error("Cannot use void as a variable type.")]
    VoidVariable,

    #[error("Cannot declare a {0} variable without a definition.")]
    MissingInitialiser(&'static str),

    // ====== Classes and interfaces ====== //
    #[error("Constructor for: {name} is not valid in class: {class}. Are you missing a return type?")]
    InvalidConstructorName { name: String, class: String },

    #[error("Class {0} already has a constructor.")]
    DuplicateConstructor(String),

    #[error("Could not find compatible constructor for class: {0}.")]
    NoMatchingConstructor(String),

    #[error("Class {class} does not implement interface {interface}'s {function} function.")]
    InterfaceNotSatisfied {
        class: String,
        interface: String,
        function: String,
    },

    // ====== Arithmetic ====== //
    #[error("Division by zero.")]
    DivisionByZero,

    // ====== Casts ====== //
    #[error("Unsupported cast.")]
    UnsupportedCast,

    #[error("Could not parse '{text}' as {target}.")]
    CastParseError { text: String, target: &'static str },

    #[error("Cannot cast primitive type to a reflection type.")]
    PrimitiveToReflection,

    // ====== Host interop ====== //
    #[error("Could not find {0}. Verify that full class path is present.")]
    HostClassNotFound(String),

    #[error("Could not find constructor of {0}.")]
    HostConstructorNotFound(String),

    #[error("Could not create instance of {0}.")]
    HostInstantiationFailed(String),

    #[error("Could not create new instance of {0}.")]
    HostDefaultInstantiationFailed(String),

    #[error("Invalid arguments provided to constructor of {0}.")]
    HostConstructorArguments(String),

    #[error("Could not invoke method {0}.")]
    HostMethodFailed(String),

    #[error("Invocation target invalid.")]
    HostTargetInvalid,

    // ====== Execution limits ====== //
    #[error("Functions nested too deeply.")]
    NestingTooDeep,

    // ====== Termination ====== //
    /// Raised by the `quit` statement. Not an error in the usual sense; the
    /// CLI turns it into a clean exit.
    #[error("quit")]
    Quit,

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    pub fn undefined_variable(name: impl Into<String>) -> Self {
        EvalError::UndefinedVariable(name.into())
    }

    pub fn undefined_function(name: impl Into<String>) -> Self {
        EvalError::UndefinedFunction(name.into())
    }

    pub fn assign_mismatch(got: &'static str, want: &'static str) -> Self {
        EvalError::AssignTypeMismatch { got, want }
    }

    pub fn operator_mismatch(op: &'static str, left: &'static str, right: &'static str) -> Self {
        EvalError::OperatorTypeMismatch { op, left, right }
    }
}
