//! The tree-walking evaluator.
//!
//! One `Evaluator` holds the scope display, the host class registry, the
//! stack of open instances (receivers of the method calls currently on the
//! stack) and the memo table that maps a function definition site to its
//! shared signature. `print` writes to a pluggable sink so tests can capture
//! program output.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use flint_parser::{
    Accessor, BinaryOp, CastTarget, ClassDef, ClassMember, Expr, ExprKind, FnDef, Identifier,
    IncDecOp, InterfaceDef, LValue, Literal, Modifier, Program, Span, Stmt, StmtKind, TypeName,
    UnaryOp,
};

use crate::class::{ClassDescriptor, Instance, InterfaceDescriptor, InterfaceMethodSig};
use crate::display::{ActivationRecord, Display};
use crate::error::{EvalError, EvalResult};
use crate::function::FunctionSignature;
use crate::interop::HostRegistry;
use crate::value::{ArrayValue, RecordValue, Value};

/// Whether a call's value will be consumed. A statement-position call checks
/// the produced value against the declared return type and discards it; an
/// expression-position call additionally requires the function to have a
/// return expression before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallPosition {
    Statement,
    Expression,
}

pub struct Evaluator {
    display: RefCell<Display>,
    host: HostRegistry,
    open_instances: RefCell<Vec<Arc<Instance>>>,
    signatures: RefCell<HashMap<Span, Arc<FunctionSignature>>>,
    output: RefCell<Box<dyn Write>>,
}

impl Evaluator {
    pub fn new() -> Evaluator {
        Evaluator::with_host(HostRegistry::new())
    }

    pub fn with_host(host: HostRegistry) -> Evaluator {
        Evaluator {
            display: RefCell::new(Display::new()),
            host,
            open_instances: RefCell::new(Vec::new()),
            signatures: RefCell::new(HashMap::new()),
            output: RefCell::new(Box::new(std::io::stdout())),
        }
    }

    /// Replace the `print` sink.
    pub fn with_output(self, output: Box<dyn Write>) -> Evaluator {
        Evaluator {
            output: RefCell::new(output),
            ..self
        }
    }

    pub fn run(&self, program: &Program) -> EvalResult<()> {
        for stmt in &program.statements {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    // ====== Statements ====== //

    fn exec_stmt(&self, stmt: &Stmt) -> EvalResult<()> {
        match &stmt.kind {
            StmtKind::Block(statements) => self.exec_block(statements),
            StmtKind::VarDecl {
                modifier,
                ty,
                name,
                init,
            } => self.declare_variable(*modifier, *ty, name, init.as_ref()),
            StmtKind::Assign { target, value } => {
                let value = self.eval_expr(value)?;
                self.assign(target, value)
            }
            StmtKind::FnDef(def) => self.define_function(def),
            StmtKind::ClassDef(def) => self.define_class(def),
            StmtKind::InterfaceDef(def) => self.define_interface(def),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self
                    .eval_expr(condition)?
                    .as_bool()
                    .ok_or(EvalError::IfConditionNotBoolean)?;
                if condition {
                    self.exec_stmt(then_branch)
                } else if let Some(branch) = else_branch {
                    self.exec_stmt(branch)
                } else {
                    Ok(())
                }
            }
            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => self.exec_for(init, condition, update, body),
            StmtKind::While { condition, body } => {
                loop {
                    let condition = self
                        .eval_expr(condition)?
                        .as_bool()
                        .ok_or(EvalError::WhileConditionNotBoolean)?;
                    if !condition {
                        break;
                    }
                    self.exec_stmt(body)?;
                }
                Ok(())
            }
            StmtKind::Print(expr) => {
                let value = self.eval_expr(expr)?;
                writeln!(self.output.borrow_mut(), "{value}")?;
                Ok(())
            }
            StmtKind::Quit => Err(EvalError::Quit),
            StmtKind::Expr(expr) => {
                if let ExprKind::Call { callee, args } = &expr.kind {
                    self.eval_call(callee, args, CallPosition::Statement)?;
                    Ok(())
                } else {
                    self.eval_expr(expr).map(|_| ())
                }
            }
        }
    }

    /// Run a block and retract every name it introduced at the current level.
    fn exec_block(&self, statements: &[Stmt]) -> EvalResult<()> {
        let before = self.display.borrow().snapshot();
        for stmt in statements {
            self.exec_stmt(stmt)?;
        }
        let after = self.display.borrow().snapshot();
        let display = self.display.borrow();
        for name in &after.variables {
            if !before.variables.contains(name) {
                display.retract_variable(name);
            }
        }
        for name in &after.functions {
            if !before.functions.contains(name) {
                display.retract_function(name);
            }
        }
        for name in &after.classes {
            if !before.classes.contains(name) {
                display.retract_class(name);
            }
        }
        for name in &after.interfaces {
            if !before.interfaces.contains(name) {
                display.retract_interface(name);
            }
        }
        Ok(())
    }

    fn declare_variable(
        &self,
        modifier: Modifier,
        ty: TypeName,
        name: &Identifier,
        init: Option<&Expr>,
    ) -> EvalResult<()> {
        match init {
            None => {
                match modifier {
                    Modifier::Const => return Err(EvalError::ConstWithoutInit),
                    Modifier::Readonly => return Err(EvalError::ReadonlyOutsideClass),
                    Modifier::None => {}
                }
                if self.display.borrow().find_reference(&name.name).is_some() {
                    return Err(EvalError::VariableExists(name.name.clone()));
                }
                if ty == TypeName::Void {
                    return Err(EvalError::VoidVariable);
                }
                let default =
                    Value::default_for(ty).ok_or(EvalError::MissingInitialiser(ty.as_str()))?;
                self.display.borrow().define_variable(&name.name, default, false);
                Ok(())
            }
            Some(init) => {
                if self.display.borrow().find_reference(&name.name).is_some() {
                    return Err(EvalError::VariableRedefined(name.name.clone()));
                }
                let value = self.eval_expr(init)?;
                if ty == TypeName::Void {
                    return Err(EvalError::VoidVariable);
                }
                if !value.matches_type(ty) {
                    return Err(EvalError::assign_mismatch(value.type_name(), ty.as_str()));
                }
                if modifier == Modifier::Readonly {
                    return Err(EvalError::ReadonlyOutsideClass);
                }
                self.display
                    .borrow()
                    .define_variable(&name.name, value, modifier == Modifier::Const);
                Ok(())
            }
        }
    }

    fn exec_for(
        &self,
        init: &Stmt,
        condition: &Expr,
        update: &Stmt,
        body: &Stmt,
    ) -> EvalResult<()> {
        let loop_var = match &init.kind {
            StmtKind::VarDecl { modifier, name, .. } => {
                if *modifier != Modifier::None {
                    return Err(EvalError::LoopInitModifier);
                }
                Some(name.name.clone())
            }
            _ => None,
        };
        self.exec_stmt(init)?;
        loop {
            let condition = self
                .eval_expr(condition)?
                .as_bool()
                .ok_or(EvalError::ForConditionNotBoolean)?;
            if !condition {
                break;
            }
            self.exec_stmt(body)?;
            self.exec_stmt(update)?;
        }
        if let Some(name) = loop_var {
            self.display.borrow().retract_variable(&name);
        }
        Ok(())
    }

    // ====== Definitions ====== //

    fn define_function(&self, def: &FnDef) -> EvalResult<()> {
        let name = def.name.as_ref().map(|id| id.name.as_str()).unwrap_or_default();
        let display = self.display.borrow();
        if let Some(memo) = self.signatures.borrow().get(&def.span) {
            // A retracted definition reappearing in a loop: re-register the
            // shared signature instead of building a fresh one.
            if display.find_function_in_current_level(name).is_none() {
                display.add_function(memo.clone());
            }
            return Ok(());
        }
        if display.find_function_in_current_level(name).is_some() {
            return Err(EvalError::FunctionExists(name.to_string()));
        }
        let depth = display.level() + 1;
        let sig = Arc::new(FunctionSignature::new(
            name.to_string(),
            depth,
            &def.params,
            def.return_type,
            def.body.clone(),
            def.return_expr.clone(),
        )?);
        self.signatures.borrow_mut().insert(def.span, sig.clone());
        display.add_function(sig);
        Ok(())
    }

    fn lambda_signature(&self, def: &FnDef) -> EvalResult<Arc<FunctionSignature>> {
        if let Some(memo) = self.signatures.borrow().get(&def.span) {
            return Ok(memo.clone());
        }
        let depth = self.display.borrow().level() + 1;
        let sig = Arc::new(FunctionSignature::new(
            String::new(),
            depth,
            &def.params,
            def.return_type,
            def.body.clone(),
            def.return_expr.clone(),
        )?);
        self.signatures.borrow_mut().insert(def.span, sig.clone());
        Ok(sig)
    }

    fn define_class(&self, def: &ClassDef) -> EvalResult<()> {
        let depth = {
            let display = self.display.borrow();
            if display.find_class_in_current_level(&def.name.name).is_some() {
                return Err(EvalError::ClassExists(def.name.name.clone()));
            }
            display.level() + 1
        };
        let descriptor = Arc::new(self.build_class(def, depth)?);
        let display = self.display.borrow();
        for interface_name in &def.implements {
            let interface = display
                .find_interface(&interface_name.name)
                .ok_or_else(|| EvalError::InterfaceNotFound(interface_name.name.clone()))?;
            interface.check_conformance(&descriptor)?;
        }
        display.add_class(descriptor);
        Ok(())
    }

    fn build_class(&self, def: &ClassDef, depth: usize) -> EvalResult<ClassDescriptor> {
        let mut descriptor = ClassDescriptor::new(def.name.name.clone(), depth);
        for member in &def.members {
            match member {
                ClassMember::Field {
                    modifier,
                    ty,
                    name,
                    init,
                } => {
                    if *ty == TypeName::Void {
                        return Err(EvalError::VoidVariable);
                    }
                    let default = match init {
                        Some(init) => {
                            let value = self.eval_expr(init)?;
                            if !value.matches_type(*ty) {
                                return Err(EvalError::assign_mismatch(
                                    value.type_name(),
                                    ty.as_str(),
                                ));
                            }
                            value
                        }
                        None => {
                            if *modifier == Modifier::Const {
                                return Err(EvalError::ConstFieldWithoutInit);
                            }
                            Value::default_for(*ty)
                                .ok_or(EvalError::MissingInitialiser(ty.as_str()))?
                        }
                    };
                    descriptor.define_field(&name.name, *modifier, *ty, default)?;
                }
                ClassMember::Method(method) => {
                    let name = method
                        .name
                        .as_ref()
                        .map(|id| id.name.clone())
                        .unwrap_or_default();
                    let sig = Arc::new(FunctionSignature::new(
                        name,
                        depth,
                        &method.params,
                        method.return_type,
                        method.body.clone(),
                        method.return_expr.clone(),
                    )?);
                    descriptor.add_method(sig);
                }
                ClassMember::Constructor {
                    name, params, body, ..
                } => {
                    if name.name != def.name.name {
                        return Err(EvalError::InvalidConstructorName {
                            name: name.name.clone(),
                            class: def.name.name.clone(),
                        });
                    }
                    let types: Vec<&str> = params.iter().map(|p| p.ty.as_str()).collect();
                    let key = format!("{} Constructor({})", def.name.name, types.join(","));
                    let sig = Arc::new(FunctionSignature::new(
                        key.clone(),
                        depth,
                        params,
                        TypeName::Void,
                        body.clone(),
                        None,
                    )?);
                    descriptor.set_constructor(key, sig)?;
                }
                ClassMember::NestedClass(nested) => {
                    let nested_descriptor = Arc::new(self.build_class(nested, depth)?);
                    descriptor.add_nested(nested_descriptor);
                }
            }
        }
        Ok(descriptor)
    }

    fn define_interface(&self, def: &InterfaceDef) -> EvalResult<()> {
        let methods = def
            .methods
            .iter()
            .map(|m| InterfaceMethodSig {
                name: m.name.name.clone(),
                return_type: m.return_type,
                param_types: m.param_types.clone(),
            })
            .collect();
        self.display
            .borrow()
            .add_interface(Arc::new(InterfaceDescriptor::new(
                def.name.name.clone(),
                methods,
            )));
        Ok(())
    }

    // ====== Assignment ====== //

    fn assign(&self, target: &LValue, value: Value) -> EvalResult<()> {
        let root = &target.root.name;
        if target.accessors.is_empty() {
            if let Some(reference) = self.display.borrow().find_reference(root) {
                let existing = reference
                    .value()
                    .ok_or_else(|| EvalError::undefined_variable(root))?;
                if value.type_name() != existing.type_name() {
                    return Err(EvalError::assign_mismatch(
                        value.type_name(),
                        existing.type_name(),
                    ));
                }
                return reference.assign(value);
            }
            let instances = self.open_instances.borrow();
            for instance in instances.iter().rev() {
                if instance.has_field(root) {
                    return instance.set_field(root, value);
                }
            }
            return Err(EvalError::AssignTargetMissing(root.clone()));
        }

        let mut current = self.resolve_assign_root(root)?;
        for accessor in &target.accessors[..target.accessors.len() - 1] {
            current = match accessor {
                Accessor::Member(id) => self.member_get(&current, &id.name)?,
                Accessor::Index(index) => self.index_get(&current, index)?,
            };
        }
        match &target.accessors[target.accessors.len() - 1] {
            Accessor::Member(id) => self.member_put(&current, &id.name, value),
            Accessor::Index(index) => self.index_put(&current, index, value),
        }
    }

    fn resolve_assign_root(&self, root: &str) -> EvalResult<Value> {
        if let Some(reference) = self.display.borrow().find_reference(root) {
            return reference
                .value()
                .ok_or_else(|| EvalError::undefined_variable(root));
        }
        let instances = self.open_instances.borrow();
        for instance in instances.iter().rev() {
            if let Some(value) = instance.try_get_field(root) {
                return Ok(value);
            }
        }
        Err(EvalError::AssignRootMissing(root.to_string()))
    }

    // ====== Name resolution and containers ====== //

    /// A bare name in expression position: nearest variable first, then the
    /// fields of open instances, innermost receiver first.
    fn lookup_name(&self, name: &str) -> EvalResult<Value> {
        if let Some(reference) = self.display.borrow().find_reference(name) {
            return reference
                .value()
                .ok_or_else(|| EvalError::undefined_variable(name));
        }
        let instances = self.open_instances.borrow();
        for instance in instances.iter().rev() {
            if let Some(value) = instance.try_get_field(name) {
                return Ok(value);
            }
        }
        Err(EvalError::undefined_variable(name))
    }

    fn member_get(&self, base: &Value, member: &str) -> EvalResult<Value> {
        match base {
            Value::Instance(instance) => instance.get_field(member),
            Value::Record(record) => record.get(member),
            Value::Host(obj) => self.host.get_field(obj, member),
            _ => Err(EvalError::NotAContainer {
                member: member.to_string(),
                ty: base.type_name(),
            }),
        }
    }

    fn member_put(&self, base: &Value, member: &str, value: Value) -> EvalResult<()> {
        match base {
            Value::Instance(instance) => instance.set_field(member, value),
            Value::Record(_) => Err(EvalError::RecordMemberWrite),
            Value::Host(obj) => self.host.set_field(obj, member, value),
            _ => Err(EvalError::NotAContainer {
                member: member.to_string(),
                ty: base.type_name(),
            }),
        }
    }

    fn index_get(&self, base: &Value, index: &Expr) -> EvalResult<Value> {
        match base {
            Value::Array(array) => {
                let index = self
                    .eval_expr(index)?
                    .as_integer()
                    .ok_or(EvalError::BadIndexType)?;
                array.get(index)
            }
            _ => Err(EvalError::NotIndexable(base.type_name())),
        }
    }

    fn index_put(&self, base: &Value, index: &Expr, value: Value) -> EvalResult<()> {
        match base {
            Value::Array(array) => {
                let index = self
                    .eval_expr(index)?
                    .as_integer()
                    .ok_or(EvalError::BadIndexType)?;
                array.put(index, value)
            }
            _ => Err(EvalError::NotIndexable(base.type_name())),
        }
    }

    // ====== Expressions ====== //

    fn eval_expr(&self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Identifier(id) => self.lookup_name(&id.name),
            ExprKind::MemberAccess { base, member } => {
                let base = self.eval_expr(base)?;
                self.member_get(&base, &member.name)
            }
            ExprKind::Index { base, index } => {
                let base = self.eval_expr(base)?;
                self.index_get(&base, index)
            }
            ExprKind::Call { callee, args } => {
                let result = self.eval_call(callee, args, CallPosition::Expression)?;
                result.ok_or_else(|| EvalError::NoReturnValue(call_name(callee)))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                match op {
                    UnaryOp::Not => value.not(),
                    UnaryOp::Neg => value.negate(),
                    UnaryOp::Plus => value.unary_plus(),
                }
            }
            ExprKind::Binary { op, left, right } => {
                // Both operands are always evaluated; there is no
                // short-circuiting for `&&` and `||`.
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                apply_binary(*op, &left, &right)
            }
            ExprKind::IncDec { target, op, prefix } => self.eval_inc_dec(target, *op, *prefix),
            ExprKind::Cast { target, operand } => {
                let value = self.eval_expr(operand)?;
                self.eval_cast(target, value)
            }
            ExprKind::NewInstance { class_path, args } => self.instantiate_class(class_path, args),
            ExprKind::NewArray { elem_type, length } => {
                let length = self
                    .eval_expr(length)?
                    .as_integer()
                    .ok_or(EvalError::BadArrayLength)?;
                if length < 0 {
                    return Err(EvalError::BadArrayLength);
                }
                Ok(Value::Array(Arc::new(ArrayValue::new(
                    *elem_type,
                    length as usize,
                )?)))
            }
            ExprKind::NewReflection { class, args } => {
                let values = self.eval_args(args)?;
                self.host.construct(class, &values)
            }
            ExprKind::ReflectionHandle { class } => self.host.class_handle(class),
            ExprKind::Lambda(def) => Ok(Value::Function(self.lambda_signature(def)?)),
            ExprKind::AnonRecord { fields } => {
                let mut members = Vec::with_capacity(fields.len());
                for (name, init) in fields {
                    members.push((name.name.clone(), self.eval_expr(init)?));
                }
                Ok(Value::Record(Arc::new(RecordValue::new(members))))
            }
        }
    }

    fn eval_args(&self, args: &[Expr]) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg)?);
        }
        Ok(values)
    }

    fn eval_inc_dec(&self, target: &LValue, op: IncDecOp, prefix: bool) -> EvalResult<Value> {
        let current = self.read_lvalue(target)?;
        let one = Value::Integer(1);
        let updated = match op {
            IncDecOp::Increment => current.add(&one)?,
            IncDecOp::Decrement => current.subtract(&one)?,
        };
        self.assign(target, updated.clone())?;
        Ok(if prefix { updated } else { current })
    }

    fn read_lvalue(&self, target: &LValue) -> EvalResult<Value> {
        let mut current = self.lookup_name(&target.root.name)?;
        for accessor in &target.accessors {
            current = match accessor {
                Accessor::Member(id) => self.member_get(&current, &id.name)?,
                Accessor::Index(index) => self.index_get(&current, index)?,
            };
        }
        Ok(current)
    }

    // ====== Casts ====== //

    fn eval_cast(&self, target: &CastTarget, value: Value) -> EvalResult<Value> {
        match target {
            CastTarget::Type(ty) => cast_primitive(value, *ty),
            CastTarget::HostClass(class_name) => match &value {
                Value::Host(obj) => self.host.cast(obj, class_name),
                _ => Err(EvalError::PrimitiveToReflection),
            },
        }
    }

    // ====== Calls ====== //

    fn eval_call(
        &self,
        callee: &Expr,
        args: &[Expr],
        position: CallPosition,
    ) -> EvalResult<Option<Value>> {
        match &callee.kind {
            ExprKind::Identifier(id) => {
                let name = &id.name;
                let found = self.display.borrow().find_function(name);
                if let Some(sig) = found {
                    return self.invoke(&sig, args, None, position);
                }
                let reference = self.display.borrow().find_reference(name);
                if let Some(reference) = reference {
                    let value = reference
                        .value()
                        .ok_or_else(|| EvalError::undefined_variable(name))?;
                    return match value {
                        Value::Function(sig) => self.invoke(&sig, args, None, position),
                        other => Err(EvalError::NotInvocable(other.type_name())),
                    };
                }
                let mut found_method = None;
                let mut found_field = None;
                {
                    let instances = self.open_instances.borrow();
                    for instance in instances.iter().rev() {
                        if let Some(sig) = instance.class().find_method(name) {
                            found_method = Some((instance.clone(), sig));
                            break;
                        }
                        if let Some(value) = instance.try_get_field(name) {
                            found_field = Some(value);
                            break;
                        }
                    }
                }
                if let Some((instance, sig)) = found_method {
                    return self.invoke(&sig, args, Some(instance), position);
                }
                if let Some(value) = found_field {
                    return match value {
                        Value::Function(sig) => self.invoke(&sig, args, None, position),
                        other => Err(EvalError::NotInvocable(other.type_name())),
                    };
                }
                Err(EvalError::undefined_function(name))
            }
            ExprKind::MemberAccess { base, member } => {
                let receiver = self.eval_expr(base)?;
                match receiver {
                    Value::Instance(instance) => {
                        if let Some(sig) = instance.class().find_method(&member.name) {
                            return self.invoke(&sig, args, Some(instance.clone()), position);
                        }
                        let value = instance.get_field(&member.name)?;
                        match value {
                            Value::Function(sig) => self.invoke(&sig, args, None, position),
                            other => Err(EvalError::NotInvocable(other.type_name())),
                        }
                    }
                    Value::Host(obj) => {
                        let values = self.eval_args(args)?;
                        let result = self.host.invoke(&obj, &member.name, &values)?;
                        match (position, result) {
                            (CallPosition::Expression, None) => {
                                Err(EvalError::NoReturnValue(member.name.clone()))
                            }
                            (_, result) => Ok(result),
                        }
                    }
                    Value::Record(record) => {
                        let value = record.get(&member.name)?;
                        match value {
                            Value::Function(sig) => self.invoke(&sig, args, None, position),
                            other => Err(EvalError::NotInvocable(other.type_name())),
                        }
                    }
                    other => Err(EvalError::NotInvocable(other.type_name())),
                }
            }
            _ => {
                let value = self.eval_expr(callee)?;
                match value {
                    Value::Function(sig) => self.invoke(&sig, args, None, position),
                    other => Err(EvalError::NotInvocable(other.type_name())),
                }
            }
        }
    }

    fn invoke(
        &self,
        sig: &Arc<FunctionSignature>,
        args: &[Expr],
        receiver: Option<Arc<Instance>>,
        position: CallPosition,
    ) -> EvalResult<Option<Value>> {
        if position == CallPosition::Expression && !sig.has_return() {
            return Err(EvalError::NoReturnValue(sig.name().to_string()));
        }
        tracing::debug!("Invoking {}", sig.signature_string());
        let values = self.eval_args(args)?;
        let result = self.invoke_with_values(sig, &values, receiver)?;
        if let Some(value) = &result {
            if sig.return_type() == TypeName::Void {
                return Err(EvalError::ReturnFromVoid);
            }
            if !value.matches_type(sig.return_type()) {
                return Err(EvalError::ReturnTypeMismatch {
                    got: value.type_name(),
                    want: sig.return_type().as_str(),
                });
            }
        }
        Ok(result)
    }

    fn invoke_with_values(
        &self,
        sig: &Arc<FunctionSignature>,
        values: &[Value],
        receiver: Option<Arc<Instance>>,
    ) -> EvalResult<Option<Value>> {
        let record = Arc::new(ActivationRecord::new(sig.clone()));
        record.bind_arguments(values)?;
        let pushed = receiver.is_some();
        if let Some(instance) = receiver {
            self.open_instances.borrow_mut().push(instance);
        }
        let result = self.with_record(record, |evaluator| {
            for stmt in sig.body() {
                evaluator.exec_stmt(stmt)?;
            }
            sig.return_expr()
                .map(|expr| evaluator.eval_expr(expr))
                .transpose()
        });
        if pushed {
            self.open_instances.borrow_mut().pop();
        }
        result
    }

    /// Activate `record` on the display for the duration of `body`.
    fn with_record<T>(
        &self,
        record: Arc<ActivationRecord>,
        body: impl FnOnce(&Evaluator) -> EvalResult<T>,
    ) -> EvalResult<T> {
        let frame = self.display.borrow_mut().activate(record)?;
        let result = body(self);
        self.display.borrow_mut().restore(frame);
        result
    }

    // ====== Instantiation ====== //

    fn instantiate_class(&self, class_path: &[Identifier], args: &[Expr]) -> EvalResult<Value> {
        let (first, rest) = match class_path.split_first() {
            Some(pair) => pair,
            None => return Err(EvalError::ClassNotFound(String::new())),
        };
        let mut descriptor = self.resolve_class(&first.name)?;
        for segment in rest {
            descriptor = descriptor
                .find_nested(&segment.name)
                .ok_or_else(|| EvalError::ClassNotFound(segment.name.clone()))?;
        }
        tracing::debug!("Instantiating class {}", descriptor.name());
        let values = self.eval_args(args)?;
        let types: Vec<&str> = values.iter().map(|v| v.type_name()).collect();
        let key = format!("{} Constructor({})", descriptor.name(), types.join(","));
        let ctor = match descriptor.matching_constructor(&key) {
            Some(ctor) => Some(ctor),
            None if values.is_empty() && !descriptor.has_constructor() => None,
            None => {
                return Err(EvalError::NoMatchingConstructor(
                    descriptor.name().to_string(),
                ))
            }
        };
        let instance = Instance::instantiate(&descriptor);
        if let Some(ctor) = ctor {
            instance.set_in_constructor(true);
            let result = self.invoke_with_values(&ctor, &values, Some(instance.clone()));
            instance.set_in_constructor(false);
            result?;
        }
        Ok(Value::Instance(instance))
    }

    fn resolve_class(&self, name: &str) -> EvalResult<Arc<ClassDescriptor>> {
        if let Some(descriptor) = self.display.borrow().find_class(name) {
            return Ok(descriptor);
        }
        let instances = self.open_instances.borrow();
        for instance in instances.iter().rev() {
            if let Some(descriptor) = instance.class().find_nested(name) {
                return Ok(descriptor);
            }
        }
        Err(EvalError::ClassNotFound(name.to_string()))
    }
}

impl Default for Evaluator {
    fn default() -> Evaluator {
        Evaluator::new()
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Integer(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::Double(n) => Value::Double(*n),
        Literal::Bool(b) => Value::Boolean(*b),
        Literal::Str(s) => Value::Str(Arc::from(s.as_str())),
    }
}

fn call_name(callee: &Expr) -> String {
    match &callee.kind {
        ExprKind::Identifier(id) => id.name.clone(),
        ExprKind::MemberAccess { member, .. } => member.name.clone(),
        _ => String::new(),
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Or => left.or(right),
        BinaryOp::And => left.and(right),
        BinaryOp::Eq => left.equals(right, "==").map(Value::Boolean),
        BinaryOp::Ne => left.equals(right, "!=").map(|b| Value::Boolean(!b)),
        BinaryOp::Lt => left
            .compare(right, "<")
            .map(|o| Value::Boolean(o == Ordering::Less)),
        BinaryOp::Le => left
            .compare(right, "<=")
            .map(|o| Value::Boolean(o != Ordering::Greater)),
        BinaryOp::Gt => left
            .compare(right, ">")
            .map(|o| Value::Boolean(o == Ordering::Greater)),
        BinaryOp::Ge => left
            .compare(right, ">=")
            .map(|o| Value::Boolean(o != Ordering::Less)),
        BinaryOp::Add => left.add(right),
        BinaryOp::Sub => left.subtract(right),
        BinaryOp::Mul => left.multiply(right),
        BinaryOp::Div => left.divide(right),
        BinaryOp::Mod => left.modulo(right),
    }
}

fn cast_primitive(value: Value, ty: TypeName) -> EvalResult<Value> {
    match ty {
        TypeName::Int => match &value {
            Value::Integer(_) => Ok(value),
            Value::Float(n) => Ok(Value::Integer(*n as i64)),
            Value::Double(n) => Ok(Value::Integer(*n as i64)),
            Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
            Value::Str(s) => s.parse::<i64>().map(Value::Integer).map_err(|_| {
                EvalError::CastParseError {
                    text: s.to_string(),
                    target: "int",
                }
            }),
            _ => Err(EvalError::UnsupportedCast),
        },
        TypeName::Float => match &value {
            Value::Integer(n) => Ok(Value::Float(*n as f32)),
            Value::Float(_) => Ok(value),
            Value::Double(n) => Ok(Value::Float(*n as f32)),
            Value::Boolean(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            Value::Str(s) => s.parse::<f32>().map(Value::Float).map_err(|_| {
                EvalError::CastParseError {
                    text: s.to_string(),
                    target: "float",
                }
            }),
            _ => Err(EvalError::UnsupportedCast),
        },
        TypeName::Double => match &value {
            Value::Integer(n) => Ok(Value::Double(*n as f64)),
            Value::Float(n) => Ok(Value::Double(f64::from(*n))),
            Value::Double(_) => Ok(value),
            Value::Boolean(b) => Ok(Value::Double(if *b { 1.0 } else { 0.0 })),
            Value::Str(s) => s.parse::<f64>().map(Value::Double).map_err(|_| {
                EvalError::CastParseError {
                    text: s.to_string(),
                    target: "double",
                }
            }),
            _ => Err(EvalError::UnsupportedCast),
        },
        TypeName::Bool => match &value {
            Value::Integer(n) => Ok(Value::Boolean(*n != 0)),
            Value::Float(n) => Ok(Value::Boolean(*n != 0.0)),
            Value::Double(n) => Ok(Value::Boolean(*n != 0.0)),
            Value::Boolean(_) => Ok(value),
            Value::Str(s) => Ok(Value::Boolean(&**s == "true")),
            _ => Err(EvalError::UnsupportedCast),
        },
        TypeName::Str => match &value {
            Value::Integer(_) | Value::Float(_) | Value::Double(_) | Value::Boolean(_) => {
                Ok(Value::Str(Arc::from(value.string_value().as_str())))
            }
            Value::Str(_) => Ok(value),
            _ => Err(EvalError::UnsupportedCast),
        },
        _ => Err(EvalError::UnsupportedCast),
    }
}
