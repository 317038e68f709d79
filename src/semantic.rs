//! Análisis semántico.
//!
//! Esta fase recorre el árbol sin modificarlo. Mantiene una pila de
//! ámbitos para variables y una tabla plana de funciones, infiere el
//! tipo de cada expresión y verifica las reglas de tipos del lenguaje.
//! Al igual que el parser, no se detiene ante el primer error: cada
//! error se registra y el análisis continúa con el tipo de la expresión
//! afectada marcado como desconocido, lo cual evita errores en cascada.

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    lex::Identifier,
    parse::{
        Assignment, Ast, BinOp, Call, Declaration, Expr, ForInit, ForStep, Function, Shape,
        Statement, Type, UnOp, Update, UpdateOp,
    },
    source::{Located, Location},
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Variable `{0}` is already declared in this scope")]
    AlreadyDeclared(Identifier),

    #[error("Function `{0}` is already declared")]
    FunctionAlreadyDeclared(Identifier),

    #[error("Variable `{0}` is not declared")]
    UndeclaredVariable(Identifier),

    #[error("Function `{0}` is not declared")]
    UndeclaredFunction(Identifier),

    #[error("Array `{0}` cannot be used as a scalar value")]
    ArrayAsScalar(Identifier),

    #[error("Type mismatch: expected `{0}`, found `{1}`")]
    TypeMismatch(Type, Type),

    #[error("Operator `{0}` cannot be applied to `{1}` and `{2}`")]
    BinaryOperands(BinOp, Type, Type),

    #[error("Operator `{0}` cannot be applied to `{1}`")]
    UnaryOperand(UnOp, Type),

    #[error("Operator `{0}` requires `inteiro`, found `{1}`")]
    UpdateOperand(UpdateOp, Type),

    #[error("Function `{0}` expects {1} arguments, found {2}")]
    ArityMismatch(Identifier, usize, usize),

    #[error("Argument {1} of `{0}` must be `{2}`, found `{3}`")]
    ArgumentType(Identifier, usize, Type, Type),

    #[error("Condition must be `logico`, found `{0}`")]
    NonBooleanCondition(Type),
}

/// Verifica un árbol completo y retorna todos los errores encontrados.
///
/// Cada invocación usa una tabla de símbolos nueva, por lo cual
/// analizar dos veces el mismo árbol produce los mismos errores.
pub fn analyze(ast: &Ast) -> Vec<Located<SemanticError>> {
    let mut analyzer = Analyzer::default();
    analyzer.statements(&ast.statements);

    analyzer.errors
}

#[derive(Copy, Clone)]
struct Symbol {
    of: Type,
    is_array: bool,
}

struct Signature {
    returns: Type,
    parameters: Vec<Type>,
}

struct Analyzer {
    scopes: Vec<HashMap<Identifier, Symbol>>,
    functions: HashMap<Identifier, Signature>,
    errors: Vec<Located<SemanticError>>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer {
            scopes: vec![HashMap::new()],
            functions: HashMap::new(),
            errors: Vec::new(),
        }
    }
}

impl Analyzer {
    fn statements(&mut self, statements: &[Located<Statement>]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Located<Statement>) {
        match statement.as_ref() {
            Statement::Declaration(declaration) => self.declaration(declaration),
            Statement::Function(function) => self.function(function),
            Statement::Assignment(assignment) => self.assignment(assignment),

            Statement::If {
                condition,
                body,
                otherwise,
            } => {
                self.condition(condition);
                self.scoped(|this| this.statements(body));

                if let Some(otherwise) = otherwise {
                    self.scoped(|this| this.statements(otherwise));
                }
            }

            Statement::While { condition, body } => {
                self.condition(condition);
                self.scoped(|this| this.statements(body));
            }

            // Encabezado y cuerpo comparten un mismo ámbito
            Statement::For {
                init,
                condition,
                step,
                body,
            } => self.scoped(|this| {
                match init {
                    Some(ForInit::Declaration(declaration)) => this.declaration(declaration),
                    Some(ForInit::Assignment(assignment)) => this.assignment(assignment),
                    None => (),
                }

                if let Some(condition) = condition {
                    this.condition(condition);
                }

                match step {
                    Some(ForStep::Assignment(assignment)) => this.assignment(assignment),
                    Some(ForStep::Update(update)) => {
                        this.update(update.as_ref());
                    }

                    None => (),
                }

                this.statements(body);
            }),

            Statement::Write(value) => {
                self.infer(value);
            }

            Statement::Read(target) => {
                self.variable(target.as_ref(), target.location());
            }

            Statement::Call(call) => {
                self.call(call);
            }
        }
    }

    /// El nombre se declara antes de verificar el inicializador.
    fn declaration(&mut self, declaration: &Declaration) {
        let of = *declaration.of.val();
        let symbol = Symbol {
            of,
            is_array: matches!(declaration.shape, Shape::Array(_)),
        };

        self.define(&declaration.name, symbol);
        if let Shape::Scalar(Some(initializer)) = &declaration.shape {
            self.expect(of, initializer);
        }
    }

    fn function(&mut self, function: &Function) {
        let name = function.name.val();
        if self.functions.contains_key(name) {
            self.error(
                SemanticError::FunctionAlreadyDeclared(name.clone()),
                function.name.location(),
            );
        } else {
            // Se registra antes del cuerpo, así el cuerpo puede referirse a ella
            let signature = Signature {
                returns: *function.returns.val(),
                parameters: function
                    .parameters
                    .iter()
                    .map(|parameter| *parameter.of.val())
                    .collect(),
            };

            self.functions.insert(name.clone(), signature);
        }

        // Los parámetros viven en el mismo ámbito que el cuerpo
        self.scoped(|this| {
            for parameter in &function.parameters {
                let symbol = Symbol {
                    of: *parameter.of.val(),
                    is_array: false,
                };

                this.define(&parameter.name, symbol);
            }

            this.statements(&function.body);
        });
    }

    fn assignment(&mut self, assignment: &Assignment) {
        let target = &assignment.target;
        match self.variable(target.as_ref(), target.location()) {
            Some(of) => self.expect(of, &assignment.value),
            None => {
                self.infer(&assignment.value);
            }
        }
    }

    fn condition(&mut self, condition: &Located<Expr>) {
        match self.infer(condition) {
            Some(Type::Bool) | None => (),
            Some(other) => self.error(
                SemanticError::NonBooleanCondition(other),
                condition.location(),
            ),
        }
    }

    fn expect(&mut self, expected: Type, expr: &Located<Expr>) {
        match self.infer(expr) {
            Some(found) if found != expected => {
                self.error(SemanticError::TypeMismatch(expected, found), expr.location())
            }

            _ => (),
        }
    }

    /// Infiere el tipo de una expresión. `None` significa desconocido.
    fn infer(&mut self, expr: &Located<Expr>) -> Option<Type> {
        match expr.as_ref() {
            Expr::Literal(literal) => Some(literal.of()),
            Expr::Variable(name) => self.variable(name, expr.location()),
            Expr::Call(call) => self.call(call),
            Expr::Update(update) => self.update(update),

            Expr::Binary(left, op, right) => {
                let left = self.infer(left);
                let right = self.infer(right);
                let (left, right) = (left?, right?);

                let result = binary_type(*op, left, right);
                if result.is_none() {
                    let error = SemanticError::BinaryOperands(*op, left, right);
                    self.error(error, expr.location());
                }

                result
            }

            Expr::Unary(op, operand) => {
                let of = self.infer(operand)?;
                let valid = match op {
                    UnOp::Not => of == Type::Bool,
                    UnOp::Negate => of.is_numeric(),
                };

                if valid {
                    Some(of)
                } else {
                    self.error(SemanticError::UnaryOperand(*op, of), expr.location());
                    None
                }
            }
        }
    }

    fn update(&mut self, update: &Update) -> Option<Type> {
        let target = &update.target;
        match self.variable(target.as_ref(), target.location())? {
            Type::Int => Some(Type::Int),
            other => {
                let error = SemanticError::UpdateOperand(update.op, other);
                self.error(error, target.location());

                None
            }
        }
    }

    /// Resuelve una llamada. Los argumentos se verifican siempre, pero
    /// solo se comparan contra la firma si la función existe y la
    /// cantidad de argumentos coincide.
    fn call(&mut self, call: &Call) -> Option<Type> {
        let args: Vec<_> = call.args.iter().map(|arg| self.infer(arg)).collect();

        let name = call.function.val();
        let location = call.function.location();

        let signature = match self.functions.get(name) {
            Some(signature) => signature,
            None => {
                let error = SemanticError::UndeclaredFunction(name.clone());
                self.errors.push(Located::at(error, location.clone()));

                return None;
            }
        };

        if signature.parameters.len() != args.len() {
            let error =
                SemanticError::ArityMismatch(name.clone(), signature.parameters.len(), args.len());

            self.errors.push(Located::at(error, location.clone()));
            return None;
        }

        let checked = args.iter().zip(&signature.parameters).zip(&call.args);
        for (index, ((found, expected), arg)) in checked.enumerate() {
            match found {
                Some(found) if found != expected => {
                    let error =
                        SemanticError::ArgumentType(name.clone(), index + 1, *expected, *found);

                    self.errors.push(Located::at(error, arg.location().clone()));
                }

                _ => (),
            }
        }

        Some(signature.returns)
    }

    /// Tipo de una variable usada como valor escalar.
    fn variable(&mut self, name: &Identifier, location: &Location) -> Option<Type> {
        match self.lookup(name) {
            None => {
                self.error(SemanticError::UndeclaredVariable(name.clone()), location);
                None
            }

            Some(Symbol { is_array: true, .. }) => {
                self.error(SemanticError::ArrayAsScalar(name.clone()), location);
                None
            }

            Some(symbol) => Some(symbol.of),
        }
    }

    fn lookup(&self, name: &Identifier) -> Option<Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .copied()
    }

    fn define(&mut self, name: &Located<Identifier>, symbol: Symbol) {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => return,
        };

        if scope.contains_key(name.val()) {
            let error = SemanticError::AlreadyDeclared(name.val().clone());
            self.error(error, name.location());
        } else {
            scope.insert(name.val().clone(), symbol);
        }
    }

    /// Ejecuta `callback` dentro de un ámbito nuevo, que se descarta al final.
    fn scoped<F, R>(&mut self, callback: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.scopes.push(HashMap::new());
        let result = callback(self);
        self.scopes.pop();

        result
    }

    fn error(&mut self, error: SemanticError, location: &Location) {
        self.errors.push(Located::at(error, location.clone()));
    }
}

/// Tipo resultante de un operador binario, si los operandos son válidos.
fn binary_type(op: BinOp, left: Type, right: Type) -> Option<Type> {
    use BinOp::*;

    let numeric = left.is_numeric() && right.is_numeric();
    match op {
        Add | Sub | Mul | Div if numeric => {
            if left == Type::Float || right == Type::Float {
                Some(Type::Float)
            } else {
                Some(Type::Int)
            }
        }

        Greater | Less | GreaterOrEqual | LessOrEqual | Equal | NotEqual
            if numeric || left == right =>
        {
            Some(Type::Bool)
        }

        And | Or if left == Type::Bool && right == Type::Bool => Some(Type::Bool),
        Concat if left == Type::Str && right == Type::Str => Some(Type::Str),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, parse, source};

    fn parse_ok(code: &str) -> Ast {
        let (start, stream) = source::consume(code.as_bytes(), "<test>");
        let tokens = Lexer::new(start, stream).try_exhaustive().unwrap();
        let (ast, errors) = parse::parse(&tokens);
        assert!(errors.is_empty(), "syntax errors: {:?}", errors);

        ast
    }

    fn analyze_str(code: &str) -> Vec<Located<SemanticError>> {
        analyze(&parse_ok(code))
    }

    fn messages(errors: &[Located<SemanticError>]) -> Vec<String> {
        errors.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn valid_program() {
        let errors = analyze_str(
            "inicio
                 inteiro x = 10
                 flutuante media = x / 4.0
                 logico ok = x > 5 e media <= 3.5
                 cadeia nome = \"Ana\" && \" Silva\"
                 inteiro v[5]
                 escreva(x)
                 leia(nome)
                 se (ok) faca escreva(nome) senao escreva(-media)
                 enquanto (x > 0) faca x = x - 1
                 para (inteiro i = 0; i < 10; i++) faca inicio
                     escreva(i * 2)
                 fim
             fim",
        );

        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn string_initializer_mismatch() {
        let errors = analyze_str("cadeia s = 5");

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0].val(),
            SemanticError::TypeMismatch(Type::Str, Type::Int)
        ));

        let message = errors[0].val().to_string();
        assert!(message.contains("cadeia") && message.contains("inteiro"));
    }

    #[test]
    fn undeclared_function_does_not_cascade() {
        let errors = analyze_str("inteiro r = foo(1, 2)");

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].val(), SemanticError::UndeclaredFunction(_)));
    }

    #[test]
    fn undeclared_variable_does_not_cascade() {
        let errors = analyze_str("inteiro x = y + 1 * falso");

        // `1 * falso` sí es un error propio, `y + ...` ya no
        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert!(matches!(errors[0].val(), SemanticError::UndeclaredVariable(_)));
        assert!(matches!(
            errors[1].val(),
            SemanticError::BinaryOperands(BinOp::Mul, Type::Int, Type::Bool)
        ));
    }

    #[test]
    fn analysis_is_idempotent() {
        let ast = parse_ok("inteiro x = \"a\" escreva(z) x = verdadeiro foo()");

        let first = messages(&analyze(&ast));
        let second = messages(&analyze(&ast));

        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
    }

    #[test]
    fn block_scopes() {
        let errors = analyze_str(
            "se (verdadeiro) faca inicio inteiro t = 1 fim
             senao inicio inteiro t = 2 fim
             enquanto (falso) faca inicio cadeia t = \"x\" fim
             escreva(t)",
        );

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].val(), SemanticError::UndeclaredVariable(_)));
        assert_eq!(errors[0].line(), 4);
    }

    #[test]
    fn shadowing_and_redeclaration() {
        let errors = analyze_str(
            "inteiro x
             se (verdadeiro) faca inicio flutuante x = 1.5 fim
             cadeia x",
        );

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].val(), SemanticError::AlreadyDeclared(_)));
        assert_eq!(errors[0].line(), 3);
    }

    #[test]
    fn for_header_shares_scope_with_body() {
        let errors = analyze_str(
            "para (inteiro i = 0; i < 3; i++) faca inteiro i
             escreva(i)",
        );

        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert!(matches!(errors[0].val(), SemanticError::AlreadyDeclared(_)));
        assert!(matches!(errors[1].val(), SemanticError::UndeclaredVariable(_)));
    }

    #[test]
    fn arithmetic_type_inference() {
        let operands = [("2", Type::Int), ("2.5", Type::Float)];
        for op in ["+", "-", "*", "/"] {
            for (left, left_type) in operands {
                for (right, right_type) in operands {
                    let expected = if left_type == Type::Float || right_type == Type::Float {
                        Type::Float
                    } else {
                        Type::Int
                    };

                    let ast = parse_ok(&format!("escreva({} {} {})", left, op, right));
                    let expr = match ast.statements[0].as_ref() {
                        Statement::Write(expr) => expr,
                        other => panic!("{:?}", other),
                    };

                    assert_eq!(Analyzer::default().infer(expr), Some(expected));
                }
            }
        }
    }

    #[test]
    fn comparisons_and_logic() {
        let mut analyzer = Analyzer::default();
        let ast = parse_ok(
            "escreva(1 < 2.5)
             escreva(\"a\" == \"b\")
             escreva(verdadeiro != falso)
             escreva(verdadeiro ou 1 > 0)",
        );

        for statement in &ast.statements {
            match statement.as_ref() {
                Statement::Write(expr) => assert_eq!(analyzer.infer(expr), Some(Type::Bool)),
                other => panic!("{:?}", other),
            }
        }

        let errors = analyze_str("escreva(\"a\" < 1) escreva(1 e verdadeiro) escreva(1 && \"a\")");
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|error| matches!(error.val(), SemanticError::BinaryOperands(..))));
    }

    #[test]
    fn unary_operators() {
        let errors = analyze_str(
            "flutuante f = 1.0
             inteiro i = 0
             escreva(!i)
             escreva(-\"x\")
             escreva(f++)
             escreva(-f)
             escreva(++i)",
        );

        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(matches!(
            errors[0].val(),
            SemanticError::UnaryOperand(UnOp::Not, Type::Int)
        ));
        assert!(matches!(
            errors[1].val(),
            SemanticError::UnaryOperand(UnOp::Negate, Type::Str)
        ));
        assert!(matches!(
            errors[2].val(),
            SemanticError::UpdateOperand(UpdateOp::Increment, Type::Float)
        ));
    }

    #[test]
    fn calls_are_checked_exactly() {
        let errors = analyze_str(
            "flutuante media(flutuante a, flutuante b) escreva((a + b) / 2)
             flutuante m = media(1.0, 2.0)
             m = media(1, 2.0)
             m = media(1.0)
             inteiro n = media(1.0, 2.0)",
        );

        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(matches!(
            errors[0].val(),
            SemanticError::ArgumentType(_, 1, Type::Float, Type::Int)
        ));
        assert!(matches!(errors[1].val(), SemanticError::ArityMismatch(_, 2, 1)));
        assert!(matches!(
            errors[2].val(),
            SemanticError::TypeMismatch(Type::Int, Type::Float)
        ));
    }

    #[test]
    fn functions_and_parameters() {
        let errors = analyze_str(
            "inteiro soma(inteiro a, inteiro b) inicio escreva(a + b) fim
             soma(5, 7)
             inteiro soma(inteiro x) escreva(x)
             inteiro f(inteiro a, cadeia a) escreva(a)
             escreva(a)",
        );

        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(matches!(
            errors[0].val(),
            SemanticError::FunctionAlreadyDeclared(_)
        ));
        assert!(matches!(errors[1].val(), SemanticError::AlreadyDeclared(_)));
        assert!(matches!(errors[2].val(), SemanticError::UndeclaredVariable(_)));
    }

    #[test]
    fn non_boolean_conditions_still_analyze_body() {
        let errors = analyze_str("se (1) faca escreva(y) enquanto (\"s\") faca escreva(z)");

        assert_eq!(errors.len(), 4);
        assert!(matches!(
            errors[0].val(),
            SemanticError::NonBooleanCondition(Type::Int)
        ));
        assert!(matches!(
            errors[2].val(),
            SemanticError::NonBooleanCondition(Type::Str)
        ));
    }

    #[test]
    fn arrays_are_not_scalars() {
        let errors = analyze_str("inteiro v[3] escreva(v) v = 1 leia(v)");

        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|error| matches!(error.val(), SemanticError::ArrayAsScalar(_))));
    }
}
