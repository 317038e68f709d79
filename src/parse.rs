//! Análisis sintáctico.
//!
//! El parser es descendente recursivo. Las sentencias se distinguen por
//! su primer token (y a lo sumo uno más de lookahead), mientras que las
//! expresiones se resuelven por niveles de precedencia, del más débil
//! al más fuerte:
//!
//! | Nivel          | Operadores         | Asociatividad |
//! |----------------|--------------------|---------------|
//! | disyunción     | `ou`               | izquierda     |
//! | conjunción     | `e`                | izquierda     |
//! | igualdad       | `==` `!=`          | izquierda     |
//! | relacional     | `>` `<` `>=` `<=`  | izquierda     |
//! | aditivo        | `+` `-` `&&`       | izquierda     |
//! | multiplicativo | `*` `/`            | izquierda     |
//! | unario         | `!` `-` `++` `--`  | derecha       |
//!
//! # Errores
//! Un error de sintaxis no detiene el análisis. El error se registra y el
//! parser se resincroniza en el siguiente token que pueda iniciar una
//! sentencia, por lo cual una sola ejecución reporta tantos errores como
//! sea posible. El árbol resultante siempre se retorna, aunque contenga
//! solamente las sentencias que se lograron reconocer.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use thiserror::Error;

use crate::{
    lex::{Identifier, Keyword, Token},
    source::{Located, Location},
};

/// Raíz del árbol: el programa completo.
#[derive(Debug)]
pub struct Ast {
    pub statements: Vec<Located<Statement>>,
}

/// Tipos del lenguaje.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
}

impl Type {
    /// Determina si el tipo participa en aritmética.
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("inteiro"),
            Type::Float => fmt.write_str("flutuante"),
            Type::Bool => fmt.write_str("logico"),
            Type::Str => fmt.write_str("cadeia"),
        }
    }
}

#[derive(Debug)]
pub enum Statement {
    Declaration(Declaration),
    Function(Function),
    Assignment(Assignment),

    If {
        condition: Located<Expr>,
        body: Vec<Located<Statement>>,
        otherwise: Option<Vec<Located<Statement>>>,
    },

    While {
        condition: Located<Expr>,
        body: Vec<Located<Statement>>,
    },

    For {
        init: Option<ForInit>,
        condition: Option<Located<Expr>>,
        step: Option<ForStep>,
        body: Vec<Located<Statement>>,
    },

    Write(Located<Expr>),
    Read(Located<Identifier>),
    Call(Call),
}

/// Declaración de variable.
#[derive(Debug)]
pub struct Declaration {
    pub of: Located<Type>,
    pub name: Located<Identifier>,
    pub shape: Shape,
}

/// Un arreglo no puede tener inicializador, lo cual queda expresado aquí.
#[derive(Debug)]
pub enum Shape {
    Scalar(Option<Located<Expr>>),
    Array(Located<u32>),
}

#[derive(Debug)]
pub struct Function {
    pub returns: Located<Type>,
    pub name: Located<Identifier>,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Located<Statement>>,
}

#[derive(Debug)]
pub struct Parameter {
    pub of: Located<Type>,
    pub name: Located<Identifier>,
}

#[derive(Debug)]
pub struct Assignment {
    pub target: Located<Identifier>,
    pub value: Located<Expr>,
}

#[derive(Debug)]
pub struct Call {
    pub function: Located<Identifier>,
    pub args: Vec<Located<Expr>>,
}

#[derive(Debug)]
pub enum ForInit {
    Declaration(Declaration),
    Assignment(Assignment),
}

#[derive(Debug)]
pub enum ForStep {
    Assignment(Assignment),
    Update(Located<Update>),
}

#[derive(Debug)]
pub enum Expr {
    Literal(Literal),
    Variable(Identifier),
    Call(Call),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Unary(UnOp, Box<Located<Expr>>),
    Update(Update),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
}

impl Literal {
    pub fn of(&self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Float(_) => Type::Float,
            Literal::Bool(_) => Type::Bool,
            Literal::Str(_) => Type::Str,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Concat,
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinOp::*;

        let symbol = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Greater => ">",
            Less => "<",
            GreaterOrEqual => ">=",
            LessOrEqual => "<=",
            Equal => "==",
            NotEqual => "!=",
            And => "e",
            Or => "ou",
            Concat => "&&",
        };

        fmt.write_str(symbol)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Negate,
}

impl Display for UnOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Not => fmt.write_str("!"),
            UnOp::Negate => fmt.write_str("-"),
        }
    }
}

/// `++x`, `x++`, `--x` o `x--`.
///
/// Ambas formas se evalúan igual: el resultado siempre es el valor
/// ya actualizado.
#[derive(Debug)]
pub struct Update {
    pub op: UpdateOp,
    pub fixity: Fixity,
    pub target: Located<Identifier>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl Display for UpdateOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOp::Increment => fmt.write_str("++"),
            UpdateOp::Decrement => fmt.write_str("--"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fixity {
    Prefix,
    Postfix,
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected a statement, found {0} instead")]
    ExpectedStatement(Token),

    #[error("Expected any of `inteiro`, `flutuante`, `logico`, `cadeia`, found {0} instead")]
    ExpectedType(Token),

    #[error("Expected identifier, found {0} instead")]
    ExpectedId(Token),

    #[error("Expected an expression, found {0} instead")]
    ExpectedExpr(Token),

    #[error("Expected an integer array length, found {0} instead")]
    ExpectedLength(Token),

    #[error("Expected a declaration or assignment, found {0} instead")]
    ExpectedForInit(Token),

    #[error("Expected an assignment, `++` or `--`, found {0} instead")]
    ExpectedForStep(Token),

    #[error("Expected end of program after `fim`, found {0} instead")]
    TrailingInput(Token),

    #[error("Abrupt end of program")]
    UnexpectedEof,
}

impl ParserError {
    /// Token que provocó el error, si existe alguno.
    pub fn offending_token(&self) -> Option<&Token> {
        use ParserError::*;

        match self {
            UnexpectedToken(_, found) => Some(found),
            ExpectedStatement(found)
            | ExpectedType(found)
            | ExpectedId(found)
            | ExpectedExpr(found)
            | ExpectedLength(found)
            | ExpectedForInit(found)
            | ExpectedForStep(found)
            | TrailingInput(found) => Some(found),
            UnexpectedEof => None,
        }
    }
}

/// Construye un árbol a partir de un flujo de tokens terminado en [`Token::End`].
///
/// Siempre se retorna un árbol, incluso si hubo errores. El llamador
/// debe revisar si la lista de errores está vacía antes de continuar
/// con las siguientes fases.
pub fn parse(tokens: &[Located<Token>]) -> (Ast, Vec<Located<ParserError>>) {
    let end = match tokens.last() {
        Some(last) => Located::at(Token::End, last.location().clone()),
        None => return (Ast { statements: Vec::new() }, Vec::new()),
    };

    let mut parser = Parser {
        tokens,
        position: 0,
        end: &end,
        last_known: tokens[0].location().clone(),
        errors: Vec::new(),
    };

    let ast = parser.program();
    (ast, parser.errors)
}

struct Parser<'a> {
    tokens: &'a [Located<Token>],
    position: usize,
    end: &'a Located<Token>,
    last_known: Location,
    errors: Vec<Located<ParserError>>,
}

type Parse<T> = Result<T, Located<ParserError>>;

/// Niveles de precedencia de operadores binarios, del más débil al más fuerte.
#[derive(Copy, Clone)]
enum Precedence {
    Or,
    And,
    Equality,
    Relational,
    Additive,
    Multiplicative,
}

impl Precedence {
    fn tighter(self) -> Option<Precedence> {
        use Precedence::*;

        match self {
            Or => Some(And),
            And => Some(Equality),
            Equality => Some(Relational),
            Relational => Some(Additive),
            Additive => Some(Multiplicative),
            Multiplicative => None,
        }
    }

    fn operator(self, token: &Token) -> Option<BinOp> {
        use Precedence::*;

        let op = match (self, token) {
            (Or, Token::Keyword(Keyword::Or)) => BinOp::Or,
            (And, Token::Keyword(Keyword::And)) => BinOp::And,
            (Equality, Token::Equal) => BinOp::Equal,
            (Equality, Token::NotEqual) => BinOp::NotEqual,
            (Relational, Token::Greater) => BinOp::Greater,
            (Relational, Token::Less) => BinOp::Less,
            (Relational, Token::GreaterOrEqual) => BinOp::GreaterOrEqual,
            (Relational, Token::LessOrEqual) => BinOp::LessOrEqual,
            (Additive, Token::Plus) => BinOp::Add,
            (Additive, Token::Minus) => BinOp::Sub,
            (Additive, Token::Concat) => BinOp::Concat,
            (Multiplicative, Token::Times) => BinOp::Mul,
            (Multiplicative, Token::Slash) => BinOp::Div,
            _ => return None,
        };

        Some(op)
    }
}

impl<'a> Parser<'a> {
    fn program(&mut self) -> Ast {
        // Un programa sin `inicio` es una lista suelta de sentencias
        if !matches!(self.peek(), Token::Keyword(Keyword::Begin)) {
            let statements = self.statement_list(false);
            return Ast { statements };
        }

        let _ = self.next();
        let mut statements = self.statement_list(true);

        // Lo que siga a `fim` es un error, pero igual se analiza
        if !matches!(self.peek(), Token::End) {
            let (location, found) = self.peek_nth(0).clone().split();
            self.errors
                .push(Located::at(ParserError::TrailingInput(found), location));

            // El token sobrante ya fue reportado
            let start = self.position;
            self.synchronize(start);

            statements.extend(self.statement_list(false));
        }

        Ast { statements }
    }

    /// Lista de sentencias con recuperación de errores.
    ///
    /// Si `closing`, la lista debe terminar en `fim`, que se consume.
    fn statement_list(&mut self, closing: bool) -> Vec<Located<Statement>> {
        let mut statements = Vec::new();

        loop {
            match self.peek() {
                Token::End => {
                    if closing {
                        let location = self.end.location().clone();
                        self.errors
                            .push(Located::at(ParserError::UnexpectedEof, location));
                    }

                    break;
                }

                Token::Keyword(Keyword::End) if closing => {
                    let _ = self.next();
                    break;
                }

                _ => (),
            }

            let start = self.position;
            match self.statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize(start);
                }
            }
        }

        statements
    }

    fn statement(&mut self) -> Parse<Located<Statement>> {
        match self.peek() {
            Token::Keyword(Keyword::If) => self.if_statement(),
            Token::Keyword(Keyword::While) => self.while_statement(),
            Token::Keyword(Keyword::For) => self.for_statement(),
            Token::Keyword(Keyword::Write) => self.write(),
            Token::Keyword(Keyword::Read) => self.read(),
            Token::Keyword(keyword) if type_of(*keyword).is_some() => self.declaration(),

            Token::Id(_) => match self.peek_nth(1).as_ref() {
                Token::OpenParen => {
                    let start = self.peek_nth(0).location().clone();
                    let call = self.call()?;
                    Ok(self.located(Statement::Call(call), start))
                }

                _ => {
                    let start = self.peek_nth(0).location().clone();
                    let assignment = self.assignment()?;
                    Ok(self.located(Statement::Assignment(assignment), start))
                }
            },

            _ => {
                let found = self.next()?.into_inner();
                self.fail(ParserError::ExpectedStatement(found))
            }
        }
    }

    /// Declaración de variable, arreglo o función.
    ///
    /// Las tres formas comparten `tipo nombre` y se distinguen por el
    /// token siguiente.
    fn declaration(&mut self) -> Parse<Located<Statement>> {
        let of = self.typ()?;
        let start = of.location().clone();
        let name = self.id()?;

        let statement = match self.peek() {
            Token::OpenParen => Statement::Function(self.function(of, name)?),
            _ => {
                let shape = self.shape()?;
                Statement::Declaration(Declaration { of, name, shape })
            }
        };

        Ok(self.located(statement, start))
    }

    fn shape(&mut self) -> Parse<Shape> {
        match self.peek() {
            Token::Assign => {
                self.next()?;
                Ok(Shape::Scalar(Some(self.expr()?)))
            }

            Token::OpenSquare => {
                self.next()?;

                let (location, token) = self.next()?.split();
                let length = match token {
                    Token::IntLiteral(length) => Located::at(length as u32, location),
                    found => return self.fail(ParserError::ExpectedLength(found)),
                };

                self.expect(Token::CloseSquare)?;
                Ok(Shape::Array(length))
            }

            _ => Ok(Shape::Scalar(None)),
        }
    }

    fn function(&mut self, returns: Located<Type>, name: Located<Identifier>) -> Parse<Function> {
        self.expect(Token::OpenParen)?;
        let parameters = self.comma_separated(Self::parameter, Token::CloseParen)?;
        self.expect(Token::CloseParen)?;

        let body = self.block()?;

        Ok(Function {
            returns,
            name,
            parameters,
            body,
        })
    }

    fn parameter(&mut self) -> Parse<Parameter> {
        let of = self.typ()?;
        let name = self.id()?;

        Ok(Parameter { of, name })
    }

    fn assignment(&mut self) -> Parse<Assignment> {
        let target = self.id()?;
        self.expect(Token::Assign)?;
        let value = self.expr()?;

        Ok(Assignment { target, value })
    }

    fn call(&mut self) -> Parse<Call> {
        let function = self.id()?;

        self.expect(Token::OpenParen)?;
        let args = self.comma_separated(Self::expr, Token::CloseParen)?;
        self.expect(Token::CloseParen)?;

        Ok(Call { function, args })
    }

    fn if_statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.keyword(Keyword::If)?;
        let condition = self.condition()?;

        self.keyword(Keyword::Do)?;
        let body = self.block()?;

        // El `senao` pertenece al `se` abierto más cercano
        let otherwise = match self.peek() {
            Token::Keyword(Keyword::Else) => {
                self.next()?;
                Some(self.block()?)
            }

            _ => None,
        };

        let statement = Statement::If {
            condition,
            body,
            otherwise,
        };

        Ok(self.located(statement, start))
    }

    fn while_statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.keyword(Keyword::While)?;
        let condition = self.condition()?;

        self.keyword(Keyword::Do)?;
        let body = self.block()?;

        Ok(self.located(Statement::While { condition, body }, start))
    }

    fn for_statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.keyword(Keyword::For)?;
        self.expect(Token::OpenParen)?;

        let init = match self.peek() {
            Token::Semicolon => None,
            _ => Some(self.for_init()?),
        };

        self.expect(Token::Semicolon)?;
        let condition = match self.peek() {
            Token::Semicolon => None,
            _ => Some(self.expr()?),
        };

        self.expect(Token::Semicolon)?;
        let step = match self.peek() {
            Token::CloseParen => None,
            _ => Some(self.for_step()?),
        };

        self.expect(Token::CloseParen)?;
        self.keyword(Keyword::Do)?;
        let body = self.block()?;

        let statement = Statement::For {
            init,
            condition,
            step,
            body,
        };

        Ok(self.located(statement, start))
    }

    fn for_init(&mut self) -> Parse<ForInit> {
        match self.peek() {
            Token::Keyword(keyword) if type_of(*keyword).is_some() => {
                let of = self.typ()?;
                let name = self.id()?;
                let shape = self.shape()?;

                Ok(ForInit::Declaration(Declaration { of, name, shape }))
            }

            Token::Id(_) => Ok(ForInit::Assignment(self.assignment()?)),

            _ => {
                let found = self.next()?.into_inner();
                self.fail(ParserError::ExpectedForInit(found))
            }
        }
    }

    fn for_step(&mut self) -> Parse<ForStep> {
        match (self.peek(), self.peek_nth(1).as_ref()) {
            (Token::Increment | Token::Decrement, _)
            | (Token::Id(_), Token::Increment | Token::Decrement) => {
                let start = self.peek_nth(0).location().clone();
                let update = self.update()?;

                Ok(ForStep::Update(self.located(update, start)))
            }

            (Token::Id(_), _) => Ok(ForStep::Assignment(self.assignment()?)),

            _ => {
                let found = self.next()?.into_inner();
                self.fail(ParserError::ExpectedForStep(found))
            }
        }
    }

    fn write(&mut self) -> Parse<Located<Statement>> {
        let start = self.keyword(Keyword::Write)?;

        self.expect(Token::OpenParen)?;
        let value = self.expr()?;
        self.expect(Token::CloseParen)?;

        Ok(self.located(Statement::Write(value), start))
    }

    fn read(&mut self) -> Parse<Located<Statement>> {
        let start = self.keyword(Keyword::Read)?;

        self.expect(Token::OpenParen)?;
        let target = self.id()?;
        self.expect(Token::CloseParen)?;

        Ok(self.located(Statement::Read(target), start))
    }

    /// Un bloque es `inicio ... fim` o una única sentencia.
    fn block(&mut self) -> Parse<Vec<Located<Statement>>> {
        match self.peek() {
            Token::Keyword(Keyword::Begin) => {
                self.next()?;
                Ok(self.statement_list(true))
            }

            _ => Ok(vec![self.statement()?]),
        }
    }

    fn condition(&mut self) -> Parse<Located<Expr>> {
        self.expect(Token::OpenParen)?;
        let condition = self.expr()?;
        self.expect(Token::CloseParen)?;

        Ok(condition)
    }

    fn typ(&mut self) -> Parse<Located<Type>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Keyword(keyword) => match type_of(keyword) {
                Some(typ) => Ok(Located::at(typ, location)),
                None => self.fail(ParserError::ExpectedType(Token::Keyword(keyword))),
            },

            found => self.fail(ParserError::ExpectedType(found)),
        }
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        self.binary(Precedence::Or)
    }

    fn binary(&mut self, level: Precedence) -> Parse<Located<Expr>> {
        let operand = |this: &mut Self| match level.tighter() {
            Some(tighter) => this.binary(tighter),
            None => this.unary(),
        };

        let mut left = operand(self)?;
        while let Some(op) = level.operator(self.peek()) {
            self.next()?;
            let right = operand(self)?;

            let location = Location::span(left.location().clone(), right.location());
            left = Located::at(Expr::Binary(Box::new(left), op, Box::new(right)), location);
        }

        Ok(left)
    }

    fn unary(&mut self) -> Parse<Located<Expr>> {
        let start = self.peek_nth(0).location().clone();

        let op = match self.peek() {
            Token::Not => UnOp::Not,
            Token::Minus => UnOp::Negate,
            Token::Increment | Token::Decrement => {
                let update = self.update()?;
                return Ok(self.located(Expr::Update(update), start));
            }

            Token::Id(_) if matches!(self.peek_nth(1).as_ref(), Token::Increment | Token::Decrement) => {
                let update = self.update()?;
                return Ok(self.located(Expr::Update(update), start));
            }

            _ => return self.primary(),
        };

        self.next()?;
        let operand = self.unary()?;

        Ok(self.located(Expr::Unary(op, Box::new(operand)), start))
    }

    /// Forma prefija o postfija de `++`/`--`, siempre sobre un identificador.
    fn update(&mut self) -> Parse<Update> {
        let update_op = |token: &Token| match token {
            Token::Increment => Some(UpdateOp::Increment),
            Token::Decrement => Some(UpdateOp::Decrement),
            _ => None,
        };

        if let Some(op) = update_op(self.peek()) {
            self.next()?;
            let target = self.id()?;

            return Ok(Update {
                op,
                fixity: Fixity::Prefix,
                target,
            });
        }

        let target = self.id()?;
        let (location, token) = self.next()?.split();

        match update_op(&token) {
            Some(op) => Ok(Update {
                op,
                fixity: Fixity::Postfix,
                target,
            }),

            None => Err(Located::at(
                ParserError::UnexpectedToken(Token::Increment, token),
                location,
            )),
        }
    }

    fn primary(&mut self) -> Parse<Located<Expr>> {
        if let (Token::Id(_), Token::OpenParen) = (self.peek(), self.peek_nth(1).as_ref()) {
            let start = self.peek_nth(0).location().clone();
            let call = self.call()?;

            return Ok(self.located(Expr::Call(call), start));
        }

        let (location, token) = self.next()?.split();
        let expr = match token {
            Token::IntLiteral(integer) => Expr::Literal(Literal::Int(integer)),
            Token::FloatLiteral(float) => Expr::Literal(Literal::Float(float)),
            Token::StrLiteral(string) => Expr::Literal(Literal::Str(string)),
            Token::Keyword(Keyword::True) => Expr::Literal(Literal::Bool(true)),
            Token::Keyword(Keyword::False) => Expr::Literal(Literal::Bool(false)),
            Token::Id(id) => Expr::Variable(id),

            Token::OpenParen => {
                let inner = self.expr()?.into_inner();
                self.expect(Token::CloseParen)?;

                return Ok(self.located(inner, location));
            }

            found => return self.fail(ParserError::ExpectedExpr(found)),
        };

        Ok(Located::at(expr, location))
    }

    /// Descarta tokens hasta un punto donde pueda iniciar otra sentencia.
    fn synchronize(&mut self, start: usize) {
        // El token ofensor podría ser el inicio de la siguiente sentencia,
        // siempre que no sea el mismo que inició la sentencia fallida
        if self.position > start + 1 {
            self.position -= 1;
            if !self.at_statement_boundary() {
                self.position += 1;
            }
        }

        if self.position == start && !matches!(self.peek(), Token::End) {
            self.position += 1;
        }

        while !self.at_statement_boundary() {
            self.position += 1;
        }
    }

    fn at_statement_boundary(&self) -> bool {
        use Keyword::*;

        match self.peek() {
            Token::End => true,
            Token::Keyword(If | While | For | Write | Read | Int | Float | Bool | Str | End) => true,
            Token::Id(_) => matches!(
                self.peek_nth(1).as_ref(),
                Token::Assign | Token::OpenParen
            ),

            _ => false,
        }
    }

    fn comma_separated<T, F>(&mut self, mut rule: F, closing: Token) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = Vec::new();
        if *self.peek() == closing {
            return Ok(items);
        }

        loop {
            items.push(rule(self)?);
            match self.peek() {
                Token::Comma => {
                    self.next()?;
                }

                _ => break Ok(items),
            }
        }
    }

    fn located<T>(&self, value: T, start: Location) -> Located<T> {
        Located::at(value, Location::span(start, &self.last_known))
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            found => self.fail(ParserError::ExpectedId(found)),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<Location> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<Location> {
        let (location, found) = self.next()?.split();
        if found == token {
            Ok(location)
        } else {
            self.fail(ParserError::UnexpectedToken(token, found))
        }
    }

    fn peek(&self) -> &'a Token {
        self.peek_nth(0).as_ref()
    }

    fn peek_nth(&self, n: usize) -> &'a Located<Token> {
        self.tokens.get(self.position + n).unwrap_or(self.end)
    }

    /// Consume un token. El marcador de fin nunca se consume.
    fn next(&mut self) -> Parse<Located<Token>> {
        let token = self.peek_nth(0);
        if let Token::End = token.as_ref() {
            return Err(Located::at(
                ParserError::UnexpectedEof,
                token.location().clone(),
            ));
        }

        self.position += 1;
        self.last_known = token.location().clone();

        Ok(token.clone())
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.last_known.clone()))
    }
}

/// Tipo correspondiente a una palabra clave de tipo.
fn type_of(keyword: Keyword) -> Option<Type> {
    match keyword {
        Keyword::Int => Some(Type::Int),
        Keyword::Float => Some(Type::Float),
        Keyword::Bool => Some(Type::Bool),
        Keyword::Str => Some(Type::Str),
        _ => None,
    }
}
