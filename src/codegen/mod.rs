//! Generación de código.
//!
//! El objetivo es ensamblador MIPS en el dialecto del simulador MARS.
//! Se asume que el árbol ya fue validado por [`crate::semantic`]; los
//! tipos de las expresiones se recalculan aquí únicamente para escoger
//! instrucciones, nunca para reportar errores al usuario.
//!
//! # Almacenamiento
//! Cada declaración tiene su propia ubicación estática en `.data`,
//! nombrada a partir de su identificador (`var_x`, `var_x_1`, ...). Los
//! nombres se resuelven con la misma pila de ámbitos que usa el análisis
//! semántico, así que una variable que oculta a otra nunca comparte su
//! ubicación. No hay pila de ejecución, por lo que tampoco hay recursión.
//!
//! # Estructura de la salida
//! ```text
//! .data
//!     variables, en orden de declaración
//!     constantes y buffers
//! .text
//! main:
//!     sentencias de nivel superior
//!     salida del programa
//! user_<función>:
//!     ...
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Display},
    rc::Rc,
};

use thiserror::Error;
use tracing::trace;

use crate::{
    lex::Identifier,
    parse::{Assignment, Ast, Declaration, Expr, ForInit, ForStep, Function, Shape, Statement, Type},
    source::{Located, Location},
};

mod expr;
mod regs;

use expr::Value;
use regs::{Labels, Reg, Temporaries, MAX_ARGS};

/// Bytes reservados para cada cadena, incluyendo el terminador.
const STRING_CAPACITY: u32 = 256;

/// Tamaño de una palabra de máquina.
const WORD_SIZE: u32 = 4;

// Servicios de `syscall`
const PRINT_INT: u32 = 1;
const PRINT_FLOAT: u32 = 2;
const PRINT_STRING: u32 = 4;
const READ_INT: u32 = 5;
const READ_FLOAT: u32 = 6;
const READ_STRING: u32 = 8;
const EXIT: u32 = 10;
const PRINT_CHAR: u32 = 11;

/// Violación de una precondición del generador.
///
/// Un programa aceptado por el análisis semántico nunca produce
/// errores de nombres, pero sí puede exceder los límites de la
/// convención de llamadas.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("No storage was allocated for variable `{0}`")]
    UndefinedVariable(Identifier),

    #[error("No label was assigned to function `{0}`")]
    UndefinedFunction(Identifier),

    #[error("Call to `{0}` passes {1} arguments, at most {MAX_ARGS} are supported")]
    TooManyArguments(Identifier, usize),

    #[error("Function `{0}` declares {1} parameters, at most {MAX_ARGS} are supported")]
    TooManyParameters(Identifier, usize),
}

pub type Generate<T> = Result<T, Located<CodegenError>>;

/// Programa ensamblador completo, línea por línea.
#[derive(Debug)]
pub struct Assembly {
    lines: Vec<String>,
}

impl Assembly {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Display for Assembly {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(formatter, "{}", line)?;
        }

        Ok(())
    }
}

/// Genera código para un árbol semánticamente válido.
pub fn generate(ast: &Ast) -> Generate<Assembly> {
    let mut generator = Generator::default();
    generator.scoped(|this| this.statements(&ast.statements))?;

    Ok(generator.finish())
}

/// Ubicación estática de una variable.
#[derive(Clone)]
struct Slot {
    label: Rc<str>,
    of: Type,
}

/// Etiqueta y tipo de retorno de una función.
struct Routine {
    label: Rc<str>,
    returns: Type,
}

/// Sesión de generación. Contadores y tablas viven solo durante un
/// programa.
#[derive(Default)]
struct Generator {
    data: Vec<String>,
    constants: Vec<String>,
    output: Vec<String>,
    routines: Vec<String>,
    temps: Temporaries,
    labels: Labels,
    scopes: Vec<HashMap<Identifier, Slot>>,
    symbols: HashSet<Rc<str>>,
    functions: HashMap<Identifier, Routine>,
    strings: HashMap<Rc<str>, Rc<str>>,
    floats: HashMap<u64, Rc<str>>,
    buffers: u32,
}

impl Generator {
    fn finish(mut self) -> Assembly {
        emit!(self, "li", "{}, {}", Reg::V0, EXIT);
        emit!(self, "syscall");

        let mut lines = vec![String::from(".data")];
        lines.extend(self.data);
        lines.extend(self.constants);

        lines.push(String::new());
        lines.push(String::from(".text"));
        lines.push(String::from(".globl main"));
        lines.push(String::from("main:"));
        lines.extend(self.output);
        lines.extend(self.routines);

        Assembly { lines }
    }

    fn statements(&mut self, statements: &[Located<Statement>]) -> Generate<()> {
        for statement in statements {
            self.statement(statement)?;
        }

        Ok(())
    }

    fn statement(&mut self, statement: &Located<Statement>) -> Generate<()> {
        match statement.as_ref() {
            Statement::Declaration(declaration) => self.declaration(declaration),
            Statement::Function(function) => self.function(function),
            Statement::Assignment(assignment) => self.assignment(assignment),

            Statement::If {
                condition,
                body,
                otherwise,
            } => {
                let condition = self.expr(condition)?;
                let otherwise_label = self.labels.next();
                let end = self.labels.next();

                emit!(self, "beq", "{}, {}, {}", condition.reg, Reg::Zero, otherwise_label);
                self.scoped(|this| this.statements(body))?;
                emit!(self, "j", "{}", end);

                self.label(&otherwise_label);
                if let Some(otherwise) = otherwise {
                    self.scoped(|this| this.statements(otherwise))?;
                }

                self.label(&end);
                Ok(())
            }

            Statement::While { condition, body } => {
                let start = self.labels.next();
                let end = self.labels.next();

                self.label(&start);
                let condition = self.expr(condition)?;
                emit!(self, "beq", "{}, {}, {}", condition.reg, Reg::Zero, end);

                self.scoped(|this| this.statements(body))?;
                emit!(self, "j", "{}", start);

                self.label(&end);
                Ok(())
            }

            // Encabezado y cuerpo comparten un mismo ámbito
            Statement::For {
                init,
                condition,
                step,
                body,
            } => self.scoped(|this| {
                match init {
                    Some(ForInit::Declaration(declaration)) => this.declaration(declaration)?,
                    Some(ForInit::Assignment(assignment)) => this.assignment(assignment)?,
                    None => (),
                }

                let start = this.labels.next();
                let step_label = this.labels.next();
                let end = this.labels.next();

                // Sin condición, el ciclo no termina por sí mismo
                this.label(&start);
                if let Some(condition) = condition {
                    let condition = this.expr(condition)?;
                    emit!(this, "beq", "{}, {}, {}", condition.reg, Reg::Zero, end);
                }

                this.statements(body)?;

                this.label(&step_label);
                match step {
                    Some(ForStep::Assignment(assignment)) => this.assignment(assignment)?,
                    Some(ForStep::Update(update)) => {
                        this.update(update.as_ref())?;
                    }

                    None => (),
                }

                emit!(this, "j", "{}", start);
                this.label(&end);

                Ok(())
            }),

            Statement::Write(value) => self.write(value),
            Statement::Read(target) => self.read(target),
            Statement::Call(call) => self.call(call).map(|_| ()),
        }
    }

    fn declaration(&mut self, declaration: &Declaration) -> Generate<()> {
        let length = match &declaration.shape {
            Shape::Array(length) => Some(*length.val()),
            Shape::Scalar(_) => None,
        };

        let slot = self.allocate(declaration.name.val(), *declaration.of.val(), length);
        if let Shape::Scalar(Some(initializer)) = &declaration.shape {
            let value = self.expr(initializer)?;
            self.store(&slot, value);
        }

        Ok(())
    }

    fn assignment(&mut self, assignment: &Assignment) -> Generate<()> {
        let value = self.expr(&assignment.value)?;

        let target = &assignment.target;
        let slot = self.slot(target.as_ref(), target.location())?;
        self.store(&slot, value);

        Ok(())
    }

    /// Cada función es una rutina aparte, emitida después de `main`.
    fn function(&mut self, function: &Function) -> Generate<()> {
        let name = function.name.val();
        if function.parameters.len() > MAX_ARGS {
            let error = CodegenError::TooManyParameters(name.clone(), function.parameters.len());
            return Err(Located::at(error, function.name.location().clone()));
        }

        // Solo la primera declaración recibe código
        if self.functions.contains_key(name) {
            return Ok(());
        }

        trace!("lowering function `{}`", name);

        let label: Rc<str> = Rc::from(mangle("user_", name));
        let routine = Routine {
            label: Rc::clone(&label),
            returns: *function.returns.val(),
        };

        self.functions.insert(name.clone(), routine);

        // Dirección de retorno, para que la rutina pueda llamar a otras
        let return_slot = format!("{}_ra", label);
        self.data.push(format!("{}: .word 0", return_slot));

        let outer = std::mem::take(&mut self.output);
        let result = self.scoped(|this| this.routine(function, &label, &return_slot));
        let body = std::mem::replace(&mut self.output, outer);

        result?;

        self.routines.push(String::new());
        self.routines.extend(body);

        Ok(())
    }

    fn routine(&mut self, function: &Function, label: &str, return_slot: &str) -> Generate<()> {
        self.label(label);
        emit!(self, "sw", "{}, {}", Reg::Ra, return_slot);

        for (parameter, arg) in function.parameters.iter().zip(Reg::argument_sequence()) {
            let slot = self.allocate(parameter.name.val(), *parameter.of.val(), None);
            match slot.of {
                Type::Str => self.copy_string(arg, &slot.label),
                _ => emit!(self, "sw", "{}, {}", arg, slot.label),
            }
        }

        self.statements(&function.body)?;

        emit!(self, "lw", "{}, {}", Reg::Ra, return_slot);
        emit!(self, "jr", "{}", Reg::Ra);

        Ok(())
    }

    /// `escreva` escoge el servicio según el tipo y termina con salto de línea.
    fn write(&mut self, value: &Located<Expr>) -> Generate<()> {
        let value = self.expr(value)?;
        match value.of {
            Type::Float => {
                emit!(self, "li", "{}, {}", Reg::V0, PRINT_FLOAT);
                emit!(self, "mov.s", "{}, {}", Reg::FLOAT_ARG, value.reg);
            }

            Type::Str => {
                emit!(self, "li", "{}, {}", Reg::V0, PRINT_STRING);
                emit!(self, "move", "{}, {}", Reg::Arg(0), value.reg);
            }

            Type::Int | Type::Bool => {
                emit!(self, "li", "{}, {}", Reg::V0, PRINT_INT);
                emit!(self, "move", "{}, {}", Reg::Arg(0), value.reg);
            }
        }

        emit!(self, "syscall");

        emit!(self, "li", "{}, {}", Reg::V0, PRINT_CHAR);
        emit!(self, "li", "{}, {}", Reg::Arg(0), u32::from(b'\n'));
        emit!(self, "syscall");

        Ok(())
    }

    fn read(&mut self, target: &Located<Identifier>) -> Generate<()> {
        let slot = self.slot(target.as_ref(), target.location())?;
        match slot.of {
            Type::Float => {
                emit!(self, "li", "{}, {}", Reg::V0, READ_FLOAT);
                emit!(self, "syscall");
                emit!(self, "s.s", "{}, {}", Reg::FLOAT_RESULT, slot.label);
            }

            Type::Str => {
                emit!(self, "li", "{}, {}", Reg::V0, READ_STRING);
                emit!(self, "la", "{}, {}", Reg::Arg(0), slot.label);
                emit!(self, "li", "{}, {}", Reg::Arg(1), STRING_CAPACITY);
                emit!(self, "syscall");
            }

            Type::Int | Type::Bool => {
                emit!(self, "li", "{}, {}", Reg::V0, READ_INT);
                emit!(self, "syscall");
                emit!(self, "sw", "{}, {}", Reg::V0, slot.label);
            }
        }

        Ok(())
    }

    /// Copia un valor a la ubicación de una variable.
    fn store(&mut self, slot: &Slot, value: Value) {
        match slot.of {
            Type::Str => self.copy_string(value.reg, &slot.label),
            Type::Float => {
                let reg = self.promote(value);
                emit!(self, "s.s", "{}, {}", reg, slot.label);
            }

            Type::Int | Type::Bool => emit!(self, "sw", "{}, {}", value.reg, slot.label),
        }
    }

    /// Reserva una ubicación nueva para una declaración y la asocia
    /// al nombre en el ámbito actual.
    fn allocate(&mut self, name: &Identifier, of: Type, length: Option<u32>) -> Slot {
        let element_size = match of {
            Type::Str => STRING_CAPACITY,
            Type::Int | Type::Bool | Type::Float => WORD_SIZE,
        };

        let directive = match (of, length) {
            (_, Some(length)) => format!(".space {}", length.saturating_mul(element_size)),
            (Type::Int | Type::Bool, None) => String::from(".word 0"),
            (Type::Float, None) => String::from(".float 0.0"),
            (Type::Str, None) => format!(".space {}", STRING_CAPACITY),
        };

        let base = mangle("var_", name);
        let mut label = base.clone();
        let mut suffix = 0;

        while self.symbols.contains(label.as_str()) {
            suffix += 1;
            label = format!("{}_{}", base, suffix);
        }

        let label: Rc<str> = Rc::from(label);
        self.symbols.insert(Rc::clone(&label));
        self.data.push(format!("{}: {}", label, directive));

        let slot = Slot { label, of };
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.clone(), slot.clone());
        }

        slot
    }

    fn slot(&self, name: &Identifier, location: &Location) -> Generate<Slot> {
        let slot = self.scopes.iter().rev().find_map(|scope| scope.get(name));
        slot.cloned().ok_or_else(|| {
            Located::at(
                CodegenError::UndefinedVariable(name.clone()),
                location.clone(),
            )
        })
    }

    fn scoped<F, R>(&mut self, callback: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.scopes.push(HashMap::new());
        let result = callback(self);
        self.scopes.pop();

        result
    }

    fn label(&mut self, label: &str) {
        self.line(format!("{}:", label));
    }

    fn line(&mut self, line: String) {
        self.output.push(line);
    }
}

/// Nombre de símbolo en ensamblador para un identificador.
///
/// Los identificadores pueden contener letras no ASCII, que el
/// ensamblador no acepta en etiquetas.
fn mangle(prefix: &str, name: &Identifier) -> String {
    let name = name.as_ref();

    let mut mangled = String::from(prefix);
    mangled.reserve(name.len());

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            mangled.push(c);
        } else {
            mangled.push_str(&format!("_u{:x}_", c as u32));
        }
    }

    mangled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, parse, semantic, source};

    fn parse_str(code: &str) -> Ast {
        let (start, stream) = source::consume(code.as_bytes(), "<test>");
        let tokens = Lexer::new(start, stream).try_exhaustive().unwrap();
        let (ast, errors) = parse::parse(&tokens);
        assert!(errors.is_empty(), "syntax errors: {:?}", errors);

        ast
    }

    /// Compila y normaliza espacios, una instrucción o directiva por línea.
    fn compile(code: &str) -> Vec<String> {
        let ast = parse_str(code);
        let errors = semantic::analyze(&ast);
        assert!(errors.is_empty(), "semantic errors: {:?}", errors);

        let assembly = generate(&ast).unwrap();
        assembly
            .lines()
            .iter()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn position(lines: &[String], line: &str) -> usize {
        lines
            .iter()
            .position(|candidate| candidate == line)
            .unwrap_or_else(|| panic!("`{}` not found in {:#?}", line, lines))
    }

    fn assert_sequence(lines: &[String], sequence: &[&str]) {
        let found = lines
            .windows(sequence.len())
            .any(|window| window.iter().zip(sequence).all(|(line, expected)| line == expected));

        assert!(found, "{:#?} not found in {:#?}", sequence, lines);
    }

    fn count(lines: &[String], predicate: impl Fn(&str) -> bool) -> usize {
        lines.iter().filter(|line| predicate(line)).count()
    }

    fn is_label(line: &str) -> bool {
        line.starts_with('L') && line.ends_with(':')
    }

    #[test]
    fn store_and_print_integer() {
        let lines = compile("inteiro x = 10 escreva(x)");

        assert_eq!(lines[0], ".data");
        assert_eq!(lines[1], "var_x: .word 0");
        assert_sequence(
            &lines,
            &[
                "main:",
                "li $t0, 10",
                "sw $t0, var_x",
                "lw $t1, var_x",
                "li $v0, 1",
                "move $a0, $t1",
                "syscall",
                "li $v0, 11",
                "li $a0, 10",
                "syscall",
                "li $v0, 10",
                "syscall",
            ],
        );
    }

    #[test]
    fn if_else_layout() {
        let lines = compile(
            "inteiro x = 20
             inteiro y = 1
             se (x > 15 e y != 0) faca escreva(\"Maior\") senao escreva(\"Menor\")",
        );

        assert_eq!(count(&lines, |line| line.starts_with("beq ")), 1);
        assert_eq!(count(&lines, |line| line.starts_with("j ")), 1);
        assert_eq!(count(&lines, is_label), 2);

        assert_sequence(
            &lines,
            &[
                "lw $t2, var_x",
                "li $t3, 15",
                "slt $t4, $t3, $t2",
                "lw $t5, var_y",
                "li $t6, 0",
                "sne $t7, $t5, $t6",
                "and $t8, $t4, $t7",
                "beq $t8, $zero, L0",
            ],
        );

        let otherwise = position(&lines, "L0:");
        let end = position(&lines, "L1:");
        assert_eq!(lines[otherwise - 1], "j L1");
        assert!(otherwise < end);

        assert!(lines.contains(&String::from("str_0: .asciiz \"Maior\"")));
        assert!(lines.contains(&String::from("str_1: .asciiz \"Menor\"")));
    }

    #[test]
    fn function_and_call() {
        let lines = compile(
            "inteiro soma(inteiro a, inteiro b) inicio escreva(a + b) fim
             soma(5, 7)",
        );

        assert_sequence(
            &lines,
            &[
                "user_soma:",
                "sw $ra, user_soma_ra",
                "sw $a0, var_a",
                "sw $a1, var_b",
            ],
        );

        assert_sequence(
            &lines,
            &[
                "li $t3, 5",
                "li $t4, 7",
                "move $a0, $t3",
                "move $a1, $t4",
                "jal user_soma",
                "move $t5, $v0",
            ],
        );

        assert_sequence(&lines, &["lw $ra, user_soma_ra", "jr $ra"]);

        // Las rutinas se emiten después de la salida de `main`
        assert!(position(&lines, "main:") < position(&lines, "user_soma:"));
        assert!(position(&lines, "jal user_soma") < position(&lines, "user_soma:"));
        assert!(lines.contains(&String::from("user_soma_ra: .word 0")));
    }

    #[test]
    fn while_layout() {
        let lines = compile("inteiro i = 3 enquanto (i > 0) faca i = i - 1");

        assert_sequence(
            &lines,
            &[
                "L0:",
                "lw $t1, var_i",
                "li $t2, 0",
                "slt $t3, $t2, $t1",
                "beq $t3, $zero, L1",
                "lw $t4, var_i",
                "li $t5, 1",
                "sub $t6, $t4, $t5",
                "sw $t6, var_i",
                "j L0",
                "L1:",
            ],
        );
    }

    #[test]
    fn for_layout() {
        let lines = compile("para (inteiro i = 0; i <= 9; i++) faca escreva(i)");

        assert_sequence(
            &lines,
            &[
                "li $t0, 0",
                "sw $t0, var_i",
                "L0:",
                "lw $t1, var_i",
                "li $t2, 9",
                "slt $t3, $t2, $t1",
                "xori $t3, $t3, 1",
                "beq $t3, $zero, L2",
            ],
        );

        assert_sequence(
            &lines,
            &[
                "L1:",
                "lw $t5, var_i",
                "addi $t5, $t5, 1",
                "sw $t5, var_i",
                "j L0",
                "L2:",
            ],
        );
    }

    #[test]
    fn for_without_clauses() {
        let lines = compile("para (; ; ) faca escreva(1)");

        assert_eq!(count(&lines, |line| line.starts_with("beq ")), 0);
        assert_sequence(&lines, &["L1:", "j L0", "L2:"]);
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let lines = compile("flutuante f = 1 + 2.5 escreva(f)");

        assert!(lines.contains(&String::from("var_f: .float 0.0")));
        assert!(lines.contains(&String::from("flt_0: .float 2.5")));
        assert_sequence(
            &lines,
            &[
                "li $t0, 1",
                "l.s $f4, flt_0",
                "mtc1 $t0, $f5",
                "cvt.s.w $f5, $f5",
                "add.s $f6, $f5, $f4",
                "s.s $f6, var_f",
            ],
        );

        assert_sequence(&lines, &["l.s $f7, var_f", "li $v0, 2", "mov.s $f12, $f7", "syscall"]);
    }

    #[test]
    fn float_comparison() {
        let lines = compile("flutuante f = 0.5 escreva(f >= 1.5)");

        assert_sequence(
            &lines,
            &[
                "li $t0, 0",
                "li $t1, 1",
                "c.le.s $f6, $f5",
                "movt $t0, $t1",
                "li $v0, 1",
            ],
        );
    }

    #[test]
    fn strings() {
        let lines = compile(
            "cadeia nome = \"Ana\"
             cadeia saudacao = \"Oi, \" && nome
             escreva(saudacao)
             escreva(nome == \"Ana\")
             leia(nome)",
        );

        assert!(lines.contains(&String::from("var_nome: .space 256")));
        assert!(lines.contains(&String::from("var_saudacao: .space 256")));
        assert!(lines.contains(&String::from("concat_0: .space 256")));

        // Los literales repetidos se reutilizan
        assert_eq!(count(&lines, |line| line.ends_with(".asciiz \"Ana\"")), 1);

        // Asignación: copia byte a byte hacia la variable
        assert_sequence(
            &lines,
            &["la $t0, str_0", "la $t1, var_nome", "L0:", "lb $t2, 0($t0)", "sb $t2, 0($t1)"],
        );

        assert_sequence(
            &lines,
            &["la $t5, concat_0", "move $t6, $t5", "L1:", "lb $t7, 0($t3)", "beq $t7, $zero, L2"],
        );

        assert_sequence(&lines, &["la $t0, var_saudacao", "li $v0, 4", "move $a0, $t0", "syscall"]);

        assert_sequence(
            &lines,
            &[
                "L4:",
                "lb $t3, 0($t1)",
                "lb $t4, 0($t2)",
                "sub $t5, $t3, $t4",
                "bne $t5, $zero, L5",
                "beq $t3, $zero, L5",
            ],
        );

        assert_sequence(&lines, &["L5:", "seq $t6, $t5, $zero", "li $v0, 1", "move $a0, $t6"]);
        assert_sequence(
            &lines,
            &["li $v0, 8", "la $a0, var_nome", "li $a1, 256", "syscall"],
        );
    }

    #[test]
    fn read_by_type() {
        let lines = compile("inteiro n flutuante f leia(n) leia(f)");

        assert_sequence(&lines, &["li $v0, 5", "syscall", "sw $v0, var_n"]);
        assert_sequence(&lines, &["li $v0, 6", "syscall", "s.s $f0, var_f"]);
    }

    #[test]
    fn unary_and_updates() {
        let lines = compile(
            "inteiro i = 1
             logico b = !verdadeiro
             escreva(-i)
             escreva(--i)",
        );

        assert_sequence(&lines, &["li $t1, 1", "xori $t2, $t1, 1", "sw $t2, var_b"]);
        assert_sequence(&lines, &["lw $t3, var_i", "sub $t4, $zero, $t3"]);
        assert_sequence(
            &lines,
            &["lw $t5, var_i", "addi $t5, $t5, -1", "sw $t5, var_i", "li $v0, 1", "move $a0, $t5"],
        );
    }

    #[test]
    fn nested_calls_save_return_address() {
        let lines = compile(
            "inteiro f() escreva(1)
             inteiro g() f()
             g()",
        );

        assert_sequence(&lines, &["user_g:", "sw $ra, user_g_ra", "jal user_f"]);
        assert_sequence(&lines, &["lw $ra, user_g_ra", "jr $ra"]);
    }

    #[test]
    fn sibling_blocks_get_separate_storage() {
        let lines = compile(
            "se (verdadeiro) faca inicio inteiro x = 1 fim
             senao inicio inteiro x = 2 fim",
        );

        assert!(lines.contains(&String::from("var_x: .word 0")));
        assert!(lines.contains(&String::from("var_x_1: .word 0")));
        assert_sequence(&lines, &["li $t1, 1", "sw $t1, var_x"]);
        assert_sequence(&lines, &["li $t2, 2", "sw $t2, var_x_1"]);
    }

    #[test]
    fn shadowing_with_another_type() {
        let lines = compile(
            "inteiro x = 1
             se (verdadeiro) faca inicio
                 flutuante x = 1.5
                 escreva(x)
             fim
             escreva(x)",
        );

        assert!(lines.contains(&String::from("var_x: .word 0")));
        assert!(lines.contains(&String::from("var_x_1: .float 0.0")));

        // El bloque usa su propia variable flotante
        assert_sequence(
            &lines,
            &["l.s $f4, flt_0", "s.s $f4, var_x_1", "l.s $f5, var_x_1", "li $v0, 2"],
        );

        // Al salir del bloque, `x` vuelve a ser el entero
        assert_sequence(&lines, &["lw $t2, var_x", "li $v0, 1", "move $a0, $t2"]);
        assert_eq!(count(&lines, |line| line.starts_with("sw $f")), 0);
    }

    #[test]
    fn parameters_of_different_functions() {
        let lines = compile(
            "inteiro f(inteiro a) escreva(a)
             cadeia g(cadeia a) escreva(a)
             g(\"ola mundo\")",
        );

        assert!(lines.contains(&String::from("var_a: .word 0")));
        assert!(lines.contains(&String::from("var_a_1: .space 256")));

        // La cadena se copia a su buffer y se imprime como cadena
        assert_sequence(&lines, &["user_g:", "sw $ra, user_g_ra", "la $t1, var_a_1"]);
        assert_sequence(&lines, &["la $t3, var_a_1", "li $v0, 4", "move $a0, $t3"]);
        assert_eq!(count(&lines, |line| line == "sw $a0, var_a_1"), 0);
    }

    #[test]
    fn generated_names_do_not_collide() {
        let lines = compile(
            "inteiro x_1 = 1
             se (verdadeiro) faca inteiro x = 2
             senao inteiro x = 3",
        );

        assert!(lines.contains(&String::from("var_x_1: .word 0")));
        assert!(lines.contains(&String::from("var_x: .word 0")));
        assert!(lines.contains(&String::from("var_x_2: .word 0")));
    }

    #[test]
    fn non_ascii_identifiers_are_mangled() {
        let lines = compile("inteiro ação = 1");
        assert!(lines.contains(&String::from("var_a_ue7__ue3_o: .word 0")));
    }

    #[test]
    fn too_many_arguments() {
        let ast = parse_str(
            "inteiro f(inteiro a, inteiro b, inteiro c, inteiro d, inteiro q) escreva(a)",
        );

        let error = generate(&ast).unwrap_err();
        assert!(matches!(error.val(), CodegenError::TooManyParameters(_, 5)));
    }

    #[test]
    fn unresolved_names_are_internal_errors() {
        let ast = parse_str("escreva(z)");

        let error = generate(&ast).unwrap_err();
        assert!(matches!(error.val(), CodegenError::UndefinedVariable(_)));
        assert_eq!((error.line(), error.column()), (1, 9));
    }
}
