//! Evaluación de expresiones.
//!
//! Cada expresión deja su resultado en exactamente un temporal. Los
//! valores enteros, lógicos y las direcciones de cadenas viven en
//! temporales `$t`; los flotantes en temporales `$f`.

use std::rc::Rc;

use super::{CodegenError, Generate, Generator, STRING_CAPACITY};
use crate::{
    parse::{BinOp, Call, Expr, Literal, Type, UnOp, Update, UpdateOp},
    source::Located,
};

use super::regs::{Reg, MAX_ARGS};

/// Resultado de evaluar una expresión.
#[derive(Copy, Clone)]
pub struct Value {
    pub reg: Reg,
    pub of: Type,
}

impl Generator {
    pub(super) fn expr(&mut self, expr: &Located<Expr>) -> Generate<Value> {
        match expr.as_ref() {
            Expr::Literal(literal) => Ok(self.literal(literal)),
            Expr::Variable(name) => {
                let slot = self.slot(name, expr.location())?;
                let reg = match slot.of {
                    Type::Float => {
                        let reg = self.temps.float();
                        emit!(self, "l.s", "{}, {}", reg, slot.label);
                        reg
                    }

                    Type::Str => {
                        let reg = self.temps.word();
                        emit!(self, "la", "{}, {}", reg, slot.label);
                        reg
                    }

                    Type::Int | Type::Bool => {
                        let reg = self.temps.word();
                        emit!(self, "lw", "{}, {}", reg, slot.label);
                        reg
                    }
                };

                Ok(Value { reg, of: slot.of })
            }

            Expr::Call(call) => self.call(call),
            Expr::Update(update) => self.update(update),

            Expr::Binary(left, op, right) => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;

                let value = match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                        self.arithmetic(*op, left, right)
                    }

                    BinOp::And | BinOp::Or => {
                        let opcode = if *op == BinOp::And { "and" } else { "or" };
                        let reg = self.temps.word();
                        emit!(self, opcode, "{}, {}, {}", reg, left.reg, right.reg);

                        Value {
                            reg,
                            of: Type::Bool,
                        }
                    }

                    BinOp::Concat => self.concat(left.reg, right.reg),
                    _ => self.compare(*op, left, right),
                };

                Ok(value)
            }

            Expr::Unary(op, operand) => {
                let operand = self.expr(operand)?;
                let value = match (op, operand.of) {
                    (UnOp::Negate, Type::Float) => {
                        let reg = self.temps.float();
                        emit!(self, "neg.s", "{}, {}", reg, operand.reg);
                        Value { reg, of: Type::Float }
                    }

                    (UnOp::Negate, of) => {
                        let reg = self.temps.word();
                        emit!(self, "sub", "{}, {}, {}", reg, Reg::Zero, operand.reg);
                        Value { reg, of }
                    }

                    (UnOp::Not, _) => {
                        let reg = self.temps.word();
                        emit!(self, "xori", "{}, {}, 1", reg, operand.reg);
                        Value { reg, of: Type::Bool }
                    }
                };

                Ok(value)
            }
        }
    }

    /// Incremento o decremento en memoria. Ambas formas producen el
    /// valor ya actualizado.
    pub(super) fn update(&mut self, update: &Update) -> Generate<Value> {
        let target = &update.target;
        let slot = self.slot(target.as_ref(), target.location())?;

        let delta = match update.op {
            UpdateOp::Increment => 1,
            UpdateOp::Decrement => -1,
        };

        let reg = self.temps.word();
        emit!(self, "lw", "{}, {}", reg, slot.label);
        emit!(self, "addi", "{}, {}, {}", reg, reg, delta);
        emit!(self, "sw", "{}, {}", reg, slot.label);

        Ok(Value { reg, of: Type::Int })
    }

    /// Llamada a función: argumentos a `$a0..$a3`, resultado desde `$v0`.
    pub(super) fn call(&mut self, call: &Call) -> Generate<Value> {
        let name = call.function.val();
        let location = call.function.location();

        if call.args.len() > MAX_ARGS {
            let error = CodegenError::TooManyArguments(name.clone(), call.args.len());
            return Err(Located::at(error, location.clone()));
        }

        let (label, returns) = match self.functions.get(name) {
            Some(routine) => (Rc::clone(&routine.label), routine.returns),
            None => {
                let error = CodegenError::UndefinedFunction(name.clone());
                return Err(Located::at(error, location.clone()));
            }
        };

        let args = call
            .args
            .iter()
            .map(|arg| self.expr(arg))
            .collect::<Generate<Vec<_>>>()?;

        for (arg, reg) in args.iter().zip(Reg::argument_sequence()) {
            match arg.of {
                Type::Float => emit!(self, "mfc1", "{}, {}", reg, arg.reg),
                _ => emit!(self, "move", "{}, {}", reg, arg.reg),
            }
        }

        emit!(self, "jal", "{}", label);

        let reg = match returns {
            Type::Float => {
                let reg = self.temps.float();
                emit!(self, "mtc1", "{}, {}", Reg::V0, reg);
                reg
            }

            _ => {
                let reg = self.temps.word();
                emit!(self, "move", "{}, {}", reg, Reg::V0);
                reg
            }
        };

        Ok(Value { reg, of: returns })
    }

    /// Copia una cadena terminada en cero a una ubicación estática.
    pub(super) fn copy_string(&mut self, source: Reg, destination: &str) {
        let target = self.temps.word();
        let byte = self.temps.word();
        let copy = self.labels.next();

        emit!(self, "la", "{}, {}", target, destination);
        self.label(&copy);
        emit!(self, "lb", "{}, 0({})", byte, source);
        emit!(self, "sb", "{}, 0({})", byte, target);
        emit!(self, "addi", "{}, {}, 1", source, source);
        emit!(self, "addi", "{}, {}, 1", target, target);
        emit!(self, "bne", "{}, {}, {}", byte, Reg::Zero, copy);
    }

    /// Convierte un valor a flotante si todavía no lo es.
    pub(super) fn promote(&mut self, value: Value) -> Reg {
        if value.of == Type::Float {
            return value.reg;
        }

        let reg = self.temps.float();
        emit!(self, "mtc1", "{}, {}", value.reg, reg);
        emit!(self, "cvt.s.w", "{}, {}", reg, reg);

        reg
    }

    fn literal(&mut self, literal: &Literal) -> Value {
        match literal {
            Literal::Int(integer) => {
                let reg = self.temps.word();
                emit!(self, "li", "{}, {}", reg, integer);
                Value { reg, of: Type::Int }
            }

            Literal::Bool(boolean) => {
                let reg = self.temps.word();
                emit!(self, "li", "{}, {}", reg, i32::from(*boolean));
                Value { reg, of: Type::Bool }
            }

            Literal::Float(float) => {
                let label = self.intern_float(*float);
                let reg = self.temps.float();
                emit!(self, "l.s", "{}, {}", reg, label);
                Value { reg, of: Type::Float }
            }

            Literal::Str(string) => {
                let label = self.intern_string(string);
                let reg = self.temps.word();
                emit!(self, "la", "{}, {}", reg, label);
                Value { reg, of: Type::Str }
            }
        }
    }

    fn arithmetic(&mut self, op: BinOp, left: Value, right: Value) -> Value {
        let opcode = match op {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            _ => "div",
        };

        if left.of == Type::Float || right.of == Type::Float {
            let left = self.promote(left);
            let right = self.promote(right);

            let reg = self.temps.float();
            emit!(self, format!("{}.s", opcode), "{}, {}, {}", reg, left, right);

            Value { reg, of: Type::Float }
        } else {
            let reg = self.temps.word();
            emit!(self, opcode, "{}, {}, {}", reg, left.reg, right.reg);

            Value { reg, of: Type::Int }
        }
    }

    fn compare(&mut self, op: BinOp, left: Value, right: Value) -> Value {
        if left.of == Type::Str && right.of == Type::Str {
            let difference = self.compare_strings(left.reg, right.reg);
            return self.compare_words(op, difference, Reg::Zero);
        }

        if left.of == Type::Float || right.of == Type::Float {
            return self.compare_floats(op, left, right);
        }

        self.compare_words(op, left.reg, right.reg)
    }

    /// `slt` con operandos invertidos y `xori 1` cubre las cuatro relaciones.
    fn compare_words(&mut self, op: BinOp, left: Reg, right: Reg) -> Value {
        let reg = self.temps.word();
        let of = Type::Bool;

        let (opcode, first, second, negate) = match op {
            BinOp::Less => ("slt", left, right, false),
            BinOp::Greater => ("slt", right, left, false),
            BinOp::GreaterOrEqual => ("slt", left, right, true),
            BinOp::LessOrEqual => ("slt", right, left, true),
            BinOp::Equal => ("seq", left, right, false),
            _ => ("sne", left, right, false),
        };

        emit!(self, opcode, "{}, {}, {}", reg, first, second);
        if negate {
            emit!(self, "xori", "{}, {}, 1", reg, reg);
        }

        Value { reg, of }
    }

    fn compare_floats(&mut self, op: BinOp, left: Value, right: Value) -> Value {
        let left = self.promote(left);
        let right = self.promote(right);

        let (opcode, first, second, select) = match op {
            BinOp::Less => ("c.lt.s", left, right, "movt"),
            BinOp::Greater => ("c.lt.s", right, left, "movt"),
            BinOp::LessOrEqual => ("c.le.s", left, right, "movt"),
            BinOp::GreaterOrEqual => ("c.le.s", right, left, "movt"),
            BinOp::Equal => ("c.eq.s", left, right, "movt"),
            _ => ("c.eq.s", left, right, "movf"),
        };

        let reg = self.temps.word();
        let one = self.temps.word();

        emit!(self, "li", "{}, 0", reg);
        emit!(self, "li", "{}, 1", one);
        emit!(self, opcode, "{}, {}", first, second);
        emit!(self, select, "{}, {}", reg, one);

        Value {
            reg,
            of: Type::Bool,
        }
    }

    /// Diferencia del primer byte distinto entre dos cadenas, o cero.
    fn compare_strings(&mut self, left: Reg, right: Reg) -> Reg {
        let left_byte = self.temps.word();
        let right_byte = self.temps.word();
        let difference = self.temps.word();

        let compare = self.labels.next();
        let done = self.labels.next();

        self.label(&compare);
        emit!(self, "lb", "{}, 0({})", left_byte, left);
        emit!(self, "lb", "{}, 0({})", right_byte, right);
        emit!(self, "sub", "{}, {}, {}", difference, left_byte, right_byte);
        emit!(self, "bne", "{}, {}, {}", difference, Reg::Zero, done);
        emit!(self, "beq", "{}, {}, {}", left_byte, Reg::Zero, done);
        emit!(self, "addi", "{}, {}, 1", left, left);
        emit!(self, "addi", "{}, {}, 1", right, right);
        emit!(self, "j", "{}", compare);
        self.label(&done);

        difference
    }

    /// Concatenación en un buffer propio de cada sitio de uso.
    fn concat(&mut self, left: Reg, right: Reg) -> Value {
        let buffer = format!("concat_{}", self.buffers);
        self.buffers += 1;
        self.constants
            .push(format!("{}: .space {}", buffer, STRING_CAPACITY));

        let reg = self.temps.word();
        let target = self.temps.word();
        let byte = self.temps.word();

        let first = self.labels.next();
        let second = self.labels.next();

        emit!(self, "la", "{}, {}", reg, buffer);
        emit!(self, "move", "{}, {}", target, reg);

        // El terminador de la primera cadena no se copia
        self.label(&first);
        emit!(self, "lb", "{}, 0({})", byte, left);
        emit!(self, "beq", "{}, {}, {}", byte, Reg::Zero, second);
        emit!(self, "sb", "{}, 0({})", byte, target);
        emit!(self, "addi", "{}, {}, 1", left, left);
        emit!(self, "addi", "{}, {}, 1", target, target);
        emit!(self, "j", "{}", first);

        self.label(&second);
        emit!(self, "lb", "{}, 0({})", byte, right);
        emit!(self, "sb", "{}, 0({})", byte, target);
        emit!(self, "addi", "{}, {}, 1", right, right);
        emit!(self, "addi", "{}, {}, 1", target, target);
        emit!(self, "bne", "{}, {}, {}", byte, Reg::Zero, second);

        Value { reg, of: Type::Str }
    }

    fn intern_string(&mut self, string: &Rc<str>) -> Rc<str> {
        if let Some(label) = self.strings.get(string) {
            return Rc::clone(label);
        }

        let label: Rc<str> = Rc::from(format!("str_{}", self.strings.len()));
        self.constants
            .push(format!("{}: .asciiz \"{}\"", label, escape(string)));

        self.strings.insert(Rc::clone(string), Rc::clone(&label));
        label
    }

    fn intern_float(&mut self, float: f64) -> Rc<str> {
        if let Some(label) = self.floats.get(&float.to_bits()) {
            return Rc::clone(label);
        }

        let label: Rc<str> = Rc::from(format!("flt_{}", self.floats.len()));
        self.constants
            .push(format!("{}: .float {:?}", label, float));

        self.floats.insert(float.to_bits(), Rc::clone(&label));
        label
    }
}

/// Reintroduce secuencias de escape para `.asciiz`.
fn escape(string: &str) -> String {
    let mut escaped = String::with_capacity(string.len());
    for c in string.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(c),
        }
    }

    escaped
}
