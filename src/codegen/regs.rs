//! Registros y recursos de nombres para la generación de código.
//!
//! No hay análisis de vida de temporales: cada expresión toma el
//! siguiente registro disponible de su banco y los bancos se reutilizan
//! de forma circular.

use std::fmt;

/// Cantidad de temporales enteros (`$t0` a `$t9`).
const WORD_TEMPORARIES: u32 = 10;

/// Cantidad de temporales de punto flotante (`$f4` a `$f13`).
const FLOAT_TEMPORARIES: u32 = 10;

/// Primer registro flotante usado como temporal.
const FIRST_FLOAT_TEMPORARY: u32 = 4;

/// Máximo de argumentos pasados en registros.
pub const MAX_ARGS: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    Zero,
    V0,
    Ra,
    Arg(u32),
    Temp(u32),
    Float(u32),
}

impl Reg {
    /// Registro de retorno de `syscall` para lecturas de flotantes.
    pub const FLOAT_RESULT: Reg = Reg::Float(0);

    /// Registro de argumento flotante para `syscall`.
    pub const FLOAT_ARG: Reg = Reg::Float(12);

    /// `$a0`, `$a1`, ..., hasta [`MAX_ARGS`].
    pub fn argument_sequence() -> impl Iterator<Item = Reg> {
        (0..MAX_ARGS as u32).map(Reg::Arg)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Reg::*;

        match self {
            Zero => formatter.write_str("$zero"),
            V0 => formatter.write_str("$v0"),
            Ra => formatter.write_str("$ra"),
            Arg(n) => write!(formatter, "$a{}", n),
            Temp(n) => write!(formatter, "$t{}", n),
            Float(n) => write!(formatter, "$f{}", n),
        }
    }
}

/// Bancos circulares de temporales.
#[derive(Default)]
pub struct Temporaries {
    next_word: u32,
    next_float: u32,
}

impl Temporaries {
    pub fn word(&mut self) -> Reg {
        let reg = Reg::Temp(self.next_word % WORD_TEMPORARIES);
        self.next_word = self.next_word.wrapping_add(1);

        reg
    }

    pub fn float(&mut self) -> Reg {
        let reg = Reg::Float(FIRST_FLOAT_TEMPORARY + self.next_float % FLOAT_TEMPORARIES);
        self.next_float = self.next_float.wrapping_add(1);

        reg
    }
}

/// Generador de etiquetas globalmente únicas.
#[derive(Default)]
pub struct Labels {
    next: u32,
}

impl Labels {
    pub fn next(&mut self) -> String {
        let label = format!("L{}", self.next);
        self.next += 1;

        label
    }
}
