//! Compilador de Portugol a ensamblador MIPS.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente.
//! Este archivo se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens. El flujo de tokens se
//! dispone en un AST por medio de análisis sintáctico en [`parse`].
//! El árbol sintáctico es verificado por análisis semántico en
//! [`semantic`], que resuelve nombres e infiere tipos sin modificar
//! el árbol.
//!
//! # Back end
//! [`codegen`] traduce el árbol ya validado a ensamblador MIPS para el
//! simulador MARS. Las variables residen en memoria estática y las
//! expresiones se evalúan sobre un conjunto fijo de temporales.
//!
//! Cada fase acumula todos los errores que encuentra. La compilación
//! solo avanza a la siguiente fase si la anterior no reportó ninguno,
//! y los errores se presentan por medio de [`error::Diagnostics`].

#[macro_use]
mod macros;

pub mod codegen;
pub mod error;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;

use bitflags::bitflags;
use std::{
    fmt::Debug,
    io::{self, BufRead, Write},
};

use tracing::{debug, warn};

use crate::{codegen::Assembly, error::Diagnostics, lex::Lexer};

bitflags! {
    /// Representaciones intermedias a volcar durante la compilación.
    pub struct DumpOptions: u32 {
        /// Imprimir el flujo de tokens.
        const TOKENS = 0x01;

        /// Imprimir el árbol sintáctico.
        const AST = 0x02;
    }
}

/// Compila un programa completo.
///
/// Los volcados solicitados en `dumps` se escriben a stderr, nunca a la
/// misma salida que el ensamblador. En caso de error, el resultado
/// contiene todos los errores de la primera fase que falló.
pub fn compile<R, S>(reader: R, name: S, dumps: DumpOptions) -> Result<Assembly, Diagnostics>
where
    R: BufRead,
    S: Into<String>,
{
    compile_with_dumps(reader, name, dumps, io::stderr())
}

/// Igual que [`compile`], pero los volcados se escriben a `sink`.
pub fn compile_with_dumps<R, S, W>(
    reader: R,
    name: S,
    dumps: DumpOptions,
    mut sink: W,
) -> Result<Assembly, Diagnostics>
where
    R: BufRead,
    S: Into<String>,
    W: Write,
{
    let (start, stream) = source::consume(reader, name);

    let tokens = Lexer::new(start, stream)
        .try_exhaustive()
        .map_err(|errors| Diagnostics::from(errors).kind("Lexical error"))?;

    debug!("lexed {} tokens", tokens.len());
    if dumps.contains(DumpOptions::TOKENS) {
        dump(&mut sink, "Tokens", &tokens);
    }

    let (ast, errors) = parse::parse(&tokens);
    debug!(
        "parsed {} top-level statements, {} syntax errors",
        ast.statements.len(),
        errors.len()
    );

    if dumps.contains(DumpOptions::AST) {
        dump(&mut sink, "Ast", &ast);
    }

    if !errors.is_empty() {
        return Err(Diagnostics::from(errors).kind("Syntax error"));
    }

    let errors = semantic::analyze(&ast);
    debug!("semantic analysis found {} errors", errors.len());

    if !errors.is_empty() {
        return Err(Diagnostics::from(errors).kind("Semantic error"));
    }

    let assembly =
        codegen::generate(&ast).map_err(|error| Diagnostics::from(error).kind("Internal error"))?;

    debug!("emitted {} lines of assembly", assembly.lines().len());
    Ok(assembly)
}

/// Un volcado que no se logra escribir no detiene la compilación.
fn dump<W: Write, T: Debug>(sink: &mut W, title: &str, value: &T) {
    if let Err(error) = write!(sink, "{}: {:#?}\n\n", title, value) {
        warn!("failed to write {} dump: {}", title, error);
    }
}
