//! Reporte de errores al usuario.
//!
//! Cada fase reporta errores como `Located<E>`. Al salir de su fase se
//! reducen a [`Diagnostic`], que solo conserva el mensaje y la
//! ubicación, y se despliegan junto a las líneas donde ocurrieron.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

/// Un error de cualquier fase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    message: String,
    location: Location,
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn line(&self) -> u32 {
        self.location.start().line()
    }

    pub fn column(&self) -> u32 {
        self.location.start().column()
    }

    /// Cita las líneas afectadas y subraya las columnas del error.
    fn snippet(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = (self.location.start(), self.location.end());
        let width = end.line().to_string().len();

        writeln!(fmt, "{:width$} |", "", width = width)?;
        for number in start.line()..=end.line() {
            self.location.source().with_line(number, |line| {
                writeln!(fmt, "{:>width$} | {}", number, line, width = width)
            })?;
        }

        // El fin es exclusivo; un rango vacío igual marca una columna
        let last = end.column().saturating_sub(1).max(1);
        let (from, to) = (start.column().min(last), start.column().max(last));

        writeln!(
            fmt,
            "{:width$} | {}{}",
            "",
            " ".repeat((from - 1) as usize),
            "^".repeat((to - from + 1) as usize),
            width = width
        )
    }
}

impl<E: Error> From<Located<E>> for Diagnostic {
    fn from(error: Located<E>) -> Self {
        let (location, error) = error.split();
        Diagnostic {
            message: error.to_string(),
            location,
        }
    }
}

/// Todos los errores de la fase que detuvo la compilación.
#[derive(Debug)]
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Etiqueta que precede a cada mensaje, como `"Syntax error"`.
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.errors.iter()
    }
}

impl<E: Error> From<Located<E>> for Diagnostics {
    fn from(error: Located<E>) -> Self {
        Diagnostics::from(vec![error])
    }
}

impl<E: Error> From<Vec<Located<E>>> for Diagnostics {
    fn from(errors: Vec<Located<E>>) -> Self {
        Diagnostics {
            kind: "error",
            errors: errors.into_iter().map(Diagnostic::from).collect(),
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(fmt, "{}: {}", self.kind, error.message)?;
            writeln!(fmt, " --> {}", error.location)?;
            error.snippet(fmt)?;
            writeln!(fmt)?;
        }

        let plural = if self.errors.len() == 1 { "" } else { "s" };
        writeln!(fmt, "Build failed with {} error{}", self.errors.len(), plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, source};

    fn lexical(code: &str) -> Diagnostics {
        let (start, stream) = source::consume(code.as_bytes(), "prog.por");
        let errors = Lexer::new(start, stream).try_exhaustive().unwrap_err();

        Diagnostics::from(errors).kind("Lexical error")
    }

    #[test]
    fn report_quotes_the_offending_line() {
        let report = lexical("inteiro x = 1\nx = x @ 2").to_string();
        let expected = "\
Lexical error: Bad character '@' in input stream
 --> prog.por:2:7
  |
2 | x = x @ 2
  |       ^

Build failed with 1 error
";

        assert_eq!(report, expected);
    }

    #[test]
    fn errors_keep_their_order() {
        let diagnostics = lexical("@\n\n#");
        assert_eq!(diagnostics.len(), 2);

        let found: Vec<_> = diagnostics
            .iter()
            .map(|error| (error.line(), error.column()))
            .collect();

        assert_eq!(found, [(1, 1), (3, 1)]);
        assert!(diagnostics.to_string().ends_with("Build failed with 2 errors\n"));
    }
}
