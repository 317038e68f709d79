//! Ubicaciones en el código fuente.
//!
//! Todo lo que el compilador construye a partir del programa (tokens,
//! nodos, errores) se envuelve en [`Located`], de manera que cualquier
//! fase pueda señalar el punto exacto del programa que lo originó.

use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Formatter},
    io::{self, BufRead},
    rc::Rc,
    vec,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Flujo de caracteres junto a la ubicación del carácter siguiente.
pub trait InputStream: Iterator<Item = io::Result<(char, Location)>> {}

impl<I> InputStream for I where I: Iterator<Item = io::Result<(char, Location)>> {}

/// Un valor y el lugar del programa de donde proviene.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    pub fn val(&self) -> &T {
        &self.value
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    pub fn line(&self) -> u32 {
        self.location.start.line
    }

    pub fn column(&self) -> u32 {
        self.location.start.column
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.location, self.value)
    }
}

/// Rango semiabierto `[start, end)` dentro de un origen.
#[derive(Clone)]
pub struct Location {
    source: Rc<Source>,
    start: Position,
    end: Position,
}

impl Location {
    /// Rango desde el inicio de `from` hasta el final de `to`.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            end: to.end,
            ..from
        }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    fn point(source: &Rc<Source>, at: Position) -> Self {
        Location {
            source: Rc::clone(source),
            start: at,
            end: at.next_column(),
        }
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let (start, end) = (self.start, self.end);
        let single = end.line != start.line || end.column <= start.column + 1;

        if single {
            write!(formatter, "{}:{}", self.source.name, start)
        } else {
            let last = Position {
                column: end.column - 1,
                ..end
            };

            write!(formatter, "{}:[{}-{}]", self.source.name, start, last)
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, formatter)
    }
}

/// Línea y columna, ambas desde 1.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    fn next_column(self) -> Self {
        Position {
            column: self.column + 1,
            ..self
        }
    }

    /// Posición que sigue a `c`.
    fn after(self, c: char) -> Self {
        match c {
            '\n' => Position {
                line: self.line + 1,
                column: 1,
            },

            '\t' => Position {
                column: 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP,
                ..self
            },

            _ => self.next_column(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Prepara la lectura carácter por carácter de un programa.
///
/// Retorna la ubicación del primer carácter y el flujo. Cada carácter
/// emitido viene acompañado por la ubicación del carácter que le sigue.
pub fn consume<R, S>(reader: R, name: S) -> (Location, Chars<R>)
where
    R: BufRead,
    S: Into<String>,
{
    let source = Rc::new(Source {
        name: name.into(),
        lines: Default::default(),
    });

    let start = Location::point(&source, Position::default());
    let chars = Chars {
        reader,
        source,
        pending: Vec::new().into_iter(),
        position: Position::default(),
        exhausted: false,
    };

    (start, chars)
}

/// Lector de caracteres sobre un [`BufRead`], una línea a la vez.
///
/// Toda línea termina en `'\n'`, incluso la última. Después de un
/// error de E/S el flujo termina.
pub struct Chars<R> {
    reader: R,
    source: Rc<Source>,
    pending: vec::IntoIter<char>,
    position: Position,
    exhausted: bool,
}

impl<R: BufRead> Chars<R> {
    /// Lee la siguiente línea. Retorna `false` al final de la entrada.
    fn refill(&mut self) -> io::Result<bool> {
        let mut line = String::new();
        if self.exhausted || self.reader.read_line(&mut line)? == 0 {
            self.exhausted = true;
            return Ok(false);
        }

        let content = line.strip_suffix('\n').unwrap_or(&line);
        let content = content.strip_suffix('\r').unwrap_or(content);

        let mut chars: Vec<char> = content.chars().collect();
        chars.push('\n');

        self.source.lines.borrow_mut().push(content.to_owned());
        self.pending = chars.into_iter();

        Ok(true)
    }
}

impl<R: BufRead> Iterator for Chars<R> {
    type Item = io::Result<(char, Location)>;

    fn next(&mut self) -> Option<Self::Item> {
        let c = match self.pending.next() {
            Some(c) => c,
            None => match self.refill() {
                Ok(true) => self.pending.next()?,
                Ok(false) => return None,
                Err(error) => {
                    self.exhausted = true;
                    return Some(Err(error));
                }
            },
        };

        self.position = self.position.after(c);
        Some(Ok((c, Location::point(&self.source, self.position))))
    }
}

/// Nombre del programa y las líneas leídas hasta el momento.
pub struct Source {
    name: String,
    lines: RefCell<Vec<String>>,
}

impl Source {
    /// Invoca a `callback` con el contenido de una línea ya leída.
    ///
    /// Las líneas que todavía no se han consumido se observan vacías.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let lines = self.lines.borrow();
        let index = (line as usize).wrapping_sub(1);

        callback(lines.get(index).map(String::as_str).unwrap_or(""))
    }
}
