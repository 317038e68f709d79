//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios se descartan durante esta operación. Cada
//! token emitido esta asociado a una ubicación en el código fuente original,
//! lo cual permite rastrear errores en tanto los mismos como constructos
//! más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Este lexer no produce lexemas para casos donde no son necesarios o terminan
//! siendo más complicados. Por ejemplo, operadores, puntuación y palabras clave
//! se identifican por el hecho de lo que son y no incluyen lexemas. Por su parte,
//! los identificadores sí incluyen su lexema original. Las constantes literales
//! se resuelven a sus valores en vez de preservar sus lexemas.
//!
//! # Reglas importantes del lenguaje
//! - Las palabras clave son case-insensitive, por lo cual tanto `enquanto`
//!   como `ENQUANTO` y `Enquanto` resultan en [`Keyword::While`].
//! - Los identificadores, en cambio, distinguen mayúsculas de minúsculas.
//! - Las palabras clave con tilde (`senão`, `faça`, `lógico`) se aceptan
//!   también sin ella.
//! - Todo flujo de tokens termina en [`Token::End`].
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de error.
//! Esto ocurre en suficiente grado como para reportar más de un error por
//! ejecución, pero no lo suficiente como para permitir el avance a las
//! demás fases de la compilación.

use crate::source::{InputStream, Located, Location};
use std::{
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Literal entero máximo.
const INT_MAX: i32 = i32::MAX;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {INT_MAX}]")]
    IntOverflow,

    /// Un punto decimal sin dígitos a continuación.
    #[error("Expected digits after decimal point")]
    MissingFraction,

    /// Secuencia de escape desconocida dentro de una cadena.
    #[error("Unknown escape sequence `\\{0}`")]
    BadEscape(char),

    /// Una cadena no se cerró antes del fin de línea.
    #[error("Unterminated string literal")]
    UnterminatedString,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i32),

    /// Literal de punto flotante.
    FloatLiteral(f64),

    /// Literal de cadena, ya sin comillas ni secuencias de escape.
    StrLiteral(Rc<str>),

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `!`
    Not,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `++`
    Increment,

    /// `--`
    Decrement,

    /// `&&`
    Concat,

    /// `,`
    Comma,

    /// `;`
    Semicolon,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenSquare,

    /// `]`
    CloseSquare,

    /// Fin de la entrada.
    End,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            FloatLiteral(float) => write!(fmt, "literal `{:?}`", float),
            StrLiteral(string) => write!(fmt, "literal {:?}", string),
            Assign => fmt.write_str("`=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Not => fmt.write_str("`!`"),
            Less => fmt.write_str("`<`"),
            LessOrEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterOrEqual => fmt.write_str("`>=`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            Increment => fmt.write_str("`++`"),
            Decrement => fmt.write_str("`--`"),
            Concat => fmt.write_str("`&&`"),
            Comma => fmt.write_str("`,`"),
            Semicolon => fmt.write_str("`;`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenSquare => fmt.write_str("`[`"),
            CloseSquare => fmt.write_str("`]`"),
            End => fmt.write_str("end of input"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Begin,
    End,
    If,
    Else,
    Do,
    While,
    For,
    Write,
    Read,
    Int,
    Float,
    Bool,
    Str,
    True,
    False,
    And,
    Or,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Begin => "inicio",
            End   => "fim",
            If    => "se",
            Else  => "senao",
            Do    => "faca",
            While => "enquanto",
            For   => "para",
            Write => "escreva",
            Read  => "leia",
            Int   => "inteiro",
            Float => "flutuante",
            Bool  => "logico",
            Str   => "cadeia",
            True  => "verdadeiro",
            False => "falso",
            And   => "e",
            Or    => "ou",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(NoCase<&str>, Keyword)] = &[
            (NoCase::new("inicio"),     Begin),
            (NoCase::new("início"),     Begin),
            (NoCase::new("fim"),        End),
            (NoCase::new("se"),         If),
            (NoCase::new("senao"),      Else),
            (NoCase::new("senão"),      Else),
            (NoCase::new("faca"),       Do),
            (NoCase::new("faça"),       Do),
            (NoCase::new("enquanto"),   While),
            (NoCase::new("para"),       For),
            (NoCase::new("escreva"),    Write),
            (NoCase::new("leia"),       Read),
            (NoCase::new("inteiro"),    Int),
            (NoCase::new("flutuante"),  Float),
            (NoCase::new("logico"),     Bool),
            (NoCase::new("lógico"),     Bool),
            (NoCase::new("cadeia"),     Str),
            (NoCase::new("verdadeiro"), True),
            (NoCase::new("falso"),      False),
            (NoCase::new("e"),          And),
            (NoCase::new("ou"),         Or),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: std::iter::Peekable<S>,
    state: State,
    start: Location,
    next: Location,
    finished: bool,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Primer carácter de un operador que puede tener dos caracteres.
    ///
    /// `/` también cae aquí, ya que `//` inicia un comentario.
    Operator(char),

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Constante entera.
    ///
    /// Este estado incluirá dígitos en el token mientras que
    /// el siguiente carácter sea un dígito.
    Integer(i32),

    /// Parte fraccionaria de una constante flotante, con el texto
    /// acumulado hasta el momento.
    Fraction(String),

    /// Interior de un literal de cadena.
    Text(String),

    /// Se encontró `\` dentro de un literal de cadena.
    Escape(String),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let next = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            next,
            finished: false,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<(Token, Location)>, LexerError> {
        use {State::*, Token::*};

        let mut last_accepted = self.start.clone();
        let token = loop {
            // Se espera un siguiente carácter, fallando si hay error de E/S
            let next_char = match self.source.peek() {
                None => None,
                Some(Ok((c, _))) => Some(*c),
                Some(Err(_)) => match self.source.next() {
                    Some(Err(error)) => break Err(error.into()),
                    _ => None,
                },
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next.clone();
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('[')) => self.state = Complete(OpenSquare),
                (Start, Some(']')) => self.state = Complete(CloseSquare),
                (Start, Some('*')) => self.state = Complete(Times),

                // Operadores de uno o dos caracteres
                (Start, Some(c)) if "=!<>+-&/".contains(c) => self.state = Operator(c),

                (Start, Some('"')) => self.state = Text(String::new()),

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume
                // el entero, ya que esta lógica ya está implementada
                // en el respectivo caso para un estado de constante
                // entera para el cual el siguiente carácter es un
                // dígito. Por tanto, la constante es inicialmente cero.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Plus)),

                // `//` inicia un comentario, el resto de combinaciones son
                // operadores. Si el segundo carácter no forma un operador
                // doble, no se consume y se emite el operador simple.
                (Operator('/'), Some('/')) => self.state = Comment,
                (Operator(first), second) => {
                    let first = *first;
                    match second.and_then(|second| compound(first, second)) {
                        Some(token) => self.state = Complete(token),
                        None => match single(first) {
                            Some(token) => break Ok(token),
                            None => break Err(LexerError::Expected(first)),
                        },
                    }
                }

                // Los comentarios descartan la línea donde ocurren
                (Comment, Some('\n')) => self.state = Start,
                (Comment, Some(_)) => (),
                (Comment, None) => self.state = Start,

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit as i32 - '0' as i32;

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => *accumulated = result,
                        None => break Err(LexerError::IntOverflow),
                    }
                }

                // Un punto convierte a la constante en flotante
                (Integer(integer), Some('.')) => {
                    let text = format!("{}.", integer);
                    self.state = Fraction(text);
                }

                // Si sigue algo que no es un dígito, la constante a terminado
                (Integer(integer), _) => break Ok(IntLiteral(*integer)),

                (Fraction(text), Some(digit)) if digit.is_ascii_digit() => text.push(digit),
                (Fraction(text), _) if text.ends_with('.') => {
                    break Err(LexerError::MissingFraction)
                }

                (Fraction(text), _) => match text.parse() {
                    Ok(float) => break Ok(FloatLiteral(float)),
                    Err(_) => break Err(LexerError::MissingFraction),
                },

                // Literales de cadena, deben cerrarse en la misma línea
                (Text(text), Some('"')) => {
                    let text = std::mem::take(text);
                    self.state = Complete(StrLiteral(Rc::from(text)));
                }

                (Text(text), Some('\\')) => {
                    let text = std::mem::take(text);
                    self.state = Escape(text);
                }

                (Text(_), Some('\n')) | (Text(_), None) => {
                    break Err(LexerError::UnterminatedString)
                }

                (Text(text), Some(c)) => text.push(c),

                (Escape(text), Some(c)) => {
                    let escaped = match c {
                        'n' => '\n',
                        't' => '\t',
                        '"' => '"',
                        '\\' => '\\',
                        _ => break Err(LexerError::BadEscape(c)),
                    };

                    let mut text = std::mem::take(text);
                    text.push(escaped);
                    self.state = Text(text);
                }

                (Escape(_), None) => break Err(LexerError::UnterminatedString),

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => {
                    word.push(c);
                }

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    if let Ok(keyword) = self::Keyword::from_str(word) {
                        break Ok(Keyword(keyword));
                    } else {
                        break Ok(Id(Identifier(Rc::from(std::mem::take(word)))));
                    }
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(Ok((_, next_position))) = self.source.next() {
                last_accepted = std::mem::replace(&mut self.next, next_position);
            }
        };

        token.map(|token| Some((token, last_accepted)))
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) if self.finished => None,

            // El flujo siempre termina con un marcador explícito
            Ok(None) => {
                self.finished = true;
                Some(Ok(Located::at(Token::End, self.next.clone())))
            }

            Ok(Some((token, last_accepted))) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &last_accepted);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.next.clone())))
            }
        }
    }
}

/// Operadores de dos caracteres.
fn compound(first: char, second: char) -> Option<Token> {
    let token = match (first, second) {
        ('=', '=') => Token::Equal,
        ('!', '=') => Token::NotEqual,
        ('<', '=') => Token::LessOrEqual,
        ('>', '=') => Token::GreaterOrEqual,
        ('+', '+') => Token::Increment,
        ('-', '-') => Token::Decrement,
        ('&', '&') => Token::Concat,
        _ => return None,
    };

    Some(token)
}

/// Operadores de un solo carácter que también pueden iniciar uno doble.
fn single(first: char) -> Option<Token> {
    let token = match first {
        '=' => Token::Assign,
        '!' => Token::Not,
        '<' => Token::Less,
        '>' => Token::Greater,
        '+' => Token::Plus,
        '-' => Token::Minus,
        '/' => Token::Slash,
        _ => return None,
    };

    Some(token)
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
