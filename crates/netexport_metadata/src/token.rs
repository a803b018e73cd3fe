use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
  /// Identifiers, keywords, directives (`.method`), numbers and hex bytes.
  Word,
  /// A single-quoted name such as `'<Module>'`, quotes stripped.
  Quoted,
  /// A double-quoted string literal, quotes stripped, escapes kept.
  Str,
  LeftParen,
  RightParen,
  LeftBrace,
  RightBrace,
  LeftBrack,
  RightBrack,
  Comma,
  Colon,
  DoubleColon,
  Slash,
  Asterisk,
  Ampersand,
  Equal,
  Less,
  Greater,
  Bang,
  Minus,
  /// Any other character, kept so offsets stay meaningful.
  Symbol,
  Eof,
}

impl TokenType {
  pub fn describe(self) -> &'static str {
    match self {
      TokenType::Word => "a word",
      TokenType::Quoted => "a quoted name",
      TokenType::Str => "a string",
      TokenType::LeftParen => "'('",
      TokenType::RightParen => "')'",
      TokenType::LeftBrace => "'{'",
      TokenType::RightBrace => "'}'",
      TokenType::LeftBrack => "'['",
      TokenType::RightBrack => "']'",
      TokenType::Comma => "','",
      TokenType::Colon => "':'",
      TokenType::DoubleColon => "'::'",
      TokenType::Slash => "'/'",
      TokenType::Asterisk => "'*'",
      TokenType::Ampersand => "'&'",
      TokenType::Equal => "'='",
      TokenType::Less => "'<'",
      TokenType::Greater => "'>'",
      TokenType::Bang => "'!'",
      TokenType::Minus => "'-'",
      TokenType::Symbol => "a symbol",
      TokenType::Eof => "end of listing",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub type_: TokenType,
  pub lexeme: String,
  pub line: usize,
  /// Byte offset of the first character in the source.
  pub start: usize,
  /// Byte offset one past the last character in the source.
  pub end: usize,
}

impl Token {
  pub fn new(
    type_: TokenType,
    lexeme: String,
    line: usize,
    start: usize,
    end: usize,
  ) -> Self {
    Self {
      type_,
      lexeme,
      line,
      start,
      end,
    }
  }

  pub fn is_word(
    &self,
    word: &str,
  ) -> bool {
    self.type_ == TokenType::Word && self.lexeme == word
  }

  /// Words and quoted names both spell identifiers.
  pub fn is_name(&self) -> bool {
    matches!(self.type_, TokenType::Word | TokenType::Quoted)
  }

  /// A declaration directive such as `.class` or `.method`.
  ///
  /// `.ctor` and `.cctor` start with a dot but are method names.
  pub fn is_directive(&self) -> bool {
    self.type_ == TokenType::Word
      && self.lexeme.starts_with('.')
      && self.lexeme.len() > 1
      && self.lexeme != ".ctor"
      && self.lexeme != ".cctor"
  }
}

impl fmt::Display for Token {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self.type_ {
      TokenType::Quoted => write!(f, "'{}'", self.lexeme),
      TokenType::Str => write!(f, "\"{}\"", self.lexeme),
      TokenType::Eof => write!(f, "<eof>"),
      _ => write!(f, "{}", self.lexeme),
    }
  }
}
