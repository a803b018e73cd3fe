use crate::errors::MetadataError;
use crate::token::{Token, TokenType};

/// Splits a disassembler listing into tokens. Comments are dropped.
pub struct IlLexer<'a> {
  source: &'a str,
  chars: std::str::Chars<'a>,
  pub tokens: Vec<Token>,
  start: usize,
  line: usize,
  current: usize,
}

impl<'a> IlLexer<'a> {
  pub fn new(source: &'a str) -> Self {
    Self {
      chars: source.chars(),
      source,
      tokens: vec![],
      start: 0,
      line: 1,
      current: 0,
    }
  }

  pub fn scan_tokens(&mut self) -> Result<(), MetadataError> {
    while !self.is_at_end() {
      self.start = self.current;
      self.scan_token()?;
    }

    self.tokens.push(Token::new(
      TokenType::Eof,
      String::new(),
      self.line,
      self.current,
      self.current,
    ));

    Ok(())
  }

  fn is_at_end(&self) -> bool {
    self.chars.as_str().is_empty()
  }

  fn scan_token(&mut self) -> Result<(), MetadataError> {
    let c: char = self.advance();

    match c {
      '(' => self.add_token(TokenType::LeftParen),
      ')' => self.add_token(TokenType::RightParen),
      '{' => self.add_token(TokenType::LeftBrace),
      '}' => self.add_token(TokenType::RightBrace),
      '[' => self.add_token(TokenType::LeftBrack),
      ']' => self.add_token(TokenType::RightBrack),
      ',' => self.add_token(TokenType::Comma),
      ':' if self.match_char(':') => self.add_token(TokenType::DoubleColon),
      ':' => self.add_token(TokenType::Colon),
      '*' => self.add_token(TokenType::Asterisk),
      '&' => self.add_token(TokenType::Ampersand),
      '=' => self.add_token(TokenType::Equal),
      '<' => self.add_token(TokenType::Less),
      '>' => self.add_token(TokenType::Greater),
      '!' => self.add_token(TokenType::Bang),
      '-' => self.add_token(TokenType::Minus),
      '/' if self.match_char('/') => self.line_comment(),
      '/' if self.match_char('*') => self.block_comment(),
      '/' => self.add_token(TokenType::Slash),
      '\'' => self.quoted('\'', TokenType::Quoted)?,
      '"' => self.quoted('"', TokenType::Str)?,
      ' ' | '\r' | '\t' => {},
      '\n' => self.line += 1,
      c if is_word_char(c) => self.word(),
      _ => self.add_token(TokenType::Symbol),
    }

    Ok(())
  }

  fn line_comment(&mut self) {
    while self.peek() != '\n' && !self.is_at_end() {
      self.advance();
    }
  }

  fn block_comment(&mut self) {
    while !self.is_at_end() {
      if self.peek() == '*' {
        self.advance();
        if self.match_char('/') {
          return;
        }
        continue;
      }

      if self.advance() == '\n' {
        self.line += 1;
      }
    }
  }

  fn word(&mut self) {
    while is_word_char(self.peek()) {
      self.advance();
    }

    self.add_token(TokenType::Word);
  }

  fn quoted(
    &mut self,
    delimiter: char,
    kind: TokenType,
  ) -> Result<(), MetadataError> {
    let line = self.line;
    let mut text = String::new();

    loop {
      if self.is_at_end() {
        return Err(MetadataError::UnexpectedToken {
          expected: format!("closing {}", delimiter),
          found: "<eof>".to_string(),
          line,
        });
      }

      let c = self.advance();
      match c {
        c if c == delimiter => break,
        '\\' => {
          let escaped = self.advance();
          // Names lose their escapes, string literals keep them.
          if kind == TokenType::Str || (escaped != '\'' && escaped != '\\') {
            text.push('\\');
          }
          text.push(escaped);
        },
        '\n' => {
          self.line += 1;
          text.push(c);
        },
        _ => text.push(c),
      }
    }

    self.tokens.push(Token::new(kind, text, line, self.start, self.current));
    Ok(())
  }

  fn peek(&self) -> char {
    self.chars.clone().next().unwrap_or('\0')
  }

  fn match_char(
    &mut self,
    expected: char,
  ) -> bool {
    let mut lookahead = self.chars.clone();

    if let Some(next_char) = lookahead.next() {
      if next_char == expected {
        self.chars = lookahead;
        self.current += next_char.len_utf8();
        return true;
      }
    }

    false
  }

  fn advance(&mut self) -> char {
    let next_char = self.chars.next();

    if let Some(c) = next_char {
      self.current += c.len_utf8();
    }

    next_char.unwrap_or('\0')
  }

  fn add_token(
    &mut self,
    kind: TokenType,
  ) {
    let literal = self.source[self.start..self.current].to_string();

    self
      .tokens
      .push(Token::new(kind, literal, self.line, self.start, self.current));
  }
}

fn is_word_char(c: char) -> bool {
  c.is_alphanumeric() || matches!(c, '_' | '$' | '@' | '?' | '`' | '.' | '#')
}

/// Tokenizes `source` in one go.
pub fn tokenize(source: &str) -> Result<Vec<Token>, MetadataError> {
  let mut lexer = IlLexer::new(source);
  lexer.scan_tokens()?;
  Ok(lexer.tokens)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<(TokenType, String)> {
    tokenize(source)
      .unwrap()
      .into_iter()
      .map(|t| (t.type_, t.lexeme))
      .collect()
  }

  #[test]
  fn test_directives_and_dotted_names() {
    let tokens = kinds(".class public Sample.Exports extends [mscorlib]System.Object");
    assert_eq!(tokens[0], (TokenType::Word, ".class".to_string()));
    assert_eq!(tokens[2], (TokenType::Word, "Sample.Exports".to_string()));
    assert_eq!(tokens[4].0, TokenType::LeftBrack);
    assert_eq!(tokens[7], (TokenType::Word, "System.Object".to_string()));
    assert_eq!(tokens.last().unwrap().0, TokenType::Eof);
  }

  #[test]
  fn test_comments_are_dropped() {
    let tokens = kinds("IL_0000: ldarg.0 // load\n/* block\n comment */ ret");
    let words: Vec<_> = tokens.iter().map(|(_, l)| l.as_str()).collect();
    assert_eq!(words, vec!["IL_0000", ":", "ldarg.0", "ret", ""]);
  }

  #[test]
  fn test_quoted_names_and_strings() {
    let tokens = kinds(r#"'<Module>' 'it\'s' ldstr "a \"b\"""#);
    assert_eq!(tokens[0], (TokenType::Quoted, "<Module>".to_string()));
    assert_eq!(tokens[1], (TokenType::Quoted, "it's".to_string()));
    assert_eq!(tokens[3], (TokenType::Str, r#"a \"b\""#.to_string()));
  }

  #[test]
  fn test_double_colon_and_nested_slash() {
    let tokens = kinds("Outer/Inner::.ctor");
    assert_eq!(tokens[1].0, TokenType::Slash);
    assert_eq!(tokens[3].0, TokenType::DoubleColon);
    assert_eq!(tokens[4], (TokenType::Word, ".ctor".to_string()));
  }

  #[test]
  fn test_spans_and_lines() {
    let tokens = tokenize("a\n  bc").unwrap();
    assert_eq!(tokens[1].line, 2);
    assert_eq!((tokens[1].start, tokens[1].end), (4, 6));
  }

  #[test]
  fn test_unterminated_string_is_an_error() {
    assert!(tokenize("ldstr \"open").is_err());
  }
}
