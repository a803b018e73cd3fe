use super::{IlParser, ParserResult};
use crate::errors::MetadataError;
use crate::model::ParamDef;
use crate::token::TokenType;
use crate::types::{CustomModifier, ManagedType, MarshalHint, TypeRef};

impl IlParser<'_> {
  /// A possibly dotted name. Quoted parts glue onto adjacent dotted words: `'My Ns'.Type`.
  pub(crate) fn parse_dotted_name(&mut self) -> ParserResult<String> {
    if !self.peek().is_name() {
      return Err(self.unexpected("a name"));
    }

    let mut name = self.bump().lexeme.clone();

    loop {
      let previous = self.previous().clone();
      let next = self.peek();
      let adjacent = next.start == previous.end;
      let glues = (next.type_ == TokenType::Word && next.lexeme.starts_with('.'))
        || (next.type_ == TokenType::Quoted && previous.lexeme.ends_with('.'));

      if !(adjacent && glues) {
        break;
      }
      name.push_str(&self.bump().lexeme);
    }

    Ok(name)
  }

  /// `[scope]Ns.Type/Nested`
  pub(crate) fn parse_type_ref(&mut self) -> ParserResult<TypeRef> {
    let mut scope = None;

    if self.eat(TokenType::LeftBrack) {
      let text = if self.eat_word(".module") {
        format!(".module {}", self.parse_dotted_name()?)
      } else {
        self.parse_dotted_name()?
      };
      self.expect(TokenType::RightBrack)?;
      scope = Some(text);
    }

    let mut name = self.parse_dotted_name()?;
    while self.eat(TokenType::Slash) {
      name.push('/');
      name.push_str(&self.parse_dotted_name()?);
    }

    Ok(TypeRef { scope, name })
  }

  pub(crate) fn parse_type(&mut self) -> ParserResult<ManagedType> {
    let start = self.peek().start;
    let mut ty = self.parse_base_type(start)?;

    loop {
      match self.peek().type_ {
        TokenType::Asterisk => {
          self.bump();
          ty = ManagedType::Pointer(Box::new(ty));
        },
        TokenType::Ampersand => {
          self.bump();
          ty = ManagedType::ByRef(Box::new(ty));
        },
        TokenType::LeftBrack => {
          self.skip_balanced(TokenType::LeftBrack, TokenType::RightBrack)?;
          ty = ManagedType::Array(Box::new(ty));
        },
        TokenType::Less => {
          self.skip_balanced(TokenType::Less, TokenType::Greater)?;
          ty = ManagedType::Opaque(self.text_since(start));
        },
        TokenType::Word if self.at_word("modreq") || self.at_word("modopt") => {
          let required = self.bump().lexeme == "modreq";
          self.expect(TokenType::LeftParen)?;
          let type_ref = self.parse_type_ref()?;
          self.expect(TokenType::RightParen)?;
          ty = ManagedType::Modified {
            inner: Box::new(ty),
            modifier: CustomModifier { required, type_ref },
          };
        },
        TokenType::Word if self.at_word("pinned") => {
          self.bump();
        },
        _ => break,
      }
    }

    Ok(ty)
  }

  fn parse_base_type(
    &mut self,
    start: usize,
  ) -> ParserResult<ManagedType> {
    if self.at(TokenType::Bang) {
      self.bump();
      self.eat(TokenType::Bang);
      if !self.peek().is_name() {
        return Err(self.unexpected("a generic parameter"));
      }
      self.bump();
      return Ok(ManagedType::Opaque(self.text_since(start)));
    }

    if self.peek().type_ != TokenType::Word {
      return Err(self.unexpected("a type"));
    }

    let word = self.bump().lexeme.clone();
    let ty = match word.as_str() {
      "void" => ManagedType::Void,
      "bool" => ManagedType::Bool,
      "char" => ManagedType::Char,
      "string" => ManagedType::String,
      "object" => ManagedType::Object,
      "typedref" => ManagedType::TypedRef,
      "int8" => ManagedType::I8,
      "int16" => ManagedType::I16,
      "int32" => ManagedType::I32,
      "int64" => ManagedType::I64,
      "uint8" => ManagedType::U8,
      "uint16" => ManagedType::U16,
      "uint32" => ManagedType::U32,
      "uint64" => ManagedType::U64,
      "float32" => ManagedType::F32,
      "float64" => ManagedType::F64,
      "unsigned" => {
        let inner = self.bump().lexeme.clone();
        match inner.as_str() {
          "int8" => ManagedType::U8,
          "int16" => ManagedType::U16,
          "int32" => ManagedType::U32,
          "int64" => ManagedType::U64,
          "int" => ManagedType::NativeUInt,
          _ => return Err(self.unexpected("an integer type")),
        }
      },
      "native" => {
        if self.eat_word("int") {
          ManagedType::NativeInt
        } else if self.eat_word("uint") {
          ManagedType::NativeUInt
        } else {
          self.expect_word("unsigned")?;
          self.expect_word("int")?;
          ManagedType::NativeUInt
        }
      },
      "valuetype" => ManagedType::ValueType(self.parse_type_ref()?),
      "class" => ManagedType::Class(self.parse_type_ref()?),
      "method" => {
        // Function pointer: method <callconv> <ret> *(<params>)
        while ["instance", "explicit", "default", "vararg", "unmanaged", "cdecl", "stdcall", "thiscall", "fastcall"]
          .iter()
          .any(|word| self.at_word(word))
        {
          self.bump();
        }
        let return_type = self.parse_type()?;
        // The pointer suffix loop may already have taken the `*`.
        if !self.eat(TokenType::Asterisk) && !matches!(return_type, ManagedType::Pointer(_)) {
          return Err(self.unexpected("'*'"));
        }
        self.skip_balanced(TokenType::LeftParen, TokenType::RightParen)?;
        ManagedType::Opaque(self.text_since(start))
      },
      _ => {
        return Err(MetadataError::UnexpectedToken {
          expected: "a type".to_string(),
          found: word,
          line: self.previous().line,
        })
      },
    };

    Ok(ty)
  }

  /// Optional `marshal( ... )` descriptor.
  pub(crate) fn parse_marshal(&mut self) -> ParserResult<Option<MarshalHint>> {
    if !self.at_word("marshal") {
      return Ok(None);
    }

    self.bump();
    let open = self.peek().end;
    self.skip_balanced(TokenType::LeftParen, TokenType::RightParen)?;
    let close = self.previous().start.max(open);

    Ok(Some(MarshalHint::new(&self.source[open..close])))
  }

  pub(crate) fn parse_params(&mut self) -> ParserResult<Vec<ParamDef>> {
    self.parse_delimited_list(
      TokenType::LeftParen,
      TokenType::RightParen,
      TokenType::Comma,
      |parser| parser.parse_param(),
    )
  }

  /// `[in][out] type marshal(...) name`
  fn parse_param(&mut self) -> ParserResult<ParamDef> {
    let mut flags = Vec::new();
    while self.eat(TokenType::LeftBrack) {
      flags.push(self.bump().lexeme.clone());
      self.expect(TokenType::RightBrack)?;
    }

    let type_ = self.parse_type()?;
    let marshal = self.parse_marshal()?;
    let name = if self.peek().is_name() {
      Some(self.parse_dotted_name()?)
    } else {
      None
    };

    Ok(ParamDef {
      flags,
      type_,
      marshal,
      name,
      custom_attributes: vec![],
    })
  }
}
