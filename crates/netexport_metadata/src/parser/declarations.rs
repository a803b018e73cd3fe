use super::{IlParser, ParserResult};
use crate::errors::MetadataError;
use crate::model::{
  AssemblyDef, AssemblyRef, CustomAttribute, FieldDef, GLOBAL_TYPE, MethodDef, MethodSignature, ModuleMetadata, TypeDef,
};
use crate::token::{Token, TokenType};
use crate::types::{ManagedType, TypeRef};

const CLASS_FLAGS: &[&str] = &[
  "public",
  "private",
  "nested",
  "family",
  "assembly",
  "famandassem",
  "famorassem",
  "auto",
  "sequential",
  "explicit",
  "ansi",
  "unicode",
  "autochar",
  "import",
  "serializable",
  "sealed",
  "abstract",
  "beforefieldinit",
  "specialname",
  "rtspecialname",
  "interface",
  "value",
  "enum",
  "windowsruntime",
];

const METHOD_FLAGS: &[&str] = &[
  "public",
  "private",
  "family",
  "assembly",
  "famandassem",
  "famorassem",
  "privatescope",
  "hidebysig",
  "static",
  "final",
  "virtual",
  "abstract",
  "specialname",
  "rtspecialname",
  "newslot",
  "strict",
  "pinvokeimpl",
  "unmanagedexp",
  "reqsecobj",
];

const CALL_CONV_WORDS: &[&str] = &[
  "instance", "explicit", "default", "vararg", "unmanaged", "cdecl", "stdcall", "thiscall", "fastcall",
];

const FIELD_FLAGS: &[&str] = &[
  "public",
  "private",
  "family",
  "assembly",
  "famandassem",
  "famorassem",
  "privatescope",
  "static",
  "initonly",
  "literal",
  "notserialized",
  "specialname",
  "rtspecialname",
];

/// Words before `(` that never name a method.
const NOT_METHOD_NAMES: &[&str] = &["marshal", "pinvokeimpl", "modreq", "modopt"];

impl IlParser<'_> {
  pub(crate) fn parse_module(&mut self) -> ParserResult<ModuleMetadata> {
    let mut module = ModuleMetadata::default();

    while !self.is_at_end() {
      let token = self.peek();

      if token.is_word(".assembly") {
        self.parse_assembly(&mut module)?;
      } else if token.is_word(".module") {
        self.parse_module_directive(&mut module)?;
      } else if token.is_word(".namespace") {
        self.parse_namespace(&mut module)?;
      } else if token.is_word(".class") {
        self.parse_class(&mut module, None, None)?;
      } else if token.is_word(".method") {
        let method = self.parse_method()?;
        let mut global = TypeDef::new(GLOBAL_TYPE);
        global.methods.push(method);
        module.add_type(global);
      } else if token.is_word(".field") {
        if let Some(field) = self.parse_field() {
          let mut global = TypeDef::new(GLOBAL_TYPE);
          global.fields.push(field);
          module.add_type(global);
        }
      } else if token.is_directive() {
        self.skip_directive()?;
      } else {
        self.bump();
      }
    }

    if module.assembly.is_none() {
      return Err(MetadataError::MissingAssembly);
    }

    Ok(module)
  }

  fn parse_assembly(
    &mut self,
    module: &mut ModuleMetadata,
  ) -> ParserResult<()> {
    self.expect_word(".assembly")?;

    if self.eat_word("extern") {
      self.eat_word("retargetable");
      let name = self.parse_dotted_name()?;
      while !self.at(TokenType::LeftBrace) && !self.is_at_end() {
        self.bump();
      }

      let body_start = self.peek().end;
      self.skip_balanced(TokenType::LeftBrace, TokenType::RightBrace)?;
      let body_end = self.previous().start.max(body_start);

      module.extern_assemblies.push(AssemblyRef {
        name,
        body: self.source[body_start..body_end].to_string(),
      });
      return Ok(());
    }

    self.eat_word("retargetable");
    let name = self.parse_dotted_name()?;
    let mut version = None;

    self.expect(TokenType::LeftBrace)?;
    let mut depth = 1usize;
    while depth > 0 {
      if self.is_at_end() {
        return Err(self.unexpected("'}'"));
      }

      if depth == 1 && self.eat_word(".ver") {
        let mut text = String::new();
        while self.at(TokenType::Word) || self.at(TokenType::Colon) {
          text.push_str(&self.bump().lexeme);
        }
        version = Some(text);
        continue;
      }

      match self.bump().type_ {
        TokenType::LeftBrace => depth += 1,
        TokenType::RightBrace => depth -= 1,
        _ => {},
      }
    }

    module.assembly = Some(AssemblyDef { name, version });
    Ok(())
  }

  fn parse_module_directive(
    &mut self,
    module: &mut ModuleMetadata,
  ) -> ParserResult<()> {
    if self.peek_nth(1).is_word("extern") {
      return self.skip_directive();
    }

    self.expect_word(".module")?;
    module.module_name = Some(self.parse_dotted_name()?);
    Ok(())
  }

  fn parse_namespace(
    &mut self,
    module: &mut ModuleMetadata,
  ) -> ParserResult<()> {
    self.expect_word(".namespace")?;
    let namespace = self.parse_dotted_name()?;
    self.expect(TokenType::LeftBrace)?;

    loop {
      if self.eat(TokenType::RightBrace) {
        return Ok(());
      }
      if self.is_at_end() {
        return Err(self.unexpected("'}'"));
      }

      if self.at_word(".class") {
        self.parse_class(module, Some(&namespace), None)?;
      } else if self.at_directive() {
        self.skip_directive()?;
      } else {
        self.bump();
      }
    }
  }

  fn parse_class(
    &mut self,
    module: &mut ModuleMetadata,
    namespace: Option<&str>,
    outer: Option<&str>,
  ) -> ParserResult<()> {
    if self.peek_nth(1).is_word("extern") {
      return self.skip_directive();
    }

    self.expect_word(".class")?;
    let header = self.collect_header();
    let mut header = self.sub_parser(header).parse_class_header()?;

    header.name = match (outer, namespace) {
      (Some(outer), _) => format!("{}/{}", outer, header.name),
      (None, Some(namespace)) => format!("{}.{}", namespace, header.name),
      (None, None) => header.name,
    };

    let full_name = header.name.clone();
    module.add_type(header);

    let mut members = TypeDef::new(&full_name);
    self.expect(TokenType::LeftBrace)?;

    loop {
      if self.eat(TokenType::RightBrace) {
        break;
      }
      if self.is_at_end() {
        return Err(self.unexpected("'}'"));
      }

      let token = self.peek();
      if token.is_word(".class") {
        self.parse_class(module, None, Some(&full_name))?;
      } else if token.is_word(".method") {
        members.methods.push(self.parse_method()?);
      } else if token.is_word(".field") {
        members.fields.extend(self.parse_field());
      } else if token.is_word(".custom") {
        self.parse_custom();
      } else if token.is_directive() {
        self.skip_directive()?;
      } else {
        self.bump();
      }
    }

    module.add_type(members);
    Ok(())
  }

  fn parse_class_header(&mut self) -> ParserResult<TypeDef> {
    let mut ty = TypeDef::default();

    while self.peek().type_ == TokenType::Word && CLASS_FLAGS.contains(&self.peek().lexeme.as_str()) {
      ty.flags.push(self.bump().lexeme.clone());
    }

    ty.name = self.parse_dotted_name()?;

    if self.at(TokenType::Less) {
      self.skip_balanced(TokenType::Less, TokenType::Greater)?;
      ty.generic = true;
    }

    if self.eat_word("extends") {
      ty.extends = Some(self.parse_class_ref()?);
    }

    Ok(ty)
  }

  pub(crate) fn parse_method(&mut self) -> ParserResult<MethodDef> {
    self.expect_word(".method")?;
    let token = self.token_comment();
    let header = self.collect_header();

    let mut method = match self.sub_parser(header.clone()).parse_method_header() {
      Ok(method) => method,
      Err(_) => fallback_method(&header),
    };
    method.token = token;

    self.parse_method_body(&mut method)?;
    Ok(method)
  }

  fn parse_method_header(&mut self) -> ParserResult<MethodDef> {
    let mut flags = Vec::new();

    while self.peek().type_ == TokenType::Word && METHOD_FLAGS.contains(&self.peek().lexeme.as_str()) {
      let flag = self.bump().lexeme.clone();
      if flag == "pinvokeimpl" {
        self.skip_balanced(TokenType::LeftParen, TokenType::RightParen)?;
      }
      flags.push(flag);
    }

    let mut instance = false;
    while self.peek().type_ == TokenType::Word && CALL_CONV_WORDS.contains(&self.peek().lexeme.as_str()) {
      instance |= self.bump().lexeme == "instance";
    }

    let return_type = self.parse_type()?;
    let return_marshal = self.parse_marshal()?;
    let name = self.parse_dotted_name()?;

    let mut generic = false;
    if self.at(TokenType::Less) {
      self.skip_balanced(TokenType::Less, TokenType::Greater)?;
      generic = true;
    }

    let params = self.parse_params()?;

    Ok(MethodDef {
      name,
      token: None,
      flags,
      generic,
      signature: Some(MethodSignature {
        instance,
        return_type,
        return_marshal,
        params,
      }),
      custom_attributes: vec![],
      return_attributes: vec![],
      exported: false,
    })
  }

  fn parse_method_body(
    &mut self,
    method: &mut MethodDef,
  ) -> ParserResult<()> {
    self.expect(TokenType::LeftBrace)?;
    let mut depth = 1usize;
    let mut current_param: Option<usize> = None;

    while depth > 0 {
      if self.is_at_end() {
        return Err(self.unexpected("'}'"));
      }

      if self.at_word(".custom") {
        let Some(attribute) = self.parse_custom() else {
          continue;
        };

        match current_param {
          None => method.custom_attributes.push(attribute),
          Some(0) => method.return_attributes.push(attribute),
          Some(index) => {
            if let Some(param) = method
              .signature
              .as_mut()
              .and_then(|signature| signature.params.get_mut(index - 1))
            {
              param.custom_attributes.push(attribute);
            }
          },
        }
        continue;
      }

      if self.at_word(".param") {
        current_param = self.parse_param_directive()?;
        continue;
      }

      current_param = None;
      match self.bump() {
        token if token.is_word(".export") => method.exported = true,
        token if token.type_ == TokenType::LeftBrace => depth += 1,
        token if token.type_ == TokenType::RightBrace => depth -= 1,
        _ => {},
      }
    }

    Ok(())
  }

  /// Reads `.param [n] [= const]`, returning the index the following attributes attach to.
  fn parse_param_directive(&mut self) -> ParserResult<Option<usize>> {
    self.expect_word(".param")?;

    if !self.eat(TokenType::LeftBrack) {
      // `.param type` and `.param constraint` name generic parameters.
      while !self.at_directive() && !self.at(TokenType::RightBrace) && !self.is_at_end() {
        self.bump();
      }
      return Ok(None);
    }

    let index = self.bump().lexeme.parse::<usize>().ok();
    self.expect(TokenType::RightBrack)?;

    if self.eat(TokenType::Equal) {
      if self.at(TokenType::Str) {
        self.bump();
      } else {
        while self.at(TokenType::Word) {
          self.bump();
        }
        if self.at(TokenType::LeftParen) {
          self.skip_balanced(TokenType::LeftParen, TokenType::RightParen)?;
        }
      }
    }

    Ok(index)
  }

  /// Reads a `.custom` directive. Forms other than a constructor reference are skipped.
  pub(crate) fn parse_custom(&mut self) -> Option<CustomAttribute> {
    if !self.eat_word(".custom") {
      return None;
    }

    let mut tokens = Vec::new();
    let mut after_equal = false;
    loop {
      let token = self.peek().clone();
      match token.type_ {
        TokenType::Eof | TokenType::RightBrace => break,
        TokenType::Word if token.is_directive() => break,
        TokenType::LeftParen | TokenType::LeftBrace => {
          let start = self.cursor;
          let closing = if token.type_ == TokenType::LeftParen {
            TokenType::RightParen
          } else {
            TokenType::RightBrace
          };
          if self.skip_balanced(token.type_, closing).is_err() {
            return None;
          }
          tokens.extend_from_slice(&self.tokens[start..self.cursor]);

          if after_equal {
            break;
          }
        },
        TokenType::Equal => {
          after_equal = true;
          tokens.push(self.bump().clone());
        },
        _ => tokens.push(self.bump().clone()),
      }
    }

    self.sub_parser(tokens).parse_custom_attribute().ok()
  }

  fn parse_custom_attribute(&mut self) -> ParserResult<CustomAttribute> {
    if self.at(TokenType::LeftParen) {
      self.skip_balanced(TokenType::LeftParen, TokenType::RightParen)?;
    }

    self.eat_word("instance");
    self.expect_word("void")?;
    let attribute_type = self.parse_class_ref()?;
    self.expect(TokenType::DoubleColon)?;
    self.expect_word(".ctor")?;

    let ctor_params = self.parse_delimited_list(
      TokenType::LeftParen,
      TokenType::RightParen,
      TokenType::Comma,
      |parser| parser.parse_type(),
    )?;

    let value = if self.eat(TokenType::Equal) && self.at(TokenType::LeftParen) {
      Some(self.parse_hex_bytes()?)
    } else {
      None
    };

    Ok(CustomAttribute {
      attribute_type,
      ctor_params,
      value,
    })
  }

  fn parse_hex_bytes(&mut self) -> ParserResult<Vec<u8>> {
    self.expect(TokenType::LeftParen)?;
    let mut bytes = Vec::new();

    while !self.eat(TokenType::RightParen) {
      let token = self.peek();
      if token.type_ != TokenType::Word || token.lexeme.len() % 2 != 0 {
        return Err(self.unexpected("hex bytes"));
      }

      for pair in token.lexeme.as_bytes().chunks(2) {
        let text = std::str::from_utf8(pair).unwrap_or("");
        match u8::from_str_radix(text, 16) {
          Ok(byte) => bytes.push(byte),
          Err(_) => return Err(self.unexpected("hex bytes")),
        }
      }
      self.bump();
    }

    Ok(bytes)
  }

  /// Reads a `.field` directive. Fields with unreadable types are dropped.
  pub(crate) fn parse_field(&mut self) -> Option<FieldDef> {
    if !self.eat_word(".field") {
      return None;
    }

    let mut tokens = Vec::new();
    let mut depth = 0usize;
    while !self.is_at_end() {
      let token = self.peek();
      if depth == 0 && (token.is_directive() || token.type_ == TokenType::RightBrace) {
        break;
      }
      match token.type_ {
        TokenType::LeftParen => depth += 1,
        TokenType::RightParen => depth = depth.saturating_sub(1),
        _ => {},
      }
      tokens.push(self.bump().clone());
    }

    self.sub_parser(tokens).parse_field_declaration().ok()
  }

  fn parse_field_declaration(&mut self) -> ParserResult<FieldDef> {
    if self.at(TokenType::LeftBrack) {
      self.skip_balanced(TokenType::LeftBrack, TokenType::RightBrack)?;
    }

    let mut flags = Vec::new();
    loop {
      if self.at_word("marshal") {
        self.parse_marshal()?;
        continue;
      }
      if self.peek().type_ == TokenType::Word && FIELD_FLAGS.contains(&self.peek().lexeme.as_str()) {
        flags.push(self.bump().lexeme.clone());
        continue;
      }
      break;
    }

    let type_ = self.parse_type()?;
    let name = self.parse_dotted_name()?;

    let constant = if self.eat(TokenType::Equal) {
      self.parse_literal()
    } else {
      None
    };

    Ok(FieldDef {
      name,
      flags,
      type_,
      constant,
    })
  }

  /// Reads `int32(0x0000000A)` style constants.
  fn parse_literal(&mut self) -> Option<i128> {
    let mut type_words = Vec::new();
    while self.at(TokenType::Word) {
      type_words.push(self.bump().lexeme.clone());
    }

    if !self.eat(TokenType::LeftParen) {
      return None;
    }
    let negative = self.eat(TokenType::Minus);
    let text = self.bump().lexeme.clone();

    let words: Vec<&str> = type_words.iter().map(String::as_str).collect();
    literal_value(&words, &text, negative)
  }

  /// Skips a directive this reader has no use for, including any block it opens.
  pub(crate) fn skip_directive(&mut self) -> ParserResult<()> {
    self.bump();

    loop {
      match self.peek().type_ {
        TokenType::Eof | TokenType::RightBrace => return Ok(()),
        TokenType::LeftBrace => return self.skip_balanced(TokenType::LeftBrace, TokenType::RightBrace),
        TokenType::LeftParen => self.skip_balanced(TokenType::LeftParen, TokenType::RightParen)?,
        _ if self.at_directive() => return Ok(()),
        _ => {
          self.bump();
        },
      }
    }
  }

  /// A type named after `extends` or in an attribute constructor reference.
  fn parse_class_ref(&mut self) -> ParserResult<TypeRef> {
    if !self.at_word("class") && !self.at_word("valuetype") {
      return self.parse_type_ref();
    }

    match self.parse_type()? {
      ManagedType::Class(type_ref) | ManagedType::ValueType(type_ref) => Ok(type_ref),
      other => Ok(TypeRef::local(&other.to_string())),
    }
  }
}

/// Integer value of a literal written as `type(text)`.
///
/// Hex literals are raw bit patterns and are sign-extended for signed types.
pub(crate) fn literal_value(
  type_words: &[&str],
  text: &str,
  negative: bool,
) -> Option<i128> {
  let (signed, bits) = match type_words {
    ["bool"] => return Some(i128::from(text == "true" || text == "1")),
    ["int8"] => (true, 8),
    ["int16"] => (true, 16),
    ["int32"] => (true, 32),
    ["int64"] => (true, 64),
    ["uint8"] | ["unsigned", "int8"] => (false, 8),
    ["uint16"] | ["unsigned", "int16"] | ["char"] => (false, 16),
    ["uint32"] | ["unsigned", "int32"] => (false, 32),
    ["uint64"] | ["unsigned", "int64"] => (false, 64),
    _ => return None,
  };

  let mut value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
    Some(hex) => {
      let raw = i128::from(u64::from_str_radix(hex, 16).ok()?);
      if signed && raw >= 1i128 << (bits - 1) {
        raw - (1i128 << bits)
      } else {
        raw
      }
    },
    None => text.parse::<i128>().ok()?,
  };

  if negative {
    value = -value;
  }

  Some(value)
}

/// Recovers name and genericity from a header the signature reader rejected.
fn fallback_method(header: &[Token]) -> MethodDef {
  let mut depth = 0usize;
  let mut name = String::from("<unknown>");
  let mut generic = false;

  for (i, token) in header.iter().enumerate() {
    match token.type_ {
      TokenType::LeftParen if depth == 0 && i > 0 => {
        let before = &header[i - 1];

        if before.type_ == TokenType::Greater {
          let mut angle = 0usize;
          let mut j = i - 1;
          loop {
            match header[j].type_ {
              TokenType::Greater => angle += 1,
              TokenType::Less => angle -= 1,
              _ => {},
            }
            if angle == 0 || j == 0 {
              break;
            }
            j -= 1;
          }
          if j > 0 && header[j - 1].is_name() {
            name = header[j - 1].lexeme.clone();
            generic = true;
            break;
          }
        } else if before.is_name() && !NOT_METHOD_NAMES.contains(&before.lexeme.as_str()) {
          name = before.lexeme.clone();
          break;
        }
        depth += 1;
      },
      TokenType::LeftParen | TokenType::Less => depth += 1,
      TokenType::RightParen | TokenType::Greater => depth = depth.saturating_sub(1),
      _ => {},
    }
  }

  let flags = header
    .iter()
    .take_while(|token| token.type_ == TokenType::Word && METHOD_FLAGS.contains(&token.lexeme.as_str()))
    .map(|token| token.lexeme.clone())
    .collect();

  MethodDef {
    name,
    token: None,
    flags,
    generic,
    signature: None,
    custom_attributes: vec![],
    return_attributes: vec![],
    exported: false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::tokenize;
  use crate::parser::read_module;

  #[test]
  fn test_literal_values() {
    assert_eq!(literal_value(&["int32"], "0xFFFFFFFF", false), Some(-1));
    assert_eq!(literal_value(&["uint32"], "0xFFFFFFFF", false), Some(4294967295));
    assert_eq!(literal_value(&["unsigned", "int8"], "0x0A", false), Some(10));
    assert_eq!(literal_value(&["int16"], "5", true), Some(-5));
    assert_eq!(literal_value(&["float32"], "1.5", false), None);
  }

  #[test]
  fn test_fallback_recovers_generic_method_name() {
    let tokens = tokenize("public static !!0 modopt(Foo Bar) Pick<T>(!!0 a) cil managed").unwrap();
    let method = fallback_method(&tokens);
    assert_eq!(method.name, "Pick");
    assert!(method.generic);
    assert_eq!(method.flags, vec!["public", "static"]);
  }

  #[test]
  fn test_unreadable_signature_keeps_method() {
    let listing = r#"
.assembly A { }
.class public auto ansi Lib extends [mscorlib]System.Object
{
  .method public static void  Odd(int32 a, ...) cil managed
  {
    .custom instance void DllExportAttribute::.ctor() = ( 01 00 00 00 )
    ret
  }
}
"#;
    let module = read_module(listing).unwrap();
    let method = &module.find_type("Lib").unwrap().methods[0];

    assert_eq!(method.name, "Odd");
    assert!(method.signature.is_none());
    assert_eq!(method.custom_attributes.len(), 1);
  }

  #[test]
  fn test_global_methods_and_exports() {
    let listing = r#"
.assembly NativeExports.Sample { .ver 0:0:0:0 }
.method public static int32 'Add'(int32 a) cil managed
{
  .export [1] as Add
  .maxstack 1
  ldarg.0
  ret
}
"#;
    let module = read_module(listing).unwrap();
    let global = module.find_type(GLOBAL_TYPE).unwrap();

    assert!(global.methods[0].exported);
    assert_eq!(global.methods[0].name, "Add");
    assert!(module.is_processed());
  }

  #[test]
  fn test_namespace_blocks_prefix_type_names() {
    let listing = r#"
.assembly A { }
.namespace Legacy.Api
{
  .class public auto ansi Entry extends [mscorlib]System.Object { }
}
"#;
    let module = read_module(listing).unwrap();
    assert!(module.find_type("Legacy.Api.Entry").is_some());
  }

  #[test]
  fn test_verbal_custom_attribute_is_kept_without_value() {
    let listing = r#"
.assembly A { }
.class public auto ansi Lib extends [mscorlib]System.Object
{
  .method public static void F() cil managed
  {
    .custom instance void DllExportAttribute::.ctor(string) = {string('F')}
    ret
  }
}
"#;
    let module = read_module(listing).unwrap();
    let attribute = &module.find_type("Lib").unwrap().methods[0].custom_attributes[0];
    assert!(attribute.value.is_none());
    assert_eq!(attribute.ctor_params, vec![ManagedType::String]);
  }
}
