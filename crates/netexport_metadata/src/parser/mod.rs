mod declarations;
mod type_syntax;

use crate::errors::MetadataError;
use crate::lexer::tokenize;
use crate::model::ModuleMetadata;
use crate::token::{Token, TokenType};

pub type ParserResult<T> = Result<T, MetadataError>;

/// Reads declarations out of a token stream produced by [`crate::lexer::IlLexer`].
///
/// Sub-parsers share the source text so opaque constructs can be kept as written.
pub struct IlParser<'a> {
  source: &'a str,
  tokens: Vec<Token>,
  cursor: usize,
}

/// Reads a disassembler listing into module metadata.
pub fn read_module(source: &str) -> Result<ModuleMetadata, MetadataError> {
  let tokens = tokenize(source)?;
  IlParser::new(source, tokens).parse_module()
}

/// Like [`read_module`], but rejects a module this tool already processed.
pub fn read_unprocessed(source: &str) -> Result<ModuleMetadata, MetadataError> {
  let module = read_module(source)?;

  if module.is_processed() {
    return Err(MetadataError::AlreadyProcessed {
      assembly: module.assembly_name().unwrap_or_default().to_string(),
    });
  }

  Ok(module)
}

impl<'a> IlParser<'a> {
  pub fn new(
    source: &'a str,
    mut tokens: Vec<Token>,
  ) -> Self {
    if tokens.last().map(|t| t.type_) != Some(TokenType::Eof) {
      let end = tokens.last().map(|t| t.end).unwrap_or(0);
      let line = tokens.last().map(|t| t.line).unwrap_or(1);
      tokens.push(Token::new(TokenType::Eof, String::new(), line, end, end));
    }

    IlParser {
      source,
      tokens,
      cursor: 0,
    }
  }

  /// Parse a comma-separated list between delimiters, e.g. `(int32 a, int32 b)`.
  pub(crate) fn parse_delimited_list<T, F>(
    &mut self,
    opening: TokenType,
    closing: TokenType,
    separator: TokenType,
    mut parse_item: F,
  ) -> ParserResult<Vec<T>>
  where
    F: FnMut(&mut Self) -> ParserResult<T>,
  {
    self.expect(opening)?;
    let mut items = Vec::new();

    if self.at(closing) {
      self.expect(closing)?;
      return Ok(items);
    }

    items.push(parse_item(self)?);

    while self.eat(separator) {
      if self.at(closing) {
        break;
      }
      items.push(parse_item(self)?);
    }

    self.expect(closing)?;
    Ok(items)
  }

  fn peek(&self) -> &Token {
    &self.tokens[self.cursor.min(self.tokens.len() - 1)]
  }

  fn peek_nth(
    &self,
    n: usize,
  ) -> &Token {
    &self.tokens[(self.cursor + n).min(self.tokens.len() - 1)]
  }

  fn previous(&self) -> &Token {
    &self.tokens[self.cursor.saturating_sub(1)]
  }

  fn at(
    &self,
    token_type: TokenType,
  ) -> bool {
    self.peek().type_ == token_type
  }

  fn at_word(
    &self,
    word: &str,
  ) -> bool {
    self.peek().is_word(word)
  }

  fn at_directive(&self) -> bool {
    self.peek().is_directive()
  }

  fn is_at_end(&self) -> bool {
    self.at(TokenType::Eof)
  }

  fn eat(
    &mut self,
    token_type: TokenType,
  ) -> bool {
    if self.at(token_type) {
      self.bump();
      true
    } else {
      false
    }
  }

  fn eat_word(
    &mut self,
    word: &str,
  ) -> bool {
    if self.at_word(word) {
      self.bump();
      true
    } else {
      false
    }
  }

  fn expect(
    &mut self,
    token_type: TokenType,
  ) -> ParserResult<&Token> {
    if self.at(token_type) {
      return Ok(self.bump());
    }

    Err(self.unexpected(token_type.describe()))
  }

  fn expect_word(
    &mut self,
    word: &str,
  ) -> ParserResult<()> {
    if self.eat_word(word) {
      return Ok(());
    }

    Err(self.unexpected(&format!("'{}'", word)))
  }

  fn unexpected(
    &self,
    expected: &str,
  ) -> MetadataError {
    let token = self.peek();

    if token.type_ == TokenType::Eof {
      return MetadataError::UnexpectedEof {
        expected: expected.to_string(),
      };
    }

    MetadataError::UnexpectedToken {
      expected: expected.to_string(),
      found: token.to_string(),
      line: token.line,
    }
  }

  /// Advances the cursor. The trailing `Eof` is never consumed.
  fn bump(&mut self) -> &Token {
    let cursor = self.cursor.min(self.tokens.len() - 1);

    if self.cursor < self.tokens.len() - 1 {
      self.cursor += 1;
    }

    &self.tokens[cursor]
  }

  /// Skips a bracketed group including nested groups of the same kind.
  fn skip_balanced(
    &mut self,
    opening: TokenType,
    closing: TokenType,
  ) -> ParserResult<()> {
    self.expect(opening)?;
    let mut depth = 1usize;

    while depth > 0 {
      if self.is_at_end() {
        return Err(self.unexpected(closing.describe()));
      }

      let token = self.bump().type_;
      if token == opening {
        depth += 1;
      } else if token == closing {
        depth -= 1;
      }
    }

    Ok(())
  }

  /// Collects the tokens before the next `{` outside parentheses.
  fn collect_header(&mut self) -> Vec<Token> {
    let mut header = Vec::new();
    let mut depth = 0usize;

    while !self.is_at_end() {
      match self.peek().type_ {
        TokenType::LeftBrace if depth == 0 => break,
        TokenType::LeftParen => depth += 1,
        TokenType::RightParen => depth = depth.saturating_sub(1),
        _ => {},
      }
      header.push(self.bump().clone());
    }

    header
  }

  /// Source text from byte offset `start` to the end of the previous token,
  /// whitespace collapsed.
  fn text_since(
    &self,
    start: usize,
  ) -> String {
    let end = self.previous().end.max(start);
    self.source[start..end].split_whitespace().collect::<Vec<_>>().join(" ")
  }

  /// Metadata token written as `/*06000001*/` between the previous token and the next one.
  fn token_comment(&self) -> Option<u32> {
    let start = self.previous().end;
    let end = self.peek().start.max(start);
    let gap = self.source.get(start..end)?.trim();

    let digits = gap.strip_prefix("/*")?.strip_suffix("*/")?.trim();
    u32::from_str_radix(digits, 16).ok()
  }

  fn sub_parser(
    &self,
    tokens: Vec<Token>,
  ) -> IlParser<'a> {
    IlParser::new(self.source, tokens)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{ManagedType, TypeRef};

  const LISTING: &str = r#"
//  Microsoft (R) .NET Framework IL Disassembler.  Version 4.8.3928.0

.typelist
{
  Sample.Mode
  Sample.Exports
}

// Metadata version: v4.0.30319
.assembly extern mscorlib
{
  .publickeytoken = (B7 7A 5C 56 19 34 E0 89 )                         // .z\V.4..
  .ver 4:0:0:0
}
.assembly Sample
{
  .custom instance void [mscorlib]System.Runtime.CompilerServices.CompilationRelaxationsAttribute::.ctor(int32) = ( 01 00 08 00 00 00 00 00 )
  .hash algorithm 0x00008004
  .ver 1:2:0:0
}
.module Sample.dll
// MVID: {4A4B0E35-3B2C-4C4F-9B71-3E4A8E2C4F11}
.imagebase 0x10000000
.file alignment 0x00000200
.stackreserve 0x00100000
.subsystem 0x0003       // WINDOWS_CUI
.corflags 0x00000001    //  ILONLY

// =============== CLASS MEMBERS DECLARATION ===================

.class public auto ansi sealed Sample.Mode
       extends [mscorlib]System.Enum
{
  .field public specialname rtspecialname int32 value__
  .field public static literal valuetype Sample.Mode Fast = int32(0x00000000)
  .field public static literal valuetype Sample.Mode Slow = int32(0xFFFFFFFF)
} // end of class Sample.Mode

.class public auto ansi beforefieldinit Sample.Exports
       extends [mscorlib]System.Object
{
  .class auto ansi nested private beforefieldinit Helper
         extends [mscorlib]System.Object
  {
    .method public hidebysig static void  Touch() cil managed
    {
      .maxstack  8
      IL_0000:  ret
    } // end of method Helper::Touch
  } // end of class Helper

  .method public hidebysig static int32  Add(int32 a,
                                             int32 b) cil managed
  {
    .custom instance void DllExportAttribute::.ctor(string,
                                                    valuetype [mscorlib]System.Runtime.InteropServices.CallingConvention) = ( 01 00 03 41 64 64 02 00 00 00 00 00 )
    // Code size       4 (0x4)
    .maxstack  8
    IL_0000:  ldarg.0
    IL_0001:  ldarg.1
    IL_0002:  add
    IL_0003:  ret
  } // end of method Exports::Add

  .method public hidebysig static void  Greet(string  marshal( lpwstr) name,
                                              [out] int32& count) cil managed
  {
    .param [1]
    .custom instance void [mscorlib]System.Runtime.CompilerServices.IsConstAttribute::.ctor() = ( 01 00 00 00 )
    .maxstack  8
    IL_0000:  ldarg.1
    IL_0001:  ldc.i4.0
    IL_0002:  stind.i4
    IL_0003:  ret
  } // end of method Exports::Greet

  .method public hidebysig specialname rtspecialname
          instance void  .ctor() cil managed
  {
    .maxstack  8
    IL_0000:  ldarg.0
    IL_0001:  call       instance void [mscorlib]System.Object::.ctor()
    IL_0006:  ret
  } // end of method Exports::.ctor

  .property instance int32 Count()
  {
    .get instance int32 Sample.Exports::get_Count()
  } // end of property Exports::Count
} // end of class Sample.Exports
"#;

  #[test]
  fn test_reads_assembly_manifest() {
    let module = read_module(LISTING).unwrap();
    let assembly = module.assembly.as_ref().unwrap();

    assert_eq!(assembly.name, "Sample");
    assert_eq!(assembly.version.as_deref(), Some("1:2:0:0"));
    assert_eq!(module.module_name.as_deref(), Some("Sample.dll"));
    assert_eq!(module.extern_assemblies.len(), 1);
    assert_eq!(module.extern_assemblies[0].name, "mscorlib");
    assert!(module.extern_assemblies[0].body.contains(".ver 4:0:0:0"));
  }

  #[test]
  fn test_reads_types_and_nested_types() {
    let module = read_module(LISTING).unwrap();
    let names: Vec<_> = module.types.iter().map(|t| t.name.as_str()).collect();

    assert_eq!(names, vec!["Sample.Mode", "Sample.Exports", "Sample.Exports/Helper"]);
    assert_eq!(module.find_type("Sample.Exports/Helper").unwrap().methods.len(), 1);
  }

  #[test]
  fn test_reads_enum_literals() {
    let module = read_module(LISTING).unwrap();
    let mode = module.find_type("Sample.Mode").unwrap();

    assert_eq!(mode.enum_underlying(), Some(&ManagedType::I32));
    let literals = mode.enum_literals();
    assert_eq!(literals[0].value, 0);
    assert_eq!(literals[1].value, -1);
  }

  #[test]
  fn test_reads_method_signatures_and_attributes() {
    let module = read_module(LISTING).unwrap();
    let exports = module.find_type("Sample.Exports").unwrap();

    let add = &exports.methods[0];
    assert_eq!(add.name, "Add");
    assert!(add.is_public_static());
    let signature = add.signature.as_ref().unwrap();
    assert_eq!(signature.return_type, ManagedType::I32);
    assert_eq!(signature.params.len(), 2);
    assert_eq!(signature.params[1].name.as_deref(), Some("b"));

    let attribute = &add.custom_attributes[0];
    assert_eq!(attribute.attribute_type, TypeRef::local("DllExportAttribute"));
    assert_eq!(attribute.ctor_params.len(), 2);
    assert_eq!(attribute.value.as_ref().unwrap().len(), 12);

    let greet = &exports.methods[1];
    let params = &greet.signature.as_ref().unwrap().params;
    assert!(params[0].marshal.as_ref().unwrap().is_wide_string());
    assert_eq!(params[0].custom_attributes.len(), 1);
    assert_eq!(params[1].flags, vec!["out"]);
    assert_eq!(params[1].type_, ManagedType::ByRef(Box::new(ManagedType::I32)));

    let ctor = &exports.methods[2];
    assert_eq!(ctor.name, ".ctor");
    assert!(ctor.signature.as_ref().unwrap().instance);
  }

  #[test]
  fn test_reads_method_tokens() {
    let source = r#"
.assembly Sample { }
.class /*02000002*/ public auto ansi Sample.Exports
       extends [mscorlib/*23000001*/]System.Object/*01000001*/
{
  .method /*06000001*/ public hidebysig static int32  Add(int32 a) cil managed
  {
    ret
  }

  .method public hidebysig static void  Plain() cil managed
  {
    ret
  }
}
"#;
    let module = read_module(source).unwrap();
    let methods = &module.find_type("Sample.Exports").unwrap().methods;

    assert_eq!(methods[0].name, "Add");
    assert_eq!(methods[0].token, Some(0x0600_0001));
    assert_eq!(methods[1].token, None);
  }

  #[test]
  fn test_listing_without_manifest_is_rejected() {
    assert_eq!(read_module(".class public A { }"), Err(MetadataError::MissingAssembly));
  }

  #[test]
  fn test_processed_module_is_rejected() {
    let source = ".assembly NativeExports.Sample { }\n.module NativeExports.Sample.dll";
    assert!(read_module(source).is_ok());
    assert_eq!(
      read_unprocessed(source),
      Err(MetadataError::AlreadyProcessed {
        assembly: "NativeExports.Sample".to_string()
      })
    );
  }

  #[test]
  fn test_unterminated_class_is_an_error() {
    let result = read_module(".assembly A { }\n.class public B extends [mscorlib]System.Object {");
    assert!(matches!(result, Err(MetadataError::UnexpectedEof { .. })));
  }
}
