use crate::ast::{
    Definition, Directive, DirectiveDefinition, EnumValue, FieldDefinition, InputValueDefinition,
    Schema, SchemaDefinition, TypeDefinition, TypeKind, TypeRef, Value,
};
use crate::error::ParseError;
use crate::lexer::{Spanned, Token, tokenize};

/// Parse SDL text into a [`Schema`].
pub fn parse_schema(src: &str) -> Result<Schema, ParseError> {
    let mut parser = Parser::new(src)?;
    let mut definitions = Vec::new();
    while !parser.at_eof() {
        definitions.push(parser.definition()?);
    }
    Ok(Schema { definitions })
}

/// Parse a single `directive @name(...) on ...` definition.
pub fn parse_directive_definition(src: &str) -> Result<DirectiveDefinition, ParseError> {
    let schema = parse_schema(src)?;
    let mut defs = schema.definitions.into_iter();
    match (defs.next(), defs.next()) {
        (Some(Definition::Directive(d)), None) => Ok(d),
        _ => Err(ParseError::new(
            "expected exactly one directive definition",
            1,
            1,
        )),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let span = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        ParseError::new(message, span.line, span.column)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        self.error(format!(
            "expected {}, found {}",
            expected,
            self.peek().describe()
        ))
    }

    fn is_punct(&self, c: char) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == c)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.is_punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", c)))
        }
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Name(n) if n == kw)
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Token::Name(n) => {
                let n = n.clone();
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn skip_description(&mut self) {
        if matches!(self.peek(), Token::Str(_)) {
            self.advance();
        }
    }

    fn definition(&mut self) -> Result<Definition, ParseError> {
        self.skip_description();
        let extension = self.eat_keyword("extend");
        let keyword = self.name()?;
        let def = match keyword.as_str() {
            "type" => Definition::Type(self.object_like(TypeKind::Object)?),
            "interface" => Definition::Type(self.object_like(TypeKind::Interface)?),
            "input" => Definition::Type(self.input_object()?),
            "enum" => Definition::Type(self.enum_type()?),
            "union" => Definition::Type(self.union_type()?),
            "scalar" => {
                let name = self.name()?;
                let mut t = TypeDefinition::new(TypeKind::Scalar, name);
                t.directives = self.directives()?;
                Definition::Type(t)
            }
            "directive" if !extension => Definition::Directive(self.directive_definition()?),
            "schema" => Definition::Schema(self.schema_definition()?),
            other => {
                return Err(self.error(format!("unsupported definition '{}'", other)));
            }
        };
        Ok(match def {
            Definition::Type(mut t) => {
                t.extension = extension;
                Definition::Type(t)
            }
            other => other,
        })
    }

    fn object_like(&mut self, kind: TypeKind) -> Result<TypeDefinition, ParseError> {
        let name = self.name()?;
        let mut t = TypeDefinition::new(kind, name);
        if self.eat_keyword("implements") {
            self.eat_punct('&');
            t.interfaces.push(self.name()?);
            loop {
                if self.eat_punct('&') || self.peek_is_interface_continuation() {
                    t.interfaces.push(self.name()?);
                } else {
                    break;
                }
            }
        }
        t.directives = self.directives()?;
        if self.eat_punct('{') {
            while !self.eat_punct('}') {
                t.fields.push(self.field_definition()?);
            }
        }
        Ok(t)
    }

    /// Legacy comma/space separated interface lists (`implements A, B`).
    fn peek_is_interface_continuation(&self) -> bool {
        let Token::Name(n) = self.peek() else {
            return false;
        };
        let is_keyword = matches!(
            n.as_str(),
            "type" | "interface" | "input" | "enum" | "union" | "scalar" | "directive" | "schema"
                | "extend"
        );
        !is_keyword
            && matches!(
                self.peek_at(1),
                Token::Punct('{') | Token::Punct('@') | Token::Punct('&') | Token::Name(_)
            )
    }

    fn field_definition(&mut self) -> Result<FieldDefinition, ParseError> {
        self.skip_description();
        let name = self.name()?;
        let arguments = if self.is_punct('(') {
            self.arguments_definition()?
        } else {
            vec![]
        };
        self.expect_punct(':')?;
        let ty = self.type_ref()?;
        let directives = self.directives()?;
        Ok(FieldDefinition {
            name,
            arguments,
            ty,
            directives,
        })
    }

    fn arguments_definition(&mut self) -> Result<Vec<InputValueDefinition>, ParseError> {
        self.expect_punct('(')?;
        let mut out = Vec::new();
        while !self.eat_punct(')') {
            out.push(self.input_value_definition()?);
        }
        Ok(out)
    }

    fn input_value_definition(&mut self) -> Result<InputValueDefinition, ParseError> {
        self.skip_description();
        let name = self.name()?;
        self.expect_punct(':')?;
        let ty = self.type_ref()?;
        let default_value = if self.eat_punct('=') {
            Some(self.value()?)
        } else {
            None
        };
        let directives = self.directives()?;
        Ok(InputValueDefinition {
            name,
            ty,
            default_value,
            directives,
        })
    }

    fn input_object(&mut self) -> Result<TypeDefinition, ParseError> {
        let name = self.name()?;
        let mut t = TypeDefinition::new(TypeKind::InputObject, name);
        t.directives = self.directives()?;
        if self.eat_punct('{') {
            while !self.eat_punct('}') {
                t.input_fields.push(self.input_value_definition()?);
            }
        }
        Ok(t)
    }

    fn enum_type(&mut self) -> Result<TypeDefinition, ParseError> {
        let name = self.name()?;
        let mut t = TypeDefinition::new(TypeKind::Enum, name);
        t.directives = self.directives()?;
        if self.eat_punct('{') {
            while !self.eat_punct('}') {
                self.skip_description();
                let name = self.name()?;
                let directives = self.directives()?;
                t.enum_values.push(EnumValue { name, directives });
            }
        }
        Ok(t)
    }

    fn union_type(&mut self) -> Result<TypeDefinition, ParseError> {
        let name = self.name()?;
        let mut t = TypeDefinition::new(TypeKind::Union, name);
        t.directives = self.directives()?;
        if self.eat_punct('=') {
            self.eat_punct('|');
            t.union_members.push(self.name()?);
            while self.eat_punct('|') {
                t.union_members.push(self.name()?);
            }
        }
        Ok(t)
    }

    fn directive_definition(&mut self) -> Result<DirectiveDefinition, ParseError> {
        self.expect_punct('@')?;
        let name = self.name()?;
        let arguments = if self.is_punct('(') {
            self.arguments_definition()?
        } else {
            vec![]
        };
        let repeatable = self.eat_keyword("repeatable");
        if !self.eat_keyword("on") {
            return Err(self.unexpected("'on'"));
        }
        self.eat_punct('|');
        let mut locations = vec![self.name()?];
        while self.eat_punct('|') {
            locations.push(self.name()?);
        }
        Ok(DirectiveDefinition {
            name,
            arguments,
            repeatable,
            locations,
        })
    }

    fn schema_definition(&mut self) -> Result<SchemaDefinition, ParseError> {
        let directives = self.directives()?;
        let mut operations = Vec::new();
        self.expect_punct('{')?;
        while !self.eat_punct('}') {
            let op = self.name()?;
            self.expect_punct(':')?;
            let ty = self.name()?;
            operations.push((op, ty));
        }
        Ok(SchemaDefinition {
            directives,
            operations,
        })
    }

    fn type_ref(&mut self) -> Result<TypeRef, ParseError> {
        let base = if self.eat_punct('[') {
            let inner = self.type_ref()?;
            self.expect_punct(']')?;
            TypeRef::list(inner)
        } else {
            TypeRef::Named(self.name()?)
        };
        if self.eat_punct('!') {
            Ok(TypeRef::non_null(base))
        } else {
            Ok(base)
        }
    }

    fn directives(&mut self) -> Result<Vec<Directive>, ParseError> {
        let mut out = Vec::new();
        while self.eat_punct('@') {
            let name = self.name()?;
            let mut arguments = Vec::new();
            if self.eat_punct('(') {
                while !self.eat_punct(')') {
                    let arg = self.name()?;
                    self.expect_punct(':')?;
                    arguments.push((arg, self.value()?));
                }
            }
            out.push(Directive { name, arguments });
        }
        Ok(out)
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        match self.peek().clone() {
            Token::Int(i) => {
                self.advance();
                Ok(Value::Int(i))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Value::Float(f))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Value::String(s))
            }
            Token::Name(n) => {
                self.advance();
                Ok(match n.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "null" => Value::Null,
                    _ => Value::Enum(n),
                })
            }
            Token::Punct('[') => {
                self.advance();
                let mut items = Vec::new();
                while !self.eat_punct(']') {
                    items.push(self.value()?);
                }
                Ok(Value::List(items))
            }
            Token::Punct('{') => {
                self.advance();
                let mut fields = Vec::new();
                while !self.eat_punct('}') {
                    let key = self.name()?;
                    self.expect_punct(':')?;
                    fields.push((key, self.value()?));
                }
                Ok(Value::Object(fields))
            }
            Token::Punct('$') => Err(self.error("variables are not allowed in schema documents")),
            _ => Err(self.unexpected("a value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_model_with_field_directives() {
        let schema = parse_schema(
            r#"
            """A blog post."""
            type Post @model @auth(rules: [{ allow: owner, operations: [create, update] }]) {
              id: ID!
              title: String!
              comments: [Comment] @connection(name: "PostComments", limit: 50)
            }
            "#,
        )
        .unwrap();

        let post = schema.type_named("Post").unwrap();
        assert_eq!(post.kind, TypeKind::Object);
        assert_eq!(post.directives.len(), 2);
        let rules = post.directive("auth").unwrap().argument("rules").unwrap();
        let rule = &rules.as_list().unwrap()[0];
        assert_eq!(rule.field("allow"), Some(&Value::Enum("owner".into())));

        let comments = post.field("comments").unwrap();
        assert_eq!(comments.ty, TypeRef::list(TypeRef::named("Comment")));
        let conn = comments.directive("connection").unwrap();
        assert_eq!(conn.argument("limit"), Some(&Value::Int(50)));
    }

    #[test]
    fn parses_other_definition_kinds() {
        let schema = parse_schema(
            r#"
            schema { query: Query mutation: Mutation }
            directive @key(name: String, fields: [String!]!) repeatable on OBJECT
            enum Status { DRAFT PUBLISHED @deprecated }
            union Result = | Post | Comment
            input CreatePostInput { title: String! = "untitled" }
            scalar AWSDateTime
            interface Node { id: ID! }
            type Post implements Node & Entity { id: ID! }
            extend type Query { ping(times: Int = 1): String }
            "#,
        )
        .unwrap();

        assert_eq!(schema.definitions.len(), 9);
        let key = schema.directive_definitions().next().unwrap();
        assert!(key.repeatable);
        assert_eq!(key.locations, vec!["OBJECT".to_string()]);

        let status = schema.type_named("Status").unwrap();
        assert_eq!(status.enum_values.len(), 2);
        let result = schema.type_named("Result").unwrap();
        assert_eq!(result.union_members, vec!["Post", "Comment"]);
        let input = schema.type_named("CreatePostInput").unwrap();
        assert_eq!(
            input.input_fields[0].default_value,
            Some(Value::String("untitled".into()))
        );
        let post = schema.type_named("Post").unwrap();
        assert_eq!(post.interfaces, vec!["Node", "Entity"]);

        let query_ext = schema.types().find(|t| t.name == "Query").unwrap();
        assert!(query_ext.extension);
        assert!(schema.type_named("Query").is_none());
    }

    #[test]
    fn rejects_unclosed_type() {
        let err = parse_schema("type Post @model { id: ID!").unwrap_err();
        assert!(err.message.contains("expected a name"), "{}", err);
    }

    #[test]
    fn rejects_variables() {
        let err = parse_schema("type A @d(x: $y) { id: ID }").unwrap_err();
        assert!(err.message.contains("variables"));
    }

    #[test]
    fn directive_definition_requires_single_definition() {
        let def = parse_directive_definition("directive @queue(name: String) on OBJECT").unwrap();
        assert_eq!(def.name, "queue");
        assert!(parse_directive_definition("type A { id: ID }").is_err());
    }
}
