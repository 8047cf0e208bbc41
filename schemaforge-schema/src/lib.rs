//! Schema model for annotated API schemas.
//!
//! This crate owns parsing SDL text into a [`Schema`], printing it back, and
//! analysing which directives are applied where ([`collect_directives_by_type`]).
//! It does not know what any directive means; that is the plugins' job.

mod ast;
mod directives;
mod error;
mod lexer;
mod parser;
mod print;
mod project;

pub use ast::{
    Definition, Directive, DirectiveDefinition, EnumValue, FieldDefinition, InputValueDefinition,
    Schema, SchemaDefinition, TypeDefinition, TypeKind, TypeRef, Value,
};
pub use directives::{DirectiveUsageMap, collect_directives_by_type, normalize_directive_name};
pub use error::ParseError;
pub use parser::{parse_directive_definition, parse_schema};
pub use project::{read_project_schema, schema_sources};
