use std::fmt::{self, Display, Formatter, Write as _};

use crate::ast::{
    Definition, Directive, DirectiveDefinition, FieldDefinition, InputValueDefinition, Schema,
    SchemaDefinition, TypeDefinition, TypeKind, TypeRef, Value,
};

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, def) in self.definitions.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            match def {
                Definition::Type(t) => write!(f, "{}", t)?,
                Definition::Directive(d) => write!(f, "{}", d)?,
                Definition::Schema(s) => write!(f, "{}", s)?,
            }
        }
        if !self.definitions.is_empty() {
            f.write_char('\n')?;
        }
        Ok(())
    }
}

impl Display for TypeDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.extension {
            f.write_str("extend ")?;
        }
        write!(f, "{} {}", self.kind.keyword(), self.name)?;
        if !self.interfaces.is_empty() {
            write!(f, " implements {}", self.interfaces.join(" & "))?;
        }
        write_directives(f, &self.directives)?;
        match self.kind {
            TypeKind::Object | TypeKind::Interface if !self.fields.is_empty() => {
                f.write_str(" {\n")?;
                for field in &self.fields {
                    writeln!(f, "  {}", field)?;
                }
                f.write_char('}')
            }
            TypeKind::InputObject if !self.input_fields.is_empty() => {
                f.write_str(" {\n")?;
                for field in &self.input_fields {
                    writeln!(f, "  {}", field)?;
                }
                f.write_char('}')
            }
            TypeKind::Enum if !self.enum_values.is_empty() => {
                f.write_str(" {\n")?;
                for value in &self.enum_values {
                    write!(f, "  {}", value.name)?;
                    write_directives(f, &value.directives)?;
                    f.write_char('\n')?;
                }
                f.write_char('}')
            }
            TypeKind::Union if !self.union_members.is_empty() => {
                write!(f, " = {}", self.union_members.join(" | "))
            }
            _ => Ok(()),
        }
    }
}

impl Display for FieldDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        write_arguments_definition(f, &self.arguments)?;
        write!(f, ": {}", self.ty)?;
        write_directives(f, &self.directives)
    }
}

impl Display for InputValueDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)?;
        if let Some(default) = &self.default_value {
            write!(f, " = {}", default)?;
        }
        write_directives(f, &self.directives)
    }
}

impl Display for DirectiveDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "directive @{}", self.name)?;
        write_arguments_definition(f, &self.arguments)?;
        if self.repeatable {
            f.write_str(" repeatable")?;
        }
        write!(f, " on {}", self.locations.join(" | "))
    }
}

impl Display for SchemaDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("schema")?;
        write_directives(f, &self.directives)?;
        f.write_str(" {\n")?;
        for (op, ty) in &self.operations {
            writeln!(f, "  {}: {}", op, ty)?;
        }
        f.write_char('}')
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(n) => f.write_str(n),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

impl Display for Directive {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.arguments.is_empty() {
            f.write_char('(')?;
            for (i, (name, value)) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {}", name, value)?;
            }
            f.write_char(')')?;
        }
        Ok(())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                // Keep a decimal point so the value lexes back as a float.
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::String(s) => write_string(f, s),
            Value::Enum(e) => f.write_str(e),
            Value::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            Value::Object(fields) => {
                f.write_str("{ ")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str(" }")
            }
        }
    }
}

fn write_directives(f: &mut Formatter<'_>, directives: &[Directive]) -> fmt::Result {
    for d in directives {
        write!(f, " {}", d)?;
    }
    Ok(())
}

fn write_arguments_definition(f: &mut Formatter<'_>, args: &[InputValueDefinition]) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    f.write_char('(')?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    f.write_char(')')
}

fn write_string(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}
