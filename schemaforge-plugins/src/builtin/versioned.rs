use super::{require_model, resolver_file, str_arg};
use schemaforge_plugin_api::{FragmentSet, Schema, Transformer};

/// `@versioned`: optimistic concurrency on a model's mutations.
#[derive(Debug, Default)]
pub struct VersionedTransformer;

impl Transformer for VersionedTransformer {
    fn name(&self) -> &str {
        "VersionedTransformer"
    }

    fn directive(&self) -> Option<String> {
        Some(
            "directive @versioned(versionField: String = \"version\", versionInput: String = \"expectedVersion\") on OBJECT"
                .to_string(),
        )
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        for t in schema.object_types_with("versioned") {
            require_model(t, "versioned", &fragments)?;
            let Some(directive) = t.directive("versioned") else {
                continue;
            };
            let field = str_arg(directive, "versionField", "version");
            let input = str_arg(directive, "versionInput", "expectedVersion");

            let create = resolver_file("Mutation", &format!("create{}", t.name), "req");
            if let Some(template) = fragments.resolvers.get_mut(&create) {
                template.insert_str(
                    0,
                    &format!("$util.qr($ctx.args.input.put(\"{}\", 1))\n", field),
                );
            }
            for op in ["update", "delete"] {
                let file = resolver_file("Mutation", &format!("{}{}", op, t.name), "req");
                if let Some(template) = fragments.resolvers.get_mut(&file) {
                    template.insert_str(
                        0,
                        &format!(
                            "#set($condition = {{ \"expression\": \"#{0} = :{1}\", \"expressionNames\": {{ \"#{0}\": \"{0}\" }}, \"expressionValues\": {{ \":{1}\": $util.dynamodb.toDynamoDB($ctx.args.input.{1}) }} }})\n$util.qr($ctx.args.input.remove(\"{1}\"))\n",
                            field, input
                        ),
                    );
                }
                fragments.add_schema(format!(
                    "extend input {}{}Input {{\n  {}: Int!\n}}",
                    super::upper_first(op),
                    t.name,
                    input
                ));
            }
        }
        Ok(fragments)
    }
}
