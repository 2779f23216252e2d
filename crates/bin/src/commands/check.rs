//! Schema check command - validates a schema file and lists every field.

use formstack::{
    EngineConfig,
    registry::{FieldDescriptor, FieldRegistry},
    schema::SchemaSet,
};

use crate::cli::CheckArgs;
use crate::output::{OutputFormat, print_json, print_table};

/// Run the check command
pub fn run(args: &CheckArgs, config: &EngineConfig, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let schemas = SchemaSet::from_path(&args.schema)?;
    let registry = FieldRegistry::new(config.clone());
    let locale = config.default_locale.as_str();

    let collections = match &args.collection {
        Some(slug) => vec![schemas.collection(slug)?],
        None => schemas.iter().cloned().collect(),
    };

    match format {
        OutputFormat::Human => {
            for collection in &collections {
                println!("{}", collection.slug);
                let rows: Vec<Vec<String>> = registry
                    .describe(collection, locale)
                    .iter()
                    .map(table_row)
                    .collect();
                if rows.is_empty() {
                    println!("  (no fields)");
                }
                print_table(&["PATH", "KIND", "CONTROLLER", "LABEL", "FLAGS"], &rows);
                println!();
            }
        }
        OutputFormat::Json => {
            let value: serde_json::Map<String, serde_json::Value> = collections
                .iter()
                .map(|collection| -> Result<_, serde_json::Error> {
                    let fields = registry.describe(collection, locale);
                    Ok((collection.slug.clone(), serde_json::to_value(fields)?))
                })
                .collect::<Result<_, serde_json::Error>>()?;
            print_json(&value)?;
        }
    }

    Ok(())
}

fn table_row(field: &FieldDescriptor) -> Vec<String> {
    let path = match &field.block {
        Some(block) => format!("{} [{block}]", field.path),
        None => field.path.to_string(),
    };
    let mut flags = Vec::new();
    if field.required {
        flags.push("required");
    }
    if field.read_only {
        flags.push("read-only");
    }
    if !field.editable && !field.read_only {
        flags.push("display");
    }
    vec![
        path,
        field.kind.to_string(),
        format!("{:?}", field.controller).to_lowercase(),
        field.label.clone(),
        flags.join(","),
    ]
}
