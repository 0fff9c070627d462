use std::io::IsTerminal;

use colored::Colorize;

use crate::error::TicktickError;
use crate::tools::ToolRegistry;
use crate::types::ToolDefinition;

/// Format a tool definition as a function signature string, required
/// parameters first.
pub fn format_tool_signature(tool: &ToolDefinition) -> String {
    let schema = &tool.input_schema;
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut params: Vec<(bool, String)> = Vec::new();
    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, prop_schema) in props {
            let type_str = prop_schema
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("any");
            let is_required = required.contains(&name.as_str());
            let param = if is_required {
                format!("{name}: {type_str}")
            } else {
                format!("{name}?: {type_str}")
            };
            params.push((!is_required, param));
        }
    }
    params.sort_by_key(|(optional, _)| *optional);

    let params: Vec<String> = params.into_iter().map(|(_, p)| p).collect();
    format!("{}({})", tool.name, params.join(", "))
}

/// Run the tools command.
pub fn run_tools(json: bool) -> Result<(), TicktickError> {
    let definitions = ToolRegistry::standard().definitions();

    if json {
        let out = serde_json::to_string_pretty(&definitions)
            .map_err(|e| TicktickError::TransportError(Box::new(e)))?;
        println!("{out}");
        return Ok(());
    }

    let is_tty = std::io::stdout().is_terminal();
    for def in &definitions {
        let signature = format_tool_signature(def);
        if is_tty {
            println!("  {}", signature.bold());
            println!("    {}", def.description.dimmed());
        } else {
            println!("  {signature}");
            println!("    {}", def.description);
        }
    }
    Ok(())
}
