use std::io::IsTerminal;
use std::path::Path;

use crate::args::{conform_to_schema, parse_args};
use crate::error::TicktickError;
use crate::runtime::Runtime;

use super::output::{print_call_result, OutputMode};

/// Run the call command.
pub async fn run_call(
    credentials: Option<&Path>,
    tool: &str,
    args: &[String],
    raw: bool,
    json: bool,
) -> Result<(), TicktickError> {
    let mode = OutputMode::from_flags(raw, json);
    let is_tty = std::io::stdout().is_terminal();

    let runtime = Runtime::from_config(credentials)?;
    let mut parsed = parse_args(tool, args)?;
    if let Some(def) = runtime.list_tools().into_iter().find(|d| d.name == tool) {
        conform_to_schema(&mut parsed, &def.input_schema);
    }

    let result = runtime.call_tool(tool, parsed).await?;
    print_call_result(&result, mode, is_tty);
    Ok(())
}
