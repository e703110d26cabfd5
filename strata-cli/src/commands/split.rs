//! `strata split` command - Print the statements of one script.

use std::path::Path;

use strata_migrate::{Dialect, ParserConfig, ScriptParserFactory};

use crate::cli::SplitArgs;
use crate::config::ProjectConfig;
use crate::error::CliResult;
use crate::output;

/// Run the split command
pub async fn run(config_path: Option<&Path>, args: SplitArgs) -> CliResult<()> {
    // dialect and parameters come from the config when there is one
    let mut parser_config = ProjectConfig::load_optional(config_path)?
        .map(|project| project.migration.parser)
        .unwrap_or_default();
    if let Some(dialect) = &args.dialect {
        parser_config.dialect = dialect.parse::<Dialect>()?;
    }

    let text = tokio::fs::read_to_string(&args.file).await?;
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let statements = split(&parser_config, &name, &text)?;
    for statement in &statements {
        if statement.ends_with('\n') {
            println!("{}/", statement);
        } else {
            println!("{};", statement);
        }
    }

    output::status(&format!(
        "{}: {} statement(s) ({})",
        name,
        statements.len(),
        parser_config.dialect
    ));
    Ok(())
}

/// Split script text the way an update would.
pub fn split(config: &ParserConfig, name: &str, text: &str) -> CliResult<Vec<String>> {
    let factory = ScriptParserFactory::new(config);
    Ok(factory.parser_for_text(name, text).statements()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_generic() {
        let statements = split(&ParserConfig::default(), "a.sql", "select 1;\nselect 2;\n").unwrap();
        assert_eq!(statements, vec!["select 1", "select 2"]);
    }

    #[test]
    fn test_split_oracle_block() {
        let config = ParserConfig {
            dialect: Dialect::Oracle,
            ..Default::default()
        };
        let statements = split(&config, "a.sql", "create function f statement;\n/\n").unwrap();
        assert_eq!(statements, vec!["create function f statement;\n"]);
    }

    #[test]
    fn test_split_reports_unterminated_statement() {
        let err = split(&ParserConfig::default(), "a.sql", "select 1").unwrap_err();
        assert!(err.to_string().contains("a.sql"));
    }
}
