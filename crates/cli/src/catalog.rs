// `otledger catalog`: show the templates and what the engine inferred.

use std::io::{self, Write};
use std::path::Path;

use otledger_ledger::{Catalog, Rule};

use crate::{load_catalog, CliError};

pub fn cmd_catalog(path: Option<&Path>, json: bool) -> Result<(), CliError> {
    let catalog = load_catalog(path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        let text = serde_json::to_string_pretty(&catalog).map_err(|e| CliError::catalog(e.to_string()))?;
        writeln!(out, "{text}").map_err(|e| CliError::usage(e.to_string()))?;
    } else {
        write_table(&mut out, &catalog).map_err(|e| CliError::usage(e.to_string()))?;
    }
    Ok(())
}

fn write_table(out: &mut impl Write, catalog: &Catalog) -> io::Result<()> {
    writeln!(out, "{:>3}  {:<24} {:<20} {:<5} {:>12}  DESCRIPTION", "#", "BLOCK", "RULE", "UNIT", "UNIT PRICE")?;
    for template in catalog.templates() {
        writeln!(
            out,
            "{:>3}  {:<24} {:<20} {:<5} {:>12.2}  {}",
            template.id,
            template.block.title(),
            template.rule.kind(),
            template.unit,
            template.unit_price,
            template.description
        )?;
    }
    let unmatched = catalog.templates().iter().filter(|t| t.rule == Rule::Unmatched).count();
    writeln!(out, "\n{} template(s), {} never applied by the engine", catalog.len(), unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_every_template() {
        let catalog = Catalog::builtin().unwrap();
        let mut buf = Vec::new();
        write_table(&mut buf, &catalog).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("luminaire_transport"));
        assert!(text.contains("TRANSPORTE DE LUMINARIA"));
        assert_eq!(text.lines().filter(|l| l.contains("  ")).count() - 1, catalog.len());
    }
}
