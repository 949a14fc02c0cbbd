//! Syntax-tree conversion strategy.
//!
//! Parses the statement with sqlparser's MySQL dialect, rewrites the tree, and
//! renders it back. Rendering keeps MySQL identifier quoting and table
//! options; the postprocess pass handles both.

use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_relations_mut, ColumnOption, DataType, Ident, ObjectName, Statement, TableConstraint,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use super::{text, typemap, ConversionStrategy, StatementKind};
use crate::core::identifier::TargetSchema;

/// Tree transpilation through sqlparser.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeStrategy;

impl ConversionStrategy for TreeStrategy {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn rewrite(
        &self,
        statement: &str,
        target: &TargetSchema,
        warnings: &mut Vec<String>,
    ) -> Result<String, String> {
        let statement = without_table_options(statement);
        let mut statements =
            Parser::parse_sql(&MySqlDialect {}, statement).map_err(|e| e.to_string())?;
        if statements.len() != 1 {
            return Err(format!("expected one statement, parsed {}", statements.len()));
        }
        let mut statement = statements.remove(0);

        match &mut statement {
            Statement::CreateTable(create) => {
                let table = last_part(&create.name);
                for column in &mut create.columns {
                    let auto_increment = column
                        .options
                        .iter()
                        .any(|def| is_auto_increment(&def.option));
                    let mapping =
                        typemap::map_type_text(&column.data_type.to_string(), auto_increment);
                    if let Some(warning) = &mapping.warning {
                        warnings.push(format!("{}.{}: {}", table, column.name.value, warning));
                    }
                    column.data_type = DataType::Custom(
                        ObjectName(vec![Ident::new(mapping.target_type)]),
                        vec![],
                    );
                    column.options.retain(|def| keep_column_option(&def.option));
                }
                create.constraints.retain(keep_table_constraint);
                create.name = target.object_name(&table);
            }
            Statement::Drop { names, .. } => {
                for name in names.iter_mut() {
                    *name = target.object_name(&last_part(name));
                }
            }
            Statement::Insert(insert) => {
                insert.table_name = target.object_name(&last_part(&insert.table_name));
            }
            _ => {}
        }

        // DELETE and any relation not handled above
        let _ = visit_relations_mut(&mut statement, |name| {
            if name.0.len() == 1 {
                *name = target.object_name(&name.0[0].value);
            }
            ControlFlow::<()>::Continue(())
        });

        Ok(statement.to_string())
    }
}

/// Cut a `CREATE TABLE` after its column list.
///
/// Table options are discarded anyway, and several of them (ROW_FORMAT,
/// STATS_PERSISTENT, ...) are not understood by the parser.
fn without_table_options(statement: &str) -> &str {
    if StatementKind::detect(statement) != StatementKind::CreateTable {
        return statement;
    }
    text::first_open_paren(statement)
        .and_then(|open| text::matching_paren(statement, open))
        .map(|close| &statement[..=close])
        .unwrap_or(statement)
}

fn last_part(name: &ObjectName) -> String {
    name.0.last().map(|ident| ident.value.clone()).unwrap_or_default()
}

fn is_auto_increment(option: &ColumnOption) -> bool {
    match option {
        ColumnOption::DialectSpecific(tokens) => tokens
            .iter()
            .any(|t| t.to_string().eq_ignore_ascii_case("AUTO_INCREMENT")),
        _ => false,
    }
}

/// Column options with a PostgreSQL equivalent that cannot break bulk load.
fn keep_column_option(option: &ColumnOption) -> bool {
    !matches!(
        option,
        ColumnOption::ForeignKey { .. }
            | ColumnOption::Unique {
                is_primary: false,
                ..
            }
            | ColumnOption::OnUpdate(_)
            | ColumnOption::DialectSpecific(_)
            | ColumnOption::Comment(_)
            | ColumnOption::CharacterSet(_)
    )
}

/// Primary keys and checks survive; foreign keys and all index-backed
/// declarations are dropped.
fn keep_table_constraint(constraint: &TableConstraint) -> bool {
    matches!(
        constraint,
        TableConstraint::PrimaryKey { .. } | TableConstraint::Check { .. }
    )
}
