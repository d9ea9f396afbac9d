//! Statement AST to [`Command`] translation

use docsql_ir::{
    duplicate_result_name, Assignment, Command, DeleteCommand, Expression, InsertCommand,
    NativeDocument, Paging, Projection, SelectCommand, SortKey, UpdateCommand, Value,
};
use sqlparser::ast::{
    self, AssignmentTarget, DuplicateTreatment, Expr, FromTable, Function, FunctionArg,
    FunctionArgExpr, FunctionArguments, GroupByExpr, LimitClause, OrderBy, OrderByKind, Query,
    SelectItem, SetExpr, Statement, TableFactor, TableObject, TableWithJoins,
};
use tracing::debug;

use crate::literal::{field_name, literal, object_name};
use crate::predicate::predicate;
use crate::TranslationError;

/// Default and maximum number of documents fetched per query.
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Upper bound for `LIMIT`; also the fetch size when no limit is given.
    pub max_page_size: u64,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Translator {
    options: TranslateOptions,
}

/// Translate with default options.
pub fn translate(statement: &Statement) -> Result<Command, TranslationError> {
    Translator::default().translate(statement)
}

impl Translator {
    pub fn new(options: TranslateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> TranslateOptions {
        self.options
    }

    pub fn translate(&self, statement: &Statement) -> Result<Command, TranslationError> {
        let command = match statement {
            Statement::Query(query) => Command::Select(self.select(query)?),
            Statement::Insert(insert) => Command::Insert(insert_command(insert)?),
            Statement::Update(update) => Command::Update(update_command(update)?),
            Statement::Delete(delete) => Command::Delete(delete_command(delete)?),
            other => {
                return Err(TranslationError::UnsupportedStatement(statement_label(
                    other,
                )))
            }
        };

        debug!(
            kind = %command.kind(),
            collection = command.collection(),
            "Translated statement"
        );
        Ok(command)
    }

    fn select(&self, query: &Query) -> Result<SelectCommand, TranslationError> {
        if query.with.is_some() {
            return Err(TranslationError::syntax("WITH"));
        }
        if query.fetch.is_some() {
            return Err(TranslationError::syntax("FETCH"));
        }

        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            SetExpr::SetOperation { op, .. } => {
                return Err(TranslationError::syntax(format!("set operation {op}")))
            }
            other => return Err(TranslationError::syntax(format!("query body {other}"))),
        };

        if select.distinct.is_some() {
            return Err(TranslationError::syntax("DISTINCT"));
        }
        match &select.group_by {
            GroupByExpr::Expressions(exprs, _) if exprs.is_empty() => {}
            _ => return Err(TranslationError::syntax("GROUP BY")),
        }
        if select.having.is_some() {
            return Err(TranslationError::syntax("HAVING"));
        }

        let collection = single_collection(&select.from)?;
        let projection = projection(&select.projection)?;

        if let Projection::Columns(exprs) = &projection {
            if let Some(name) = duplicate_result_name(exprs) {
                return Err(TranslationError::DuplicateResultName(name.to_string()));
            }
        }

        let filter = select.selection.as_ref().map(predicate).transpose()?;
        let sort = sort_keys(query.order_by.as_ref(), &projection)?;
        let paging = self.paging(query.limit_clause.as_ref())?;

        Ok(SelectCommand {
            collection,
            projection,
            filter,
            sort,
            paging,
        })
    }

    fn paging(&self, clause: Option<&LimitClause>) -> Result<Paging, TranslationError> {
        let (offset, limit) = match clause {
            None => (0, None),
            Some(LimitClause::LimitOffset { limit, offset, .. }) => {
                let limit = limit.as_ref().map(|e| bound(e, "LIMIT")).transpose()?;
                let offset = offset
                    .as_ref()
                    .map(|o| bound(&o.value, "OFFSET"))
                    .transpose()?
                    .unwrap_or(0);
                (offset, limit)
            }
            Some(LimitClause::OffsetCommaLimit { offset, limit }) => {
                (bound(offset, "OFFSET")?, Some(bound(limit, "LIMIT")?))
            }
        };
        Ok(Paging::clamped(offset, limit, self.options.max_page_size))
    }
}

fn bound(expr: &Expr, clause: &str) -> Result<u64, TranslationError> {
    match literal(expr) {
        Some(Value::Int(n)) if n >= 0 => Ok(n as u64),
        _ => Err(TranslationError::syntax(format!("{clause} {expr}"))),
    }
}

fn single_collection(from: &[TableWithJoins]) -> Result<String, TranslationError> {
    match from {
        [] => Err(TranslationError::syntax("SELECT without FROM")),
        [table] if table.joins.is_empty() => table_name(&table.relation),
        _ => Err(TranslationError::syntax("joins across collections")),
    }
}

fn table_name(relation: &TableFactor) -> Result<String, TranslationError> {
    match relation {
        TableFactor::Table { name, .. } => object_name(name)
            .ok_or_else(|| TranslationError::syntax(format!("table name {name}"))),
        other => Err(TranslationError::syntax(format!("table source {other}"))),
    }
}

fn projection(items: &[SelectItem]) -> Result<Projection, TranslationError> {
    let wildcard = items.iter().any(|item| {
        matches!(
            item,
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)
        )
    });
    if wildcard {
        return if items.len() == 1 {
            Ok(Projection::All)
        } else {
            Err(TranslationError::syntax("wildcard mixed with other columns"))
        };
    }

    items
        .iter()
        .map(|item| -> Result<Expression, TranslationError> {
            match item {
                SelectItem::UnnamedExpr(expr) => expression(expr),
                SelectItem::ExprWithAlias { expr, alias } => {
                    Ok(expression(expr)?.with_alias(alias.value.clone()))
                }
                other => Err(TranslationError::syntax(format!("projection {other}"))),
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Projection::Columns)
}

fn expression(expr: &Expr) -> Result<Expression, TranslationError> {
    if let Some(field) = field_name(expr) {
        return Ok(Expression::field(field));
    }
    match expr {
        Expr::Function(function) => aggregate(function),
        other => Err(TranslationError::syntax(format!("projected expression {other}"))),
    }
}

fn aggregate(function: &Function) -> Result<Expression, TranslationError> {
    let name = function.name.to_string().to_ascii_uppercase();
    if name != "COUNT" {
        return Err(TranslationError::syntax(format!("function {name}")));
    }
    if function.filter.is_some() || function.over.is_some() {
        return Err(TranslationError::syntax(format!("{function}")));
    }

    let list = match &function.args {
        FunctionArguments::List(list) => list,
        _ => return Err(TranslationError::syntax(format!("{function}"))),
    };
    if matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct)) {
        return Err(TranslationError::syntax("COUNT(DISTINCT ...)"));
    }

    match list.args.as_slice() {
        [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)] => Ok(Expression::count()),
        [FunctionArg::Unnamed(FunctionArgExpr::Expr(arg))] => {
            if let Some(field) = field_name(arg) {
                return Ok(Expression::count_of(field));
            }
            // COUNT(1) and friends
            match literal(arg) {
                Some(v) if !v.is_null() => Ok(Expression::count()),
                _ => Err(TranslationError::syntax(format!("{function}"))),
            }
        }
        _ => Err(TranslationError::syntax(format!("{function}"))),
    }
}

fn sort_keys(
    order_by: Option<&OrderBy>,
    projection: &Projection,
) -> Result<Vec<SortKey>, TranslationError> {
    let Some(order_by) = order_by else {
        return Ok(Vec::new());
    };
    let exprs = match &order_by.kind {
        OrderByKind::Expressions(exprs) => exprs,
        _ => return Err(TranslationError::syntax("ORDER BY ALL")),
    };

    let columns = match projection {
        Projection::All => &[][..],
        Projection::Columns(exprs) => exprs.as_slice(),
    };

    exprs
        .iter()
        .map(|e| -> Result<SortKey, TranslationError> {
            Ok(SortKey {
                field: sort_field(&e.expr, columns)?,
                desc: e.options.asc == Some(false),
            })
        })
        .collect()
}

// A field, a projection alias or a 1-based projection position
fn sort_field(expr: &Expr, columns: &[Expression]) -> Result<String, TranslationError> {
    if let Expr::Identifier(ident) = expr {
        if let Some(column) = columns.iter().find(|c| c.result_name() == ident.value) {
            return column_source(column);
        }
    }
    if let Some(field) = field_name(expr) {
        return Ok(field);
    }
    if let Some(Value::Int(position)) = literal(expr) {
        let column = usize::try_from(position)
            .ok()
            .and_then(|p| p.checked_sub(1))
            .and_then(|i| columns.get(i))
            .ok_or_else(|| TranslationError::syntax(format!("ORDER BY position {position}")))?;
        return column_source(column);
    }
    Err(TranslationError::syntax(format!("ORDER BY {expr}")))
}

fn column_source(column: &Expression) -> Result<String, TranslationError> {
    match column.source_field() {
        Some(field) if !column.is_count() => Ok(field.to_string()),
        _ => Err(TranslationError::syntax(format!(
            "ORDER BY aggregate {}",
            column.result_name()
        ))),
    }
}

fn insert_command(insert: &ast::Insert) -> Result<InsertCommand, TranslationError> {
    let collection = match &insert.table {
        TableObject::TableName(name) => object_name(name)
            .ok_or_else(|| TranslationError::syntax(format!("table name {name}")))?,
        _ => return Err(TranslationError::syntax("INSERT into a table function")),
    };
    if insert.returning.is_some() {
        return Err(TranslationError::syntax("RETURNING"));
    }
    if insert.on.is_some() {
        return Err(TranslationError::syntax("INSERT conflict clause"));
    }
    if insert.columns.is_empty() {
        return Err(TranslationError::syntax("INSERT without column list"));
    }

    let source = insert
        .source
        .as_ref()
        .ok_or_else(|| TranslationError::syntax("INSERT without VALUES"))?;
    let rows = match source.body.as_ref() {
        SetExpr::Values(values) => &values.rows,
        _ => return Err(TranslationError::syntax("INSERT ... SELECT")),
    };

    let columns: Vec<&str> = insert.columns.iter().map(|c| c.value.as_str()).collect();
    let mut documents = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != columns.len() {
            return Err(TranslationError::syntax(format!(
                "row of {} values for {} columns",
                row.len(),
                columns.len()
            )));
        }

        let mut document = NativeDocument::new();
        for (column, expr) in columns.iter().zip(row) {
            let value = literal(expr)
                .ok_or_else(|| TranslationError::syntax(format!("inserted value {expr}")))?;
            // Absent and NULL are the same thing in a document
            if !value.is_null() {
                document.set(*column, value);
            }
        }
        documents.push(document);
    }

    Ok(InsertCommand {
        collection,
        documents,
    })
}

fn update_command(update: &ast::Update) -> Result<UpdateCommand, TranslationError> {
    if update.from.is_some() {
        return Err(TranslationError::syntax("UPDATE ... FROM"));
    }
    if update.returning.is_some() {
        return Err(TranslationError::syntax("RETURNING"));
    }
    if update.or.is_some() || update.limit.is_some() {
        return Err(TranslationError::syntax("UPDATE modifiers"));
    }
    if !update.table.joins.is_empty() {
        return Err(TranslationError::syntax("joins across collections"));
    }

    let collection = table_name(&update.table.relation)?;

    let assignments = update
        .assignments
        .iter()
        .map(|a| -> Result<Assignment, TranslationError> {
            let field = match &a.target {
                AssignmentTarget::ColumnName(name) => object_name(name)
                    .ok_or_else(|| TranslationError::syntax(format!("column {name}")))?,
                AssignmentTarget::Tuple(_) => {
                    return Err(TranslationError::syntax("tuple assignment"))
                }
            };
            let value = literal(&a.value)
                .ok_or_else(|| TranslationError::syntax(format!("assigned value {}", a.value)))?;
            Ok(Assignment { field, value })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let filter = update.selection.as_ref().map(predicate).transpose()?;

    Ok(UpdateCommand {
        collection,
        assignments,
        filter,
    })
}

fn delete_command(delete: &ast::Delete) -> Result<DeleteCommand, TranslationError> {
    if delete.using.is_some() {
        return Err(TranslationError::syntax("DELETE ... USING"));
    }
    if delete.returning.is_some() {
        return Err(TranslationError::syntax("RETURNING"));
    }
    if !delete.order_by.is_empty() || delete.limit.is_some() {
        return Err(TranslationError::syntax("DELETE with ORDER BY or LIMIT"));
    }
    if !delete.tables.is_empty() {
        return Err(TranslationError::syntax("multi-table DELETE"));
    }

    let tables = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    let collection = single_collection(tables)?;
    let filter = delete.selection.as_ref().map(predicate).transpose()?;

    Ok(DeleteCommand { collection, filter })
}

// Leading keyword of the statement, for error messages
fn statement_label(statement: &Statement) -> String {
    let text = statement.to_string();
    text.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use docsql_ir::{CompareOp, Predicate, StatementKind};

    fn translate_sql(sql: &str) -> Result<Command, TranslationError> {
        translate(&parse(sql).unwrap())
    }

    fn select(sql: &str) -> SelectCommand {
        match translate_sql(sql).unwrap() {
            Command::Select(select) => select,
            other => panic!("expected SELECT, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_select_projection_and_count() {
        let cmd = select("SELECT a, COUNT(*) AS n FROM books WHERE year > 2000");

        assert_eq!(cmd.collection, "books");
        assert_eq!(
            cmd.expressions(),
            &[Expression::field("a"), Expression::count().with_alias("n")]
        );
        assert_eq!(
            cmd.filter,
            Some(Predicate::compare("year", CompareOp::Gt, 2000))
        );
        assert_eq!(cmd.paging, Paging { offset: 0, limit: DEFAULT_MAX_PAGE_SIZE });
    }

    #[test]
    fn test_unaliased_count_gets_synthesized_name() {
        let cmd = select("SELECT count(*) FROM books");
        assert_eq!(cmd.expressions()[0].result_name(), "COUNT");

        let cmd = select("SELECT COUNT(id), COUNT(1) AS c FROM books");
        assert!(cmd.expressions().iter().all(Expression::is_count));
    }

    #[test]
    fn test_aliases_of_same_field() {
        let cmd = select("SELECT x AS x1, x AS x2 FROM t");
        let exprs = cmd.expressions();
        assert_eq!(exprs[0].source_field(), Some("x"));
        assert_eq!(exprs[1].source_field(), Some("x"));
        assert_eq!(exprs[1].result_name(), "x2");
    }

    #[test]
    fn test_duplicate_result_name_rejected() {
        let err = translate_sql("SELECT a, b AS a FROM t").unwrap_err();
        assert_eq!(err, TranslationError::DuplicateResultName("a".into()));

        let err = translate_sql("SELECT COUNT(*), COUNT(*) FROM t").unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_RESULT_NAME");

        let err = translate_sql("SELECT a AS x, b AS X FROM t").unwrap_err();
        assert_eq!(err, TranslationError::DuplicateResultName("X".into()));
    }

    #[test]
    fn test_wildcard() {
        let cmd = select("SELECT * FROM db.books");
        assert_eq!(cmd.projection, Projection::All);
        assert_eq!(cmd.collection, "books");

        let err = translate_sql("SELECT *, a FROM books").unwrap_err();
        assert_eq!(err.code(), "SYNTAX_UNSUPPORTED");
    }

    #[test]
    fn test_order_by_field_alias_and_position() {
        let cmd = select("SELECT title AS t, year FROM books ORDER BY t DESC, 2, author ASC");
        assert_eq!(
            cmd.sort,
            vec![
                SortKey::desc("title"),
                SortKey::asc("year"),
                SortKey::asc("author")
            ]
        );

        let err = translate_sql("SELECT COUNT(*) AS n FROM books ORDER BY n").unwrap_err();
        assert_eq!(err.code(), "SYNTAX_UNSUPPORTED");
    }

    #[test]
    fn test_paging_is_clamped() {
        let translator = Translator::new(TranslateOptions { max_page_size: 100 });
        let stmt = parse("SELECT a FROM t LIMIT 500 OFFSET 20").unwrap();
        let Command::Select(cmd) = translator.translate(&stmt).unwrap() else {
            panic!("expected SELECT");
        };
        assert_eq!(cmd.paging, Paging { offset: 20, limit: 100 });

        let cmd = select("SELECT a FROM t LIMIT 5");
        assert_eq!(cmd.paging, Paging { offset: 0, limit: 5 });
    }

    #[test]
    fn test_offset_comma_limit() {
        let cmd = select("SELECT a FROM t LIMIT 10, 5");
        assert_eq!(cmd.paging, Paging { offset: 10, limit: 5 });

        let translator = Translator::new(TranslateOptions { max_page_size: 3 });
        let stmt = parse("SELECT a FROM t LIMIT 10, 5").unwrap();
        let Command::Select(cmd) = translator.translate(&stmt).unwrap() else {
            panic!("expected SELECT");
        };
        assert_eq!(cmd.paging, Paging { offset: 10, limit: 3 });
    }

    #[test]
    fn test_invalid_paging_bounds() {
        for sql in [
            "SELECT a FROM t LIMIT -1",
            "SELECT a FROM t LIMIT 'x'",
            "SELECT a FROM t LIMIT 5 OFFSET 1.5",
        ] {
            let err = translate_sql(sql).unwrap_err();
            assert_eq!(err.code(), "SYNTAX_UNSUPPORTED", "{sql}");
        }
    }

    #[test]
    fn test_unsupported_select_shapes() {
        for sql in [
            "SELECT DISTINCT a FROM t",
            "SELECT a FROM t GROUP BY a",
            "SELECT a FROM t JOIN u ON t.id = u.id",
            "SELECT 1",
            "SELECT SUM(a) FROM t",
            "SELECT COUNT(DISTINCT a) FROM t",
            "SELECT a + 1 FROM t",
            "SELECT a FROM t UNION SELECT a FROM u",
            "WITH x AS (SELECT a FROM t) SELECT a FROM x",
        ] {
            let err = translate_sql(sql).unwrap_err();
            assert_eq!(err.code(), "SYNTAX_UNSUPPORTED", "{sql}");
        }
    }

    #[test]
    fn test_unsupported_statement() {
        let err = translate_sql("CREATE TABLE t (a INT)").unwrap_err();
        assert_eq!(err, TranslationError::UnsupportedStatement("CREATE".into()));
    }

    #[test]
    fn test_insert() {
        let cmd = translate_sql(
            "INSERT INTO books (id, title, rating) VALUES ('1', 'Dune', 4.5), ('2', NULL, 3)",
        )
        .unwrap();
        let Command::Insert(insert) = cmd else {
            panic!("expected INSERT");
        };

        assert_eq!(insert.collection, "books");
        assert_eq!(insert.documents.len(), 2);
        assert_eq!(insert.documents[0].get("rating"), Some(&Value::Float(4.5)));
        assert_eq!(insert.documents[1].get("title"), None);

        for sql in [
            "INSERT INTO books VALUES ('1')",
            "INSERT INTO books (id) SELECT id FROM other",
            "INSERT INTO books (id, title) VALUES ('1')",
        ] {
            assert_eq!(translate_sql(sql).unwrap_err().code(), "SYNTAX_UNSUPPORTED", "{sql}");
        }
    }

    #[test]
    fn test_update_and_delete() {
        let cmd = translate_sql("UPDATE books SET title = 'X', year = 2001 WHERE id = '1'").unwrap();
        assert_eq!(cmd.kind(), StatementKind::Update);
        let Command::Update(update) = cmd else {
            panic!("expected UPDATE");
        };
        assert_eq!(update.assignments.len(), 2);
        assert_eq!(update.assignments[1].value, Value::Int(2001));
        assert!(update.filter.is_some());

        let cmd = translate_sql("DELETE FROM books").unwrap();
        assert_eq!(
            cmd,
            Command::Delete(DeleteCommand {
                collection: "books".into(),
                filter: None
            })
        );
    }
}
