// Object query parser
// Queries name entities and navigate relations instead of tables and keys:
//
//   SELECT DISTINCT p FROM Person p JOIN p.roles r JOIN r.film f
//   WHERE f.year BETWEEN :first_year AND :last_year ORDER BY p.identity
//
// The text is SQL-shaped, so the sqlparser crate does the tokenizing and
// grammar work; this module turns its AST into a SelectQuery

use crate::error::{Error, Result};
use crate::storage::Value;
use chrono::NaiveDate;
use sqlparser::ast::{
    BinaryOperator, DataType as SqlDataType, Distinct, Expr, FunctionArg, FunctionArgExpr,
    FunctionArguments, GroupByExpr, Ident, JoinConstraint, JoinOperator, ObjectName, Select,
    SelectItem, SetExpr, Statement, TableFactor, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;

/// A parsed select query
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projections: Vec<Projection>,
    /// FROM <Entity> <alias>
    pub root: RootEntity,
    pub joins: Vec<PathJoin>,
    pub filter: Option<Predicate>,
    pub order_by: Vec<OrderKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootEntity {
    pub entity: String,
    pub alias: String,
}

/// JOIN <source>.<relation> <alias>
#[derive(Debug, Clone, PartialEq)]
pub struct PathJoin {
    pub kind: JoinKind,
    pub source: String,
    pub relation: String,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// A whole entity, by alias
    Entity(String),
    /// A single value such as `p.identity` or `YEAR(p.birthDate)`
    Value(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub operand: Operand,
    pub descending: bool,
}

/// alias.segment.segment...
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathExpr {
    pub alias: String,
    pub segments: Vec<String>,
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias)?;
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(PathExpr),
    /// `:name` or `?1`; the name is stored without the sigil
    Parameter { name: String, positional: bool },
    Literal(Value),
    Function(ScalarFunction, Box<Operand>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Path(path) => write!(f, "{}", path),
            Operand::Parameter {
                name,
                positional: true,
            } => write!(f, "?{}", name),
            Operand::Parameter { name, .. } => write!(f, ":{}", name),
            Operand::Literal(Value::Text(s)) => write!(f, "'{}'", s),
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Function(function, arg) => write!(f, "{}({})", function.name(), arg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Year,
    Month,
    Upper,
    Lower,
    Length,
}

impl ScalarFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunction::Year => "YEAR",
            ScalarFunction::Month => "MONTH",
            ScalarFunction::Upper => "UPPER",
            ScalarFunction::Lower => "LOWER",
            ScalarFunction::Length => "LENGTH",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "YEAR" => Some(ScalarFunction::Year),
            "MONTH" => Some(ScalarFunction::Month),
            "UPPER" => Some(ScalarFunction::Upper),
            "LOWER" => Some(ScalarFunction::Lower),
            "LENGTH" => Some(ScalarFunction::Length),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
        negated: bool,
    },
    Like {
        operand: Operand,
        pattern: Operand,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    InList {
        operand: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Operand {
    fn collect_parameters(&self, out: &mut Vec<String>) {
        match self {
            Operand::Parameter { name, .. } => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Operand::Function(_, inner) => inner.collect_parameters(out),
            Operand::Path(_) | Operand::Literal(_) => {}
        }
    }
}

impl Predicate {
    fn collect_parameters(&self, out: &mut Vec<String>) {
        match self {
            Predicate::Compare { left, right, .. } => {
                left.collect_parameters(out);
                right.collect_parameters(out);
            }
            Predicate::Between {
                operand, low, high, ..
            } => {
                operand.collect_parameters(out);
                low.collect_parameters(out);
                high.collect_parameters(out);
            }
            Predicate::Like {
                operand, pattern, ..
            } => {
                operand.collect_parameters(out);
                pattern.collect_parameters(out);
            }
            Predicate::IsNull { operand, .. } => operand.collect_parameters(out),
            Predicate::InList { operand, list, .. } => {
                operand.collect_parameters(out);
                for item in list {
                    item.collect_parameters(out);
                }
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_parameters(out);
                r.collect_parameters(out);
            }
            Predicate::Not(inner) => inner.collect_parameters(out),
        }
    }
}

impl SelectQuery {
    /// Names of the parameters the query refers to, in order of first use
    pub fn parameters(&self) -> Vec<String> {
        let mut names = Vec::new();
        for projection in &self.projections {
            if let Projection::Value(operand) = projection {
                operand.collect_parameters(&mut names);
            }
        }
        if let Some(filter) = &self.filter {
            filter.collect_parameters(&mut names);
        }
        for key in &self.order_by {
            key.operand.collect_parameters(&mut names);
        }
        names
    }
}

/// The query parser
pub struct QueryParser;

impl QueryParser {
    /// Parse an object query
    pub fn parse(text: &str) -> Result<SelectQuery> {
        let dialect = GenericDialect {};
        let ast = Parser::parse_sql(&dialect, text).map_err(|e| Error::Syntax(e.to_string()))?;

        if ast.len() != 1 {
            return Err(Error::Syntax(
                "exactly one statement is expected".to_string(),
            ));
        }

        match &ast[0] {
            Statement::Query(query) => Self::parse_query(query),
            other => Err(Error::Unsupported(format!(
                "only SELECT queries are supported, got: {}",
                other
            ))),
        }
    }

    fn parse_query(query: &sqlparser::ast::Query) -> Result<SelectQuery> {
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            _ => return Err(Error::Unsupported("set operations".to_string())),
        };

        Self::check_clauses(select)?;

        let distinct = match &select.distinct {
            None => false,
            Some(Distinct::Distinct) => true,
            Some(Distinct::On(_)) => return Err(Error::Unsupported("DISTINCT ON".to_string())),
        };

        let projections = select
            .projection
            .iter()
            .map(Self::parse_projection)
            .collect::<Result<Vec<_>>>()?;

        let (root, joins) = Self::parse_from(select)?;

        let filter = match &select.selection {
            Some(expr) => Some(Self::parse_predicate(expr)?),
            None => None,
        };

        let mut order_by = Vec::new();
        if let Some(clause) = &query.order_by {
            for item in &clause.exprs {
                order_by.push(OrderKey {
                    operand: Self::parse_operand(&item.expr)?,
                    descending: item.asc == Some(false),
                });
            }
        }

        Ok(SelectQuery {
            distinct,
            projections,
            root,
            joins,
            filter,
            order_by,
        })
    }

    /// Reject the SELECT clauses we don't evaluate
    fn check_clauses(select: &Select) -> Result<()> {
        if select.having.is_some() {
            return Err(Error::Unsupported("HAVING".to_string()));
        }
        match &select.group_by {
            GroupByExpr::Expressions(exprs, _) if exprs.is_empty() => Ok(()),
            _ => Err(Error::Unsupported("GROUP BY".to_string())),
        }
    }

    fn parse_projection(item: &SelectItem) -> Result<Projection> {
        match item {
            SelectItem::UnnamedExpr(Expr::Identifier(ident)) => {
                Ok(Projection::Entity(ident.value.clone()))
            }
            SelectItem::UnnamedExpr(expr) => Ok(Projection::Value(Self::parse_operand(expr)?)),
            _ => Err(Error::Unsupported(format!("select item: {}", item))),
        }
    }

    /// FROM <Entity> <alias> [JOIN <alias>.<relation> <alias>]*
    fn parse_from(select: &Select) -> Result<(RootEntity, Vec<PathJoin>)> {
        let from = match select.from.as_slice() {
            [single] => single,
            [] => return Err(Error::Syntax("missing FROM clause".to_string())),
            _ => {
                return Err(Error::Unsupported(
                    "more than one FROM item; navigate relations with JOIN".to_string(),
                ))
            }
        };

        let (name, alias) = Self::table_and_alias(&from.relation)?;
        let entity = match name {
            [entity] => entity.value.clone(),
            _ => {
                return Err(Error::Syntax(format!(
                    "expected an entity name, got {}",
                    ObjectName(name.to_vec())
                )))
            }
        };
        let root = RootEntity {
            alias: Self::required_alias(alias, &entity)?,
            entity,
        };

        let mut joins = Vec::new();
        for join in &from.joins {
            let kind = match &join.join_operator {
                JoinOperator::Inner(JoinConstraint::None) => JoinKind::Inner,
                JoinOperator::LeftOuter(JoinConstraint::None) => JoinKind::Left,
                JoinOperator::Inner(_) | JoinOperator::LeftOuter(_) => {
                    return Err(Error::Unsupported(
                        "join conditions; joins follow mapped relations".to_string(),
                    ))
                }
                _ => return Err(Error::Unsupported("join type".to_string())),
            };

            let (path, alias) = Self::table_and_alias(&join.relation)?;
            let (source, relation) = match path {
                [source, relation] => (source.value.clone(), relation.value.clone()),
                _ => {
                    return Err(Error::Syntax(format!(
                        "expected <alias>.<relation> after JOIN, got {}",
                        ObjectName(path.to_vec())
                    )))
                }
            };
            let alias = Self::required_alias(alias, &format!("{}.{}", source, relation))?;

            joins.push(PathJoin {
                kind,
                source,
                relation,
                alias,
            });
        }

        Ok((root, joins))
    }

    fn table_and_alias(factor: &TableFactor) -> Result<(&[Ident], Option<&Ident>)> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                Ok((name.0.as_slice(), alias.as_ref().map(|a| &a.name)))
            }
            _ => Err(Error::Unsupported(format!("FROM item: {}", factor))),
        }
    }

    fn required_alias(alias: Option<&Ident>, what: &str) -> Result<String> {
        alias
            .map(|a| a.value.clone())
            .ok_or_else(|| Error::Syntax(format!("{} needs an alias", what)))
    }

    fn parse_predicate(expr: &Expr) -> Result<Predicate> {
        match expr {
            Expr::Nested(inner) => Self::parse_predicate(inner),
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => Ok(Predicate::And(
                    Box::new(Self::parse_predicate(left)?),
                    Box::new(Self::parse_predicate(right)?),
                )),
                BinaryOperator::Or => Ok(Predicate::Or(
                    Box::new(Self::parse_predicate(left)?),
                    Box::new(Self::parse_predicate(right)?),
                )),
                _ => {
                    let op = match op {
                        BinaryOperator::Eq => CompareOp::Eq,
                        BinaryOperator::NotEq => CompareOp::NotEq,
                        BinaryOperator::Lt => CompareOp::Lt,
                        BinaryOperator::LtEq => CompareOp::LtEq,
                        BinaryOperator::Gt => CompareOp::Gt,
                        BinaryOperator::GtEq => CompareOp::GtEq,
                        other => return Err(Error::Unsupported(format!("operator {}", other))),
                    };
                    Ok(Predicate::Compare {
                        left: Self::parse_operand(left)?,
                        op,
                        right: Self::parse_operand(right)?,
                    })
                }
            },
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => Ok(Predicate::Not(Box::new(Self::parse_predicate(expr)?))),
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => Ok(Predicate::Between {
                operand: Self::parse_operand(expr)?,
                low: Self::parse_operand(low)?,
                high: Self::parse_operand(high)?,
                negated: *negated,
            }),
            Expr::Like {
                negated,
                expr,
                pattern,
                escape_char,
                ..
            } => {
                if escape_char.is_some() {
                    return Err(Error::Unsupported("LIKE ... ESCAPE".to_string()));
                }
                Ok(Predicate::Like {
                    operand: Self::parse_operand(expr)?,
                    pattern: Self::parse_operand(pattern)?,
                    negated: *negated,
                })
            }
            Expr::IsNull(inner) => Ok(Predicate::IsNull {
                operand: Self::parse_operand(inner)?,
                negated: false,
            }),
            Expr::IsNotNull(inner) => Ok(Predicate::IsNull {
                operand: Self::parse_operand(inner)?,
                negated: true,
            }),
            Expr::InList {
                expr,
                list,
                negated,
            } => Ok(Predicate::InList {
                operand: Self::parse_operand(expr)?,
                list: list
                    .iter()
                    .map(Self::parse_operand)
                    .collect::<Result<Vec<_>>>()?,
                negated: *negated,
            }),
            _ => Err(Error::Unsupported(format!("condition: {}", expr))),
        }
    }

    fn parse_operand(expr: &Expr) -> Result<Operand> {
        match expr {
            Expr::Nested(inner) => Self::parse_operand(inner),
            Expr::CompoundIdentifier(idents) => {
                let (alias, segments) = idents
                    .split_first()
                    .ok_or_else(|| Error::Syntax("empty path".to_string()))?;
                Ok(Operand::Path(PathExpr {
                    alias: alias.value.clone(),
                    segments: segments.iter().map(|i| i.value.clone()).collect(),
                }))
            }
            Expr::Identifier(ident) => Err(Error::Unsupported(format!(
                "comparing whole entities ({}); compare one of its attributes",
                ident.value
            ))),
            Expr::Value(value) => Self::parse_value(value),
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match Self::parse_operand(expr)? {
                Operand::Literal(Value::Integer(i)) => Ok(Operand::Literal(Value::Integer(-i))),
                _ => Err(Error::Unsupported(format!("negation of {}", expr))),
            },
            Expr::TypedString {
                data_type: SqlDataType::Date,
                value,
                ..
            } => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| Operand::Literal(Value::Date(d)))
                .map_err(|e| Error::Syntax(format!("invalid DATE literal '{}': {}", value, e))),
            Expr::Function(function) => {
                let name = function.name.to_string();
                let scalar = ScalarFunction::from_name(&name)
                    .ok_or_else(|| Error::Unsupported(format!("function {}", name)))?;

                let args = match &function.args {
                    FunctionArguments::List(list) => &list.args,
                    _ => return Err(Error::Syntax(format!("{} takes one argument", name))),
                };
                match args.as_slice() {
                    [FunctionArg::Unnamed(FunctionArgExpr::Expr(arg))] => Ok(Operand::Function(
                        scalar,
                        Box::new(Self::parse_operand(arg)?),
                    )),
                    _ => Err(Error::Syntax(format!("{} takes one argument", name))),
                }
            }
            _ => Err(Error::Unsupported(format!("expression: {}", expr))),
        }
    }

    fn parse_value(value: &SqlValue) -> Result<Operand> {
        let literal = match value {
            SqlValue::Placeholder(placeholder) => {
                let (name, positional) = match placeholder.strip_prefix('?') {
                    Some(index) => (index, true),
                    None => (placeholder.strip_prefix(':').unwrap_or(placeholder), false),
                };
                if name.is_empty() {
                    return Err(Error::Unsupported(
                        "anonymous placeholders; use :name or ?1".to_string(),
                    ));
                }
                return Ok(Operand::Parameter {
                    name: name.to_string(),
                    positional,
                });
            }
            SqlValue::Number(n, _) => Value::Integer(
                n.parse()
                    .map_err(|_| Error::Unsupported(format!("non-integer number {}", n)))?,
            ),
            SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
                Value::Text(s.clone())
            }
            SqlValue::Boolean(b) => Value::Boolean(*b),
            SqlValue::Null => Value::Null,
            other => return Err(Error::Unsupported(format!("literal {}", other))),
        };
        Ok(Operand::Literal(literal))
    }
}
