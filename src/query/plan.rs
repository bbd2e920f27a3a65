// Query planning
// Checks a parsed query against the entity mapping and resolves every alias,
// relation and attribute path to the tables and columns behind it

use super::parser::{
    JoinKind, Operand, OrderKey, PathExpr, Predicate, Projection, SelectQuery,
};
use crate::error::{Error, Result};
use crate::mapping::{EntityMapping, Metamodel, RelationKind};
use std::collections::HashMap;
use tracing::debug;

/// One alias of the query and how its rows are reached
#[derive(Debug, Clone)]
pub struct Source {
    pub alias: String,
    pub entity: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
    /// None for the root entity
    pub join: Option<JoinStep>,
}

/// How the rows of a joined alias are reached from an earlier alias
#[derive(Debug, Clone)]
pub struct JoinStep {
    pub kind: JoinKind,
    /// Position of the alias being navigated from
    pub source: usize,
    pub relation: RelationKind,
}

/// A many-to-one hop taken inside a path such as `r.film.year`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub column: &'static str,
    pub target_table: &'static str,
    pub target_id_column: &'static str,
}

/// Where a path's value is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub source: usize,
    pub hops: Vec<Hop>,
    pub table: &'static str,
    pub column: &'static str,
}

#[derive(Debug, Clone)]
pub enum PlannedProjection {
    /// Every mapped column of the alias, id first
    Entity {
        source: usize,
        columns: Vec<&'static str>,
    },
    Value(Operand),
}

/// A query ready to run
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub query: SelectQuery,
    pub sources: Vec<Source>,
    pub paths: HashMap<PathExpr, ColumnRef>,
    pub projections: Vec<PlannedProjection>,
    pub column_names: Vec<String>,
    pub parameters: Vec<String>,
}

impl QueryPlan {
    /// The entity a query returns when it projects exactly one whole entity
    pub fn result_entity(&self) -> Option<&'static str> {
        match self.projections.as_slice() {
            [PlannedProjection::Entity { source, .. }] => Some(self.sources[*source].entity),
            _ => None,
        }
    }
}

/// Resolves parsed queries against a metamodel
pub struct Planner<'a> {
    metamodel: &'a Metamodel,
}

impl<'a> Planner<'a> {
    pub fn new(metamodel: &'a Metamodel) -> Self {
        Self { metamodel }
    }

    pub fn plan(&self, query: SelectQuery) -> Result<QueryPlan> {
        let sources = self.resolve_sources(&query)?;

        let mut paths = HashMap::new();
        let mut projections = Vec::new();
        let mut column_names = Vec::new();

        if query.projections.is_empty() {
            return Err(Error::Syntax("nothing selected".to_string()));
        }

        for projection in &query.projections {
            match projection {
                Projection::Entity(alias) => {
                    let source = Self::alias_position(&sources, alias)?;
                    let entity = self.metamodel.entity(sources[source].entity)?;
                    let prefix = if query.projections.len() > 1 {
                        format!("{}.", alias)
                    } else {
                        String::new()
                    };
                    column_names.extend(entity.columns().map(|a| format!("{}{}", prefix, a.name)));
                    projections.push(PlannedProjection::Entity {
                        source,
                        columns: entity.columns().map(|a| a.column).collect(),
                    });
                }
                Projection::Value(operand) => {
                    self.resolve_operand(&sources, operand, &mut paths)?;
                    column_names.push(operand.to_string());
                    projections.push(PlannedProjection::Value(operand.clone()));
                }
            }
        }

        if let Some(filter) = &query.filter {
            self.resolve_predicate(&sources, filter, &mut paths)?;
        }
        for OrderKey { operand, .. } in &query.order_by {
            self.resolve_operand(&sources, operand, &mut paths)?;
        }

        let parameters = query.parameters();
        debug!(
            root = %query.root.entity,
            joins = query.joins.len(),
            parameters = ?parameters,
            "query planned"
        );

        Ok(QueryPlan {
            query,
            sources,
            paths,
            projections,
            column_names,
            parameters,
        })
    }

    fn resolve_sources(&self, query: &SelectQuery) -> Result<Vec<Source>> {
        let root = self.metamodel.entity(&query.root.entity)?;
        let mut sources = vec![Source {
            alias: query.root.alias.clone(),
            entity: root.name,
            table: root.table,
            id_column: root.id.column,
            join: None,
        }];

        for join in &query.joins {
            if sources.iter().any(|s| s.alias == join.alias) {
                return Err(Error::DuplicateAlias(join.alias.clone()));
            }

            let source = Self::alias_position(&sources, &join.source)?;
            let from = self.metamodel.entity(sources[source].entity)?;
            let relation = from
                .relation(&join.relation)
                .ok_or_else(|| Error::UnknownAttribute {
                    entity: from.name.to_string(),
                    name: join.relation.clone(),
                })?;
            let target = self.metamodel.entity(relation.target)?;

            sources.push(Source {
                alias: join.alias.clone(),
                entity: target.name,
                table: target.table,
                id_column: target.id.column,
                join: Some(JoinStep {
                    kind: join.kind,
                    source,
                    relation: relation.kind.clone(),
                }),
            });
        }

        Ok(sources)
    }

    fn alias_position(sources: &[Source], alias: &str) -> Result<usize> {
        sources
            .iter()
            .position(|s| s.alias == alias)
            .ok_or_else(|| Error::UnknownAlias(alias.to_string()))
    }

    fn resolve_predicate(
        &self,
        sources: &[Source],
        predicate: &Predicate,
        paths: &mut HashMap<PathExpr, ColumnRef>,
    ) -> Result<()> {
        match predicate {
            Predicate::Compare { left, right, .. } => {
                self.resolve_operand(sources, left, paths)?;
                self.resolve_operand(sources, right, paths)
            }
            Predicate::Between {
                operand, low, high, ..
            } => {
                self.resolve_operand(sources, operand, paths)?;
                self.resolve_operand(sources, low, paths)?;
                self.resolve_operand(sources, high, paths)
            }
            Predicate::Like {
                operand, pattern, ..
            } => {
                self.resolve_operand(sources, operand, paths)?;
                self.resolve_operand(sources, pattern, paths)
            }
            Predicate::IsNull { operand, .. } => self.resolve_operand(sources, operand, paths),
            Predicate::InList { operand, list, .. } => {
                self.resolve_operand(sources, operand, paths)?;
                list.iter()
                    .try_for_each(|item| self.resolve_operand(sources, item, paths))
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                self.resolve_predicate(sources, l, paths)?;
                self.resolve_predicate(sources, r, paths)
            }
            Predicate::Not(inner) => self.resolve_predicate(sources, inner, paths),
        }
    }

    fn resolve_operand(
        &self,
        sources: &[Source],
        operand: &Operand,
        paths: &mut HashMap<PathExpr, ColumnRef>,
    ) -> Result<()> {
        match operand {
            Operand::Path(path) => {
                if !paths.contains_key(path) {
                    let column = self.resolve_path(sources, path)?;
                    paths.insert(path.clone(), column);
                }
                Ok(())
            }
            Operand::Function(_, inner) => self.resolve_operand(sources, inner, paths),
            Operand::Parameter { .. } | Operand::Literal(_) => Ok(()),
        }
    }

    /// alias.(manyToOne.)*attribute
    fn resolve_path(&self, sources: &[Source], path: &PathExpr) -> Result<ColumnRef> {
        let source = Self::alias_position(sources, &path.alias)?;
        let mut entity: &EntityMapping = self.metamodel.entity(sources[source].entity)?;

        let (attribute, navigation) = path
            .segments
            .split_last()
            .ok_or_else(|| Error::Syntax(format!("{} needs an attribute", path)))?;

        let mut hops = Vec::new();
        for segment in navigation {
            let relation = entity
                .relation(segment)
                .ok_or_else(|| Error::UnknownAttribute {
                    entity: entity.name.to_string(),
                    name: segment.clone(),
                })?;
            let column = match relation.kind {
                RelationKind::ManyToOne { column } => column,
                _ => {
                    return Err(Error::Unsupported(format!(
                        "navigating collection '{}' in {}; JOIN it instead",
                        segment, path
                    )))
                }
            };
            let target = self.metamodel.entity(relation.target)?;
            hops.push(Hop {
                column,
                target_table: target.table,
                target_id_column: target.id.column,
            });
            entity = target;
        }

        match entity.attribute(attribute) {
            Some(mapped) => Ok(ColumnRef {
                source,
                hops,
                table: entity.table,
                column: mapped.column,
            }),
            None if entity.relation(attribute).is_some() => Err(Error::Unsupported(format!(
                "{} is a relation; JOIN it and compare one of its attributes",
                path
            ))),
            None => Err(Error::UnknownAttribute {
                entity: entity.name.to_string(),
                name: attribute.clone(),
            }),
        }
    }
}
