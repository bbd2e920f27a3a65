// Entity mapping
// Describes how the entities queries talk about (Person, Film, ...) map onto
// tables, columns and foreign keys of the store

use crate::error::{Error, Result};
use crate::storage::{Column, DataType, Schema};
use std::collections::BTreeMap;

/// A mapped scalar attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMapping {
    pub name: &'static str,
    pub column: &'static str,
    pub data_type: DataType,
    pub nullable: bool,
    /// Whether the store keeps an index on the column
    pub indexed: bool,
}

impl AttributeMapping {
    fn new(name: &'static str, column: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            column,
            data_type,
            nullable: false,
            indexed: false,
        }
    }

    fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// How a relation is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// Foreign key column on the source table pointing at the target id
    ManyToOne { column: &'static str },
    /// Foreign key column on the target table pointing back at the source id
    OneToMany { mapped_by: &'static str },
    /// Association table with one column per side
    ManyToMany {
        join_table: &'static str,
        source_column: &'static str,
        target_column: &'static str,
    },
}

/// A navigable relation from one entity to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMapping {
    pub name: &'static str,
    pub target: &'static str,
    pub kind: RelationKind,
}

impl RelationMapping {
    /// Whether following the relation yields at most one row
    pub fn is_single_valued(&self) -> bool {
        matches!(self.kind, RelationKind::ManyToOne { .. })
    }
}

#[derive(Debug, Clone)]
pub struct EntityMapping {
    pub name: &'static str,
    pub table: &'static str,
    pub id: AttributeMapping,
    pub attributes: Vec<AttributeMapping>,
    pub relations: Vec<RelationMapping>,
}

impl EntityMapping {
    /// Find an attribute (the id included) by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeMapping> {
        self.columns().find(|a| a.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationMapping> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// The id followed by the attributes; this is the shape of a projected entity
    pub fn columns(&self) -> impl Iterator<Item = &AttributeMapping> + '_ {
        std::iter::once(&self.id).chain(self.attributes.iter())
    }

    fn schema(&self) -> Schema {
        let mut columns: Vec<Column> = self
            .columns()
            .map(|a| {
                let column = Column::new(a.column, a.data_type).nullable(a.nullable);
                if a.column == self.id.column {
                    column.primary_key()
                } else {
                    column
                }
            })
            .collect();

        for relation in &self.relations {
            if let RelationKind::ManyToOne { column } = relation.kind {
                columns.push(Column::new(column, DataType::Integer));
            }
        }

        Schema::new(columns)
    }
}

/// The set of mapped entities
#[derive(Debug, Clone)]
pub struct Metamodel {
    entities: Vec<EntityMapping>,
}

impl Metamodel {
    pub fn new(entities: Vec<EntityMapping>) -> Self {
        Self { entities }
    }

    /// The movie schema: people play roles in films, films are released in
    /// countries and made by directors
    pub fn movies() -> Self {
        use DataType::*;

        let id = || AttributeMapping::new("id", "id", Integer);
        let film_country = |source_column: &'static str, target_column: &'static str| RelationKind::ManyToMany {
            join_table: "film_country",
            source_column,
            target_column,
        };
        let film_director = |source_column: &'static str, target_column: &'static str| RelationKind::ManyToMany {
            join_table: "film_director",
            source_column,
            target_column,
        };

        Self::new(vec![
            EntityMapping {
                name: "Person",
                table: "person",
                id: id(),
                attributes: vec![
                    AttributeMapping::new("identity", "identity", Text).indexed(),
                    AttributeMapping::new("birthDate", "birth_date", Date)
                        .nullable()
                        .indexed(),
                ],
                relations: vec![RelationMapping {
                    name: "roles",
                    target: "Role",
                    kind: RelationKind::OneToMany {
                        mapped_by: "person_id",
                    },
                }],
            },
            EntityMapping {
                name: "Director",
                table: "director",
                id: id(),
                attributes: vec![AttributeMapping::new("identity", "identity", Text).indexed()],
                relations: vec![RelationMapping {
                    name: "films",
                    target: "Film",
                    kind: film_director("director_id", "film_id"),
                }],
            },
            EntityMapping {
                name: "Country",
                table: "country",
                id: id(),
                attributes: vec![AttributeMapping::new("name", "name", Text).indexed()],
                relations: vec![RelationMapping {
                    name: "films",
                    target: "Film",
                    kind: film_country("country_id", "film_id"),
                }],
            },
            EntityMapping {
                name: "Film",
                table: "film",
                id: id(),
                attributes: vec![
                    AttributeMapping::new("title", "title", Text),
                    AttributeMapping::new("year", "year", Integer).indexed(),
                ],
                relations: vec![
                    RelationMapping {
                        name: "roles",
                        target: "Role",
                        kind: RelationKind::OneToMany { mapped_by: "film_id" },
                    },
                    RelationMapping {
                        name: "countries",
                        target: "Country",
                        kind: film_country("film_id", "country_id"),
                    },
                    RelationMapping {
                        name: "directors",
                        target: "Director",
                        kind: film_director("film_id", "director_id"),
                    },
                ],
            },
            EntityMapping {
                name: "Role",
                table: "role",
                id: id(),
                attributes: vec![AttributeMapping::new("name", "name", Text)],
                relations: vec![
                    RelationMapping {
                        name: "person",
                        target: "Person",
                        kind: RelationKind::ManyToOne { column: "person_id" },
                    },
                    RelationMapping {
                        name: "film",
                        target: "Film",
                        kind: RelationKind::ManyToOne { column: "film_id" },
                    },
                ],
            },
        ])
    }

    pub fn entity(&self, name: &str) -> Result<&EntityMapping> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    pub fn entities(&self) -> &[EntityMapping] {
        &self.entities
    }

    /// Schemas of every table the mapping needs: one per entity plus the
    /// association tables behind many-to-many relations
    pub fn table_schemas(&self) -> Vec<(String, Schema)> {
        let mut schemas: Vec<(String, Schema)> = self
            .entities
            .iter()
            .map(|e| (e.table.to_string(), e.schema()))
            .collect();

        let mut join_tables = BTreeMap::new();
        for relation in self.entities.iter().flat_map(|e| &e.relations) {
            if let RelationKind::ManyToMany {
                join_table,
                source_column,
                target_column,
            } = relation.kind
            {
                join_tables.entry(join_table).or_insert_with(|| {
                    let mut columns = [source_column, target_column];
                    columns.sort_unstable();
                    Schema::new(
                        columns
                            .iter()
                            .map(|c| Column::new(*c, DataType::Integer))
                            .collect(),
                    )
                });
            }
        }
        schemas.extend(join_tables.into_iter().map(|(n, s)| (n.to_string(), s)));

        schemas
    }

    /// (table, column) pairs the store should index besides primary keys:
    /// indexed attributes and every column a relation is followed through
    pub fn indexed_columns(&self) -> Vec<(&'static str, &'static str)> {
        let mut columns = Vec::new();

        for entity in &self.entities {
            for attribute in entity.attributes.iter().filter(|a| a.indexed) {
                columns.push((entity.table, attribute.column));
            }
            for relation in &entity.relations {
                match relation.kind {
                    RelationKind::ManyToOne { .. } => {}
                    RelationKind::OneToMany { mapped_by } => {
                        if let Ok(target) = self.entity(relation.target) {
                            columns.push((target.table, mapped_by));
                        }
                    }
                    RelationKind::ManyToMany {
                        join_table,
                        source_column,
                        ..
                    } => columns.push((join_table, source_column)),
                }
            }
        }

        columns.sort_unstable();
        columns.dedup();
        columns
    }
}

impl Default for Metamodel {
    fn default() -> Self {
        Self::movies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_tables() {
        let metamodel = Metamodel::movies();
        let schemas = metamodel.table_schemas();
        let names: Vec<&str> = schemas.iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(
            names,
            vec!["person", "director", "country", "film", "role", "film_country", "film_director"]
        );

        let (_, role) = &schemas[4];
        let columns: Vec<&str> = role.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["id", "name", "person_id", "film_id"]);
        assert_eq!(role.get_primary_key_index(), Some(0));
    }

    #[test]
    fn test_lookup_attributes_and_relations() {
        let metamodel = Metamodel::movies();
        let person = metamodel.entity("Person").unwrap();

        assert_eq!(person.attribute("birthDate").unwrap().column, "birth_date");
        assert_eq!(person.attribute("id").unwrap().column, "id");
        assert!(person.attribute("roles").is_none());
        assert_eq!(person.relation("roles").unwrap().target, "Role");
        assert!(metamodel.entity("Acteur").is_err());

        let role = metamodel.entity("Role").unwrap();
        assert!(role.relation("film").unwrap().is_single_valued());
        assert!(!metamodel
            .entity("Film")
            .unwrap()
            .relation("countries")
            .unwrap()
            .is_single_valued());
    }

    #[test]
    fn test_relation_columns_are_indexed() {
        let columns = Metamodel::movies().indexed_columns();

        for expected in [
            ("role", "person_id"),
            ("role", "film_id"),
            ("film_country", "film_id"),
            ("film_country", "country_id"),
            ("film_director", "director_id"),
            ("person", "identity"),
            ("film", "year"),
        ] {
            assert!(columns.contains(&expected), "missing index on {:?}", expected);
        }
    }
}
