// Domain records
// Typed views of the rows a query returns for a whole entity

use crate::error::Result;
use crate::storage::Row;
use chrono::NaiveDate;

/// A mapped entity that can be built from a projected row
///
/// The row holds the entity's id followed by its attributes, in mapping order.
pub trait Entity: Sized {
    /// Entity name used in queries
    const NAME: &'static str;

    fn from_row(row: &Row) -> Result<Self>;
}

/// An actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub identity: String,
    pub birth_date: Option<NaiveDate>,
}

impl Entity for Person {
    const NAME: &'static str = "Person";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.integer(0)?,
            identity: row.text(1)?,
            birth_date: row.optional_date(2)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Director {
    pub id: i64,
    pub identity: String,
}

impl Entity for Director {
    const NAME: &'static str = "Director";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.integer(0)?,
            identity: row.text(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub id: i64,
    pub name: String,
}

impl Entity for Country {
    const NAME: &'static str = "Country";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.integer(0)?,
            name: row.text(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Film {
    pub id: i64,
    pub title: String,
    pub year: i64,
}

impl Entity for Film {
    const NAME: &'static str = "Film";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.integer(0)?,
            title: row.text(1)?,
            year: row.integer(2)?,
        })
    }
}

/// The part a person plays in a film
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

impl Entity for Role {
    const NAME: &'static str = "Role";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.integer(0)?,
            name: row.text(1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Metamodel;
    use crate::storage::Value;

    #[test]
    fn test_person_from_row() {
        let row = Row::new(vec![
            Value::Integer(3),
            "Keira Knightley".into(),
            Value::Date(NaiveDate::from_ymd_opt(1985, 3, 26).unwrap()),
        ]);
        let person = Person::from_row(&row).unwrap();

        assert_eq!(person.identity, "Keira Knightley");
        assert_eq!(person.birth_date, NaiveDate::from_ymd_opt(1985, 3, 26));
    }

    #[test]
    fn test_from_row_rejects_wrong_shape() {
        let row = Row::new(vec!["not an id".into(), "France".into()]);
        assert!(Country::from_row(&row).is_err());
    }

    #[test]
    fn test_record_names_match_mapping() {
        let metamodel = Metamodel::movies();
        for name in [Person::NAME, Director::NAME, Country::NAME, Film::NAME, Role::NAME] {
            assert!(metamodel.entity(name).is_ok(), "{} is not mapped", name);
        }
    }
}
