// Dataset loading
// The store is pre-populated from a JSON dump of the movie database:
//
//   {
//     "countries": [{ "id": 1, "name": "France" }],
//     "directors": [{ "id": 1, "identity": "Ridley Scott" }],
//     "persons":   [{ "id": 1, "identity": "Marion Cotillard", "birthDate": "1975-09-30" }],
//     "films":     [{ "id": 1, "title": "Macbeth", "year": 2015, "countries": [1], "directors": [2] }],
//     "roles":     [{ "id": 1, "name": "Lady Macbeth", "person": 1, "film": 1 }]
//   }

use crate::error::{Error, Result};
use crate::query::QueryExecutor;
use crate::storage::Value;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub countries: Vec<CountryRecord>,
    #[serde(default)]
    pub directors: Vec<DirectorRecord>,
    #[serde(default)]
    pub persons: Vec<PersonRecord>,
    #[serde(default)]
    pub films: Vec<FilmRecord>,
    #[serde(default)]
    pub roles: Vec<RoleRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryRecord {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorRecord {
    pub id: i64,
    pub identity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub id: i64,
    pub identity: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilmRecord {
    pub id: i64,
    pub title: String,
    pub year: i64,
    /// Country ids
    #[serde(default)]
    pub countries: Vec<i64>,
    /// Director ids
    #[serde(default)]
    pub directors: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    pub person: i64,
    pub film: i64,
}

impl Dataset {
    /// Read a dump from disk
    /// A missing or unreadable file means the store is unavailable
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::StoreUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Every film and role must point at records that exist
    pub fn validate(&self) -> Result<()> {
        let countries: HashSet<i64> = self.countries.iter().map(|c| c.id).collect();
        let directors: HashSet<i64> = self.directors.iter().map(|d| d.id).collect();
        let persons: HashSet<i64> = self.persons.iter().map(|p| p.id).collect();
        let films: HashSet<i64> = self.films.iter().map(|f| f.id).collect();

        for film in &self.films {
            if let Some(missing) = film.countries.iter().find(|id| !countries.contains(id)) {
                return Err(Error::Dataset(format!(
                    "film {} refers to unknown country {}",
                    film.id, missing
                )));
            }
            if let Some(missing) = film.directors.iter().find(|id| !directors.contains(id)) {
                return Err(Error::Dataset(format!(
                    "film {} refers to unknown director {}",
                    film.id, missing
                )));
            }
            if let Some(repeated) = first_repeat(&film.countries) {
                return Err(Error::Dataset(format!(
                    "film {} lists country {} more than once",
                    film.id, repeated
                )));
            }
            if let Some(repeated) = first_repeat(&film.directors) {
                return Err(Error::Dataset(format!(
                    "film {} lists director {} more than once",
                    film.id, repeated
                )));
            }
        }

        for role in &self.roles {
            if !persons.contains(&role.person) {
                return Err(Error::Dataset(format!(
                    "role {} refers to unknown person {}",
                    role.id, role.person
                )));
            }
            if !films.contains(&role.film) {
                return Err(Error::Dataset(format!(
                    "role {} refers to unknown film {}",
                    role.id, role.film
                )));
            }
        }

        Ok(())
    }

    /// Validate the dump and insert it into the executor's tables
    ///
    /// Validation runs before anything is inserted. An error while inserting
    /// (such as a duplicate id) leaves the executor partly populated; discard
    /// it rather than querying it.
    pub fn load_into(&self, executor: &mut QueryExecutor) -> Result<()> {
        self.validate()?;

        let table = executor.table_mut("country")?;
        for country in &self.countries {
            table.insert_record(&[
                ("id", Value::Integer(country.id)),
                ("name", country.name.as_str().into()),
            ])?;
        }

        let table = executor.table_mut("director")?;
        for director in &self.directors {
            table.insert_record(&[
                ("id", Value::Integer(director.id)),
                ("identity", director.identity.as_str().into()),
            ])?;
        }

        let table = executor.table_mut("person")?;
        for person in &self.persons {
            table.insert_record(&[
                ("id", Value::Integer(person.id)),
                ("identity", person.identity.as_str().into()),
                ("birth_date", person.birth_date.into()),
            ])?;
        }

        let table = executor.table_mut("film")?;
        for film in &self.films {
            table.insert_record(&[
                ("id", Value::Integer(film.id)),
                ("title", film.title.as_str().into()),
                ("year", Value::Integer(film.year)),
            ])?;
        }

        let table = executor.table_mut("film_country")?;
        for film in &self.films {
            for country in &film.countries {
                table.insert_record(&[
                    ("film_id", Value::Integer(film.id)),
                    ("country_id", Value::Integer(*country)),
                ])?;
            }
        }

        let table = executor.table_mut("film_director")?;
        for film in &self.films {
            for director in &film.directors {
                table.insert_record(&[
                    ("film_id", Value::Integer(film.id)),
                    ("director_id", Value::Integer(*director)),
                ])?;
            }
        }

        let table = executor.table_mut("role")?;
        for role in &self.roles {
            table.insert_record(&[
                ("id", Value::Integer(role.id)),
                ("name", role.name.as_str().into()),
                ("person_id", Value::Integer(role.person)),
                ("film_id", Value::Integer(role.film)),
            ])?;
        }

        info!(
            persons = self.persons.len(),
            films = self.films.len(),
            roles = self.roles.len(),
            countries = self.countries.len(),
            directors = self.directors.len(),
            "dataset loaded"
        );
        Ok(())
    }
}

fn first_repeat(ids: &[i64]) -> Option<i64> {
    let mut seen = HashSet::new();
    ids.iter().copied().find(|id| !seen.insert(*id))
}
