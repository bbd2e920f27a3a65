// Row counts of the complete movie store
// Point MOVIEDB_CONFIG at a persistence.toml whose "movies" profile holds the
// full dump, then run with `cargo test -- --ignored`

use chrono::NaiveDate;
use moviedb::{Person, SessionFactory};

mod common;
use common::{full_config, init_tracing};

fn open() -> moviedb::Result<SessionFactory> {
    SessionFactory::from_config(&full_config(), "movies")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
#[ignore = "requires the full movie dataset"]
fn all_persons() -> anyhow::Result<()> {
    let _ = init_tracing();
    let factory = open()?;
    let session = factory.open_session();

    let persons = session
        .create_query::<Person>("SELECT p FROM Person p ORDER BY p.identity")?
        .get_result_list()?;

    assert_eq!(persons.len(), 1137);
    assert_eq!(persons[0].identity, "A.J. Danna");
    Ok(())
}

#[test]
#[ignore = "requires the full movie dataset"]
fn person_by_identity() -> anyhow::Result<()> {
    let _ = init_tracing();
    let factory = open()?;
    let session = factory.open_session();

    let persons = session
        .create_query::<Person>("SELECT p FROM Person p WHERE p.identity = :identity")?
        .set_parameter("identity", "Marion Cotillard")
        .get_result_list()?;

    assert_eq!(persons.len(), 1);
    Ok(())
}

#[test]
#[ignore = "requires the full movie dataset"]
fn persons_born_in_1985() -> anyhow::Result<()> {
    let _ = init_tracing();
    let factory = open()?;
    let session = factory.open_session();

    let persons = session
        .create_query::<Person>(
            "SELECT p FROM Person p WHERE p.birthDate BETWEEN :start_date AND :end_date",
        )?
        .set_parameter("start_date", date(1985, 1, 1))
        .set_parameter("end_date", date(1985, 12, 31))
        .get_result_list()?;

    assert_eq!(persons.len(), 10);
    Ok(())
}

#[test]
#[ignore = "requires the full movie dataset"]
fn persons_by_role_name() -> anyhow::Result<()> {
    let _ = init_tracing();
    let factory = open()?;
    let session = factory.open_session();

    let persons = session
        .create_query::<Person>("SELECT p FROM Person p JOIN p.roles r WHERE r.name = :name")?
        .set_parameter("name", "Harley QUINN")
        .get_result_list()?;

    assert_eq!(persons.len(), 2);
    assert!(persons.iter().all(|p| p.identity == "Margot Robbie"));
    Ok(())
}

#[test]
#[ignore = "requires the full movie dataset"]
fn persons_by_film_year() -> anyhow::Result<()> {
    let _ = init_tracing();
    let factory = open()?;
    let session = factory.open_session();

    let persons = session
        .create_query::<Person>(
            "SELECT p FROM Person p JOIN p.roles r JOIN r.film f WHERE f.year = :year",
        )?
        .set_parameter("year", 2015)
        .get_result_list()?;

    assert_eq!(persons.len(), 140);
    Ok(())
}

#[test]
#[ignore = "requires the full movie dataset"]
fn persons_by_country() -> anyhow::Result<()> {
    let _ = init_tracing();
    let factory = open()?;
    let session = factory.open_session();

    let persons = session
        .create_query::<Person>(
            "SELECT DISTINCT p FROM Person p JOIN p.roles r JOIN r.film f \
             JOIN f.countries c WHERE c.name = :name",
        )?
        .set_parameter("name", "France")
        .get_result_list()?;

    assert_eq!(persons.len(), 158);
    Ok(())
}

#[test]
#[ignore = "requires the full movie dataset"]
fn persons_by_country_and_year() -> anyhow::Result<()> {
    let _ = init_tracing();
    let factory = open()?;
    let session = factory.open_session();

    let persons = session
        .create_query::<Person>(
            "SELECT DISTINCT p FROM Person p JOIN p.roles r JOIN r.film f \
             JOIN f.countries c WHERE c.name = :name AND f.year = :year",
        )?
        .set_parameter("name", "France")
        .set_parameter("year", 2017)
        .get_result_list()?;

    assert_eq!(persons.len(), 24);
    Ok(())
}

#[test]
#[ignore = "requires the full movie dataset"]
fn persons_by_director_and_years() -> anyhow::Result<()> {
    let _ = init_tracing();
    let factory = open()?;
    let session = factory.open_session();

    let persons = session
        .create_query::<Person>(
            "SELECT DISTINCT p FROM Person p JOIN p.roles r JOIN r.film f \
             JOIN f.directors d WHERE d.identity = :identity \
             AND f.year BETWEEN :first_year AND :last_year",
        )?
        .set_parameter("identity", "Ridley Scott")
        .set_parameter("first_year", 2010)
        .set_parameter("last_year", 2020)
        .get_result_list()?;

    assert_eq!(persons.len(), 27);
    Ok(())
}
