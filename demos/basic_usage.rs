// Example: Basic session usage against the bundled fixture store
// Run with: cargo run --example basic_usage

use chrono::NaiveDate;
use moviedb::{Parameters, Person, SessionFactory, Value};
use std::path::Path;

fn main() -> anyhow::Result<()> {
    println!("=== moviedb Basic Usage Example ===\n");

    let config = Path::new(env!("CARGO_MANIFEST_DIR")).join("persistence.toml");
    let factory = SessionFactory::from_config(&config, "fixture")?;
    let session = factory.open_session();

    // 1. Every person, ordered
    println!("1. All persons ordered by identity...");
    let persons = session
        .create_query::<Person>("SELECT p FROM Person p ORDER BY p.identity")?
        .get_result_list()?;
    for person in &persons {
        println!("   {}", person.identity);
    }
    println!();

    // 2. A single person by identity
    println!("2. Looking up Marion Cotillard...");
    let marion = session
        .create_query::<Person>("SELECT p FROM Person p WHERE p.identity = :identity")?
        .set_parameter("identity", "Marion Cotillard")
        .get_single_result()?;
    println!("   {:?}\n", marion);

    // 3. Date range on an indexed column
    println!("3. Persons born in 1985...");
    let born = session
        .create_query::<Person>(
            "SELECT p FROM Person p WHERE p.birthDate BETWEEN :start_date AND :end_date",
        )?
        .set_parameter("start_date", NaiveDate::from_ymd_opt(1985, 1, 1))
        .set_parameter("end_date", NaiveDate::from_ymd_opt(1985, 12, 31))
        .get_result_list()?;
    println!("   {} found\n", born.len());

    // 4. Navigating relations, without and with DISTINCT
    let by_country = "SELECT p FROM Person p JOIN p.roles r JOIN r.film f \
                      JOIN f.countries c WHERE c.name = :name";
    for text in [by_country.to_string(), by_country.replacen("SELECT", "SELECT DISTINCT", 1)] {
        let count = session
            .create_query::<Person>(&text)?
            .set_parameter("name", "France")
            .get_result_list()?
            .len();
        println!("4. {}\n   -> {} row(s)\n", text, count);
    }

    // 5. Projecting values instead of entities
    println!("5. Who played what for Ridley Scott between 2010 and 2020...");
    let mut params = Parameters::new();
    params.insert("identity".to_string(), Value::from("Ridley Scott"));
    params.insert("first_year".to_string(), Value::from(2010));
    params.insert("last_year".to_string(), Value::from(2020));
    let result = session.query(
        "SELECT p.identity, r.name, f.title, f.year FROM Person p JOIN p.roles r \
         JOIN r.film f JOIN f.directors d WHERE d.identity = :identity \
         AND f.year BETWEEN :first_year AND :last_year ORDER BY f.year, p.identity",
        &params,
    )?;
    println!("{}\n", result.format());

    println!("=== Example Complete ===");
    Ok(())
}
