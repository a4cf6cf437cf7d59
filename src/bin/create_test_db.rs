use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Date, Month};

use spendwise::{
    CategoryName, Money, NewCategory, NewUser, PasswordHash, Transaction, TransactionType,
    create_category, create_transaction, create_user, initialize_db,
};

/// A utility for creating a test database for the REST API server of spendwise.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user...");

    let user = create_user(
        NewUser {
            username: "test".to_owned(),
            email: "test@example.com".to_owned(),
            password_hash: PasswordHash::from_raw_password("test", PasswordHash::DEFAULT_COST)?,
            profile_image: None,
        },
        &conn,
    )?;

    println!("Creating categories...");

    let category = |name: &str, kind: TransactionType| {
        create_category(
            NewCategory {
                name: CategoryName::new(name)?,
                kind,
                description: None,
            },
            &conn,
        )
    };

    let salary = category("Salary", TransactionType::Income)?;
    let rent = category("Rent", TransactionType::Expense)?;
    let food = category("Food", TransactionType::Expense)?;
    let transport = category("Transport", TransactionType::Expense)?;

    println!("Creating transactions...");

    let mut count = 0;

    for month in 1..=12 {
        let month = Month::try_from(month)?;
        let first = Date::from_calendar_date(2024, month, 1)?;
        let middle = Date::from_calendar_date(2024, month, 15)?;

        let transactions = [
            Transaction::build(
                user.id,
                TransactionType::Income,
                salary.id,
                Money::from_cents(500_000),
                middle,
            )
            .description(Some("Monthly pay".to_owned())),
            Transaction::build(
                user.id,
                TransactionType::Expense,
                rent.id,
                Money::from_cents(180_000),
                first,
            ),
            Transaction::build(
                user.id,
                TransactionType::Expense,
                food.id,
                Money::from_cents(45_000 + i64::from(u8::from(month)) * 1_250),
                middle,
            )
            .description(Some("Groceries".to_owned())),
            Transaction::build(
                user.id,
                TransactionType::Expense,
                transport.id,
                Money::from_cents(8_050),
                middle,
            ),
        ];

        for transaction in transactions {
            create_transaction(transaction, &conn)?;
            count += 1;
        }
    }

    println!("Created {count} transactions.");
    println!("Success! Log in with test@example.com and the password 'test'.");

    Ok(())
}
