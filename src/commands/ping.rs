use chrono::{DateTime, Utc};
use postgres::NoTls;
use std::fmt::Display;

use crate::config::DbConfig;

const COUNT_SQL: &str =
    "SELECT (SELECT count(*) FROM profiles), (SELECT count(*) FROM profile_status)";

fn summarize<E: Display>(target: &str, counts: Result<(i64, i64), E>) -> Result<String, String> {
    let (profiles, statuses) = counts
        .map_err(|e| format!("Schema check failed on {target}: {e} (run `uba-gateway init-db`)"))?;
    Ok(format!(
        "Connected to {target} ({profiles} profiles, {statuses} status rows)"
    ))
}

pub fn run(db: &DbConfig) -> Result<(), String> {
    let pg = db.pg_config().map_err(|e| e.to_string())?;
    let mut client = postgres::Config::from(pg)
        .connect(NoTls)
        .map_err(|e| format!("Failed to connect to {}: {e}", db.describe()))?;

    let now: DateTime<Utc> = client
        .query_one("SELECT NOW()", &[])
        .map_err(|e| format!("Ping failed: {e}"))?
        .get(0);
    println!("Server time: {now}");

    let counts: Result<(i64, i64), postgres::Error> = client
        .query_one(COUNT_SQL, &[])
        .and_then(|row| Ok((row.try_get(0)?, row.try_get(1)?)));
    println!("{}", summarize(&db.describe(), counts)?);
    Ok(())
}
